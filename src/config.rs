// src/config.rs

//! Configuration and state directory layout
//!
//! The config file is optional JSON; every field has a default. Command-line
//! flags override whatever the file says.

use crate::engine::RetryPolicy;
use crate::error::{Error, Result};
use crate::verify::HealthThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "deskforge";
const CONFIG_FILE: &str = "config.json";

/// User-tunable settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the state database, logs and backups live
    pub state_dir: Option<PathBuf>,
    /// Manifest file replacing the built-in catalog
    pub manifest: Option<PathBuf>,
    pub retry: RetryPolicy,
    pub thresholds: HealthThresholds,
    /// Whether failed non-critical items make the exit code non-zero
    pub fail_on_noncritical: bool,
    /// Flatpak remote items are installed from
    pub flatpak_remote: String,
    /// zstd level for backup archives
    pub compression_level: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: None,
            manifest: None,
            retry: RetryPolicy::default(),
            thresholds: HealthThresholds::default(),
            fail_on_noncritical: false,
            flatpak_remote: "flathub".to_string(),
            compression_level: 3,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`
    ///
    /// A missing file at the default location yields defaults; a missing file
    /// that was asked for explicitly is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_config_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_json(&raw)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(raw).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        let fraction = self.thresholds.mostly_successful_max_failed_fraction;
        if !(0.0..=1.0).contains(&fraction) {
            return Err(Error::Config(format!(
                "thresholds.mostly_successful_max_failed_fraction must be within 0..=1, got {}",
                fraction
            )));
        }
        if self.flatpak_remote.trim().is_empty() {
            return Err(Error::Config("flatpak_remote must not be empty".to_string()));
        }
        Ok(())
    }

    /// Resolve the state directory layout
    pub fn state_paths(&self) -> Result<StatePaths> {
        let root = match &self.state_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .map(|d| d.join(APP_DIR))
                .ok_or_else(|| {
                    Error::PreconditionFailed(
                        "Cannot determine a user data directory; pass --state-dir".to_string(),
                    )
                })?,
        };
        Ok(StatePaths::new(root))
    }
}

/// `$XDG_CONFIG_HOME/deskforge/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

/// Files and directories under the state root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub root: PathBuf,
    pub db: PathBuf,
    pub logs: PathBuf,
    pub backups: PathBuf,
    pub lock: PathBuf,
}

impl StatePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            db: root.join("state.db"),
            logs: root.join("logs"),
            backups: root.join("backups"),
            lock: root.join("deskforge.lock"),
            root,
        }
    }

    /// One append-only log per tool mode
    pub fn log_file(&self, mode: &str) -> PathBuf {
        self.logs.join(format!("{}.log", mode))
    }

    pub fn create_dirs(&self) -> Result<()> {
        for dir in [&self.root, &self.logs, &self.backups] {
            std::fs::create_dir_all(dir).map_err(|e| {
                Error::InitError(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

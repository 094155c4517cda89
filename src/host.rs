// src/host.rs

//! Host preconditions
//!
//! Mutating commands only run on Debian-family systems, either as root or
//! with `sudo` available. These checks happen before anything is locked,
//! recorded or changed.

use crate::backends::Escalation;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

const OS_RELEASE: &str = "/etc/os-release";
const SUPPORTED_FAMILIES: [&str; 2] = ["debian", "ubuntu"];

/// Identity fields from os-release
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OsRelease {
    pub id: String,
    pub id_like: Vec<String>,
    pub pretty_name: String,
}

impl OsRelease {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::PreconditionFailed(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Ok(Self::parse(&content))
    }

    pub fn parse(content: &str) -> Self {
        let mut release = Self::default();

        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim_matches('"').trim_matches('\'');
            match key {
                "ID" => release.id = value.to_lowercase(),
                "ID_LIKE" => {
                    release.id_like = value.split_whitespace().map(str::to_lowercase).collect()
                }
                "PRETTY_NAME" => release.pretty_name = value.to_string(),
                _ => {}
            }
        }

        release
    }

    /// Debian, Ubuntu, or a derivative naming either in ID_LIKE
    pub fn is_supported(&self) -> bool {
        std::iter::once(&self.id)
            .chain(self.id_like.iter())
            .any(|id| SUPPORTED_FAMILIES.contains(&id.as_str()))
    }

    pub fn display_name(&self) -> &str {
        if self.pretty_name.is_empty() {
            &self.id
        } else {
            &self.pretty_name
        }
    }
}

/// What the preconditions found about the host
#[derive(Debug, Clone)]
pub struct HostInfo {
    pub os: OsRelease,
    pub escalation: Escalation,
    pub graphical_session: bool,
}

/// Check the host can run mutating commands
pub fn check_preconditions() -> Result<HostInfo> {
    let os = OsRelease::read(Path::new(OS_RELEASE))?;
    if !os.is_supported() {
        return Err(Error::PreconditionFailed(format!(
            "Unsupported platform '{}'; Debian or Ubuntu is required",
            os.display_name()
        )));
    }
    debug!("Host platform: {}", os.display_name());

    let escalation = detect_escalation()?;
    let graphical_session = has_graphical_session();
    if !graphical_session {
        warn!("No graphical session detected; desktop applications will install but cannot be launched here");
    }

    Ok(HostInfo {
        os,
        escalation,
        graphical_session,
    })
}

/// Run directly as root, or through `sudo` when it exists
pub fn detect_escalation() -> Result<Escalation> {
    if nix::unistd::Uid::effective().is_root() {
        return Ok(Escalation::None);
    }
    which::which("sudo").map_err(|_| {
        Error::PreconditionFailed(
            "Not running as root and sudo was not found".to_string(),
        )
    })?;
    Ok(Escalation::Sudo)
}

/// DISPLAY or WAYLAND_DISPLAY is set to something
pub fn has_graphical_session() -> bool {
    ["DISPLAY", "WAYLAND_DISPLAY"]
        .iter()
        .any(|var| std::env::var_os(var).is_some_and(|v| !v.is_empty()))
}

// src/logging.rs

//! Tracing setup
//!
//! Two layers share one registry: a terminal layer on stderr, quiet by
//! default, and a per-mode log file that always captures debug output,
//! including full backend stdout/stderr.

use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Keeps the log file handle so it can be synced before exit
pub struct LogGuard {
    file: Option<Arc<File>>,
}

impl LogGuard {
    /// Flush the log file to disk
    pub fn sync(&self) {
        if let Some(file) = &self.file {
            let _ = file.sync_all();
        }
    }
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        self.sync();
    }
}

/// Terminal filter: `RUST_LOG` wins, otherwise warn / info / debug by `-v` count
pub fn terminal_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "warn",
            1 => "info",
            _ => "debug",
        })
    })
}

/// Install the global subscriber, appending to `log_file` if given
pub fn init(verbosity: u8, log_file: Option<&Path>) -> Result<LogGuard> {
    let file = match log_file {
        Some(path) => Some(Arc::new(open_log(path)?)),
        None => None,
    };

    let terminal = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(terminal_filter(verbosity));

    let file_layer = file.clone().map(|f| {
        fmt::layer()
            .with_writer(f)
            .with_ansi(false)
            .with_filter(LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(terminal)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::InitError(format!("Failed to initialize logging: {}", e)))?;

    Ok(LogGuard { file })
}

fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_log_appends() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("logs/install.log");

        {
            use std::io::Write;
            let mut file = open_log(&path).unwrap();
            writeln!(file, "first").unwrap();
        }
        {
            use std::io::Write;
            let mut file = open_log(&path).unwrap();
            writeln!(file, "second").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }
}

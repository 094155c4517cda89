// src/backends/mod.rs

//! Installation backends for Deskforge
//!
//! A backend is an installation channel able to query, install and remove a
//! named item. The convergence engine never knows which concrete channel an
//! item uses; it only talks to the `Backend` trait through a `BackendSet`.
//!
//! - `apt`: primary channel (Debian/Ubuntu system packages)
//! - `flatpak`: secondary channel (sandboxed desktop applications)

pub mod apt;
pub mod command;
pub mod flatpak;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use apt::AptBackend;
pub use command::Escalation;
pub use flatpak::FlatpakBackend;

/// Which installation channel an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Primary,
    Secondary,
}

impl BackendKind {
    pub fn as_str(&self) -> &str {
        match self {
            BackendKind::Primary => "primary",
            BackendKind::Secondary => "secondary",
        }
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "primary" => Ok(BackendKind::Primary),
            "secondary" => Ok(BackendKind::Secondary),
            _ => Err(format!("Invalid backend kind: {}", s)),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful result of an install or remove call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStatus {
    /// The backend changed system state
    Applied,
    /// The item was already in the requested state; nothing was run
    AlreadySatisfied,
}

/// Errors reported by a backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend's tooling is not installed; distinct from "item not installed"
    #[error("{tool} is not available on this host")]
    Unavailable { tool: String },

    /// The backend ran and reported a failure
    #[error("{operation} of {identifier} failed{}: {detail}", .code.map(|c| format!(" (exit {})", c)).unwrap_or_default())]
    Failed {
        operation: String,
        identifier: String,
        code: Option<i32>,
        detail: String,
        /// Lock contention or similar; worth another attempt
        transient: bool,
    },
}

impl BackendError {
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Failed { transient: true, .. })
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, BackendError::Unavailable { .. })
    }
}

/// Common interface for every installation channel
///
/// `install` and `remove` are idempotent: asking for a state the item is
/// already in returns `ApplyStatus::AlreadySatisfied` without running anything.
pub trait Backend {
    /// Short name used in logs ("apt", "flatpak")
    fn name(&self) -> &str;

    /// Query whether the item is currently installed
    fn is_installed(&self, identifier: &str) -> Result<bool, BackendError>;

    /// Install the item
    fn install(&self, identifier: &str) -> Result<ApplyStatus, BackendError>;

    /// Remove the item
    fn remove(&self, identifier: &str) -> Result<ApplyStatus, BackendError>;

    /// Remove dependencies nothing needs any more
    fn garbage_collect(&self) -> Result<(), BackendError>;
}

/// The two channels an invocation works with
pub struct BackendSet {
    primary: Box<dyn Backend>,
    secondary: Box<dyn Backend>,
}

impl BackendSet {
    pub fn new(primary: Box<dyn Backend>, secondary: Box<dyn Backend>) -> Self {
        Self { primary, secondary }
    }

    /// Backends for the live system: APT as primary, Flatpak as secondary
    pub fn system(escalation: Escalation, flatpak_remote: &str) -> Self {
        Self::new(
            Box::new(AptBackend::new(escalation)),
            Box::new(FlatpakBackend::new(flatpak_remote)),
        )
    }

    pub fn get(&self, kind: BackendKind) -> &dyn Backend {
        match kind {
            BackendKind::Primary => self.primary.as_ref(),
            BackendKind::Secondary => self.secondary.as_ref(),
        }
    }

    /// Both backends in processing order
    pub fn all(&self) -> [(BackendKind, &dyn Backend); 2] {
        [
            (BackendKind::Primary, self.primary.as_ref()),
            (BackendKind::Secondary, self.secondary.as_ref()),
        ]
    }
}

/// Reject identifiers a package tool would read as an option
pub(crate) fn check_identifier(operation: &str, identifier: &str) -> Result<(), BackendError> {
    if identifier.is_empty() || identifier.starts_with('-') || identifier.contains(char::is_whitespace)
    {
        return Err(BackendError::Failed {
            operation: operation.to_string(),
            identifier: identifier.to_string(),
            code: None,
            detail: "invalid item identifier".to_string(),
            transient: false,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind_round_trip() {
        assert_eq!("primary".parse::<BackendKind>().unwrap(), BackendKind::Primary);
        assert_eq!(BackendKind::Secondary.to_string(), "secondary");
        assert!("snap".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_failed_error_display() {
        let err = BackendError::Failed {
            operation: "install".to_string(),
            identifier: "gimp".to_string(),
            code: Some(100),
            detail: "E: Unable to locate package gimp".to_string(),
            transient: false,
        };
        assert_eq!(
            err.to_string(),
            "install of gimp failed (exit 100): E: Unable to locate package gimp"
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("install", "libreoffice").is_ok());
        assert!(check_identifier("install", "org.gimp.GIMP").is_ok());
        assert!(check_identifier("install", "--purge").is_err());
        assert!(check_identifier("install", "two words").is_err());
        assert!(check_identifier("install", "").is_err());
    }
}

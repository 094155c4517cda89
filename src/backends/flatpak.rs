// src/backends/flatpak.rs

//! Flatpak backend (secondary channel)
//!
//! Identifiers are reverse-DNS application IDs installed from a remote.
//! Privileges go through polkit rather than sudo.

use super::command::{self, CommandOutput, Escalation};
use super::{ApplyStatus, Backend, BackendError, check_identifier};
use tracing::{debug, info};

const FLATPAK: &str = "flatpak";

const NETWORK_MARKERS: &[&str] = &[
    "Temporary failure in name resolution",
    "Could not resolve host",
    "Unable to connect",
    "Timeout was reached",
];

/// Flatpak application backend
pub struct FlatpakBackend {
    remote: String,
}

impl FlatpakBackend {
    pub fn new(remote: &str) -> Self {
        Self {
            remote: remote.to_string(),
        }
    }

    fn flatpak(&self, operation: &str, args: &[&str], identifier: &str) -> Result<(), BackendError> {
        let output = command::run(FLATPAK, args, &[], Escalation::None)?;
        if output.success() {
            return Ok(());
        }

        Err(BackendError::Failed {
            operation: operation.to_string(),
            identifier: identifier.to_string(),
            code: output.code,
            detail: output.summary(),
            transient: is_network_failure(&output),
        })
    }
}

impl Backend for FlatpakBackend {
    fn name(&self) -> &str {
        FLATPAK
    }

    fn is_installed(&self, identifier: &str) -> Result<bool, BackendError> {
        check_identifier("query", identifier)?;
        command::require_tool(FLATPAK)?;

        // `flatpak info` exits non-zero when the ref is not installed
        let output = command::run(FLATPAK, &["info", identifier], &[], Escalation::None)?;
        Ok(output.success())
    }

    fn install(&self, identifier: &str) -> Result<ApplyStatus, BackendError> {
        if self.is_installed(identifier)? {
            debug!("{} already installed", identifier);
            return Ok(ApplyStatus::AlreadySatisfied);
        }

        info!("flatpak install {} {}", self.remote, identifier);
        self.flatpak(
            "install",
            &["install", "-y", "--noninteractive", &self.remote, identifier],
            identifier,
        )?;
        Ok(ApplyStatus::Applied)
    }

    fn remove(&self, identifier: &str) -> Result<ApplyStatus, BackendError> {
        if !self.is_installed(identifier)? {
            debug!("{} not installed", identifier);
            return Ok(ApplyStatus::AlreadySatisfied);
        }

        info!("flatpak uninstall {}", identifier);
        self.flatpak(
            "remove",
            &["uninstall", "-y", "--noninteractive", identifier],
            identifier,
        )?;
        Ok(ApplyStatus::Applied)
    }

    fn garbage_collect(&self) -> Result<(), BackendError> {
        command::require_tool(FLATPAK)?;

        info!("flatpak uninstall --unused");
        self.flatpak(
            "autoremove",
            &["uninstall", "-y", "--noninteractive", "--unused"],
            "unused runtimes",
        )
    }
}

/// Whether the failure looks like a passing network problem
pub fn is_network_failure(output: &CommandOutput) -> bool {
    output.mentions(NETWORK_MARKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_failure_detection() {
        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "error: Unable to load summary from remote flathub: Could not resolve host: dl.flathub.org\n"
                .to_string(),
        };
        assert!(is_network_failure(&output));

        let output = CommandOutput {
            code: Some(1),
            stdout: String::new(),
            stderr: "error: Nothing matches com.example.Missing in remote flathub\n".to_string(),
        };
        assert!(!is_network_failure(&output));
    }

    #[test]
    fn test_name() {
        assert_eq!(FlatpakBackend::new("flathub").name(), "flatpak");
    }
}

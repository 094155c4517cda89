// src/backends/apt.rs

//! APT backend (primary channel)
//!
//! Queries go through `dpkg-query` and never need privileges; installs,
//! removals and autoremove go through `apt-get`, escalated with sudo unless
//! the process is already root.

use super::command::{self, CommandOutput, Escalation};
use super::{ApplyStatus, Backend, BackendError, check_identifier};
use tracing::{debug, info};

const QUERY_TOOL: &str = "dpkg-query";
const APT_GET: &str = "apt-get";

/// Keeps apt and debconf from stopping at interactive questions
const NONINTERACTIVE_ENV: &[(&str, &str)] = &[("DEBIAN_FRONTEND", "noninteractive")];

/// Output fragments apt prints while another process holds the dpkg lock
const LOCK_MARKERS: &[&str] = &[
    "Could not get lock",
    "Unable to acquire the dpkg frontend lock",
    "Unable to lock the administration directory",
    "is another process using it",
];

/// Debian/Ubuntu package manager backend
pub struct AptBackend {
    escalation: Escalation,
}

impl AptBackend {
    pub fn new(escalation: Escalation) -> Self {
        Self { escalation }
    }

    fn apt_get(&self, operation: &str, args: &[&str], identifier: &str) -> Result<(), BackendError> {
        command::require_tool(APT_GET)?;

        let output = command::run(APT_GET, args, NONINTERACTIVE_ENV, self.escalation)?;
        if output.success() {
            return Ok(());
        }

        Err(failure(operation, identifier, &output))
    }
}

impl Backend for AptBackend {
    fn name(&self) -> &str {
        "apt"
    }

    fn is_installed(&self, identifier: &str) -> Result<bool, BackendError> {
        check_identifier("query", identifier)?;
        command::require_tool(QUERY_TOOL)?;

        let output = command::run(
            QUERY_TOOL,
            &["-W", "-f=${Status}", identifier],
            &[],
            Escalation::None,
        )?;

        match output.code {
            Some(0) => Ok(is_installed_status(&output.stdout)),
            // dpkg-query exits 1 when no package matches the name
            Some(1) => Ok(false),
            _ => Err(failure("query", identifier, &output)),
        }
    }

    fn install(&self, identifier: &str) -> Result<ApplyStatus, BackendError> {
        if self.is_installed(identifier)? {
            debug!("{} already installed", identifier);
            return Ok(ApplyStatus::AlreadySatisfied);
        }

        info!("apt-get install {}", identifier);
        self.apt_get("install", &["install", "-y", identifier], identifier)?;
        Ok(ApplyStatus::Applied)
    }

    fn remove(&self, identifier: &str) -> Result<ApplyStatus, BackendError> {
        if !self.is_installed(identifier)? {
            debug!("{} not installed", identifier);
            return Ok(ApplyStatus::AlreadySatisfied);
        }

        info!("apt-get remove {}", identifier);
        self.apt_get("remove", &["remove", "-y", identifier], identifier)?;
        Ok(ApplyStatus::Applied)
    }

    fn garbage_collect(&self) -> Result<(), BackendError> {
        info!("apt-get autoremove");
        self.apt_get("autoremove", &["autoremove", "-y"], "orphaned dependencies")
    }
}

/// Parse the `${Status}` field: "want flag status", e.g. "install ok installed"
///
/// Packages removed but not purged report "deinstall ok config-files" and
/// count as absent.
pub fn is_installed_status(status: &str) -> bool {
    status.split_whitespace().nth(2) == Some("installed")
}

/// Whether the failure came from dpkg lock contention
pub fn is_lock_contention(output: &CommandOutput) -> bool {
    output.mentions(LOCK_MARKERS)
}

fn failure(operation: &str, identifier: &str, output: &CommandOutput) -> BackendError {
    BackendError::Failed {
        operation: operation.to_string(),
        identifier: identifier.to_string(),
        code: output.code,
        detail: output.summary(),
        transient: is_lock_contention(output),
    }
}

// src/verify.rs

//! Verifier
//!
//! Audits live state against the manifest. Every check queries the backends
//! or the filesystem directly; nothing is read from the state store, so the
//! report reflects reality even after out-of-band changes.
//!
//! A missing critical check is `Failed`, a missing non-critical one is
//! `Warned`. Reports are built by folding per-check outcomes; there are no
//! shared counters.

use crate::backends::BackendSet;
use crate::error::{Error, Result};
use crate::manifest::{InstallItem, Manifest, PathCheck, PathCheckKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::os::unix::fs::PermissionsExt;
use tracing::debug;

/// Cut-offs for the overall health classification
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthThresholds {
    /// Largest failed fraction (exclusive) still rated "mostly successful"
    pub mostly_successful_max_failed_fraction: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            mostly_successful_max_failed_fraction: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Passed,
    Failed,
    Warned,
}

impl CheckStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Warned => "warned",
        }
    }

    fn missing(critical: bool) -> Self {
        if critical {
            CheckStatus::Failed
        } else {
            CheckStatus::Warned
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub name: String,
    pub status: CheckStatus,
    pub critical: bool,
    pub detail: String,
}

/// Overall rating of a full report
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Health {
    FullySuccessful,
    SuccessfulWithWarnings,
    MostlySuccessful,
    HasIssues,
}

impl Health {
    pub fn label(&self) -> &str {
        match self {
            Health::FullySuccessful => "fully successful",
            Health::SuccessfulWithWarnings => "successful with warnings",
            Health::MostlySuccessful => "mostly successful",
            Health::HasIssues => "has issues",
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub warned: usize,
    pub checks: Vec<CheckOutcome>,
}

impl VerificationReport {
    pub fn from_checks(checks: Vec<CheckOutcome>) -> Self {
        let mut report = checks.iter().fold(Self::default(), |mut acc, check| {
            acc.total += 1;
            match check.status {
                CheckStatus::Passed => acc.passed += 1,
                CheckStatus::Failed => acc.failed += 1,
                CheckStatus::Warned => acc.warned += 1,
            }
            acc
        });
        report.checks = checks;
        report
    }

    /// passed / total, 0 for an empty report
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    pub fn failed_fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failed as f64 / self.total as f64
        }
    }

    /// An empty report verified nothing and rates as `HasIssues`
    pub fn health(&self, thresholds: &HealthThresholds) -> Health {
        if self.total == 0 {
            Health::HasIssues
        } else if self.failed == 0 && self.warned == 0 {
            Health::FullySuccessful
        } else if self.failed == 0 {
            Health::SuccessfulWithWarnings
        } else if self.failed_fraction() < thresholds.mostly_successful_max_failed_fraction {
            Health::MostlySuccessful
        } else {
            Health::HasIssues
        }
    }
}

/// Unclassified passed/total ratio from the quick check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickReport {
    pub passed: usize,
    pub total: usize,
    pub checks: Vec<CheckOutcome>,
}

impl QuickReport {
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }
}

pub struct Verifier<'a> {
    backends: &'a BackendSet,
}

impl<'a> Verifier<'a> {
    pub fn new(backends: &'a BackendSet) -> Self {
        Self { backends }
    }

    /// Every group item (each distinct item once) followed by every path check
    pub fn verify(&self, manifest: &Manifest) -> VerificationReport {
        let mut seen = HashSet::new();
        let mut checks: Vec<CheckOutcome> = manifest
            .groups
            .iter()
            .flat_map(|g| g.items.iter())
            .filter(|item| seen.insert((*item).clone()))
            .map(|item| self.check_item(item))
            .collect();

        checks.extend(manifest.path_checks.iter().map(check_path));
        VerificationReport::from_checks(checks)
    }

    /// Verify one group's items, or the single check or item with that name
    pub fn verify_check(&self, manifest: &Manifest, name: &str) -> Result<VerificationReport> {
        if let Some(group) = manifest.group(name) {
            let checks = group.items.iter().map(|item| self.check_item(item)).collect();
            return Ok(VerificationReport::from_checks(checks));
        }

        if let Some(path_check) = manifest
            .path_checks
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
        {
            return Ok(VerificationReport::from_checks(vec![check_path(path_check)]));
        }

        let item = manifest
            .groups
            .iter()
            .flat_map(|g| g.items.iter())
            .chain(manifest.quick_checks.iter())
            .find(|item| item.identifier == name || item.display_name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::NotFoundError(format!("No group or check named '{}'", name)))?;

        Ok(VerificationReport::from_checks(vec![self.check_item(item)]))
    }

    /// Presence of the manifest's quick-check items only
    pub fn quick_check(&self, manifest: &Manifest) -> QuickReport {
        let checks: Vec<CheckOutcome> = manifest
            .quick_checks
            .iter()
            .map(|item| self.check_item(item))
            .collect();

        QuickReport {
            passed: checks.iter().filter(|c| c.status == CheckStatus::Passed).count(),
            total: checks.len(),
            checks,
        }
    }

    fn check_item(&self, item: &InstallItem) -> CheckOutcome {
        let backend = self.backends.get(item.backend);
        let (status, detail) = match backend.is_installed(&item.identifier) {
            Ok(true) => (CheckStatus::Passed, format!("{} installed", backend.name())),
            Ok(false) => (
                CheckStatus::missing(item.critical),
                format!("{} not installed", backend.name()),
            ),
            Err(e) => (CheckStatus::missing(item.critical), e.to_string()),
        };
        debug!("Check {} ({}): {}", item.display_name, item.identifier, status.as_str());

        CheckOutcome {
            name: item.display_name.clone(),
            status,
            critical: item.critical,
            detail,
        }
    }
}

fn check_path(check: &PathCheck) -> CheckOutcome {
    let (ok, detail) = match (check.kind, std::fs::metadata(&check.path)) {
        (_, Err(_)) => (false, format!("{} does not exist", check.path.display())),
        (PathCheckKind::Exists, Ok(_)) => (true, format!("{} exists", check.path.display())),
        (PathCheckKind::Executable, Ok(meta)) => {
            if meta.is_file() && meta.permissions().mode() & 0o111 != 0 {
                (true, format!("{} is executable", check.path.display()))
            } else {
                (false, format!("{} is not executable", check.path.display()))
            }
        }
    };

    CheckOutcome {
        name: check.name.clone(),
        status: if ok {
            CheckStatus::Passed
        } else {
            CheckStatus::missing(check.critical)
        },
        critical: check.critical,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::MemoryBackend;
    use crate::manifest::Group;
    use std::path::PathBuf;

    fn backends(primary: MemoryBackend, secondary: MemoryBackend) -> BackendSet {
        BackendSet::new(Box::new(primary), Box::new(secondary))
    }

    fn outcome(status: CheckStatus) -> CheckOutcome {
        CheckOutcome {
            name: "x".to_string(),
            status,
            critical: status == CheckStatus::Failed,
            detail: String::new(),
        }
    }

    fn manifest() -> Manifest {
        Manifest {
            groups: vec![Group {
                name: "office".to_string(),
                description: String::new(),
                items: vec![
                    InstallItem::primary("libreoffice", "LibreOffice", true),
                    InstallItem::primary("evince", "Document Viewer", false),
                    InstallItem::secondary("us.zoom.Zoom", "Zoom", true),
                ],
                paths: vec![],
            }],
            ..Manifest::default()
        }
    }

    #[test]
    fn test_empty_manifest_rate_is_zero() {
        let set = backends(MemoryBackend::new("apt"), MemoryBackend::new("flatpak"));
        let report = Verifier::new(&set).verify(&Manifest::default());
        assert_eq!(report.total, 0);
        assert_eq!(report.success_rate(), 0.0);
        assert_eq!(report.health(&HealthThresholds::default()), Health::HasIssues);
    }

    #[test]
    fn test_missing_items_fail_or_warn_by_criticality() {
        let set = backends(
            MemoryBackend::new("apt").with_installed(["libreoffice"]),
            MemoryBackend::new("flatpak"),
        );
        let report = Verifier::new(&set).verify(&manifest());

        assert_eq!(report.total, 3);
        assert_eq!(report.passed, 1);
        assert_eq!(report.warned, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.checks[1].status, CheckStatus::Warned);
        assert_eq!(report.checks[2].status, CheckStatus::Failed);
    }

    #[test]
    fn test_verify_is_deterministic() {
        let set = backends(
            MemoryBackend::new("apt").with_installed(["evince"]),
            MemoryBackend::new("flatpak").unavailable(),
        );
        let verifier = Verifier::new(&set);
        let first = verifier.verify(&manifest());
        let second = verifier.verify(&manifest());
        assert_eq!(first, second);
    }

    #[test]
    fn test_shared_items_checked_once() {
        let mut m = manifest();
        let mut copy = m.groups[0].clone();
        copy.name = "office-copy".to_string();
        m.groups.push(copy);

        let set = backends(MemoryBackend::new("apt"), MemoryBackend::new("flatpak"));
        assert_eq!(Verifier::new(&set).verify(&m).total, 3);
    }

    #[test]
    fn test_health_classification() {
        let thresholds = HealthThresholds::default();
        let report = |statuses: &[CheckStatus]| {
            VerificationReport::from_checks(statuses.iter().map(|s| outcome(*s)).collect())
        };
        use CheckStatus::*;

        assert_eq!(report(&[Passed, Passed]).health(&thresholds), Health::FullySuccessful);
        assert_eq!(
            report(&[Passed, Warned]).health(&thresholds),
            Health::SuccessfulWithWarnings
        );
        assert_eq!(
            report(&[Passed, Passed, Passed, Passed, Passed, Failed]).health(&thresholds),
            Health::MostlySuccessful
        );
        // 1/4 is not below 25%
        assert_eq!(
            report(&[Passed, Passed, Passed, Failed]).health(&thresholds),
            Health::HasIssues
        );

        let lenient = HealthThresholds {
            mostly_successful_max_failed_fraction: 0.5,
        };
        assert_eq!(
            report(&[Passed, Passed, Passed, Failed]).health(&lenient),
            Health::MostlySuccessful
        );
    }

    #[test]
    fn test_quick_check_with_absent_backend() {
        let quick = vec![
            InstallItem::primary("libreoffice", "LibreOffice", true),
            InstallItem::primary("thunderbird", "Thunderbird", true),
            InstallItem::primary("gnucash", "GnuCash", true),
            InstallItem::primary("clamav", "ClamAV", true),
            InstallItem::secondary("us.zoom.Zoom", "Zoom", true),
        ];
        let m = Manifest {
            quick_checks: quick,
            ..Manifest::default()
        };
        let set = backends(
            MemoryBackend::new("apt").with_installed(["libreoffice", "thunderbird", "gnucash", "clamav"]),
            MemoryBackend::new("flatpak").unavailable(),
        );

        let report = Verifier::new(&set).quick_check(&m);
        assert_eq!(report.passed, 4);
        assert_eq!(report.total, 5);
        assert!(!report.all_passed());
    }

    #[test]
    fn test_path_checks() {
        let temp_dir = tempfile::tempdir().unwrap();
        let script = temp_dir.path().join("tool");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        let plain = temp_dir.path().join("notes.txt");
        std::fs::write(&plain, "").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let check = |path: PathBuf, kind, critical| PathCheck {
            name: path.display().to_string(),
            path,
            kind,
            critical,
        };

        assert_eq!(
            check_path(&check(script.clone(), PathCheckKind::Executable, true)).status,
            CheckStatus::Passed
        );
        assert_eq!(
            check_path(&check(plain.clone(), PathCheckKind::Executable, true)).status,
            CheckStatus::Failed
        );
        assert_eq!(
            check_path(&check(plain, PathCheckKind::Exists, false)).status,
            CheckStatus::Passed
        );
        assert_eq!(
            check_path(&check(temp_dir.path().join("nope"), PathCheckKind::Exists, false)).status,
            CheckStatus::Warned
        );
    }

    #[test]
    fn test_verify_check_by_group_and_name() {
        let set = backends(
            MemoryBackend::new("apt").with_installed(["libreoffice"]),
            MemoryBackend::new("flatpak"),
        );
        let verifier = Verifier::new(&set);
        let m = manifest();

        assert_eq!(verifier.verify_check(&m, "office").unwrap().total, 3);

        let single = verifier.verify_check(&m, "libreoffice").unwrap();
        assert_eq!(single.total, 1);
        assert_eq!(single.passed, 1);

        assert!(matches!(
            verifier.verify_check(&m, "nonexistent"),
            Err(Error::NotFoundError(_))
        ));
    }
}

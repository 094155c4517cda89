// src/engine/mod.rs

//! Convergence engine
//!
//! Drives backend state toward a declared direction (present or absent) for
//! the items of a group. It is a best-effort batch converger, not a
//! transaction:
//!
//! - each item is queried, then installed or removed only if it differs
//! - transient backend failures are retried per `RetryPolicy`
//! - any other failure is recorded as `Failed` and the next item proceeds
//! - items on a backend whose tooling is missing are recorded as `Skipped`
//! - before removing a group, its declared paths are archived
//!
//! Items and groups are processed strictly one at a time. Package managers
//! hold a global lock, so concurrent calls would only manufacture the
//! transient failures the retry exists to absorb.

pub mod confirm;

pub use crate::db::models::{Direction, Outcome};

use crate::backends::{ApplyStatus, Backend, BackendError, BackendKind, BackendSet};
use crate::backup;
use crate::db::models::{BackupRecord, OperationResult};
use crate::error::{Error, Result};
use crate::interrupt::Interrupt;
use crate::manifest::{Group, InstallItem, Manifest};
use crate::state::StateStore;
use confirm::{ConfirmationProvider, PURGE_DATA_PHRASE, REMOVE_ALL_PHRASE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Group name used for the archive of purged user data
pub const USER_DATA_GROUP: &str = "user-data";

/// Bounded retry for transient backend failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts in total, including the first
    pub max_attempts: u32,
    /// Fixed pause between attempts
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Outcome of converging one group
#[derive(Debug, Clone)]
pub struct GroupResult {
    pub group_name: String,
    pub direction: Direction,
    pub total_count: usize,
    /// Applied plus AlreadySatisfied
    pub success_count: usize,
    pub results: Vec<OperationResult>,
    pub backup: Option<BackupRecord>,
}

impl GroupResult {
    fn new(group: &Group, direction: Direction) -> Self {
        Self {
            group_name: group.name.clone(),
            direction,
            total_count: group.items.len(),
            success_count: 0,
            results: Vec::with_capacity(group.items.len()),
            backup: None,
        }
    }

    fn push(&mut self, result: OperationResult) {
        if result.outcome.is_success() {
            self.success_count += 1;
        }
        self.results.push(result);
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    pub fn failed_count(&self) -> usize {
        self.count(Outcome::Failed)
    }

    /// Whether any item was left unconverged (failed or skipped); with
    /// `critical_only`, only critical items count
    pub fn has_failures(&self, critical_only: bool) -> bool {
        self.results
            .iter()
            .any(|r| !r.outcome.is_success() && (r.item.critical || !critical_only))
    }
}

/// Outcome of removing every group
#[derive(Debug, Clone, Default)]
pub struct RemovalResult {
    pub groups: Vec<GroupResult>,
    /// Garbage-collection failures, logged and otherwise ignored
    pub gc_failures: Vec<(BackendKind, String)>,
}

/// Outcome of purging user data directories
#[derive(Debug, Clone, Default)]
pub struct PurgeResult {
    pub backup: Option<BackupRecord>,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

/// What converging an item would do, without doing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedAction {
    Change,
    AlreadySatisfied,
    Unavailable(String),
    QueryFailed(String),
}

#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub item: InstallItem,
    pub action: PlannedAction,
}

/// Query every item of `group` and report what `converge` would do
pub fn plan(backends: &BackendSet, group: &Group, direction: Direction) -> Vec<PlanEntry> {
    group
        .items
        .iter()
        .map(|item| {
            let action = match backends.get(item.backend).is_installed(&item.identifier) {
                Ok(present) if present == (direction == Direction::Present) => {
                    PlannedAction::AlreadySatisfied
                }
                Ok(_) => PlannedAction::Change,
                Err(e) if e.is_unavailable() => PlannedAction::Unavailable(e.to_string()),
                Err(e) => PlannedAction::QueryFailed(e.to_string()),
            };
            PlanEntry {
                item: item.clone(),
                action,
            }
        })
        .collect()
}

pub struct Engine<'a> {
    backends: &'a BackendSet,
    store: &'a mut StateStore,
    policy: RetryPolicy,
    interrupt: Interrupt,
    compression_level: i32,
    /// Backends found missing during this invocation
    unavailable: HashSet<BackendKind>,
}

impl<'a> Engine<'a> {
    pub fn new(backends: &'a BackendSet, store: &'a mut StateStore, interrupt: Interrupt) -> Self {
        Self {
            backends,
            store,
            policy: RetryPolicy::default(),
            interrupt,
            compression_level: 3,
            unavailable: HashSet::new(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Drive every item of `group` toward `direction`
    ///
    /// Per-item failures end up in the result. Only an interrupt or a state
    /// store failure returns `Err`; outcomes recorded before that remain.
    pub fn converge(&mut self, group: &Group, direction: Direction) -> Result<GroupResult> {
        info!("Converging group {} to {}", group.name, direction.as_str());
        let mut result = GroupResult::new(group, direction);

        if direction == Direction::Absent {
            match self.backup_paths(&group.name, &group.paths) {
                Ok(backup) => result.backup = backup,
                Err(e @ Error::Database(_)) => return Err(e),
                Err(e) => {
                    // Nothing is removed without its backup
                    error!("Backup of group {} failed: {}", group.name, e);
                    let detail = format!("backup failed: {}", e);
                    for item in &group.items {
                        self.record(&mut result, item, direction, Outcome::Skipped, &detail)?;
                    }
                    return Ok(result);
                }
            }
        }

        for item in &group.items {
            self.interrupt.check()?;

            let (outcome, detail) = self.converge_item(item, direction);
            self.record(&mut result, item, direction, outcome, &detail)?;
        }
        self.interrupt.check()?;

        info!(
            "Group {}: {}/{} converged, {} failed",
            group.name,
            result.success_count,
            result.total_count,
            result.failed_count()
        );
        Ok(result)
    }

    /// Converge several groups in order, reporting each as it finishes
    pub fn converge_all<'g, F>(
        &mut self,
        groups: impl IntoIterator<Item = &'g Group>,
        direction: Direction,
        mut on_group: F,
    ) -> Result<Vec<GroupResult>>
    where
        F: FnMut(&GroupResult),
    {
        let mut results = Vec::new();
        for group in groups {
            let result = self.converge(group, direction)?;
            on_group(&result);
            results.push(result);
        }
        Ok(results)
    }

    /// Remove every group of the manifest, then garbage-collect each backend
    ///
    /// Asks for a yes/no answer and then the literal removal phrase. Declining
    /// either returns `UserAborted` before anything is recorded or archived.
    pub fn remove_everything<F>(
        &mut self,
        manifest: &Manifest,
        confirm: &dyn ConfirmationProvider,
        on_group: F,
    ) -> Result<RemovalResult>
    where
        F: FnMut(&GroupResult),
    {
        let prompt = format!(
            "Remove all {} groups ({} items) from this workstation?",
            manifest.groups.len(),
            manifest.item_count()
        );
        if !confirm.confirm(&prompt)? {
            return Err(Error::UserAborted("full removal declined".to_string()));
        }
        if !confirm.confirm_phrase(
            "This removes every managed application.",
            REMOVE_ALL_PHRASE,
        )? {
            return Err(Error::UserAborted(
                "full removal confirmation phrase not given".to_string(),
            ));
        }

        let groups = self.converge_all(&manifest.groups, Direction::Absent, on_group)?;

        let mut gc_failures = Vec::new();
        for (kind, backend) in self.backends.all() {
            self.interrupt.check()?;
            if self.unavailable.contains(&kind) {
                debug!("Skipping garbage collection on unavailable {}", backend.name());
                continue;
            }
            info!("Removing orphaned dependencies via {}", backend.name());
            if let Err(e) = backend.garbage_collect() {
                warn!("Garbage collection on {} failed: {}", backend.name(), e);
                gc_failures.push((kind, e.to_string()));
            }
        }

        Ok(RemovalResult {
            groups,
            gc_failures,
        })
    }

    /// Archive, then delete, the given user data directories
    ///
    /// Guarded like `remove_everything`. Nothing is deleted unless the
    /// archive was written.
    pub fn purge_data(
        &mut self,
        dirs: &[PathBuf],
        confirm: &dyn ConfirmationProvider,
    ) -> Result<PurgeResult> {
        let listing = dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        if !confirm.confirm(&format!("Delete user data in {}?", listing))? {
            return Err(Error::UserAborted("data purge declined".to_string()));
        }
        if !confirm.confirm_phrase(
            "This permanently deletes your business documents.",
            PURGE_DATA_PHRASE,
        )? {
            return Err(Error::UserAborted(
                "data purge confirmation phrase not given".to_string(),
            ));
        }

        let mut result = PurgeResult {
            backup: self.backup_paths(USER_DATA_GROUP, dirs)?,
            ..PurgeResult::default()
        };

        for dir in dirs.iter().filter(|d| d.symlink_metadata().is_ok()) {
            self.interrupt.check()?;
            let removed = if dir.is_dir() {
                std::fs::remove_dir_all(dir)
            } else {
                std::fs::remove_file(dir)
            };
            match removed {
                Ok(()) => {
                    info!("Deleted {}", dir.display());
                    result.removed.push(dir.clone());
                }
                Err(e) => {
                    warn!("Failed to delete {}: {}", dir.display(), e);
                    result.failed.push((dir.clone(), e.to_string()));
                }
            }
        }

        Ok(result)
    }

    fn backup_paths(&mut self, name: &str, paths: &[PathBuf]) -> Result<Option<BackupRecord>> {
        match backup::create_backup(name, paths, self.store.archive_dir(), self.compression_level)? {
            Some(mut record) => {
                self.store.record_backup(&mut record)?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    fn record(
        &mut self,
        result: &mut GroupResult,
        item: &InstallItem,
        direction: Direction,
        outcome: Outcome,
        detail: &str,
    ) -> Result<()> {
        let mut op = OperationResult::new(&result.group_name, item, direction, outcome, detail);
        self.store.record(&mut op)?;
        result.push(op);
        Ok(())
    }

    fn converge_item(&mut self, item: &InstallItem, direction: Direction) -> (Outcome, String) {
        if self.unavailable.contains(&item.backend) {
            return (
                Outcome::Skipped,
                format!("{} backend unavailable", item.backend),
            );
        }

        let backends = self.backends;
        let backend = backends.get(item.backend);
        let queried = backend.is_installed(&item.identifier);
        // A killed query tool reads as "missing"; never act on it
        if self.interrupt.is_set() {
            return (Outcome::Skipped, "interrupted".to_string());
        }
        match queried {
            Ok(present) if present == (direction == Direction::Present) => {
                debug!("{} already {}", item.identifier, direction.as_str());
                (Outcome::AlreadySatisfied, String::new())
            }
            Ok(_) => self.apply_with_retry(backend, item, direction),
            Err(e) => self.classify_failure(item, e),
        }
    }

    fn apply_with_retry(
        &mut self,
        backend: &dyn Backend,
        item: &InstallItem,
        direction: Direction,
    ) -> (Outcome, String) {
        let mut attempt = 1;
        loop {
            if self.interrupt.is_set() {
                return (Outcome::Skipped, "interrupted".to_string());
            }
            let applied = match direction {
                Direction::Present => backend.install(&item.identifier),
                Direction::Absent => backend.remove(&item.identifier),
            };

            match applied {
                Ok(ApplyStatus::Applied) => {
                    info!("{} {} via {}", verb(direction), item.identifier, backend.name());
                    return (Outcome::Applied, String::new());
                }
                Ok(ApplyStatus::AlreadySatisfied) => {
                    return (Outcome::AlreadySatisfied, String::new());
                }
                Err(_) if self.interrupt.is_set() => {
                    return (Outcome::Skipped, "interrupted".to_string());
                }
                Err(e) if e.is_transient() && attempt < self.policy.max_attempts => {
                    warn!(
                        "Attempt {}/{} for {} failed, retrying in {}ms: {}",
                        attempt, self.policy.max_attempts, item.identifier, self.policy.delay_ms, e
                    );
                    if self.interrupt.sleep(self.policy.delay()).is_err() {
                        return (Outcome::Skipped, "interrupted".to_string());
                    }
                    attempt += 1;
                }
                Err(e) => return self.classify_failure(item, e),
            }
        }
    }

    fn classify_failure(&mut self, item: &InstallItem, e: BackendError) -> (Outcome, String) {
        if e.is_unavailable() {
            warn!("{}; skipping remaining {} items", e, item.backend);
            self.unavailable.insert(item.backend);
            (Outcome::Skipped, e.to_string())
        } else {
            warn!("{} ({}): {}", item.display_name, item.identifier, e);
            (Outcome::Failed, e.to_string())
        }
    }
}

fn verb(direction: Direction) -> &'static str {
    match direction {
        Direction::Present => "Installed",
        Direction::Absent => "Removed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{Call, MemoryBackend};
    use crate::config::StatePaths;
    use confirm::ScriptedConfirm;

    struct Fixture {
        _dir: tempfile::TempDir,
        store: StateStore,
        primary: MemoryBackend,
        secondary: MemoryBackend,
        backends: BackendSet,
    }

    fn fixture(primary: MemoryBackend, secondary: MemoryBackend) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(&StatePaths::new(dir.path())).unwrap();
        let backends = BackendSet::new(Box::new(primary.clone()), Box::new(secondary.clone()));
        Fixture {
            _dir: dir,
            store,
            primary,
            secondary,
            backends,
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            delay_ms: 0,
        }
    }

    fn group(items: Vec<InstallItem>) -> Group {
        Group {
            name: "office".to_string(),
            description: String::new(),
            items,
            paths: vec![],
        }
    }

    fn outcomes(result: &GroupResult) -> Vec<Outcome> {
        result.results.iter().map(|r| r.outcome).collect()
    }

    #[test]
    fn test_two_satisfied_one_applied() {
        let mut f = fixture(
            MemoryBackend::new("apt").with_installed(["libreoffice", "evince"]),
            MemoryBackend::new("flatpak"),
        );
        let g = group(vec![
            InstallItem::primary("libreoffice", "LibreOffice", true),
            InstallItem::primary("evince", "Document Viewer", false),
            InstallItem::primary("simple-scan", "Simple Scan", false),
        ]);

        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new()).with_policy(fast());
        let result = engine.converge(&g, Direction::Present).unwrap();

        assert_eq!(
            outcomes(&result),
            vec![Outcome::AlreadySatisfied, Outcome::AlreadySatisfied, Outcome::Applied]
        );
        assert_eq!(result.total_count, 3);
        assert_eq!(result.success_count, 3);
        assert!(f.primary.installed().contains(&"simple-scan".to_string()));
    }

    #[test]
    fn test_failure_does_not_stop_siblings() {
        let mut f = fixture(
            MemoryBackend::new("apt").fail_always("gimp"),
            MemoryBackend::new("flatpak"),
        );
        let g = group(vec![
            InstallItem::primary("inkscape", "Inkscape", false),
            InstallItem::primary("gimp", "GIMP", true),
            InstallItem::primary("scribus", "Scribus", false),
        ]);

        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new()).with_policy(fast());
        let result = engine.converge(&g, Direction::Present).unwrap();

        assert_eq!(
            outcomes(&result),
            vec![Outcome::Applied, Outcome::Failed, Outcome::Applied]
        );
        assert!(result.results[1].detail.contains("scripted failure"));
        assert!(result.has_failures(true));
        // Persistent failures are not retried
        assert_eq!(f.primary.attempts("gimp"), 1);
        assert_eq!(f.store.history().unwrap().len(), 3);
    }

    #[test]
    fn test_transient_failure_retried_once() {
        let mut f = fixture(
            MemoryBackend::new("apt")
                .fail_transient("vlc", 1)
                .fail_transient("htop", 5),
            MemoryBackend::new("flatpak"),
        );
        let g = group(vec![
            InstallItem::primary("vlc", "VLC", false),
            InstallItem::primary("htop", "htop", false),
        ]);

        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new()).with_policy(fast());
        let result = engine.converge(&g, Direction::Present).unwrap();

        assert_eq!(outcomes(&result), vec![Outcome::Applied, Outcome::Failed]);
        assert_eq!(f.primary.attempts("vlc"), 2);
        assert_eq!(f.primary.attempts("htop"), 2);
        // One record per item, not per attempt
        assert_eq!(f.store.history().unwrap().len(), 2);
        assert!(!result.has_failures(true));
        assert!(result.has_failures(false));
    }

    #[test]
    fn test_unavailable_backend_skips_its_items() {
        let mut f = fixture(
            MemoryBackend::new("apt"),
            MemoryBackend::new("flatpak").unavailable(),
        );
        let g = group(vec![
            InstallItem::secondary("com.slack.Slack", "Slack", false),
            InstallItem::primary("remmina", "Remmina", false),
            InstallItem::secondary("org.signal.Signal", "Signal", false),
        ]);

        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new()).with_policy(fast());
        let result = engine.converge(&g, Direction::Present).unwrap();

        assert_eq!(
            outcomes(&result),
            vec![Outcome::Skipped, Outcome::Applied, Outcome::Skipped]
        );
        // The second flatpak item is not queried again
        assert_eq!(f.secondary.calls(), vec![Call::Query("com.slack.Slack".to_string())]);
    }

    #[test]
    fn test_remove_absent_item_is_satisfied() {
        let mut f = fixture(MemoryBackend::new("apt"), MemoryBackend::new("flatpak"));
        let g = group(vec![InstallItem::primary("homebank", "HomeBank", false)]);

        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new());
        let result = engine.converge(&g, Direction::Absent).unwrap();

        assert_eq!(outcomes(&result), vec![Outcome::AlreadySatisfied]);
        assert!(result.backup.is_none());
    }

    #[test]
    fn test_backup_precedes_removals() {
        let mut f = fixture(
            MemoryBackend::new("apt").with_installed(["gnucash"]),
            MemoryBackend::new("flatpak"),
        );
        let data = f._dir.path().join("gnucash-data");
        std::fs::create_dir_all(&data).unwrap();
        std::fs::write(data.join("books.gnucash"), b"ledger").unwrap();

        let mut g = group(vec![InstallItem::primary("gnucash", "GnuCash", true)]);
        g.name = "finance".to_string();
        g.paths = vec![data];

        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new());
        let result = engine.converge(&g, Direction::Absent).unwrap();

        let backup = result.backup.clone().unwrap();
        assert!(backup.archive_path.exists());
        assert!(result.results.iter().all(|r| backup.created_at < r.timestamp));
        assert_eq!(outcomes(&result), vec![Outcome::Applied]);

        let latest = f.store.latest_backup("finance").unwrap().unwrap();
        assert_eq!(latest.archive_path, backup.archive_path);
    }

    #[test]
    fn test_interrupt_records_in_flight_item() {
        let interrupt = Interrupt::new();
        let mut f = fixture(
            MemoryBackend::new("apt").interrupt_during("thunderbird", &interrupt, 2),
            MemoryBackend::new("flatpak"),
        );
        let g = group(vec![
            InstallItem::primary("libreoffice", "LibreOffice", true),
            InstallItem::primary("thunderbird", "Thunderbird", true),
            InstallItem::primary("evince", "Document Viewer", false),
        ]);

        let mut engine = Engine::new(&f.backends, &mut f.store, interrupt.clone());
        let err = engine.converge(&g, Direction::Present).unwrap_err();
        assert!(matches!(err, Error::Interrupted { signal: 2 }));

        let history = f.store.history().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].outcome, Outcome::Skipped);
        assert_eq!(history[1].detail, "interrupted");
        assert_eq!(f.primary.attempts("evince"), 0);
    }

    #[test]
    fn test_interrupt_during_query_launches_nothing() {
        let interrupt = Interrupt::new();
        let mut f = fixture(
            MemoryBackend::new("apt"),
            MemoryBackend::new("flatpak").interrupt_during_query("us.zoom.Zoom", &interrupt, 2),
        );
        let g = group(vec![InstallItem::secondary("us.zoom.Zoom", "Zoom", false)]);

        let mut engine = Engine::new(&f.backends, &mut f.store, interrupt.clone());
        let err = engine.converge(&g, Direction::Present).unwrap_err();
        assert!(matches!(err, Error::Interrupted { signal: 2 }));

        assert_eq!(f.secondary.attempts("us.zoom.Zoom"), 0);
        assert!(f.secondary.installed().is_empty());
        let history = f.store.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].outcome, Outcome::Skipped);
        assert_eq!(history[0].detail, "interrupted");
    }

    #[test]
    fn test_declined_removal_touches_nothing() {
        let mut f = fixture(
            MemoryBackend::new("apt").with_installed(["vlc"]),
            MemoryBackend::new("flatpak"),
        );
        let mut manifest = Manifest::default();
        manifest.groups.push(group(vec![InstallItem::primary("vlc", "VLC", false)]));

        let confirm = ScriptedConfirm::no();
        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new());
        let err = engine.remove_everything(&manifest, &confirm, |_| {}).unwrap_err();

        assert!(matches!(err, Error::UserAborted(_)));
        assert_eq!(confirm.prompts().len(), 1);
        assert!(f.store.history().unwrap().is_empty());
        assert!(f.store.backups().unwrap().is_empty());
        assert!(f.primary.calls().is_empty());
    }

    #[test]
    fn test_remove_everything_requires_phrase() {
        let mut f = fixture(
            MemoryBackend::new("apt").with_installed(["vlc"]),
            MemoryBackend::new("flatpak"),
        );
        let mut manifest = Manifest::default();
        manifest.groups.push(group(vec![InstallItem::primary("vlc", "VLC", false)]));

        let confirm = ScriptedConfirm::yes().with_phrase("remove all");
        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new());
        assert!(matches!(
            engine.remove_everything(&manifest, &confirm, |_| {}),
            Err(Error::UserAborted(_))
        ));
        assert_eq!(f.primary.installed(), vec!["vlc".to_string()]);
    }

    #[test]
    fn test_remove_everything_collects_garbage() {
        let mut f = fixture(
            MemoryBackend::new("apt")
                .with_installed(["vlc"])
                .fail_garbage_collect(),
            MemoryBackend::new("flatpak").with_installed(["us.zoom.Zoom"]),
        );
        let mut manifest = Manifest::default();
        manifest.groups.push(group(vec![InstallItem::primary("vlc", "VLC", false)]));
        let mut second = group(vec![InstallItem::secondary("us.zoom.Zoom", "Zoom", true)]);
        second.name = "communication".to_string();
        manifest.groups.push(second);

        let confirm = ScriptedConfirm::yes().with_phrase(REMOVE_ALL_PHRASE);
        let mut seen = Vec::new();
        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new());
        let removal = engine
            .remove_everything(&manifest, &confirm, |g| seen.push(g.group_name.clone()))
            .unwrap();

        assert_eq!(seen, vec!["office".to_string(), "communication".to_string()]);
        assert_eq!(removal.groups.len(), 2);
        assert!(f.primary.installed().is_empty());
        assert!(f.secondary.installed().is_empty());
        assert_eq!(f.secondary.calls().last(), Some(&Call::GarbageCollect));
        assert_eq!(removal.gc_failures.len(), 1);
        assert_eq!(removal.gc_failures[0].0, BackendKind::Primary);
    }

    #[test]
    fn test_purge_data_backs_up_then_deletes() {
        let mut f = fixture(MemoryBackend::new("apt"), MemoryBackend::new("flatpak"));
        let business = f._dir.path().join("Business");
        std::fs::create_dir_all(business.join("Invoices")).unwrap();
        std::fs::write(business.join("Invoices/0001.pdf"), b"%PDF").unwrap();

        let confirm = ScriptedConfirm::yes().with_phrase(PURGE_DATA_PHRASE);
        let mut engine = Engine::new(&f.backends, &mut f.store, Interrupt::new());
        let purge = engine.purge_data(&[business.clone()], &confirm).unwrap();

        assert!(!business.exists());
        assert_eq!(purge.removed, vec![business]);
        let backup = purge.backup.unwrap();
        assert_eq!(backup.group_name, USER_DATA_GROUP);
        assert!(backup.archive_path.exists());
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let f = fixture(
            MemoryBackend::new("apt").with_installed(["ufw"]),
            MemoryBackend::new("flatpak").unavailable(),
        );
        let g = group(vec![
            InstallItem::primary("ufw", "Firewall", true),
            InstallItem::primary("clamav", "ClamAV", true),
            InstallItem::secondary("com.bitwarden.desktop", "Bitwarden", false),
        ]);

        let entries = plan(&f.backends, &g, Direction::Present);
        assert_eq!(entries[0].action, PlannedAction::AlreadySatisfied);
        assert_eq!(entries[1].action, PlannedAction::Change);
        assert!(matches!(entries[2].action, PlannedAction::Unavailable(_)));
        assert_eq!(f.primary.attempts("clamav"), 0);
    }
}

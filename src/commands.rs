// src/commands.rs

//! Command handlers
//!
//! One function per subcommand. Each is a single call into the engine,
//! verifier or state store plus terminal output; backends and confirmation
//! are passed in so the handlers run the same against the live system and
//! against test doubles.

use crate::backends::BackendSet;
use crate::backup::{self, ArchiveStatus};
use crate::config::{Config, StatePaths};
use crate::db::models::{BackupRecord, RunMode};
use crate::engine::confirm::ConfirmationProvider;
use crate::engine::{self, Direction, Engine, GroupResult, Outcome, PlannedAction};
use crate::error::{Error, Result};
use crate::interrupt::{self, Interrupt};
use crate::lock::StateLock;
use crate::manifest::{Group, Manifest};
use crate::state::StateStore;
use crate::verify::{CheckOutcome, CheckStatus, Health, VerificationReport, Verifier};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Exit code for runs that finished with items left unconverged
pub const EXIT_PARTIAL: i32 = 2;

/// Exit code for runs that stopped before changing anything
pub const EXIT_ABORTED: i32 = 1;

/// How a command that ran to completion ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    PartialFailure,
}

impl CommandOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            CommandOutcome::Success => 0,
            CommandOutcome::PartialFailure => EXIT_PARTIAL,
        }
    }
}

/// Exit code for a command that returned an error
///
/// Declining a confirmation is a clean exit; an interrupt exits with
/// 128 + signal; anything else aborted the run.
pub fn exit_code_for_error(err: &Error) -> i32 {
    match err {
        Error::UserAborted(_) => 0,
        Error::Interrupted { signal } => interrupt::exit_code(*signal),
        _ => EXIT_ABORTED,
    }
}

/// What `uninstall` removes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallTarget {
    All,
    Groups(Vec<String>),
    PurgeData,
}

/// Which verification `verify` runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyMode {
    Full,
    Quick,
    Check(String),
}

/// Everything a command needs besides backends and prompts
pub struct Context {
    pub config: Config,
    pub paths: StatePaths,
    pub manifest: Manifest,
    pub interrupt: Interrupt,
}

impl Context {
    /// Resolve state paths and load the manifest named by `config`
    pub fn new(config: Config, interrupt: Interrupt) -> Result<Self> {
        let paths = config.state_paths()?;
        let manifest = match &config.manifest {
            Some(path) => Manifest::load(path)?,
            None => Manifest::builtin(),
        };

        Ok(Self {
            config,
            paths,
            manifest,
            interrupt,
        })
    }

    fn engine<'a>(&self, backends: &'a BackendSet, store: &'a mut StateStore) -> Engine<'a> {
        Engine::new(backends, store, self.interrupt.clone())
            .with_policy(self.config.retry)
            .with_compression_level(self.config.compression_level)
    }

    fn outcome_for(&self, results: &[GroupResult]) -> CommandOutcome {
        let critical_only = !self.config.fail_on_noncritical;
        if results.iter().any(|r| r.has_failures(critical_only)) {
            CommandOutcome::PartialFailure
        } else {
            CommandOutcome::Success
        }
    }

    fn select(&self, all: bool, names: &[String]) -> Result<Vec<&Group>> {
        if all {
            Ok(self.manifest.groups.iter().collect())
        } else {
            self.manifest.select(names)
        }
    }
}

/// Converge the selected groups to present, then scaffold the workspace
pub fn install(
    ctx: &Context,
    backends: &BackendSet,
    all: bool,
    groups: &[String],
    dry_run: bool,
) -> Result<CommandOutcome> {
    let selected = ctx.select(all, groups)?;

    if dry_run {
        print_plan(backends, &selected, Direction::Present);
        return Ok(CommandOutcome::Success);
    }

    let _lock = StateLock::acquire(&ctx.paths.lock)?;
    let mut store = StateStore::open(&ctx.paths)?;
    store.begin_run(RunMode::Install);

    println!("{} {} group(s)", "Installing".bold(), selected.len());
    let mut tally = Tally::default();
    let results = ctx.engine(backends, &mut store).converge_all(
        selected.iter().copied(),
        Direction::Present,
        |r| tally.report(r),
    )?;

    scaffold_workspace(&ctx.manifest.workspace);
    tally.print_summary("Install", store.run_id());
    Ok(ctx.outcome_for(&results))
}

/// Converge groups to absent, remove everything, or purge user data
pub fn uninstall(
    ctx: &Context,
    backends: &BackendSet,
    target: &UninstallTarget,
    dry_run: bool,
    confirm: &dyn ConfirmationProvider,
) -> Result<CommandOutcome> {
    match target {
        UninstallTarget::Groups(names) => {
            let selected = ctx.manifest.select(names)?;
            if dry_run {
                print_plan(backends, &selected, Direction::Absent);
                return Ok(CommandOutcome::Success);
            }

            let listing = selected.iter().map(|g| g.name.as_str()).collect::<Vec<_>>().join(", ");
            if !confirm.confirm(&format!("Remove {}?", listing))? {
                return Err(Error::UserAborted("group removal declined".to_string()));
            }

            let _lock = StateLock::acquire(&ctx.paths.lock)?;
            let mut store = StateStore::open(&ctx.paths)?;
            store.begin_run(RunMode::Uninstall);

            let mut tally = Tally::default();
            let results = ctx.engine(backends, &mut store).converge_all(
                selected.iter().copied(),
                Direction::Absent,
                |r| tally.report(r),
            )?;
            tally.print_summary("Uninstall", store.run_id());
            Ok(ctx.outcome_for(&results))
        }
        UninstallTarget::All => {
            if dry_run {
                let all: Vec<&Group> = ctx.manifest.groups.iter().collect();
                print_plan(backends, &all, Direction::Absent);
                println!("Orphaned dependencies would then be removed on both backends.");
                return Ok(CommandOutcome::Success);
            }

            let _lock = StateLock::acquire(&ctx.paths.lock)?;
            let mut store = StateStore::open(&ctx.paths)?;
            store.begin_run(RunMode::Uninstall);

            let mut tally = Tally::default();
            let removal = ctx.engine(backends, &mut store).remove_everything(
                &ctx.manifest,
                confirm,
                |r| tally.report(r),
            )?;

            for (kind, detail) in &removal.gc_failures {
                println!(
                    "{} cleanup of orphaned {} dependencies failed (see log): {}",
                    "warning:".yellow().bold(),
                    kind,
                    detail
                );
            }
            tally.print_summary("Uninstall", store.run_id());
            Ok(ctx.outcome_for(&removal.groups))
        }
        UninstallTarget::PurgeData => {
            let dirs = &ctx.manifest.data_dirs;
            if dry_run {
                for dir in dirs {
                    let state = if dir.exists() { "would be archived and deleted" } else { "absent" };
                    println!("  {} {}", dir.display(), state);
                }
                return Ok(CommandOutcome::Success);
            }

            let _lock = StateLock::acquire(&ctx.paths.lock)?;
            let mut store = StateStore::open(&ctx.paths)?;
            store.begin_run(RunMode::Uninstall);

            let purge = ctx.engine(backends, &mut store).purge_data(dirs, confirm)?;
            if let Some(record) = &purge.backup {
                println!("Backed up to {}", record.archive_path.display());
            }
            for dir in &purge.removed {
                println!("  {} {}", "deleted".green(), dir.display());
            }
            for (dir, e) in &purge.failed {
                println!("  {} {}: {}", "failed".red(), dir.display(), e);
            }

            Ok(if purge.failed.is_empty() {
                CommandOutcome::Success
            } else {
                CommandOutcome::PartialFailure
            })
        }
    }
}

/// Audit live state against the manifest; never reads recorded history
pub fn verify(ctx: &Context, backends: &BackendSet, mode: &VerifyMode) -> Result<CommandOutcome> {
    let verifier = Verifier::new(backends);

    match mode {
        VerifyMode::Quick => {
            let report = verifier.quick_check(&ctx.manifest);
            for check in &report.checks {
                print_check(check);
            }
            println!("Quick check: {}/{} passed", report.passed, report.total);
            Ok(if report.all_passed() {
                CommandOutcome::Success
            } else {
                CommandOutcome::PartialFailure
            })
        }
        VerifyMode::Full => {
            let report = verifier.verify(&ctx.manifest);
            Ok(print_report(ctx, &report))
        }
        VerifyMode::Check(name) => {
            let report = verifier.verify_check(&ctx.manifest, name)?;
            Ok(print_report(ctx, &report))
        }
    }
}

/// List the manifest's groups and items
pub fn groups(ctx: &Context) -> Result<CommandOutcome> {
    for group in &ctx.manifest.groups {
        println!("{} ({} items)", group.name.bold(), group.items.len());
        if !group.description.is_empty() {
            println!("  {}", group.description);
        }
        for item in &group.items {
            let marker = if item.critical { "*" } else { " " };
            println!(
                "  {} {:<30} {:<9} {}",
                marker,
                item.display_name,
                item.backend.as_str(),
                item.identifier
            );
        }
        for path in &group.paths {
            println!("    data: {}", path.display());
        }
    }
    println!("(* = critical)");
    Ok(CommandOutcome::Success)
}

/// Recent runs and their recorded outcomes, newest first
pub fn history(ctx: &Context, limit: usize) -> Result<CommandOutcome> {
    let Some(store) = StateStore::open_existing(&ctx.paths)? else {
        println!("No runs recorded.");
        return Ok(CommandOutcome::Success);
    };
    let runs = store.runs(limit)?;
    if runs.is_empty() {
        println!("No runs recorded.");
        return Ok(CommandOutcome::Success);
    }

    for run in runs {
        let Some(id) = run.id else { continue };
        println!(
            "Run {} [{}] {} (pid {})",
            id,
            run.mode.as_str(),
            run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            run.pid
        );
        for op in store.run_history(id)? {
            let outcome = match op.outcome {
                Outcome::Applied => op.outcome.as_str().green(),
                Outcome::AlreadySatisfied => op.outcome.as_str().normal(),
                Outcome::Failed => op.outcome.as_str().red(),
                Outcome::Skipped => op.outcome.as_str().yellow(),
            };
            println!(
                "  {:<18} {:<8} {}/{}:{} {}",
                outcome,
                op.direction.as_str(),
                op.group_name,
                op.item.backend.as_str(),
                op.item.identifier,
                op.detail
            );
        }
    }
    Ok(CommandOutcome::Success)
}

/// Backup archives, with an integrity check against the recorded digest
///
/// With a group, only its latest archive is shown, along with its contents.
pub fn backups(ctx: &Context, group: Option<&str>) -> Result<CommandOutcome> {
    let store = StateStore::open_existing(&ctx.paths)?;

    match group {
        Some(name) => {
            let latest = match &store {
                Some(store) => store.latest_backup(name)?,
                None => None,
            };
            let Some(record) = latest else {
                println!("No backups for group {}.", name);
                return Ok(CommandOutcome::Success);
            };
            if print_backup(&record)? == ArchiveStatus::Intact {
                for entry in backup::archive_entries(&record.archive_path)? {
                    println!("    {}", entry.display());
                }
            }
        }
        None => {
            let records = match &store {
                Some(store) => store.backups()?,
                None => Vec::new(),
            };
            if records.is_empty() {
                println!("No backups recorded.");
            }
            for record in &records {
                print_backup(record)?;
            }
        }
    }
    Ok(CommandOutcome::Success)
}

/// Running attempted/succeeded/failed counts across groups
#[derive(Debug, Default)]
struct Tally {
    groups: usize,
    attempted: usize,
    succeeded: usize,
    failed: usize,
    skipped: usize,
}

impl Tally {
    fn report(&mut self, result: &GroupResult) {
        let skipped = result.count(Outcome::Skipped);
        let failed = result.failed_count();
        let attempted = result.results.len() - skipped;

        self.groups += 1;
        self.attempted += attempted;
        self.succeeded += result.success_count;
        self.failed += failed;
        self.skipped += skipped;

        let line = format!(
            "{:<14} {} attempted, {} succeeded, {} failed, {} skipped",
            result.group_name, attempted, result.success_count, failed, skipped
        );
        let line = if failed > 0 {
            line.red()
        } else if skipped > 0 {
            line.yellow()
        } else {
            line.green()
        };
        println!("  {}", line);

        if let Some(record) = &result.backup {
            println!("    backup: {}", record.archive_path.display());
        }
        for op in result.results.iter().filter(|r| !r.outcome.is_success()) {
            println!("    {} {} ({})", op.outcome.as_str(), op.item.display_name, op.item.identifier);
        }
        println!(
            "    running total: {} attempted, {} succeeded, {} failed",
            self.attempted, self.succeeded, self.failed
        );
    }

    fn print_summary(&self, what: &str, run_id: Option<i64>) {
        let headline = format!("{} finished", what);
        let headline = if self.failed > 0 || self.skipped > 0 {
            headline.yellow().bold()
        } else {
            headline.green().bold()
        };
        println!(
            "{}: {} group(s), {} attempted, {} succeeded, {} failed, {} skipped",
            headline, self.groups, self.attempted, self.succeeded, self.failed, self.skipped
        );
        if self.failed > 0 || self.skipped > 0 {
            println!("Backend output for failed items is in the log file.");
        }
        if let Some(id) = run_id {
            println!("Recorded as run {}; see `deskforge history`.", id);
        }
    }
}

fn print_plan(backends: &BackendSet, groups: &[&Group], direction: Direction) {
    let verb = match direction {
        Direction::Present => "install",
        Direction::Absent => "remove",
    };
    for group in groups {
        println!("{}", group.name.bold());
        if direction == Direction::Absent && !group.paths.is_empty() {
            println!("  back up {} path(s) first", group.paths.len());
        }
        for entry in engine::plan(backends, group, direction) {
            let action = match &entry.action {
                PlannedAction::Change => format!("would {}", verb).cyan(),
                PlannedAction::AlreadySatisfied => "already satisfied".normal(),
                PlannedAction::Unavailable(e) => format!("skip: {}", e).yellow(),
                PlannedAction::QueryFailed(e) => format!("query failed: {}", e).red(),
            };
            println!("  {:<30} {}", entry.item.display_name, action);
        }
    }
}

fn print_check(check: &CheckOutcome) {
    let mark = match check.status {
        CheckStatus::Passed => "✓".green(),
        CheckStatus::Failed => "✗".red(),
        CheckStatus::Warned => "!".yellow(),
    };
    println!("  {} {:<32} {}", mark, check.name, check.detail);
}

fn print_report(ctx: &Context, report: &VerificationReport) -> CommandOutcome {
    for check in &report.checks {
        print_check(check);
    }

    let health = report.health(&ctx.config.thresholds);
    println!(
        "{} checks: {} passed, {} failed, {} warnings ({:.1}% success)",
        report.total,
        report.passed,
        report.failed,
        report.warned,
        report.success_rate() * 100.0
    );
    let label = match health {
        Health::FullySuccessful => health.label().green().bold(),
        Health::SuccessfulWithWarnings | Health::MostlySuccessful => health.label().yellow().bold(),
        Health::HasIssues => health.label().red().bold(),
    };
    println!("Overall: {}", label);

    let tolerated = if ctx.config.fail_on_noncritical {
        Health::FullySuccessful
    } else {
        Health::SuccessfulWithWarnings
    };
    if health <= tolerated {
        CommandOutcome::Success
    } else {
        CommandOutcome::PartialFailure
    }
}

fn print_backup(record: &BackupRecord) -> Result<ArchiveStatus> {
    let status = backup::check_archive(record)?;
    let status_label = match status {
        ArchiveStatus::Intact => status.as_str().green(),
        ArchiveStatus::Modified => status.as_str().red(),
        ArchiveStatus::Missing => status.as_str().yellow(),
    };
    println!(
        "{} {} {} ({} bytes, {} path(s)) [{}]",
        record.created_at.format("%Y-%m-%d %H:%M:%S"),
        record.group_name.bold(),
        record.archive_path.display(),
        record.size_bytes,
        record.source_paths.len(),
        status_label
    );
    Ok(status)
}

/// Create the workspace directories; failures are reported, not fatal
fn scaffold_workspace(dirs: &[PathBuf]) {
    let mut ready = 0;
    for dir in dirs {
        match std::fs::create_dir_all(dir) {
            Ok(()) => ready += 1,
            Err(e) => warn!("Could not create workspace directory {}: {}", dir.display(), e),
        }
    }
    if !dirs.is_empty() {
        info!("Workspace: {}/{} directories ready", ready, dirs.len());
        println!("Workspace: {}/{} directories ready", ready, dirs.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CommandOutcome::Success.exit_code(), 0);
        assert_eq!(CommandOutcome::PartialFailure.exit_code(), 2);
        assert_eq!(exit_code_for_error(&Error::UserAborted("no".to_string())), 0);
        assert_eq!(exit_code_for_error(&Error::Interrupted { signal: 15 }), 143);
        assert_eq!(
            exit_code_for_error(&Error::PreconditionFailed("not debian".to_string())),
            1
        );
        assert_eq!(exit_code_for_error(&Error::Locked("held".to_string())), 1);
    }

    #[test]
    fn test_scaffold_workspace() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dirs = vec![
            temp_dir.path().join("Business/Invoices"),
            temp_dir.path().join("Business/Receipts"),
        ];
        scaffold_workspace(&dirs);
        assert!(dirs.iter().all(|d| d.is_dir()));
    }
}

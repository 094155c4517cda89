// src/main.rs

use anyhow::{Context as _, Result};
use clap::{ArgAction, ArgGroup, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use deskforge::backends::{BackendSet, Escalation};
use deskforge::commands::{self, CommandOutcome, Context, UninstallTarget, VerifyMode};
use deskforge::config::Config;
use deskforge::db::models::RunMode;
use deskforge::engine::confirm::PromptConfirm;
use deskforge::interrupt::Interrupt;
use deskforge::{Error, host, logging};
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "deskforge")]
#[command(author, version, about = "Install, verify and uninstall small-business workstation software", long_about = None)]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/deskforge/config.json)
    #[arg(long, global = true, env = "DESKFORGE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// State directory for the database, logs and backups
    #[arg(long, global = true, env = "DESKFORGE_STATE_DIR", value_name = "PATH")]
    state_dir: Option<PathBuf>,

    /// Manifest file replacing the built-in catalog
    #[arg(long, global = true, env = "DESKFORGE_MANIFEST", value_name = "PATH")]
    manifest: Option<PathBuf>,

    /// More terminal output (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Answer yes to yes/no confirmations
    #[arg(short = 'y', long, global = true)]
    yes: bool,

    /// Confirmation phrase for destructive operations
    #[arg(long, global = true, value_name = "PHRASE")]
    confirm: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install groups of applications
    #[command(group(ArgGroup::new("target").required(true).args(["all", "group"])))]
    Install {
        /// Install every group
        #[arg(long)]
        all: bool,
        /// Group to install (repeatable)
        #[arg(short, long, value_name = "NAME")]
        group: Vec<String>,
        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Check installed state against the manifest
    #[command(group(ArgGroup::new("mode").args(["full", "quick", "check"])))]
    Verify {
        /// Check every item and path (default)
        #[arg(long)]
        full: bool,
        /// Check only the quick-check items
        #[arg(long)]
        quick: bool,
        /// Check one group, item or path check
        #[arg(long, value_name = "NAME")]
        check: Option<String>,
    },
    /// Remove groups of applications or user data
    #[command(group(ArgGroup::new("target").required(true).args(["all", "group", "purge_data"])))]
    Uninstall {
        /// Remove every group and orphaned dependencies
        #[arg(long)]
        all: bool,
        /// Group to remove (repeatable)
        #[arg(short, long, value_name = "NAME")]
        group: Vec<String>,
        /// Back up, then delete, the business data directories
        #[arg(long)]
        purge_data: bool,
        /// Show what would change without changing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// List manifest groups and their items
    Groups,
    /// Show recorded runs and outcomes
    History {
        /// Number of runs to show
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// List backup archives
    Backups {
        /// Show only the latest backup of this group
        #[arg(short, long, value_name = "NAME")]
        group: Option<String>,
    },
    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

impl Commands {
    /// Mode whose log file this command appends to
    fn run_mode(&self) -> Option<RunMode> {
        match self {
            Commands::Install { .. } => Some(RunMode::Install),
            Commands::Verify { .. } => Some(RunMode::Verify),
            Commands::Uninstall { .. } => Some(RunMode::Uninstall),
            _ => None,
        }
    }
}

fn main() {
    // Usage errors abort before anything starts; keep 2 for partial failures
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() { commands::EXIT_ABORTED } else { 0 };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "deskforge", &mut std::io::stdout());
        return;
    }

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            commands::EXIT_ABORTED
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.state_dir {
        config.state_dir = Some(dir.clone());
    }
    if let Some(manifest) = &cli.manifest {
        config.manifest = Some(manifest.clone());
    }

    let interrupt = Interrupt::install().context("Failed to install signal handlers")?;
    let ctx = Context::new(config, interrupt)?;

    let log_file = cli
        .command
        .run_mode()
        .map(|mode| ctx.paths.log_file(mode.as_str()));
    let log = logging::init(cli.verbose, log_file.as_deref())?;
    info!("deskforge {} starting", env!("CARGO_PKG_VERSION"));
    debug!("State directory: {}", ctx.paths.root.display());

    let code = match dispatch(&cli, &ctx) {
        Ok(outcome) => outcome.exit_code(),
        Err(e) => report_error(&e),
    };
    info!("Exiting with code {}", code);
    log.sync();
    Ok(code)
}

fn dispatch(cli: &Cli, ctx: &Context) -> deskforge::Result<CommandOutcome> {
    let confirm = PromptConfirm::new(cli.yes, cli.confirm.clone());

    match &cli.command {
        Commands::Install {
            all,
            group,
            dry_run,
        } => {
            let backends = system_backends(ctx, *dry_run)?;
            commands::install(ctx, &backends, *all, group, *dry_run)
        }
        Commands::Verify { quick, check, .. } => {
            let mode = match (quick, check) {
                (true, _) => VerifyMode::Quick,
                (false, Some(name)) => VerifyMode::Check(name.clone()),
                (false, None) => VerifyMode::Full,
            };
            // Queries need no privileges
            let backends = BackendSet::system(Escalation::None, &ctx.config.flatpak_remote);
            commands::verify(ctx, &backends, &mode)
        }
        Commands::Uninstall {
            all,
            group,
            purge_data,
            dry_run,
        } => {
            let target = if *all {
                UninstallTarget::All
            } else if *purge_data {
                UninstallTarget::PurgeData
            } else {
                UninstallTarget::Groups(group.clone())
            };
            // Purging user data only touches the user's own files
            let backends = system_backends(ctx, *dry_run || *purge_data)?;
            commands::uninstall(ctx, &backends, &target, *dry_run, &confirm)
        }
        Commands::Groups => commands::groups(ctx),
        Commands::History { limit } => commands::history(ctx, *limit),
        Commands::Backups { group } => commands::backups(ctx, group.as_deref()),
        Commands::Completions { .. } => Ok(CommandOutcome::Success),
    }
}

/// Live backends; mutating runs must pass the host preconditions first
fn system_backends(ctx: &Context, read_only: bool) -> deskforge::Result<BackendSet> {
    let escalation = if read_only {
        Escalation::None
    } else {
        let host = host::check_preconditions()?;
        info!("Host: {}", host.os.display_name());
        host.escalation
    };
    Ok(BackendSet::system(escalation, &ctx.config.flatpak_remote))
}

fn report_error(err: &Error) -> i32 {
    match err {
        Error::UserAborted(reason) => println!("Cancelled: {}. Nothing was changed.", reason),
        _ if err.is_precondition() => eprintln!(
            "{} {}. Nothing was changed.",
            "error:".red().bold(),
            err
        ),
        Error::Interrupted { .. } => eprintln!(
            "{} {}. Completed records were saved; run the command again to resume.",
            "interrupted:".red().bold(),
            err
        ),
        _ => eprintln!("{} {}", "error:".red().bold(), err),
    }
    commands::exit_code_for_error(err)
}

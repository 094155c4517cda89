// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn group_arg(help: &'static str) -> Arg {
    Arg::new("group")
        .short('g')
        .long("group")
        .value_name("NAME")
        .action(ArgAction::Append)
        .help(help)
}

fn dry_run_arg() -> Arg {
    Arg::new("dry_run")
        .long("dry-run")
        .action(ArgAction::SetTrue)
        .help("Show what would change without changing anything")
}

fn build_cli() -> Command {
    Command::new("deskforge")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Deskforge Contributors")
        .about("Install, verify and uninstall small-business workstation software")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Config file (default: $XDG_CONFIG_HOME/deskforge/config.json)"),
        )
        .arg(
            Arg::new("state_dir")
                .long("state-dir")
                .value_name("PATH")
                .global(true)
                .help("State directory for the database, logs and backups"),
        )
        .arg(
            Arg::new("manifest")
                .long("manifest")
                .value_name("PATH")
                .global(true)
                .help("Manifest file replacing the built-in catalog"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("More terminal output (-v info, -vv debug)"),
        )
        .arg(
            Arg::new("yes")
                .short('y')
                .long("yes")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Answer yes to yes/no confirmations"),
        )
        .arg(
            Arg::new("confirm")
                .long("confirm")
                .value_name("PHRASE")
                .global(true)
                .help("Confirmation phrase for destructive operations"),
        )
        .subcommand(
            Command::new("install")
                .about("Install groups of applications")
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Install every group"),
                )
                .arg(group_arg("Group to install (repeatable)"))
                .arg(dry_run_arg()),
        )
        .subcommand(
            Command::new("verify")
                .about("Check installed state against the manifest")
                .arg(
                    Arg::new("full")
                        .long("full")
                        .action(ArgAction::SetTrue)
                        .help("Check every item and path (default)"),
                )
                .arg(
                    Arg::new("quick")
                        .long("quick")
                        .action(ArgAction::SetTrue)
                        .help("Check only the quick-check items"),
                )
                .arg(
                    Arg::new("check")
                        .long("check")
                        .value_name("NAME")
                        .help("Check one group, item or path check"),
                ),
        )
        .subcommand(
            Command::new("uninstall")
                .about("Remove groups of applications or user data")
                .arg(
                    Arg::new("all")
                        .long("all")
                        .action(ArgAction::SetTrue)
                        .help("Remove every group and orphaned dependencies"),
                )
                .arg(group_arg("Group to remove (repeatable)"))
                .arg(
                    Arg::new("purge_data")
                        .long("purge-data")
                        .action(ArgAction::SetTrue)
                        .help("Back up, then delete, the business data directories"),
                )
                .arg(dry_run_arg()),
        )
        .subcommand(Command::new("groups").about("List manifest groups and their items"))
        .subcommand(
            Command::new("history")
                .about("Show recorded runs and outcomes")
                .arg(
                    Arg::new("limit")
                        .short('n')
                        .long("limit")
                        .default_value("10")
                        .help("Number of runs to show"),
                ),
        )
        .subcommand(
            Command::new("backups")
                .about("List backup archives")
                .arg(
                    Arg::new("group")
                        .short('g')
                        .long("group")
                        .value_name("NAME")
                        .help("Show only the latest backup of this group"),
                ),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("deskforge.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");
}

// tests/cli_test.rs

//! Command-line behavior of the deskforge binary
//!
//! Only commands that never touch the system package managers run here.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn deskforge(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("deskforge").unwrap();
    cmd.env("HOME", home.path())
        .env("XDG_CONFIG_HOME", home.path().join(".config"))
        .env("XDG_DATA_HOME", home.path().join(".local/share"))
        .env_remove("DESKFORGE_CONFIG")
        .env_remove("DESKFORGE_MANIFEST")
        .env_remove("RUST_LOG")
        .arg("--state-dir")
        .arg(home.path().join("state"));
    cmd
}

#[test]
fn test_groups_lists_builtin_catalog() {
    let home = tempfile::tempdir().unwrap();
    deskforge(&home)
        .arg("groups")
        .assert()
        .success()
        .stdout(predicate::str::contains("office"))
        .stdout(predicate::str::contains("(* = critical)"));
}

#[test]
fn test_empty_history_and_backups() {
    let home = tempfile::tempdir().unwrap();
    deskforge(&home)
        .arg("history")
        .assert()
        .success()
        .stdout(predicate::str::contains("No runs recorded."));
    deskforge(&home)
        .arg("backups")
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups recorded."));
    deskforge(&home)
        .args(["backups", "--group", "finance"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No backups for group finance."));
}

#[test]
fn test_completions() {
    let home = tempfile::tempdir().unwrap();
    deskforge(&home)
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("deskforge"));
}

#[test]
fn test_install_requires_a_target() {
    let home = tempfile::tempdir().unwrap();
    deskforge(&home)
        .arg("install")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("required arguments were not provided"));
    deskforge(&home)
        .args(["uninstall", "--all", "--purge-data"])
        .assert()
        .code(1);
}

#[test]
fn test_help_and_version_exit_cleanly() {
    let home = tempfile::tempdir().unwrap();
    deskforge(&home)
        .arg("--help")
        .assert()
        .code(0)
        .stdout(predicate::str::contains("install"));
    deskforge(&home)
        .arg("--version")
        .assert()
        .code(0)
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_check_name() {
    let home = tempfile::tempdir().unwrap();
    deskforge(&home)
        .args(["verify", "--check", "no-such-thing"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No group or check named"));
}

#[test]
fn test_invalid_manifest_aborts() {
    let home = tempfile::tempdir().unwrap();
    let manifest = home.path().join("manifest.json");
    std::fs::write(&manifest, "{ \"groups\": [ { \"name\": \"\" ").unwrap();

    deskforge(&home)
        .arg("--manifest")
        .arg(&manifest)
        .arg("groups")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Manifest error"));
}

#[test]
fn test_custom_manifest_replaces_catalog() {
    let home = tempfile::tempdir().unwrap();
    let manifest = home.path().join("manifest.json");
    std::fs::write(
        &manifest,
        r#"{"groups":[{"name":"bakery","items":[
            {"backend":"primary","identifier":"gnumeric","display_name":"Gnumeric","critical":true}
        ]}]}"#,
    )
    .unwrap();

    deskforge(&home)
        .arg("--manifest")
        .arg(&manifest)
        .arg("groups")
        .assert()
        .success()
        .stdout(predicate::str::contains("bakery"))
        .stdout(predicate::str::contains("office").not());
}

#[test]
fn test_missing_explicit_config() {
    let home = tempfile::tempdir().unwrap();
    deskforge(&home)
        .arg("--config")
        .arg(home.path().join("absent.json"))
        .arg("groups")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Config file not found"));
}

#[test]
fn test_dry_run_purge_changes_nothing() {
    let home = tempfile::tempdir().unwrap();
    let business = home.path().join("Business");
    std::fs::create_dir_all(&business).unwrap();

    deskforge(&home)
        .args(["uninstall", "--purge-data", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("would be archived and deleted"));
    assert!(business.exists());
}

//! Integration tests for `dsh context` subcommands that only touch the
//! local contexts file.
//!
//! Every test points `DSH_CONFIG_DIRECTORY` at a temp directory so they
//! never read or write the real contexts file.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const ADMIN_GROUP: &str = "d5c5c439-1115-4cb6-ab50-b8e547b6c8dd";

fn dsh(dir: &TempDir) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dsh"));
    cmd.env("NO_COLOR", "1").env("DSH_CONFIG_DIRECTORY", dir.path());
    cmd
}

fn add(dir: &TempDir, name: &str) -> assert_cmd::assert::Assert {
    dsh(dir)
        .args([
            "context",
            "add",
            "--admin-group",
            ADMIN_GROUP,
            "--location",
            "uksouth",
            "--name",
            name,
            "--subscription",
            "Data Safe Haven Acme",
        ])
        .assert()
}

#[test]
fn test_available_with_no_contexts() {
    let dir = TempDir::new().expect("temp dir");
    dsh(&dir)
        .args(["context", "available"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No contexts defined"));
}

#[test]
fn test_show_without_context_fails() {
    let dir = TempDir::new().expect("temp dir");
    dsh(&dir)
        .args(["context", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No context selected"));
}

#[test]
fn test_add_derives_key_and_selects_context() {
    let dir = TempDir::new().expect("temp dir");
    add(&dir, "Acme Deployment")
        .success()
        .stdout(predicate::str::contains("acmedeployment"));

    dsh(&dir)
        .args(["context", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Current context: acmedeployment"))
        .stdout(predicate::str::contains("Acme Deployment"))
        .stdout(predicate::str::contains(ADMIN_GROUP))
        .stdout(predicate::str::contains("uksouth"));

    let saved = std::fs::read_to_string(dir.path().join("contexts.yaml")).unwrap();
    assert!(saved.contains("selected: acmedeployment"), "{saved}");
}

#[test]
fn test_add_duplicate_key_fails() {
    let dir = TempDir::new().expect("temp dir");
    add(&dir, "Acme Deployment").success();
    add(&dir, "acme-deployment")
        .failure()
        .stderr(predicate::str::contains("Context 'acmedeployment' already exists."));
}

#[test]
fn test_switch_marks_selected_context() {
    let dir = TempDir::new().expect("temp dir");
    add(&dir, "Acme").success();
    add(&dir, "Turing").success();

    dsh(&dir)
        .args(["context", "available"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme\n"))
        .stdout(predicate::str::contains("turing*"));

    dsh(&dir).args(["context", "switch", "acme"]).assert().success();

    dsh(&dir)
        .args(["context", "available"])
        .assert()
        .success()
        .stdout(predicate::str::contains("acme*"))
        .stdout(predicate::str::contains("turing\n"));
}

#[test]
fn test_switch_to_unknown_context_fails() {
    let dir = TempDir::new().expect("temp dir");
    dsh(&dir)
        .args(["context", "switch", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Context 'missing' is not defined."));
}

#[test]
fn test_update_changes_selected_context() {
    let dir = TempDir::new().expect("temp dir");
    add(&dir, "Acme").success();

    dsh(&dir)
        .args(["context", "update", "--location", "westeurope", "--subscription", "Other"])
        .assert()
        .success();

    dsh(&dir)
        .args(["context", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("westeurope"))
        .stdout(predicate::str::contains("Other"));
}

#[test]
fn test_remove_selected_context_clears_selection() {
    let dir = TempDir::new().expect("temp dir");
    add(&dir, "Acme").success();

    dsh(&dir).args(["context", "remove", "acme"]).assert().success();

    dsh(&dir)
        .args(["context", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No context selected"));
}

#[cfg(unix)]
#[test]
fn test_contexts_file_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().expect("temp dir");
    add(&dir, "Acme").success();

    let mode = std::fs::metadata(dir.path().join("contexts.yaml"))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o600);
}

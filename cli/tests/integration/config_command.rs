//! Integration tests for `dsh config` subcommands that need no cloud access.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn dsh() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dsh"));
    cmd.env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_config_help_shows_subcommands() {
    dsh()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("show-shm"))
        .stdout(predicate::str::contains("template-sre"))
        .stdout(predicate::str::contains("upload-sre"));
}

#[test]
fn test_template_shm_prints_placeholders() {
    dsh()
        .args(["config", "template-shm"])
        .assert()
        .success()
        .stdout(predicate::str::contains("entra_tenant_id"))
        .stdout(predicate::str::contains("fqdn"));
}

#[test]
fn test_template_sre_writes_file() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("sre.yaml");

    dsh()
        .args(["config", "template-sre", "--file"])
        .arg(&path)
        .assert()
        .success();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("remote_desktop:"), "{written}");
    assert!(written.contains("Name of this SRE deployment"), "{written}");
}

#[test]
fn test_template_needs_no_context() {
    let dir = TempDir::new().expect("temp dir");
    dsh()
        .env("DSH_CONFIG_DIRECTORY", dir.path())
        .args(["config", "template-shm"])
        .assert()
        .success();
    assert!(!dir.path().join("contexts.yaml").exists());
}

#[test]
fn test_upload_rejects_invalid_document_before_contacting_azure() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("shm.yaml");
    std::fs::write(&path, "azure: [unterminated").unwrap();

    dsh()
        .env("DSH_CONFIG_DIRECTORY", dir.path())
        .args(["config", "upload-shm"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not parse SHM configuration as YAML."));
}

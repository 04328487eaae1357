//! Smoke tests for the formprobe CLI
//!
//! These run the real binary against the built-in replica.

#![allow(deprecated)] // Command::cargo_bin until assert_cmd settles its replacement
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the formprobe binary
fn formprobe() -> Command {
    let mut cmd = Command::cargo_bin("formprobe").expect("formprobe binary should exist");
    cmd.env_remove("FORMPROBE_BASE_URL")
        .env_remove("FORMPROBE_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    formprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_flag() {
    formprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    formprobe().assert().failure();
}

#[test]
fn test_run_subcommand_help() {
    formprobe()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--filter"))
        .stdout(predicate::str::contains("--junit"));
}

// ============================================================================
// list / config
// ============================================================================

#[test]
fn test_list_prints_cases_in_order() {
    let output = formprobe().arg("list").assert().success().get_output().stdout.clone();
    let text = String::from_utf8(output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.first().copied(), Some("1-checks the application title"));
    assert!(lines.iter().any(|l| l.starts_with("7.2-")));
}

#[test]
fn test_list_filter() {
    formprobe()
        .args(["list", "--filter", "6."])
        .assert()
        .success()
        .stdout(predicate::str::contains("drag-and-drop"))
        .stdout(predicate::str::contains("application title").not());
}

#[test]
fn test_config_prints_yaml() {
    formprobe()
        .args(["config", "--timeout", "2500"])
        .assert()
        .success()
        .stdout(predicate::str::contains("command_timeout_ms: 2500"))
        .stdout(predicate::str::contains("memory://csc/"));
}

#[test]
fn test_bad_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("formprobe.yaml");
    fs::write(&path, "command_timeout: 10\n").unwrap();
    formprobe()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_invalid_target_fails() {
    formprobe()
        .args(["run", "--target", "localhost"])
        .assert()
        .failure();
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_filtered_cases_pass() {
    formprobe()
        .args(["run", "--color", "never", "--filter", "3."])
        .arg("--fixtures")
        .arg(fixtures_dir())
        .assert()
        .success()
        .stdout(predicate::str::contains("3 passed, 0 failed"));
}

#[test]
fn test_run_writes_reports() {
    let dir = TempDir::new().unwrap();
    let junit = dir.path().join("junit.xml");
    let json = dir.path().join("report.json");
    formprobe()
        .args(["run", "--quiet", "--filter", "6."])
        .arg("--fixtures")
        .arg(fixtures_dir())
        .arg("--junit")
        .arg(&junit)
        .arg("--json")
        .arg(&json)
        .assert()
        .success();

    let xml = fs::read_to_string(&junit).unwrap();
    assert!(xml.contains("Customer Service Center"));
    assert!(xml.contains("drag-and-drop"));
    let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert!(report.is_object());
}

#[test]
fn test_run_reports_failure_exit_code() {
    let dir = TempDir::new().unwrap();
    formprobe()
        .current_dir(dir.path())
        .args(["run", "--color", "never", "--filter", "6.2-", "--timeout", "200"])
        .arg("--fixtures")
        .arg(dir.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("1 failed"))
        .stderr(predicate::str::contains("cases failed"));
}

#[test]
fn test_url_target_without_browser_fails() {
    if cfg!(feature = "browser") {
        return;
    }
    formprobe()
        .args(["run", "--target", "http://127.0.0.1:9/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("browser"));
}

// crates/fintrack-cli/tests/commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for the fintrack operator commands.
// Purpose: Ensure each command reports JSON and fails closed on bad state.
// Dependencies: fintrack binary, rusqlite, serde_json, tempfile
// ============================================================================
//! ## Overview
//! Runs the `fintrack` binary against stores in temporary directories with
//! the audit sink disabled so stdout carries only command output.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::OpenOptions;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use rusqlite::Connection;
use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn fintrack_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fintrack"))
}

fn write_config(dir: &TempDir, replicas: u8) -> PathBuf {
    let config_path = dir.path().join("fintrack.toml");
    let config = format!(
        "[storage]\npath = \"{}\"\nreplicas = {replicas}\n\n[audit]\nsink = \"none\"\n",
        dir.path().join("finance.sqlite").display()
    );
    fs::write(&config_path, config).expect("write config");
    config_path
}

fn fintrack(config: &Path, args: &[&str]) -> Output {
    Command::new(fintrack_bin())
        .args(args)
        .arg("--config")
        .arg(config)
        .output()
        .expect("run fintrack")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is json")
}

fn category_count(path: &Path) -> i64 {
    Connection::open(path)
        .expect("open store")
        .query_row("SELECT COUNT(*) FROM categories", [], |row| row.get(0))
        .expect("count categories")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn startup_then_health_reports_replicas() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 2);

    let startup = fintrack(&config, &["startup"]);
    assert!(startup.status.success(), "{}", String::from_utf8_lossy(&startup.stderr));
    let report = stdout_json(&startup);
    assert_eq!(report["state"], "healthy");
    assert_eq!(report["verdict"]["ok"], true);

    let health = fintrack(&config, &["health"]);
    assert!(health.status.success());
    let health = stdout_json(&health);
    assert_eq!(health["writes_blocked"], false);
    assert_eq!(health["replicas"].as_array().unwrap().len(), 2);
    assert_eq!(health["primary"]["schema_version"], 3);
}

#[test]
fn check_never_creates_missing_files() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 2);
    assert!(fintrack(&config, &["startup"]).status.success());
    assert!(fintrack(&config, &["check"]).status.success());

    let replica = dir.path().join("replicas").join("replica-2.sqlite");
    fs::remove_file(&replica).unwrap();
    let check = fintrack(&config, &["check", "--replica", "2"]);
    assert!(!check.status.success());
    assert_eq!(stdout_json(&check)["ok"], false);
    assert!(!replica.exists());
}

#[test]
fn check_rejects_unknown_slot() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 2);
    let output = fintrack(&config, &["check", "--replica", "3"]);
    assert!(!output.status.success());
}

#[test]
fn recover_promotes_requested_replica() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 2);
    assert!(fintrack(&config, &["startup"]).status.success());

    let output = fintrack(&config, &["recover", "--replica", "1"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["restored"], true);
    assert_eq!(report["replica"], 1);
}

#[test]
fn recover_from_deleted_replica_leaves_primary_alone() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 2);
    assert!(fintrack(&config, &["startup"]).status.success());
    let primary = dir.path().join("finance.sqlite");
    let replica = dir.path().join("replicas").join("replica-1.sqlite");
    assert_eq!(category_count(&primary), 8);
    fs::remove_file(&replica).unwrap();

    let output = fintrack(&config, &["recover", "--replica", "1"]);
    assert!(!output.status.success());
    assert_eq!(stdout_json(&output)["restored"], false);
    assert_eq!(category_count(&primary), 8);
    assert!(!replica.exists());

    let health = stdout_json(&fintrack(&config, &["health"]));
    assert_eq!(health["replicas"][0]["exists"], false);
    assert_eq!(health["replicas"][1]["exists"], true);
    assert!(!replica.exists());
}

#[test]
fn migrate_is_clean_on_a_fresh_store() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 1);
    let output = fintrack(&config, &["migrate"]);
    assert!(output.status.success());
    let report = stdout_json(&output);
    assert!(report["failures"].as_array().unwrap().is_empty());
    assert_eq!(report["created_tables"].as_array().unwrap().len(), 9);
}

#[test]
fn startup_fails_when_primary_is_unrecoverable() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 0);
    assert!(fintrack(&config, &["startup"]).status.success());
    let primary = dir.path().join("finance.sqlite");
    OpenOptions::new().write(true).open(&primary).unwrap().set_len(4096).unwrap();

    let output = fintrack(&config, &["startup"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("startup failed"));
}

#[test]
fn config_validate_accepts_and_rejects() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, 2);
    let output = fintrack(&config, &["config", "validate"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("config ok"));

    let invalid = dir.path().join("invalid.toml");
    fs::write(&invalid, "[storage]\nreplicas = 5\n").unwrap();
    let output = fintrack(&invalid, &["config", "validate"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid config"));
}

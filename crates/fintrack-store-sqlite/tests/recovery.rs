// crates/fintrack-store-sqlite/tests/recovery.rs
// ============================================================================
// Module: Integrity and Recovery Tests
// Description: Corruption detection and replica promotion at startup.
// Purpose: Validate verdicts, candidate order, and unrecoverable policies.
// Dependencies: fintrack-core, fintrack-store-sqlite, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Builds a populated store, closes it, damages files on disk, and reopens:
//! - integrity verdicts on healthy and truncated files
//! - promotion of the first healthy replica in slot order
//! - missing store files are never recreated and never promoted
//! - abort versus degraded handling when nothing can be promoted
//! - operator-driven restore from a named replica

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
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use fintrack_core::Expense;
use fintrack_core::NewExpense;
use fintrack_core::RecordId;
use fintrack_core::UserId;
use fintrack_store_sqlite::AuditSeverity;
use fintrack_store_sqlite::MemoryAuditSink;
use fintrack_store_sqlite::RecoveryState;
use fintrack_store_sqlite::ReplicaSlot;
use fintrack_store_sqlite::Repository;
use fintrack_store_sqlite::SqliteStoreConfig;
use fintrack_store_sqlite::StartupError;
use fintrack_store_sqlite::StorageContext;
use fintrack_store_sqlite::StoreEventKind;
use fintrack_store_sqlite::UnrecoverablePolicy;
use fintrack_store_sqlite::WriteError;
use fintrack_store_sqlite::verify_path;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_in(dir: &TempDir, replicas: u8) -> SqliteStoreConfig {
    SqliteStoreConfig::new(dir.path().join("finance.sqlite")).with_replicas(replicas)
}

fn expense(note: &str) -> NewExpense {
    NewExpense {
        user_id: UserId::new(7),
        amount: 42.50,
        date: "2024-01-15".to_string(),
        category_id: RecordId::new(1),
        where_spent: "Cafe".to_string(),
        note: note.to_string(),
        account_id: None,
    }
}

/// Starts a store, writes one expense per note, and closes every handle.
fn populate(config: &SqliteStoreConfig, notes: &[&str]) {
    let mut ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    ctx.startup().unwrap();
    let repo = Repository::<Expense>::new(&ctx);
    for note in notes {
        repo.create(&expense(note)).unwrap();
    }
}

/// Cuts a closed store file down to its first page.
fn truncate(path: &Path) {
    let file = OpenOptions::new().write(true).open(path).unwrap();
    file.set_len(4096).unwrap();
    file.sync_all().unwrap();
}

/// Overwrites a closed store file with bytes that are not a database.
fn scribble(path: &Path) {
    let mut file = OpenOptions::new().write(true).truncate(true).open(path).unwrap();
    file.write_all(&[0x5a; 8192]).unwrap();
    file.sync_all().unwrap();
}

fn notes_in(path: &Path) -> Vec<String> {
    let connection = Connection::open(path).unwrap();
    let mut stmt = connection.prepare("SELECT note FROM expenses ORDER BY id").unwrap();
    stmt.query_map([], |row| row.get(0)).unwrap().collect::<Result<Vec<_>, _>>().unwrap()
}

// ============================================================================
// SECTION: Integrity
// ============================================================================

#[test]
fn fresh_store_passes_verification() {
    let dir = TempDir::new().unwrap();
    let audit = Arc::new(MemoryAuditSink::new());
    let mut ctx = StorageContext::open(config_in(&dir, 1), audit.clone()).unwrap();
    ctx.startup().unwrap();

    let verdict = ctx.verify_integrity(None);
    assert!(verdict.ok, "{verdict:?}");
    assert!(verdict.detail.is_none());
    assert_eq!(ctx.last_verdict(), Some(verdict));
    assert!(ctx.verify_integrity(Some(ReplicaSlot::First)).ok);
    assert!(!audit.events_of(StoreEventKind::IntegrityChecked).is_empty());
}

#[test]
fn truncated_file_fails_verification() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 0);
    populate(&config, &["a", "b", "c"]);
    assert!(verify_path(&config.path, &config).ok);

    truncate(&config.path);
    assert!(!verify_path(&config.path, &config).ok);

    let ctx = StorageContext::open(config, Arc::new(MemoryAuditSink::new())).unwrap();
    let verdict = ctx.verify_integrity(None);
    assert!(!verdict.ok);
    assert!(verdict.detail.is_some());
}

#[test]
fn missing_file_fails_verification_without_creating_it() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 0);
    let absent = dir.path().join("absent.sqlite");
    assert!(!verify_path(&absent, &config).ok);
    assert!(!absent.exists());
}

// ============================================================================
// SECTION: Startup Recovery
// ============================================================================

#[test]
fn corrupted_primary_is_restored_from_first_replica() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 2);
    populate(&config, &["rent", "groceries"]);
    truncate(&config.path);

    let audit = Arc::new(MemoryAuditSink::new());
    let mut ctx = StorageContext::open(config.clone(), audit.clone()).unwrap();
    let report = ctx.startup().unwrap();

    assert!(!report.verdict.ok);
    let recovery = report.recovery.clone().unwrap();
    assert!(recovery.success);
    assert_eq!(recovery.source, Some(ReplicaSlot::First));
    assert_eq!(recovery.attempts.len(), 1);
    assert_eq!(report.state, RecoveryState::Recovered);
    assert!(report.post_recovery_migration.is_some());

    assert!(ctx.verify_integrity(None).ok);
    assert_eq!(notes_in(&config.path), vec!["rent".to_string(), "groceries".to_string()]);
    assert_eq!(audit.events_of(StoreEventKind::RecoveryCompleted).len(), 1);

    let write = Repository::<Expense>::new(&ctx).create(&expense("after")).unwrap();
    assert_eq!(write.value, RecordId::new(3));
    assert!(!ctx.writes_blocked());
}

#[test]
fn unreadable_first_replica_falls_through_to_second() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 2);
    populate(&config, &["rent"]);
    truncate(&config.path);
    scribble(&config.replica_path(ReplicaSlot::First));

    let audit = Arc::new(MemoryAuditSink::new());
    let mut ctx = StorageContext::open(config.clone(), audit.clone()).unwrap();
    let report = ctx.startup().unwrap();
    let recovery = report.recovery.unwrap();

    assert!(recovery.success);
    assert_eq!(recovery.source, Some(ReplicaSlot::Second));
    assert_eq!(recovery.attempts.len(), 2);
    assert!(recovery.attempts[0].exists);
    assert!(!recovery.attempts[0].verdict_ok);
    assert!(!recovery.attempts[0].promoted);
    assert!(recovery.attempts[1].promoted);
    assert_eq!(notes_in(&config.path), vec!["rent".to_string()]);
    assert_eq!(audit.events_of(StoreEventKind::RecoveryAttempt).len(), 2);
}

#[test]
fn missing_first_replica_falls_through_to_second() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 2);
    populate(&config, &["rent"]);
    truncate(&config.path);
    std::fs::remove_file(config.replica_path(ReplicaSlot::First)).unwrap();

    let mut ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    let recovery = ctx.startup().unwrap().recovery.unwrap();

    assert_eq!(recovery.source, Some(ReplicaSlot::Second));
    assert!(!recovery.attempts[0].exists);
    assert!(!recovery.attempts[0].promoted);
    assert_eq!(notes_in(&config.path), vec!["rent".to_string()]);
    assert!(!config.replica_path(ReplicaSlot::First).exists());
}

#[test]
fn replica_deleted_while_closed_stays_missing_on_reopen() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 2);
    populate(&config, &["rent", "groceries"]);
    std::fs::remove_file(config.replica_path(ReplicaSlot::First)).unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let ctx = StorageContext::open(config.clone(), audit.clone()).unwrap();

    assert!(!config.replica_path(ReplicaSlot::First).exists());
    let health = ctx.health();
    assert!(!health.replicas[0].exists);
    assert!(!health.replicas[0].open);
    assert!(health.replicas[1].exists);
    assert!(!health.is_fully_healthy());
    assert_eq!(audit.events_of(StoreEventKind::ReplicaOpenFailed).len(), 1);
}

#[test]
fn missing_primary_is_recovered_instead_of_recreated_empty() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 1);
    populate(&config, &["rent"]);
    std::fs::remove_file(&config.path).unwrap();

    let mut ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    let report = ctx.startup().unwrap();

    assert!(!report.verdict.ok);
    assert_eq!(report.recovery.unwrap().source, Some(ReplicaSlot::First));
    assert_eq!(report.state, RecoveryState::Recovered);
    assert_eq!(notes_in(&config.path), vec!["rent".to_string()]);
}

#[test]
fn unrecoverable_primary_aborts_by_default() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 0);
    populate(&config, &["rent"]);
    truncate(&config.path);

    let audit = Arc::new(MemoryAuditSink::new());
    let mut ctx = StorageContext::open(config, audit.clone()).unwrap();
    let err = ctx.startup().unwrap_err();

    assert!(matches!(err, StartupError::Unrecoverable { attempts: 2 }), "{err:?}");
    assert_eq!(ctx.recovery_state(), RecoveryState::Unrecoverable);
    let critical = audit.events_of(StoreEventKind::RecoveryUnrecoverable);
    assert_eq!(critical.len(), 1);
    assert_eq!(critical[0].severity, AuditSeverity::Critical);
}

#[test]
fn unrecoverable_primary_can_start_degraded() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 1).with_policy(UnrecoverablePolicy::Degraded);
    populate(&config, &["rent"]);
    truncate(&config.path);
    truncate(&config.replica_path(ReplicaSlot::First));

    let mut ctx = StorageContext::open(config, Arc::new(MemoryAuditSink::new())).unwrap();
    let report = ctx.startup().unwrap();

    assert_eq!(report.state, RecoveryState::Unrecoverable);
    assert!(!report.recovery.unwrap().success);
    assert!(ctx.writes_blocked());
    assert!(ctx.health().writes_blocked);
    let err = Repository::<Expense>::new(&ctx).create(&expense("blocked")).unwrap_err();
    assert!(matches!(err, WriteError::Unavailable(_)), "{err:?}");
}

// ============================================================================
// SECTION: Operator Restore
// ============================================================================

#[test]
fn restore_from_named_replica_replaces_primary() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 2);
    let mut ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    ctx.startup().unwrap();
    Repository::<Expense>::new(&ctx).create(&expense("replicated")).unwrap();

    assert!(ctx.restore_from_replica(ReplicaSlot::Second).unwrap());
    assert!(ctx.primary().is_open());
    assert!(ctx.verify_integrity(None).ok);
    let rows = Repository::<Expense>::new(&ctx).list_for_user(UserId::new(7)).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].note, "replicated");
}

#[test]
fn restore_after_degraded_startup_unblocks_writes() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 1).with_policy(UnrecoverablePolicy::Degraded);
    populate(&config, &["rent"]);
    let replica = config.replica_path(ReplicaSlot::First);
    let good_copy = dir.path().join("replica-1.good");
    std::fs::copy(&replica, &good_copy).unwrap();
    truncate(&config.path);
    truncate(&replica);

    let mut ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    assert_eq!(ctx.startup().unwrap().state, RecoveryState::Unrecoverable);
    assert!(ctx.writes_blocked());

    std::fs::copy(&good_copy, &replica).unwrap();
    assert!(ctx.restore_from_replica(ReplicaSlot::First).unwrap());

    assert_eq!(ctx.recovery_state(), RecoveryState::Recovered);
    assert!(!ctx.writes_blocked());
    assert!(ctx.verify_integrity(None).ok);
    Repository::<Expense>::new(&ctx).create(&expense("after restore")).unwrap();
    assert_eq!(notes_in(&config.path), vec!["rent".to_string(), "after restore".to_string()]);
}

#[test]
fn restore_from_replica_deleted_before_open_keeps_primary() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 2);
    populate(&config, &["rent", "groceries"]);
    std::fs::remove_file(config.replica_path(ReplicaSlot::First)).unwrap();

    let ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    assert!(!ctx.restore_from_replica(ReplicaSlot::First).unwrap());

    assert_eq!(notes_in(&config.path), vec!["rent".to_string(), "groceries".to_string()]);
    assert!(!config.replica_path(ReplicaSlot::First).exists());
    assert_eq!(ctx.recovery_state(), RecoveryState::Healthy);
}

#[test]
fn restore_from_missing_replica_reports_false() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 2);
    let mut ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    ctx.startup().unwrap();
    Repository::<Expense>::new(&ctx).create(&expense("kept")).unwrap();
    std::fs::remove_file(config.replica_path(ReplicaSlot::First)).unwrap();

    assert!(!ctx.restore_from_replica(ReplicaSlot::First).unwrap());
    assert_eq!(notes_in(&config.path), vec!["kept".to_string()]);
    assert!(!config.replica_path(ReplicaSlot::First).exists());
}

// crates/fintrack-store-sqlite/tests/replication.rs
// ============================================================================
// Module: Replicated Write Tests
// Description: Primary/replica fan-out, failure isolation, and atomicity.
// Purpose: Ensure the primary decides every write and replicas never block it.
// Dependencies: fintrack-core, fintrack-store-sqlite, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Drives [`StorageContext::with_replicated_write`] against real files:
//! full fan-out, a vanished replica, every replica failing, a replica with
//! schema drift, a replica missing a table, and a primary failure mid-way.

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

use std::path::Path;
use std::sync::Arc;

use fintrack_core::Expense;
use fintrack_core::Field;
use fintrack_core::Mutation;
use fintrack_core::NewExpense;
use fintrack_core::NewPfEntry;
use fintrack_core::PfEntry;
use fintrack_core::RecordId;
use fintrack_core::RecordInput;
use fintrack_core::Statement;
use fintrack_core::Table;
use fintrack_core::UserId;
use fintrack_store_sqlite::MemoryAuditSink;
use fintrack_store_sqlite::ReplicaSlot;
use fintrack_store_sqlite::ReplicationStatus;
use fintrack_store_sqlite::Repository;
use fintrack_store_sqlite::SqliteStoreConfig;
use fintrack_store_sqlite::SqliteStoreError;
use fintrack_store_sqlite::StorageContext;
use fintrack_store_sqlite::StoreEventKind;
use fintrack_store_sqlite::WriteError;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn started(dir: &TempDir, replicas: u8) -> (StorageContext, Arc<MemoryAuditSink>) {
    let config = SqliteStoreConfig::new(dir.path().join("finance.sqlite")).with_replicas(replicas);
    let audit = Arc::new(MemoryAuditSink::new());
    let mut ctx = StorageContext::open(config, audit.clone()).unwrap();
    ctx.startup().unwrap();
    (ctx, audit)
}

fn cafe_expense() -> NewExpense {
    NewExpense {
        user_id: UserId::new(7),
        amount: 42.50,
        date: "2024-01-15".to_string(),
        category_id: RecordId::new(1),
        where_spent: "Cafe".to_string(),
        note: String::new(),
        account_id: None,
    }
}

fn count(path: &Path, sql: &str) -> i64 {
    assert!(path.is_file(), "{} should exist", path.display());
    let connection = Connection::open(path).unwrap();
    connection.query_row(sql, [], |row| row.get(0)).unwrap()
}

const CAFE_ROWS: &str =
    "SELECT COUNT(*) FROM expenses WHERE amount = 42.5 AND date = '2024-01-15' \
     AND category_id = 1 AND user_id = 7 AND where_spent = 'Cafe' AND note = ''";

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn cafe_expense_reaches_primary_and_both_replicas() {
    let dir = TempDir::new().unwrap();
    let (ctx, _audit) = started(&dir, 2);

    let write = Repository::<Expense>::new(&ctx).create(&cafe_expense()).unwrap();
    assert_eq!(write.status(), ReplicationStatus::FullyReplicated);
    assert!(write.replication.warning.is_none());

    let config = ctx.config().clone();
    assert_eq!(count(&config.path, CAFE_ROWS), 1);
    assert_eq!(count(&config.replica_path(ReplicaSlot::First), CAFE_ROWS), 1);
    assert_eq!(count(&config.replica_path(ReplicaSlot::Second), CAFE_ROWS), 1);

    let stored = Repository::<Expense>::new(&ctx).get(write.value).unwrap().unwrap();
    assert_eq!(stored.where_spent, "Cafe");
    assert!(!stored.created_at.is_empty());
}

#[test]
fn deleted_replica_is_skipped_and_not_recreated() {
    let dir = TempDir::new().unwrap();
    let (ctx, audit) = started(&dir, 2);
    let second = ctx.config().replica_path(ReplicaSlot::Second);
    std::fs::remove_file(&second).unwrap();

    let write = Repository::<Expense>::new(&ctx).create(&cafe_expense()).unwrap();
    assert_eq!(write.status(), ReplicationStatus::PartiallyReplicated);
    assert_eq!(write.replication.applied, vec![ReplicaSlot::First]);
    assert_eq!(write.replication.failures.len(), 1);
    assert_eq!(write.replication.failures[0].replica, ReplicaSlot::Second);
    assert!(write.replication.failures[0].detail.contains("missing"));

    let primary_row = Repository::<Expense>::new(&ctx).get(write.value).unwrap().unwrap();
    assert_eq!(primary_row.amount, 42.50);
    assert_eq!(count(&ctx.config().path, CAFE_ROWS), 1);
    assert_eq!(count(&ctx.config().replica_path(ReplicaSlot::First), CAFE_ROWS), 1);
    assert!(!second.exists());

    assert_eq!(audit.events_of(StoreEventKind::ReplicaWriteFailed).len(), 1);
    assert!(audit.events_of(StoreEventKind::BackupWriteFailed).is_empty());
    let health = ctx.health();
    assert!(!health.replicas[1].exists);
    assert_eq!(health.replicas[1].writes_failed, 1);
    assert!(!health.is_fully_healthy());
}

#[test]
fn every_replica_failing_raises_one_backup_warning() {
    let dir = TempDir::new().unwrap();
    let (ctx, audit) = started(&dir, 2);
    for slot in ReplicaSlot::ALL {
        std::fs::remove_file(ctx.config().replica_path(slot)).unwrap();
    }

    let write = Repository::<Expense>::new(&ctx).create(&cafe_expense()).unwrap();
    assert_eq!(write.status(), ReplicationStatus::PrimaryOnly);
    let warning = write.replication.warning.clone().unwrap();
    assert_eq!(warning.failures.len(), 2);
    assert_eq!(count(&ctx.config().path, CAFE_ROWS), 1);
    assert_eq!(audit.events_of(StoreEventKind::ReplicaWriteFailed).len(), 2);
    assert_eq!(audit.events_of(StoreEventKind::BackupWriteFailed).len(), 1);
}

#[test]
fn zero_replicas_is_primary_only_mode() {
    let dir = TempDir::new().unwrap();
    let (ctx, _audit) = started(&dir, 0);
    let write = Repository::<Expense>::new(&ctx).create(&cafe_expense()).unwrap();
    assert_eq!(write.status(), ReplicationStatus::NoReplicas);
    assert!(write.replication.warning.is_none());
    assert!(!ctx.config().replica_dir().exists());
    assert_eq!(count(&ctx.config().path, CAFE_ROWS), 1);
}

#[test]
fn failing_statement_leaves_no_partial_effect() {
    let dir = TempDir::new().unwrap();
    let (ctx, _audit) = started(&dir, 1);
    let before = count(&ctx.config().path, "SELECT COUNT(*) FROM expenses");
    let replica_writes = ctx.health().replicas[0].writes_ok;

    let mut fields = cafe_expense().fields();
    fields.push(Field::new("created_at", "2024-01-15T00:00:00Z"));
    let mutation = Mutation::single(Statement::insert(Table::Expenses, fields))
        .then(Statement::insert(Table::Expenses, vec![Field::new("user_id", 7_i64)]));
    let err = ctx.with_replicated_write(&mutation).unwrap_err();
    assert!(matches!(err, WriteError::Primary(SqliteStoreError::Constraint(_))), "{err:?}");

    assert_eq!(count(&ctx.config().path, "SELECT COUNT(*) FROM expenses"), before);
    let replica = ctx.config().replica_path(ReplicaSlot::First);
    assert_eq!(count(&replica, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'expenses'"), 0);
    assert_eq!(ctx.health().replicas[0].writes_ok, replica_writes);
    assert_eq!(ctx.health().replicas[0].writes_failed, 0);
}

#[test]
fn replica_missing_a_table_gets_it_created() {
    let dir = TempDir::new().unwrap();
    let (ctx, _audit) = started(&dir, 1);
    let replica = ctx.config().replica_path(ReplicaSlot::First);
    assert_eq!(count(&replica, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'pf_entries'"), 0);

    let entry = NewPfEntry {
        user_id: UserId::new(7),
        entry_date: "2024-03-31".to_string(),
        employee_contribution: 1800.0,
        employer_contribution: 1800.0,
        interest: 0.0,
        note: String::new(),
    };
    let write = Repository::<PfEntry>::new(&ctx).create(&entry).unwrap();
    assert_eq!(write.status(), ReplicationStatus::FullyReplicated);
    assert_eq!(count(&replica, "SELECT COUNT(*) FROM pf_entries WHERE user_id = 7"), 1);
}

#[test]
fn replica_schema_drift_is_a_per_replica_failure() {
    let dir = TempDir::new().unwrap();
    let (ctx, _audit) = started(&dir, 2);
    let drifted = ctx.config().replica_path(ReplicaSlot::First);
    Connection::open(&drifted)
        .unwrap()
        .execute_batch(
            "CREATE TABLE expenses (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                amount REAL NOT NULL,
                date TEXT NOT NULL,
                category_id INTEGER NOT NULL
            )",
        )
        .unwrap();

    let write = Repository::<Expense>::new(&ctx).create(&cafe_expense()).unwrap();
    assert_eq!(write.status(), ReplicationStatus::PartiallyReplicated);
    assert_eq!(write.replication.applied, vec![ReplicaSlot::Second]);
    assert!(write.replication.failures[0].detail.contains("where_spent"));

    let health = ctx.health();
    assert_eq!(health.replicas[0].writes_failed, 1);
    assert!(health.replicas[0].last_error.clone().unwrap().contains("where_spent"));
    assert_eq!(count(&drifted, "SELECT COUNT(*) FROM expenses"), 0);
}

// crates/fintrack-store-sqlite/tests/migration.rs
// ============================================================================
// Module: Schema Migration Tests
// Description: Idempotent schema ensure, legacy patching, and seeding.
// Purpose: Keep old store files readable by adding columns in place.
// Dependencies: fintrack-core, fintrack-store-sqlite, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Runs [`ensure_schema`] against fresh stores, legacy table shapes, and
//! stores from a newer build.

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

use fintrack_core::Account;
use fintrack_core::Category;
use fintrack_core::Expense;
use fintrack_core::IncomeCategory;
use fintrack_core::UserId;
use fintrack_store_sqlite::MemoryAuditSink;
use fintrack_store_sqlite::ReplicaSlot;
use fintrack_store_sqlite::Repository;
use fintrack_store_sqlite::SCHEMA_VERSION;
use fintrack_store_sqlite::SqliteStoreConfig;
use fintrack_store_sqlite::StorageContext;
use fintrack_store_sqlite::StoreEventKind;
use fintrack_store_sqlite::ensure_schema;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn config_in(dir: &TempDir, replicas: u8) -> SqliteStoreConfig {
    SqliteStoreConfig::new(dir.path().join("finance.sqlite")).with_replicas(replicas)
}

fn columns(path: &Path, table: &str) -> Vec<String> {
    let connection = Connection::open(path).unwrap();
    let mut stmt = connection.prepare(&format!("PRAGMA table_info({table})")).unwrap();
    stmt.query_map([], |row| row.get(1)).unwrap().collect::<Result<Vec<_>, _>>().unwrap()
}

fn scalar(path: &Path, sql: &str) -> i64 {
    Connection::open(path).unwrap().query_row(sql, [], |row| row.get(0)).unwrap()
}

fn write_legacy_store(path: &Path) {
    let connection = Connection::open(path).unwrap();
    connection
        .execute_batch(
            "CREATE TABLE categories (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL);
             INSERT INTO categories (name) VALUES ('Food');
             CREATE TABLE expenses (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 user_id INTEGER NOT NULL,
                 amount REAL NOT NULL,
                 date TEXT NOT NULL,
                 category_id INTEGER NOT NULL
             );
             INSERT INTO expenses (user_id, amount, date, category_id)
                 VALUES (7, 12.0, '2023-12-01', 1), (9, 3.5, '2023-12-02', 1), (7, 8.0, '2023-12-03', 1);",
        )
        .unwrap();
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn fresh_store_gets_every_table_and_defaults() {
    let dir = TempDir::new().unwrap();
    let mut ctx = StorageContext::open(config_in(&dir, 0), Arc::new(MemoryAuditSink::new())).unwrap();
    let report = ctx.startup().unwrap().migration;

    assert!(report.is_clean(), "{report:?}");
    assert_eq!(report.created_tables.len(), 9);
    assert!(report.added_columns.is_empty());
    assert_eq!(report.seeded, vec!["categories".to_string(), "income_categories".to_string()]);

    let path = ctx.config().path.clone();
    assert_eq!(scalar(&path, "PRAGMA user_version"), SCHEMA_VERSION);
    let categories = Repository::<Category>::new(&ctx).list_visible(UserId::new(1)).unwrap();
    assert_eq!(categories.len(), 8);
    assert!(categories.iter().all(|category| category.user_id.is_none()));
    let incomes = Repository::<IncomeCategory>::new(&ctx).list_visible(UserId::new(1)).unwrap();
    assert_eq!(incomes.len(), 5);
}

#[test]
fn second_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let audit = Arc::new(MemoryAuditSink::new());
    let mut ctx = StorageContext::open(config_in(&dir, 2), audit.clone()).unwrap();
    ctx.startup().unwrap();
    let path = ctx.config().path.clone();
    let before = columns(&path, "expenses");

    let again = ensure_schema(&ctx);
    assert!(again.is_clean(), "{again:?}");
    assert!(again.created_tables.is_empty());
    assert!(again.added_columns.is_empty());
    assert!(again.seeded.is_empty());
    assert_eq!(columns(&path, "expenses"), before);
    assert_eq!(scalar(&path, "SELECT COUNT(*) FROM categories"), 8);
    assert_eq!(audit.events_of(StoreEventKind::SchemaEnsured).len(), 2);
}

#[test]
fn legacy_tables_are_patched_and_linked_to_default_accounts() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 0);
    write_legacy_store(&config.path);

    let mut ctx = StorageContext::open(config.clone(), Arc::new(MemoryAuditSink::new())).unwrap();
    let report = ctx.startup().unwrap().migration;
    assert!(report.is_clean(), "{report:?}");

    let added: Vec<(&str, &str)> =
        report.added_columns.iter().map(|added| (added.table, added.column)).collect();
    for expected in [
        ("categories", "icon"),
        ("categories", "user_id"),
        ("expenses", "where_spent"),
        ("expenses", "note"),
        ("expenses", "account_id"),
        ("expenses", "created_at"),
    ] {
        assert!(added.contains(&expected), "missing {expected:?} in {added:?}");
    }
    assert!(!report.created_tables.contains(&"expenses"));
    assert!(report.created_tables.contains(&"accounts"));
    assert!(!report.seeded.contains(&"categories".to_string()));
    assert!(report.seeded.contains(&"accounts".to_string()));

    assert_eq!(scalar(&config.path, "SELECT COUNT(*) FROM categories"), 1);
    assert_eq!(scalar(&config.path, "SELECT COUNT(*) FROM accounts WHERE name = 'Cash'"), 2);
    assert_eq!(scalar(&config.path, "SELECT COUNT(*) FROM expenses WHERE account_id IS NULL"), 0);

    let account =
        Repository::<Account>::new(&ctx).default_for_user(UserId::new(7)).unwrap().unwrap();
    assert!(account.is_default);
    assert_eq!(account.name, "Cash");
    let expenses = Repository::<Expense>::new(&ctx).list_for_user(UserId::new(7)).unwrap();
    assert_eq!(expenses.len(), 2);
    assert!(expenses.iter().all(|expense| expense.account_id == Some(account.id)));
    assert!(expenses.iter().all(|expense| expense.where_spent.is_empty()));
}

#[test]
fn replicas_get_existing_tables_patched_but_none_created() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 1);
    let replica = config.replica_path(ReplicaSlot::First);
    std::fs::create_dir_all(config.replica_dir()).unwrap();
    Connection::open(&replica)
        .unwrap()
        .execute_batch("CREATE TABLE categories (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL)")
        .unwrap();

    let mut ctx = StorageContext::open(config, Arc::new(MemoryAuditSink::new())).unwrap();
    let report = ctx.startup().unwrap().migration;
    assert!(report.is_clean(), "{report:?}");
    assert!(
        report
            .added_columns
            .iter()
            .any(|added| added.store == "replica-1" && added.column == "icon")
    );

    assert!(columns(&replica, "categories").contains(&"icon".to_string()));
    assert_eq!(scalar(&replica, "SELECT COUNT(*) FROM categories"), 8);
    assert_eq!(
        scalar(&replica, "SELECT COUNT(*) FROM sqlite_master WHERE name = 'pf_entries'"),
        0
    );
}

#[test]
fn store_from_newer_build_is_left_alone() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir, 0);
    Connection::open(&config.path).unwrap().execute_batch("PRAGMA user_version = 99").unwrap();

    let audit = Arc::new(MemoryAuditSink::new());
    let mut ctx = StorageContext::open(config.clone(), audit.clone()).unwrap();
    let report = ctx.startup().unwrap().migration;

    assert!(!report.is_clean());
    assert_eq!(report.failures[0].store, "primary");
    assert!(report.seeded.is_empty());
    assert_eq!(scalar(&config.path, "PRAGMA user_version"), 99);
    assert_eq!(
        scalar(&config.path, "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'"),
        0
    );
    assert!(!audit.events_of(StoreEventKind::MigrationStepFailed).is_empty());
}

// crates/fintrack-store-sqlite/src/migration.rs
// ============================================================================
// Module: Migration Runner
// Description: Idempotent schema creation, additive column patches, seeding.
// Purpose: Bring every store to the current schema without ever dropping data.
// Dependencies: fintrack-core, rusqlite, serde, time
// ============================================================================

//! ## Overview
//! [`ensure_schema`] creates every table on the primary, adds columns that
//! older stores lack, and stamps `PRAGMA user_version`. Replicas only have
//! their existing tables patched; tables a replica has never seen are
//! created by the write coordinator the first time a write touches them.
//! Default data is then seeded through the replicated write path so replicas
//! receive it too.
//!
//! ## Invariants
//! - Nothing is dropped or renamed.
//! - A failing step is recorded and the run continues.
//! - Running twice is a no-op the second time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use fintrack_core::Field;
use fintrack_core::Mutation;
use fintrack_core::SqlValue;
use fintrack_core::Statement;
use fintrack_core::Table;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Serialize;

use crate::audit::AuditSeverity;
use crate::audit::StoreAuditEvent;
use crate::audit::StoreEventKind;
use crate::context::StorageContext;
use crate::error::SqliteStoreError;
use crate::handle::StoreHandle;
use crate::schema::SCHEMA_VERSION;
use crate::schema::TABLES;
use crate::schema::TableSchema;

// ============================================================================
// SECTION: Seed Data
// ============================================================================

/// Default expense categories as `(name, icon)`.
pub const DEFAULT_CATEGORIES: [(&str, &str); 8] = [
    ("Food", "utensils"),
    ("Transport", "car"),
    ("Shopping", "bag"),
    ("Bills", "receipt"),
    ("Entertainment", "film"),
    ("Health", "heart"),
    ("Education", "book"),
    ("Other", "dots"),
];

/// Default income categories as `(name, icon)`.
pub const DEFAULT_INCOME_CATEGORIES: [(&str, &str); 5] = [
    ("Salary", "briefcase"),
    ("Freelance", "laptop"),
    ("Business", "store"),
    ("Investments", "chart"),
    ("Other", "dots"),
];

/// Name of the account created for users with unlinked transactions.
pub const DEFAULT_ACCOUNT_NAME: &str = "Cash";

/// Creates one default account per user owning unlinked rows.
const INSERT_DEFAULT_ACCOUNTS: &str = "INSERT INTO accounts \
     (user_id, name, account_type, balance, is_default, created_at) \
     SELECT user_id, ?1, 'cash', 0, 1, ?2 FROM ( \
         SELECT user_id FROM expenses WHERE account_id IS NULL \
         UNION SELECT user_id FROM incomes WHERE account_id IS NULL \
     ) ORDER BY user_id";

/// Links unlinked expenses to their owner's default account.
const LINK_EXPENSES: &str = "UPDATE expenses SET account_id = ( \
     SELECT a.id FROM accounts a \
     WHERE a.user_id = expenses.user_id AND a.is_default = 1 ORDER BY a.id LIMIT 1 \
     ) WHERE account_id IS NULL";

/// Links unlinked incomes to their owner's default account.
const LINK_INCOMES: &str = "UPDATE incomes SET account_id = ( \
     SELECT a.id FROM accounts a \
     WHERE a.user_id = incomes.user_id AND a.is_default = 1 ORDER BY a.id LIMIT 1 \
     ) WHERE account_id IS NULL";

// ============================================================================
// SECTION: Report
// ============================================================================

/// A column added to a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedColumn {
    /// Store label (`primary`, `replica-1`, ...).
    pub store: String,
    /// Table name.
    pub table: &'static str,
    /// Column name.
    pub column: &'static str,
}

/// A migration step that failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationFailure {
    /// Store label, or `replicated` for seeding steps.
    pub store: String,
    /// Step name.
    pub step: String,
    /// Failure detail.
    pub detail: String,
}

/// Result of one [`ensure_schema`] run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct MigrationReport {
    /// Tables created on the primary.
    pub created_tables: Vec<&'static str>,
    /// Columns added on any store.
    pub added_columns: Vec<AddedColumn>,
    /// Seeding steps that wrote rows.
    pub seeded: Vec<String>,
    /// Steps that failed.
    pub failures: Vec<MigrationFailure>,
}

impl MigrationReport {
    /// Returns true when no step failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Records a failed step.
    fn fail(&mut self, store: impl Into<String>, step: impl Into<String>, err: &impl ToString) {
        self.failures.push(MigrationFailure {
            store: store.into(),
            step: step.into(),
            detail: err.to_string(),
        });
    }
}

// ============================================================================
// SECTION: Runner
// ============================================================================

/// Ensures schema shape on every store, then seeds default data.
#[must_use]
pub fn ensure_schema(ctx: &StorageContext) -> MigrationReport {
    let mut report = MigrationReport::default();

    let primary_ok = ensure_store(ctx.primary(), true, &mut report);
    for replica in ctx.replicas().iter() {
        if replica.handle().is_open() {
            ensure_store(replica.handle(), false, &mut report);
        }
    }
    if primary_ok {
        seed_categories(ctx, Table::Categories, &DEFAULT_CATEGORIES, &mut report);
        seed_categories(ctx, Table::IncomeCategories, &DEFAULT_INCOME_CATEGORIES, &mut report);
        seed_default_accounts(ctx, &mut report);
    }

    for failure in &report.failures {
        ctx.record(
            &StoreAuditEvent::new(StoreEventKind::MigrationStepFailed, AuditSeverity::Error)
                .with_detail(format!("{} {}: {}", failure.store, failure.step, failure.detail)),
        );
    }
    ctx.record(
        &StoreAuditEvent::new(StoreEventKind::SchemaEnsured, AuditSeverity::Info)
            .with_store(ctx.primary().role(), ctx.primary().path())
            .with_detail(format!(
                "version {SCHEMA_VERSION}: {} tables created, {} columns added, {} failures",
                report.created_tables.len(),
                report.added_columns.len(),
                report.failures.len()
            )),
    );
    report
}

/// Ensures one store; returns false when any structural step failed.
///
/// The primary gets every table; replicas only get existing tables patched.
fn ensure_store(handle: &StoreHandle, create_missing: bool, report: &mut MigrationReport) -> bool {
    let store = handle.role().to_string();
    let before = report.failures.len();
    let result = handle.with_writer(|connection| {
        let version = schema_version(connection)?;
        if version > SCHEMA_VERSION {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "store is at version {version}, this build supports {SCHEMA_VERSION}"
            )));
        }
        for schema in &TABLES {
            if let Err(err) = ensure_table(connection, schema, create_missing, &store, report) {
                report.fail(store.as_str(), format!("ensure {}", schema.table), &err);
            }
        }
        connection
            .pragma_update(None, "user_version", SCHEMA_VERSION)
            .map_err(|err| SqliteStoreError::from_db(&err))
    });
    if let Err(err) = result {
        report.fail(store.as_str(), "open store", &err);
    }
    report.failures.len() == before
}

/// Creates (when allowed), patches, and indexes one table.
fn ensure_table(
    connection: &Connection,
    schema: &TableSchema,
    create_missing: bool,
    store: &str,
    report: &mut MigrationReport,
) -> Result<(), SqliteStoreError> {
    let name = schema.table.as_str();
    if !table_exists(connection, name)? {
        if !create_missing {
            return Ok(());
        }
        connection.execute_batch(schema.create_sql).map_err(|err| SqliteStoreError::from_db(&err))?;
        report.created_tables.push(name);
    }
    let columns = existing_columns(connection, name)?;
    for patch in schema.patches {
        if columns.contains(patch.column) {
            continue;
        }
        connection
            .execute_batch(&format!(
                "ALTER TABLE {name} ADD COLUMN {} {}",
                patch.column, patch.definition
            ))
            .map_err(|err| SqliteStoreError::from_db(&err))?;
        report.added_columns.push(AddedColumn {
            store: store.to_string(),
            table: name,
            column: patch.column,
        });
    }
    for index in schema.indexes {
        connection.execute_batch(index).map_err(|err| SqliteStoreError::from_db(&err))?;
    }
    Ok(())
}

/// Reads `PRAGMA user_version`.
fn schema_version(connection: &Connection) -> Result<i64, SqliteStoreError> {
    connection
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|err| SqliteStoreError::from_db(&err))
}

/// Returns true when `table` exists.
pub(crate) fn table_exists(connection: &Connection, table: &str) -> Result<bool, SqliteStoreError> {
    connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()
        .map(|found| found.is_some())
        .map_err(|err| SqliteStoreError::from_db(&err))
}

/// Returns the column names of `table` per `PRAGMA table_info`.
pub(crate) fn existing_columns(
    connection: &Connection,
    table: &str,
) -> Result<BTreeSet<String>, SqliteStoreError> {
    let mut stmt = connection
        .prepare(&format!("PRAGMA table_info({table})"))
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    rows.collect::<Result<BTreeSet<_>, _>>().map_err(|err| SqliteStoreError::from_db(&err))
}

// ============================================================================
// SECTION: Seeding
// ============================================================================

/// Counts rows on the primary with `sql`.
fn primary_count(ctx: &StorageContext, sql: &str) -> Result<i64, SqliteStoreError> {
    ctx.primary().with_reader(|connection| {
        connection.query_row(sql, [], |row| row.get(0)).map_err(|err| SqliteStoreError::from_db(&err))
    })
}

/// Inserts default categories when the table is empty.
fn seed_categories(
    ctx: &StorageContext,
    table: Table,
    defaults: &[(&str, &str)],
    report: &mut MigrationReport,
) {
    let step = format!("seed {table}");
    match primary_count(ctx, &format!("SELECT COUNT(*) FROM {table}")) {
        Ok(0) => {}
        Ok(_) => return,
        Err(err) => {
            report.fail("primary", step, &err);
            return;
        }
    }
    let mutation = defaults.iter().fold(Mutation::new(), |mutation, (name, icon)| {
        mutation.then(Statement::insert(
            table,
            vec![
                Field::new("name", *name),
                Field::new("icon", *icon),
                Field::new("user_id", SqlValue::Null),
            ],
        ))
    });
    match ctx.with_replicated_write(&mutation) {
        Ok(_) => report.seeded.push(table.as_str().to_string()),
        Err(err) => report.fail("replicated", step, &err),
    }
}

/// Creates a default account for users with unlinked rows, then links them.
///
/// Runs only while the accounts table is empty.
fn seed_default_accounts(ctx: &StorageContext, report: &mut MigrationReport) {
    let step = "seed default accounts";
    let accounts = primary_count(ctx, "SELECT COUNT(*) FROM accounts");
    let unlinked = primary_count(
        ctx,
        "SELECT (SELECT COUNT(*) FROM expenses WHERE account_id IS NULL) \
         + (SELECT COUNT(*) FROM incomes WHERE account_id IS NULL)",
    );
    match (accounts, unlinked) {
        (Ok(0), Ok(unlinked)) if unlinked > 0 => {}
        (Ok(_), Ok(_)) => return,
        (Err(err), _) | (_, Err(err)) => {
            report.fail("primary", step, &err);
            return;
        }
    }
    let created_at = crate::repository::now_timestamp();
    let mutation = Mutation::single(Statement::Sql {
        table: Table::Accounts,
        sql: INSERT_DEFAULT_ACCOUNTS,
        params: vec![SqlValue::from(DEFAULT_ACCOUNT_NAME), SqlValue::from(created_at)],
    })
    .then(Statement::Sql {
        table: Table::Expenses,
        sql: LINK_EXPENSES,
        params: Vec::new(),
    })
    .then(Statement::Sql {
        table: Table::Incomes,
        sql: LINK_INCOMES,
        params: Vec::new(),
    });
    match ctx.with_replicated_write(&mutation) {
        Ok(_) => report.seeded.push("accounts".to_string()),
        Err(err) => report.fail("replicated", step, &err),
    }
}

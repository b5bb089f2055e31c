// crates/fintrack-store-sqlite/src/schema.rs
// ============================================================================
// Module: Canonical Schema
// Description: DDL, indexes, and additive column patches for every table.
// Purpose: Single source of table shape for migrations and replica catch-up.
// Dependencies: fintrack-core
// ============================================================================

//! ## Overview
//! Each [`TableSchema`] carries the `CREATE TABLE IF NOT EXISTS` text used by
//! both the migration runner and the replicated write coordinator, plus the
//! columns added after the table first shipped. Patches are always additive
//! with a constant default so `ALTER TABLE ... ADD COLUMN` succeeds on
//! populated tables.

// ============================================================================
// SECTION: Imports
// ============================================================================

use fintrack_core::Table;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Current schema version written to `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 3;

/// A column added after the table's first release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnPatch {
    /// Column name.
    pub column: &'static str,
    /// Column definition after the name (type, constraints, default).
    pub definition: &'static str,
}

/// Canonical shape of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table.
    pub table: Table,
    /// `CREATE TABLE IF NOT EXISTS` statement.
    pub create_sql: &'static str,
    /// Columns that older stores may lack.
    pub patches: &'static [ColumnPatch],
    /// `CREATE INDEX IF NOT EXISTS` statements.
    pub indexes: &'static [&'static str],
}

/// Shorthand for a patch entry.
const fn patch(column: &'static str, definition: &'static str) -> ColumnPatch {
    ColumnPatch {
        column,
        definition,
    }
}

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Every table in creation order.
pub static TABLES: [TableSchema; 9] = [
    TableSchema {
        table: Table::Users,
        create_sql: "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT ''
        )",
        patches: &[patch("created_at", "TEXT NOT NULL DEFAULT ''")],
        indexes: &[],
    },
    TableSchema {
        table: Table::Categories,
        create_sql: "CREATE TABLE IF NOT EXISTS categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            icon TEXT NOT NULL DEFAULT '',
            user_id INTEGER
        )",
        patches: &[patch("icon", "TEXT NOT NULL DEFAULT ''"), patch("user_id", "INTEGER")],
        indexes: &["CREATE INDEX IF NOT EXISTS idx_categories_user ON categories (user_id)"],
    },
    TableSchema {
        table: Table::IncomeCategories,
        create_sql: "CREATE TABLE IF NOT EXISTS income_categories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            icon TEXT NOT NULL DEFAULT '',
            user_id INTEGER
        )",
        patches: &[patch("icon", "TEXT NOT NULL DEFAULT ''"), patch("user_id", "INTEGER")],
        indexes: &[
            "CREATE INDEX IF NOT EXISTS idx_income_categories_user ON income_categories (user_id)",
        ],
    },
    TableSchema {
        table: Table::Accounts,
        create_sql: "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            account_type TEXT NOT NULL DEFAULT 'cash',
            balance REAL NOT NULL DEFAULT 0,
            is_default INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT ''
        )",
        patches: &[
            patch("is_default", "INTEGER NOT NULL DEFAULT 0"),
            patch("created_at", "TEXT NOT NULL DEFAULT ''"),
        ],
        indexes: &["CREATE INDEX IF NOT EXISTS idx_accounts_user ON accounts (user_id)"],
    },
    TableSchema {
        table: Table::Expenses,
        create_sql: "CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            where_spent TEXT NOT NULL DEFAULT '',
            note TEXT NOT NULL DEFAULT '',
            account_id INTEGER,
            created_at TEXT NOT NULL DEFAULT ''
        )",
        patches: &[
            patch("where_spent", "TEXT NOT NULL DEFAULT ''"),
            patch("note", "TEXT NOT NULL DEFAULT ''"),
            patch("account_id", "INTEGER"),
            patch("created_at", "TEXT NOT NULL DEFAULT ''"),
        ],
        indexes: &["CREATE INDEX IF NOT EXISTS idx_expenses_user_date ON expenses (user_id, date)"],
    },
    TableSchema {
        table: Table::Incomes,
        create_sql: "CREATE TABLE IF NOT EXISTS incomes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            amount REAL NOT NULL,
            date TEXT NOT NULL,
            category_id INTEGER NOT NULL,
            source TEXT NOT NULL DEFAULT '',
            note TEXT NOT NULL DEFAULT '',
            account_id INTEGER,
            created_at TEXT NOT NULL DEFAULT ''
        )",
        patches: &[
            patch("source", "TEXT NOT NULL DEFAULT ''"),
            patch("note", "TEXT NOT NULL DEFAULT ''"),
            patch("account_id", "INTEGER"),
            patch("created_at", "TEXT NOT NULL DEFAULT ''"),
        ],
        indexes: &["CREATE INDEX IF NOT EXISTS idx_incomes_user_date ON incomes (user_id, date)"],
    },
    TableSchema {
        table: Table::Investments,
        create_sql: "CREATE TABLE IF NOT EXISTS investments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            investment_type TEXT NOT NULL DEFAULT 'other',
            symbol TEXT NOT NULL DEFAULT '',
            units REAL NOT NULL DEFAULT 0,
            invested_amount REAL NOT NULL DEFAULT 0,
            current_value REAL NOT NULL DEFAULT 0,
            purchase_date TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT ''
        )",
        patches: &[
            patch("symbol", "TEXT NOT NULL DEFAULT ''"),
            patch("units", "REAL NOT NULL DEFAULT 0"),
            patch("note", "TEXT NOT NULL DEFAULT ''"),
        ],
        indexes: &["CREATE INDEX IF NOT EXISTS idx_investments_user ON investments (user_id)"],
    },
    TableSchema {
        table: Table::FixedDeposits,
        create_sql: "CREATE TABLE IF NOT EXISTS fixed_deposits (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            bank_name TEXT NOT NULL,
            principal REAL NOT NULL,
            interest_rate REAL NOT NULL,
            start_date TEXT NOT NULL,
            maturity_date TEXT NOT NULL,
            compounding TEXT NOT NULL DEFAULT 'quarterly',
            note TEXT NOT NULL DEFAULT ''
        )",
        patches: &[
            patch("compounding", "TEXT NOT NULL DEFAULT 'quarterly'"),
            patch("note", "TEXT NOT NULL DEFAULT ''"),
        ],
        indexes: &["CREATE INDEX IF NOT EXISTS idx_fixed_deposits_user ON fixed_deposits (user_id)"],
    },
    TableSchema {
        table: Table::PfEntries,
        create_sql: "CREATE TABLE IF NOT EXISTS pf_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            entry_date TEXT NOT NULL,
            employee_contribution REAL NOT NULL DEFAULT 0,
            employer_contribution REAL NOT NULL DEFAULT 0,
            interest REAL NOT NULL DEFAULT 0,
            note TEXT NOT NULL DEFAULT ''
        )",
        patches: &[
            patch("interest", "REAL NOT NULL DEFAULT 0"),
            patch("note", "TEXT NOT NULL DEFAULT ''"),
        ],
        indexes: &["CREATE INDEX IF NOT EXISTS idx_pf_entries_user ON pf_entries (user_id)"],
    },
];

/// Returns the canonical schema for a table.
#[must_use]
pub fn schema_for(table: Table) -> &'static TableSchema {
    // TABLES covers every variant of Table in declaration order.
    let index = Table::ALL.iter().position(|candidate| *candidate == table).unwrap_or(0);
    &TABLES[index]
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_align_with_table_enum() {
        for (schema, table) in TABLES.iter().zip(Table::ALL) {
            assert_eq!(schema.table, table);
            assert_eq!(schema_for(table).table, table);
            let prefix = format!("CREATE TABLE IF NOT EXISTS {} (", table.as_str());
            assert!(schema.create_sql.starts_with(&prefix), "{}", table);
        }
    }

    #[test]
    fn patched_columns_appear_in_create_sql() {
        for schema in &TABLES {
            for patch in schema.patches {
                assert!(
                    schema.create_sql.contains(&format!("{} {}", patch.column, patch.definition)),
                    "{}.{}",
                    schema.table,
                    patch.column
                );
            }
        }
    }
}

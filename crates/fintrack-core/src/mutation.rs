// crates/fintrack-core/src/mutation.rs
// ============================================================================
// Module: Fintrack Mutation Model
// Description: Replayable write commands interpreted identically by every store.
// Purpose: Describe one logical write as data rather than as a closure.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Mutation`] is an ordered list of [`Statement`] values that must apply
//! atomically to one store and be reproduced verbatim against every other
//! store. Statements never embed identifiers generated by another store:
//! when a write needs a store-generated key it either uses a caller-supplied
//! filter value that is stable across stores, or a [`Statement::Sql`]
//! sub-select evaluated locally by each store.
//!
//! ## Invariants
//! - Update and delete statements always carry a non-empty [`Filter`].
//! - Column names are `'static` compile-time strings; storage backends still
//!   validate them as identifiers before building SQL.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Tables
// ============================================================================

/// Domain tables managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Application users.
    Users,
    /// Expense categories.
    Categories,
    /// Income categories.
    IncomeCategories,
    /// Money accounts (cash, bank, cards).
    Accounts,
    /// Expense rows.
    Expenses,
    /// Income rows.
    Incomes,
    /// Investment holdings.
    Investments,
    /// Fixed deposits.
    FixedDeposits,
    /// Provident-fund entries.
    PfEntries,
}

impl Table {
    /// Every table, in creation order.
    pub const ALL: [Self; 9] = [
        Self::Users,
        Self::Categories,
        Self::IncomeCategories,
        Self::Accounts,
        Self::Expenses,
        Self::Incomes,
        Self::Investments,
        Self::FixedDeposits,
        Self::PfEntries,
    ];

    /// Returns the SQL table name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Categories => "categories",
            Self::IncomeCategories => "income_categories",
            Self::Accounts => "accounts",
            Self::Expenses => "expenses",
            Self::Incomes => "incomes",
            Self::Investments => "investments",
            Self::FixedDeposits => "fixed_deposits",
            Self::PfEntries => "pf_entries",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Values
// ============================================================================

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlValue {
    /// SQL `NULL`.
    Null,
    /// 64-bit integer.
    Integer(i64),
    /// 64-bit float.
    Real(f64),
    /// UTF-8 text.
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A `column = value` pair used for inserts, updates, and filters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Column name.
    pub column: &'static str,
    /// Bound value.
    pub value: SqlValue,
}

impl Field {
    /// Creates a field from any value convertible to [`SqlValue`].
    #[must_use]
    pub fn new(column: &'static str, value: impl Into<SqlValue>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

/// Conjunction of column equalities selecting the rows a statement touches.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Filter {
    /// Equalities joined with `AND`.
    pub conditions: Vec<Field>,
}

impl Filter {
    /// Selects a single row by primary key.
    #[must_use]
    pub fn by_id(id: impl Into<SqlValue>) -> Self {
        Self::default().and("id", id)
    }

    /// Adds an equality condition.
    #[must_use]
    pub fn and(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.conditions.push(Field::new(column, value));
        self
    }

    /// Returns true when no condition is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

// ============================================================================
// SECTION: Statements
// ============================================================================

/// One replayable write statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Statement {
    /// Insert a row with the given column values.
    Insert {
        /// Target table.
        table: Table,
        /// Column values.
        fields: Vec<Field>,
    },
    /// Update rows matching a filter.
    Update {
        /// Target table.
        table: Table,
        /// Columns to assign.
        fields: Vec<Field>,
        /// Row selection.
        filter: Filter,
    },
    /// Delete rows matching a filter.
    Delete {
        /// Target table.
        table: Table,
        /// Row selection.
        filter: Filter,
    },
    /// Static parameterised SQL resolved locally by each store.
    ///
    /// Used for backfills whose values depend on store-local keys (for
    /// example linking rows to an account found by sub-select).
    Sql {
        /// Table the statement writes to.
        table: Table,
        /// Static SQL text with `?N` placeholders.
        sql: &'static str,
        /// Positional parameters.
        params: Vec<SqlValue>,
    },
}

impl Statement {
    /// Builds an insert statement.
    #[must_use]
    pub const fn insert(table: Table, fields: Vec<Field>) -> Self {
        Self::Insert {
            table,
            fields,
        }
    }

    /// Builds an update statement.
    #[must_use]
    pub const fn update(table: Table, fields: Vec<Field>, filter: Filter) -> Self {
        Self::Update {
            table,
            fields,
            filter,
        }
    }

    /// Builds a delete statement.
    #[must_use]
    pub const fn delete(table: Table, filter: Filter) -> Self {
        Self::Delete {
            table,
            filter,
        }
    }

    /// Returns the table this statement writes to.
    #[must_use]
    pub const fn table(&self) -> Table {
        match self {
            Self::Insert {
                table, ..
            }
            | Self::Update {
                table, ..
            }
            | Self::Delete {
                table, ..
            }
            | Self::Sql {
                table, ..
            } => *table,
        }
    }
}

// ============================================================================
// SECTION: Mutation
// ============================================================================

/// One logical, atomic unit of write work.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Mutation {
    /// Statements applied in order inside one transaction.
    pub statements: Vec<Statement>,
}

impl Mutation {
    /// Creates an empty mutation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            statements: Vec::new(),
        }
    }

    /// Creates a mutation holding a single statement.
    #[must_use]
    pub fn single(statement: Statement) -> Self {
        Self {
            statements: vec![statement],
        }
    }

    /// Appends a statement.
    #[must_use]
    pub fn then(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    /// Returns true when the mutation has no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Returns the distinct tables written by this mutation.
    #[must_use]
    pub fn tables(&self) -> BTreeSet<Table> {
        self.statements.iter().map(Statement::table).collect()
    }
}

/// Result of applying a mutation to one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct MutationResult {
    /// Total rows changed across all statements.
    pub rows_affected: usize,
    /// Row id produced by the last insert, read back from the same store.
    pub last_insert_id: Option<i64>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

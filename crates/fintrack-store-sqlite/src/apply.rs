// crates/fintrack-store-sqlite/src/apply.rs
// ============================================================================
// Module: Mutation Interpreter
// Description: Renders statements to SQL and applies them in a transaction.
// Purpose: Replay the same mutation identically against any store.
// Dependencies: fintrack-core, rusqlite
// ============================================================================

//! ## Overview
//! [`apply_mutation`] executes every statement of a [`Mutation`] on an open
//! transaction. The caller commits; returning an error lets the transaction
//! roll back on drop, so a failing statement leaves no partial effect.
//!
//! ## Invariants
//! - Identifiers are checked before any SQL text is built.
//! - Update and delete statements with an empty filter are rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use fintrack_core::Field;
use fintrack_core::Filter;
use fintrack_core::Mutation;
use fintrack_core::MutationResult;
use fintrack_core::SqlValue;
use fintrack_core::Statement;
use rusqlite::Transaction;
use rusqlite::params_from_iter;
use rusqlite::types::Value;

use crate::error::SqliteStoreError;

// ============================================================================
// SECTION: Interpreter
// ============================================================================

/// Applies every statement in order inside `tx`.
///
/// # Errors
///
/// Returns [`SqliteStoreError`] on the first failing statement; the caller
/// must drop the transaction without committing.
pub(crate) fn apply_mutation(
    tx: &Transaction<'_>,
    mutation: &Mutation,
) -> Result<MutationResult, SqliteStoreError> {
    if mutation.is_empty() {
        return Err(SqliteStoreError::Invalid("mutation has no statements".to_string()));
    }
    let mut result = MutationResult::default();
    for statement in &mutation.statements {
        let (sql, params) = render(statement)?;
        let changed = tx
            .execute(&sql, params_from_iter(params))
            .map_err(|err| SqliteStoreError::from_db(&err))?;
        result.rows_affected += changed;
        if matches!(statement, Statement::Insert { .. }) {
            result.last_insert_id = Some(tx.last_insert_rowid());
        }
    }
    Ok(result)
}

/// Renders one statement to SQL text and bound values.
fn render(statement: &Statement) -> Result<(String, Vec<Value>), SqliteStoreError> {
    match statement {
        Statement::Insert {
            table,
            fields,
        } => {
            if fields.is_empty() {
                return Ok((format!("INSERT INTO {table} DEFAULT VALUES"), Vec::new()));
            }
            let columns = column_list(fields)?;
            let placeholders: Vec<String> =
                (1 ..= fields.len()).map(|index| format!("?{index}")).collect();
            let sql = format!(
                "INSERT INTO {table} ({}) VALUES ({})",
                columns.join(", "),
                placeholders.join(", ")
            );
            Ok((sql, values(fields)))
        }
        Statement::Update {
            table,
            fields,
            filter,
        } => {
            if fields.is_empty() {
                return Err(SqliteStoreError::Invalid(format!("update of {table} sets no columns")));
            }
            let columns = column_list(fields)?;
            let assignments: Vec<String> = columns
                .iter()
                .enumerate()
                .map(|(index, column)| format!("{column} = ?{}", index + 1))
                .collect();
            let (predicate, mut filter_values) = where_clause(table.as_str(), filter, fields.len())?;
            let mut params = values(fields);
            params.append(&mut filter_values);
            Ok((format!("UPDATE {table} SET {} WHERE {predicate}", assignments.join(", ")), params))
        }
        Statement::Delete {
            table,
            filter,
        } => {
            let (predicate, params) = where_clause(table.as_str(), filter, 0)?;
            Ok((format!("DELETE FROM {table} WHERE {predicate}"), params))
        }
        Statement::Sql {
            sql,
            params,
            ..
        } => Ok(((*sql).to_string(), params.iter().map(to_value).collect())),
    }
}

/// Builds `a IS ?n AND b IS ?m` for a filter, numbering after `offset`.
fn where_clause(
    table: &str,
    filter: &Filter,
    offset: usize,
) -> Result<(String, Vec<Value>), SqliteStoreError> {
    if filter.is_empty() {
        return Err(SqliteStoreError::Invalid(format!(
            "refusing to write every row of {table}: filter is empty"
        )));
    }
    let columns = column_list(&filter.conditions)?;
    let predicate: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{column} IS ?{}", offset + index + 1))
        .collect();
    Ok((predicate.join(" AND "), values(&filter.conditions)))
}

/// Validates and collects column names.
fn column_list(fields: &[Field]) -> Result<Vec<&'static str>, SqliteStoreError> {
    fields
        .iter()
        .map(|field| {
            if is_identifier(field.column) {
                Ok(field.column)
            } else {
                Err(SqliteStoreError::Invalid(format!("invalid column name '{}'", field.column)))
            }
        })
        .collect()
}

/// Converts field values to bound parameters.
fn values(fields: &[Field]) -> Vec<Value> {
    fields.iter().map(|field| to_value(&field.value)).collect()
}

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// Converts a domain value to a `rusqlite` value.
pub(crate) fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(number) => Value::Integer(*number),
        SqlValue::Real(number) => Value::Real(*number),
        SqlValue::Text(text) => Value::Text(text.clone()),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use fintrack_core::Table;

    use super::*;

    #[test]
    fn update_numbers_filter_after_assignments() {
        let statement = Statement::update(
            Table::Expenses,
            vec![Field::new("amount", 10.0), Field::new("note", "lunch")],
            Filter::by_id(4_i64).and("user_id", 7_i64),
        );
        let (sql, params) = render(&statement).unwrap();
        assert_eq!(
            sql,
            "UPDATE expenses SET amount = ?1, note = ?2 WHERE id IS ?3 AND user_id IS ?4"
        );
        assert_eq!(params.len(), 4);
    }

    #[test]
    fn empty_filter_is_rejected() {
        let statement = Statement::delete(Table::Accounts, Filter::default());
        assert!(matches!(render(&statement), Err(SqliteStoreError::Invalid(_))));
    }

    #[test]
    fn bad_identifier_is_rejected() {
        let statement =
            Statement::insert(Table::Users, vec![Field::new("name; DROP TABLE users", "x")]);
        assert!(render(&statement).is_err());
        assert!(is_identifier("where_spent"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }
}

// crates/fintrack-store-sqlite/src/integrity.rs
// ============================================================================
// Module: Integrity Checker
// Description: Structural verification of a store via PRAGMA integrity_check.
// Purpose: Turn any store into a yes/no verdict without ever failing.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! A store is healthy only when `PRAGMA integrity_check` returns exactly one
//! row reading `ok`. Every other outcome (extra rows, a closed handle, an
//! unreadable file) is a negative verdict carrying the reason.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;

use crate::audit::now_ms;
use crate::config::SqliteStoreConfig;
use crate::error::SqliteStoreError;
use crate::handle::StoreHandle;
use crate::handle::open_existing;

/// Maximum number of problem rows copied into a verdict.
const MAX_DETAIL_ROWS: usize = 8;

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Result of one integrity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityVerdict {
    /// True only when the check returned a single `ok` row.
    pub ok: bool,
    /// Check time (ms since epoch).
    pub checked_at_ms: u128,
    /// Problems reported by `SQLite`, or the error that stopped the check.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl IntegrityVerdict {
    /// Builds a passing verdict.
    fn passed() -> Self {
        Self {
            ok: true,
            checked_at_ms: now_ms(),
            detail: None,
        }
    }

    /// Builds a failing verdict.
    fn failed(detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            checked_at_ms: now_ms(),
            detail: Some(detail.into()),
        }
    }

    /// Interprets the rows returned by `PRAGMA integrity_check`.
    fn from_rows(rows: &[String]) -> Self {
        match rows {
            [only] if only == "ok" => Self::passed(),
            [] => Self::failed("integrity_check returned no rows"),
            _ => Self::failed(
                rows.iter().take(MAX_DETAIL_ROWS).cloned().collect::<Vec<_>>().join("; "),
            ),
        }
    }
}

// ============================================================================
// SECTION: Checks
// ============================================================================

/// Verifies an open handle. A closed handle yields a failing verdict.
#[must_use]
pub fn verify(handle: &StoreHandle) -> IntegrityVerdict {
    match handle.with_writer(|connection| integrity_rows(connection)) {
        Ok(rows) => IntegrityVerdict::from_rows(&rows),
        Err(err) => IntegrityVerdict::failed(err.to_string()),
    }
}

/// Verifies a file through a fresh connection that never creates it.
#[must_use]
pub fn verify_path(path: &Path, config: &SqliteStoreConfig) -> IntegrityVerdict {
    let result = open_existing(path, config.busy_timeout_ms)
        .and_then(|connection| integrity_rows(&connection));
    match result {
        Ok(rows) => IntegrityVerdict::from_rows(&rows),
        Err(err) => IntegrityVerdict::failed(err.to_string()),
    }
}

/// Runs `PRAGMA integrity_check` and collects every row.
fn integrity_rows(connection: &Connection) -> Result<Vec<String>, SqliteStoreError> {
    let mut stmt = connection
        .prepare("PRAGMA integrity_check")
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(|err| SqliteStoreError::from_db(&err))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

// crates/fintrack-store-sqlite/src/error.rs
// ============================================================================
// Module: SQLite Store Errors
// Description: Error taxonomy for store handles, writes, and startup.
// Purpose: Keep engine failures, write failures, and fatal startup apart.
// Dependencies: fintrack-core, rusqlite, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteStoreError`] covers engine and filesystem failures on a single
//! store. [`WriteError`] is what callers of the replicated write path see:
//! only the primary can fail a write. [`StartupError`] is fatal.

// ============================================================================
// SECTION: Imports
// ============================================================================

use fintrack_core::ValidationError;
use rusqlite::ErrorCode;
use thiserror::Error;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding row payloads.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Constraint violation (unique key, not null).
    #[error("sqlite store constraint violation: {0}")]
    Constraint(String),
    /// Store corruption detected.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data or request.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl SqliteStoreError {
    /// Maps a `rusqlite` error, keeping constraint and corruption failures distinct.
    #[must_use]
    pub fn from_db(err: &rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::Constraint(err.to_string()),
            Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
                Self::Corrupt(err.to_string())
            }
            _ => Self::Db(err.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Write Errors
// ============================================================================

/// Errors returned by the replicated write path.
///
/// Replica failures never appear here; they are reported in the outcome.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WriteError {
    /// Input failed domain validation; nothing was written.
    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationError),
    /// The primary write failed and was rolled back.
    #[error("primary write failed: {0}")]
    Primary(#[from] SqliteStoreError),
    /// Writes are refused because the primary is unrecoverable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// SECTION: Startup Errors
// ============================================================================

/// Fatal startup errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StartupError {
    /// The primary is corrupted and no replica could be promoted.
    #[error("primary store is corrupted and no replica could be promoted ({attempts} attempts)")]
    Unrecoverable {
        /// Number of replica candidates examined.
        attempts: usize,
    },
    /// A store operation failed during startup.
    #[error(transparent)]
    Store(#[from] SqliteStoreError),
}

// crates/fintrack-core/src/identifiers.rs
// ============================================================================
// Module: Fintrack Identifiers
// Description: Typed row and user identifiers.
// Purpose: Keep store-local integer keys from being mixed up at call sites.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers wrap the integer keys assigned by a store. They are
//! store-local: the same logical row may carry a different [`RecordId`] on a
//! replica, so identifiers are never copied from one store into another.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::mutation::SqlValue;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Identifier of an application user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

impl UserId {
    /// Creates a user identifier from its raw key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<UserId> for SqlValue {
    fn from(value: UserId) -> Self {
        Self::Integer(value.0)
    }
}

/// Identifier of a row in one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Creates a record identifier from its raw key.
    #[must_use]
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Returns the raw key.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<RecordId> for SqlValue {
    fn from(value: RecordId) -> Self {
        Self::Integer(value.0)
    }
}

// crates/fintrack-store-sqlite/src/replica.rs
// ============================================================================
// Module: Replica Set
// Description: Fixed replica slots, their handles, and write counters.
// Purpose: Track up to two best-effort copies of the primary store.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! Replicas live in fixed slots with fixed file names so a restarted process
//! finds the same files. Slot order is recovery priority. Each replica keeps
//! counters of successful and failed replicated writes for health reporting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;

use crate::config::SqliteStoreConfig;
use crate::error::SqliteStoreError;
use crate::handle::ConnectionSettings;
use crate::handle::StoreHandle;
use crate::handle::StoreRole;
use crate::handle::lock;

// ============================================================================
// SECTION: Slots
// ============================================================================

/// Replica slot, in recovery priority order.
///
/// Serializes as its 1-based number, matching file names and CLI flags.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum ReplicaSlot {
    /// `replica-1.sqlite`, tried first.
    First,
    /// `replica-2.sqlite`, tried second.
    Second,
}

impl ReplicaSlot {
    /// Every slot in priority order.
    pub const ALL: [Self; 2] = [Self::First, Self::Second];

    /// Returns the 1-based slot number.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::First => 1,
            Self::Second => 2,
        }
    }

    /// Resolves a 1-based slot number.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] for numbers other than 1 or 2.
    pub fn from_number(number: u8) -> Result<Self, SqliteStoreError> {
        match number {
            1 => Ok(Self::First),
            2 => Ok(Self::Second),
            other => Err(SqliteStoreError::Invalid(format!("unknown replica slot {other}"))),
        }
    }

    /// Returns the replica file name.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::First => "replica-1.sqlite",
            Self::Second => "replica-2.sqlite",
        }
    }
}

impl From<ReplicaSlot> for u8 {
    fn from(slot: ReplicaSlot) -> Self {
        slot.number()
    }
}

impl TryFrom<u8> for ReplicaSlot {
    type Error = SqliteStoreError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Self::from_number(number)
    }
}

impl fmt::Display for ReplicaSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

// ============================================================================
// SECTION: Replica
// ============================================================================

/// Write counters for one replica.
#[derive(Debug, Default)]
pub struct ReplicaStats {
    /// Replicated writes that committed.
    writes_ok: AtomicU64,
    /// Replicated writes that failed.
    writes_failed: AtomicU64,
    /// Most recent failure detail.
    last_error: Mutex<Option<String>>,
}

impl ReplicaStats {
    /// Records a committed write.
    pub(crate) fn record_success(&self) {
        self.writes_ok.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a failed write.
    pub(crate) fn record_failure(&self, detail: &str) {
        self.writes_failed.fetch_add(1, Ordering::Relaxed);
        *lock(&self.last_error) = Some(detail.to_string());
    }

    /// Returns the committed write count.
    #[must_use]
    pub fn writes_ok(&self) -> u64 {
        self.writes_ok.load(Ordering::Relaxed)
    }

    /// Returns the failed write count.
    #[must_use]
    pub fn writes_failed(&self) -> u64 {
        self.writes_failed.load(Ordering::Relaxed)
    }

    /// Returns the most recent failure detail.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }
}

/// One configured replica.
#[derive(Debug)]
pub struct Replica {
    /// Slot.
    slot: ReplicaSlot,
    /// Connection set.
    handle: StoreHandle,
    /// Write counters.
    stats: ReplicaStats,
}

impl Replica {
    /// Creates a closed replica for a slot.
    #[must_use]
    pub fn new(config: &SqliteStoreConfig, slot: ReplicaSlot) -> Self {
        Self {
            slot,
            handle: StoreHandle::new(
                StoreRole::Replica(slot),
                config.replica_path(slot),
                ConnectionSettings::replica(config),
            ),
            stats: ReplicaStats::default(),
        }
    }

    /// Returns the slot.
    #[must_use]
    pub const fn slot(&self) -> ReplicaSlot {
        self.slot
    }

    /// Returns the store handle.
    #[must_use]
    pub const fn handle(&self) -> &StoreHandle {
        &self.handle
    }

    /// Returns the write counters.
    #[must_use]
    pub const fn stats(&self) -> &ReplicaStats {
        &self.stats
    }
}

/// The configured replicas, in slot order.
#[derive(Debug, Default)]
pub struct ReplicaSet {
    /// Replicas ordered by slot.
    replicas: Vec<Replica>,
}

impl ReplicaSet {
    /// Builds closed replicas for every enabled slot.
    #[must_use]
    pub fn new(config: &SqliteStoreConfig) -> Self {
        Self {
            replicas: config
                .enabled_slots()
                .into_iter()
                .map(|slot| Replica::new(config, slot))
                .collect(),
        }
    }

    /// Returns the replica in `slot`, if configured.
    #[must_use]
    pub fn get(&self, slot: ReplicaSlot) -> Option<&Replica> {
        self.replicas.iter().find(|replica| replica.slot == slot)
    }

    /// Iterates replicas in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.iter()
    }

    /// Returns the number of configured replicas.
    #[must_use]
    pub fn len(&self) -> usize {
        self.replicas.len()
    }

    /// Returns true when no replica is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.replicas.is_empty()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn slot_numbers_round_trip_and_reject_unknown() {
        for slot in ReplicaSlot::ALL {
            assert_eq!(ReplicaSlot::from_number(slot.number()).unwrap(), slot);
        }
        assert!(ReplicaSlot::from_number(0).is_err());
        assert!(ReplicaSlot::from_number(3).is_err());
    }

    #[test]
    fn slots_serialize_as_their_number() {
        assert_eq!(serde_json::to_value(ReplicaSlot::Second).unwrap(), serde_json::json!(2));
        let slot: ReplicaSlot = serde_json::from_value(serde_json::json!(1)).unwrap();
        assert_eq!(slot, ReplicaSlot::First);
        assert!(serde_json::from_value::<ReplicaSlot>(serde_json::json!(3)).is_err());
    }

    #[test]
    fn stats_keep_last_error() {
        let stats = ReplicaStats::default();
        stats.record_success();
        stats.record_failure("disk full");
        stats.record_failure("no such table: expenses");
        assert_eq!(stats.writes_ok(), 1);
        assert_eq!(stats.writes_failed(), 2);
        assert_eq!(stats.last_error().as_deref(), Some("no such table: expenses"));
    }
}

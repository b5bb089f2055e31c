// crates/fintrack-store-sqlite/src/health.rs
// ============================================================================
// Module: Store Health
// Description: Point-in-time view of the primary and every replica.
// Purpose: Expose replication and recovery state to operators as JSON.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`StorageContext::health`] never touches the disk beyond existence checks
//! and reading `PRAGMA user_version`; it reports the last integrity verdict
//! rather than running a new check.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;

use crate::context::StorageContext;
use crate::integrity::IntegrityVerdict;
use crate::recovery::RecoveryState;
use crate::replica::ReplicaSlot;

// ============================================================================
// SECTION: Report
// ============================================================================

/// Health of the primary store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryHealth {
    /// File path.
    pub path: String,
    /// Whether the handle is open.
    pub open: bool,
    /// Schema version marker, when readable.
    pub schema_version: Option<i64>,
    /// Most recent integrity verdict.
    pub last_verdict: Option<IntegrityVerdict>,
}

/// Health of one replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaHealth {
    /// Slot.
    pub slot: ReplicaSlot,
    /// File path.
    pub path: String,
    /// Whether the handle is open.
    pub open: bool,
    /// Whether the file exists on disk.
    pub exists: bool,
    /// Replicated writes committed since start.
    pub writes_ok: u64,
    /// Replicated writes failed since start.
    pub writes_failed: u64,
    /// Most recent failure detail.
    pub last_error: Option<String>,
}

/// Health of the whole replica set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// Recovery state.
    pub state: RecoveryState,
    /// Whether writes are refused.
    pub writes_blocked: bool,
    /// Primary store.
    pub primary: PrimaryHealth,
    /// Configured replicas in slot order.
    pub replicas: Vec<ReplicaHealth>,
}

impl HealthReport {
    /// Returns true when the primary is open, writable, and every replica
    /// file exists with no failed writes.
    #[must_use]
    pub fn is_fully_healthy(&self) -> bool {
        self.primary.open
            && !self.writes_blocked
            && self.primary.last_verdict.as_ref().is_none_or(|verdict| verdict.ok)
            && self.replicas.iter().all(|replica| replica.exists && replica.writes_failed == 0)
    }
}

// ============================================================================
// SECTION: Collection
// ============================================================================

impl StorageContext {
    /// Collects a health snapshot.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let primary = PrimaryHealth {
            path: self.primary.path().display().to_string(),
            open: self.primary.is_open(),
            schema_version: self.primary.schema_version().ok(),
            last_verdict: self.last_verdict(),
        };
        let replicas = self
            .replicas
            .iter()
            .map(|replica| ReplicaHealth {
                slot: replica.slot(),
                path: replica.handle().path().display().to_string(),
                open: replica.handle().is_open(),
                exists: replica.handle().path().is_file(),
                writes_ok: replica.stats().writes_ok(),
                writes_failed: replica.stats().writes_failed(),
                last_error: replica.stats().last_error(),
            })
            .collect();
        HealthReport {
            state: self.recovery_state(),
            writes_blocked: self.writes_blocked(),
            primary,
            replicas,
        }
    }
}

// crates/fintrack-store-sqlite/src/coordinator.rs
// ============================================================================
// Module: Replicated Write Coordinator
// Description: Apply one mutation to the primary, then replay it on replicas.
// Purpose: The sole durable write path for the process.
// Dependencies: fintrack-core, rusqlite, serde
// ============================================================================

//! ## Overview
//! [`StorageContext::with_replicated_write`] commits a [`Mutation`] on the
//! primary in one transaction, then replays the same mutation against each
//! replica in slot order. The primary decides success. Replica failures are
//! recorded per slot, counted in health, and audited; they never surface as
//! an error and never undo the primary commit.
//!
//! ## Invariants
//! - A failed primary transaction rolls back and no replica is touched.
//! - A replica whose file has vanished is skipped and never recreated.
//! - Tables touched by the mutation are created on a replica before replay.
//!
//! ## Divergent Row Ids
//! Replication is best effort, so a replica that missed an insert assigns
//! different ids to later rows. Updates and deletes replay with the primary's
//! id, which on such a replica can match a different row or none. Recovery
//! only promotes whole files, so a diverged replica is still a consistent
//! database, but it is not guaranteed to mirror the primary row for row.

// ============================================================================
// SECTION: Imports
// ============================================================================

use fintrack_core::Mutation;
use fintrack_core::MutationResult;
use serde::Serialize;

use crate::apply::apply_mutation;
use crate::audit::AuditSeverity;
use crate::audit::StoreAuditEvent;
use crate::audit::StoreEventKind;
use crate::context::StorageContext;
use crate::error::SqliteStoreError;
use crate::error::WriteError;
use crate::replica::Replica;
use crate::replica::ReplicaSlot;
use crate::schema::schema_for;

// ============================================================================
// SECTION: Outcome Types
// ============================================================================

/// Aggregate replication state of one write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationStatus {
    /// No replica is configured.
    NoReplicas,
    /// Every replica applied the write.
    FullyReplicated,
    /// Some replicas applied the write.
    PartiallyReplicated,
    /// Every replica failed; only the primary holds the write.
    PrimaryOnly,
}

/// One replica that failed to apply a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReplicaWriteFailure {
    /// Replica slot.
    pub replica: ReplicaSlot,
    /// Failure detail.
    pub detail: String,
}

/// Soft warning raised when every attempted replica failed one write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupWriteWarning {
    /// Every replica failure, in slot order.
    pub failures: Vec<ReplicaWriteFailure>,
}

impl std::fmt::Display for BackupWriteWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backup write failed on every replica:")?;
        for failure in &self.failures {
            write!(f, " [replica {}: {}]", failure.replica, failure.detail)?;
        }
        Ok(())
    }
}

/// Per-replica results of one write.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReplicationOutcome {
    /// Replicas that committed the write.
    pub applied: Vec<ReplicaSlot>,
    /// Replicas that did not.
    pub failures: Vec<ReplicaWriteFailure>,
    /// Set when every attempted replica failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<BackupWriteWarning>,
}

impl ReplicationOutcome {
    /// Derives the aggregate status.
    #[must_use]
    pub fn status(&self) -> ReplicationStatus {
        match (self.applied.is_empty(), self.failures.is_empty()) {
            (true, true) => ReplicationStatus::NoReplicas,
            (false, true) => ReplicationStatus::FullyReplicated,
            (false, false) => ReplicationStatus::PartiallyReplicated,
            (true, false) => ReplicationStatus::PrimaryOnly,
        }
    }
}

/// Value produced by the primary plus the replication outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicatedWrite<T> {
    /// Value read back from the primary.
    pub value: T,
    /// Per-replica outcome.
    pub replication: ReplicationOutcome,
}

impl<T> ReplicatedWrite<T> {
    /// Maps the primary value, keeping the outcome.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ReplicatedWrite<U> {
        ReplicatedWrite {
            value: f(self.value),
            replication: self.replication,
        }
    }

    /// Returns the aggregate replication status.
    #[must_use]
    pub fn status(&self) -> ReplicationStatus {
        self.replication.status()
    }
}

// ============================================================================
// SECTION: Coordinator
// ============================================================================

impl StorageContext {
    /// Applies `mutation` to the primary, then to every configured replica.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Unavailable`] when the primary is unrecoverable
    /// and [`WriteError::Primary`] when the primary transaction fails.
    /// Replica failures are reported in [`ReplicatedWrite::replication`].
    pub fn with_replicated_write(
        &self,
        mutation: &Mutation,
    ) -> Result<ReplicatedWrite<MutationResult>, WriteError> {
        if self.writes_blocked() {
            return Err(WriteError::Unavailable(
                "primary store is unrecoverable; writes are disabled".to_string(),
            ));
        }
        let _guard = self.write_guard();

        let value = self.primary.with_writer(|connection| {
            let tx = connection.transaction().map_err(|err| SqliteStoreError::from_db(&err))?;
            let result = apply_mutation(&tx, mutation)?;
            tx.commit().map_err(|err| SqliteStoreError::from_db(&err))?;
            Ok(result)
        })?;

        let replication = self.replicate(mutation);
        Ok(ReplicatedWrite {
            value,
            replication,
        })
    }

    /// Replays a committed mutation on each replica in slot order.
    fn replicate(&self, mutation: &Mutation) -> ReplicationOutcome {
        let mut outcome = ReplicationOutcome::default();
        for replica in self.replicas.iter() {
            match replay_on_replica(replica, mutation) {
                Ok(()) => {
                    replica.stats().record_success();
                    outcome.applied.push(replica.slot());
                }
                Err(err) => {
                    let detail = err.to_string();
                    replica.stats().record_failure(&detail);
                    self.record(
                        &StoreAuditEvent::new(
                            StoreEventKind::ReplicaWriteFailed,
                            AuditSeverity::Warning,
                        )
                        .with_store(replica.handle().role(), replica.handle().path())
                        .with_detail(detail.clone()),
                    );
                    outcome.failures.push(ReplicaWriteFailure {
                        replica: replica.slot(),
                        detail,
                    });
                }
            }
        }
        if outcome.applied.is_empty() && !outcome.failures.is_empty() {
            let warning = BackupWriteWarning {
                failures: outcome.failures.clone(),
            };
            self.record(
                &StoreAuditEvent::new(StoreEventKind::BackupWriteFailed, AuditSeverity::Error)
                    .with_detail(warning.to_string()),
            );
            outcome.warning = Some(warning);
        }
        outcome
    }
}

/// Applies a mutation to one replica in a replica-local transaction.
fn replay_on_replica(replica: &Replica, mutation: &Mutation) -> Result<(), SqliteStoreError> {
    let handle = replica.handle();
    if !handle.path().is_file() {
        return Err(SqliteStoreError::Io(format!(
            "replica file {} is missing",
            handle.path().display()
        )));
    }
    handle.with_writer(|connection| {
        let tx = connection.transaction().map_err(|err| SqliteStoreError::from_db(&err))?;
        for table in mutation.tables() {
            tx.execute_batch(schema_for(table).create_sql)
                .map_err(|err| SqliteStoreError::from_db(&err))?;
        }
        apply_mutation(&tx, mutation)?;
        tx.commit().map_err(|err| SqliteStoreError::from_db(&err))
    })
}

// ============================================================================
// SECTION: Tests
// ============================================================================

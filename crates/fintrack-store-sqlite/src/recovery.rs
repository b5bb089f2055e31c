// crates/fintrack-store-sqlite/src/recovery.rs
// ============================================================================
// Module: Recovery Manager
// Description: Detect a corrupted primary and promote a healthy replica.
// Purpose: Restore service from the best available copy without inventing data.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! Recovery walks replicas in slot order. The first replica that exists and
//! passes an integrity check is checkpointed, copied byte-for-byte over the
//! primary path, and the primary handle is reopened on the copy. Stale
//! primary sidecar files are removed first so the old WAL cannot be replayed
//! on top of the promoted file.
//!
//! ## State Machine
//! `Healthy -> Checking -> (Healthy | Recovering)`,
//! `Recovering -> (Recovered | Unrecoverable)`. `Recovered` is terminal.
//! `Unrecoverable` blocks writes until an operator restore promotes a
//! replica, which moves it to `Recovered`.
//!
//! Store files are created only for a fresh deployment, so a replica file
//! that went missing is never replaced by an empty database and promoted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;

use crate::audit::AuditSeverity;
use crate::audit::StoreAuditEvent;
use crate::audit::StoreEventKind;
use crate::context::StorageContext;
use crate::error::SqliteStoreError;
use crate::handle::StoreRole;
use crate::handle::checkpoint_connection;
use crate::handle::lock;
use crate::handle::open_existing;
use crate::integrity::IntegrityVerdict;
use crate::integrity::verify;
use crate::integrity::verify_path;
use crate::replica::ReplicaSlot;

/// Sidecar suffixes that belong to a database file.
const SIDECAR_SUFFIXES: [&str; 3] = ["-wal", "-shm", "-journal"];

// ============================================================================
// SECTION: State Machine
// ============================================================================

/// Recovery lifecycle of the primary store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    /// Last check passed (or none has run yet).
    Healthy,
    /// An integrity check is in progress.
    Checking,
    /// The primary failed its check; replicas are being tried.
    Recovering,
    /// A replica was promoted. Terminal.
    Recovered,
    /// No replica could be promoted. Left only by a successful
    /// [`StorageContext::restore_from_replica`].
    Unrecoverable,
}

impl RecoveryState {
    /// Returns the snake-case name used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Checking => "checking",
            Self::Recovering => "recovering",
            Self::Recovered => "recovered",
            Self::Unrecoverable => "unrecoverable",
        }
    }

    /// Returns true when `next` is a legal successor.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Healthy, Self::Checking)
                | (Self::Checking, Self::Healthy | Self::Recovering)
                | (Self::Recovering, Self::Recovered | Self::Unrecoverable)
                | (Self::Unrecoverable, Self::Recovered)
        )
    }

    /// Returns true once an automatic recovery cycle has ended
    /// (`Recovered` or `Unrecoverable`).
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Recovered | Self::Unrecoverable)
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// One replica considered as a recovery source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryAttempt {
    /// Candidate slot.
    pub replica: ReplicaSlot,
    /// Whether the replica file existed.
    pub exists: bool,
    /// Whether the replica passed its integrity check.
    pub verdict_ok: bool,
    /// Whether the replica became the primary.
    pub promoted: bool,
    /// Why the candidate was skipped, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of a recovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// True when a replica was promoted.
    pub success: bool,
    /// Promoted slot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<ReplicaSlot>,
    /// Every candidate examined, in order.
    pub attempts: Vec<RecoveryAttempt>,
}

// ============================================================================
// SECTION: Recovery
// ============================================================================

impl StorageContext {
    /// Verifies the primary as one step of the recovery state machine.
    ///
    /// From a terminal state the check still runs but the state is unchanged.
    #[must_use]
    pub fn check_primary(&self) -> IntegrityVerdict {
        let in_cycle = self.transition(RecoveryState::Checking).is_ok();
        let verdict = self.verify_integrity(None);
        if in_cycle {
            let next =
                if verdict.ok { RecoveryState::Healthy } else { RecoveryState::Recovering };
            let _ = self.transition(next);
        }
        verdict
    }

    /// Tries each replica in slot order until one is promoted.
    #[must_use]
    pub fn attempt_recovery(&self) -> RecoveryReport {
        let _guard = self.write_guard();
        if self.recovery_state() == RecoveryState::Healthy {
            let _ = self.transition(RecoveryState::Checking);
        }
        let _ = self.transition(RecoveryState::Recovering);

        let mut report = RecoveryReport {
            success: false,
            source: None,
            attempts: Vec::new(),
        };
        for slot in ReplicaSlot::ALL {
            let attempt = self.try_candidate(slot);
            let promoted = attempt.promoted;
            report.attempts.push(attempt);
            if promoted {
                report.success = true;
                report.source = Some(slot);
                break;
            }
        }

        if report.success {
            self.mark_restored();
            self.record(
                &StoreAuditEvent::new(StoreEventKind::RecoveryCompleted, AuditSeverity::Warning)
                    .with_store(StoreRole::Primary, self.primary.path())
                    .with_detail(format!(
                        "primary restored from replica {}",
                        report.source.map_or(0, ReplicaSlot::number)
                    )),
            );
        } else {
            if !self.primary.is_open() {
                let _ = self.primary.open_if_present();
            }
            let _ = self.transition(RecoveryState::Unrecoverable);
            self.record(
                &StoreAuditEvent::new(
                    StoreEventKind::RecoveryUnrecoverable,
                    AuditSeverity::Critical,
                )
                .with_store(StoreRole::Primary, self.primary.path())
                .with_detail(format!("{} replica candidates rejected", report.attempts.len())),
            );
        }
        report
    }

    /// Promotes one specific replica over the primary.
    ///
    /// Returns `Ok(false)` when the replica is missing or fails its check.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the copy or reopen fails after the
    /// replica was accepted.
    pub fn restore_from_replica(&self, slot: ReplicaSlot) -> Result<bool, SqliteStoreError> {
        let _guard = self.write_guard();
        let path = self.config.replica_path(slot);
        if !path.is_file() || !self.verify_candidate(slot, &path).ok {
            return Ok(false);
        }
        self.promote(slot, &path)?;
        self.mark_restored();
        self.record(
            &StoreAuditEvent::new(StoreEventKind::RecoveryCompleted, AuditSeverity::Warning)
                .with_store(StoreRole::Primary, self.primary.path())
                .with_detail(format!("primary restored from replica {slot} on request")),
        );
        Ok(true)
    }

    /// Applies a state transition.
    pub(crate) fn transition(&self, next: RecoveryState) -> Result<(), SqliteStoreError> {
        let mut state = lock(&self.state);
        if !state.can_transition_to(next) {
            return Err(SqliteStoreError::Invalid(format!(
                "invalid recovery transition {} -> {}",
                state.as_str(),
                next.as_str()
            )));
        }
        *state = next;
        Ok(())
    }

    /// Moves a recovering or unrecoverable context to `Recovered`; a healthy
    /// context stays healthy.
    fn mark_restored(&self) {
        let mut state = lock(&self.state);
        if state.can_transition_to(RecoveryState::Recovered) {
            *state = RecoveryState::Recovered;
        }
    }

    /// Evaluates one candidate and promotes it when healthy.
    fn try_candidate(&self, slot: ReplicaSlot) -> RecoveryAttempt {
        let path = self.config.replica_path(slot);
        let mut attempt = RecoveryAttempt {
            replica: slot,
            exists: path.is_file(),
            verdict_ok: false,
            promoted: false,
            detail: None,
        };
        if attempt.exists {
            let verdict = self.verify_candidate(slot, &path);
            attempt.verdict_ok = verdict.ok;
            if verdict.ok {
                match self.promote(slot, &path) {
                    Ok(()) => attempt.promoted = true,
                    Err(err) => attempt.detail = Some(err.to_string()),
                }
            } else {
                attempt.detail = verdict.detail;
            }
        } else {
            attempt.detail = Some("replica file is missing".to_string());
        }

        let severity = if attempt.promoted { AuditSeverity::Info } else { AuditSeverity::Warning };
        let mut event = StoreAuditEvent::new(StoreEventKind::RecoveryAttempt, severity)
            .with_store(StoreRole::Replica(slot), &path);
        if let Some(detail) = &attempt.detail {
            event = event.with_detail(detail.clone());
        }
        self.record(&event);
        attempt
    }

    /// Verifies a candidate through freshly opened connections on its handle
    /// when configured, so a file replaced on disk is read as it is now.
    fn verify_candidate(&self, slot: ReplicaSlot, path: &Path) -> IntegrityVerdict {
        if let Some(replica) = self.replicas.get(slot) {
            let _ = replica.handle().open_if_present();
            return verify(replica.handle());
        }
        verify_path(path, &self.config)
    }

    /// Checkpoints the replica, swaps the primary file, and reopens it.
    fn promote(&self, slot: ReplicaSlot, replica_path: &Path) -> Result<(), SqliteStoreError> {
        let primary_path = self.primary.path().to_path_buf();
        let swap = |source: &Path| -> Result<(), SqliteStoreError> {
            self.primary.close();
            remove_sidecars(&primary_path)?;
            let staging = sibling_with_suffix(&primary_path, ".restore");
            std::fs::copy(source, &staging).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
            std::fs::rename(&staging, &primary_path)
                .map_err(|err| SqliteStoreError::Io(err.to_string()))
        };

        match self.replicas.get(slot) {
            Some(replica) => replica.handle().with_writer(|connection| {
                checkpoint_connection(connection)?;
                swap(replica_path)
            })?,
            None => {
                let connection = open_existing(replica_path, self.config.busy_timeout_ms)?;
                checkpoint_connection(&connection)?;
                drop(connection);
                swap(replica_path)?;
            }
        }

        self.primary.open()?;
        let verdict = verify(&self.primary);
        if !verdict.ok {
            return Err(SqliteStoreError::Corrupt(format!(
                "promoted primary failed verification: {}",
                verdict.detail.unwrap_or_default()
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: File Helpers
// ============================================================================

/// Returns `path` with `suffix` appended to its file name.
fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Removes `-wal`, `-shm`, and `-journal` files next to `path`.
fn remove_sidecars(path: &Path) -> Result<(), SqliteStoreError> {
    for suffix in SIDECAR_SUFFIXES {
        let sidecar = sibling_with_suffix(path, suffix);
        match std::fs::remove_file(&sidecar) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => {
                return Err(SqliteStoreError::Io(format!(
                    "failed to remove {}: {err}",
                    sidecar.display()
                )));
            }
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

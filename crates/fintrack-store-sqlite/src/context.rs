// crates/fintrack-store-sqlite/src/context.rs
// ============================================================================
// Module: Storage Context
// Description: Owner of the primary handle, the replica set, and audit sink.
// Purpose: Replace process-global store handles with one explicit value.
// Dependencies: rusqlite, serde
// ============================================================================

//! ## Overview
//! A [`StorageContext`] is built once at process start, run through
//! [`StorageContext::startup`], then shared behind an `Arc`. The replicated
//! write path, integrity checks, recovery, migrations, and health reporting
//! are all methods on it, split across sibling modules.
//!
//! ## Invariants
//! - Store files are created only when the context opens a fresh
//!   deployment (no primary and no replica file yet). Otherwise a missing
//!   file stays missing and its handle stays closed: a missing replica can
//!   never be promoted, and a missing primary goes through recovery.
//! - All writes and file swaps are serialized by one write lock, so every
//!   store sees mutations in the same order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use serde::Serialize;

use crate::audit::AuditSeverity;
use crate::audit::StderrAuditSink;
use crate::audit::StoreAuditEvent;
use crate::audit::StoreAuditSink;
use crate::audit::StoreEventKind;
use crate::config::SqliteStoreConfig;
use crate::config::UnrecoverablePolicy;
use crate::error::SqliteStoreError;
use crate::error::StartupError;
use crate::handle::ConnectionSettings;
use crate::handle::StoreHandle;
use crate::handle::StoreRole;
use crate::handle::ensure_parent_dir;
use crate::handle::lock;
use crate::integrity::IntegrityVerdict;
use crate::integrity::verify;
use crate::integrity::verify_path;
use crate::migration::MigrationReport;
use crate::migration::ensure_schema;
use crate::recovery::RecoveryReport;
use crate::recovery::RecoveryState;
use crate::replica::ReplicaSet;
use crate::replica::ReplicaSlot;

// ============================================================================
// SECTION: Context
// ============================================================================

/// Explicit owner of every store handle in the process.
pub struct StorageContext {
    /// Validated configuration.
    pub(crate) config: SqliteStoreConfig,
    /// Authoritative store.
    pub(crate) primary: StoreHandle,
    /// Best-effort copies.
    pub(crate) replicas: ReplicaSet,
    /// Audit event sink.
    pub(crate) audit: Arc<dyn StoreAuditSink>,
    /// Recovery state machine.
    pub(crate) state: Mutex<RecoveryState>,
    /// Most recent primary verdict.
    pub(crate) last_verdict: Mutex<Option<IntegrityVerdict>>,
    /// Serializes replicated writes and file swaps.
    pub(crate) write_lock: Mutex<()>,
}

impl StorageContext {
    /// Opens the primary and every configured replica.
    ///
    /// A primary or replica that cannot be opened is logged and left closed;
    /// startup verification and recovery deal with it. Missing files are
    /// created only when none of the configured store files exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the configuration is invalid or the
    /// store directories cannot be created.
    pub fn open(
        config: SqliteStoreConfig,
        audit: Arc<dyn StoreAuditSink>,
    ) -> Result<Self, SqliteStoreError> {
        config.validate()?;
        ensure_parent_dir(&config.path)?;
        if config.replicas > 0 {
            std::fs::create_dir_all(config.replica_dir())
                .map_err(|err| SqliteStoreError::Io(err.to_string()))?;
        }

        let fresh = !config.path.exists()
            && config.enabled_slots().into_iter().all(|slot| !config.replica_path(slot).exists());
        let primary = StoreHandle::new(
            StoreRole::Primary,
            &config.path,
            ConnectionSettings::primary(&config),
        );
        let opened = if fresh { primary.open() } else { primary.open_if_present() };
        if let Err(err) = opened {
            audit.record(
                &StoreAuditEvent::new(StoreEventKind::PrimaryOpenFailed, AuditSeverity::Error)
                    .with_store(StoreRole::Primary, primary.path())
                    .with_detail(err.to_string()),
            );
        }

        let replicas = ReplicaSet::new(&config);
        for replica in replicas.iter() {
            let handle = replica.handle();
            let opened = if fresh { handle.open() } else { handle.open_if_present() };
            if let Err(err) = opened {
                audit.record(
                    &StoreAuditEvent::new(StoreEventKind::ReplicaOpenFailed, AuditSeverity::Warning)
                        .with_store(handle.role(), handle.path())
                        .with_detail(err.to_string()),
                );
            }
        }

        Ok(Self {
            config,
            primary,
            replicas,
            audit,
            state: Mutex::new(RecoveryState::Healthy),
            last_verdict: Mutex::new(None),
            write_lock: Mutex::new(()),
        })
    }

    /// Opens a context that logs audit events to stderr.
    ///
    /// # Errors
    ///
    /// See [`StorageContext::open`].
    pub fn open_with_stderr_audit(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        Self::open(config, Arc::new(StderrAuditSink))
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Returns the primary handle.
    #[must_use]
    pub const fn primary(&self) -> &StoreHandle {
        &self.primary
    }

    /// Returns the replica set.
    #[must_use]
    pub const fn replicas(&self) -> &ReplicaSet {
        &self.replicas
    }

    /// Returns the current recovery state.
    #[must_use]
    pub fn recovery_state(&self) -> RecoveryState {
        *lock(&self.state)
    }

    /// Returns the most recent primary verdict, if any check has run.
    #[must_use]
    pub fn last_verdict(&self) -> Option<IntegrityVerdict> {
        lock(&self.last_verdict).clone()
    }

    /// Returns true when writes are refused.
    #[must_use]
    pub fn writes_blocked(&self) -> bool {
        self.recovery_state() == RecoveryState::Unrecoverable
    }

    /// Verifies the primary (`None`) or one replica slot.
    ///
    /// Never fails: errors become a negative verdict. Checking the primary
    /// updates [`StorageContext::last_verdict`].
    #[must_use]
    pub fn verify_integrity(&self, slot: Option<ReplicaSlot>) -> IntegrityVerdict {
        let (role, path, verdict) = match slot {
            None => (StoreRole::Primary, self.primary.path().to_path_buf(), verify(&self.primary)),
            Some(slot) => {
                let path = self.config.replica_path(slot);
                let verdict = self
                    .replicas
                    .get(slot)
                    .map_or_else(|| verify_path(&path, &self.config), |replica| verify(replica.handle()));
                (StoreRole::Replica(slot), path, verdict)
            }
        };
        if slot.is_none() {
            *lock(&self.last_verdict) = Some(verdict.clone());
        }
        let severity = if verdict.ok { AuditSeverity::Info } else { AuditSeverity::Error };
        let mut event = StoreAuditEvent::new(StoreEventKind::IntegrityChecked, severity)
            .with_store(role, &path);
        if let Some(detail) = &verdict.detail {
            event = event.with_detail(detail.clone());
        }
        self.record(&event);
        verdict
    }

    /// Runs migration, verification, and recovery once before serving.
    ///
    /// After a successful recovery the schema is ensured again on the new
    /// primary.
    ///
    /// # Errors
    ///
    /// Returns [`StartupError::Unrecoverable`] when the primary is corrupted,
    /// no replica can be promoted, and the policy is
    /// [`UnrecoverablePolicy::Abort`].
    pub fn startup(&mut self) -> Result<StartupReport, StartupError> {
        let migration = ensure_schema(self);
        let verdict = self.check_primary();
        if verdict.ok {
            return Ok(StartupReport {
                state: self.recovery_state(),
                migration,
                verdict,
                recovery: None,
                post_recovery_migration: None,
            });
        }

        let recovery = self.attempt_recovery();
        if recovery.success {
            let post = ensure_schema(self);
            return Ok(StartupReport {
                state: self.recovery_state(),
                migration,
                verdict,
                recovery: Some(recovery),
                post_recovery_migration: Some(post),
            });
        }

        match self.config.on_unrecoverable {
            UnrecoverablePolicy::Abort => Err(StartupError::Unrecoverable {
                attempts: recovery.attempts.len(),
            }),
            UnrecoverablePolicy::Degraded => Ok(StartupReport {
                state: self.recovery_state(),
                migration,
                verdict,
                recovery: Some(recovery),
                post_recovery_migration: None,
            }),
        }
    }

    /// Records an audit event.
    pub(crate) fn record(&self, event: &StoreAuditEvent) {
        self.audit.record(event);
    }

    /// Acquires the write lock.
    pub(crate) fn write_guard(&self) -> MutexGuard<'_, ()> {
        lock(&self.write_lock)
    }
}

// ============================================================================
// SECTION: Startup Report
// ============================================================================

/// Summary of one startup run.
#[derive(Debug, Clone, Serialize)]
pub struct StartupReport {
    /// Recovery state once startup finished.
    pub state: RecoveryState,
    /// Migration run before verification.
    pub migration: MigrationReport,
    /// Primary verdict before any recovery.
    pub verdict: IntegrityVerdict,
    /// Recovery run, when the primary failed verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery: Option<RecoveryReport>,
    /// Migration re-run against a promoted primary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_recovery_migration: Option<MigrationReport>,
}

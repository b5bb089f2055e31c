// crates/fintrack-store-sqlite/src/lib.rs
// ============================================================================
// Module: Fintrack SQLite Store Library
// Description: Replicated SQLite storage for Fintrack records.
// Purpose: Durable primary store with best-effort replicas and self-healing.
// Dependencies: fintrack-core, rusqlite, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! One primary `SQLite` file is the source of truth. Up to two replica files
//! receive every committed [`fintrack_core::Mutation`] on a best-effort
//! basis. At startup the primary is migrated and verified; if it is
//! corrupted, the first healthy replica is copied over it.
//!
//! Entry points live on [`StorageContext`]:
//! [`StorageContext::with_replicated_write`] for writes,
//! [`StorageContext::verify_integrity`] and
//! [`StorageContext::restore_from_replica`] for operators,
//! [`StorageContext::startup`] and [`StorageContext::health`] for the
//! process lifecycle. [`Repository`] wraps all of this per record type.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod apply;
pub mod audit;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod handle;
pub mod health;
pub mod integrity;
pub mod migration;
pub mod recovery;
pub mod replica;
pub mod repository;
pub mod schema;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSeverity;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::StoreAuditEvent;
pub use audit::StoreAuditSink;
pub use audit::StoreEventKind;
pub use config::SqliteStoreConfig;
pub use config::SqliteStoreMode;
pub use config::SqliteSyncMode;
pub use config::UnrecoverablePolicy;
pub use context::StartupReport;
pub use context::StorageContext;
pub use coordinator::BackupWriteWarning;
pub use coordinator::ReplicaWriteFailure;
pub use coordinator::ReplicatedWrite;
pub use coordinator::ReplicationOutcome;
pub use coordinator::ReplicationStatus;
pub use error::SqliteStoreError;
pub use error::StartupError;
pub use error::WriteError;
pub use handle::StoreHandle;
pub use handle::StoreRole;
pub use health::HealthReport;
pub use health::PrimaryHealth;
pub use health::ReplicaHealth;
pub use integrity::IntegrityVerdict;
pub use integrity::verify;
pub use integrity::verify_path;
pub use migration::MigrationReport;
pub use migration::ensure_schema;
pub use recovery::RecoveryAttempt;
pub use recovery::RecoveryReport;
pub use recovery::RecoveryState;
pub use replica::ReplicaSlot;
pub use repository::CategoryTotal;
pub use repository::Repository;
pub use repository::TableRecord;
pub use schema::SCHEMA_VERSION;

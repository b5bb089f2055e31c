// crates/fintrack-store-sqlite/src/audit.rs
// ============================================================================
// Module: Store Audit Logging
// Description: Structured events for replication, integrity, and recovery.
// Purpose: Emit JSON-line audit logs without a logging framework dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every notable storage event (a replica write failing, a recovery attempt,
//! a migration step failing) is recorded as a [`StoreAuditEvent`] through a
//! [`StoreAuditSink`]. Sinks are cheap to share and never fail the caller:
//! a sink that cannot write drops the event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::handle::StoreRole;

// ============================================================================
// SECTION: Event Kinds
// ============================================================================

/// Audit event names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreEventKind {
    /// A replicated write failed on one replica.
    ReplicaWriteFailed,
    /// Every attempted replica failed one write.
    BackupWriteFailed,
    /// An integrity check completed.
    IntegrityChecked,
    /// One replica was considered as a recovery source.
    RecoveryAttempt,
    /// A replica was promoted to primary.
    RecoveryCompleted,
    /// No replica could be promoted.
    RecoveryUnrecoverable,
    /// One migration or seeding step failed.
    MigrationStepFailed,
    /// Schema was ensured on a store.
    SchemaEnsured,
    /// A replica could not be opened at startup.
    ReplicaOpenFailed,
    /// The primary could not be opened.
    PrimaryOpenFailed,
}

impl StoreEventKind {
    /// Returns the event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReplicaWriteFailed => "replica_write_failed",
            Self::BackupWriteFailed => "backup_write_failed",
            Self::IntegrityChecked => "integrity_checked",
            Self::RecoveryAttempt => "recovery_attempt",
            Self::RecoveryCompleted => "recovery_completed",
            Self::RecoveryUnrecoverable => "recovery_unrecoverable",
            Self::MigrationStepFailed => "migration_step_failed",
            Self::SchemaEnsured => "schema_ensured",
            Self::ReplicaOpenFailed => "replica_open_failed",
            Self::PrimaryOpenFailed => "primary_open_failed",
        }
    }
}

/// Audit severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSeverity {
    /// Routine event.
    Info,
    /// Degraded durability, no data loss.
    Warning,
    /// A step failed.
    Error,
    /// The store cannot be trusted.
    Critical,
}

// ============================================================================
// SECTION: Event Payload
// ============================================================================

/// Store audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreAuditEvent {
    /// Event name.
    pub event: StoreEventKind,
    /// Event timestamp (ms since epoch).
    pub timestamp_ms: u128,
    /// Severity.
    pub severity: AuditSeverity,
    /// Store the event refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    /// File path the event refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Failure or outcome detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StoreAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(event: StoreEventKind, severity: AuditSeverity) -> Self {
        Self {
            event,
            timestamp_ms: now_ms(),
            severity,
            store: None,
            path: None,
            detail: None,
        }
    }

    /// Attaches the store role and path.
    #[must_use]
    pub fn with_store(mut self, role: StoreRole, path: &Path) -> Self {
        self.store = Some(role.to_string());
        self.path = Some(path.display().to_string());
        self
    }

    /// Attaches a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Returns the current timestamp in milliseconds.
pub(crate) fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |duration| duration.as_millis())
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for store events.
pub trait StoreAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &StoreAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StoreAuditSink for StderrAuditSink {
    fn record(&self, event: &StoreAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// File handle guarded for concurrent writes.
    file: Mutex<File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl StoreAuditSink for FileAuditSink {
    fn record(&self, event: &StoreAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl StoreAuditSink for NoopAuditSink {
    fn record(&self, _event: &StoreAuditEvent) {}
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Captured events in arrival order.
    events: Mutex<Vec<StoreAuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every captured event.
    #[must_use]
    pub fn events(&self) -> Vec<StoreAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns captured events of one kind.
    #[must_use]
    pub fn events_of(&self, kind: StoreEventKind) -> Vec<StoreAuditEvent> {
        self.events().into_iter().filter(|event| event.event == kind).collect()
    }
}

impl StoreAuditSink for MemoryAuditSink {
    fn record(&self, event: &StoreAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use std::path::PathBuf;

    use super::*;
    use crate::replica::ReplicaSlot;

    #[test]
    fn event_serializes_as_snake_case_json_line() {
        let event = StoreAuditEvent::new(StoreEventKind::ReplicaWriteFailed, AuditSeverity::Warning)
            .with_store(StoreRole::Replica(ReplicaSlot::Second), &PathBuf::from("r/replica-2.sqlite"))
            .with_detail("replica file is missing");
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "replica_write_failed");
        assert_eq!(json["severity"], "warning");
        assert_eq!(json["store"], "replica-2");
        assert_eq!(json["detail"], "replica file is missing");
    }

    #[test]
    fn file_sink_appends_lines() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(&StoreAuditEvent::new(StoreEventKind::SchemaEnsured, AuditSeverity::Info));
        sink.record(&StoreAuditEvent::new(StoreEventKind::IntegrityChecked, AuditSeverity::Info));
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("\"integrity_checked\""));
    }
}

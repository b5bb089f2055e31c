// crates/fintrack-store-sqlite/src/handle.rs
// ============================================================================
// Module: Store Handle
// Description: One writer connection plus a reader pool over a single file.
// Purpose: Give the coordinator and recovery a closable, reopenable store.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! A [`StoreHandle`] owns the connections for one `SQLite` file. The writer
//! sits behind a mutex and serializes all writes; readers are chosen
//! round-robin. A handle can be closed and reopened in place, which is how
//! recovery swaps the primary file underneath a live context.
//!
//! ## Invariants
//! - A handle that failed to open stays closed; every operation on it fails.
//! - Replica handles have no reader pool; reads go through the writer.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use serde::Serialize;

use crate::config::SqliteStoreConfig;
use crate::config::SqliteStoreMode;
use crate::config::SqliteSyncMode;
use crate::error::SqliteStoreError;
use crate::replica::ReplicaSlot;

// ============================================================================
// SECTION: Labels
// ============================================================================

/// Role of a store within the replica set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreRole {
    /// The authoritative store.
    Primary,
    /// A best-effort copy.
    Replica(ReplicaSlot),
}

impl fmt::Display for StoreRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => f.write_str("primary"),
            Self::Replica(slot) => write!(f, "replica-{}", slot.number()),
        }
    }
}

// ============================================================================
// SECTION: Connection Settings
// ============================================================================

/// Pragmas and pool size applied when a handle opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Journal mode.
    pub journal_mode: SqliteStoreMode,
    /// Synchronous mode.
    pub sync_mode: SqliteSyncMode,
    /// Reader connections to open alongside the writer.
    pub read_pool_size: usize,
}

impl ConnectionSettings {
    /// Settings for the primary store.
    #[must_use]
    pub const fn primary(config: &SqliteStoreConfig) -> Self {
        Self {
            busy_timeout_ms: config.busy_timeout_ms,
            journal_mode: config.journal_mode,
            sync_mode: config.sync_mode,
            read_pool_size: config.read_pool_size,
        }
    }

    /// Settings for a replica store (no reader pool).
    #[must_use]
    pub const fn replica(config: &SqliteStoreConfig) -> Self {
        Self {
            read_pool_size: 0,
            ..Self::primary(config)
        }
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Connection set for one store file.
pub struct StoreHandle {
    /// Role label used in audit events and health.
    role: StoreRole,
    /// Database file path.
    path: PathBuf,
    /// Pragmas applied on open.
    settings: ConnectionSettings,
    /// Writer connection; `None` while closed.
    writer: Mutex<Option<Connection>>,
    /// Reader connections; `None` while closed.
    readers: Vec<Mutex<Option<Connection>>>,
    /// Round-robin reader cursor.
    read_cursor: AtomicUsize,
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHandle")
            .field("role", &self.role)
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl StoreHandle {
    /// Creates a closed handle.
    #[must_use]
    pub fn new(role: StoreRole, path: impl Into<PathBuf>, settings: ConnectionSettings) -> Self {
        let readers = (0 .. settings.read_pool_size).map(|_| Mutex::new(None)).collect();
        Self {
            role,
            path: path.into(),
            settings,
            writer: Mutex::new(None),
            readers,
            read_cursor: AtomicUsize::new(0),
        }
    }

    /// Returns the role label.
    #[must_use]
    pub const fn role(&self) -> StoreRole {
        self.role
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true when the writer connection is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        lock(&self.writer).is_some()
    }

    /// Opens (or reopens) every connection, creating the file if absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the file cannot be opened or the
    /// pragmas fail (for example on a file that is not a database). The
    /// handle is left closed in that case.
    pub fn open(&self) -> Result<(), SqliteStoreError> {
        self.open_connections(true)
    }

    /// Opens (or reopens) every connection; an absent file stays absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Io`] when the file does not exist, or the
    /// errors of [`StoreHandle::open`]. The handle is left closed.
    pub fn open_if_present(&self) -> Result<(), SqliteStoreError> {
        if !self.path.is_file() {
            self.close();
            return Err(SqliteStoreError::Io(format!(
                "{} file {} is missing",
                self.role,
                self.path.display()
            )));
        }
        self.open_connections(false)
    }

    /// Shared body of [`StoreHandle::open`] and [`StoreHandle::open_if_present`].
    fn open_connections(&self, create: bool) -> Result<(), SqliteStoreError> {
        self.close();
        let writer = open_connection(&self.path, &self.settings, create)?;
        let mut readers = Vec::with_capacity(self.readers.len());
        for _ in &self.readers {
            readers.push(open_connection(&self.path, &self.settings, create)?);
        }
        for (slot, connection) in self.readers.iter().zip(readers) {
            *lock(slot) = Some(connection);
        }
        *lock(&self.writer) = Some(writer);
        Ok(())
    }

    /// Closes every connection. Idempotent.
    pub fn close(&self) {
        let writer = lock(&self.writer).take();
        drop(writer);
        for slot in &self.readers {
            let reader = lock(slot).take();
            drop(reader);
        }
    }

    /// Runs `f` with exclusive access to the writer connection.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Io`] when the handle is closed, or the
    /// error produced by `f`.
    pub fn with_writer<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut guard = lock(&self.writer);
        let Some(connection) = guard.as_mut() else {
            return Err(self.closed_error());
        };
        f(connection)
    }

    /// Runs `f` on a pooled reader, or on the writer when there is no pool.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Io`] when the handle is closed, or the
    /// error produced by `f`.
    pub fn with_reader<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        if self.readers.is_empty() {
            return self.with_writer(|connection| f(connection));
        }
        let index = self.read_cursor.fetch_add(1, Ordering::Relaxed) % self.readers.len();
        let guard = lock(&self.readers[index]);
        let Some(connection) = guard.as_ref() else {
            return Err(self.closed_error());
        };
        f(connection)
    }

    /// Reads the schema version marker (`PRAGMA user_version`).
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the handle is closed or the read fails.
    pub fn schema_version(&self) -> Result<i64, SqliteStoreError> {
        self.with_reader(|connection| {
            connection
                .query_row("PRAGMA user_version", [], |row| row.get(0))
                .map_err(|err| SqliteStoreError::Db(err.to_string()))
        })
    }

    /// Flushes the WAL into the main file and truncates it.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the checkpoint fails or is blocked.
    pub fn checkpoint(&self) -> Result<(), SqliteStoreError> {
        self.with_writer(|connection| checkpoint_connection(connection))
    }

    /// Error returned for any operation on a closed handle.
    fn closed_error(&self) -> SqliteStoreError {
        SqliteStoreError::Io(format!("{} store handle is closed", self.role))
    }
}

// ============================================================================
// SECTION: Connection Helpers
// ============================================================================

/// Locks a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Opens a `SQLite` connection with pragmas applied.
fn open_connection(
    path: &Path,
    settings: &ConnectionSettings,
    create: bool,
) -> Result<Connection, SqliteStoreError> {
    let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    if create {
        flags |= OpenFlags::SQLITE_OPEN_CREATE;
    }
    let connection = Connection::open_with_flags(path, flags)
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    apply_pragmas(&connection, settings)?;
    Ok(connection)
}

/// Opens an existing file without creating it; used for one-off checks.
pub(crate) fn open_existing(
    path: &Path,
    busy_timeout_ms: u64,
) -> Result<Connection, SqliteStoreError> {
    if !path.is_file() {
        return Err(SqliteStoreError::Io(format!("{} does not exist", path.display())));
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    let connection = Connection::open_with_flags(path, flags)
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    connection
        .busy_timeout(Duration::from_millis(busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    settings: &ConnectionSettings,
) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(Duration::from_millis(settings.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", settings.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", settings.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    Ok(())
}

/// Runs a truncating WAL checkpoint; a busy result is an error.
pub(crate) fn checkpoint_connection(connection: &Connection) -> Result<(), SqliteStoreError> {
    let busy: i64 = connection
        .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| row.get(0))
        .map_err(|err| SqliteStoreError::from_db(&err))?;
    if busy != 0 {
        return Err(SqliteStoreError::Db("wal checkpoint was blocked by a reader".to_string()));
    }
    Ok(())
}

/// Creates the parent directory of a store path.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    fn settings(read_pool_size: usize) -> ConnectionSettings {
        let config = SqliteStoreConfig::new("unused.sqlite");
        ConnectionSettings {
            read_pool_size,
            ..ConnectionSettings::primary(&config)
        }
    }

    #[test]
    fn closed_handle_rejects_work_and_reopens() {
        let dir = tempfile::TempDir::new().unwrap();
        let handle = StoreHandle::new(StoreRole::Primary, dir.path().join("a.sqlite"), settings(2));
        assert!(!handle.is_open());
        assert!(handle.schema_version().is_err());
        handle.open().unwrap();
        assert_eq!(handle.schema_version().unwrap(), 0);
        handle.close();
        handle.close();
        assert!(handle.with_writer(|_| Ok(())).is_err());
        handle.open().unwrap();
        assert!(handle.is_open());
    }

    #[test]
    fn open_if_present_never_creates_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("replica-1.sqlite");
        let handle = StoreHandle::new(StoreRole::Replica(ReplicaSlot::First), &path, settings(0));
        let err = handle.open_if_present().unwrap_err();
        assert!(err.to_string().contains("is missing"));
        assert!(!handle.is_open());
        assert!(!path.exists());

        handle.open().unwrap();
        handle.close();
        handle.open_if_present().unwrap();
        assert!(handle.is_open());
    }

    #[test]
    fn garbage_file_leaves_handle_closed() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("junk.sqlite");
        std::fs::write(&path, vec![0x5a_u8; 8192]).unwrap();
        let handle = StoreHandle::new(StoreRole::Primary, &path, settings(1));
        assert!(handle.open().is_err());
        assert!(!handle.is_open());
    }

    #[test]
    fn replica_role_displays_slot() {
        assert_eq!(StoreRole::Replica(ReplicaSlot::Second).to_string(), "replica-2");
        assert_eq!(StoreRole::Primary.to_string(), "primary");
    }
}

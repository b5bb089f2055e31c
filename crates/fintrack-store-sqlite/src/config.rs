// crates/fintrack-store-sqlite/src/config.rs
// ============================================================================
// Module: SQLite Store Configuration
// Description: Paths, pragmas, and policies for the replicated store.
// Purpose: Describe where the primary and replica files live and how to open them.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`SqliteStoreConfig`] names the primary file, the replica directory, how
//! many replicas to maintain (zero to two), the pragmas applied to every
//! connection, and what to do when the primary cannot be recovered.
//!
//! ## Invariants
//! - `replicas` is at most [`MAX_REPLICAS`].
//! - Replica files always use the fixed names `replica-1.sqlite` and
//!   `replica-2.sqlite` so recovery can locate them across restarts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::error::SqliteStoreError;
use crate::replica::ReplicaSlot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default number of reader connections on the primary.
const DEFAULT_READ_POOL_SIZE: usize = 2;
/// Upper bound for the reader pool.
pub const MAX_READ_POOL_SIZE: usize = 16;
/// Maximum number of replicas.
pub const MAX_REPLICAS: u8 = 2;
/// Replica directory name used when none is configured.
pub const DEFAULT_REPLICA_DIR_NAME: &str = "replicas";
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Pragmas
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Behavior when the primary is corrupted and no replica can be promoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnrecoverablePolicy {
    /// Fail startup.
    #[default]
    Abort,
    /// Keep the process up for reads and health checks but refuse writes.
    Degraded,
}

// ============================================================================
// SECTION: Config
// ============================================================================

/// Configuration for the replicated `SQLite` store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the primary `SQLite` database file.
    pub path: PathBuf,
    /// Directory holding replica files (defaults to `<primary dir>/replicas`).
    #[serde(default)]
    pub replica_dir: Option<PathBuf>,
    /// Number of replicas to maintain (0..=2).
    #[serde(default = "default_replicas")]
    pub replicas: u8,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Number of reader connections opened on the primary.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
    /// What to do when recovery is exhausted.
    #[serde(default)]
    pub on_unrecoverable: UnrecoverablePolicy,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for everything but the path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            replica_dir: None,
            replicas: default_replicas(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: DEFAULT_READ_POOL_SIZE,
            on_unrecoverable: UnrecoverablePolicy::default(),
        }
    }

    /// Sets the replica count.
    #[must_use]
    pub const fn with_replicas(mut self, replicas: u8) -> Self {
        self.replicas = replicas;
        self
    }

    /// Sets the unrecoverable-primary policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: UnrecoverablePolicy) -> Self {
        self.on_unrecoverable = policy;
        self
    }

    /// Returns the resolved replica directory.
    #[must_use]
    pub fn replica_dir(&self) -> PathBuf {
        if let Some(dir) = &self.replica_dir {
            return dir.clone();
        }
        self.path
            .parent()
            .map_or_else(|| PathBuf::from(DEFAULT_REPLICA_DIR_NAME), |parent| {
                parent.join(DEFAULT_REPLICA_DIR_NAME)
            })
    }

    /// Returns the well-known file path for a replica slot.
    #[must_use]
    pub fn replica_path(&self, slot: ReplicaSlot) -> PathBuf {
        self.replica_dir().join(slot.file_name())
    }

    /// Returns the replica slots enabled by this configuration.
    #[must_use]
    pub fn enabled_slots(&self) -> Vec<ReplicaSlot> {
        ReplicaSlot::ALL.into_iter().filter(|slot| slot.number() <= self.replicas).collect()
    }

    /// Validates limits and paths.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError::Invalid`] when a field is out of range.
    pub fn validate(&self) -> Result<(), SqliteStoreError> {
        if self.replicas > MAX_REPLICAS {
            return Err(SqliteStoreError::Invalid(format!(
                "replicas must be between 0 and {MAX_REPLICAS}, got {}",
                self.replicas
            )));
        }
        if self.busy_timeout_ms == 0 {
            return Err(SqliteStoreError::Invalid(
                "busy_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.read_pool_size == 0 || self.read_pool_size > MAX_READ_POOL_SIZE {
            return Err(SqliteStoreError::Invalid(format!(
                "read_pool_size must be between 1 and {MAX_READ_POOL_SIZE}"
            )));
        }
        validate_store_path(&self.path)?;
        if self.replicas > 0 {
            let dir = self.replica_dir();
            validate_path_limits(&dir)?;
            if dir.exists() && !dir.is_dir() {
                return Err(SqliteStoreError::Invalid(
                    "replica_dir must be a directory".to_string(),
                ));
            }
            for slot in self.enabled_slots() {
                if self.replica_path(slot) == self.path {
                    return Err(SqliteStoreError::Invalid(
                        "replica path must differ from the primary path".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Returns the default replica count.
const fn default_replicas() -> u8 {
    MAX_REPLICAS
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default reader pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Path Checks
// ============================================================================

/// Validates store paths for safety limits.
pub(crate) fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteStoreError::Invalid("store path must not be empty".to_string()));
    }
    validate_path_limits(path)?;
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Validates total and per-component path length.
fn validate_path_limits(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use super::*;

    #[test]
    fn replica_dir_defaults_next_to_primary() {
        let config = SqliteStoreConfig::new("/var/lib/fintrack/finance.sqlite");
        assert_eq!(config.replica_dir(), PathBuf::from("/var/lib/fintrack/replicas"));
        assert_eq!(
            config.replica_path(ReplicaSlot::Second),
            PathBuf::from("/var/lib/fintrack/replicas/replica-2.sqlite")
        );
    }

    #[test]
    fn enabled_slots_follow_replica_count() {
        let config = SqliteStoreConfig::new("/tmp/a.sqlite").with_replicas(1);
        assert_eq!(config.enabled_slots(), vec![ReplicaSlot::First]);
        let config = config.with_replicas(0);
        assert!(config.enabled_slots().is_empty());
    }

    #[test]
    fn validate_rejects_three_replicas_and_empty_pool() {
        let config = SqliteStoreConfig::new("/tmp/a.sqlite").with_replicas(3);
        assert!(config.validate().is_err());
        let mut config = SqliteStoreConfig::new("/tmp/a.sqlite");
        config.read_pool_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_overlong_component() {
        let name = format!("{}.sqlite", "x".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        let config = SqliteStoreConfig::new(PathBuf::from("/tmp").join(name)).with_replicas(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("overlong component"));
    }
}

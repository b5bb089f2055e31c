// crates/fintrack-config/src/config.rs
// ============================================================================
// Module: Fintrack Configuration
// Description: Configuration loading and validation for Fintrack.
// Purpose: Strict, fail-closed TOML parsing with hard size and path limits.
// Dependencies: fintrack-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is read from `--config`, then `FINTRACK_CONFIG`, then
//! `fintrack.toml` in the working directory. Files larger than 1 MiB or not
//! valid UTF-8 are rejected before parsing. A loaded config yields the
//! [`SqliteStoreConfig`] and audit sink the store is opened with.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

use fintrack_store_sqlite::FileAuditSink;
use fintrack_store_sqlite::NoopAuditSink;
use fintrack_store_sqlite::SqliteStoreConfig;
use fintrack_store_sqlite::SqliteStoreMode;
use fintrack_store_sqlite::SqliteSyncMode;
use fintrack_store_sqlite::StderrAuditSink;
use fintrack_store_sqlite::StoreAuditSink;
use fintrack_store_sqlite::UnrecoverablePolicy;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "fintrack.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FINTRACK_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default primary database file.
const DEFAULT_STORE_PATH: &str = "fintrack.sqlite";
/// Default replica count.
const DEFAULT_REPLICAS: u8 = 2;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default primary reader pool size.
const DEFAULT_READ_POOL_SIZE: usize = 2;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Top-level Fintrack configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FintrackConfig {
    /// Primary and replica storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Startup recovery settings.
    #[serde(default)]
    pub recovery: RecoveryConfig,
    /// Audit event sink settings.
    #[serde(default)]
    pub audit: AuditConfig,
    /// File the configuration was loaded from (not serialized).
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl FintrackConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved)
            .map_err(|err| ConfigError::Io(format!("{}: {err}", resolved.display())))?;
        let mut config = Self::from_bytes(&bytes)?;
        config.source = Some(resolved);
        Ok(config)
    }

    /// Parses and validates configuration from raw file bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bytes are oversized, not UTF-8, not
    /// valid TOML, or fail validation.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.audit.validate()?;
        self.store_config()
            .validate()
            .map_err(|err| ConfigError::Invalid(format!("storage: {err}")))
    }

    /// Builds the store configuration from the storage and recovery sections.
    #[must_use]
    pub fn store_config(&self) -> SqliteStoreConfig {
        let mut config = SqliteStoreConfig::new(self.storage.path.clone())
            .with_replicas(self.storage.replicas)
            .with_policy(self.recovery.on_unrecoverable);
        config.replica_dir.clone_from(&self.storage.replica_dir);
        config.busy_timeout_ms = self.storage.busy_timeout_ms;
        config.journal_mode = self.storage.journal_mode;
        config.sync_mode = self.storage.sync_mode;
        config.read_pool_size = self.storage.read_pool_size;
        config
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the audit log file cannot be opened.
    pub fn audit_sink(&self) -> Result<Arc<dyn StoreAuditSink>, ConfigError> {
        match self.audit.sink {
            AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
            AuditSinkKind::File => {
                let path = self.audit.path.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("audit.path is required for the file sink".to_string())
                })?;
                let sink = FileAuditSink::new(path)
                    .map_err(|err| ConfigError::Io(format!("{}: {err}", path.display())))?;
                Ok(Arc::new(sink))
            }
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Primary database path.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Replica directory (defaults to `<primary dir>/replicas`).
    #[serde(default)]
    pub replica_dir: Option<PathBuf>,
    /// Number of replicas (0..=2).
    #[serde(default = "default_replicas")]
    pub replicas: u8,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Reader connections opened on the primary.
    #[serde(default = "default_read_pool_size")]
    pub read_pool_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            replica_dir: None,
            replicas: default_replicas(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            read_pool_size: default_read_pool_size(),
        }
    }
}

impl StorageConfig {
    /// Validates storage paths; numeric limits are checked by the store.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_field("storage.path", &self.path)?;
        if let Some(dir) = &self.replica_dir {
            validate_path_field("storage.replica_dir", dir)?;
        }
        Ok(())
    }
}

/// `[recovery]` section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Behavior when the primary is corrupted and no replica is usable.
    #[serde(default)]
    pub on_unrecoverable: UnrecoverablePolicy,
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard events.
    None,
}

/// `[audit]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Log file path for the file sink.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (_, Some(path)) => validate_path_field("audit.path", path),
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_from(path, env::var(CONFIG_ENV_VAR).ok())
}

/// Resolves the config path given an optional environment value.
fn resolve_from(path: Option<&Path>, env_path: Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Some(env_path) = env_path {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved config path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a configured path value.
fn validate_path_field(field: &str, path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in path.components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} component too long")));
        }
    }
    Ok(())
}

/// Default primary database path.
fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

/// Default replica count.
const fn default_replicas() -> u8 {
    DEFAULT_REPLICAS
}

/// Default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default reader pool size.
const fn default_read_pool_size() -> usize {
    DEFAULT_READ_POOL_SIZE
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test fixtures use explicit asserts and unwraps for clarity."
    )]

    use super::*;

    #[test]
    fn explicit_path_wins_over_environment() {
        let resolved =
            resolve_from(Some(Path::new("cli.toml")), Some("env.toml".to_string())).unwrap();
        assert_eq!(resolved, PathBuf::from("cli.toml"));
    }

    #[test]
    fn environment_wins_over_default() {
        assert_eq!(
            resolve_from(None, Some("env.toml".to_string())).unwrap(),
            PathBuf::from("env.toml")
        );
        assert_eq!(resolve_from(None, None).unwrap(), PathBuf::from(DEFAULT_CONFIG_NAME));
    }

    #[test]
    fn overlong_environment_path_is_rejected() {
        let err = resolve_from(None, Some("a".repeat(MAX_TOTAL_PATH_LENGTH + 1))).unwrap_err();
        assert!(err.to_string().contains("config path exceeds max length"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = FintrackConfig::from_bytes(b"").unwrap();
        assert_eq!(config.storage, StorageConfig::default());
        assert_eq!(config.recovery.on_unrecoverable, UnrecoverablePolicy::Abort);
        assert_eq!(config.audit.sink, AuditSinkKind::Stderr);
        let store = config.store_config();
        assert_eq!(store.replicas, DEFAULT_REPLICAS);
        assert_eq!(store.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn blank_storage_path_is_rejected() {
        let err = FintrackConfig::from_bytes(b"[storage]\npath = \"  \"\n").unwrap_err();
        assert!(err.to_string().contains("storage.path must be non-empty"));
    }
}

//! Registry configuration via `smp.toml`
//!
//! On first open a commented default `smp.toml` is written to the data
//! directory. To change settings, edit the file and restart.

use serde::{Deserialize, Serialize};
use smp_durability::{DurabilityMode, WalStoreConfig, DEFAULT_SNAPSHOT_THRESHOLD};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file name placed in the registry data directory.
pub const CONFIG_FILE_NAME: &str = "smp.toml";

/// Default SQLite file name, relative to the data directory.
pub const DEFAULT_SQL_FILE: &str = "smp.db";

/// Errors raised while loading or validating the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        /// Config file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The config file could not be written
    #[error("Failed to write config file '{path}': {source}")]
    Write {
        /// Config file
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`RegistryConfig`]
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        /// Config file
        path: PathBuf,
        /// Parser error
        source: toml::de::Error,
    },

    /// The config could not be serialized
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Unknown durability mode
    #[error("Invalid durability mode '{0}' in smp.toml. Expected \"always\" or \"standard\".")]
    InvalidDurability(String),

    /// Snapshot threshold of zero
    #[error("snapshot_threshold must be at least 1")]
    InvalidSnapshotThreshold,

    /// `sql_file` is empty
    #[error("sql_file must not be empty")]
    EmptySqlFile,

    /// The selected backend was not compiled in
    #[error("Backend '{0}' is not available in this build")]
    BackendUnavailable(BackendKind),
}

impl From<ConfigError> for smp_core::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::Read { .. } | ConfigError::Write { .. } => {
                smp_core::Error::storage_caused("Failed to access registry configuration", e)
            }
            other => smp_core::Error::Validation(other.to_string()),
        }
    }
}

/// Storage backend of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-memory collections with snapshot + recovery log per collection
    #[default]
    Wal,
    /// SQLite database
    Sql,
    /// Volatile, nothing is written to disk
    Memory,
}

impl BackendKind {
    /// Name as written in `smp.toml`
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::Wal => "wal",
            BackendKind::Sql => "sql",
            BackendKind::Memory => "memory",
        }
    }

    /// True if the backend writes to the data directory
    pub fn is_persistent(&self) -> bool {
        !matches!(self, BackendKind::Memory)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registry configuration loaded from `smp.toml`.
///
/// # Example
///
/// ```toml
/// backend = "wal"
/// durability = "always"
/// snapshot_threshold = 1000
/// sql_file = "smp.db"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Storage backend: `"wal"`, `"sql"` or `"memory"`.
    #[serde(default)]
    pub backend: BackendKind,
    /// Durability mode of the WAL backend: `"always"` or `"standard"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Recovery log records that trigger a snapshot rewrite.
    #[serde(default = "default_snapshot_threshold")]
    pub snapshot_threshold: usize,
    /// SQLite file of the SQL backend, relative to the data directory.
    #[serde(default = "default_sql_file")]
    pub sql_file: String,
}

fn default_durability_str() -> String {
    "always".to_string()
}

fn default_snapshot_threshold() -> usize {
    DEFAULT_SNAPSHOT_THRESHOLD
}

fn default_sql_file() -> String {
    DEFAULT_SQL_FILE.to_string()
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            durability: default_durability_str(),
            snapshot_threshold: default_snapshot_threshold(),
            sql_file: default_sql_file(),
        }
    }
}

impl RegistryConfig {
    /// Set the backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the durability mode string
    pub fn with_durability(mut self, durability: impl Into<String>) -> Self {
        self.durability = durability.into();
        self
    }

    /// Set the snapshot threshold
    pub fn with_snapshot_threshold(mut self, threshold: usize) -> Self {
        self.snapshot_threshold = threshold;
        self
    }

    /// Set the SQLite file
    pub fn with_sql_file(mut self, sql_file: impl Into<String>) -> Self {
        self.sql_file = sql_file.into();
        self
    }

    /// Parse the durability string into a `DurabilityMode`.
    pub fn durability_mode(&self) -> Result<DurabilityMode, ConfigError> {
        match self.durability.as_str() {
            "always" => Ok(DurabilityMode::Always),
            "standard" => Ok(DurabilityMode::standard_default()),
            other => Err(ConfigError::InvalidDurability(other.to_string())),
        }
    }

    /// Check every field
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.durability_mode()?;
        if self.snapshot_threshold == 0 {
            return Err(ConfigError::InvalidSnapshotThreshold);
        }
        if self.backend == BackendKind::Sql {
            if self.sql_file.trim().is_empty() {
                return Err(ConfigError::EmptySqlFile);
            }
            if !cfg!(feature = "sql") {
                return Err(ConfigError::BackendUnavailable(BackendKind::Sql));
            }
        }
        Ok(())
    }

    /// Settings for the WAL backend's stores
    pub fn wal_store_config(&self) -> Result<WalStoreConfig, ConfigError> {
        Ok(WalStoreConfig::default()
            .with_durability(self.durability_mode()?)
            .with_snapshot_threshold(self.snapshot_threshold))
    }

    /// SQLite file inside `data_dir`
    pub fn sql_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(&self.sql_file)
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# SMP registry configuration
#
# Storage backend: "wal" (default), "sql" or "memory"
#   "wal"    = in-memory collections, snapshot + recovery log per collection
#   "sql"    = SQLite database (see sql_file)
#   "memory" = nothing is written, data is lost on shutdown
backend = "wal"

# Durability mode of the wal backend: "always" (default) or "standard"
#   "always"   = fsync every record, zero data loss
#   "standard" = periodic fsync (~100ms), may lose last interval on crash
durability = "always"

# Recovery log records that trigger a snapshot rewrite (default: 1000)
snapshot_threshold = 1000

# SQLite file of the sql backend, relative to this directory
sql_file = "smp.db"
"#
    }

    /// Read, parse and validate config from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RegistryConfig =
            toml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `true` if the file was written.
    pub fn write_default_if_missing(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        std::fs::write(path, Self::default_toml()).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(true)
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

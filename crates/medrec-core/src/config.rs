//! Storage configuration.
//!
//! Read once from the environment (or command-line flags when embedded in a
//! CLI) and handed to [`Store::open`](crate::store::Store::open).
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `MEDREC_BACKEND` | document | `document` or `relational` |
//! | `MEDREC_DATA_FILE` | data/store.json | JSON document path |
//! | `MEDREC_DATABASE` | data/medrec.sqlite | SQLite database path |
//! | `MEDREC_POOL_SIZE` | 4 | Maximum pooled connections |
//! | `MEDREC_BUSY_TIMEOUT_MS` | 5000 | SQLite busy timeout (ms) |

use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};

use crate::store::{StoreError, StoreResult};

/// Which persistence backend serves the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Single JSON document on disk
    Document,
    /// Normalized SQLite tables
    Relational,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Document => write!(f, "document"),
            BackendKind::Relational => write!(f, "relational"),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Args)]
pub struct StoreConfig {
    /// Persistence backend.
    #[arg(long, env = "MEDREC_BACKEND", value_enum, default_value = "document")]
    pub backend: BackendKind,

    /// Path of the JSON document (document backend).
    #[arg(long, env = "MEDREC_DATA_FILE", default_value = "data/store.json")]
    pub data_file: PathBuf,

    /// Path of the SQLite database (relational backend).
    #[arg(long, env = "MEDREC_DATABASE", default_value = "data/medrec.sqlite")]
    pub database: PathBuf,

    /// Maximum number of pooled connections.
    #[arg(long, env = "MEDREC_POOL_SIZE", default_value = "4")]
    pub pool_size: u32,

    /// SQLite busy timeout in milliseconds.
    #[arg(long, env = "MEDREC_BUSY_TIMEOUT_MS", default_value = "5000")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Document,
            data_file: PathBuf::from("data/store.json"),
            database: PathBuf::from("data/medrec.sqlite"),
            pool_size: 4,
            busy_timeout_ms: 5000,
        }
    }
}

/// Parser wrapper so the environment can be read without touching argv.
#[derive(Debug, Parser)]
#[command(name = "medrec")]
struct EnvConfig {
    #[command(flatten)]
    store: StoreConfig,
}

impl StoreConfig {
    /// Build a configuration from environment variables and defaults.
    pub fn from_env() -> StoreResult<Self> {
        EnvConfig::try_parse_from(["medrec"])
            .map(|parsed| parsed.store)
            .map_err(|e| StoreError::Config(e.to_string()))
    }

    /// Document backend at the given path.
    pub fn document(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Document,
            data_file: path.into(),
            ..Default::default()
        }
    }

    /// Relational backend at the given database path.
    pub fn relational(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: BackendKind::Relational,
            database: path.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        match self.backend {
            BackendKind::Document => {
                if self.data_file.as_os_str().is_empty() {
                    errors.push("Data file path cannot be empty".to_string());
                }
            }
            BackendKind::Relational => {
                if self.pool_size == 0 {
                    errors.push("Pool size cannot be 0".to_string());
                }
                if self.database.as_os_str().is_empty() {
                    errors.push("Database path cannot be empty".to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

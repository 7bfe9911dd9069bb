//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection configuration.
    pub database: DatabaseConfig,

    /// Table manifest configuration.
    #[serde(default)]
    pub manifest: ManifestConfig,

    /// Export/import behavior configuration.
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// SQLite database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the database file.
    pub path: PathBuf,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// How long a statement waits on a locked database, in milliseconds (default: 5000).
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Which tables take part in export/import, and in what order.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ManifestConfig {
    /// Explicit processing order. Empty means derive it from foreign keys.
    #[serde(default)]
    pub tables: Vec<String>,

    /// Tables left out when the order is derived.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// Export/import behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Identity column used when a table has no primary key (default: "id").
    #[serde(default = "default_identity_column")]
    pub identity_column: String,

    /// Maximum row error details kept in an import report (default: 50).
    #[serde(default = "default_max_error_details")]
    pub max_error_details: usize,

    /// Version tag written into export documents (default: "1.0").
    #[serde(default = "default_export_version")]
    pub export_version: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            identity_column: default_identity_column(),
            max_error_details: default_max_error_details(),
            export_version: default_export_version(),
        }
    }
}

impl DatabaseConfig {
    /// Configuration for the given path with default pool settings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_connections: default_max_connections(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

/// Current export document format version.
pub const EXPORT_FORMAT_VERSION: &str = "1.0";

/// Default cap on retained row error details.
pub const DEFAULT_MAX_ERROR_DETAILS: usize = 50;

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_identity_column() -> String {
    "id".to_string()
}

fn default_max_error_details() -> usize {
    DEFAULT_MAX_ERROR_DETAILS
}

fn default_export_version() -> String {
    EXPORT_FORMAT_VERSION.to_string()
}

//! Error types for export and import operations.
//!
//! Only structural failures are represented here. A single row that fails to
//! import is not an error of the operation; it is recorded as a
//! [`RowError`](crate::import::RowError) in the import report.

use thiserror::Error;

/// Exit code for configuration errors.
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for rejected import requests.
pub const EXIT_VALIDATION_ERROR: u8 = 2;
/// Exit code for aborted (rolled back) imports.
pub const EXIT_TRANSACTION_ERROR: u8 = 3;
/// Exit code for store I/O failures.
pub const EXIT_STORE_ERROR: u8 = 4;
/// Exit code for schema and manifest failures.
pub const EXIT_SCHEMA_ERROR: u8 = 5;
/// Exit code for malformed JSON or YAML.
pub const EXIT_SERIALIZATION_ERROR: u8 = 6;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for dbport operations.
#[derive(Error, Debug)]
pub enum PortError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Import request rejected before any mutation
    #[error("Invalid import request: {0}")]
    Validation(String),

    /// Import aborted and rolled back
    #[error("Import aborted during {stage}: {message}")]
    Transaction { stage: String, message: String },

    /// Store query or connection error
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Schema introspection or manifest resolution failed
    #[error("Schema error: {0}")]
    Schema(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PortError {
    /// Create a Transaction error for the stage of the import that failed.
    pub fn transaction(stage: impl Into<String>, message: impl ToString) -> Self {
        PortError::Transaction {
            stage: stage.into(),
            message: message.to_string(),
        }
    }

    /// Machine-readable error category.
    pub fn category(&self) -> &'static str {
        match self {
            PortError::Config(_) => "config",
            PortError::Validation(_) => "validation",
            PortError::Transaction { .. } => "transaction",
            PortError::Store(_) => "store",
            PortError::Schema(_) => "schema",
            PortError::Io(_) => "io",
            PortError::Yaml(_) | PortError::Json(_) => "serialization",
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            PortError::Config(_) => EXIT_CONFIG_ERROR,
            PortError::Validation(_) => EXIT_VALIDATION_ERROR,
            PortError::Transaction { .. } => EXIT_TRANSACTION_ERROR,
            PortError::Store(_) => EXIT_STORE_ERROR,
            PortError::Schema(_) => EXIT_SCHEMA_ERROR,
            // A config file that does not parse is a config problem
            PortError::Yaml(_) => EXIT_CONFIG_ERROR,
            PortError::Json(_) => EXIT_SERIALIZATION_ERROR,
            PortError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error [{}]: {}\n", self.category(), self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for dbport operations.
pub type Result<T> = std::result::Result<T, PortError>;

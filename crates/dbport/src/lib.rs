//! # dbport
//!
//! Whole-database export and import for SQLite applications.
//!
//! This library moves every table of an application database in and out of a
//! single portable JSON document:
//!
//! - **Export** of all manifest tables, parents before children
//! - **Merge imports** that upsert rows by identity
//! - **Replace imports** that clear the manifest tables and re-insert
//! - **Row-level error isolation** inside one import transaction
//! - **Table order** derived from the foreign key graph
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbport::{Config, ImportOptions, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> dbport::Result<()> {
//!     let config = Config::load("dbport.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!
//!     let document = orchestrator.export().await?;
//!     let payload = serde_json::to_value(&document)?;
//!
//!     let request = orchestrator.parse_request("merge", payload)?;
//!     let report = orchestrator.import(&request, ImportOptions::default()).await?;
//!     println!("Imported {} rows", report.totals.imported);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod import;
pub mod manifest;
pub mod orchestrator;
pub mod store;

// Re-exports for convenient access
pub use config::{Config, DatabaseConfig, ManifestConfig, TransferConfig};
pub use error::{PortError, Result};
pub use export::{export_filename, ExportDocument, Exporter};
pub use import::{
    ErrorDetails, ImportMode, ImportOptions, ImportReport, ImportRequest, Importer, RowError,
    TableOutcome,
};
pub use manifest::TableManifest;
pub use orchestrator::{Diagnostics, HealthCheckResult, Orchestrator, SnapshotResult};
pub use store::Store;

//! Orchestrator - entry point tying the store, manifest, exporter, and importer together.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::export::{ExportDocument, Exporter};
use crate::import::{ImportOptions, ImportReport, ImportRequest, Importer};
use crate::manifest::TableManifest;
use crate::store::Store;

/// Connected store plus its resolved table manifest.
pub struct Orchestrator {
    config: Config,
    store: Store,
    manifest: TableManifest,
}

/// Pre-import diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Processing order.
    pub manifest: TableManifest,

    /// Current row count per manifest table; `None` if the table is gone.
    pub tables: IndexMap<String, Option<i64>>,
}

impl Diagnostics {
    /// Rows across all tables that still exist.
    pub fn total_rows(&self) -> i64 {
        self.tables.values().flatten().sum()
    }
}

/// Result of a store health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    /// Overall health status.
    pub healthy: bool,

    /// Database file checked.
    pub database: PathBuf,

    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,

    /// Error message if the check query failed.
    pub error: Option<String>,
}

/// Result of a raw database file copy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotResult {
    /// Where the copy was written.
    pub path: PathBuf,

    /// Bytes copied.
    pub bytes: u64,
}

impl Orchestrator {
    /// Connect to the configured store and resolve the manifest.
    pub async fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let store = Store::connect(&config.database).await?;
        let manifest = TableManifest::resolve(store.pool(), &config.manifest).await?;

        Ok(Self {
            config,
            store,
            manifest,
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolved table manifest.
    pub fn manifest(&self) -> &TableManifest {
        &self.manifest
    }

    /// Underlying store.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Export every manifest table.
    pub async fn export(&self) -> Result<ExportDocument> {
        Exporter::new(
            self.store.pool(),
            &self.manifest,
            self.config.transfer.export_version.as_str(),
        )
        .export()
        .await
    }

    /// Validate a raw payload against this store's manifest.
    pub fn parse_request(&self, mode: &str, payload: Value) -> Result<ImportRequest> {
        ImportRequest::parse(mode, payload, &self.manifest)
    }

    /// Apply a validated import request.
    pub async fn import(
        &self,
        request: &ImportRequest,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        Importer::new(self.store.pool(), &self.manifest, &self.config.transfer)
            .import(request, options)
            .await
    }

    /// Row count per manifest table, with the manifest itself.
    pub async fn diagnostics(&self) -> Result<Diagnostics> {
        let mut tables = IndexMap::with_capacity(self.manifest.len());
        for table in self.manifest.forward() {
            let count = self.store.count_rows(table).await?;
            match count {
                Some(n) => info!("{}: {} rows", table, n),
                None => warn!("{}: missing from the store", table),
            }
            tables.insert(table.to_string(), count);
        }

        Ok(Diagnostics {
            manifest: self.manifest.clone(),
            tables,
        })
    }

    /// Check that the store answers queries.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let (latency_ms, error) = match self.store.ping().await {
            Ok(ms) => (ms, None),
            Err(e) => (0, Some(e.to_string())),
        };

        Ok(HealthCheckResult {
            healthy: error.is_none(),
            database: self.store.path().to_path_buf(),
            latency_ms,
            error,
        })
    }

    /// Copy the raw database file to `dest`.
    pub async fn snapshot(&self, dest: &Path) -> Result<SnapshotResult> {
        let bytes = self.store.snapshot_to(dest).await?;
        info!("Wrote {} byte snapshot to {}", bytes, dest.display());
        Ok(SnapshotResult {
            path: dest.to_path_buf(),
            bytes,
        })
    }

    /// Close the store's connections.
    pub async fn close(self) {
        self.store.close().await;
    }
}

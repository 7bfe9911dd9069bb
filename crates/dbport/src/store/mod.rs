//! Connection pool for the SQLite store.
//!
//! The store is the only collaborator of the exporter and importer. It owns
//! transactions, foreign key enforcement, and schema reflection; this module
//! only opens it and answers a few whole-database questions.

pub mod introspect;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::core::identifier::quote_ident;
use crate::error::{PortError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite store handle.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    path: PathBuf,
}

impl Store {
    /// Open the database described by the configuration.
    ///
    /// The file must already exist: dbport moves data in and out of an
    /// application's database, it never creates one.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if !config.path.exists() {
            return Err(PortError::Config(format!(
                "database file not found: {}",
                config.path.display()
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(&config.path)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_millis(config.busy_timeout_ms));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        info!("Connected to SQLite store: {}", config.path.display());

        Ok(Self {
            pool,
            path: config.path.clone(),
        })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Row count of a table, or `None` if the table does not exist.
    pub async fn count_rows(&self, table: &str) -> Result<Option<i64>> {
        if introspect::table_columns(&self.pool, table).await?.is_none() {
            return Ok(None);
        }
        let sql = format!("SELECT COUNT(*) AS n FROM {}", quote_ident(table)?);
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        Ok(Some(row.get::<i64, _>("n")))
    }

    /// Round-trip latency of a trivial query, in milliseconds.
    pub async fn ping(&self) -> Result<u64> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(start.elapsed().as_millis() as u64)
    }

    /// Copy the raw database file to `dest`.
    ///
    /// The write-ahead log is checkpointed first so the main file holds
    /// every committed transaction. Returns the number of bytes copied.
    pub async fn snapshot_to(&self, dest: &Path) -> Result<u64> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        let bytes = tokio::fs::copy(&self.path, dest).await?;
        debug!(
            "Copied {} bytes from {} to {}",
            bytes,
            self.path.display(),
            dest.display()
        );
        Ok(bytes)
    }

    /// Close the pool, waiting for connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

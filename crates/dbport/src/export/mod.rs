//! Whole-database export to a portable JSON document.

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::core::identifier::quote_ident;
use crate::core::value::{row_to_json, Row};
use crate::error::{PortError, Result};
use crate::manifest::TableManifest;
use crate::store::introspect;

/// A snapshot of every manifest table.
///
/// Tables are read one after another without a shared read transaction, so
/// concurrent writers can leave tables mutually inconsistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    /// Export format version.
    pub version: String,

    /// When the export was taken.
    pub exported_at: DateTime<Utc>,

    /// Rows per table, in manifest order.
    pub data: IndexMap<String, Vec<Row>>,
}

impl ExportDocument {
    /// Total rows across all tables.
    pub fn total_rows(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }

    /// Row count per table, in manifest order.
    pub fn row_counts(&self) -> IndexMap<&str, usize> {
        self.data
            .iter()
            .map(|(table, rows)| (table.as_str(), rows.len()))
            .collect()
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Suggested file name for an export taken on `date`.
pub fn export_filename(date: NaiveDate) -> String {
    format!("dbport-export-{}.json", date.format("%Y-%m-%d"))
}

/// Reads every manifest table into an [`ExportDocument`].
pub struct Exporter<'a> {
    pool: &'a SqlitePool,
    manifest: &'a TableManifest,
    version: String,
}

impl<'a> Exporter<'a> {
    /// Create an exporter writing documents tagged with `version`.
    pub fn new(
        pool: &'a SqlitePool,
        manifest: &'a TableManifest,
        version: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            manifest,
            version: version.into(),
        }
    }

    /// Export every manifest table, in manifest order.
    ///
    /// Any store failure aborts the whole export.
    pub async fn export(&self) -> Result<ExportDocument> {
        let exported_at = Utc::now();
        let mut data = IndexMap::with_capacity(self.manifest.len());

        for table in self.manifest.forward() {
            let rows = self.read_table(table).await?;
            debug!("Exported {} rows from {}", rows.len(), table);
            data.insert(table.to_string(), rows);
        }

        let document = ExportDocument {
            version: self.version.clone(),
            exported_at,
            data,
        };
        info!(
            "Exported {} rows from {} tables",
            document.total_rows(),
            document.data.len()
        );
        Ok(document)
    }

    async fn read_table(&self, table: &str) -> Result<Vec<Row>> {
        if introspect::table_columns(self.pool, table).await?.is_none() {
            return Err(PortError::Schema(format!(
                "manifest table '{}' no longer exists",
                table
            )));
        }

        let sql = format!("SELECT * FROM {}", quote_ident(table)?);
        let rows = sqlx::query(&sql).fetch_all(self.pool).await?;
        rows.iter()
            .map(|row| row_to_json(row).map_err(PortError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn setup_pool() -> SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for sql in [
            "CREATE TABLE projects (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE tasks (id INTEGER PRIMARY KEY, project_id INTEGER REFERENCES projects(id), title TEXT, estimate REAL)",
            "INSERT INTO projects (id, name) VALUES (1, 'Home'), (2, 'Work')",
            "INSERT INTO tasks VALUES (10, 1, 'Laundry', 0.5), (11, 2, 'Report', NULL)",
        ] {
            sqlx::query(sql).execute(&pool).await.unwrap();
        }
        pool
    }

    #[test]
    fn test_export_filename() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(export_filename(date), "dbport-export-2026-03-07.json");
    }

    #[tokio::test]
    async fn test_export_rows_verbatim_in_manifest_order() {
        let pool = setup_pool().await;
        let manifest = TableManifest::fixed(["projects", "tasks"]);
        let doc = Exporter::new(&pool, &manifest, "1.0").export().await.unwrap();

        assert_eq!(doc.version, "1.0");
        let tables: Vec<&str> = doc.data.keys().map(String::as_str).collect();
        assert_eq!(tables, vec!["projects", "tasks"]);
        assert_eq!(doc.total_rows(), 4);
        assert_eq!(
            serde_json::Value::Object(doc.data["tasks"][0].clone()),
            json!({"id": 10, "project_id": 1, "title": "Laundry", "estimate": 0.5})
        );
        assert_eq!(doc.data["tasks"][1]["estimate"], json!(null));
    }

    #[tokio::test]
    async fn test_export_document_shape() {
        let pool = setup_pool().await;
        let manifest = TableManifest::fixed(["projects"]);
        let doc = Exporter::new(&pool, &manifest, "1.0").export().await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();
        assert!(value.get("exportedAt").and_then(|v| v.as_str()).is_some());
        assert_eq!(value["version"], json!("1.0"));
        assert_eq!(value["data"]["projects"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_export_missing_table_aborts() {
        let pool = setup_pool().await;
        let manifest = TableManifest::fixed(["projects", "gone"]);
        let err = Exporter::new(&pool, &manifest, "1.0").export().await.unwrap_err();
        assert_eq!(err.category(), "schema");
    }
}

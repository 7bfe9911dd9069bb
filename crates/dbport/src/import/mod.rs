//! Transactional import of an export document.
//!
//! An import runs in a single store transaction:
//!
//! ```text
//! Begin -> [wipe, reverse order] -> per table, per row reconcile -> Commit
//!                                                                 \-> Rollback
//! ```
//!
//! The wipe only happens in replace mode. Each row is written inside its own
//! savepoint. A row that violates a constraint or carries an unusable value is
//! rolled back to that savepoint, recorded, and the loop moves on. Any other
//! store failure, or one that ends the enclosing transaction, aborts the
//! import and rolls everything back.
//!
//! Rows of a table that references itself are written parents first.

mod order;
pub mod report;
pub mod request;

pub use report::{ErrorDetails, ErrorLog, ImportReport, RowError, RowOutcome, TableOutcome};
pub use request::{ImportMode, ImportRequest};

use indexmap::IndexMap;
use serde_json::Value;
use sqlx::error::ErrorKind;
use sqlx::{Connection, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::config::TransferConfig;
use crate::core::identifier::{quote_ident, quote_list};
use crate::core::schema::TableSchema;
use crate::core::value::SqlValue;
use crate::error::{PortError, Result};
use crate::manifest::TableManifest;
use crate::store::introspect;

/// Per-call import switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Run the whole import, then roll it back instead of committing.
    pub dry_run: bool,
}

/// Applies import requests to the store in manifest order.
pub struct Importer<'a> {
    pool: &'a SqlitePool,
    manifest: &'a TableManifest,
    transfer: &'a TransferConfig,
}

impl<'a> Importer<'a> {
    pub fn new(
        pool: &'a SqlitePool,
        manifest: &'a TableManifest,
        transfer: &'a TransferConfig,
    ) -> Self {
        Self {
            pool,
            manifest,
            transfer,
        }
    }

    /// Run an import and report per-table outcomes.
    ///
    /// Returns `Ok` whenever the transaction commits (or, for a dry run,
    /// rolls back cleanly), even if some rows failed.
    pub async fn import(
        &self,
        request: &ImportRequest,
        options: ImportOptions,
    ) -> Result<ImportReport> {
        if let Some(version) = request.version.as_deref() {
            if version != self.transfer.export_version {
                warn!(
                    "Payload version {} differs from export version {}, importing anyway",
                    version, self.transfer.export_version
                );
            }
        }

        info!(
            "Starting {} import: {} rows across {} tables{}",
            request.mode,
            request.total_rows(),
            request.data.len(),
            if options.dry_run { " (dry run)" } else { "" }
        );

        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| PortError::transaction("begin", e))?;
        // Take the write lock up front so no statement has to upgrade it later.
        let mut tx = conn
            .begin_with("BEGIN IMMEDIATE")
            .await
            .map_err(|e| PortError::transaction("begin", e))?;

        let (summary, errors) = match self.apply(&mut tx, request).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!("Import aborted, rolling back: {}", e);
                if let Err(rollback) = tx.rollback().await {
                    warn!("Rollback failed, discarding connection: {}", rollback);
                    conn.close_on_drop();
                }
                return Err(e);
            }
        };

        if options.dry_run {
            tx.rollback()
                .await
                .map_err(|e| PortError::transaction("rollback", e))?;
            info!("Dry run finished, changes rolled back");
        } else {
            tx.commit()
                .await
                .map_err(|e| PortError::transaction("commit", e))?;
            debug!("Import transaction committed");
        }

        let report = ImportReport::new(request.mode, options.dry_run, summary, errors);
        info!(
            "Import complete: {} imported ({} updated), {} skipped, {} errors",
            report.totals.imported,
            report.totals.updated,
            report.totals.skipped,
            report.totals.errors
        );
        Ok(report)
    }

    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        request: &ImportRequest,
    ) -> Result<(IndexMap<String, TableOutcome>, ErrorLog)> {
        if request.mode == ImportMode::Replace {
            self.wipe(conn).await;
        }

        let mut log = ErrorLog::new(self.transfer.max_error_details);
        let mut summary = IndexMap::with_capacity(self.manifest.len());

        for table in self.manifest.forward() {
            let outcome = match request.rows(table) {
                Some(rows) if !rows.is_empty() => {
                    self.import_table(conn, table, rows, request.mode, &mut log)
                        .await?
                }
                _ => TableOutcome::default(),
            };
            summary.insert(table.to_string(), outcome);
        }

        Ok((summary, log))
    }

    /// Best-effort delete of every manifest table, children first.
    async fn wipe(&self, conn: &mut SqliteConnection) {
        info!("Clearing {} tables", self.manifest.len());
        for table in self.manifest.reverse() {
            let result = match quote_ident(table) {
                Ok(quoted) => {
                    let sql = format!("DELETE FROM {}", quoted);
                    sqlx::query(&sql)
                        .execute(&mut *conn)
                        .await
                        .map_err(PortError::from)
                }
                Err(e) => Err(e),
            };
            match result {
                Ok(done) => debug!("Cleared {} rows from {}", done.rows_affected(), table),
                Err(e) => debug!("Ignoring failed delete on {}: {}", table, e),
            }
        }
    }

    async fn import_table(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        rows: &[Value],
        mode: ImportMode,
        log: &mut ErrorLog,
    ) -> Result<TableOutcome> {
        let schema = introspect::table_schema(conn, table)
            .await
            .map_err(|e| PortError::transaction(format!("introspection of {}", table), e))?;

        let Some(schema) = schema else {
            warn!(
                "Table {} does not exist in the store, skipping {} rows",
                table,
                rows.len()
            );
            return Ok(TableOutcome::all_skipped(rows.len()));
        };

        let identity = schema.identity_key(&self.transfer.identity_column);
        let mut outcome = TableOutcome::default();
        for index in order::parent_first(&schema, rows) {
            let result =
                reconcile_row(conn, &schema, &identity, mode, index, &rows[index]).await?;
            outcome.record(result, log);
        }

        if outcome.errors > 0 {
            warn!(
                "{}: {} imported, {} skipped, {} failed",
                table, outcome.imported, outcome.skipped, outcome.errors
            );
        } else {
            info!(
                "{}: {} imported, {} skipped",
                table, outcome.imported, outcome.skipped
            );
        }
        Ok(outcome)
    }
}

/// Write one payload row inside a savepoint.
///
/// The inner result is the row's own outcome. The outer error means the
/// import cannot continue.
async fn reconcile_row(
    conn: &mut SqliteConnection,
    schema: &TableSchema,
    identity: &[&str],
    mode: ImportMode,
    index: usize,
    row: &Value,
) -> Result<std::result::Result<RowOutcome, RowError>> {
    let row_id = row_identifier(row, identity, index);
    let fail = |message: String| RowError {
        table: schema.name.clone(),
        row_identifier: row_id.clone(),
        message,
    };

    let Some(fields) = row.as_object() else {
        return Ok(Err(fail("row is not a JSON object".to_string())));
    };

    let fields = schema.known_columns(fields);
    if fields.is_empty() {
        return Ok(Ok(RowOutcome::Skipped));
    }

    let mut values = Vec::with_capacity(fields.len());
    for (column, value) in fields {
        let value = match SqlValue::from_json(&value) {
            Ok(value) => value,
            Err(e) => return Ok(Err(fail(format!("{}: {}", column, e)))),
        };
        let value = match schema.column(&column) {
            Some(c) if c.is_blob() => value.unhex(),
            _ => value,
        };
        values.push((column, value));
    }

    let key = match mode {
        ImportMode::Merge => identity_values(identity, &values),
        ImportMode::Replace => None,
    };

    let stage = || format!("row {} of {}", row_id, schema.name);
    let mut savepoint = conn
        .begin()
        .await
        .map_err(|e| PortError::transaction(stage(), e))?;

    let written = match key {
        Some(key) => merge_row(&mut *savepoint, &schema.name, key, values).await,
        None => insert_row(&mut *savepoint, &schema.name, values).await,
    };

    match written {
        Ok(outcome) => {
            savepoint
                .commit()
                .await
                .map_err(|e| PortError::transaction(stage(), e))?;
            Ok(Ok(outcome))
        }
        Err(e) if is_row_failure(&e) => {
            // Fails when the error already ended the whole transaction.
            savepoint.rollback().await.map_err(|rollback| {
                PortError::transaction(stage(), format!("{} ({})", e, rollback))
            })?;
            Ok(Err(fail(row_message(e))))
        }
        Err(e) => Err(PortError::transaction(stage(), e)),
    }
}

/// Whether a write failure belongs to the row rather than the import.
///
/// Constraint violations and values SQLite refuses to store are row failures.
/// Any other store error is not.
fn is_row_failure(error: &PortError) -> bool {
    const SQLITE_TOOBIG: i32 = 18;
    const SQLITE_CONSTRAINT: i32 = 19;
    const SQLITE_MISMATCH: i32 = 20;

    match error {
        PortError::Store(sqlx::Error::Database(db)) => {
            matches!(
                db.kind(),
                ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation
            ) || matches!(
                db.code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff),
                Some(SQLITE_TOOBIG | SQLITE_CONSTRAINT | SQLITE_MISMATCH)
            )
        }
        PortError::Store(sqlx::Error::Encode(_))
        | PortError::Store(sqlx::Error::Decode(_))
        | PortError::Store(sqlx::Error::ColumnDecode { .. }) => true,
        PortError::Store(_) => false,
        _ => true,
    }
}

/// Values of every identity column, or `None` if any is missing or NULL.
fn identity_values(
    identity: &[&str],
    values: &[(String, SqlValue)],
) -> Option<Vec<(String, SqlValue)>> {
    if identity.is_empty() {
        return None;
    }
    identity
        .iter()
        .map(|column| {
            values
                .iter()
                .find(|(name, value)| name == *column && !value.is_null())
                .cloned()
        })
        .collect()
}

/// Update the row with this identity if it exists, insert it otherwise.
async fn merge_row(
    conn: &mut SqliteConnection,
    table: &str,
    key: Vec<(String, SqlValue)>,
    values: Vec<(String, SqlValue)>,
) -> Result<RowOutcome> {
    let table_q = quote_ident(table)?;
    let condition = key
        .iter()
        .map(|(column, _)| quote_ident(column).map(|q| format!("{} = ?", q)))
        .collect::<Result<Vec<_>>>()?
        .join(" AND ");

    let lookup = format!("SELECT 1 FROM {} WHERE {} LIMIT 1", table_q, condition);
    let mut query = sqlx::query(&lookup);
    for (_, value) in key.iter().cloned() {
        query = value.bind(query);
    }
    if query.fetch_optional(&mut *conn).await?.is_none() {
        return insert_row(conn, table, values).await;
    }

    let (columns, values): (Vec<String>, Vec<SqlValue>) = values
        .into_iter()
        .filter(|(name, _)| !key.iter().any(|(k, _)| k == name))
        .unzip();
    if columns.is_empty() {
        return Ok(RowOutcome::Skipped);
    }

    let assignments = columns
        .iter()
        .map(|c| quote_ident(c).map(|q| format!("{} = ?", q)))
        .collect::<Result<Vec<_>>>()?
        .join(", ");
    let sql = format!("UPDATE {} SET {} WHERE {}", table_q, assignments, condition);

    let mut query = sqlx::query(&sql);
    for value in values.into_iter().chain(key.into_iter().map(|(_, v)| v)) {
        query = value.bind(query);
    }
    query.execute(&mut *conn).await?;
    Ok(RowOutcome::Updated)
}

async fn insert_row(
    conn: &mut SqliteConnection,
    table: &str,
    values: Vec<(String, SqlValue)>,
) -> Result<RowOutcome> {
    let (columns, values): (Vec<String>, Vec<SqlValue>) = values.into_iter().unzip();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table)?,
        quote_list(&columns)?,
        placeholders
    );

    let mut query = sqlx::query(&sql);
    for value in values {
        query = value.bind(query);
    }
    query.execute(&mut *conn).await?;
    Ok(RowOutcome::Inserted)
}

/// Identity of a payload row for error reports.
///
/// Key values joined by commas, or `#<index>` when any is missing.
fn row_identifier(row: &Value, identity: &[&str], index: usize) -> String {
    let parts: Option<Vec<String>> = identity
        .iter()
        .map(|column| match row.get(*column) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
        .collect();

    match parts {
        Some(parts) if !parts.is_empty() => parts.join(","),
        _ => format!("#{}", index),
    }
}

/// Store message for a failed row, without the crate's error prefixes.
fn row_message(error: PortError) -> String {
    match error {
        PortError::Store(sqlx::Error::Database(db)) => db.message().to_string(),
        PortError::Store(other) => other.to_string(),
        other => other.to_string(),
    }
}

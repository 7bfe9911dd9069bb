//! Schema introspection against the live store.
//!
//! Every function takes any SQLite executor, so the importer can introspect
//! through its open transaction and the exporter through the pool.

use sqlx::sqlite::Sqlite;
use sqlx::{Executor, Row};
use tracing::debug;

use crate::core::schema::{Column, ForeignKey, TableSchema};
use crate::error::Result;

/// Names of all user tables, sorted.
pub async fn list_tables<'e, E>(executor: E) -> Result<Vec<String>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.iter().map(|r| r.get::<String, _>("name")).collect())
}

/// Columns of a table in declaration order, or `None` if the table does not exist.
pub async fn table_columns<'e, E>(executor: E, table: &str) -> Result<Option<Vec<Column>>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT cid, name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
    )
    .bind(table)
    .fetch_all(executor)
    .await?;

    if rows.is_empty() {
        debug!("Table {} not found in store", table);
        return Ok(None);
    }

    let columns = rows
        .iter()
        .map(|row| Column {
            name: row.get::<String, _>("name"),
            data_type: row.get::<String, _>("type"),
            is_nullable: row.get::<i64, _>("notnull") == 0,
            pk_position: row.get::<i64, _>("pk") as i32,
            ordinal_pos: row.get::<i64, _>("cid") as i32,
        })
        .collect();

    Ok(Some(columns))
}

/// Foreign keys declared on a table.
pub async fn foreign_keys<'e, E>(executor: E, table: &str) -> Result<Vec<ForeignKey>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "SELECT id, seq, \"table\", \"from\", \"to\", on_delete \
         FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
    )
    .bind(table)
    .fetch_all(executor)
    .await?;

    // One constraint spans several rows when it is multi-column
    let mut fks: Vec<(i64, ForeignKey)> = Vec::new();
    for row in rows {
        let id: i64 = row.get("id");
        let from: String = row.get("from");
        // "to" is NULL when the constraint targets the parent's primary key implicitly
        let to: Option<String> = row.get("to");

        match fks.last_mut() {
            Some((last_id, fk)) if *last_id == id => {
                fk.columns.push(from);
                fk.ref_columns.extend(to);
            }
            _ => fks.push((
                id,
                ForeignKey {
                    columns: vec![from],
                    ref_table: row.get("table"),
                    ref_columns: to.into_iter().collect(),
                    on_delete: row.get("on_delete"),
                },
            )),
        }
    }

    Ok(fks.into_iter().map(|(_, fk)| fk).collect())
}

/// Full metadata for a table, or `None` if the table does not exist.
pub async fn table_schema(
    conn: &mut sqlx::SqliteConnection,
    table: &str,
) -> Result<Option<TableSchema>> {
    let Some(columns) = table_columns(&mut *conn, table).await? else {
        return Ok(None);
    };
    let foreign_keys = foreign_keys(&mut *conn, table).await?;

    Ok(Some(TableSchema {
        name: table.to_string(),
        columns,
        foreign_keys,
    }))
}

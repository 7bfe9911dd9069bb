//! Schema metadata for tables as the live store reports them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::Row;

/// Table metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    /// Table name.
    pub name: String,

    /// Column definitions, in declaration order.
    pub columns: Vec<Column>,

    /// Foreign key constraints.
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Look up a column by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Check if the table has a column with this exact name.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Primary key column names, in key order.
    pub fn primary_key(&self) -> Vec<&str> {
        let mut pk: Vec<&Column> = self.columns.iter().filter(|c| c.pk_position > 0).collect();
        pk.sort_by_key(|c| c.pk_position);
        pk.into_iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns used to match incoming rows against existing records.
    ///
    /// The primary key wins, whether it spans one column or several.
    /// Otherwise the fallback column is used if the table has it. Tables
    /// with neither have no identity and every incoming row is treated as new.
    pub fn identity_key(&self, fallback: &str) -> Vec<&str> {
        let pk = self.primary_key();
        if !pk.is_empty() {
            return pk;
        }
        self.columns
            .iter()
            .filter(|c| c.name == fallback)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Tables this table references, excluding itself.
    pub fn parent_tables(&self) -> Vec<&str> {
        let mut parents: Vec<&str> = self
            .foreign_keys
            .iter()
            .map(|fk| fk.ref_table.as_str())
            .filter(|t| *t != self.name)
            .collect();
        parents.sort_unstable();
        parents.dedup();
        parents
    }

    /// Foreign keys from this table back to itself, as (columns, referenced
    /// columns) pairs. A reference without explicit columns targets the
    /// primary key.
    pub fn self_references(&self) -> Vec<(Vec<&str>, Vec<&str>)> {
        self.foreign_keys
            .iter()
            .filter(|fk| fk.ref_table.eq_ignore_ascii_case(&self.name))
            .filter_map(|fk| {
                let from: Vec<&str> = fk.columns.iter().map(String::as_str).collect();
                let to = if fk.ref_columns.is_empty() {
                    self.primary_key()
                } else {
                    fk.ref_columns.iter().map(String::as_str).collect()
                };
                (!from.is_empty() && from.len() == to.len()).then_some((from, to))
            })
            .collect()
    }

    /// Intersect a row's fields with this table's columns.
    ///
    /// Keeps the row's field order. Fields the table does not have are
    /// dropped; they are stray or legacy fields from another schema version.
    pub fn known_columns(&self, row: &Row) -> Vec<(String, Value)> {
        row.iter()
            .filter(|(name, _)| self.has_column(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }
}

/// Column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Declared type (may be empty; SQLite columns are not required to declare one).
    pub data_type: String,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// 1-based position within the primary key, or 0 if not part of it.
    pub pk_position: i32,

    /// Ordinal position (0-based).
    pub ordinal_pos: i32,
}

impl Column {
    /// Whether the declared type names a BLOB.
    pub fn is_blob(&self) -> bool {
        self.data_type.to_ascii_uppercase().contains("BLOB")
    }
}

/// Foreign key metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Source column names.
    pub columns: Vec<String>,

    /// Referenced table name.
    pub ref_table: String,

    /// Referenced column names.
    pub ref_columns: Vec<String>,

    /// ON DELETE action.
    pub on_delete: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_test_column(name: &str, pk_position: i32) -> Column {
        Column {
            name: name.to_string(),
            data_type: "TEXT".to_string(),
            is_nullable: pk_position == 0,
            pk_position,
            ordinal_pos: 0,
        }
    }

    fn make_test_table(columns: Vec<Column>) -> TableSchema {
        TableSchema {
            name: "tasks".to_string(),
            columns,
            foreign_keys: vec![],
        }
    }

    #[test]
    fn test_identity_single_pk() {
        let table = make_test_table(vec![
            make_test_column("task_uuid", 1),
            make_test_column("title", 0),
        ]);
        assert_eq!(table.identity_key("id"), vec!["task_uuid"]);
    }

    #[test]
    fn test_identity_composite_pk() {
        let table = make_test_table(vec![
            make_test_column("id", 0),
            make_test_column("task_id", 1),
            make_test_column("tag_id", 2),
        ]);
        assert_eq!(table.identity_key("id"), vec!["task_id", "tag_id"]);
    }

    #[test]
    fn test_identity_fallback_without_pk() {
        let with_id = make_test_table(vec![
            make_test_column("title", 0),
            make_test_column("id", 0),
        ]);
        assert_eq!(with_id.identity_key("id"), vec!["id"]);

        let without = make_test_table(vec![make_test_column("body", 0)]);
        assert!(without.identity_key("id").is_empty());
    }

    #[test]
    fn test_primary_key_sorted_by_position() {
        let table = make_test_table(vec![
            make_test_column("b", 2),
            make_test_column("a", 1),
        ]);
        assert_eq!(table.primary_key(), vec!["a", "b"]);
    }

    #[test]
    fn test_known_columns_drops_unknown_fields() {
        let table = make_test_table(vec![
            make_test_column("id", 1),
            make_test_column("title", 0),
        ]);
        let row = json!({"legacy_flag": true, "title": "Write docs", "id": 7})
            .as_object()
            .cloned()
            .unwrap();

        let known = table.known_columns(&row);
        assert_eq!(
            known,
            vec![
                ("title".to_string(), json!("Write docs")),
                ("id".to_string(), json!(7)),
            ]
        );
    }

    #[test]
    fn test_known_columns_empty_when_nothing_matches() {
        let table = make_test_table(vec![make_test_column("id", 1)]);
        let row = json!({"other": 1}).as_object().cloned().unwrap();
        assert!(table.known_columns(&row).is_empty());
    }

    #[test]
    fn test_self_references() {
        let mut table = make_test_table(vec![
            make_test_column("id", 1),
            make_test_column("parent_id", 0),
        ]);
        table.foreign_keys = vec![
            ForeignKey {
                columns: vec!["parent_id".into()],
                ref_table: "TASKS".into(),
                ref_columns: vec![],
                on_delete: "NO ACTION".into(),
            },
            ForeignKey {
                columns: vec!["project_id".into()],
                ref_table: "projects".into(),
                ref_columns: vec!["id".into()],
                on_delete: "CASCADE".into(),
            },
        ];
        assert_eq!(
            table.self_references(),
            vec![(vec!["parent_id"], vec!["id"])]
        );
    }

    #[test]
    fn test_blob_columns() {
        let mut column = make_test_column("payload", 0);
        assert!(!column.is_blob());
        column.data_type = "blob".to_string();
        assert!(column.is_blob());
    }

    #[test]
    fn test_parent_tables_ignores_self_reference() {
        let mut table = make_test_table(vec![make_test_column("id", 1)]);
        table.foreign_keys = vec![
            ForeignKey {
                columns: vec!["parent_id".into()],
                ref_table: "tasks".into(),
                ref_columns: vec!["id".into()],
                on_delete: "CASCADE".into(),
            },
            ForeignKey {
                columns: vec!["project_id".into()],
                ref_table: "projects".into(),
                ref_columns: vec!["id".into()],
                on_delete: "CASCADE".into(),
            },
            ForeignKey {
                columns: vec!["owner_project_id".into()],
                ref_table: "projects".into(),
                ref_columns: vec!["id".into()],
                on_delete: "SET NULL".into(),
            },
        ];
        assert_eq!(table.parent_tables(), vec!["projects"]);
    }
}

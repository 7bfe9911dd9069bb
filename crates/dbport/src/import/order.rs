//! Write order for rows of a table that references itself.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::core::schema::TableSchema;

/// Payload indices ordered so every row comes after the in-payload row it
/// references through a self-referencing foreign key.
///
/// Rows become ready in payload order, so a table without self-references
/// (or a payload already parent-first) keeps its order. Rows caught in a
/// reference cycle are appended last, in payload order.
pub fn parent_first(schema: &TableSchema, rows: &[Value]) -> Vec<usize> {
    let links = schema.self_references();
    if links.is_empty() {
        return (0..rows.len()).collect();
    }

    let mut waiting = vec![0usize; rows.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); rows.len()];

    for (columns, ref_columns) in &links {
        let mut by_key: HashMap<String, usize> = HashMap::new();
        for (idx, row) in rows.iter().enumerate() {
            if let Some(key) = key_of(row, ref_columns) {
                by_key.entry(key).or_insert(idx);
            }
        }

        for (idx, row) in rows.iter().enumerate() {
            let Some(key) = key_of(row, columns) else {
                continue;
            };
            if let Some(&parent) = by_key.get(&key) {
                if parent != idx {
                    waiting[idx] += 1;
                    children[parent].push(idx);
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..rows.len()).filter(|&i| waiting[i] == 0).collect();
    let mut order = Vec::with_capacity(rows.len());
    while let Some(idx) = ready.pop_first() {
        order.push(idx);
        for &child in &children[idx] {
            waiting[child] -= 1;
            if waiting[child] == 0 {
                ready.insert(child);
            }
        }
    }

    if order.len() < rows.len() {
        order.extend((0..rows.len()).filter(|&i| waiting[i] > 0));
    }
    order
}

/// Values of `columns` in a payload row, or `None` if any is missing or NULL.
fn key_of(row: &Value, columns: &[&str]) -> Option<String> {
    let parts = columns
        .iter()
        .map(|column| match row.get(*column) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.to_string()),
        })
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("\u{1f}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::{Column, ForeignKey};
    use serde_json::json;

    fn column(name: &str, pk_position: i32) -> Column {
        Column {
            name: name.to_string(),
            data_type: "INTEGER".to_string(),
            is_nullable: pk_position == 0,
            pk_position,
            ordinal_pos: 0,
        }
    }

    fn tasks_schema() -> TableSchema {
        TableSchema {
            name: "tasks".to_string(),
            columns: vec![column("id", 1), column("parent_id", 0)],
            foreign_keys: vec![ForeignKey {
                columns: vec!["parent_id".into()],
                ref_table: "tasks".into(),
                ref_columns: vec!["id".into()],
                on_delete: "NO ACTION".into(),
            }],
        }
    }

    #[test]
    fn test_no_self_reference_keeps_payload_order() {
        let mut schema = tasks_schema();
        schema.foreign_keys.clear();
        let rows = vec![json!({"id": 2, "parent_id": 1}), json!({"id": 1})];
        assert_eq!(parent_first(&schema, &rows), vec![0, 1]);
    }

    #[test]
    fn test_children_follow_parents() {
        let rows = vec![
            json!({"id": 1, "parent_id": 4}),
            json!({"id": 2, "parent_id": 1}),
            json!({"id": 3, "parent_id": null}),
            json!({"id": 4, "parent_id": 3}),
        ];
        assert_eq!(parent_first(&tasks_schema(), &rows), vec![2, 3, 0, 1]);
    }

    #[test]
    fn test_parent_outside_payload_does_not_block() {
        let rows = vec![json!({"id": 5, "parent_id": 99}), json!({"id": 6})];
        assert_eq!(parent_first(&tasks_schema(), &rows), vec![0, 1]);
    }

    #[test]
    fn test_self_loop_and_cycle() {
        let rows = vec![
            json!({"id": 1, "parent_id": 2}),
            json!({"id": 2, "parent_id": 1}),
            json!({"id": 3, "parent_id": 3}),
        ];
        assert_eq!(parent_first(&tasks_schema(), &rows), vec![2, 0, 1]);
    }
}

//! SQL value types bridging JSON rows and SQLite storage classes.
//!
//! Export documents carry rows as JSON objects. This module converts between
//! JSON scalars and the five SQLite storage classes, in both directions.

use serde_json::{Number, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column as _, Row as _, TypeInfo, ValueRef};

/// A row as it appears in an export document: column name to scalar value.
pub type Row = serde_json::Map<String, Value>;

/// A scalar value in one of SQLite's storage classes.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// 64-bit signed integer.
    Integer(i64),

    /// 64-bit floating point.
    Real(f64),

    /// UTF-8 text.
    Text(String),

    /// Binary data.
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Convert a JSON value from an import row.
    ///
    /// Booleans become 0/1 integers. Arrays and objects are not scalars and
    /// are rejected; the caller reports that as a failure of the row.
    pub fn from_json(value: &Value) -> std::result::Result<Self, String> {
        match value {
            Value::Null => Ok(SqlValue::Null),
            Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(SqlValue::Integer(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(SqlValue::Real(f))
                } else {
                    Err(format!("number {} is out of range", n))
                }
            }
            Value::String(s) => Ok(SqlValue::Text(s.clone())),
            Value::Array(_) => Err("arrays are not valid column values".to_string()),
            Value::Object(_) => Err("objects are not valid column values".to_string()),
        }
    }

    /// Convert to JSON for an export document.
    ///
    /// Blobs have no JSON scalar form and are written as lowercase hex.
    /// Non-finite reals become null.
    pub fn into_json(self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Integer(i) => Value::from(i),
            SqlValue::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s),
            SqlValue::Blob(b) => Value::String(hex::encode(b)),
        }
    }

    /// Reinterpret hex text as the blob it was exported from.
    ///
    /// Text that is not valid hex stays text.
    #[must_use]
    pub fn unhex(self) -> Self {
        match self {
            SqlValue::Text(s) => match hex::decode(&s) {
                Ok(bytes) => SqlValue::Blob(bytes),
                Err(_) => SqlValue::Text(s),
            },
            other => other,
        }
    }

    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Bind this value as the next parameter of a query.
    pub fn bind<'q>(
        self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Integer(i) => query.bind(i),
            SqlValue::Real(f) => query.bind(f),
            SqlValue::Text(s) => query.bind(s),
            SqlValue::Blob(b) => query.bind(b),
        }
    }

    /// Decode column `idx` of a fetched row by its runtime storage class.
    pub fn decode(row: &SqliteRow, idx: usize) -> std::result::Result<Self, sqlx::Error> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(SqlValue::Null);
        }

        let type_name = raw.type_info().name().to_ascii_uppercase();
        let value = match type_name.as_str() {
            "INTEGER" | "BOOLEAN" => SqlValue::Integer(row.try_get::<i64, _>(idx)?),
            "REAL" => SqlValue::Real(row.try_get::<f64, _>(idx)?),
            "BLOB" => SqlValue::Blob(row.try_get::<Vec<u8>, _>(idx)?),
            "NUMERIC" => match row.try_get::<i64, _>(idx) {
                Ok(i) => SqlValue::Integer(i),
                Err(_) => SqlValue::Real(row.try_get::<f64, _>(idx)?),
            },
            _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
        };
        Ok(value)
    }
}

/// Decode every column of a fetched row into an export row, in column order.
pub fn row_to_json(row: &SqliteRow) -> std::result::Result<Row, sqlx::Error> {
    let mut out = Row::with_capacity(row.columns().len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = SqlValue::decode(row, idx)?;
        out.insert(column.name().to_string(), value.into_json());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(SqlValue::from_json(&json!(null)).unwrap(), SqlValue::Null);
        assert_eq!(SqlValue::from_json(&json!(42)).unwrap(), SqlValue::Integer(42));
        assert_eq!(SqlValue::from_json(&json!(-7)).unwrap(), SqlValue::Integer(-7));
        assert_eq!(SqlValue::from_json(&json!(2.5)).unwrap(), SqlValue::Real(2.5));
        assert_eq!(
            SqlValue::from_json(&json!("todo")).unwrap(),
            SqlValue::Text("todo".into())
        );
    }

    #[test]
    fn test_from_json_bool_is_integer() {
        assert_eq!(SqlValue::from_json(&json!(true)).unwrap(), SqlValue::Integer(1));
        assert_eq!(SqlValue::from_json(&json!(false)).unwrap(), SqlValue::Integer(0));
    }

    #[test]
    fn test_from_json_rejects_containers() {
        let err = SqlValue::from_json(&json!([1, 2])).unwrap_err();
        assert!(err.contains("arrays"));
        let err = SqlValue::from_json(&json!({"nested": true})).unwrap_err();
        assert!(err.contains("objects"));
    }

    #[test]
    fn test_into_json() {
        assert_eq!(SqlValue::Integer(3).into_json(), json!(3));
        assert_eq!(SqlValue::Text("a".into()).into_json(), json!("a"));
        assert_eq!(SqlValue::Null.into_json(), json!(null));
        assert_eq!(SqlValue::Real(f64::NAN).into_json(), json!(null));
        assert_eq!(SqlValue::Blob(vec![0x00, 0xab, 0x10]).into_json(), json!("00ab10"));
    }

    #[test]
    fn test_unhex() {
        assert_eq!(
            SqlValue::Text("00AB10".into()).unhex(),
            SqlValue::Blob(vec![0x00, 0xab, 0x10])
        );
        assert_eq!(
            SqlValue::Text("not hex".into()).unhex(),
            SqlValue::Text("not hex".into())
        );
        assert_eq!(SqlValue::Integer(5).unhex(), SqlValue::Integer(5));
        assert_eq!(SqlValue::Null.unhex(), SqlValue::Null);
    }

    #[tokio::test]
    async fn test_decode_storage_classes() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let row = sqlx::query("SELECT 1 AS i, 1.5 AS r, 'x' AS t, NULL AS n, x'0aff' AS b")
            .fetch_one(&pool)
            .await
            .unwrap();

        let json = row_to_json(&row).unwrap();
        let keys: Vec<&str> = json.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["i", "r", "t", "n", "b"]);
        assert_eq!(json["i"], json!(1));
        assert_eq!(json["r"], json!(1.5));
        assert_eq!(json["t"], json!("x"));
        assert_eq!(json["n"], json!(null));
        assert_eq!(json["b"], json!("0aff"));
    }
}

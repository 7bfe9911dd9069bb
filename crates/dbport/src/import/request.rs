//! Import requests and their up-front validation.
//!
//! Everything here runs before the store is touched. A request that fails
//! these checks is rejected whole, with no partial effects.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{PortError, Result};
use crate::manifest::TableManifest;

/// How incoming rows are reconciled with existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Upsert rows by identity; existing rows not in the payload are kept.
    Merge,
    /// Clear every manifest table, then insert the payload.
    Replace,
}

impl ImportMode {
    /// Lowercase name as accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMode::Merge => "merge",
            ImportMode::Replace => "replace",
        }
    }
}

impl FromStr for ImportMode {
    type Err = PortError;

    /// Only the exact strings `merge` and `replace` are accepted.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "merge" => Ok(ImportMode::Merge),
            "replace" => Ok(ImportMode::Replace),
            other => Err(PortError::Validation(format!(
                "mode must be 'merge' or 'replace', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated import request.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    /// Reconciliation policy.
    pub mode: ImportMode,

    /// Version tag of the document the rows came from, if it carried one.
    pub version: Option<String>,

    /// Rows per recognized table. Rows are kept as raw JSON; a row that is
    /// not an object fails on its own during the import.
    pub data: IndexMap<String, Vec<Value>>,
}

impl ImportRequest {
    /// Validate a payload against the manifest.
    ///
    /// Checks, in order:
    /// 1. `mode` is exactly `merge` or `replace`
    /// 2. the payload is an object with a `data` object
    /// 3. at least one key of `data` names a manifest table and maps to an array
    ///
    /// Keys that are not manifest tables, or whose value is not an array,
    /// are dropped with a warning.
    pub fn parse(mode: &str, payload: Value, manifest: &TableManifest) -> Result<Self> {
        let mode: ImportMode = mode.parse()?;

        let Value::Object(mut payload) = payload else {
            return Err(PortError::Validation(
                "payload must be a JSON object".to_string(),
            ));
        };

        let version = payload
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string);

        let data = match payload.remove("data") {
            Some(Value::Object(data)) => data,
            Some(_) => {
                return Err(PortError::Validation(
                    "payload field 'data' must be an object".to_string(),
                ))
            }
            None => {
                return Err(PortError::Validation(
                    "payload is missing the 'data' object".to_string(),
                ))
            }
        };

        let mut tables = IndexMap::new();
        for (table, rows) in data {
            match rows {
                Value::Array(rows) if manifest.contains(&table) => {
                    tables.insert(table, rows);
                }
                Value::Array(_) => warn!("Ignoring table '{}': not in the manifest", table),
                _ => warn!("Ignoring table '{}': value is not an array", table),
            }
        }

        if tables.is_empty() {
            return Err(PortError::Validation(
                "payload 'data' contains no recognized table arrays".to_string(),
            ));
        }

        Ok(Self {
            mode,
            version,
            data: tables,
        })
    }

    /// Rows supplied for a table, if any.
    pub fn rows(&self, table: &str) -> Option<&[Value]> {
        self.data.get(table).map(Vec::as_slice)
    }

    /// Total rows across all recognized tables.
    pub fn total_rows(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}

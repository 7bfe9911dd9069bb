//! Import outcome accounting.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::request::ImportMode;

/// What happened to a single row that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowOutcome {
    /// A new row was written.
    Inserted,
    /// An existing row with the same identity was overwritten.
    Updated,
    /// The row carried nothing to write.
    Skipped,
}

/// A row that failed, with enough context to find it in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    /// Table the row belongs to.
    pub table: String,

    /// Identity value of the row, or `#<index>` when it has none.
    pub row_identifier: String,

    /// Store or conversion error text.
    pub message: String,
}

/// Per-table counts.
///
/// `imported` includes updated rows; `updated` breaks them out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOutcome {
    pub imported: usize,
    pub skipped: usize,
    pub errors: usize,
    pub updated: usize,
}

impl TableOutcome {
    /// Outcome for a table whose rows were all skipped.
    pub fn all_skipped(rows: usize) -> Self {
        Self {
            skipped: rows,
            ..Self::default()
        }
    }

    /// Fold one row result into the counts, logging failures.
    pub fn record(&mut self, result: Result<RowOutcome, RowError>, log: &mut ErrorLog) {
        match result {
            Ok(RowOutcome::Inserted) => self.imported += 1,
            Ok(RowOutcome::Updated) => {
                self.imported += 1;
                self.updated += 1;
            }
            Ok(RowOutcome::Skipped) => self.skipped += 1,
            Err(error) => {
                self.errors += 1;
                log.push(error);
            }
        }
    }

    /// Rows accounted for.
    pub fn total(&self) -> usize {
        self.imported + self.skipped + self.errors
    }

    fn add(&mut self, other: &TableOutcome) {
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.errors += other.errors;
        self.updated += other.updated;
    }
}

/// Bounded collection of row errors.
///
/// Every error is counted; only the first `cap` are kept.
#[derive(Debug)]
pub struct ErrorLog {
    cap: usize,
    entries: Vec<RowError>,
    total: usize,
}

impl ErrorLog {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Vec::new(),
            total: 0,
        }
    }

    pub fn push(&mut self, error: RowError) {
        debug!(
            "Row {} in {} failed: {}",
            error.row_identifier, error.table, error.message
        );
        self.total += 1;
        if self.entries.len() < self.cap {
            self.entries.push(error);
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Report section for the collected errors, or `None` if there were none.
    pub fn into_details(self) -> Option<ErrorDetails> {
        if self.total == 0 {
            return None;
        }
        Some(ErrorDetails {
            truncated: self.total > self.entries.len(),
            entries: self.entries,
            total_errors: self.total,
        })
    }
}

/// Row errors as they appear in a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetails {
    /// First errors, in the order they happened.
    pub entries: Vec<RowError>,

    /// All row errors, including those not kept.
    pub total_errors: usize,

    /// True when `entries` is shorter than `total_errors`.
    pub truncated: bool,
}

/// Result of a completed import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub mode: ImportMode,

    /// True when the changes were rolled back instead of committed.
    pub dry_run: bool,

    /// Counts for every manifest table, in manifest order.
    pub summary: IndexMap<String, TableOutcome>,

    /// Sum of all table counts.
    pub totals: TableOutcome,

    pub imported_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<ErrorDetails>,
}

impl ImportReport {
    pub fn new(
        mode: ImportMode,
        dry_run: bool,
        summary: IndexMap<String, TableOutcome>,
        errors: ErrorLog,
    ) -> Self {
        let mut totals = TableOutcome::default();
        for outcome in summary.values() {
            totals.add(outcome);
        }
        Self {
            mode,
            dry_run,
            summary,
            totals,
            imported_at: Utc::now(),
            error_details: errors.into_details(),
        }
    }

    /// Check if any row failed.
    pub fn has_errors(&self) -> bool {
        self.totals.errors > 0
    }
}

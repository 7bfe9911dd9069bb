//! Core types shared by the exporter and importer.
//!
//! - [`schema`]: Table, column, and foreign key metadata
//! - [`value`]: Conversion between JSON row values and SQLite storage classes
//! - [`identifier`]: Identifier validation and quoting

pub mod identifier;
pub mod schema;
pub mod value;

pub use schema::{Column, ForeignKey, TableSchema};
pub use value::{Row, SqlValue};

#![forbid(unsafe_code)]

use crate::types::ColumnType;

/// Structural errors raised by the columnar store.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("column length mismatch for {column}: expected {expected} values, got {actual}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("row has {actual} values but the schema has {expected} columns")]
    RowWidthMismatch { expected: usize, actual: usize },

    #[error("row {row} is out of bounds for a table with {rows} rows")]
    RowOutOfBounds { row: usize, rows: usize },

    #[error("value {value} does not fit column {column} of type {column_type}")]
    TypeMismatch {
        column: String,
        column_type: ColumnType,
        value: String,
    },
}

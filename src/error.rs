//! Error types for the grid command layer

use thiserror::Error;

use crate::formula::EvalError;

/// Result type alias using [`GridError`]
pub type Result<T> = std::result::Result<T, GridError>;

/// Every condition a user action can end in short of success.
///
/// None of these leave the grid half-updated: an operation either
/// completes or returns one of these before mutating anything.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Cell ({row}, {col}) is out of bounds ({rows} rows x {cols} columns)")]
    OutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Input matrix is not rectangular
    #[error("Malformed matrix: row {row} has {len} cells, expected {expected}")]
    MalformedMatrix {
        row: usize,
        len: usize,
        expected: usize,
    },

    #[error("No selection: {0}")]
    NoSelection(&'static str),

    #[error("Invalid row selection: row {row} (grid has {rows} rows)")]
    InvalidSelection { row: usize, rows: usize },

    #[error("Incorrect formula: {0}")]
    FormulaError(#[from] EvalError),

    #[error("No matches found for \"{0}\"")]
    NoMatch(String),

    #[error("Not enough data to create a chart")]
    InsufficientData,

    #[error("No numerical data found in the table")]
    NoNumericData,

    #[error("Saved snapshot is corrupt: {0}")]
    CorruptSnapshot(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0} is not supported")]
    Unsupported(String),
}

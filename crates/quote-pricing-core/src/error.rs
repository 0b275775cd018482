//! Error types for quote-pricing-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when manipulating pricing rows
#[derive(Debug, Error)]
pub enum Error {
    /// Row not found by id
    #[error("Row not found: {0}")]
    RowNotFound(String),

    /// Column not found by id
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Duplicate column id in a row or schema
    #[error("Column id already exists: {0}")]
    DuplicateColumn(String),

    /// Calculated columns are written by recalculation only
    #[error("Column {0} is calculated and cannot be edited directly")]
    CalculatedColumn(String),

    /// Infinite or NaN value where a cell value is expected
    #[error("Value for {0} is not a finite number")]
    NonFiniteValue(String),

    /// Circular reference between calculated columns
    #[error("Circular reference detected between columns: {0}")]
    CircularReference(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}

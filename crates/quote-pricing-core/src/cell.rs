//! Cell type

use serde::{Deserialize, Serialize};

/// A single column's value within a [`ProductRow`](crate::ProductRow).
///
/// For a calculated column the stored `value` is the last evaluation result;
/// it is written back by the host after each recalculation, never derived
/// lazily.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    /// Identifier of the column this cell belongs to
    #[serde(rename = "columnID")]
    pub column_id: String,
    /// Numeric value
    pub value: f64,
}

impl Cell {
    /// Create a new cell
    pub fn new<S: Into<String>>(column_id: S, value: f64) -> Self {
        Self {
            column_id: column_id.into(),
            value,
        }
    }

    /// Check whether this cell belongs to the given column
    pub fn is_column(&self, column_id: &str) -> bool {
        self.column_id == column_id
    }
}

//! Row types

use crate::cell::Cell;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// One row of a pricing table.
///
/// Cells are kept in insertion order. Lookups are linear, which matches the
/// handful of columns a pricing table carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRow {
    /// Stable row identifier assigned by the host (absent for ad-hoc rows)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Cells in this row
    pub cells: Vec<Cell>,
}

impl ProductRow {
    /// Create a row without an id
    pub fn new(cells: Vec<Cell>) -> Self {
        Self { id: None, cells }
    }

    /// Create a row with a host-assigned id
    pub fn with_id<S: Into<String>>(id: S, cells: Vec<Cell>) -> Self {
        Self {
            id: Some(id.into()),
            cells,
        }
    }

    /// Get a cell by column id
    pub fn cell(&self, column_id: &str) -> Option<&Cell> {
        self.cells.iter().find(|c| c.is_column(column_id))
    }

    /// Get a mutable cell by column id
    pub fn cell_mut(&mut self, column_id: &str) -> Option<&mut Cell> {
        self.cells.iter_mut().find(|c| c.is_column(column_id))
    }

    /// Get a cell's value by column id
    pub fn value(&self, column_id: &str) -> Option<f64> {
        self.cell(column_id).map(|c| c.value)
    }

    /// Set a cell's value, appending the cell if the row has none for the column
    pub fn set_value<S: Into<String>>(&mut self, column_id: S, value: f64) {
        let column_id = column_id.into();
        match self.cell_mut(&column_id) {
            Some(cell) => cell.value = value,
            None => self.cells.push(Cell::new(column_id, value)),
        }
    }

    /// Overwrite an existing cell's value; fails if the row has no such cell
    pub fn update_value(&mut self, column_id: &str, value: f64) -> Result<()> {
        let cell = self
            .cell_mut(column_id)
            .ok_or_else(|| Error::ColumnNotFound(column_id.to_string()))?;
        cell.value = value;
        Ok(())
    }

    /// Remove a column's cell, returning it if present
    pub fn remove_cell(&mut self, column_id: &str) -> Option<Cell> {
        let pos = self.cells.iter().position(|c| c.is_column(column_id))?;
        Some(self.cells.remove(pos))
    }

    /// Check if row has any cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Number of cells in row
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Label used in diagnostics: the id if present, otherwise the given index
    pub fn label(&self, index: usize) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => format!("#{index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_row() -> ProductRow {
        ProductRow::new(vec![Cell::new("qty", 2.0), Cell::new("unitCost", 15.0)])
    }

    #[test]
    fn test_lookup() {
        let row = sample_row();
        assert_eq!(row.value("qty"), Some(2.0));
        assert_eq!(row.value("unitCost"), Some(15.0));
        assert_eq!(row.value("shipping"), None);
        assert_eq!(row.cell_count(), 2);
    }

    #[test]
    fn test_set_value_updates_or_appends() {
        let mut row = sample_row();
        row.set_value("qty", 3.0);
        row.set_value("shipping", 5.0);

        assert_eq!(row.value("qty"), Some(3.0));
        assert_eq!(row.value("shipping"), Some(5.0));
        assert_eq!(row.cells.last().map(|c| c.column_id.as_str()), Some("shipping"));
    }

    #[test]
    fn test_update_value_missing_column() {
        let mut row = sample_row();
        assert!(row.update_value("qty", 4.0).is_ok());
        assert!(matches!(
            row.update_value("shipping", 1.0),
            Err(Error::ColumnNotFound(id)) if id == "shipping"
        ));
    }

    #[test]
    fn test_remove_cell() {
        let mut row = sample_row();
        let removed = row.remove_cell("qty");
        assert_eq!(removed, Some(Cell::new("qty", 2.0)));
        assert_eq!(row.remove_cell("qty"), None);
        assert_eq!(row.cell_count(), 1);
    }

    #[test]
    fn test_json_shape() {
        let row: ProductRow =
            serde_json::from_str(r#"{"cells":[{"columnID":"qty","value":10}]}"#).unwrap();
        assert_eq!(row.id, None);
        assert_eq!(row.value("qty"), Some(10.0));

        let with_id = ProductRow::with_id("r1", vec![]);
        assert_eq!(
            serde_json::to_string(&with_id).unwrap(),
            r#"{"id":"r1","cells":[]}"#
        );
    }

    #[test]
    fn test_json_values_are_exact() {
        let row = ProductRow::new(vec![
            Cell::new("unitCost", 9.133333333333335),
            Cell::new("rate", 0.1 + 0.2),
            Cell::new("tiny", 5e-324),
        ]);
        let text = serde_json::to_string(&row).unwrap();
        let back: ProductRow = serde_json::from_str(&text).unwrap();
        assert_eq!(back, row);
    }

    #[test]
    fn test_label() {
        assert_eq!(sample_row().label(3), "#3");
        assert_eq!(ProductRow::with_id("r9", vec![]).label(3), "r9");
    }
}

//! Pricing table schema and rows

use crate::{Error, ProductRow, Result, RuleModel};
use quote_pricing_formula::dependency::ColumnDependencyGraph;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::calculation::CellDiagnostic;

/// A column definition
///
/// A column with a `rule` is calculated: its cells are written by
/// recalculation only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column identifier, matched against `Cell::column_id`
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Formula for a calculated column
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<RuleModel>,
}

impl Column {
    /// Create an input column
    pub fn input<S: Into<String>, N: Into<String>>(id: S, name: N) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rule: None,
        }
    }

    /// Create a calculated column
    pub fn calculated<S: Into<String>, N: Into<String>>(id: S, name: N, rule: RuleModel) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            rule: Some(rule),
        }
    }

    /// Check if the column is calculated
    pub fn is_calculated(&self) -> bool {
        self.rule.is_some()
    }
}

/// A reference from a calculated column to a column the schema lacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DanglingReference {
    /// Calculated column holding the rule
    pub column_id: String,
    /// Referenced column that does not exist
    pub missing_column_id: String,
}

/// A pricing table: column schema plus rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PricingTable {
    /// Column definitions in display order
    pub columns: Vec<Column>,
    /// Rows in display order
    #[serde(default)]
    pub rows: Vec<ProductRow>,
    /// Diagnostics from the most recent calculation
    #[serde(skip)]
    pub(crate) diagnostics: Vec<CellDiagnostic>,
}

impl PricingTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table from a JSON file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::other(format!("Failed to read '{}': {e}", path.display())))?;
        Self::from_json(&text)
    }

    /// Parse a table from JSON
    pub fn from_json(text: &str) -> Result<Self> {
        let table: PricingTable = serde_json::from_str(text)
            .map_err(|e| Error::other(format!("Invalid pricing table: {e}")))?;
        table.check_unique_columns()?;
        Ok(table)
    }

    /// Serialize the table to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::other(e.to_string()))
    }

    /// Save the table to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)
            .map_err(|e| Error::other(format!("Failed to write '{}': {e}", path.display())))
    }

    fn check_unique_columns(&self) -> Result<()> {
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].iter().any(|c| c.id == column.id) {
                return Err(Error::DuplicateColumn(column.id.clone()));
            }
        }
        Ok(())
    }

    /// Get a column by id
    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Get a mutable column by id
    pub fn column_mut(&mut self, id: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == id)
    }

    /// Calculated columns in display order
    pub fn calculated_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_calculated())
    }

    /// Append a column definition
    pub fn add_column(&mut self, column: Column) -> Result<()> {
        if self.column(&column.id).is_some() {
            return Err(Error::DuplicateColumn(column.id));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Remove a column definition and its cells from every row
    pub fn remove_column(&mut self, id: &str) -> Option<Column> {
        let pos = self.columns.iter().position(|c| c.id == id)?;
        for row in &mut self.rows {
            row.remove_cell(id);
        }
        Some(self.columns.remove(pos))
    }

    /// Append a row
    pub fn add_row(&mut self, row: ProductRow) -> Result<()> {
        if let Some(id) = &row.id {
            if self.row(id).is_some() {
                return Err(Error::other(format!("Row id already exists: {id}")));
            }
        }
        self.rows.push(row);
        Ok(())
    }

    /// Get a row by id
    pub fn row(&self, id: &str) -> Option<&ProductRow> {
        self.rows.iter().find(|r| r.id.as_deref() == Some(id))
    }

    /// Get a mutable row by id
    pub fn row_mut(&mut self, id: &str) -> Option<&mut ProductRow> {
        self.rows.iter_mut().find(|r| r.id.as_deref() == Some(id))
    }

    /// Position of a row by id
    pub fn row_index(&self, id: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.id.as_deref() == Some(id))
    }

    /// Build the dependency graph of the calculated columns
    pub fn dependency_graph(&self) -> ColumnDependencyGraph {
        let mut graph = ColumnDependencyGraph::new();
        for column in &self.columns {
            if let Some(rule) = &column.rule {
                graph.add_formula(&column.id, rule);
            }
        }
        graph
    }

    /// Column references in rules that point at no column of this table
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        for column in &self.columns {
            let Some(rule) = &column.rule else { continue };
            for referenced in rule.expression.referenced_columns() {
                if self.column(referenced).is_none() {
                    dangling.push(DanglingReference {
                        column_id: column.id.clone(),
                        missing_column_id: referenced.to_string(),
                    });
                }
            }
        }
        dangling
    }

    /// Diagnostics recorded by the most recent calculation
    pub fn diagnostics(&self) -> &[CellDiagnostic] {
        &self.diagnostics
    }

    /// Diagnostic for one cell, if its last evaluation failed
    pub fn diagnostic(&self, row_label: &str, column_id: &str) -> Option<&CellDiagnostic> {
        self.diagnostics
            .iter()
            .find(|d| d.row == row_label && d.column_id == column_id)
    }
}

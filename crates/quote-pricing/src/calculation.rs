//! Table calculation engine
//!
//! Recomputes calculated columns row by row. Columns are computed in
//! dependency order so a column that reads another calculated column sees its
//! fresh value, and cycles between calculated columns are rejected before any
//! cell is written.
//!
//! # Example
//!
//! ```rust
//! use quote_pricing::prelude::*;
//!
//! let mut table = PricingTable::new();
//! table.add_column(Column::input("unitCost", "Unit cost")).unwrap();
//! table
//!     .add_column(Column::calculated(
//!         "total",
//!         "Total",
//!         RuleModel::new(ExpressionNode::multiply(vec![
//!             ExpressionNode::column("unitCost"),
//!             ExpressionNode::constant(3.0),
//!         ])),
//!     ))
//!     .unwrap();
//! table
//!     .add_row(ProductRow::with_id("r1", vec![Cell::new("unitCost", 10.0)]))
//!     .unwrap();
//!
//! let stats = table.calculate().unwrap();
//! assert_eq!(stats.cells_calculated, 1);
//! assert_eq!(table.row("r1").unwrap().value("total"), Some(30.0));
//! ```

use crate::table::{Column, PricingTable};
use crate::{
    evaluate_rule_with_fallback, remove_column_from_expression, Error, EvalError,
    EvaluationContext, ProductRow, Result, RuleModel,
};
use quote_pricing_formula::dependency::ColumnDependencyGraph;
use quote_pricing_formula::FormulaError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Options for table calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Value written to a calculated cell whose formula fails (default: 0)
    pub fallback_value: f64,
    /// Append a cell for a calculated column when a row has none (default: true)
    pub insert_missing_cells: bool,
    /// Record a diagnostic for every failed cell (default: true)
    pub collect_diagnostics: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            fallback_value: quote_pricing_formula::FALLBACK_VALUE,
            insert_missing_cells: true,
            collect_diagnostics: true,
        }
    }
}

/// A calculated cell whose formula failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellDiagnostic {
    /// Row id, or `#<index>` for rows without one
    pub row: String,
    /// Calculated column
    pub column_id: String,
    /// Infix rendering of the rule that failed
    pub rule: String,
    /// What failed
    pub error: EvalError,
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default)]
pub struct CalculationStats {
    /// Number of calculated columns in the table
    pub formula_count: usize,
    /// Number of rows visited
    pub rows_calculated: usize,
    /// Number of cells calculated
    pub cells_calculated: usize,
    /// Number of cells whose formula failed
    pub errors: usize,
    /// Details of every failed cell
    pub diagnostics: Vec<CellDiagnostic>,
}

/// Result of deleting a column
#[derive(Debug, Clone)]
pub struct ColumnRemoval {
    /// The deleted column definition
    pub column: Column,
    /// Calculated columns whose rules referenced the deleted column
    pub rewritten_rules: Vec<String>,
    /// Statistics of the recalculation that followed
    pub stats: CalculationStats,
}

impl PricingTable {
    /// Calculate every calculated cell with default options
    pub fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    /// Calculate every calculated cell with custom options
    pub fn calculate_with_options(
        &mut self,
        options: &CalculationOptions,
    ) -> Result<CalculationStats> {
        let PricingTable {
            columns,
            rows,
            diagnostics,
        } = self;
        let engine = CalculationEngine::new(columns, options).map_err(|err| {
            diagnostics.clear();
            err
        })?;

        let mut stats = engine.new_stats();
        for (index, row) in rows.iter_mut().enumerate() {
            let label = row.label(index);
            engine.calculate_row(row, &label, &engine.order, &mut stats);
        }

        tracing::debug!(
            rows = stats.rows_calculated,
            cells = stats.cells_calculated,
            errors = stats.errors,
            "calculated pricing table"
        );

        *diagnostics = stats.diagnostics.clone();
        Ok(stats)
    }

    /// Recalculate every calculated cell of one row
    pub fn recalculate_row(
        &mut self,
        row_id: &str,
        options: &CalculationOptions,
    ) -> Result<CalculationStats> {
        let index = self
            .row_index(row_id)
            .ok_or_else(|| Error::RowNotFound(row_id.to_string()))?;

        let PricingTable {
            columns,
            rows,
            diagnostics,
        } = self;
        let engine = CalculationEngine::new(columns, options).map_err(|err| {
            diagnostics.clear();
            err
        })?;

        let mut stats = engine.new_stats();
        let row = &mut rows[index];
        let label = row.label(index);
        engine.calculate_row(row, &label, &engine.order, &mut stats);

        merge_diagnostics(diagnostics, &label, &engine.order, &stats.diagnostics);
        Ok(stats)
    }

    /// Host callback for a cell edit, with default options
    pub fn on_cell_edited(
        &mut self,
        row_id: &str,
        column_id: &str,
        value: f64,
    ) -> Result<CalculationStats> {
        self.edit_cell(row_id, column_id, value, &CalculationOptions::default())
    }

    /// Write an input cell and recompute the calculated columns that depend on it
    pub fn edit_cell(
        &mut self,
        row_id: &str,
        column_id: &str,
        value: f64,
        options: &CalculationOptions,
    ) -> Result<CalculationStats> {
        if !value.is_finite() {
            return Err(Error::NonFiniteValue(column_id.to_string()));
        }
        let column = self
            .column(column_id)
            .ok_or_else(|| Error::ColumnNotFound(column_id.to_string()))?;
        if column.is_calculated() {
            return Err(Error::CalculatedColumn(column_id.to_string()));
        }
        let index = self
            .row_index(row_id)
            .ok_or_else(|| Error::RowNotFound(row_id.to_string()))?;

        let PricingTable {
            columns,
            rows,
            diagnostics,
        } = self;
        let engine = CalculationEngine::new(columns, options).map_err(|err| {
            diagnostics.clear();
            err
        })?;
        let affected = engine.graph.affected_by(column_id).map_err(order_error)?;

        let row = &mut rows[index];
        row.set_value(column_id, value);

        let mut stats = engine.new_stats();
        let label = row.label(index);
        engine.calculate_row(row, &label, &affected, &mut stats);

        tracing::debug!(
            row = %label,
            column = column_id,
            recalculated = affected.len(),
            "cell edited"
        );

        merge_diagnostics(diagnostics, &label, &affected, &stats.diagnostics);
        Ok(stats)
    }

    /// Host callback for a column deletion, with default options
    pub fn on_column_deleted(&mut self, column_id: &str) -> Result<ColumnRemoval> {
        self.delete_column(column_id, &CalculationOptions::default())
    }

    /// Delete a column, rewrite every rule that referenced it and recalculate.
    ///
    /// The deletion and rewrite are kept even if the recalculation that
    /// follows fails on a cycle between the remaining calculated columns.
    pub fn delete_column(
        &mut self,
        column_id: &str,
        options: &CalculationOptions,
    ) -> Result<ColumnRemoval> {
        let column = self
            .remove_column(column_id)
            .ok_or_else(|| Error::ColumnNotFound(column_id.to_string()))?;

        let mut rewritten_rules = Vec::new();
        for calculated in &mut self.columns {
            let Some(rule) = &mut calculated.rule else {
                continue;
            };
            let rewritten = remove_column_from_expression(column_id, rule);
            if rewritten != *rule {
                *rule = rewritten;
                rewritten_rules.push(calculated.id.clone());
            }
        }

        tracing::info!(
            column = column_id,
            rewritten = rewritten_rules.len(),
            "deleted pricing table column"
        );

        let stats = self.calculate_with_options(options)?;
        Ok(ColumnRemoval {
            column,
            rewritten_rules,
            stats,
        })
    }
}

/// The calculation engine
struct CalculationEngine<'a> {
    options: &'a CalculationOptions,
    /// Dependency graph built from the rules
    graph: ColumnDependencyGraph,
    /// Calculated columns in dependency order
    order: Vec<String>,
    /// Rules keyed by column id
    rules: HashMap<&'a str, &'a RuleModel>,
}

impl<'a> CalculationEngine<'a> {
    fn new(columns: &'a [Column], options: &'a CalculationOptions) -> Result<Self> {
        if !options.fallback_value.is_finite() {
            return Err(Error::NonFiniteValue("fallback".to_string()));
        }

        let mut graph = ColumnDependencyGraph::new();
        let mut rules = HashMap::new();
        for column in columns {
            if let Some(rule) = &column.rule {
                graph.add_formula(&column.id, rule);
                rules.insert(column.id.as_str(), rule);
            }
        }

        let order = graph.calculation_order().map_err(order_error)?;

        Ok(Self {
            options,
            graph,
            order,
            rules,
        })
    }

    fn new_stats(&self) -> CalculationStats {
        CalculationStats {
            formula_count: self.rules.len(),
            ..Default::default()
        }
    }

    /// Evaluate the given calculated columns for one row, writing results back
    fn calculate_row(
        &self,
        row: &mut ProductRow,
        label: &str,
        columns: &[String],
        stats: &mut CalculationStats,
    ) {
        for column_id in columns {
            let Some(rule) = self.rules.get(column_id.as_str()) else {
                continue;
            };

            let evaluation = {
                let ctx = EvaluationContext::for_column(row, column_id);
                evaluate_rule_with_fallback(rule, &ctx, self.options.fallback_value)
            };

            if self.options.insert_missing_cells {
                row.set_value(column_id.as_str(), evaluation.value);
            } else if let Some(cell) = row.cell_mut(column_id) {
                cell.value = evaluation.value;
            }
            stats.cells_calculated += 1;

            if let Some(error) = evaluation.error {
                stats.errors += 1;
                if self.options.collect_diagnostics {
                    stats.diagnostics.push(CellDiagnostic {
                        row: label.to_string(),
                        column_id: column_id.clone(),
                        rule: rule.to_string(),
                        error,
                    });
                }
            }
        }
        stats.rows_calculated += 1;
    }
}

fn order_error(err: FormulaError) -> Error {
    match err {
        FormulaError::CircularReference { columns } => {
            Error::CircularReference(columns.join(" -> "))
        }
    }
}

/// Replace one row's diagnostics for the recalculated columns
fn merge_diagnostics(
    diagnostics: &mut Vec<CellDiagnostic>,
    row: &str,
    columns: &[String],
    fresh: &[CellDiagnostic],
) {
    diagnostics.retain(|d| !(d.row == row && columns.contains(&d.column_id)));
    diagnostics.extend(fresh.iter().cloned());
}

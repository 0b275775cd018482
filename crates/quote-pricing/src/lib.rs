//! # quote-pricing
//!
//! Pricing tables with calculated columns for quote documents.
//!
//! A pricing table is a small spreadsheet inside a quote: input columns such
//! as quantity and unit cost, and calculated columns whose value is derived
//! from other columns of the same row by a formula tree.
//!
//! ## Features
//!
//! - Formula trees stored as plain JSON data
//! - Fail-soft evaluation: a broken formula degrades one cell, with a
//!   retrievable diagnostic
//! - Dependency-ordered recalculation with cycle rejection
//! - Rule rewriting when a referenced column is deleted
//!
//! ## Example
//!
//! ```rust
//! use quote_pricing::prelude::*;
//!
//! let mut table = PricingTable::new();
//! table.add_column(Column::input("qty", "Quantity")).unwrap();
//! table.add_column(Column::input("unitCost", "Unit cost")).unwrap();
//! table
//!     .add_column(Column::calculated(
//!         "total",
//!         "Total",
//!         RuleModel::new(ExpressionNode::multiply(vec![
//!             ExpressionNode::column("qty"),
//!             ExpressionNode::column("unitCost"),
//!         ])),
//!     ))
//!     .unwrap();
//! table
//!     .add_row(ProductRow::with_id(
//!         "r1",
//!         vec![Cell::new("qty", 2.0), Cell::new("unitCost", 15.0)],
//!     ))
//!     .unwrap();
//!
//! table.on_cell_edited("r1", "qty", 3.0).unwrap();
//! assert_eq!(table.row("r1").unwrap().value("total"), Some(45.0));
//! ```

pub mod calculation;
pub mod prelude;
pub mod table;

// Re-export calculation types
pub use calculation::{CalculationOptions, CalculationStats, CellDiagnostic, ColumnRemoval};
pub use table::{Column, DanglingReference, PricingTable};

// Re-export core types
pub use quote_pricing_core::{Cell, Error, ProductRow, Result};

// Re-export formula types
pub use quote_pricing_formula::{
    evaluate, evaluate_rule, evaluate_rule_with_fallback, remove_column_from_expression,
    EvalError, EvalResult, EvaluationContext, Evaluation, ExpressionNode, Operation, RuleModel,
    FALLBACK_VALUE,
};

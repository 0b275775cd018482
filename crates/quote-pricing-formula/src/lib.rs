//! # quote-pricing-formula
//!
//! Calculated-column expression engine for quote pricing tables.
//!
//! This crate provides:
//! - Expression trees for calculated columns ([`RuleModel`], [`ExpressionNode`])
//! - Evaluation of a tree against one row ([`evaluate`], [`evaluate_rule`])
//! - Rule rewriting when a column is deleted ([`remove_column_from_expression`])
//! - Dependency tracking between calculated columns
//!
//! ## Example
//!
//! ```rust
//! use quote_pricing_core::{Cell, ProductRow};
//! use quote_pricing_formula::{evaluate, EvaluationContext, ExpressionNode};
//!
//! let row = ProductRow::new(vec![Cell::new("qty", 2.0), Cell::new("unitCost", 15.0)]);
//! let expr = ExpressionNode::multiply(vec![
//!     ExpressionNode::column("qty"),
//!     ExpressionNode::column("unitCost"),
//! ]);
//!
//! assert_eq!(evaluate(&expr, &EvaluationContext::new(&row)), Ok(30.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod rewrite;

#[cfg(test)]
mod proptests;

pub use ast::{ExpressionNode, Operation, RuleModel};
pub use dependency::ColumnDependencyGraph;
pub use error::{EvalError, EvalResult, FormulaError, FormulaResult};
pub use evaluator::{
    evaluate, evaluate_rule, evaluate_rule_with_fallback, EvaluationContext, Evaluation,
    FALLBACK_VALUE, MAX_EXPRESSION_DEPTH,
};
pub use rewrite::{remove_column_from_expression, COLUMN_REMOVAL_SUBSTITUTE};

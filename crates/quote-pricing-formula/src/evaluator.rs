//! Formula evaluator
//!
//! Evaluates expression trees against a single row to produce a number.
//! [`evaluate`] is the typed core and reports every failure as an
//! [`EvalError`]. [`evaluate_rule`] wraps it with the fail-soft contract used
//! for rendering: a broken or incomplete formula yields a fallback value plus
//! the error, and never takes down the rest of the table.

use crate::ast::{ExpressionNode, Operation, RuleModel};
use crate::error::{EvalError, EvalResult};
use quote_pricing_core::ProductRow;

/// Maximum nesting depth accepted by the evaluator
pub const MAX_EXPRESSION_DEPTH: usize = 256;

/// Value reported for a calculated cell whose formula failed
pub const FALLBACK_VALUE: f64 = 0.0;

/// Context for formula evaluation
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    /// Row whose cells are read
    pub row: &'a ProductRow,
    /// Calculated column being computed, if any
    pub column_id: Option<&'a str>,
}

impl<'a> EvaluationContext<'a> {
    /// Context for evaluating an expression outside any column
    pub fn new(row: &'a ProductRow) -> Self {
        Self {
            row,
            column_id: None,
        }
    }

    /// Context for computing the given calculated column
    pub fn for_column(row: &'a ProductRow, column_id: &'a str) -> Self {
        Self {
            row,
            column_id: Some(column_id),
        }
    }

    /// Look up a column's value in the row
    pub fn lookup(&self, column_id: &str) -> EvalResult<f64> {
        let value = self
            .row
            .value(column_id)
            .ok_or_else(|| EvalError::missing_column(column_id))?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFiniteValue {
                column_id: column_id.to_string(),
            })
        }
    }
}

/// Evaluate an expression tree against a row
pub fn evaluate(expr: &ExpressionNode, ctx: &EvaluationContext<'_>) -> EvalResult<f64> {
    evaluate_node(expr, ctx, 1)
}

fn evaluate_node(
    expr: &ExpressionNode,
    ctx: &EvaluationContext<'_>,
    depth: usize,
) -> EvalResult<f64> {
    if depth > MAX_EXPRESSION_DEPTH {
        return Err(EvalError::malformed(format!(
            "expression nesting exceeds {MAX_EXPRESSION_DEPTH} levels"
        )));
    }

    match expr {
        ExpressionNode::ConstantValue { value } if value.is_finite() => Ok(*value),
        ExpressionNode::ConstantValue { value } => Err(EvalError::malformed(format!(
            "constant {value} is not a finite number"
        ))),
        ExpressionNode::ColumnReference { column_id } => ctx.lookup(column_id),
        ExpressionNode::CellValue => match ctx.column_id {
            Some(column_id) => ctx.lookup(column_id),
            None => Err(EvalError::malformed(
                "cell value marker evaluated outside a calculated column",
            )),
        },
        ExpressionNode::Operation { operation, args } => {
            evaluate_operation(operation, args, ctx, depth)
        }
        ExpressionNode::Unrecognized(_) => Err(EvalError::malformed(
            match expr.unrecognized_type() {
                Some(tag) => format!("unrecognized node type '{tag}'"),
                None => "node has no recognizable type".to_string(),
            },
        )),
    }
}

fn evaluate_operation(
    operation: &Operation,
    args: &[ExpressionNode],
    ctx: &EvaluationContext<'_>,
    depth: usize,
) -> EvalResult<f64> {
    if !operation.is_supported() {
        return Err(EvalError::UnsupportedOperation {
            operation: operation.name().to_string(),
        });
    }
    if args.is_empty() {
        return Err(EvalError::malformed(format!(
            "'{operation}' operation has no arguments"
        )));
    }

    // All arguments are evaluated before folding
    let values = args
        .iter()
        .map(|arg| evaluate_node(arg, ctx, depth + 1))
        .collect::<EvalResult<Vec<f64>>>()?;

    let (first, rest) = values
        .split_first()
        .ok_or_else(|| EvalError::malformed("operation has no arguments"))?;
    rest.iter()
        .try_fold(*first, |acc, &value| apply_operation(operation, acc, value))
}

/// Apply a binary arithmetic step of a left fold.
///
/// A step never yields an infinite or NaN value: a quotient that is not
/// finite (zero or subnormal divisor) is a division by zero, and overflow in
/// the other operations is [`EvalError::NonFiniteResult`].
pub fn apply_operation(operation: &Operation, left: f64, right: f64) -> EvalResult<f64> {
    let result = match operation {
        Operation::Add => left + right,
        Operation::Subtract => left - right,
        Operation::Multiply => left * right,
        Operation::Divide if right == 0.0 => return Err(EvalError::DivisionByZero),
        Operation::Divide => left / right,
        Operation::Unsupported(name) => {
            return Err(EvalError::UnsupportedOperation {
                operation: name.clone(),
            })
        }
    };

    if result.is_finite() {
        Ok(result)
    } else if *operation == Operation::Divide {
        Err(EvalError::DivisionByZero)
    } else {
        Err(EvalError::NonFiniteResult {
            operation: operation.name().to_string(),
        })
    }
}

/// Outcome of evaluating a rule for display
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Value to display (the fallback when `error` is set)
    pub value: f64,
    /// What failed, if anything
    pub error: Option<EvalError>,
}

impl Evaluation {
    /// Successful evaluation
    pub fn ok(value: f64) -> Self {
        Self { value, error: None }
    }

    /// Failed evaluation reported with a fallback value
    pub fn failed(error: EvalError, fallback: f64) -> Self {
        Self {
            value: fallback,
            error: Some(error),
        }
    }

    /// Check if evaluation succeeded
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Convert back to a typed result, dropping the fallback
    pub fn into_result(self) -> EvalResult<f64> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.value),
        }
    }
}

/// Evaluate a rule with the default fallback of `0`
pub fn evaluate_rule(rule: &RuleModel, ctx: &EvaluationContext<'_>) -> Evaluation {
    evaluate_rule_with_fallback(rule, ctx, FALLBACK_VALUE)
}

/// Evaluate a rule, reporting failures as `(fallback, error)`.
///
/// Failures are logged with the column, row and rule so the offending formula
/// can be found from the log alone.
pub fn evaluate_rule_with_fallback(
    rule: &RuleModel,
    ctx: &EvaluationContext<'_>,
    fallback: f64,
) -> Evaluation {
    match evaluate(&rule.expression, ctx) {
        Ok(value) => Evaluation::ok(value),
        Err(err) => {
            tracing::warn!(
                column = ctx.column_id.unwrap_or("<none>"),
                row = ctx.row.id.as_deref().unwrap_or("<unnamed>"),
                rule = %rule,
                error = %err,
                "calculated column evaluation failed, using fallback value"
            );
            Evaluation::failed(err, fallback)
        }
    }
}

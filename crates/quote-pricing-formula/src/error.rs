//! Formula error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for expression evaluation
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Result type for formula-level operations (dependency analysis)
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while evaluating one expression tree against a row
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EvalError {
    /// A column reference has no matching cell in the row
    #[error("Missing column reference: no cell for column '{column_id}'")]
    MissingColumnReference {
        #[serde(rename = "columnId")]
        column_id: String,
    },

    /// A divide operation's divisor evaluated to zero
    #[error("Division by zero")]
    DivisionByZero,

    /// An operation produced an infinite or NaN value (overflow)
    #[error("Operation '{operation}' produced a non-finite result")]
    NonFiniteResult { operation: String },

    /// A cell read by the rule holds an infinite or NaN value
    #[error("Column '{column_id}' holds a non-finite value")]
    NonFiniteValue {
        #[serde(rename = "columnId")]
        column_id: String,
    },

    /// Structurally invalid tree (empty argument list, unknown node type, ...)
    #[error("Malformed expression tree: {reason}")]
    MalformedTree { reason: String },

    /// Operation name outside add/subtract/multiply/divide
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },
}

impl EvalError {
    /// Create a malformed-tree error with a reason
    pub fn malformed<S: Into<String>>(reason: S) -> Self {
        EvalError::MalformedTree {
            reason: reason.into(),
        }
    }

    /// Create a missing-column error
    pub fn missing_column<S: Into<String>>(column_id: S) -> Self {
        EvalError::MissingColumnReference {
            column_id: column_id.into(),
        }
    }

    /// Whether the rule itself is broken, as opposed to the row's data.
    ///
    /// A missing column usually means the row has not been fully loaded yet;
    /// overflow and non-finite cells come from the values, not the formula.
    pub fn is_formula_defect(&self) -> bool {
        !matches!(
            self,
            EvalError::MissingColumnReference { .. }
                | EvalError::NonFiniteResult { .. }
                | EvalError::NonFiniteValue { .. }
        )
    }

    /// Error for a value that cannot be stored in a cell
    pub fn non_finite_result<S: Into<String>>(operation: S) -> Self {
        EvalError::NonFiniteResult {
            operation: operation.into(),
        }
    }
}

/// Errors from formula analysis across columns
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Calculated columns depend on each other in a cycle
    #[error("Circular reference detected: {}", columns.join(" -> "))]
    CircularReference { columns: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display() {
        assert_eq!(
            EvalError::missing_column("qty").to_string(),
            "Missing column reference: no cell for column 'qty'"
        );
        assert_eq!(EvalError::DivisionByZero.to_string(), "Division by zero");
        let cycle = FormulaError::CircularReference {
            columns: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(cycle.to_string(), "Circular reference detected: a -> b -> a");
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(EvalError::missing_column("qty")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "missingColumnReference", "columnId": "qty" })
        );
        let json = serde_json::to_value(EvalError::DivisionByZero).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "divisionByZero" }));
    }

    #[test]
    fn test_formula_defect_classification() {
        assert!(!EvalError::missing_column("qty").is_formula_defect());
        assert!(EvalError::DivisionByZero.is_formula_defect());
        assert!(EvalError::malformed("empty").is_formula_defect());
        assert!(!EvalError::non_finite_result("multiply").is_formula_defect());
    }
}

//! Rule rewriting when a table column is deleted
//!
//! Every reference to the deleted column becomes the constant
//! [`COLUMN_REMOVAL_SUBSTITUTE`]. The substitute is `1` for every operation:
//! it leaves `multiply`/`divide` chains unchanged but adds a nonzero term to
//! `add`/`subtract` chains. Substitution is not operation-aware.

use crate::ast::{ExpressionNode, RuleModel};

/// Constant that replaces references to a deleted column
pub const COLUMN_REMOVAL_SUBSTITUTE: f64 = 1.0;

/// Return a copy of `rule` with every reference to `column_id` replaced.
///
/// Operations keep their kind and argument order; all other nodes are copied
/// unchanged. Rewriting a rule that no longer references the column returns
/// an equal rule.
pub fn remove_column_from_expression(column_id: &str, rule: &RuleModel) -> RuleModel {
    RuleModel::new(remove_column(column_id, &rule.expression))
}

fn remove_column(column_id: &str, node: &ExpressionNode) -> ExpressionNode {
    match node {
        ExpressionNode::ColumnReference { column_id: id } if id == column_id => {
            ExpressionNode::constant(COLUMN_REMOVAL_SUBSTITUTE)
        }
        ExpressionNode::Operation { operation, args } => ExpressionNode::Operation {
            operation: operation.clone(),
            args: args.iter().map(|arg| remove_column(column_id, arg)).collect(),
        },
        other => other.clone(),
    }
}

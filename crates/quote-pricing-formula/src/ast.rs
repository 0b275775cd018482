//! Expression tree types for calculated columns
//!
//! Trees are plain owned data so a [`RuleModel`] round-trips through
//! persistence unchanged. The JSON form uses an internal `"type"` tag:
//!
//! ```json
//! {
//!   "expression": {
//!     "type": "operation",
//!     "operation": "multiply",
//!     "args": [
//!       { "type": "columnReference", "columnId": "unitCost" },
//!       { "type": "constantValue", "value": 3 }
//!     ]
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The formula attached to one calculated column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleModel {
    /// Root of the expression tree
    pub expression: ExpressionNode,
}

impl RuleModel {
    /// Create a rule from its root expression
    pub fn new(expression: ExpressionNode) -> Self {
        Self { expression }
    }
}

impl From<ExpressionNode> for RuleModel {
    fn from(expression: ExpressionNode) -> Self {
        Self::new(expression)
    }
}

impl fmt::Display for RuleModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.expression.fmt(f)
    }
}

/// One node of a calculated column's expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ExpressionNode {
    /// Another column's value in the same row
    ColumnReference {
        #[serde(rename = "columnId")]
        column_id: String,
    },
    /// Numeric literal
    ConstantValue { value: f64 },
    /// The stored value of the column being computed
    CellValue,
    /// Arithmetic applied left to right over `args`
    Operation {
        operation: Operation,
        args: Vec<ExpressionNode>,
    },
    /// Node this version does not understand, kept verbatim so it is saved
    /// back unchanged
    #[serde(untagged)]
    Unrecognized(Map<String, Value>),
}

impl ExpressionNode {
    /// Reference to another column
    pub fn column<S: Into<String>>(column_id: S) -> Self {
        ExpressionNode::ColumnReference {
            column_id: column_id.into(),
        }
    }

    /// Numeric literal
    pub fn constant(value: f64) -> Self {
        ExpressionNode::ConstantValue { value }
    }

    /// Marker for the computed column's own stored value
    pub fn cell_value() -> Self {
        ExpressionNode::CellValue
    }

    /// Operation over an argument list
    pub fn operation(operation: Operation, args: Vec<ExpressionNode>) -> Self {
        ExpressionNode::Operation { operation, args }
    }

    pub fn add(args: Vec<ExpressionNode>) -> Self {
        Self::operation(Operation::Add, args)
    }

    pub fn subtract(args: Vec<ExpressionNode>) -> Self {
        Self::operation(Operation::Subtract, args)
    }

    pub fn multiply(args: Vec<ExpressionNode>) -> Self {
        Self::operation(Operation::Multiply, args)
    }

    pub fn divide(args: Vec<ExpressionNode>) -> Self {
        Self::operation(Operation::Divide, args)
    }

    /// The `type` tag of an unrecognized node, if it has one
    pub fn unrecognized_type(&self) -> Option<&str> {
        match self {
            ExpressionNode::Unrecognized(raw) => raw.get("type").and_then(Value::as_str),
            _ => None,
        }
    }

    /// Column ids referenced anywhere in this tree, in first-seen order
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut refs = Vec::new();
        self.collect_references(&mut refs);
        refs
    }

    fn collect_references<'a>(&'a self, refs: &mut Vec<&'a str>) {
        match self {
            ExpressionNode::ColumnReference { column_id } => {
                if !refs.contains(&column_id.as_str()) {
                    refs.push(column_id);
                }
            }
            ExpressionNode::Operation { args, .. } => {
                for arg in args {
                    arg.collect_references(refs);
                }
            }
            ExpressionNode::ConstantValue { .. }
            | ExpressionNode::CellValue
            | ExpressionNode::Unrecognized(_) => {}
        }
    }

    /// Check if any node references the given column
    pub fn references_column(&self, column_id: &str) -> bool {
        match self {
            ExpressionNode::ColumnReference { column_id: id } => id == column_id,
            ExpressionNode::Operation { args, .. } => {
                args.iter().any(|arg| arg.references_column(column_id))
            }
            _ => false,
        }
    }

    /// Depth of the tree (a leaf has depth 1)
    pub fn depth(&self) -> usize {
        match self {
            ExpressionNode::Operation { args, .. } => {
                1 + args.iter().map(ExpressionNode::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }

    /// Number of operation nodes in the tree
    pub fn operation_count(&self) -> usize {
        match self {
            ExpressionNode::Operation { args, .. } => {
                1 + args.iter().map(ExpressionNode::operation_count).sum::<usize>()
            }
            _ => 0,
        }
    }
}

impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionNode::ColumnReference { column_id } => f.write_str(column_id),
            ExpressionNode::ConstantValue { value } => {
                // Integral constants print without a trailing ".0"
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            ExpressionNode::CellValue => f.write_str("@cell"),
            ExpressionNode::Operation { operation, args } => match operation.symbol() {
                Some(symbol) if !args.is_empty() => {
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            write!(f, " {symbol} ")?;
                        }
                        if matches!(arg, ExpressionNode::Operation { .. }) {
                            write!(f, "({arg})")?;
                        } else {
                            write!(f, "{arg}")?;
                        }
                    }
                    Ok(())
                }
                _ => {
                    write!(f, "{operation}(")?;
                    for (i, arg) in args.iter().enumerate() {
                        if i > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    f.write_str(")")
                }
            },
            ExpressionNode::Unrecognized(_) => match self.unrecognized_type() {
                Some(tag) => write!(f, "<{tag}>"),
                None => f.write_str("<unrecognized>"),
            },
        }
    }
}

/// Arithmetic operations
///
/// Serialized as a lowercase string. Strings outside the four known kinds are
/// kept as [`Operation::Unsupported`] so stored documents still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operation {
    Add,
    Subtract,
    Multiply,
    Divide,
    /// Unknown operation name read from storage
    Unsupported(String),
}

impl Operation {
    /// Wire name of the operation
    pub fn name(&self) -> &str {
        match self {
            Operation::Add => "add",
            Operation::Subtract => "subtract",
            Operation::Multiply => "multiply",
            Operation::Divide => "divide",
            Operation::Unsupported(name) => name,
        }
    }

    /// Infix symbol, if the operation is supported
    pub fn symbol(&self) -> Option<char> {
        match self {
            Operation::Add => Some('+'),
            Operation::Subtract => Some('-'),
            Operation::Multiply => Some('*'),
            Operation::Divide => Some('/'),
            Operation::Unsupported(_) => None,
        }
    }

    /// Check if this is one of the four known operations
    pub fn is_supported(&self) -> bool {
        !matches!(self, Operation::Unsupported(_))
    }
}

impl From<String> for Operation {
    fn from(name: String) -> Self {
        match name.as_str() {
            "add" => Operation::Add,
            "subtract" => Operation::Subtract,
            "multiply" => Operation::Multiply,
            "divide" => Operation::Divide,
            _ => Operation::Unsupported(name),
        }
    }
}

impl From<&str> for Operation {
    fn from(name: &str) -> Self {
        Operation::from(name.to_string())
    }
}

impl From<Operation> for String {
    fn from(op: Operation) -> Self {
        match op {
            Operation::Unsupported(name) => name,
            other => other.name().to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn nested_rule() -> RuleModel {
        RuleModel::new(ExpressionNode::add(vec![
            ExpressionNode::multiply(vec![
                ExpressionNode::column("qty"),
                ExpressionNode::column("unitCost"),
            ]),
            ExpressionNode::column("shipping"),
        ]))
    }

    #[test]
    fn test_json_shape() {
        let rule = RuleModel::new(ExpressionNode::multiply(vec![
            ExpressionNode::column("unitCost"),
            ExpressionNode::constant(3.0),
        ]));
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "expression": {
                    "type": "operation",
                    "operation": "multiply",
                    "args": [
                        { "type": "columnReference", "columnId": "unitCost" },
                        { "type": "constantValue", "value": 3.0 }
                    ]
                }
            })
        );
    }

    #[test]
    fn test_json_round_trip() {
        let rule = nested_rule();
        let text = serde_json::to_string(&rule).unwrap();
        let back: RuleModel = serde_json::from_str(&text).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_cell_value_marker_json() {
        let node: ExpressionNode = serde_json::from_str(r#"{"type":"cellValue"}"#).unwrap();
        assert_eq!(node, ExpressionNode::CellValue);
        assert_eq!(
            serde_json::to_string(&node).unwrap(),
            r#"{"type":"cellValue"}"#
        );
    }

    #[test]
    fn test_unknown_tags_are_preserved_as_data() {
        let raw = r#"{"type":"percentOf","columnId":"qty","pct":10}"#;
        let node: ExpressionNode = serde_json::from_str(raw).unwrap();
        assert!(matches!(node, ExpressionNode::Unrecognized(_)));
        assert_eq!(node.unrecognized_type(), Some("percentOf"));
        assert_eq!(node.to_string(), "<percentOf>");
        // Saved back exactly as loaded
        assert_eq!(
            serde_json::to_value(&node).unwrap(),
            serde_json::from_str::<Value>(raw).unwrap()
        );

        // A known tag with an unusable payload is kept too
        let node: ExpressionNode = serde_json::from_str(r#"{"type":"columnReference"}"#).unwrap();
        assert!(matches!(node, ExpressionNode::Unrecognized(_)));
        assert_eq!(node.unrecognized_type(), Some("columnReference"));

        let node: ExpressionNode = serde_json::from_str(
            r#"{"type":"operation","operation":"power","args":[{"type":"constantValue","value":2}]}"#,
        )
        .unwrap();
        assert_eq!(
            node,
            ExpressionNode::operation(
                Operation::Unsupported("power".into()),
                vec![ExpressionNode::constant(2.0)]
            )
        );
        // Unknown operation names survive a save
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["operation"], "power");
    }

    #[test]
    fn test_unknown_node_inside_rule_round_trips() {
        let raw = r#"{"expression":{"type":"operation","operation":"add","args":[
            {"type":"columnReference","columnId":"qty"},
            {"type":"lookup","table":"rates","key":{"column":"region"}}
        ]}}"#;
        let rule: RuleModel = serde_json::from_str(raw).unwrap();
        assert_eq!(rule.expression.referenced_columns(), vec!["qty"]);

        let saved = serde_json::to_value(&rule).unwrap();
        assert_eq!(saved, serde_json::from_str::<Value>(raw).unwrap());
        let back: RuleModel = serde_json::from_value(saved).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn test_referenced_columns() {
        let rule = RuleModel::new(ExpressionNode::add(vec![
            ExpressionNode::column("qty"),
            ExpressionNode::multiply(vec![
                ExpressionNode::column("unitCost"),
                ExpressionNode::column("qty"),
            ]),
            ExpressionNode::cell_value(),
        ]));
        assert_eq!(rule.expression.referenced_columns(), vec!["qty", "unitCost"]);
        assert!(rule.expression.references_column("unitCost"));
        assert!(!rule.expression.references_column("shipping"));
    }

    #[test]
    fn test_depth_and_operation_count() {
        let rule = nested_rule();
        assert_eq!(rule.expression.depth(), 3);
        assert_eq!(rule.expression.operation_count(), 2);
        assert_eq!(ExpressionNode::constant(1.0).depth(), 1);
        assert_eq!(ExpressionNode::constant(1.0).operation_count(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(nested_rule().to_string(), "(qty * unitCost) + shipping");
        assert_eq!(
            ExpressionNode::divide(vec![
                ExpressionNode::constant(10.0),
                ExpressionNode::constant(2.5),
            ])
            .to_string(),
            "10 / 2.5"
        );
        assert_eq!(
            ExpressionNode::operation(
                Operation::from("power"),
                vec![ExpressionNode::column("qty"), ExpressionNode::constant(2.0)]
            )
            .to_string(),
            "power(qty, 2)"
        );
        assert_eq!(ExpressionNode::add(vec![]).to_string(), "add()");
    }

    #[test]
    fn test_operation_names() {
        for op in [
            Operation::Add,
            Operation::Subtract,
            Operation::Multiply,
            Operation::Divide,
        ] {
            assert!(op.is_supported());
            assert_eq!(Operation::from(op.name()), op);
        }
        assert!(!Operation::from("modulo").is_supported());
    }
}

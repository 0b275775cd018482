//! Property-based tests for expression trees.

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use crate::ast::{ExpressionNode, Operation, RuleModel};
    use crate::rewrite::remove_column_from_expression;

    const COLUMNS: [&str; 4] = ["qty", "unitCost", "shipping", "discount"];

    fn operation() -> impl Strategy<Value = Operation> {
        prop_oneof![
            Just(Operation::Add),
            Just(Operation::Subtract),
            Just(Operation::Multiply),
            Just(Operation::Divide),
        ]
    }

    // Strategy for generating trees up to four levels deep
    fn expression() -> impl Strategy<Value = ExpressionNode> {
        let leaf = prop_oneof![
            (prop::num::f64::NORMAL | prop::num::f64::SUBNORMAL | prop::num::f64::ZERO)
                .prop_map(ExpressionNode::constant),
            prop::sample::select(COLUMNS.to_vec()).prop_map(ExpressionNode::column),
            Just(ExpressionNode::cell_value()),
        ];
        leaf.prop_recursive(4, 32, 4, |inner| {
            (operation(), prop::collection::vec(inner, 1..4))
                .prop_map(|(op, args)| ExpressionNode::operation(op, args))
        })
    }

    /// Operation tags in pre-order
    fn operation_shape(node: &ExpressionNode, out: &mut Vec<(Operation, usize)>) {
        if let ExpressionNode::Operation { operation, args } = node {
            out.push((operation.clone(), args.len()));
            for arg in args {
                operation_shape(arg, out);
            }
        }
    }

    proptest! {
        #[test]
        fn rewrite_preserves_operation_structure(
            expr in expression(),
            column in prop::sample::select(COLUMNS.to_vec()),
        ) {
            let rule = RuleModel::new(expr);
            let rewritten = remove_column_from_expression(column, &rule);

            let mut before = Vec::new();
            let mut after = Vec::new();
            operation_shape(&rule.expression, &mut before);
            operation_shape(&rewritten.expression, &mut after);

            prop_assert_eq!(before, after);
            prop_assert_eq!(rule.expression.depth(), rewritten.expression.depth());
            prop_assert!(!rewritten.expression.references_column(column));
        }

        #[test]
        fn rewrite_keeps_other_references(
            expr in expression(),
            column in prop::sample::select(COLUMNS.to_vec()),
        ) {
            let rule = RuleModel::new(expr);
            let rewritten = remove_column_from_expression(column, &rule);

            let expected: Vec<&str> = rule
                .expression
                .referenced_columns()
                .into_iter()
                .filter(|c| *c != column)
                .collect();
            prop_assert_eq!(rewritten.expression.referenced_columns(), expected);
        }

        #[test]
        fn rewrite_is_idempotent(
            expr in expression(),
            column in prop::sample::select(COLUMNS.to_vec()),
        ) {
            let once = remove_column_from_expression(column, &RuleModel::new(expr));
            let twice = remove_column_from_expression(column, &once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn json_round_trip(expr in expression()) {
            let rule = RuleModel::new(expr);
            let text = serde_json::to_string(&rule).unwrap();
            let back: RuleModel = serde_json::from_str(&text).unwrap();
            prop_assert_eq!(back, rule);
        }
    }
}

//! Dependency tracking between calculated columns
//!
//! A calculated column may read another calculated column's stored value.
//! The host must then compute columns in topological order and reject
//! cycles before evaluating anything; the evaluator itself only ever looks
//! at one tree.

use crate::ast::RuleModel;
use crate::error::{FormulaError, FormulaResult};
use ahash::{AHashMap, AHashSet};

/// Dependency graph for calculated columns
///
/// Tracks which columns each formula reads, enabling ordered and minimal
/// recalculation.
#[derive(Debug, Default)]
pub struct ColumnDependencyGraph {
    /// Formula columns in registration order
    formula_columns: Vec<String>,
    /// Column → Columns it reads (precedents), in reference order
    precedents: AHashMap<String, Vec<String>>,
    /// Column → Formula columns that read it (dependents)
    dependents: AHashMap<String, AHashSet<String>>,
}

impl ColumnDependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a calculated column's rule, replacing any earlier one
    pub fn add_formula(&mut self, column_id: &str, rule: &RuleModel) {
        self.remove_formula(column_id);

        let reads: Vec<String> = rule
            .expression
            .referenced_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        for precedent in &reads {
            self.dependents
                .entry(precedent.clone())
                .or_default()
                .insert(column_id.to_string());
        }
        self.precedents.insert(column_id.to_string(), reads);
        self.formula_columns.push(column_id.to_string());
    }

    /// Remove a calculated column's rule
    pub fn remove_formula(&mut self, column_id: &str) {
        if let Some(reads) = self.precedents.remove(column_id) {
            for precedent in reads {
                if let Some(deps) = self.dependents.get_mut(&precedent) {
                    deps.remove(column_id);
                    if deps.is_empty() {
                        self.dependents.remove(&precedent);
                    }
                }
            }
        }
        self.formula_columns.retain(|c| c != column_id);
    }

    /// Check whether a column has a registered formula
    pub fn is_formula(&self, column_id: &str) -> bool {
        self.precedents.contains_key(column_id)
    }

    /// Number of registered formulas
    pub fn formula_count(&self) -> usize {
        self.formula_columns.len()
    }

    /// Columns the given formula column reads
    pub fn precedents(&self, column_id: &str) -> impl Iterator<Item = &str> + '_ {
        self.precedents
            .get(column_id)
            .into_iter()
            .flat_map(|reads| reads.iter().map(String::as_str))
    }

    /// Formula columns that read the given column
    pub fn dependents(&self, column_id: &str) -> impl Iterator<Item = &str> + '_ {
        self.dependents
            .get(column_id)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }

    /// All formula columns in an order where every column comes after the
    /// formula columns it reads
    pub fn calculation_order(&self) -> FormulaResult<Vec<String>> {
        let mut order = Vec::with_capacity(self.formula_columns.len());
        let mut visited = AHashSet::new();
        let mut stack = Vec::new();

        for column in &self.formula_columns {
            self.visit(column, &mut order, &mut visited, &mut stack)?;
        }

        Ok(order)
    }

    /// Formula columns that must be recomputed after `changed` is edited,
    /// in calculation order
    pub fn affected_by(&self, changed: &str) -> FormulaResult<Vec<String>> {
        let mut affected = AHashSet::new();
        let mut pending = vec![changed];
        while let Some(column) = pending.pop() {
            for dependent in self.dependents(column) {
                if affected.insert(dependent) {
                    pending.push(dependent);
                }
            }
        }

        Ok(self
            .calculation_order()?
            .into_iter()
            .filter(|column| affected.contains(column.as_str()))
            .collect())
    }

    /// Topological sort helper (DFS over precedents)
    fn visit<'a>(
        &'a self,
        column: &'a str,
        order: &mut Vec<String>,
        visited: &mut AHashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> FormulaResult<()> {
        if visited.contains(column) {
            return Ok(());
        }
        if let Some(pos) = stack.iter().position(|c| *c == column) {
            let mut columns: Vec<String> = stack[pos..].iter().map(|c| c.to_string()).collect();
            columns.push(column.to_string());
            return Err(FormulaError::CircularReference { columns });
        }
        // Input columns are leaves
        let Some(reads) = self.precedents.get(column) else {
            return Ok(());
        };

        stack.push(column);
        for precedent in reads {
            self.visit(precedent, order, visited, stack)?;
        }
        stack.pop();

        visited.insert(column);
        order.push(column.to_string());
        Ok(())
    }

    /// Detect circular references involving a column
    pub fn has_circular_reference(&self, column_id: &str) -> bool {
        let mut visited = AHashSet::new();
        let mut in_stack = AHashSet::new();
        self.detect_cycle(column_id, column_id, &mut visited, &mut in_stack)
    }

    fn detect_cycle<'a>(
        &'a self,
        target: &str,
        column: &'a str,
        visited: &mut AHashSet<&'a str>,
        in_stack: &mut AHashSet<&'a str>,
    ) -> bool {
        if in_stack.contains(column) {
            return column == target;
        }
        if !visited.insert(column) {
            return false;
        }

        in_stack.insert(column);
        let found = self
            .precedents(column)
            .any(|precedent| self.detect_cycle(target, precedent, visited, in_stack));
        in_stack.remove(column);
        found
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.formula_columns.clear();
        self.precedents.clear();
        self.dependents.clear();
    }
}

// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Equivalence-class graph explored by the search
//!
//! Every [`EquivalenceClass`] holds logically equivalent expressions. Pattern
//! classes are keyed by the aliases they cover, so every decomposition of the
//! same part of a query lands in the same class and shares its row count.
//! Expressions are deduplicated on `(operator, input classes)`.

use super::cardinality::RowCountEstimator;
use super::cost::Cost;
use super::error::{PlanningError, PlanningResult};
use super::logical::{LogicalNode, LogicalOp};
use crate::pattern::{GraphPattern, PatternKey};
use std::collections::HashMap;

pub type GroupId = usize;
pub type ExprId = usize;

/// One operator whose inputs are equivalence classes
#[derive(Debug, Clone)]
pub struct MemoExpr {
    pub id: ExprId,
    pub group: GroupId,
    pub op: LogicalOp,
    pub inputs: Vec<GroupId>,
}

/// Best expression found for a class and its cumulative cost
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Winner {
    pub expr: ExprId,
    pub cost: Cost,
}

#[derive(Debug, Clone)]
pub struct EquivalenceClass {
    id: GroupId,
    exprs: Vec<ExprId>,
    rows: Option<f64>,
    original_pattern: Option<GraphPattern>,
    pub(crate) best: Option<Winner>,
    pub(crate) optimized: bool,
    /// Largest bound under which no plan was found
    pub(crate) failed_bound: Option<Cost>,
}

impl EquivalenceClass {
    fn new(id: GroupId, original_pattern: Option<GraphPattern>) -> Self {
        Self {
            id,
            exprs: Vec::new(),
            rows: None,
            original_pattern,
            best: None,
            optimized: false,
            failed_bound: None,
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Member expressions in discovery order
    pub fn exprs(&self) -> &[ExprId] {
        &self.exprs
    }

    /// Output row count shared by every member
    pub fn rows(&self) -> Option<f64> {
        self.rows
    }

    /// The undecomposed pattern this class was created for
    pub fn original_pattern(&self) -> Option<&GraphPattern> {
        self.original_pattern.as_ref()
    }

    pub fn best(&self) -> Option<&Winner> {
        self.best.as_ref()
    }

    pub fn best_cost(&self) -> Cost {
        self.best.map(|w| w.cost).unwrap_or_else(Cost::infinite)
    }

    pub fn is_optimized(&self) -> bool {
        self.optimized
    }
}

/// Input of a rewrite: an existing class, or the class of a pattern
#[derive(Debug, Clone)]
pub enum RewriteInput {
    Group(GroupId),
    Pattern(GraphPattern),
}

/// An expression equivalent to the one a rule fired on
#[derive(Debug, Clone)]
pub struct Rewrite {
    pub op: LogicalOp,
    pub inputs: Vec<RewriteInput>,
}

#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<EquivalenceClass>,
    exprs: Vec<MemoExpr>,
    pattern_groups: HashMap<PatternKey, GroupId>,
    expr_index: HashMap<(Vec<u8>, Vec<GroupId>), ExprId>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, id: GroupId) -> &EquivalenceClass {
        &self.groups[id]
    }

    pub(crate) fn group_mut(&mut self, id: GroupId) -> &mut EquivalenceClass {
        &mut self.groups[id]
    }

    pub fn groups(&self) -> &[EquivalenceClass] {
        &self.groups
    }

    pub fn expr(&self, id: ExprId) -> &MemoExpr {
        &self.exprs[id]
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn expr_count(&self) -> usize {
        self.exprs.len()
    }

    /// Copy a logical tree into the memo, returning the root class
    pub fn insert_tree(&mut self, node: &LogicalNode) -> PlanningResult<GroupId> {
        if let LogicalOp::Pattern(pattern) = &node.op {
            return self.pattern_group(pattern);
        }
        let inputs = node
            .inputs
            .iter()
            .map(|input| self.insert_tree(input))
            .collect::<PlanningResult<Vec<_>>>()?;
        let key = (encode_op(&node.op)?, inputs.clone());
        if let Some(existing) = self.expr_index.get(&key) {
            return Ok(self.exprs[*existing].group);
        }
        let group = self.new_group(None);
        self.push_expr(group, node.op.clone(), inputs, key);
        Ok(group)
    }

    /// Class of `pattern`, created with the raw pattern as its first member
    /// if this part of the query has not been seen yet
    pub fn pattern_group(&mut self, pattern: &GraphPattern) -> PlanningResult<GroupId> {
        let key = pattern.identity_key();
        if let Some(group) = self.pattern_groups.get(&key) {
            return Ok(*group);
        }
        let group = self.new_group(Some(pattern.clone()));
        self.pattern_groups.insert(key, group);
        let op = LogicalOp::Pattern(pattern.clone());
        let index_key = (encode_op(&op)?, Vec::new());
        self.push_expr(group, op, Vec::new(), index_key);
        Ok(group)
    }

    pub fn find_pattern_group(&self, pattern: &GraphPattern) -> Option<GroupId> {
        self.pattern_groups.get(&pattern.identity_key()).copied()
    }

    /// Add `op` to `group`. Returns `None` if the expression already exists.
    pub fn add_expr(
        &mut self,
        group: GroupId,
        op: LogicalOp,
        inputs: Vec<GroupId>,
    ) -> PlanningResult<Option<ExprId>> {
        if inputs.contains(&group) {
            return Err(PlanningError::InvalidQuery(format!(
                "{} expression cannot consume its own class",
                op.kind()
            )));
        }
        let key = (encode_op(&op)?, inputs.clone());
        if self.expr_index.contains_key(&key) {
            return Ok(None);
        }
        Ok(Some(self.push_expr(group, op, inputs, key)))
    }

    pub fn apply_rewrite(
        &mut self,
        group: GroupId,
        rewrite: Rewrite,
    ) -> PlanningResult<Option<ExprId>> {
        let mut inputs = Vec::with_capacity(rewrite.inputs.len());
        for input in &rewrite.inputs {
            inputs.push(match input {
                RewriteInput::Group(id) => *id,
                RewriteInput::Pattern(pattern) => self.pattern_group(pattern)?,
            });
        }
        self.add_expr(group, rewrite.op, inputs)
    }

    /// Compute every class's row count from its first member. All members
    /// of a class agree on output rows, so the first one is as good as any.
    pub fn derive_rows(&mut self, estimator: &RowCountEstimator<'_>) -> PlanningResult<()> {
        for group in 0..self.groups.len() {
            self.derive_group_rows(group, estimator, 0)?;
        }
        Ok(())
    }

    fn derive_group_rows(
        &mut self,
        group: GroupId,
        estimator: &RowCountEstimator<'_>,
        depth: usize,
    ) -> PlanningResult<f64> {
        if let Some(rows) = self.groups[group].rows {
            return Ok(rows);
        }
        if depth > self.groups.len() {
            return Err(PlanningError::InvalidQuery(format!(
                "cyclic inputs at class {}",
                group
            )));
        }
        let first = self.groups[group].exprs[0];
        let inputs = self.exprs[first].inputs.clone();
        let mut input_rows = Vec::with_capacity(inputs.len());
        for input in inputs {
            input_rows.push(self.derive_group_rows(input, estimator, depth + 1)?);
        }
        let rows = estimator.row_count(&self.exprs[first].op, &input_rows, Some(&*self))?;
        self.groups[group].rows = Some(rows);
        Ok(rows)
    }

    fn new_group(&mut self, original_pattern: Option<GraphPattern>) -> GroupId {
        let id = self.groups.len();
        self.groups.push(EquivalenceClass::new(id, original_pattern));
        id
    }

    fn push_expr(
        &mut self,
        group: GroupId,
        op: LogicalOp,
        inputs: Vec<GroupId>,
        key: (Vec<u8>, Vec<GroupId>),
    ) -> ExprId {
        let id = self.exprs.len();
        log::trace!("memo: class {} += #{} {}", group, id, op);
        self.exprs.push(MemoExpr {
            id,
            group,
            op,
            inputs,
        });
        self.groups[group].exprs.push(id);
        self.expr_index.insert(key, id);
        id
    }
}

fn encode_op(op: &LogicalOp) -> PlanningResult<Vec<u8>> {
    bincode::serialize(op).map_err(|e| PlanningError::Serialization(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::{PatternDirection, Predicate};

    fn edge_pattern() -> GraphPattern {
        let mut p = GraphPattern::new();
        p.add_vertex(0, [1]).unwrap();
        p.add_vertex(1, [1]).unwrap();
        p.add_edge(2, 0, 1, [9], PatternDirection::Out).unwrap();
        p
    }

    #[test]
    fn test_pattern_groups_are_keyed_by_aliases() {
        let mut memo = Memo::new();
        let p = edge_pattern();
        let g = memo.pattern_group(&p).unwrap();
        assert_eq!(memo.pattern_group(&p).unwrap(), g);
        assert_eq!(memo.group(g).exprs().len(), 1);
        assert!(memo.group(g).original_pattern().is_some());

        // same shape, different aliases: a different part of the query
        let mut other = GraphPattern::new();
        other.add_vertex(5, [1]).unwrap();
        other.add_vertex(6, [1]).unwrap();
        other.add_edge(7, 5, 6, [9], PatternDirection::Out).unwrap();
        assert_ne!(memo.pattern_group(&other).unwrap(), g);
    }

    #[test]
    fn test_exprs_are_deduplicated() {
        let mut memo = Memo::new();
        let tree = LogicalNode::pattern(edge_pattern()).filter(Predicate::Opaque("x".into()));
        let root = memo.insert_tree(&tree).unwrap();
        assert_eq!(memo.insert_tree(&tree).unwrap(), root);
        assert_eq!(memo.expr_count(), 2);

        let first = memo.group(root).exprs()[0];
        let op = memo.expr(first).op.clone();
        let inputs = memo.expr(first).inputs.clone();
        assert_eq!(memo.add_expr(root, op, inputs).unwrap(), None);
    }

    #[test]
    fn test_self_input_is_rejected() {
        let mut memo = Memo::new();
        let g = memo.pattern_group(&edge_pattern()).unwrap();
        let result = memo.add_expr(g, LogicalOp::Filter(Predicate::Opaque("x".into())), vec![g]);
        assert!(matches!(result, Err(PlanningError::InvalidQuery(_))));
    }
}

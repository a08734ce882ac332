// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cost values and the operator cost model
//!
//! A [`Cost`] carries CPU and network (communication) components plus their
//! weighted total, which is what plans are compared by. Costs are additive:
//! the cumulative cost of an expression is its own cost plus the best costs
//! of its inputs.

use super::cardinality::RowCountEstimator;
use super::error::{EstimationError, PlanningResult};
use super::logical::{ExtendEdge, ExtendIntersect, JoinKind, LogicalOp};
use super::memo::{GroupId, Memo, MemoExpr};
use crate::config::CostWeights;
use crate::meta::{EdgeTypeId, ForeignKeyRef, GraphSchema};
use crate::pattern::{GraphPattern, HopRange, LabelId, PatternDirection};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Relative slack applied before a cost is considered over a bound
const BOUND_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub cpu: f64,
    pub network: f64,
    pub total: f64,
}

impl Cost {
    pub fn new(cpu: f64, network: f64, weights: &CostWeights) -> Self {
        Self {
            cpu,
            network,
            total: cpu * weights.cpu_weight + network * weights.network_weight,
        }
    }

    pub fn zero() -> Self {
        Self {
            cpu: 0.0,
            network: 0.0,
            total: 0.0,
        }
    }

    pub fn infinite() -> Self {
        Self {
            cpu: f64::INFINITY,
            network: f64::INFINITY,
            total: f64::INFINITY,
        }
    }

    pub fn is_infinite(&self) -> bool {
        self.total.is_infinite()
    }

    pub fn plus(&self, other: &Cost) -> Cost {
        if self.is_infinite() || other.is_infinite() {
            return Cost::infinite();
        }
        Cost {
            cpu: self.cpu + other.cpu,
            network: self.network + other.network,
            total: self.total + other.total,
        }
    }

    /// Component-wise difference. Infinite minus anything stays infinite.
    pub fn minus(&self, other: &Cost) -> Cost {
        if self.is_infinite() {
            return Cost::infinite();
        }
        Cost {
            cpu: self.cpu - other.cpu,
            network: self.network - other.network,
            total: self.total - other.total,
        }
    }

    pub fn is_lt(&self, other: &Cost) -> bool {
        self.total < other.total
    }

    /// Whether this cost is over `bound`, allowing for rounding in the
    /// subtractions that produced the bound
    pub fn exceeds(&self, bound: &Cost) -> bool {
        if bound.is_infinite() {
            return false;
        }
        self.total > bound.total + BOUND_SLACK * bound.total.abs().max(1.0)
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_infinite() {
            write!(f, "inf")
        } else {
            write!(
                f,
                "{:.1} (cpu {:.1}, network {:.1})",
                self.total, self.cpu, self.network
            )
        }
    }
}

/// Budget left for the inputs of an expression with own cost `own`, given
/// the best total known for its equivalence class and the incoming bound.
/// With no best total yet the bound is returned unmodified.
pub fn upper_bound_for_inputs(own: &Cost, best: &Cost, upper: &Cost) -> Cost {
    if best.is_infinite() {
        return *upper;
    }
    let remaining = best.minus(own);
    if remaining.is_lt(upper) {
        remaining
    } else {
        *upper
    }
}

/// `own + sum(inputs)`, asking `best_of` for each input in order. Stops at
/// the first infinite input without consulting the rest.
pub fn sum_with_inputs<F>(own: Cost, inputs: &[GroupId], mut best_of: F) -> PlanningResult<Cost>
where
    F: FnMut(GroupId) -> PlanningResult<Cost>,
{
    if own.is_infinite() {
        return Ok(Cost::infinite());
    }
    let mut total = own;
    for input in inputs {
        let cost = best_of(*input)?;
        if cost.is_infinite() {
            return Ok(Cost::infinite());
        }
        total = total.plus(&cost);
    }
    Ok(total)
}

/// How an extend step reaches its target over one edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AccessPath {
    Adjacency,
    /// Target found through foreign key properties of the source
    ForeignKey(Vec<ForeignKeyRef>),
}

/// Non-cumulative operator costs
pub struct CostModel<'a> {
    weights: &'a CostWeights,
    schema: &'a GraphSchema,
    estimator: &'a RowCountEstimator<'a>,
}

impl<'a> CostModel<'a> {
    pub fn new(
        weights: &'a CostWeights,
        schema: &'a GraphSchema,
        estimator: &'a RowCountEstimator<'a>,
    ) -> Self {
        Self {
            weights,
            schema,
            estimator,
        }
    }

    fn cost(&self, cpu: f64, network: f64) -> Cost {
        Cost::new(cpu, network, self.weights)
    }

    /// Cost of `expr` excluding its inputs
    pub fn own_cost(&self, expr: &MemoExpr, memo: &Memo) -> PlanningResult<Cost> {
        let out = memo.group(expr.group).rows().unwrap_or(0.0);
        let input_rows: Vec<f64> = expr
            .inputs
            .iter()
            .map(|g| memo.group(*g).rows().unwrap_or(0.0))
            .collect();
        let total_in: f64 = input_rows.iter().sum();

        let cost = match &expr.op {
            // only single-vertex patterns are scanned; larger ones must be
            // decomposed
            LogicalOp::Pattern(pattern) if pattern.vertex_count() == 1 => self.cost(out, 0.0),
            LogicalOp::Pattern(_) => Cost::infinite(),
            LogicalOp::ExtendIntersect(ei) => self.extend_cost(ei, input_rows[0], expr, memo)?,
            LogicalOp::Join { kind, keys } => {
                let (left, right) = (input_rows[0], input_rows[1]);
                if *kind == JoinKind::Cross || keys.is_empty() {
                    self.cost(out, left.min(right))
                } else {
                    self.cost(left + right + out, left + right)
                }
            }
            LogicalOp::Filter(_) | LogicalOp::Project { .. } => self.cost(total_in, 0.0),
            LogicalOp::Aggregate { keys, .. } => {
                let shuffle = if keys.is_empty() { 0.0 } else { total_in };
                self.cost(total_in, shuffle)
            }
            LogicalOp::Sort { .. } => {
                let n = total_in.max(2.0);
                self.cost(n * n.log2(), total_in)
            }
            LogicalOp::Union { .. } => self.cost(total_in, 0.0),
            LogicalOp::ProcedureCall { .. } | LogicalOp::Other { .. } => {
                return Err(EstimationError::Unestimable {
                    kind: expr.op.kind().to_string(),
                    detail: "no cost rule for this operator".into(),
                }
                .into())
            }
        };
        Ok(cost)
    }

    /// Communication is the number of candidates shipped along each edge;
    /// intersection work is paid when more than one edge reaches the target
    fn extend_cost(
        &self,
        ei: &ExtendIntersect,
        input_rows: f64,
        expr: &MemoExpr,
        memo: &Memo,
    ) -> PlanningResult<Cost> {
        let out = self
            .estimator
            .row_count(&expr.op, &[input_rows], Some(memo))?;
        let mut network = 0.0;
        let mut candidates = 0.0;
        let expanding: Vec<&ExtendEdge> = ei.step.expanding_edges().collect();
        for edge in &expanding {
            // edge filters run where the edge is stored, before shipping
            let ratio = self.expansion_ratio(&ei.pattern, edge)
                * self.estimator.edge_filter_selectivity(edge.edge);
            let shipped = input_rows * ratio;
            candidates += shipped;
            let discount = match self.access_path(&ei.pattern, edge) {
                AccessPath::ForeignKey(_) => self.weights.foreign_key_discount,
                AccessPath::Adjacency => 1.0,
            };
            network += shipped * discount;
        }
        let loops = ei.step.edges.len() - expanding.len();
        let mut cpu = out * (1 + loops) as f64;
        if expanding.len() > 1 {
            cpu += candidates;
        }
        Ok(self.cost(cpu, network))
    }

    /// Average number of neighbours reached from one `edge.from` match. A
    /// path edge sums the single-hop ratio over its hop range.
    pub fn expansion_ratio(&self, pattern: &GraphPattern, edge: &ExtendEdge) -> f64 {
        let glogue = self.estimator.glogue();
        let Some(from) = pattern.vertex(edge.from) else {
            return 1.0;
        };
        let Some(edge_shape) = single_hop_shape(pattern, edge) else {
            return 1.0;
        };
        let mut from_shape = GraphPattern::new();
        if from_shape.add_vertex(0, from.labels().iter().copied()).is_err() {
            return 1.0;
        }
        let ratio = glogue.get_row_count(&edge_shape) / glogue.get_row_count(&from_shape);
        if edge.hops.is_single_hop() {
            return ratio;
        }
        (edge.hops.min..=edge.hops.max)
            .map(|k| ratio.powi(k as i32))
            .sum()
    }

    /// Foreign key access is used when every concrete edge type the edge
    /// can match has a foreign key entry
    pub fn access_path(&self, pattern: &GraphPattern, edge: &ExtendEdge) -> AccessPath {
        let target = pattern
            .edge(edge.edge)
            .and_then(|e| e.other_end(edge.from))
            .and_then(|t| pattern.vertex(t));
        let (Some(from), Some(target)) = (pattern.vertex(edge.from), target) else {
            return AccessPath::Adjacency;
        };
        if !edge.hops.is_single_hop() {
            return AccessPath::Adjacency;
        }
        // the key lives on the source vertex, so only outgoing expansion
        // can follow it
        if edge.direction != PatternDirection::Out {
            return AccessPath::Adjacency;
        }
        let (src_labels, dst_labels): (&BTreeSet<LabelId>, &BTreeSet<LabelId>) =
            (from.labels(), target.labels());
        if src_labels.is_empty() || dst_labels.is_empty() || edge.labels.is_empty() {
            return AccessPath::Adjacency;
        }
        let mut refs: Vec<ForeignKeyRef> = Vec::new();
        for src in src_labels {
            for dst in dst_labels {
                for label in &edge.labels {
                    let id = EdgeTypeId::new(*src, *dst, *label);
                    match self.schema.get_foreign_key_entry(&id) {
                        Some(found) => {
                            for r in found {
                                if !refs.contains(r) {
                                    refs.push(r.clone());
                                }
                            }
                        }
                        None => return AccessPath::Adjacency,
                    }
                }
            }
        }
        AccessPath::ForeignKey(refs)
    }
}

/// `(from)-[edge]-(other)` as a standalone single-hop pattern
fn single_hop_shape(pattern: &GraphPattern, edge: &ExtendEdge) -> Option<GraphPattern> {
    let original = pattern.edge(edge.edge)?;
    let mut shape = GraphPattern::new();
    let src = pattern.vertex(original.src())?;
    shape
        .add_vertex(original.src(), src.labels().iter().copied())
        .ok()?;
    if !original.is_self_loop() {
        let dst = pattern.vertex(original.dst())?;
        shape
            .add_vertex(original.dst(), dst.labels().iter().copied())
            .ok()?;
    }
    shape
        .add_path_edge(
            original.id(),
            original.src(),
            original.dst(),
            original.labels().iter().copied(),
            original.direction(),
            HopRange::single(),
        )
        .ok()?;
    Some(shape)
}

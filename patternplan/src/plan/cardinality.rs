// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row count dispatcher
//!
//! Patterns go to the catalogue, scaled by the selectivity of any edge
//! filters they cover. An extend-intersect step reuses the row count of the
//! class holding the pattern it produces, so every decomposition of one
//! pattern reports the same output size. Relational
//! operators use the usual propagation formulas. Operators with no rule are
//! an error, never a default.

use super::error::{EstimationError, EstimationResult};
use super::logical::{ExtendIntersect, JoinKind, LogicalNode, LogicalOp};
use super::memo::Memo;
use crate::alias::AliasId;
use crate::config::{ExtendIntersectFallback, PlannerConfig};
use crate::glogue::GlogueQuery;
use crate::pattern::{CompareOp, GraphPattern, Predicate};
use std::collections::BTreeMap;

pub struct RowCountEstimator<'a> {
    glogue: GlogueQuery<'a>,
    config: &'a PlannerConfig,
    edge_filters: BTreeMap<AliasId, Predicate>,
}

impl<'a> RowCountEstimator<'a> {
    pub fn new(glogue: GlogueQuery<'a>, config: &'a PlannerConfig) -> Self {
        Self {
            glogue,
            config,
            edge_filters: BTreeMap::new(),
        }
    }

    /// Predicates evaluated while expanding the keyed edges
    pub fn with_edge_filters(mut self, edge_filters: BTreeMap<AliasId, Predicate>) -> Self {
        self.edge_filters = edge_filters;
        self
    }

    pub fn edge_filter(&self, edge: AliasId) -> Option<&Predicate> {
        self.edge_filters.get(&edge)
    }

    /// Fraction of `edge` matches that survive its filter; 1 when unfiltered
    pub fn edge_filter_selectivity(&self, edge: AliasId) -> f64 {
        self.edge_filter(edge)
            .map_or(1.0, |predicate| self.selectivity(predicate))
    }

    /// Catalogue rows of `pattern` after the filters of the edges it covers
    pub fn pattern_rows(&self, pattern: &GraphPattern) -> f64 {
        let rows = self.glogue.get_row_count(pattern);
        if self.edge_filters.is_empty() {
            return rows;
        }
        pattern
            .edges()
            .iter()
            .fold(rows, |rows, edge| rows * self.edge_filter_selectivity(edge.id()))
    }

    pub fn glogue(&self) -> &GlogueQuery<'a> {
        &self.glogue
    }

    /// Output rows of `op` given the row counts of its inputs
    pub fn row_count(
        &self,
        op: &LogicalOp,
        inputs: &[f64],
        memo: Option<&Memo>,
    ) -> EstimationResult<f64> {
        let input = |i: usize| -> EstimationResult<f64> {
            inputs
                .get(i)
                .copied()
                .ok_or_else(|| EstimationError::Unestimable {
                    kind: op.kind().to_string(),
                    detail: format!("missing row count for input {}", i),
                })
        };
        let rows = match op {
            LogicalOp::Pattern(pattern) => self.pattern_rows(pattern),
            LogicalOp::ExtendIntersect(ei) => self.extend_rows(ei, memo)?,
            LogicalOp::Filter(predicate) => input(0)? * self.selectivity(predicate),
            LogicalOp::Aggregate { keys, .. } => {
                if keys.is_empty() {
                    1.0
                } else {
                    (input(0)? * self.config.aggregate_group_factor).max(1.0)
                }
            }
            LogicalOp::Sort { limit, .. } => match limit {
                Some(limit) => input(0)?.min(*limit as f64),
                None => input(0)?,
            },
            LogicalOp::Project { .. } => input(0)?,
            LogicalOp::Join { kind, keys } => {
                let (left, right) = (input(0)?, input(1)?);
                match kind {
                    JoinKind::Cross => left * right,
                    _ if keys.is_empty() => left * right,
                    JoinKind::Inner => left.min(right),
                    // every left row survives, matched or not
                    JoinKind::LeftOuter => left,
                }
            }
            LogicalOp::Union { .. } => inputs.iter().sum(),
            LogicalOp::ProcedureCall { name, .. } => {
                return Err(EstimationError::Unestimable {
                    kind: op.kind().to_string(),
                    detail: format!("procedure '{}' has no cardinality statistics", name),
                })
            }
            LogicalOp::Other { kind } => {
                return Err(EstimationError::Unestimable {
                    kind: kind.clone(),
                    detail: "operator is not supported by the planner".into(),
                })
            }
        };
        Ok(rows)
    }

    fn extend_rows(&self, ei: &ExtendIntersect, memo: Option<&Memo>) -> EstimationResult<f64> {
        let class_rows = memo
            .and_then(|memo| memo.find_pattern_group(&ei.pattern).map(|g| memo.group(g)))
            .and_then(|class| class.rows());
        if let Some(rows) = class_rows {
            return Ok(rows);
        }
        match self.config.extend_fallback {
            ExtendIntersectFallback::FreshLookup => {
                log::debug!(
                    "no explored class for extend to {}, estimating {} from the catalogue",
                    ei.step.target,
                    ei.pattern
                );
                Ok(self.pattern_rows(&ei.pattern))
            }
            ExtendIntersectFallback::Strict => Err(EstimationError::MissingEquivalenceClass {
                pattern: ei.pattern.to_string(),
            }),
        }
    }

    /// Fraction of rows that pass `predicate`
    pub fn selectivity(&self, predicate: &Predicate) -> f64 {
        let table = &self.config.selectivity;
        match predicate {
            Predicate::Compare { op, .. } => match op {
                CompareOp::Eq => table.equality,
                CompareOp::Ne => 1.0 - table.equality,
                _ => table.range,
            },
            Predicate::IsNotNull { .. } => table.not_null,
            Predicate::And(parts) => parts.iter().map(|p| self.selectivity(p)).product(),
            Predicate::Or(parts) => {
                1.0 - parts
                    .iter()
                    .map(|p| 1.0 - self.selectivity(p))
                    .product::<f64>()
            }
            Predicate::Not(inner) => 1.0 - self.selectivity(inner),
            Predicate::Opaque(_) => table.default,
        }
    }

    /// Row count of a logical tree outside of any search
    pub fn estimate_tree(&self, node: &LogicalNode) -> EstimationResult<f64> {
        let inputs = node
            .inputs
            .iter()
            .map(|input| self.estimate_tree(input))
            .collect::<EstimationResult<Vec<_>>>()?;
        self.row_count(&node.op, &inputs, None)
    }
}

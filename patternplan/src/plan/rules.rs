// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Exploration rules
//!
//! Rules add equivalent expressions to the class of the expression they
//! fire on. Exploration runs every rule over every expression once, in
//! discovery order, until no new expression appears.

use super::error::PlanningResult;
use super::logical::{ExtendIntersect, ExtendStep, JoinKind, LogicalOp};
use super::memo::{Memo, MemoExpr, Rewrite, RewriteInput};
use crate::alias::AliasId;
use crate::config::PlannerConfig;
use crate::pattern::GraphPattern;
use std::collections::{BTreeSet, HashSet};

pub trait ExplorationRule {
    fn name(&self) -> &'static str;

    /// Equivalent rewrites of `expr`; empty if the rule does not apply
    fn apply(&self, expr: &MemoExpr, config: &PlannerConfig) -> Vec<Rewrite>;
}

/// Match a pattern by first matching it without one vertex, then extending
/// to that vertex over all its edges at once
pub struct ExtendIntersectRule;

impl ExplorationRule for ExtendIntersectRule {
    fn name(&self) -> &'static str {
        "extend_intersect"
    }

    fn apply(&self, expr: &MemoExpr, _config: &PlannerConfig) -> Vec<Rewrite> {
        let LogicalOp::Pattern(pattern) = &expr.op else {
            return Vec::new();
        };
        if pattern.vertex_count() < 2 {
            return Vec::new();
        }
        let mut rewrites = Vec::new();
        for vertex in pattern.vertices() {
            let rest = pattern.remove_vertex(vertex.id());
            if rest.is_empty() || !rest.is_connected() {
                continue;
            }
            let Some(step) = ExtendStep::from_pattern(pattern, vertex.id()) else {
                continue;
            };
            if step.expanding_edges().next().is_none() {
                continue;
            }
            rewrites.push(Rewrite {
                op: LogicalOp::ExtendIntersect(ExtendIntersect {
                    step,
                    pattern: pattern.clone(),
                }),
                inputs: vec![RewriteInput::Pattern(rest)],
            });
        }
        rewrites
    }
}

/// Split a pattern's edges into two connected halves joined on their
/// shared vertices
pub struct PatternJoinRule;

impl ExplorationRule for PatternJoinRule {
    fn name(&self) -> &'static str {
        "pattern_join"
    }

    fn apply(&self, expr: &MemoExpr, config: &PlannerConfig) -> Vec<Rewrite> {
        let LogicalOp::Pattern(pattern) = &expr.op else {
            return Vec::new();
        };
        let m = pattern.edge_count();
        if !config.enable_pattern_join || m < 2 || m > config.max_join_pattern_edges {
            return Vec::new();
        }
        let mut rewrites = Vec::new();
        // the first edge always goes left so each split is produced once
        for mask in (1u64..(1u64 << m)).filter(|mask| mask & 1 == 1) {
            if mask == (1u64 << m) - 1 {
                continue;
            }
            let Some((left, right, keys)) = split(pattern, mask) else {
                continue;
            };
            for (first, second) in [(&left, &right), (&right, &left)] {
                rewrites.push(Rewrite {
                    op: LogicalOp::Join {
                        kind: JoinKind::Inner,
                        keys: keys.clone(),
                    },
                    inputs: vec![
                        RewriteInput::Pattern(first.clone()),
                        RewriteInput::Pattern(second.clone()),
                    ],
                });
            }
        }
        rewrites
    }
}

/// Halves of `pattern` selected by an edge bitmask, with their shared
/// vertices. `None` unless both halves are connected and overlap.
fn split(pattern: &GraphPattern, mask: u64) -> Option<(GraphPattern, GraphPattern, Vec<AliasId>)> {
    let mut left_edges = HashSet::new();
    let mut right_edges = HashSet::new();
    let mut left_vertices = HashSet::new();
    let mut right_vertices = HashSet::new();
    for (i, edge) in pattern.edges().iter().enumerate() {
        let (edges, vertices) = if mask & (1 << i) != 0 {
            (&mut left_edges, &mut left_vertices)
        } else {
            (&mut right_edges, &mut right_vertices)
        };
        edges.insert(edge.id());
        vertices.insert(edge.src());
        vertices.insert(edge.dst());
    }
    let keys: BTreeSet<AliasId> = left_vertices
        .intersection(&right_vertices)
        .copied()
        .collect();
    if keys.is_empty() {
        return None;
    }
    let left = pattern.sub_pattern(&left_vertices, &left_edges);
    let right = pattern.sub_pattern(&right_vertices, &right_edges);
    if !left.is_connected() || !right.is_connected() {
        return None;
    }
    Some((left, right, keys.into_iter().collect()))
}

/// Swap the inputs of an inner or cross join
pub struct JoinCommuteRule;

impl ExplorationRule for JoinCommuteRule {
    fn name(&self) -> &'static str {
        "join_commute"
    }

    fn apply(&self, expr: &MemoExpr, _config: &PlannerConfig) -> Vec<Rewrite> {
        match &expr.op {
            LogicalOp::Join { kind, .. }
                if matches!(kind, JoinKind::Inner | JoinKind::Cross) && expr.inputs.len() == 2 =>
            {
                vec![Rewrite {
                    op: expr.op.clone(),
                    inputs: vec![
                        RewriteInput::Group(expr.inputs[1]),
                        RewriteInput::Group(expr.inputs[0]),
                    ],
                }]
            }
            _ => Vec::new(),
        }
    }
}

pub fn default_rules() -> Vec<Box<dyn ExplorationRule>> {
    vec![
        Box::new(ExtendIntersectRule),
        Box::new(PatternJoinRule),
        Box::new(JoinCommuteRule),
    ]
}

/// Apply `rules` until the memo stops growing. Returns the number of
/// rewrites that added an expression.
pub fn explore(
    memo: &mut Memo,
    rules: &[Box<dyn ExplorationRule>],
    config: &PlannerConfig,
) -> PlanningResult<usize> {
    let mut applications = 0;
    let mut next = 0;
    while next < memo.expr_count() {
        let expr = memo.expr(next).clone();
        for rule in rules {
            for rewrite in rule.apply(&expr, config) {
                if memo.apply_rewrite(expr.group, rewrite)?.is_some() {
                    applications += 1;
                }
            }
        }
        next += 1;
    }
    log::debug!(
        "exploration done: {} classes, {} expressions, {} rewrites",
        memo.group_count(),
        memo.expr_count(),
        applications
    );
    Ok(applications)
}

// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Logical plan representation
//!
//! Queries reach the planner as a tree of graph patterns wrapped by
//! relational operators. The operator set is closed: anything the planner
//! has no rule for is carried as [`LogicalOp::Other`] and rejected by the
//! row count dispatcher.

use super::error::{PlanningError, PlanningResult};
use crate::alias::AliasId;
use crate::pattern::{GraphPattern, HopRange, LabelId, Literal, PatternDirection, Predicate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One edge followed by an extend step, from an already matched vertex to
/// the step's target
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendEdge {
    pub edge: AliasId,
    pub from: AliasId,
    /// Direction seen from `from`
    pub direction: PatternDirection,
    pub labels: BTreeSet<LabelId>,
    pub hops: HopRange,
}

/// Grow a partial match by one vertex, intersecting the candidates reached
/// over every edge into it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendStep {
    pub target: AliasId,
    pub target_labels: BTreeSet<LabelId>,
    pub edges: Vec<ExtendEdge>,
}

impl ExtendStep {
    /// The step adding `target` (and its incident edges) to the rest of
    /// `pattern`. `None` if `target` is not in the pattern.
    pub fn from_pattern(pattern: &GraphPattern, target: AliasId) -> Option<Self> {
        let vertex = pattern.vertex(target)?;
        let edges = pattern
            .incident_edges(target)
            .map(|edge| {
                let from = edge.other_end(target).unwrap_or(target);
                ExtendEdge {
                    edge: edge.id(),
                    from,
                    direction: edge.direction_from(from),
                    labels: edge.labels().clone(),
                    hops: edge.hops(),
                }
            })
            .collect();
        Some(Self {
            target,
            target_labels: vertex.labels().clone(),
            edges,
        })
    }

    /// Edges that reach the target from another vertex
    pub fn expanding_edges(&self) -> impl Iterator<Item = &ExtendEdge> {
        self.edges.iter().filter(move |e| e.from != self.target)
    }
}

/// An extend step together with the pattern it produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendIntersect {
    pub step: ExtendStep,
    pub pattern: GraphPattern,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
    Cross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregateFn {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Collect,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AggregateCall {
    pub func: AggregateFn,
    pub input: Option<AliasId>,
    pub output: AliasId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    pub alias: AliasId,
    pub property: Option<String>,
    pub descending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogicalOp {
    Pattern(GraphPattern),
    ExtendIntersect(ExtendIntersect),
    Filter(Predicate),
    Aggregate {
        keys: Vec<AliasId>,
        calls: Vec<AggregateCall>,
    },
    Sort {
        keys: Vec<SortKey>,
        limit: Option<u64>,
    },
    Project {
        columns: Vec<AliasId>,
    },
    Join {
        kind: JoinKind,
        keys: Vec<AliasId>,
    },
    Union {
        all: bool,
    },
    /// Stored procedure invocation; only valid as the whole query
    ProcedureCall {
        name: String,
        args: Vec<Literal>,
    },
    /// Operator passed through from the query IR without planner support
    Other {
        kind: String,
    },
}

impl LogicalOp {
    pub fn kind(&self) -> &str {
        match self {
            LogicalOp::Pattern(_) => "pattern",
            LogicalOp::ExtendIntersect(_) => "extend_intersect",
            LogicalOp::Filter(_) => "filter",
            LogicalOp::Aggregate { .. } => "aggregate",
            LogicalOp::Sort { .. } => "sort",
            LogicalOp::Project { .. } => "project",
            LogicalOp::Join { .. } => "join",
            LogicalOp::Union { .. } => "union",
            LogicalOp::ProcedureCall { .. } => "procedure_call",
            LogicalOp::Other { kind } => kind,
        }
    }

    fn check_arity(&self, inputs: usize) -> PlanningResult<()> {
        let ok = match self {
            LogicalOp::Pattern(_) | LogicalOp::ProcedureCall { .. } => inputs == 0,
            LogicalOp::ExtendIntersect(_)
            | LogicalOp::Filter(_)
            | LogicalOp::Aggregate { .. }
            | LogicalOp::Sort { .. }
            | LogicalOp::Project { .. } => inputs == 1,
            LogicalOp::Join { .. } => inputs == 2,
            LogicalOp::Union { .. } => inputs >= 1,
            LogicalOp::Other { .. } => true,
        };
        if ok {
            Ok(())
        } else {
            Err(PlanningError::InvalidQuery(format!(
                "{} node with {} inputs",
                self.kind(),
                inputs
            )))
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::Pattern(p) => write!(f, "Pattern[{}]", p),
            LogicalOp::ExtendIntersect(ei) => write!(
                f,
                "ExtendIntersect[target={}, edges={}]",
                ei.step.target,
                ei.step.edges.len()
            ),
            LogicalOp::Filter(p) => write!(f, "Filter[{}]", p),
            LogicalOp::Aggregate { keys, calls } => {
                write!(f, "Aggregate[keys={:?}, calls={}]", keys, calls.len())
            }
            LogicalOp::Sort { keys, limit } => write!(f, "Sort[{} keys, limit={:?}]", keys.len(), limit),
            LogicalOp::Project { columns } => write!(f, "Project{:?}", columns),
            LogicalOp::Join { kind, keys } => write!(f, "Join[{:?} on {:?}]", kind, keys),
            LogicalOp::Union { all } => write!(f, "Union[all={}]", all),
            LogicalOp::ProcedureCall { name, args } => write!(f, "Call[{}/{}]", name, args.len()),
            LogicalOp::Other { kind } => write!(f, "{}", kind),
        }
    }
}

/// Node of a logical plan tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalNode {
    pub op: LogicalOp,
    pub inputs: Vec<LogicalNode>,
}

impl LogicalNode {
    pub fn new(op: LogicalOp, inputs: Vec<LogicalNode>) -> Self {
        Self { op, inputs }
    }

    pub fn leaf(op: LogicalOp) -> Self {
        Self::new(op, Vec::new())
    }

    pub fn pattern(pattern: GraphPattern) -> Self {
        Self::leaf(LogicalOp::Pattern(pattern))
    }

    pub fn filter(self, predicate: Predicate) -> Self {
        Self::new(LogicalOp::Filter(predicate), vec![self])
    }

    pub fn aggregate(self, keys: Vec<AliasId>, calls: Vec<AggregateCall>) -> Self {
        Self::new(LogicalOp::Aggregate { keys, calls }, vec![self])
    }

    pub fn sort(self, keys: Vec<SortKey>, limit: Option<u64>) -> Self {
        Self::new(LogicalOp::Sort { keys, limit }, vec![self])
    }

    pub fn project(self, columns: Vec<AliasId>) -> Self {
        Self::new(LogicalOp::Project { columns }, vec![self])
    }

    pub fn join(self, right: LogicalNode, kind: JoinKind, keys: Vec<AliasId>) -> Self {
        Self::new(LogicalOp::Join { kind, keys }, vec![self, right])
    }

    pub fn union(self, others: Vec<LogicalNode>, all: bool) -> Self {
        let mut inputs = vec![self];
        inputs.extend(others);
        Self::new(LogicalOp::Union { all }, inputs)
    }

    /// Check operator arities over the whole tree
    pub fn validate(&self) -> PlanningResult<()> {
        self.op.check_arity(self.inputs.len())?;
        if matches!(self.op, LogicalOp::Pattern(ref p) if p.is_empty()) {
            return Err(PlanningError::InvalidQuery("empty pattern".into()));
        }
        self.inputs.iter().try_for_each(LogicalNode::validate)
    }

    /// Visit every graph pattern in the tree, depth first
    pub fn for_each_pattern<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a GraphPattern),
    {
        if let LogicalOp::Pattern(p) = &self.op {
            f(p);
        }
        for input in &self.inputs {
            input.for_each_pattern(f);
        }
    }
}

impl From<GraphPattern> for LogicalNode {
    fn from(pattern: GraphPattern) -> Self {
        LogicalNode::pattern(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extend_step_directions() {
        let mut p = GraphPattern::new();
        p.add_vertex(0, [1]).unwrap();
        p.add_vertex(1, [1]).unwrap();
        p.add_vertex(2, [2]).unwrap();
        p.add_edge(10, 0, 2, [5], PatternDirection::Out).unwrap();
        p.add_edge(11, 2, 1, [6], PatternDirection::Out).unwrap();
        p.add_edge(12, 2, 2, [7], PatternDirection::Out).unwrap();

        let step = ExtendStep::from_pattern(&p, 2).unwrap();
        assert_eq!(step.target_labels, BTreeSet::from([2]));
        let dirs: Vec<_> = step.edges.iter().map(|e| (e.from, e.direction)).collect();
        assert_eq!(
            dirs,
            vec![
                (0, PatternDirection::Out),
                (1, PatternDirection::In),
                (2, PatternDirection::Out)
            ]
        );
        assert_eq!(step.expanding_edges().count(), 2);
        assert!(ExtendStep::from_pattern(&p, 9).is_none());
    }

    #[test]
    fn test_validate_arity() {
        let mut p = GraphPattern::new();
        p.add_vertex(0, [1]).unwrap();
        let ok = LogicalNode::pattern(p.clone()).filter(Predicate::Opaque("x".into()));
        assert!(ok.validate().is_ok());

        let bad = LogicalNode::new(
            LogicalOp::Join {
                kind: JoinKind::Inner,
                keys: vec![0],
            },
            vec![LogicalNode::pattern(p)],
        );
        assert!(matches!(bad.validate(), Err(PlanningError::InvalidQuery(_))));
        assert!(LogicalNode::pattern(GraphPattern::new()).validate().is_err());
    }
}

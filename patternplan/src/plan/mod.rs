// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query planning
//!
//! Logical IR in, serialised physical plan out. The search explores
//! extend-intersect decompositions and join orders of each pattern in a
//! memo of equivalence classes, costs them with catalogue row counts, and
//! keeps the cheapest member of every class.

pub mod cardinality;
pub mod cost;
pub mod error;
pub mod logical;
pub mod memo;
pub mod physical;
pub mod planner;
pub mod rules;
pub mod search;

pub use cardinality::RowCountEstimator;
pub use cost::{AccessPath, Cost, CostModel};
pub use error::{EstimationError, EstimationResult, PlanningError, PlanningResult};
pub use logical::{
    AggregateCall, AggregateFn, ExtendEdge, ExtendIntersect, ExtendStep, JoinKind, LogicalNode,
    LogicalOp, SortKey,
};
pub use memo::{EquivalenceClass, Memo};
pub use physical::{
    ColumnKind, CompiledPlan, PathFragments, PhysicalNode, PhysicalOp, PhysicalPlan, ResultColumn,
    ResultSchema,
};
pub use planner::{GraphPlanner, PatternBuilder, PlannerService, PlannerSnapshot, QueryBuilder, QueryIr};
pub use search::SearchStats;

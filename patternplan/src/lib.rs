// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! PatternPlan - cost-based graph pattern planner
//!
//! PatternPlan turns graph traversal queries, already translated into graph
//! patterns wrapped by relational operators, into cost-optimal physical plans
//! for a distributed dataflow engine.
//!
//! # Components
//!
//! - **Pattern Model**: typed pattern vertices and directed pattern edges with
//!   isomorphism-aware equality
//! - **Identity Service**: per-query alias id generation for query variables
//! - **Metadata**: versioned schema, foreign keys, and stored procedures
//! - **Glogue**: pattern statistics catalogue used for cardinality estimation
//! - **Planner**: Volcano-style search over extend/intersect decompositions
//!   and join orders, with optional upper-bound pruning
//!
//! # Usage
//!
//! ```ignore
//! let planner = GraphPlanner::new(meta, glogue, PlannerConfig::default());
//! let mut builder = QueryBuilder::new();
//! let pattern = builder.pattern(|p| {
//!     p.vertex("a", [PERSON])?;
//!     p.vertex("b", [PERSON])?;
//!     p.edge("a", "b", [KNOWS], PatternDirection::Out)?;
//!     Ok(())
//! })?;
//! let compiled = planner.compile(builder.finish(pattern))?;
//! ```

pub mod alias;
pub mod config;
pub mod exec;
pub mod glogue;
pub mod meta;
pub mod pattern;
pub mod plan;

pub use alias::{AliasId, AliasIdGenerator, AliasRegistry};
pub use config::{CostStrategy, ExtendIntersectFallback, PlannerConfig};
pub use glogue::{Glogue, GlogueBuilder, GlogueQuery};
pub use meta::{GraphSchema, IrMeta, MetaError, StoredProcedures};
pub use pattern::{
    DataValue, EdgeDataKey, GraphPattern, HopRange, LabelId, PatternDirection, PatternEdge,
    PatternError, PatternVertex,
};
pub use plan::{
    CompiledPlan, GraphPlanner, LogicalNode, LogicalOp, PlannerService, PlanningError,
    QueryBuilder, QueryIr,
};

/// PatternPlan version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// PatternPlan crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

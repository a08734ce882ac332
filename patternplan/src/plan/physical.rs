// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Physical plan representation
//!
//! The physical plan is what the dataflow engine runs. It is encoded with
//! bincode into an opaque payload; identical plans encode to identical bytes.
//! A JSON result schema describing the output columns travels next to it.

use super::cost::{AccessPath, Cost};
use super::error::{PlanningError, PlanningResult};
use super::logical::{AggregateCall, JoinKind, SortKey};
use super::search::SearchStats;
use crate::alias::AliasId;
use crate::pattern::{DataValue, HopRange, LabelId, Literal, PatternDirection, Predicate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One edge followed by an expand step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalExpand {
    pub edge: AliasId,
    pub from: AliasId,
    pub direction: PatternDirection,
    pub labels: BTreeSet<LabelId>,
    pub hops: HopRange,
    pub access: AccessPath,
    pub filter: Option<Predicate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PhysicalOp {
    /// Scan all vertices with one of `labels`, checking any self-loops
    Scan {
        alias: AliasId,
        labels: BTreeSet<LabelId>,
        loops: Vec<PhysicalExpand>,
    },
    /// Expand every partial match to `target` along each edge and keep the
    /// candidates reached by all of them
    ExpandIntersect {
        target: AliasId,
        target_labels: BTreeSet<LabelId>,
        edges: Vec<PhysicalExpand>,
    },
    HashJoin {
        kind: JoinKind,
        keys: Vec<AliasId>,
    },
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
    Union {
        all: bool,
    },
    ProcedureCall {
        name: String,
        args: Vec<Literal>,
    },
}

impl PhysicalOp {
    pub fn name(&self) -> &'static str {
        match self {
            PhysicalOp::Scan { .. } => "Scan",
            PhysicalOp::ExpandIntersect { .. } => "ExpandIntersect",
            PhysicalOp::HashJoin { .. } => "HashJoin",
            PhysicalOp::Filter(_) => "Filter",
            PhysicalOp::Aggregate { .. } => "Aggregate",
            PhysicalOp::Sort { .. } => "Sort",
            PhysicalOp::Project { .. } => "Project",
            PhysicalOp::Union { .. } => "Union",
            PhysicalOp::ProcedureCall { .. } => "ProcedureCall",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalNode {
    /// Alias id of the intermediate result, drawn after the query's own
    /// aliases in post order
    pub id: AliasId,
    pub op: PhysicalOp,
    pub inputs: Vec<PhysicalNode>,
    pub estimated_rows: Option<f64>,
    /// Cumulative cost of the subtree
    pub cost: Cost,
}

impl PhysicalNode {
    /// Visit nodes in post order
    pub fn walk<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a PhysicalNode),
    {
        for input in &self.inputs {
            input.walk(f);
        }
        f(self);
    }

    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(&mut |_| count += 1);
        count
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let rows = self
            .estimated_rows
            .map(|r| format!("{:.0}", r))
            .unwrap_or_else(|| "?".into());
        writeln!(
            f,
            "{}{} rows={} cost={}",
            "  ".repeat(depth),
            describe(&self.op),
            rows,
            self.cost
        )?;
        for input in &self.inputs {
            input.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

fn describe(op: &PhysicalOp) -> String {
    match op {
        PhysicalOp::Scan { alias, labels, .. } => format!("Scan({} {:?})", alias, labels),
        PhysicalOp::ExpandIntersect { target, edges, .. } => {
            let from: Vec<String> = edges.iter().map(|e| e.from.to_string()).collect();
            format!("ExpandIntersect({} <- {})", target, from.join(","))
        }
        PhysicalOp::HashJoin { kind, keys } => format!("HashJoin({:?} on {:?})", kind, keys),
        PhysicalOp::ProcedureCall { name, .. } => format!("ProcedureCall({})", name),
        other => other.name().to_string(),
    }
}

/// Single-hop fragments a path expansion was split into
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathFragments {
    pub path_alias: AliasId,
    pub values: Vec<DataValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicalPlan {
    pub graph_id: String,
    pub snapshot_id: u64,
    pub root: PhysicalNode,
    pub fragments: Vec<PathFragments>,
    pub outputs: Vec<AliasId>,
}

impl PhysicalPlan {
    pub fn encode(&self) -> PlanningResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| PlanningError::Serialization(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> PlanningResult<Self> {
        bincode::deserialize(bytes).map_err(|e| PlanningError::Serialization(e.to_string()))
    }
}

impl fmt::Display for PhysicalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "graph {} @ snapshot {}", self.graph_id, self.snapshot_id)?;
        self.root.fmt_indented(f, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Vertex,
    Edge,
    Path,
    Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultColumn {
    pub alias: AliasId,
    pub name: String,
    pub kind: ColumnKind,
}

/// Output columns of a plan, keyed by alias id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSchema {
    pub columns: Vec<ResultColumn>,
}

impl ResultSchema {
    pub fn to_json(&self) -> PlanningResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| PlanningError::Serialization(e.to_string()))
    }

    pub fn column(&self, alias: AliasId) -> Option<&ResultColumn> {
        self.columns.iter().find(|c| c.alias == alias)
    }
}

/// A plan ready to hand to the execution engine
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    pub plan: PhysicalPlan,
    pub payload: Vec<u8>,
    pub checksum: u32,
    pub schema: ResultSchema,
    pub cost: Cost,
    pub stats: SearchStats,
}

impl CompiledPlan {
    pub fn new(
        plan: PhysicalPlan,
        schema: ResultSchema,
        cost: Cost,
        stats: SearchStats,
    ) -> PlanningResult<Self> {
        let payload = plan.encode()?;
        let checksum = crc32fast::hash(&payload);
        Ok(Self {
            plan,
            payload,
            checksum,
            schema,
            cost,
            stats,
        })
    }

    pub fn schema_json(&self) -> PlanningResult<String> {
        self.schema.to_json()
    }

    /// Whether the payload still matches its checksum
    pub fn verify(&self) -> bool {
        crc32fast::hash(&self.payload) == self.checksum
    }

    /// Decode the payload, rejecting it if the checksum does not match
    pub fn decode(payload: &[u8], checksum: u32) -> PlanningResult<PhysicalPlan> {
        if crc32fast::hash(payload) != checksum {
            return Err(PlanningError::Serialization(
                "plan payload checksum mismatch".into(),
            ));
        }
        PhysicalPlan::decode(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CostWeights;

    fn sample_plan() -> PhysicalPlan {
        let scan = PhysicalNode {
            id: 0,
            op: PhysicalOp::Scan {
                alias: 0,
                labels: BTreeSet::from([1]),
                loops: Vec::new(),
            },
            inputs: Vec::new(),
            estimated_rows: Some(1000.0),
            cost: Cost::new(1000.0, 0.0, &CostWeights::default()),
        };
        let project = PhysicalNode {
            id: 1,
            op: PhysicalOp::Project { columns: vec![0] },
            inputs: vec![scan],
            estimated_rows: Some(1000.0),
            cost: Cost::new(2000.0, 0.0, &CostWeights::default()),
        };
        PhysicalPlan {
            graph_id: "g".into(),
            snapshot_id: 7,
            root: project,
            fragments: Vec::new(),
            outputs: vec![0],
        }
    }

    #[test]
    fn test_payload_checksum() {
        let compiled = CompiledPlan::new(
            sample_plan(),
            ResultSchema::default(),
            Cost::zero(),
            SearchStats::default(),
        )
        .unwrap();
        assert!(compiled.verify());
        let decoded = CompiledPlan::decode(&compiled.payload, compiled.checksum).unwrap();
        assert_eq!(decoded, compiled.plan);

        let mut tampered = compiled.payload.clone();
        tampered[0] ^= 0xff;
        assert!(CompiledPlan::decode(&tampered, compiled.checksum).is_err());
    }

    #[test]
    fn test_walk_is_post_order() {
        let plan = sample_plan();
        let mut ids = Vec::new();
        plan.root.walk(&mut |n| ids.push(n.id));
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(plan.root.node_count(), 2);
        assert!(plan.to_string().contains("Scan(0"));
    }
}

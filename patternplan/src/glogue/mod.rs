// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Pattern statistics catalogue ("Glogue")
//!
//! The catalogue maps pattern shapes to row counts. It is built out of band
//! (from label and edge type statistics, explicit pattern counts, or a JSON
//! snapshot) and is read-only while queries compile. Estimation for shapes
//! that are not indexed lives in [`GlogueQuery`], one per compilation.

pub mod error;
pub mod query;

pub use error::{GlogueError, GlogueResult};
pub use query::{Estimate, GlogueQuery};

use crate::config::PlannerConfig;
use crate::meta::EdgeTypeId;
use crate::pattern::{GraphPattern, LabelId, PatternDirection};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

/// Immutable shape -> row count index
#[derive(Debug, Clone, Default)]
pub struct Glogue {
    entries: HashMap<GraphPattern, f64>,
    max_indexed_edges: usize,
    vertex_labels: BTreeSet<LabelId>,
    edge_labels: BTreeSet<LabelId>,
}

impl Glogue {
    pub fn builder() -> GlogueBuilder {
        GlogueBuilder::default()
    }

    /// Catalogue with no entries; every estimate falls back to the default
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> GlogueResult<Self> {
        let snapshot: GlogueSnapshot =
            serde_json::from_str(json).map_err(|e| GlogueError::Parse(e.to_string()))?;
        GlogueBuilder::from_snapshot(snapshot).build()
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> GlogueResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| GlogueError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let glogue = Self::from_json_str(&contents)?;
        log::info!(
            "loaded catalogue with {} entries from {}",
            glogue.len(),
            path.display()
        );
        Ok(glogue)
    }

    /// Snapshot of all entries as pattern counts, in canonical code order
    pub fn to_snapshot(&self) -> GlogueSnapshot {
        let mut patterns: Vec<PatternCount> = self
            .entries
            .iter()
            .map(|(pattern, count)| PatternCount {
                pattern: pattern.normalize(),
                count: *count,
            })
            .collect();
        patterns.sort_by(|a, b| a.pattern.canonical_code().cmp(b.pattern.canonical_code()));
        GlogueSnapshot {
            patterns,
            ..GlogueSnapshot::default()
        }
    }

    pub fn to_json_string(&self) -> GlogueResult<String> {
        serde_json::to_string_pretty(&self.to_snapshot()).map_err(|e| GlogueError::Parse(e.to_string()))
    }

    /// Exact count for the shape of `pattern`
    pub fn get_exact(&self, pattern: &GraphPattern) -> Option<f64> {
        self.entries.get(pattern).copied()
    }

    /// Concrete vertex labels appearing in any indexed shape
    pub fn vertex_labels(&self) -> &BTreeSet<LabelId> {
        &self.vertex_labels
    }

    /// Concrete edge labels appearing in any indexed shape
    pub fn edge_labels(&self) -> &BTreeSet<LabelId> {
        &self.edge_labels
    }

    /// Largest indexed shape, in edges
    pub fn max_indexed_edges(&self) -> usize {
        self.max_indexed_edges
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Per-compilation estimator over this catalogue
    pub fn query(&self, config: &PlannerConfig) -> GlogueQuery<'_> {
        GlogueQuery::new(
            self,
            config.unknown_row_count,
            config.max_exhaustive_estimate_edges,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexCount {
    pub label_id: LabelId,
    pub count: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCount {
    pub edge: EdgeTypeId,
    pub count: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCount {
    pub pattern: GraphPattern,
    pub count: f64,
}

/// Serialized catalogue. Label and edge type counts are shorthands for the
/// corresponding one-vertex and one-edge patterns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlogueSnapshot {
    #[serde(default)]
    pub vertices: Vec<VertexCount>,
    #[serde(default)]
    pub edges: Vec<EdgeCount>,
    #[serde(default)]
    pub patterns: Vec<PatternCount>,
}

#[derive(Debug, Clone, Default)]
pub struct GlogueBuilder {
    snapshot: GlogueSnapshot,
}

impl GlogueBuilder {
    pub fn from_snapshot(snapshot: GlogueSnapshot) -> Self {
        Self { snapshot }
    }

    /// Number of vertices with `label_id`
    pub fn vertex_label(mut self, label_id: LabelId, count: f64) -> Self {
        self.snapshot.vertices.push(VertexCount { label_id, count });
        self
    }

    /// Number of edges of type `edge`
    pub fn edge_type(mut self, edge: EdgeTypeId, count: f64) -> Self {
        self.snapshot.edges.push(EdgeCount { edge, count });
        self
    }

    /// Number of matches of an arbitrary pattern shape
    pub fn pattern(mut self, pattern: GraphPattern, count: f64) -> Self {
        self.snapshot.patterns.push(PatternCount { pattern, count });
        self
    }

    /// Later entries for the same shape replace earlier ones
    pub fn build(self) -> GlogueResult<Glogue> {
        let mut glogue = Glogue::default();
        let GlogueSnapshot {
            vertices,
            edges,
            patterns,
        } = self.snapshot;

        for VertexCount { label_id, count } in vertices {
            let mut pattern = GraphPattern::new();
            pattern.add_vertex(0, [label_id])?;
            insert(&mut glogue, pattern, count)?;
        }
        for EdgeCount { edge, count } in edges {
            insert(&mut glogue, edge_pattern(&edge)?, count)?;
        }
        for PatternCount { pattern, count } in patterns {
            insert(&mut glogue, revalidate(&pattern)?, count)?;
        }

        log::debug!(
            "built catalogue: {} shapes, up to {} edges",
            glogue.entries.len(),
            glogue.max_indexed_edges
        );
        Ok(glogue)
    }
}

fn insert(glogue: &mut Glogue, pattern: GraphPattern, count: f64) -> GlogueResult<()> {
    if !(count.is_finite() && count >= 0.0) {
        return Err(GlogueError::InvalidCount {
            pattern: pattern.to_string(),
            count,
        });
    }
    if pattern.is_empty() {
        return Err(GlogueError::Pattern(crate::pattern::PatternError::EmptyPattern));
    }
    glogue.max_indexed_edges = glogue.max_indexed_edges.max(pattern.edge_count());
    for vertex in pattern.vertices() {
        if vertex.labels().len() == 1 {
            glogue.vertex_labels.extend(vertex.labels().iter().copied());
        }
    }
    for edge in pattern.edges() {
        if edge.labels().len() == 1 {
            glogue.edge_labels.extend(edge.labels().iter().copied());
        }
    }
    glogue.entries.insert(pattern, count);
    Ok(())
}

/// The one-edge pattern `(src)-[edge]->(dst)` of an edge type
pub fn edge_pattern(edge: &EdgeTypeId) -> GlogueResult<GraphPattern> {
    let mut pattern = GraphPattern::new();
    pattern.add_vertex(0, [edge.src_label_id])?;
    pattern.add_vertex(1, [edge.dst_label_id])?;
    pattern.add_edge(2, 0, 1, [edge.edge_label_id], PatternDirection::Out)?;
    Ok(pattern)
}

/// Deserialized patterns skip endpoint checks, so rebuild them
fn revalidate(pattern: &GraphPattern) -> GlogueResult<GraphPattern> {
    let mut out = GraphPattern::new();
    for vertex in pattern.vertices() {
        out.add_vertex(vertex.id(), vertex.labels().iter().copied())?;
    }
    for edge in pattern.edges() {
        out.add_path_edge(
            edge.id(),
            edge.src(),
            edge.dst(),
            edge.labels().iter().copied(),
            edge.direction(),
            edge.hops(),
        )?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shorthands() {
        let glogue = Glogue::builder()
            .vertex_label(1, 1000.0)
            .edge_type(EdgeTypeId::new(1, 1, 11), 20_000.0)
            .build()
            .unwrap();
        assert_eq!(glogue.len(), 2);
        assert_eq!(glogue.max_indexed_edges(), 1);
        assert_eq!(glogue.vertex_labels().iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(glogue.edge_labels().iter().copied().collect::<Vec<_>>(), vec![11]);

        let mut knows = GraphPattern::new();
        knows.add_vertex(40, [1]).unwrap();
        knows.add_vertex(41, [1]).unwrap();
        knows
            .add_edge(42, 41, 40, [11], PatternDirection::In)
            .unwrap();
        assert_eq!(glogue.get_exact(&knows), Some(20_000.0));
    }

    #[test]
    fn test_invalid_count_rejected() {
        let err = Glogue::builder().vertex_label(1, -3.0).build().unwrap_err();
        assert!(matches!(err, GlogueError::InvalidCount { .. }));
    }

    #[test]
    fn test_json_snapshot_is_deterministic() {
        let glogue = Glogue::from_json_str(
            r#"{"vertices": [{"label_id": 2, "count": 50}, {"label_id": 1, "count": 10}],
                "edges": [{"edge": {"src_label_id": 1, "dst_label_id": 2, "edge_label_id": 12}, "count": 30}]}"#,
        )
        .unwrap();
        let first = glogue.to_json_string().unwrap();
        let reloaded = Glogue::from_json_str(&first).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.to_json_string().unwrap(), first);
    }

    #[test]
    fn test_snapshot_rejects_dangling_edge() {
        let err = Glogue::from_json_str(
            r#"{"patterns": [{"count": 5, "pattern": {
                "vertices": [{"id": 0, "labels": [1], "order": 0}],
                "edges": [{"id": 1, "src": 0, "dst": 9, "labels": [11],
                           "direction": "Out", "hops": {"min": 1, "max": 1}}]}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, GlogueError::Pattern(_)));
    }
}

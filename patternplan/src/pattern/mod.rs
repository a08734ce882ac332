// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Graph pattern model
//!
//! A [`GraphPattern`] is a small typed subgraph: pattern vertices carrying
//! label sets and pattern edges carrying label sets, a direction, and a hop
//! range. Equality and hashing are shape based, so two patterns that differ
//! only in alias naming are the same catalogue key.

pub mod canonical;
pub mod data_key;
pub mod error;
pub mod predicate;

pub use canonical::{CanonicalCode, ShapeSignature};
pub use data_key::{split_path_expand, DataValue, EdgeDataKey};
pub use error::{PatternError, PatternResult};
pub use predicate::{CompareOp, Literal, Predicate};

use crate::alias::AliasId;
use once_cell::sync::OnceCell;
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use canonical::Canonical;

/// Vertex or edge type label id, as assigned by the schema
pub type LabelId = i32;

/// Direction of a pattern edge relative to its `(src, dst)` endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternDirection {
    Out,
    In,
    Both,
}

impl PatternDirection {
    /// Direction seen from the other endpoint. `Both` is its own reverse.
    pub fn reverse(self) -> Self {
        match self {
            PatternDirection::Out => PatternDirection::In,
            PatternDirection::In => PatternDirection::Out,
            PatternDirection::Both => PatternDirection::Both,
        }
    }

    pub(crate) fn code(self) -> i64 {
        match self {
            PatternDirection::Out => 0,
            PatternDirection::In => 1,
            PatternDirection::Both => 2,
        }
    }
}

impl fmt::Display for PatternDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternDirection::Out => write!(f, "OUT"),
            PatternDirection::In => write!(f, "IN"),
            PatternDirection::Both => write!(f, "BOTH"),
        }
    }
}

/// Number of hops a pattern edge spans, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HopRange {
    pub min: u32,
    pub max: u32,
}

impl HopRange {
    pub fn single() -> Self {
        Self { min: 1, max: 1 }
    }

    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn is_single_hop(&self) -> bool {
        self.min == 1 && self.max == 1
    }

    /// A path of exactly `min` hops
    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }
}

impl Default for HopRange {
    fn default() -> Self {
        Self::single()
    }
}

/// A typed pattern vertex. Immutable once added to a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternVertex {
    id: AliasId,
    labels: BTreeSet<LabelId>,
    order: usize,
}

impl PatternVertex {
    pub fn id(&self) -> AliasId {
        self.id
    }

    /// Vertex type labels; an empty set matches any label
    pub fn labels(&self) -> &BTreeSet<LabelId> {
        &self.labels
    }

    /// Order in which the vertex was introduced into the query pattern
    pub fn order(&self) -> usize {
        self.order
    }
}

/// A typed, directed pattern edge between two pattern vertices
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternEdge {
    id: AliasId,
    src: AliasId,
    dst: AliasId,
    labels: BTreeSet<LabelId>,
    direction: PatternDirection,
    hops: HopRange,
}

impl PatternEdge {
    pub fn id(&self) -> AliasId {
        self.id
    }

    pub fn src(&self) -> AliasId {
        self.src
    }

    pub fn dst(&self) -> AliasId {
        self.dst
    }

    pub fn labels(&self) -> &BTreeSet<LabelId> {
        &self.labels
    }

    pub fn direction(&self) -> PatternDirection {
        self.direction
    }

    pub fn hops(&self) -> HopRange {
        self.hops
    }

    pub fn is_self_loop(&self) -> bool {
        self.src == self.dst
    }

    pub fn touches(&self, vertex: AliasId) -> bool {
        self.src == vertex || self.dst == vertex
    }

    /// The endpoint opposite to `vertex`, if `vertex` is an endpoint
    pub fn other_end(&self, vertex: AliasId) -> Option<AliasId> {
        if self.src == vertex {
            Some(self.dst)
        } else if self.dst == vertex {
            Some(self.src)
        } else {
            None
        }
    }

    /// Direction of this edge when traversed starting from `vertex`
    pub fn direction_from(&self, vertex: AliasId) -> PatternDirection {
        if self.src == vertex {
            self.direction
        } else {
            self.direction.reverse()
        }
    }
}

/// Identity of a pattern inside one query: which vertices and edges it
/// covers. Unlike pattern equality this is alias based, not shape based.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PatternKey {
    pub vertices: Vec<AliasId>,
    pub edges: Vec<AliasId>,
}

/// A matchable graph fragment of a query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphPattern {
    vertices: Vec<PatternVertex>,
    edges: Vec<PatternEdge>,
    #[serde(skip)]
    canonical: OnceCell<Canonical>,
}

impl GraphPattern {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex bound to alias `id`
    pub fn add_vertex(
        &mut self,
        id: AliasId,
        labels: impl IntoIterator<Item = LabelId>,
    ) -> PatternResult<&PatternVertex> {
        if self.vertex(id).is_some() {
            return Err(PatternError::DuplicateVertex(id));
        }
        let order = self
            .vertices
            .iter()
            .map(|v| v.order + 1)
            .max()
            .unwrap_or(0);
        self.vertices.push(PatternVertex {
            id,
            labels: labels.into_iter().collect(),
            order,
        });
        self.canonical = OnceCell::new();
        Ok(&self.vertices[self.vertices.len() - 1])
    }

    /// Add a single-hop edge from `src` to `dst`
    pub fn add_edge(
        &mut self,
        id: AliasId,
        src: AliasId,
        dst: AliasId,
        labels: impl IntoIterator<Item = LabelId>,
        direction: PatternDirection,
    ) -> PatternResult<&PatternEdge> {
        self.add_path_edge(id, src, dst, labels, direction, HopRange::single())
    }

    /// Add an edge spanning `hops` hops from `src` to `dst`
    pub fn add_path_edge(
        &mut self,
        id: AliasId,
        src: AliasId,
        dst: AliasId,
        labels: impl IntoIterator<Item = LabelId>,
        direction: PatternDirection,
        hops: HopRange,
    ) -> PatternResult<&PatternEdge> {
        if self.edge(id).is_some() {
            return Err(PatternError::DuplicateEdge(id));
        }
        for endpoint in [src, dst] {
            if self.vertex(endpoint).is_none() {
                return Err(PatternError::UnknownVertex {
                    edge: id,
                    vertex: endpoint,
                });
            }
        }
        if hops.min == 0 || hops.min > hops.max {
            return Err(PatternError::InvalidHopRange {
                edge: id,
                min: hops.min,
                max: hops.max,
            });
        }
        self.edges.push(PatternEdge {
            id,
            src,
            dst,
            labels: labels.into_iter().collect(),
            direction,
            hops,
        });
        self.canonical = OnceCell::new();
        Ok(&self.edges[self.edges.len() - 1])
    }

    pub fn vertices(&self) -> &[PatternVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[PatternEdge] {
        &self.edges
    }

    pub fn vertex(&self, id: AliasId) -> Option<&PatternVertex> {
        self.vertices.iter().find(|v| v.id == id)
    }

    pub fn edge(&self, id: AliasId) -> Option<&PatternEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub(crate) fn vertex_index(&self, id: AliasId) -> Option<usize> {
        self.vertices.iter().position(|v| v.id == id)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Edges with `vertex` as an endpoint, in insertion order
    pub fn incident_edges(&self, vertex: AliasId) -> impl Iterator<Item = &PatternEdge> + '_ {
        self.edges.iter().filter(move |e| e.touches(vertex))
    }

    pub fn identity_key(&self) -> PatternKey {
        let mut vertices: Vec<AliasId> = self.vertices.iter().map(|v| v.id).collect();
        let mut edges: Vec<AliasId> = self.edges.iter().map(|e| e.id).collect();
        vertices.sort_unstable();
        edges.sort_unstable();
        PatternKey { vertices, edges }
    }

    /// Split into connected components, each keeping original vertex order
    pub fn connected_components(&self) -> Vec<GraphPattern> {
        let n = self.vertices.len();
        let mut union_find = UnionFind::<usize>::new(n);
        for edge in &self.edges {
            if let (Some(s), Some(d)) = (self.vertex_index(edge.src), self.vertex_index(edge.dst)) {
                union_find.union(s, d);
            }
        }
        let labels = union_find.into_labeling();
        let mut roots: Vec<usize> = Vec::new();
        for root in &labels {
            if !roots.contains(root) {
                roots.push(*root);
            }
        }
        roots
            .into_iter()
            .map(|root| {
                let keep: HashSet<AliasId> = self
                    .vertices
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| labels[*i] == root)
                    .map(|(_, v)| v.id)
                    .collect();
                self.induced(&keep, |e| keep.contains(&e.src))
            })
            .collect()
    }

    pub fn is_connected(&self) -> bool {
        self.vertices.len() <= 1 || self.connected_components().len() == 1
    }

    /// Pattern without `vertex` and its incident edges
    pub fn remove_vertex(&self, vertex: AliasId) -> GraphPattern {
        let keep: HashSet<AliasId> = self
            .vertices
            .iter()
            .map(|v| v.id)
            .filter(|id| *id != vertex)
            .collect();
        self.induced(&keep, |e| !e.touches(vertex))
    }

    /// Pattern over the given vertices and edges. Edges whose endpoints are
    /// not both kept are dropped.
    pub fn sub_pattern(&self, vertices: &HashSet<AliasId>, edges: &HashSet<AliasId>) -> GraphPattern {
        self.induced(vertices, |e| edges.contains(&e.id))
    }

    fn induced<F>(&self, vertices: &HashSet<AliasId>, mut keep_edge: F) -> GraphPattern
    where
        F: FnMut(&PatternEdge) -> bool,
    {
        GraphPattern {
            vertices: self
                .vertices
                .iter()
                .filter(|v| vertices.contains(&v.id))
                .cloned()
                .collect(),
            edges: self
                .edges
                .iter()
                .filter(|e| vertices.contains(&e.src) && vertices.contains(&e.dst))
                .filter(|e| keep_edge(e))
                .cloned()
                .collect(),
            canonical: OnceCell::new(),
        }
    }

    /// Union of two patterns of the same query. Shared vertices and edges
    /// appear once.
    pub fn merge(&self, other: &GraphPattern) -> GraphPattern {
        let mut merged = self.clone();
        merged.canonical = OnceCell::new();
        for vertex in &other.vertices {
            if merged.vertex(vertex.id).is_none() {
                merged.vertices.push(vertex.clone());
            }
        }
        merged.vertices.sort_by_key(|v| v.order);
        for edge in &other.edges {
            if merged.edge(edge.id).is_none() {
                merged.edges.push(edge.clone());
            }
        }
        merged
    }

    /// Canonical form: vertices renumbered in canonical order, edges sorted
    /// by their canonical encoding. Aliases are preserved.
    pub fn normalize(&self) -> GraphPattern {
        let canonical = self.canonical();
        let vertices: Vec<PatternVertex> = canonical
            .vertex_order()
            .iter()
            .enumerate()
            .map(|(order, index)| PatternVertex {
                order,
                ..self.vertices[*index].clone()
            })
            .collect();
        let edges: Vec<PatternEdge> = canonical
            .edge_order()
            .iter()
            .map(|index| self.edges[*index].clone())
            .collect();
        GraphPattern {
            vertices,
            edges,
            canonical: OnceCell::new(),
        }
    }

    /// Shape code used as the catalogue key
    pub fn canonical_code(&self) -> &CanonicalCode {
        self.canonical().code()
    }

    /// Whether the canonical code is exact, i.e. equal codes if and only if
    /// the shapes are isomorphic
    pub fn has_exact_code(&self) -> bool {
        self.canonical().is_exact()
    }

    pub fn signature(&self) -> &ShapeSignature {
        self.canonical().signature()
    }

    pub(crate) fn canonical(&self) -> &Canonical {
        self.canonical.get_or_init(|| Canonical::compute(self))
    }

    /// Label and direction aware isomorphism test
    pub fn is_isomorphic_to(&self, other: &GraphPattern) -> bool {
        canonical::is_isomorphic(self, other)
    }
}

impl PartialEq for GraphPattern {
    fn eq(&self, other: &Self) -> bool {
        if self.vertex_count() != other.vertex_count() || self.edge_count() != other.edge_count() {
            return false;
        }
        let (mine, theirs) = (self.canonical(), other.canonical());
        if mine.is_exact() && theirs.is_exact() {
            return mine.code() == theirs.code();
        }
        mine.signature() == theirs.signature() && self.is_isomorphic_to(other)
    }
}

impl Eq for GraphPattern {}

impl Hash for GraphPattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.signature().hash(state);
    }
}

fn fmt_labels(labels: &BTreeSet<LabelId>) -> String {
    labels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join("|")
}

impl fmt::Display for GraphPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vertices: Vec<String> = self
            .vertices
            .iter()
            .map(|v| format!("({}:{})", v.id, fmt_labels(&v.labels)))
            .collect();
        write!(f, "{}", vertices.join(","))?;
        for edge in &self.edges {
            let hops = if edge.hops.is_single_hop() {
                String::new()
            } else {
                format!("*{}..{}", edge.hops.min, edge.hops.max)
            };
            let (left, right) = match edge.direction {
                PatternDirection::Out => ("-", "->"),
                PatternDirection::In => ("<-", "-"),
                PatternDirection::Both => ("-", "-"),
            };
            write!(
                f,
                " ({}){}[{}:{}{}]{}({})",
                edge.src,
                left,
                edge.id,
                fmt_labels(&edge.labels),
                hops,
                right,
                edge.dst
            )?;
        }
        Ok(())
    }
}

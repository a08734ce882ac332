// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Canonical shape encoding for graph patterns
//!
//! Vertices are partitioned by a permutation-invariant signature (labels plus
//! the multiset of incident edge shapes). The canonical code is the
//! lexicographically smallest edge encoding over all orderings that keep the
//! partition order, so isomorphic patterns get identical codes. Patterns
//! whose permutation space is larger than [`MAX_CANONICAL_PERMUTATIONS`] get
//! a deterministic but inexact code, and equality falls back to a VF2
//! isomorphism test.

use super::data_key::EdgeDataKey;
use super::{GraphPattern, HopRange, LabelId, PatternDirection};
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};

/// Upper bound on vertex orderings tried while computing a canonical code
pub const MAX_CANONICAL_PERMUTATIONS: usize = 40_320;

/// Canonical shape code of a pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CanonicalCode(Vec<i64>);

impl CanonicalCode {
    pub fn tokens(&self) -> &[i64] {
        &self.0
    }
}

/// Permutation-invariant summary of a pattern shape. Isomorphic patterns
/// always share a signature; the converse does not hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShapeSignature(Vec<i64>);

#[derive(Debug, Clone)]
pub(crate) struct Canonical {
    code: CanonicalCode,
    exact: bool,
    signature: ShapeSignature,
    vertex_order: Vec<usize>,
    edge_order: Vec<usize>,
}

impl Canonical {
    pub(crate) fn code(&self) -> &CanonicalCode {
        &self.code
    }

    pub(crate) fn is_exact(&self) -> bool {
        self.exact
    }

    pub(crate) fn signature(&self) -> &ShapeSignature {
        &self.signature
    }

    /// Vertex indices in canonical position order
    pub(crate) fn vertex_order(&self) -> &[usize] {
        &self.vertex_order
    }

    /// Edge indices in canonical order
    pub(crate) fn edge_order(&self) -> &[usize] {
        &self.edge_order
    }

    pub(crate) fn compute(pattern: &GraphPattern) -> Canonical {
        let invariants = vertex_invariants(pattern);

        let mut sorted: Vec<usize> = (0..pattern.vertex_count()).collect();
        sorted.sort_by(|a, b| invariants[*a].cmp(&invariants[*b]).then(a.cmp(b)));

        let mut signature = vec![pattern.vertex_count() as i64, pattern.edge_count() as i64];
        for index in &sorted {
            signature.push(invariants[*index].len() as i64);
            signature.extend_from_slice(&invariants[*index]);
        }
        let signature = ShapeSignature(signature);

        let mut classes: Vec<Vec<usize>> = Vec::new();
        for index in &sorted {
            match classes.last_mut() {
                Some(class) if invariants[class[0]] == invariants[*index] => class.push(*index),
                _ => classes.push(vec![*index]),
            }
        }

        let exact = permutation_count(&classes) <= MAX_CANONICAL_PERMUTATIONS;
        let (edges, vertex_order, edge_order) = if exact {
            let mut best: Option<(Vec<i64>, Vec<usize>, Vec<usize>)> = None;
            let mut current = Vec::with_capacity(sorted.len());
            search_orderings(pattern, &classes, 0, &mut current, &mut best);
            match best {
                Some(found) => found,
                None => (Vec::new(), Vec::new(), Vec::new()),
            }
        } else {
            log::debug!(
                "pattern with {} vertices exceeds canonical search bound, using inexact code",
                pattern.vertex_count()
            );
            let (encoded, edge_order) = encode_edges(pattern, &sorted);
            (encoded, sorted.clone(), edge_order)
        };

        let mut code = signature.0.clone();
        code.extend(edges);

        Canonical {
            code: CanonicalCode(code),
            exact,
            signature,
            vertex_order,
            edge_order,
        }
    }
}

fn incident_kind(direction: PatternDirection, self_loop: bool) -> i64 {
    if self_loop {
        3
    } else {
        direction.code()
    }
}

fn edge_shape_tokens(labels: &std::collections::BTreeSet<LabelId>, hops: HopRange) -> Vec<i64> {
    let mut tokens = vec![hops.min as i64, hops.max as i64, labels.len() as i64];
    tokens.extend(labels.iter().map(|l| *l as i64));
    tokens
}

fn vertex_invariants(pattern: &GraphPattern) -> Vec<Vec<i64>> {
    pattern
        .vertices()
        .iter()
        .map(|vertex| {
            let mut tokens = vec![vertex.labels().len() as i64];
            tokens.extend(vertex.labels().iter().map(|l| *l as i64));

            let mut incident: Vec<Vec<i64>> = pattern
                .incident_edges(vertex.id())
                .map(|edge| {
                    let mut entry = vec![incident_kind(
                        edge.direction_from(vertex.id()),
                        edge.is_self_loop(),
                    )];
                    entry.extend(edge_shape_tokens(edge.labels(), edge.hops()));
                    entry
                })
                .collect();
            incident.sort();
            tokens.push(incident.len() as i64);
            for entry in incident {
                tokens.extend(entry);
            }
            tokens
        })
        .collect()
}

fn permutation_count(classes: &[Vec<usize>]) -> usize {
    let mut total: usize = 1;
    for class in classes {
        for k in 2..=class.len() {
            total = total.saturating_mul(k);
        }
    }
    total
}

fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut result = Vec::new();
    for i in 0..items.len() {
        let mut rest = items.to_vec();
        let head = rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, head);
            result.push(tail);
        }
    }
    result
}

fn search_orderings(
    pattern: &GraphPattern,
    classes: &[Vec<usize>],
    class_index: usize,
    current: &mut Vec<usize>,
    best: &mut Option<(Vec<i64>, Vec<usize>, Vec<usize>)>,
) {
    if class_index == classes.len() {
        let (encoded, edge_order) = encode_edges(pattern, current);
        let better = match best {
            Some((best_code, _, _)) => encoded < *best_code,
            None => true,
        };
        if better {
            *best = Some((encoded, current.clone(), edge_order));
        }
        return;
    }
    for ordering in permutations(&classes[class_index]) {
        let mark = current.len();
        current.extend(ordering);
        search_orderings(pattern, classes, class_index + 1, current, best);
        current.truncate(mark);
    }
}

/// Encode edges under a vertex ordering (`ordering[position] = vertex index`)
fn encode_edges(pattern: &GraphPattern, ordering: &[usize]) -> (Vec<i64>, Vec<usize>) {
    let mut position = vec![0usize; ordering.len()];
    for (pos, index) in ordering.iter().enumerate() {
        position[*index] = pos;
    }

    let mut encoded: Vec<(Vec<i64>, usize)> = pattern
        .edges()
        .iter()
        .enumerate()
        .filter_map(|(edge_index, edge)| {
            let src = pattern.vertex_index(edge.src())?;
            let dst = pattern.vertex_index(edge.dst())?;
            let key = EdgeDataKey::new(position[src], position[dst], edge.direction());
            let mut tokens = vec![
                key.low() as i64,
                key.high() as i64,
                key.direction().code(),
            ];
            tokens.extend(edge_shape_tokens(edge.labels(), edge.hops()));
            Some((tokens, edge_index))
        })
        .collect();
    encoded.sort();

    let edge_order = encoded.iter().map(|(_, index)| *index).collect();
    let flat = encoded.into_iter().flat_map(|(tokens, _)| tokens).collect();
    (flat, edge_order)
}

type EdgeWeight = (Vec<LabelId>, HopRange, bool);

fn to_digraph(pattern: &GraphPattern) -> DiGraph<Vec<LabelId>, EdgeWeight> {
    let mut graph = DiGraph::new();
    let nodes: Vec<NodeIndex> = pattern
        .vertices()
        .iter()
        .map(|v| graph.add_node(v.labels().iter().copied().collect()))
        .collect();
    for edge in pattern.edges() {
        let (Some(src), Some(dst)) = (
            pattern.vertex_index(edge.src()),
            pattern.vertex_index(edge.dst()),
        ) else {
            continue;
        };
        let labels: Vec<LabelId> = edge.labels().iter().copied().collect();
        match edge.direction() {
            PatternDirection::Out => {
                graph.add_edge(nodes[src], nodes[dst], (labels, edge.hops(), false));
            }
            PatternDirection::In => {
                graph.add_edge(nodes[dst], nodes[src], (labels, edge.hops(), false));
            }
            PatternDirection::Both => {
                graph.add_edge(nodes[src], nodes[dst], (labels.clone(), edge.hops(), true));
                graph.add_edge(nodes[dst], nodes[src], (labels, edge.hops(), true));
            }
        }
    }
    graph
}

pub(crate) fn is_isomorphic(left: &GraphPattern, right: &GraphPattern) -> bool {
    if left.vertex_count() != right.vertex_count() || left.edge_count() != right.edge_count() {
        return false;
    }
    let (g0, g1) = (to_digraph(left), to_digraph(right));
    petgraph::algo::is_isomorphic_matching(&g0, &g1, |a, b| a == b, |a, b| a == b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star(center_label: LabelId, leaves: usize) -> GraphPattern {
        let mut p = GraphPattern::new();
        p.add_vertex(0, [center_label]).unwrap();
        for i in 1..=leaves as i32 {
            p.add_vertex(i, [7]).unwrap();
            p.add_edge(100 + i, 0, i, [9], PatternDirection::Out).unwrap();
        }
        p
    }

    #[test]
    fn test_permutation_helpers() {
        assert_eq!(permutations(&[1, 2, 3]).len(), 6);
        assert_eq!(permutation_count(&[vec![0, 1, 2], vec![3, 4]]), 12);
    }

    #[test]
    fn test_small_star_is_exact() {
        let p = star(1, 4);
        assert!(p.has_exact_code());
        assert_eq!(p.canonical_code(), star(1, 4).canonical_code());
    }

    #[test]
    fn test_large_star_falls_back_to_isomorphism() {
        // nine interchangeable leaves: 9! orderings exceed the search bound
        let a = star(1, 9);
        let b = star(1, 9);
        assert!(!a.has_exact_code());
        assert_eq!(a, b);
        assert_ne!(a, star(2, 9));
    }

    #[test]
    fn test_isomorphism_respects_labels() {
        let mut a = GraphPattern::new();
        a.add_vertex(0, [1]).unwrap();
        a.add_vertex(1, [2]).unwrap();
        a.add_edge(5, 0, 1, [3], PatternDirection::Out).unwrap();

        let mut b = GraphPattern::new();
        b.add_vertex(0, [2]).unwrap();
        b.add_vertex(1, [1]).unwrap();
        b.add_edge(5, 1, 0, [3], PatternDirection::Out).unwrap();

        let mut c = GraphPattern::new();
        c.add_vertex(0, [2]).unwrap();
        c.add_vertex(1, [1]).unwrap();
        c.add_edge(5, 0, 1, [3], PatternDirection::Out).unwrap();

        assert!(is_isomorphic(&a, &b));
        assert!(!is_isomorphic(&a, &c));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}

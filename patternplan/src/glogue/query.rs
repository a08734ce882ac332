// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row count estimation over the catalogue
//!
//! Exact shapes are answered from the catalogue. A one-edge shape with
//! label sets, wildcard labels or a `Both` direction is the sum of the
//! concrete indexed shapes it can match. Anything else is extrapolated from
//! smaller shapes it contains:
//!
//! - a disconnected pattern is the product of its components;
//! - a connected pattern takes the smallest of its removal candidates. Removing
//!   an edge `e` gives `rows(P - e) * sel(e)` where `sel(e)` is the edge
//!   type's count over the product of its endpoint counts. Removing a vertex
//!   `v` gives `rows(P - v)` times the smallest expansion ratio into `v` and
//!   the selectivities of its other incident edges.
//!
//! Every candidate is clamped to `[1, rows(sub-pattern)]`, so adding an edge
//! or a vertex never increases the estimate and no estimate reaches zero.
//! Shapes with no indexed component get the configured default.
//!
//! Above the exhaustive edge limit only one removal is followed: the one
//! that keeps the rest connected with the smallest factor product.

use super::Glogue;
use crate::alias::AliasId;
use crate::pattern::{GraphPattern, LabelId, PatternDirection, PatternEdge};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Upper limit on the concrete shapes a one-edge shape is expanded into
const MAX_CONCRETE_SHAPES: usize = 4096;

/// A row count and whether any catalogue entry contributed to it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub rows: f64,
    pub grounded: bool,
}

/// Estimator bound to one catalogue snapshot for one compilation
#[derive(Debug)]
pub struct GlogueQuery<'a> {
    glogue: &'a Glogue,
    unknown_row_count: f64,
    max_exhaustive_edges: usize,
    memo: RefCell<HashMap<GraphPattern, Estimate>>,
    exact_hits: Cell<usize>,
    extrapolations: Cell<usize>,
}

impl<'a> GlogueQuery<'a> {
    pub fn new(glogue: &'a Glogue, unknown_row_count: f64, max_exhaustive_edges: usize) -> Self {
        Self {
            glogue,
            unknown_row_count,
            max_exhaustive_edges,
            memo: RefCell::new(HashMap::new()),
            exact_hits: Cell::new(0),
            extrapolations: Cell::new(0),
        }
    }

    /// Estimated number of matches of `pattern`; always at least 1
    pub fn get_row_count(&self, pattern: &GraphPattern) -> f64 {
        self.estimate(pattern).rows
    }

    pub fn estimate(&self, pattern: &GraphPattern) -> Estimate {
        if pattern.is_empty() {
            return Estimate {
                rows: 1.0,
                grounded: true,
            };
        }
        if let Some(found) = self.memo.borrow().get(pattern) {
            return *found;
        }
        let estimate = self.compute(pattern);
        self.memo.borrow_mut().insert(pattern.clone(), estimate);
        estimate
    }

    /// Number of estimates answered directly by the catalogue
    pub fn exact_hits(&self) -> usize {
        self.exact_hits.get()
    }

    /// Number of estimates computed by extrapolation
    pub fn extrapolations(&self) -> usize {
        self.extrapolations.get()
    }

    pub fn unknown_row_count(&self) -> f64 {
        self.unknown_row_count
    }

    fn unknown(&self) -> Estimate {
        Estimate {
            rows: self.unknown_row_count,
            grounded: false,
        }
    }

    fn compute(&self, pattern: &GraphPattern) -> Estimate {
        if let Some(count) = self.glogue.get_exact(pattern) {
            self.exact_hits.set(self.exact_hits.get() + 1);
            return Estimate {
                rows: count.max(1.0),
                grounded: true,
            };
        }
        if pattern.vertex_count() == 1 && pattern.edge_count() == 0 {
            return self.vertex_union(pattern);
        }
        if let Some(estimate) = self.edge_union(pattern) {
            return estimate;
        }
        self.extrapolations.set(self.extrapolations.get() + 1);

        if !pattern.is_connected() {
            return self.disconnected(pattern);
        }

        let estimate = self.connected(pattern);
        if !estimate.grounded {
            log::debug!(
                "no indexed component for {}, using default row count",
                pattern
            );
        }
        estimate
    }

    /// A multi-label vertex matches the union of its labels, a wildcard
    /// vertex the union of every indexed label
    fn vertex_union(&self, pattern: &GraphPattern) -> Estimate {
        let labels = pattern.vertices()[0].labels();
        if labels.len() == 1 {
            return self.unknown();
        }
        let wildcard = labels.is_empty();
        let mut total = 0.0;
        let mut found = false;
        for label in self.vertex_choices(labels) {
            let mut single = GraphPattern::new();
            if single.add_vertex(0, [label]).is_err() {
                return self.unknown();
            }
            match self.glogue.get_exact(&single) {
                Some(count) => {
                    total += count;
                    found = true;
                }
                None if wildcard => {}
                None => return self.unknown(),
            }
        }
        if !found {
            return self.unknown();
        }
        Estimate {
            rows: total.max(1.0),
            grounded: true,
        }
    }

    /// Sum of the concrete `(src)-[label]->(dst)` shapes a single-hop,
    /// one-edge pattern can match. Combinations the catalogue does not index
    /// count as zero. None when the pattern is already concrete or no
    /// combination is indexed.
    fn edge_union(&self, pattern: &GraphPattern) -> Option<Estimate> {
        let [edge] = pattern.edges() else {
            return None;
        };
        if !edge.hops().is_single_hop() {
            return None;
        }
        let src_labels = pattern.vertex(edge.src())?.labels();
        let dst_labels = pattern.vertex(edge.dst())?.labels();
        let src = self.vertex_choices(src_labels);
        let dst = if edge.is_self_loop() {
            Vec::new()
        } else {
            self.vertex_choices(dst_labels)
        };
        let labels: Vec<LabelId> = if edge.labels().is_empty() {
            self.glogue.edge_labels().iter().copied().collect()
        } else {
            edge.labels().iter().copied().collect()
        };
        let directions = match edge.direction() {
            PatternDirection::Both if !edge.is_self_loop() => {
                vec![PatternDirection::Out, PatternDirection::In]
            }
            PatternDirection::Both => vec![PatternDirection::Out],
            direction => vec![direction],
        };

        let concrete = src_labels.len() == 1
            && dst_labels.len() == 1
            && edge.labels().len() == 1
            && edge.direction() != PatternDirection::Both;
        let combinations = src.len() * dst.len().max(1) * labels.len() * directions.len();
        if concrete || combinations == 0 || combinations > MAX_CONCRETE_SHAPES {
            return None;
        }

        let mut total = 0.0;
        let mut found = false;
        for s in &src {
            let targets: &[LabelId] = if edge.is_self_loop() {
                std::slice::from_ref(s)
            } else {
                &dst
            };
            for d in targets {
                for label in &labels {
                    for direction in &directions {
                        let shape = concrete_edge(*s, *d, *label, *direction, edge.is_self_loop())?;
                        if let Some(count) = self.glogue.get_exact(&shape) {
                            total += count;
                            found = true;
                        }
                    }
                }
            }
        }
        found.then(|| Estimate {
            rows: total.max(1.0),
            grounded: true,
        })
    }

    /// Concrete labels a vertex label set stands for
    fn vertex_choices(&self, labels: &BTreeSet<LabelId>) -> Vec<LabelId> {
        if labels.is_empty() {
            self.glogue.vertex_labels().iter().copied().collect()
        } else {
            labels.iter().copied().collect()
        }
    }

    fn disconnected(&self, pattern: &GraphPattern) -> Estimate {
        let mut rows = 1.0_f64;
        let mut grounded = false;
        for component in pattern.connected_components() {
            let part = self.estimate(&component);
            rows *= part.rows;
            grounded |= part.grounded;
        }
        if !grounded {
            return self.unknown();
        }
        Estimate {
            rows: rows.min(self.unknown_row_count).max(1.0),
            grounded,
        }
    }

    fn connected(&self, pattern: &GraphPattern) -> Estimate {
        let greedy = pattern.edge_count() > self.max_exhaustive_edges;
        let mut best: Option<Estimate> = None;
        let mut consider = |candidate: Estimate| {
            best = Some(match best {
                Some(current) if current.rows <= candidate.rows => Estimate {
                    grounded: current.grounded || candidate.grounded,
                    ..current
                },
                Some(current) => Estimate {
                    grounded: current.grounded || candidate.grounded,
                    ..candidate
                },
                None => candidate,
            });
        };

        if greedy {
            // one removal that keeps the rest connected, smallest factor first
            let mut chosen: Option<(f64, GraphPattern, Vec<f64>)> = None;
            let mut offer = |rest: GraphPattern, factors: Vec<f64>| {
                let product: f64 = factors.iter().product();
                if chosen.as_ref().map_or(true, |(best, _, _)| product < *best) {
                    chosen = Some((product, rest, factors));
                }
            };
            for edge in pattern.edges() {
                let rest = without_edge(pattern, edge.id());
                if rest.is_connected() {
                    offer(rest, vec![self.edge_selectivity(pattern, edge).unwrap_or(1.0)]);
                }
            }
            for vertex in pattern.vertices() {
                if pattern.incident_edges(vertex.id()).next().is_none() {
                    continue;
                }
                let rest = pattern.remove_vertex(vertex.id());
                if !rest.is_empty() && rest.is_connected() {
                    offer(rest, self.vertex_factors(pattern, vertex.id()));
                }
            }
            if let Some((_, rest, factors)) = chosen {
                consider(clamp(self.estimate(&rest), &factors));
            }
        } else {
            for edge in pattern.edges() {
                let base = self.estimate(&without_edge(pattern, edge.id()));
                let selectivity = self.edge_selectivity(pattern, edge).unwrap_or(1.0);
                consider(clamp(base, &[selectivity]));
            }
            for vertex in pattern.vertices() {
                if pattern.incident_edges(vertex.id()).next().is_none() {
                    continue;
                }
                let rest = pattern.remove_vertex(vertex.id());
                if rest.is_empty() {
                    continue;
                }
                let base = self.estimate(&rest);
                let factors = self.vertex_factors(pattern, vertex.id());
                consider(clamp(base, &factors));
            }
        }

        match best {
            Some(estimate) if estimate.grounded => estimate,
            _ => self.unknown(),
        }
    }

    /// Count of the one-edge pattern over the endpoints of `edge`, divided by
    /// the product of the endpoint counts
    fn edge_selectivity(&self, pattern: &GraphPattern, edge: &PatternEdge) -> Option<f64> {
        let edge_count = self.edge_rows(pattern, edge)?;
        let src = self.grounded_rows(&single_vertex(pattern, edge.src()))?;
        let denominator = if edge.is_self_loop() {
            src
        } else {
            src * self.grounded_rows(&single_vertex(pattern, edge.dst()))?
        };
        Some((edge_count / denominator).min(1.0))
    }

    /// Average number of `edge` matches per match of `from`
    fn expansion_ratio(&self, pattern: &GraphPattern, edge: &PatternEdge, from: AliasId) -> Option<f64> {
        let edge_count = self.edge_rows(pattern, edge)?;
        let from_count = self.grounded_rows(&single_vertex(pattern, from))?;
        Some(edge_count / from_count)
    }

    fn vertex_factors(&self, pattern: &GraphPattern, vertex: AliasId) -> Vec<f64> {
        let incident: Vec<&PatternEdge> = pattern.incident_edges(vertex).collect();
        let mut extend: Option<(f64, AliasId)> = None;
        for edge in incident.iter().filter(|e| !e.is_self_loop()) {
            let Some(from) = edge.other_end(vertex) else {
                continue;
            };
            if let Some(ratio) = self.expansion_ratio(pattern, edge, from) {
                if extend.map_or(true, |(best, _)| ratio < best) {
                    extend = Some((ratio, edge.id()));
                }
            }
        }
        let mut factors = Vec::with_capacity(incident.len());
        if let Some((ratio, _)) = extend {
            factors.push(ratio);
        }
        for edge in incident {
            if extend.map_or(false, |(_, id)| id == edge.id()) {
                continue;
            }
            factors.push(self.edge_selectivity(pattern, edge).unwrap_or(1.0));
        }
        factors
    }

    /// Rows of the one-edge pattern over `edge`. None when that is
    /// `pattern` itself, which is being estimated right now.
    fn edge_rows(&self, pattern: &GraphPattern, edge: &PatternEdge) -> Option<f64> {
        let single = single_edge(pattern, edge);
        if single.edge_count() == pattern.edge_count()
            && single.vertex_count() == pattern.vertex_count()
        {
            return None;
        }
        self.grounded_rows(&single)
    }

    fn grounded_rows(&self, pattern: &GraphPattern) -> Option<f64> {
        let estimate = self.estimate(pattern);
        estimate.grounded.then_some(estimate.rows)
    }
}

fn clamp(base: Estimate, factors: &[f64]) -> Estimate {
    let mut sorted = factors.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rows = sorted.iter().fold(base.rows, |acc, f| acc * f);
    Estimate {
        rows: rows.max(1.0).min(base.rows),
        grounded: base.grounded,
    }
}

fn without_edge(pattern: &GraphPattern, edge: AliasId) -> GraphPattern {
    let vertices: HashSet<AliasId> = pattern.vertices().iter().map(|v| v.id()).collect();
    let edges: HashSet<AliasId> = pattern
        .edges()
        .iter()
        .map(|e| e.id())
        .filter(|id| *id != edge)
        .collect();
    pattern.sub_pattern(&vertices, &edges)
}

fn concrete_edge(
    src: LabelId,
    dst: LabelId,
    label: LabelId,
    direction: PatternDirection,
    self_loop: bool,
) -> Option<GraphPattern> {
    let mut shape = GraphPattern::new();
    shape.add_vertex(0, [src]).ok()?;
    if self_loop {
        shape.add_edge(1, 0, 0, [label], direction).ok()?;
    } else {
        shape.add_vertex(1, [dst]).ok()?;
        shape.add_edge(2, 0, 1, [label], direction).ok()?;
    }
    Some(shape)
}

fn single_vertex(pattern: &GraphPattern, vertex: AliasId) -> GraphPattern {
    pattern.sub_pattern(&HashSet::from([vertex]), &HashSet::new())
}

fn single_edge(pattern: &GraphPattern, edge: &PatternEdge) -> GraphPattern {
    pattern.sub_pattern(
        &HashSet::from([edge.src(), edge.dst()]),
        &HashSet::from([edge.id()]),
    )
}

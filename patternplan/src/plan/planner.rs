// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Planner entry points
//!
//! [`QueryBuilder`] turns tagged patterns into query IR. [`GraphPlanner`]
//! compiles IR against one metadata and catalogue snapshot:
//!
//! 1. validate operator arities and labels;
//! 2. split fixed-length path expansions into single-hop fragments;
//! 3. turn disconnected patterns into cross joins of their components;
//! 4. seed the memo, explore rewrites, derive class row counts;
//! 5. search for the cheapest plan and serialise it.
//!
//! A stored procedure call is the whole query and skips the search.
//! [`PlannerService`] owns the published snapshots for concurrent callers.

use super::cardinality::RowCountEstimator;
use super::cost::{AccessPath, Cost, CostModel};
use super::error::{PlanningError, PlanningResult};
use super::logical::{ExtendEdge, JoinKind, LogicalNode, LogicalOp};
use super::memo::{GroupId, Memo};
use super::physical::{
    ColumnKind, CompiledPlan, PathFragments, PhysicalExpand, PhysicalNode, PhysicalOp,
    PhysicalPlan, ResultColumn, ResultSchema,
};
use super::rules::{default_rules, explore};
use super::search::{SearchStats, VolcanoSearch};
use crate::alias::{AliasId, AliasIdGenerator, AliasRegistry};
use crate::config::PlannerConfig;
use crate::glogue::Glogue;
use crate::meta::{DataType, IrMeta, MetaError, SnapshotCell};
use crate::pattern::{
    split_path_expand, GraphPattern, HopRange, LabelId, Literal, PatternDirection, PatternError,
    PatternResult, Predicate,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Query IR handed to the planner
#[derive(Debug, Clone)]
pub struct QueryIr {
    pub root: LogicalNode,
    pub aliases: AliasRegistry,
    /// Filters on edges, applied while expanding
    pub edge_filters: BTreeMap<AliasId, Predicate>,
    /// Output columns; all tagged aliases when empty
    pub outputs: Vec<AliasId>,
}

impl QueryIr {
    /// IR whose aliases were assigned elsewhere. Aliases the planner adds
    /// are numbered after the largest one in `root`.
    pub fn new(root: LogicalNode) -> Self {
        let start = max_alias(&root).map_or(0, |max| max + 1);
        Self {
            root,
            aliases: AliasRegistry::starting_at(start),
            edge_filters: BTreeMap::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_outputs(mut self, outputs: Vec<AliasId>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn with_edge_filter(mut self, edge: AliasId, predicate: Predicate) -> Self {
        self.edge_filters.insert(edge, predicate);
        self
    }

    /// Name an alias that was assigned outside the registry
    pub fn bind_tag(mut self, tag: &str, alias: AliasId) -> Self {
        self.aliases.bind(tag, alias);
        self
    }
}

fn max_alias(node: &LogicalNode) -> Option<AliasId> {
    let own = match &node.op {
        LogicalOp::Pattern(p) => p
            .vertices()
            .iter()
            .map(|v| v.id())
            .chain(p.edges().iter().map(|e| e.id()))
            .max(),
        LogicalOp::Aggregate { calls, .. } => calls.iter().map(|c| c.output).max(),
        _ => None,
    };
    node.inputs
        .iter()
        .filter_map(max_alias)
        .chain(own)
        .max()
}

/// Builds query IR, binding tags to alias ids in introduction order
#[derive(Debug, Default)]
pub struct QueryBuilder {
    aliases: AliasRegistry,
    edge_filters: BTreeMap<AliasId, Predicate>,
    outputs: Vec<AliasId>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one pattern. Tags already used by earlier patterns keep their
    /// alias ids.
    pub fn pattern<F>(&mut self, build: F) -> PatternResult<GraphPattern>
    where
        F: FnOnce(&mut PatternBuilder<'_>) -> PatternResult<()>,
    {
        let mut builder = PatternBuilder {
            aliases: &mut self.aliases,
            edge_filters: &mut self.edge_filters,
            pattern: GraphPattern::new(),
        };
        build(&mut builder)?;
        if builder.pattern.is_empty() {
            return Err(PatternError::EmptyPattern);
        }
        Ok(builder.pattern)
    }

    /// Alias of `tag`, assigned on first use (aggregate outputs and the like)
    pub fn alias(&mut self, tag: &str) -> AliasId {
        self.aliases.get_or_assign(tag)
    }

    pub fn fresh_alias(&mut self) -> AliasId {
        self.aliases.anonymous()
    }

    /// Select output columns by tag
    pub fn returning(&mut self, tags: &[&str]) -> PatternResult<()> {
        for tag in tags {
            let alias = self
                .aliases
                .lookup(tag)
                .ok_or_else(|| PatternError::UnknownTag(tag.to_string()))?;
            self.outputs.push(alias);
        }
        Ok(())
    }

    pub fn finish(self, root: impl Into<LogicalNode>) -> QueryIr {
        QueryIr {
            root: root.into(),
            aliases: self.aliases,
            edge_filters: self.edge_filters,
            outputs: self.outputs,
        }
    }
}

pub struct PatternBuilder<'a> {
    aliases: &'a mut AliasRegistry,
    edge_filters: &'a mut BTreeMap<AliasId, Predicate>,
    pattern: GraphPattern,
}

impl PatternBuilder<'_> {
    /// Vertex bound to `tag`. Repeating a tag refers to the same vertex.
    pub fn vertex(
        &mut self,
        tag: &str,
        labels: impl IntoIterator<Item = LabelId>,
    ) -> PatternResult<AliasId> {
        let id = self.aliases.get_or_assign(tag);
        if self.pattern.vertex(id).is_none() {
            self.pattern.add_vertex(id, labels)?;
        }
        Ok(id)
    }

    pub fn anonymous_vertex(
        &mut self,
        labels: impl IntoIterator<Item = LabelId>,
    ) -> PatternResult<AliasId> {
        let id = self.aliases.anonymous();
        self.pattern.add_vertex(id, labels)?;
        Ok(id)
    }

    /// Untagged edge between two tagged vertices
    pub fn edge(
        &mut self,
        src: &str,
        dst: &str,
        labels: impl IntoIterator<Item = LabelId>,
        direction: PatternDirection,
    ) -> PatternResult<AliasId> {
        let (src, dst) = (self.endpoint(src)?, self.endpoint(dst)?);
        let id = self.aliases.anonymous();
        self.pattern.add_edge(id, src, dst, labels, direction)?;
        Ok(id)
    }

    /// Untagged edge between vertices given by alias id
    pub fn edge_between(
        &mut self,
        src: AliasId,
        dst: AliasId,
        labels: impl IntoIterator<Item = LabelId>,
        direction: PatternDirection,
    ) -> PatternResult<AliasId> {
        let id = self.aliases.anonymous();
        self.pattern.add_edge(id, src, dst, labels, direction)?;
        Ok(id)
    }

    pub fn tagged_edge(
        &mut self,
        tag: &str,
        src: &str,
        dst: &str,
        labels: impl IntoIterator<Item = LabelId>,
        direction: PatternDirection,
    ) -> PatternResult<AliasId> {
        self.path(tag, src, dst, labels, direction, HopRange::single())
    }

    /// Tagged edge spanning `hops` hops
    pub fn path(
        &mut self,
        tag: &str,
        src: &str,
        dst: &str,
        labels: impl IntoIterator<Item = LabelId>,
        direction: PatternDirection,
        hops: HopRange,
    ) -> PatternResult<AliasId> {
        let (src, dst) = (self.endpoint(src)?, self.endpoint(dst)?);
        let id = self.aliases.get_or_assign(tag);
        self.pattern
            .add_path_edge(id, src, dst, labels, direction, hops)?;
        Ok(id)
    }

    /// Filter applied to a tagged edge while it is expanded
    pub fn filter_edge(&mut self, tag: &str, predicate: Predicate) -> PatternResult<()> {
        let id = self
            .aliases
            .lookup(tag)
            .filter(|id| self.pattern.edge(*id).is_some())
            .ok_or_else(|| PatternError::UnknownTag(tag.to_string()))?;
        self.edge_filters.insert(id, predicate);
        Ok(())
    }

    fn endpoint(&self, tag: &str) -> PatternResult<AliasId> {
        self.aliases
            .lookup(tag)
            .filter(|id| self.pattern.vertex(*id).is_some())
            .ok_or_else(|| PatternError::UnknownTag(tag.to_string()))
    }
}

/// Compiles query IR against one metadata and catalogue snapshot
#[derive(Debug, Clone)]
pub struct GraphPlanner {
    meta: Arc<IrMeta>,
    glogue: Arc<Glogue>,
    config: PlannerConfig,
}

impl GraphPlanner {
    pub fn new(
        meta: impl Into<Arc<IrMeta>>,
        glogue: impl Into<Arc<Glogue>>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            meta: meta.into(),
            glogue: glogue.into(),
            config,
        }
    }

    pub fn meta(&self) -> &IrMeta {
        &self.meta
    }

    pub fn glogue(&self) -> &Glogue {
        &self.glogue
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Estimated output rows of `node`, without any search
    pub fn estimate(&self, node: &LogicalNode) -> PlanningResult<f64> {
        let estimator = RowCountEstimator::new(self.glogue.query(&self.config), &self.config);
        Ok(estimator.estimate_tree(node)?)
    }

    pub fn compile(&self, query: QueryIr) -> PlanningResult<CompiledPlan> {
        let QueryIr {
            root,
            mut aliases,
            edge_filters,
            outputs,
        } = query;
        root.validate()?;

        if let LogicalOp::ProcedureCall { name, args } = &root.op {
            return self.compile_procedure(name, args, &mut aliases);
        }
        if contains_procedure_call(&root) {
            return Err(PlanningError::InvalidQuery(
                "stored procedure call must be the whole query".into(),
            ));
        }
        self.check_labels(&root)?;

        let kinds = column_kinds(&root);
        let outputs = resolve_outputs(outputs, &aliases, &kinds);

        let mut fragments = Vec::new();
        let prepared = self.prepare(root, &mut aliases, &edge_filters, &mut fragments)?;
        let mut filters = edge_filters;
        for fragment in &fragments {
            for value in &fragment.values {
                if let Some(filter) = &value.filter {
                    filters.insert(value.alias, filter.clone());
                }
            }
        }

        let estimator = RowCountEstimator::new(self.glogue.query(&self.config), &self.config)
            .with_edge_filters(filters.clone());
        let mut memo = Memo::new();
        let root_group = memo.insert_tree(&prepared)?;
        log::debug!(
            "memo seeded with {} classes for {} aliases",
            memo.group_count(),
            aliases.generator_mut().peek()
        );
        let rule_applications = explore(&mut memo, &default_rules(), &self.config)?;
        memo.derive_rows(&estimator)?;

        let model = CostModel::new(&self.config.cost, self.meta.schema(), &estimator);
        let (cost, stats) = {
            let mut search = VolcanoSearch::new(&mut memo, &model, self.config.cost_strategy);
            let cost = search.optimize(root_group)?;
            let stats = SearchStats {
                rule_applications,
                ..search.into_stats()
            };
            (cost, stats)
        };

        let mut extractor = PlanExtractor {
            memo: &memo,
            model: &model,
            filters: &filters,
            aliases: aliases.generator_mut(),
        };
        let root = extractor.extract(root_group)?;

        let columns = outputs
            .iter()
            .map(|alias| ResultColumn {
                alias: *alias,
                name: aliases.display_name(*alias),
                kind: kinds.get(alias).copied().unwrap_or(ColumnKind::Value),
            })
            .collect();
        let plan = PhysicalPlan {
            graph_id: self.meta.graph_id().to_string(),
            snapshot_id: self.meta.snapshot_id(),
            root,
            fragments,
            outputs,
        };
        log::info!(
            "compiled plan for graph {} with {} operators, cost {} ({} catalogue hits)",
            plan.graph_id,
            plan.root.node_count(),
            cost,
            estimator.glogue().exact_hits()
        );
        CompiledPlan::new(plan, ResultSchema { columns }, cost, stats)
    }

    fn compile_procedure(
        &self,
        name: &str,
        args: &[Literal],
        aliases: &mut AliasRegistry,
    ) -> PlanningResult<CompiledPlan> {
        let procedure = self.meta.procedures().get(name).ok_or_else(|| {
            PlanningError::InvalidQuery(format!("unknown stored procedure '{}'", name))
        })?;
        if args.len() != procedure.params.len() {
            return Err(PlanningError::InvalidQuery(format!(
                "procedure '{}' takes {} arguments, got {}",
                name,
                procedure.params.len(),
                args.len()
            )));
        }
        for (param, arg) in procedure.params.iter().zip(args) {
            if !literal_fits(arg, param.data_type) {
                return Err(PlanningError::InvalidQuery(format!(
                    "argument '{}' of procedure '{}' expects {}, got {}",
                    param.name, name, param.data_type, arg
                )));
            }
        }
        log::debug!("procedure call '{}' bypasses the search", name);

        let columns: Vec<ResultColumn> = procedure
            .returns
            .iter()
            .map(|field| ResultColumn {
                alias: aliases.anonymous(),
                name: field.name.clone(),
                kind: ColumnKind::Value,
            })
            .collect();
        let root = PhysicalNode {
            id: aliases.anonymous(),
            op: PhysicalOp::ProcedureCall {
                name: name.to_string(),
                args: args.to_vec(),
            },
            inputs: Vec::new(),
            estimated_rows: None,
            cost: Cost::zero(),
        };
        let plan = PhysicalPlan {
            graph_id: self.meta.graph_id().to_string(),
            snapshot_id: self.meta.snapshot_id(),
            root,
            fragments: Vec::new(),
            outputs: columns.iter().map(|c| c.alias).collect(),
        };
        CompiledPlan::new(
            plan,
            ResultSchema { columns },
            Cost::zero(),
            SearchStats::default(),
        )
    }

    /// Every label id must exist in the schema, unless the schema is empty
    fn check_labels(&self, root: &LogicalNode) -> PlanningResult<()> {
        let schema = self.meta.schema();
        let mut result = Ok(());
        root.for_each_pattern(&mut |pattern| {
            if result.is_err() {
                return;
            }
            if !schema.vertex_types().is_empty() {
                for vertex in pattern.vertices() {
                    if let Some(label) = vertex
                        .labels()
                        .iter()
                        .find(|l| schema.vertex_type_by_id(**l).is_none())
                    {
                        result = Err(MetaError::UnknownLabel(format!(
                            "vertex label id {} on alias {}",
                            label,
                            vertex.id()
                        )));
                        return;
                    }
                }
            }
            if !schema.edge_types().is_empty() {
                for edge in pattern.edges() {
                    if let Some(label) = edge
                        .labels()
                        .iter()
                        .find(|l| !schema.edge_types().iter().any(|e| e.label_id == **l))
                    {
                        result = Err(MetaError::UnknownLabel(format!(
                            "edge label id {} on alias {}",
                            label,
                            edge.id()
                        )));
                        return;
                    }
                }
            }
        });
        result.map_err(PlanningError::from)
    }

    fn prepare(
        &self,
        node: LogicalNode,
        aliases: &mut AliasRegistry,
        filters: &BTreeMap<AliasId, Predicate>,
        fragments: &mut Vec<PathFragments>,
    ) -> PlanningResult<LogicalNode> {
        let LogicalNode { op, inputs } = node;
        let inputs = inputs
            .into_iter()
            .map(|input| self.prepare(input, aliases, filters, fragments))
            .collect::<PlanningResult<Vec<_>>>()?;
        let LogicalOp::Pattern(pattern) = op else {
            return Ok(LogicalNode::new(op, inputs));
        };
        let pattern = if self.config.split_path_expand {
            self.split_paths(&pattern, aliases, filters, fragments)?
        } else {
            pattern
        };
        let mut components = pattern.connected_components().into_iter();
        let first = components.next().ok_or(PatternError::EmptyPattern)?;
        let mut node = LogicalNode::pattern(first);
        for component in components {
            log::debug!("disconnected pattern, cross joining component {}", component);
            node = node.join(LogicalNode::pattern(component), JoinKind::Cross, Vec::new());
        }
        Ok(node)
    }

    /// Replace every fixed-length path of more than one hop by a chain of
    /// single-hop edges through fresh intermediate vertices
    fn split_paths(
        &self,
        pattern: &GraphPattern,
        aliases: &mut AliasRegistry,
        filters: &BTreeMap<AliasId, Predicate>,
        fragments: &mut Vec<PathFragments>,
    ) -> PlanningResult<GraphPattern> {
        let splittable = |hops: HopRange| hops.is_fixed() && hops.min > 1;
        if !pattern.edges().iter().any(|e| splittable(e.hops())) {
            return Ok(pattern.clone());
        }
        let mut out = GraphPattern::new();
        for vertex in pattern.vertices() {
            out.add_vertex(vertex.id(), vertex.labels().iter().copied())?;
        }
        for edge in pattern.edges() {
            let labels = edge.labels().iter().copied();
            if !splittable(edge.hops()) {
                out.add_path_edge(
                    edge.id(),
                    edge.src(),
                    edge.dst(),
                    labels,
                    edge.direction(),
                    edge.hops(),
                )?;
                continue;
            }
            let values = split_path_expand(
                edge.id(),
                edge.hops(),
                filters.get(&edge.id()).cloned(),
                aliases.generator_mut(),
            );
            let middle = self.intermediate_labels(edge.labels(), edge.direction());
            let mut previous = edge.src();
            for (i, value) in values.iter().enumerate() {
                let next = if i + 1 == values.len() {
                    edge.dst()
                } else {
                    let id = aliases.anonymous();
                    out.add_vertex(id, middle.iter().copied())?;
                    id
                };
                out.add_edge(
                    value.alias,
                    previous,
                    next,
                    edge.labels().iter().copied(),
                    edge.direction(),
                )?;
                previous = next;
            }
            log::debug!("split path {} into {} hops", edge.id(), values.len());
            fragments.push(PathFragments {
                path_alias: edge.id(),
                values,
            });
        }
        Ok(out)
    }

    /// Labels a vertex inside a path over `edge_labels` can carry. Empty
    /// means unconstrained.
    fn intermediate_labels(
        &self,
        edge_labels: &BTreeSet<LabelId>,
        direction: PatternDirection,
    ) -> BTreeSet<LabelId> {
        if edge_labels.is_empty() {
            return BTreeSet::new();
        }
        let types: Vec<_> = self
            .meta
            .schema()
            .edge_types()
            .iter()
            .filter(|e| edge_labels.contains(&e.label_id))
            .collect();
        let sources: BTreeSet<LabelId> = types.iter().map(|e| e.src_label_id).collect();
        let targets: BTreeSet<LabelId> = types.iter().map(|e| e.dst_label_id).collect();
        match direction {
            // an inner vertex is entered by one hop and left by the next
            PatternDirection::Out | PatternDirection::In => {
                sources.intersection(&targets).copied().collect()
            }
            PatternDirection::Both => sources.union(&targets).copied().collect(),
        }
    }
}

fn contains_procedure_call(node: &LogicalNode) -> bool {
    matches!(node.op, LogicalOp::ProcedureCall { .. })
        || node.inputs.iter().any(contains_procedure_call)
}

fn literal_fits(literal: &Literal, data_type: DataType) -> bool {
    match literal {
        Literal::Null => true,
        Literal::Bool(_) => data_type == DataType::Boolean,
        Literal::Int(_) => matches!(
            data_type,
            DataType::Integer | DataType::Long | DataType::Float | DataType::Double
        ),
        Literal::Float(_) => matches!(data_type, DataType::Float | DataType::Double),
        Literal::String(_) => data_type == DataType::String,
    }
}

fn column_kinds(root: &LogicalNode) -> BTreeMap<AliasId, ColumnKind> {
    let mut kinds = BTreeMap::new();
    root.for_each_pattern(&mut |pattern| {
        for vertex in pattern.vertices() {
            kinds.insert(vertex.id(), ColumnKind::Vertex);
        }
        for edge in pattern.edges() {
            let kind = if edge.hops().is_single_hop() {
                ColumnKind::Edge
            } else {
                ColumnKind::Path
            };
            kinds.insert(edge.id(), kind);
        }
    });
    kinds
}

fn resolve_outputs(
    outputs: Vec<AliasId>,
    aliases: &AliasRegistry,
    kinds: &BTreeMap<AliasId, ColumnKind>,
) -> Vec<AliasId> {
    if !outputs.is_empty() {
        return outputs;
    }
    let tagged: Vec<AliasId> = aliases.tagged().map(|(id, _)| id).collect();
    if !tagged.is_empty() {
        return tagged;
    }
    kinds
        .iter()
        .filter(|(_, kind)| **kind == ColumnKind::Vertex)
        .map(|(id, _)| *id)
        .collect()
}

/// Walks class winners from the root and builds physical nodes
struct PlanExtractor<'a> {
    memo: &'a Memo,
    model: &'a CostModel<'a>,
    filters: &'a BTreeMap<AliasId, Predicate>,
    aliases: &'a mut AliasIdGenerator,
}

impl<'a> PlanExtractor<'a> {
    fn extract(&mut self, group: GroupId) -> PlanningResult<PhysicalNode> {
        let memo = self.memo;
        let class = memo.group(group);
        let winner = class.best().copied().ok_or_else(|| {
            PlanningError::NoFeasiblePlan(format!("class {} has no costed member", group))
        })?;
        let expr = memo.expr(winner.expr);
        let inputs = expr
            .inputs
            .iter()
            .map(|input| self.extract(*input))
            .collect::<PlanningResult<Vec<_>>>()?;
        let op = self.physical_op(&expr.op)?;
        let id = self.aliases.next_alias_id();
        Ok(PhysicalNode {
            id,
            op,
            inputs,
            estimated_rows: class.rows(),
            cost: winner.cost,
        })
    }

    fn expand(&self, pattern: &GraphPattern, edge: &ExtendEdge) -> PhysicalExpand {
        PhysicalExpand {
            edge: edge.edge,
            from: edge.from,
            direction: edge.direction,
            labels: edge.labels.clone(),
            hops: edge.hops,
            access: self.model.access_path(pattern, edge),
            filter: self.filters.get(&edge.edge).cloned(),
        }
    }

    fn physical_op(&self, op: &LogicalOp) -> PlanningResult<PhysicalOp> {
        let physical = match op {
            LogicalOp::Pattern(pattern) => {
                let vertex = match pattern.vertices() {
                    [vertex] => vertex,
                    _ => return Err(PlanningError::NoFeasiblePlan(pattern.to_string())),
                };
                let loops = pattern
                    .edges()
                    .iter()
                    .map(|edge| PhysicalExpand {
                        edge: edge.id(),
                        from: vertex.id(),
                        direction: edge.direction(),
                        labels: edge.labels().clone(),
                        hops: edge.hops(),
                        access: AccessPath::Adjacency,
                        filter: self.filters.get(&edge.id()).cloned(),
                    })
                    .collect();
                PhysicalOp::Scan {
                    alias: vertex.id(),
                    labels: vertex.labels().clone(),
                    loops,
                }
            }
            LogicalOp::ExtendIntersect(ei) => PhysicalOp::ExpandIntersect {
                target: ei.step.target,
                target_labels: ei.step.target_labels.clone(),
                edges: ei
                    .step
                    .edges
                    .iter()
                    .map(|edge| self.expand(&ei.pattern, edge))
                    .collect(),
            },
            LogicalOp::Join { kind, keys } => PhysicalOp::HashJoin {
                kind: *kind,
                keys: keys.clone(),
            },
            LogicalOp::Filter(predicate) => PhysicalOp::Filter(predicate.clone()),
            LogicalOp::Aggregate { keys, calls } => PhysicalOp::Aggregate {
                keys: keys.clone(),
                calls: calls.clone(),
            },
            LogicalOp::Sort { keys, limit } => PhysicalOp::Sort {
                keys: keys.clone(),
                limit: *limit,
            },
            LogicalOp::Project { columns } => PhysicalOp::Project {
                columns: columns.clone(),
            },
            LogicalOp::Union { all } => PhysicalOp::Union { all: *all },
            LogicalOp::ProcedureCall { .. } | LogicalOp::Other { .. } => {
                return Err(PlanningError::InvalidQuery(format!(
                    "{} cannot be planned inside a query",
                    op.kind()
                )))
            }
        };
        Ok(physical)
    }
}

/// Metadata and catalogue that are published together
#[derive(Debug, Clone)]
pub struct PlannerSnapshot {
    pub meta: Arc<IrMeta>,
    pub glogue: Arc<Glogue>,
}

/// Shared planner front end. Compilations run concurrently, each against
/// the snapshot current when it started.
#[derive(Debug)]
pub struct PlannerService {
    current: SnapshotCell<PlannerSnapshot>,
    publish_lock: Mutex<()>,
    config: PlannerConfig,
}

impl PlannerService {
    pub fn new(meta: IrMeta, glogue: Glogue, config: PlannerConfig) -> Self {
        Self {
            current: SnapshotCell::new(PlannerSnapshot {
                meta: Arc::new(meta),
                glogue: Arc::new(glogue),
            }),
            publish_lock: Mutex::new(()),
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn snapshot(&self) -> Arc<PlannerSnapshot> {
        self.current.load()
    }

    /// Publish new metadata, keeping the current catalogue. Returns the
    /// snapshot that was replaced.
    pub fn publish_meta(&self, meta: IrMeta) -> Arc<PlannerSnapshot> {
        let _guard = self.publish_lock.lock();
        let current = self.current.load();
        log::info!(
            "publishing metadata for graph {} at snapshot {}",
            meta.graph_id(),
            meta.snapshot_id()
        );
        self.current.publish(PlannerSnapshot {
            meta: Arc::new(meta),
            glogue: Arc::clone(&current.glogue),
        })
    }

    /// Publish a refreshed catalogue, keeping the current metadata
    pub fn publish_glogue(&self, glogue: Glogue) -> Arc<PlannerSnapshot> {
        let _guard = self.publish_lock.lock();
        let current = self.current.load();
        log::info!("publishing catalogue with {} entries", glogue.len());
        self.current.publish(PlannerSnapshot {
            meta: Arc::clone(&current.meta),
            glogue: Arc::new(glogue),
        })
    }

    /// Planner bound to the current snapshot
    pub fn planner(&self) -> GraphPlanner {
        let snapshot = self.current.load();
        GraphPlanner {
            meta: Arc::clone(&snapshot.meta),
            glogue: Arc::clone(&snapshot.glogue),
            config: self.config.clone(),
        }
    }

    pub fn compile(&self, query: QueryIr) -> PlanningResult<CompiledPlan> {
        self.planner().compile(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_binds_tags_in_order() {
        let mut builder = QueryBuilder::new();
        let pattern = builder
            .pattern(|p| {
                p.vertex("a", [1])?;
                p.vertex("b", [1])?;
                p.tagged_edge("e", "a", "b", [5], PatternDirection::Out)?;
                p.vertex("a", [1])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(pattern.vertex_count(), 2);
        assert_eq!(builder.alias("a"), 0);
        assert_eq!(builder.alias("e"), 2);
        builder.returning(&["b"]).unwrap();
        assert!(builder.returning(&["zzz"]).is_err());
        let ir = builder.finish(pattern);
        assert_eq!(ir.outputs, vec![1]);
    }

    #[test]
    fn test_unknown_endpoint_tag() {
        let mut builder = QueryBuilder::new();
        let result = builder.pattern(|p| {
            p.vertex("a", [1])?;
            p.edge("a", "nope", [5], PatternDirection::Out)?;
            Ok(())
        });
        assert_eq!(result.unwrap_err(), PatternError::UnknownTag("nope".into()));
        assert_eq!(
            builder.pattern(|_| Ok(())).unwrap_err(),
            PatternError::EmptyPattern
        );
    }

    #[test]
    fn test_ir_from_foreign_aliases() {
        let mut p = GraphPattern::new();
        p.add_vertex(4, [1]).unwrap();
        p.add_vertex(9, [1]).unwrap();
        p.add_edge(12, 4, 9, [5], PatternDirection::Out).unwrap();
        let mut ir = QueryIr::new(LogicalNode::pattern(p)).bind_tag("x", 4);
        assert_eq!(ir.aliases.anonymous(), 13);
        assert_eq!(ir.aliases.lookup("x"), Some(4));
    }

    #[test]
    fn test_literal_types() {
        assert!(literal_fits(&Literal::Int(1), DataType::Long));
        assert!(!literal_fits(&Literal::Float(1.0), DataType::Integer));
        assert!(literal_fits(&Literal::Null, DataType::String));
        assert!(!literal_fits(&Literal::String("x".into()), DataType::Boolean));
    }
}

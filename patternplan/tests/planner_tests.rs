//! Planner integration tests
//!
//! Compiles queries against the social-network fixture and checks the shape,
//! estimates and metadata of the resulting physical plans.

#[path = "testutils/mod.rs"]
mod testutils;

use patternplan::meta::MetaError;
use patternplan::pattern::{Literal, Predicate};
use patternplan::plan::{
    AccessPath, AggregateCall, AggregateFn, ColumnKind, CompiledPlan, EstimationError, JoinKind,
    PhysicalNode, PhysicalOp,
};
use patternplan::{
    AliasId, CostStrategy, Glogue, GraphPlanner, HopRange, LogicalNode, LogicalOp, PatternDirection,
    PlannerConfig, PlannerService, PlanningError, QueryBuilder, QueryIr,
};
use std::sync::Arc;
use testutils::fixture::*;

fn two_hop_query() -> QueryIr {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            p.vertex("b", [PERSON])?;
            p.vertex("c", [PERSON])?;
            p.edge("a", "b", [KNOWS], PatternDirection::Out)?;
            p.edge("b", "c", [KNOWS], PatternDirection::Out)?;
            Ok(())
        })
        .expect("two-hop pattern");
    builder.finish(pattern)
}

fn lives_in_query() -> QueryIr {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("p", [PERSON])?;
            p.vertex("c", [CITY])?;
            p.edge("p", "c", [LIVES_IN], PatternDirection::Out)?;
            Ok(())
        })
        .expect("lives_in pattern");
    builder.finish(pattern)
}

fn nodes(compiled: &CompiledPlan) -> Vec<&PhysicalNode> {
    let mut out = Vec::new();
    compiled.plan.root.walk(&mut |node| out.push(node));
    out
}

fn procedure_query(name: &str, args: Vec<Literal>) -> QueryIr {
    QueryIr::new(LogicalNode::leaf(LogicalOp::ProcedureCall {
        name: name.to_string(),
        args,
    }))
}

#[test]
fn test_two_hop_plan() {
    init_logging();
    let planner = planner(PlannerConfig::default());
    let compiled = planner.compile(two_hop_query()).expect("compile two-hop");

    assert!(compiled.verify());
    assert_eq!(compiled.plan.graph_id, "social");
    assert_eq!(compiled.plan.snapshot_id, 42);
    assert_eq!(compiled.plan.root.estimated_rows, Some(50_000.0));
    assert!(!compiled.cost.is_infinite());
    assert!(compiled.stats.rule_applications > 0);
    assert!(compiled.stats.groups > 1);

    // leaves scan, everything above them expands, intersects or joins
    for node in nodes(&compiled) {
        if node.inputs.is_empty() {
            assert!(matches!(node.op, PhysicalOp::Scan { .. }), "leaf {}", node.op.name());
        } else {
            assert!(
                matches!(
                    node.op,
                    PhysicalOp::ExpandIntersect { .. } | PhysicalOp::HashJoin { .. }
                ),
                "inner {}",
                node.op.name()
            );
        }
    }

    let names: Vec<_> = compiled.schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(compiled
        .schema
        .columns
        .iter()
        .all(|c| c.kind == ColumnKind::Vertex));
    assert_eq!(compiled.plan.outputs, vec![0, 1, 2]);
}

#[test]
fn test_node_ids_follow_post_order() {
    let compiled = planner(PlannerConfig::default())
        .compile(two_hop_query())
        .unwrap();
    let ids: Vec<AliasId> = nodes(&compiled).iter().map(|n| n.id).collect();
    // a, b, c and the two knows edges hold aliases 0..=4
    let first = 5;
    let expected: Vec<AliasId> = (first..first + ids.len() as AliasId).collect();
    assert_eq!(ids, expected);
    assert_eq!(compiled.plan.root.id, *expected.last().unwrap());
}

#[test]
fn test_procedure_node_id_follows_result_columns() {
    let compiled = planner(PlannerConfig::default())
        .compile(procedure_query("friends_of", vec![Literal::Int(7)]))
        .unwrap();
    let columns: Vec<AliasId> = compiled.schema.columns.iter().map(|c| c.alias).collect();
    assert_eq!(columns, vec![0, 1]);
    assert_eq!(compiled.plan.root.id, 2);
}

#[test]
fn test_compilation_is_deterministic() {
    let planner = planner(PlannerConfig::default());
    let first = planner.compile(two_hop_query()).unwrap();
    let second = planner.compile(two_hop_query()).unwrap();
    assert_eq!(first.payload, second.payload);
    assert_eq!(first.checksum, second.checksum);
    assert_eq!(first.stats, second.stats);
}

#[test]
fn test_payload_decodes_to_plan() {
    let compiled = planner(PlannerConfig::default())
        .compile(two_hop_query())
        .unwrap();
    let decoded = CompiledPlan::decode(&compiled.payload, compiled.checksum).unwrap();
    assert_eq!(decoded, compiled.plan);

    let err = CompiledPlan::decode(&compiled.payload, compiled.checksum ^ 1).unwrap_err();
    assert!(matches!(err, PlanningError::Serialization(_)));
}

#[test]
fn test_foreign_key_expansion_is_preferred() {
    init_logging();
    let compiled = planner(PlannerConfig::default())
        .compile(lives_in_query())
        .unwrap();
    assert_eq!(compiled.plan.root.estimated_rows, Some(10_000.0));

    match &compiled.plan.root.op {
        PhysicalOp::ExpandIntersect { target, edges, .. } => {
            assert_eq!(*target, 1, "expected the city to be expanded into");
            assert_eq!(edges.len(), 1);
            assert_eq!(edges[0].from, 0);
            assert_eq!(edges[0].direction, PatternDirection::Out);
            match &edges[0].access {
                AccessPath::ForeignKey(keys) => assert_eq!(keys[0].property, "city_id"),
                other => panic!("expected foreign key access, got {:?}", other),
            }
        }
        other => panic!("unexpected root {:?}", other),
    }
}

#[test]
fn test_adjacency_expansion_without_foreign_keys() {
    let planner = GraphPlanner::new(meta(false), Arc::new(glogue()), PlannerConfig::default());
    let compiled = planner.compile(lives_in_query()).unwrap();

    match &compiled.plan.root.op {
        PhysicalOp::ExpandIntersect { target, edges, .. } => {
            assert_eq!(*target, 0, "expected the person to be expanded into");
            assert_eq!(edges[0].direction, PatternDirection::In);
            assert_eq!(edges[0].access, AccessPath::Adjacency);
        }
        other => panic!("unexpected root {:?}", other),
    }
}

/// `(a)-[k1:knows]->(b)-[k2:knows]->(c)` with an equality filter on `filtered`
fn filtered_two_hop_query(filtered: Option<&str>) -> QueryIr {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            p.vertex("b", [PERSON])?;
            p.vertex("c", [PERSON])?;
            let k1 = p.tagged_edge("k1", "a", "b", [KNOWS], PatternDirection::Out)?;
            let k2 = p.tagged_edge("k2", "b", "c", [KNOWS], PatternDirection::Out)?;
            if let Some(tag) = filtered {
                let edge = if tag == "k1" { k1 } else { k2 };
                p.filter_edge(tag, Predicate::equals(edge, "since", Literal::Int(2020)))?;
            }
            Ok(())
        })
        .expect("filtered two-hop pattern");
    builder.finish(pattern)
}

fn root_target(compiled: &CompiledPlan) -> i32 {
    match &compiled.plan.root.op {
        PhysicalOp::ExpandIntersect { target, .. } => *target,
        other => panic!("expected an expansion at the root, got {}", other.name()),
    }
}

#[test]
fn test_edge_filter_shapes_estimates_and_extend_order() {
    init_logging();
    // extend-only plans, so the last expansion shows the chosen order
    let planner = planner(PlannerConfig {
        enable_pattern_join: false,
        ..PlannerConfig::default()
    });

    let plain = planner.compile(filtered_two_hop_query(None)).unwrap();
    let near = planner.compile(filtered_two_hop_query(Some("k1"))).unwrap();
    let far = planner.compile(filtered_two_hop_query(Some("k2"))).unwrap();

    assert_eq!(plain.plan.root.estimated_rows, Some(50_000.0));
    for filtered in [&near, &far] {
        let rows = filtered.plan.root.estimated_rows.unwrap();
        assert!((rows - 7_500.0).abs() < 1e-6, "got {}", rows);
        assert!(filtered.cost.total < plain.cost.total);
    }

    // the filtered edge is expanded first, the unfiltered one last
    assert_eq!(root_target(&near), 2);
    assert_eq!(root_target(&far), 0);
}

#[test]
fn test_fixed_length_path_is_split() {
    let mut builder = QueryBuilder::new();
    // a = 0, b = 1, k = 2
    let recent = Predicate::equals(2, "since", Literal::Int(2020));
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            p.vertex("b", [PERSON])?;
            p.path(
                "k",
                "a",
                "b",
                [KNOWS],
                PatternDirection::Out,
                HopRange::new(3, 3),
            )?;
            p.filter_edge("k", recent.clone())?;
            Ok(())
        })
        .unwrap();
    let path_alias = builder.alias("k");
    let compiled = planner(PlannerConfig::default())
        .compile(builder.finish(pattern))
        .unwrap();

    assert_eq!(compiled.plan.fragments.len(), 1);
    let fragments = &compiled.plan.fragments[0];
    assert_eq!(fragments.path_alias, path_alias);
    assert_eq!(fragments.values.len(), 3);
    assert_eq!(path_alias, 2);
    for value in &fragments.values {
        assert_eq!(value.parent_alias, Some(path_alias));
        // each hop filters on its own fragment alias
        assert_eq!(
            value.filter.as_ref(),
            Some(&Predicate::equals(value.alias, "since", Literal::Int(2020)))
        );
    }

    // every fragment is expanded exactly once, carrying its own filter
    let mut expanded = Vec::new();
    for node in nodes(&compiled) {
        if let PhysicalOp::ExpandIntersect { edges, .. } = &node.op {
            expanded.extend(edges.iter().map(|e| (e.edge, e.filter.clone())));
        }
    }
    expanded.sort_by_key(|(edge, _)| *edge);
    let mut fragment_aliases: Vec<_> = fragments.values.iter().map(|v| v.alias).collect();
    fragment_aliases.sort_unstable();
    assert_eq!(
        expanded.iter().map(|(edge, _)| *edge).collect::<Vec<_>>(),
        fragment_aliases
    );
    assert!(expanded.iter().all(|(edge, filter)| {
        filter.as_ref() == Some(&recent.rebind(path_alias, *edge))
    }));

    let column = compiled.schema.column(path_alias).unwrap();
    assert_eq!(column.kind, ColumnKind::Path);
    assert_eq!(column.name, "k");
}

#[test]
fn test_variable_length_path_is_not_split() {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            p.vertex("b", [PERSON])?;
            p.path(
                "k",
                "a",
                "b",
                [KNOWS],
                PatternDirection::Out,
                HopRange::new(1, 3),
            )?;
            Ok(())
        })
        .unwrap();
    let compiled = planner(PlannerConfig::default())
        .compile(builder.finish(pattern))
        .unwrap();
    assert!(compiled.plan.fragments.is_empty());

    let hops: Vec<HopRange> = nodes(&compiled)
        .iter()
        .filter_map(|node| match &node.op {
            PhysicalOp::ExpandIntersect { edges, .. } => Some(edges[0].hops),
            _ => None,
        })
        .collect();
    assert_eq!(hops, vec![HopRange::new(1, 3)]);
}

#[test]
fn test_disconnected_pattern_cross_joins() {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            p.vertex("x", [CITY])?;
            Ok(())
        })
        .unwrap();
    let compiled = planner(PlannerConfig::default())
        .compile(builder.finish(pattern))
        .unwrap();

    let root = &compiled.plan.root;
    assert_eq!(
        root.op,
        PhysicalOp::HashJoin {
            kind: JoinKind::Cross,
            keys: Vec::new()
        }
    );
    assert_eq!(root.inputs.len(), 2);
    assert_eq!(root.estimated_rows, Some(1_000_000.0));
    assert!(root
        .inputs
        .iter()
        .all(|input| matches!(input.op, PhysicalOp::Scan { .. })));
}

#[test]
fn test_filter_and_aggregate_wrap_the_pattern() {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            p.vertex("b", [PERSON])?;
            p.vertex("c", [PERSON])?;
            p.edge("a", "b", [KNOWS], PatternDirection::Out)?;
            p.edge("b", "c", [KNOWS], PatternDirection::Out)?;
            Ok(())
        })
        .unwrap();
    let a = builder.alias("a");
    let count = builder.alias("cnt");
    builder.returning(&["cnt"]).unwrap();
    let root = LogicalNode::pattern(pattern)
        .filter(Predicate::equals(a, "name", Literal::String("Ann".into())))
        .aggregate(
            Vec::new(),
            vec![AggregateCall {
                func: AggregateFn::Count,
                input: None,
                output: count,
            }],
        );
    let compiled = planner(PlannerConfig::default())
        .compile(builder.finish(root))
        .unwrap();

    let root = &compiled.plan.root;
    assert!(matches!(root.op, PhysicalOp::Aggregate { .. }));
    assert_eq!(root.estimated_rows, Some(1.0));
    let filter = &root.inputs[0];
    assert!(matches!(filter.op, PhysicalOp::Filter(_)));
    let filtered = filter.estimated_rows.unwrap();
    assert!(filtered > 0.0 && filtered < 50_000.0);
    assert_eq!(filter.inputs[0].estimated_rows, Some(50_000.0));

    assert_eq!(compiled.schema.columns.len(), 1);
    assert_eq!(compiled.schema.columns[0].name, "cnt");
    assert_eq!(compiled.schema.columns[0].kind, ColumnKind::Value);
}

#[test]
fn test_procedure_call_bypasses_search() {
    let compiled = planner(PlannerConfig::default())
        .compile(procedure_query("friends_of", vec![Literal::Int(7)]))
        .unwrap();

    assert_eq!(
        compiled.plan.root.op,
        PhysicalOp::ProcedureCall {
            name: "friends_of".into(),
            args: vec![Literal::Int(7)],
        }
    );
    assert_eq!(compiled.stats, Default::default());
    assert_eq!(compiled.cost.total, 0.0);
    let names: Vec<_> = compiled.schema.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["friendId", "friendName"]);
    assert_eq!(compiled.plan.outputs.len(), 2);
    assert!(compiled.schema_json().unwrap().contains("friendName"));
}

#[test]
fn test_procedure_call_argument_checks() {
    let planner = planner(PlannerConfig::default());

    let err = planner
        .compile(procedure_query(
            "friends_of",
            vec![Literal::String("seven".into())],
        ))
        .unwrap_err();
    assert!(matches!(err, PlanningError::InvalidQuery(ref m) if m.contains("personId")));

    let err = planner
        .compile(procedure_query("friends_of", Vec::new()))
        .unwrap_err();
    assert!(matches!(err, PlanningError::InvalidQuery(_)));

    let err = planner
        .compile(procedure_query("no_such_procedure", Vec::new()))
        .unwrap_err();
    assert!(matches!(err, PlanningError::InvalidQuery(ref m) if m.contains("no_such_procedure")));
}

#[test]
fn test_nested_procedure_call_is_rejected() {
    let call = LogicalNode::leaf(LogicalOp::ProcedureCall {
        name: "friends_of".into(),
        args: vec![Literal::Int(7)],
    });
    let query = QueryIr::new(call.project(Vec::new()));
    let err = planner(PlannerConfig::default())
        .compile(query)
        .unwrap_err();
    assert!(matches!(err, PlanningError::InvalidQuery(_)));
}

#[test]
fn test_unknown_label_is_reported() {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            p.vertex("b", [99])?;
            p.edge("a", "b", [KNOWS], PatternDirection::Out)?;
            Ok(())
        })
        .unwrap();
    let err = planner(PlannerConfig::default())
        .compile(builder.finish(pattern))
        .unwrap_err();
    match err {
        PlanningError::Meta(MetaError::UnknownLabel(message)) => assert!(message.contains("99")),
        other => panic!("expected unknown label, got {:?}", other),
    }
}

#[test]
fn test_unsupported_operator_is_unestimable() {
    let mut builder = QueryBuilder::new();
    let pattern = builder
        .pattern(|p| {
            p.vertex("a", [PERSON])?;
            Ok(())
        })
        .unwrap();
    let root = LogicalNode::new(
        LogicalOp::Other {
            kind: "window".into(),
        },
        vec![LogicalNode::pattern(pattern)],
    );
    let err = planner(PlannerConfig::default())
        .compile(builder.finish(root))
        .unwrap_err();
    assert!(matches!(
        err,
        PlanningError::Estimation(EstimationError::Unestimable { ref kind, .. }) if kind == "window"
    ));
}

#[test]
fn test_estimate_without_search() {
    let planner = planner(PlannerConfig::default());
    let rows = planner
        .estimate(&LogicalNode::pattern(knows_two_hop(5)))
        .unwrap();
    assert_eq!(rows, 50_000.0);
}

#[test]
fn test_exhaustive_strategy_matches_pruning() {
    let pruning = planner(PlannerConfig::default())
        .compile(two_hop_query())
        .unwrap();
    let exhaustive = planner(PlannerConfig::default().with_strategy(CostStrategy::Exhaustive))
        .compile(two_hop_query())
        .unwrap();
    assert_eq!(pruning.payload, exhaustive.payload);
    assert_eq!(pruning.cost, exhaustive.cost);
    assert_eq!(exhaustive.stats.pruned_exprs, 0);
}

#[test]
fn test_service_publishes_new_snapshots() {
    init_logging();
    let service = PlannerService::new(meta(true), glogue(), PlannerConfig::default());
    let before = service.compile(two_hop_query()).unwrap();
    assert_eq!(before.plan.snapshot_id, 42);

    let next = service.snapshot().meta.at_snapshot(43);
    let previous = service.publish_meta(next);
    assert_eq!(previous.meta.snapshot_id(), 42);
    let after = service.compile(two_hop_query()).unwrap();
    assert_eq!(after.plan.snapshot_id, 43);
    assert_eq!(after.plan.root.estimated_rows, Some(50_000.0));

    let previous = service.publish_glogue(Glogue::empty());
    assert_eq!(previous.glogue.len(), glogue().len());
    let blind = service.compile(two_hop_query()).unwrap();
    assert_eq!(
        blind.plan.root.estimated_rows,
        Some(service.config().unknown_row_count)
    );
}

#[test]
fn test_service_compiles_during_publication() {
    let service = PlannerService::new(meta(true), glogue(), PlannerConfig::default());
    std::thread::scope(|scope| {
        let readers: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    (0..5)
                        .map(|_| service.compile(two_hop_query()).unwrap().plan.snapshot_id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        for snapshot in 43..48 {
            let meta = service.snapshot().meta.at_snapshot(snapshot);
            service.publish_meta(meta);
        }
        for reader in readers {
            for snapshot in reader.join().unwrap() {
                assert!((42..48).contains(&snapshot));
            }
        }
    });
    assert_eq!(service.snapshot().meta.snapshot_id(), 47);
}

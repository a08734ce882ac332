//! Social network fixture: persons who know each other, live in cities and
//! like posts

use patternplan::glogue::Glogue;
use patternplan::meta::{
    EdgeTypeId, ForeignKeyMeta, GraphSchema, IrMeta, StoredProcedureMeta, StoredProcedures,
};
use patternplan::{GraphPattern, LabelId, PatternDirection, PlannerConfig};
use patternplan::plan::GraphPlanner;
use std::sync::Arc;

pub const PERSON: LabelId = 1;
pub const CITY: LabelId = 2;
pub const POST: LabelId = 3;

pub const KNOWS: LabelId = 11;
pub const LIVES_IN: LabelId = 12;
pub const LIKES: LabelId = 13;
pub const HAS_CREATOR: LabelId = 14;

pub const SCHEMA_JSON: &str = r#"{
    "version": 1,
    "vertex_types": [
        {"label": "person", "label_id": 1,
         "properties": [{"name": "id", "type": "LONG"},
                        {"name": "name", "type": "STRING"},
                        {"name": "city_id", "type": "LONG"}],
         "primary_keys": ["id"]},
        {"label": "city", "label_id": 2,
         "properties": [{"name": "id", "type": "LONG"}],
         "primary_keys": ["id"]},
        {"label": "post", "label_id": 3,
         "properties": [{"name": "id", "type": "LONG"},
                        {"name": "length", "type": "INTEGER"}],
         "primary_keys": ["id"]}
    ],
    "edge_types": [
        {"label": "knows", "label_id": 11, "src_label_id": 1, "dst_label_id": 1},
        {"label": "lives_in", "label_id": 12, "src_label_id": 1, "dst_label_id": 2},
        {"label": "likes", "label_id": 13, "src_label_id": 1, "dst_label_id": 3},
        {"label": "has_creator", "label_id": 14, "src_label_id": 3, "dst_label_id": 1}
    ]
}"#;

pub const FOREIGN_KEYS_JSON: &str = r#"{
    "entries": [
        {"edge": {"src_label_id": 1, "dst_label_id": 2, "edge_label_id": 12},
         "keys": [{"label_id": 1, "property": "city_id"}]}
    ]
}"#;

pub const FRIENDS_OF_YAML: &str = r#"
name: friends_of
description: direct friends of a person
params:
  - name: personId
    type: LONG
returns:
  - name: friendId
    type: LONG
  - name: friendName
    type: STRING
"#;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn schema(with_foreign_keys: bool) -> GraphSchema {
    let schema = GraphSchema::from_json_str(SCHEMA_JSON).expect("fixture schema");
    if with_foreign_keys {
        schema.with_foreign_keys(
            ForeignKeyMeta::from_json_str(FOREIGN_KEYS_JSON).expect("fixture foreign keys"),
        )
    } else {
        schema
    }
}

pub fn procedures() -> StoredProcedures {
    let mut procedures = StoredProcedures::new();
    procedures
        .insert(StoredProcedureMeta::from_yaml_str(FRIENDS_OF_YAML).expect("fixture procedure"))
        .expect("unique procedure");
    procedures
}

pub fn meta(with_foreign_keys: bool) -> IrMeta {
    IrMeta::builder("social")
        .snapshot_id(42)
        .schema(schema(with_foreign_keys))
        .procedures(procedures())
        .build()
        .expect("fixture meta")
}

/// `(Person)-[:knows]->(Person)-[:knows]->(Person)` with the given aliases
pub fn knows_two_hop(first: i32) -> GraphPattern {
    let mut p = GraphPattern::new();
    p.add_vertex(first, [PERSON]).unwrap();
    p.add_vertex(first + 1, [PERSON]).unwrap();
    p.add_vertex(first + 2, [PERSON]).unwrap();
    p.add_edge(first + 3, first, first + 1, [KNOWS], PatternDirection::Out)
        .unwrap();
    p.add_edge(first + 4, first + 1, first + 2, [KNOWS], PatternDirection::Out)
        .unwrap();
    p
}

pub fn glogue() -> Glogue {
    Glogue::builder()
        .vertex_label(PERSON, 10_000.0)
        .vertex_label(CITY, 100.0)
        .vertex_label(POST, 100_000.0)
        .edge_type(EdgeTypeId::new(PERSON, PERSON, KNOWS), 1_000_000.0)
        .edge_type(EdgeTypeId::new(PERSON, CITY, LIVES_IN), 10_000.0)
        .edge_type(EdgeTypeId::new(PERSON, POST, LIKES), 500_000.0)
        .edge_type(EdgeTypeId::new(POST, PERSON, HAS_CREATOR), 100_000.0)
        .pattern(knows_two_hop(0), 50_000.0)
        .build()
        .expect("fixture catalogue")
}

pub fn planner(config: PlannerConfig) -> GraphPlanner {
    GraphPlanner::new(meta(true), Arc::new(glogue()), config)
}

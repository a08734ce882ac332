//! Metadata loading tests
//!
//! Schema, foreign key and stored procedure files read from disk, and the
//! combined IrMeta handle built from them.

#[path = "testutils/mod.rs"]
mod testutils;

use patternplan::meta::{
    DataType, EdgeTypeId, ForeignKeyMeta, IrMeta, MetaError, StoredProcedures,
};
use patternplan::GraphSchema;
use std::fs;
use std::io::Write;
use testutils::fixture::*;

fn write_temp(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_schema_and_foreign_keys_from_files() {
    init_logging();
    let schema_file = write_temp(SCHEMA_JSON);
    let fk_file = write_temp(FOREIGN_KEYS_JSON);

    let schema = GraphSchema::from_json_file(schema_file.path())
        .unwrap()
        .with_foreign_keys(ForeignKeyMeta::from_file(fk_file.path()).unwrap());

    assert_eq!(schema.version, 1);
    assert_eq!(schema.vertex_types().len(), 3);
    assert_eq!(schema.edge_types().len(), 4);
    assert_eq!(schema.vertex_type_by_id(CITY).unwrap().label, "city");

    let keys = schema
        .foreign_keys()
        .get_foreign_key_entry(&EdgeTypeId::new(PERSON, CITY, LIVES_IN))
        .unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].label_id, PERSON);
    assert_eq!(keys[0].property, "city_id");

    // knows has no foreign key
    assert!(schema
        .foreign_keys()
        .get_foreign_key_entry(&EdgeTypeId::new(PERSON, PERSON, KNOWS))
        .is_none());
}

#[test]
fn test_foreign_key_file_errors() {
    assert_eq!(
        ForeignKeyMeta::from_file("").unwrap_err(),
        MetaError::EmptyForeignKeyPath
    );

    let dir = tempfile::tempdir().unwrap();
    let err = ForeignKeyMeta::from_file(dir.path().join("missing.json")).unwrap_err();
    assert!(matches!(err, MetaError::FileRead { .. }));

    let broken = write_temp("{\"entries\": [");
    let err = ForeignKeyMeta::from_file(broken.path()).unwrap_err();
    match err {
        MetaError::Parse { path, .. } => {
            assert_eq!(path, broken.path().display().to_string())
        }
        other => panic!("expected parse error, got {:?}", other),
    }
}

#[test]
fn test_schema_rejects_duplicate_labels() {
    let json = r#"{"vertex_types": [
        {"label": "person", "label_id": 1},
        {"label": "person", "label_id": 2}
    ]}"#;
    let err = GraphSchema::from_json_str(json).unwrap_err();
    assert!(matches!(err, MetaError::Duplicate { .. }));
}

#[test]
fn test_procedure_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("friends_of.yaml"), FRIENDS_OF_YAML).unwrap();
    fs::write(
        dir.path().join("city_size.yml"),
        "name: city_size\nparams:\n  - name: cityId\n    type: long\nreturns:\n  - name: residents\n    type: INTEGER\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "not a procedure").unwrap();

    let procedures = StoredProcedures::load_dir(dir.path()).unwrap();
    assert_eq!(procedures.len(), 2);

    let friends = procedures.get("friends_of").unwrap();
    assert_eq!(friends.params.len(), 1);
    assert_eq!(friends.params[0].data_type, DataType::Long);
    let returns: Vec<_> = friends.returns.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(returns, vec!["friendId", "friendName"]);

    let city_size = procedures.get("city_size").unwrap();
    assert_eq!(city_size.params[0].data_type, DataType::Long);
    assert_eq!(city_size.returns[0].data_type, DataType::Integer);
}

#[test]
fn test_procedure_with_unsupported_type() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("recent.yaml"),
        "name: recent_posts\nparams:\n  - name: maxDate\n    type: DATE\n",
    )
    .unwrap();

    let err = StoredProcedures::load_dir(dir.path()).unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, MetaError::UnsupportedType { .. }));
    assert!(message.contains("maxDate"), "{}", message);
    assert!(message.contains("DATE"), "{}", message);
    assert!(message.contains("recent_posts"), "{}", message);
}

#[test]
fn test_duplicate_procedure_names() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.yaml"), FRIENDS_OF_YAML).unwrap();
    fs::write(dir.path().join("b.yaml"), FRIENDS_OF_YAML).unwrap();
    let err = StoredProcedures::load_dir(dir.path()).unwrap_err();
    assert!(matches!(err, MetaError::Duplicate { kind: "procedure", .. }));
}

#[test]
fn test_missing_procedure_directory() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("procedures");
    let err = StoredProcedures::load_dir(&missing).unwrap_err();
    assert_eq!(
        err,
        MetaError::MissingProcedureDirectory(missing.display().to_string())
    );
}

#[test]
fn test_ir_meta_builder() {
    let meta = meta(true);
    assert_eq!(meta.graph_id(), "social");
    assert_eq!(meta.snapshot_id(), 42);
    assert!(meta.procedures().get("friends_of").is_some());
    assert_eq!(meta.schema().foreign_keys().len(), 1);

    let next = meta.at_snapshot(43);
    assert_eq!(next.snapshot_id(), 43);
    assert_eq!(next.graph_id(), "social");
    // the schema is shared, not copied
    assert!(std::ptr::eq(meta.schema(), next.schema()));

    let err = IrMeta::builder("social")
        .schema(schema(false))
        .build()
        .unwrap_err();
    assert!(matches!(err, MetaError::MissingComponent(_)));
}

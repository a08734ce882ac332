// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Versioned graph schema and foreign key metadata
//!
//! The schema describes vertex and edge types (label, label id, ordered
//! properties, primary keys). Edge types also carry source and destination
//! label ids. Foreign keys are loaded separately from a JSON file keyed by
//! `(src_label_id, dst_label_id, edge_label_id)`.

use super::error::{MetaError, MetaResult};
use crate::pattern::LabelId;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Property and parameter types understood by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    String,
    Integer,
    Boolean,
    Float,
    Double,
    Long,
}

impl FromStr for DataType {
    /// The unrecognised type string
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STRING" => Ok(DataType::String),
            "INTEGER" => Ok(DataType::Integer),
            "BOOLEAN" => Ok(DataType::Boolean),
            "FLOAT" => Ok(DataType::Float),
            "DOUBLE" => Ok(DataType::Double),
            "LONG" => Ok(DataType::Long),
            _ => Err(s.to_string()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::String => "STRING",
            DataType::Integer => "INTEGER",
            DataType::Boolean => "BOOLEAN",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Long => "LONG",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyMeta {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexTypeMeta {
    pub label: String,
    pub label_id: LabelId,
    #[serde(default)]
    pub properties: Vec<PropertyMeta>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeTypeMeta {
    pub label: String,
    pub label_id: LabelId,
    pub src_label_id: LabelId,
    pub dst_label_id: LabelId,
    #[serde(default)]
    pub properties: Vec<PropertyMeta>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
}

impl EdgeTypeMeta {
    pub fn type_id(&self) -> EdgeTypeId {
        EdgeTypeId::new(self.src_label_id, self.dst_label_id, self.label_id)
    }
}

/// Fully qualified edge type: source label, destination label, edge label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeTypeId {
    pub src_label_id: LabelId,
    pub dst_label_id: LabelId,
    pub edge_label_id: LabelId,
}

impl EdgeTypeId {
    pub fn new(src_label_id: LabelId, dst_label_id: LabelId, edge_label_id: LabelId) -> Self {
        Self {
            src_label_id,
            dst_label_id,
            edge_label_id,
        }
    }
}

/// A property of a vertex type referenced by an edge type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub label_id: LabelId,
    pub property: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ForeignKeyEntry {
    edge: EdgeTypeId,
    keys: Vec<ForeignKeyRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ForeignKeyFile {
    #[serde(default)]
    entries: Vec<ForeignKeyEntry>,
}

/// Foreign key references per edge type. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForeignKeyMeta {
    entries: HashMap<EdgeTypeId, Vec<ForeignKeyRef>>,
}

impl ForeignKeyMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load foreign keys from a JSON file. An empty path is an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> MetaResult<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(MetaError::EmptyForeignKeyPath);
        }
        let contents = fs::read_to_string(path).map_err(|e| MetaError::read(path.display(), e))?;
        let meta = Self::from_json_str(&contents).map_err(|e| match e {
            MetaError::Parse { message, .. } => MetaError::parse(path.display(), message),
            other => other,
        })?;
        log::info!(
            "loaded {} foreign key entries from {}",
            meta.len(),
            path.display()
        );
        Ok(meta)
    }

    pub fn from_json_str(json: &str) -> MetaResult<Self> {
        let file: ForeignKeyFile =
            serde_json::from_str(json).map_err(|e| MetaError::parse("foreign key json", e))?;
        let mut meta = Self::new();
        for entry in file.entries {
            meta.entries.entry(entry.edge).or_default().extend(entry.keys);
        }
        Ok(meta)
    }

    pub fn insert(&mut self, edge: EdgeTypeId, keys: Vec<ForeignKeyRef>) {
        self.entries.insert(edge, keys);
    }

    /// Foreign key references of an edge type, if it has any
    pub fn get_foreign_key_entry(&self, edge: &EdgeTypeId) -> Option<&[ForeignKeyRef]> {
        self.entries.get(edge).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Immutable, versioned graph schema
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSchema {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    vertex_types: Vec<VertexTypeMeta>,
    #[serde(default)]
    edge_types: Vec<EdgeTypeMeta>,
    #[serde(skip)]
    foreign_keys: ForeignKeyMeta,
}

impl GraphSchema {
    pub fn new(
        version: u64,
        vertex_types: Vec<VertexTypeMeta>,
        edge_types: Vec<EdgeTypeMeta>,
    ) -> MetaResult<Self> {
        let schema = Self {
            version,
            vertex_types,
            edge_types,
            foreign_keys: ForeignKeyMeta::new(),
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_str(json: &str) -> MetaResult<Self> {
        let schema: GraphSchema =
            serde_json::from_str(json).map_err(|e| MetaError::parse("schema json", e))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> MetaResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| MetaError::read(path.display(), e))?;
        let schema: GraphSchema =
            serde_json::from_str(&contents).map_err(|e| MetaError::parse(path.display(), e))?;
        schema.validate()?;
        log::info!(
            "loaded schema v{} ({} vertex types, {} edge types) from {}",
            schema.version,
            schema.vertex_types.len(),
            schema.edge_types.len(),
            path.display()
        );
        Ok(schema)
    }

    pub fn with_foreign_keys(mut self, foreign_keys: ForeignKeyMeta) -> Self {
        self.foreign_keys = foreign_keys;
        self
    }

    fn validate(&self) -> MetaResult<()> {
        let mut labels = HashSet::new();
        let mut ids = HashSet::new();
        for vertex in &self.vertex_types {
            if !labels.insert(vertex.label.as_str()) || !ids.insert(vertex.label_id) {
                return Err(MetaError::Duplicate {
                    kind: "vertex type",
                    name: vertex.label.clone(),
                });
            }
        }
        let mut edge_ids = HashSet::new();
        for edge in &self.edge_types {
            if !edge_ids.insert(edge.type_id()) {
                return Err(MetaError::Duplicate {
                    kind: "edge type",
                    name: edge.label.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn vertex_types(&self) -> &[VertexTypeMeta] {
        &self.vertex_types
    }

    pub fn edge_types(&self) -> &[EdgeTypeMeta] {
        &self.edge_types
    }

    pub fn vertex_type(&self, label: &str) -> Option<&VertexTypeMeta> {
        self.vertex_types.iter().find(|v| v.label == label)
    }

    pub fn vertex_type_by_id(&self, label_id: LabelId) -> Option<&VertexTypeMeta> {
        self.vertex_types.iter().find(|v| v.label_id == label_id)
    }

    /// All edge types with the given edge label (one per endpoint pair)
    pub fn edge_types_with_label(&self, label: &str) -> impl Iterator<Item = &EdgeTypeMeta> + '_ {
        let label = label.to_string();
        self.edge_types.iter().filter(move |e| e.label == label)
    }

    pub fn edge_type(&self, id: &EdgeTypeId) -> Option<&EdgeTypeMeta> {
        self.edge_types.iter().find(|e| e.type_id() == *id)
    }

    pub fn vertex_label_id(&self, label: &str) -> MetaResult<LabelId> {
        self.vertex_type(label)
            .map(|v| v.label_id)
            .ok_or_else(|| MetaError::UnknownLabel(label.to_string()))
    }

    pub fn edge_label_id(&self, label: &str) -> MetaResult<LabelId> {
        self.edge_types_with_label(label)
            .next()
            .map(|e| e.label_id)
            .ok_or_else(|| MetaError::UnknownLabel(label.to_string()))
    }

    pub fn foreign_keys(&self) -> &ForeignKeyMeta {
        &self.foreign_keys
    }

    /// Foreign key references of an edge type; `None` when the edge type
    /// has no entry
    pub fn get_foreign_key_entry(&self, edge: &EdgeTypeId) -> Option<&[ForeignKeyRef]> {
        self.foreign_keys.get_foreign_key_entry(edge)
    }
}

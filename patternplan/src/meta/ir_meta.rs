// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Metadata bundle handed to one compilation

use super::error::{MetaError, MetaResult};
use super::procedure::StoredProcedures;
use super::schema::GraphSchema;
use std::sync::Arc;

/// Graph id, snapshot id, schema and stored procedures of one consistent
/// graph version. Schema and procedures are always present.
#[derive(Debug, Clone)]
pub struct IrMeta {
    graph_id: String,
    snapshot_id: u64,
    schema: Arc<GraphSchema>,
    procedures: Arc<StoredProcedures>,
}

impl IrMeta {
    pub fn new(
        graph_id: impl Into<String>,
        snapshot_id: u64,
        schema: Arc<GraphSchema>,
        procedures: Arc<StoredProcedures>,
    ) -> Self {
        Self {
            graph_id: graph_id.into(),
            snapshot_id,
            schema,
            procedures,
        }
    }

    pub fn builder(graph_id: impl Into<String>) -> IrMetaBuilder {
        IrMetaBuilder {
            graph_id: graph_id.into(),
            snapshot_id: 0,
            schema: None,
            procedures: None,
        }
    }

    pub fn graph_id(&self) -> &str {
        &self.graph_id
    }

    pub fn snapshot_id(&self) -> u64 {
        self.snapshot_id
    }

    pub fn schema(&self) -> &GraphSchema {
        &self.schema
    }

    pub fn procedures(&self) -> &StoredProcedures {
        &self.procedures
    }

    /// Same metadata at a new snapshot id
    pub fn at_snapshot(&self, snapshot_id: u64) -> Self {
        Self {
            snapshot_id,
            ..self.clone()
        }
    }
}

/// Builder for [`IrMeta`] when components arrive separately, e.g. from
/// independent loaders. `build` fails if any component is missing.
#[derive(Debug)]
pub struct IrMetaBuilder {
    graph_id: String,
    snapshot_id: u64,
    schema: Option<Arc<GraphSchema>>,
    procedures: Option<Arc<StoredProcedures>>,
}

impl IrMetaBuilder {
    pub fn snapshot_id(mut self, snapshot_id: u64) -> Self {
        self.snapshot_id = snapshot_id;
        self
    }

    pub fn schema(mut self, schema: impl Into<Arc<GraphSchema>>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn procedures(mut self, procedures: impl Into<Arc<StoredProcedures>>) -> Self {
        self.procedures = Some(procedures.into());
        self
    }

    pub fn build(self) -> MetaResult<IrMeta> {
        let schema = self.schema.ok_or(MetaError::MissingComponent("schema"))?;
        let procedures = self
            .procedures
            .ok_or(MetaError::MissingComponent("stored procedures"))?;
        Ok(IrMeta::new(self.graph_id, self.snapshot_id, schema, procedures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_schema_and_procedures() {
        let err = IrMeta::builder("g")
            .procedures(StoredProcedures::new())
            .build()
            .unwrap_err();
        assert_eq!(err, MetaError::MissingComponent("schema"));

        let err = IrMeta::builder("g")
            .schema(GraphSchema::default())
            .build()
            .unwrap_err();
        assert_eq!(err, MetaError::MissingComponent("stored procedures"));

        let meta = IrMeta::builder("g")
            .snapshot_id(7)
            .schema(GraphSchema::default())
            .procedures(StoredProcedures::new())
            .build()
            .unwrap();
        assert_eq!(meta.graph_id(), "g");
        assert_eq!(meta.snapshot_id(), 7);
        assert_eq!(meta.at_snapshot(8).snapshot_id(), 8);
    }
}

// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema, foreign key and stored procedure metadata
//!
//! Metadata is consumed, not produced, by the planner. It is loaded once per
//! graph version and handed to compilations as an immutable [`IrMeta`].

pub mod error;
pub mod ir_meta;
pub mod procedure;
pub mod schema;
pub mod snapshot;

pub use error::{MetaError, MetaResult};
pub use ir_meta::{IrMeta, IrMetaBuilder};
pub use procedure::{ProcedureField, StoredProcedureMeta, StoredProcedures};
pub use schema::{
    DataType, EdgeTypeId, EdgeTypeMeta, ForeignKeyMeta, ForeignKeyRef, GraphSchema, PropertyMeta,
    VertexTypeMeta,
};
pub use snapshot::SnapshotCell;

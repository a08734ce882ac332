// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for pattern construction

use crate::alias::AliasId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PatternError {
    #[error("Vertex {0} already exists in pattern")]
    DuplicateVertex(AliasId),

    #[error("Edge {0} already exists in pattern")]
    DuplicateEdge(AliasId),

    #[error("Edge {edge} references unknown vertex {vertex}")]
    UnknownVertex { edge: AliasId, vertex: AliasId },

    #[error("Invalid hop range {min}..{max} on edge {edge}")]
    InvalidHopRange { edge: AliasId, min: u32, max: u32 },

    #[error("Unknown tag '{0}' in pattern")]
    UnknownTag(String),

    #[error("Pattern is empty")]
    EmptyPattern,
}

pub type PatternResult<T> = Result<T, PatternError>;

// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Planning errors

use crate::glogue::GlogueError;
use crate::meta::MetaError;
use crate::pattern::PatternError;
use thiserror::Error;

/// Row count dispatch failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EstimationError {
    #[error("Cannot estimate row count of {kind} node: {detail}")]
    Unestimable { kind: String, detail: String },

    #[error("No equivalence class registered for extend-intersect step producing {pattern}")]
    MissingEquivalenceClass { pattern: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanningError {
    #[error("Pattern error: {0}")]
    Pattern(#[from] PatternError),

    #[error("Metadata error: {0}")]
    Meta(#[from] MetaError),

    #[error("Catalogue error: {0}")]
    Catalogue(#[from] GlogueError),

    #[error("Estimation error: {0}")]
    Estimation(#[from] EstimationError),

    #[error("No feasible plan for {0}")]
    NoFeasiblePlan(String),

    #[error("Invalid query structure: {0}")]
    InvalidQuery(String),

    #[error("Plan serialization failed: {0}")]
    Serialization(String),
}

pub type PlanningResult<T> = Result<T, PlanningError>;
pub type EstimationResult<T> = Result<T, EstimationError>;

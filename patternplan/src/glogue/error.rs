// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for catalogue construction and loading

use crate::pattern::PatternError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlogueError {
    #[error("Failed to read catalogue {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse catalogue: {0}")]
    Parse(String),

    #[error("Invalid row count {count} for pattern {pattern}")]
    InvalidCount { pattern: String, count: f64 },

    #[error("Invalid catalogue pattern: {0}")]
    Pattern(#[from] PatternError),
}

pub type GlogueResult<T> = Result<T, GlogueError>;

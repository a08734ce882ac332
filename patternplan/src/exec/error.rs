// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution boundary error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Failure reported by the execution engine; not retried here
    #[error("Execution engine returned status {code}: {message}")]
    Status { code: i32, message: String },

    #[error("Failed to decode partial result: {0}")]
    Decode(String),

    #[error("Result sink is locked")]
    SinkLocked,

    #[error("Query timed out after {0} ms")]
    Timeout(u64),

    #[error("Invalid host list: {0}")]
    InvalidHosts(String),
}

pub type ExecutionResult<T> = Result<T, ExecutionError>;

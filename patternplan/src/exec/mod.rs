// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Boundary with the distributed execution engine
//!
//! The engine itself lives elsewhere. This module holds the host
//! configuration, the async client seam, and the result collector that
//! assembles partial results.

pub mod client;
pub mod collector;
pub mod error;

pub use client::{execute_plan, Endpoint, ExecutionClient, HostConfig, PlanRequest};
pub use collector::{encode_rows, ResultCollector, ResultRow};
pub use error::{ExecutionError, ExecutionResult};

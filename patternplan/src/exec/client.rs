// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Execution engine client interface
//!
//! The transport is supplied by the caller through [`ExecutionClient`].
//! [`execute_plan`] fans a compiled plan out to every engine endpoint and
//! waits for the collected result under the query timeout. Failures are
//! reported as they come back; nothing is retried here.

use super::collector::{ResultCollector, ResultRow};
use super::error::{ExecutionError, ExecutionResult};
use crate::plan::{CompiledPlan, PlanningResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Engine endpoints and the per-query timeout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub endpoints: Vec<Endpoint>,
    pub timeout_ms: u64,
}

impl HostConfig {
    /// Parse a comma separated `host:port` list
    pub fn parse(hosts: &str, timeout_ms: u64) -> ExecutionResult<Self> {
        let endpoints = hosts
            .split(',')
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .map(|entry| {
                let (host, port) = entry
                    .rsplit_once(':')
                    .ok_or_else(|| ExecutionError::InvalidHosts(format!("missing port in '{}'", entry)))?;
                if host.is_empty() {
                    return Err(ExecutionError::InvalidHosts(format!("missing host in '{}'", entry)));
                }
                let port = port
                    .parse::<u16>()
                    .map_err(|e| ExecutionError::InvalidHosts(format!("bad port in '{}': {}", entry, e)))?;
                Ok(Endpoint {
                    host: host.to_string(),
                    port,
                })
            })
            .collect::<ExecutionResult<Vec<_>>>()?;
        if endpoints.is_empty() {
            return Err(ExecutionError::InvalidHosts("no endpoints given".into()));
        }
        if timeout_ms == 0 {
            return Err(ExecutionError::InvalidHosts("timeout must be positive".into()));
        }
        Ok(Self {
            endpoints,
            timeout_ms,
        })
    }
}

/// What is sent to each engine endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRequest {
    pub payload: Vec<u8>,
    pub checksum: u32,
    pub schema_json: String,
}

impl PlanRequest {
    pub fn from_compiled(plan: &CompiledPlan) -> PlanningResult<Self> {
        Ok(Self {
            payload: plan.payload.clone(),
            checksum: plan.checksum,
            schema_json: plan.schema_json()?,
        })
    }
}

/// Transport to one engine endpoint. `submit` streams partial results into
/// `sink` and returns when the endpoint has sent everything.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn submit(
        &self,
        endpoint: &Endpoint,
        request: &PlanRequest,
        sink: &ResultCollector,
    ) -> ExecutionResult<()>;
}

/// Submit `request` to every endpoint and wait for the collected rows
pub async fn execute_plan<C>(
    client: Arc<C>,
    hosts: &HostConfig,
    request: PlanRequest,
) -> ExecutionResult<Vec<ResultRow>>
where
    C: ExecutionClient + 'static,
{
    let (collector, receiver) = ResultCollector::new(hosts.endpoints.len());
    let collector = Arc::new(collector);
    let request = Arc::new(request);

    let mut tasks = JoinSet::new();
    for endpoint in hosts.endpoints.clone() {
        let client = Arc::clone(&client);
        let collector = Arc::clone(&collector);
        let request = Arc::clone(&request);
        tasks.spawn(async move {
            match client.submit(&endpoint, &request, &collector).await {
                Ok(()) => {
                    // a locked sink already holds the outcome
                    let _ = collector.complete_part();
                }
                Err(e) => {
                    log::debug!("endpoint {} failed: {}", endpoint, e);
                    collector.fail(e);
                }
            }
        });
    }

    let outcome = tokio::time::timeout(Duration::from_millis(hosts.timeout_ms), receiver).await;
    match outcome {
        Ok(Ok(delivery)) => {
            tasks.abort_all();
            delivery
        }
        Ok(Err(_)) => Err(ExecutionError::Status {
            code: -1,
            message: "result channel closed before delivery".into(),
        }),
        Err(_) => {
            collector.fail(ExecutionError::Timeout(hosts.timeout_ms));
            tasks.abort_all();
            Err(ExecutionError::Timeout(hosts.timeout_ms))
        }
    }
}

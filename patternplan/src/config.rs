// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Planner configuration

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How the search computes and uses cumulative costs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostStrategy {
    /// Skip input alternatives whose cost already exceeds the best total
    /// seen for the class minus the expression's own cost
    #[default]
    UpperBoundPruning,
    /// Cost every alternative fully; no pruning
    Exhaustive,
}

/// Row-count policy for an extend-intersect step whose equivalence class
/// has not been registered yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtendIntersectFallback {
    /// Estimate the step's target pattern directly from the catalogue
    #[default]
    FreshLookup,
    /// Report the step as unestimable
    Strict,
}

/// Filter selectivity factors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectivityConfig {
    pub equality: f64,
    pub range: f64,
    pub not_null: f64,
    /// Opaque and otherwise uninterpreted predicates
    pub default: f64,
}

impl Default for SelectivityConfig {
    fn default() -> Self {
        Self {
            equality: 0.15,
            range: 0.5,
            not_null: 0.9,
            default: 0.25,
        }
    }
}

/// Weights combining the cost components into one comparable value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostWeights {
    pub cpu_weight: f64,
    pub network_weight: f64,
    /// Multiplier on communication cost of an extend over a foreign key edge
    pub foreign_key_discount: f64,
}

impl Default for CostWeights {
    fn default() -> Self {
        Self {
            cpu_weight: 1.0,
            network_weight: 5.0,
            foreign_key_discount: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub cost_strategy: CostStrategy,
    pub extend_fallback: ExtendIntersectFallback,

    /// Explore binary joins of sub-patterns next to extend-intersect
    pub enable_pattern_join: bool,
    /// Largest pattern (in edges) for which join splits are enumerated
    pub max_join_pattern_edges: usize,
    /// Above this many edges the catalogue extrapolates greedily
    pub max_exhaustive_estimate_edges: usize,
    /// Split fixed-length path expansions into single-hop fragments
    pub split_path_expand: bool,

    pub selectivity: SelectivityConfig,
    /// Output/input row ratio of a grouped aggregate
    pub aggregate_group_factor: f64,
    /// Row count used when a pattern cannot be decomposed into indexed shapes
    pub unknown_row_count: f64,
    pub cost: CostWeights,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            cost_strategy: CostStrategy::default(),
            extend_fallback: ExtendIntersectFallback::default(),
            enable_pattern_join: true,
            max_join_pattern_edges: 6,
            max_exhaustive_estimate_edges: 12,
            split_path_expand: true,
            selectivity: SelectivityConfig::default(),
            aggregate_group_factor: 0.1,
            unknown_row_count: 1e12,
            cost: CostWeights::default(),
        }
    }
}

impl PlannerConfig {
    pub fn with_strategy(mut self, strategy: CostStrategy) -> Self {
        self.cost_strategy = strategy;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: PlannerConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fractions = [
            ("selectivity.equality", self.selectivity.equality),
            ("selectivity.range", self.selectivity.range),
            ("selectivity.not_null", self.selectivity.not_null),
            ("selectivity.default", self.selectivity.default),
            ("aggregate_group_factor", self.aggregate_group_factor),
            ("cost.foreign_key_discount", self.cost.foreign_key_discount),
        ];
        for (field, value) in fractions {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is not in (0, 1]", value),
                });
            }
        }
        if !(self.unknown_row_count.is_finite() && self.unknown_row_count >= 1.0) {
            return Err(ConfigError::Invalid {
                field: "unknown_row_count",
                reason: "must be finite and at least 1".into(),
            });
        }
        for (field, value) in [
            ("cost.cpu_weight", self.cost.cpu_weight),
            ("cost.network_weight", self.cost.network_weight),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} is negative or not finite", value),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.cost_strategy, CostStrategy::UpperBoundPruning);
        assert_eq!(config.extend_fallback, ExtendIntersectFallback::FreshLookup);
        assert_eq!(config.unknown_row_count, 1e12);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PlannerConfig::from_json_str(
            r#"{"cost_strategy": "exhaustive", "selectivity": {"equality": 0.01}}"#,
        )
        .unwrap();
        assert_eq!(config.cost_strategy, CostStrategy::Exhaustive);
        assert_eq!(config.selectivity.equality, 0.01);
        assert_eq!(config.selectivity.range, 0.5);
        assert!(config.enable_pattern_join);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PlannerConfig::from_json_str(r#"{"aggregate_group_factor": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "aggregate_group_factor",
                ..
            }
        ));
        assert!(matches!(
            PlannerConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("planner.json");
        std::fs::write(&path, r#"{"extend_fallback": "strict"}"#).unwrap();
        let config = PlannerConfig::from_file(&path).unwrap();
        assert_eq!(config.extend_fallback, ExtendIntersectFallback::Strict);
    }
}

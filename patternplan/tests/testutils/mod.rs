//! Test utilities for PatternPlan integration tests
//!
//! - `fixture`: a small social-network schema, catalogue and planner
//!   shared by the planner, catalogue and execution tests

#![allow(dead_code)]

pub mod fixture;

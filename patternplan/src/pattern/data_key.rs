// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Direction independent edge keys and path fragment bookkeeping

use super::{HopRange, PatternDirection, Predicate};
use crate::alias::{AliasId, AliasIdGenerator};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an edge between two vertex order ids, independent of which
/// endpoint the traversal started from.
///
/// The lower order id is always stored first; when the endpoints arrive
/// swapped the direction is flipped, so `(a, b, OUT)` and `(b, a, IN)` are
/// the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EdgeDataKey {
    low: usize,
    high: usize,
    direction: PatternDirection,
}

impl EdgeDataKey {
    pub fn new(order1: usize, order2: usize, direction: PatternDirection) -> Self {
        if order1 > order2 {
            return Self {
                low: order2,
                high: order1,
                direction: direction.reverse(),
            };
        }
        // a self-loop reads the same both ways
        let direction = if order1 == order2 && direction == PatternDirection::In {
            PatternDirection::Out
        } else {
            direction
        };
        Self {
            low: order1,
            high: order2,
            direction,
        }
    }

    pub fn low(&self) -> usize {
        self.low
    }

    pub fn high(&self) -> usize {
        self.high
    }

    pub fn direction(&self) -> PatternDirection {
        self.direction
    }
}

impl fmt::Display for EdgeDataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}:{}", self.low, self.high, self.direction)
    }
}

/// A result alias with its optional filter and, for split path fragments,
/// the alias of the expansion it was split from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub alias: AliasId,
    pub filter: Option<Predicate>,
    pub parent_alias: Option<AliasId>,
}

impl DataValue {
    pub fn new(alias: AliasId, filter: Option<Predicate>) -> Self {
        Self {
            alias,
            filter,
            parent_alias: None,
        }
    }

    pub fn fragment_of(alias: AliasId, parent: AliasId, filter: Option<Predicate>) -> Self {
        Self {
            alias,
            filter,
            parent_alias: Some(parent),
        }
    }

    pub fn is_fragment(&self) -> bool {
        self.parent_alias.is_some()
    }
}

/// Split a fixed-length path expansion into single-hop fragments.
///
/// Only ranges with `min == max > 1` are split. Every fragment gets a fresh
/// alias from `generator` and points back at `path_alias`. The path filter
/// is evaluated per hop, so each fragment carries a copy rebound from the
/// path alias to its own. Any other range is returned as one unsplit value.
pub fn split_path_expand(
    path_alias: AliasId,
    hops: HopRange,
    filter: Option<Predicate>,
    generator: &mut AliasIdGenerator,
) -> Vec<DataValue> {
    if !hops.is_fixed() || hops.min <= 1 {
        return vec![DataValue::new(path_alias, filter)];
    }
    (0..hops.min)
        .map(|_| {
            let alias = generator.next_alias_id();
            let filter = filter.as_ref().map(|f| f.rebind(path_alias, alias));
            DataValue::fragment_of(alias, path_alias, filter)
        })
        .collect()
}

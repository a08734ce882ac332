// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Identity service for query variables
//!
//! Every query variable ("tag") and every intermediate plan column gets a
//! small integer alias id. The ids are embedded in the physical plan so the
//! execution engine can route named outputs back to the client-visible tags.
//! A generator lives for exactly one compilation and is never shared.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Integer id of a query variable or plan column
pub type AliasId = i32;

/// Monotonic alias id source for a single query compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AliasIdGenerator {
    next: AliasId,
}

impl AliasIdGenerator {
    /// Create a generator whose first id is 0
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a generator whose first id is `start`
    pub fn starting_at(start: AliasId) -> Self {
        Self { next: start }
    }

    /// Hand out the next id. Ids are strictly increasing and never reused.
    pub fn next_alias_id(&mut self) -> AliasId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// The id the next call to `next_alias_id` will return
    pub fn peek(&self) -> AliasId {
        self.next
    }
}

impl Default for AliasIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Binds user-visible tags to alias ids in first-introduction order
#[derive(Debug, Clone, Default)]
pub struct AliasRegistry {
    generator: AliasIdGenerator,
    by_tag: HashMap<String, AliasId>,
    tags: BTreeMap<AliasId, String>,
}

impl AliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose first assigned id is `start`, for IR whose aliases
    /// were numbered elsewhere
    pub fn starting_at(start: AliasId) -> Self {
        Self {
            generator: AliasIdGenerator::starting_at(start),
            ..Self::default()
        }
    }

    /// Bind `tag` to an id assigned outside this registry
    pub fn bind(&mut self, tag: &str, id: AliasId) {
        self.by_tag.insert(tag.to_string(), id);
        self.tags.insert(id, tag.to_string());
    }

    /// Return the id bound to `tag`, assigning a fresh one on first use
    pub fn get_or_assign(&mut self, tag: &str) -> AliasId {
        if let Some(id) = self.by_tag.get(tag) {
            return *id;
        }
        let id = self.generator.next_alias_id();
        self.by_tag.insert(tag.to_string(), id);
        self.tags.insert(id, tag.to_string());
        log::trace!("alias {} bound to tag '{}'", id, tag);
        id
    }

    /// Assign an id with no user-visible tag (anonymous vertices, edges,
    /// intermediate columns)
    pub fn anonymous(&mut self) -> AliasId {
        self.generator.next_alias_id()
    }

    pub fn lookup(&self, tag: &str) -> Option<AliasId> {
        self.by_tag.get(tag).copied()
    }

    pub fn tag_of(&self, alias: AliasId) -> Option<&str> {
        self.tags.get(&alias).map(String::as_str)
    }

    /// Display name of an alias: its tag, or a synthetic `~alias_<id>` name
    pub fn display_name(&self, alias: AliasId) -> String {
        match self.tag_of(alias) {
            Some(tag) => tag.to_string(),
            None => format!("~alias_{}", alias),
        }
    }

    /// Tagged aliases in id order
    pub fn tagged(&self) -> impl Iterator<Item = (AliasId, &str)> + '_ {
        self.tags.iter().map(|(id, tag)| (*id, tag.as_str()))
    }

    pub fn generator_mut(&mut self) -> &mut AliasIdGenerator {
        &mut self.generator
    }

    /// Number of tagged aliases
    pub fn tagged_len(&self) -> usize {
        self.tags.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tags_bind_in_introduction_order() {
        let mut registry = AliasRegistry::new();
        let a = registry.get_or_assign("a");
        let anon = registry.anonymous();
        let b = registry.get_or_assign("b");

        assert_eq!(a, 0);
        assert_eq!(anon, 1);
        assert_eq!(b, 2);
        assert_eq!(registry.get_or_assign("a"), a);
        assert_eq!(registry.tag_of(b), Some("b"));
        assert_eq!(registry.display_name(anon), "~alias_1");
    }

    #[test]
    fn test_generators_are_independent() {
        let mut first = AliasIdGenerator::new();
        let mut second = AliasIdGenerator::new();
        first.next_alias_id();
        first.next_alias_id();
        assert_eq!(second.next_alias_id(), 0);
        assert_eq!(first.peek(), 2);
    }

    proptest! {
        #[test]
        fn prop_alias_ids_strictly_increase(start in -1000i32..1000, calls in 1usize..200) {
            let mut generator = AliasIdGenerator::starting_at(start);
            let ids: Vec<AliasId> = (0..calls).map(|_| generator.next_alias_id()).collect();
            prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
        }
    }
}

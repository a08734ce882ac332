// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cost-based search over the memo
//!
//! Each class is optimised at most once per bound. In exhaustive mode every
//! member is costed fully, bottom up. With upper-bound pruning a member is
//! abandoned as soon as its own cost, or its own cost plus the inputs summed
//! so far, exceeds what the class (or the caller) can still afford. Both
//! modes choose the same winners; ties keep the member discovered first.

use super::cost::{sum_with_inputs, upper_bound_for_inputs, Cost, CostModel};
use super::error::{PlanningError, PlanningResult};
use super::memo::{GroupId, Memo, Winner};
use crate::config::CostStrategy;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Counters describing one search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub groups: usize,
    pub exprs: usize,
    pub rule_applications: usize,
    /// Members whose own cost was computed
    pub costed_exprs: usize,
    /// Members abandoned by the upper bound
    pub pruned_exprs: usize,
    /// Input costs added into a cumulative cost
    pub inputs_summed: usize,
}

pub struct VolcanoSearch<'m, 'c> {
    memo: &'m mut Memo,
    model: &'m CostModel<'c>,
    strategy: CostStrategy,
    stats: SearchStats,
    in_progress: HashSet<GroupId>,
}

impl<'m, 'c> VolcanoSearch<'m, 'c> {
    pub fn new(memo: &'m mut Memo, model: &'m CostModel<'c>, strategy: CostStrategy) -> Self {
        Self {
            memo,
            model,
            strategy,
            stats: SearchStats::default(),
            in_progress: HashSet::new(),
        }
    }

    /// Find the cheapest plan for `root`
    pub fn optimize(&mut self, root: GroupId) -> PlanningResult<Cost> {
        let cost = match self.strategy {
            CostStrategy::Exhaustive => self.optimize_exhaustive(root)?,
            CostStrategy::UpperBoundPruning => self.optimize_bounded(root, Cost::infinite())?,
        };
        self.stats.groups = self.memo.group_count();
        self.stats.exprs = self.memo.expr_count();
        if cost.is_infinite() {
            let shape = self
                .memo
                .group(root)
                .original_pattern()
                .map(|p| p.to_string())
                .unwrap_or_else(|| {
                    let first = self.memo.group(root).exprs()[0];
                    self.memo.expr(first).op.to_string()
                });
            return Err(PlanningError::NoFeasiblePlan(shape));
        }
        log::debug!(
            "search ({:?}) done: cost {}, {} costed, {} pruned",
            self.strategy,
            cost,
            self.stats.costed_exprs,
            self.stats.pruned_exprs
        );
        Ok(cost)
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    pub fn into_stats(self) -> SearchStats {
        self.stats
    }

    fn optimize_exhaustive(&mut self, group: GroupId) -> PlanningResult<Cost> {
        if self.memo.group(group).is_optimized() {
            return Ok(self.memo.group(group).best_cost());
        }
        if !self.in_progress.insert(group) {
            return Ok(Cost::infinite());
        }
        let members = self.memo.group(group).exprs().to_vec();
        for id in members {
            let own = self.model.own_cost(self.memo.expr(id), &*self.memo)?;
            self.stats.costed_exprs += 1;
            let inputs = self.memo.expr(id).inputs.clone();
            let total = sum_with_inputs(own, &inputs, |input| {
                self.stats.inputs_summed += 1;
                self.optimize_exhaustive(input)
            })?;
            self.offer(group, id, total);
        }
        self.in_progress.remove(&group);
        let class = self.memo.group_mut(group);
        class.optimized = true;
        Ok(class.best_cost())
    }

    /// Best cost of `group` if it is within `upper`, infinite otherwise
    fn optimize_bounded(&mut self, group: GroupId, upper: Cost) -> PlanningResult<Cost> {
        {
            let class = self.memo.group(group);
            if class.is_optimized() {
                return Ok(class.best_cost());
            }
            if let Some(failed) = class.failed_bound {
                if !failed.is_lt(&upper) {
                    return Ok(Cost::infinite());
                }
            }
        }
        if !self.in_progress.insert(group) {
            return Ok(Cost::infinite());
        }

        let members = self.memo.group(group).exprs().to_vec();
        for id in members {
            let own = self.model.own_cost(self.memo.expr(id), &*self.memo)?;
            self.stats.costed_exprs += 1;
            if own.is_infinite() || own.exceeds(&upper) {
                self.stats.pruned_exprs += 1;
                continue;
            }
            let best = self.memo.group(group).best_cost();
            let bound = upper_bound_for_inputs(&own, &best, &upper);

            let inputs = self.memo.expr(id).inputs.clone();
            let mut total = own;
            let mut inputs_cost = Cost::zero();
            let mut abandoned = false;
            for input in inputs {
                let budget = bound.minus(&inputs_cost);
                let cost = self.optimize_bounded(input, budget)?;
                if cost.is_infinite() {
                    abandoned = true;
                    break;
                }
                self.stats.inputs_summed += 1;
                inputs_cost = inputs_cost.plus(&cost);
                total = total.plus(&cost);
                if inputs_cost.exceeds(&bound) {
                    abandoned = true;
                    break;
                }
            }
            if abandoned {
                self.stats.pruned_exprs += 1;
                log::trace!("pruned #{} in class {} under {}", id, group, bound);
                continue;
            }
            self.offer(group, id, total);
        }
        self.in_progress.remove(&group);

        let class = self.memo.group_mut(group);
        match class.best {
            Some(winner) if !winner.cost.exceeds(&upper) => {
                class.optimized = true;
                Ok(winner.cost)
            }
            _ => {
                // whatever was found is not known to be optimal; retry from
                // scratch under a larger bound
                class.best = None;
                class.failed_bound = Some(match class.failed_bound {
                    Some(failed) if upper.is_lt(&failed) => failed,
                    _ => upper,
                });
                Ok(Cost::infinite())
            }
        }
    }

    /// Record `expr` as the class winner if it is strictly cheaper
    fn offer(&mut self, group: GroupId, expr: usize, total: Cost) {
        if total.is_infinite() {
            return;
        }
        let class = self.memo.group_mut(group);
        let better = class.best.map_or(true, |best| total.is_lt(&best.cost));
        if better {
            class.best = Some(Winner { expr, cost: total });
        }
    }
}

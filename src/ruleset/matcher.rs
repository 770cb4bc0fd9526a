//! Conjunctive pattern matching against a fact store.
//!
//! A conjunction is evaluated as a left-deep join. Patterns are reordered
//! greedily so the one with the most fixed positions is matched next; the
//! resulting antecedent list is reported in the declared pattern order.

use std::collections::BTreeSet;

use crate::fact::FactId;
use crate::pattern::{Binding, FactPattern, Variable};
use crate::storage::FactStore;

/// One way a conjunction is satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct JoinMatch {
    /// Binding consistent across every pattern.
    pub binding: Binding,
    /// Matched fact per pattern, in declared order.
    pub facts: Vec<FactId>,
}

/// Greedy join order: at each step pick the pattern with the most positions
/// fixed by constants or already-bound variables. Ties keep declared order.
fn plan(patterns: &[FactPattern], seed: &Binding) -> Vec<usize> {
    let mut bound: BTreeSet<Variable> = seed.iter().map(|(v, _)| v.clone()).collect();
    let mut remaining: Vec<usize> = (0..patterns.len()).collect();
    let mut order = Vec::with_capacity(patterns.len());

    while !remaining.is_empty() {
        let mut best = 0;
        let mut best_score = patterns[remaining[0]].bound_positions(&bound);
        for (slot, &idx) in remaining.iter().enumerate().skip(1) {
            let score = patterns[idx].bound_positions(&bound);
            if score > best_score {
                best = slot;
                best_score = score;
            }
        }
        let idx = remaining.remove(best);
        bound.extend(patterns[idx].variables().cloned());
        order.push(idx);
    }
    order
}

/// Returns every binding extending `seed` under which all patterns match.
pub(crate) fn match_all(store: &FactStore, patterns: &[FactPattern], seed: &Binding) -> Vec<JoinMatch> {
    let order = plan(patterns, seed);
    let mut out = Vec::new();
    let mut facts = vec![FactId::new(0); patterns.len()];
    join(store, patterns, &order, 0, seed, &mut facts, &mut out, None);
    out
}

/// Returns the first binding (in join order) under which all patterns match.
pub(crate) fn match_first(store: &FactStore, patterns: &[FactPattern], seed: &Binding) -> Option<JoinMatch> {
    let order = plan(patterns, seed);
    let mut out = Vec::with_capacity(1);
    let mut facts = vec![FactId::new(0); patterns.len()];
    join(store, patterns, &order, 0, seed, &mut facts, &mut out, Some(1));
    out.pop()
}

#[allow(clippy::too_many_arguments)]
fn join(
    store: &FactStore,
    patterns: &[FactPattern],
    order: &[usize],
    depth: usize,
    binding: &Binding,
    facts: &mut [FactId],
    out: &mut Vec<JoinMatch>,
    limit: Option<usize>,
) {
    if limit.is_some_and(|n| out.len() >= n) {
        return;
    }
    let Some(&idx) = order.get(depth) else {
        out.push(JoinMatch {
            binding: binding.clone(),
            facts: facts.to_vec(),
        });
        return;
    };

    for (extended, id) in store.matches(&patterns[idx], binding) {
        facts[idx] = id;
        join(store, patterns, order, depth + 1, &extended, facts, out, limit);
        if limit.is_some_and(|n| out.len() >= n) {
            return;
        }
    }
}

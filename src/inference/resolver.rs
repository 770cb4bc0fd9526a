use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fact::SlotKey;
use crate::inference::ExceptionTieBreak;
use crate::rule::RuleId;
use crate::ruleset::{RuleInstance, RuleSet};

/// What happened to a candidate rule instance in a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RuleOutcome {
    /// The instance fired and its conclusion was offered to the store.
    Fired,

    /// An applicable exception of this rule concluded on the same slot.
    SuppressedByException {
        /// The exception that took precedence.
        exception: RuleId,
        /// Overridden (subject, predicate, context).
        slot: SlotKey,
    },

    /// A competing exception of the same base rule won the tie-break.
    SuppressedBySibling {
        /// The winning sibling exception.
        winner: RuleId,
        /// Contested (subject, predicate, context).
        slot: SlotKey,
    },
}

impl RuleOutcome {
    /// Returns true for [`RuleOutcome::Fired`].
    #[must_use]
    pub const fn is_fired(&self) -> bool {
        matches!(self, Self::Fired)
    }
}

/// Applies exception precedence and the sibling tie-break to one round's
/// candidate instances.
///
/// # Semantics
/// - An instance of rule R is suppressed when, in the same round, some
///   instance of a rule that (transitively) names R in `exception_of`
///   concludes on the same (subject, predicate, context) slot. The first
///   such exception in rule order is reported.
/// - Surviving exception instances that share a direct base rule and a slot
///   are siblings; `tie_break` picks which rule's instances fire.
///
/// Output order equals input order.
#[must_use]
pub fn resolve_exceptions(
    rules: &RuleSet,
    candidates: Vec<RuleInstance>,
    tie_break: ExceptionTieBreak,
) -> Vec<(RuleInstance, RuleOutcome)> {
    // (ancestor rule, slot) -> first overriding exception in rule order.
    // Candidates arrive in rule order, so the first insert wins.
    let mut overridden: BTreeMap<(usize, SlotKey), usize> = BTreeMap::new();
    for instance in &candidates {
        for &ancestor in rules.ancestors_of(instance.rule_index) {
            overridden
                .entry((ancestor, instance.conclusion.slot_key()))
                .or_insert(instance.rule_index);
        }
    }

    let mut outcomes: Vec<RuleOutcome> = candidates
        .iter()
        .map(|instance| {
            let slot = instance.conclusion.slot_key();
            match overridden.get(&(instance.rule_index, slot.clone())) {
                Some(&exception) => RuleOutcome::SuppressedByException {
                    exception: rules.rule_at(exception).id.clone(),
                    slot,
                },
                None => RuleOutcome::Fired,
            }
        })
        .collect();

    if tie_break != ExceptionTieBreak::FireAll {
        // (direct base, slot) -> winning sibling.
        let mut winners: BTreeMap<(usize, SlotKey), usize> = BTreeMap::new();
        for (instance, outcome) in candidates.iter().zip(&outcomes) {
            let Some(&base) = rules.ancestors_of(instance.rule_index).first() else {
                continue;
            };
            if !outcome.is_fired() {
                continue;
            }
            let key = (base, instance.conclusion.slot_key());
            let candidate = instance.rule_index;
            winners
                .entry(key)
                .and_modify(|current| {
                    if beats(rules, tie_break, candidate, *current) {
                        *current = candidate;
                    }
                })
                .or_insert(candidate);
        }

        for (instance, outcome) in candidates.iter().zip(outcomes.iter_mut()) {
            let Some(&base) = rules.ancestors_of(instance.rule_index).first() else {
                continue;
            };
            if !outcome.is_fired() {
                continue;
            }
            let slot = instance.conclusion.slot_key();
            if let Some(&winner) = winners.get(&(base, slot.clone())) {
                if winner != instance.rule_index {
                    *outcome = RuleOutcome::SuppressedBySibling {
                        winner: rules.rule_at(winner).id.clone(),
                        slot,
                    };
                }
            }
        }
    }

    candidates.into_iter().zip(outcomes).collect()
}

fn beats(rules: &RuleSet, tie_break: ExceptionTieBreak, candidate: usize, current: usize) -> bool {
    match tie_break {
        ExceptionTieBreak::PriorityOrder => candidate < current,
        ExceptionTieBreak::DeclarationOrder => {
            rules.declaration_index(candidate) < rules.declaration_index(current)
        }
        ExceptionTieBreak::FireAll => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::fact::Fact;
    use crate::pattern::{FactPattern, Term};
    use crate::rule::Rule;
    use crate::storage::FactStore;

    fn active_rule(id: &str, value: bool, priority: i32, base: Option<&str>, guard: Option<&str>) -> Rule {
        let mut builder = Rule::builder(id)
            .when(FactPattern::new(Term::var("X"), "activates", Term::var("Y")))
            .then(FactPattern::new(Term::var("Y"), "active", Term::value(value)))
            .priority(priority);
        if let Some(base) = base {
            builder = builder.exception_of(base);
        }
        if let Some(flag) = guard {
            builder = builder.requires(FactPattern::new(Term::var("X"), flag, Term::value(true)));
        }
        builder.build().unwrap()
    }

    fn store(flags: &[&str]) -> FactStore {
        let mut store = FactStore::new();
        store.insert(Fact::new("A", "activates", EntityId::new("B")), 0);
        for flag in flags {
            store.insert(Fact::new("A", *flag, true), 0);
        }
        store
    }

    fn outcomes(rules: &RuleSet, store: &FactStore, tie: ExceptionTieBreak) -> Vec<(String, RuleOutcome)> {
        rules
            .applicable_instances(store, tie)
            .into_iter()
            .map(|(i, o)| (i.rule.to_string(), o))
            .collect()
    }

    #[test]
    fn base_fires_without_exception() {
        let rules = RuleSet::new(vec![
            active_rule("base", true, 0, None, None),
            active_rule("mutant", false, 10, Some("base"), Some("mutated")),
        ])
        .unwrap();
        let result = outcomes(&rules, &store(&[]), ExceptionTieBreak::default());
        assert_eq!(result, vec![("base".to_string(), RuleOutcome::Fired)]);
    }

    #[test]
    fn exception_suppresses_base_on_same_slot() {
        let rules = RuleSet::new(vec![
            active_rule("base", true, 0, None, None),
            active_rule("mutant", false, 10, Some("base"), Some("mutated")),
        ])
        .unwrap();
        let result = outcomes(&rules, &store(&["mutated"]), ExceptionTieBreak::default());
        assert_eq!(result.len(), 2);
        assert_eq!(result[0], ("mutant".to_string(), RuleOutcome::Fired));
        assert!(matches!(
            &result[1],
            (id, RuleOutcome::SuppressedByException { exception, .. })
                if id == "base" && exception.as_str() == "mutant"
        ));
    }

    #[test]
    fn suppression_is_transitive() {
        let rules = RuleSet::new(vec![
            active_rule("base", true, 0, None, None),
            active_rule("mid", false, 5, Some("base"), Some("mutated")),
            active_rule("leaf", true, 10, Some("mid"), Some("rescued")),
        ])
        .unwrap();
        let result = outcomes(&rules, &store(&["mutated", "rescued"]), ExceptionTieBreak::default());
        let fired: Vec<_> = result.iter().filter(|(_, o)| o.is_fired()).map(|(id, _)| id.as_str()).collect();
        assert_eq!(fired, vec!["leaf"]);
    }

    #[test]
    fn sibling_tie_break_policies() {
        let rules = RuleSet::new(vec![
            active_rule("base", true, 0, None, None),
            active_rule("first_declared", false, 1, Some("base"), Some("mutated")),
            active_rule("higher_priority", false, 9, Some("base"), Some("mutated")),
        ])
        .unwrap();
        let store = store(&["mutated"]);

        let fired = |tie| -> Vec<String> {
            outcomes(&rules, &store, tie)
                .into_iter()
                .filter(|(_, o)| o.is_fired())
                .map(|(id, _)| id)
                .collect()
        };

        assert_eq!(fired(ExceptionTieBreak::PriorityOrder), vec!["higher_priority"]);
        assert_eq!(fired(ExceptionTieBreak::DeclarationOrder), vec!["first_declared"]);
        assert_eq!(
            fired(ExceptionTieBreak::FireAll),
            vec!["higher_priority", "first_declared"]
        );

        let sibling = outcomes(&rules, &store, ExceptionTieBreak::PriorityOrder)
            .into_iter()
            .find(|(id, _)| id == "first_declared")
            .unwrap()
            .1;
        assert!(matches!(
            sibling,
            RuleOutcome::SuppressedBySibling { ref winner, .. } if winner.as_str() == "higher_priority"
        ));
    }

    #[test]
    fn exception_on_other_slot_does_not_suppress() {
        let base = active_rule("base", true, 0, None, None);
        let other_slot = Rule::builder("other")
            .when(FactPattern::new(Term::var("X"), "activates", Term::var("Y")))
            .requires(FactPattern::new(Term::var("X"), "mutated", Term::value(true)))
            .then(FactPattern::new(Term::var("Y"), "phosphorylated", Term::value(true)))
            .exception_of("base")
            .build()
            .unwrap();
        let rules = RuleSet::new(vec![base, other_slot]).unwrap();
        let result = outcomes(&rules, &store(&["mutated"]), ExceptionTieBreak::default());
        assert!(result.iter().all(|(_, o)| o.is_fired()));
    }
}

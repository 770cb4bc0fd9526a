//! Validated, ordered rule collections.
//!
//! A [`RuleSet`] is immutable after construction. Iteration follows rule
//! order: priority descending, ties broken by declaration order. Every
//! per-round computation (candidate instances, exception resolution) walks
//! rules in that order so runs are reproducible.

mod matcher;
pub mod validation;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::Serialize;

use crate::entity::EntityRegistry;
use crate::error::ValidationError;
use crate::fact::{Fact, FactId};
use crate::inference::{resolve_exceptions, ExceptionTieBreak, RuleOutcome};
use crate::pattern::{Binding, FactPattern};
use crate::rule::{Rule, RuleId, RuleNote};
use crate::storage::FactStore;

pub(crate) use matcher::{match_all, match_first};

/// One way a rule can fire against a store snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleInstance {
    /// The rule.
    pub rule: RuleId,

    /// Position of the rule in rule order.
    #[serde(skip)]
    pub rule_index: usize,

    /// Trigger binding.
    pub binding: Binding,

    /// Facts matched by the trigger, in trigger order.
    pub antecedents: Vec<FactId>,

    /// Facts that satisfied the required guard patterns.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guard_support: Vec<FactId>,

    /// The instantiated conclusion.
    pub conclusion: Fact,
}

/// An immutable, validated rule collection.
///
/// # Examples
///
/// ```
/// use bioreasoner::{FactPattern, Rule, RuleSet, Term};
///
/// let low = Rule::builder("low")
///     .when(FactPattern::new(Term::var("X"), "activates", Term::var("Y")))
///     .then(FactPattern::new(Term::var("Y"), "active", Term::value(true)))
///     .build()
///     .unwrap();
/// let high = Rule::builder("high")
///     .when(FactPattern::new(Term::var("X"), "inhibits", Term::var("Y")))
///     .then(FactPattern::new(Term::var("Y"), "active", Term::value(false)))
///     .priority(5)
///     .build()
///     .unwrap();
///
/// let rules = RuleSet::new(vec![low, high]).unwrap();
/// let order: Vec<_> = rules.iter().map(|r| r.id.as_str()).collect();
/// assert_eq!(order, vec!["high", "low"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    /// Rules in rule order.
    rules: Vec<Rule>,
    /// Declaration index per rule, parallel to `rules`.
    declared: Vec<usize>,
    by_id: HashMap<RuleId, usize>,
    /// Proper ancestors along the exception chain, nearest first.
    ancestors: Vec<Vec<usize>>,
    exclusive_predicates: BTreeSet<String>,
}

impl RuleSet {
    /// Validates and orders a rule collection.
    ///
    /// Fails on malformed rules, duplicate IDs, unknown exception targets
    /// and exception cycles.
    pub fn new(rules: Vec<Rule>) -> Result<Self, ValidationError> {
        validation::validate_rule_set(&rules)?;

        let mut indexed: Vec<(usize, Rule)> = rules.into_iter().enumerate().collect();
        // Stable sort keeps declaration order among equal priorities.
        indexed.sort_by_key(|(_, rule)| std::cmp::Reverse(rule.priority));

        let declared: Vec<usize> = indexed.iter().map(|(i, _)| *i).collect();
        let rules: Vec<Rule> = indexed.into_iter().map(|(_, r)| r).collect();
        let by_id: HashMap<RuleId, usize> = rules
            .iter()
            .enumerate()
            .map(|(i, r)| (r.id.clone(), i))
            .collect();

        let ancestors = rules
            .iter()
            .map(|rule| {
                let mut chain = Vec::new();
                let mut current = rule.exception_of.as_ref();
                while let Some(base) = current.and_then(|id| by_id.get(id)) {
                    chain.push(*base);
                    current = rules[*base].exception_of.as_ref();
                }
                chain
            })
            .collect();

        Ok(Self {
            rules,
            declared,
            by_id,
            ancestors,
            exclusive_predicates: BTreeSet::new(),
        })
    }

    /// Declares predicates whose positive values are mutually exclusive per
    /// (subject, context).
    pub fn with_exclusive_predicates(
        mut self,
        predicates: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, ValidationError> {
        for predicate in predicates {
            let predicate = predicate.into();
            validation::validate_predicate(&predicate)?;
            self.exclusive_predicates.insert(predicate);
        }
        Ok(self)
    }

    /// Checks that every entity constant in the rules is registered.
    pub fn validate_against(&self, registry: &EntityRegistry) -> Result<(), ValidationError> {
        validation::validate_rule_entities(&self.rules, registry)
    }

    /// Number of rules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Iterates rules in rule order.
    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Looks up a rule by ID.
    #[must_use]
    pub fn get(&self, id: &RuleId) -> Option<&Rule> {
        self.by_id.get(id).map(|&i| &self.rules[i])
    }

    /// Predicates declared mutually exclusive.
    #[must_use]
    pub fn exclusive_predicates(&self) -> &BTreeSet<String> {
        &self.exclusive_predicates
    }

    /// Descriptions and citations of the rules that carry any.
    #[must_use]
    pub fn notes(&self) -> BTreeMap<RuleId, RuleNote> {
        self.rules
            .iter()
            .filter_map(|rule| Some((rule.id.clone(), rule.note()?)))
            .collect()
    }

    /// Rule at a rule-order position.
    pub(crate) fn rule_at(&self, index: usize) -> &Rule {
        &self.rules[index]
    }

    /// Declaration index of the rule at a rule-order position.
    pub(crate) fn declaration_index(&self, index: usize) -> usize {
        self.declared[index]
    }

    /// Proper ancestors of a rule along its exception chain, nearest first.
    pub(crate) fn ancestors_of(&self, index: usize) -> &[usize] {
        &self.ancestors[index]
    }

    pub(crate) fn index_of(&self, id: &RuleId) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    /// Every trigger+guard match of every rule against `store`.
    ///
    /// Instances are ordered by rule order, then antecedent IDs, so the
    /// result does not depend on hash iteration.
    #[must_use]
    pub fn candidate_instances(&self, store: &FactStore) -> Vec<RuleInstance> {
        let mut out = Vec::new();
        for (rule_index, rule) in self.rules.iter().enumerate() {
            let mut instances: Vec<RuleInstance> = match_all(store, &rule.trigger, &Binding::new())
                .into_iter()
                .filter_map(|m| self.instantiate(rule_index, rule, store, m.binding, m.facts))
                .collect();
            instances.sort_by(|a, b| a.antecedents.cmp(&b.antecedents));
            out.extend(instances);
        }
        out
    }

    fn instantiate(
        &self,
        rule_index: usize,
        rule: &Rule,
        store: &FactStore,
        binding: Binding,
        antecedents: Vec<FactId>,
    ) -> Option<RuleInstance> {
        let guard_support = guard_holds(store, &rule.guard.required, &rule.guard.forbidden, &binding)?;
        // Skipped when the subject variable is bound to a literal.
        let conclusion = rule.conclusion.instantiate(&binding)?;
        Some(RuleInstance {
            rule: rule.id.clone(),
            rule_index,
            binding,
            antecedents,
            guard_support,
            conclusion,
        })
    }

    /// Candidate instances with their exception/priority outcome.
    ///
    /// This is the rule-level contract of one round: every instance whose
    /// trigger and guard hold, each tagged `Fired` or suppressed.
    #[must_use]
    pub fn applicable_instances(
        &self,
        store: &FactStore,
        tie_break: ExceptionTieBreak,
    ) -> Vec<(RuleInstance, RuleOutcome)> {
        resolve_exceptions(self, self.candidate_instances(store), tie_break)
    }
}

/// Checks a guard under a trigger binding.
///
/// Returns the facts supporting the required patterns (first match in join
/// order), or `None` if a required pattern has no match or a forbidden
/// pattern has one.
fn guard_holds(
    store: &FactStore,
    required: &[FactPattern],
    forbidden: &[FactPattern],
    binding: &Binding,
) -> Option<Vec<FactId>> {
    let support = if required.is_empty() {
        Vec::new()
    } else {
        match_first(store, required, binding)?.facts
    };
    let blocked = forbidden
        .iter()
        .any(|pattern| store.matches(pattern, binding).next().is_some());
    if blocked {
        None
    } else {
        Some(support)
    }
}

//! In-memory fact store for a single run.
//!
//! Facts live in an append-only arena indexed by [`FactId`]. Secondary
//! indexes serve pattern lookup (by predicate, by subject+predicate) and
//! contradiction detection (by polarity key, by slot). Indexes are only used
//! for lookup; every iteration goes through the arena or through ID lists in
//! insertion order, so results never depend on hash order.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::fact::{Fact, FactId, PolarityKey, Polarity, SlotKey};
use crate::pattern::{Binding, FactPattern};
use crate::value::Value;

/// Why two facts conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContradictionKind {
    /// Same (subject, predicate, object, context), opposite polarity.
    OppositePolarity,
    /// Two positive values for an exclusive predicate in the same slot.
    ExclusiveValues,
}

impl std::fmt::Display for ContradictionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OppositePolarity => write!(f, "opposite_polarity"),
            Self::ExclusiveValues => write!(f, "exclusive_values"),
        }
    }
}

/// Result of inserting a fact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
    /// A new fact was stored.
    Inserted(FactId),

    /// An equal fact already exists; the store is unchanged.
    Duplicate(FactId),

    /// A new fact was stored and conflicts with existing facts.
    /// Both sides stay in the store.
    ContradictionDetected {
        /// The newly stored fact.
        id: FactId,
        /// Existing facts it conflicts with, in ID order.
        conflicts: Vec<(FactId, ContradictionKind)>,
    },
}

impl InsertOutcome {
    /// ID of the stored (new or existing) fact.
    #[must_use]
    pub const fn id(&self) -> FactId {
        match self {
            Self::Inserted(id) | Self::Duplicate(id) | Self::ContradictionDetected { id, .. } => *id,
        }
    }

    /// Returns true if the store grew.
    #[must_use]
    pub const fn is_new(&self) -> bool {
        !matches!(self, Self::Duplicate(_))
    }
}

#[derive(Debug, Clone)]
struct StoredFact {
    fact: Fact,
    round: u32,
}

/// Append-only fact store.
#[derive(Debug, Clone, Default)]
pub struct FactStore {
    facts: Vec<StoredFact>,
    by_fact: HashMap<Fact, FactId>,
    by_predicate: HashMap<String, Vec<FactId>>,
    by_subject_predicate: HashMap<(EntityId, String), Vec<FactId>>,
    by_polarity_key: HashMap<PolarityKey, Vec<FactId>>,
    by_slot: HashMap<SlotKey, Vec<FactId>>,
    exclusive_predicates: BTreeSet<String>,
}

impl FactStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store that flags competing values of the given predicates.
    #[must_use]
    pub fn with_exclusive_predicates(predicates: impl IntoIterator<Item = String>) -> Self {
        Self {
            exclusive_predicates: predicates.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Number of stored facts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.facts.len()
    }

    /// Returns true if the store holds no fact.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Looks up a fact by ID.
    #[must_use]
    pub fn get(&self, id: FactId) -> Option<&Fact> {
        self.facts.get(id.index()).map(|s| &s.fact)
    }

    /// Round in which the fact first entered the store (0 = asserted).
    #[must_use]
    pub fn round_of(&self, id: FactId) -> Option<u32> {
        self.facts.get(id.index()).map(|s| s.round)
    }

    /// Finds the ID of an equal fact.
    #[must_use]
    pub fn find(&self, fact: &Fact) -> Option<FactId> {
        self.by_fact.get(fact).copied()
    }

    /// Iterates `(id, fact, round)` in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (FactId, &Fact, u32)> {
        self.facts
            .iter()
            .enumerate()
            .map(|(i, s)| (fact_id(i), &s.fact, s.round))
    }

    /// Returns true if any fact matches the pattern.
    #[must_use]
    pub fn contains(&self, pattern: &FactPattern) -> bool {
        self.matches(pattern, &Binding::new()).next().is_some()
    }

    /// Lazily yields every `(binding, fact)` consistent with `binding`.
    ///
    /// The sequence borrows the store, so it cannot outlive a mutation.
    pub fn matches<'a>(
        &'a self,
        pattern: &'a FactPattern,
        binding: &'a Binding,
    ) -> impl Iterator<Item = (Binding, FactId)> + 'a {
        self.candidates(pattern, binding)
            .iter()
            .filter_map(move |&id| {
                let fact = &self.facts[id.index()].fact;
                pattern.match_fact(fact, binding).map(|b| (b, id))
            })
    }

    fn candidates(&self, pattern: &FactPattern, binding: &Binding) -> &[FactId] {
        let ids = match pattern.subject.resolve(binding) {
            Some(Value::Entity(subject)) => self
                .by_subject_predicate
                .get(&(subject, pattern.predicate.clone())),
            Some(_) => None,
            None => self.by_predicate.get(&pattern.predicate),
        };
        ids.map_or(&[], Vec::as_slice)
    }

    /// Inserts a fact first seen in `round`.
    ///
    /// Exact duplicates are ignored. A fact whose polarity opposes an existing
    /// fact under the same key is still stored; the conflicting pair is
    /// reported in the outcome.
    pub fn insert(&mut self, fact: Fact, round: u32) -> InsertOutcome {
        if let Some(&id) = self.by_fact.get(&fact) {
            return InsertOutcome::Duplicate(id);
        }

        let conflicts = self.conflicts_with(&fact);
        let id = fact_id(self.facts.len());

        self.by_predicate
            .entry(fact.predicate.clone())
            .or_default()
            .push(id);
        self.by_subject_predicate
            .entry((fact.subject.clone(), fact.predicate.clone()))
            .or_default()
            .push(id);
        self.by_polarity_key
            .entry(fact.polarity_key())
            .or_default()
            .push(id);
        self.by_slot.entry(fact.slot_key()).or_default().push(id);
        self.by_fact.insert(fact.clone(), id);
        self.facts.push(StoredFact { fact, round });

        if conflicts.is_empty() {
            InsertOutcome::Inserted(id)
        } else {
            InsertOutcome::ContradictionDetected { id, conflicts }
        }
    }

    fn conflicts_with(&self, fact: &Fact) -> Vec<(FactId, ContradictionKind)> {
        let mut out = Vec::new();

        if let Some(opposite) = fact.polarity.opposite() {
            if let Some(ids) = self.by_polarity_key.get(&fact.polarity_key()) {
                out.extend(
                    ids.iter()
                        .filter(|id| self.facts[id.index()].fact.polarity == opposite)
                        .map(|&id| (id, ContradictionKind::OppositePolarity)),
                );
            }
        }

        if fact.polarity == Polarity::Positive && self.exclusive_predicates.contains(&fact.predicate) {
            if let Some(ids) = self.by_slot.get(&fact.slot_key()) {
                out.extend(
                    ids.iter()
                        .filter(|id| {
                            let other = &self.facts[id.index()].fact;
                            other.polarity == Polarity::Positive && other.object != fact.object
                        })
                        .map(|&id| (id, ContradictionKind::ExclusiveValues)),
                );
            }
        }

        out.sort();
        out
    }
}

#[allow(clippy::cast_possible_truncation)]
fn fact_id(index: usize) -> FactId {
    FactId::new(index as u32)
}

//! Contradiction reporting.
//!
//! Contradictions are recorded, never raised: both facts stay in the store
//! and the pair is reported with the round it was detected in. Pairs are
//! normalized so the lower fact ID comes first, which makes the report
//! independent of which side happened to be inserted last.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::fact::{Fact, FactId};
use crate::provenance::{ProvenanceGraph, ProvenanceRecord};
use crate::storage::FactStore;

pub use crate::storage::ContradictionKind;

/// A detected conflict between two stored facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Contradiction {
    /// Detection round (0 when the input already conflicts).
    pub round: u32,
    /// Lower fact ID.
    pub first: FactId,
    /// Higher fact ID.
    pub second: FactId,
    /// What kind of conflict the pair forms.
    pub kind: ContradictionKind,
}

impl Contradiction {
    /// Creates a normalized contradiction.
    #[must_use]
    pub fn new(kind: ContradictionKind, a: FactId, b: FactId, round: u32) -> Self {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        Self {
            round,
            first,
            second,
            kind,
        }
    }

    /// Returns true if `fact` is one of the two sides.
    #[must_use]
    pub fn involves(&self, fact: FactId) -> bool {
        self.first == fact || self.second == fact
    }
}

/// Ordered, duplicate-free contradiction log for one run.
#[derive(Debug, Clone, Default)]
pub struct ContradictionReport {
    seen: BTreeSet<(FactId, FactId, ContradictionKind)>,
    entries: Vec<Contradiction>,
}

impl ContradictionReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pair. Returns false if the pair was already reported.
    pub fn record(&mut self, kind: ContradictionKind, a: FactId, b: FactId, round: u32) -> bool {
        let contradiction = Contradiction::new(kind, a, b, round);
        if !self
            .seen
            .insert((contradiction.first, contradiction.second, kind))
        {
            return false;
        }
        self.entries.push(contradiction);
        true
    }

    /// Number of distinct pairs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Contradictions ordered by (round, first, second).
    #[must_use]
    pub fn list(&self) -> Vec<Contradiction> {
        let mut out = self.entries.clone();
        out.sort();
        out
    }

    /// Resolves every contradiction into a self-contained entry carrying
    /// both facts and their provenance.
    #[must_use]
    pub fn entries(&self, store: &FactStore, provenance: &ProvenanceGraph) -> Vec<ContradictionEntry> {
        self.list()
            .into_iter()
            .filter_map(|c| {
                Some(ContradictionEntry {
                    kind: c.kind,
                    round: c.round,
                    first: ContradictionSide::resolve(c.first, store, provenance)?,
                    second: ContradictionSide::resolve(c.second, store, provenance)?,
                })
            })
            .collect()
    }
}

/// One side of a reported contradiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContradictionSide {
    /// Fact ID.
    pub id: FactId,
    /// The fact.
    pub fact: Fact,
    /// Every derivation recorded for the fact.
    pub provenance: Vec<ProvenanceRecord>,
}

impl ContradictionSide {
    fn resolve(id: FactId, store: &FactStore, provenance: &ProvenanceGraph) -> Option<Self> {
        Some(Self {
            id,
            fact: store.get(id)?.clone(),
            provenance: provenance.explain(id).to_vec(),
        })
    }
}

/// A contradiction with both sides spelled out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContradictionEntry {
    /// What kind of conflict the pair forms.
    pub kind: ContradictionKind,
    /// Round the pair was first detected in.
    pub round: u32,
    /// Side with the lower fact ID.
    pub first: ContradictionSide,
    /// Side with the higher fact ID.
    pub second: ContradictionSide,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_normalized_and_deduplicated() {
        let mut report = ContradictionReport::new();
        assert!(report.record(ContradictionKind::OppositePolarity, FactId::new(4), FactId::new(1), 2));
        assert!(!report.record(ContradictionKind::OppositePolarity, FactId::new(1), FactId::new(4), 3));
        let list = report.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].first, FactId::new(1));
        assert_eq!(list[0].second, FactId::new(4));
        assert_eq!(list[0].round, 2);
        assert!(list[0].involves(FactId::new(4)));
    }

    #[test]
    fn list_is_ordered_by_round_then_ids() {
        let mut report = ContradictionReport::new();
        report.record(ContradictionKind::OppositePolarity, FactId::new(7), FactId::new(8), 3);
        report.record(ContradictionKind::ExclusiveValues, FactId::new(5), FactId::new(2), 1);
        report.record(ContradictionKind::OppositePolarity, FactId::new(0), FactId::new(9), 3);
        let order: Vec<_> = report.list().iter().map(|c| (c.round, c.first.index())).collect();
        assert_eq!(order, vec![(1, 2), (3, 0), (3, 7)]);
    }

    #[test]
    fn entries_carry_both_sides() {
        let mut store = FactStore::new();
        let mut graph = ProvenanceGraph::new();
        let pos = store.insert(Fact::new("B", "active", true), 0).id();
        graph.add(pos, ProvenanceRecord::asserted()).unwrap();
        let neg = store.insert(Fact::new("B", "active", true).negated(), 0).id();
        graph.add(neg, ProvenanceRecord::asserted()).unwrap();

        let mut report = ContradictionReport::new();
        report.record(ContradictionKind::OppositePolarity, neg, pos, 0);
        let entries = report.entries(&store, &graph);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].first.fact, Fact::new("B", "active", true));
        assert!(entries[0].second.provenance[0].is_asserted());
    }
}

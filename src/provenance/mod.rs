//! Provenance graph.
//!
//! Every fact in a run's store has at least one provenance record: either
//! "asserted" (round 0) or "derived by rule R in round r from antecedents".
//! The graph is an append-only arena indexed by [`FactId`].
//!
//! # Acyclicity
//! A derivation record is only accepted if every antecedent and guard fact
//! entered the store in an earlier round than the derived fact. Following
//! antecedents therefore strictly decreases the origin round, and every
//! chain ends at asserted facts.

mod explain;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReasonerError;
use crate::fact::FactId;
use crate::rule::RuleId;

pub use explain::DerivationTree;

/// Where a fact came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ProvenanceSource {
    /// Part of the scenario input.
    Asserted,

    /// Concluded by a rule.
    Rule {
        /// The rule that fired.
        rule: RuleId,
    },
}

impl fmt::Display for ProvenanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asserted => write!(f, "asserted"),
            Self::Rule { rule } => write!(f, "rule {rule}"),
        }
    }
}

/// One way a fact was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceRecord {
    /// Asserted or rule-derived.
    #[serde(flatten)]
    pub source: ProvenanceSource,

    /// Round the record was produced in (0 for asserted facts).
    pub round: u32,

    /// Trigger facts, in trigger order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub antecedents: Vec<FactId>,

    /// Facts that satisfied the rule's required guard patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub guard_support: Vec<FactId>,
}

impl ProvenanceRecord {
    /// Record for an input fact.
    #[must_use]
    pub fn asserted() -> Self {
        Self {
            source: ProvenanceSource::Asserted,
            round: 0,
            antecedents: Vec::new(),
            guard_support: Vec::new(),
        }
    }

    /// Record for a rule firing.
    #[must_use]
    pub fn derived(rule: RuleId, round: u32, antecedents: Vec<FactId>, guard_support: Vec<FactId>) -> Self {
        Self {
            source: ProvenanceSource::Rule { rule },
            round,
            antecedents,
            guard_support,
        }
    }

    /// Returns true for asserted records.
    #[must_use]
    pub fn is_asserted(&self) -> bool {
        self.source == ProvenanceSource::Asserted
    }

    /// The rule, for derived records.
    #[must_use]
    pub fn rule(&self) -> Option<&RuleId> {
        match &self.source {
            ProvenanceSource::Asserted => None,
            ProvenanceSource::Rule { rule } => Some(rule),
        }
    }

    fn same_derivation(&self, other: &Self) -> bool {
        self.source == other.source && self.antecedents == other.antecedents
    }

    fn supports(&self) -> impl Iterator<Item = &FactId> {
        self.antecedents.iter().chain(&self.guard_support)
    }
}

#[derive(Debug, Clone, Serialize)]
struct Node {
    origin: u32,
    records: Vec<ProvenanceRecord>,
}

/// Append-only map from fact to its provenance records.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProvenanceGraph {
    nodes: Vec<Node>,
}

/// What [`ProvenanceGraph::add`] did with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// First record for a new fact.
    New,
    /// Alternative derivation of a known fact.
    Alternative,
    /// Same rule and antecedents already recorded.
    Duplicate,
    /// Rejected: an antecedent is not older than the fact.
    Rejected,
}

impl ProvenanceGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of facts with provenance.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no fact has provenance.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a record for `fact`.
    ///
    /// Facts must be added in ID order; the first record of a fact fixes its
    /// origin round.
    pub fn add(&mut self, fact: FactId, record: ProvenanceRecord) -> Result<AddOutcome, ReasonerError> {
        let index = fact.index();
        if index == self.nodes.len() {
            if !self.predates(&record, record.round) {
                return Err(ReasonerError::internal(format!(
                    "first provenance record of {fact} references a fact from round {} or later",
                    record.round
                )));
            }
            self.nodes.push(Node {
                origin: record.round,
                records: vec![record],
            });
            return Ok(AddOutcome::New);
        }

        let Some(node) = self.nodes.get(index) else {
            return Err(ReasonerError::internal(format!(
                "provenance for {fact} added out of order (graph holds {} facts)",
                self.nodes.len()
            )));
        };
        if node.records.iter().any(|r| r.same_derivation(&record)) {
            return Ok(AddOutcome::Duplicate);
        }
        if !self.predates(&record, node.origin) {
            return Ok(AddOutcome::Rejected);
        }
        self.nodes[index].records.push(record);
        Ok(AddOutcome::Alternative)
    }

    fn predates(&self, record: &ProvenanceRecord, round: u32) -> bool {
        record
            .supports()
            .all(|id| self.origin_round(*id).is_some_and(|origin| origin < round))
    }

    /// All provenance records of a fact, first record first.
    #[must_use]
    pub fn explain(&self, fact: FactId) -> &[ProvenanceRecord] {
        self.nodes
            .get(fact.index())
            .map_or(&[], |node| node.records.as_slice())
    }

    /// Round in which the fact first appeared.
    #[must_use]
    pub fn origin_round(&self, fact: FactId) -> Option<u32> {
        self.nodes.get(fact.index()).map(|node| node.origin)
    }

    /// Returns true if the fact was part of the input.
    #[must_use]
    pub fn is_asserted(&self, fact: FactId) -> bool {
        self.explain(fact).iter().any(ProvenanceRecord::is_asserted)
    }

    /// Facts that have `fact` among their antecedents or guard support.
    #[must_use]
    pub fn dependents_of(&self, fact: FactId) -> Vec<FactId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.records.iter().any(|r| r.supports().any(|id| *id == fact)))
            .map(|(i, _)| FactId::new(u32::try_from(i).unwrap_or(u32::MAX)))
            .collect()
    }

    /// Iterates `(fact, records)` in ID order.
    pub fn iter(&self) -> impl Iterator<Item = (FactId, &[ProvenanceRecord])> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (FactId::new(u32::try_from(i).unwrap_or(u32::MAX)), node.records.as_slice()))
    }
}

//! Terminal snapshot of a reasoning run.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::contradiction::ContradictionEntry;
use crate::error::ReasonerResult;
use crate::fact::{Fact, FactId};
use crate::inference::RuleOutcome;
use crate::pattern::{Binding, FactPattern};
use crate::provenance::{DerivationTree, ProvenanceGraph, ProvenanceRecord};
use crate::rule::{RuleId, RuleNote};
use crate::storage::FactStore;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// A round derived no new fact.
    Fixpoint,

    /// The round bound was hit while rounds were still deriving facts.
    /// The snapshot is valid but may be incomplete.
    IterationBoundReached,
}

impl RunStatus {
    /// Returns true for [`RunStatus::Fixpoint`].
    #[must_use]
    pub const fn is_fixpoint(self) -> bool {
        matches!(self, Self::Fixpoint)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixpoint => write!(f, "fixpoint"),
            Self::IterationBoundReached => write!(f, "iteration_bound_reached"),
        }
    }
}

/// Statistics of one round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSummary {
    /// Round number, starting at 1.
    pub round: u32,
    /// Instances that fired.
    pub fired: usize,
    /// Instances suppressed by an exception or a sibling.
    pub suppressed: usize,
    /// New facts added to the store.
    pub inserted: usize,
    /// Fired conclusions already present.
    pub duplicates: usize,
    /// Contradiction pairs first detected this round.
    pub contradictions: usize,
}

/// A rule instance that did not fire, with the reason.
///
/// Recorded once per (rule, binding), at the first round it was suppressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuppressionRecord {
    /// First round the instance was suppressed in.
    pub round: u32,
    /// The suppressed rule.
    pub rule: RuleId,
    /// Trigger binding of the instance.
    pub binding: Binding,
    /// Conclusion the instance would have produced.
    pub conclusion: Fact,
    /// Why it did not fire.
    pub outcome: RuleOutcome,
}

/// A stored fact with its origin round and provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactView<'a> {
    /// Fact ID.
    pub id: FactId,
    /// The fact.
    #[serde(flatten)]
    pub fact: &'a Fact,
    /// Round the fact first appeared in.
    pub round: u32,
    /// Every accepted derivation, first one first.
    pub provenance: &'a [ProvenanceRecord],
}

/// One answer to a query pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryAnswer {
    /// ID of the matching fact.
    pub id: FactId,
    /// The matching fact.
    pub fact: Fact,
    /// Variable assignment that made the pattern match.
    pub binding: Binding,
}

/// Final immutable snapshot of a run: fact store, provenance graph and
/// contradiction report, plus run status.
#[derive(Debug, Clone)]
pub struct ReasoningResult {
    pub(crate) status: RunStatus,
    pub(crate) rounds: u32,
    pub(crate) store: FactStore,
    pub(crate) provenance: ProvenanceGraph,
    pub(crate) contradictions: Vec<ContradictionEntry>,
    pub(crate) round_summaries: Vec<RoundSummary>,
    pub(crate) suppressions: Vec<SuppressionRecord>,
    pub(crate) rule_notes: BTreeMap<RuleId, RuleNote>,
}

#[derive(Serialize)]
struct ResultView<'a> {
    status: RunStatus,
    rounds: u32,
    facts: Vec<FactView<'a>>,
    contradictions: &'a [ContradictionEntry],
    round_summaries: &'a [RoundSummary],
    suppressions: &'a [SuppressionRecord],
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    rules: &'a BTreeMap<RuleId, RuleNote>,
}

impl ReasoningResult {
    /// How the run ended.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Number of rounds executed, including the final quiescent round when
    /// the run reached a fixpoint.
    #[must_use]
    pub const fn rounds(&self) -> u32 {
        self.rounds
    }

    /// The final fact store.
    #[must_use]
    pub const fn store(&self) -> &FactStore {
        &self.store
    }

    /// The final provenance graph.
    #[must_use]
    pub const fn provenance(&self) -> &ProvenanceGraph {
        &self.provenance
    }

    /// Contradictions in (round, first, second) order.
    #[must_use]
    pub fn contradictions(&self) -> &[ContradictionEntry] {
        &self.contradictions
    }

    /// Per-round statistics.
    #[must_use]
    pub fn round_summaries(&self) -> &[RoundSummary] {
        &self.round_summaries
    }

    /// Suppressed rule instances.
    #[must_use]
    pub fn suppressions(&self) -> &[SuppressionRecord] {
        &self.suppressions
    }

    /// Descriptions and citations of the annotated rules of the run.
    #[must_use]
    pub fn rule_notes(&self) -> &BTreeMap<RuleId, RuleNote> {
        &self.rule_notes
    }

    /// All facts in ID order.
    pub fn facts(&self) -> impl Iterator<Item = FactView<'_>> {
        self.store.iter().map(|(id, fact, round)| FactView {
            id,
            fact,
            round,
            provenance: self.provenance.explain(id),
        })
    }

    /// Input facts.
    pub fn asserted(&self) -> impl Iterator<Item = FactView<'_>> {
        self.facts().filter(|view| self.provenance.is_asserted(view.id))
    }

    /// Facts produced by rules and not also asserted.
    pub fn derived(&self) -> impl Iterator<Item = FactView<'_>> {
        self.facts().filter(|view| !self.provenance.is_asserted(view.id))
    }

    /// Returns true if the final store holds `fact`.
    #[must_use]
    pub fn contains(&self, fact: &Fact) -> bool {
        self.store.find(fact).is_some()
    }

    /// Every stored fact matching `pattern`, in ID order.
    #[must_use]
    pub fn query(&self, pattern: &FactPattern) -> Vec<QueryAnswer> {
        let seed = Binding::new();
        self.store
            .matches(pattern, &seed)
            .filter_map(|(binding, id)| {
                Some(QueryAnswer {
                    id,
                    fact: self.store.get(id)?.clone(),
                    binding,
                })
            })
            .collect()
    }

    /// Provenance records of `fact`, or `None` if it is not in the store.
    #[must_use]
    pub fn explain(&self, fact: &Fact) -> Option<&[ProvenanceRecord]> {
        self.store.find(fact).map(|id| self.provenance.explain(id))
    }

    /// The derivation tree of `fact`, back to asserted facts.
    #[must_use]
    pub fn derivation_chain(&self, fact: &Fact) -> Option<DerivationTree> {
        self.derivation_tree(self.store.find(fact)?)
    }

    /// The derivation tree of the fact stored under `id`.
    #[must_use]
    pub fn derivation_tree(&self, id: FactId) -> Option<DerivationTree> {
        DerivationTree::build(id, &self.store, &self.provenance, &self.rule_notes)
    }

    fn view(&self) -> ResultView<'_> {
        ResultView {
            status: self.status,
            rounds: self.rounds,
            facts: self.facts().collect(),
            contradictions: &self.contradictions,
            round_summaries: &self.round_summaries,
            suppressions: &self.suppressions,
            rules: &self.rule_notes,
        }
    }

    /// Canonical JSON encoding of the snapshot.
    pub fn to_json(&self) -> ReasonerResult<serde_json::Value> {
        Ok(serde_json::to_value(self.view())?)
    }

    /// blake3 digest (hex) of the canonical JSON encoding.
    ///
    /// Two runs over the same scenario and configuration always produce the
    /// same fingerprint.
    pub fn fingerprint(&self) -> ReasonerResult<String> {
        let bytes = serde_json::to_vec(&self.view())?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }
}

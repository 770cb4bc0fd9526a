//! Scoring candidate fact sets against engine results.
//!
//! The engine's final fact set is the ground truth. A candidate (for
//! example, facts extracted from a language model's answer) is scored per
//! predicate with TP/FP/FN counts, micro- and macro-averaged F1, and checked
//! for contradictions against the ground truth and within itself.

mod candidate;
mod metrics;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::engine::{FactView, ReasoningResult};
use crate::fact::{Fact, Polarity};
use crate::storage::ContradictionKind;

pub use candidate::{parse_candidate, ParsedCandidate};
pub use metrics::Counts;

/// Scoring configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Predicates to score; `None` scores every predicate.
    pub predicates: Option<BTreeSet<String>>,

    /// Also expect asserted (input) facts, not only derived ones.
    pub include_asserted: bool,

    /// Candidate predicate -> canonical predicate.
    pub predicate_synonyms: BTreeMap<String, String>,

    /// Predicates with a single positive value per (subject, context).
    pub exclusive_predicates: BTreeSet<String>,
}

impl ScoringConfig {
    /// Restricts scoring to the given predicates.
    #[must_use]
    pub fn with_predicates(mut self, predicates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.predicates = Some(predicates.into_iter().map(Into::into).collect());
        self
    }

    /// Declares exclusive predicates for contradiction checks.
    #[must_use]
    pub fn with_exclusive_predicates(mut self, predicates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclusive_predicates = predicates.into_iter().map(Into::into).collect();
        self
    }

    fn scores(&self, fact: &Fact) -> bool {
        self.predicates
            .as_ref()
            .map_or(true, |set| set.contains(&fact.predicate))
    }

    fn conflict(&self, a: &Fact, b: &Fact) -> Option<ContradictionKind> {
        if a.polarity.opposes(b.polarity) && a.polarity_key() == b.polarity_key() {
            return Some(ContradictionKind::OppositePolarity);
        }
        let exclusive = a.polarity == Polarity::Positive
            && b.polarity == Polarity::Positive
            && self.exclusive_predicates.contains(&a.predicate)
            && a.slot_key() == b.slot_key()
            && a.object != b.object;
        exclusive.then_some(ContradictionKind::ExclusiveValues)
    }
}

/// The facts an engine run establishes, as expected by scoring.
#[must_use]
pub fn ground_truth(result: &ReasoningResult, config: &ScoringConfig) -> BTreeSet<Fact> {
    let views: Box<dyn Iterator<Item = FactView<'_>>> = if config.include_asserted {
        Box::new(result.facts())
    } else {
        Box::new(result.derived())
    };
    views.map(|view| view.fact.clone()).collect()
}

/// Score of one predicate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredicateScore {
    /// The scored predicate.
    pub predicate: String,
    /// Confusion counts.
    #[serde(flatten)]
    pub counts: Counts,
    /// Precision.
    pub precision: f64,
    /// Recall.
    pub recall: f64,
    /// F1.
    pub f1: f64,
}

/// A pair of conflicting facts found during scoring.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FactConflict {
    /// What kind of conflict the pair forms.
    pub kind: ContradictionKind,
    /// The ground-truth fact.
    pub expected: Fact,
    /// The candidate fact.
    pub candidate: Fact,
}

/// Score of one candidate against one ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioScore {
    /// Confusion counts over all scored predicates.
    #[serde(flatten)]
    pub counts: Counts,
    /// Micro-averaged precision.
    pub precision: f64,
    /// Micro-averaged recall.
    pub recall: f64,
    /// F1 over pooled counts.
    pub micro_f1: f64,
    /// Mean F1 over scored predicates.
    pub macro_f1: f64,
    /// Scores per predicate, by name.
    pub per_predicate: Vec<PredicateScore>,
    /// Candidate facts found in the ground truth.
    pub true_positives: Vec<Fact>,
    /// Candidate facts missing from the ground truth.
    pub false_positives: Vec<Fact>,
    /// Ground-truth facts the candidate missed.
    pub false_negatives: Vec<Fact>,
    /// Candidate facts contradicting ground-truth facts.
    pub cross_contradictions: Vec<FactConflict>,
    /// Conflicting pairs inside the candidate set.
    pub internal_contradictions: Vec<(Fact, Fact)>,
    /// Candidate items that could not be parsed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parse_errors: Vec<String>,
}

/// Scores a candidate against ground truth.
///
/// TP/FP/FN are computed over facts whose predicate is scored; contradiction
/// checks use the full sets.
#[must_use]
pub fn score(truth: &BTreeSet<Fact>, candidate: &ParsedCandidate, config: &ScoringConfig) -> ScenarioScore {
    let expected: BTreeSet<&Fact> = truth.iter().filter(|f| config.scores(f)).collect();
    let predicted: BTreeSet<&Fact> = candidate.facts.iter().filter(|f| config.scores(f)).collect();

    let true_positives: Vec<Fact> = expected.intersection(&predicted).map(|f| (*f).clone()).collect();
    let false_positives: Vec<Fact> = predicted.difference(&expected).map(|f| (*f).clone()).collect();
    let false_negatives: Vec<Fact> = expected.difference(&predicted).map(|f| (*f).clone()).collect();

    let mut by_predicate: BTreeMap<&str, Counts> = BTreeMap::new();
    for fact in &true_positives {
        by_predicate.entry(&fact.predicate).or_default().tp += 1;
    }
    for fact in &false_positives {
        by_predicate.entry(&fact.predicate).or_default().fp += 1;
    }
    for fact in &false_negatives {
        by_predicate.entry(&fact.predicate).or_default().fn_ += 1;
    }
    let per_predicate: Vec<PredicateScore> = by_predicate
        .into_iter()
        .map(|(predicate, counts)| PredicateScore {
            predicate: predicate.to_string(),
            counts,
            precision: counts.precision(),
            recall: counts.recall(),
            f1: counts.f1(),
        })
        .collect();

    let counts = Counts::new(true_positives.len(), false_positives.len(), false_negatives.len());

    let mut cross_contradictions: Vec<FactConflict> = candidate
        .facts
        .iter()
        .flat_map(|c| {
            truth.iter().filter_map(move |t| {
                config.conflict(t, c).map(|kind| FactConflict {
                    kind,
                    expected: t.clone(),
                    candidate: c.clone(),
                })
            })
        })
        .collect();
    cross_contradictions.sort();

    let listed: Vec<&Fact> = candidate.facts.iter().collect();
    let mut internal_contradictions = Vec::new();
    for (i, a) in listed.iter().enumerate() {
        for b in &listed[i + 1..] {
            if config.conflict(a, b).is_some() {
                internal_contradictions.push(((*a).clone(), (*b).clone()));
            }
        }
    }

    ScenarioScore {
        counts,
        precision: counts.precision(),
        recall: counts.recall(),
        micro_f1: counts.f1(),
        macro_f1: metrics::mean(per_predicate.iter().map(|p| p.f1)),
        per_predicate,
        true_positives,
        false_positives,
        false_negatives,
        cross_contradictions,
        internal_contradictions,
        parse_errors: candidate.errors.clone(),
    }
}

/// Aggregate over many scored scenarios.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreSummary {
    /// Number of scored scenarios.
    pub scenarios: usize,
    /// Counts pooled across scenarios.
    #[serde(flatten)]
    pub counts: Counts,
    /// F1 over summed counts.
    pub micro_f1: f64,
    /// Mean of per-scenario F1.
    pub macro_f1: f64,
    /// Cross and internal contradictions, summed.
    pub contradictions: usize,
}

/// Aggregates scenario scores.
#[must_use]
pub fn summarize(scores: &[ScenarioScore]) -> ScoreSummary {
    let mut counts = Counts::default();
    for s in scores {
        counts += s.counts;
    }
    ScoreSummary {
        scenarios: scores.len(),
        counts,
        micro_f1: counts.f1(),
        macro_f1: metrics::mean(scores.iter().map(|s| s.micro_f1)),
        contradictions: scores
            .iter()
            .map(|s| s.cross_contradictions.len() + s.internal_contradictions.len())
            .sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityId;
    use crate::value::Value;

    fn truth() -> BTreeSet<Fact> {
        [
            Fact::new("B", "active", true),
            Fact::new("C", "active", true),
            Fact::new("BETA_CAT", "level", Value::Text("up".into())),
        ]
        .into_iter()
        .collect()
    }

    fn candidate(facts: Vec<Fact>) -> ParsedCandidate {
        ParsedCandidate {
            facts: facts.into_iter().collect(),
            errors: Vec::new(),
        }
    }

    #[test]
    fn counts_per_predicate() {
        let cand = candidate(vec![
            Fact::new("B", "active", true),
            Fact::new("D", "active", true),
            Fact::new("BETA_CAT", "level", Value::Text("up".into())),
        ]);
        let s = score(&truth(), &cand, &ScoringConfig::default());
        assert_eq!(s.counts, Counts::new(2, 1, 1));
        assert_eq!(s.per_predicate.len(), 2);
        let active = &s.per_predicate[0];
        assert_eq!(active.predicate, "active");
        assert_eq!(active.counts, Counts::new(1, 1, 1));
        assert!((s.macro_f1 - (0.5 + 1.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn predicate_filter_restricts_counts_only() {
        let cand = candidate(vec![
            Fact::new("B", "active", true).negated(),
            Fact::new("X", "binds", EntityId::new("Y")),
        ]);
        let config = ScoringConfig::default().with_predicates(["level"]);
        let s = score(&truth(), &cand, &config);
        assert_eq!(s.counts, Counts::new(0, 0, 1));
        assert_eq!(s.cross_contradictions.len(), 1);
        assert_eq!(s.cross_contradictions[0].kind, ContradictionKind::OppositePolarity);
    }

    #[test]
    fn exclusive_values_conflict() {
        let cand = candidate(vec![
            Fact::new("BETA_CAT", "level", Value::Text("down".into())),
            Fact::new("BETA_CAT", "level", Value::Text("up".into())),
        ]);
        let config = ScoringConfig::default().with_exclusive_predicates(["level"]);
        let s = score(&truth(), &cand, &config);
        assert_eq!(s.internal_contradictions.len(), 1);
        assert_eq!(s.cross_contradictions.len(), 1);
        assert_eq!(s.cross_contradictions[0].kind, ContradictionKind::ExclusiveValues);
    }

    #[test]
    fn summary_micro_and_macro() {
        let perfect = score(&truth(), &candidate(truth().into_iter().collect()), &ScoringConfig::default());
        let empty = score(&truth(), &candidate(vec![]), &ScoringConfig::default());
        let summary = summarize(&[perfect, empty]);
        assert_eq!(summary.scenarios, 2);
        assert_eq!(summary.counts, Counts::new(3, 0, 3));
        assert!((summary.micro_f1 - 2.0 / 3.0).abs() < 1e-12);
        assert!((summary.macro_f1 - 0.5).abs() < 1e-12);
    }
}

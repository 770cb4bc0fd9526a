//! Derivation trees: a fact's primary derivation, followed back to input.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::fact::{Fact, FactId};
use crate::provenance::{ProvenanceGraph, ProvenanceSource};
use crate::rule::{RuleId, RuleNote};
use crate::storage::FactStore;

/// A fact together with the derivation that first produced it.
///
/// Only the first provenance record of each fact is expanded; alternatives
/// remain available through [`ProvenanceGraph::explain`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivationTree {
    /// The explained fact.
    pub id: FactId,
    /// Its content.
    pub fact: Fact,
    /// Round the fact first appeared in.
    pub round: u32,
    /// Asserted, or the rule that concluded it.
    #[serde(flatten)]
    pub source: ProvenanceSource,
    /// Description and citation of the concluding rule.
    #[serde(flatten)]
    pub note: RuleNote,
    /// Trigger facts, expanded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub antecedents: Vec<DerivationTree>,
    /// Guard facts, expanded.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guard_support: Vec<DerivationTree>,
}

impl DerivationTree {
    /// Builds the tree rooted at `id`.
    ///
    /// `notes` supplies rule descriptions and citations; rules missing from
    /// it are rendered bare. Recursion depth is bounded by the fact's origin
    /// round since every accepted record only references older facts.
    #[must_use]
    pub fn build(
        id: FactId,
        store: &FactStore,
        graph: &ProvenanceGraph,
        notes: &BTreeMap<RuleId, RuleNote>,
    ) -> Option<Self> {
        let fact = store.get(id)?.clone();
        let record = graph.explain(id).first()?;
        let expand = |ids: &[FactId]| -> Option<Vec<Self>> {
            ids.iter()
                .map(|child| Self::build(*child, store, graph, notes))
                .collect()
        };
        let note = match &record.source {
            ProvenanceSource::Rule { rule } => notes.get(rule).cloned().unwrap_or_default(),
            ProvenanceSource::Asserted => RuleNote::default(),
        };
        Some(Self {
            id,
            fact,
            round: record.round,
            source: record.source.clone(),
            note,
            antecedents: expand(&record.antecedents)?,
            guard_support: expand(&record.guard_support)?,
        })
    }

    /// Number of rule applications in the tree.
    #[must_use]
    pub fn steps(&self) -> usize {
        let own = usize::from(matches!(self.source, ProvenanceSource::Rule { .. }));
        own + self
            .antecedents
            .iter()
            .chain(&self.guard_support)
            .map(Self::steps)
            .sum::<usize>()
    }

    /// Longest path from this fact down to an asserted fact.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.antecedents
            .iter()
            .chain(&self.guard_support)
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    fn render(&self, f: &mut fmt::Formatter<'_>, indent: usize, label: &str) -> fmt::Result {
        writeln!(
            f,
            "{:indent$}{label}{} {} [{}, round {}]",
            "",
            self.id,
            self.fact,
            self.source,
            self.round,
            indent = indent * 2
        )?;
        if let Some(description) = &self.note.description {
            writeln!(f, "{:indent$}description: {description}", "", indent = indent * 2 + 4)?;
        }
        if let Some(citation) = &self.note.citation {
            writeln!(f, "{:indent$}citation: {citation}", "", indent = indent * 2 + 4)?;
        }
        for child in &self.antecedents {
            child.render(f, indent + 1, "")?;
        }
        for child in &self.guard_support {
            child.render(f, indent + 1, "guard ")?;
        }
        Ok(())
    }
}

impl fmt::Display for DerivationTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, 0, "")
    }
}

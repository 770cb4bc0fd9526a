//! Forward-chaining engine.
//!
//! A run moves through `Initializing -> Iterating(r) -> Fixpoint |
//! IterationBoundReached`. Each round is computed against a snapshot: all
//! applicable rule instances are found first, exception precedence is
//! resolved, and only then are fired conclusions inserted. Facts inserted in
//! round `r` are therefore only visible to round `r + 1`, and the outcome of
//! a round never depends on the order instances are found in.

/// Bounded worker pool for running many scenarios.
pub mod batch;
mod config;
mod result;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::contradiction::ContradictionReport;
use crate::entity::EntityRegistry;
use crate::error::ReasonerResult;
use crate::fact::Fact;
use crate::pattern::Binding;
use crate::provenance::{ProvenanceGraph, ProvenanceRecord};
use crate::rule::RuleId;
use crate::ruleset::{validation, RuleSet};
use crate::storage::{FactStore, InsertOutcome};

pub use config::EngineConfig;
pub use result::{FactView, QueryAnswer, ReasoningResult, RoundSummary, RunStatus, SuppressionRecord};

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Initializing,
    Iterating(u32),
    Done(RunStatus),
}

/// Deterministic forward-chaining engine over an immutable rule set.
///
/// The engine holds no per-run state; every call to [`ReasoningEngine::run`]
/// builds a fresh fact store, so one engine can serve many runs, including
/// concurrently.
///
/// # Examples
///
/// ```
/// use bioreasoner::{
///     Entity, EntityId, EntityRegistry, Fact, FactPattern, ReasoningEngine, Rule, RuleSet,
///     RunStatus, Term,
/// };
///
/// let registry = EntityRegistry::from_entities([Entity::new("A"), Entity::new("B")]).unwrap();
/// let rule = Rule::builder("activation")
///     .when(FactPattern::new(Term::var("X"), "activates", Term::var("Y")))
///     .then(FactPattern::new(Term::var("Y"), "active", Term::value(true)))
///     .build()
///     .unwrap();
/// let engine = ReasoningEngine::with_defaults(RuleSet::new(vec![rule]).unwrap());
///
/// let result = engine
///     .run(&registry, vec![Fact::new("A", "activates", EntityId::new("B"))])
///     .unwrap();
/// assert_eq!(result.status(), RunStatus::Fixpoint);
/// assert!(result.contains(&Fact::new("B", "active", true)));
/// ```
#[derive(Debug, Clone)]
pub struct ReasoningEngine {
    rules: Arc<RuleSet>,
    config: EngineConfig,
}

impl ReasoningEngine {
    /// Creates an engine.
    pub fn new(rules: impl Into<Arc<RuleSet>>, config: EngineConfig) -> ReasonerResult<Self> {
        config.validate()?;
        Ok(Self {
            rules: rules.into(),
            config,
        })
    }

    /// Creates an engine with [`EngineConfig::default`].
    #[must_use]
    pub fn with_defaults(rules: impl Into<Arc<RuleSet>>) -> Self {
        Self {
            rules: rules.into(),
            config: EngineConfig::default(),
        }
    }

    /// The rule set.
    #[must_use]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// The configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs forward chaining to a fixpoint or the round bound.
    ///
    /// Fails before the first round if a fact or rule references an
    /// unregistered entity. Contradictions and the round bound are reported
    /// in the result, never as errors.
    pub fn run(&self, registry: &EntityRegistry, facts: Vec<Fact>) -> ReasonerResult<ReasoningResult> {
        self.rules.validate_against(registry)?;
        for (index, fact) in facts.iter().enumerate() {
            validation::validate_fact(fact, index, registry)?;
        }

        let mut ctx = RunContext::new(&self.rules);
        info!(
            rules = self.rules.len(),
            entities = registry.len(),
            facts = facts.len(),
            max_rounds = self.config.max_rounds,
            tie_break = %self.config.exception_tie_break,
            "starting reasoning run"
        );

        for fact in facts {
            ctx.insert(fact, ProvenanceRecord::asserted())?;
        }
        debug!(
            facts = ctx.store.len(),
            contradictions = ctx.report.len(),
            "loaded input facts"
        );

        while let RunPhase::Iterating(round) = ctx.advance(self.config.max_rounds) {
            let summary = ctx.round(&self.rules, &self.config, round)?;
            debug!(
                round,
                fired = summary.fired,
                suppressed = summary.suppressed,
                inserted = summary.inserted,
                duplicates = summary.duplicates,
                contradictions = summary.contradictions,
                "round complete"
            );
            ctx.summaries.push(summary);
        }

        Ok(ctx.finish(&self.rules))
    }
}

/// Mutable state of one run.
struct RunContext {
    phase: RunPhase,
    store: FactStore,
    provenance: ProvenanceGraph,
    report: ContradictionReport,
    summaries: Vec<RoundSummary>,
    suppressions: Vec<SuppressionRecord>,
    suppressed_seen: BTreeSet<(RuleId, Binding)>,
}

impl RunContext {
    fn new(rules: &RuleSet) -> Self {
        Self {
            phase: RunPhase::Initializing,
            store: FactStore::with_exclusive_predicates(rules.exclusive_predicates().iter().cloned()),
            provenance: ProvenanceGraph::new(),
            report: ContradictionReport::new(),
            summaries: Vec::new(),
            suppressions: Vec::new(),
            suppressed_seen: BTreeSet::new(),
        }
    }

    /// Moves to the next phase based on the last round's summary.
    fn advance(&mut self, max_rounds: u32) -> RunPhase {
        self.phase = match self.phase {
            RunPhase::Initializing => RunPhase::Iterating(1),
            RunPhase::Iterating(round) => {
                let inserted = self.summaries.last().map_or(0, |s| s.inserted);
                if inserted == 0 {
                    RunPhase::Done(RunStatus::Fixpoint)
                } else if round >= max_rounds {
                    RunPhase::Done(RunStatus::IterationBoundReached)
                } else {
                    RunPhase::Iterating(round + 1)
                }
            }
            done @ RunPhase::Done(_) => done,
        };
        self.phase
    }

    /// Inserts a fact and records its provenance and any contradictions.
    fn insert(&mut self, fact: Fact, record: ProvenanceRecord) -> ReasonerResult<InsertOutcome> {
        let round = record.round;
        let outcome = self.store.insert(fact, round);
        self.provenance.add(outcome.id(), record)?;
        if let InsertOutcome::ContradictionDetected { id, conflicts } = &outcome {
            for (existing, kind) in conflicts {
                if self.report.record(*kind, *existing, *id, round) {
                    warn!(
                        round,
                        kind = %kind,
                        existing = %existing,
                        new = %id,
                        "contradiction detected"
                    );
                }
            }
        }
        Ok(outcome)
    }

    fn round(&mut self, rules: &RuleSet, config: &EngineConfig, round: u32) -> ReasonerResult<RoundSummary> {
        let mut summary = RoundSummary {
            round,
            ..RoundSummary::default()
        };

        let instances = rules.applicable_instances(&self.store, config.exception_tie_break);

        let mut fired = Vec::new();
        for (instance, outcome) in instances {
            if outcome.is_fired() {
                fired.push(instance);
                continue;
            }
            summary.suppressed += 1;
            let key = (instance.rule.clone(), instance.binding.clone());
            if self.suppressed_seen.insert(key) {
                debug!(round, rule = %instance.rule, conclusion = %instance.conclusion, ?outcome, "rule instance suppressed");
                self.suppressions.push(SuppressionRecord {
                    round,
                    rule: instance.rule,
                    binding: instance.binding,
                    conclusion: instance.conclusion,
                    outcome,
                });
            }
        }

        summary.fired = fired.len();
        let before = self.report.len();
        for instance in fired {
            let record =
                ProvenanceRecord::derived(instance.rule, round, instance.antecedents, instance.guard_support);
            if self.insert(instance.conclusion, record)?.is_new() {
                summary.inserted += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        summary.contradictions = self.report.len() - before;
        Ok(summary)
    }

    fn finish(self, rules: &RuleSet) -> ReasoningResult {
        let status = match self.phase {
            RunPhase::Done(status) => status,
            // `advance` only stops iterating once a terminal phase is set.
            RunPhase::Initializing | RunPhase::Iterating(_) => RunStatus::IterationBoundReached,
        };
        let rounds = self.summaries.last().map_or(0, |s| s.round);

        match status {
            RunStatus::Fixpoint => info!(
                rounds,
                facts = self.store.len(),
                contradictions = self.report.len(),
                "reasoning reached fixpoint"
            ),
            RunStatus::IterationBoundReached => warn!(
                rounds,
                facts = self.store.len(),
                contradictions = self.report.len(),
                "round bound reached before fixpoint; result may be incomplete"
            ),
        }
        if !self.report.is_empty() {
            warn!(contradictions = self.report.len(), "run finished with contradictions");
        }

        let contradictions = self.report.entries(&self.store, &self.provenance);
        ReasoningResult {
            status,
            rounds,
            store: self.store,
            provenance: self.provenance,
            contradictions,
            round_summaries: self.summaries,
            suppressions: self.suppressions,
            rule_notes: rules.notes(),
        }
    }
}

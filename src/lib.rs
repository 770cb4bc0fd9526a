//! # BioReasoner - Deterministic reasoning over signaling pathways
//!
//! BioReasoner takes a set of biological entities, asserted facts about
//! them, and a rule set describing pathway logic, and forward-chains to a
//! fixpoint. Every derived fact carries provenance back to input facts, and
//! contradictions are reported rather than resolved.
//!
//! ## Core Concepts
//!
//! - **Entity**: a biological actor (gene, protein, complex, pathway node)
//! - **Fact**: `(subject, predicate, object, polarity, context)`
//! - **Rule**: trigger patterns, optional guard, conclusion template,
//!   priority, and an optional base rule it is an exception of
//! - **Provenance**: how every fact was obtained, round by round
//! - **Contradiction**: two stored facts that cannot both hold
//!
//! ## Usage
//!
//! ```rust
//! use bioreasoner::{
//!     Entity, EntityId, EntityRegistry, Fact, FactPattern, ReasoningEngine, Rule, RuleSet, Term,
//! };
//!
//! let registry = EntityRegistry::from_entities([Entity::new("A"), Entity::new("B")])?;
//!
//! let activation = Rule::builder("activation_marks_target_active")
//!     .when(FactPattern::new(Term::var("X"), "activates", Term::var("Y")))
//!     .then(FactPattern::new(Term::var("Y"), "active", Term::value(true)))
//!     .build()?;
//!
//! let engine = ReasoningEngine::with_defaults(RuleSet::new(vec![activation])?);
//! let result = engine.run(&registry, vec![Fact::new("A", "activates", EntityId::new("B"))])?;
//!
//! let tree = result.derivation_chain(&Fact::new("B", "active", true)).unwrap();
//! println!("{tree}");
//! # Ok::<(), bioreasoner::ReasonerError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod entity;
pub mod error;
pub mod fact;
pub mod pattern;
pub mod rule;
pub mod value;

// Rule evaluation
pub mod contradiction;
pub mod inference;
pub mod provenance;
pub mod ruleset;
pub mod storage;

// Runs, scenario files and scoring
pub mod engine;
pub mod scenario;
pub mod scoring;

// Re-export primary types at crate root for convenience
pub use contradiction::{Contradiction, ContradictionEntry, ContradictionKind, ContradictionReport};
pub use engine::batch::{run_batch, BatchConfig, BatchReport};
pub use engine::{EngineConfig, ReasoningEngine, ReasoningResult, RoundSummary, RunStatus};
pub use entity::{Entity, EntityId, EntityKind, EntityRegistry};
pub use error::{BatchError, ReasonerError, ReasonerResult, ScenarioError, ValidationError};
pub use fact::{Context, Fact, FactId, Polarity};
pub use inference::{ExceptionTieBreak, RuleOutcome};
pub use pattern::{Binding, FactPattern, Term, Variable};
pub use provenance::{DerivationTree, ProvenanceGraph, ProvenanceRecord, ProvenanceSource};
pub use rule::{Guard, Rule, RuleBuilder, RuleId, RuleNote};
pub use ruleset::{RuleInstance, RuleSet};
pub use scenario::{load_scenario, load_suite, Scenario, ScenarioDocument};
pub use scoring::{parse_candidate, score, summarize, ScenarioScore, ScoringConfig};
pub use storage::{FactStore, InsertOutcome};
pub use value::Value;

//! Error types for BioReasoner.
//!
//! All errors are strongly typed using thiserror. Load-time problems
//! (malformed rules, unknown entities, bad configuration) surface as
//! [`ValidationError`] before any derivation round runs. Contradictions and
//! the iteration bound are *not* errors: they are carried in the run result.

use std::path::PathBuf;

use thiserror::Error;

use crate::entity::EntityId;
use crate::rule::RuleId;

/// Validation errors raised while loading entities, facts, rules and config.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Rule '{rule}' concludes with variable ?{variable} which is not bound by its trigger")]
    UnboundConclusionVariable {
        rule: RuleId,
        variable: String,
    },

    #[error("Rule '{rule}' concludes about literal {subject}; conclusion subjects must be entities")]
    NonEntitySubject {
        rule: RuleId,
        subject: String,
    },

    #[error("Cyclic exception reference: {}", format_cycle(.cycle))]
    CyclicException {
        cycle: Vec<RuleId>,
    },

    #[error("Duplicate rule id '{rule}'")]
    DuplicateRuleId {
        rule: RuleId,
    },

    #[error("Rule '{rule}' is declared as an exception of unknown rule '{target}'")]
    UnknownExceptionTarget {
        rule: RuleId,
        target: RuleId,
    },

    #[error("Rule '{rule}' has an empty trigger")]
    EmptyTrigger {
        rule: RuleId,
    },

    #[error("Unknown entity '{entity}' referenced by {context}")]
    UnknownEntity {
        entity: EntityId,
        context: String,
    },

    #[error("Entity '{entity}' is registered twice")]
    DuplicateEntity {
        entity: EntityId,
    },

    #[error("Invalid {kind} '{value}'")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
    },

    #[error("Required field '{field}' is missing")]
    MissingField {
        field: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

fn format_cycle(cycle: &[RuleId]) -> String {
    cycle
        .iter()
        .map(RuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Errors raised while reading scenario documents from disk.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON scenario {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse YAML scenario {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Unsupported scenario file extension: {}", .path.display())]
    UnsupportedFormat {
        path: PathBuf,
    },
}

/// Errors raised by the batch runner.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Batch worker pool disconnected")]
    Disconnected,

    #[error("Batch worker stopped before returning scenario '{scenario}'")]
    WorkerLost {
        scenario: String,
    },

    #[error("Failed to spawn batch worker: {message}")]
    Spawn {
        message: String,
    },
}

/// Top-level error type for BioReasoner.
#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Batch error: {0}")]
    Batch(#[from] BatchError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl ReasonerError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a load-time validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a scenario I/O or parse error.
    #[must_use]
    pub const fn is_scenario(&self) -> bool {
        matches!(self, Self::Scenario(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }
}

/// Result type alias for BioReasoner operations.
pub type ReasonerResult<T> = Result<T, ReasonerError>;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::inference::ExceptionTieBreak;

/// Engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on rounds; must be at least 1.
    pub max_rounds: u32,

    /// Resolution of competing exceptions of the same base rule.
    pub exception_tie_break: ExceptionTieBreak,
}

impl EngineConfig {
    /// Default round bound.
    pub const DEFAULT_MAX_ROUNDS: u32 = 50;

    /// Sets the round bound.
    #[must_use]
    pub const fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    /// Sets the exception tie-break policy.
    #[must_use]
    pub const fn with_exception_tie_break(mut self, tie_break: ExceptionTieBreak) -> Self {
        self.exception_tie_break = tie_break;
        self
    }

    /// Checks configuration invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_rounds == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_rounds must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: Self::DEFAULT_MAX_ROUNDS,
            exception_tie_break: ExceptionTieBreak::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_rounds, 50);
        assert_eq!(config.exception_tie_break, ExceptionTieBreak::PriorityOrder);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_rounds_is_invalid() {
        assert!(EngineConfig::default().with_max_rounds(0).validate().is_err());
    }

    #[test]
    fn partial_document_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_rounds": 7}"#).unwrap();
        assert_eq!(config.max_rounds, 7);
        assert_eq!(config.exception_tie_break, ExceptionTieBreak::PriorityOrder);
    }
}

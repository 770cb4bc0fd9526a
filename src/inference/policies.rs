use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// How competing exceptions of the same base rule are resolved.
///
/// Two exceptions are competing when they share a base rule and both
/// survive for the same conclusion slot in one round. Policies are pure, so
/// the winner only depends on the rule set and the fact store snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionTieBreak {
    /// The first rule in priority order wins (priority descending, then
    /// declaration order).
    #[default]
    PriorityOrder,

    /// The rule declared first wins, regardless of priority.
    DeclarationOrder,

    /// Every competing exception fires. Divergent conclusions then show up
    /// in the contradiction report.
    FireAll,
}

impl ExceptionTieBreak {
    /// Short name used on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::PriorityOrder => "priority",
            Self::DeclarationOrder => "declaration",
            Self::FireAll => "fire-all",
        }
    }
}

impl fmt::Display for ExceptionTieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExceptionTieBreak {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" | "priority_order" => Ok(Self::PriorityOrder),
            "declaration" | "declaration_order" => Ok(Self::DeclarationOrder),
            "fire-all" | "fire_all" => Ok(Self::FireAll),
            other => Err(ValidationError::InvalidConfig {
                reason: format!(
                    "unknown exception tie-break '{other}' (expected priority, declaration or fire-all)"
                ),
            }),
        }
    }
}

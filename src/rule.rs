//! Rule definitions.
//!
//! A rule says: when every trigger pattern matches under one consistent
//! binding, and the guard holds, conclude the instantiated conclusion.
//! Rules are immutable once loaded. An exception rule names the base rule it
//! overrides through `exception_of`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::pattern::FactPattern;

/// Stable, human-chosen rule identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Creates a rule ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RuleId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Context precondition of a rule.
///
/// Guard patterns are checked after the trigger is bound. They may reuse
/// trigger variables; any other variable is existential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guard {
    /// Facts that must be present.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<FactPattern>,

    /// Facts that must be absent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forbidden: Vec<FactPattern>,
}

impl Guard {
    /// Returns true if the guard imposes no condition.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.forbidden.is_empty()
    }
}

/// An immutable forward-chaining rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique rule ID.
    pub id: RuleId,

    /// Conjunctive trigger; order is kept for provenance.
    pub trigger: Vec<FactPattern>,

    /// Optional context guard.
    #[serde(default, skip_serializing_if = "Guard::is_empty")]
    pub guard: Guard,

    /// Conclusion template; variables must be bound by the trigger.
    pub conclusion: FactPattern,

    /// Higher fires earlier in rule order.
    #[serde(default)]
    pub priority: i32,

    /// Base rule this rule overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception_of: Option<RuleId>,

    /// Free-text summary, reported with derivations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Literature reference backing the rule.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

/// Description and citation of a rule, attached to explanations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleNote {
    /// Free-text summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Literature reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

impl RuleNote {
    /// Returns true if neither text is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.description.is_none() && self.citation.is_none()
    }
}

impl Rule {
    /// Creates a rule builder.
    #[must_use]
    pub fn builder(id: impl Into<String>) -> RuleBuilder {
        RuleBuilder::new(id)
    }

    /// Returns true if this rule overrides another rule.
    #[must_use]
    pub fn is_exception(&self) -> bool {
        self.exception_of.is_some()
    }

    /// Description and citation, or `None` if the rule carries neither.
    #[must_use]
    pub fn note(&self) -> Option<RuleNote> {
        let note = RuleNote {
            description: self.description.clone(),
            citation: self.citation.clone(),
        };
        (!note.is_empty()).then_some(note)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.id)?;
        for (i, pattern) in self.trigger.iter().enumerate() {
            if i > 0 {
                write!(f, " & ")?;
            }
            write!(f, "{pattern}")?;
        }
        write!(f, " => {}", self.conclusion)
    }
}

/// Builder for [`Rule`].
///
/// # Examples
///
/// ```
/// use bioreasoner::{FactPattern, Rule, Term};
///
/// let rule = Rule::builder("activation_marks_target_active")
///     .when(FactPattern::new(Term::var("X"), "activates", Term::var("Y")))
///     .then(FactPattern::new(Term::var("Y"), "active", Term::value(true)))
///     .priority(10)
///     .build()
///     .unwrap();
/// assert_eq!(rule.trigger.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RuleBuilder {
    id: String,
    trigger: Vec<FactPattern>,
    guard: Guard,
    conclusion: Option<FactPattern>,
    priority: i32,
    exception_of: Option<RuleId>,
    description: Option<String>,
    citation: Option<String>,
}

impl RuleBuilder {
    /// Creates a builder for the given rule ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Adds a trigger pattern.
    #[must_use]
    pub fn when(mut self, pattern: FactPattern) -> Self {
        self.trigger.push(pattern);
        self
    }

    /// Adds a required guard fact.
    #[must_use]
    pub fn requires(mut self, pattern: FactPattern) -> Self {
        self.guard.required.push(pattern);
        self
    }

    /// Adds a forbidden guard fact.
    #[must_use]
    pub fn forbids(mut self, pattern: FactPattern) -> Self {
        self.guard.forbidden.push(pattern);
        self
    }

    /// Sets the conclusion template.
    #[must_use]
    pub fn then(mut self, pattern: FactPattern) -> Self {
        self.conclusion = Some(pattern);
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Declares this rule an exception of `base`.
    #[must_use]
    pub fn exception_of(mut self, base: impl Into<String>) -> Self {
        self.exception_of = Some(RuleId::new(base));
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Sets the citation.
    #[must_use]
    pub fn citation(mut self, text: impl Into<String>) -> Self {
        self.citation = Some(text.into());
        self
    }

    /// Builds the rule, checking that it is well-formed on its own.
    ///
    /// Cross-rule checks (duplicate IDs, exception cycles) happen when the
    /// rule joins a [`crate::RuleSet`].
    pub fn build(self) -> Result<Rule, ValidationError> {
        let conclusion = self.conclusion.ok_or_else(|| ValidationError::MissingField {
            field: "conclusion".to_string(),
        })?;
        let rule = Rule {
            id: RuleId::new(self.id),
            trigger: self.trigger,
            guard: self.guard,
            conclusion,
            priority: self.priority,
            exception_of: self.exception_of,
            description: self.description,
            citation: self.citation,
        };
        crate::ruleset::validation::validate_rule(&rule)?;
        Ok(rule)
    }
}

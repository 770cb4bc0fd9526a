//! Facts: immutable assertions about biological entities.
//!
//! A fact is `(subject, predicate, object, polarity, context)`. Equality is
//! structural over those five fields and ignores how the fact was derived.
//! Two facts that agree on everything except opposite polarities are a
//! contradiction, never a duplicate.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::value::Value;

/// Stable index of a fact inside a run's fact store.
///
/// IDs are assigned in insertion order, which is itself deterministic, so the
/// same scenario always yields the same IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactId(u32);

impl FactId {
    /// Creates a fact ID from an arena index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Direction of an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// The relation holds.
    #[default]
    Positive,
    /// The relation does not hold.
    Negative,
    /// The relation is stated without a direction.
    Neutral,
}

impl Polarity {
    /// Returns the opposing polarity, if any. Neutral opposes nothing.
    #[must_use]
    pub const fn opposite(self) -> Option<Self> {
        match self {
            Self::Positive => Some(Self::Negative),
            Self::Negative => Some(Self::Positive),
            Self::Neutral => None,
        }
    }

    /// Returns true if the two polarities contradict each other.
    #[must_use]
    pub fn opposes(self, other: Self) -> bool {
        self.opposite() == Some(other)
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive => write!(f, "+"),
            Self::Negative => write!(f, "-"),
            Self::Neutral => write!(f, "~"),
        }
    }
}

/// The set of condition entities under which a fact holds.
///
/// An empty context means "unconditionally".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(BTreeSet<EntityId>);

impl Context {
    /// The empty context.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns true if no condition is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates condition entities in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityId> {
        self.0.iter()
    }

    /// Number of condition entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<I: Into<EntityId>> FromIterator<I> for Context {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{id}")?;
        }
        write!(f, "}}")
    }
}

/// An immutable assertion.
///
/// Field order is the sort order used everywhere output must be stable.
///
/// # Examples
///
/// ```
/// use bioreasoner::{Fact, Polarity, Value};
///
/// let fact = Fact::new("A", "activates", Value::Entity("B".into()));
/// assert_eq!(fact.polarity, Polarity::Positive);
/// assert_eq!(fact.to_string(), "(A activates B +)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fact {
    /// The entity the assertion is about.
    pub subject: EntityId,

    /// Relation symbol.
    pub predicate: String,

    /// Related entity or literal.
    pub object: Value,

    /// Direction of the assertion.
    #[serde(default)]
    pub polarity: Polarity,

    /// Conditions under which the assertion holds.
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub context: Context,
}

impl Fact {
    /// Creates a positive, unconditional fact.
    #[must_use]
    pub fn new(subject: impl Into<EntityId>, predicate: impl Into<String>, object: impl Into<Value>) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            polarity: Polarity::Positive,
            context: Context::empty(),
        }
    }

    /// Sets the polarity.
    #[must_use]
    pub fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Sets the context.
    #[must_use]
    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Shorthand for a negative fact.
    #[must_use]
    pub fn negated(self) -> Self {
        self.with_polarity(Polarity::Negative)
    }

    /// Key shared by facts that can contradict through polarity.
    #[must_use]
    pub fn polarity_key(&self) -> PolarityKey {
        PolarityKey {
            subject: self.subject.clone(),
            predicate: self.predicate.clone(),
            object: self.object.clone(),
            context: self.context.clone(),
        }
    }

    /// Key shared by facts competing for the same slot: (subject, predicate, context).
    #[must_use]
    pub fn slot_key(&self) -> SlotKey {
        SlotKey {
            subject: self.subject.clone(),
            predicate: self.predicate.clone(),
            context: self.context.clone(),
        }
    }

    /// All entities this fact mentions (subject, entity object, context).
    pub fn entities(&self) -> impl Iterator<Item = &EntityId> {
        std::iter::once(&self.subject)
            .chain(self.object.as_entity())
            .chain(self.context.iter())
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({} {} {} {}",
            self.subject, self.predicate, self.object, self.polarity
        )?;
        if !self.context.is_empty() {
            write!(f, " | {}", self.context)?;
        }
        write!(f, ")")
    }
}

/// `(subject, predicate, object, context)`: facts differing only in polarity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PolarityKey {
    /// Subject entity.
    pub subject: EntityId,
    /// Relation name.
    pub predicate: String,
    /// Object value.
    pub object: Value,
    /// Qualifiers.
    pub context: Context,
}

/// `(subject, predicate, context)`: the slot an exception rule overrides, and
/// the slot exclusive predicates constrain to a single value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    /// Subject entity.
    pub subject: EntityId,
    /// Relation name.
    pub predicate: String,
    /// Qualifiers.
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub context: Context,
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {}", self.subject, self.predicate)?;
        if !self.context.is_empty() {
            write!(f, " | {}", self.context)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b_active(v: bool) -> Fact {
        Fact::new("B", "active", v)
    }

    #[test]
    fn polarity_opposition() {
        assert!(Polarity::Positive.opposes(Polarity::Negative));
        assert!(Polarity::Negative.opposes(Polarity::Positive));
        assert!(!Polarity::Neutral.opposes(Polarity::Positive));
        assert!(!Polarity::Positive.opposes(Polarity::Positive));
    }

    #[test]
    fn equality_includes_polarity() {
        assert_eq!(b_active(true), b_active(true));
        assert_ne!(b_active(true), b_active(true).negated());
        assert_eq!(b_active(true).polarity_key(), b_active(true).negated().polarity_key());
    }

    #[test]
    fn context_is_order_insensitive() {
        let c1: Context = ["X", "Y"].into_iter().collect();
        let c2: Context = ["Y", "X"].into_iter().collect();
        assert_eq!(c1, c2);
        assert_eq!(format!("{c1}"), "{X, Y}");
    }

    #[test]
    fn slot_key_ignores_object() {
        assert_eq!(b_active(true).slot_key(), b_active(false).slot_key());
    }

    #[test]
    fn fact_display_with_context() {
        let fact = b_active(true).with_context(["HEK293"].into_iter().collect());
        assert_eq!(fact.to_string(), "(B active true + | {HEK293})");
    }

    #[test]
    fn entities_lists_all_mentions() {
        let fact = Fact::new("A", "activates", EntityId::new("B"))
            .with_context(["C"].into_iter().collect());
        let ids: Vec<_> = fact.entities().map(EntityId::as_str).collect();
        assert_eq!(ids, vec!["A", "B", "C"]);
    }

    #[test]
    fn fact_serialization_defaults() {
        let fact: Fact = serde_json::from_value(serde_json::json!({
            "subject": "B",
            "predicate": "active",
            "object": {"type": "bool", "value": true}
        }))
        .unwrap();
        assert_eq!(fact, b_active(true));
    }
}

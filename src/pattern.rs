//! Fact patterns, variables and bindings.
//!
//! Rules match facts through patterns whose subject and object positions may
//! hold variables. Predicate, polarity and context are always constants: a
//! pattern only matches facts with exactly that predicate, polarity and
//! context.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;
use crate::fact::{Context, Fact, Polarity};
use crate::value::Value;

/// A named pattern variable (written `?X` in diagnostics).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variable(String);

impl Variable {
    /// Creates a variable.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the variable name without the `?` sigil.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.0)
    }
}

/// A pattern position: either a variable or a constant value.
///
/// Serialized as `{"var": "X"}` for variables and as a tagged [`Value`] for
/// constants.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Term {
    /// A variable to be bound by matching.
    Var {
        /// The variable.
        var: Variable,
    },
    /// A constant.
    Value(Value),
}

impl Term {
    /// Creates a variable term.
    #[must_use]
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var {
            var: Variable::new(name),
        }
    }

    /// Creates an entity constant term.
    #[must_use]
    pub fn entity(id: impl Into<EntityId>) -> Self {
        Self::Value(Value::Entity(id.into()))
    }

    /// Creates a literal or entity constant term.
    #[must_use]
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    /// Returns the variable, if this term is one.
    #[must_use]
    pub const fn as_var(&self) -> Option<&Variable> {
        match self {
            Self::Var { var } => Some(var),
            Self::Value(_) => None,
        }
    }

    /// Resolves this term under a binding. Unbound variables resolve to `None`.
    #[must_use]
    pub fn resolve(&self, binding: &Binding) -> Option<Value> {
        match self {
            Self::Var { var } => binding.get(var).cloned(),
            Self::Value(v) => Some(v.clone()),
        }
    }

    fn is_bound(&self, bound: &BTreeSet<Variable>) -> bool {
        match self {
            Self::Var { var } => bound.contains(var),
            Self::Value(_) => true,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var { var } => write!(f, "{var}"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

/// A consistent assignment of values to variables.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Binding(BTreeMap<Variable, Value>);

impl Binding {
    /// The empty binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a variable.
    #[must_use]
    pub fn get(&self, var: &Variable) -> Option<&Value> {
        self.0.get(var)
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates bindings in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Value)> {
        self.0.iter()
    }

    /// Unifies `term` with `value`, extending the binding in place.
    ///
    /// Returns false (leaving the binding possibly partially extended) when
    /// the term is a different constant or a variable already bound to a
    /// different value.
    fn unify(&mut self, term: &Term, value: &Value) -> bool {
        match term {
            Term::Value(constant) => constant == value,
            Term::Var { var } => match self.0.get(var) {
                Some(existing) => existing == value,
                None => {
                    self.0.insert(var.clone(), value.clone());
                    true
                }
            },
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (var, value)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{var}={value}")?;
        }
        write!(f, "}}")
    }
}

/// A fact template with variables in subject and object positions.
///
/// # Examples
///
/// ```
/// use bioreasoner::{Binding, Fact, FactPattern, Term, EntityId};
///
/// let pattern = FactPattern::new(Term::var("X"), "activates", Term::var("Y"));
/// let fact = Fact::new("A", "activates", EntityId::new("B"));
///
/// let binding = pattern.match_fact(&fact, &Binding::new()).unwrap();
/// assert_eq!(binding.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FactPattern {
    /// Subject position; must resolve to an entity.
    pub subject: Term,

    /// Constant predicate symbol.
    pub predicate: String,

    /// Object position.
    pub object: Term,

    /// Required polarity.
    #[serde(default)]
    pub polarity: Polarity,

    /// Required context.
    #[serde(default, skip_serializing_if = "Context::is_empty")]
    pub context: Context,
}

impl FactPattern {
    /// Creates a positive, unconditional pattern.
    #[must_use]
    pub fn new(subject: Term, predicate: impl Into<String>, object: Term) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
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

    /// Shorthand for a negative-polarity pattern.
    #[must_use]
    pub fn negated(self) -> Self {
        self.with_polarity(Polarity::Negative)
    }

    /// The pattern that matches exactly `fact`.
    #[must_use]
    pub fn exact(fact: &Fact) -> Self {
        Self {
            subject: Term::Value(Value::Entity(fact.subject.clone())),
            predicate: fact.predicate.clone(),
            object: Term::Value(fact.object.clone()),
            polarity: fact.polarity,
            context: fact.context.clone(),
        }
    }

    /// Variables in subject/object positions, in position order.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        self.subject.as_var().into_iter().chain(self.object.as_var())
    }

    /// Number of positions already fixed given the set of bound variables.
    /// Used to order joins so the most constrained pattern goes first.
    #[must_use]
    pub fn bound_positions(&self, bound: &BTreeSet<Variable>) -> usize {
        usize::from(self.subject.is_bound(bound)) + usize::from(self.object.is_bound(bound))
    }

    /// Matches `fact` against this pattern under `binding`.
    ///
    /// Returns the extended binding on success.
    #[must_use]
    pub fn match_fact(&self, fact: &Fact, binding: &Binding) -> Option<Binding> {
        if self.predicate != fact.predicate
            || self.polarity != fact.polarity
            || self.context != fact.context
        {
            return None;
        }
        let mut extended = binding.clone();
        let subject = Value::Entity(fact.subject.clone());
        if extended.unify(&self.subject, &subject) && extended.unify(&self.object, &fact.object) {
            Some(extended)
        } else {
            None
        }
    }

    /// Builds the concrete fact this pattern denotes under `binding`.
    ///
    /// Returns `None` if a variable is unbound or the subject does not
    /// resolve to an entity; rule set validation rules both out for
    /// conclusions.
    #[must_use]
    pub fn instantiate(&self, binding: &Binding) -> Option<Fact> {
        let Value::Entity(subject) = self.subject.resolve(binding)? else {
            return None;
        };
        let object = self.object.resolve(binding)?;
        Some(Fact {
            subject,
            predicate: self.predicate.clone(),
            object,
            polarity: self.polarity,
            context: self.context.clone(),
        })
    }
}

impl fmt::Display for FactPattern {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn activates(x: Term, y: Term) -> FactPattern {
        FactPattern::new(x, "activates", y)
    }

    #[test]
    fn match_binds_variables() {
        let fact = Fact::new("A", "activates", EntityId::new("B"));
        let binding = activates(Term::var("X"), Term::var("Y"))
            .match_fact(&fact, &Binding::new())
            .unwrap();
        assert_eq!(binding.get(&Variable::new("X")), Some(&Value::Entity("A".into())));
        assert_eq!(binding.get(&Variable::new("Y")), Some(&Value::Entity("B".into())));
    }

    #[test]
    fn match_respects_existing_binding() {
        let fact = Fact::new("A", "activates", EntityId::new("B"));
        let pattern = activates(Term::var("X"), Term::var("Y"));
        let first = pattern.match_fact(&fact, &Binding::new()).unwrap();

        let other = Fact::new("C", "activates", EntityId::new("B"));
        assert!(pattern.match_fact(&other, &first).is_none());
        assert!(pattern.match_fact(&fact, &first).is_some());
    }

    #[test]
    fn repeated_variable_must_agree() {
        let pattern = activates(Term::var("X"), Term::var("X"));
        let self_loop = Fact::new("A", "activates", EntityId::new("A"));
        let edge = Fact::new("A", "activates", EntityId::new("B"));
        assert!(pattern.match_fact(&self_loop, &Binding::new()).is_some());
        assert!(pattern.match_fact(&edge, &Binding::new()).is_none());
    }

    #[test]
    fn match_checks_polarity_and_context() {
        let pattern = activates(Term::var("X"), Term::var("Y"));
        let negative = Fact::new("A", "activates", EntityId::new("B")).negated();
        let contextual = Fact::new("A", "activates", EntityId::new("B"))
            .with_context(["HEK293"].into_iter().collect());
        assert!(pattern.match_fact(&negative, &Binding::new()).is_none());
        assert!(pattern.match_fact(&contextual, &Binding::new()).is_none());
        assert!(pattern
            .clone()
            .negated()
            .match_fact(&negative, &Binding::new())
            .is_some());
    }

    #[test]
    fn instantiate_requires_entity_subject() {
        let pattern = FactPattern::new(Term::var("Y"), "active", Term::value(true));
        let mut binding = Binding::new();
        assert!(pattern.instantiate(&binding).is_none());

        binding.unify(&Term::var("Y"), &Value::Entity("B".into()));
        let fact = pattern.instantiate(&binding).unwrap();
        assert_eq!(fact, Fact::new("B", "active", true));

        let mut literal = Binding::new();
        literal.unify(&Term::var("Y"), &Value::Int(1));
        assert!(pattern.instantiate(&literal).is_none());
    }

    #[test]
    fn bound_positions() {
        let pattern = activates(Term::var("X"), Term::entity("B"));
        let mut bound = BTreeSet::new();
        assert_eq!(pattern.bound_positions(&bound), 1);
        bound.insert(Variable::new("X"));
        assert_eq!(pattern.bound_positions(&bound), 2);
    }

    #[test]
    fn term_serialization() {
        let var: Term = serde_json::from_value(serde_json::json!({"var": "X"})).unwrap();
        assert_eq!(var, Term::var("X"));
        let constant: Term =
            serde_json::from_value(serde_json::json!({"type": "bool", "value": true})).unwrap();
        assert_eq!(constant, Term::value(true));
    }

    #[test]
    fn pattern_display() {
        let pattern = activates(Term::var("X"), Term::entity("B"));
        assert_eq!(pattern.to_string(), "(?X activates B +)");
    }
}

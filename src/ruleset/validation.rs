//! Load-time validation of identifiers, rules and rule sets.
//!
//! Every invariant the engine relies on at evaluation time is checked here,
//! before the first round: conclusions only use trigger variables, exception
//! references resolve and never loop, and rule IDs are unique.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;

use crate::entity::EntityRegistry;
use crate::error::ValidationError;
use crate::fact::Fact;
use crate::pattern::{FactPattern, Term, Variable};
use crate::rule::{Rule, RuleId};
use crate::value::Value;

/// Conservative upper bound for identifier lengths.
pub const MAX_IDENTIFIER_LEN: usize = 256;

/// Conservative upper bound for trigger arity.
pub const MAX_TRIGGER_PATTERNS: usize = 32;

const SYMBOL_PATTERN: &str = r"^[A-Za-z0-9_][A-Za-z0-9_\-.:/+]*$";
const VARIABLE_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

static SYMBOL_RE: OnceLock<Regex> = OnceLock::new();
static VARIABLE_RE: OnceLock<Regex> = OnceLock::new();

fn symbol_re() -> &'static Regex {
    SYMBOL_RE.get_or_init(|| Regex::new(SYMBOL_PATTERN).expect("symbol pattern compiles"))
}

fn variable_re() -> &'static Regex {
    VARIABLE_RE.get_or_init(|| Regex::new(VARIABLE_PATTERN).expect("variable pattern compiles"))
}

fn validate_symbol(kind: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.len() > MAX_IDENTIFIER_LEN || !symbol_re().is_match(value) {
        return Err(ValidationError::InvalidIdentifier {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Validates an entity name.
pub fn validate_entity_name(name: &str) -> Result<(), ValidationError> {
    validate_symbol("entity id", name)
}

/// Validates a predicate symbol.
pub fn validate_predicate(predicate: &str) -> Result<(), ValidationError> {
    validate_symbol("predicate", predicate)
}

fn validate_variable(var: &Variable) -> Result<(), ValidationError> {
    if var.name().len() > MAX_IDENTIFIER_LEN || !variable_re().is_match(var.name()) {
        return Err(ValidationError::InvalidIdentifier {
            kind: "variable",
            value: var.name().to_string(),
        });
    }
    Ok(())
}

fn validate_pattern(pattern: &FactPattern) -> Result<(), ValidationError> {
    validate_predicate(&pattern.predicate)?;
    match &pattern.subject {
        Term::Var { var } => validate_variable(var)?,
        Term::Value(Value::Entity(id)) => validate_entity_name(id.as_str())?,
        Term::Value(other) => {
            return Err(ValidationError::InvalidIdentifier {
                kind: "pattern subject",
                value: other.to_string(),
            })
        }
    }
    if let Some(var) = pattern.object.as_var() {
        validate_variable(var)?;
    }
    for id in pattern.context.iter() {
        validate_entity_name(id.as_str())?;
    }
    Ok(())
}

/// Validates a single rule in isolation.
///
/// # Checks
/// - identifiers are well-formed
/// - the trigger is non-empty
/// - every conclusion variable is bound by the trigger
/// - a constant conclusion subject is an entity (a variable subject bound
///   to a literal yields no instance at match time)
pub fn validate_rule(rule: &Rule) -> Result<(), ValidationError> {
    validate_symbol("rule id", rule.id.as_str())?;
    if let Some(base) = &rule.exception_of {
        validate_symbol("rule id", base.as_str())?;
    }
    if rule.trigger.is_empty() {
        return Err(ValidationError::EmptyTrigger {
            rule: rule.id.clone(),
        });
    }
    if rule.trigger.len() > MAX_TRIGGER_PATTERNS {
        return Err(ValidationError::InvalidConfig {
            reason: format!(
                "rule '{}' has {} trigger patterns (max {MAX_TRIGGER_PATTERNS})",
                rule.id,
                rule.trigger.len()
            ),
        });
    }

    if let Term::Value(subject) = &rule.conclusion.subject {
        if !subject.is_entity() {
            return Err(ValidationError::NonEntitySubject {
                rule: rule.id.clone(),
                subject: subject.to_string(),
            });
        }
    }

    for pattern in rule
        .trigger
        .iter()
        .chain(&rule.guard.required)
        .chain(&rule.guard.forbidden)
        .chain(std::iter::once(&rule.conclusion))
    {
        validate_pattern(pattern)?;
    }

    let trigger_vars: BTreeSet<&Variable> = rule.trigger.iter().flat_map(FactPattern::variables).collect();
    for var in rule.conclusion.variables() {
        if !trigger_vars.contains(var) {
            return Err(ValidationError::UnboundConclusionVariable {
                rule: rule.id.clone(),
                variable: var.name().to_string(),
            });
        }
    }

    Ok(())
}

/// Validates cross-rule invariants: unique IDs, known exception targets and
/// acyclic exception chains.
pub fn validate_rule_set(rules: &[Rule]) -> Result<(), ValidationError> {
    let mut by_id: HashMap<&RuleId, &Rule> = HashMap::with_capacity(rules.len());
    for rule in rules {
        validate_rule(rule)?;
        if by_id.insert(&rule.id, rule).is_some() {
            return Err(ValidationError::DuplicateRuleId {
                rule: rule.id.clone(),
            });
        }
    }

    for rule in rules {
        if let Some(target) = &rule.exception_of {
            if !by_id.contains_key(target) {
                return Err(ValidationError::UnknownExceptionTarget {
                    rule: rule.id.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    for rule in rules {
        let mut chain: Vec<RuleId> = vec![rule.id.clone()];
        let mut current = rule;
        while let Some(base_id) = &current.exception_of {
            if let Some(pos) = chain.iter().position(|id| id == base_id) {
                let mut cycle = chain[pos..].to_vec();
                cycle.push(base_id.clone());
                return Err(ValidationError::CyclicException { cycle });
            }
            chain.push(base_id.clone());
            // Targets were checked above.
            let Some(base) = by_id.get(base_id) else { break };
            current = base;
        }
    }
    Ok(())
}

/// Checks that every entity constant in the rules is registered.
pub fn validate_rule_entities(rules: &[Rule], registry: &EntityRegistry) -> Result<(), ValidationError> {
    for rule in rules {
        let patterns = rule
            .trigger
            .iter()
            .chain(&rule.guard.required)
            .chain(&rule.guard.forbidden)
            .chain(std::iter::once(&rule.conclusion));
        for pattern in patterns {
            let constants = [&pattern.subject, &pattern.object]
                .into_iter()
                .filter_map(|t| match t {
                    Term::Value(Value::Entity(id)) => Some(id),
                    _ => None,
                })
                .chain(pattern.context.iter());
            for id in constants {
                registry.require(id, || format!("rule '{}'", rule.id))?;
            }
        }
    }
    Ok(())
}

/// Validates an input fact: well-formed predicate and registered entities.
pub fn validate_fact(fact: &Fact, index: usize, registry: &EntityRegistry) -> Result<(), ValidationError> {
    validate_predicate(&fact.predicate)?;
    for id in fact.entities() {
        registry.require(id, || format!("input fact #{index} {fact}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Entity;

    fn pattern(s: Term, p: &str, o: Term) -> FactPattern {
        FactPattern::new(s, p, o)
    }

    fn simple_rule(id: &str, base: Option<&str>) -> Rule {
        Rule {
            id: RuleId::new(id),
            trigger: vec![pattern(Term::var("X"), "activates", Term::var("Y"))],
            guard: crate::rule::Guard::default(),
            conclusion: pattern(Term::var("Y"), "active", Term::value(true)),
            priority: 0,
            exception_of: base.map(RuleId::new),
            description: None,
            citation: None,
        }
    }

    #[test]
    fn identifiers_are_checked() {
        assert!(validate_entity_name("BETA_CAT").is_ok());
        assert!(validate_entity_name("p-AKT:S473").is_ok());
        assert!(validate_entity_name("").is_err());
        assert!(validate_entity_name("two words").is_err());
        assert!(validate_predicate("?x").is_err());
    }

    #[test]
    fn literal_subject_is_rejected() {
        let mut rule = simple_rule("r", None);
        rule.trigger[0].subject = Term::value(3);
        assert!(matches!(
            validate_rule(&rule),
            Err(ValidationError::InvalidIdentifier { kind: "pattern subject", .. })
        ));
    }

    #[test]
    fn literal_conclusion_subject_is_rejected() {
        let mut rule = simple_rule("r", None);
        rule.conclusion.subject = Term::value(true);
        let err = validate_rule(&rule).unwrap_err();
        assert!(matches!(err, ValidationError::NonEntitySubject { .. }));
    }

    #[test]
    fn conclusion_subject_may_come_from_object_position() {
        let mut rule = simple_rule("r", None);
        rule.trigger = vec![pattern(Term::var("X"), "activates", Term::var("Y"))];
        rule.conclusion = pattern(Term::var("Y"), "active", Term::value(true));
        assert!(validate_rule(&rule).is_ok());
    }

    #[test]
    fn empty_trigger_is_rejected() {
        let mut rule = simple_rule("r", None);
        rule.trigger.clear();
        assert!(matches!(validate_rule(&rule), Err(ValidationError::EmptyTrigger { .. })));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let rules = vec![simple_rule("r", None), simple_rule("r", None)];
        assert!(matches!(
            validate_rule_set(&rules),
            Err(ValidationError::DuplicateRuleId { .. })
        ));
    }

    #[test]
    fn unknown_exception_target_is_rejected() {
        let rules = vec![simple_rule("e", Some("missing"))];
        assert!(matches!(
            validate_rule_set(&rules),
            Err(ValidationError::UnknownExceptionTarget { .. })
        ));
    }

    #[test]
    fn exception_cycles_are_rejected() {
        let rules = vec![
            simple_rule("a", Some("b")),
            simple_rule("b", Some("c")),
            simple_rule("c", Some("a")),
        ];
        let err = validate_rule_set(&rules).unwrap_err();
        let ValidationError::CyclicException { cycle } = err else {
            panic!("expected cycle error");
        };
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);
    }

    #[test]
    fn self_exception_is_a_cycle() {
        let rules = vec![simple_rule("a", Some("a"))];
        assert!(matches!(
            validate_rule_set(&rules),
            Err(ValidationError::CyclicException { .. })
        ));
    }

    #[test]
    fn rule_entities_must_be_registered() {
        let mut rule = simple_rule("r", None);
        rule.trigger[0].subject = Term::entity("WNT");
        rule.conclusion.subject = Term::var("Y");
        rule.trigger[0].object = Term::var("Y");
        let registry = EntityRegistry::from_entities([Entity::new("LRP6")]).unwrap();
        let err = validate_rule_entities(&[rule], &registry).unwrap_err();
        assert!(matches!(err, ValidationError::UnknownEntity { .. }));
    }

    #[test]
    fn facts_must_reference_registered_entities() {
        let registry = EntityRegistry::from_entities([Entity::new("A")]).unwrap();
        let ok = Fact::new("A", "mutated", true);
        let bad = Fact::new("A", "activates", crate::entity::EntityId::new("B"));
        assert!(validate_fact(&ok, 0, &registry).is_ok());
        assert!(validate_fact(&bad, 1, &registry).is_err());
    }
}

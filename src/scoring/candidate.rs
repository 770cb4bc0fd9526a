//! Parsing of candidate answers (e.g. model output) into facts.
//!
//! The expected shape is `{"facts": [...]}` where each entry is either a
//! fact object or a compact `SUBJECT__PREDICATE__OBJECT` string. Text around
//! the object is tolerated: the first balanced `{...}` is extracted. Problems
//! are collected as soft errors instead of failing the whole parse.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::fact::Fact;
use crate::scoring::ScoringConfig;
use crate::value::Value;

const FACTS_KEY: &str = "facts";
const COMPACT_SEPARATOR: &str = "__";

/// Facts recovered from a candidate answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedCandidate {
    /// Facts parsed successfully.
    pub facts: BTreeSet<Fact>,
    /// One message per rejected item.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Returns the first top-level `{...}` by brace matching.
///
/// Braces inside JSON strings are skipped.
fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_compact(entry: &str) -> Option<Fact> {
    let mut parts = entry.trim().splitn(3, COMPACT_SEPARATOR);
    let subject = parts.next().filter(|s| !s.is_empty())?;
    let predicate = parts.next().filter(|s| !s.is_empty())?;
    let object = parts.next().filter(|s| !s.is_empty())?;
    let object = match object {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        other => other
            .parse::<i64>()
            .map_or_else(|_| Value::Text(other.to_string()), Value::Int),
    };
    Some(Fact::new(subject, predicate, object))
}

/// Parses a candidate answer.
///
/// Predicates are normalized through `config.predicate_synonyms`.
#[must_use]
pub fn parse_candidate(text: &str, config: &ScoringConfig) -> ParsedCandidate {
    let mut parsed = ParsedCandidate::default();

    let trimmed = text.trim();
    let document: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => match extract_object(trimmed) {
            None => {
                parsed.errors.push("no JSON object found in candidate output".to_string());
                return parsed;
            }
            Some(fragment) => match serde_json::from_str(fragment) {
                Ok(value) => value,
                Err(e) => {
                    parsed.errors.push(format!("failed to parse extracted JSON object: {e}"));
                    return parsed;
                }
            },
        },
    };

    let Some(object) = document.as_object() else {
        parsed.errors.push("top-level JSON value is not an object".to_string());
        return parsed;
    };
    let Some(entries) = object.get(FACTS_KEY) else {
        parsed.errors.push(format!("JSON object is missing '{FACTS_KEY}'"));
        return parsed;
    };
    let Some(entries) = entries.as_array() else {
        parsed.errors.push(format!("'{FACTS_KEY}' is not a list"));
        return parsed;
    };

    for (index, entry) in entries.iter().enumerate() {
        let fact = match entry {
            serde_json::Value::String(compact) => parse_compact(compact).ok_or_else(|| {
                format!("fact #{index}: '{compact}' is not SUBJECT{COMPACT_SEPARATOR}PREDICATE{COMPACT_SEPARATOR}OBJECT")
            }),
            serde_json::Value::Object(_) => {
                serde_json::from_value::<Fact>(entry.clone()).map_err(|e| format!("fact #{index}: {e}"))
            }
            other => Err(format!("fact #{index}: ignoring non-fact entry {other}")),
        };
        match fact {
            Ok(mut fact) => {
                if let Some(canonical) = config.predicate_synonyms.get(&fact.predicate) {
                    fact.predicate.clone_from(canonical);
                }
                parsed.facts.insert(fact);
            }
            Err(message) => parsed.errors.push(message),
        }
    }
    parsed
}

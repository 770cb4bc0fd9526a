//! Scenario documents: entities, input facts and rules in one file.
//!
//! Documents are read from `.json`, `.yaml` or `.yml` files and validated
//! into a [`Scenario`] before anything runs. A scenario is self-contained,
//! so independent scenarios can run in parallel without sharing state.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::engine::{EngineConfig, QueryAnswer, ReasoningEngine, ReasoningResult};
use crate::entity::{Entity, EntityRegistry};
use crate::error::{ReasonerResult, ScenarioError, ValidationError};
use crate::fact::Fact;
use crate::pattern::FactPattern;
use crate::rule::Rule;
use crate::ruleset::{validation, RuleSet};

/// A named query answered after the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioQuery {
    /// Key the answers are reported under.
    pub name: String,
    /// Pattern matched against the final store.
    pub pattern: FactPattern,
}

/// Serialized form of a scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioDocument {
    /// Scenario name.
    pub name: String,

    /// Free-text summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Free-form annotations (source, curator, ...), echoed in reports.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,

    /// Entities the facts and rules may mention.
    #[serde(default)]
    pub entities: Vec<Entity>,

    /// Asserted input facts.
    #[serde(default)]
    pub facts: Vec<Fact>,

    /// Rule definitions, in declaration order.
    #[serde(default)]
    pub rules: Vec<Rule>,

    /// Predicates that admit a single positive value per (subject, context).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusive_predicates: Vec<String>,

    /// Named queries answered after the run.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<ScenarioQuery>,

    /// Overrides the engine's round bound for this scenario.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
}

impl ScenarioDocument {
    /// Parses a JSON document.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Parses a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    /// Validates the document into a runnable scenario.
    ///
    /// # Checks
    /// - entity names are well-formed and unique
    /// - rules are well-formed, IDs unique, exception chains acyclic
    /// - every fact and rule constant names a registered entity
    /// - query patterns use well-formed identifiers
    pub fn into_scenario(self) -> Result<Scenario, ValidationError> {
        let entities = EntityRegistry::from_entities(self.entities)?;
        let rules = RuleSet::new(self.rules)?.with_exclusive_predicates(self.exclusive_predicates)?;
        rules.validate_against(&entities)?;
        for (index, fact) in self.facts.iter().enumerate() {
            validation::validate_fact(fact, index, &entities)?;
        }
        for query in &self.queries {
            validation::validate_predicate(&query.pattern.predicate)?;
        }
        if self.max_rounds == Some(0) {
            return Err(ValidationError::InvalidConfig {
                reason: format!("scenario '{}' sets max_rounds to 0", self.name),
            });
        }

        Ok(Scenario {
            name: self.name,
            description: self.description,
            metadata: self.metadata,
            entities,
            facts: self.facts,
            rules: Arc::new(rules),
            queries: self.queries,
            max_rounds: self.max_rounds,
        })
    }
}

/// A validated scenario.
#[derive(Debug, Clone)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Free-text summary.
    pub description: Option<String>,
    /// Arbitrary key/value annotations.
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Registered entities.
    pub entities: EntityRegistry,
    /// Asserted input facts.
    pub facts: Vec<Fact>,
    /// Validated rule set.
    pub rules: Arc<RuleSet>,
    /// Named queries answered after the run.
    pub queries: Vec<ScenarioQuery>,
    /// Round bound overriding the engine default.
    pub max_rounds: Option<u32>,
}

impl Scenario {
    /// The engine configuration for this scenario: `base` with the
    /// scenario's round bound applied.
    #[must_use]
    pub fn engine_config(&self, base: &EngineConfig) -> EngineConfig {
        match self.max_rounds {
            Some(max_rounds) => base.with_max_rounds(max_rounds),
            None => *base,
        }
    }

    /// Runs the scenario.
    pub fn run(&self, base: &EngineConfig) -> ReasonerResult<ReasoningResult> {
        let engine = ReasoningEngine::new(Arc::clone(&self.rules), self.engine_config(base))?;
        engine.run(&self.entities, self.facts.clone())
    }

    /// Answers the scenario's queries against a result.
    #[must_use]
    pub fn answer_queries(&self, result: &ReasoningResult) -> BTreeMap<String, Vec<QueryAnswer>> {
        self.queries
            .iter()
            .map(|q| (q.name.clone(), result.query(&q.pattern)))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }
}

/// Reads and parses a scenario file, choosing the format by extension.
pub fn load_document(path: impl AsRef<Path>) -> Result<ScenarioDocument, ScenarioError> {
    let path = path.as_ref();
    let format = Format::of(path).ok_or_else(|| ScenarioError::UnsupportedFormat {
        path: path.to_path_buf(),
    })?;

    let text = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), bytes = text.len(), ?format, "read scenario file");

    match format {
        Format::Json => ScenarioDocument::from_json(&text).map_err(|source| ScenarioError::Json {
            path: path.to_path_buf(),
            source,
        }),
        Format::Yaml => ScenarioDocument::from_yaml(&text).map_err(|source| ScenarioError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Reads, parses and validates a scenario file.
pub fn load_scenario(path: impl AsRef<Path>) -> ReasonerResult<Scenario> {
    Ok(load_document(path)?.into_scenario()?)
}

/// Loads every scenario file in a directory, in file-name order.
///
/// Files with other extensions are skipped.
pub fn load_suite(dir: impl AsRef<Path>) -> ReasonerResult<Vec<Scenario>> {
    let dir = dir.as_ref();
    let entries = fs::read_dir(dir).map_err(|source| ScenarioError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| ScenarioError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if Format::of(&path).is_some() && path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();
    paths.iter().map(load_scenario).collect()
}

//! BioReasoner command line.
//!
//! Commands:
//! - bioreasoner run --scenario <file>
//! - bioreasoner score --scenario <file> --candidate <file>
//! - bioreasoner batch --suite <dir>
//!
//! Output is JSON, written to `--out` or stdout (`-`). Logs go to stderr and
//! are filtered through `RUST_LOG` (default `info`).

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use bioreasoner::scoring::{ground_truth, ScoringConfig};
use bioreasoner::{
    load_scenario, load_suite, parse_candidate, run_batch, score, BatchConfig, EngineConfig,
    ExceptionTieBreak, ReasonerError, Scenario,
};

/// Deterministic forward-chaining over biological signaling scenarios
#[derive(Parser, Debug)]
#[command(name = "bioreasoner")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    engine: EngineArgs,

    #[command(subcommand)]
    command: Command,
}

/// Engine options shared by every command. A scenario's own `max_rounds`
/// takes precedence over these.
#[derive(Args, Debug)]
struct EngineArgs {
    /// Maximum number of derivation rounds
    #[arg(long, global = true, env = "BIOREASONER_MAX_ROUNDS")]
    max_rounds: Option<u32>,

    /// How competing exceptions are resolved: priority, declaration, fire-all
    #[arg(long, global = true, env = "BIOREASONER_TIE_BREAK")]
    tie_break: Option<ExceptionTieBreak>,
}

impl EngineArgs {
    fn config(&self) -> EngineConfig {
        let mut config = EngineConfig::default();
        if let Some(max_rounds) = self.max_rounds {
            config = config.with_max_rounds(max_rounds);
        }
        if let Some(tie_break) = self.tie_break {
            config = config.with_exception_tie_break(tie_break);
        }
        config
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scenario and print its facts, provenance and contradictions
    Run {
        /// Scenario file (.json, .yaml, .yml)
        #[arg(long)]
        scenario: PathBuf,

        /// Output file, `-` for stdout
        #[arg(long, default_value = "-")]
        out: PathBuf,

        /// Include a rendered derivation tree for every derived fact
        #[arg(long)]
        explain: bool,
    },

    /// Score a candidate answer against a scenario's derived facts
    Score {
        /// Scenario file (.json, .yaml, .yml)
        #[arg(long)]
        scenario: PathBuf,

        /// Candidate answer: a `{"facts": [...]}` object, possibly wrapped in prose
        #[arg(long)]
        candidate: PathBuf,

        /// Output file, `-` for stdout
        #[arg(long, default_value = "-")]
        out: PathBuf,

        /// Restrict scoring to these predicates (repeatable)
        #[arg(long = "predicate")]
        predicates: Vec<String>,

        /// Map a candidate predicate to a canonical one, as FROM=TO (repeatable)
        #[arg(long = "synonym", value_parser = parse_synonym)]
        synonyms: Vec<(String, String)>,

        /// Also expect asserted input facts
        #[arg(long)]
        include_asserted: bool,
    },

    /// Run every scenario file in a directory on a worker pool
    Batch {
        /// Directory of scenario files
        #[arg(long)]
        suite: PathBuf,

        /// Worker threads (default: available parallelism)
        #[arg(long)]
        workers: Option<usize>,

        /// Output file, `-` for stdout
        #[arg(long, default_value = "-")]
        out: PathBuf,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Reasoner(#[from] ReasonerError),

    #[error("Failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

fn parse_synonym(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((from, to)) if !from.is_empty() && !to.is_empty() => Ok((from.to_string(), to.to_string())),
        _ => Err(format!("expected FROM=TO, got '{raw}'")),
    }
}

fn write_json(out: &Path, value: &impl Serialize) -> Result<(), CliError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    if out == Path::new("-") {
        let mut stdout = io::stdout().lock();
        return stdout.write_all(text.as_bytes()).map_err(|source| CliError::Write {
            path: out.to_path_buf(),
            source,
        });
    }
    fs::write(out, text).map_err(|source| CliError::Write {
        path: out.to_path_buf(),
        source,
    })?;
    info!(path = %out.display(), "wrote output");
    Ok(())
}

fn run(scenario: &Path, out: &Path, explain: bool, base: &EngineConfig) -> Result<(), CliError> {
    let scenario = load_scenario(scenario)?;
    let result = scenario.run(base)?;

    let mut output = json!({
        "scenario": scenario.name,
        "description": scenario.description,
        "metadata": scenario.metadata,
        "fingerprint": result.fingerprint()?,
        "result": result.to_json()?,
        "queries": scenario.answer_queries(&result),
    });
    if explain {
        let explanations: BTreeMap<String, String> = result
            .derived()
            .filter_map(|view| {
                let tree = result.derivation_tree(view.id)?;
                Some((view.fact.to_string(), tree.to_string()))
            })
            .collect();
        output["explanations"] = json!(explanations);
    }
    write_json(out, &output)
}

struct ScoreArgs {
    scenario: PathBuf,
    candidate: PathBuf,
    out: PathBuf,
    predicates: Vec<String>,
    synonyms: Vec<(String, String)>,
    include_asserted: bool,
}

fn score_candidate(args: ScoreArgs, base: &EngineConfig) -> Result<(), CliError> {
    let scenario: Scenario = load_scenario(&args.scenario)?;
    let result = scenario.run(base)?;

    let mut config = ScoringConfig {
        include_asserted: args.include_asserted,
        predicate_synonyms: args.synonyms.into_iter().collect(),
        ..ScoringConfig::default()
    }
    .with_exclusive_predicates(scenario.rules.exclusive_predicates().iter().cloned());
    if !args.predicates.is_empty() {
        config = config.with_predicates(args.predicates);
    }

    let text = fs::read_to_string(&args.candidate).map_err(|source| CliError::Read {
        path: args.candidate.clone(),
        source,
    })?;
    let candidate = parse_candidate(&text, &config);
    let truth = ground_truth(&result, &config);
    let scored = score(&truth, &candidate, &config);
    info!(
        scenario = %scenario.name,
        micro_f1 = scored.micro_f1,
        macro_f1 = scored.macro_f1,
        parse_errors = scored.parse_errors.len(),
        "scored candidate"
    );

    write_json(
        &args.out,
        &json!({
            "scenario": scenario.name,
            "status": result.status(),
            "score": scored,
        }),
    )
}

fn batch(suite: &Path, workers: Option<usize>, out: &Path, base: &EngineConfig) -> Result<(), CliError> {
    let scenarios = load_suite(suite)?;
    let mut config = BatchConfig::default();
    if let Some(workers) = workers {
        config = config.with_workers(workers);
    }
    let report = run_batch(scenarios, base, &config).map_err(ReasonerError::from)?;
    write_json(
        out,
        &json!({
            "started_at": report.started_at,
            "finished_at": report.finished_at,
            "failed": report.failed(),
            "scenarios": report.summaries(),
        }),
    )
}

fn dispatch(cli: Cli) -> Result<(), CliError> {
    let base = cli.engine.config();
    base.validate().map_err(ReasonerError::from)?;
    match cli.command {
        Command::Run { scenario, out, explain } => run(&scenario, &out, explain, &base),
        Command::Score {
            scenario,
            candidate,
            out,
            predicates,
            synonyms,
            include_asserted,
        } => score_candidate(
            ScoreArgs {
                scenario,
                candidate,
                out,
                predicates,
                synonyms,
                include_asserted,
            },
            &base,
        ),
        Command::Batch { suite, workers, out } => batch(&suite, workers, &out, &base),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    match dispatch(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

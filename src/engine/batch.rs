//! Bounded, thread-based batch runner.
//!
//! Scenarios are independent: each job owns its scenario and builds its own
//! fact store, so workers share nothing but the job queue. Results are
//! returned in input order regardless of completion order.

use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::engine::{EngineConfig, ReasoningResult, RunStatus};
use crate::error::{BatchError, ReasonerResult};
use crate::scenario::Scenario;

/// Batch runner configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of worker threads.
    pub workers: usize,
    /// Maximum queued jobs.
    pub queue_capacity: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map_or(2, std::num::NonZeroUsize::get),
            queue_capacity: 64,
        }
    }
}

impl BatchConfig {
    /// Sets the worker count (at least one worker always runs).
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

type Reply = (usize, ReasonerResult<ReasoningResult>);

struct Job {
    index: usize,
    scenario: Scenario,
    reply: Sender<Reply>,
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize, config: EngineConfig) -> Result<Self, BatchError> {
        let workers = workers.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity.max(1));

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("bioreasoner-batch-{idx}"))
                .spawn(move || {
                    while let Ok(Job { index, scenario, reply }) = rx.recv() {
                        debug!(worker = idx, scenario = %scenario.name, "running scenario");
                        let result = scenario.run(&config);
                        let _ = reply.send((index, result));
                    }
                })
                .map_err(|e| BatchError::Spawn {
                    message: e.to_string(),
                })?;
            handles.push(handle);
        }

        Ok(Self { tx, workers: handles })
    }

    fn submit(&self, job: Job) -> Result<(), BatchError> {
        self.tx.send(job).map_err(|_| BatchError::Disconnected)
    }

    fn shutdown(self) {
        // Closing the queue lets workers drain remaining jobs and exit.
        drop(self.tx);
        for handle in self.workers {
            if handle.join().is_err() {
                warn!("batch worker panicked");
            }
        }
    }
}

/// Outcome of one scenario in a batch.
#[derive(Debug)]
pub struct BatchEntry {
    /// Position in the input.
    pub index: usize,
    /// Scenario name.
    pub name: String,
    /// The run result, or why the scenario could not run.
    pub outcome: ReasonerResult<ReasoningResult>,
}

/// Results of a batch, in input order.
#[derive(Debug)]
pub struct BatchReport {
    /// When the first scenario was queued.
    pub started_at: DateTime<Utc>,
    /// When the last result was collected.
    pub finished_at: DateTime<Utc>,
    /// One entry per input scenario.
    pub entries: Vec<BatchEntry>,
}

/// Serializable one-line summary of a batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntrySummary {
    /// Scenario name.
    pub name: String,
    /// How the run ended; absent when it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    /// Rounds executed.
    pub rounds: u32,
    /// Facts in the final store.
    pub facts: usize,
    /// Facts produced only by rules.
    pub derived: usize,
    /// Contradiction pairs reported.
    pub contradictions: usize,
    /// Result fingerprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchReport {
    /// Entries whose run succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &ReasoningResult)> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.as_ref().ok().map(|r| (e.name.as_str(), r)))
    }

    /// Number of entries whose run failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_err()).count()
    }

    /// Per-scenario summaries, in input order.
    #[must_use]
    pub fn summaries(&self) -> Vec<BatchEntrySummary> {
        self.entries
            .iter()
            .map(|entry| match &entry.outcome {
                Ok(result) => BatchEntrySummary {
                    name: entry.name.clone(),
                    status: Some(result.status()),
                    rounds: result.rounds(),
                    facts: result.store().len(),
                    derived: result.derived().count(),
                    contradictions: result.contradictions().len(),
                    fingerprint: result.fingerprint().ok(),
                    error: None,
                },
                Err(err) => BatchEntrySummary {
                    name: entry.name.clone(),
                    status: None,
                    rounds: 0,
                    facts: 0,
                    derived: 0,
                    contradictions: 0,
                    fingerprint: None,
                    error: Some(err.to_string()),
                },
            })
            .collect()
    }
}

/// Runs independent scenarios on a bounded worker pool.
///
/// A failing scenario does not stop the batch; its error is reported in its
/// entry. The batch itself only fails if the pool cannot be started or loses
/// its workers.
pub fn run_batch(
    scenarios: Vec<Scenario>,
    engine: &EngineConfig,
    config: &BatchConfig,
) -> Result<BatchReport, BatchError> {
    let started_at = Utc::now();
    let total = scenarios.len();
    let names: Vec<String> = scenarios.iter().map(|s| s.name.clone()).collect();
    info!(scenarios = total, workers = config.workers, "starting batch");

    let pool = WorkerPool::start(config.workers, config.queue_capacity, *engine)?;
    // Sized to hold every reply, so workers never block on it.
    let (reply_tx, reply_rx) = bounded::<Reply>(total.max(1));

    for (index, scenario) in scenarios.into_iter().enumerate() {
        if let Err(err) = pool.submit(Job {
            index,
            scenario,
            reply: reply_tx.clone(),
        }) {
            pool.shutdown();
            return Err(err);
        }
    }
    drop(reply_tx);

    let mut slots: Vec<Option<ReasonerResult<ReasoningResult>>> = (0..total).map(|_| None).collect();
    while let Ok((index, result)) = reply_rx.recv() {
        if let Some(slot) = slots.get_mut(index) {
            *slot = Some(result);
        }
    }
    pool.shutdown();

    let entries = collect_entries(slots, names);

    let finished_at = Utc::now();
    let failed = entries.iter().filter(|e| e.outcome.is_err()).count();
    info!(
        scenarios = total,
        failed,
        elapsed_ms = (finished_at - started_at).num_milliseconds(),
        "batch complete"
    );
    Ok(BatchReport {
        started_at,
        finished_at,
        entries,
    })
}

/// Pairs replies with scenario names, in input order.
///
/// A scenario whose worker died before replying gets a
/// [`BatchError::WorkerLost`] entry; the other results are kept.
fn collect_entries(slots: Vec<Option<ReasonerResult<ReasoningResult>>>, names: Vec<String>) -> Vec<BatchEntry> {
    slots
        .into_iter()
        .zip(names)
        .enumerate()
        .map(|(index, (slot, name))| {
            let outcome = slot.unwrap_or_else(|| {
                warn!(scenario = %name, "no result returned for scenario");
                Err(BatchError::WorkerLost { scenario: name.clone() }.into())
            });
            BatchEntry { index, name, outcome }
        })
        .collect()
}

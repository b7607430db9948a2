//! Staged screening pipeline: sequential AND across stages, parallel within.
//!
//! Each enabled stage is evaluated for every symbol still in the working set
//! on a private rayon pool; the working set is then replaced by exactly the
//! symbols that passed. The coordinator waits for a stage to finish before
//! starting the next, and stops as soon as the working set is empty.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;

use screener_core::data::{DataError, SeriesCache, Universe};
use screener_core::domain::{OhlcvSeries, Symbol};
use screener_core::filters::{panic_message, Diagnostics, FilterResult, FilterStage, Verdict};

use crate::aggregate::{aggregate, ScreenRecord, SortOrder};
use crate::progress::ScreenProgress;

pub const DEFAULT_WORKERS: usize = 20;
pub const MAX_WORKERS: usize = 64;

// ─── Result types ────────────────────────────────────────────────────

/// What one stage did.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub evaluated: usize,
    pub passed: usize,
    pub rejected: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// Per-symbol results, sorted by symbol.
    pub results: Vec<FilterResult>,
}

impl StageReport {
    fn from_results(name: &str, mut results: Vec<FilterResult>, elapsed: Duration) -> Self {
        results.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        let count = |f: fn(&Verdict) -> bool| results.iter().filter(|r| f(&r.verdict)).count();
        Self {
            name: name.to_string(),
            evaluated: results.len(),
            passed: count(Verdict::is_passed),
            rejected: count(Verdict::is_rejected),
            failed: count(Verdict::is_failed),
            elapsed,
            results,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &FilterResult> {
        self.results.iter().filter(|r| r.verdict.is_failed())
    }
}

/// Final result of a screen.
#[derive(Debug, Clone)]
pub struct ScreenOutcome {
    pub universe_size: usize,
    /// Reports for the stages that ran, in run order.
    pub stages: Vec<StageReport>,
    /// Survivors with merged diagnostics, in the requested order. Empty when
    /// interrupted.
    pub records: Vec<ScreenRecord>,
    /// Cancellation stopped the run before every stage finished.
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl ScreenOutcome {
    pub fn symbols(&self) -> Vec<&Symbol> {
        self.records.iter().map(|r| &r.symbol).collect()
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("workers must be between 1 and {MAX_WORKERS}, got {0}")]
    InvalidWorkers(usize),

    #[error("failed to build thread pool: {0}")]
    ThreadPool(String),
}

// ─── Pipeline ────────────────────────────────────────────────────────

pub struct Pipeline {
    stages: Vec<Arc<dyn FilterStage>>,
    pool: rayon::ThreadPool,
    workers: usize,
    sort: SortOrder,
}

impl Pipeline {
    /// Build a pipeline over `stages`, run in the given order.
    pub fn new(stages: Vec<Arc<dyn FilterStage>>, workers: usize) -> Result<Self, PipelineError> {
        if !(1..=MAX_WORKERS).contains(&workers) {
            return Err(PipelineError::InvalidWorkers(workers));
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("screener-worker-{i}"))
            .build()
            .map_err(|e| PipelineError::ThreadPool(e.to_string()))?;
        Ok(Self {
            stages,
            pool,
            workers,
            sort: SortOrder::default(),
        })
    }

    pub fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Screen `universe`.
    ///
    /// With no stages the whole universe passes. When `cancel` is set mid-run,
    /// symbols not yet started are skipped and no further stage runs; the
    /// stage reports keep what was computed, the outcome is marked
    /// `interrupted` and carries no records.
    pub fn run(
        &self,
        universe: &Universe,
        cache: &SeriesCache,
        progress: &dyn ScreenProgress,
        cancel: Option<&AtomicBool>,
    ) -> ScreenOutcome {
        let start_time = Instant::now();
        let mut working: Vec<Symbol> = universe.symbols().to_vec();
        let mut reports = Vec::with_capacity(self.stages.len());
        let mut stage_diagnostics: Vec<HashMap<Symbol, Diagnostics>> = Vec::new();
        let mut interrupted = false;

        for (index, stage) in self.stages.iter().enumerate() {
            if working.is_empty() {
                tracing::info!(
                    "working set empty, skipping {} remaining stage(s)",
                    self.stages.len() - index
                );
                break;
            }
            if is_cancelled(cancel) {
                interrupted = true;
                break;
            }

            let (report, skipped) =
                self.run_stage(stage.as_ref(), index, &working, cache, progress, cancel);
            interrupted |= skipped > 0;

            // Reassign, never mutate: the next working set is exactly the passes.
            working = report
                .results
                .iter()
                .filter(|r| r.is_passed())
                .map(|r| r.symbol.clone())
                .collect();
            stage_diagnostics.push(
                report
                    .results
                    .iter()
                    .filter(|r| r.is_passed())
                    .map(|r| (r.symbol.clone(), r.diagnostics.clone()))
                    .collect(),
            );

            tracing::info!(
                "stage '{}': {} evaluated, {} passed, {} rejected, {} failed ({:.2}s)",
                report.name,
                report.evaluated,
                report.passed,
                report.rejected,
                report.failed,
                report.elapsed.as_secs_f64()
            );
            reports.push(report);

            if interrupted {
                tracing::warn!("screen cancelled during stage '{}'", stage.name());
                break;
            }
        }

        // An interrupted run has not applied every stage, so nothing is known to pass.
        let records = if interrupted {
            Vec::new()
        } else {
            aggregate(&working, &stage_diagnostics, &self.sort)
        };

        ScreenOutcome {
            universe_size: universe.len(),
            stages: reports,
            records,
            interrupted,
            elapsed: start_time.elapsed(),
        }
    }

    /// Evaluate one stage over `symbols`. Returns the report and how many
    /// symbols were skipped by cancellation.
    fn run_stage(
        &self,
        stage: &dyn FilterStage,
        index: usize,
        symbols: &[Symbol],
        cache: &SeriesCache,
        progress: &dyn ScreenProgress,
        cancel: Option<&AtomicBool>,
    ) -> (StageReport, usize) {
        let total = symbols.len();
        let stage_start = Instant::now();
        progress.on_stage_start(stage.name(), index, total);

        // Workers number each completion under the lock and hand it off; the
        // sink runs on this thread, so a slow sink never stalls evaluation.
        let (tx, rx) = mpsc::channel::<(FilterResult, usize)>();

        let outcomes: Vec<Option<FilterResult>> = thread::scope(|scope| {
            let evaluation = scope.spawn(move || {
                let completed = Mutex::new((0usize, tx));
                self.pool.install(|| {
                    symbols
                        .par_iter()
                        .map(|symbol| {
                            if is_cancelled(cancel) {
                                return None;
                            }
                            let data = fetch_guarded(cache, symbol);
                            let result = stage.evaluate(symbol, data.as_ref());

                            let mut guard = completed.lock().unwrap_or_else(|p| p.into_inner());
                            guard.0 += 1;
                            let done = guard.0;
                            // The receiver outlives every sender.
                            let _ = guard.1.send((result.clone(), done));
                            Some(result)
                        })
                        .collect::<Vec<_>>()
                })
            });

            for (result, done) in rx {
                progress.on_symbol_complete(stage.name(), &result, done, total);
            }
            evaluation
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload))
        });

        let skipped = outcomes.iter().filter(|o| o.is_none()).count();
        let results: Vec<FilterResult> = outcomes.into_iter().flatten().collect();
        let report = StageReport::from_results(stage.name(), results, stage_start.elapsed());
        progress.on_stage_complete(stage.name(), report.passed, total, report.elapsed);
        (report, skipped)
    }
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|c| c.load(Ordering::Relaxed))
}

/// `get_series`, with a panicking provider or store turned into an error.
fn fetch_guarded(cache: &SeriesCache, symbol: &Symbol) -> Result<OhlcvSeries, DataError> {
    panic::catch_unwind(AssertUnwindSafe(|| cache.get_series(symbol))).unwrap_or_else(|payload| {
        let msg = panic_message(payload.as_ref());
        tracing::warn!("{symbol}: data fetch panicked: {msg}");
        Err(DataError::Other(format!("fetch panicked: {msg}")))
    })
}

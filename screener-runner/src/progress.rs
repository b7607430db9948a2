//! Progress sinks for screen runs. Purely observational.

use screener_core::filters::FilterResult;
use std::time::Duration;

/// Receives pipeline progress.
///
/// `on_symbol_complete` is called from the thread that called `run`, never
/// from a worker: calls arrive one at a time in completion order, with
/// `completed` counting up from 1 to `total` within each stage. Workers keep
/// evaluating while a call is in progress.
pub trait ScreenProgress: Send + Sync {
    fn on_stage_start(&self, _stage: &str, _index: usize, _symbols: usize) {}

    fn on_symbol_complete(
        &self,
        _stage: &str,
        _result: &FilterResult,
        _completed: usize,
        _total: usize,
    ) {
    }

    fn on_stage_complete(&self, _stage: &str, _passed: usize, _total: usize, _elapsed: Duration) {}
}

/// Discards everything.
pub struct NoProgress;

impl ScreenProgress for NoProgress {}

/// Writes progress through `tracing`, one debug line per symbol and a
/// periodic info line so long stages show signs of life.
pub struct LogProgress {
    /// Emit an info line every this many symbols (0 disables).
    pub every: usize,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self { every: 250 }
    }
}

impl ScreenProgress for LogProgress {
    fn on_stage_start(&self, stage: &str, index: usize, symbols: usize) {
        tracing::info!("stage {} '{stage}': evaluating {symbols} symbols", index + 1);
    }

    fn on_symbol_complete(
        &self,
        stage: &str,
        result: &FilterResult,
        completed: usize,
        total: usize,
    ) {
        tracing::debug!("[{completed}/{total}] {stage} {}: {:?}", result.symbol, result.verdict);
        if self.every > 0 && completed % self.every == 0 {
            tracing::info!("{stage}: {completed}/{total} evaluated");
        }
    }

    fn on_stage_complete(&self, stage: &str, passed: usize, total: usize, elapsed: Duration) {
        tracing::info!(
            "{stage}: {passed}/{total} passed in {:.1}s",
            elapsed.as_secs_f64()
        );
    }
}

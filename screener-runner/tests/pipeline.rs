//! Integration tests for the staged pipeline.
//!
//! Series come from an in-memory provider behind a real `SeriesCache`.
//! Tests: the AAPL/ZZZZ screen, sequential-AND semantics and order
//! independence, early stop, progress ordering, panic isolation,
//! cancellation, empty stage lists.

use chrono::NaiveDate;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use screener_core::data::{
    CacheConfig, DataError, DataProvider, FetchResult, FixedClock, MemoryStore, SeriesCache,
    StaticProvider, Universe,
};
use screener_core::domain::{Bar, OhlcvSeries, Symbol};
use screener_core::filters::{
    Decision, Diagnostics, FilterError, FilterResult, FilterStage, RsiStage, Verdict,
    VolumeSpikeStage,
};
use screener_runner::{NoProgress, Pipeline, ScreenProgress, SortOrder};

// ── Fixtures ─────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
}

fn sym(s: &str) -> Symbol {
    Symbol::parse(s).unwrap()
}

/// Daily bars ending today, one per calendar day.
fn bars(closes: &[f64], volumes: &[u64]) -> Vec<Bar> {
    let n = closes.len();
    closes
        .iter()
        .zip(volumes)
        .enumerate()
        .map(|(i, (&close, &volume))| Bar {
            date: today() - chrono::Duration::days((n - 1 - i) as i64),
            open: close,
            high: close + 1.0,
            low: (close - 1.0).max(0.01),
            close,
            volume,
        })
        .collect()
}

fn flat_volume(closes: &[f64]) -> Vec<Bar> {
    bars(closes, &vec![1_000_000; closes.len()])
}

/// 300 closes from 400 alternating +2 / -3, giving RSI(14) = 40 on every window.
fn aapl_closes() -> Vec<f64> {
    let mut closes = vec![400.0];
    for i in 1..300 {
        let step = if i % 2 == 1 { 2.0 } else { -3.0 };
        closes.push(closes[i - 1] + step);
    }
    closes
}

fn cache_over(provider: Arc<dyn DataProvider>) -> SeriesCache {
    SeriesCache::new(
        Arc::new(MemoryStore::new()),
        provider,
        Arc::new(FixedClock(today())),
        CacheConfig::default(),
    )
}

/// Provider serving a flat series per symbol at the given close.
fn closes_provider(last_closes: &[(Symbol, f64)]) -> StaticProvider {
    last_closes
        .iter()
        .fold(StaticProvider::new(), |p, (s, close)| {
            p.with_bars(s.clone(), flat_volume(&[*close; 5]))
        })
}

/// Passes when the latest close satisfies a predicate.
struct CloseStage {
    name: &'static str,
    predicate: fn(f64) -> bool,
    calls: AtomicUsize,
}

impl CloseStage {
    fn new(name: &'static str, predicate: fn(f64) -> bool) -> Self {
        Self {
            name,
            predicate,
            calls: AtomicUsize::new(0),
        }
    }
}

impl FilterStage for CloseStage {
    fn name(&self) -> &str {
        self.name
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn evaluate_series(&self, series: &OhlcvSeries) -> Result<Decision, FilterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let close = series.latest().map(|b| b.close).unwrap_or(f64::NAN);
        let diagnostics = Diagnostics::from([(format!("{}_close", self.name), close)]);
        if (self.predicate)(close) {
            Ok(Decision::Pass(diagnostics))
        } else {
            Ok(Decision::Reject("predicate false".into(), diagnostics))
        }
    }
}

fn symbols_of(outcome: &screener_runner::ScreenOutcome) -> BTreeSet<Symbol> {
    outcome.records.iter().map(|r| r.symbol.clone()).collect()
}

// ── Scenario ─────────────────────────────────────────────────────────

#[test]
fn rsi_screen_keeps_aapl_and_fails_missing_symbol() {
    let provider = StaticProvider::new().with_bars(sym("AAPL"), flat_volume(&aapl_closes()));
    let cache = cache_over(Arc::new(provider));
    let universe = Universe::parse(&["AAPL", "ZZZZ"]).unwrap();

    let pipeline = Pipeline::new(vec![Arc::new(RsiStage::default())], 4).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert!(!outcome.interrupted);
    assert_eq!(outcome.universe_size, 2);
    assert_eq!(outcome.records.len(), 1);
    let aapl = &outcome.records[0];
    assert_eq!(aapl.symbol, sym("AAPL"));
    assert!((aapl.diagnostics["rsi"] - 40.0).abs() < 1e-9);
    assert!(aapl.diagnostics.contains_key("close"));

    let report = &outcome.stages[0];
    assert_eq!(report.name, "rsi");
    assert_eq!((report.evaluated, report.passed, report.failed), (2, 1, 1));
    let zzzz = report.results.iter().find(|r| r.symbol == sym("ZZZZ")).unwrap();
    assert!(matches!(
        zzzz.verdict,
        Verdict::Failed(FilterError::DataUnavailable(_))
    ));
}

#[test]
fn stages_share_one_fetch_per_symbol() {
    let provider = Arc::new(StaticProvider::new().with_bars(sym("AAPL"), flat_volume(&aapl_closes())));
    let cache = cache_over(provider.clone());
    let universe = Universe::parse(&["AAPL"]).unwrap();

    let pipeline = Pipeline::new(
        vec![
            Arc::new(RsiStage::default()),
            Arc::new(CloseStage::new("any", |_| true)),
        ],
        2,
    )
    .unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert_eq!(outcome.records.len(), 1);
    assert_eq!(provider.fetch_count(), 1);
    // Diagnostics from both stages are merged.
    let d = &outcome.records[0].diagnostics;
    assert!(d.contains_key("rsi") && d.contains_key("any_close"));
}

#[test]
fn volume_spike_passes_on_doubled_volume() {
    let mut volumes = vec![1_000_000u64; 30];
    volumes[29] = 2_000_000;
    let provider =
        StaticProvider::new().with_bars(sym("SPKE"), bars(&[50.0; 30], &volumes));
    let cache = cache_over(Arc::new(provider));
    let universe = Universe::parse(&["SPKE"]).unwrap();

    let pipeline = Pipeline::new(vec![Arc::new(VolumeSpikeStage::default())], 1).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert_eq!(outcome.records.len(), 1);
    assert!((outcome.records[0].diagnostics["volume_ratio"] - 2.0).abs() < 1e-12);
}

// ── Sequential AND ───────────────────────────────────────────────────

#[test]
fn second_stage_only_sees_first_stage_survivors() {
    let closes: Vec<(Symbol, f64)> = [("AAA", 10.0), ("BBB", 20.0), ("CCC", 30.0), ("DDD", 40.0)]
        .iter()
        .map(|(s, c)| (sym(s), *c))
        .collect();
    let cache = cache_over(Arc::new(closes_provider(&closes)));
    let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));

    let above = Arc::new(CloseStage::new("above", |c| c > 15.0));
    let below = Arc::new(CloseStage::new("below", |c| c < 35.0));
    let stages: Vec<Arc<dyn FilterStage>> = vec![above.clone(), below.clone()];
    let pipeline = Pipeline::new(stages, 3).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert_eq!(outcome.symbols(), vec![&sym("BBB"), &sym("CCC")]);
    assert_eq!(above.calls.load(Ordering::SeqCst), 4);
    assert_eq!(below.calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.stages[1].evaluated, 3);
}

#[test]
fn empty_working_set_stops_early() {
    let closes = vec![(sym("AAA"), 10.0), (sym("BBB"), 20.0)];
    let cache = cache_over(Arc::new(closes_provider(&closes)));
    let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));

    let none = Arc::new(CloseStage::new("none", |_| false));
    let never_reached = Arc::new(CloseStage::new("later", |_| true));
    let stages: Vec<Arc<dyn FilterStage>> = vec![none, never_reached.clone()];
    let pipeline = Pipeline::new(stages, 2).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert!(outcome.records.is_empty());
    assert!(!outcome.interrupted);
    assert_eq!(outcome.stages.len(), 1);
    assert_eq!(outcome.stages[0].rejected, 2);
    assert_eq!(never_reached.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn no_stages_returns_whole_universe() {
    let cache = cache_over(Arc::new(StaticProvider::new()));
    let universe = Universe::parse(&["MSFT", "AAPL"]).unwrap();

    let pipeline = Pipeline::new(Vec::new(), 1).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert_eq!(outcome.symbols(), vec![&sym("AAPL"), &sym("MSFT")]);
    assert!(outcome.stages.is_empty());
    assert!(outcome.records.iter().all(|r| r.diagnostics.is_empty()));
}

#[test]
fn records_follow_requested_sort() {
    let closes = vec![(sym("AAA"), 30.0), (sym("BBB"), 10.0), (sym("CCC"), 20.0)];
    let cache = cache_over(Arc::new(closes_provider(&closes)));
    let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));

    let pipeline = Pipeline::new(vec![Arc::new(CloseStage::new("px", |_| true))], 2)
        .unwrap()
        .with_sort(SortOrder::parse("-px_close"));
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert_eq!(
        outcome.symbols(),
        vec![&sym("AAA"), &sym("CCC"), &sym("BBB")]
    );
}

// ── Fault isolation ──────────────────────────────────────────────────

struct PanicsOn(&'static str);

impl FilterStage for PanicsOn {
    fn name(&self) -> &str {
        "panics_on"
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn evaluate_series(&self, series: &OhlcvSeries) -> Result<Decision, FilterError> {
        if series.symbol().as_str() == self.0 {
            panic!("bad series");
        }
        Ok(Decision::Pass(Diagnostics::new()))
    }
}

/// Delegates to an inner provider, panicking for one symbol.
struct PanickyProvider {
    inner: StaticProvider,
    bad: Symbol,
}

impl DataProvider for PanickyProvider {
    fn name(&self) -> &str {
        "panicky"
    }

    fn fetch_daily_bars(&self, symbol: &Symbol, lookback_days: u32) -> Result<FetchResult, DataError> {
        if *symbol == self.bad {
            panic!("provider blew up");
        }
        self.inner.fetch_daily_bars(symbol, lookback_days)
    }
}

#[test]
fn stage_panic_fails_only_that_symbol() {
    let closes = vec![(sym("AAA"), 10.0), (sym("BAD"), 20.0), (sym("CCC"), 30.0)];
    let cache = cache_over(Arc::new(closes_provider(&closes)));
    let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));

    let pipeline = Pipeline::new(vec![Arc::new(PanicsOn("BAD"))], 3).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert_eq!(outcome.symbols(), vec![&sym("AAA"), &sym("CCC")]);
    let bad = &outcome.stages[0].results[1];
    assert_eq!(bad.symbol, sym("BAD"));
    assert!(matches!(
        bad.verdict,
        Verdict::Failed(FilterError::EvaluationPanicked(_))
    ));
}

#[test]
fn provider_panic_fails_only_that_symbol() {
    let closes = vec![(sym("AAA"), 10.0), (sym("CCC"), 30.0)];
    let provider = PanickyProvider {
        inner: closes_provider(&closes),
        bad: sym("BAD"),
    };
    let cache = cache_over(Arc::new(provider));
    let universe = Universe::parse(&["AAA", "BAD", "CCC"]).unwrap();

    let pipeline = Pipeline::new(vec![Arc::new(CloseStage::new("any", |_| true))], 2).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, None);

    assert_eq!(outcome.symbols(), vec![&sym("AAA"), &sym("CCC")]);
    assert_eq!(outcome.stages[0].failed, 1);
    let failure = outcome.stages[0].failures().next().unwrap();
    assert_eq!(failure.symbol, sym("BAD"));
    assert!(matches!(
        failure.verdict,
        Verdict::Failed(FilterError::ProviderError(_))
    ));
}

// ── Progress and cancellation ────────────────────────────────────────

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<(String, usize, usize)>>,
    stages_done: Mutex<Vec<(String, usize, usize)>>,
}

impl ScreenProgress for Recorder {
    fn on_symbol_complete(&self, stage: &str, _: &FilterResult, completed: usize, total: usize) {
        self.events
            .lock()
            .unwrap()
            .push((stage.to_string(), completed, total));
    }

    fn on_stage_complete(&self, stage: &str, passed: usize, total: usize, _: Duration) {
        self.stages_done
            .lock()
            .unwrap()
            .push((stage.to_string(), passed, total));
    }
}

#[test]
fn progress_counts_up_once_per_symbol() {
    let closes: Vec<(Symbol, f64)> = (0..40).map(|i| (sym(&format!("S{i}")), i as f64)).collect();
    let cache = cache_over(Arc::new(closes_provider(&closes)));
    let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));

    let pipeline = Pipeline::new(
        vec![
            Arc::new(CloseStage::new("half", |c| c >= 20.0)),
            Arc::new(CloseStage::new("all", |_| true)),
        ],
        8,
    )
    .unwrap();
    let recorder = Recorder::default();
    let outcome = pipeline.run(&universe, &cache, &recorder, None);
    assert_eq!(outcome.records.len(), 20);

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 60);
    let half: Vec<usize> = events.iter().filter(|e| e.0 == "half").map(|e| e.1).collect();
    assert_eq!(half, (1..=40).collect::<Vec<_>>());
    let all: Vec<usize> = events.iter().filter(|e| e.0 == "all").map(|e| e.1).collect();
    assert_eq!(all, (1..=20).collect::<Vec<_>>());
    assert!(events.iter().all(|e| e.2 == (if e.0 == "half" { 40 } else { 20 })));

    let done = recorder.stages_done.lock().unwrap();
    assert_eq!(
        *done,
        vec![("half".to_string(), 20, 40), ("all".to_string(), 20, 20)]
    );
}

/// Blocks its first callback until the stage has evaluated every symbol.
struct WaitingSink {
    stage: Arc<CloseStage>,
    expected: usize,
    saw_all: AtomicBool,
}

impl ScreenProgress for WaitingSink {
    fn on_symbol_complete(&self, _: &str, _: &FilterResult, completed: usize, _: usize) {
        if completed != 1 {
            return;
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while std::time::Instant::now() < deadline {
            if self.stage.calls.load(Ordering::SeqCst) == self.expected {
                self.saw_all.store(true, Ordering::SeqCst);
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

#[test]
fn slow_progress_sink_does_not_stall_workers() {
    let closes: Vec<(Symbol, f64)> = (0..6).map(|i| (sym(&format!("W{i}")), 10.0)).collect();
    let cache = cache_over(Arc::new(closes_provider(&closes)));
    let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));

    let stage = Arc::new(CloseStage::new("any", |_| true));
    let sink = WaitingSink {
        stage: stage.clone(),
        expected: 6,
        saw_all: AtomicBool::new(false),
    };
    let stages: Vec<Arc<dyn FilterStage>> = vec![stage.clone()];
    // One worker: it must finish all six while the sink holds its first call.
    let pipeline = Pipeline::new(stages, 1).unwrap();
    let outcome = pipeline.run(&universe, &cache, &sink, None);

    assert!(sink.saw_all.load(Ordering::SeqCst));
    assert_eq!(outcome.records.len(), 6);
}

/// Raises the cancel flag on its first evaluation.
struct CancelAfterFirst<'a> {
    flag: &'a AtomicBool,
}

impl FilterStage for CancelAfterFirst<'_> {
    fn name(&self) -> &str {
        "cancel"
    }

    fn min_bars(&self) -> usize {
        1
    }

    fn evaluate_series(&self, _: &OhlcvSeries) -> Result<Decision, FilterError> {
        self.flag.store(true, Ordering::SeqCst);
        Ok(Decision::Pass(Diagnostics::new()))
    }
}

#[test]
fn cancellation_skips_unstarted_symbols() {
    static FLAG: AtomicBool = AtomicBool::new(false);
    let closes: Vec<(Symbol, f64)> = (0..20).map(|i| (sym(&format!("C{i}")), 10.0)).collect();
    let cache = cache_over(Arc::new(closes_provider(&closes)));
    let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));

    let later = Arc::new(CloseStage::new("later", |_| true));
    let stages: Vec<Arc<dyn FilterStage>> =
        vec![Arc::new(CancelAfterFirst { flag: &FLAG }), later.clone()];
    let pipeline = Pipeline::new(stages, 1).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, Some(&FLAG));

    assert!(outcome.interrupted);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stages.len(), 1);
    let evaluated = outcome.stages[0].evaluated;
    assert!(evaluated >= 1 && evaluated < 20, "evaluated {evaluated}");
    assert_eq!(later.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn pre_cancelled_run_does_nothing() {
    let flag = AtomicBool::new(true);
    let provider = Arc::new(closes_provider(&[(sym("AAA"), 10.0)]));
    let cache = cache_over(provider.clone());
    let universe = Universe::parse(&["AAA"]).unwrap();

    let pipeline = Pipeline::new(vec![Arc::new(CloseStage::new("any", |_| true))], 1).unwrap();
    let outcome = pipeline.run(&universe, &cache, &NoProgress, Some(&flag));

    assert!(outcome.interrupted);
    assert!(outcome.stages.is_empty());
    assert!(outcome.records.is_empty());
    assert_eq!(provider.fetch_count(), 0);
}

// ── Properties ───────────────────────────────────────────────────────

fn run_names(
    closes: &[(Symbol, f64)],
    stages: Vec<Arc<dyn FilterStage>>,
    universe: &Universe,
) -> BTreeSet<Symbol> {
    let cache = cache_over(Arc::new(closes_provider(closes)));
    let pipeline = Pipeline::new(stages, 4).unwrap();
    symbols_of(&pipeline.run(universe, &cache, &NoProgress, None))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sequential_and_is_order_independent(
        prices in prop::collection::vec(1.0f64..100.0, 1..30),
    ) {
        let closes: Vec<(Symbol, f64)> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| (sym(&format!("P{i}")), *p))
            .collect();
        let universe = Universe::from_symbols(closes.iter().map(|(s, _)| s.clone()));
        let a = || -> Arc<dyn FilterStage> { Arc::new(CloseStage::new("a", |c| c > 30.0)) };
        let b = || -> Arc<dyn FilterStage> { Arc::new(CloseStage::new("b", |c| c < 70.0)) };

        let ab = run_names(&closes, vec![a(), b()], &universe);
        let ba = run_names(&closes, vec![b(), a()], &universe);

        // B alone over A's survivors.
        let a_only = run_names(&closes, vec![a()], &universe);
        let survivors = Universe::from_symbols(a_only.iter().cloned());
        let b_after_a = run_names(&closes, vec![b()], &survivors);

        let expected: BTreeSet<Symbol> = closes
            .iter()
            .filter(|(_, c)| *c > 30.0 && *c < 70.0)
            .map(|(s, _)| s.clone())
            .collect();

        prop_assert_eq!(&ab, &expected);
        prop_assert_eq!(&ba, &expected);
        prop_assert_eq!(&b_after_a, &expected);
    }

    #[test]
    fn survivors_are_a_subset_of_universe_and_deduplicated(
        prices in prop::collection::vec(1.0f64..100.0, 1..20),
    ) {
        let closes: Vec<(Symbol, f64)> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| (sym(&format!("Q{i}")), *p))
            .collect();
        // Every ticker twice.
        let universe = Universe::from_symbols(
            closes.iter().chain(closes.iter()).map(|(s, _)| s.clone()),
        );
        let names = run_names(&closes, vec![Arc::new(CloseStage::new("c", |c| c > 50.0))], &universe);

        let by_symbol: HashMap<&Symbol, f64> = closes.iter().map(|(s, c)| (s, *c)).collect();
        for s in &names {
            prop_assert!(by_symbol[s] > 50.0);
        }
        prop_assert_eq!(
            names.len(),
            closes.iter().filter(|(_, c)| *c > 50.0).count()
        );
    }
}

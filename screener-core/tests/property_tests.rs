//! Property tests for indicator and stage invariants.
//!
//! Uses proptest to verify:
//! 1. RSI bounds: every defined RSI value lies in [0, 100]
//! 2. Monotone closes: strictly increasing closes give RSI = 100
//! 3. EMA of a constant: equals the constant everywhere
//! 4. Crossover reflection: swapping the lines never keeps an upward cross
//! 5. Short series: below a stage's minimum never passes and never panics

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use screener_core::domain::{Bar, OhlcvSeries, Symbol};
use screener_core::filters::{
    EmaCrossoverStage, FilterStage, MacdCrossoverStage, RsiStage, VolumeSpikeStage,
};
use screener_core::indicators::{
    cross_above_within, cross_below_within, ema_of_series, rsi_of_series, Cross, Macd,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_closes(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1000.0_f64, 0..max_len)
}

fn arb_steps() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(0.01..10.0_f64, 15..80)
}

fn series(closes: &[f64]) -> OhlcvSeries {
    let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar {
            date: start + Duration::days(i as i64),
            open: c,
            high: c + 1.0,
            low: (c - 1.0).max(0.01),
            close: c,
            volume: 1_000 + i as u64,
        })
        .collect();
    OhlcvSeries::new(Symbol::parse("PROP").unwrap(), bars).unwrap()
}

// ── 1. RSI bounds ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn rsi_within_bounds(closes in arb_closes(120)) {
        for v in rsi_of_series(&closes, 14) {
            if !v.is_nan() {
                prop_assert!((0.0..=100.0).contains(&v), "rsi out of range: {v}");
            }
        }
    }
}

// ── 2. Monotone closes ───────────────────────────────────────────────

proptest! {
    #[test]
    fn increasing_closes_rsi_100(start in 1.0..500.0_f64, steps in arb_steps()) {
        let mut closes = vec![start];
        for s in steps {
            let next = closes[closes.len() - 1] + s;
            closes.push(next);
        }
        let rsi = rsi_of_series(&closes, 14);
        for &v in &rsi[14..] {
            prop_assert_eq!(v, 100.0);
        }
    }
}

// ── 3. EMA of a constant ─────────────────────────────────────────────

proptest! {
    #[test]
    fn ema_of_constant(value in 0.5..5000.0_f64, len in 1usize..200, span in 1usize..60) {
        let ema = ema_of_series(&vec![value; len], span);
        for v in ema {
            prop_assert!((v - value).abs() <= value * 1e-12);
        }
    }
}

// ── 4. Crossover reflection ──────────────────────────────────────────

proptest! {
    #[test]
    fn macd_cross_flips_under_reflection(closes in prop::collection::vec(10.0..200.0_f64, 40..120)) {
        let macd = Macd::default().compute_all(&closes);
        let up = cross_above_within(&macd.line, &macd.signal, 5);
        let swapped = cross_above_within(&macd.signal, &macd.line, 5);

        prop_assert_eq!(cross_below_within(&macd.signal, &macd.line, 5), up);
        if let Cross::Found { bars_ago } = up {
            // The same bar cannot be a cross in both directions.
            prop_assert_ne!(swapped, Cross::Found { bars_ago });
        }
        prop_assert_ne!(up, Cross::Undefined);
    }
}

// ── 5. Short series ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn short_series_never_pass(closes in arb_closes(20)) {
        let stages: Vec<Box<dyn FilterStage>> = vec![
            Box::new(RsiStage::default()),
            Box::new(EmaCrossoverStage::default()),
            Box::new(MacdCrossoverStage::default()),
            Box::new(VolumeSpikeStage::default()),
        ];
        let s = series(&closes);
        for stage in &stages {
            prop_assert!(s.len() < stage.min_bars());
            let result = stage.evaluate(s.symbol(), Ok(&s));
            prop_assert!(!result.is_passed());
            prop_assert!(result.verdict.is_failed());
        }
    }
}

//! Screener Core: domain types, market data, indicators, filter stages.
//!
//! This crate contains everything needed to judge one symbol:
//! - Domain types (symbols, bars, date-ordered OHLCV series)
//! - Data providers, series stores and the daily series cache
//! - Pure indicator functions (RSI, EMA, MACD, volume spike, crossovers)
//! - The four standardized filter stages
//!
//! Running stages over a universe lives in `screener-runner`.

pub mod data;
pub mod domain;
pub mod filters;
pub mod indicators;

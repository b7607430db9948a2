//! Domain types for the screener

pub mod bar;
pub mod series;
pub mod symbol;

pub use bar::Bar;
pub use series::{OhlcvSeries, SeriesError};
pub use symbol::{Symbol, SymbolError};

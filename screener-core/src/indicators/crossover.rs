//! Crossover detection between two aligned series.
//!
//! `a` crosses above `b` at bar t when a[t-1] < b[t-1] and a[t] > b[t]
//! (strict on both sides, so touching is not a cross).

/// Outcome of a windowed crossover search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cross {
    /// Not enough bars, or a value inside the window is NaN.
    Undefined,
    NotFound,
    /// Most recent cross; 0 means it happened on the latest bar.
    Found { bars_ago: usize },
}

impl Cross {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn bars_ago(&self) -> Option<usize> {
        match self {
            Self::Found { bars_ago } => Some(*bars_ago),
            _ => None,
        }
    }
}

/// Did `a` cross above `b` on any of the last `window` bars?
///
/// Each of those bars is checked against its predecessor, so `window + 1`
/// bars are needed.
pub fn cross_above_within(a: &[f64], b: &[f64], window: usize) -> Cross {
    let n = a.len().min(b.len());
    if window == 0 || n < window + 1 {
        return Cross::Undefined;
    }
    let a = &a[(a.len() - n)..];
    let b = &b[(b.len() - n)..];

    let start = n - window - 1;
    if a[start..].iter().chain(&b[start..]).any(|v| v.is_nan()) {
        return Cross::Undefined;
    }

    (n - window..n)
        .rev()
        .find(|&t| a[t - 1] < b[t - 1] && a[t] > b[t])
        .map_or(Cross::NotFound, |t| Cross::Found { bars_ago: n - 1 - t })
}

/// Did `a` cross below `b` on any of the last `window` bars?
pub fn cross_below_within(a: &[f64], b: &[f64], window: usize) -> Cross {
    cross_above_within(b, a, window)
}

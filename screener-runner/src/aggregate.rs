//! Result aggregation: one record per surviving symbol, merged across stages.

use screener_core::domain::Symbol;
use screener_core::filters::Diagnostics;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

/// Final output row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScreenRecord {
    pub symbol: Symbol,
    pub diagnostics: Diagnostics,
}

/// Ordering of the final records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum SortOrder {
    /// Symbol ascending.
    #[default]
    Symbol,
    /// By one diagnostic value; missing or NaN values go last, ties by symbol.
    Diagnostic {
        key: String,
        #[serde(default)]
        descending: bool,
    },
}

impl SortOrder {
    /// Parse the CLI form: `symbol`, `rsi`, or `-volume_ratio` for descending.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s {
            "" | "symbol" => Self::Symbol,
            _ => match s.strip_prefix('-') {
                Some(key) => Self::Diagnostic {
                    key: key.to_string(),
                    descending: true,
                },
                None => Self::Diagnostic {
                    key: s.to_string(),
                    descending: false,
                },
            },
        }
    }
}

/// Merge per-stage diagnostics for `survivors` into ordered, deduplicated records.
///
/// Diagnostics from later stages overwrite same-named values from earlier ones.
pub fn aggregate(
    survivors: &[Symbol],
    stage_diagnostics: &[HashMap<Symbol, Diagnostics>],
    order: &SortOrder,
) -> Vec<ScreenRecord> {
    let unique: BTreeSet<&Symbol> = survivors.iter().collect();

    let mut records: Vec<ScreenRecord> = unique
        .into_iter()
        .map(|symbol| {
            let mut diagnostics = Diagnostics::new();
            for stage in stage_diagnostics {
                if let Some(d) = stage.get(symbol) {
                    diagnostics.extend(d.iter().map(|(k, v)| (k.clone(), *v)));
                }
            }
            ScreenRecord {
                symbol: symbol.clone(),
                diagnostics,
            }
        })
        .collect();

    sort_records(&mut records, order);
    records
}

pub fn sort_records(records: &mut [ScreenRecord], order: &SortOrder) {
    match order {
        SortOrder::Symbol => records.sort_by(|a, b| a.symbol.cmp(&b.symbol)),
        SortOrder::Diagnostic { key, descending } => records.sort_by(|a, b| {
            let va = a.diagnostics.get(key).copied().filter(|v| !v.is_nan());
            let vb = b.diagnostics.get(key).copied().filter(|v| !v.is_nan());
            let by_value = match (va, vb) {
                (Some(x), Some(y)) => {
                    let ord = x.total_cmp(&y);
                    if *descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            by_value.then_with(|| a.symbol.cmp(&b.symbol))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(s: &str) -> Symbol {
        Symbol::parse(s).unwrap()
    }

    fn diag(pairs: &[(&str, f64)]) -> Diagnostics {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn merges_stages_and_dedups() {
        let rsi = HashMap::from([
            (sym("MSFT"), diag(&[("close", 400.0), ("rsi", 45.0)])),
            (sym("AAPL"), diag(&[("close", 190.0), ("rsi", 40.0)])),
        ]);
        let vol = HashMap::from([(sym("AAPL"), diag(&[("volume_ratio", 2.5)]))]);

        let records = aggregate(
            &[sym("MSFT"), sym("AAPL"), sym("AAPL")],
            &[rsi, vol],
            &SortOrder::Symbol,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol, sym("AAPL"));
        assert_eq!(records[0].diagnostics.len(), 3);
        assert_eq!(records[0].diagnostics["volume_ratio"], 2.5);
        assert_eq!(records[1].diagnostics["rsi"], 45.0);
    }

    #[test]
    fn diagnostic_sort_puts_missing_and_nan_last() {
        let mut records = vec![
            ScreenRecord { symbol: sym("D"), diagnostics: diag(&[]) },
            ScreenRecord { symbol: sym("C"), diagnostics: diag(&[("rsi", f64::NAN)]) },
            ScreenRecord { symbol: sym("B"), diagnostics: diag(&[("rsi", 30.0)]) },
            ScreenRecord { symbol: sym("A"), diagnostics: diag(&[("rsi", 30.0)]) },
            ScreenRecord { symbol: sym("E"), diagnostics: diag(&[("rsi", 45.0)]) },
        ];

        sort_records(
            &mut records,
            &SortOrder::Diagnostic { key: "rsi".into(), descending: true },
        );
        let order: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["E", "A", "B", "C", "D"]);

        sort_records(
            &mut records,
            &SortOrder::Diagnostic { key: "rsi".into(), descending: false },
        );
        let order: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "E", "C", "D"]);
    }

    #[test]
    fn parse_cli_sort() {
        assert_eq!(SortOrder::parse("symbol"), SortOrder::Symbol);
        assert_eq!(
            SortOrder::parse("-volume_ratio"),
            SortOrder::Diagnostic { key: "volume_ratio".into(), descending: true }
        );
        assert_eq!(
            SortOrder::parse("rsi"),
            SortOrder::Diagnostic { key: "rsi".into(), descending: false }
        );
    }
}

//! Ticker symbol newtype.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Uppercase ticker symbol, the unique key for every per-symbol structure.
///
/// Ordering is plain lexicographic, which is what the result aggregator uses
/// for its default output order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SymbolError {
    #[error("empty ticker symbol")]
    Empty,

    #[error("invalid character {ch:?} in ticker symbol '{raw}'")]
    InvalidChar { raw: String, ch: char },
}

impl Symbol {
    /// Parse a raw ticker: trims whitespace and uppercases.
    ///
    /// Accepts ASCII letters, digits and the separators used by US listings
    /// (`.`, `-`, `^`, `=`, `/`).
    pub fn parse(raw: &str) -> Result<Self, SymbolError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SymbolError::Empty);
        }
        let upper = trimmed.to_ascii_uppercase();
        if let Some(ch) = upper
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '/')))
        {
            return Err(SymbolError::InvalidChar {
                raw: raw.to_string(),
                ch,
            });
        }
        Ok(Self(upper))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = SymbolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for Symbol {
    type Error = SymbolError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Symbol> for String {
    fn from(value: Symbol) -> Self {
        value.0
    }
}

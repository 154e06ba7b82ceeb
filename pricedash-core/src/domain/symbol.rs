//! Tradable symbol identifiers.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_SYMBOL_LEN: usize = 32;

/// Uppercase ticker identifier (e.g. `AAPL`, `BRK-B`, `^GSPC`, `EURUSD=X`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// Trim, uppercase and validate a raw identifier.
    pub fn new(raw: &str) -> Result<Self, QueryError> {
        let normalized = raw.trim().to_uppercase();
        let valid = !normalized.is_empty()
            && normalized.len() <= MAX_SYMBOL_LEN
            && normalized
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '_' | '-'));
        if !valid {
            return Err(QueryError::InvalidSymbol(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Split free text on commas, semicolons and whitespace into symbols.
///
/// Empty fragments are dropped and duplicates removed, keeping first-seen order.
pub fn parse_symbols(raw: &str) -> Result<Vec<Symbol>, QueryError> {
    let mut out: Vec<Symbol> = Vec::new();
    for part in raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
        if part.trim().is_empty() {
            continue;
        }
        let symbol = Symbol::new(part)?;
        if !out.contains(&symbol) {
            out.push(symbol);
        }
    }
    Ok(out)
}

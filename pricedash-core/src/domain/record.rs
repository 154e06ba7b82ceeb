//! Canonical long-form price records and the normalizer's result envelope.

use super::symbol::Symbol;
use crate::error::UnknownFieldError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One observation for one symbol on one trading date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPriceRecord {
    pub date: NaiveDate,
    pub symbol: Symbol,
    pub close: f64,
    /// Present only when the provider supplied an adjustment-aware close.
    pub adjusted_close: Option<f64>,
    pub volume: Option<u64>,
}

impl CanonicalPriceRecord {
    /// Value of the chosen price field, if the record carries it.
    pub fn value(&self, field: PriceField) -> Option<f64> {
        match field {
            PriceField::Close => Some(self.close),
            PriceField::AdjustedClose => self.adjusted_close,
        }
    }
}

/// Which price column a matrix or summary is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Close,
    AdjustedClose,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Close => "close",
            PriceField::AdjustedClose => "adjusted_close",
        }
    }

    /// Human-readable label for chart titles.
    pub fn label(&self) -> &'static str {
        match self {
            PriceField::Close => "Close",
            PriceField::AdjustedClose => "Adjusted close",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceField {
    type Err = UnknownFieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "close" => Ok(PriceField::Close),
            "adjusted_close" | "adj_close" | "adj close" | "adjclose" => {
                Ok(PriceField::AdjustedClose)
            }
            _ => Err(UnknownFieldError(s.to_string())),
        }
    }
}

/// Presentation preferences. Read-only for the pipeline.
///
/// `log_scale` only affects chart rendering; no transform consults it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    pub price_field: PriceField,
    pub rebase_to_100: bool,
    pub log_scale: bool,
    pub show_summary: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            price_field: PriceField::AdjustedClose,
            rebase_to_100: false,
            log_scale: false,
            show_summary: true,
        }
    }
}

/// Non-fatal observations made while normalizing a provider response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Several raw rows mapped to the same (date, symbol); the last one was kept.
    DuplicateCollapsed { date: NaiveDate, symbol: Symbol, dropped: usize },
    /// A row had data but no close price and was skipped.
    MissingClose { date: NaiveDate, symbol: Symbol },
    /// A row fell outside the query window and was skipped.
    OutOfWindow { date: NaiveDate, symbol: Symbol },
    /// The response contained a symbol nobody asked for.
    UnexpectedSymbol { symbol: String },
    /// Both closes were requested but the provider had no adjusted close.
    AdjustedCloseUnavailable { symbol: Symbol },
}

/// Normalizer output: canonical records plus the per-symbol warning channel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NormalizedPrices {
    /// Sorted by date, then symbol; (date, symbol) unique.
    pub records: Vec<CanonicalPriceRecord>,
    /// Queried symbols for which the provider returned nothing.
    pub missing_symbols: Vec<Symbol>,
    pub diagnostics: Vec<Diagnostic>,
}

impl NormalizedPrices {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct symbols with at least one record, sorted.
    pub fn symbols(&self) -> Vec<Symbol> {
        self.records
            .iter()
            .map(|r| r.symbol.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Records for one symbol, date ascending.
    pub fn records_for<'a>(
        &'a self,
        symbol: &'a Symbol,
    ) -> impl Iterator<Item = &'a CanonicalPriceRecord> + 'a {
        self.records.iter().filter(move |r| &r.symbol == symbol)
    }

    /// Number of duplicate raw rows collapsed during normalization.
    pub fn duplicates_collapsed(&self) -> usize {
        self.diagnostics
            .iter()
            .map(|d| match d {
                Diagnostic::DuplicateCollapsed { dropped, .. } => *dropped,
                _ => 0,
            })
            .sum()
    }
}

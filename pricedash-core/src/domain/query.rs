//! Query: the immutable description of what to fetch.

use super::symbol::{parse_symbols, Symbol};
use crate::error::QueryError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Sampling interval. Only daily bars are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Interval {
    #[default]
    #[serde(rename = "1d")]
    Daily,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Daily => "1d",
        }
    }
}

/// A validated price request.
///
/// Symbols are uppercase and deduplicated; the set is never empty and
/// `start <= end`. Fields are private so a `Query` can only exist in a valid state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Query {
    symbols: Vec<Symbol>,
    start: NaiveDate,
    end: NaiveDate,
    interval: Interval,
    include_unadjusted_and_adjusted: bool,
}

impl Query {
    /// Build a daily query. Duplicate symbols are collapsed, keeping first-seen order.
    pub fn new(
        symbols: impl IntoIterator<Item = Symbol>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self, QueryError> {
        let mut unique: Vec<Symbol> = Vec::new();
        for symbol in symbols {
            if !unique.contains(&symbol) {
                unique.push(symbol);
            }
        }
        if unique.is_empty() {
            return Err(QueryError::EmptySymbols);
        }
        if start > end {
            return Err(QueryError::InvertedRange { start, end });
        }
        Ok(Self {
            symbols: unique,
            start,
            end,
            interval: Interval::Daily,
            include_unadjusted_and_adjusted: false,
        })
    }

    /// Build a query from free-text tickers such as `"AAPL, msft; SPY"`.
    pub fn parse(tickers: &str, start: NaiveDate, end: NaiveDate) -> Result<Self, QueryError> {
        Self::new(parse_symbols(tickers)?, start, end)
    }

    /// Require the provider to supply both a raw and an adjustment-aware close.
    pub fn with_adjusted(mut self, include: bool) -> Self {
        self.include_unadjusted_and_adjusted = include;
        self
    }

    /// Symbols in request order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Symbols sorted lexicographically (order-independent view).
    pub fn sorted_symbols(&self) -> Vec<Symbol> {
        let mut sorted = self.symbols.clone();
        sorted.sort();
        sorted
    }

    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.symbols.contains(symbol)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn include_unadjusted_and_adjusted(&self) -> bool {
        self.include_unadjusted_and_adjusted
    }

    /// Whether `date` falls inside the inclusive query window.
    pub fn covers(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Copy of this query restricted to a subset of symbols.
    pub fn with_symbols(&self, symbols: Vec<Symbol>) -> Result<Self, QueryError> {
        Ok(Self::new(symbols, self.start, self.end)?
            .with_adjusted(self.include_unadjusted_and_adjusted))
    }
}

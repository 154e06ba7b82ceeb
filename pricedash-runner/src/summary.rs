//! Per-symbol summary statistics over a query window.

use crate::metrics;
use chrono::NaiveDate;
use pricedash_core::domain::{CanonicalPriceRecord, PriceField, Query, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Date range and expected symbols a summary covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Symbols that must appear in the output even without data.
    pub symbols: Vec<Symbol>,
}

impl SummaryWindow {
    pub fn new(start: NaiveDate, end: NaiveDate, symbols: Vec<Symbol>) -> Self {
        Self {
            start,
            end,
            symbols,
        }
    }

    pub fn from_query(query: &Query) -> Self {
        Self::new(query.start(), query.end(), query.symbols().to_vec())
    }

    fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

/// Descriptive statistics for one symbol. Absent values mean "not enough data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub symbol: Symbol,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub observations: usize,
    pub last_value: Option<f64>,
    pub total_return: Option<f64>,
    /// Sample standard deviation of returns between consecutive observations.
    pub volatility: Option<f64>,
    pub annualized_volatility: Option<f64>,
    /// Non-positive fraction; 0 for a non-decreasing series.
    pub max_drawdown: Option<f64>,
}

impl SummaryRow {
    fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            first_date: None,
            last_date: None,
            observations: 0,
            last_value: None,
            total_return: None,
            volatility: None,
            annualized_volatility: None,
            max_drawdown: None,
        }
    }

    fn from_series(symbol: Symbol, series: &[(NaiveDate, f64)]) -> Self {
        let (Some(first), Some(last)) = (series.first(), series.last()) else {
            return Self::empty(symbol);
        };
        let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
        let volatility = metrics::std_dev(&metrics::step_returns(&values));
        Self {
            symbol,
            first_date: Some(first.0),
            last_date: Some(last.0),
            observations: values.len(),
            last_value: Some(last.1),
            total_return: metrics::total_return(&values),
            volatility,
            annualized_volatility: volatility.map(metrics::annualize),
            max_drawdown: Some(metrics::max_drawdown(&values)),
        }
    }
}

/// Summarize `field` per symbol within `window`.
///
/// Rows are the union of the window's symbols and those present in `records`,
/// sorted by symbol. Records lacking the field, or outside the window, are skipped.
pub fn build_summary(
    records: &[CanonicalPriceRecord],
    field: PriceField,
    window: &SummaryWindow,
) -> Vec<SummaryRow> {
    let mut series: BTreeMap<&Symbol, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for record in records {
        if !window.contains(record.date) {
            continue;
        }
        if let Some(v) = record.value(field) {
            series.entry(&record.symbol).or_default().push((record.date, v));
        }
    }

    let symbols: BTreeSet<&Symbol> = window
        .symbols
        .iter()
        .chain(records.iter().map(|r| &r.symbol))
        .collect();

    symbols
        .into_iter()
        .map(|symbol| match series.get_mut(symbol) {
            Some(points) => {
                points.sort_by_key(|(d, _)| *d);
                SummaryRow::from_series(symbol.clone(), points)
            }
            None => SummaryRow::empty(symbol.clone()),
        })
        .collect()
}

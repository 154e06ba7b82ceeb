//! Discovery: sector-organized symbol universes and volatility ranking.
//!
//! The universe is stored as a TOML file mapping sector names to their member
//! symbols. Ranking fetches recent prices through a [`PriceService`] in chunks
//! and scores each symbol by annualized volatility of its latest daily returns.

use crate::metrics;
use crate::service::PriceService;
use chrono::{Duration, NaiveDate};
use pricedash_core::cache::CacheBackend;
use pricedash_core::data::PriceProvider;
use pricedash_core::domain::{CanonicalPriceRecord, NormalizedPrices, Query, Symbol};
use pricedash_core::error::QueryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Symbols requested per provider call.
pub const DISCOVERY_CHUNK_SIZE: usize = 20;
/// Calendar days of history fetched before the as-of date.
pub const DISCOVERY_LOOKBACK_DAYS: i64 = 45;
/// Daily returns used for the volatility estimate.
pub const DISCOVERY_RETURN_WINDOW: usize = 30;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("failed to read universe file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("universe sector '{sector}': {source}")]
    InvalidSymbol { sector: String, source: QueryError },
}

/// Sector name → member symbols.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(|s| s.as_str()).collect()
    }

    pub fn symbol_count(&self) -> usize {
        self.sectors.values().map(|v| v.len()).sum()
    }

    /// Every member symbol, validated, in sector order with duplicates removed.
    pub fn all_symbols(&self) -> Result<Vec<Symbol>, UniverseError> {
        let mut out: Vec<Symbol> = Vec::new();
        for (sector, members) in &self.sectors {
            for raw in members {
                let symbol = Symbol::new(raw).map_err(|source| UniverseError::InvalidSymbol {
                    sector: sector.clone(),
                    source,
                })?;
                if !out.contains(&symbol) {
                    out.push(symbol);
                }
            }
        }
        Ok(out)
    }

    /// Built-in list of liquid US equities and ETFs.
    pub fn default_us() -> Self {
        let sector = |members: &[&str]| members.iter().map(|s| s.to_string()).collect();
        let mut sectors = BTreeMap::new();
        sectors.insert(
            "Technology".into(),
            sector(&["AAPL", "MSFT", "GOOGL", "AMZN", "NVDA", "META", "AVGO", "AMD", "CRM", "ORCL"]),
        );
        sectors.insert(
            "Healthcare".into(),
            sector(&["JNJ", "UNH", "PFE", "ABBV", "MRK", "LLY", "TMO", "ABT"]),
        );
        sectors.insert(
            "Financials".into(),
            sector(&["JPM", "BAC", "WFC", "GS", "MS", "BLK", "SCHW", "C", "AXP", "V"]),
        );
        sectors.insert(
            "Energy".into(),
            sector(&["XOM", "CVX", "COP", "SLB", "EOG", "MPC", "PSX", "OXY"]),
        );
        sectors.insert(
            "Consumer".into(),
            sector(&["WMT", "PG", "KO", "PEP", "COST", "HD", "MCD", "NKE", "TSLA", "TGT"]),
        );
        sectors.insert(
            "ETFs".into(),
            sector(&["SPY", "QQQ", "IWM", "DIA", "XLF", "XLE", "XLK", "XLV"]),
        );
        Self { sectors }
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::default_us()
    }
}

/// Annualized volatility estimate for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolVolatility {
    pub symbol: Symbol,
    pub annualized_volatility: f64,
    /// Daily returns the estimate is based on.
    pub returns_used: usize,
}

/// Score `symbols` by annualized volatility over the days before `as_of`.
///
/// Chunks whose fetch fails are logged and skipped; symbols with fewer than two
/// returns are left out of the result.
pub fn universe_volatility<P, C>(
    service: &PriceService<P, C>,
    symbols: &[Symbol],
    as_of: NaiveDate,
) -> Vec<SymbolVolatility>
where
    P: PriceProvider,
    C: CacheBackend<Arc<NormalizedPrices>>,
{
    let start = as_of - Duration::days(DISCOVERY_LOOKBACK_DAYS);
    let mut results = Vec::new();

    for (i, chunk) in symbols.chunks(DISCOVERY_CHUNK_SIZE).enumerate() {
        let query = match Query::new(chunk.to_vec(), start, as_of) {
            Ok(q) => q,
            Err(e) => {
                warn!(chunk = i, error = %e, "skipping discovery chunk");
                continue;
            }
        };
        match service.get_prices(&query) {
            Ok(prices) => results.extend(chunk_volatility(&prices)),
            Err(e) => warn!(chunk = i, symbols = chunk.len(), error = %e, "discovery chunk failed"),
        }
    }

    info!(scored = results.len(), requested = symbols.len(), "discovery complete");
    results
}

/// One series per symbol: adjusted closes when every observation has one,
/// closes otherwise.
fn chunk_volatility(prices: &NormalizedPrices) -> Vec<SymbolVolatility> {
    let mut by_symbol: BTreeMap<&Symbol, Vec<&CanonicalPriceRecord>> = BTreeMap::new();
    for r in &prices.records {
        by_symbol.entry(&r.symbol).or_default().push(r);
    }

    by_symbol
        .into_iter()
        .filter_map(|(symbol, records)| {
            let values: Vec<f64> = if records.iter().all(|r| r.adjusted_close.is_some()) {
                records.iter().filter_map(|r| r.adjusted_close).collect()
            } else {
                records.iter().map(|r| r.close).collect()
            };
            let returns = metrics::step_returns(&values);
            let recent = &returns[returns.len().saturating_sub(DISCOVERY_RETURN_WINDOW)..];
            let vol = metrics::std_dev(recent)?;
            Some(SymbolVolatility {
                symbol: symbol.clone(),
                annualized_volatility: metrics::annualize(vol),
                returns_used: recent.len(),
            })
        })
        .collect()
}

/// The `n` most volatile symbols, highest first. Ties break by symbol.
pub fn top_by_volatility(mut scores: Vec<SymbolVolatility>, n: usize) -> Vec<SymbolVolatility> {
    scores.sort_by(|a, b| {
        b.annualized_volatility
            .total_cmp(&a.annualized_volatility)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });
    scores.truncate(n);
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricedash_core::cache::NoCache;
    use pricedash_core::data::{RawFrame, SyntheticProvider};
    use pricedash_core::error::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Synthetic data, failing any request that names `FAIL`.
    struct FlakyProvider {
        inner: SyntheticProvider,
        calls: AtomicUsize,
    }

    impl PriceProvider for FlakyProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        fn fetch_prices(&self, query: &Query) -> Result<RawFrame, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if query.symbols().iter().any(|s| s.as_str() == "FAIL") {
                return Err(ProviderError::NetworkUnreachable("down".into()));
            }
            self.inner.fetch_prices(query)
        }
    }

    fn service() -> PriceService<FlakyProvider, NoCache> {
        PriceService::new(
            FlakyProvider {
                inner: SyntheticProvider::new(7),
                calls: AtomicUsize::new(0),
            },
            NoCache,
        )
    }

    fn symbols(n: usize) -> Vec<Symbol> {
        (0..n).map(|i| Symbol::new(&format!("S{i:02}")).unwrap()).collect()
    }

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()
    }

    #[test]
    fn default_universe_round_trips_through_toml() {
        let u = Universe::default_us();
        assert!(u.sector_names().contains(&"ETFs"));
        let parsed = Universe::from_toml(&u.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, u);
        assert_eq!(parsed.all_symbols().unwrap().len(), u.symbol_count());
    }

    #[test]
    fn invalid_member_names_its_sector() {
        let u = Universe::from_toml("[sectors]\nBad = [\"AAPL\", \"NOT A TICKER\"]\n").unwrap();
        let err = u.all_symbols().unwrap_err();
        assert!(matches!(err, UniverseError::InvalidSymbol { ref sector, .. } if sector == "Bad"));
    }

    #[test]
    fn queries_in_chunks_and_scores_every_symbol() {
        let service = service();
        let scores = universe_volatility(&service, &symbols(45), as_of());
        assert_eq!(service.provider().calls.load(Ordering::SeqCst), 3);
        assert_eq!(scores.len(), 45);
        for s in &scores {
            assert!(s.annualized_volatility > 0.0);
            assert!(s.returns_used <= DISCOVERY_RETURN_WINDOW);
            assert!(s.returns_used >= 2);
        }
    }

    #[test]
    fn failed_chunk_is_skipped() {
        let mut list = symbols(25);
        list[3] = Symbol::new("FAIL").unwrap();
        let scores = universe_volatility(&service(), &list, as_of());
        // first chunk of 20 fails, remaining 5 succeed
        assert_eq!(scores.len(), 5);
    }

    #[test]
    fn partial_adjusted_closes_fall_back_to_closes() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let rec = |day, close, adjusted| CanonicalPriceRecord {
            date: d(day),
            symbol: Symbol::new("SPY").unwrap(),
            close,
            adjusted_close: adjusted,
            volume: None,
        };
        // Adjusted is half of close; mixing the two would show ±50% swings.
        let prices = NormalizedPrices {
            records: vec![
                rec(2, 100.0, Some(50.0)),
                rec(3, 101.0, None),
                rec(4, 102.0, Some(51.0)),
                rec(5, 103.0, None),
            ],
            ..NormalizedPrices::default()
        };
        let scores = chunk_volatility(&prices);
        let expected = metrics::std_dev(&metrics::step_returns(&[100.0, 101.0, 102.0, 103.0]))
            .map(metrics::annualize)
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert!((scores[0].annualized_volatility - expected).abs() < 1e-12);

        let full = NormalizedPrices {
            records: vec![rec(2, 100.0, Some(50.0)), rec(3, 101.0, Some(55.0)), rec(4, 99.0, Some(50.0))],
            ..NormalizedPrices::default()
        };
        let expected = metrics::std_dev(&metrics::step_returns(&[50.0, 55.0, 50.0]))
            .map(metrics::annualize)
            .unwrap();
        assert!((chunk_volatility(&full)[0].annualized_volatility - expected).abs() < 1e-12);
    }

    #[test]
    fn top_ranks_highest_first() {
        let score = |s: &str, v: f64| SymbolVolatility {
            symbol: Symbol::new(s).unwrap(),
            annualized_volatility: v,
            returns_used: 30,
        };
        let top = top_by_volatility(
            vec![score("A", 0.2), score("B", 0.5), score("C", 0.3), score("D", 0.5)],
            3,
        );
        let names: Vec<&str> = top.iter().map(|s| s.symbol.as_str()).collect();
        assert_eq!(names, vec!["B", "D", "C"]);
    }
}

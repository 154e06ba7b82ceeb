//! Yahoo Finance provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API, one request per symbol, and
//! assembles them into a single raw frame: flat for a one-symbol query, paired
//! `(symbol, field)` otherwise. Retries with exponential backoff on timeouts,
//! connection errors, 429 and 5xx.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::PriceProvider;
use super::raw::RawFrame;
use crate::config::ProviderConfig;
use crate::domain::{Query, Symbol};
use crate::error::ProviderError;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// One symbol's parsed bars keyed by date.
#[derive(Debug, Default)]
struct SymbolSeries {
    close: BTreeMap<NaiveDate, Option<f64>>,
    adjusted_close: BTreeMap<NaiveDate, Option<f64>>,
    volume: BTreeMap<NaiveDate, Option<u64>>,
}

impl SymbolSeries {
    fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.close.keys()
    }

    fn column<T: Copy>(map: &BTreeMap<NaiveDate, Option<T>>, dates: &[NaiveDate]) -> Vec<Option<T>> {
        dates.iter().map(|d| map.get(d).copied().flatten()).collect()
    }
}

/// Yahoo Finance price provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    timeout_secs: u64,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::Upstream(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
        })
    }

    /// Build the chart API URL for a symbol and date range.
    fn chart_url(symbol: &Symbol, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(chrono::NaiveTime::MIN)
            .and_utc()
            .timestamp();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// Parse a chart response. `Ok(None)` means the symbol is unknown or has no bars.
    fn parse_response(symbol: &Symbol, resp: ChartResponse) -> Result<Option<SymbolSeries>, ProviderError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => return Ok(None),
            (None, Some(err)) => {
                return Err(ProviderError::Upstream(format!(
                    "{symbol}: {}: {}",
                    err.code, err.description
                )))
            }
            (None, None) => {
                return Err(ProviderError::Upstream(format!(
                    "{symbol}: empty result with no error"
                )))
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(None);
        };
        let Some(timestamps) = data.timestamp else {
            return Ok(None);
        };
        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Upstream(format!("{symbol}: no quote data")))?;
        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut series = SymbolSeries::default();
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| ProviderError::Upstream(format!("{symbol}: invalid timestamp {ts}")))?;

            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten());

            series.close.insert(date, close);
            series.volume.insert(date, volume);
            if adj_closes.is_some() {
                series.adjusted_close.insert(date, adj_close);
            }
        }

        if series.close.values().all(Option::is_none) {
            return Ok(None);
        }
        Ok(Some(series))
    }

    /// One symbol, with retries. `Ok(None)` when Yahoo does not know the symbol.
    fn fetch_symbol(&self, symbol: &Symbol, start: NaiveDate, end: NaiveDate) -> Result<Option<SymbolSeries>, ProviderError> {
        let url = Self::chart_url(symbol, start, end);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                debug!(%symbol, attempt, ?delay, "retrying chart request");
                std::thread::sleep(delay);
            }

            let resp = match self.client.get(&url).send() {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    last_error = Some(ProviderError::Timeout {
                        secs: self.timeout_secs,
                    });
                    continue;
                }
                Err(e) if e.is_connect() => {
                    last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                    continue;
                }
                Err(e) => return Err(ProviderError::NetworkUnreachable(e.to_string())),
            };

            let status = resp.status();

            if status == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!(%symbol, retry_after, "rate limited by Yahoo");
                last_error = Some(ProviderError::RateLimited {
                    retry_after_secs: retry_after,
                });
                continue;
            }

            if status.is_server_error() {
                last_error = Some(ProviderError::Upstream(format!("HTTP {status} for {symbol}")));
                continue;
            }

            if !status.is_success() {
                return Err(ProviderError::Upstream(format!("HTTP {status} for {symbol}")));
            }

            let chart: ChartResponse = resp.json().map_err(|e| {
                ProviderError::Upstream(format!("failed to parse response for {symbol}: {e}"))
            })?;
            return Self::parse_response(symbol, chart);
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Upstream("max retries exceeded".into())))
    }
}

/// Lay out per-symbol series as one frame.
fn assemble(query: &Query, found: &BTreeMap<Symbol, SymbolSeries>) -> RawFrame {
    let dates: Vec<NaiveDate> = found
        .values()
        .flat_map(SymbolSeries::dates)
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let index = dates.iter().map(|d| d.format("%Y-%m-%d").to_string()).collect();
    let mut frame = RawFrame::new(index);

    for (symbol, series) in found {
        let close = SymbolSeries::column(&series.close, &dates);
        let volume = SymbolSeries::column(&series.volume, &dates);
        let adjusted = (!series.adjusted_close.is_empty())
            .then(|| SymbolSeries::column(&series.adjusted_close, &dates));

        if query.symbols().len() == 1 {
            frame = frame.with_field("Close", close).with_field("Volume", volume);
            if let Some(adjusted) = adjusted {
                frame = frame.with_field("Adj Close", adjusted);
            }
        } else {
            let name = symbol.as_str();
            frame = frame
                .with_pair(name, "Close", close)
                .with_pair(name, "Volume", volume);
            if let Some(adjusted) = adjusted {
                frame = frame.with_pair(name, "Adj Close", adjusted);
            }
        }
    }

    frame
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_prices(&self, query: &Query) -> Result<RawFrame, ProviderError> {
        let mut found = BTreeMap::new();
        for symbol in query.symbols() {
            match self.fetch_symbol(symbol, query.start(), query.end())? {
                Some(series) => {
                    found.insert(symbol.clone(), series);
                }
                None => info!(%symbol, "symbol not found or has no bars in window"),
            }
        }

        if found.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }
        Ok(assemble(query, &found))
    }
}

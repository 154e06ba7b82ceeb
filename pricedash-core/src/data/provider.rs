//! Provider contract.
//!
//! A `PriceProvider` answers one `Query` with one raw frame in whatever shape the
//! upstream source uses. Normalization and caching sit above this trait; providers
//! know about neither.

use super::raw::RawFrame;
use crate::domain::Query;
use crate::error::ProviderError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// One batched fetch per query.
///
/// `Ok(RawFrame::empty())` is a successful empty result; a failure to fetch is
/// always an `Err`.
pub trait PriceProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch raw daily prices for every symbol in the query.
    fn fetch_prices(&self, query: &Query) -> Result<RawFrame, ProviderError>;
}

impl<P: PriceProvider + ?Sized> PriceProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_prices(&self, query: &Query) -> Result<RawFrame, ProviderError> {
        (**self).fetch_prices(query)
    }
}

impl<P: PriceProvider + ?Sized> PriceProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_prices(&self, query: &Query) -> Result<RawFrame, ProviderError> {
        (**self).fetch_prices(query)
    }
}

/// Provider returning a preset response, counting how often it is asked.
///
/// Useful for embedders that already hold their data, and for tests that need to
/// observe fetch counts.
pub struct StaticProvider {
    response: Result<RawFrame, ProviderError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticProvider {
    pub fn new(frame: RawFrame) -> Self {
        Self {
            response: Ok(frame),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: ProviderError) -> Self {
        Self {
            response: Err(error),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long inside every fetch, simulating a slow upstream.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `fetch_prices` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PriceProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_prices(&self, _query: &Query) -> Result<RawFrame, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.response.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn query() -> Query {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        Query::parse("SPY", d, d).unwrap()
    }

    #[test]
    fn static_provider_counts_calls() {
        let provider = StaticProvider::new(RawFrame::empty());
        assert_eq!(provider.calls(), 0);
        assert!(provider.fetch_prices(&query()).unwrap().is_empty());
        assert!(provider.fetch_prices(&query()).is_ok());
        assert_eq!(provider.calls(), 2);
    }

    #[test]
    fn static_provider_replays_error() {
        let provider = StaticProvider::failing(ProviderError::Timeout { secs: 30 });
        let err = provider.fetch_prices(&query()).unwrap_err();
        assert_eq!(err, ProviderError::Timeout { secs: 30 });
    }

    #[test]
    fn arc_provider_delegates() {
        let provider = Arc::new(StaticProvider::new(RawFrame::empty()));
        let shared: Arc<dyn PriceProvider> = provider.clone();
        assert_eq!(shared.name(), "static");
        shared.fetch_prices(&query()).unwrap();
        assert_eq!(provider.calls(), 1);
    }
}

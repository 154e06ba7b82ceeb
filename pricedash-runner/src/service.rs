//! Price service: ties a provider to a cache and derives dashboard views.
//!
//! Flow: Query → cache (or provider fetch → normalize) → canonical records →
//! matrix / returns / summary.

use crate::summary::{build_summary, SummaryRow, SummaryWindow};
use pricedash_core::cache::{CacheBackend, CacheKey, ConfiguredCache};
use pricedash_core::config::{PipelineConfig, ProviderKind};
use pricedash_core::data::{normalize, PriceProvider, SyntheticProvider, YahooProvider};
use pricedash_core::domain::{NormalizedPrices, PriceField, PriceMatrix, Query, Symbol, ViewConfig};
use pricedash_core::error::{PipelineError, ProviderError};
use pricedash_core::transform::{cumulative_returns, daily_returns, rebase_to_100};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Every view a presentation layer needs for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardViews {
    pub field: PriceField,
    /// Price matrix of the chosen field, rebased to 100 when requested.
    pub prices: PriceMatrix,
    pub rebased: bool,
    /// Rendering hint only.
    pub log_scale: bool,
    pub daily_returns: PriceMatrix,
    pub cumulative_returns: PriceMatrix,
    /// Empty when the view hides the summary.
    pub summary: Vec<SummaryRow>,
    pub missing_symbols: Vec<Symbol>,
}

/// Derive all views from normalized prices. Pure.
pub fn build_views(prices: &NormalizedPrices, view: &ViewConfig, window: &SummaryWindow) -> DashboardViews {
    let matrix = PriceMatrix::from_records(&prices.records, view.price_field);
    let returns = daily_returns(&matrix);
    let cumulative = cumulative_returns(&matrix);
    let summary = if view.show_summary {
        build_summary(&prices.records, view.price_field, window)
    } else {
        Vec::new()
    };
    let shown = if view.rebase_to_100 {
        rebase_to_100(&matrix)
    } else {
        matrix
    };

    DashboardViews {
        field: view.price_field,
        prices: shown,
        rebased: view.rebase_to_100,
        log_scale: view.log_scale,
        daily_returns: returns,
        cumulative_returns: cumulative,
        summary,
        missing_symbols: prices.missing_symbols.clone(),
    }
}

pub struct PriceService<P, C> {
    provider: P,
    cache: C,
}

/// Service assembled from configuration.
pub type ConfiguredService =
    PriceService<Box<dyn PriceProvider>, ConfiguredCache<Arc<NormalizedPrices>>>;

impl ConfiguredService {
    pub fn from_config(config: &PipelineConfig) -> Result<Self, ProviderError> {
        let provider: Box<dyn PriceProvider> = match config.provider.kind {
            ProviderKind::Yahoo => Box::new(YahooProvider::new(&config.provider)?),
            ProviderKind::Synthetic => Box::new(SyntheticProvider::new(config.provider.synthetic_seed)),
        };
        Ok(PriceService::new(provider, ConfiguredCache::from_config(&config.cache)))
    }
}

impl<P, C> PriceService<P, C>
where
    P: PriceProvider,
    C: CacheBackend<Arc<NormalizedPrices>>,
{
    pub fn new(provider: P, cache: C) -> Self {
        Self { provider, cache }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Normalized prices for `query`, from cache when fresh.
    ///
    /// Concurrent identical queries share one provider fetch. Errors are not cached.
    pub fn get_prices(&self, query: &Query) -> Result<Arc<NormalizedPrices>, PipelineError> {
        let key = CacheKey::for_query(query);
        self.cache.get_or_compute(&key, || {
            info!(
                provider = self.provider.name(),
                symbols = query.symbols().len(),
                start = %query.start(),
                end = %query.end(),
                "fetching prices"
            );
            let raw = self.provider.fetch_prices(query)?;
            let prices = normalize(&raw, query)?;
            debug!(
                records = prices.records.len(),
                missing = prices.missing_symbols.len(),
                "normalized provider output"
            );
            Ok(Arc::new(prices))
        })
    }

    /// Forget the cached entry for `query`; the next request refetches.
    pub fn invalidate(&self, query: &Query) {
        self.cache.invalidate(&CacheKey::for_query(query));
    }

    /// See [`build_views`].
    pub fn build_views(&self, prices: &NormalizedPrices, view: &ViewConfig, window: &SummaryWindow) -> DashboardViews {
        build_views(prices, view, window)
    }

    /// Fetch and derive every view for `query` in one call.
    pub fn load_views(&self, query: &Query, view: &ViewConfig) -> Result<DashboardViews, PipelineError> {
        let prices = self.get_prices(query)?;
        Ok(build_views(&prices, view, &SummaryWindow::from_query(query)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pricedash_core::cache::{MemoryCache, NoCache};
    use pricedash_core::data::{RawFrame, StaticProvider};
    use std::time::Duration;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn query() -> Query {
        Query::parse("AAPL", d("2024-01-01"), d("2024-01-31")).unwrap()
    }

    fn frame() -> RawFrame {
        RawFrame::new(vec!["2024-01-02".into(), "2024-01-03".into(), "2024-01-04".into()])
            .with_field("Close", vec![100.0, 110.0, 99.0])
            .with_field("Adj Close", vec![50.0, 55.0, 49.5])
    }

    #[test]
    fn cached_prices_skip_the_provider() {
        let service = PriceService::new(
            StaticProvider::new(frame()),
            MemoryCache::new(Duration::from_secs(60)),
        );
        let a = service.get_prices(&query()).unwrap();
        let b = service.get_prices(&query()).unwrap();
        assert_eq!(a, b);
        assert_eq!(service.provider().calls(), 1);

        service.invalidate(&query());
        service.get_prices(&query()).unwrap();
        assert_eq!(service.provider().calls(), 2);
    }

    #[test]
    fn no_cache_fetches_every_time() {
        let service = PriceService::new(StaticProvider::new(frame()), NoCache);
        service.get_prices(&query()).unwrap();
        service.get_prices(&query()).unwrap();
        assert_eq!(service.provider().calls(), 2);
    }

    #[test]
    fn views_follow_view_config() {
        let service = PriceService::new(StaticProvider::new(frame()), NoCache);
        let view = ViewConfig {
            price_field: PriceField::Close,
            rebase_to_100: true,
            log_scale: true,
            show_summary: true,
        };
        let views = service.load_views(&query(), &view).unwrap();
        assert!(views.rebased);
        assert!(views.log_scale);
        assert_eq!(views.prices.get(0, 0), Some(100.0));
        assert!((views.prices.get(1, 0).unwrap() - 110.0).abs() < 1e-9);
        assert!((views.daily_returns.get(1, 0).unwrap() - 0.1).abs() < 1e-12);
        assert!((views.cumulative_returns.get(2, 0).unwrap() - (-0.01)).abs() < 1e-12);
        assert_eq!(views.summary.len(), 1);

        let hidden = ViewConfig {
            show_summary: false,
            ..ViewConfig::default()
        };
        let views = service.load_views(&query(), &hidden).unwrap();
        assert!(views.summary.is_empty());
        assert_eq!(views.field, PriceField::AdjustedClose);
        assert_eq!(views.prices.get(0, 0), Some(50.0));
    }

    #[test]
    fn configured_service_builds_synthetic_provider() {
        let mut config = PipelineConfig::default();
        config.provider.kind = ProviderKind::Synthetic;
        let service = ConfiguredService::from_config(&config).unwrap();
        assert_eq!(service.provider().name(), "synthetic");
        assert_eq!(service.cache().name(), "memory");
        let prices = service.get_prices(&query()).unwrap();
        assert!(prices.missing_symbols.is_empty());
    }
}

//! PriceDash Core: price normalization and analytics primitives.
//!
//! This crate contains the pipeline up to the wide matrix:
//! - Domain types (symbols, queries, canonical records, price matrices)
//! - Provider contract plus Yahoo, synthetic and static adapters
//! - Normalizer from provider-native raw frames to canonical long-form records
//! - Cache layer with TTL expiry and per-key single-flight
//! - Pure matrix, returns and rebase transforms
//! - TOML pipeline configuration

pub mod cache;
pub mod config;
pub mod data;
pub mod domain;
pub mod error;
pub mod transform;

pub use cache::{CacheBackend, CacheKey, ConfiguredCache, FileCache, MemoryCache, NoCache};
pub use config::{PipelineConfig, CONFIG_ENV_VAR};
pub use data::{normalize, PriceProvider, RawFrame, StaticProvider, SyntheticProvider, YahooProvider};
pub use domain::{
    parse_symbols, CanonicalPriceRecord, Cell, Diagnostic, NormalizedPrices, PriceField,
    PriceMatrix, Query, Symbol, ViewConfig,
};
pub use error::{
    ConfigError, MalformedOutputError, PipelineError, ProviderError, QueryError,
    UnknownFieldError,
};

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: values crossing thread boundaries are Send + Sync.
    ///
    /// The cache shares results between concurrent callers; a non-Sync field
    /// added to any of these breaks the build here first.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<Query>();
        require_sync::<Query>();
        require_send::<NormalizedPrices>();
        require_sync::<NormalizedPrices>();
        require_send::<PriceMatrix>();
        require_sync::<PriceMatrix>();
        require_send::<PipelineError>();
        require_sync::<PipelineError>();

        require_send::<MemoryCache<std::sync::Arc<NormalizedPrices>>>();
        require_sync::<MemoryCache<std::sync::Arc<NormalizedPrices>>>();
        require_send::<FileCache<std::sync::Arc<NormalizedPrices>>>();
        require_sync::<FileCache<std::sync::Arc<NormalizedPrices>>>();

        require_send::<YahooProvider>();
        require_sync::<YahooProvider>();
        require_send::<StaticProvider>();
        require_sync::<StaticProvider>();
    }

    /// The provider contract stays object-safe so adapters can be chosen at runtime.
    #[test]
    fn provider_trait_is_object_safe() {
        fn _accepts_dyn(provider: &dyn PriceProvider, query: &Query) -> Result<RawFrame, ProviderError> {
            provider.fetch_prices(query)
        }
    }
}

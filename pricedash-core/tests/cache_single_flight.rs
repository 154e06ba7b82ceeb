//! Cache layer wired to a provider: concurrent identical queries fetch once.

use chrono::NaiveDate;
use pricedash_core::cache::{CacheBackend, CacheKey, FileCache, MemoryCache};
use pricedash_core::data::{normalize, PriceProvider, RawFrame, StaticProvider};
use pricedash_core::domain::{NormalizedPrices, Query};
use pricedash_core::error::{PipelineError, ProviderError};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn frame() -> RawFrame {
    RawFrame::new(vec!["2024-01-02".into(), "2024-01-03".into()])
        .with_pair("AAPL", "Close", vec![185.6, 184.3])
        .with_pair("MSFT", "Close", vec![370.0, 372.5])
}

fn fetch<C>(cache: &C, provider: &StaticProvider, query: &Query) -> Result<Arc<NormalizedPrices>, PipelineError>
where
    C: CacheBackend<Arc<NormalizedPrices>>,
{
    cache.get_or_compute(&CacheKey::for_query(query), || {
        let raw = provider.fetch_prices(query)?;
        Ok(Arc::new(normalize(&raw, query)?))
    })
}

#[test]
fn two_concurrent_identical_queries_fetch_once() {
    let provider = Arc::new(StaticProvider::new(frame()).with_delay(Duration::from_millis(100)));
    let cache = Arc::new(MemoryCache::new(Duration::from_secs(300)));
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = ["AAPL,MSFT", "MSFT,AAPL"]
        .into_iter()
        .map(|symbols| {
            let provider = Arc::clone(&provider);
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let query = Query::parse(symbols, d("2024-01-01"), d("2024-01-31")).unwrap();
            thread::spawn(move || {
                barrier.wait();
                fetch(cache.as_ref(), &provider, &query)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
    assert_eq!(provider.calls(), 1);
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0].records.len(), 4);
}

#[test]
fn failed_fetch_is_not_cached() {
    let failing = StaticProvider::failing(ProviderError::Timeout { secs: 30 });
    let cache = MemoryCache::new(Duration::from_secs(300));
    let query = Query::parse("AAPL", d("2024-01-01"), d("2024-01-31")).unwrap();

    let err = fetch(&cache, &failing, &query).unwrap_err();
    assert!(err.is_retryable());

    let working = StaticProvider::new(
        RawFrame::new(vec!["2024-01-02".into()]).with_field("Close", vec![185.6]),
    );
    let prices = fetch(&cache, &working, &query).unwrap();
    assert_eq!(prices.records.len(), 1);
    assert_eq!(working.calls(), 1);
}

#[test]
fn malformed_output_is_not_cached() {
    let bad = StaticProvider::new(
        RawFrame::new(vec!["2024-01-02".into()]).with_field("Close", vec!["oops"]),
    );
    let cache = MemoryCache::new(Duration::from_secs(300));
    let query = Query::parse("AAPL", d("2024-01-01"), d("2024-01-31")).unwrap();

    assert!(matches!(
        fetch(&cache, &bad, &query),
        Err(PipelineError::MalformedProviderOutput(_))
    ));
    assert!(fetch(&cache, &bad, &query).is_err());
    assert_eq!(bad.calls(), 2);
}

#[test]
fn file_cache_serves_second_process_view() {
    let dir = tempfile::tempdir().unwrap();
    let provider = StaticProvider::new(frame());
    let query = Query::parse("AAPL,MSFT", d("2024-01-01"), d("2024-01-31")).unwrap();

    let first = FileCache::new(dir.path(), Duration::from_secs(300));
    let a = fetch(&first, &provider, &query).unwrap();

    let second = FileCache::new(dir.path(), Duration::from_secs(300));
    let b = fetch(&second, &provider, &query).unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(a, b);
}

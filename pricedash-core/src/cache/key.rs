//! Deterministic cache keys derived from a `Query`.

use crate::domain::Query;
use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 hex digest of a query's canonical form.
///
/// Symbol order does not matter: `AAPL,MSFT` and `MSFT,AAPL` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn for_query(query: &Query) -> Self {
        use serde_json::json;

        let symbols: Vec<String> = query
            .sorted_symbols()
            .into_iter()
            .map(|s| s.as_str().to_string())
            .collect();
        // serde_json's default map keeps keys sorted
        let canonical = json!({
            "symbols": symbols,
            "start": query.start().to_string(),
            "end": query.end().to_string(),
            "interval": query.interval().as_str(),
            "adjusted": query.include_unadjusted_and_adjusted(),
        });
        let hash = blake3::hash(canonical.to_string().as_bytes());
        Self(hash.to_hex().to_string())
    }

    /// Key for arbitrary pre-canonicalized content.
    pub fn from_content(content: &str) -> Self {
        Self(blake3::hash(content.as_bytes()).to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn symbol_order_does_not_matter() {
        let a = Query::parse("AAPL,MSFT", d("2024-01-01"), d("2024-06-30")).unwrap();
        let b = Query::parse("msft; aapl", d("2024-01-01"), d("2024-06-30")).unwrap();
        assert_eq!(CacheKey::for_query(&a), CacheKey::for_query(&b));
    }

    #[test]
    fn every_field_participates() {
        let base = Query::parse("AAPL", d("2024-01-01"), d("2024-06-30")).unwrap();
        let key = CacheKey::for_query(&base);

        let other_end = Query::parse("AAPL", d("2024-01-01"), d("2024-07-01")).unwrap();
        let other_symbols = Query::parse("AAPL,SPY", d("2024-01-01"), d("2024-06-30")).unwrap();
        let adjusted = base.clone().with_adjusted(true);

        assert_ne!(key, CacheKey::for_query(&other_end));
        assert_ne!(key, CacheKey::for_query(&other_symbols));
        assert_ne!(key, CacheKey::for_query(&adjusted));
    }

    #[test]
    fn key_is_hex_digest() {
        let q = Query::parse("AAPL", d("2024-01-01"), d("2024-06-30")).unwrap();
        let key = CacheKey::for_query(&q);
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}

//! Deterministic synthetic prices for offline use.
//!
//! Each symbol gets its own random walk seeded from `(seed, symbol)` via BLAKE3,
//! so a symbol's path does not depend on which other symbols share the query.
//! Walks are anchored at a fixed epoch and only weekdays produce bars.

use super::provider::PriceProvider;
use super::raw::RawFrame;
use crate::domain::{Query, Symbol};
use crate::error::ProviderError;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Daily bar drift range (fractional change per step).
const STEP: f64 = 0.02;

/// Fraction of close reported as adjusted close.
const ADJUSTMENT: f64 = 0.985;

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or(NaiveDate::MIN)
}

pub struct SyntheticProvider {
    seed: u64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Per-symbol RNG, independent of derivation order.
    fn rng_for(&self, symbol: &Symbol) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(symbol.as_str().as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        StdRng::seed_from_u64(u64::from_le_bytes(bytes))
    }

    /// `(date, close, volume)` for every weekday in the query window.
    fn walk(&self, symbol: &Symbol, start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, f64, u64)> {
        let mut rng = self.rng_for(symbol);
        let mut price: f64 = rng.gen_range(20.0..500.0);
        let mut bars = Vec::new();

        let mut date = start.min(epoch());
        while date <= end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                price *= 1.0 + rng.gen_range(-STEP..STEP);
                let volume = rng.gen_range(100_000u64..10_000_000);
                if date >= start {
                    bars.push((date, price, volume));
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        bars
    }
}

impl PriceProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_prices(&self, query: &Query) -> Result<RawFrame, ProviderError> {
        let walks: Vec<(&Symbol, Vec<(NaiveDate, f64, u64)>)> = query
            .symbols()
            .iter()
            .map(|s| (s, self.walk(s, query.start(), query.end())))
            .collect();

        // Every walk covers the same weekdays.
        let index = walks
            .first()
            .map(|(_, bars)| {
                bars.iter()
                    .map(|(d, _, _)| d.format("%Y-%m-%d").to_string())
                    .collect()
            })
            .unwrap_or_default();
        let mut frame = RawFrame::new(index);

        let flat = walks.len() == 1;
        for (symbol, bars) in &walks {
            let close: Vec<f64> = bars.iter().map(|b| b.1).collect();
            let adjusted: Vec<f64> = close.iter().map(|c| c * ADJUSTMENT).collect();
            let volume: Vec<u64> = bars.iter().map(|b| b.2).collect();
            if flat {
                frame = frame
                    .with_field("Close", close)
                    .with_field("Adj Close", adjusted)
                    .with_field("Volume", volume);
            } else {
                let name = symbol.as_str();
                frame = frame
                    .with_pair(name, "Close", close)
                    .with_pair(name, "Adj Close", adjusted)
                    .with_pair(name, "Volume", volume);
            }
        }
        Ok(frame)
    }
}

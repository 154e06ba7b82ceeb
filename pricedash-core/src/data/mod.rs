//! Provider contract, provider adapters and raw-output normalization.

pub mod normalize;
pub mod provider;
pub mod raw;
pub mod synthetic;
pub mod yahoo;

pub use normalize::normalize;
pub use provider::{PriceProvider, StaticProvider};
pub use raw::{ColumnKey, RawCell, RawColumn, RawFrame};
pub use synthetic::SyntheticProvider;
pub use yahoo::YahooProvider;

//! Domain types: queries, canonical records, matrices.

pub mod matrix;
pub mod query;
pub mod record;
pub mod symbol;

pub use matrix::{Cell, PriceMatrix};
pub use query::{Interval, Query};
pub use record::{CanonicalPriceRecord, Diagnostic, NormalizedPrices, PriceField, ViewConfig};
pub use symbol::{parse_symbols, Symbol};

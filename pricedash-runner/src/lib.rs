//! PriceDash Runner: orchestration, summaries, export and discovery.
//!
//! This crate builds on `pricedash-core` to provide:
//! - Price service tying a provider to a cache and deriving dashboard views
//! - Per-symbol summary statistics (total return, volatility, drawdown)
//! - CSV, Parquet and JSON export
//! - Sector universes and volatility-ranked discovery

pub mod discovery;
pub mod export;
pub mod metrics;
pub mod service;
pub mod summary;

pub use discovery::{
    top_by_volatility, universe_volatility, SymbolVolatility, Universe, UniverseError,
};
pub use export::{
    matrix_to_csv, matrix_to_dataframe, records_to_csv, records_to_dataframe, save_exports,
    summary_to_json, write_parquet, ExportError, ExportPaths,
};
pub use service::{build_views, ConfiguredService, DashboardViews, PriceService};
pub use summary::{build_summary, SummaryRow, SummaryWindow};

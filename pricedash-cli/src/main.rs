//! PriceDash CLI: fetch, summarize and export price data.
//!
//! Commands:
//! - `fetch`: normalize prices for a list of symbols, print a summary, write exports
//! - `discover`: rank a symbol universe by recent volatility
//! - `config`: print the effective configuration as TOML

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pricedash_core::domain::{Diagnostic, NormalizedPrices, PriceField, Query};
use pricedash_core::{PipelineConfig, CONFIG_ENV_VAR};
use pricedash_runner::{
    save_exports, top_by_volatility, universe_volatility, ConfiguredService, SummaryRow, SummaryWindow,
    Universe,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricedash",
    about = "PriceDash CLI: price normalization and analytics"
)]
struct Cli {
    /// TOML config file. Falls back to $PRICEDASH_CONFIG, then defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch prices, print the summary table and write CSV exports.
    Fetch {
        /// Symbols, separated by commas or spaces (e.g., "AAPL,MSFT SPY").
        #[arg(required = true)]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to one year before the end date.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,

        /// Price field: close or adjusted_close. Defaults to the configured view.
        #[arg(long)]
        field: Option<String>,

        /// Rebase the exported matrix so each symbol starts at 100.
        #[arg(long, default_value_t = false)]
        rebase: bool,

        /// Request both raw and adjusted closes from the provider.
        #[arg(long, default_value_t = false)]
        adjusted: bool,

        /// Also write Parquet files.
        #[arg(long, default_value_t = false)]
        parquet: bool,

        /// Output directory for exports.
        #[arg(long, default_value = "output")]
        out_dir: PathBuf,
    },
    /// Rank a universe of symbols by annualized volatility.
    Discover {
        /// Number of symbols to show.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Universe TOML file. Defaults to the built-in US list.
        #[arg(long)]
        universe: Option<PathBuf>,

        /// As-of date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            symbols,
            start,
            end,
            field,
            rebase,
            adjusted,
            parquet,
            out_dir,
        } => run_fetch(
            config, &symbols, start, end, field, rebase, adjusted, parquet, &out_dir,
        ),
        Commands::Discover {
            top,
            universe,
            as_of,
        } => run_discover(&config, top, universe.as_deref(), as_of),
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn load_config(explicit: Option<&Path>) -> Result<PipelineConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from));
    match path {
        Some(path) => PipelineConfig::from_file(&path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn parse_date(raw: Option<String>, default: NaiveDate) -> Result<NaiveDate> {
    raw.as_deref()
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'")))
        .transpose()
        .map(|d| d.unwrap_or(default))
}

#[allow(clippy::too_many_arguments)]
fn run_fetch(
    mut config: PipelineConfig,
    symbols: &[String],
    start: Option<String>,
    end: Option<String>,
    field: Option<String>,
    rebase: bool,
    adjusted: bool,
    parquet: bool,
    out_dir: &Path,
) -> Result<()> {
    let end_date = parse_date(end, chrono::Local::now().date_naive())?;
    let start_date = parse_date(start, end_date - chrono::Duration::days(365))?;

    if let Some(field) = field {
        config.view.price_field = field.parse::<PriceField>()?;
    }
    config.view.rebase_to_100 |= rebase;

    let query = Query::parse(&symbols.join(","), start_date, end_date)?.with_adjusted(adjusted);
    let service = ConfiguredService::from_config(&config)?;

    let prices = service.get_prices(&query)?;
    let views = service.build_views(&prices, &config.view, &SummaryWindow::from_query(&query));

    for message in data_warnings(&prices) {
        warn!("{message}");
    }

    print_summary(&views.field, start_date, end_date, &views.summary);

    let paths = save_exports(out_dir, &prices.records, &views.prices, &views.summary, parquet)?;
    println!("Long CSV:   {}", paths.long_csv.display());
    println!("Matrix CSV: {}", paths.wide_csv.display());
    if let Some(p) = &paths.wide_parquet {
        println!("Parquet:    {}", p.display());
    }
    Ok(())
}

/// User-facing warnings about symbols with missing or incomplete data.
fn data_warnings(prices: &NormalizedPrices) -> Vec<String> {
    let mut out: Vec<String> = prices
        .missing_symbols
        .iter()
        .map(|s| format!("no data returned for {s}"))
        .collect();
    out.extend(prices.diagnostics.iter().filter_map(|d| match d {
        Diagnostic::AdjustedCloseUnavailable { symbol } => {
            Some(format!("adjusted close unavailable for {symbol}"))
        }
        _ => None,
    }));
    out
}

fn run_discover(
    config: &PipelineConfig,
    top: usize,
    universe_path: Option<&Path>,
    as_of: Option<String>,
) -> Result<()> {
    let universe = match universe_path {
        Some(path) => Universe::from_file(path)?,
        None => Universe::default_us(),
    };
    let as_of = parse_date(as_of, chrono::Local::now().date_naive())?;
    let symbols = universe.all_symbols()?;
    info!(symbols = symbols.len(), %as_of, "ranking universe by volatility");
    let service = ConfiguredService::from_config(config)?;

    let ranked = top_by_volatility(universe_volatility(&service, &symbols, as_of), top);
    if ranked.is_empty() {
        println!("No symbols could be scored.");
        return Ok(());
    }

    println!("{:<4} {:<8} {:>10} {:>8}", "#", "Symbol", "Ann. Vol", "Returns");
    println!("{}", "-".repeat(33));
    for (i, s) in ranked.iter().enumerate() {
        println!(
            "{:<4} {:<8} {:>9.2}% {:>8}",
            i + 1,
            s.symbol,
            s.annualized_volatility * 100.0,
            s.returns_used
        );
    }
    Ok(())
}

fn pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}%", v * 100.0)).unwrap_or_else(|| "-".into())
}

fn print_summary(field: &PriceField, start: NaiveDate, end: NaiveDate, rows: &[SummaryRow]) {
    if rows.is_empty() {
        return;
    }
    println!();
    println!("=== Summary ({}) {start} to {end} ===", field.label());
    println!(
        "{:<8} {:>5} {:>12} {:>10} {:>10} {:>10}",
        "Symbol", "Obs", "Last", "Return", "Ann. Vol", "Max DD"
    );
    println!("{}", "-".repeat(60));
    for row in rows {
        println!(
            "{:<8} {:>5} {:>12} {:>10} {:>10} {:>10}",
            row.symbol,
            row.observations,
            row.last_value.map(|v| format!("{v:.2}")).unwrap_or_else(|| "-".into()),
            pct(row.total_return),
            pct(row.annualized_volatility),
            pct(row.max_drawdown),
        );
    }
    println!();
}

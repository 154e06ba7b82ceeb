//! Export: CSV, Parquet and JSON artifacts for prices and summaries.
//!
//! Formats:
//! - **CSV long**: `date, symbol, close, adjusted_close, volume`
//! - **CSV wide**: `date, <symbol1>, <symbol2>, ...` with symbols sorted
//! - **Parquet**: the same two tables, nulls for absent values
//! - **JSON**: summary rows
//!
//! Absent values are empty CSV fields, never zero.

use crate::summary::SummaryRow;
use chrono::NaiveDate;
use polars::prelude::*;
use pricedash_core::domain::{CanonicalPriceRecord, PriceMatrix};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub const LONG_CSV_FILE: &str = "prices_long.csv";
pub const WIDE_CSV_FILE: &str = "prices_matrix.csv";
pub const LONG_PARQUET_FILE: &str = "prices_long.parquet";
pub const WIDE_PARQUET_FILE: &str = "prices_matrix.parquet";
pub const SUMMARY_JSON_FILE: &str = "summary.json";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV writer flush failed: {0}")]
    Flush(String),

    #[error("CSV output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("parquet error: {0}")]
    Parquet(#[from] PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError + '_ {
    move |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn opt_to_field<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    Ok(String::from_utf8(data)?)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Long-form CSV, one row per record.
pub fn records_to_csv(records: &[CanonicalPriceRecord]) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", "symbol", "close", "adjusted_close", "volume"])?;
    for r in records {
        wtr.write_record([
            r.date.to_string(),
            r.symbol.to_string(),
            r.close.to_string(),
            opt_to_field(r.adjusted_close),
            opt_to_field(r.volume),
        ])?;
    }
    finish_csv(wtr)
}

/// Wide CSV, one row per date and one column per symbol.
pub fn matrix_to_csv(matrix: &PriceMatrix) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    let mut header = vec!["date".to_string()];
    header.extend(matrix.symbols().iter().map(|s| s.to_string()));
    wtr.write_record(&header)?;

    for (date, row) in matrix.dates().iter().zip(matrix.rows()) {
        let mut fields = Vec::with_capacity(row.len() + 1);
        fields.push(date.to_string());
        fields.extend(row.iter().map(|c| opt_to_field(*c)));
        wtr.write_record(&fields)?;
    }
    finish_csv(wtr)
}

// ─── Parquet export ─────────────────────────────────────────────────

fn epoch_days(dates: impl Iterator<Item = NaiveDate>) -> Vec<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    dates.map(|d| (d - epoch).num_days() as i32).collect()
}

fn date_column(dates: impl Iterator<Item = NaiveDate>) -> Result<Column, ExportError> {
    Ok(Column::new("date".into(), epoch_days(dates)).cast(&DataType::Date)?)
}

/// Long-form records as a Polars DataFrame.
pub fn records_to_dataframe(records: &[CanonicalPriceRecord]) -> Result<DataFrame, ExportError> {
    let symbols: Vec<&str> = records.iter().map(|r| r.symbol.as_str()).collect();
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();
    let adjusted: Vec<Option<f64>> = records.iter().map(|r| r.adjusted_close).collect();
    let volumes: Vec<Option<u64>> = records.iter().map(|r| r.volume).collect();

    Ok(DataFrame::new(vec![
        date_column(records.iter().map(|r| r.date))?,
        Column::new("symbol".into(), symbols),
        Column::new("close".into(), closes),
        Column::new("adjusted_close".into(), adjusted),
        Column::new("volume".into(), volumes),
    ])?)
}

/// Wide matrix as a Polars DataFrame, one nullable column per symbol.
pub fn matrix_to_dataframe(matrix: &PriceMatrix) -> Result<DataFrame, ExportError> {
    let mut columns = vec![date_column(matrix.dates().iter().copied())?];
    for (col, symbol) in matrix.symbols().iter().enumerate() {
        let values: Vec<Option<f64>> = matrix.rows().iter().map(|row| row[col]).collect();
        columns.push(Column::new(symbol.as_str().into(), values));
    }
    Ok(DataFrame::new(columns)?)
}

pub fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), ExportError> {
    let file = fs::File::create(path).map_err(io_err(path))?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}

// ─── JSON export ────────────────────────────────────────────────────

pub fn summary_to_json(rows: &[SummaryRow]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(rows)?)
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Paths written by [`save_exports`].
#[derive(Debug, Clone, Default)]
pub struct ExportPaths {
    pub long_csv: PathBuf,
    pub wide_csv: PathBuf,
    pub summary_json: PathBuf,
    pub long_parquet: Option<PathBuf>,
    pub wide_parquet: Option<PathBuf>,
}

/// Write the long and wide CSVs plus the summary JSON into `output_dir`,
/// and the Parquet pair when `parquet` is set.
pub fn save_exports(
    output_dir: &Path,
    records: &[CanonicalPriceRecord],
    matrix: &PriceMatrix,
    summary: &[SummaryRow],
    parquet: bool,
) -> Result<ExportPaths, ExportError> {
    fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;

    let write = |name: &str, content: String| -> Result<PathBuf, ExportError> {
        let path = output_dir.join(name);
        fs::write(&path, content).map_err(io_err(&path))?;
        Ok(path)
    };

    let mut paths = ExportPaths {
        long_csv: write(LONG_CSV_FILE, records_to_csv(records)?)?,
        wide_csv: write(WIDE_CSV_FILE, matrix_to_csv(matrix)?)?,
        summary_json: write(SUMMARY_JSON_FILE, summary_to_json(summary)?)?,
        ..ExportPaths::default()
    };

    if parquet {
        let long = output_dir.join(LONG_PARQUET_FILE);
        write_parquet(&mut records_to_dataframe(records)?, &long)?;
        let wide = output_dir.join(WIDE_PARQUET_FILE);
        write_parquet(&mut matrix_to_dataframe(matrix)?, &wide)?;
        paths.long_parquet = Some(long);
        paths.wide_parquet = Some(wide);
    }

    info!(dir = %output_dir.display(), records = records.len(), "exports written");
    Ok(paths)
}

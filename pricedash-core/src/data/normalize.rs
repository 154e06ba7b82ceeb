//! Raw frame → canonical long-form records.
//!
//! Pure and deterministic. Recognized shapes:
//! - flat table (bare field columns) for a single-symbol query,
//! - paired table keyed by `(symbol, field)`, or `(field, symbol)` which is swapped.
//!
//! Anything else is a `MalformedOutputError` and no partial records escape.

use super::raw::{ColumnKey, RawCell, RawColumn, RawFrame};
use crate::domain::{CanonicalPriceRecord, Diagnostic, NormalizedPrices, Query, Symbol};
use crate::error::MalformedOutputError;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

/// Fields the normalizer extracts. Everything else (open, high, ...) is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawField {
    Close,
    AdjustedClose,
    Volume,
}

/// Labels that name a field but are not extracted.
const IGNORED_FIELDS: &[&str] = &[
    "open",
    "high",
    "low",
    "dividends",
    "stock splits",
    "capital gains",
];

fn canonical_label(label: &str) -> String {
    label.trim().trim_end_matches('*').trim().to_ascii_lowercase()
}

fn field_alias(label: &str) -> Option<RawField> {
    match canonical_label(label).as_str() {
        "close" => Some(RawField::Close),
        "adj close" | "adjclose" | "adj_close" | "adjusted_close" | "adjusted close" => {
            Some(RawField::AdjustedClose)
        }
        "volume" => Some(RawField::Volume),
        _ => None,
    }
}

/// Whether a label looks like a field name rather than a symbol.
fn is_field_label(label: &str) -> bool {
    field_alias(label).is_some() || IGNORED_FIELDS.contains(&canonical_label(label).as_str())
}

/// Parse a row label into a calendar date, dropping any time component.
fn parse_date_label(label: &str) -> Option<NaiveDate> {
    let label = label.trim();
    let day = label.get(..10)?;
    let rest = &label[10..];
    if !(rest.is_empty() || rest.starts_with(' ') || rest.starts_with('T')) {
        return None;
    }
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Coerce a raw cell to an optional finite number.
fn coerce(cell: &RawCell) -> Result<Option<f64>, String> {
    match cell {
        RawCell::Missing => Ok(None),
        RawCell::Number(v) if v.is_nan() => Ok(None),
        RawCell::Number(v) if v.is_finite() => Ok(Some(*v)),
        RawCell::Number(v) => Err(format!("non-finite value {v}")),
        RawCell::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
                return Ok(None);
            }
            match trimmed.parse::<f64>() {
                Ok(v) if v.is_finite() => Ok(Some(v)),
                _ => Err(format!("cannot coerce '{text}' to a number")),
            }
        }
    }
}

fn coerce_volume(cell: &RawCell) -> Result<Option<u64>, String> {
    match coerce(cell)? {
        None => Ok(None),
        Some(v) if v < 0.0 => Err(format!("negative volume {v}")),
        Some(v) => Ok(Some(v.round() as u64)),
    }
}

/// The extracted columns for one symbol.
#[derive(Default)]
struct SymbolColumns<'a> {
    close: Option<&'a RawColumn>,
    adjusted_close: Option<&'a RawColumn>,
    volume: Option<&'a RawColumn>,
}

impl<'a> SymbolColumns<'a> {
    fn assign(&mut self, field: RawField, column: &'a RawColumn) {
        let slot = match field {
            RawField::Close => &mut self.close,
            RawField::AdjustedClose => &mut self.adjusted_close,
            RawField::Volume => &mut self.volume,
        };
        if slot.is_some() {
            debug!(column = %column.key, "duplicate field column, keeping the later one");
        }
        *slot = Some(column);
    }
}

/// Normalize a provider frame against the query that produced it.
pub fn normalize(raw: &RawFrame, query: &Query) -> Result<NormalizedPrices, MalformedOutputError> {
    let malformed = |reason: String| MalformedOutputError::new(raw.shape(), reason);

    if raw.is_empty() {
        debug!(symbols = query.symbols().len(), "provider returned an empty frame");
        return Ok(NormalizedPrices {
            records: Vec::new(),
            missing_symbols: query.sorted_symbols(),
            diagnostics: Vec::new(),
        });
    }

    if raw.columns.is_empty() {
        return Err(malformed(format!(
            "{} rows but no data columns",
            raw.n_rows()
        )));
    }

    for column in &raw.columns {
        if column.cells.len() != raw.n_rows() {
            return Err(malformed(format!(
                "column {} has {} cells, index has {} rows",
                column.key,
                column.cells.len(),
                raw.n_rows()
            )));
        }
    }

    let dates = raw
        .index
        .iter()
        .map(|label| {
            parse_date_label(label).ok_or_else(|| malformed(format!("unparseable date label '{label}'")))
        })
        .collect::<Result<Vec<NaiveDate>, _>>()?;

    let mut diagnostics = Vec::new();
    let grouped = group_columns(raw, query, &mut diagnostics).map_err(malformed)?;

    // (date, symbol) -> (record, times seen)
    let mut collected: BTreeMap<(NaiveDate, Symbol), (CanonicalPriceRecord, usize)> =
        BTreeMap::new();

    for (symbol, columns) in &grouped {
        let close = columns.close.ok_or_else(|| {
            malformed(format!("symbol {symbol} has data columns but no close column"))
        })?;

        let mut any_adjusted = false;
        let mut any_record = false;

        for (row, date) in dates.iter().enumerate() {
            let cell_err = |column: &RawColumn, e: String| {
                malformed(format!("row {row} ({date}), column {}: {e}", column.key))
            };

            let close_value = coerce(&close.cells[row]).map_err(|e| cell_err(close, e))?;
            let adjusted = match columns.adjusted_close {
                Some(col) => coerce(&col.cells[row]).map_err(|e| cell_err(col, e))?,
                None => None,
            };
            let volume = match columns.volume {
                Some(col) => coerce_volume(&col.cells[row]).map_err(|e| cell_err(col, e))?,
                None => None,
            };

            let Some(close_value) = close_value else {
                if adjusted.is_some() || volume.is_some() {
                    diagnostics.push(Diagnostic::MissingClose {
                        date: *date,
                        symbol: symbol.clone(),
                    });
                }
                continue;
            };

            // Rows outside the window are dropped with a diagnostic, not rejected.
            if !query.covers(*date) {
                diagnostics.push(Diagnostic::OutOfWindow {
                    date: *date,
                    symbol: symbol.clone(),
                });
                continue;
            }

            any_adjusted |= adjusted.is_some();
            any_record = true;

            let record = CanonicalPriceRecord {
                date: *date,
                symbol: symbol.clone(),
                close: close_value,
                adjusted_close: adjusted,
                volume,
            };
            collected
                .entry((*date, symbol.clone()))
                .and_modify(|(kept, seen)| {
                    *kept = record.clone();
                    *seen += 1;
                })
                .or_insert((record, 1));
        }

        if any_record && !any_adjusted && query.include_unadjusted_and_adjusted() {
            warn!(%symbol, "adjusted close requested but not supplied");
            diagnostics.push(Diagnostic::AdjustedCloseUnavailable {
                symbol: symbol.clone(),
            });
        }
    }

    let mut records = Vec::with_capacity(collected.len());
    for ((date, symbol), (record, seen)) in collected {
        if seen > 1 {
            diagnostics.push(Diagnostic::DuplicateCollapsed {
                date,
                symbol,
                dropped: seen - 1,
            });
        }
        records.push(record);
    }

    let missing_symbols: Vec<Symbol> = query
        .sorted_symbols()
        .into_iter()
        .filter(|s| !records.iter().any(|r| &r.symbol == s))
        .collect();

    if !missing_symbols.is_empty() {
        warn!(
            missing = ?missing_symbols.iter().map(Symbol::as_str).collect::<Vec<_>>(),
            "no data returned for some symbols"
        );
    }
    if !diagnostics.is_empty() {
        debug!(count = diagnostics.len(), "normalization diagnostics");
    }

    Ok(NormalizedPrices {
        records,
        missing_symbols,
        diagnostics,
    })
}

/// Distinct labels at one level of the pair that name a queried symbol.
fn queried_labels<'a>(labels: impl Iterator<Item = &'a str>, query: &Query) -> usize {
    labels
        .collect::<HashSet<&str>>()
        .into_iter()
        .filter(|label| Symbol::new(label).is_ok_and(|s| query.contains(&s)))
        .count()
}

/// Whether paired columns are keyed `(field, symbol)` rather than `(symbol, field)`.
///
/// The level holding more of the queried symbols is the symbol level. On a tie,
/// the pair is field-first when some first-level label is a field name and no
/// second-level label is.
fn fields_first(pairs: &[(&str, &str, &RawColumn)], query: &Query) -> bool {
    let first = queried_labels(pairs.iter().map(|(a, _, _)| *a), query);
    let second = queried_labels(pairs.iter().map(|(_, b, _)| *b), query);
    if first != second {
        return second > first;
    }
    pairs.iter().any(|(a, _, _)| is_field_label(a)) && !pairs.iter().any(|(_, b, _)| is_field_label(b))
}

/// Assign raw columns to queried symbols.
///
/// Errors are returned as a plain reason; the caller attaches the frame shape.
fn group_columns<'a>(
    raw: &'a RawFrame,
    query: &Query,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<BTreeMap<Symbol, SymbolColumns<'a>>, String> {
    let flat = raw
        .columns
        .iter()
        .filter(|c| matches!(c.key, ColumnKey::Field(_)))
        .count();
    let mut grouped: BTreeMap<Symbol, SymbolColumns<'a>> = BTreeMap::new();

    if flat == raw.columns.len() {
        let [symbol] = query.symbols() else {
            return Err(format!(
                "flat table cannot be attributed to {} queried symbols",
                query.symbols().len()
            ));
        };
        let mut columns = SymbolColumns::default();
        for column in &raw.columns {
            if let ColumnKey::Field(name) = &column.key {
                if let Some(field) = field_alias(name) {
                    columns.assign(field, column);
                }
            }
        }
        grouped.insert(symbol.clone(), columns);
        return Ok(grouped);
    }

    if flat > 0 {
        return Err("table mixes flat and paired columns".to_string());
    }

    let pairs: Vec<(&str, &str, &RawColumn)> = raw
        .columns
        .iter()
        .filter_map(|c| match &c.key {
            ColumnKey::Pair(a, b) => Some((a.as_str(), b.as_str(), c)),
            ColumnKey::Field(_) => None,
        })
        .collect();

    let swap = fields_first(&pairs, query);
    if swap {
        debug!("paired columns are field-first, swapping levels");
    }

    let mut unexpected: HashSet<&str> = HashSet::new();
    for (a, b, column) in pairs {
        let (symbol_label, field_label) = if swap { (b, a) } else { (a, b) };
        let symbol = match Symbol::new(symbol_label) {
            Ok(s) if query.contains(&s) => s,
            _ => {
                if unexpected.insert(symbol_label) {
                    warn!(symbol = symbol_label, "dropping unrequested symbol from response");
                    diagnostics.push(Diagnostic::UnexpectedSymbol {
                        symbol: symbol_label.to_string(),
                    });
                }
                continue;
            }
        };
        let entry = grouped.entry(symbol).or_default();
        if let Some(field) = field_alias(field_label) {
            entry.assign(field, column);
        }
    }

    Ok(grouped)
}

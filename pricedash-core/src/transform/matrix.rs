//! Long records → wide date × symbol matrix.

use crate::domain::{CanonicalPriceRecord, Cell, PriceField, PriceMatrix, Symbol};
use crate::error::UnknownFieldError;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

/// Build a matrix of `field` from canonical records.
///
/// Rows are the union of record dates ascending; columns the union of symbols in
/// lexicographic order. A (date, symbol) with no record, or whose record lacks
/// the field, is `None`.
pub fn build(records: &[CanonicalPriceRecord], field: PriceField) -> PriceMatrix {
    let dates: Vec<NaiveDate> = records
        .iter()
        .map(|r| r.date)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let symbols: Vec<Symbol> = records
        .iter()
        .map(|r| r.symbol.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let row_of: HashMap<NaiveDate, usize> = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let col_of: HashMap<&Symbol, usize> = symbols.iter().enumerate().map(|(i, s)| (s, i)).collect();

    let mut values: Vec<Vec<Cell>> = vec![vec![None; symbols.len()]; dates.len()];
    for record in records {
        let (Some(&row), Some(&col)) = (row_of.get(&record.date), col_of.get(&record.symbol)) else {
            continue;
        };
        values[row][col] = record.value(field);
    }

    PriceMatrix::from_parts(field, dates, symbols, values).unwrap_or_else(|| PriceMatrix::empty(field))
}

/// Build a matrix from a field name such as `"close"` or `"adjusted_close"`.
pub fn to_matrix(records: &[CanonicalPriceRecord], field: &str) -> Result<PriceMatrix, UnknownFieldError> {
    let field: PriceField = field.parse()?;
    Ok(build(records, field))
}

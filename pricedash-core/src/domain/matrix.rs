//! PriceMatrix: date × symbol table of a single price field.
//!
//! Absent observations are `None`. Nothing in this module fills, drops or
//! zero-substitutes gaps; `forward_filled` exists for callers that opt in.

use super::record::{CanonicalPriceRecord, PriceField};
use super::symbol::Symbol;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A cell: `Some(value)` or explicit absence.
pub type Cell = Option<f64>;

/// Wide matrix: rows are dates (ascending), columns are symbols (sorted).
///
/// `values[row][col]` holds the cell for `dates[row]` and `symbols[col]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MatrixParts")]
pub struct PriceMatrix {
    field: PriceField,
    dates: Vec<NaiveDate>,
    symbols: Vec<Symbol>,
    values: Vec<Vec<Cell>>,
}

/// Unchecked wire form; deserialization goes through `from_parts`.
#[derive(Deserialize)]
struct MatrixParts {
    field: PriceField,
    dates: Vec<NaiveDate>,
    symbols: Vec<Symbol>,
    values: Vec<Vec<Cell>>,
}

impl TryFrom<MatrixParts> for PriceMatrix {
    type Error = String;

    fn try_from(parts: MatrixParts) -> Result<Self, Self::Error> {
        let (rows, cols) = (parts.dates.len(), parts.symbols.len());
        Self::from_parts(parts.field, parts.dates, parts.symbols, parts.values)
            .ok_or_else(|| format!("matrix values do not match {rows} dates x {cols} symbols"))
    }
}

impl PriceMatrix {
    /// Assemble a matrix from parts, checking that every row has one cell per symbol.
    ///
    /// Returns `None` if the dimensions disagree.
    pub fn from_parts(
        field: PriceField,
        dates: Vec<NaiveDate>,
        symbols: Vec<Symbol>,
        values: Vec<Vec<Cell>>,
    ) -> Option<Self> {
        if values.len() != dates.len() || values.iter().any(|row| row.len() != symbols.len()) {
            return None;
        }
        Some(Self {
            field,
            dates,
            symbols,
            values,
        })
    }

    pub fn empty(field: PriceField) -> Self {
        Self {
            field,
            dates: Vec::new(),
            symbols: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn field(&self) -> PriceField {
        self.field
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.symbols.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Cell {
        self.values.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn column_index(&self, symbol: &Symbol) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    /// One symbol's column, top to bottom.
    pub fn column(&self, symbol: &Symbol) -> Option<Vec<Cell>> {
        let col = self.column_index(symbol)?;
        Some(self.values.iter().map(|row| row[col]).collect())
    }

    /// New matrix of the same shape with each column replaced by `f(column)`.
    ///
    /// `f` must return a column of the same length.
    pub(crate) fn map_columns<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&[Cell]) -> Vec<Cell>,
    {
        let mut values = vec![vec![None; self.n_cols()]; self.n_rows()];
        for col in 0..self.n_cols() {
            let column: Vec<Cell> = self.values.iter().map(|row| row[col]).collect();
            let mapped = f(&column);
            debug_assert_eq!(mapped.len(), column.len());
            for (row, cell) in mapped.into_iter().enumerate() {
                values[row][col] = cell;
            }
        }
        Self {
            field: self.field,
            dates: self.dates.clone(),
            symbols: self.symbols.clone(),
            values,
        }
    }

    /// Flatten back to long form, dropping absent cells.
    ///
    /// Output is ordered by date, then symbol.
    pub fn to_long(&self) -> Vec<(NaiveDate, Symbol, f64)> {
        let mut out = Vec::new();
        for (row, date) in self.dates.iter().enumerate() {
            for (col, symbol) in self.symbols.iter().enumerate() {
                if let Some(v) = self.values[row][col] {
                    out.push((*date, symbol.clone(), v));
                }
            }
        }
        out
    }

    /// Copy with each gap replaced by the last present value above it.
    ///
    /// Leading gaps (before a symbol's first observation) stay absent.
    pub fn forward_filled(&self) -> Self {
        self.map_columns(|column| {
            let mut last: Cell = None;
            column
                .iter()
                .map(|cell| {
                    if cell.is_some() {
                        last = *cell;
                    }
                    last
                })
                .collect()
        })
    }

    /// Number of absent cells, per symbol.
    pub fn gap_counts(&self) -> Vec<(Symbol, usize)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(col, symbol)| {
                let gaps = self.values.iter().filter(|row| row[col].is_none()).count();
                (symbol.clone(), gaps)
            })
            .collect()
    }

    /// Build from canonical records. See `transform::to_matrix`.
    pub fn from_records(records: &[CanonicalPriceRecord], field: PriceField) -> Self {
        crate::transform::matrix::build(records, field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s).unwrap()
    }

    fn sample() -> PriceMatrix {
        PriceMatrix::from_parts(
            PriceField::Close,
            vec![d(2), d(3), d(4)],
            vec![sym("AAPL"), sym("MSFT")],
            vec![
                vec![None, Some(10.0)],
                vec![Some(1.0), None],
                vec![Some(2.0), Some(12.0)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn deserialization_checks_shape() {
        let json = serde_json::to_value(sample()).unwrap();
        let back: PriceMatrix = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, sample());

        let mut ragged = json;
        ragged["values"][1] = serde_json::json!([1.0]);
        let err = serde_json::from_value::<PriceMatrix>(ragged).unwrap_err();
        assert!(err.to_string().contains("3 dates x 2 symbols"));
    }

    #[test]
    fn from_parts_rejects_ragged_rows() {
        let m = PriceMatrix::from_parts(
            PriceField::Close,
            vec![d(2)],
            vec![sym("AAPL"), sym("MSFT")],
            vec![vec![Some(1.0)]],
        );
        assert!(m.is_none());
    }

    #[test]
    fn column_lookup() {
        let m = sample();
        assert_eq!(m.column(&sym("MSFT")).unwrap(), vec![Some(10.0), None, Some(12.0)]);
        assert!(m.column(&sym("SPY")).is_none());
        assert_eq!(m.get(1, 0), Some(1.0));
        assert_eq!(m.get(0, 0), None);
        assert_eq!(m.get(9, 9), None);
    }

    #[test]
    fn to_long_skips_gaps() {
        let long = sample().to_long();
        assert_eq!(long.len(), 4);
        assert_eq!(long[0], (d(2), sym("MSFT"), 10.0));
        assert_eq!(long[1], (d(3), sym("AAPL"), 1.0));
    }

    #[test]
    fn forward_fill_keeps_leading_gaps() {
        let filled = sample().forward_filled();
        assert_eq!(filled.column(&sym("AAPL")).unwrap(), vec![None, Some(1.0), Some(2.0)]);
        assert_eq!(
            filled.column(&sym("MSFT")).unwrap(),
            vec![Some(10.0), Some(10.0), Some(12.0)]
        );
        // Input untouched
        assert_eq!(sample().get(1, 1), None);
    }

    #[test]
    fn gap_counts_per_symbol() {
        let counts = sample().gap_counts();
        assert_eq!(counts, vec![(sym("AAPL"), 1), (sym("MSFT"), 1)]);
    }
}

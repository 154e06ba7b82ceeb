//! Provider-native tabular output, before normalization.
//!
//! A `RawFrame` is a date-labelled table whose columns are keyed either by a bare
//! field name (a flat, single-symbol table) or by a two-level pair such as
//! `("AAPL", "Close")`. The pair's level order is not guaranteed; the normalizer
//! detects which level carries field names.

use std::fmt;

/// One raw cell exactly as the provider handed it over.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Number(f64),
    Text(String),
    Missing,
}

impl From<f64> for RawCell {
    fn from(v: f64) -> Self {
        RawCell::Number(v)
    }
}

impl From<Option<f64>> for RawCell {
    fn from(v: Option<f64>) -> Self {
        v.map_or(RawCell::Missing, RawCell::Number)
    }
}

impl From<u64> for RawCell {
    fn from(v: u64) -> Self {
        RawCell::Number(v as f64)
    }
}

impl From<Option<u64>> for RawCell {
    fn from(v: Option<u64>) -> Self {
        v.map_or(RawCell::Missing, |v| RawCell::Number(v as f64))
    }
}

impl From<&str> for RawCell {
    fn from(v: &str) -> Self {
        RawCell::Text(v.to_string())
    }
}

/// Column header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    /// Bare field name, e.g. `Close`.
    Field(String),
    /// Two-level key, e.g. `("AAPL", "Close")` or `("Close", "AAPL")`.
    Pair(String, String),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Field(name) => write!(f, "{name}"),
            ColumnKey::Pair(a, b) => write!(f, "({a}, {b})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub key: ColumnKey,
    pub cells: Vec<RawCell>,
}

/// Raw provider table: row labels plus keyed columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawFrame {
    /// Row labels, expected to be dates (`YYYY-MM-DD`, optionally with a time part).
    pub index: Vec<String>,
    pub columns: Vec<RawColumn>,
}

impl RawFrame {
    pub fn new(index: Vec<String>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    /// A successful response with no rows at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Append a flat column.
    pub fn with_field<C: Into<RawCell>>(mut self, name: &str, cells: Vec<C>) -> Self {
        self.columns.push(RawColumn {
            key: ColumnKey::Field(name.to_string()),
            cells: cells.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Append a two-level column.
    pub fn with_pair<C: Into<RawCell>>(mut self, outer: &str, inner: &str, cells: Vec<C>) -> Self {
        self.columns.push(RawColumn {
            key: ColumnKey::Pair(outer.to_string(), inner.to_string()),
            cells: cells.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True when the frame carries no rows and no cells.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty() && self.columns.iter().all(|c| c.cells.is_empty())
    }

    /// Short description of the frame's layout, used in error messages.
    pub fn shape(&self) -> String {
        let flat = self
            .columns
            .iter()
            .filter(|c| matches!(c.key, ColumnKey::Field(_)))
            .count();
        let layout = match (flat, self.columns.len() - flat) {
            (0, 0) => "no columns",
            (_, 0) => "flat",
            (0, _) => "paired",
            _ => "mixed",
        };
        let mut headers: Vec<String> = self.columns.iter().take(4).map(|c| c.key.to_string()).collect();
        if self.columns.len() > 4 {
            headers.push("...".to_string());
        }
        format!(
            "{layout}: {} rows x {} columns [{}]",
            self.n_rows(),
            self.n_cols(),
            headers.join(", ")
        )
    }
}

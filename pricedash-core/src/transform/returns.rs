//! Returns and rebasing over a `PriceMatrix`.
//!
//! All functions are pure: they return a new matrix of the same shape and never
//! fill gaps. A gap at `t` or `t-1` makes the return at `t` absent.

use crate::domain::{Cell, PriceMatrix};

/// Simple returns of one column: `v[t] / v[t-1] - 1`.
///
/// The first cell is always absent, as is any cell whose previous value is zero.
pub fn column_daily_returns(column: &[Cell]) -> Vec<Cell> {
    let mut out = Vec::with_capacity(column.len());
    for (t, cell) in column.iter().enumerate() {
        let prev = if t == 0 { None } else { column[t - 1] };
        out.push(match (prev, cell) {
            (Some(p), Some(v)) if p != 0.0 => Some(v / p - 1.0),
            _ => None,
        });
    }
    out
}

/// Divide by the first present value and scale to 100.
///
/// An all-absent column stays all-absent. A zero base cannot be rebased and
/// yields an all-absent column.
pub fn column_rebased(column: &[Cell]) -> Vec<Cell> {
    match column.iter().flatten().next() {
        Some(&base) if base != 0.0 => column.iter().map(|c| c.map(|v| v / base * 100.0)).collect(),
        _ => vec![None; column.len()],
    }
}

/// Running product of `(1 + r)` minus one, compounding only present returns.
pub fn column_cumulative_returns(column: &[Cell]) -> Vec<Cell> {
    let mut growth = 1.0;
    column_daily_returns(column)
        .into_iter()
        .map(|r| {
            r.map(|r| {
                growth *= 1.0 + r;
                growth - 1.0
            })
        })
        .collect()
}

pub fn daily_returns(matrix: &PriceMatrix) -> PriceMatrix {
    matrix.map_columns(column_daily_returns)
}

pub fn rebase_to_100(matrix: &PriceMatrix) -> PriceMatrix {
    matrix.map_columns(column_rebased)
}

pub fn cumulative_returns(matrix: &PriceMatrix) -> PriceMatrix {
    matrix.map_columns(column_cumulative_returns)
}

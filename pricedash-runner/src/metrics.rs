//! Descriptive metrics: pure functions over an observed price series.
//!
//! Inputs are the present values of one symbol in date order; gaps have already
//! been removed by the caller. Undefined results are `None`, never a sentinel.

/// Trading days per year, used to annualize daily volatility.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Total return as a fraction: last / first - 1.
///
/// `None` with fewer than two observations or a zero first value.
pub fn total_return(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let first = values[0];
    let last = values[values.len() - 1];
    if first == 0.0 {
        return None;
    }
    Some(last / first - 1.0)
}

/// Simple returns between consecutive observations.
///
/// A step whose previous value is zero has no defined return and is skipped.
pub fn step_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1). `None` with fewer than two values.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Scale a daily standard deviation to annual.
pub fn annualize(daily_vol: f64) -> f64 {
    daily_vol * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Maximum drawdown as a non-positive fraction (e.g., -0.15 = 15% drawdown).
///
/// Returns 0.0 if the series is constant or non-decreasing.
pub fn max_drawdown(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mut peak = values[0];
    let mut max_dd = 0.0_f64;

    for &v in values {
        if v > peak {
            peak = v;
        }
        if peak > 0.0 {
            let dd = (v - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

//! Derived price columns and summary statistics.
//!
//! Rolling windows count rows, not calendar days, and yield null until the window is full
//! or while any value inside it is null. Standard deviations are sample deviations.

use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DataError, Result},
    frame::column_values,
};

/// Trading sessions per year, used for the 52-week window and annualization.
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// Name of the moving-average column for `window`.
#[must_use]
pub fn moving_average_column(window: usize) -> String {
    format!("ma{window}")
}

fn full_window(values: &[Option<f64>], end: usize, window: usize) -> Option<Vec<f64>> {
    if window == 0 || end + 1 < window {
        return None;
    }
    values[end + 1 - window..=end].iter().copied().collect()
}

/// Trailing arithmetic mean over `window` rows, inclusive of the current row.
#[must_use]
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| full_window(values, i, window).map(|w| w.iter().sum::<f64>() / window as f64))
        .collect()
}

/// Trailing sample standard deviation over `window` rows.
#[must_use]
pub fn rolling_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| full_window(values, i, window).and_then(|w| sample_std(&w)))
        .collect()
}

fn rolling_extreme(values: &[Option<f64>], window: usize, pick: fn(f64, f64) -> f64) -> Option<f64> {
    let last = values.len().checked_sub(1)?;
    full_window(values, last, window).and_then(|w| w.into_iter().reduce(pick))
}

fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

fn pct_change(values: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| match (i.checked_sub(1).and_then(|p| values[p]), values[i]) {
            (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
            _ => None,
        })
        .collect()
}

fn diff(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| match (i.checked_sub(lag).and_then(|p| values[p]), values[i]) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        })
        .collect()
}

fn add_column(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Column::new(name.into(), values))
        .map_err(|e| DataError::Other(e.to_string()))?;
    Ok(())
}

/// Adds one `ma{N}` column per window, computed over `close`.
pub fn with_moving_averages(df: &DataFrame, windows: &[usize]) -> Result<DataFrame> {
    let closes = column_values(df, "close")?;
    let mut out = df.clone();
    for &window in windows {
        add_column(&mut out, &moving_average_column(window), rolling_mean(&closes, window))?;
    }
    Ok(out)
}

/// Adds `daily_return`, `volatility_20d`, `sma_20`, `upper_band`, `lower_band` and
/// `momentum_10d`.
pub fn with_additional_indicators(df: &DataFrame) -> Result<DataFrame> {
    let closes = column_values(df, "close")?;
    let returns = pct_change(&closes);
    let sma = rolling_mean(&closes, 20);
    let std = rolling_std(&closes, 20);
    let band = |sign: f64| -> Vec<Option<f64>> {
        sma.iter()
            .zip(&std)
            .map(|(m, s)| Some(m.as_ref()? + sign * 2.0 * s.as_ref()?))
            .collect()
    };
    let upper = band(1.0);
    let lower = band(-1.0);

    let mut out = df.clone();
    add_column(&mut out, "volatility_20d", rolling_std(&returns, 20))?;
    add_column(&mut out, "daily_return", returns)?;
    add_column(&mut out, "sma_20", sma)?;
    add_column(&mut out, "upper_band", upper)?;
    add_column(&mut out, "lower_band", lower)?;
    add_column(&mut out, "momentum_10d", diff(&closes, 10))?;
    Ok(out)
}

/// Headline statistics of a price table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSummary {
    /// Last close.
    pub current_price: Option<f64>,
    /// Highest high of the last 252 rows; `None` with fewer rows.
    pub price_52w_high: Option<f64>,
    /// Lowest low of the last 252 rows; `None` with fewer rows.
    pub price_52w_low: Option<f64>,
    /// Change from the first to the last close, in percent.
    pub total_return_pct: Option<f64>,
    /// Sample standard deviation of daily returns, annualized, in percent.
    pub annualized_volatility_pct: Option<f64>,
    /// Mean volume over all rows.
    pub avg_daily_volume: Option<f64>,
}

/// Summarizes a price table. Returns `Ok(None)` for an empty table.
pub fn price_summary(df: &DataFrame) -> Result<Option<PriceSummary>> {
    if df.height() == 0 {
        return Ok(None);
    }
    let closes = column_values(df, "close")?;
    let highs = column_values(df, "high")?;
    let lows = column_values(df, "low")?;
    let volumes = column_values(df, "volume")?;

    let first = closes.first().copied().flatten();
    let last = closes.last().copied().flatten();
    let returns: Vec<f64> = pct_change(&closes).into_iter().flatten().collect();
    let observed: Vec<f64> = volumes.into_iter().flatten().collect();

    Ok(Some(PriceSummary {
        current_price: last,
        price_52w_high: rolling_extreme(&highs, TRADING_DAYS_PER_YEAR, f64::max),
        price_52w_low: rolling_extreme(&lows, TRADING_DAYS_PER_YEAR, f64::min),
        total_return_pct: match (first, last) {
            (Some(f), Some(l)) if f != 0.0 => Some((l / f - 1.0) * 100.0),
            _ => None,
        },
        annualized_volatility_pct: sample_std(&returns)
            .map(|s| s * (TRADING_DAYS_PER_YEAR as f64).sqrt() * 100.0),
        avg_daily_volume: (!observed.is_empty())
            .then(|| observed.iter().sum::<f64>() / observed.len() as f64),
    }))
}

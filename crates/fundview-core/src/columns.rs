//! Column lookup for consumers that chart statement tables.
//!
//! Providers disagree on metric names, so a consumer asks for the first of several
//! candidate names that a table actually has.

use chrono::NaiveDate;
use polars::prelude::DataFrame;

use crate::{
    error::Result,
    frame::{column_values, table_dates},
};

/// Candidate names of the revenue line, most preferred first.
pub const REVENUE: &[&str] = &["Revenue", "Total Revenue", "Sales"];

/// Candidate names of the net income line, most preferred first.
pub const NET_INCOME: &[&str] = &[
    "Net Income (Common)",
    "Net Income",
    "Net Income Available to Common Shareholders",
];

/// Returns the first candidate present in `df`.
#[must_use]
pub fn find_column<'a>(df: &DataFrame, candidates: &[&'a str]) -> Option<&'a str> {
    let names = df.get_column_names();
    candidates
        .iter()
        .copied()
        .find(|candidate| names.iter().any(|n| n.as_str() == *candidate))
}

/// `(date, value)` pairs of one column in ascending date order, skipping missing values.
pub fn time_series(df: &DataFrame, column: &str) -> Result<Vec<(NaiveDate, f64)>> {
    let dates = table_dates(df)?;
    let values = column_values(df, column)?;
    let mut points: Vec<(NaiveDate, f64)> = dates
        .into_iter()
        .zip(values)
        .filter_map(|(d, v)| Some((d?, v?)))
        .collect();
    points.sort_by_key(|&(d, _)| d);
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{Cell, RowOrder, build_table};

    fn table() -> DataFrame {
        build_table(
            vec![
                NaiveDate::from_ymd_opt(2023, 12, 31),
                NaiveDate::from_ymd_opt(2021, 12, 31),
                NaiveDate::from_ymd_opt(2022, 12, 31),
            ],
            vec![
                (
                    "Total Revenue".to_string(),
                    vec![Cell::Number(3.0), Cell::Number(1.0), Cell::Null],
                ),
                (
                    "Net Income".to_string(),
                    vec![Cell::Number(0.3), Cell::Number(0.1), Cell::Number(0.2)],
                ),
            ],
            RowOrder::Preserve,
        )
        .unwrap()
    }

    #[test]
    fn test_find_column_prefers_earlier_candidates() {
        let df = table();
        assert_eq!(find_column(&df, REVENUE), Some("Total Revenue"));
        assert_eq!(find_column(&df, NET_INCOME), Some("Net Income"));
        assert_eq!(find_column(&df, &["EBITDA"]), None);
    }

    #[test]
    fn test_time_series_sorts_and_skips_nulls() {
        let series = time_series(&table(), "Total Revenue").unwrap();
        assert_eq!(
            series,
            vec![
                (NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(), 1.0),
                (NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(), 3.0),
            ]
        );
        assert!(time_series(&table(), "EBITDA").is_err());
    }
}

//! Reduces a provider's multi-ticker dataset to one ticker's statement table.

use polars::prelude::*;
use tracing::debug;

use crate::{
    error::StatementError,
    frame::{self, RowOrder},
    provider::RawDataset,
    types::{PeriodVariant, StatementKind, Ticker},
};

/// Name of the ticker dimension in provider datasets.
pub const TICKER_FIELD: &str = "Ticker";

/// Column names accepted as the report date when the dataset has no compound identity.
pub const DATE_FIELDS: [&str; 3] = ["Report Date", "date", "Date"];

/// Selects one ticker's rows from a [`RawDataset`] and re-keys them by report date.
///
/// The ticker dimension is looked up in the row identity first and then among the ordinary
/// columns. Matching is case-insensitive. The output keeps the provider's row order.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatementNormalizer;

impl StatementNormalizer {
    /// Creates a normalizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts the rows of `ticker`.
    ///
    /// `kind` and `variant` only feed the error messages.
    pub fn normalize(
        &self,
        raw: &RawDataset,
        ticker: &Ticker,
        kind: StatementKind,
        variant: PeriodVariant,
    ) -> Result<DataFrame, StatementError> {
        let readable = kind.readable_name();
        let df = &raw.frame;

        let ticker_column = find_ticker_dimension(raw).ok_or_else(|| {
            StatementError::FilterFailed(format!(
                "Could not find '{TICKER_FIELD}' info in {readable} ({variant}) dataset."
            ))
        })?;

        let labels = ticker_labels(df.column(&ticker_column).map_err(processing)?)?;
        let mask: Vec<bool> = labels
            .iter()
            .map(|label| {
                label
                    .as_deref()
                    .is_some_and(|s| s.trim().to_uppercase() == ticker.as_str())
            })
            .collect();
        let selected = mask.iter().filter(|m| **m).count();
        debug!(
            ticker = %ticker,
            kind = %kind,
            variant = %variant,
            total = df.height(),
            selected,
            "Filtered provider dataset"
        );
        if selected == 0 {
            return Err(StatementError::NoDataFound(format!(
                "No {readable} ({variant}) data for {ticker} (DataFrame empty after filter)."
            )));
        }

        let filtered = df
            .filter(&BooleanChunked::from_slice("mask".into(), &mask))
            .and_then(|f| f.drop(&ticker_column))
            .map_err(processing)?;

        let date_column = find_date_dimension(raw, &filtered, &ticker_column).ok_or_else(|| {
            StatementError::ProcessingException(format!(
                "No report date found in {readable} ({variant}) dataset."
            ))
        })?;

        frame::with_date_index(&filtered, &date_column, RowOrder::Preserve).map_err(processing)
    }
}

fn processing(e: impl std::fmt::Display) -> StatementError {
    StatementError::ProcessingException(e.to_string())
}

/// Ticker symbols as written, so numeric-looking symbols like "1234" still compare as text.
fn ticker_labels(column: &Column) -> Result<Vec<Option<String>>, StatementError> {
    if let Ok(values) = column.str() {
        return Ok(values.into_iter().map(|v| v.map(str::to_string)).collect());
    }
    let cells = frame::column_cells(column).map_err(processing)?;
    Ok(cells
        .into_iter()
        .map(|cell| match cell {
            frame::Cell::Null => None,
            frame::Cell::Number(v) if v.fract() == 0.0 => Some(format!("{v:.0}")),
            frame::Cell::Number(v) => Some(v.to_string()),
            frame::Cell::Text(s) => Some(s),
        })
        .collect())
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().iter().any(|c| c.as_str() == name)
}

fn find_ticker_dimension(raw: &RawDataset) -> Option<String> {
    raw.index
        .iter()
        .find(|name| name.eq_ignore_ascii_case(TICKER_FIELD) && has_column(&raw.frame, name))
        .cloned()
        .or_else(|| {
            raw.frame
                .get_column_names()
                .iter()
                .find(|c| c.as_str().eq_ignore_ascii_case(TICKER_FIELD))
                .map(|c| c.to_string())
        })
}

fn find_date_dimension(raw: &RawDataset, filtered: &DataFrame, ticker_column: &str) -> Option<String> {
    raw.index
        .iter()
        .find(|name| name.as_str() != ticker_column && has_column(filtered, name))
        .cloned()
        .or_else(|| {
            DATE_FIELDS
                .iter()
                .find(|name| has_column(filtered, name))
                .map(|name| (*name).to_string())
        })
}

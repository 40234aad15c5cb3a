//! Provider traits for fetching remote data.
//!
//! - [`DataProvider`] - Base trait for all data providers
//! - [`FundamentalsProvider`] - Bulk financial statements
//! - [`PriceHistoryProvider`] - Historical price bars

use async_trait::async_trait;
use polars::prelude::DataFrame;
use std::fmt::Debug;

use crate::{
    error::Result,
    interval::{HistoryRange, PriceInterval},
    types::{PeriodVariant, StatementKind, Ticker},
};

/// Base trait for all data providers.
pub trait DataProvider: Send + Sync + Debug {
    /// Returns the name of this provider (e.g., "SimFin").
    fn name(&self) -> &str;

    /// Returns a description of this provider.
    fn description(&self) -> &str;
}

/// A provider's answer to a statement request, before normalization.
///
/// `index` names the columns that together identify a row (e.g. `["Ticker", "Report Date"]`).
/// Providers that have no compound identity leave it empty and carry `Ticker` as an ordinary
/// column instead.
#[derive(Clone, Debug)]
pub struct RawDataset {
    /// The provider's table, all tickers included.
    pub frame: DataFrame,
    /// Names of the row identity columns, outermost first.
    pub index: Vec<String>,
}

impl RawDataset {
    /// Creates a dataset with a compound row identity.
    #[must_use]
    pub fn new(frame: DataFrame, index: Vec<String>) -> Self {
        Self { frame, index }
    }

    /// Creates a dataset with no row identity.
    #[must_use]
    pub fn flat(frame: DataFrame) -> Self {
        Self {
            frame,
            index: Vec::new(),
        }
    }
}

/// Provider for fundamental statements.
///
/// Fundamentals are served as bulk datasets covering every ticker of a market, so the
/// request carries no ticker. Selecting the ticker's rows is left to the normalizer.
#[async_trait]
pub trait FundamentalsProvider: DataProvider {
    /// Loads the dataset for one statement kind and period variant.
    ///
    /// Returns `Ok(None)` when the provider has nothing for the request.
    async fn load_statements(
        &self,
        kind: StatementKind,
        variant: PeriodVariant,
        market: &str,
    ) -> Result<Option<RawDataset>>;
}

/// Provider for historical price bars.
#[async_trait]
pub trait PriceHistoryProvider: DataProvider {
    /// Fetches price history for a ticker.
    ///
    /// Returns a DataFrame with columns: date, open, high, low, close, volume, adjusted_close.
    async fn fetch_history(
        &self,
        ticker: &Ticker,
        range: HistoryRange,
        interval: PriceInterval,
    ) -> Result<DataFrame>;
}

//! Remote fetching of statements and prices.

use std::sync::Arc;
use std::time::Duration;

use fundview_core::{
    FundamentalsProvider, HistoryRange, PeriodVariant, PriceHistoryProvider, PriceInterval,
    RawDataset, StatementError, StatementKind, StatementNormalizer, Ticker, indicators,
    statement_pairs,
};
use polars::prelude::DataFrame;
use tracing::{debug, info, instrument, warn};

use crate::config::{DEFAULT_MARKET, DEFAULT_MOVING_AVERAGES, DEFAULT_REQUEST_DELAY_MS};

/// Outcome of fetching and normalizing one statement pair.
#[derive(Debug)]
pub struct StatementFetch {
    /// Statement kind.
    pub kind: StatementKind,
    /// Period variant.
    pub variant: PeriodVariant,
    /// Normalized table or the reason there is none.
    pub outcome: Result<DataFrame, StatementError>,
}

/// Talks to the fundamentals and price providers.
///
/// Every statement request is preceded by a fixed delay. Nothing is retried.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    fundamentals: Arc<dyn FundamentalsProvider>,
    prices: Arc<dyn PriceHistoryProvider>,
    normalizer: StatementNormalizer,
    market: String,
    request_delay: Duration,
    moving_averages: Vec<usize>,
}

impl RemoteFetcher {
    /// Creates a fetcher with the default market, delay and moving averages.
    pub fn new(
        fundamentals: Arc<dyn FundamentalsProvider>,
        prices: Arc<dyn PriceHistoryProvider>,
    ) -> Self {
        Self {
            fundamentals,
            prices,
            normalizer: StatementNormalizer::new(),
            market: DEFAULT_MARKET.to_string(),
            request_delay: Duration::from_millis(DEFAULT_REQUEST_DELAY_MS),
            moving_averages: DEFAULT_MOVING_AVERAGES.to_vec(),
        }
    }

    /// Sets the market of the statement datasets.
    #[must_use]
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    /// Sets the pause before each statement request.
    #[must_use]
    pub const fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Sets the moving-average windows added to price tables.
    #[must_use]
    pub fn with_moving_averages(mut self, windows: Vec<usize>) -> Self {
        self.moving_averages = windows;
        self
    }

    /// The market of the statement datasets.
    #[must_use]
    pub fn market(&self) -> &str {
        &self.market
    }

    /// Fetches the raw dataset of one statement pair.
    #[instrument(skip(self), fields(provider = self.fundamentals.name(), ticker = %ticker, kind = %kind, variant = %variant))]
    pub async fn fetch_statement(
        &self,
        ticker: &Ticker,
        kind: StatementKind,
        variant: PeriodVariant,
    ) -> Result<RawDataset, StatementError> {
        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        let readable = kind.readable_name();
        match self
            .fundamentals
            .load_statements(kind, variant, &self.market)
            .await
        {
            Ok(Some(raw)) => {
                debug!(rows = raw.frame.height(), "Fetched statement dataset");
                Ok(raw)
            }
            Ok(None) => Err(StatementError::LoadFailed(format!(
                "Failed to load ALL {readable} ({variant}) ({} returned None).",
                self.fundamentals.name()
            ))),
            Err(e) if e.is_unreachable() => Err(StatementError::LoadFailed(format!(
                "Failed to load ALL {readable} ({variant}): {e}"
            ))),
            Err(e) => Err(StatementError::ProcessingException(format!(
                "Error processing {readable} ({variant}) for {ticker}: {e}"
            ))),
        }
    }

    /// Fetches one statement pair and narrows it to `ticker`.
    pub async fn fetch_normalized(
        &self,
        ticker: &Ticker,
        kind: StatementKind,
        variant: PeriodVariant,
    ) -> Result<DataFrame, StatementError> {
        let raw = self.fetch_statement(ticker, kind, variant).await?;
        self.normalizer.normalize(&raw, ticker, kind, variant)
    }

    /// Fetches all six statement pairs, annual first.
    ///
    /// A failed pair is recorded in its [`StatementFetch`] and the next pair is still fetched.
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn fetch_all_statements(&self, ticker: &Ticker) -> Vec<StatementFetch> {
        let mut fetches = Vec::with_capacity(6);
        for (kind, variant) in statement_pairs() {
            let outcome = self.fetch_normalized(ticker, kind, variant).await;
            match &outcome {
                Ok(table) => info!(%kind, %variant, rows = table.height(), "Statement fetched"),
                Err(e) => warn!(%kind, %variant, error = %e, "Statement fetch failed"),
            }
            fetches.push(StatementFetch {
                kind,
                variant,
                outcome,
            });
        }
        fetches
    }

    /// Fetches price history and adds the moving-average columns.
    ///
    /// Any provider error or an empty history yields `None`.
    #[instrument(skip(self), fields(provider = self.prices.name(), ticker = %ticker, range = %range, interval = %interval))]
    pub async fn fetch_prices(
        &self,
        ticker: &Ticker,
        range: HistoryRange,
        interval: PriceInterval,
    ) -> Option<DataFrame> {
        let history = match self.prices.fetch_history(ticker, range, interval).await {
            Ok(history) if history.height() > 0 => history,
            Ok(_) => {
                warn!("Price provider returned no rows");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Price fetch failed");
                return None;
            }
        };

        match indicators::with_moving_averages(&history, &self.moving_averages) {
            Ok(table) => {
                debug!(rows = table.height(), "Fetched price history");
                Some(table)
            }
            Err(e) => {
                warn!(error = %e, "Could not add moving averages");
                None
            }
        }
    }
}

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/fundview/fundview/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Yahoo Finance price history provider.
//!
//! This crate provides a Yahoo Finance provider that implements the [`DataProvider`] and
//! [`PriceHistoryProvider`] traits from `fundview-core`.
//!
//! # Features
//!
//! - Fetch price bars using Yahoo Finance's chart API, by period and interval
//! - Built-in rate limiting (1 request per second by default)
//! - Adjusted close alongside the raw close
//!
//! # Example
//!
//! ```no_run
//! use fundview_yahoo::YahooProvider;
//! use fundview_core::{HistoryRange, PriceHistoryProvider, PriceInterval, Ticker};
//!
//! # async fn example() -> fundview_core::Result<()> {
//! let provider = YahooProvider::new();
//! let ticker = Ticker::new("AAPL");
//!
//! let df = provider
//!     .fetch_history(&ticker, HistoryRange::FiveYears, PriceInterval::Weekly)
//!     .await?;
//! println!("Fetched {} rows", df.height());
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use fundview_core::{
    DataError, DataProvider, HistoryRange, PriceHistoryProvider, PriceInterval, Result, Ticker,
    frame::{Cell, RowOrder, build_table},
};
use polars::prelude::DataFrame;
use serde::Deserialize;
use tokio::time::sleep;
use tracing::debug;

/// Yahoo Finance API base URL.
const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// Default rate limit delay in milliseconds.
const DEFAULT_RATE_LIMIT_MS: u64 = 1000;

/// User agent for HTTP requests.
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// Yahoo Finance price history provider.
#[derive(Debug)]
pub struct YahooProvider {
    client: reqwest::Client,
    base_url: String,
    rate_limit_ms: u64,
    last_request_time: AtomicU64,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider with default settings.
    ///
    /// Uses built-in rate limiting of 1 request per second.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rate_limit(Duration::from_millis(DEFAULT_RATE_LIMIT_MS))
    }

    /// Create a new Yahoo Finance provider with a custom HTTP client.
    ///
    /// Uses the provided client for all HTTP requests. Rate limiting
    /// is still applied.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_ms: DEFAULT_RATE_LIMIT_MS,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Create a new Yahoo Finance provider with custom rate limiting.
    #[must_use]
    pub fn with_rate_limit(rate_limit: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            rate_limit_ms: rate_limit.as_millis() as u64,
            last_request_time: AtomicU64::new(0),
        }
    }

    /// Point the provider at another server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Apply rate limiting before making a request.
    async fn apply_rate_limit(&self) {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        let last = self.last_request_time.load(Ordering::Relaxed);
        let elapsed = now.saturating_sub(last);

        if elapsed < self.rate_limit_ms {
            let wait_time = self.rate_limit_ms - elapsed;
            debug!("Rate limiting: waiting {}ms", wait_time);
            sleep(Duration::from_millis(wait_time)).await;
        }

        self.last_request_time.store(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
            Ordering::Relaxed,
        );
    }

    /// Build the chart API URL for a ticker, period and interval.
    fn build_chart_url(&self, ticker: &Ticker, range: HistoryRange, interval: PriceInterval) -> String {
        format!(
            "{}/v8/finance/chart/{}?range={}&interval={}&includeAdjustedClose=true",
            self.base_url,
            ticker.as_str(),
            range,
            interval
        )
    }

    /// Parse Yahoo Finance chart response into a DataFrame.
    fn parse_chart_response(
        &self,
        ticker: &Ticker,
        range: HistoryRange,
        interval: PriceInterval,
        response: ChartResponse,
    ) -> Result<DataFrame> {
        let result = response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| DataError::SymbolNotFound(ticker.to_string()))?;

        let timestamps = result.timestamp.unwrap_or_default();

        if timestamps.is_empty() {
            return Err(DataError::DataNotAvailable {
                ticker: ticker.to_string(),
                range: range.to_string(),
                interval: interval.to_string(),
            });
        }

        let quote = result
            .indicators
            .quote
            .into_iter()
            .next()
            .unwrap_or_default();
        let adj_close = result
            .indicators
            .adjclose
            .and_then(|a| a.into_iter().next())
            .map(|a| a.adjclose)
            .unwrap_or_default();

        let dates = timestamps
            .iter()
            .map(|&ts| DateTime::from_timestamp(ts, 0).map(|dt| dt.date_naive()))
            .collect();

        let n = timestamps.len();
        let cells = |values: &[Option<f64>]| -> Vec<Cell> {
            (0..n)
                .map(|i| values.get(i).copied().flatten().map_or(Cell::Null, Cell::Number))
                .collect()
        };
        let volumes: Vec<Option<f64>> = quote.volume.iter().map(|v| v.map(|v| v as f64)).collect();

        // Pad adjusted close if needed
        let adj_close = if adj_close.len() == n {
            adj_close
        } else {
            quote.close.clone()
        };

        build_table(
            dates,
            vec![
                ("open".to_string(), cells(&quote.open)),
                ("high".to_string(), cells(&quote.high)),
                ("low".to_string(), cells(&quote.low)),
                ("close".to_string(), cells(&quote.close)),
                ("volume".to_string(), cells(&volumes)),
                ("adjusted_close".to_string(), cells(&adj_close)),
            ],
            RowOrder::Ascending,
        )
    }
}

impl Default for YahooProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn description(&self) -> &str {
        "Yahoo Finance price history by period and interval"
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooProvider {
    async fn fetch_history(
        &self,
        ticker: &Ticker,
        range: HistoryRange,
        interval: PriceInterval,
    ) -> Result<DataFrame> {
        // Apply rate limiting
        self.apply_rate_limit().await;

        let url = self.build_chart_url(ticker, range, interval);
        debug!("Fetching price history: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: "Yahoo Finance".to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::SymbolNotFound(ticker.to_string()));
        }

        if !response.status().is_success() {
            return Err(DataError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                ticker
            )));
        }

        let chart_response: ChartResponse = response
            .json()
            .await
            .map_err(|e| DataError::Parse(e.to_string()))?;

        // Check for API-level errors
        if let Some(error) = chart_response.chart.error {
            if error.code == "Not Found" {
                return Err(DataError::SymbolNotFound(ticker.to_string()));
            }
            return Err(DataError::Other(format!(
                "{}: {}",
                error.code, error.description
            )));
        }

        self.parse_chart_response(ticker, range, interval, chart_response)
    }
}

// ============================================================================
// Yahoo Finance API Response Types
// ============================================================================

/// Chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    adjclose: Vec<Option<f64>>,
}

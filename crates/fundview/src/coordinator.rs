//! Session, disk and remote lookup of statements and prices.

use std::sync::Arc;

use fundview_cache::{CsvStatementStore, StoredTable};
use fundview_core::frame::{RowOrder, decode_split, encode_split, with_date_index};
use fundview_core::{
    DATE_COLUMN, DataError, HistoryRange, PeriodVariant, PriceInterval, Result, RetrievalError,
    RetrievalKey, RetrievalResult, SessionStore, StatementError, StatementKind, TableSource,
    Ticker, statement_pairs,
};
use polars::prelude::DataFrame;
use tracing::{debug, info, instrument, warn};

use crate::fetcher::RemoteFetcher;
use crate::report::{PairStatus, RefreshReport};

/// Session key of the active ticker.
pub const CURRENT_TICKER_KEY: &str = "current_ticker";
/// Session key of the last [`RefreshReport`].
pub const REFRESH_REPORT_KEY: &str = "data_download_status";

/// Answers statement and price requests for one session.
///
/// Statements are looked up in the session, then in the per-ticker CSV files. They are only
/// fetched remotely by a full refresh ([`set_active_ticker`](Self::set_active_ticker)).
/// Prices go straight to the remote provider on a session miss.
///
/// Statement session entries belong to the active ticker. Requests for any other ticker skip
/// the session and read the files directly.
pub struct RetrievalCoordinator {
    session: Arc<dyn SessionStore>,
    store: CsvStatementStore,
    fetcher: RemoteFetcher,
    default_period: HistoryRange,
}

impl std::fmt::Debug for RetrievalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetrievalCoordinator")
            .field("session", &"configured")
            .field("store", &self.store)
            .field("fetcher", &self.fetcher)
            .field("default_period", &self.default_period)
            .finish()
    }
}

impl RetrievalCoordinator {
    /// Creates a coordinator over the given session, statement files and fetcher.
    #[must_use]
    pub fn new(
        session: Arc<dyn SessionStore>,
        store: CsvStatementStore,
        fetcher: RemoteFetcher,
    ) -> Self {
        Self {
            session,
            store,
            fetcher,
            default_period: HistoryRange::default(),
        }
    }

    /// Creates a coordinator backed by SimFin and Yahoo Finance as configured in `resolver`.
    #[cfg(all(feature = "simfin", feature = "yahoo"))]
    #[must_use]
    pub fn from_config(resolver: &crate::PathResolver, session: Arc<dyn SessionStore>) -> Self {
        let key = crate::api_key::load_api_key(&resolver.api_key_file(), &resolver.default_api_key());
        let fundamentals = fundview_simfin::SimFinProvider::new(key)
            .with_data_dir(resolver.simfin_directory(), resolver.refresh_days());
        let fetcher = RemoteFetcher::new(
            Arc::new(fundamentals),
            Arc::new(fundview_yahoo::YahooProvider::new()),
        )
        .with_market(resolver.market())
        .with_request_delay(resolver.request_delay())
        .with_moving_averages(resolver.moving_averages());

        Self::new(session, CsvStatementStore::new(resolver.data_directory()), fetcher)
            .with_default_period(resolver.default_period())
    }

    /// Sets the price period used when a request names none.
    #[must_use]
    pub const fn with_default_period(mut self, period: HistoryRange) -> Self {
        self.default_period = period;
        self
    }

    /// The statement file store.
    #[must_use]
    pub const fn store(&self) -> &CsvStatementStore {
        &self.store
    }

    /// The ticker of the last full refresh in this session.
    pub async fn active_ticker(&self) -> Option<Ticker> {
        match self.session.get(CURRENT_TICKER_KEY).await {
            Ok(value) => value
                .map(Ticker::new)
                .filter(|t| !t.as_str().is_empty()),
            Err(e) => {
                warn!(error = %e, "Could not read the active ticker");
                None
            }
        }
    }

    /// The report of the last full refresh in this session.
    pub async fn last_refresh(&self) -> Option<RefreshReport> {
        let payload = match self.session.get(REFRESH_REPORT_KEY).await {
            Ok(payload) => payload?,
            Err(e) => {
                warn!(error = %e, "Could not read the refresh report");
                return None;
            }
        };
        match serde_json::from_str(&payload) {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable refresh report");
                self.forget(REFRESH_REPORT_KEY).await;
                None
            }
        }
    }

    /// Returns one statement table from the session or the statement files.
    #[instrument(skip(self), fields(ticker = %ticker, kind = %kind, variant = %variant))]
    pub async fn get_statement(
        &self,
        ticker: &Ticker,
        kind: StatementKind,
        variant: PeriodVariant,
    ) -> RetrievalResult {
        let key = RetrievalKey::Statement { kind, variant }.cache_key();
        let is_active = self.active_ticker().await.as_ref() == Some(ticker);
        let mut notes = Vec::new();

        if is_active {
            match self.cached_table(&key).await {
                Some(table) if table.height() > 0 => {
                    return RetrievalResult::found(
                        table,
                        TableSource::Session,
                        format!("Data for {kind} ({variant}) loaded from session."),
                    );
                }
                Some(_) => notes.push(format!("Session data for {kind} ({variant}) is empty.")),
                None => {}
            }
        }

        let file = CsvStatementStore::file_name(ticker, kind, variant);
        match self.store.load(ticker, kind, variant) {
            Ok(StoredTable::Loaded(table)) => {
                if is_active && kind == StatementKind::Income {
                    self.cache_table(&key, &table).await;
                }
                return RetrievalResult::found(
                    table,
                    TableSource::Disk,
                    format!("Data for {kind} ({variant}) loaded from CSV: {file}"),
                );
            }
            Ok(StoredTable::Empty) => {
                notes.push(format!("CSV file {file} for {kind} ({variant}) is empty."));
            }
            Ok(StoredTable::Missing) => {}
            Err(e) => {
                warn!(error = %e, "Statement file unreadable");
                let reason = match e {
                    DataError::Io { reason, .. } => reason,
                    other => other.to_string(),
                };
                return RetrievalResult::failed(
                    RetrievalError::FileRead {
                        file,
                        kind,
                        variant,
                        reason,
                    },
                    join_notes(notes),
                );
            }
        }

        let recorded = self
            .last_refresh()
            .await
            .filter(|report| &report.ticker == ticker)
            .and_then(|report| report.error_for(kind, variant).cloned());
        let error = recorded.map_or_else(
            || RetrievalError::NotFound {
                kind,
                variant,
                ticker: ticker.clone(),
            },
            RetrievalError::Statement,
        );
        debug!(error = %error, "Statement not available");
        RetrievalResult::failed(error, join_notes(notes))
    }

    /// Returns price history from the session, or downloads and caches it.
    ///
    /// `range` defaults to the configured period.
    #[instrument(skip(self), fields(ticker = %ticker, interval = %interval))]
    pub async fn get_prices(
        &self,
        ticker: &Ticker,
        range: Option<HistoryRange>,
        interval: PriceInterval,
    ) -> RetrievalResult {
        let range = range.unwrap_or(self.default_period);
        let key = RetrievalKey::Price {
            ticker: ticker.clone(),
            range,
            interval,
        }
        .cache_key();

        if let Some(table) = self.cached_table(&key).await.filter(|t| t.height() > 0) {
            return RetrievalResult::found(
                table,
                TableSource::Session,
                format!("Price data for {ticker} ({range}, {interval}) loaded from session."),
            );
        }

        match self.fetcher.fetch_prices(ticker, range, interval).await {
            Some(table) => {
                self.cache_table(&key, &table).await;
                RetrievalResult::found(
                    table,
                    TableSource::Remote,
                    format!("Price data for {ticker} ({range}, {interval}) downloaded."),
                )
            }
            None => RetrievalResult::failed(
                RetrievalError::PricesUnavailable {
                    ticker: ticker.clone(),
                    range,
                    interval,
                },
                None,
            ),
        }
    }

    /// Makes `ticker` the active ticker and refreshes all of its statements.
    ///
    /// Session entries of the previous and the new ticker are dropped first. Each pair is
    /// fetched, normalized and saved on its own; failures end up in the returned report,
    /// which is also kept in the session.
    ///
    /// # Errors
    /// Returns an error only when the ticker directory cannot be created.
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub async fn set_active_ticker(&self, ticker: &Ticker) -> Result<RefreshReport> {
        info!("Starting full refresh");
        self.store.prepare(ticker)?;
        let previous = self.active_ticker().await;

        if let Err(e) = self
            .session
            .put(CURRENT_TICKER_KEY, ticker.to_string())
            .await
        {
            warn!(error = %e, "Could not record the active ticker");
        }
        self.invalidate(previous.as_ref(), ticker).await;

        let mut pairs = Vec::with_capacity(6);
        for fetch in self.fetcher.fetch_all_statements(ticker).await {
            // Sorted before saving so the session and file copies match.
            let outcome = fetch.outcome.and_then(|table| {
                with_date_index(&table, DATE_COLUMN, RowOrder::Ascending)
                    .map_err(|e| StatementError::ProcessingException(e.to_string()))
            });
            let save = self
                .store
                .save(ticker, fetch.kind, fetch.variant, &outcome);
            debug!(kind = %fetch.kind, variant = %fetch.variant, save = %save, "Saved statement");

            let (rows, error) = match outcome {
                Ok(table) => {
                    if fetch.kind == StatementKind::Income && table.height() > 0 {
                        let key = RetrievalKey::Statement {
                            kind: fetch.kind,
                            variant: fetch.variant,
                        }
                        .cache_key();
                        self.cache_table(&key, &table).await;
                    }
                    (table.height(), None)
                }
                Err(e) => (0, Some(e)),
            };
            pairs.push(PairStatus {
                kind: fetch.kind,
                variant: fetch.variant,
                rows,
                error,
                save,
            });
        }

        let report = RefreshReport::new(ticker.clone(), pairs);
        match serde_json::to_string(&report) {
            Ok(payload) => {
                if let Err(e) = self.session.put(REFRESH_REPORT_KEY, payload).await {
                    warn!(error = %e, "Could not store the refresh report");
                }
            }
            Err(e) => warn!(error = %e, "Could not encode the refresh report"),
        }

        if report.is_success() {
            info!("Full refresh finished");
        } else if let Some(error) = report.primary_error() {
            warn!(error = %error, "Full refresh fetched nothing");
        }
        Ok(report)
    }

    async fn invalidate(&self, previous: Option<&Ticker>, ticker: &Ticker) {
        let mut prefixes = vec![RetrievalKey::ticker_prefix(ticker)];
        if let Some(previous) = previous.filter(|p| *p != ticker) {
            prefixes.push(RetrievalKey::ticker_prefix(previous));
        }
        for prefix in prefixes {
            match self.session.invalidate_prefix(&prefix).await {
                Ok(n) => debug!(prefix = %prefix, removed = n, "Invalidated price entries"),
                Err(e) => warn!(prefix = %prefix, error = %e, "Could not invalidate price entries"),
            }
        }

        for (kind, variant) in statement_pairs() {
            self.forget(&RetrievalKey::Statement { kind, variant }.cache_key())
                .await;
        }
        self.forget(REFRESH_REPORT_KEY).await;
    }

    /// Decodes a session entry. Unreadable entries are removed and reported as a miss.
    async fn cached_table(&self, key: &str) -> Option<DataFrame> {
        let payload = match self.session.get(key).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!(key, "Session miss");
                return None;
            }
            Err(e) => {
                warn!(key, error = %e, "Session store unavailable");
                return None;
            }
        };

        let decoded = decode_split(&payload)
            .and_then(|table| with_date_index(&table, DATE_COLUMN, RowOrder::Ascending));
        match decoded {
            Ok(table) => {
                debug!(key, rows = table.height(), "Session hit");
                Some(table)
            }
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable session entry");
                self.forget(key).await;
                None
            }
        }
    }

    async fn cache_table(&self, key: &str, table: &DataFrame) {
        let payload = match encode_split(table) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(key, error = %e, "Could not encode table for the session");
                return;
            }
        };
        if let Err(e) = self.session.put(key, payload).await {
            warn!(key, error = %e, "Failed to cache table");
        }
    }

    async fn forget(&self, key: &str) {
        if let Err(e) = self.session.remove(key).await {
            warn!(key, error = %e, "Could not remove session entry");
        }
    }
}

fn join_notes(notes: Vec<String>) -> Option<String> {
    if notes.is_empty() {
        None
    } else {
        Some(notes.join(" "))
    }
}

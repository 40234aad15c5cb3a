//! End-to-end retrieval scenarios against scripted providers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use fundview::frame::{RowOrder, table_from_text_records};
use fundview::{
    CsvStatementStore, DataError, DataProvider, FundamentalsProvider, HistoryRange,
    InMemorySessionStore, PeriodVariant, PriceHistoryProvider, PriceInterval, RawDataset,
    RemoteFetcher, Result, RetrievalCoordinator, RetrievalError, SaveStatus, SessionStore,
    StatementError, StatementKind, TableSource, Ticker,
};
use polars::prelude::*;

#[derive(Debug, Clone)]
enum Script {
    Rows(DataFrame),
    Fail(fn() -> DataError),
}

#[derive(Debug, Default)]
struct ScriptedFundamentals {
    overrides: HashMap<(StatementKind, PeriodVariant), Script>,
    calls: AtomicUsize,
}

impl ScriptedFundamentals {
    fn with(mut self, kind: StatementKind, variant: PeriodVariant, script: Script) -> Self {
        self.overrides.insert((kind, variant), script);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn bulk_frame(kind: StatementKind, tickers: &[&str]) -> DataFrame {
    let column = match kind {
        StatementKind::Income => "Revenue",
        StatementKind::Balance => "Total Assets",
        StatementKind::Cashflow => "Net Cash from Operating Activities",
    };
    let mut names = Vec::new();
    let mut dates = Vec::new();
    let mut values = Vec::new();
    for (i, ticker) in tickers.iter().enumerate() {
        for (j, date) in ["2022-09-30", "2023-09-30"].iter().enumerate() {
            names.push(ticker.to_string());
            dates.push(date.to_string());
            values.push(100.0 * (i + 1) as f64 + j as f64);
        }
    }
    DataFrame::new(vec![
        Column::new("Ticker".into(), names),
        Column::new("Report Date".into(), dates),
        Column::new(column.into(), values),
    ])
    .unwrap()
}

impl DataProvider for ScriptedFundamentals {
    fn name(&self) -> &str {
        "Scripted"
    }

    fn description(&self) -> &str {
        "Scripted bulk statements"
    }
}

#[async_trait]
impl FundamentalsProvider for ScriptedFundamentals {
    async fn load_statements(
        &self,
        kind: StatementKind,
        variant: PeriodVariant,
        _market: &str,
    ) -> Result<Option<RawDataset>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let frame = match self.overrides.get(&(kind, variant)) {
            Some(Script::Rows(frame)) => frame.clone(),
            Some(Script::Fail(error)) => return Err(error()),
            None => bulk_frame(kind, &["AAPL", "MSFT"]),
        };
        Ok(Some(RawDataset::new(
            frame,
            vec!["Ticker".to_string(), "Report Date".to_string()],
        )))
    }
}

#[derive(Debug, Default)]
struct CountingPrices {
    calls: AtomicUsize,
}

impl DataProvider for CountingPrices {
    fn name(&self) -> &str {
        "Counting"
    }

    fn description(&self) -> &str {
        "Counts price requests"
    }
}

#[async_trait]
impl PriceHistoryProvider for CountingPrices {
    async fn fetch_history(
        &self,
        _ticker: &Ticker,
        _range: HistoryRange,
        _interval: PriceInterval,
    ) -> Result<DataFrame> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let headers: Vec<String> = ["date", "open", "high", "low", "close", "volume"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let records = (1..=4)
            .map(|week| {
                let close = 100.0 + week as f64;
                vec![
                    format!("2024-01-{:02}", week * 7),
                    close.to_string(),
                    (close + 1.0).to_string(),
                    (close - 1.0).to_string(),
                    close.to_string(),
                    "1000".to_string(),
                ]
            })
            .collect::<Vec<_>>();
        table_from_text_records(&headers, &records, RowOrder::Ascending)
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    session: Arc<InMemorySessionStore>,
    fundamentals: Arc<ScriptedFundamentals>,
    prices: Arc<CountingPrices>,
    coordinator: RetrievalCoordinator,
}

fn harness(fundamentals: ScriptedFundamentals) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let session = Arc::new(InMemorySessionStore::new());
    let fundamentals = Arc::new(fundamentals);
    let prices = Arc::new(CountingPrices::default());
    let fetcher = RemoteFetcher::new(fundamentals.clone(), prices.clone())
        .with_request_delay(Duration::ZERO)
        .with_moving_averages(vec![2]);
    let coordinator = RetrievalCoordinator::new(
        session.clone(),
        CsvStatementStore::new(dir.path().join("data")),
        fetcher,
    )
    .with_default_period(HistoryRange::FiveYears);
    Harness {
        _dir: dir,
        session,
        fundamentals,
        prices,
        coordinator,
    }
}

#[tokio::test]
async fn test_session_hit_after_refresh_skips_providers() {
    let h = harness(ScriptedFundamentals::default());
    let ticker = Ticker::new("aapl");

    let report = h.coordinator.set_active_ticker(&ticker).await.unwrap();
    assert!(report.is_success());
    assert_eq!(h.fundamentals.calls(), 6);

    let result = h
        .coordinator
        .get_statement(&ticker, StatementKind::Income, PeriodVariant::Annual)
        .await;
    assert_eq!(result.source, Some(TableSource::Session));
    assert_eq!(
        result.info.as_deref(),
        Some("Data for income (annual) loaded from session.")
    );
    assert_eq!(result.table.unwrap().height(), 2);
    assert!(result.error.is_none());
    assert_eq!(h.fundamentals.calls(), 6);
}

#[tokio::test]
async fn test_disk_round_trip_and_income_repopulates_session() {
    let h = harness(ScriptedFundamentals::default());
    let ticker = Ticker::new("AAPL");
    h.coordinator.set_active_ticker(&ticker).await.unwrap();

    let cached = h
        .coordinator
        .get_statement(&ticker, StatementKind::Income, PeriodVariant::Quarterly)
        .await
        .table
        .unwrap();

    h.session.remove("income_quarterly_df_json").await.unwrap();
    let from_disk = h
        .coordinator
        .get_statement(&ticker, StatementKind::Income, PeriodVariant::Quarterly)
        .await;
    assert_eq!(from_disk.source, Some(TableSource::Disk));
    assert_eq!(
        from_disk.info.as_deref(),
        Some("Data for income (quarterly) loaded from CSV: AAPL_Income_Statement_quarterly.csv")
    );
    assert!(from_disk.table.unwrap().equals_missing(&cached));

    // Income goes back into the session, other statements do not.
    assert!(h.session.get("income_quarterly_df_json").await.unwrap().is_some());
    let balance = h
        .coordinator
        .get_statement(&ticker, StatementKind::Balance, PeriodVariant::Quarterly)
        .await;
    assert_eq!(balance.source, Some(TableSource::Disk));
    assert!(h.session.get("balance_quarterly_df_json").await.unwrap().is_none());
    assert_eq!(h.fundamentals.calls(), 6);
}

#[tokio::test]
async fn test_refresh_is_idempotent() {
    let h = harness(ScriptedFundamentals::default());
    let ticker = Ticker::new("AAPL");
    let path = h
        .coordinator
        .store()
        .file_path(&ticker, StatementKind::Cashflow, PeriodVariant::Annual);

    let first = h.coordinator.set_active_ticker(&ticker).await.unwrap();
    let first_file = std::fs::read_to_string(&path).unwrap();
    let second = h.coordinator.set_active_ticker(&ticker).await.unwrap();
    let second_file = std::fs::read_to_string(&path).unwrap();

    assert_eq!(first.pairs, second.pairs);
    assert_eq!(first_file, second_file);
    assert_eq!(h.fundamentals.calls(), 12);
}

#[tokio::test]
async fn test_missing_ticker_in_one_pair_is_isolated() {
    let h = harness(ScriptedFundamentals::default().with(
        StatementKind::Cashflow,
        PeriodVariant::Quarterly,
        Script::Rows(bulk_frame(StatementKind::Cashflow, &["MSFT"])),
    ));
    let ticker = Ticker::new("AAPL");

    let report = h.coordinator.set_active_ticker(&ticker).await.unwrap();
    assert!(report.is_success());
    let failed: Vec<_> = report.pairs.iter().filter(|p| p.error.is_some()).collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].kind, StatementKind::Cashflow);
    assert_eq!(failed[0].variant, PeriodVariant::Quarterly);
    assert!(matches!(failed[0].save, SaveStatus::DownloadError { .. }));

    let result = h
        .coordinator
        .get_statement(&ticker, StatementKind::Cashflow, PeriodVariant::Quarterly)
        .await;
    assert!(result.table.is_none());
    assert_eq!(
        result.error,
        Some(RetrievalError::Statement(StatementError::NoDataFound(
            "No Cash Flow Statement (quarterly) data for AAPL (DataFrame empty after filter)."
                .into()
        )))
    );
}

#[tokio::test]
async fn test_other_ticker_only_frame_is_no_data() {
    let msft_only = |kind| Script::Rows(bulk_frame(kind, &["MSFT"]));
    let mut fundamentals = ScriptedFundamentals::default();
    for kind in StatementKind::ALL {
        for variant in PeriodVariant::ALL {
            fundamentals = fundamentals.with(kind, variant, msft_only(kind));
        }
    }
    let h = harness(fundamentals);

    let report = h
        .coordinator
        .set_active_ticker(&Ticker::new("AAPL"))
        .await
        .unwrap();
    assert!(!report.is_success());
    assert!(matches!(
        report.primary_error(),
        Some(StatementError::NoDataFound(_))
    ));
    assert!(report.pairs.iter().all(|p| p.save == SaveStatus::DownloadError {
        details: p.error.as_ref().unwrap().to_string()
    }));

    let result = h
        .coordinator
        .get_statement(&Ticker::new("AAPL"), StatementKind::Income, PeriodVariant::Annual)
        .await;
    assert!(result.table.is_none());
    assert!(matches!(
        result.error,
        Some(RetrievalError::Statement(StatementError::NoDataFound(_)))
    ));
}

#[tokio::test]
async fn test_unsorted_statement_is_identical_from_session_and_disk() {
    let unsorted = DataFrame::new(vec![
        Column::new("Ticker".into(), vec!["AAPL", "AAPL", "MSFT", "AAPL"]),
        Column::new(
            "Report Date".into(),
            vec!["2023-09-30", "2021-09-30", "2022-09-30", "2023-09-30"],
        ),
        Column::new("Revenue".into(), vec![1.0, 2.0, 9.0, 3.0]),
    ])
    .unwrap();
    let h = harness(ScriptedFundamentals::default().with(
        StatementKind::Income,
        PeriodVariant::Annual,
        Script::Rows(unsorted),
    ));
    let ticker = Ticker::new("AAPL");

    let report = h.coordinator.set_active_ticker(&ticker).await.unwrap();
    assert_eq!(
        report
            .pair(StatementKind::Income, PeriodVariant::Annual)
            .unwrap()
            .rows,
        2
    );

    let from_session = h
        .coordinator
        .get_statement(&ticker, StatementKind::Income, PeriodVariant::Annual)
        .await;
    assert_eq!(from_session.source, Some(TableSource::Session));
    let from_session = from_session.table.unwrap();

    h.session.remove("income_annual_df_json").await.unwrap();
    let from_disk = h
        .coordinator
        .get_statement(&ticker, StatementKind::Income, PeriodVariant::Annual)
        .await;
    assert_eq!(from_disk.source, Some(TableSource::Disk));
    let from_disk = from_disk.table.unwrap();

    assert!(from_session.equals_missing(&from_disk));
    let dates: Vec<String> = fundview::frame::table_dates(&from_session)
        .unwrap()
        .into_iter()
        .map(|d| d.unwrap().to_string())
        .collect();
    assert_eq!(dates, ["2021-09-30", "2023-09-30"]);
    let revenue = from_session.column("Revenue").unwrap().f64().unwrap();
    assert_eq!(revenue.get(1), Some(3.0));
}

#[tokio::test]
async fn test_balance_annual_exception_is_reported_for_that_pair() {
    let h = harness(
        ScriptedFundamentals::default()
            .with(
                StatementKind::Balance,
                PeriodVariant::Annual,
                Script::Fail(|| DataError::Network("connection reset".into())),
            )
            .with(
                StatementKind::Balance,
                PeriodVariant::Quarterly,
                Script::Fail(|| DataError::Parse("unexpected column".into())),
            ),
    );
    let ticker = Ticker::new("AAPL");

    let report = h.coordinator.set_active_ticker(&ticker).await.unwrap();
    assert!(report.is_success());
    assert!(matches!(
        report.error_for(StatementKind::Balance, PeriodVariant::Annual),
        Some(StatementError::LoadFailed(_))
    ));
    assert!(matches!(
        report.error_for(StatementKind::Balance, PeriodVariant::Quarterly),
        Some(StatementError::ProcessingException(_))
    ));
    assert!(report.error_for(StatementKind::Income, PeriodVariant::Annual).is_none());
    assert!(
        !h.coordinator
            .store()
            .file_path(&ticker, StatementKind::Balance, PeriodVariant::Annual)
            .exists()
    );

    let result = h
        .coordinator
        .get_statement(&ticker, StatementKind::Balance, PeriodVariant::Annual)
        .await;
    assert!(matches!(
        result.error,
        Some(RetrievalError::Statement(StatementError::LoadFailed(_)))
    ));
}

#[tokio::test]
async fn test_weekly_prices_use_default_period_and_are_cached() {
    let h = harness(ScriptedFundamentals::default());
    let ticker = Ticker::new("AAPL");

    let first = h
        .coordinator
        .get_prices(&ticker, None, PriceInterval::Weekly)
        .await;
    assert_eq!(first.source, Some(TableSource::Remote));
    let table = first.table.unwrap();
    assert_eq!(table.height(), 4);
    assert!(table.column("ma2").is_ok());
    assert!(h.session.get("AAPL_5y_1wk").await.unwrap().is_some());

    let second = h
        .coordinator
        .get_prices(&ticker, Some(HistoryRange::FiveYears), PriceInterval::Weekly)
        .await;
    assert_eq!(second.source, Some(TableSource::Session));
    assert_eq!(h.prices.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ticker_switch_invalidates_previous_entries() {
    let h = harness(ScriptedFundamentals::default());
    let aapl = Ticker::new("AAPL");
    let msft = Ticker::new("MSFT");

    h.coordinator.set_active_ticker(&aapl).await.unwrap();
    h.coordinator
        .get_prices(&aapl, Some(HistoryRange::OneYear), PriceInterval::Daily)
        .await;
    h.session
        .put("AAPLX_1y_1d", "unrelated".to_string())
        .await
        .unwrap();
    assert!(h.session.get("AAPL_1y_1d").await.unwrap().is_some());

    let report = h.coordinator.set_active_ticker(&msft).await.unwrap();
    assert_eq!(report.ticker, msft);
    assert_eq!(h.coordinator.active_ticker().await, Some(msft.clone()));
    assert!(h.session.get("AAPL_1y_1d").await.unwrap().is_none());
    assert!(h.session.get("AAPLX_1y_1d").await.unwrap().is_some());

    // Statement entries now hold MSFT rows.
    let income = h
        .coordinator
        .get_statement(&msft, StatementKind::Income, PeriodVariant::Annual)
        .await;
    assert_eq!(income.source, Some(TableSource::Session));
    let revenue = income.table.unwrap();
    let values = revenue.column("Revenue").unwrap().f64().unwrap();
    assert_eq!(values.get(0), Some(200.0));

    // The previous ticker is still served from its files.
    let old = h
        .coordinator
        .get_statement(&aapl, StatementKind::Income, PeriodVariant::Annual)
        .await;
    assert_eq!(old.source, Some(TableSource::Disk));
}

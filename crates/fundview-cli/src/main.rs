//! fundview CLI: refresh statements, read statements and prices, manage the API key.
//!
//! Commands:
//! - `refresh` - make a ticker active and download all six statements
//! - `statement` - print one statement from the session or the statement files
//! - `prices` - print price history, downloading it on a session miss
//! - `api-key` - show, set or clear the SimFin API key

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use fundview::frame::{Cell, column_cells, table_dates};
use fundview::{
    HistoryRange, PathResolver, PeriodVariant, PriceInterval, RetrievalCoordinator,
    RetrievalResult, SqliteSessionStore, StatementKind, Ticker, api_key_status, columns,
    indicators, update_api_key,
};
use polars::prelude::DataFrame;
use tracing::debug;

#[derive(Parser)]
#[command(name = "fundview-cli", about = "Company fundamentals and price history")]
struct Cli {
    /// Project root holding `config/config.toml`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    /// Session id; each session has its own cache entries and active ticker.
    #[arg(long, global = true, default_value = "default")]
    session: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Make a ticker active and download all of its statements.
    Refresh {
        /// Ticker symbol (e.g., AAPL).
        ticker: Ticker,
    },
    /// Print one statement.
    Statement {
        /// Ticker symbol.
        ticker: Ticker,

        /// income, balance or cashflow.
        #[arg(long, default_value = "income")]
        kind: StatementKind,

        /// annual or quarterly.
        #[arg(long, default_value = "annual")]
        variant: PeriodVariant,

        /// Print only the revenue or net income series.
        #[arg(long)]
        series: Option<Series>,

        /// Number of most recent rows to print.
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Print price history.
    Prices {
        /// Ticker symbol.
        ticker: Ticker,

        /// 1mo, 3mo, 6mo, 1y, 2y, 5y, 10y, ytd or max. Defaults to the configured period.
        #[arg(long)]
        period: Option<HistoryRange>,

        /// 1d, 1wk or 1mo. Defaults to the configured interval.
        #[arg(long)]
        interval: Option<PriceInterval>,

        /// Add returns, volatility, Bollinger bands and momentum columns.
        #[arg(long, default_value_t = false)]
        indicators: bool,

        /// Print summary statistics instead of rows.
        #[arg(long, default_value_t = false)]
        summary: bool,

        /// Number of most recent rows to print.
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Manage the SimFin API key.
    ApiKey {
        #[command(subcommand)]
        action: ApiKeyAction,
    },
}

#[derive(Subcommand)]
enum ApiKeyAction {
    /// Show which kind of key is configured.
    Show,
    /// Store a key.
    Set {
        /// The SimFin API key.
        key: String,
    },
    /// Remove the key file and fall back to the free key.
    Clear,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Series {
    Revenue,
    NetIncome,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let resolver = PathResolver::from_root(&cli.root)?;

    match cli.command {
        Commands::ApiKey { action } => run_api_key(&resolver, action),
        Commands::Refresh { ticker } => {
            run_refresh(&coordinator(&resolver, &cli.session)?, &ticker).await
        }
        Commands::Statement {
            ticker,
            kind,
            variant,
            series,
            rows,
        } => {
            let coordinator = coordinator(&resolver, &cli.session)?;
            let result = coordinator.get_statement(&ticker, kind, variant).await;
            let table = into_table(result)?;
            match series {
                Some(series) => print_series(&table, series),
                None => print_table(&table, rows),
            }
        }
        Commands::Prices {
            ticker,
            period,
            interval,
            indicators: with_indicators,
            summary,
            rows,
        } => {
            let coordinator = coordinator(&resolver, &cli.session)?;
            let interval = interval.unwrap_or_else(|| resolver.default_interval());
            let result = coordinator.get_prices(&ticker, period, interval).await;
            let mut table = into_table(result)?;
            if summary {
                return print_summary(&table);
            }
            if with_indicators {
                table = indicators::with_additional_indicators(&table)?;
            }
            print_table(&table, rows)
        }
    }
}

fn coordinator(resolver: &PathResolver, session: &str) -> Result<RetrievalCoordinator> {
    let data_dir = resolver.data_directory();
    std::fs::create_dir_all(&data_dir)?;
    let store = SqliteSessionStore::new(data_dir.join("session.db"), session)?;
    debug!(data_dir = %data_dir.display(), session, "Opened session store");
    Ok(RetrievalCoordinator::from_config(resolver, Arc::new(store)))
}

async fn run_refresh(coordinator: &RetrievalCoordinator, ticker: &Ticker) -> Result<()> {
    let report = coordinator.set_active_ticker(ticker).await?;
    for pair in &report.pairs {
        match &pair.error {
            None => println!("{} ({}): {} rows. {}", pair.kind, pair.variant, pair.rows, pair.save),
            Some(error) => println!("{} ({}): {error}", pair.kind, pair.variant),
        }
    }
    if !report.is_success() {
        match report.primary_error() {
            Some(error) => bail!("Refresh of {ticker} failed: {error}"),
            None => bail!("Refresh of {ticker} failed"),
        }
    }
    Ok(())
}

fn run_api_key(resolver: &PathResolver, action: ApiKeyAction) -> Result<()> {
    let path = resolver.api_key_file();
    let status = match action {
        ApiKeyAction::Show => api_key_status(&path),
        ApiKeyAction::Set { key } => update_api_key(&path, Some(&key))?,
        ApiKeyAction::Clear => update_api_key(&path, None)?,
    };
    println!("{status} ({})", path.display());
    Ok(())
}

fn into_table(result: RetrievalResult) -> Result<DataFrame> {
    if let Some(info) = &result.info {
        eprintln!("{info}");
    }
    match (result.table, result.error) {
        (Some(table), _) => Ok(table),
        (None, Some(error)) => bail!(error),
        (None, None) => bail!("No data returned"),
    }
}

fn format_cell(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Number(v) => format!("{v:.2}"),
        Cell::Text(s) => s.clone(),
    }
}

fn print_table(table: &DataFrame, rows: usize) -> Result<()> {
    let table = table.tail(Some(rows));
    let dates = table_dates(&table)?;
    let mut names = Vec::new();
    let mut cells = Vec::new();
    for column in table.get_columns() {
        if column.name().as_str() == fundview::frame::DATE_COLUMN {
            continue;
        }
        names.push(column.name().to_string());
        cells.push(column_cells(column)?);
    }

    println!("date,{}", names.join(","));
    for (i, date) in dates.iter().enumerate() {
        let date = date.map(|d| d.to_string()).unwrap_or_default();
        let row: Vec<String> = cells.iter().map(|c| format_cell(&c[i])).collect();
        println!("{date},{}", row.join(","));
    }
    Ok(())
}

fn print_series(table: &DataFrame, series: Series) -> Result<()> {
    let candidates = match series {
        Series::Revenue => columns::REVENUE,
        Series::NetIncome => columns::NET_INCOME,
    };
    let Some(column) = columns::find_column(table, candidates) else {
        bail!("None of {} found in the statement", candidates.join(", "));
    };
    println!("date,{column}");
    for (date, value) in columns::time_series(table, column)? {
        println!("{date},{value:.2}");
    }
    Ok(())
}

fn print_summary(table: &DataFrame) -> Result<()> {
    let Some(summary) = indicators::price_summary(table)? else {
        bail!("Price table is empty");
    };
    let show = |label: &str, value: Option<f64>| match value {
        Some(v) => println!("{label:<26}{v:.2}"),
        None => println!("{label:<26}n/a"),
    };
    show("Current price", summary.current_price);
    show("52-week high", summary.price_52w_high);
    show("52-week low", summary.price_52w_low);
    show("Total return (%)", summary.total_return_pct);
    show("Annualized volatility (%)", summary.annualized_volatility_pct);
    show("Average daily volume", summary.avg_daily_volume);
    Ok(())
}

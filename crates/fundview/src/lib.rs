#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/fundview/fundview/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Retrieval of company fundamentals and price history.
//!
//! This crate ties the workspace together. A [`RetrievalCoordinator`] answers requests
//! from the session cache, then from per-ticker CSV files, and fetches from the remote
//! providers on a full refresh or a price miss.
//!
//! # Features
//!
//! - `simfin` - SimFin bulk statements provider
//! - `yahoo` - Yahoo Finance price provider
//! - `cache-sqlite` - SQLite-backed session store
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use fundview::{
//!     InMemorySessionStore, PathResolver, PeriodVariant, RetrievalCoordinator, StatementKind,
//!     Ticker,
//! };
//!
//! #[tokio::main]
//! async fn main() -> fundview::Result<()> {
//!     let resolver = PathResolver::from_root(".")?;
//!     let coordinator =
//!         RetrievalCoordinator::from_config(&resolver, Arc::new(InMemorySessionStore::new()));
//!
//!     let ticker = Ticker::parse("AAPL")?;
//!     let report = coordinator.set_active_ticker(&ticker).await?;
//!     println!("refresh succeeded: {}", report.is_success());
//!
//!     let income = coordinator
//!         .get_statement(&ticker, StatementKind::Income, PeriodVariant::Annual)
//!         .await;
//!     println!("{:?}", income.info);
//!     Ok(())
//! }
//! ```

/// SimFin API key file handling.
pub mod api_key;
/// Configuration file and path resolution.
pub mod config;
/// Session, disk and remote lookup.
pub mod coordinator;
/// Remote fetching of statements and prices.
pub mod fetcher;
/// Refresh report.
pub mod report;

pub use api_key::{ApiKeyStatus, api_key_status, load_api_key, update_api_key};
pub use config::{ConfigLoader, PathResolver};
pub use coordinator::RetrievalCoordinator;
pub use fetcher::{RemoteFetcher, StatementFetch};
pub use report::{PairStatus, RefreshReport};

// Re-export core types
pub use fundview_core::{
    DataError, DataProvider, FundamentalsProvider, HistoryRange, PeriodVariant,
    PriceHistoryProvider, PriceInterval, RawDataset, Result, RetrievalError, RetrievalKey,
    RetrievalResult, SessionStore, StatementError, StatementKind, StatementNormalizer,
    TableSource, Ticker, columns, frame, indicators,
};

// Re-export storage
#[cfg(feature = "cache-sqlite")]
pub use fundview_cache::SqliteSessionStore;
pub use fundview_cache::{
    CsvStatementStore, InMemorySessionStore, NoopSessionStore, SaveStatus, StoredTable,
};

// Re-export providers
#[cfg(feature = "simfin")]
pub use fundview_simfin::SimFinProvider;
#[cfg(feature = "yahoo")]
pub use fundview_yahoo::YahooProvider;

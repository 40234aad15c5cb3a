#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/fundview/fundview/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for fundamentals retrieval.
//!
//! This crate provides the foundational abstractions shared by the workspace:
//!
//! - [`FundamentalsProvider`](provider::FundamentalsProvider) - Bulk statement datasets
//! - [`PriceHistoryProvider`](provider::PriceHistoryProvider) - Price bars
//! - [`SessionStore`](cache::SessionStore) - Per-session key-value cache
//! - [`StatementNormalizer`](normalize::StatementNormalizer) - One ticker out of a bulk dataset
//! - [`RetrievalResult`](outcome::RetrievalResult) - What callers get back

/// Session store trait.
pub mod cache;
/// Column lookup for charting consumers.
pub mod columns;
/// Error types for data operations.
pub mod error;
/// Table construction and the session payload codec.
pub mod frame;
/// Derived price columns and summary statistics.
pub mod indicators;
/// Price history period and interval.
pub mod interval;
/// Statement normalization.
pub mod normalize;
/// Retrieval outcome type.
pub mod outcome;
/// Provider traits for fetching remote data.
pub mod provider;
/// Core identifiers (Ticker, StatementKind, PeriodVariant, RetrievalKey).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::SessionStore;
pub use error::{DataError, Result, RetrievalError, StatementError};
pub use frame::DATE_COLUMN;
pub use interval::{HistoryRange, PriceInterval};
pub use normalize::StatementNormalizer;
pub use outcome::{RetrievalResult, TableSource};
pub use provider::{DataProvider, FundamentalsProvider, PriceHistoryProvider, RawDataset};
pub use types::{PeriodVariant, RetrievalKey, StatementKind, Ticker, statement_pairs};

//! Error types for data operations.
//!
//! Two families live here:
//!
//! - [`DataError`] covers operational failures (network, parsing, disk, cache) and is the
//!   error half of the crate-wide [`Result`] alias.
//! - [`StatementError`] and [`RetrievalError`] are outcomes carried *as data*: a failed
//!   statement fetch is recorded next to the successful ones instead of aborting them.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interval::{HistoryRange, PriceInterval};
use crate::types::{PeriodVariant, StatementKind, Ticker};

/// Errors that can occur during data operations.
#[derive(Error, Debug)]
pub enum DataError {
    /// Network-related errors (connection failures, timeouts, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by a provider.
    #[error("Rate limited by {provider}: retry after {retry_after:?}")]
    RateLimited {
        /// The provider that rate limited the request.
        provider: String,
        /// Suggested time to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// The requested ticker was not found.
    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    /// The provider answered but had no rows for the request.
    #[error("Data not available for {ticker} (period {range}, interval {interval})")]
    DataNotAvailable {
        /// The ticker that was requested.
        ticker: String,
        /// Requested download period.
        range: String,
        /// Requested bar interval.
        interval: String,
    },

    /// Error parsing data from a provider, a file or a cached payload.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with a session store.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Configuration left no usable value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure.
    #[error("I/O error at {path}: {reason}")]
    Io {
        /// Path being read or written.
        path: String,
        /// Underlying cause.
        reason: String,
    },

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Authentication failed for a provider.
    #[error("Authentication failed for provider {0}")]
    AuthenticationFailed(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl DataError {
    /// Builds an [`DataError::Io`] from a path and any displayable cause.
    pub fn io(path: impl AsRef<std::path::Path>, reason: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns true for failures that mean the provider could not be reached at all.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Why a single (statement kind, period variant) fetch produced no table.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "error", content = "details")]
pub enum StatementError {
    /// The provider returned nothing at all (or could not be reached).
    #[error("LoadFailed: {0}")]
    LoadFailed(String),

    /// The provider answered, but no rows belong to the requested ticker.
    #[error("NoDataFound: {0}")]
    NoDataFound(String),

    /// The provider's dataset has no ticker dimension to filter on.
    #[error("FilterFailed: {0}")]
    FilterFailed(String),

    /// Any other failure while extracting the table.
    #[error("ProcessingException: {0}")]
    ProcessingException(String),
}

impl StatementError {
    /// The detail message without the kind prefix.
    #[must_use]
    pub fn details(&self) -> &str {
        match self {
            Self::LoadFailed(d)
            | Self::NoDataFound(d)
            | Self::FilterFailed(d)
            | Self::ProcessingException(d) => d,
        }
    }

    /// Short name of the failure kind.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::LoadFailed(_) => "LoadFailed",
            Self::NoDataFound(_) => "NoDataFound",
            Self::FilterFailed(_) => "FilterFailed",
            Self::ProcessingException(_) => "ProcessingException",
        }
    }
}

/// The error half of a [`RetrievalResult`](crate::outcome::RetrievalResult).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// Neither the session nor the disk holds the requested statement.
    #[error("{kind} ({variant}) not found for {ticker}")]
    NotFound {
        /// Requested statement kind.
        kind: StatementKind,
        /// Requested period variant.
        variant: PeriodVariant,
        /// Requested ticker.
        ticker: Ticker,
    },

    /// The last refresh recorded this failure for the requested pair.
    #[error(transparent)]
    Statement(#[from] StatementError),

    /// The statement file exists but could not be read.
    #[error("Error reading CSV {file} for {kind} ({variant}): {reason}")]
    FileRead {
        /// File name of the statement CSV.
        file: String,
        /// Requested statement kind.
        kind: StatementKind,
        /// Requested period variant.
        variant: PeriodVariant,
        /// Underlying cause.
        reason: String,
    },

    /// The price provider returned nothing usable.
    #[error("No price history found for {ticker} with period {range}, interval {interval}")]
    PricesUnavailable {
        /// Requested ticker.
        ticker: Ticker,
        /// Requested download period.
        range: HistoryRange,
        /// Requested bar interval.
        interval: PriceInterval,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_error_display_and_details() {
        let err = StatementError::NoDataFound("No Income Statement (annual) data for AAPL".into());
        assert_eq!(
            err.to_string(),
            "NoDataFound: No Income Statement (annual) data for AAPL"
        );
        assert_eq!(err.details(), "No Income Statement (annual) data for AAPL");
        assert_eq!(err.kind_name(), "NoDataFound");
    }

    #[test]
    fn test_statement_error_serde_is_tagged() {
        let err = StatementError::FilterFailed("no Ticker".into());
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"error":"FilterFailed","details":"no Ticker"}"#);
        let back: StatementError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_not_found_message() {
        let err = RetrievalError::NotFound {
            kind: StatementKind::Balance,
            variant: PeriodVariant::Quarterly,
            ticker: Ticker::new("aapl"),
        };
        assert_eq!(err.to_string(), "balance (quarterly) not found for AAPL");
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(DataError::Network("timeout".into()).is_unreachable());
        assert!(
            DataError::RateLimited {
                provider: "SimFin".into(),
                retry_after: None
            }
            .is_unreachable()
        );
        assert!(!DataError::Parse("bad".into()).is_unreachable());
    }
}

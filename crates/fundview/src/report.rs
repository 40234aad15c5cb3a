//! Per-pair status of a full refresh.

use chrono::{DateTime, Utc};
use fundview_cache::SaveStatus;
use fundview_core::{PeriodVariant, StatementError, StatementKind, Ticker};
use serde::{Deserialize, Serialize};

/// What happened to one (kind, variant) pair during a refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairStatus {
    /// Statement kind.
    pub kind: StatementKind,
    /// Period variant.
    pub variant: PeriodVariant,
    /// Rows of the normalized table; zero when the fetch failed.
    pub rows: usize,
    /// Fetch or normalization failure.
    pub error: Option<StatementError>,
    /// Outcome of writing the statement file.
    pub save: SaveStatus,
}

impl PairStatus {
    /// Returns true when the pair was fetched.
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        self.error.is_none()
    }
}

/// Status of every pair of one full refresh, kept in the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Ticker that was refreshed.
    pub ticker: Ticker,
    /// When the refresh finished.
    pub refreshed_at: DateTime<Utc>,
    /// Pairs in fetch order.
    pub pairs: Vec<PairStatus>,
}

impl RefreshReport {
    /// Creates a report stamped with the current time.
    #[must_use]
    pub fn new(ticker: Ticker, pairs: Vec<PairStatus>) -> Self {
        Self {
            ticker,
            refreshed_at: Utc::now(),
            pairs,
        }
    }

    /// Returns true when any pair was fetched or any file was saved.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.pairs
            .iter()
            .any(|p| p.is_fetched() || p.save.is_saved())
    }

    /// First failure recorded, in fetch order.
    #[must_use]
    pub fn primary_error(&self) -> Option<&StatementError> {
        self.pairs.iter().find_map(|p| p.error.as_ref())
    }

    /// Status of one pair.
    #[must_use]
    pub fn pair(&self, kind: StatementKind, variant: PeriodVariant) -> Option<&PairStatus> {
        self.pairs
            .iter()
            .find(|p| p.kind == kind && p.variant == variant)
    }

    /// Failure recorded for one pair.
    #[must_use]
    pub fn error_for(&self, kind: StatementKind, variant: PeriodVariant) -> Option<&StatementError> {
        self.pair(kind, variant).and_then(|p| p.error.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn pair(kind: StatementKind, error: Option<StatementError>, save: SaveStatus) -> PairStatus {
        PairStatus {
            kind,
            variant: PeriodVariant::Annual,
            rows: usize::from(error.is_none()),
            error,
            save,
        }
    }

    #[test]
    fn test_success_and_primary_error() {
        let failed = RefreshReport::new(
            Ticker::new("AAPL"),
            vec![
                pair(
                    StatementKind::Income,
                    Some(StatementError::LoadFailed("down".into())),
                    SaveStatus::DownloadError {
                        details: "LoadFailed: down".into(),
                    },
                ),
                pair(
                    StatementKind::Balance,
                    Some(StatementError::NoDataFound("none".into())),
                    SaveStatus::DownloadError {
                        details: "NoDataFound: none".into(),
                    },
                ),
            ],
        );
        assert!(!failed.is_success());
        assert_eq!(
            failed.primary_error(),
            Some(&StatementError::LoadFailed("down".into()))
        );
        assert_eq!(
            failed.error_for(StatementKind::Balance, PeriodVariant::Annual),
            Some(&StatementError::NoDataFound("none".into()))
        );
        assert_eq!(failed.error_for(StatementKind::Cashflow, PeriodVariant::Annual), None);

        let mut partial = failed;
        partial.pairs.push(pair(
            StatementKind::Cashflow,
            None,
            SaveStatus::Saved {
                file: PathBuf::from("AAPL_Cash_Flow_Statement_annual.csv"),
            },
        ));
        assert!(partial.is_success());
    }

    #[test]
    fn test_report_serializes_for_the_session() {
        let report = RefreshReport::new(
            Ticker::new("AAPL"),
            vec![pair(
                StatementKind::Income,
                Some(StatementError::FilterFailed("no ticker".into())),
                SaveStatus::NoData,
            )],
        );
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"FilterFailed\""));
        let back: RefreshReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }
}

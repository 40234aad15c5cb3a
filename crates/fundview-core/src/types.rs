//! Core identifiers for statement and price retrieval.
//!
//! - [`Ticker`] - Trading symbol
//! - [`StatementKind`] - Income, balance sheet or cash flow
//! - [`PeriodVariant`] - Annual or quarterly reporting cadence
//! - [`RetrievalKey`] - The tuple identifying a cached artifact

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;
use crate::interval::{HistoryRange, PriceInterval};

/// A trading symbol/ticker.
///
/// Tickers are trimmed and uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticker(String);

impl Ticker {
    /// Creates a new ticker from a string, converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Creates a ticker from user input, rejecting empty or malformed symbols.
    ///
    /// ASCII alphanumerics plus `.` and `-` (e.g. `BRK.B`) are accepted.
    pub fn parse(s: &str) -> Result<Self, DataError> {
        let ticker = Self::new(s);
        if ticker.0.is_empty() {
            return Err(DataError::InvalidParameter("Empty ticker".to_string()));
        }
        if !ticker
            .0
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        {
            return Err(DataError::InvalidParameter(format!(
                "Invalid ticker: {}",
                ticker.0
            )));
        }
        Ok(ticker)
    }

    /// Returns the ticker as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Ticker {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<&str> for Ticker {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Ticker {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Fundamental statement category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    /// Income statement (profit and loss).
    Income,
    /// Balance sheet.
    Balance,
    /// Cash flow statement.
    Cashflow,
}

impl StatementKind {
    /// All statement kinds in refresh order.
    pub const ALL: [Self; 3] = [Self::Income, Self::Balance, Self::Cashflow];

    /// Lowercase key used in cache keys and provider queries.
    #[must_use]
    pub const fn key(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Balance => "balance",
            Self::Cashflow => "cashflow",
        }
    }

    /// Human-readable statement name.
    #[must_use]
    pub const fn readable_name(&self) -> &'static str {
        match self {
            Self::Income => "Income Statement",
            Self::Balance => "Balance Sheet",
            Self::Cashflow => "Cash Flow Statement",
        }
    }

    /// Name used inside statement file names.
    #[must_use]
    pub const fn file_stem(&self) -> &'static str {
        match self {
            Self::Income => "Income_Statement",
            Self::Balance => "Balance_Sheet",
            Self::Cashflow => "Cash_Flow_Statement",
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StatementKind {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(Self::Income),
            "balance" => Ok(Self::Balance),
            "cashflow" | "cash-flow" | "cash_flow" => Ok(Self::Cashflow),
            other => Err(DataError::InvalidParameter(format!(
                "Unknown statement kind: {other}"
            ))),
        }
    }
}

/// Reporting cadence of a statement.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum PeriodVariant {
    /// Annual reporting period.
    #[default]
    Annual,
    /// Quarterly reporting period.
    Quarterly,
}

impl PeriodVariant {
    /// Both variants in refresh order.
    pub const ALL: [Self; 2] = [Self::Annual, Self::Quarterly];

    /// Lowercase variant string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Annual => "annual",
            Self::Quarterly => "quarterly",
        }
    }
}

impl fmt::Display for PeriodVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeriodVariant {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" | "a" | "fy" => Ok(Self::Annual),
            "quarterly" | "q" => Ok(Self::Quarterly),
            other => Err(DataError::InvalidParameter(format!(
                "Unknown period variant: {other}"
            ))),
        }
    }
}

/// Every (kind, variant) pair in refresh order: annual income, balance, cashflow,
/// then the quarterly ones.
pub fn statement_pairs() -> impl Iterator<Item = (StatementKind, PeriodVariant)> {
    PeriodVariant::ALL
        .into_iter()
        .flat_map(|variant| StatementKind::ALL.into_iter().map(move |kind| (kind, variant)))
}

/// Identifies one cached artifact in a session store.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RetrievalKey {
    /// A statement table. Statement entries are scoped to the active ticker, so the
    /// ticker is not part of the key.
    Statement {
        /// Statement kind.
        kind: StatementKind,
        /// Period variant.
        variant: PeriodVariant,
    },
    /// A price table.
    Price {
        /// Ticker the prices belong to.
        ticker: Ticker,
        /// Download period.
        range: HistoryRange,
        /// Bar interval.
        interval: PriceInterval,
    },
}

impl RetrievalKey {
    /// Suffix appended to statement keys.
    pub const STATEMENT_SUFFIX: &'static str = "df_json";

    /// Session-store key string.
    #[must_use]
    pub fn cache_key(&self) -> String {
        match self {
            Self::Statement { kind, variant } => {
                format!("{kind}_{variant}_{}", Self::STATEMENT_SUFFIX)
            }
            Self::Price {
                ticker,
                range,
                interval,
            } => format!("{}{range}_{interval}", Self::ticker_prefix(ticker)),
        }
    }

    /// Prefix shared by every price key of `ticker`.
    #[must_use]
    pub fn ticker_prefix(ticker: &Ticker) -> String {
        format!("{ticker}_")
    }
}

impl fmt::Display for RetrievalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cache_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_normalizes_case_and_whitespace() {
        assert_eq!(Ticker::new(" aapl ").as_str(), "AAPL");
        assert_eq!(Ticker::from("msft").to_string(), "MSFT");
    }

    #[test]
    fn test_ticker_parse_rejects_bad_input() {
        assert!(Ticker::parse("   ").is_err());
        assert!(Ticker::parse("AA PL").is_err());
        assert!(Ticker::parse("AAPL;DROP").is_err());
        assert_eq!(Ticker::parse("brk.b").unwrap().as_str(), "BRK.B");
    }

    #[test]
    fn test_statement_pairs_order() {
        let pairs: Vec<_> = statement_pairs().collect();
        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], (StatementKind::Income, PeriodVariant::Annual));
        assert_eq!(pairs[2], (StatementKind::Cashflow, PeriodVariant::Annual));
        assert_eq!(pairs[3], (StatementKind::Income, PeriodVariant::Quarterly));
    }

    #[test]
    fn test_cache_keys() {
        let statement = RetrievalKey::Statement {
            kind: StatementKind::Income,
            variant: PeriodVariant::Quarterly,
        };
        assert_eq!(statement.cache_key(), "income_quarterly_df_json");

        let price = RetrievalKey::Price {
            ticker: Ticker::new("AAPL"),
            range: HistoryRange::FiveYears,
            interval: PriceInterval::Weekly,
        };
        assert_eq!(price.cache_key(), "AAPL_5y_1wk");
        assert!(price.cache_key().starts_with(&RetrievalKey::ticker_prefix(&Ticker::new("AAPL"))));
    }

    #[test]
    fn test_kind_and_variant_parse() {
        assert_eq!("Cashflow".parse::<StatementKind>().unwrap(), StatementKind::Cashflow);
        assert_eq!("quarterly".parse::<PeriodVariant>().unwrap(), PeriodVariant::Quarterly);
        assert!("weekly".parse::<PeriodVariant>().is_err());
        assert_eq!(StatementKind::Balance.file_stem(), "Balance_Sheet");
    }
}

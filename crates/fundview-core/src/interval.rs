//! Price history period and bar interval.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DataError;

/// Bar interval of a price history.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum PriceInterval {
    /// One bar per trading day.
    #[default]
    #[serde(rename = "1d")]
    Daily,
    /// One bar per week.
    #[serde(rename = "1wk")]
    Weekly,
    /// One bar per month.
    #[serde(rename = "1mo")]
    Monthly,
}

impl PriceInterval {
    /// Interval string as accepted by the price API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "1d",
            Self::Weekly => "1wk",
            Self::Monthly => "1mo",
        }
    }
}

impl fmt::Display for PriceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceInterval {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1d" | "daily" => Ok(Self::Daily),
            "1wk" | "weekly" => Ok(Self::Weekly),
            "1mo" | "monthly" => Ok(Self::Monthly),
            other => Err(DataError::InvalidParameter(format!(
                "Unsupported interval: {other}"
            ))),
        }
    }
}

/// How far back a price history download reaches.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum HistoryRange {
    /// One month.
    #[serde(rename = "1mo")]
    OneMonth,
    /// Three months.
    #[serde(rename = "3mo")]
    ThreeMonths,
    /// Six months.
    #[serde(rename = "6mo")]
    SixMonths,
    /// One year.
    #[serde(rename = "1y")]
    OneYear,
    /// Two years.
    #[serde(rename = "2y")]
    TwoYears,
    /// Five years.
    #[default]
    #[serde(rename = "5y")]
    FiveYears,
    /// Ten years.
    #[serde(rename = "10y")]
    TenYears,
    /// Year to date.
    #[serde(rename = "ytd")]
    YearToDate,
    /// Everything the provider has.
    #[serde(rename = "max")]
    Max,
}

impl HistoryRange {
    /// Every supported range.
    pub const ALL: [Self; 9] = [
        Self::OneMonth,
        Self::ThreeMonths,
        Self::SixMonths,
        Self::OneYear,
        Self::TwoYears,
        Self::FiveYears,
        Self::TenYears,
        Self::YearToDate,
        Self::Max,
    ];

    /// Range string as accepted by the price API.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::OneMonth => "1mo",
            Self::ThreeMonths => "3mo",
            Self::SixMonths => "6mo",
            Self::OneYear => "1y",
            Self::TwoYears => "2y",
            Self::FiveYears => "5y",
            Self::TenYears => "10y",
            Self::YearToDate => "ytd",
            Self::Max => "max",
        }
    }
}

impl fmt::Display for HistoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryRange {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == needle)
            .ok_or_else(|| DataError::InvalidParameter(format!("Unsupported period: {needle}")))
    }
}

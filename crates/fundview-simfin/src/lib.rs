#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/fundview/fundview/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SimFin bulk fundamentals provider.
//!
//! Implements [`FundamentalsProvider`] from `fundview-core`.
//!
//! # Example
//!
//! ```no_run
//! use fundview_simfin::SimFinProvider;
//! use fundview_core::{FundamentalsProvider, PeriodVariant, StatementKind};
//!
//! # async fn example() -> fundview_core::Result<()> {
//! let provider = SimFinProvider::new("free").with_data_dir("data/simfin_data", 30);
//! let dataset = provider
//!     .load_statements(StatementKind::Income, PeriodVariant::Annual, "us")
//!     .await?;
//! if let Some(dataset) = dataset {
//!     println!("Fetched {} rows", dataset.frame.height());
//! }
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use fundview_core::{
    DataError, DataProvider, FundamentalsProvider, PeriodVariant, RawDataset, Result,
    StatementKind, frame::frame_from_text_records,
};
use tracing::{debug, info, warn};

/// SimFin API base URL.
const DEFAULT_BASE_URL: &str = "https://prod.simfin.com";

/// Bulk download endpoint, relative to the base URL.
const BULK_PATH: &str = "/api/bulk-download/s3";

/// Field separator of SimFin CSV files.
const DELIMITER: u8 = b';';

/// Row identity of SimFin statement datasets.
pub const INDEX_COLUMNS: [&str; 2] = ["Ticker", "Report Date"];

/// API key accepted for the public datasets.
pub const FREE_API_KEY: &str = "free";

/// User agent for HTTP requests.
const USER_AGENT: &str = concat!("fundview/", env!("CARGO_PKG_VERSION"));

/// SimFin bulk dataset provider.
pub struct SimFinProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    data_dir: Option<PathBuf>,
    refresh_after: Duration,
}

impl std::fmt::Debug for SimFinProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimFinProvider")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("data_dir", &self.data_dir)
            .field("refresh_after", &self.refresh_after)
            .finish()
    }
}

impl SimFinProvider {
    /// Create a provider for the given API key with no local archive cache.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self::with_client(client, api_key)
    }

    /// Create a provider with a custom HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: None,
            refresh_after: Duration::ZERO,
        }
    }

    /// Point the provider at another server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Keep downloaded archives in `dir` and reuse them for `refresh_days` days.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>, refresh_days: u32) -> Self {
        self.data_dir = Some(dir.into());
        self.refresh_after = Duration::from_secs(u64::from(refresh_days) * 24 * 60 * 60);
        self
    }

    /// Archive file name of one dataset, e.g. `us-income-annual.zip`.
    #[must_use]
    pub fn archive_name(kind: StatementKind, variant: PeriodVariant, market: &str) -> String {
        format!("{market}-{}-{variant}.zip", kind.key())
    }

    fn archive_path(&self, kind: StatementKind, variant: PeriodVariant, market: &str) -> Option<PathBuf> {
        self.data_dir
            .as_ref()
            .map(|dir| dir.join(Self::archive_name(kind, variant, market)))
    }

    /// Reads a cached archive that is younger than the refresh interval.
    fn read_cached_archive(&self, path: &Path) -> Option<Vec<u8>> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age >= self.refresh_after {
            debug!(path = %path.display(), "Cached archive is stale");
            return None;
        }
        match fs::read(path) {
            Ok(bytes) => {
                debug!(path = %path.display(), "Using cached archive");
                Some(bytes)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read cached archive");
                None
            }
        }
    }

    fn write_cached_archive(path: &Path, bytes: &[u8]) {
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|()| fs::write(path, bytes));
        if let Err(e) = written {
            warn!(path = %path.display(), error = %e, "Failed to cache archive");
        }
    }

    /// Downloads one dataset archive. Returns `Ok(None)` when SimFin has no such dataset.
    async fn download(
        &self,
        kind: StatementKind,
        variant: PeriodVariant,
        market: &str,
    ) -> Result<Option<Vec<u8>>> {
        let url = format!("{}{BULK_PATH}", self.base_url);
        info!(dataset = kind.key(), %variant, market, "Downloading SimFin dataset");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("dataset", kind.key()),
                ("variant", variant.as_str()),
                ("market", market),
            ])
            .header("Authorization", format!("api-key {}", self.api_key))
            .send()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(DataError::RateLimited {
                provider: self.name().to_string(),
                retry_after: Some(Duration::from_secs(60)),
            });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(DataError::AuthenticationFailed(self.name().to_string()));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(dataset = kind.key(), %variant, market, "Dataset not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DataError::Network(format!("HTTP {status} for {url}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| DataError::Network(e.to_string()))?;
        Ok(Some(bytes.to_vec()))
    }
}

impl DataProvider for SimFinProvider {
    fn name(&self) -> &str {
        "SimFin"
    }

    fn description(&self) -> &str {
        "SimFin bulk datasets of income, balance sheet and cash flow statements"
    }
}

#[async_trait]
impl FundamentalsProvider for SimFinProvider {
    async fn load_statements(
        &self,
        kind: StatementKind,
        variant: PeriodVariant,
        market: &str,
    ) -> Result<Option<RawDataset>> {
        let cache_path = self.archive_path(kind, variant, market);
        let cached = cache_path
            .as_deref()
            .and_then(|path| self.read_cached_archive(path));

        let bytes = match cached {
            Some(bytes) => bytes,
            None => {
                let Some(bytes) = self.download(kind, variant, market).await? else {
                    return Ok(None);
                };
                if let Some(path) = &cache_path {
                    Self::write_cached_archive(path, &bytes);
                }
                bytes
            }
        };

        parse_bulk_archive(&bytes)
    }
}

/// Parses a bulk download: a zip archive whose first `.csv` entry is the dataset.
///
/// Returns `Ok(None)` when the dataset has no rows.
pub fn parse_bulk_archive(bytes: &[u8]) -> Result<Option<RawDataset>> {
    if !bytes.starts_with(b"PK") {
        return Err(DataError::Parse(
            "SimFin response is not a zip archive".to_string(),
        ));
    }
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| DataError::Parse(e.to_string()))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| DataError::Parse(e.to_string()))?;
        if !entry.name().ends_with(".csv") {
            continue;
        }
        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| DataError::Parse(e.to_string()))?;
        return parse_bulk_csv(&text);
    }

    Err(DataError::Parse("SimFin archive holds no CSV file".to_string()))
}

/// Parses a `;`-separated SimFin dataset.
///
/// Returns `Ok(None)` when the dataset has no rows.
pub fn parse_bulk_csv(text: &str) -> Result<Option<RawDataset>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::Parse(e.to_string()))?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let records = reader
        .records()
        .map(|r| {
            r.map(|record| record.iter().map(str::to_string).collect::<Vec<_>>())
                .map_err(|e| DataError::Parse(e.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    if records.is_empty() {
        return Ok(None);
    }

    let frame = frame_from_text_records(&headers, &records)?;
    let index = INDEX_COLUMNS
        .iter()
        .filter(|name| headers.iter().any(|h| h == *name))
        .map(|name| (*name).to_string())
        .collect();
    debug!(rows = frame.height(), columns = frame.width(), "Parsed SimFin dataset");
    Ok(Some(RawDataset::new(frame, index)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::GET;
    use httpmock::MockServer;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    const INCOME_CSV: &str = "Ticker;SimFinId;Currency;Fiscal Year;Report Date;Revenue;Net Income\n\
        AAPL;111052;USD;2023;2023-09-30;383285000000;96995000000\n\
        AAPL;111052;USD;2022;2022-09-30;394328000000;99803000000\n\
        MSFT;59265;USD;2023;2023-06-30;211915000000;\n";

    fn bulk_zip(name: &str, csv: &str) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut buf);
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(csv.as_bytes()).unwrap();
            zip.finish().unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn test_debug_hides_api_key() {
        let provider = SimFinProvider::new("secret-key");
        let debug = format!("{provider:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_parse_bulk_csv() {
        let dataset = parse_bulk_csv(INCOME_CSV).unwrap().unwrap();
        assert_eq!(dataset.index, vec!["Ticker", "Report Date"]);
        assert_eq!(dataset.frame.height(), 3);
        assert_eq!(dataset.frame.width(), 7);
    }

    #[test]
    fn test_parse_header_only_is_none() {
        assert!(parse_bulk_csv("Ticker;Report Date;Revenue\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_rejects_non_zip() {
        assert!(matches!(
            parse_bulk_archive(b"<html>maintenance</html>"),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(
            SimFinProvider::archive_name(StatementKind::Cashflow, PeriodVariant::Quarterly, "us"),
            "us-cashflow-quarterly.zip"
        );
    }

    #[tokio::test]
    async fn test_load_statements_downloads_archive() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/bulk-download/s3")
                .query_param("dataset", "income")
                .query_param("variant", "annual")
                .query_param("market", "us")
                .header("Authorization", "api-key free");
            then.status(200)
                .header("content-type", "application/zip")
                .body(bulk_zip("us-income-annual.csv", INCOME_CSV));
        });

        let provider = SimFinProvider::new(FREE_API_KEY).with_base_url(server.base_url());
        let dataset = provider
            .load_statements(StatementKind::Income, PeriodVariant::Annual, "us")
            .await
            .unwrap()
            .unwrap();

        mock.assert();
        assert_eq!(dataset.frame.height(), 3);
    }

    #[tokio::test]
    async fn test_archive_cache_avoids_second_download() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/bulk-download/s3");
            then.status(200)
                .body(bulk_zip("us-balance-quarterly.csv", INCOME_CSV));
        });
        let dir = tempfile::tempdir().unwrap();

        let provider = SimFinProvider::new(FREE_API_KEY)
            .with_base_url(server.base_url())
            .with_data_dir(dir.path(), 30);
        for _ in 0..2 {
            let dataset = provider
                .load_statements(StatementKind::Balance, PeriodVariant::Quarterly, "us")
                .await
                .unwrap();
            assert!(dataset.is_some());
        }

        mock.assert_hits(1);
        assert!(dir.path().join("us-balance-quarterly.zip").is_file());
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).query_param("dataset", "income");
            then.status(404);
        });
        server.mock(|when, then| {
            when.method(GET).query_param("dataset", "balance");
            then.status(429);
        });
        server.mock(|when, then| {
            when.method(GET).query_param("dataset", "cashflow");
            then.status(401);
        });

        let provider = SimFinProvider::new("bad-key").with_base_url(server.base_url());
        let load = |kind| provider.load_statements(kind, PeriodVariant::Annual, "us");

        assert!(load(StatementKind::Income).await.unwrap().is_none());
        assert!(matches!(
            load(StatementKind::Balance).await,
            Err(DataError::RateLimited { .. })
        ));
        assert!(matches!(
            load(StatementKind::Cashflow).await,
            Err(DataError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_provider_info() {
        let provider = SimFinProvider::new(FREE_API_KEY);
        assert_eq!(provider.name(), "SimFin");
    }
}

//! Flat-file statement storage.
//!
//! Each (ticker, kind, variant) maps to one CSV file:
//! `{base}/{TICKER}/{TICKER}_{Income_Statement|Balance_Sheet|Cash_Flow_Statement}_{variant}.csv`.
//! The first CSV column is the report date; saving overwrites the whole file.

use fundview_core::{
    DATE_COLUMN, DataError, PeriodVariant, Result, StatementError, StatementKind, Ticker,
    frame::{self, Cell, RowOrder},
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

/// What happened to one statement during a save.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaveStatus {
    /// The table was written.
    Saved {
        /// The file written.
        file: PathBuf,
    },
    /// The fetch had failed, so nothing was written.
    DownloadError {
        /// Detail of the fetch failure.
        details: String,
    },
    /// The fetch produced an empty table, so nothing was written.
    NoData,
    /// Writing the file failed.
    WriteFailed {
        /// Underlying cause.
        reason: String,
    },
}

impl SaveStatus {
    /// Returns true when a file was written.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        matches!(self, Self::Saved { .. })
    }
}

impl fmt::Display for SaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saved { file } => write!(f, "Saved: {}", file.display()),
            Self::DownloadError { details } => write!(f, "Download Error: {details}"),
            Self::NoData => f.write_str("No data or empty data."),
            Self::WriteFailed { reason } => write!(f, "Error saving CSV: {reason}"),
        }
    }
}

/// Result of reading a statement file.
#[derive(Clone, Debug)]
pub enum StoredTable {
    /// No file for the key.
    Missing,
    /// The file exists but no row has a parseable date.
    Empty,
    /// The table, sorted ascending by date.
    Loaded(DataFrame),
}

/// Statement tables stored as CSV files under one base directory.
#[derive(Clone, Debug)]
pub struct CsvStatementStore {
    base_dir: PathBuf,
}

impl CsvStatementStore {
    /// Creates a store rooted at `base_dir`. Nothing is created until the first write.
    #[must_use]
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// The base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding the files of `ticker`.
    #[must_use]
    pub fn ticker_dir(&self, ticker: &Ticker) -> PathBuf {
        self.base_dir.join(ticker.as_str())
    }

    /// File name of one statement.
    #[must_use]
    pub fn file_name(ticker: &Ticker, kind: StatementKind, variant: PeriodVariant) -> String {
        format!("{ticker}_{}_{variant}.csv", kind.file_stem())
    }

    /// Full path of one statement file.
    #[must_use]
    pub fn file_path(&self, ticker: &Ticker, kind: StatementKind, variant: PeriodVariant) -> PathBuf {
        self.ticker_dir(ticker)
            .join(Self::file_name(ticker, kind, variant))
    }

    /// Creates the ticker directory.
    ///
    /// # Errors
    /// Returns [`DataError::Io`] when the directory cannot be created.
    #[instrument(skip(self), fields(ticker = %ticker))]
    pub fn prepare(&self, ticker: &Ticker) -> Result<PathBuf> {
        let dir = self.ticker_dir(ticker);
        fs::create_dir_all(&dir).map_err(|e| DataError::io(&dir, e))?;
        debug!(dir = %dir.display(), "Prepared ticker directory");
        Ok(dir)
    }

    /// Persists the outcome of one statement fetch.
    ///
    /// Failed fetches and empty tables leave any existing file untouched.
    #[instrument(skip(self, outcome), fields(ticker = %ticker, kind = %kind, variant = %variant))]
    pub fn save(
        &self,
        ticker: &Ticker,
        kind: StatementKind,
        variant: PeriodVariant,
        outcome: &std::result::Result<DataFrame, StatementError>,
    ) -> SaveStatus {
        let table = match outcome {
            Ok(table) => table,
            Err(e) => {
                return SaveStatus::DownloadError {
                    details: e.to_string(),
                };
            }
        };
        if table.height() == 0 {
            return SaveStatus::NoData;
        }

        let path = self.file_path(ticker, kind, variant);
        match self
            .prepare(ticker)
            .and_then(|_| write_table(&path, table))
        {
            Ok(()) => {
                debug!(file = %path.display(), rows = table.height(), "Saved statement");
                SaveStatus::Saved { file: path }
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Failed to save statement");
                SaveStatus::WriteFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Reads one statement file.
    ///
    /// Rows whose date cannot be parsed are dropped; the result is sorted ascending.
    ///
    /// # Errors
    /// Returns [`DataError::Io`] when the file exists but cannot be read or parsed.
    #[instrument(skip(self), fields(ticker = %ticker, kind = %kind, variant = %variant))]
    pub fn load(
        &self,
        ticker: &Ticker,
        kind: StatementKind,
        variant: PeriodVariant,
    ) -> Result<StoredTable> {
        let path = self.file_path(ticker, kind, variant);
        if !path.is_file() {
            debug!(file = %path.display(), "No statement file");
            return Ok(StoredTable::Missing);
        }

        let table = read_table(&path)?;
        if table.height() == 0 {
            debug!(file = %path.display(), "Statement file is empty");
            return Ok(StoredTable::Empty);
        }
        debug!(file = %path.display(), rows = table.height(), "Loaded statement");
        Ok(StoredTable::Loaded(table))
    }
}

fn write_table(path: &Path, table: &DataFrame) -> Result<()> {
    let dates = frame::table_dates(table)?;
    let mut headers = vec![DATE_COLUMN.to_string()];
    let mut columns = Vec::with_capacity(table.width());
    for column in table.get_columns() {
        if column.name().as_str() == DATE_COLUMN {
            continue;
        }
        headers.push(column.name().to_string());
        columns.push(frame::column_cells(column)?);
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| DataError::io(path, e))?;
    writer
        .write_record(&headers)
        .map_err(|e| DataError::io(path, e))?;
    for (i, date) in dates.iter().enumerate() {
        let mut record = Vec::with_capacity(headers.len());
        record.push(date.map(|d| d.to_string()).unwrap_or_default());
        record.extend(columns.iter().map(|cells| match &cells[i] {
            Cell::Null => String::new(),
            Cell::Number(v) => v.to_string(),
            Cell::Text(s) => s.clone(),
        }));
        writer
            .write_record(&record)
            .map_err(|e| DataError::io(path, e))?;
    }
    writer.flush().map_err(|e| DataError::io(path, e))?;
    Ok(())
}

fn read_table(path: &Path) -> Result<DataFrame> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)
        .map_err(|e| DataError::io(path, e))?;
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::io(path, e))?
        .iter()
        .map(str::to_string)
        .collect();
    let records = reader
        .records()
        .map(|r| {
            r.map(|record| record.iter().map(str::to_string).collect::<Vec<_>>())
                .map_err(|e| DataError::io(path, e))
        })
        .collect::<Result<Vec<_>>>()?;
    frame::table_from_text_records(&headers, &records, RowOrder::Ascending)
        .map_err(|e| DataError::io(path, e))
}

//! The uniform answer returned to callers.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::RetrievalError;

/// Where a returned table came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSource {
    /// The session store.
    Session,
    /// A statement file on disk.
    Disk,
    /// A remote provider.
    Remote,
}

impl fmt::Display for TableSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Session => "session",
            Self::Disk => "disk",
            Self::Remote => "remote",
        })
    }
}

/// Table, error and informational message of one retrieval.
///
/// A success carries a table and an info message. A hard failure carries an error and no
/// table. Info notes collected while falling through a layer (e.g. an empty file) are kept
/// on failures too.
#[derive(Clone, Debug, Default)]
pub struct RetrievalResult {
    /// The retrieved table.
    pub table: Option<DataFrame>,
    /// Why no table could be returned.
    pub error: Option<RetrievalError>,
    /// Human-readable note about where the table came from.
    pub info: Option<String>,
    /// Layer that produced the table.
    pub source: Option<TableSource>,
}

impl RetrievalResult {
    /// A table served from `source`.
    #[must_use]
    pub fn found(table: DataFrame, source: TableSource, info: impl Into<String>) -> Self {
        Self {
            table: Some(table),
            error: None,
            info: Some(info.into()),
            source: Some(source),
        }
    }

    /// A failure with no table.
    #[must_use]
    pub fn failed(error: RetrievalError, info: Option<String>) -> Self {
        Self {
            table: None,
            error: Some(error),
            info,
            source: None,
        }
    }

    /// Returns true when a table is present.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.table.is_some()
    }
}

//! SimFin API key file handling.

use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use fundview_core::{DataError, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DEFAULT_API_KEY;

/// State of the API key file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyStatus {
    /// No key file, or an empty one.
    Missing,
    /// The key file holds the public `free` key.
    Free,
    /// The key file holds a personal key.
    Custom,
}

impl fmt::Display for ApiKeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Missing => "No API key configured, using the free key",
            Self::Free => "Using the free API key",
            Self::Custom => "Using a custom API key",
        })
    }
}

fn read_key(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text.trim().to_string()).filter(|k| !k.is_empty()),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Could not read API key file");
            None
        }
    }
}

/// Returns the key stored in `path`, else `default_key`, else `free`.
#[must_use]
pub fn load_api_key(path: &Path, default_key: &str) -> String {
    read_key(path).unwrap_or_else(|| {
        let fallback = default_key.trim();
        if fallback.is_empty() {
            DEFAULT_API_KEY.to_string()
        } else {
            fallback.to_string()
        }
    })
}

/// Classifies the key stored in `path`.
#[must_use]
pub fn api_key_status(path: &Path) -> ApiKeyStatus {
    match read_key(path) {
        None => ApiKeyStatus::Missing,
        Some(key) if key.eq_ignore_ascii_case(DEFAULT_API_KEY) => ApiKeyStatus::Free,
        Some(_) => ApiKeyStatus::Custom,
    }
}

/// Writes `key` to `path`, or removes the file when `key` is `None` or blank.
///
/// # Errors
/// Returns [`DataError::Io`] when the file or its directory cannot be written or removed.
pub fn update_api_key(path: &Path, key: Option<&str>) -> Result<ApiKeyStatus> {
    match key.map(str::trim).filter(|k| !k.is_empty()) {
        Some(key) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
            }
            fs::write(path, key).map_err(|e| DataError::io(path, e))?;
            info!(path = %path.display(), "Stored API key");
        }
        None => match fs::remove_file(path) {
            Ok(()) => info!(path = %path.display(), "Removed API key"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(DataError::io(path, e)),
        },
    }
    Ok(api_key_status(path))
}

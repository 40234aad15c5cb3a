//! Configuration file and path resolution.
//!
//! The configuration is a TOML file with four sections (`api`, `paths`, `fetch`, `prices`).
//! A missing file is created with the defaults below. Lookups never fail: an absent or
//! malformed value falls back to its default.
//!
//! ```toml
//! [api]
//! api_key_file = "config/simfin_api_key.txt"
//! default_key = "free"
//!
//! [paths]
//! simfin_data_directory = "data/simfin_data"
//! processed_data_directory = "data"
//!
//! [fetch]
//! market = "us"
//! request_delay_ms = 500
//! refresh_days = 30
//!
//! [prices]
//! default_period = "5y"
//! default_interval = "1d"
//! moving_averages = [20, 50, 100, 150, 200]
//! ```

use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use fundview_core::{DataError, HistoryRange, PriceInterval, Result};
use toml::{Table, Value};
use tracing::{debug, info, warn};

/// Default location of the configuration file, relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Default API key file.
pub const DEFAULT_API_KEY_FILE: &str = "config/simfin_api_key.txt";
/// Key used when no key file is present.
pub const DEFAULT_API_KEY: &str = "free";
/// Default SimFin archive directory.
pub const DEFAULT_SIMFIN_DIRECTORY: &str = "data/simfin_data";
/// Default statement directory.
pub const DEFAULT_DATA_DIRECTORY: &str = "data";
/// Default SimFin market.
pub const DEFAULT_MARKET: &str = "us";
/// Default pause before each statement request.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 500;
/// Default age after which SimFin archives are downloaded again.
pub const DEFAULT_REFRESH_DAYS: u32 = 30;
/// Default moving-average windows of price tables.
pub const DEFAULT_MOVING_AVERAGES: [usize; 5] = [20, 50, 100, 150, 200];

/// The default configuration.
#[must_use]
pub fn default_config() -> Table {
    let section = |entries: Vec<(&str, Value)>| -> Value {
        Value::Table(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    };

    let mut table = Table::new();
    table.insert(
        "api".into(),
        section(vec![
            ("api_key_file", DEFAULT_API_KEY_FILE.into()),
            ("default_key", DEFAULT_API_KEY.into()),
        ]),
    );
    table.insert(
        "paths".into(),
        section(vec![
            ("simfin_data_directory", DEFAULT_SIMFIN_DIRECTORY.into()),
            ("processed_data_directory", DEFAULT_DATA_DIRECTORY.into()),
        ]),
    );
    table.insert(
        "fetch".into(),
        section(vec![
            ("market", DEFAULT_MARKET.into()),
            ("request_delay_ms", Value::Integer(DEFAULT_REQUEST_DELAY_MS as i64)),
            ("refresh_days", Value::Integer(i64::from(DEFAULT_REFRESH_DAYS))),
        ]),
    );
    table.insert(
        "prices".into(),
        section(vec![
            ("default_period", HistoryRange::default().as_str().into()),
            ("default_interval", PriceInterval::default().as_str().into()),
            (
                "moving_averages",
                Value::Array(
                    DEFAULT_MOVING_AVERAGES
                        .iter()
                        .map(|w| Value::Integer(*w as i64))
                        .collect(),
                ),
            ),
        ]),
    );
    table
}

/// A loaded configuration file.
#[derive(Clone, Debug)]
pub struct ConfigLoader {
    path: PathBuf,
    table: Table,
}

impl ConfigLoader {
    /// Loads the file at `path`, creating it with [`default_config`] when absent.
    ///
    /// Failing to write the default file is logged and the defaults are used in memory.
    ///
    /// # Errors
    /// Returns an error when an existing file cannot be read or is not valid TOML.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let loader = Self {
                path,
                table: default_config(),
            };
            match loader.save() {
                Ok(()) => info!(path = %loader.path.display(), "Created default configuration"),
                Err(e) => warn!(error = %e, "Could not write default configuration"),
            }
            return Ok(loader);
        }

        let text = fs::read_to_string(&path).map_err(|e| DataError::io(&path, e))?;
        let table = text
            .parse::<Table>()
            .map_err(|e| DataError::Config(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), "Loaded configuration");
        Ok(Self { path, table })
    }

    /// Wraps an in-memory table; nothing is read or written.
    #[must_use]
    pub fn from_table(path: impl Into<PathBuf>, table: Table) -> Self {
        Self {
            path: path.into(),
            table,
        }
    }

    /// The file this configuration belongs to.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The raw value of `section.key`.
    #[must_use]
    pub fn value(&self, section: &str, key: &str) -> Option<&Value> {
        self.table.get(section)?.as_table()?.get(key)
    }

    /// The value of `section.key` as a string. Scalars other than strings are rendered.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<String> {
        match self.value(section, key)? {
            Value::String(s) => Some(s.clone()),
            Value::Array(_) | Value::Table(_) => None,
            other => Some(other.to_string()),
        }
    }

    /// Sets `section.key`, creating the section if needed.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<Value>) {
        let entry = self
            .table
            .entry(section.to_string())
            .or_insert_with(|| Value::Table(Table::new()));
        if !entry.is_table() {
            *entry = Value::Table(Table::new());
        }
        if let Value::Table(t) = entry {
            t.insert(key.to_string(), value.into());
        }
    }

    /// Writes the configuration back to its file.
    ///
    /// # Errors
    /// Returns an error when the file or its directory cannot be written.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| DataError::io(parent, e))?;
        }
        let text =
            toml::to_string_pretty(&self.table).map_err(|e| DataError::Config(e.to_string()))?;
        fs::write(&self.path, text).map_err(|e| DataError::io(&self.path, e))
    }
}

/// Resolves configured paths against a project root and exposes typed settings.
#[derive(Clone, Debug)]
pub struct PathResolver {
    config: ConfigLoader,
    root: PathBuf,
}

impl PathResolver {
    /// Creates a resolver anchored at `root`.
    #[must_use]
    pub fn new(config: ConfigLoader, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    /// Loads `config/config.toml` under `root`, creating it if needed.
    ///
    /// # Errors
    /// Returns an error when an existing configuration cannot be read.
    pub fn from_root(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let config = ConfigLoader::load(root.join(DEFAULT_CONFIG_PATH))?;
        Ok(Self::new(config, root))
    }

    /// The loaded configuration.
    #[must_use]
    pub fn config(&self) -> &ConfigLoader {
        &self.config
    }

    /// The project root relative paths are joined to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `section.key` to a path, or `fallback` when the key is absent or empty.
    ///
    /// Relative results are joined to the project root. Returns `None` only when neither a
    /// configured value nor a fallback exists.
    #[must_use]
    pub fn resolve(&self, section: &str, key: &str, fallback: Option<&str>) -> Option<PathBuf> {
        let raw = self
            .config
            .get(section, key)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| fallback.map(str::to_string))?;
        let path = PathBuf::from(raw.trim());
        Some(if path.is_absolute() {
            path
        } else {
            self.root.join(path)
        })
    }

    fn resolve_or(&self, section: &str, key: &str, fallback: &str) -> PathBuf {
        self.resolve(section, key, Some(fallback))
            .unwrap_or_else(|| self.root.join(fallback))
    }

    /// Directory holding the per-ticker statement files.
    #[must_use]
    pub fn data_directory(&self) -> PathBuf {
        self.resolve_or("paths", "processed_data_directory", DEFAULT_DATA_DIRECTORY)
    }

    /// Directory holding downloaded SimFin archives.
    #[must_use]
    pub fn simfin_directory(&self) -> PathBuf {
        self.resolve_or("paths", "simfin_data_directory", DEFAULT_SIMFIN_DIRECTORY)
    }

    /// File holding the SimFin API key.
    #[must_use]
    pub fn api_key_file(&self) -> PathBuf {
        self.resolve_or("api", "api_key_file", DEFAULT_API_KEY_FILE)
    }

    /// Key used when the key file is absent or empty.
    #[must_use]
    pub fn default_api_key(&self) -> String {
        self.config
            .get("api", "default_key")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string())
    }

    /// SimFin market of the statement datasets.
    #[must_use]
    pub fn market(&self) -> String {
        self.config
            .get("fetch", "market")
            .map(|m| m.trim().to_lowercase())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MARKET.to_string())
    }

    /// Pause before each statement request.
    #[must_use]
    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.parsed("fetch", "request_delay_ms", DEFAULT_REQUEST_DELAY_MS))
    }

    /// Age in days after which SimFin archives are downloaded again.
    #[must_use]
    pub fn refresh_days(&self) -> u32 {
        self.parsed("fetch", "refresh_days", DEFAULT_REFRESH_DAYS)
    }

    /// Price download period used when the caller gives none.
    #[must_use]
    pub fn default_period(&self) -> HistoryRange {
        self.parsed("prices", "default_period", HistoryRange::default())
    }

    /// Price interval used when the caller gives none.
    #[must_use]
    pub fn default_interval(&self) -> PriceInterval {
        self.parsed("prices", "default_interval", PriceInterval::default())
    }

    /// Moving-average windows added to price tables.
    #[must_use]
    pub fn moving_averages(&self) -> Vec<usize> {
        let Some(value) = self.config.value("prices", "moving_averages") else {
            return DEFAULT_MOVING_AVERAGES.to_vec();
        };
        let windows: Option<Vec<usize>> = value.as_array().and_then(|items| {
            items
                .iter()
                .map(|v| v.as_integer().and_then(|w| usize::try_from(w).ok()).filter(|w| *w > 0))
                .collect()
        });
        windows.unwrap_or_else(|| {
            warn!(value = %value, "Malformed prices.moving_averages, using defaults");
            DEFAULT_MOVING_AVERAGES.to_vec()
        })
    }

    fn parsed<T>(&self, section: &str, key: &str, default: T) -> T
    where
        T: FromStr,
        T::Err: Display,
    {
        match self.config.get(section, key) {
            None => default,
            Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
                warn!(section, key, value = %raw, error = %e, "Malformed setting, using default");
                default
            }),
        }
    }
}

//! SQLite-backed session store.

use async_trait::async_trait;
use chrono::Utc;
use fundview_core::{DataError, Result, SessionStore};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Session store persisted in a SQLite database.
///
/// Several sessions can share one database file; every row is scoped by the session id the
/// store was opened with, so `clear` and `invalidate_prefix` only touch that session.
#[derive(Debug)]
pub struct SqliteSessionStore {
    conn: Mutex<Connection>,
    session_id: String,
}

impl SqliteSessionStore {
    /// Open (or create) a store at the given path for `session_id`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>, session_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DataError::Cache(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
            session_id: session_id.into(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory(session_id: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DataError::Cache(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
            session_id: session_id.into(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// The session this store reads and writes.
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_cache (
                session_id TEXT NOT NULL,
                key TEXT NOT NULL,
                payload TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (session_id, key)
            )",
            [],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self), fields(session = %self.session_id))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM session_cache WHERE session_id = ?1 AND key = ?2",
                params![self.session_id, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        if payload.is_some() {
            debug!("Session hit");
        } else {
            debug!("Session miss");
        }
        Ok(payload)
    }

    #[instrument(skip(self, payload), fields(session = %self.session_id, bytes = payload.len()))]
    async fn put(&self, key: &str, payload: String) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO session_cache (session_id, key, payload, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![self.session_id, key, payload, cached_at],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        debug!("Stored session entry");
        Ok(())
    }

    #[instrument(skip(self), fields(session = %self.session_id))]
    async fn remove(&self, key: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "DELETE FROM session_cache WHERE session_id = ?1 AND key = ?2",
            params![self.session_id, key],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self), fields(session = %self.session_id))]
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        // substr instead of LIKE: tickers may contain LIKE wildcards such as '_'.
        let deleted = conn
            .execute(
                "DELETE FROM session_cache
                 WHERE session_id = ?1 AND substr(key, 1, length(?2)) = ?2",
                params![self.session_id, prefix],
            )
            .map_err(|e| DataError::Cache(e.to_string()))?;

        if deleted > 0 {
            debug!("Invalidated {} session entries", deleted);
        }
        Ok(deleted)
    }

    #[instrument(skip(self), fields(session = %self.session_id))]
    async fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "DELETE FROM session_cache WHERE session_id = ?1",
            params![self.session_id],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;
        debug!("Cleared all session entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_store_initialization() {
        let store = SqliteSessionStore::in_memory("s1");
        assert!(store.is_ok());
        assert_eq!(store.unwrap().session_id(), "s1");
    }

    #[tokio::test]
    async fn test_sqlite_store_get_put_remove() {
        let store = SqliteSessionStore::in_memory("s1").unwrap();

        assert!(store.get("current_ticker").await.unwrap().is_none());
        store.put("current_ticker", "AAPL".to_string()).await.unwrap();
        store.put("current_ticker", "MSFT".to_string()).await.unwrap();
        assert_eq!(
            store.get("current_ticker").await.unwrap().as_deref(),
            Some("MSFT")
        );

        store.remove("current_ticker").await.unwrap();
        assert!(store.get("current_ticker").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_prefix_is_literal() {
        let store = SqliteSessionStore::in_memory("s1").unwrap();
        for key in ["AAPL_5y_1d", "AAPL_1y_1wk", "AAPLX_5y_1d"] {
            store.put(key, "x".to_string()).await.unwrap();
        }

        assert_eq!(store.invalidate_prefix("AAPL_").await.unwrap(), 2);
        assert!(store.get("AAPLX_5y_1d").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sqlite_store_sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");

        let alice = SqliteSessionStore::new(&path, "alice").unwrap();
        let bob = SqliteSessionStore::new(&path, "bob").unwrap();

        alice.put("current_ticker", "AAPL".to_string()).await.unwrap();
        bob.put("current_ticker", "MSFT".to_string()).await.unwrap();

        alice.clear().await.unwrap();
        assert!(alice.get("current_ticker").await.unwrap().is_none());
        assert_eq!(
            bob.get("current_ticker").await.unwrap().as_deref(),
            Some("MSFT")
        );
    }
}

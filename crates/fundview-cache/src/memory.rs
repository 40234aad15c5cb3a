//! In-memory session store.

use async_trait::async_trait;
use chrono::Utc;
use fundview_core::{Result, SessionStore};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Session entry with the time it was written.
#[derive(Debug, Clone)]
struct SessionEntry {
    payload: String,
    stored_at: chrono::DateTime<Utc>,
}

impl SessionEntry {
    fn new(payload: String) -> Self {
        Self {
            payload,
            stored_at: Utc::now(),
        }
    }
}

/// Session store backed by a `RwLock`-protected `HashMap`.
///
/// Entries live as long as the store does. Payloads are cloned on `get`.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: RwLock<HashMap<String, SessionEntry>>,
}

impl InMemorySessionStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Stored keys, sorted.
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        match entries.get(key) {
            Some(entry) => {
                debug!(stored_at = %entry.stored_at, "Session hit");
                Ok(Some(entry.payload.clone()))
            }
            None => {
                debug!("Session miss");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    async fn put(&self, key: &str, payload: String) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), SessionEntry::new(payload));
        debug!("Stored session entry");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, key: &str) -> Result<()> {
        if self.entries.write().await.remove(key).is_some() {
            debug!("Removed session entry");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Invalidated {} session entries", removed);
        }
        Ok(removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        debug!("Cleared all session entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_get_put() {
        let store = InMemorySessionStore::new();

        // Initially no data
        assert!(store.get("income_annual_df_json").await.unwrap().is_none());

        store
            .put("income_annual_df_json", "{}".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("income_annual_df_json").await.unwrap().as_deref(),
            Some("{}")
        );

        // Overwrite replaces
        store
            .put("income_annual_df_json", "[]".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get("income_annual_df_json").await.unwrap().as_deref(),
            Some("[]")
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_invalidate_prefix() {
        let store = InMemorySessionStore::new();
        for key in ["AAPL_5y_1d", "AAPL_1y_1wk", "AAPLX_5y_1d", "MSFT_5y_1d"] {
            store.put(key, "x".to_string()).await.unwrap();
        }

        let removed = store.invalidate_prefix("AAPL_").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.keys().await, vec!["AAPLX_5y_1d", "MSFT_5y_1d"]);
    }

    #[tokio::test]
    async fn test_memory_store_remove_and_clear() {
        let store = InMemorySessionStore::new();
        store.put("a", "1".to_string()).await.unwrap();
        store.put("b", "2".to_string()).await.unwrap();

        store.remove("a").await.unwrap();
        // Removing twice is fine
        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());

        store.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}

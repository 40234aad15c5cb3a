//! No-op session store.

use async_trait::async_trait;
use fundview_core::{Result, SessionStore};
use tracing::trace;

/// A session store that doesn't store anything.
///
/// `get` always returns `Ok(None)` and every write succeeds. Useful for disabling session
/// caching so each retrieval goes to disk or the network.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSessionStore;

impl NoopSessionStore {
    /// Create a new no-op store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionStore for NoopSessionStore {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        trace!("NoopSessionStore: get called, returning None");
        Ok(None)
    }

    async fn put(&self, _key: &str, _payload: String) -> Result<()> {
        trace!("NoopSessionStore: put called, doing nothing");
        Ok(())
    }

    async fn remove(&self, _key: &str) -> Result<()> {
        trace!("NoopSessionStore: remove called, doing nothing");
        Ok(())
    }

    async fn invalidate_prefix(&self, _prefix: &str) -> Result<usize> {
        trace!("NoopSessionStore: invalidate_prefix called, returning 0");
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        trace!("NoopSessionStore: clear called, doing nothing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_store_forgets_everything() {
        let store = NoopSessionStore::new();
        store.put("current_ticker", "AAPL".to_string()).await.unwrap();
        assert!(store.get("current_ticker").await.unwrap().is_none());
        assert_eq!(store.invalidate_prefix("AAPL_").await.unwrap(), 0);
        assert!(store.remove("current_ticker").await.is_ok());
        assert!(store.clear().await.is_ok());
    }
}

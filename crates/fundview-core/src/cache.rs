//! Session store trait.
//!
//! A session store is a string key-value map scoped to one user session. Values are opaque
//! payloads (serialized tables, the active ticker, the last refresh report); decoding them is
//! the caller's concern.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value storage for one user session.
///
/// Entries never expire on their own; they are replaced, removed by key or prefix, or
/// cleared together.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Returns the payload stored under `key`, or `Ok(None)` if absent.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `payload` under `key`, replacing any previous value.
    async fn put(&self, key: &str, payload: String) -> Result<()>;

    /// Removes the entry under `key`. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Removes every entry whose key starts with `prefix`.
    ///
    /// Returns the number of entries removed.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize>;

    /// Removes every entry.
    async fn clear(&self) -> Result<()>;
}

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/fundview/fundview/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Storage implementations for fundview.
//!
//! This crate provides implementations of the [`SessionStore`] trait from `fundview-core`:
//!
//! - [`SqliteSessionStore`] - Persistent SQLite-backed store (requires `sqlite` feature)
//! - [`InMemorySessionStore`] - In-memory store
//! - [`NoopSessionStore`] - Store that doesn't keep anything
//!
//! and the [`CsvStatementStore`] that persists statement tables on disk.

/// Flat-file statement storage.
pub mod csv_store;
/// In-memory session store.
pub mod memory;
/// No-op session store.
pub mod noop;

/// SQLite-backed session store.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use fundview_core::SessionStore;

pub use csv_store::{CsvStatementStore, SaveStatus, StoredTable};
pub use memory::InMemorySessionStore;
pub use noop::NoopSessionStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;

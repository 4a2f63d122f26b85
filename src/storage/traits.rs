//! Storage traits and error types
//!
//! This module defines the trait interface for record store backends and
//! associated error types.

use crate::storage::{InfoFilter, Item};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    #[error("Stored info for item {id} is not valid JSON: {source}")]
    CorruptInfo {
        id: i64,
        source: serde_json::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[cfg(feature = "postgres")]
    #[error("Postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for record store backends
///
/// Every write method commits as one unit: either all of its rows become
/// visible or none do. URLs are unique; inserting a URL that already exists
/// keeps the existing row untouched, whatever info the new call carries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts each URL with absent info, skipping URLs already stored
    ///
    /// # Returns
    ///
    /// The number of rows actually created
    async fn upsert_urls(&self, urls: &[String]) -> StorageResult<u64>;

    /// Inserts URL+info pairs; the first write of a URL wins
    ///
    /// # Returns
    ///
    /// The number of rows actually created
    async fn upsert_url_info_pairs(&self, pairs: &[(String, Value)]) -> StorageResult<u64>;

    /// Writes one page's discoveries in a single transaction
    ///
    /// Bare URLs go in first, then URL+info pairs, with the same first-write-wins
    /// rule as the two calls above. If any row fails, nothing from the page is
    /// kept.
    ///
    /// # Returns
    ///
    /// The number of rows actually created
    async fn persist_page(&self, urls: &[String], pairs: &[(String, Value)]) -> StorageResult<u64>;

    /// Snapshot of items in insertion order, partitioned by info presence
    async fn items_by_enrichment_state(&self, filter: InfoFilter) -> StorageResult<Vec<Item>>;

    /// Overwrites the info of one item
    async fn set_info(&self, id: i64, info: &Value) -> StorageResult<()>;

    /// Gets one item by ID
    async fn item(&self, id: i64) -> StorageResult<Option<Item>>;

    /// Counts items matching the filter
    async fn count(&self, filter: InfoFilter) -> StorageResult<u64>;

    /// Deletes every item in the table
    ///
    /// Administrative only; no engine pass calls this.
    async fn clear(&self) -> StorageResult<u64>;

    /// Short backend name for diagnostics
    fn backend_name(&self) -> &'static str;
}

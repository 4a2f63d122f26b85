//! Storage module for persisting scraped items
//!
//! This module handles all database operations for the scraper, including:
//! - Table initialization for the embedded and client-server backends
//! - Deduplicated inserts keyed by URL
//! - Snapshots filtered by whether an item carries info
//! - Point updates of an item's info

#[cfg(feature = "postgres")]
mod postgres;
mod schema;
mod sqlite;
mod traits;

#[cfg(feature = "postgres")]
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use traits::{RecordStore, StorageError, StorageResult};

use crate::config::DatabaseConfig;
use crate::ScrapeError;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;

/// One persisted record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    /// Store-assigned identity, increasing in creation order
    pub id: i64,

    /// Dedup key
    pub url: String,

    /// Enrichment payload; absent until an enrichment pass succeeds
    pub info: Option<Value>,
}

impl Item {
    pub fn has_info(&self) -> bool {
        self.info.is_some()
    }
}

/// Which items a snapshot should contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InfoFilter {
    All,
    WithInfo,
    WithoutInfo,
}

impl InfoFilter {
    /// SQL predicate selecting this partition
    pub(crate) fn where_clause(&self) -> &'static str {
        match self {
            Self::All => "",
            Self::WithInfo => " WHERE info IS NOT NULL",
            Self::WithoutInfo => " WHERE info IS NULL",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "all" => Some(Self::All),
            "with-info" => Some(Self::WithInfo),
            "without-info" => Some(Self::WithoutInfo),
            _ => None,
        }
    }
}

/// Opens the record store selected by the configuration
///
/// # Returns
///
/// * `Ok(Box<dyn RecordStore>)` - Store ready for use, table created if missing
/// * `Err(ScrapeError::UnsupportedBackend)` - Unknown or compiled-out backend
pub async fn open_store(config: &DatabaseConfig) -> Result<Box<dyn RecordStore>, ScrapeError> {
    match config.backend.as_str() {
        "sqlite" => {
            let path = config.path.as_deref().ok_or_else(|| {
                ScrapeError::UnsupportedBackend("sqlite backend requires a path".to_string())
            })?;
            let store = SqliteStore::open(Path::new(path), &config.table)?;
            Ok(Box::new(store))
        }
        #[cfg(feature = "postgres")]
        "postgres" => {
            let url = config.url.as_deref().ok_or_else(|| {
                ScrapeError::UnsupportedBackend("postgres backend requires a url".to_string())
            })?;
            let store = PostgresStore::connect(url, &config.table).await?;
            Ok(Box::new(store))
        }
        other => Err(ScrapeError::UnsupportedBackend(format!(
            "store backend '{}' is not available in this build",
            other
        ))),
    }
}

/// Drops blank URLs and repeats while keeping first-seen order
pub(crate) fn distinct_urls<'a, I>(urls: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    urls.into_iter()
        .map(str::trim)
        .filter(|url| !url.is_empty() && seen.insert(*url))
        .collect()
}

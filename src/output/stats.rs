//! Statistics generation from the record store
//!
//! This module provides functionality for extracting and displaying
//! enrichment statistics from the storage layer.

use crate::storage::{InfoFilter, RecordStore, StorageResult};

/// Item counts by enrichment state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Total number of items stored
    pub total: u64,

    /// Items carrying info
    pub with_info: u64,

    /// Items still waiting for the info-fill pass
    pub without_info: u64,
}

impl CrawlStatistics {
    /// Share of items with info, in percent
    pub fn enriched_percent(&self) -> f64 {
        if self.total > 0 {
            (self.with_info as f64 / self.total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The record store to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub async fn load_statistics(store: &dyn RecordStore) -> StorageResult<CrawlStatistics> {
    Ok(CrawlStatistics {
        total: store.count(InfoFilter::All).await?,
        with_info: store.count(InfoFilter::WithInfo).await?,
        without_info: store.count(InfoFilter::WithoutInfo).await?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Item Statistics ===\n");

    println!("  Total items: {}", stats.total);
    println!("  With info: {}", stats.with_info);
    println!("  Without info: {}", stats.without_info);
    println!();

    println!(
        "Enriched: {:.1}% ({} / {} items)",
        stats.enriched_percent(),
        stats.with_info,
        stats.total
    );
}

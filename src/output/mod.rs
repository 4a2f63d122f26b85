//! Output module for reporting and exporting stored items
//!
//! This module handles:
//! - Exporting items as JSON or JSON Lines
//! - Item statistics by enrichment state

mod export;
pub mod stats;

pub use export::{export_items, ExportFormat};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};

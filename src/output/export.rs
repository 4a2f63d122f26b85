//! Flat-file export of stored items
//!
//! Every record is written as `{"id", "url", "info"}` with `info` passed
//! through unchanged (object, array or null).

use crate::storage::{InfoFilter, RecordStore};
use crate::ScrapeError;
use std::io::Write;
use std::str::FromStr;

/// Output layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// One JSON array
    Json,

    /// One JSON object per line
    Jsonl,
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(Self::Json),
            "jsonl" => Ok(Self::Jsonl),
            other => Err(format!("unknown export format '{}' (json, jsonl)", other)),
        }
    }
}

/// Writes the items selected by `filter` to `writer`
///
/// # Returns
///
/// * `Ok(usize)` - Number of records written
/// * `Err(ScrapeError)` - Reading the store or writing failed
pub async fn export_items<W: Write>(
    store: &dyn RecordStore,
    filter: InfoFilter,
    format: ExportFormat,
    mut writer: W,
) -> Result<usize, ScrapeError> {
    let items = store.items_by_enrichment_state(filter).await?;

    match format {
        ExportFormat::Json => {
            serde_json::to_writer_pretty(&mut writer, &items)?;
            writeln!(writer)?;
        }
        ExportFormat::Jsonl => {
            for item in &items {
                serde_json::to_writer(&mut writer, item)?;
                writeln!(writer)?;
            }
        }
    }
    writer.flush()?;

    tracing::debug!(count = items.len(), ?format, "exported items");
    Ok(items.len())
}

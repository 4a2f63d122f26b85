//! Hydration pass
//!
//! Follows a URL stored inside each enriched item's info and merges what the
//! secondary page yields back into that info. Never creates items.

use crate::crawler::engine::Scraper;
use crate::crawler::extractor::ExtractorSet;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::merge::merge_info;
use crate::diagnostics::{CrawlEvent, SkipReason};
use crate::state::Pass;
use crate::storage::{InfoFilter, Item};
use crate::url::usable_url;
use crate::Result;
use serde_json::Value;
use std::fmt;

/// Outcome of a hydration pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HydrationReport {
    pub visited: usize,
    pub saved: usize,
    /// Items left untouched because their info had no usable URL under the key
    /// or the secondary payload could not be merged
    pub skipped: usize,
    pub empty: usize,
    pub fetch_failures: usize,
    pub cancelled: bool,
}

impl fmt::Display for HydrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} visited, {} saved, {} skipped, {} empty, {} failed fetches",
            self.visited, self.saved, self.skipped, self.empty, self.fetch_failures
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

/// Reads the secondary URL stored under `key`
pub fn secondary_url(info: &Value, key: &str) -> std::result::Result<String, SkipReason> {
    let object = info.as_object().ok_or(SkipReason::InfoNotObject)?;
    let value = object
        .get(key)
        .ok_or_else(|| SkipReason::MissingKey(key.to_string()))?;

    value
        .as_str()
        .and_then(usable_url)
        .map(|url| url.to_string())
        .ok_or_else(|| SkipReason::NotAUrl {
            key: key.to_string(),
            value: value.to_string(),
        })
}

impl<F: Fetcher> Scraper<F> {
    /// Runs the hydration pass over every item that has info
    ///
    /// `secondary` extracts the payload of the page found under `key`; its
    /// keys win over the stored ones on conflict.
    ///
    /// # Errors
    ///
    /// * `ScrapeError::MissingExtractor` - `secondary` has no info function; nothing is fetched
    /// * `ScrapeError::Storage` - Reading the snapshot or writing an item failed
    pub async fn hydrate(
        &mut self,
        key: &str,
        secondary: &ExtractorSet<F::View, F::Control>,
    ) -> Result<HydrationReport> {
        let pass = Pass::Hydration;
        secondary.require(pass)?;

        let items = self
            .store
            .items_by_enrichment_state(InfoFilter::WithInfo)
            .await?;
        self.report(CrawlEvent::PassStarted {
            pass,
            total: items.len(),
        });

        let mut report = HydrationReport::default();
        for item in items {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                self.report(CrawlEvent::Cancelled { pass });
                break;
            }
            report.visited += 1;

            let current = item.info.clone().unwrap_or(Value::Null);
            let url = match secondary_url(&current, key) {
                Ok(url) => url,
                Err(reason) => {
                    report.skipped += 1;
                    self.skip(&item, reason);
                    continue;
                }
            };

            if !self.pacer.wait_turn(&self.cancel).await {
                report.cancelled = true;
                self.report(CrawlEvent::Cancelled { pass });
                break;
            }
            let Some(view) = self.fetch_item_at(pass, &item, &url).await else {
                report.fetch_failures += 1;
                continue;
            };

            let Some(payload) = secondary.info(&view) else {
                report.empty += 1;
                self.report(CrawlEvent::InfoEmpty {
                    pass,
                    id: item.id,
                    url,
                });
                continue;
            };
            if !payload.is_object() {
                report.skipped += 1;
                self.skip(&item, SkipReason::PayloadNotObject);
                continue;
            }

            // merge over what is committed now, not the pass-start snapshot
            let committed = self
                .store
                .item(item.id)
                .await?
                .and_then(|row| row.info)
                .unwrap_or(current);
            self.store
                .set_info(item.id, &merge_info(&committed, payload))
                .await?;
            report.saved += 1;
            self.report(CrawlEvent::InfoSaved {
                pass,
                id: item.id,
                url: item.url,
                merged: true,
            });
        }

        self.finish(pass, report.to_string());
        Ok(report)
    }

    fn skip(&self, item: &Item, reason: SkipReason) {
        self.report(CrawlEvent::ItemSkipped {
            pass: Pass::Hydration,
            id: item.id,
            url: item.url.clone(),
            reason,
        });
    }
}

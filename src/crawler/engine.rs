//! Traversal engine
//!
//! `Scraper` composes a fetch backend, an extractor set and a record store.
//! It runs one pass at a time, strictly sequentially:
//! - `scrape_item_urls` walks the pagination chain of every seed
//! - `scrape_item_infos` fills items that have no info yet
//! - `refresh_item_infos` re-extracts info for every item
//! - `hydrate` (see `hydrate.rs`) follows a URL stored in each item's info
//!
//! Transport failures are reported and skipped. Store failures abort the pass.

use crate::config::ScraperConfig;
use crate::crawler::extractor::ExtractorSet;
use crate::crawler::fetcher::{FetchResult, Fetcher, Target};
use crate::crawler::merge::merge_info;
use crate::crawler::pacing::Pacer;
use crate::diagnostics::{default_sink, CrawlEvent, DiagnosticSink};
use crate::state::{Pass, TraversalState};
use crate::storage::{InfoFilter, Item, RecordStore};
use crate::Result;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of a traversal pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalReport {
    /// Seeds whose chain was started
    pub seeds: usize,
    pub pages_fetched: usize,
    pub fetch_failures: usize,
    /// Item URLs returned by the extractors, before dedup
    pub urls_found: usize,
    /// URL+info pairs returned by the extractors, before dedup
    pub pairs_found: usize,
    /// Rows actually created
    pub inserted: u64,
    pub cancelled: bool,
}

impl fmt::Display for TraversalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} seeds, {} pages, {} failed fetches, {} urls, {} pairs, {} new items",
            self.seeds,
            self.pages_fetched,
            self.fetch_failures,
            self.urls_found,
            self.pairs_found,
            self.inserted
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

/// Outcome of an info-fill or info-refresh pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoReport {
    pub visited: usize,
    pub saved: usize,
    pub empty: usize,
    pub fetch_failures: usize,
    pub cancelled: bool,
}

impl fmt::Display for InfoReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} visited, {} saved, {} empty, {} failed fetches",
            self.visited, self.saved, self.empty, self.fetch_failures
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

/// The crawl engine
///
/// # Example
///
/// ```no_run
/// use pagewalk::config::ScraperConfig;
/// use pagewalk::crawler::{HttpFetcher, Scraper, SelectorRules};
/// use pagewalk::config::ExtractConfig;
/// use pagewalk::storage::SqliteStore;
/// use std::sync::Arc;
///
/// # async fn run() -> pagewalk::Result<()> {
/// let config = ScraperConfig::default();
/// let extract: ExtractConfig = toml::from_str(r#"item-links = "a.item""#).unwrap();
/// let store = Arc::new(SqliteStore::open_in_memory("items")?);
///
/// let mut scraper = Scraper::new(HttpFetcher::from_config(&config)?, store)
///     .with_extractors(SelectorRules::from_config(&extract)?.into_extractors());
/// let report = scraper
///     .scrape_item_urls(&["https://example.com/list".to_string()])
///     .await?;
/// println!("{}", report);
/// scraper.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Scraper<F: Fetcher> {
    pub(crate) fetcher: F,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) extractors: ExtractorSet<F::View, F::Control>,
    pub(crate) pacer: Pacer,
    pub(crate) merge_info: bool,
    pub(crate) sink: Arc<dyn DiagnosticSink>,
    pub(crate) cancel: CancellationToken,
}

impl<F: Fetcher> Scraper<F> {
    /// Creates an engine with no extractors, no pacing and merge disabled
    pub fn new(fetcher: F, store: Arc<dyn RecordStore>) -> Self {
        Self {
            fetcher,
            store,
            extractors: ExtractorSet::new(),
            pacer: Pacer::new(None),
            merge_info: false,
            sink: default_sink(),
            cancel: CancellationToken::new(),
        }
    }

    /// Creates an engine with pacing and merge taken from `[scraper]`
    pub fn from_config(fetcher: F, store: Arc<dyn RecordStore>, config: &ScraperConfig) -> Self {
        Self::new(fetcher, store)
            .with_delay(Pacer::from_secs(config.request_delay).delay())
            .with_merge_info(config.merge_info)
    }

    pub fn with_extractors(mut self, extractors: ExtractorSet<F::View, F::Control>) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn with_delay(mut self, delay: Option<Duration>) -> Self {
        self.pacer = Pacer::new(delay);
        self
    }

    pub fn with_merge_info(mut self, merge: bool) -> Self {
        self.merge_info = merge;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replaces the extractor set between passes
    pub fn extractors_mut(&mut self) -> &mut ExtractorSet<F::View, F::Control> {
        &mut self.extractors
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Token that stops the running pass at the next step boundary
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Walks every seed's pagination chain and stores the items found
    ///
    /// # Errors
    ///
    /// * `ScrapeError::MissingExtractor` - Neither URL extractor is set; nothing is fetched
    /// * `ScrapeError::Storage` - A page's writes failed; the pass stops there
    pub async fn scrape_item_urls(&mut self, seeds: &[String]) -> Result<TraversalReport> {
        let pass = Pass::Traversal;
        self.extractors.require(pass)?;
        self.report(CrawlEvent::PassStarted {
            pass,
            total: seeds.len(),
        });

        let mut report = TraversalReport::default();
        for seed in seeds {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
            }
            if report.cancelled {
                break;
            }
            report.seeds += 1;
            self.walk_seed(seed, &mut report).await?;
        }

        if report.cancelled {
            self.report(CrawlEvent::Cancelled { pass });
        }
        self.finish(pass, report.to_string());
        Ok(report)
    }

    /// Runs the pagination state machine for one seed
    async fn walk_seed(&mut self, seed: &str, report: &mut TraversalReport) -> Result<()> {
        self.report(CrawlEvent::SeedStarted {
            seed: seed.to_string(),
        });

        let mut state = TraversalState::Seeded;
        let mut target = Target::Url(seed.to_string());
        let mut view: Option<F::View> = None;
        let mut found: (Vec<String>, Vec<(String, Value)>) = Default::default();
        let mut page = 0u32;
        let mut visited: HashSet<String> = HashSet::new();

        while !state.is_terminal() {
            let next = match state {
                TraversalState::Seeded => {
                    if self.pacer.wait_turn(&self.cancel).await {
                        TraversalState::Fetching
                    } else {
                        report.cancelled = true;
                        TraversalState::Done
                    }
                }
                TraversalState::Fetching => {
                    page += 1;
                    if let Target::Url(url) = &target {
                        visited.insert(url.clone());
                    }
                    let result = self.fetcher.fetch(&target).await;
                    self.pacer.mark();

                    match result {
                        FetchResult::Success(fetched) => {
                            report.pages_fetched += 1;
                            self.report(CrawlEvent::PageFetched {
                                seed: seed.to_string(),
                                page,
                                target: target.to_string(),
                            });
                            view = Some(fetched);
                            TraversalState::Extracting
                        }
                        FetchResult::Failure(e) => {
                            // the rest of this seed's chain is abandoned, not retried
                            report.fetch_failures += 1;
                            self.report(CrawlEvent::PageFetchFailed {
                                seed: seed.to_string(),
                                page,
                                target: target.to_string(),
                                reason: e.to_string(),
                            });
                            TraversalState::Done
                        }
                    }
                }
                TraversalState::Extracting => match view.as_ref() {
                    Some(current) => {
                        found = (
                            self.extractors.item_urls(current),
                            self.extractors.item_urls_and_infos(current),
                        );
                        TraversalState::Persisting
                    }
                    None => TraversalState::Done,
                },
                TraversalState::Persisting => {
                    let (urls, pairs) = std::mem::take(&mut found);
                    report.urls_found += urls.len();
                    report.pairs_found += pairs.len();

                    let inserted = self.persist_page(&urls, &pairs).await?;
                    report.inserted += inserted;
                    if urls.is_empty() && pairs.is_empty() {
                        self.report(CrawlEvent::NoItemsFound {
                            seed: seed.to_string(),
                            page,
                        });
                    } else {
                        self.report(CrawlEvent::ItemsFound {
                            seed: seed.to_string(),
                            page,
                            urls: urls.len(),
                            pairs: pairs.len(),
                            inserted,
                        });
                    }

                    if self.cancel.is_cancelled() {
                        report.cancelled = true;
                        TraversalState::Done
                    } else {
                        TraversalState::Advancing
                    }
                }
                TraversalState::Advancing => {
                    let next_target = view
                        .take()
                        .and_then(|current| self.extractors.next_page(&current).into_target());

                    match next_target {
                        None => TraversalState::Done,
                        Some(Target::Url(url)) if visited.contains(&url) => {
                            self.report(CrawlEvent::PageRepeated {
                                seed: seed.to_string(),
                                page,
                                target: url,
                            });
                            TraversalState::Done
                        }
                        Some(next_target) => {
                            self.report(CrawlEvent::NextPage {
                                seed: seed.to_string(),
                                page,
                                target: next_target.to_string(),
                            });
                            target = next_target;
                            if self.pacer.wait_turn(&self.cancel).await {
                                TraversalState::Fetching
                            } else {
                                report.cancelled = true;
                                TraversalState::Done
                            }
                        }
                    }
                }
                TraversalState::Done => TraversalState::Done,
            };
            state = step(state, next);
        }

        self.report(CrawlEvent::SeedFinished {
            seed: seed.to_string(),
            pages: page,
        });
        Ok(())
    }

    /// Writes one page's discoveries; URL+info pairs carrying `null` are stored bare
    async fn persist_page(&self, urls: &[String], pairs: &[(String, Value)]) -> Result<u64> {
        let (bare, pairs): (Vec<_>, Vec<_>) = pairs.iter().partition(|(_, info)| info.is_null());
        let mut urls = urls.to_vec();
        urls.extend(bare.into_iter().map(|(url, _)| url.clone()));
        let pairs: Vec<(String, Value)> = pairs.into_iter().cloned().collect();

        if urls.is_empty() && pairs.is_empty() {
            return Ok(0);
        }
        Ok(self.store.persist_page(&urls, &pairs).await?)
    }

    /// Visits every item without info and stores what `extract_info` returns
    ///
    /// # Errors
    ///
    /// * `ScrapeError::MissingExtractor` - `extract_info` is not set; nothing is fetched
    /// * `ScrapeError::Storage` - Reading the snapshot or writing an item failed
    pub async fn scrape_item_infos(&mut self) -> Result<InfoReport> {
        self.fill_infos(Pass::InfoFill, InfoFilter::WithoutInfo)
            .await
    }

    /// Visits every item, including those with info, and re-extracts it
    ///
    /// With merge enabled, existing keys that the page no longer yields are kept.
    pub async fn refresh_item_infos(&mut self) -> Result<InfoReport> {
        self.fill_infos(Pass::InfoRefresh, InfoFilter::All).await
    }

    async fn fill_infos(&mut self, pass: Pass, filter: InfoFilter) -> Result<InfoReport> {
        self.extractors.require(pass)?;

        let items = self.store.items_by_enrichment_state(filter).await?;
        self.report(CrawlEvent::PassStarted {
            pass,
            total: items.len(),
        });

        let mut report = InfoReport::default();
        for item in items {
            if self.cancel.is_cancelled() || !self.pacer.wait_turn(&self.cancel).await {
                report.cancelled = true;
                self.report(CrawlEvent::Cancelled { pass });
                break;
            }
            report.visited += 1;

            let Some(view) = self.fetch_item(pass, &item).await else {
                report.fetch_failures += 1;
                continue;
            };
            let Some(info) = self.extractors.info(&view) else {
                report.empty += 1;
                self.report(CrawlEvent::InfoEmpty {
                    pass,
                    id: item.id,
                    url: item.url.clone(),
                });
                continue;
            };

            let merged = self.save_info(&item, info).await?;
            report.saved += 1;
            self.report(CrawlEvent::InfoSaved {
                pass,
                id: item.id,
                url: item.url,
                merged,
            });
        }

        self.finish(pass, report.to_string());
        Ok(report)
    }

    /// Writes `info`, merged over the committed payload when merging is on
    ///
    /// Returns whether a merge happened.
    async fn save_info(&self, item: &Item, info: Value) -> Result<bool> {
        let previous = if self.merge_info {
            self.store.item(item.id).await?.and_then(|row| row.info)
        } else {
            None
        };

        let (info, merged) = match previous {
            Some(old) => (merge_info(&old, info), true),
            None => (info, false),
        };
        self.store.set_info(item.id, &info).await?;
        Ok(merged)
    }

    /// Fetches an item URL; a failure is reported and yields None
    pub(crate) async fn fetch_item(&mut self, pass: Pass, item: &Item) -> Option<F::View> {
        self.fetch_item_at(pass, item, &item.url).await
    }

    pub(crate) async fn fetch_item_at(
        &mut self,
        pass: Pass,
        item: &Item,
        url: &str,
    ) -> Option<F::View> {
        let result = self.fetcher.fetch(&Target::Url(url.to_string())).await;
        self.pacer.mark();
        match result {
            FetchResult::Success(view) => Some(view),
            FetchResult::Failure(e) => {
                self.report(CrawlEvent::ItemFetchFailed {
                    pass,
                    id: item.id,
                    url: url.to_string(),
                    reason: e.to_string(),
                });
                None
            }
        }
    }

    /// Consumes the engine and releases its fetch backend
    ///
    /// A close failure is reported, never returned.
    pub async fn shutdown(mut self) {
        if let Err(e) = self.fetcher.close().await {
            self.report(CrawlEvent::SessionCloseFailed {
                reason: e.to_string(),
            });
        }
    }

    pub(crate) fn report(&self, event: CrawlEvent) {
        self.sink.report(&event);
    }

    pub(crate) fn finish(&self, pass: Pass, summary: String) {
        self.report(CrawlEvent::PassFinished { pass, summary });
    }
}

/// Moves the per-seed state machine, checking the edge in debug builds
fn step(from: TraversalState, to: TraversalState) -> TraversalState {
    debug_assert!(
        from.can_transition_to(to),
        "illegal traversal transition {} -> {}",
        from,
        to
    );
    tracing::trace!(from = from.as_str(), to = to.as_str(), "traversal step");
    to
}

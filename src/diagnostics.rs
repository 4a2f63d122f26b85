//! Structured diagnostics for the engine passes
//!
//! The engine never logs directly. It reports `CrawlEvent`s to a
//! `DiagnosticSink`; `TracingSink` forwards them to `tracing` and is the
//! default, `RecordingSink` keeps them in memory.

use crate::state::Pass;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::Level;

/// Why an item was skipped without a fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Stored info is not a JSON object, so it has no keys to read
    InfoNotObject,

    /// The configured key is missing from the stored info
    MissingKey(String),

    /// The key's value is not an http(s) URL
    NotAUrl { key: String, value: String },

    /// The secondary payload cannot be merged key-wise
    PayloadNotObject,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InfoNotObject => write!(f, "stored info is not an object"),
            Self::MissingKey(key) => write!(f, "info has no '{}' key", key),
            Self::NotAUrl { key, value } => write!(f, "'{}' is not a usable URL: {}", key, value),
            Self::PayloadNotObject => write!(f, "secondary payload is not an object"),
        }
    }
}

/// One reportable outcome of an engine step
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlEvent {
    PassStarted {
        pass: Pass,
        total: usize,
    },
    SeedStarted {
        seed: String,
    },
    PageFetched {
        seed: String,
        page: u32,
        target: String,
    },
    /// Transport failure while walking a seed; the rest of its chain is dropped
    PageFetchFailed {
        seed: String,
        page: u32,
        target: String,
        reason: String,
    },
    ItemsFound {
        seed: String,
        page: u32,
        urls: usize,
        pairs: usize,
        inserted: u64,
    },
    NoItemsFound {
        seed: String,
        page: u32,
    },
    NextPage {
        seed: String,
        page: u32,
        target: String,
    },
    /// The next page points back at a page this seed already fetched
    PageRepeated {
        seed: String,
        page: u32,
        target: String,
    },
    SeedFinished {
        seed: String,
        pages: u32,
    },
    ItemFetchFailed {
        pass: Pass,
        id: i64,
        url: String,
        reason: String,
    },
    InfoEmpty {
        pass: Pass,
        id: i64,
        url: String,
    },
    InfoSaved {
        pass: Pass,
        id: i64,
        url: String,
        merged: bool,
    },
    ItemSkipped {
        pass: Pass,
        id: i64,
        url: String,
        reason: SkipReason,
    },
    Cancelled {
        pass: Pass,
    },
    PassFinished {
        pass: Pass,
        summary: String,
    },
    SessionCloseFailed {
        reason: String,
    },
}

impl CrawlEvent {
    /// Severity used when the event is logged
    pub fn level(&self) -> Level {
        match self {
            Self::PageFetchFailed { .. }
            | Self::ItemFetchFailed { .. }
            | Self::SessionCloseFailed { .. } => Level::WARN,
            Self::NoItemsFound { .. }
            | Self::InfoEmpty { .. }
            | Self::ItemSkipped { .. }
            | Self::PageFetched { .. }
            | Self::NextPage { .. } => Level::DEBUG,
            _ => Level::INFO,
        }
    }

    /// Stable event name, emitted as the `kind` field
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PassStarted { .. } => "pass_started",
            Self::SeedStarted { .. } => "seed_started",
            Self::PageFetched { .. } => "page_fetched",
            Self::PageFetchFailed { .. } => "page_fetch_failed",
            Self::ItemsFound { .. } => "items_found",
            Self::NoItemsFound { .. } => "no_items_found",
            Self::NextPage { .. } => "next_page",
            Self::PageRepeated { .. } => "page_repeated",
            Self::SeedFinished { .. } => "seed_finished",
            Self::ItemFetchFailed { .. } => "item_fetch_failed",
            Self::InfoEmpty { .. } => "info_empty",
            Self::InfoSaved { .. } => "info_saved",
            Self::ItemSkipped { .. } => "item_skipped",
            Self::Cancelled { .. } => "cancelled",
            Self::PassFinished { .. } => "pass_finished",
            Self::SessionCloseFailed { .. } => "session_close_failed",
        }
    }

    /// Returns true for transport failures
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::PageFetchFailed { .. } | Self::ItemFetchFailed { .. }
        )
    }
}

impl fmt::Display for CrawlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassStarted { pass, total } => write!(f, "{} started ({} to visit)", pass, total),
            Self::SeedStarted { seed } => write!(f, "walking seed {}", seed),
            Self::PageFetched { seed, page, target } => {
                write!(f, "fetched page {} of {}: {}", page, seed, target)
            }
            Self::PageFetchFailed {
                seed,
                page,
                target,
                reason,
            } => write!(
                f,
                "failed fetching page {} of {} ({}): {}",
                page, seed, target, reason
            ),
            Self::ItemsFound {
                page,
                urls,
                pairs,
                inserted,
                ..
            } => write!(
                f,
                "page {}: {} urls, {} url+info pairs, {} new",
                page, urls, pairs, inserted
            ),
            Self::NoItemsFound { seed, page } => write!(f, "no items on page {} of {}", page, seed),
            Self::NextPage { page, target, .. } => write!(f, "page {} -> {}", page, target),
            Self::PageRepeated { seed, page, target } => write!(
                f,
                "page {} of {} links back to {}, ending the chain",
                page, seed, target
            ),
            Self::SeedFinished { seed, pages } => write!(f, "seed {} done after {} pages", seed, pages),
            Self::ItemFetchFailed { id, url, reason, .. } => {
                write!(f, "failed fetching item {} ({}): {}", id, url, reason)
            }
            Self::InfoEmpty { id, url, .. } => write!(f, "no info for item {} ({})", id, url),
            Self::InfoSaved {
                id, url, merged, ..
            } => {
                let verb = if *merged { "merged" } else { "saved" };
                write!(f, "{} info for item {} ({})", verb, id, url)
            }
            Self::ItemSkipped {
                id, url, reason, ..
            } => write!(f, "skipped item {} ({}): {}", id, url, reason),
            Self::Cancelled { pass } => write!(f, "{} cancelled", pass),
            Self::PassFinished { pass, summary } => write!(f, "{} finished: {}", pass, summary),
            Self::SessionCloseFailed { reason } => {
                write!(f, "failed closing navigation session: {}", reason)
            }
        }
    }
}

/// Receiver of engine diagnostics
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, event: &CrawlEvent);
}

/// Forwards every event to `tracing` at the event's level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, event: &CrawlEvent) {
        let kind = event.kind();
        match event.level() {
            Level::WARN => tracing::warn!(target: "pagewalk", kind, "{}", event),
            Level::DEBUG => tracing::debug!(target: "pagewalk", kind, "{}", event),
            _ => tracing::info!(target: "pagewalk", kind, "{}", event),
        }
    }
}

/// Keeps events in memory, in report order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<CrawlEvent>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Copies out everything reported so far
    pub fn events(&self) -> Vec<CrawlEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count_where(&self, predicate: impl Fn(&CrawlEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

impl DiagnosticSink for RecordingSink {
    fn report(&self, event: &CrawlEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Process-wide default sink
pub fn default_sink() -> Arc<dyn DiagnosticSink> {
    Arc::new(TracingSink)
}

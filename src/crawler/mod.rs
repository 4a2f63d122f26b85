//! Crawler module: fetch backends, extractors and the traversal engine
//!
//! This module contains the core crawling logic, including:
//! - The fetch contract with its HTTP and browser backends
//! - The extractor contract and the CSS-selector extractors
//! - Pacing and the info merge policy
//! - The traversal, info-fill and hydration passes

mod browser;
#[cfg(feature = "chrome")]
mod chrome;
mod engine;
mod extractor;
mod fetcher;
mod hydrate;
mod merge;
mod pacing;
mod seeds;
mod selectors;

pub use browser::{BrowserFetcher, NavigationSession};
#[cfg(feature = "chrome")]
pub use chrome::{profile_dir, ChromeSession};
pub use engine::{InfoReport, Scraper, TraversalReport};
pub use extractor::ExtractorSet;
pub use fetcher::{
    build_http_client, ControlToken, FetchError, FetchResult, Fetcher, HttpFetcher, NextPage,
    PageView, Target, DEFAULT_USER_AGENT,
};
pub use hydrate::{secondary_url, HydrationReport};
pub use merge::merge_info;
pub use pacing::Pacer;
pub use seeds::{load_seeds, parse_seeds};
pub use selectors::SelectorRules;

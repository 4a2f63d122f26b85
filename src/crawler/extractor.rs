//! Caller-supplied extraction functions
//!
//! An `ExtractorSet` bundles the four optional functions the engine calls on a
//! page view. They are pure: they never touch the store or the network.

use crate::crawler::fetcher::NextPage;
use crate::state::Pass;
use crate::ScrapeError;
use serde_json::Value;

type ItemUrlsFn<V> = Box<dyn Fn(&V) -> Vec<String> + Send + Sync>;
type PairsFn<V> = Box<dyn Fn(&V) -> Vec<(String, Value)> + Send + Sync>;
type NextPageFn<V, C> = Box<dyn Fn(&V) -> NextPage<C> + Send + Sync>;
type InfoFn<V> = Box<dyn Fn(&V) -> Option<Value> + Send + Sync>;

/// The extractor functions for one page-view type
///
/// # Example
///
/// ```
/// use pagewalk::crawler::{ExtractorSet, NextPage};
///
/// struct View(Vec<String>);
///
/// let extractors: ExtractorSet<View, String> = ExtractorSet::new()
///     .with_item_urls(|view: &View| view.0.clone())
///     .with_next_page(|_: &View| NextPage::Absent);
/// assert!(extractors.has_item_urls());
/// assert!(!extractors.has_info());
/// ```
pub struct ExtractorSet<V, C> {
    item_urls: Option<ItemUrlsFn<V>>,
    item_urls_and_infos: Option<PairsFn<V>>,
    next_page: Option<NextPageFn<V, C>>,
    info: Option<InfoFn<V>>,
}

impl<V, C> Default for ExtractorSet<V, C> {
    fn default() -> Self {
        Self {
            item_urls: None,
            item_urls_and_infos: None,
            next_page: None,
            info: None,
        }
    }
}

impl<V, C> ExtractorSet<V, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item_urls(
        mut self,
        f: impl Fn(&V) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.item_urls = Some(Box::new(f));
        self
    }

    pub fn with_item_urls_and_infos(
        mut self,
        f: impl Fn(&V) -> Vec<(String, Value)> + Send + Sync + 'static,
    ) -> Self {
        self.item_urls_and_infos = Some(Box::new(f));
        self
    }

    pub fn with_next_page(mut self, f: impl Fn(&V) -> NextPage<C> + Send + Sync + 'static) -> Self {
        self.next_page = Some(Box::new(f));
        self
    }

    pub fn with_info(mut self, f: impl Fn(&V) -> Option<Value> + Send + Sync + 'static) -> Self {
        self.info = Some(Box::new(f));
        self
    }

    pub fn has_item_urls(&self) -> bool {
        self.item_urls.is_some()
    }

    pub fn has_item_urls_and_infos(&self) -> bool {
        self.item_urls_and_infos.is_some()
    }

    pub fn has_next_page(&self) -> bool {
        self.next_page.is_some()
    }

    pub fn has_info(&self) -> bool {
        self.info.is_some()
    }

    /// Checks that the functions `pass` depends on are configured
    ///
    /// Runs before any fetch; a missing function is a configuration error,
    /// never a per-page condition.
    pub fn require(&self, pass: Pass) -> Result<(), ScrapeError> {
        let (ready, needs) = if pass.is_item_pass() {
            (self.has_info(), "extract_info")
        } else {
            (
                self.has_item_urls() || self.has_item_urls_and_infos(),
                "extract_item_urls or extract_item_urls_and_infos",
            )
        };
        if ready {
            return Ok(());
        }
        Err(ScrapeError::MissingExtractor { pass, needs })
    }

    pub(crate) fn item_urls(&self, view: &V) -> Vec<String> {
        self.item_urls.as_ref().map(|f| f(view)).unwrap_or_default()
    }

    pub(crate) fn item_urls_and_infos(&self, view: &V) -> Vec<(String, Value)> {
        self.item_urls_and_infos
            .as_ref()
            .map(|f| f(view))
            .unwrap_or_default()
    }

    /// An unset next-page function means every seed is a single page
    pub(crate) fn next_page(&self, view: &V) -> NextPage<C> {
        self.next_page
            .as_ref()
            .map_or(NextPage::Absent, |f| f(view))
    }

    /// JSON `null` counts as "nothing extracted"
    pub(crate) fn info(&self, view: &V) -> Option<Value> {
        self.info
            .as_ref()
            .and_then(|f| f(view))
            .filter(|info| !info.is_null())
    }
}

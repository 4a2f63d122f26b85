//! Integration tests for the traversal engine
//!
//! These tests drive the engine with a scripted in-memory fetcher over an
//! in-memory SQLite store and check the store contents, the fetch log and
//! the reported diagnostics.

use async_trait::async_trait;
use pagewalk::crawler::{
    merge_info, BrowserFetcher, ControlToken, ExtractorSet, FetchError, FetchResult, Fetcher,
    NavigationSession, NextPage, PageView, Scraper, Target,
};
use pagewalk::diagnostics::{CrawlEvent, RecordingSink, SkipReason};
use pagewalk::state::Pass;
use pagewalk::storage::{InfoFilter, Item, RecordStore, SqliteStore, StorageError, StorageResult};
use pagewalk::ScrapeError;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// What the scripted fetcher returns for one target
#[derive(Debug, Clone, Default)]
struct FakePage {
    urls: Vec<String>,
    pairs: Vec<(String, Value)>,
    next: Option<Target<String>>,
    info: Option<Value>,
}

impl FakePage {
    fn listing(urls: &[&str], next: Option<&str>) -> Self {
        Self {
            urls: urls.iter().map(|u| u.to_string()).collect(),
            next: next.map(|n| Target::Url(n.to_string())),
            ..Self::default()
        }
    }

    fn detail(info: Value) -> Self {
        Self {
            info: Some(info),
            ..Self::default()
        }
    }
}

/// Serves pages from a map and logs every fetch
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, FakePage>,
    failing: HashSet<String>,
    log: Arc<Mutex<Vec<String>>>,
    cancel_after: Option<(String, CancellationToken)>,
    fail_close: bool,
}

impl ScriptedFetcher {
    fn page(mut self, key: &str, page: FakePage) -> Self {
        self.pages.insert(key.to_string(), page);
        self
    }

    fn failing(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }
}

fn key_of(target: &Target<String>) -> String {
    match target {
        Target::Url(url) => url.clone(),
        Target::Control(control) => format!("control:{}", control),
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    type View = FakePage;
    type Control = String;

    async fn fetch(&mut self, target: &Target<String>) -> FetchResult<FakePage> {
        let key = key_of(target);
        self.log.lock().unwrap().push(key.clone());

        if let Some((trigger, token)) = &self.cancel_after {
            if *trigger == key {
                token.cancel();
            }
        }

        if self.failing.contains(&key) {
            return FetchResult::Failure(FetchError::Session(format!("connection reset: {}", key)));
        }
        match self.pages.get(&key) {
            Some(page) => FetchResult::Success(page.clone()),
            None => FetchResult::Failure(FetchError::Status {
                status: 404,
                url: key,
            }),
        }
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        if self.fail_close {
            return Err(FetchError::Session("browser already gone".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

fn extractors() -> ExtractorSet<FakePage, String> {
    ExtractorSet::new()
        .with_item_urls(|page: &FakePage| page.urls.clone())
        .with_item_urls_and_infos(|page: &FakePage| page.pairs.clone())
        .with_next_page(|page: &FakePage| match &page.next {
            None => NextPage::Absent,
            Some(Target::Url(url)) => NextPage::Url(url.clone()),
            Some(Target::Control(control)) => NextPage::Control(control.clone()),
        })
        .with_info(|page: &FakePage| page.info.clone())
}

fn memory_store() -> Arc<SqliteStore> {
    Arc::new(SqliteStore::open_in_memory("items").unwrap())
}

async fn all_items(store: &SqliteStore) -> Vec<Item> {
    store
        .items_by_enrichment_state(InfoFilter::All)
        .await
        .unwrap()
}

fn seeds(urls: &[&str]) -> Vec<String> {
    urls.iter().map(|u| u.to_string()).collect()
}

#[tokio::test]
async fn test_two_page_traversal() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example/p1",
            FakePage::listing(&["a", "b"], Some("https://example/p2")),
        )
        .page("https://example/p2", FakePage::listing(&["b", "c"], None));
    let log = fetcher.log();
    let store = memory_store();

    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(extractors());
    let report = scraper
        .scrape_item_urls(&seeds(&["https://example/p1"]))
        .await
        .unwrap();

    let items = all_items(&store).await;
    let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec!["a", "b", "c"]);
    assert!(items.iter().all(|i| i.info.is_none()));

    assert_eq!(log.lock().unwrap().len(), 2);
    assert_eq!(report.pages_fetched, 2);
    assert_eq!(report.urls_found, 4);
    assert_eq!(report.inserted, 3);
    assert!(!report.cancelled);
}

#[tokio::test]
async fn test_traversal_stops_after_last_page() {
    let mut fetcher = ScriptedFetcher::default();
    for n in 1..=5 {
        let next = (n < 5).then(|| format!("https://example/list/{}", n + 1));
        fetcher = fetcher.page(
            &format!("https://example/list/{}", n),
            FakePage::listing(&[format!("item-{}", n).as_str()], next.as_deref()),
        );
    }
    fetcher = fetcher.page("https://example/other", FakePage::listing(&["x"], None));
    let log = fetcher.log();
    let store = memory_store();

    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(extractors());
    scraper
        .scrape_item_urls(&seeds(&["https://example/list/1", "https://example/other"]))
        .await
        .unwrap();

    let log = log.lock().unwrap().clone();
    assert_eq!(log.len(), 6);
    assert_eq!(log[4], "https://example/list/5");
    assert_eq!(log[5], "https://example/other");
    assert_eq!(all_items(&store).await.len(), 6);
}

#[tokio::test]
async fn test_fetch_failure_abandons_rest_of_seed() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example/p1",
            FakePage::listing(&["a"], Some("https://example/p2")),
        )
        .page(
            "https://example/p2",
            FakePage::listing(&["b"], Some("https://example/p3")),
        )
        .page("https://example/p3", FakePage::listing(&["c"], None))
        .page("https://example/q1", FakePage::listing(&["d"], None))
        .failing("https://example/p2");
    let log = fetcher.log();
    let store = memory_store();
    let sink = RecordingSink::new();

    let mut scraper = Scraper::new(fetcher, store.clone())
        .with_extractors(extractors())
        .with_sink(sink.clone());
    let report = scraper
        .scrape_item_urls(&seeds(&["https://example/p1", "https://example/q1"]))
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["https://example/p1", "https://example/p2", "https://example/q1"]
    );
    let urls: Vec<String> = all_items(&store).await.into_iter().map(|i| i.url).collect();
    assert_eq!(urls, vec!["a", "d"]);

    assert_eq!(report.fetch_failures, 1);
    assert_eq!(report.seeds, 2);
    let failures: Vec<CrawlEvent> = sink
        .events()
        .into_iter()
        .filter(|e| e.is_failure())
        .collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        CrawlEvent::PageFetchFailed { seed, page: 2, .. } if seed == "https://example/p1"
    ));
}

#[tokio::test]
async fn test_pairs_keep_first_write() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example/p1",
            FakePage {
                pairs: vec![("u".to_string(), json!({"v": "A"}))],
                next: Some(Target::Url("https://example/p2".to_string())),
                ..FakePage::default()
            },
        )
        .page(
            "https://example/p2",
            FakePage {
                urls: vec!["u".to_string()],
                pairs: vec![("u".to_string(), json!({"v": "B"}))],
                ..FakePage::default()
            },
        );
    let store = memory_store();

    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(extractors());
    scraper
        .scrape_item_urls(&seeds(&["https://example/p1"]))
        .await
        .unwrap();

    let items = all_items(&store).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].info, Some(json!({"v": "A"})));
}

#[tokio::test]
async fn test_control_next_page() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example/feed",
            FakePage {
                urls: vec!["a".to_string()],
                next: Some(Target::Control("button.more".to_string())),
                ..FakePage::default()
            },
        )
        .page("control:button.more", FakePage::listing(&["b"], None));
    let log = fetcher.log();
    let store = memory_store();

    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(extractors());
    scraper
        .scrape_item_urls(&seeds(&["https://example/feed"]))
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["https://example/feed", "control:button.more"]
    );
    assert_eq!(all_items(&store).await.len(), 2);
}

#[tokio::test]
async fn test_missing_extractor_fetches_nothing() {
    let fetcher = ScriptedFetcher::default();
    let log = fetcher.log();
    let store = memory_store();

    let only_info = ExtractorSet::new().with_info(|page: &FakePage| page.info.clone());
    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(only_info);
    let result = scraper
        .scrape_item_urls(&seeds(&["https://example/p1"]))
        .await;
    assert!(matches!(
        result,
        Err(ScrapeError::MissingExtractor {
            pass: Pass::Traversal,
            ..
        })
    ));

    store.upsert_urls(&seeds(&["a"])).await.unwrap();
    *scraper.extractors_mut() =
        ExtractorSet::new().with_item_urls(|page: &FakePage| page.urls.clone());
    let result = scraper.scrape_item_infos().await;
    assert!(matches!(
        result,
        Err(ScrapeError::MissingExtractor {
            pass: Pass::InfoFill,
            ..
        })
    ));

    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_info_fill_skips_failed_fetch() {
    let fetcher = ScriptedFetcher::default()
        .page("b", FakePage::detail(json!({"title": "X"})))
        .failing("a");
    let store = memory_store();
    store.upsert_urls(&seeds(&["a", "b"])).await.unwrap();
    let sink = RecordingSink::new();

    let mut scraper = Scraper::new(fetcher, store.clone())
        .with_extractors(extractors())
        .with_sink(sink.clone());
    let report = scraper.scrape_item_infos().await.unwrap();

    let items = all_items(&store).await;
    assert_eq!(items[0].url, "a");
    assert_eq!(items[0].info, None);
    assert_eq!(items[1].url, "b");
    assert_eq!(items[1].info, Some(json!({"title": "X"})));

    assert_eq!(report.visited, 2);
    assert_eq!(report.saved, 1);
    assert_eq!(report.fetch_failures, 1);
    assert_eq!(
        sink.count_where(|e| matches!(e, CrawlEvent::ItemFetchFailed { url, .. } if url == "a")),
        1
    );
}

#[tokio::test]
async fn test_info_fill_only_visits_items_without_info() {
    let fetcher = ScriptedFetcher::default()
        .page("new", FakePage::detail(json!({"title": "New"})))
        .page("empty", FakePage::default());
    let log = fetcher.log();
    let store = memory_store();
    store
        .upsert_url_info_pairs(&[("done".to_string(), json!({"title": "Done"}))])
        .await
        .unwrap();
    store.upsert_urls(&seeds(&["new", "empty"])).await.unwrap();

    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(extractors());
    let report = scraper.scrape_item_infos().await.unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["new", "empty"]);
    assert_eq!(report.saved, 1);
    assert_eq!(report.empty, 1);
    assert_eq!(store.count(InfoFilter::WithoutInfo).await.unwrap(), 1);
}

#[tokio::test]
async fn test_refresh_merges_into_existing_info() {
    let fetcher = ScriptedFetcher::default().page("u", FakePage::detail(json!({"b": 3, "c": 4})));
    let store = memory_store();
    store
        .upsert_url_info_pairs(&[("u".to_string(), json!({"a": 1, "b": 2}))])
        .await
        .unwrap();
    let sink = RecordingSink::new();

    let mut scraper = Scraper::new(fetcher, store.clone())
        .with_extractors(extractors())
        .with_merge_info(true)
        .with_sink(sink.clone());
    scraper.refresh_item_infos().await.unwrap();

    assert_eq!(
        all_items(&store).await[0].info,
        Some(json!({"a": 1, "b": 3, "c": 4}))
    );
    assert_eq!(
        sink.count_where(|e| matches!(e, CrawlEvent::InfoSaved { merged: true, .. })),
        1
    );
}

#[tokio::test]
async fn test_refresh_without_merge_replaces() {
    let fetcher = ScriptedFetcher::default().page("u", FakePage::detail(json!({"b": 3, "c": 4})));
    let store = memory_store();
    store
        .upsert_url_info_pairs(&[("u".to_string(), json!({"a": 1, "b": 2}))])
        .await
        .unwrap();

    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(extractors());
    scraper.refresh_item_infos().await.unwrap();

    assert_eq!(all_items(&store).await[0].info, Some(json!({"b": 3, "c": 4})));
}

#[tokio::test]
async fn test_hydration_merges_and_skips() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example.com/details/1",
            FakePage::detail(json!({"rating": "5", "title": "Oak desk"})),
        )
        .failing("https://example.com/details/3");
    let log = fetcher.log();
    let store = memory_store();
    store
        .upsert_url_info_pairs(&[
            (
                "one".to_string(),
                json!({"title": "Desk", "details": "https://example.com/details/1"}),
            ),
            ("two".to_string(), json!({"title": "Chair"})),
            ("three".to_string(), json!({"details": "https://example.com/details/3"})),
            ("four".to_string(), json!({"details": 17})),
        ])
        .await
        .unwrap();
    store.upsert_urls(&seeds(&["bare"])).await.unwrap();
    let before = all_items(&store).await;
    let sink = RecordingSink::new();

    let secondary = ExtractorSet::new().with_info(|page: &FakePage| page.info.clone());
    let mut scraper = Scraper::new(fetcher, store.clone()).with_sink(sink.clone());
    let report = scraper.hydrate("details", &secondary).await.unwrap();

    // only items with a usable URL under the key are fetched
    assert_eq!(
        *log.lock().unwrap(),
        vec!["https://example.com/details/1", "https://example.com/details/3"]
    );

    let after = all_items(&store).await;
    assert_eq!(
        after[0].info,
        Some(json!({
            "title": "Oak desk",
            "details": "https://example.com/details/1",
            "rating": "5"
        }))
    );
    assert_eq!(after[1..], before[1..]);

    assert_eq!(report.visited, 4);
    assert_eq!(report.saved, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(report.fetch_failures, 1);

    let skips: Vec<SkipReason> = sink
        .events()
        .into_iter()
        .filter_map(|e| match e {
            CrawlEvent::ItemSkipped { reason, .. } => Some(reason),
            _ => None,
        })
        .collect();
    assert_eq!(
        skips,
        vec![
            SkipReason::MissingKey("details".to_string()),
            SkipReason::NotAUrl {
                key: "details".to_string(),
                value: "17".to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_hydration_needs_secondary_extractor() {
    let store = memory_store();
    let mut scraper = Scraper::new(ScriptedFetcher::default(), store).with_extractors(extractors());
    let result = scraper.hydrate("details", &ExtractorSet::new()).await;
    assert!(matches!(
        result,
        Err(ScrapeError::MissingExtractor {
            pass: Pass::Hydration,
            ..
        })
    ));
}

#[tokio::test]
async fn test_cancel_before_start() {
    let fetcher = ScriptedFetcher::default().page("https://example/p1", FakePage::listing(&["a"], None));
    let log = fetcher.log();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let mut scraper = Scraper::new(fetcher, memory_store())
        .with_extractors(extractors())
        .with_cancellation(cancel);
    let report = scraper
        .scrape_item_urls(&seeds(&["https://example/p1"]))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_between_pages_keeps_written_page() {
    let cancel = CancellationToken::new();
    let mut fetcher = ScriptedFetcher::default()
        .page(
            "https://example/p1",
            FakePage::listing(&["a"], Some("https://example/p2")),
        )
        .page(
            "https://example/p2",
            FakePage::listing(&["b"], Some("https://example/p3")),
        )
        .page("https://example/p3", FakePage::listing(&["c"], None));
    fetcher.cancel_after = Some(("https://example/p2".to_string(), cancel.clone()));
    let log = fetcher.log();
    let store = memory_store();
    let sink = RecordingSink::new();

    let mut scraper = Scraper::new(fetcher, store.clone())
        .with_extractors(extractors())
        .with_sink(sink.clone())
        .with_cancellation(cancel);
    let report = scraper
        .scrape_item_urls(&seeds(&["https://example/p1", "https://example/q1"]))
        .await
        .unwrap();

    assert!(report.cancelled);
    assert_eq!(log.lock().unwrap().len(), 2);
    let urls: Vec<String> = all_items(&store).await.into_iter().map(|i| i.url).collect();
    assert_eq!(urls, vec!["a", "b"]);
    assert_eq!(
        sink.count_where(|e| matches!(e, CrawlEvent::Cancelled { pass: Pass::Traversal })),
        1
    );
}

#[tokio::test]
async fn test_pagination_loop_ends_the_chain() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example/p1",
            FakePage::listing(&["a"], Some("https://example/p2")),
        )
        .page(
            "https://example/p2",
            FakePage::listing(&["b"], Some("https://example/p1")),
        )
        .page("https://example/q1", FakePage::listing(&["c"], None));
    let log = fetcher.log();
    let store = memory_store();
    let sink = RecordingSink::new();

    let mut scraper = Scraper::new(fetcher, store.clone())
        .with_extractors(extractors())
        .with_sink(sink.clone());
    let report = scraper
        .scrape_item_urls(&seeds(&["https://example/p1", "https://example/q1"]))
        .await
        .unwrap();

    assert_eq!(
        *log.lock().unwrap(),
        vec!["https://example/p1", "https://example/p2", "https://example/q1"]
    );
    assert_eq!(report.pages_fetched, 3);
    assert_eq!(all_items(&store).await.len(), 3);
    assert!(sink.events().contains(&CrawlEvent::PageRepeated {
        seed: "https://example/p1".to_string(),
        page: 2,
        target: "https://example/p1".to_string(),
    }));
}

#[tokio::test]
async fn test_cancel_during_info_fill_stops_at_next_item() {
    let cancel = CancellationToken::new();
    let mut fetcher = ScriptedFetcher::default()
        .page("a", FakePage::detail(json!({"title": "A"})))
        .page("b", FakePage::detail(json!({"title": "B"})));
    fetcher.cancel_after = Some(("a".to_string(), cancel.clone()));
    let log = fetcher.log();
    let store = memory_store();
    store.upsert_urls(&seeds(&["a", "b"])).await.unwrap();
    let sink = RecordingSink::new();

    let mut scraper = Scraper::new(fetcher, store.clone())
        .with_extractors(extractors())
        .with_delay(Some(Duration::from_millis(1)))
        .with_sink(sink.clone())
        .with_cancellation(cancel);
    let report = scraper.scrape_item_infos().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(*log.lock().unwrap(), vec!["a"]);
    assert_eq!(report.visited, 1);
    assert_eq!(report.saved, 1);
    let items = all_items(&store).await;
    assert_eq!(items[0].info, Some(json!({"title": "A"})));
    assert_eq!(items[1].info, None);
    assert_eq!(
        sink.count_where(|e| matches!(e, CrawlEvent::Cancelled { pass: Pass::InfoFill })),
        1
    );
}

#[tokio::test]
async fn test_cancel_during_hydration_stops_at_next_item() {
    let cancel = CancellationToken::new();
    let mut fetcher = ScriptedFetcher::default()
        .page("https://example.com/d/1", FakePage::detail(json!({"rating": 1})))
        .page("https://example.com/d/2", FakePage::detail(json!({"rating": 2})));
    fetcher.cancel_after = Some(("https://example.com/d/1".to_string(), cancel.clone()));
    let log = fetcher.log();
    let store = memory_store();
    store
        .upsert_url_info_pairs(&[
            ("one".to_string(), json!({"details": "https://example.com/d/1"})),
            ("two".to_string(), json!({"details": "https://example.com/d/2"})),
        ])
        .await
        .unwrap();

    let secondary = ExtractorSet::new().with_info(|page: &FakePage| page.info.clone());
    let mut scraper = Scraper::new(fetcher, store.clone()).with_cancellation(cancel);
    let report = scraper.hydrate("details", &secondary).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(*log.lock().unwrap(), vec!["https://example.com/d/1"]);
    let items = all_items(&store).await;
    assert_eq!(
        items[0].info,
        Some(json!({"details": "https://example.com/d/1", "rating": 1}))
    );
    assert_eq!(
        items[1].info,
        Some(json!({"details": "https://example.com/d/2"}))
    );
}

/// Rewrites one item's info while its secondary page is being fetched
struct EditingFetcher {
    inner: ScriptedFetcher,
    store: Arc<SqliteStore>,
    edit: (i64, Value),
}

#[async_trait]
impl Fetcher for EditingFetcher {
    type View = FakePage;
    type Control = String;

    async fn fetch(&mut self, target: &Target<String>) -> FetchResult<FakePage> {
        let (id, info) = &self.edit;
        self.store.set_info(*id, info).await.unwrap();
        self.inner.fetch(target).await
    }

    fn name(&self) -> &'static str {
        "editing"
    }
}

#[tokio::test]
async fn test_hydration_merges_over_committed_info() {
    let store = memory_store();
    store
        .upsert_url_info_pairs(&[(
            "one".to_string(),
            json!({"title": "Desk", "details": "https://example.com/d/1"}),
        )])
        .await
        .unwrap();
    let fetcher = EditingFetcher {
        inner: ScriptedFetcher::default()
            .page("https://example.com/d/1", FakePage::detail(json!({"rating": 5}))),
        store: store.clone(),
        edit: (
            1,
            json!({"title": "Oak desk", "details": "https://example.com/d/1", "price": 90}),
        ),
    };

    let secondary = ExtractorSet::new().with_info(|page: &FakePage| page.info.clone());
    let mut scraper = Scraper::new(fetcher, store.clone());
    let report = scraper.hydrate("details", &secondary).await.unwrap();

    assert_eq!(report.saved, 1);
    assert_eq!(
        store.item(1).await.unwrap().unwrap().info,
        Some(json!({
            "title": "Oak desk",
            "details": "https://example.com/d/1",
            "price": 90,
            "rating": 5
        }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_request_delay_paces_fetches() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example/p1",
            FakePage::listing(&["a"], Some("https://example/p2")),
        )
        .page(
            "https://example/p2",
            FakePage::listing(&["b"], Some("https://example/p3")),
        )
        .page("https://example/p3", FakePage::listing(&["c"], None));
    let store = memory_store();

    let mut scraper = Scraper::new(fetcher, store)
        .with_extractors(extractors())
        .with_delay(Some(Duration::from_millis(1500)));
    let start = tokio::time::Instant::now();
    scraper
        .scrape_item_urls(&seeds(&["https://example/p1"]))
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_millis(3000));
}

#[tokio::test]
async fn test_shutdown_reports_close_failure() {
    let fetcher = ScriptedFetcher {
        fail_close: true,
        ..ScriptedFetcher::default()
    };
    let sink = RecordingSink::new();
    let scraper = Scraper::new(fetcher, memory_store()).with_sink(sink.clone());

    scraper.shutdown().await;

    assert_eq!(
        sink.count_where(|e| matches!(e, CrawlEvent::SessionCloseFailed { .. })),
        1
    );
}

/// Store whose writes always fail
struct BrokenStore;

#[async_trait]
impl RecordStore for BrokenStore {
    async fn upsert_urls(&self, _urls: &[String]) -> StorageResult<u64> {
        Err(StorageError::Database("disk full".to_string()))
    }

    async fn upsert_url_info_pairs(&self, _pairs: &[(String, Value)]) -> StorageResult<u64> {
        Err(StorageError::Database("disk full".to_string()))
    }

    async fn persist_page(&self, _urls: &[String], _pairs: &[(String, Value)]) -> StorageResult<u64> {
        Err(StorageError::Database("disk full".to_string()))
    }

    async fn items_by_enrichment_state(&self, _filter: InfoFilter) -> StorageResult<Vec<Item>> {
        Ok(Vec::new())
    }

    async fn set_info(&self, id: i64, _info: &Value) -> StorageResult<()> {
        Err(StorageError::ItemNotFound(id))
    }

    async fn item(&self, _id: i64) -> StorageResult<Option<Item>> {
        Ok(None)
    }

    async fn count(&self, _filter: InfoFilter) -> StorageResult<u64> {
        Ok(0)
    }

    async fn clear(&self) -> StorageResult<u64> {
        Ok(0)
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn test_store_failure_aborts_traversal() {
    let fetcher = ScriptedFetcher::default()
        .page(
            "https://example/p1",
            FakePage::listing(&["a"], Some("https://example/p2")),
        )
        .page("https://example/p2", FakePage::listing(&["b"], None));
    let log = fetcher.log();

    let mut scraper = Scraper::new(fetcher, Arc::new(BrokenStore)).with_extractors(extractors());
    let result = scraper
        .scrape_item_urls(&seeds(&["https://example/p1"]))
        .await;

    assert!(matches!(result, Err(ScrapeError::Storage(_))));
    assert_eq!(log.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_page_writes_commit_as_a_unit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.db");
    let store = Arc::new(SqliteStore::open(&path, "items").unwrap());
    rusqlite::Connection::open(&path)
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER reject_info BEFORE INSERT ON items
             WHEN NEW.info IS NOT NULL
             BEGIN SELECT RAISE(ABORT, 'info rejected'); END;",
        )
        .unwrap();

    let page = FakePage {
        pairs: vec![("c".to_string(), json!({"t": 1}))],
        ..FakePage::listing(&["a", "b"], None)
    };
    let fetcher = ScriptedFetcher::default().page("https://example/p1", page);

    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(extractors());
    let result = scraper
        .scrape_item_urls(&seeds(&["https://example/p1"]))
        .await;

    assert!(matches!(result, Err(ScrapeError::Storage(_))));
    assert!(all_items(&store).await.is_empty());
}

/// Session that serves canned HTML per URL and follows one control
struct CannedSession {
    current: String,
    pages: HashMap<String, String>,
    clicks: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl NavigationSession for CannedSession {
    async fn goto(&mut self, url: &str) -> Result<(), FetchError> {
        self.current = url.to_string();
        Ok(())
    }

    async fn hover(&mut self, _control: &ControlToken) -> Result<(), FetchError> {
        Ok(())
    }

    async fn click(&mut self, control: &ControlToken) -> Result<(), FetchError> {
        self.clicks.lock().unwrap().push(control.selector.clone());
        self.current = format!("{}?after-click", self.current);
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageView, FetchError> {
        Ok(PageView {
            url: self.current.clone(),
            status: None,
            html: self.pages.get(&self.current).cloned().unwrap_or_default(),
        })
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_browser_fetcher_follows_controls() {
    let clicks = Arc::new(Mutex::new(Vec::new()));
    let session = CannedSession {
        current: String::new(),
        pages: HashMap::from([
            (
                "https://example.com/feed".to_string(),
                r#"<a class="item" href="/i/1">1</a><button class="more">More</button>"#.to_string(),
            ),
            (
                "https://example.com/feed?after-click".to_string(),
                r#"<a class="item" href="/i/2">2</a>"#.to_string(),
            ),
        ]),
        clicks: Arc::clone(&clicks),
    };
    let extract: pagewalk::config::ExtractConfig = toml::from_str(
        r#"
        item-links = "a.item"
        next-page-click = "button.more"
        "#,
    )
    .unwrap();
    let rules = pagewalk::crawler::SelectorRules::from_config(&extract).unwrap();
    let store = memory_store();

    let fetcher = BrowserFetcher::with_timing(session, Duration::from_millis(400), Duration::from_secs(2));
    let mut scraper = Scraper::new(fetcher, store.clone()).with_extractors(rules.into_extractors());
    scraper
        .scrape_item_urls(&seeds(&["https://example.com/feed"]))
        .await
        .unwrap();
    scraper.shutdown().await;

    assert_eq!(*clicks.lock().unwrap(), vec!["button.more"]);
    let urls: Vec<String> = all_items(&store).await.into_iter().map(|i| i.url).collect();
    assert_eq!(urls, vec!["https://example.com/i/1", "https://example.com/i/2"]);
}

#[test]
fn test_merge_policy_example() {
    assert_eq!(
        merge_info(&json!({"a": 1, "b": 2}), json!({"b": 3, "c": 4})),
        json!({"a": 1, "b": 3, "c": 4})
    );
}

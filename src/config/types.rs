use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Pagewalk
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scraper: ScraperConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub hydrate: Option<HydrateConfig>,
}

/// Scraper behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Pause between consecutive fetches (seconds); absent means no pacing
    #[serde(rename = "request-delay", default)]
    pub request_delay: Option<f64>,

    /// Merge newly extracted info into existing info instead of replacing it
    #[serde(rename = "merge-info", default)]
    pub merge_info: bool,

    /// Fetch backend: "http" or "browser"
    #[serde(default = "default_fetcher")]
    pub fetcher: String,

    /// User agent sent by the HTTP fetcher
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    /// Request timeout for the HTTP fetcher (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            request_delay: None,
            merge_info: false,
            fetcher: default_fetcher(),
            user_agent: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Store backend: "sqlite" or "postgres"
    pub backend: String,

    /// Path to the SQLite database file
    #[serde(default)]
    pub path: Option<String>,

    /// Connection string for the client-server backend
    #[serde(default)]
    pub url: Option<String>,

    /// Table holding the items
    #[serde(default = "default_table")]
    pub table: String,
}

/// Navigation session bootstrap parameters
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,

    /// Browser profile directory name, created under the platform's Chrome user data dir
    #[serde(rename = "profile-name", default = "default_profile_name")]
    pub profile_name: String,

    /// Explicit browser executable; discovered automatically when absent
    #[serde(default)]
    pub executable: Option<String>,

    #[serde(rename = "window-width", default = "default_window_width")]
    pub window_width: u32,

    #[serde(rename = "window-height", default = "default_window_height")]
    pub window_height: u32,

    /// Pause between hovering a control and clicking it (milliseconds)
    #[serde(rename = "hover-pause-ms", default = "default_hover_pause_ms")]
    pub hover_pause_ms: u64,

    /// Wait after a click for the page to settle (milliseconds)
    #[serde(rename = "settle-ms", default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            profile_name: default_profile_name(),
            executable: None,
            window_width: default_window_width(),
            window_height: default_window_height(),
            hover_pause_ms: default_hover_pause_ms(),
            settle_ms: default_settle_ms(),
        }
    }
}

/// CSS selector rules used by the command-line extractors
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractConfig {
    /// Selector for item links on a listing page
    #[serde(rename = "item-links", default)]
    pub item_links: Option<String>,

    /// Listing entries that carry their info inline
    #[serde(default)]
    pub entries: Option<EntryRules>,

    /// Selector for a next-page link (followed by URL)
    #[serde(rename = "next-page-link", default)]
    pub next_page_link: Option<String>,

    /// Selector for a next-page control (clicked in a browser session)
    #[serde(rename = "next-page-click", default)]
    pub next_page_click: Option<String>,

    /// Field rules for an item's detail page
    #[serde(default)]
    pub info: BTreeMap<String, FieldRule>,
}

/// Rules for extracting URL+info pairs from listing entries
#[derive(Debug, Clone, Deserialize)]
pub struct EntryRules {
    /// Selector matching one entry container
    pub container: String,

    /// Selector for the entry's link, relative to the container
    pub link: String,

    /// Field rules relative to the container
    #[serde(default)]
    pub fields: BTreeMap<String, FieldRule>,
}

/// Hydration pass configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HydrateConfig {
    /// Info key whose value is the secondary URL
    pub key: String,

    /// Field rules for the secondary page
    #[serde(default)]
    pub info: BTreeMap<String, FieldRule>,
}

/// How one info field is read from the page
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldRule {
    /// Text of the first element matching the selector
    Selector(String),

    /// Full form with an optional attribute and multi-value extraction
    Detailed {
        selector: String,
        #[serde(default)]
        attr: Option<String>,
        #[serde(default)]
        all: bool,
    },
}

impl FieldRule {
    pub fn selector(&self) -> &str {
        match self {
            Self::Selector(selector) => selector,
            Self::Detailed { selector, .. } => selector,
        }
    }
}

fn default_fetcher() -> String {
    "http".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_table() -> String {
    "items".to_string()
}

fn default_profile_name() -> String {
    "Test Profile".to_string()
}

fn default_window_width() -> u32 {
    1920
}

fn default_window_height() -> u32 {
    1080
}

fn default_hover_pause_ms() -> u64 {
    400
}

fn default_settle_ms() -> u64 {
    2000
}

//! Fetch contract and the stateless HTTP backend
//!
//! This module handles the transport side of the engine:
//! - The `Fetcher` trait every backend implements
//! - Targets (URL or in-page control) and next-page references
//! - Building the shared HTTP client with the configured user agent
//! - Classifying responses into success or transport failure

use crate::config::ScraperConfig;
use async_trait::async_trait;
use reqwest::Client;
use scraper::Html;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default user agent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("pagewalk/", env!("CARGO_PKG_VERSION"));

/// Why a fetch did not produce a page view
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("{backend} backend cannot follow {target}")]
    UnsupportedTarget {
        backend: &'static str,
        target: String,
    },

    #[error("navigation session: {0}")]
    Session(String),
}

/// What a fetch should navigate to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<C> {
    /// Direct navigation to an absolute URL
    Url(String),

    /// Simulated interaction with an element of the current page
    Control(C),
}

impl<C: fmt::Display> fmt::Display for Target<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Control(control) => write!(f, "control {}", control),
        }
    }
}

/// Result of `extract_next_page`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage<C> {
    /// No further page; the seed is done
    Absent,
    Url(String),
    Control(C),
}

impl<C> NextPage<C> {
    /// Converts into the target of the next fetch, if any
    pub fn into_target(self) -> Option<Target<C>> {
        match self {
            Self::Absent => None,
            Self::Url(url) => Some(Target::Url(url)),
            Self::Control(control) => Some(Target::Control(control)),
        }
    }
}

impl<C> From<Option<String>> for NextPage<C> {
    fn from(url: Option<String>) -> Self {
        url.map_or(Self::Absent, Self::Url)
    }
}

/// Outcome of one fetch
///
/// A failure is a recoverable transport condition: the engine reports it and
/// moves on. It is never retried at this layer.
#[derive(Debug)]
pub enum FetchResult<V> {
    Success(V),
    Failure(FetchError),
}

impl<V> FetchResult<V> {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The page view, defined only on success
    pub fn view(&self) -> Option<&V> {
        match self {
            Self::Success(view) => Some(view),
            Self::Failure(_) => None,
        }
    }
}

impl<V, E: Into<FetchError>> From<Result<V, E>> for FetchResult<V> {
    fn from(result: Result<V, E>) -> Self {
        match result {
            Ok(view) => Self::Success(view),
            Err(e) => Self::Failure(e.into()),
        }
    }
}

/// A transport the engine drives one target at a time
///
/// `View` is opaque to the engine; only extractors look inside it.
#[async_trait]
pub trait Fetcher: Send {
    type View: Send + Sync;
    type Control: fmt::Display + Send + Sync;

    async fn fetch(&mut self, target: &Target<Self::Control>) -> FetchResult<Self::View>;

    /// Releases any session held by the backend
    async fn close(&mut self) -> Result<(), FetchError> {
        Ok(())
    }

    /// Backend name used in diagnostics
    fn name(&self) -> &'static str;
}

/// Page view produced by the shipped backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    /// URL of the page after redirects or in-page navigation
    pub url: String,

    /// HTTP status, when the backend knows it
    pub status: Option<u16>,

    pub html: String,
}

impl PageView {
    pub fn document(&self) -> Html {
        Html::parse_document(&self.html)
    }

    /// Base for resolving relative links
    pub fn base_url(&self) -> Option<Url> {
        Url::parse(&self.url).ok()
    }
}

/// Reference to a clickable element on the current page of a browser session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlToken {
    pub selector: String,
}

impl ControlToken {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
        }
    }
}

impl fmt::Display for ControlToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.selector)
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The scraper configuration (user agent and timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use pagewalk::config::ScraperConfig;
/// use pagewalk::crawler::build_http_client;
///
/// let client = build_http_client(&ScraperConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &ScraperConfig) -> Result<Client, reqwest::Error> {
    let user_agent = config.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT);

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Stateless request/response backend
///
/// Every call is independent; only the connection pool is shared. Control
/// targets cannot be followed without a session and fail the fetch.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &ScraperConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    async fn get(&self, url: &str) -> Result<PageView, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        if status.is_client_error() || status.is_server_error() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let html = response.text().await?;
        Ok(PageView {
            url: final_url,
            status: Some(status.as_u16()),
            html,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    type View = PageView;
    type Control = ControlToken;

    async fn fetch(&mut self, target: &Target<ControlToken>) -> FetchResult<PageView> {
        match target {
            Target::Url(url) => self.get(url).await.into(),
            Target::Control(_) => FetchResult::Failure(FetchError::UnsupportedTarget {
                backend: self.name(),
                target: target.to_string(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

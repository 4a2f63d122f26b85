//! Stateful navigation backend
//!
//! `BrowserFetcher` drives a `NavigationSession`. URL targets navigate
//! directly; control targets are followed with a simulated pointer
//! interaction: hover, a short pause, click, then a settle wait before the
//! page is snapshotted.

use crate::config::BrowserConfig;
use crate::crawler::fetcher::{ControlToken, FetchError, FetchResult, Fetcher, PageView, Target};
use async_trait::async_trait;
use std::time::Duration;

/// A live page that can be navigated and inspected
#[async_trait]
pub trait NavigationSession: Send {
    async fn goto(&mut self, url: &str) -> Result<(), FetchError>;

    async fn hover(&mut self, control: &ControlToken) -> Result<(), FetchError>;

    async fn click(&mut self, control: &ControlToken) -> Result<(), FetchError>;

    /// Current URL and rendered HTML
    async fn snapshot(&mut self) -> Result<PageView, FetchError>;

    async fn close(&mut self) -> Result<(), FetchError>;
}

/// Fetch backend over an exclusively owned navigation session
pub struct BrowserFetcher<S> {
    session: S,
    hover_pause: Duration,
    settle: Duration,
}

impl<S: NavigationSession> BrowserFetcher<S> {
    pub fn new(session: S, config: &BrowserConfig) -> Self {
        Self::with_timing(
            session,
            Duration::from_millis(config.hover_pause_ms),
            Duration::from_millis(config.settle_ms),
        )
    }

    pub fn with_timing(session: S, hover_pause: Duration, settle: Duration) -> Self {
        Self {
            session,
            hover_pause,
            settle,
        }
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    async fn follow(&mut self, control: &ControlToken) -> Result<(), FetchError> {
        self.session.hover(control).await?;
        tokio::time::sleep(self.hover_pause).await;
        self.session.click(control).await?;
        tokio::time::sleep(self.settle).await;
        Ok(())
    }
}

#[async_trait]
impl<S: NavigationSession> Fetcher for BrowserFetcher<S> {
    type View = PageView;
    type Control = ControlToken;

    async fn fetch(&mut self, target: &Target<ControlToken>) -> FetchResult<PageView> {
        let navigated = match target {
            Target::Url(url) => self.session.goto(url).await,
            Target::Control(control) => self.follow(control).await,
        };
        if let Err(e) = navigated {
            return FetchResult::Failure(e);
        }
        self.session.snapshot().await.into()
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        self.session.close().await
    }

    fn name(&self) -> &'static str {
        "browser"
    }
}

//! Chrome navigation session driven through chromiumoxide

use crate::config::BrowserConfig;
use crate::crawler::browser::NavigationSession;
use crate::crawler::fetcher::{ControlToken, FetchError, PageView};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as LaunchConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use tokio::task::JoinHandle;

/// One browser window with a single tab, owned by the engine
///
/// `close` is the regular release path. When the session is dropped without
/// it, the browser is closed on a background task.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSession {
    /// Launches Chrome with the configured profile and window
    pub async fn launch(config: &BrowserConfig) -> Result<Self, FetchError> {
        let mut builder = LaunchConfig::builder().window_size(config.window_width, config.window_height);
        if !config.headless {
            builder = builder.with_head();
        }
        if let Some(dir) = profile_dir(&config.profile_name) {
            builder = builder.user_data_dir(dir);
        }
        if let Some(executable) = &config.executable {
            builder = builder.chrome_executable(executable);
        }
        let launch = builder.build().map_err(FetchError::Session)?;

        let (browser, mut events) = Browser::launch(launch).await.map_err(cdp)?;
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        let page = browser.new_page("about:blank").await.map_err(cdp)?;

        tracing::info!(
            headless = config.headless,
            profile = %config.profile_name,
            "Chrome session started"
        );

        Ok(Self {
            browser: Some(browser),
            page,
            handler,
        })
    }
}

#[async_trait]
impl NavigationSession for ChromeSession {
    async fn goto(&mut self, url: &str) -> Result<(), FetchError> {
        self.page.goto(url).await.map_err(cdp)?;
        Ok(())
    }

    async fn hover(&mut self, control: &ControlToken) -> Result<(), FetchError> {
        let element = self.page.find_element(&control.selector).await.map_err(cdp)?;
        element.scroll_into_view().await.map_err(cdp)?;
        element.hover().await.map_err(cdp)?;
        Ok(())
    }

    async fn click(&mut self, control: &ControlToken) -> Result<(), FetchError> {
        let element = self.page.find_element(&control.selector).await.map_err(cdp)?;
        element.click().await.map_err(cdp)?;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<PageView, FetchError> {
        let html = self.page.content().await.map_err(cdp)?;
        let url = self.page.url().await.map_err(cdp)?.unwrap_or_default();
        Ok(PageView {
            url,
            status: None,
            html,
        })
    }

    async fn close(&mut self) -> Result<(), FetchError> {
        let Some(mut browser) = self.browser.take() else {
            return Ok(());
        };
        browser.close().await.map_err(cdp)?;
        browser
            .wait()
            .await
            .map_err(|e| FetchError::Session(e.to_string()))?;
        self.handler.abort();
        tracing::debug!("Chrome session closed");
        Ok(())
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("Chrome session dropped outside a runtime; browser left to exit on its own");
            return;
        };
        runtime.spawn(async move {
            if let Err(e) = browser.close().await {
                tracing::warn!(error = %e, "Chrome cleanup after drop failed");
                return;
            }
            let _ = browser.wait().await;
        });
    }
}

fn cdp(e: CdpError) -> FetchError {
    FetchError::Session(e.to_string())
}

/// Chrome user data directory for a named profile on this platform
pub fn profile_dir(profile_name: &str) -> Option<PathBuf> {
    let base = if cfg!(target_os = "windows") {
        PathBuf::from(std::env::var_os("LOCALAPPDATA")?)
            .join("Google")
            .join("Chrome")
            .join("User Data")
    } else if cfg!(target_os = "macos") {
        PathBuf::from(std::env::var_os("HOME")?)
            .join("Library")
            .join("Application Support")
            .join("Google")
            .join("Chrome")
    } else {
        PathBuf::from(std::env::var_os("HOME")?)
            .join(".config")
            .join("google-chrome")
    };
    Some(base.join(profile_name))
}

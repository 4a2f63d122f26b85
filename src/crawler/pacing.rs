//! Request pacing
//!
//! A single global gap between consecutive fetches. The gap is measured from
//! the completion of the previous fetch, so extraction and store time count
//! towards it.

use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Pacer {
    delay: Option<Duration>,
    last_fetch: Option<Instant>,
}

impl Pacer {
    /// `None` disables pacing
    pub fn new(delay: Option<Duration>) -> Self {
        Self {
            delay,
            last_fetch: None,
        }
    }

    /// Builds a pacer from the `request-delay` setting (seconds)
    pub fn from_secs(delay: Option<f64>) -> Self {
        Self::new(
            delay
                .filter(|secs| secs.is_finite() && *secs > 0.0)
                .map(Duration::from_secs_f64),
        )
    }

    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Waits until the next fetch may start
    ///
    /// Returns false if `cancel` fired while waiting.
    pub async fn wait_turn(&self, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let (Some(delay), Some(last)) = (self.delay, self.last_fetch) else {
            return true;
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = sleep_until(last + delay) => true,
        }
    }

    /// Records that a fetch just completed
    pub fn mark(&mut self) {
        self.last_fetch = Some(Instant::now());
    }
}

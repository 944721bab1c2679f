//! Ingest - best-effort usage event recording
//!
//! Writes are attempted with bounded retries and per-attempt timeouts, then
//! dropped with a logged error; ingestion must never fail or stall the
//! request that triggered it. Completion-side events are handed off to a
//! background task tracker so the response path does not wait on storage.

use crate::error::{Error, Result};
use crate::event::UsageEvent;
use crate::store::UsageStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

/// Default retry attempts before an event is dropped
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff between attempts
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(200);

/// Default per-attempt storage deadline
const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(5);

/// Best-effort recorder of usage events
///
/// Cloning is cheap; all clones share the store and the background task
/// tracker. Call [`UsageLogger::shutdown`] once at process exit to drain
/// detached writes — events still in flight when the process exits without a
/// drain are lost (accepted loss window).
#[derive(Clone)]
pub struct UsageLogger {
    store: Arc<dyn UsageStore>,
    tracker: TaskTracker,
    max_attempts: u32,
    base_delay: Duration,
    op_timeout: Duration,
}

impl UsageLogger {
    /// Create a logger over a storage backend with default retry settings
    #[must_use]
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self {
            store,
            tracker: TaskTracker::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    /// Override the retry policy
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_delay = base_delay;
        self
    }

    /// Override the per-attempt storage deadline
    #[must_use]
    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    /// Record an event, retrying transient storage failures.
    ///
    /// Returns the final error after the attempt cap is exhausted; callers
    /// on a request path should log it rather than propagate it.
    pub async fn record(&self, event: UsageEvent) -> Result<()> {
        record_with_retry(
            Arc::clone(&self.store),
            event,
            self.max_attempts,
            self.base_delay,
            self.op_timeout,
        )
        .await
    }

    /// Record an event without waiting for the write to finish.
    ///
    /// The write (including retries) runs on the shared task tracker; a
    /// failure after the retry cap is logged and the event dropped.
    pub fn record_detached(&self, event: UsageEvent) {
        let store = Arc::clone(&self.store);
        let (attempts, delay, timeout) = (self.max_attempts, self.base_delay, self.op_timeout);
        self.tracker.spawn(async move {
            if let Err(e) = record_with_retry(store, event, attempts, delay, timeout).await {
                error!(error = %e, "dropping usage event after exhausting retries");
            }
        });
    }

    /// Number of detached writes still in flight
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Stop accepting detached writes and wait for in-flight ones to finish
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn record_with_retry(
    store: Arc<dyn UsageStore>,
    event: UsageEvent,
    max_attempts: u32,
    base_delay: Duration,
    op_timeout: Duration,
) -> Result<()> {
    let mut delay = base_delay;
    let mut last_err = Error::Timeout(op_timeout);

    for attempt in 1..=max_attempts {
        match tokio::time::timeout(op_timeout, store.append(&event)).await {
            Ok(Ok(())) => {
                if attempt > 1 {
                    debug!(attempt, "usage event recorded after retry");
                }
                return Ok(());
            }
            Ok(Err(e)) => {
                warn!(attempt, max_attempts, error = %e, "usage event write failed");
                last_err = e;
            }
            Err(_) => {
                warn!(attempt, max_attempts, "usage event write timed out");
                last_err = Error::Timeout(op_timeout);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }

    Err(last_err)
}

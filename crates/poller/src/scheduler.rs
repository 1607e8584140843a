//! Restartable interval timer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

type RunFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Work run on every tick.
pub type PollFn = Arc<dyn Fn() -> RunFuture + Send + Sync>;

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Runs a callback immediately and then once per interval until stopped.
///
/// Starting again replaces the previous cycle, so at most one timer is ever
/// active. Each run is spawned as its own task: stopping the timer never
/// aborts a run in progress. A tick that arrives while the previous run is
/// still going is skipped.
#[derive(Clone, Default)]
pub struct PollScheduler {
    inner: Arc<Mutex<SchedulerInner>>,
}

#[derive(Default)]
struct SchedulerInner {
    cancel: Option<CancellationToken>,
    interval: Option<Duration>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new cycle, cancelling the active one first.
    pub async fn start<F, Fut>(&self, interval: Duration, callback: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: PollFn = Arc::new(move || -> RunFuture { Box::pin(callback()) });
        let interval = interval.max(MIN_INTERVAL);
        let mut inner = self.inner.lock().await;

        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }

        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());
        inner.interval = Some(interval);

        tokio::spawn(poll_loop(callback, interval, cancel));

        tracing::debug!(interval_ms = interval.as_millis() as u64, "poll scheduler started");
    }

    /// Stops the active cycle, if any. Runs already in progress finish.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
            inner.interval = None;
            tracing::debug!("poll scheduler stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.cancel.is_some()
    }

    /// Interval of the active cycle.
    pub async fn interval(&self) -> Option<Duration> {
        self.inner.lock().await.interval
    }
}

async fn poll_loop(callback: PollFn, interval: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let busy = Arc::new(AtomicBool::new(false));

    // The first tick completes immediately.
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if busy.swap(true, Ordering::AcqRel) {
                    tracing::debug!("previous poll still running, skipping tick");
                    continue;
                }
                let run = callback();
                let busy = Arc::clone(&busy);
                tokio::spawn(async move {
                    run.await;
                    busy.store(false, Ordering::Release);
                });
            }
        }
    }
}

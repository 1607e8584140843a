//! Keeps a poll cycle in step with the store's polling inputs.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use sohook_settings::clamp_refresh_interval;
use sohook_store::{StoreState, TelemetryStore};

use crate::scheduler::PollScheduler;

/// What the driver last configured the scheduler for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PollKey {
    auto_refresh: bool,
    connected: bool,
    interval_ms: u64,
}

impl PollKey {
    /// Connection flips are only taken into account once no request is
    /// outstanding; within a refresh cycle channels settle in any order and
    /// the connection state may toggle several times.
    fn observe(state: &StoreState, previous: Option<PollKey>) -> Self {
        let (auto_refresh, connected, interval_ms) = state.poll_key();
        let connected = match previous {
            Some(prev) if state.is_loading() => prev.connected,
            _ => connected,
        };
        Self {
            auto_refresh,
            connected,
            interval_ms,
        }
    }

    fn period(&self) -> Duration {
        Duration::from_millis(clamp_refresh_interval(self.interval_ms))
    }
}

/// Background task driving periodic refreshes of a [`TelemetryStore`].
///
/// Whenever auto-refresh, the connection state or the refresh interval
/// changes, the active cycle is stopped and, if auto-refresh is on and the
/// agent is connected, a fresh one is started that runs
/// [`TelemetryStore::refresh_all`] at once and then every interval.
///
/// With a reconnect probe configured, a disconnected store with auto-refresh
/// on is health-checked at that period instead, so polling resumes once the
/// agent comes back.
pub struct AutoRefresh {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl AutoRefresh {
    pub fn spawn(store: Arc<TelemetryStore>, reconnect_probe: Option<Duration>) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive(store, reconnect_probe, cancel.clone()));
        Self { cancel, handle }
    }

    /// Stops the driver and its scheduler. In-flight fetches still settle.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        let _ = self.handle.await;
    }
}

async fn drive(
    store: Arc<TelemetryStore>,
    reconnect_probe: Option<Duration>,
    cancel: CancellationToken,
) {
    let scheduler = PollScheduler::new();
    let mut updates = store.subscribe();
    let mut current: Option<PollKey> = None;

    loop {
        let key = PollKey::observe(&updates.borrow_and_update(), current);
        if current != Some(key) {
            current = Some(key);
            apply(&scheduler, &store, key, reconnect_probe).await;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    scheduler.stop().await;
    debug!("auto refresh driver stopped");
}

async fn apply(
    scheduler: &PollScheduler,
    store: &Arc<TelemetryStore>,
    key: PollKey,
    reconnect_probe: Option<Duration>,
) {
    scheduler.stop().await;

    match (key.auto_refresh, key.connected, reconnect_probe) {
        (true, true, _) => {
            let period = key.period();
            info!(interval_ms = period.as_millis() as u64, "auto refresh active");
            let store = Arc::clone(store);
            scheduler
                .start(period, move || {
                    let store = Arc::clone(&store);
                    async move { store.refresh_all().await }
                })
                .await;
        }
        (true, false, Some(probe)) => {
            info!(probe_ms = probe.as_millis() as u64, "agent unreachable, probing");
            let store = Arc::clone(store);
            scheduler
                .start(probe, move || {
                    let store = Arc::clone(&store);
                    async move {
                        store.check_connection().await;
                    }
                })
                .await;
        }
        _ => debug!(
            auto_refresh = key.auto_refresh,
            connected = key.connected,
            "auto refresh idle"
        ),
    }
}

use std::sync::Arc;

use chrono::Local;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use sohook_agent_client::Error;
use sohook_settings::{EndpointConfig, SettingsStore, clamp_refresh_interval};

use crate::api::{AgentApi, ApiFuture};
use crate::history::{MemoryHistory, MemorySample};
use crate::state::{Channel, ConnectionState, FetchOutcome, StoreState};

/// Process-wide holder of connection state and telemetry snapshots.
///
/// Every operation settles into [`StoreState`] and none of them return
/// transport errors; failures surface as `last_error` plus a disconnected
/// connection state.
pub struct TelemetryStore {
    api: Arc<dyn AgentApi>,
    settings: Option<SettingsStore>,
    state: watch::Sender<StoreState>,
}

impl TelemetryStore {
    /// Creates a store whose configuration lives in memory only.
    pub fn new(api: Arc<dyn AgentApi>, config: EndpointConfig) -> Self {
        Self::build(api, None, config)
    }

    /// Creates a store hydrated from `settings`, persisting every
    /// configuration change back to it.
    pub fn with_settings(api: Arc<dyn AgentApi>, settings: SettingsStore) -> Self {
        let config = settings.load();
        Self::build(api, Some(settings), config)
    }

    fn build(
        api: Arc<dyn AgentApi>,
        settings: Option<SettingsStore>,
        mut config: EndpointConfig,
    ) -> Self {
        if let Err(e) = api.set_endpoint(&config.server_url) {
            warn!(url = %config.server_url, error = %e, "ignoring configured server URL");
        }
        config.server_url = api.endpoint();
        info!(
            url = %config.server_url,
            auto_refresh = config.auto_refresh,
            interval_ms = config.refresh_interval,
            "telemetry store initialized"
        );

        let (state, _) = watch::channel(StoreState::new(config));
        Self {
            api,
            settings,
            state,
        }
    }

    /// Current state.
    pub fn state(&self) -> StoreState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<StoreState> {
        self.state.subscribe()
    }

    /// Recent allocation samples, oldest first.
    pub fn memory_history(&self) -> Vec<MemorySample> {
        self.state.borrow().history.to_vec()
    }

    // -- Fetches --

    pub async fn fetch_stats(&self) {
        self.fetch(Channel::Stats, self.api.memory_stats(), |state, stats| {
            let sample = MemorySample::from_stats(&stats, Local::now());
            if state.history.accepts(&sample) {
                Arc::make_mut(&mut state.history).record(sample);
            }
            replace_opt(&mut state.stats, stats)
        })
        .await
    }

    pub async fn fetch_leaks(&self) {
        self.fetch(Channel::Leaks, self.api.leaks(), |state, leaks| {
            replace(&mut state.leaks, leaks)
        })
        .await
    }

    pub async fn fetch_fd_stats(&self) {
        self.fetch(Channel::FdStats, self.api.fd_stats(), |state, stats| {
            replace_opt(&mut state.fd_stats, stats)
        })
        .await
    }

    pub async fn fetch_fd_leaks(&self) {
        self.fetch(Channel::FdLeaks, self.api.fd_leaks(), |state, leaks| {
            replace(&mut state.fd_leaks, leaks)
        })
        .await
    }

    /// Fetches all four channels concurrently.
    ///
    /// The whole batch counts as one outstanding request, so the error of a
    /// channel that settles early survives its siblings starting.
    pub async fn refresh_all(&self) {
        self.begin(None);
        tokio::join!(
            self.fetch_stats(),
            self.fetch_leaks(),
            self.fetch_fd_stats(),
            self.fetch_fd_leaks(),
        );
        self.finish();
    }

    /// Resets the agent's counters, then re-fetches every channel whether or
    /// not the reset succeeded.
    pub async fn reset_stats(&self) {
        self.begin(None);
        let result = self.api.reset().await;
        if result.is_ok() {
            self.state
                .send_modify(|state| state.history = Arc::new(MemoryHistory::default()));
        }
        self.finish();
        match &result {
            Ok(()) => info!("agent counters reset"),
            Err(e) => warn!(kind = ?e.kind(), error = %e, "reset failed"),
        }

        self.refresh_all().await;

        if let Err(e) = result {
            self.state
                .send_modify(|state| state.last_error = Some(format!("reset: {e}")));
        }
    }

    /// Probes the agent and records the outcome. Never fails.
    pub async fn check_connection(&self) -> bool {
        let ok = self.api.health().await;
        let next = if ok {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        self.state.send_if_modified(|state| {
            let changed = state.connection != next;
            state.connection = next;
            changed
        });
        debug!(ok, "health check");
        ok
    }

    pub async fn fetch_leak_report(&self) -> Option<String> {
        self.report("leak-report", self.api.leak_report()).await
    }

    pub async fn fetch_fd_leak_report(&self) -> Option<String> {
        self.report("fd-leak-report", self.api.fd_leak_report()).await
    }

    // -- Configuration --

    /// Points the client at `url` and persists it.
    ///
    /// Does not probe the new endpoint; call
    /// [`check_connection`](Self::check_connection) afterwards.
    pub fn set_server_url(&self, url: &str) -> Result<(), Error> {
        if let Err(e) = self.api.set_endpoint(url) {
            warn!(url, error = %e, "rejected server URL");
            self.state
                .send_modify(|state| state.last_error = Some(format!("config: {e}")));
            return Err(e);
        }
        let endpoint = self.api.endpoint();
        info!(url = %endpoint, "server URL updated");
        self.update_config(|config| config.server_url = endpoint);
        Ok(())
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.update_config(|config| config.auto_refresh = enabled);
    }

    /// Sets the poll period. `0` selects the default; small values are
    /// raised to the minimum.
    pub fn set_refresh_interval(&self, ms: u64) {
        let ms = clamp_refresh_interval(ms);
        self.update_config(|config| config.refresh_interval = ms);
    }

    fn update_config(&self, apply: impl FnOnce(&mut EndpointConfig)) {
        let changed = self.state.send_if_modified(|state| {
            let before = state.config.clone();
            apply(&mut state.config);
            state.config != before
        });
        if !changed {
            return;
        }

        let config = self.state.borrow().config.clone();
        debug!(?config, "configuration changed");
        if let Some(settings) = &self.settings
            && let Err(e) = settings.save(&config)
        {
            warn!(path = %settings.path().display(), error = %e, "failed to persist settings");
        }
    }

    // -- Request bookkeeping --

    /// Marks a request as issued and returns its channel ticket.
    ///
    /// The previous error is cleared only when nothing else is outstanding.
    fn begin(&self, channel: Option<Channel>) -> u64 {
        let mut ticket = 0;
        self.state.send_modify(|state| {
            if state.pending == 0 {
                state.last_error = None;
            }
            state.pending += 1;
            if let Some(channel) = channel {
                let slot = state.channel_mut(channel);
                slot.issued += 1;
                slot.in_flight += 1;
                ticket = slot.issued;
            }
        });
        ticket
    }

    fn finish(&self) {
        self.state
            .send_modify(|state| state.pending = state.pending.saturating_sub(1));
    }

    async fn fetch<T>(
        &self,
        channel: Channel,
        request: ApiFuture<'_, T>,
        commit: impl FnOnce(&mut StoreState, T) -> bool,
    ) {
        let ticket = self.begin(Some(channel));
        let result = request.await;

        self.state.send_modify(|state| {
            state.pending = state.pending.saturating_sub(1);
            let slot = state.channel_mut(channel);
            slot.in_flight = slot.in_flight.saturating_sub(1);

            match result {
                Ok(value) => {
                    slot.last_outcome = Some(FetchOutcome::Fetched);
                    let fresh = ticket > slot.committed;
                    if fresh {
                        slot.committed = ticket;
                    }
                    state.connection = ConnectionState::Connected;
                    if fresh {
                        let changed = commit(state, value);
                        debug!(%channel, ticket, changed, "fetched");
                    } else {
                        debug!(%channel, ticket, "discarding response older than committed snapshot");
                    }
                }
                Err(e) => {
                    slot.last_outcome = Some(FetchOutcome::Failed);
                    warn!(%channel, kind = ?e.kind(), error = %e, "fetch failed");
                    state.connection = ConnectionState::Disconnected;
                    state.last_error = Some(format!("{channel}: {e}"));
                }
            }
        });
    }

    async fn report(&self, name: &'static str, request: ApiFuture<'_, String>) -> Option<String> {
        self.begin(None);
        let result = request.await;

        let mut report = None;
        self.state.send_modify(|state| {
            state.pending = state.pending.saturating_sub(1);
            match result {
                Ok(text) => {
                    state.connection = ConnectionState::Connected;
                    report = Some(text);
                }
                Err(e) => {
                    warn!(report = name, kind = ?e.kind(), error = %e, "report fetch failed");
                    state.connection = ConnectionState::Disconnected;
                    state.last_error = Some(format!("{name}: {e}"));
                }
            }
        });
        report
    }
}

/// Swaps in `value` unless it equals the current snapshot. Returns whether
/// the snapshot changed.
fn replace<T: PartialEq>(slot: &mut Arc<T>, value: T) -> bool {
    if **slot == value {
        return false;
    }
    *slot = Arc::new(value);
    true
}

fn replace_opt<T: PartialEq>(slot: &mut Option<Arc<T>>, value: T) -> bool {
    match slot {
        Some(current) => replace(current, value),
        None => {
            *slot = Some(Arc::new(value));
            true
        }
    }
}

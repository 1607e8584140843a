//! Observable store state.

use std::fmt;
use std::sync::Arc;

use sohook_protocol::{FdLeak, FdStats, LeakGroup, LeakTotals, MemoryStats};
use sohook_settings::EndpointConfig;

use crate::history::MemoryHistory;

/// Reachability of the agent, as of the most recently settled request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing has settled yet.
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

/// One independently fetched telemetry channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Stats,
    Leaks,
    FdStats,
    FdLeaks,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Stats,
        Channel::Leaks,
        Channel::FdStats,
        Channel::FdLeaks,
    ];

    fn index(self) -> usize {
        match self {
            Channel::Stats => 0,
            Channel::Leaks => 1,
            Channel::FdStats => 2,
            Channel::FdLeaks => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Stats => "stats",
            Channel::Leaks => "leaks",
            Channel::FdStats => "fd-stats",
            Channel::FdLeaks => "fd-leaks",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a channel has a request outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPhase {
    Idle,
    Fetching,
}

/// How the last settled request on a channel ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    Failed,
}

/// Per-channel request bookkeeping.
///
/// Every fetch takes a ticket when issued. A successful response is only
/// committed if no later-issued ticket has committed already, so a slow
/// response can never overwrite a fresher one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelState {
    pub in_flight: usize,
    pub last_outcome: Option<FetchOutcome>,
    pub(crate) issued: u64,
    pub(crate) committed: u64,
}

impl ChannelState {
    pub fn phase(&self) -> ChannelPhase {
        if self.in_flight > 0 {
            ChannelPhase::Fetching
        } else {
            ChannelPhase::Idle
        }
    }
}

/// Snapshot of everything the dashboard renders.
///
/// Telemetry values sit behind `Arc`s. A fetch that returns a value equal to
/// the current one keeps the existing `Arc`, so readers can use
/// [`Arc::ptr_eq`] to skip redrawing unchanged panels.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub connection: ConnectionState,
    pub stats: Option<Arc<MemoryStats>>,
    pub leaks: Arc<Vec<LeakGroup>>,
    pub fd_stats: Option<Arc<FdStats>>,
    pub fd_leaks: Arc<Vec<FdLeak>>,
    /// Message of the most recent failure; cleared when a request is issued.
    pub last_error: Option<String>,
    pub config: EndpointConfig,
    pub history: Arc<MemoryHistory>,
    pub(crate) pending: usize,
    pub(crate) channels: [ChannelState; 4],
}

impl StoreState {
    pub(crate) fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    /// True while any request issued through the store is outstanding.
    pub fn is_loading(&self) -> bool {
        self.pending > 0
    }

    pub fn channel(&self, channel: Channel) -> &ChannelState {
        &self.channels[channel.index()]
    }

    pub(crate) fn channel_mut(&mut self, channel: Channel) -> &mut ChannelState {
        &mut self.channels[channel.index()]
    }

    pub fn leak_totals(&self) -> LeakTotals {
        LeakTotals::of(&self.leaks)
    }

    /// The polling inputs: (auto refresh enabled, connected, interval ms).
    pub fn poll_key(&self) -> (bool, bool, u64) {
        (
            self.config.auto_refresh,
            self.is_connected(),
            self.config.refresh_interval,
        )
    }
}

use std::time::Duration;

use serde::{Deserialize, Serialize};

use sohook_protocol::constants::DEFAULT_SERVER_URL;

/// Poll period used when none is configured (or `0` is given).
pub const DEFAULT_REFRESH_INTERVAL_MS: u64 = 2000;

/// Shortest poll period accepted.
pub const MIN_REFRESH_INTERVAL_MS: u64 = 250;

/// Agent endpoint and polling configuration.
///
/// Serialized with the same camelCase keys the web dashboard used, so a
/// `{serverUrl, autoRefresh, refreshInterval}` blob loads unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    /// Base URL of the agent's web server.
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Poll the agent automatically while connected.
    #[serde(default = "default_true")]
    pub auto_refresh: bool,

    /// Poll period in milliseconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.into()
}

fn default_true() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            auto_refresh: default_true(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl EndpointConfig {
    /// The poll period as a [`Duration`], after clamping.
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(clamp_refresh_interval(self.refresh_interval))
    }
}

/// `0` selects the default; anything else is raised to the minimum.
pub fn clamp_refresh_interval(ms: u64) -> u64 {
    match ms {
        0 => DEFAULT_REFRESH_INTERVAL_MS,
        v => v.max(MIN_REFRESH_INTERVAL_MS),
    }
}

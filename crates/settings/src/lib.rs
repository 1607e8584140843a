//! Dashboard settings persisted between sessions.
//!
//! Only the agent endpoint and the polling configuration are stored;
//! telemetry is never written to disk.

pub mod config;
pub mod storage;

pub use config::{
    DEFAULT_REFRESH_INTERVAL_MS, EndpointConfig, MIN_REFRESH_INTERVAL_MS, clamp_refresh_interval,
};
pub use storage::{SettingsError, SettingsStore, default_storage_path};

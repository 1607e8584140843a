//! Telemetry store for the SoHook dashboard.
//!
//! Owns the connection state and the latest snapshot of each telemetry
//! channel, and turns agent fetch outcomes into state transitions. Readers
//! get cheap clones of [`StoreState`] or subscribe to changes.

pub mod api;
pub mod history;
pub mod state;
pub mod store;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use api::{AgentApi, ApiFuture};
pub use history::{HISTORY_CAPACITY, MemoryHistory, MemorySample};
pub use state::{Channel, ChannelPhase, ChannelState, ConnectionState, FetchOutcome, StoreState};
pub use store::TelemetryStore;

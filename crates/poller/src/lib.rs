//! Periodic refresh of the telemetry store.
//!
//! [`PollScheduler`] is a restartable interval timer. [`AutoRefresh`] watches
//! the store and keeps exactly one scheduler cycle matching its polling
//! configuration and connection state.

pub mod auto_refresh;
pub mod scheduler;

pub use auto_refresh::AutoRefresh;
pub use scheduler::PollScheduler;

//! Seam between the store and the transport.

use std::future::Future;
use std::pin::Pin;

use sohook_agent_client::{Client, Error};
use sohook_protocol::{FdLeak, FdStats, LeakGroup, MemoryStats};

/// Boxed future returned by [`AgentApi`] operations.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// Agent operations the store depends on.
///
/// Implemented for the HTTP [`Client`]; tests substitute a scripted agent.
pub trait AgentApi: Send + Sync {
    /// Points subsequent requests at `url`.
    fn set_endpoint(&self, url: &str) -> Result<(), Error>;

    /// The normalized base URL currently in use.
    fn endpoint(&self) -> String;

    fn memory_stats(&self) -> ApiFuture<'_, MemoryStats>;

    fn leaks(&self) -> ApiFuture<'_, Vec<LeakGroup>>;

    fn fd_stats(&self) -> ApiFuture<'_, FdStats>;

    fn fd_leaks(&self) -> ApiFuture<'_, Vec<FdLeak>>;

    fn leak_report(&self) -> ApiFuture<'_, String>;

    fn fd_leak_report(&self) -> ApiFuture<'_, String>;

    fn reset(&self) -> ApiFuture<'_, ()>;

    /// Liveness probe. Never fails; unreachable means `false`.
    fn health(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

impl AgentApi for Client {
    fn set_endpoint(&self, url: &str) -> Result<(), Error> {
        Client::set_endpoint(self, url)
    }

    fn endpoint(&self) -> String {
        Client::endpoint(self)
    }

    fn memory_stats(&self) -> ApiFuture<'_, MemoryStats> {
        Box::pin(self.get_memory_stats())
    }

    fn leaks(&self) -> ApiFuture<'_, Vec<LeakGroup>> {
        Box::pin(self.get_leaks())
    }

    fn fd_stats(&self) -> ApiFuture<'_, FdStats> {
        Box::pin(self.get_fd_stats())
    }

    fn fd_leaks(&self) -> ApiFuture<'_, Vec<FdLeak>> {
        Box::pin(self.get_fd_leaks())
    }

    fn leak_report(&self) -> ApiFuture<'_, String> {
        Box::pin(self.get_leak_report())
    }

    fn fd_leak_report(&self) -> ApiFuture<'_, String> {
        Box::pin(self.get_fd_leak_report())
    }

    fn reset(&self) -> ApiFuture<'_, ()> {
        Box::pin(self.reset_stats())
    }

    fn health(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(self.health_check())
    }
}

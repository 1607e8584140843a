//! Scriptable in-memory agent for tests.
//!
//! Each operation has a [`Script`] holding a sticky reply, plus optional
//! queued replies that wait on a gate before resolving. Call counts are
//! recorded per operation.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::oneshot;

use sohook_agent_client::Error;
use sohook_protocol::constants::DEFAULT_SERVER_URL;
use sohook_protocol::{FdLeak, FdStats, LeakGroup, MemoryStats};

use crate::api::{AgentApi, ApiFuture};

/// A scripted failure, turned into an [`Error`] when served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Envelope with a non-zero code.
    Agent { code: i64, message: String },
    /// Non-2xx response without a usable envelope.
    Status(u16),
}

impl Failure {
    pub fn agent(message: &str) -> Self {
        Failure::Agent {
            code: 500,
            message: message.into(),
        }
    }

    fn into_error(self) -> Error {
        match self {
            Failure::Agent { code, message } => Error::Agent { code, message },
            Failure::Status(status) => Error::Status {
                status,
                body: "Not Found".into(),
            },
        }
    }
}

pub type Reply<T> = Result<T, Failure>;

struct Queued<T> {
    reply: Reply<T>,
    gate: oneshot::Receiver<()>,
}

struct ScriptInner<T> {
    sticky: Reply<T>,
    queued: VecDeque<Queued<T>>,
    calls: usize,
}

/// Replies for one agent operation.
pub struct Script<T> {
    inner: Mutex<ScriptInner<T>>,
}

impl<T: Clone + Send> Script<T> {
    pub fn new(reply: Reply<T>) -> Self {
        Self {
            inner: Mutex::new(ScriptInner {
                sticky: reply,
                queued: VecDeque::new(),
                calls: 0,
            }),
        }
    }

    /// Replaces the reply used when nothing is queued.
    pub fn set(&self, reply: Reply<T>) {
        self.inner.lock().unwrap().sticky = reply;
    }

    /// Queues `reply` for the next call. The call does not resolve until the
    /// returned sender fires or is dropped.
    pub fn hold(&self, reply: Reply<T>) -> oneshot::Sender<()> {
        let (tx, gate) = oneshot::channel();
        self.inner
            .lock()
            .unwrap()
            .queued
            .push_back(Queued { reply, gate });
        tx
    }

    pub fn calls(&self) -> usize {
        self.inner.lock().unwrap().calls
    }

    async fn serve(&self) -> Result<T, Error> {
        let (reply, gate) = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls += 1;
            match inner.queued.pop_front() {
                Some(q) => (q.reply, Some(q.gate)),
                None => (inner.sticky.clone(), None),
            }
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        reply.map_err(Failure::into_error)
    }
}

/// In-memory [`AgentApi`] with per-operation scripts.
pub struct ScriptedAgent {
    endpoint: Mutex<String>,
    healthy: AtomicBool,
    health_calls: AtomicUsize,
    pub stats: Script<MemoryStats>,
    pub leaks: Script<Vec<LeakGroup>>,
    pub fd_stats: Script<FdStats>,
    pub fd_leaks: Script<Vec<FdLeak>>,
    pub leak_report: Script<String>,
    pub fd_leak_report: Script<String>,
    pub reset: Script<()>,
}

impl Default for ScriptedAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedAgent {
    /// A healthy agent answering every call with empty telemetry.
    pub fn new() -> Self {
        Self {
            endpoint: Mutex::new(DEFAULT_SERVER_URL.into()),
            healthy: AtomicBool::new(true),
            health_calls: AtomicUsize::new(0),
            stats: Script::new(Ok(MemoryStats::default())),
            leaks: Script::new(Ok(Vec::new())),
            fd_stats: Script::new(Ok(FdStats::default())),
            fd_leaks: Script::new(Ok(Vec::new())),
            leak_report: Script::new(Ok(String::new())),
            fd_leak_report: Script::new(Ok(String::new())),
            reset: Script::new(Ok(())),
        }
    }

    /// Makes every telemetry channel fail with `failure`.
    pub fn fail_channels(&self, failure: Failure) {
        self.stats.set(Err(failure.clone()));
        self.leaks.set(Err(failure.clone()));
        self.fd_stats.set(Err(failure.clone()));
        self.fd_leaks.set(Err(failure));
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    /// Total telemetry channel calls so far.
    pub fn channel_calls(&self) -> usize {
        self.stats.calls() + self.leaks.calls() + self.fd_stats.calls() + self.fd_leaks.calls()
    }
}

impl AgentApi for ScriptedAgent {
    fn set_endpoint(&self, url: &str) -> Result<(), Error> {
        let url = url.trim().trim_end_matches('/');
        if url.is_empty() {
            return Err(Error::EmptyEndpoint);
        }
        *self.endpoint.lock().unwrap() = url.to_string();
        Ok(())
    }

    fn endpoint(&self) -> String {
        self.endpoint.lock().unwrap().clone()
    }

    fn memory_stats(&self) -> ApiFuture<'_, MemoryStats> {
        Box::pin(self.stats.serve())
    }

    fn leaks(&self) -> ApiFuture<'_, Vec<LeakGroup>> {
        Box::pin(self.leaks.serve())
    }

    fn fd_stats(&self) -> ApiFuture<'_, FdStats> {
        Box::pin(self.fd_stats.serve())
    }

    fn fd_leaks(&self) -> ApiFuture<'_, Vec<FdLeak>> {
        Box::pin(self.fd_leaks.serve())
    }

    fn leak_report(&self) -> ApiFuture<'_, String> {
        Box::pin(self.leak_report.serve())
    }

    fn fd_leak_report(&self) -> ApiFuture<'_, String> {
        Box::pin(self.fd_leak_report.serve())
    }

    fn reset(&self) -> ApiFuture<'_, ()> {
        Box::pin(self.reset.serve())
    }

    fn health(&self) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        let healthy = self.healthy.load(Ordering::SeqCst);
        Box::pin(async move { healthy })
    }
}

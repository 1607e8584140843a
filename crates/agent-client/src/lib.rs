//! HTTP client for the SoHook agent.
//!
//! Wraps the agent's `/api/*` endpoints behind typed async calls and folds
//! every failure into [`Error`], classified by [`ErrorKind`].

pub mod client;
pub mod error;

pub use client::Client;
pub use error::{Error, ErrorKind};

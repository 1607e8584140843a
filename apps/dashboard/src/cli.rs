//! Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Live memory and file descriptor leak dashboard for a SoHook agent.
#[derive(Parser, Debug)]
#[command(name = "sohook-dashboard")]
#[command(version)]
#[command(about = "Watch SoHook leak telemetry from a device", long_about = None)]
pub struct Cli {
    /// Agent URL for this session (stored setting is left untouched)
    #[arg(short, long, global = true)]
    pub server: Option<String>,

    /// Refresh interval in milliseconds for this session
    #[arg(short, long, global = true)]
    pub interval: Option<u64>,

    /// Disable automatic refresh for this session
    #[arg(long, global = true)]
    pub no_auto_refresh: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Cli {
    /// Whether any session-only override was given.
    pub fn has_overrides(&self) -> bool {
        self.server.is_some() || self.interval.is_some() || self.no_auto_refresh
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Poll the agent and redraw on every change (default)
    Watch,

    /// Fetch everything once and print it
    Snapshot,

    /// Reset the agent's counters, then print fresh telemetry
    Reset,

    /// Print one of the agent's plain-text leak reports
    Report {
        #[arg(value_enum, default_value_t = ReportKind::Memory)]
        kind: ReportKind,
    },

    /// Show or change the stored settings
    Config {
        /// Agent URL to store
        #[arg(long = "set-server")]
        server: Option<String>,

        /// Refresh interval to store, in milliseconds (0 = default)
        #[arg(long = "set-interval")]
        interval: Option<u64>,

        /// Whether to refresh automatically
        #[arg(long = "set-auto-refresh")]
        auto_refresh: Option<bool>,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Memory,
    Fd,
}

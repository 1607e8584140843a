//! SoHook dashboard entry point.

mod app;
mod cli;
mod render;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the dashboard itself.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting SoHook dashboard"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(app::run(cli))?;

    tracing::info!("dashboard shut down cleanly");
    Ok(())
}

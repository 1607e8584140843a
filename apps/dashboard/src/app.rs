//! Wires the client, store and auto-refresh driver together.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use sohook_agent_client::Client;
use sohook_poller::AutoRefresh;
use sohook_settings::{SettingsStore, clamp_refresh_interval};
use sohook_store::{StoreState, TelemetryStore};

use crate::cli::{Cli, Command, ReportKind};
use crate::render;

/// Period of the health probe while the agent is unreachable.
const RECONNECT_PROBE: Duration = Duration::from_secs(3);

/// Runs the selected command until it completes or Ctrl-C.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = match &cli.config {
        Some(path) => SettingsStore::new(path.clone()),
        None => SettingsStore::open_default().context("locating settings file")?,
    };
    tracing::debug!(path = %settings.path().display(), "settings file");

    let client = Client::with_default_endpoint().context("building HTTP client")?;
    let store = Arc::new(build_store(&cli, Arc::new(client), settings)?);

    match cli.command.clone().unwrap_or(Command::Watch) {
        Command::Watch => watch(store).await,
        Command::Snapshot => snapshot(&store).await,
        Command::Reset => reset(&store).await,
        Command::Report { kind } => report(&store, kind).await,
        Command::Config {
            server,
            interval,
            auto_refresh,
        } => {
            print!("{}", configure(&store, server, interval, auto_refresh).await?);
            Ok(())
        }
    }
}

/// Stored settings are used as-is; session overrides are applied to an
/// in-memory copy so they never overwrite the settings file.
fn build_store(
    cli: &Cli,
    api: Arc<Client>,
    settings: SettingsStore,
) -> anyhow::Result<TelemetryStore> {
    let overrides_config = matches!(cli.command, Some(Command::Config { .. }));
    if !cli.has_overrides() || overrides_config {
        return Ok(TelemetryStore::with_settings(api, settings));
    }

    let mut config = settings.load();
    if let Some(interval) = cli.interval {
        config.refresh_interval = clamp_refresh_interval(interval);
    }
    if cli.no_auto_refresh {
        config.auto_refresh = false;
    }
    let store = TelemetryStore::new(api, config);
    if let Some(server) = &cli.server {
        store
            .set_server_url(server)
            .with_context(|| format!("invalid server URL {server:?}"))?;
    }
    Ok(store)
}

async fn watch(store: Arc<TelemetryStore>) -> anyhow::Result<()> {
    if !store.state().config.auto_refresh && store.check_connection().await {
        store.refresh_all().await;
    }

    let driver = AutoRefresh::spawn(Arc::clone(&store), Some(RECONNECT_PROBE));
    let mut updates = store.subscribe();
    let mut shown: Option<StoreState> = None;

    loop {
        let state = updates.borrow_and_update().clone();
        if !state.is_loading()
            && shown
                .as_ref()
                .is_none_or(|prev| render::needs_redraw(prev, &state))
        {
            draw(&state)?;
            shown = Some(state);
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("SIGINT received, shutting down");
                break;
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    driver.shutdown().await;
    Ok(())
}

fn draw(state: &StoreState) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    // Clear screen, cursor home.
    write!(stdout, "\x1b[2J\x1b[H{}", render::render(state))?;
    stdout.flush()?;
    Ok(())
}

async fn snapshot(store: &TelemetryStore) -> anyhow::Result<()> {
    if !store.check_connection().await {
        bail!("agent at {} is unreachable", store.state().config.server_url);
    }
    store.refresh_all().await;
    print!("{}", render::render(&store.state()));
    Ok(())
}

async fn reset(store: &TelemetryStore) -> anyhow::Result<()> {
    store.reset_stats().await;
    let state = store.state();
    print!("{}", render::render(&state));
    if let Some(err) = state.last_error {
        bail!(err);
    }
    Ok(())
}

async fn report(store: &TelemetryStore, kind: ReportKind) -> anyhow::Result<()> {
    let text = match kind {
        ReportKind::Memory => store.fetch_leak_report().await,
        ReportKind::Fd => store.fetch_fd_leak_report().await,
    };
    match text {
        Some(text) => {
            println!("{text}");
            Ok(())
        }
        None => bail!(
            store
                .state()
                .last_error
                .unwrap_or_else(|| "report unavailable".into())
        ),
    }
}

/// Applies the requested settings and describes the result. A new server
/// URL is health-checked right after it is saved.
async fn configure(
    store: &TelemetryStore,
    server: Option<String>,
    interval: Option<u64>,
    auto_refresh: Option<bool>,
) -> anyhow::Result<String> {
    let mut reachable = None;
    if let Some(server) = server {
        store
            .set_server_url(&server)
            .with_context(|| format!("invalid server URL {server:?}"))?;
        reachable = Some(store.check_connection().await);
    }
    if let Some(interval) = interval {
        store.set_refresh_interval(interval);
    }
    if let Some(enabled) = auto_refresh {
        store.set_auto_refresh(enabled);
    }

    let config = store.state().config;
    let mut out = format!(
        "server        {}\nauto-refresh  {}\ninterval      {} ms\n",
        config.server_url, config.auto_refresh, config.refresh_interval
    );
    match reachable {
        Some(true) => out.push_str("connection    ok\n"),
        Some(false) => out.push_str("connection    unreachable\n"),
        None => {}
    }
    Ok(out)
}

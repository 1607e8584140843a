//! Plain-text rendering of the store state.

use std::fmt::Write;
use std::sync::Arc;

use sohook_protocol::format::format_bytes;
use sohook_store::{ConnectionState, MemoryHistory, StoreState};

/// Leak groups listed before the rest are summarized.
const MAX_GROUPS: usize = 10;
/// Backtrace frames shown per leak group.
const MAX_FRAMES: usize = 4;
const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Whether `next` would render differently from `prev`.
///
/// Snapshots the store did not replace keep their `Arc`, so pointer
/// equality is enough for them.
pub fn needs_redraw(prev: &StoreState, next: &StoreState) -> bool {
    prev.connection != next.connection
        || prev.last_error != next.last_error
        || prev.config != next.config
        || !opt_ptr_eq(&prev.stats, &next.stats)
        || !opt_ptr_eq(&prev.fd_stats, &next.fd_stats)
        || !Arc::ptr_eq(&prev.leaks, &next.leaks)
        || !Arc::ptr_eq(&prev.fd_leaks, &next.fd_leaks)
        || !Arc::ptr_eq(&prev.history, &next.history)
}

fn opt_ptr_eq<T>(a: &Option<Arc<T>>, b: &Option<Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

pub fn render(state: &StoreState) -> String {
    let mut out = String::new();
    header(&mut out, state);
    memory(&mut out, state);
    leaks(&mut out, state);
    fds(&mut out, state);
    out
}

fn header(out: &mut String, state: &StoreState) {
    let status = match state.connection {
        ConnectionState::Connected => "connected",
        ConnectionState::Disconnected => "disconnected",
        ConnectionState::Unknown => "connecting",
    };
    let refresh = if state.config.auto_refresh {
        format!("auto-refresh {} ms", state.config.refresh_interval)
    } else {
        "auto-refresh off".to_string()
    };
    let _ = writeln!(out, "SoHook @ {}  [{status}]  {refresh}", state.config.server_url);
    if let Some(err) = &state.last_error {
        let _ = writeln!(out, "error: {err}");
    }
}

fn memory(out: &mut String, state: &StoreState) {
    let _ = writeln!(out, "\nMemory");
    let Some(stats) = &state.stats else {
        let _ = writeln!(out, "  no data");
        return;
    };
    let _ = writeln!(
        out,
        "  current    {:>10} allocs  {:>12}",
        stats.current_alloc_count,
        format_bytes(stats.current_alloc_size)
    );
    let _ = writeln!(
        out,
        "  allocated  {:>10} allocs  {:>12}",
        stats.total_alloc_count,
        format_bytes(stats.total_alloc_size)
    );
    let _ = writeln!(
        out,
        "  freed      {:>10} frees   {:>12}",
        stats.total_free_count,
        format_bytes(stats.total_free_size)
    );
    if let Some(last) = state.history.last() {
        let _ = writeln!(
            out,
            "  trend      {}  (peak {}, {})",
            sparkline(&state.history),
            format_bytes(state.history.peak_size()),
            last.at.format("%H:%M:%S")
        );
    }
}

fn leaks(out: &mut String, state: &StoreState) {
    let totals = state.leak_totals();
    let _ = writeln!(
        out,
        "\nLeaks  {} groups, {} allocations, {}",
        totals.groups,
        totals.count,
        format_bytes(totals.total_size)
    );
    for (i, group) in state.leaks.iter().take(MAX_GROUPS).enumerate() {
        let _ = writeln!(
            out,
            "  #{:<3} {} x  {}",
            i + 1,
            group.count,
            format_bytes(group.total_size)
        );
        for frame in group.backtrace.iter().take(MAX_FRAMES) {
            let _ = writeln!(out, "         {frame}");
        }
        if group.backtrace.len() > MAX_FRAMES {
            let _ = writeln!(
                out,
                "         ... {} more frames",
                group.backtrace.len() - MAX_FRAMES
            );
        }
    }
    if state.leaks.len() > MAX_GROUPS {
        let _ = writeln!(out, "  ... {} more groups", state.leaks.len() - MAX_GROUPS);
    }
}

fn fds(out: &mut String, state: &StoreState) {
    let _ = writeln!(out, "\nFile descriptors");
    match &state.fd_stats {
        Some(s) => {
            let _ = writeln!(
                out,
                "  open {}  (opened {}, closed {})",
                s.current_open_count, s.total_open_count, s.total_close_count
            );
        }
        None => {
            let _ = writeln!(out, "  no data");
        }
    }
    for leak in state.fd_leaks.iter() {
        let _ = writeln!(
            out,
            "  fd {:<5} {}  [{}]",
            leak.fd,
            leak.path,
            leak.flags_description()
        );
    }
}

fn sparkline(history: &MemoryHistory) -> String {
    let peak = history.peak_size();
    history
        .iter()
        .map(|s| {
            if peak == 0 {
                SPARK[0]
            } else {
                let level = s.current_alloc_size.saturating_mul(7) / peak;
                SPARK[level.min(7) as usize]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use sohook_protocol::{FdLeak, FdStats, LeakGroup, MemoryStats};
    use sohook_settings::EndpointConfig;
    use sohook_store::TelemetryStore;
    use sohook_store::testing::ScriptedAgent;

    async fn populated() -> (Arc<ScriptedAgent>, TelemetryStore) {
        let agent = Arc::new(ScriptedAgent::new());
        agent.stats.set(Ok(MemoryStats {
            total_alloc_count: 10,
            total_alloc_size: 2048,
            total_free_count: 7,
            total_free_size: 1952,
            current_alloc_count: 3,
            current_alloc_size: 96,
        }));
        agent.leaks.set(Ok(vec![LeakGroup {
            backtrace: vec!["a".into(), "b".into()],
            count: 3,
            total_size: 96,
        }]));
        agent.fd_stats.set(Ok(FdStats {
            total_open_count: 5,
            total_close_count: 3,
            current_open_count: 2,
        }));
        agent.fd_leaks.set(Ok(vec![FdLeak {
            fd: 42,
            path: "/data/local/tmp/x.log".into(),
            flags: 0o102,
        }]));
        let store = TelemetryStore::new(agent.clone(), EndpointConfig::default());
        store.refresh_all().await;
        (agent, store)
    }

    #[tokio::test]
    async fn renders_all_sections() {
        let (_agent, store) = populated().await;
        let text = render(&store.state());

        assert!(text.starts_with("SoHook @ http://localhost:8080  [connected]  auto-refresh 2000 ms"));
        assert!(text.contains("96.00 B"));
        assert!(text.contains("Leaks  1 groups, 3 allocations, 96.00 B"));
        assert!(text.contains("         a\n         b\n"));
        assert!(text.contains("open 2  (opened 5, closed 3)"));
        assert!(text.contains("fd 42    /data/local/tmp/x.log  [O_RDWR | O_CREAT]"));
        assert!(text.contains("trend"));
        assert!(!text.contains("error:"));
    }

    #[test]
    fn renders_empty_state() {
        let text = render(&StoreState::default());
        assert!(text.contains("[connecting]"));
        assert_eq!(text.matches("no data").count(), 2);
        assert!(text.contains("Leaks  0 groups, 0 allocations, 0 B"));
    }

    #[tokio::test]
    async fn renders_error_line() {
        let (agent, store) = populated().await;
        agent.stats.set(Err(sohook_store::testing::Failure::agent("boom")));
        store.fetch_stats().await;

        let text = render(&store.state());
        assert!(text.contains("[disconnected]"));
        assert!(text.contains("error: stats: agent error 500: boom"));
        // Last good snapshot is still shown.
        assert!(text.contains("96.00 B"));
    }

    #[tokio::test]
    async fn redraw_only_on_change() {
        let (_agent, store) = populated().await;
        let before = store.state();

        store.refresh_all().await;
        assert!(!needs_redraw(&before, &store.state()));

        store.set_auto_refresh(false);
        assert!(needs_redraw(&before, &store.state()));
    }

    #[test]
    fn sparkline_scales_to_peak() {
        let mut history = MemoryHistory::default();
        for size in [0, 50, 100] {
            history.record(sohook_store::MemorySample {
                at: chrono::Local::now(),
                current_alloc_size: size,
                current_alloc_count: size,
            });
        }
        assert_eq!(sparkline(&history), "▁▄█");
    }
}

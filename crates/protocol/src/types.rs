use serde::{Deserialize, Serialize};

use crate::{format, num};

/// Allocation counters reported by the agent.
///
/// `current_*` values are authoritative as sent; they are never derived
/// locally from the totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_alloc_count: u64,
    pub total_alloc_size: u64,
    pub total_free_count: u64,
    pub total_free_size: u64,
    pub current_alloc_count: u64,
    pub current_alloc_size: u64,
}

/// Leaked allocations sharing one call stack, aggregated by the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeakGroup {
    #[serde(default)]
    pub backtrace: Vec<String>,
    #[serde(deserialize_with = "num::u64_lenient")]
    pub count: u64,
    #[serde(deserialize_with = "num::u64_lenient")]
    pub total_size: u64,
}

/// File descriptor counters reported by the agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FdStats {
    pub total_open_count: u64,
    pub total_close_count: u64,
    pub current_open_count: u64,
}

impl FdStats {
    /// Whether any descriptor is still open.
    pub fn has_leaks(&self) -> bool {
        self.current_open_count > 0
    }
}

/// A descriptor that was opened and never closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdLeak {
    #[serde(deserialize_with = "num::i32_lenient")]
    pub fd: i32,
    #[serde(default)]
    pub path: String,
    #[serde(default, deserialize_with = "num::i32_lenient")]
    pub flags: i32,
}

impl FdLeak {
    /// `open(2)` flags rendered as `O_RDWR | O_CREAT`.
    pub fn flags_description(&self) -> String {
        format::open_flags(self.flags)
    }
}

/// Totals across a leak list, as shown in the list header.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LeakTotals {
    /// Number of distinct call stacks.
    pub groups: usize,
    /// Number of individual leaked allocations.
    pub count: u64,
    /// Bytes leaked.
    pub total_size: u64,
}

impl LeakTotals {
    pub fn of(leaks: &[LeakGroup]) -> Self {
        leaks.iter().fold(
            Self {
                groups: leaks.len(),
                ..Self::default()
            },
            |acc, g| Self {
                count: acc.count.saturating_add(g.count),
                total_size: acc.total_size.saturating_add(g.total_size),
                ..acc
            },
        )
    }
}

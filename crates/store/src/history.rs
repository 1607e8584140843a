use std::collections::VecDeque;

use chrono::{DateTime, Local};

use sohook_protocol::MemoryStats;

/// Number of samples kept for the allocation chart.
pub const HISTORY_CAPACITY: usize = 30;

/// One point on the live allocation chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySample {
    pub at: DateTime<Local>,
    pub current_alloc_size: u64,
    pub current_alloc_count: u64,
}

impl MemorySample {
    pub fn from_stats(stats: &MemoryStats, at: DateTime<Local>) -> Self {
        Self {
            at,
            current_alloc_size: stats.current_alloc_size,
            current_alloc_count: stats.current_alloc_count,
        }
    }

    fn same_values(&self, other: &Self) -> bool {
        self.current_alloc_size == other.current_alloc_size
            && self.current_alloc_count == other.current_alloc_count
    }
}

/// Sliding window of recent allocation samples, oldest first.
///
/// A sample is only appended when its current size or count differs from
/// the newest one, so an idle agent does not scroll the chart.
#[derive(Debug, Clone, Default)]
pub struct MemoryHistory {
    samples: VecDeque<MemorySample>,
}

impl MemoryHistory {
    /// Appends `sample` unless it repeats the newest values. Returns whether
    /// it was appended.
    pub fn record(&mut self, sample: MemorySample) -> bool {
        if !self.accepts(&sample) {
            return false;
        }
        if self.samples.len() == HISTORY_CAPACITY {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        true
    }

    /// Whether [`record`](Self::record) would append `sample`.
    pub fn accepts(&self, sample: &MemorySample) -> bool {
        !self.last().is_some_and(|last| last.same_values(sample))
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemorySample> {
        self.samples.iter()
    }

    pub fn last(&self) -> Option<&MemorySample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest current size in the window, for scaling the chart.
    pub fn peak_size(&self) -> u64 {
        self.samples
            .iter()
            .map(|s| s.current_alloc_size)
            .max()
            .unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn to_vec(&self) -> Vec<MemorySample> {
        self.samples.iter().copied().collect()
    }
}

//! Buffer table statistics tracking.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics tracked by the buffer table.
///
/// All fields are atomic so any operation can bump a counter without
/// taking another lock. `Ordering::Relaxed` throughout: counters are
/// independent and only need to be eventually consistent.
///
/// # Example
/// ```
/// use slabtable::TableStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = TableStats::new();
/// stats.lookups.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().lookups, 1);
/// ```
#[derive(Debug, Default)]
pub struct TableStats {
    /// Buffers successfully inserted.
    pub allocations: AtomicU64,

    /// `allocate` calls that failed (storage, size limit, duplicate key).
    pub allocation_failures: AtomicU64,

    /// Buffers removed through an explicit free.
    pub frees: AtomicU64,

    /// Frees naming a buffer the session does not own.
    pub free_misses: AtomicU64,

    /// Successful `get` / `get_mut` lookups.
    pub lookups: AtomicU64,

    /// Lookups for a key not in the table.
    pub lookup_misses: AtomicU64,

    pub sessions_opened: AtomicU64,

    pub sessions_closed: AtomicU64,

    /// Buffers removed by session teardown.
    pub buffers_reclaimed: AtomicU64,
}

impl TableStats {
    /// Create a new stats tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffers allocated and not yet freed or reclaimed.
    pub fn live_buffers(&self) -> u64 {
        self.snapshot().live_buffers()
    }

    /// Get a non-atomic copy of current statistics.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            allocations: self.allocations.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            frees: self.frees.load(Ordering::Relaxed),
            free_misses: self.free_misses.load(Ordering::Relaxed),
            lookups: self.lookups.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            sessions_opened: self.sessions_opened.load(Ordering::Relaxed),
            sessions_closed: self.sessions_closed.load(Ordering::Relaxed),
            buffers_reclaimed: self.buffers_reclaimed.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.allocations,
            &self.allocation_failures,
            &self.frees,
            &self.free_misses,
            &self.lookups,
            &self.lookup_misses,
            &self.sessions_opened,
            &self.sessions_closed,
            &self.buffers_reclaimed,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of buffer table statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub allocations: u64,
    pub allocation_failures: u64,
    pub frees: u64,
    pub free_misses: u64,
    pub lookups: u64,
    pub lookup_misses: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub buffers_reclaimed: u64,
}

impl StatsSnapshot {
    /// Buffers allocated minus buffers freed or reclaimed.
    pub fn live_buffers(&self) -> u64 {
        self.allocations
            .saturating_sub(self.frees)
            .saturating_sub(self.buffers_reclaimed)
    }

    /// Fraction of lookups that found their buffer (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups + self.lookup_misses;
        if total == 0 {
            0.0
        } else {
            self.lookups as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ live: {}, allocs: {}, frees: {}, reclaimed: {}, hit_rate: {:.2}% }}",
            self.live_buffers(),
            self.allocations,
            self.frees,
            self.buffers_reclaimed,
            self.hit_rate() * 100.0
        )
    }
}

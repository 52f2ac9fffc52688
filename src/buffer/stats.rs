//! Counters kept by the buffer pool.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running totals of what the pool has done since it was created or last
/// [`reset`](Self::reset).
///
/// Each counter is its own relaxed atomic, so concurrent readers may see one
/// counter move before another.
///
/// # Example
/// ```
/// use strataheap::BufferPoolStats;
/// use std::sync::atomic::Ordering;
///
/// let stats = BufferPoolStats::new();
/// stats.cache_misses.fetch_add(1, Ordering::Relaxed);
/// assert_eq!(stats.snapshot().cache_misses, 1);
/// ```
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    /// Fetches served from the cache.
    pub cache_hits: AtomicU64,

    /// Fetches that had to go to the heap file.
    pub cache_misses: AtomicU64,

    /// Clean pages pushed out to make room.
    pub evictions: AtomicU64,

    pub pages_read: AtomicU64,

    /// Successful page writes, from commit, flush or discard.
    pub pages_written: AtomicU64,

    /// Pages overwritten with their stored image when a transaction aborted.
    pub pages_reread: AtomicU64,

    /// Lock requests refused because of a deadlock or a lock timeout.
    pub deadlock_aborts: AtomicU64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of fetches served from the cache, in `0.0..=1.0`.
    pub fn hit_rate(&self) -> f64 {
        self.snapshot().hit_rate()
    }

    /// Copy the counters into plain integers.
    pub fn snapshot(&self) -> StatsSnapshot {
        let [cache_hits, cache_misses, evictions, pages_read, pages_written, pages_reread, deadlock_aborts] =
            self.counters().map(|c| c.load(Ordering::Relaxed));
        StatsSnapshot {
            cache_hits,
            cache_misses,
            evictions,
            pages_read,
            pages_written,
            pages_reread,
            deadlock_aborts,
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in self.counters() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn counters(&self) -> [&AtomicU64; 7] {
        [
            &self.cache_hits,
            &self.cache_misses,
            &self.evictions,
            &self.pages_read,
            &self.pages_written,
            &self.pages_reread,
            &self.deadlock_aborts,
        ]
    }
}

/// [`BufferPoolStats`] read at one moment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
    pub pages_reread: u64,
    pub deadlock_aborts: u64,
}

impl StatsSnapshot {
    /// Share of fetches served from the cache; 0 before the first fetch.
    pub fn hit_rate(&self) -> f64 {
        match self.cache_hits + self.cache_misses {
            0 => 0.0,
            fetches => self.cache_hits as f64 / fetches as f64,
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetches {}/{} hit ({:.1}%), {} evicted, {} written, {} reread, {} lock aborts",
            self.cache_hits,
            self.cache_hits + self.cache_misses,
            self.hit_rate() * 100.0,
            self.evictions,
            self.pages_written,
            self.pages_reread,
            self.deadlock_aborts
        )
    }
}

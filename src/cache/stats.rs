//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::entry::EntryStatus;

/// Cache statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Current number of entries.
    pub size: usize,

    /// Entries still computing.
    pub pending: usize,

    /// Entries holding a value.
    pub fulfilled: usize,

    /// Entries holding an error.
    pub rejected: usize,

    /// Lookups answered with a cached value.
    pub hits: u64,

    /// Lookups that started a computation.
    pub misses: u64,

    /// Lookups that joined an in-flight computation.
    pub coalesced: u64,

    /// Lookups answered with a cached error.
    pub rejections: u64,
}

impl CacheStats {
    /// Total number of `suspend`/`preload` lookups.
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses + self.coalesced + self.rejections
    }

    /// Share of lookups answered with a cached value.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookups();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    rejections: AtomicU64,
}

impl Counters {
    /// Records a lookup that found an entry.
    pub(crate) fn record_hit(&self, status: EntryStatus) {
        let counter = match status {
            EntryStatus::Pending => &self.coalesced,
            EntryStatus::Fulfilled => &self.hits,
            EntryStatus::Rejected => &self.rejections,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Combines the counters with the current occupancy.
    pub(crate) fn stats<I>(&self, statuses: I) -> CacheStats
    where
        I: IntoIterator<Item = EntryStatus>,
    {
        let mut stats = CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            ..CacheStats::default()
        };

        for status in statuses {
            stats.size += 1;
            match status {
                EntryStatus::Pending => stats.pending += 1,
                EntryStatus::Fulfilled => stats.fulfilled += 1,
                EntryStatus::Rejected => stats.rejected += 1,
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_hit_rate() {
        let stats = CacheStats::default();
        assert_eq!(stats.lookups(), 0);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_counters() {
        let counters = Counters::default();
        counters.record_miss();
        counters.record_hit(EntryStatus::Pending);
        counters.record_hit(EntryStatus::Fulfilled);
        counters.record_hit(EntryStatus::Fulfilled);
        counters.record_hit(EntryStatus::Rejected);

        let stats = counters.stats(vec![
            EntryStatus::Fulfilled,
            EntryStatus::Pending,
            EntryStatus::Fulfilled,
        ]);

        assert_eq!(stats.size, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.fulfilled, 2);
        assert_eq!(stats.rejected, 0);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.rejections, 1);
        assert_eq!(stats.lookups(), 5);
        assert!((stats.hit_rate() - 0.4).abs() < 0.001);
    }
}

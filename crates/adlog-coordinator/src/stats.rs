//! Coordinator counters

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct StatsCounters {
    pub events_created: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_write_failures: AtomicU64,
    pub list_omissions: AtomicU64,
    pub ledger_retries: AtomicU64,
    pub finality_timeouts: AtomicU64,
    pub append_timeouts: AtomicU64,
}

impl StatsCounters {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self, pending_submissions: usize) -> CoordinatorStats {
        CoordinatorStats {
            events_created: self.events_created.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_write_failures: self.cache_write_failures.load(Ordering::Relaxed),
            list_omissions: self.list_omissions.load(Ordering::Relaxed),
            ledger_retries: self.ledger_retries.load(Ordering::Relaxed),
            finality_timeouts: self.finality_timeouts.load(Ordering::Relaxed),
            append_timeouts: self.append_timeouts.load(Ordering::Relaxed),
            pending_submissions,
        }
    }
}

/// Point-in-time coordinator statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    /// Writes that reached finality
    pub events_created: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Best-effort projection writes that failed
    pub cache_write_failures: u64,
    /// Index entries `list_recent_events` could not resolve
    pub list_omissions: u64,
    /// Appends retried after a rejection
    pub ledger_retries: u64,
    pub finality_timeouts: u64,
    /// Appends sent but not answered in time
    pub append_timeouts: u64,
    /// Appended submissions still awaiting confirmed finality
    pub pending_submissions: usize,
}

impl CoordinatorStats {
    /// Fraction of reads served from the cache
    pub fn cache_hit_ratio(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let counters = StatsCounters::default();
        StatsCounters::incr(&counters.cache_hits);
        StatsCounters::incr(&counters.cache_hits);
        StatsCounters::incr(&counters.cache_hits);
        StatsCounters::incr(&counters.cache_misses);
        StatsCounters::add(&counters.list_omissions, 4);

        let stats = counters.snapshot(2);
        assert_eq!(stats.cache_hits, 3);
        assert_eq!(stats.list_omissions, 4);
        assert_eq!(stats.pending_submissions, 2);
        assert!((stats.cache_hit_ratio() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_hit_ratio() {
        assert_eq!(CoordinatorStats::default().cache_hit_ratio(), 0.0);
    }
}

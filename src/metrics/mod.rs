//! Bridge statistics and call profiling

mod timing;

pub use timing::{CallTiming, CallTimings, Direction, TimingGuard};

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one context
#[derive(Debug, Default)]
pub struct BridgeStats {
    pub(crate) wrappers_created: AtomicU64,
    pub(crate) handles_promoted: AtomicU64,
    pub(crate) handles_released: AtomicU64,
    pub(crate) finalizations: AtomicU64,
    pub(crate) negative_refcounts: AtomicU64,
    pub(crate) upcalls: AtomicU64,
    pub(crate) downcalls: AtomicU64,
    pub(crate) exceptions_captured: AtomicU64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub wrappers_created: u64,
    pub handles_promoted: u64,
    pub handles_released: u64,
    pub finalizations: u64,
    pub negative_refcounts: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub upcalls: u64,
    pub downcalls: u64,
    pub exceptions_captured: u64,
}

impl BridgeStats {
    #[inline(always)]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot without cache counters; those live with the cache
    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            wrappers_created: load(&self.wrappers_created),
            handles_promoted: load(&self.handles_promoted),
            handles_released: load(&self.handles_released),
            finalizations: load(&self.finalizations),
            negative_refcounts: load(&self.negative_refcounts),
            cache_hits: 0,
            cache_misses: 0,
            upcalls: load(&self.upcalls),
            downcalls: load(&self.downcalls),
            exceptions_captured: load(&self.exceptions_captured),
        }
    }
}

impl StatsSnapshot {
    /// Wrappers with a handle that have not been released yet
    pub fn live_handles(&self) -> u64 {
        self.handles_promoted.saturating_sub(self.handles_released)
    }

    pub fn cache_hit_rate(&self) -> f64 {
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
    use std::time::Duration;

    #[test]
    fn test_snapshot_copies_counters() {
        let stats = BridgeStats::default();
        BridgeStats::bump(&stats.handles_promoted);
        BridgeStats::bump(&stats.handles_promoted);
        BridgeStats::bump(&stats.handles_released);

        let snap = stats.snapshot();
        assert_eq!(snap.handles_promoted, 2);
        assert_eq!(snap.live_handles(), 1);
        assert_eq!(snap.cache_hit_rate(), 0.0);
    }

    #[test]
    fn test_disabled_timings_record_nothing() {
        let timings = CallTimings::new(false);
        assert!(timings.start(Direction::Upcall, "f").is_none());
        assert!(timings.entries().is_empty());
    }

    #[test]
    fn test_guard_records_call() {
        let timings = CallTimings::new(true);
        {
            let _guard = timings.start(Direction::Downcall, "PyList_New");
        }
        let entry = timings.get(Direction::Downcall, "PyList_New").unwrap();
        assert_eq!(entry.count, 1);
        assert!(timings.get(Direction::Upcall, "PyList_New").is_none());
    }

    #[test]
    fn test_nested_time_is_not_charged_to_caller() {
        let timings = CallTimings::new(true);
        {
            let _outer = timings.start(Direction::Upcall, "outer");
            {
                let _inner = timings.start(Direction::Downcall, "inner");
                std::thread::sleep(Duration::from_millis(20));
            }
        }
        let outer = timings.get(Direction::Upcall, "outer").unwrap();
        let inner = timings.get(Direction::Downcall, "inner").unwrap();
        assert!(inner.self_time >= Duration::from_millis(20));
        assert!(outer.self_time < inner.self_time);
    }

    #[test]
    fn test_report_cuts_off_tail() {
        let timings = CallTimings::new(true);
        timings.record(Direction::Upcall, "hot", Duration::from_millis(990));
        timings.record(Direction::Upcall, "cold", Duration::from_millis(10));

        let report = timings.report();
        assert!(report.contains("upcall hot: 1 calls"));
        assert!(!report.contains("cold"));
    }

    #[test]
    fn test_entries_sorted_by_self_time() {
        let timings = CallTimings::new(true);
        timings.record(Direction::Downcall, "a", Duration::from_millis(1));
        timings.record(Direction::Downcall, "b", Duration::from_millis(5));
        let names: Vec<_> = timings.entries().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}

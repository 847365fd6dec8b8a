//! Boundary call profiler
//!
//! Records, per call name and direction, how often a call crossed the
//! boundary and how much time it spent itself. Time spent in nested
//! boundary calls on the same thread is charged to the nested call, not to
//! its caller.

use parking_lot::RwLock;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Share of total self time the report covers
const REPORT_CUTOFF: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    /// Native code calling managed code
    Upcall,
    /// Managed code calling native code
    Downcall,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upcall => f.write_str("upcall"),
            Self::Downcall => f.write_str("downcall"),
        }
    }
}

/// Aggregated timing for one call name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallTiming {
    pub direction: Direction,
    pub name: String,
    pub count: u64,
    pub self_time: Duration,
}

struct OpenCall {
    start: Instant,
    nested: Duration,
}

thread_local! {
    static OPEN_CALLS: RefCell<Vec<OpenCall>> = const { RefCell::new(Vec::new()) };
}

/// Per-context call profiler; a no-op unless enabled
#[derive(Debug, Default)]
pub struct CallTimings {
    enabled: bool,
    entries: RwLock<HashMap<(Direction, String), (u64, Duration)>>,
}

impl CallTimings {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Start timing a call; the returned guard records it on drop
    #[must_use]
    pub fn start(&self, direction: Direction, name: &str) -> Option<TimingGuard<'_>> {
        if !self.enabled {
            return None;
        }
        OPEN_CALLS.with(|calls| {
            calls.borrow_mut().push(OpenCall {
                start: Instant::now(),
                nested: Duration::ZERO,
            })
        });
        Some(TimingGuard {
            timings: self,
            direction,
            name: name.to_string(),
        })
    }

    /// Add a measurement directly
    pub fn record(&self, direction: Direction, name: &str, self_time: Duration) {
        let mut entries = self.entries.write();
        let entry = entries
            .entry((direction, name.to_string()))
            .or_insert((0, Duration::ZERO));
        entry.0 += 1;
        entry.1 += self_time;
    }

    pub fn get(&self, direction: Direction, name: &str) -> Option<CallTiming> {
        self.entries
            .read()
            .get(&(direction, name.to_string()))
            .map(|&(count, self_time)| CallTiming {
                direction,
                name: name.to_string(),
                count,
                self_time,
            })
    }

    /// All entries, most expensive first
    pub fn entries(&self) -> Vec<CallTiming> {
        let mut entries: Vec<CallTiming> = self
            .entries
            .read()
            .iter()
            .map(|((direction, name), &(count, self_time))| CallTiming {
                direction: *direction,
                name: name.clone(),
                count,
                self_time,
            })
            .collect();
        entries.sort_by(|a, b| b.self_time.cmp(&a.self_time).then(a.name.cmp(&b.name)));
        entries
    }

    /// The most expensive entries that together cover 95% of self time
    pub fn report(&self) -> String {
        let entries = self.entries();
        let total: Duration = entries.iter().map(|e| e.self_time).sum();
        let mut lines = vec!["=== Boundary call timings ===".to_string()];

        let mut covered = Duration::ZERO;
        for entry in &entries {
            if total > Duration::ZERO
                && covered.as_secs_f64() >= total.as_secs_f64() * REPORT_CUTOFF
            {
                break;
            }
            covered += entry.self_time;
            let share = if total.is_zero() {
                0.0
            } else {
                entry.self_time.as_secs_f64() * 100.0 / total.as_secs_f64()
            };
            lines.push(format!(
                "{} {}: {} calls, {:.2?} self ({:.1}%)",
                entry.direction, entry.name, entry.count, entry.self_time, share
            ));
        }

        lines.join("\n")
    }

    pub fn reset(&self) {
        self.entries.write().clear();
    }
}

/// RAII timer for one boundary call
pub struct TimingGuard<'a> {
    timings: &'a CallTimings,
    direction: Direction,
    name: String,
}

impl Drop for TimingGuard<'_> {
    fn drop(&mut self) {
        let self_time = OPEN_CALLS.with(|calls| {
            let mut calls = calls.borrow_mut();
            let call = calls.pop()?;
            let elapsed = call.start.elapsed();
            if let Some(parent) = calls.last_mut() {
                parent.nested += elapsed;
            }
            Some(elapsed.saturating_sub(call.nested))
        });
        if let Some(self_time) = self_time {
            self.timings.record(self.direction, &self.name, self_time);
        }
    }
}

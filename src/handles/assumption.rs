use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Validity flag that can be invalidated exactly once
///
/// Cached resolutions check it before trusting a cached wrapper.
#[derive(Debug)]
pub struct Assumption {
    valid: AtomicBool,
}

impl Assumption {
    pub fn new() -> Self {
        Self {
            valid: AtomicBool::new(true),
        }
    }

    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Returns true for the call that actually invalidated
    pub fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }
}

impl Default for Assumption {
    fn default() -> Self {
        Self::new()
    }
}

/// Epoch advanced whenever a handle mapping goes away
#[derive(Debug, Default)]
pub struct Generation(AtomicU64);

impl Generation {
    #[inline(always)]
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

//! Shared wrapper header
//!
//! Layout mirrors what native code expects to find behind a `PyObject*`:
//! the reference count first, then bridge bookkeeping.

use crate::handles::Assumption;
use crate::object::NativePtr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Per-wrapper state common to both wrapper variants
#[derive(Debug)]
pub struct WrapperHeader {
    refcount: AtomicI64,
    /// Handle-space address, 0 until promoted
    handle: AtomicU64,
    finalized: AtomicBool,
    immortal: bool,
    validity: Assumption,
}

impl WrapperHeader {
    /// Fresh header: one reference, owned by whoever asked for the wrapper
    pub(crate) fn new(immortal: bool) -> Self {
        Self {
            refcount: AtomicI64::new(1),
            handle: AtomicU64::new(0),
            finalized: AtomicBool::new(false),
            immortal,
            validity: Assumption::new(),
        }
    }

    #[inline(always)]
    pub fn refcount(&self) -> i64 {
        self.refcount.load(Ordering::Relaxed)
    }

    /// Add `delta`, returning the new count
    #[inline(always)]
    pub(crate) fn add(&self, delta: i64) -> i64 {
        self.refcount.fetch_add(delta, Ordering::Relaxed) + delta
    }

    /// Subtract `delta`, returning the new count
    #[inline(always)]
    pub(crate) fn sub(&self, delta: i64) -> i64 {
        self.refcount.fetch_sub(delta, Ordering::AcqRel) - delta
    }

    #[inline]
    pub fn handle(&self) -> Option<NativePtr> {
        match self.handle.load(Ordering::Acquire) {
            0 => None,
            addr => Some(NativePtr::new(addr)),
        }
    }

    /// Record the handle once; a second promotion keeps the first handle
    pub(crate) fn set_handle(&self, handle: NativePtr) -> Result<(), NativePtr> {
        self.handle
            .compare_exchange(0, handle.addr(), Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(NativePtr::new)
    }

    pub(crate) fn clear_handle(&self) -> Option<NativePtr> {
        match self.handle.swap(0, Ordering::AcqRel) {
            0 => None,
            addr => Some(NativePtr::new(addr)),
        }
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Flip the finalized flag; true only for the caller that flipped it
    pub(crate) fn mark_finalized(&self) -> bool {
        !self.finalized.swap(true, Ordering::AcqRel)
    }

    #[inline]
    pub fn is_immortal(&self) -> bool {
        self.immortal
    }

    #[inline]
    pub fn validity(&self) -> &Assumption {
        &self.validity
    }
}

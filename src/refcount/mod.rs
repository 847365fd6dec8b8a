//! Reference counting across the boundary
//!
//! Design: one logical inc/dec, two storage paths:
//! 1. Wrappers keep their count in the `WrapperHeader`
//! 2. Purely native objects keep theirs in `ob_refcnt`, reached through
//!    the native probes
//!
//! Reaching zero finalizes a wrapper exactly once: its handle is released,
//! its validity assumption invalidated and its delegate dropped. A count
//! below zero is counted and logged; debug builds assert.

#[cfg(test)]
mod tests;

use crate::context::Context;
use crate::handles::HandleTable;
use crate::logging::{log_refcount_anomaly, log_wrapper_finalized, warn};
use crate::metrics::BridgeStats;
use crate::object::NativePtr;
use crate::wrapper::{Wrapper, WrapperRef};

/// Ownership flavor of a to-native conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefMode {
    /// Caller owns the result: reused wrappers and passthrough pointers are
    /// incremented, fresh wrappers already carry their one reference
    New,
    /// Caller does not own the result; no count changes. A wrapper created
    /// here keeps its one reference until someone drops it, so call-scoped
    /// borrows go through `convert::Temporaries`
    Borrowed,
    /// Calling-convention argument: reused wrappers are incremented so the
    /// callee's decref cancels out, native passthrough pointers are not
    Argument,
}

/// What a native pointer refers to, for refcount purposes
#[derive(Debug, Clone)]
pub enum RefTarget {
    Wrapper(WrapperRef),
    /// Natively allocated object; its count lives in `ob_refcnt`
    Native(NativePtr),
    Null,
    /// Handle-space address with no live wrapper behind it
    Invalid(NativePtr),
}

/// Classify `ptr`: cached handle resolution first, native probes on a miss
pub fn classify(ctx: &Context, ptr: NativePtr) -> RefTarget {
    if ptr.is_null() {
        return RefTarget::Null;
    }
    if HandleTable::is_handle(ptr) {
        if let Some(wrapper) = ctx.cache.resolve(&ctx.handles, ptr) {
            return RefTarget::Wrapper(wrapper);
        }
    }
    if ctx.probes.points_to_handle_space(ptr) {
        let handle = ctx.probes.resolve_handle(ptr);
        return match ctx.handles.lookup(handle) {
            Some(wrapper) => RefTarget::Wrapper(wrapper),
            None => RefTarget::Invalid(ptr),
        };
    }
    RefTarget::Native(ptr)
}

/// Add `delta` references to a wrapper
#[inline]
pub fn inc(wrapper: &Wrapper, delta: i64) -> i64 {
    debug_assert!(delta >= 0, "negative refcount delta {}", delta);
    wrapper.header().add(delta)
}

/// Drop `delta` references from a wrapper, finalizing it at zero
#[inline]
pub fn dec(ctx: &Context, wrapper: &WrapperRef, delta: i64) -> i64 {
    debug_assert!(delta >= 0, "negative refcount delta {}", delta);
    let count = wrapper.header().sub(delta);
    if count == 0 && !wrapper.is_immortal() {
        finalize(ctx, wrapper);
    } else if count < 0 {
        report_negative(ctx, "wrapper", count);
    }
    count
}

/// `Py_INCREF` on an arbitrary native pointer
pub fn inc_ptr(ctx: &Context, ptr: NativePtr, delta: i64) -> i64 {
    match classify(ctx, ptr) {
        RefTarget::Wrapper(wrapper) => inc(&wrapper, delta),
        RefTarget::Native(ptr) => ctx.probes.add_refcount(ptr, delta),
        RefTarget::Null => 0,
        RefTarget::Invalid(ptr) => invalid_handle(ptr),
    }
}

/// `Py_DECREF` on an arbitrary native pointer
pub fn dec_ptr(ctx: &Context, ptr: NativePtr, delta: i64) -> i64 {
    match classify(ctx, ptr) {
        RefTarget::Wrapper(wrapper) => dec(ctx, &wrapper, delta),
        RefTarget::Native(ptr) => {
            let count = ctx.probes.sub_refcount(ptr, delta);
            if count < 0 {
                report_negative(ctx, "native", count);
            }
            count
        }
        RefTarget::Null => 0,
        RefTarget::Invalid(ptr) => invalid_handle(ptr),
    }
}

/// `Py_REFCNT`
pub fn refcount_of(ctx: &Context, ptr: NativePtr) -> i64 {
    match classify(ctx, ptr) {
        RefTarget::Wrapper(wrapper) => wrapper.refcount(),
        RefTarget::Native(ptr) => ctx.probes.refcount(ptr),
        RefTarget::Null => 0,
        RefTarget::Invalid(ptr) => invalid_handle(ptr),
    }
}

/// Finalize a wrapper whose count reached zero.
///
/// Returns false if it was already finalized; every later call is a no-op.
#[cold]
#[inline(never)]
pub fn finalize(ctx: &Context, wrapper: &WrapperRef) -> bool {
    if !wrapper.header().mark_finalized() {
        return false;
    }

    let handle = ctx.handles.release(wrapper);
    if handle.is_some() {
        BridgeStats::bump(&ctx.stats.handles_released);
    }
    wrapper.header().validity().invalidate();

    for hook in ctx.release_hooks() {
        hook(wrapper);
    }
    wrapper.release_delegate();

    BridgeStats::bump(&ctx.stats.finalizations);
    log_wrapper_finalized(handle);
    true
}

#[cold]
fn report_negative(ctx: &Context, target: &str, count: i64) {
    BridgeStats::bump(&ctx.stats.negative_refcounts);
    log_refcount_anomaly(target, count);
    debug_assert!(count >= 0, "refcount underflow: {} count {}", target, count);
}

#[cold]
fn invalid_handle(ptr: NativePtr) -> i64 {
    warn!(handle = %ptr, "Refcount operation on a released handle");
    0
}

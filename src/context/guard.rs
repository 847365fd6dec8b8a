use super::Context;
use crate::exception::FrameRef;
use parking_lot::ReentrantMutexGuard;
use std::sync::atomic::Ordering;

/// RAII guard for one boundary crossing
///
/// Holds the context's boundary lock and one level of recursion depth.
#[derive(Debug)]
pub struct BoundaryGuard<'a> {
    ctx: &'a Context,
    _lock: ReentrantMutexGuard<'a, ()>,
}

impl<'a> BoundaryGuard<'a> {
    pub(super) fn new(ctx: &'a Context, lock: ReentrantMutexGuard<'a, ()>) -> Self {
        Self { ctx, _lock: lock }
    }

    /// Depth including this crossing
    pub fn depth(&self) -> usize {
        self.ctx.depth.load(Ordering::Relaxed)
    }
}

impl Drop for BoundaryGuard<'_> {
    fn drop(&mut self) {
        self.ctx.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RAII guard keeping a frame on the context's frame stack
pub struct FrameGuard<'a> {
    ctx: &'a Context,
    frame: FrameRef,
}

impl<'a> FrameGuard<'a> {
    pub(super) fn new(ctx: &'a Context, frame: FrameRef) -> Self {
        Self { ctx, frame }
    }

    pub fn frame(&self) -> &FrameRef {
        &self.frame
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let popped = self.ctx.frames.lock().pop();
        debug_assert!(
            popped.map_or(false, |f| std::sync::Arc::ptr_eq(&f, &self.frame)),
            "frame stack out of order"
        );
    }
}

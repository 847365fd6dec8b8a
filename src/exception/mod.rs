//! Exception bridge - managed exceptions as native error state
//!
//! Design: CPython signals failure with a sentinel return value plus a
//! separately queryable pending exception, never by unwinding through
//! native frames:
//! 1. `capture` stores a raised exception as the context's pending error
//!    and marks the frame it escaped from
//! 2. Native error checks query (`occurred`) or take (`fetch`) it
//! 3. `reraise` turns it back into an `Err` on the managed side

mod frame;
mod may_raise;


pub use frame::{Frame, FrameRef};
pub use may_raise::{may_raise, may_raise_int, may_raise_ptr, ErrorResult};

use crate::context::Context;
use crate::error::{ExceptionKind, PyException, PyResult};
use crate::logging::log_exception_captured;
use crate::metrics::BridgeStats;
use crate::object::Value;

/// View of a context's pending-exception slot
#[derive(Clone, Copy)]
pub struct ExceptionBridge<'a> {
    ctx: &'a Context,
}

impl<'a> ExceptionBridge<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }

    /// Record `exc` as the pending exception, replacing any previous one
    pub fn capture(&self, exc: PyException) {
        let frame = exc
            .frame()
            .cloned()
            .or_else(|| self.ctx.current_frame());
        if let Some(frame) = &frame {
            frame.mark_escaped();
        }
        let exc = exc.with_frame(frame);

        log_exception_captured(
            exc.kind(),
            exc.message(),
            exc.frame().map(|frame| frame.name()),
        );
        BridgeStats::bump(&self.ctx.stats.exceptions_captured);
        *self.ctx.exception.lock() = Some(exc);
    }

    /// `PyErr_Occurred`: is an exception pending?
    #[inline]
    pub fn occurred(&self) -> bool {
        self.ctx.exception.lock().is_some()
    }

    /// Pending exception, left in place
    pub fn current(&self) -> Option<PyException> {
        self.ctx.exception.lock().clone()
    }

    /// `PyErr_Fetch`: take the pending exception
    pub fn fetch(&self) -> Option<PyException> {
        self.ctx.exception.lock().take()
    }

    /// `PyErr_Restore`: install `exc` as pending without capture bookkeeping
    pub fn restore(&self, exc: Option<PyException>) {
        *self.ctx.exception.lock() = exc;
    }

    pub fn clear(&self) {
        self.ctx.exception.lock().take();
    }

    /// Re-raise a pending exception into managed code
    pub fn reraise(&self) -> PyResult<()> {
        match self.fetch() {
            Some(exc) => Err(exc),
            None => Ok(()),
        }
    }

    /// `PyErr_SetString` followed by the sentinel return
    pub fn raise_native(
        &self,
        kind: ExceptionKind,
        message: impl Into<String>,
        error_result: ErrorResult,
    ) -> Value {
        self.capture(PyException::new(kind, message));
        error_result.sentinel(self.ctx)
    }
}

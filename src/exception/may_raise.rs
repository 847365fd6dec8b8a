use super::ExceptionBridge;
use crate::context::Context;
use crate::error::PyResult;
use crate::object::{NativePtr, Value};

/// Error value a may-raise function hands back to native code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorResult {
    /// `-1`
    Int,
    /// `-1.0`
    Float,
    /// managed `None`
    None,
    /// the context's NULL
    NativeNull,
}

impl ErrorResult {
    pub fn sentinel(self, ctx: &Context) -> Value {
        match self {
            Self::Int => Value::Int(-1),
            Self::Float => Value::Double(-1.0),
            Self::None => Value::None,
            Self::NativeNull => ctx.native_null(),
        }
    }
}

/// Run `body`; a raised exception is captured and replaced by the sentinel
#[inline]
pub fn may_raise<F>(ctx: &Context, error_result: ErrorResult, body: F) -> Value
where
    F: FnOnce() -> PyResult<Value>,
{
    match body() {
        Ok(value) => value,
        Err(exc) => {
            ExceptionBridge::new(ctx).capture(exc);
            error_result.sentinel(ctx)
        }
    }
}

/// Pointer-returning form of [`may_raise`]: NULL on error
#[inline]
pub fn may_raise_ptr<F>(ctx: &Context, body: F) -> NativePtr
where
    F: FnOnce() -> PyResult<NativePtr>,
{
    match body() {
        Ok(ptr) => ptr,
        Err(exc) => {
            ExceptionBridge::new(ctx).capture(exc);
            NativePtr::NULL
        }
    }
}

/// Integer-returning form of [`may_raise`]: `-1` on error
#[inline]
pub fn may_raise_int<F>(ctx: &Context, body: F) -> i64
where
    F: FnOnce() -> PyResult<i64>,
{
    match body() {
        Ok(value) => value,
        Err(exc) => {
            ExceptionBridge::new(ctx).capture(exc);
            -1
        }
    }
}

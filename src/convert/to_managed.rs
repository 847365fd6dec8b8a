use crate::context::Context;
use crate::error::{PyException, PyResult};
use crate::object::{NativePtr, Value};
use crate::refcount::{self, classify, RefTarget};
use crate::wrapper::Wrapper;

fn delegate_of(wrapper: &Wrapper) -> Value {
    match wrapper.delegate() {
        Some(value) => value,
        None => panic!(
            "handle table entry without a delegate at {:?}",
            wrapper.handle()
        ),
    }
}

fn invalid_handle(ptr: NativePtr) -> PyException {
    PyException::system_error(format!("invalid handle {}", ptr))
}

/// Convert a pointer received from native code (borrowed).
///
/// Handles resolve to their wrapper's delegate without a native round
/// trip; NULL becomes the no-value sentinel; other addresses become the
/// context's proxy for that native object.
pub fn to_managed(ctx: &Context, ptr: NativePtr) -> PyResult<Value> {
    match classify(ctx, ptr) {
        RefTarget::Null => Ok(Value::NoValue),
        RefTarget::Wrapper(wrapper) => Ok(delegate_of(&wrapper)),
        RefTarget::Native(ptr) => Ok(Value::Native(ctx.natives.get_or_create(ptr))),
        RefTarget::Invalid(ptr) => Err(invalid_handle(ptr)),
    }
}

/// Convert a reference native code handed over (new reference / steal).
///
/// The transferred reference is given back: wrappers are decremented
/// right away, native proxies record it for the next bulk release.
pub fn to_managed_transfer(ctx: &Context, ptr: NativePtr) -> PyResult<Value> {
    match classify(ctx, ptr) {
        RefTarget::Null => Ok(Value::NoValue),
        RefTarget::Wrapper(wrapper) => {
            let value = delegate_of(&wrapper);
            refcount::dec(ctx, &wrapper, 1);
            Ok(value)
        }
        RefTarget::Native(ptr) => {
            let proxy = ctx.natives.get_or_create(ptr);
            proxy.take_ownership();
            Ok(Value::Native(proxy))
        }
        RefTarget::Invalid(ptr) => Err(invalid_handle(ptr)),
    }
}

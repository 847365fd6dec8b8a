//! Raw pointer comparison and arithmetic on native objects

use super::{to_managed, to_native};
use crate::context::Context;
use crate::error::PyResult;
use crate::object::{NativePtr, Value};
use crate::probes::CompareOp;
use crate::refcount::RefMode;

#[inline]
fn address_of(ctx: &Context, value: &Value) -> NativePtr {
    match value.as_native() {
        Some(native) => native.ptr(),
        None => to_native(ctx, value, RefMode::Borrowed),
    }
}

/// Compare the native addresses of two objects.
///
/// `==` and `!=` are identity checks and never reach the native side.
pub fn pointer_compare(ctx: &Context, a: &Value, b: &Value, op: CompareOp) -> bool {
    let (pa, pb) = (address_of(ctx, a), address_of(ctx, b));
    match op {
        CompareOp::Eq => pa == pb,
        CompareOp::Ne => pa != pb,
        _ => ctx.probes.pointer_compare(pa, pb, op),
    }
}

/// Address `offset` bytes past `value`, as a managed value
pub fn pointer_add(ctx: &Context, value: &Value, offset: i64) -> PyResult<Value> {
    let base = address_of(ctx, value);
    to_managed(ctx, ctx.probes.pointer_add(base, offset))
}

//! C API for refcount and error-state operations
//!
//! Entry points native code links against. Each takes the context it runs
//! in as its first argument and goes through the same engine as managed
//! callers, under the context's boundary lock. The lock is reentrant, so
//! these may be called from inside a downcall on the same thread. All of
//! them are null-safe: a null context or a null object is a no-op.

use crate::context::Context;
use crate::object::NativePtr;
use crate::refcount;
use std::ffi::c_void;

/// Create a context with the default configuration
#[no_mangle]
pub extern "C" fn cext_bridge_context_new() -> *mut Context {
    Box::into_raw(Box::new(Context::new()))
}

/// Destroy a context, releasing the native references it owns
///
/// # Safety
/// `ctx` is null or came from [`cext_bridge_context_new`] and is not used
/// afterwards.
#[no_mangle]
pub unsafe extern "C" fn cext_bridge_context_free(ctx: *mut Context) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

#[inline]
fn native(obj: *const c_void) -> NativePtr {
    NativePtr::new(obj as usize as u64)
}

/// `Py_INCREF`
///
/// # Safety
/// - `ctx` is null or points to a live `Context`
/// - `obj` is null, a handle issued by that context, or a native object
#[no_mangle]
pub unsafe extern "C" fn cext_bridge_incref(ctx: *const Context, obj: *const c_void) {
    let Some(ctx) = ctx.as_ref() else { return };
    if obj.is_null() {
        return;
    }
    let _boundary = ctx.lock_boundary();
    refcount::inc_ptr(ctx, native(obj), 1);
}

/// `Py_DECREF`; finalizes a wrapper whose count reaches zero
///
/// # Safety
/// Same contract as [`cext_bridge_incref`].
#[no_mangle]
pub unsafe extern "C" fn cext_bridge_decref(ctx: *const Context, obj: *const c_void) {
    let Some(ctx) = ctx.as_ref() else { return };
    if obj.is_null() {
        return;
    }
    let _boundary = ctx.lock_boundary();
    refcount::dec_ptr(ctx, native(obj), 1);
}

/// `Py_REFCNT`; 0 for null
///
/// # Safety
/// Same contract as [`cext_bridge_incref`].
#[no_mangle]
pub unsafe extern "C" fn cext_bridge_refcnt(ctx: *const Context, obj: *const c_void) -> i64 {
    match ctx.as_ref() {
        Some(ctx) => {
            let _boundary = ctx.lock_boundary();
            refcount::refcount_of(ctx, native(obj))
        }
        None => 0,
    }
}

/// `PyErr_Occurred` as a flag: 1 when an exception is pending
///
/// # Safety
/// `ctx` is null or points to a live `Context`.
#[no_mangle]
pub unsafe extern "C" fn cext_bridge_err_occurred(ctx: *const Context) -> i32 {
    match ctx.as_ref() {
        Some(ctx) => {
            let _boundary = ctx.lock_boundary();
            ctx.exceptions().occurred() as i32
        }
        None => 0,
    }
}

/// `PyErr_Clear`
///
/// # Safety
/// `ctx` is null or points to a live `Context`.
#[no_mangle]
pub unsafe extern "C" fn cext_bridge_err_clear(ctx: *const Context) {
    if let Some(ctx) = ctx.as_ref() {
        let _boundary = ctx.lock_boundary();
        ctx.exceptions().clear();
    }
}

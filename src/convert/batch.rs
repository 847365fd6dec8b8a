//! Argument vector marshaling, unrolled for small arities

use super::{to_managed, to_native};
use crate::context::Context;
use crate::error::PyResult;
use crate::object::{NativePtr, Value};
use crate::refcount::RefMode;
use smallvec::{smallvec, SmallVec};

/// Argument vector; up to four slots stay inline
pub type ArgVec<T> = SmallVec<[T; 4]>;

pub fn all_to_native(ctx: &Context, values: &[Value], mode: RefMode) -> ArgVec<NativePtr> {
    let conv = |value: &Value| to_native(ctx, value, mode);
    match values {
        [] => ArgVec::new(),
        [a] => smallvec![conv(a)],
        [a, b] => smallvec![conv(a), conv(b)],
        [a, b, c] => smallvec![conv(a), conv(b), conv(c)],
        [a, b, c, d] => smallvec![conv(a), conv(b), conv(c), conv(d)],
        _ => values.iter().map(conv).collect(),
    }
}

pub fn all_to_managed(ctx: &Context, ptrs: &[NativePtr]) -> PyResult<ArgVec<Value>> {
    let conv = |ptr: &NativePtr| to_managed(ctx, *ptr);
    Ok(match ptrs {
        [] => ArgVec::new(),
        [a] => smallvec![conv(a)?],
        [a, b] => smallvec![conv(a)?, conv(b)?],
        [a, b, c] => smallvec![conv(a)?, conv(b)?, conv(c)?],
        [a, b, c, d] => smallvec![conv(a)?, conv(b)?, conv(c)?, conv(d)?],
        _ => ptrs.iter().map(conv).collect::<PyResult<_>>()?,
    })
}

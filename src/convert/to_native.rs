use crate::context::Context;
use crate::object::{ManagedObject, NativePtr, ObjectKind, ObjectRef, Value};
use crate::refcount::{self, RefMode};
use crate::wrapper::{ObjectFlavor, PrimitiveValue, Wrapper, WrapperRef};

/// Outcome of the to-native dispatch table, before refcount adjustment
enum Resolved {
    /// Wrapper held by a context cache or by an earlier conversion;
    /// `created` when this call populated the cache
    Cached { wrapper: WrapperRef, created: bool },
    /// New wrapper nothing else refers to yet
    Fresh(WrapperRef),
    /// Natively allocated object: the pointer itself crosses
    Native(NativePtr),
    /// Opaque foreign word; there is no `ob_refcnt` behind it
    Foreign(NativePtr),
    Null,
}

#[inline]
fn interned((wrapper, created): (WrapperRef, bool)) -> Resolved {
    Resolved::Cached { wrapper, created }
}

fn integer(ctx: &Context, value: i64, unboxed: PrimitiveValue) -> Resolved {
    match ctx.primitives.small_int(value) {
        Some(entry) => interned(entry),
        None => Resolved::Fresh(Wrapper::primitive(unboxed)),
    }
}

fn object(ctx: &Context, obj: &ObjectRef) -> Resolved {
    if obj.is_class() {
        return interned(ctx.classes.get_or_create(obj));
    }
    if matches!(obj.kind(), ObjectKind::None) {
        return interned(ctx.primitives.none());
    }
    match obj.native_wrapper() {
        Some(wrapper) => Resolved::Cached {
            wrapper,
            created: false,
        },
        None => Resolved::Fresh(Wrapper::object(obj.clone(), ObjectFlavor::Plain)),
    }
}

fn resolve(ctx: &Context, value: &Value) -> Resolved {
    match value {
        Value::None => interned(ctx.primitives.none()),
        Value::NoValue | Value::NativeNull(_) => Resolved::Null,
        Value::Bool(b) => interned(ctx.primitives.boolean(*b)),
        Value::Int(v) => integer(ctx, *v as i64, PrimitiveValue::Int(*v)),
        Value::Long(v) => integer(ctx, *v, PrimitiveValue::Long(*v)),
        Value::Byte(v) => integer(ctx, *v as i64, PrimitiveValue::Byte(*v)),
        Value::Double(d) if d.is_nan() => interned(ctx.primitives.nan()),
        Value::Double(d) => Resolved::Fresh(Wrapper::primitive(PrimitiveValue::Double(*d))),
        Value::Str(s) => Resolved::Fresh(Wrapper::object(
            ManagedObject::str(s.as_ref()),
            ObjectFlavor::Plain,
        )),
        Value::Object(obj) => object(ctx, obj),
        Value::Native(native) => Resolved::Native(native.ptr()),
        Value::Foreign(bits) => {
            let ptr = NativePtr::new(*bits);
            match ctx.handles.lookup(ptr) {
                Some(wrapper) if !wrapper.is_finalized() => Resolved::Cached {
                    wrapper,
                    created: false,
                },
                _ => Resolved::Foreign(ptr),
            }
        }
    }
}

/// Apply the refcount rule of `mode` to a resolved wrapper
#[inline]
fn claim(ctx: &Context, wrapper: &WrapperRef, created: bool, mode: RefMode) {
    if created {
        ctx.wrapper_created();
    } else if mode != RefMode::Borrowed {
        refcount::inc(wrapper, 1);
    }
}

/// Convert a managed value to the pointer native code sees.
///
/// Interned values (small ints, bools, NaN, None, classes) always yield the
/// same handle within a context, and an object that already has a wrapper
/// reuses it. Foreign words cross unchanged and never touch a native count.
pub fn to_native(ctx: &Context, value: &Value, mode: RefMode) -> NativePtr {
    match resolve(ctx, value) {
        Resolved::Null => NativePtr::NULL,
        Resolved::Native(ptr) => {
            if mode == RefMode::New {
                ctx.probes.add_refcount(ptr, 1);
            }
            ptr
        }
        Resolved::Foreign(ptr) => ptr,
        Resolved::Cached { wrapper, created } => {
            claim(ctx, &wrapper, created, mode);
            ctx.promote(&wrapper)
        }
        Resolved::Fresh(wrapper) => {
            claim(ctx, &wrapper, true, mode);
            ctx.promote(&wrapper)
        }
    }
}

/// Borrowed conversion that also hands back the wrapper it had to create.
///
/// That wrapper's single reference belongs to nobody yet; the caller is
/// responsible for dropping it (see [`Temporaries`](super::Temporaries)).
pub(crate) fn to_native_temporary(ctx: &Context, value: &Value) -> (NativePtr, Option<WrapperRef>) {
    match resolve(ctx, value) {
        Resolved::Fresh(wrapper) => {
            claim(ctx, &wrapper, true, RefMode::Borrowed);
            (ctx.promote(&wrapper), Some(wrapper))
        }
        Resolved::Cached { wrapper, created } => {
            claim(ctx, &wrapper, created, RefMode::Borrowed);
            (ctx.promote(&wrapper), None)
        }
        Resolved::Native(ptr) | Resolved::Foreign(ptr) => (ptr, None),
        Resolved::Null => (NativePtr::NULL, None),
    }
}

/// Like [`to_native`], returning the wrapper itself.
///
/// `None` for values that cross without a wrapper (NULL, native and
/// foreign pointers); no counts change for those.
pub fn to_native_wrapper(ctx: &Context, value: &Value, mode: RefMode) -> Option<WrapperRef> {
    let (wrapper, created) = match resolve(ctx, value) {
        Resolved::Cached { wrapper, created } => (wrapper, created),
        Resolved::Fresh(wrapper) => (wrapper, true),
        Resolved::Native(_) | Resolved::Foreign(_) | Resolved::Null => return None,
    };
    claim(ctx, &wrapper, created, mode);
    ctx.promote(&wrapper);
    Some(wrapper)
}

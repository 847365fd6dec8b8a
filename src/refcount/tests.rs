use super::*;
use crate::object::{ManagedObject, Value};
use crate::probes::InProcessProbes;
use crate::wrapper::{ObjectFlavor, PrimitiveValue};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn promoted(ctx: &Context) -> (WrapperRef, NativePtr) {
    let wrapper = Wrapper::primitive(PrimitiveValue::Long(100_000));
    let handle = ctx.promote(&wrapper);
    (wrapper, handle)
}

#[test]
fn test_inc_dec_round_trip() {
    let ctx = Context::new();
    let (wrapper, _) = promoted(&ctx);
    assert_eq!(inc(&wrapper, 2), 3);
    assert_eq!(dec(&ctx, &wrapper, 2), 1);
    assert!(!wrapper.is_finalized());
}

#[test]
fn test_zero_finalizes_exactly_once() {
    let ctx = Context::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    ctx.on_release(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    });

    let (wrapper, handle) = promoted(&ctx);
    assert_eq!(dec(&ctx, &wrapper, 1), 0);
    assert!(wrapper.is_finalized());
    assert!(ctx.handles().lookup(handle).is_none());
    assert!(!wrapper.header().validity().is_valid());

    // A second zero crossing must not run the hooks again
    inc(&wrapper, 1);
    dec(&ctx, &wrapper, 1);
    assert!(!finalize(&ctx, &wrapper));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.stats().finalizations, 1);
    assert_eq!(ctx.stats().handles_released, 1);
}

#[test]
fn test_hook_may_release_other_wrappers() {
    let ctx = Arc::new(Context::new());
    let (first, _) = promoted(&ctx);
    let (second, second_handle) = promoted(&ctx);
    let weak = Arc::downgrade(&ctx);
    let next = parking_lot::Mutex::new(Some(second.clone()));
    ctx.on_release(move |_| {
        let Some(ctx) = weak.upgrade() else { return };
        if let Some(next) = next.lock().take() {
            ctx.on_release(|_| {});
            dec(&ctx, &next, 1);
        }
    });

    dec(&ctx, &first, 1);

    assert!(second.is_finalized());
    assert!(ctx.handles().lookup(second_handle).is_none());
    assert_eq!(ctx.stats().finalizations, 2);
}

#[test]
fn test_finalize_drops_delegate_back_reference() {
    let ctx = Context::new();
    let obj = ManagedObject::str("payload");
    let wrapper = Wrapper::object(obj.clone(), ObjectFlavor::Plain);
    assert!(obj.has_native_wrapper());

    dec(&ctx, &wrapper, 1);
    assert!(!obj.has_native_wrapper());
    assert!(wrapper.delegate().is_none());
}

#[test]
fn test_immortal_wrappers_survive_zero() {
    let ctx = Context::new();
    let (wrapper, _) = ctx.primitives.small_int(3).unwrap();
    assert_eq!(dec(&ctx, &wrapper, 1), 0);
    assert!(!wrapper.is_finalized());
    assert_eq!(wrapper.delegate(), Some(Value::Int(3)));
    assert_eq!(ctx.stats().finalizations, 0);
}

#[test]
fn test_classify_handle_and_native() {
    let probes = Arc::new(InProcessProbes::new());
    let native = probes.allocate();
    let ctx = Context::builder().probes(probes).build().unwrap();
    let (wrapper, handle) = promoted(&ctx);

    match classify(&ctx, handle) {
        RefTarget::Wrapper(found) => assert!(Arc::ptr_eq(&found, &wrapper)),
        other => panic!("expected wrapper, got {:?}", other),
    }
    assert!(matches!(classify(&ctx, native), RefTarget::Native(p) if p == native));
    assert!(matches!(classify(&ctx, NativePtr::NULL), RefTarget::Null));
}

#[test]
fn test_classify_released_handle_is_invalid() {
    let ctx = Context::new();
    let (wrapper, handle) = promoted(&ctx);
    dec(&ctx, &wrapper, 1);
    assert!(matches!(classify(&ctx, handle), RefTarget::Invalid(_)));
    assert_eq!(refcount_of(&ctx, handle), 0);
}

#[test]
fn test_pointer_ops_dispatch_to_wrapper() {
    let ctx = Context::new();
    let (wrapper, handle) = promoted(&ctx);
    assert_eq!(inc_ptr(&ctx, handle, 1), 2);
    assert_eq!(refcount_of(&ctx, handle), 2);
    assert_eq!(dec_ptr(&ctx, handle, 2), 0);
    assert!(wrapper.is_finalized());
}

#[test]
fn test_pointer_ops_dispatch_to_native_refcount() {
    let probes = Arc::new(InProcessProbes::new());
    let native = probes.allocate();
    let ctx = Context::builder().probes(probes.clone()).build().unwrap();

    assert_eq!(inc_ptr(&ctx, native, 1), 2);
    assert_eq!(refcount_of(&ctx, native), 2);
    assert_eq!(dec_ptr(&ctx, native, 2), 0);
    assert!(!probes.is_live(native));
    assert_eq!(ctx.stats().finalizations, 0);
}

#[test]
fn test_null_is_noop() {
    let ctx = Context::new();
    assert_eq!(inc_ptr(&ctx, NativePtr::NULL, 1), 0);
    assert_eq!(dec_ptr(&ctx, NativePtr::NULL, 1), 0);
    assert_eq!(refcount_of(&ctx, NativePtr::NULL), 0);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "refcount underflow")]
fn test_negative_count_asserts_in_debug() {
    let ctx = Context::new();
    let (wrapper, _) = promoted(&ctx);
    dec(&ctx, &wrapper, 2);
}

#[test]
#[cfg(not(debug_assertions))]
fn test_negative_count_is_counted_in_release() {
    let ctx = Context::new();
    let (wrapper, _) = promoted(&ctx);
    assert_eq!(dec(&ctx, &wrapper, 2), -1);
    assert_eq!(ctx.stats().negative_refcounts, 1);
}

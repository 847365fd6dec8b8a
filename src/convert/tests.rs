use super::*;
use crate::context::Context;
use crate::error::{ExceptionKind, PyException};
use crate::object::{ManagedObject, NativePtr, ObjectKind, Value};
use crate::probes::{CompareOp, InProcessProbes, NativeProbes, ProbeSymbol};
use crate::refcount::{self, RefMode};
use crate::runtime::SimpleRuntime;
use std::sync::Arc;

fn wrapper_at(ctx: &Context, ptr: NativePtr) -> crate::wrapper::WrapperRef {
    ctx.handles().lookup(ptr).expect("pointer is a live handle")
}

// ---------------------------------------------------------------------------
// to-native
// ---------------------------------------------------------------------------

#[test]
fn test_small_ints_are_singletons() {
    let ctx = Context::new();
    for n in [-5, 0, 1, 42, 256] {
        let a = to_native(&ctx, &Value::Int(n), RefMode::Borrowed);
        let b = to_native(&ctx, &Value::Int(n), RefMode::Borrowed);
        assert_eq!(a, b, "small int {} must intern", n);
    }
}

#[test]
fn test_long_in_window_shares_int_singleton() {
    let ctx = Context::new();
    let a = to_native(&ctx, &Value::Int(7), RefMode::Borrowed);
    let b = to_native(&ctx, &Value::Long(7), RefMode::Borrowed);
    assert_eq!(a, b);
    assert_eq!(to_managed(&ctx, b).unwrap(), Value::Int(7));
}

#[test]
fn test_large_ints_are_fresh() {
    let ctx = Context::new();
    let a = to_native(&ctx, &Value::Long(1 << 40), RefMode::Borrowed);
    let b = to_native(&ctx, &Value::Long(1 << 40), RefMode::Borrowed);
    assert_ne!(a, b);
    assert_eq!(to_managed(&ctx, a).unwrap(), Value::Long(1 << 40));
}

#[test]
fn test_bool_nan_none_singletons() {
    let ctx = Context::new();
    for value in [Value::Bool(true), Value::Bool(false), Value::Double(f64::NAN), Value::None] {
        let a = to_native(&ctx, &value, RefMode::Borrowed);
        let b = to_native(&ctx, &value, RefMode::Borrowed);
        assert_eq!(a, b, "{:?} must intern", value);
    }
    let t = to_native(&ctx, &Value::Bool(true), RefMode::Borrowed);
    let f = to_native(&ctx, &Value::Bool(false), RefMode::Borrowed);
    assert_ne!(t, f);
}

#[test]
fn test_doubles_are_fresh() {
    let ctx = Context::new();
    let a = to_native(&ctx, &Value::Double(1.5), RefMode::Borrowed);
    let b = to_native(&ctx, &Value::Double(1.5), RefMode::Borrowed);
    assert_ne!(a, b);
}

#[test]
fn test_strings_get_fresh_wrappers() {
    let ctx = Context::new();
    let value = Value::str("hello");
    let a = to_native(&ctx, &value, RefMode::Borrowed);
    let b = to_native(&ctx, &value, RefMode::Borrowed);
    assert_ne!(a, b);
    assert_eq!(to_managed(&ctx, a).unwrap().as_str(), Some("hello"));
    assert_eq!(ctx.stats().wrappers_created, 2);
}

#[test]
fn test_object_round_trip_identity() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::tuple(vec![Value::Int(1)]));
    let ptr = to_native(&ctx, &obj, RefMode::Borrowed);
    let back = to_managed(&ctx, ptr).unwrap();
    assert!(back.is(&obj));
    assert_eq!(to_native(&ctx, &back, RefMode::Borrowed), ptr);
}

#[test]
fn test_classes_use_type_wrappers() {
    let ctx = Context::new();
    let class = Value::Object(ManagedObject::class("Point"));
    let a = to_native(&ctx, &class, RefMode::Borrowed);
    let b = to_native(&ctx, &class, RefMode::Borrowed);
    assert_eq!(a, b);
    let wrapper = wrapper_at(&ctx, a);
    assert_eq!(
        wrapper.as_object().unwrap().flavor(),
        crate::wrapper::ObjectFlavor::Type
    );
}

#[test]
fn test_null_sentinels_cross_as_null() {
    let ctx = Context::new();
    assert!(to_native(&ctx, &Value::NoValue, RefMode::New).is_null());
    assert!(to_native(&ctx, &ctx.native_null(), RefMode::New).is_null());
    assert_eq!(to_managed(&ctx, NativePtr::NULL).unwrap(), Value::NoValue);
}

#[test]
fn test_new_reference_increments_reused_wrapper() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::str("abc"));

    let ptr = to_native(&ctx, &obj, RefMode::New);
    let wrapper = wrapper_at(&ctx, ptr);
    assert_eq!(wrapper.refcount(), 1, "fresh wrapper is not incremented");

    to_native(&ctx, &obj, RefMode::New);
    assert_eq!(wrapper.refcount(), 2);

    to_native(&ctx, &obj, RefMode::Borrowed);
    assert_eq!(wrapper.refcount(), 2);

    to_native(&ctx, &obj, RefMode::Argument);
    assert_eq!(wrapper.refcount(), 3);
}

#[test]
fn test_passthrough_refcount_per_mode() {
    let probes = Arc::new(InProcessProbes::new());
    let raw = probes.allocate();
    let ctx = Context::builder().probes(probes.clone()).build().unwrap();
    let native = to_managed(&ctx, raw).unwrap();

    assert_eq!(to_native(&ctx, &native, RefMode::Borrowed), raw);
    assert_eq!(to_native(&ctx, &native, RefMode::Argument), raw);
    assert_eq!(probes.refcount(raw), 1);

    assert_eq!(to_native(&ctx, &native, RefMode::New), raw);
    assert_eq!(probes.refcount(raw), 2);
}

#[test]
fn test_foreign_handle_resolves_to_wrapper() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::str("x"));
    let ptr = to_native(&ctx, &obj, RefMode::Borrowed);

    let foreign = Value::Foreign(ptr.addr());
    assert_eq!(to_native(&ctx, &foreign, RefMode::Borrowed), ptr);
    let opaque = Value::Foreign(0xdead_0000);
    assert_eq!(
        to_native(&ctx, &opaque, RefMode::Borrowed),
        NativePtr::new(0xdead_0000)
    );
}

#[test]
fn test_foreign_word_never_touches_native_refcount() {
    let probes = Arc::new(InProcessProbes::new());
    let ctx = Context::builder().probes(probes.clone()).build().unwrap();
    let opaque = Value::Foreign(0xdead_0000);

    for mode in [RefMode::New, RefMode::Argument, RefMode::Borrowed] {
        assert_eq!(to_native(&ctx, &opaque, mode), NativePtr::new(0xdead_0000));
    }
    assert_eq!(probes.calls_to(ProbeSymbol::AddRefcount), 0);
    assert_eq!(probes.live_objects(), 0);
    assert!(to_native_wrapper(&ctx, &opaque, RefMode::New).is_none());
}

#[test]
fn test_to_native_wrapper_returns_the_wrapper() {
    let ctx = Context::new();
    let wrapper = to_native_wrapper(&ctx, &Value::Int(5), RefMode::Borrowed).unwrap();
    assert!(wrapper.handle().is_some());
    assert!(to_native_wrapper(&ctx, &Value::NoValue, RefMode::New).is_none());
}

// ---------------------------------------------------------------------------
// to-managed
// ---------------------------------------------------------------------------

#[test]
fn test_native_pointer_gets_stable_proxy() {
    let ctx = Context::new();
    let raw = NativePtr::new(0x4000);
    let a = to_managed(&ctx, raw).unwrap();
    let b = to_managed(&ctx, raw).unwrap();
    assert!(a.is(&b));
    assert_eq!(ctx.natives().len(), 1);
}

#[test]
fn test_released_handle_is_system_error() {
    let ctx = Context::new();
    let ptr = to_native(&ctx, &Value::Long(1 << 33), RefMode::New);
    refcount::dec_ptr(&ctx, ptr, 1);

    let err = to_managed(&ctx, ptr).unwrap_err();
    assert!(err.is(&ExceptionKind::SystemError));
}

#[test]
fn test_handle_resolution_hits_cache() {
    let ctx = Context::new();
    let ptr = to_native(&ctx, &Value::Long(1 << 35), RefMode::Borrowed);
    to_managed(&ctx, ptr).unwrap();
    to_managed(&ctx, ptr).unwrap();
    let stats = ctx.stats();
    assert_eq!(stats.cache_misses, 1);
    assert_eq!(stats.cache_hits, 1);
}

#[test]
fn test_transfer_releases_wrapper_reference() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::str("moved"));
    let ptr = to_native(&ctx, &obj, RefMode::New);
    to_native(&ctx, &obj, RefMode::New);
    let wrapper = wrapper_at(&ctx, ptr);
    assert_eq!(wrapper.refcount(), 2);

    let value = to_managed_transfer(&ctx, ptr).unwrap();
    assert!(value.is(&obj));
    assert_eq!(wrapper.refcount(), 1);

    to_managed_transfer(&ctx, ptr).unwrap();
    assert!(wrapper.is_finalized());
}

#[test]
fn test_transfer_of_native_defers_release() {
    let probes = Arc::new(InProcessProbes::new());
    let raw = probes.allocate();
    let ctx = Context::builder().probes(probes.clone()).build().unwrap();

    let value = to_managed_transfer(&ctx, raw).unwrap();
    assert_eq!(value.as_native().unwrap().owned_references(), 1);
    assert!(probes.is_live(raw));

    ctx.release_native_references();
    assert!(!probes.is_live(raw));
}

// ---------------------------------------------------------------------------
// batches, fastcall, layouts
// ---------------------------------------------------------------------------

#[test]
fn test_batch_matches_single_conversion() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::str("s"));
    for n in 0..7 {
        let values: Vec<Value> = (0..n)
            .map(|i| if i % 2 == 0 { Value::Int(i) } else { obj.clone() })
            .collect();
        let batch = all_to_native(&ctx, &values, RefMode::Borrowed);
        assert_eq!(batch.len(), n as usize);
        for (value, ptr) in values.iter().zip(batch.iter()) {
            assert_eq!(to_native(&ctx, value, RefMode::Borrowed), *ptr);
        }
        let back = all_to_managed(&ctx, &batch).unwrap();
        for (value, round) in values.iter().zip(back.iter()) {
            assert!(value.is(round));
        }
    }
}

#[test]
fn test_batch_to_managed_propagates_error() {
    let ctx = Context::new();
    let ptr = to_native(&ctx, &Value::Long(1 << 36), RefMode::New);
    refcount::dec_ptr(&ctx, ptr, 1);
    assert!(all_to_managed(&ctx, &[NativePtr::NULL, ptr]).is_err());
}

#[test]
fn test_fastcall_elements_convert_lazily() {
    let ctx = Context::new();
    let receiver = Value::Object(ManagedObject::str("self"));
    let args = [Value::Int(1), Value::Int(2), Value::Int(3)];
    let mut temps = Temporaries::new(&ctx);
    let call = fastcall_to_native(&mut temps, &receiver, &args);

    assert_eq!(call.nargs, 3);
    assert_eq!(call.args.converted(), 0);
    let second = call.args.get(&ctx, 1).unwrap();
    assert_eq!(call.args.converted(), 1);
    assert_eq!(second, to_native(&ctx, &Value::Int(2), RefMode::Borrowed));
    assert!(call.args.get(&ctx, 3).is_none());
    assert!(call.kwnames.is_null());
}

#[test]
fn test_fastcall_keywords_split_nargs() {
    let ctx = Context::new();
    let receiver = Value::None;
    let kwnames = Value::Object(ManagedObject::tuple(vec![Value::str("key")]));
    let args = [Value::Int(1), Value::Int(2)];
    let mut temps = Temporaries::new(&ctx);

    let call = fastcall_with_keywords_to_native(&mut temps, &receiver, &args, &kwnames).unwrap();
    assert_eq!(call.nargs, 1);
    assert!(!call.kwnames.is_null());

    let call = fastcall_with_keywords_to_native(&mut temps, &receiver, &args, &Value::None).unwrap();
    assert_eq!(call.nargs, 2);
    assert!(call.kwnames.is_null());
}

#[test]
fn test_fastcall_keywords_reject_bad_names() {
    let ctx = Context::new();
    let mut temps = Temporaries::new(&ctx);
    let bad = Value::Object(ManagedObject::tuple(vec![Value::Int(1)]));
    let err = fastcall_with_keywords_to_native(&mut temps, &Value::None, &[Value::Int(1)], &bad)
        .unwrap_err();
    assert!(err.is(&ExceptionKind::TypeError));

    let err = fastcall_with_keywords_to_native(&mut temps, &Value::None, &[], &Value::Int(3))
        .unwrap_err();
    assert!(err.is(&ExceptionKind::TypeError));
}

#[test]
fn test_slot_layouts() {
    let ctx = Context::new();
    let mut temps = Temporaries::new(&ctx);
    let obj = Value::Object(ManagedObject::str("o"));

    let args = convert_slots(&mut temps, SlotLayout::BinaryFirst, &[obj.clone(), Value::Long(3)]).unwrap();
    assert!(args[0].as_ptr().is_some());
    assert_eq!(args[1].as_int(), Some(3));

    let args = convert_slots(
        &mut temps,
        SlotLayout::TernaryFirstThird,
        &[obj.clone(), Value::Int(1), obj.clone()],
    )
    .unwrap();
    assert_eq!(args[0].as_ptr(), args[2].as_ptr());

    let args = convert_slots(
        &mut temps,
        SlotLayout::TernaryFirstSecond,
        &[obj.clone(), obj.clone(), Value::Double(0.5)],
    )
    .unwrap();
    assert!(matches!(args[2], NativeArg::Double(d) if d == 0.5));

    let args = convert_slots(&mut temps, SlotLayout::FastCall, &[obj.clone(), Value::Int(1)]).unwrap();
    assert!(matches!(&args[1], NativeArg::Array(a) if a.len() == 1));
    assert_eq!(args[2].as_int(), Some(1));

    let args = convert_slots(&mut temps, SlotLayout::All, &[obj.clone(), Value::Int(1)]).unwrap();
    assert!(args.iter().all(|a| a.as_ptr().is_some()));
}

#[test]
fn test_slot_layout_arity_mismatch_is_type_error() {
    let ctx = Context::new();
    let mut temps = Temporaries::new(&ctx);
    let err = convert_slots(&mut temps, SlotLayout::BinaryFirst, &[Value::Int(1)]).unwrap_err();
    assert!(err.is(&ExceptionKind::TypeError));
    let err = convert_slots(&mut temps, SlotLayout::FastCall, &[]).unwrap_err();
    assert!(err.is(&ExceptionKind::TypeError));
    let err = convert_slots(&mut temps, SlotLayout::FastCallWithKeywords, &[Value::None]).unwrap_err();
    assert!(err.is(&ExceptionKind::TypeError));
}

#[test]
fn test_slot_scalar_must_be_scalar() {
    let ctx = Context::new();
    let mut temps = Temporaries::new(&ctx);
    let obj = Value::Object(ManagedObject::str("o"));
    let err = convert_slots(&mut temps, SlotLayout::BinaryFirst, &[obj.clone(), obj]).unwrap_err();
    assert!(err.is(&ExceptionKind::TypeError));
}

#[test]
fn test_temporaries_release_created_wrappers() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::instance(ManagedObject::class("Arg")));
    let mut temps = Temporaries::new(&ctx);

    let first = temps.borrow(&obj);
    temps.borrow(&Value::str("s"));
    temps.borrow(&Value::Double(1.5));
    temps.borrow(&Value::Int(7));
    assert_eq!(temps.borrow(&obj), first);
    assert_eq!(temps.len(), 3);
    assert_eq!(ctx.handles().len(), 4);

    assert_eq!(temps.release(), 3);
    assert_eq!(ctx.handles().len(), 1);
    assert!(ctx.handles().lookup(first).is_none());
    assert_eq!(ctx.stats().finalizations, 3);
}

#[test]
fn test_temporary_kept_by_callee_survives() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::instance(ManagedObject::class("Kept")));
    let ptr = {
        let mut temps = Temporaries::new(&ctx);
        let ptr = temps.borrow(&obj);
        refcount::inc_ptr(&ctx, ptr, 1);
        ptr
    };

    assert_eq!(refcount::refcount_of(&ctx, ptr), 1);
    assert!(to_managed(&ctx, ptr).unwrap().is(&obj));
    assert_eq!(to_native(&ctx, &obj, RefMode::Borrowed), ptr);
}

#[test]
fn test_existing_wrapper_is_not_a_temporary() {
    let ctx = Context::new();
    let obj = Value::Object(ManagedObject::instance(ManagedObject::class("Held")));
    let ptr = to_native(&ctx, &obj, RefMode::New);

    let mut temps = Temporaries::new(&ctx);
    assert_eq!(temps.borrow(&obj), ptr);
    assert!(temps.is_empty());
    drop(temps);

    assert_eq!(refcount::refcount_of(&ctx, ptr), 1);
}

#[test]
fn test_fastcall_array_releases_converted_elements() {
    let ctx = Context::new();
    let args = [Value::str("a"), Value::Double(2.5), Value::Int(3)];
    let mut temps = Temporaries::new(&ctx);
    let call = fastcall_to_native(&mut temps, &Value::None, &args);

    call.args.get(&ctx, 0).unwrap();
    call.args.get(&ctx, 1).unwrap();
    call.args.get(&ctx, 2).unwrap();
    assert_eq!(call.args.temporaries(), 2);
    assert_eq!(temps.len(), 2);

    assert_eq!(temps.release(), 2);
    assert_eq!(call.args.temporaries(), 0);
    // None and 3 are interned
    assert_eq!(ctx.handles().len(), 2);
}

// ---------------------------------------------------------------------------
// primitive coercion
// ---------------------------------------------------------------------------

#[test]
fn test_native_primitive_sizes() {
    let rt = SimpleRuntime::new();
    assert_eq!(as_native_primitive(&rt, &Value::Int(-3), true, 4, true).unwrap(), -3);
    assert_eq!(as_native_primitive(&rt, &Value::Long(1 << 40), true, 8, true).unwrap(), 1 << 40);

    let err = as_native_primitive(&rt, &Value::Int(1), true, 2, true).unwrap_err();
    assert!(err.is(&ExceptionKind::SystemError));
    assert_eq!(err.message(), "unsupported target size: 2");
}

#[test]
fn test_native_primitive_overflow_and_truncation() {
    let rt = SimpleRuntime::new();
    let big = Value::Long(1 << 40);
    let err = as_native_primitive(&rt, &big, true, 4, true).unwrap_err();
    assert!(err.is(&ExceptionKind::OverflowError));
    assert_eq!(err.message(), "Python int too large to convert to C type");

    assert_eq!(as_native_primitive(&rt, &big, true, 4, false).unwrap(), 0);
    assert_eq!(
        as_native_primitive(&rt, &Value::Long(-1), false, 4, false).unwrap(),
        u32::MAX as i64
    );
    let err = as_native_primitive(&rt, &Value::Long(-1), false, 8, true).unwrap_err();
    assert!(err.is(&ExceptionKind::OverflowError));
}

#[test]
fn test_native_primitive_uses_index_hook() {
    let rt = SimpleRuntime::new();
    let class = ManagedObject::class("Indexable");
    class.setattr(
        "__index__",
        Value::Object(ManagedObject::function("__index__", |_, _| Ok(Value::Long(9)))),
    );
    let instance = Value::Object(ManagedObject::instance(class));
    assert_eq!(as_native_primitive(&rt, &instance, true, 8, true).unwrap(), 9);
}

#[test]
fn test_native_primitive_falls_back_to_int_hook() {
    let rt = SimpleRuntime::new();
    let class = ManagedObject::class("IntLike");
    class.setattr(
        "__int__",
        Value::Object(ManagedObject::function("__int__", |_, _| Ok(Value::Int(4)))),
    );
    let instance = Value::Object(ManagedObject::instance(class));
    assert_eq!(as_native_primitive(&rt, &instance, true, 4, true).unwrap(), 4);
}

#[test]
fn test_native_primitive_hook_errors() {
    let rt = SimpleRuntime::new();

    let err = as_native_primitive(&rt, &Value::str("x"), true, 8, true).unwrap_err();
    assert!(err.is(&ExceptionKind::TypeError));
    assert_eq!(err.message(), "an integer is required (got type str)");

    let class = ManagedObject::class("Liar");
    class.setattr(
        "__index__",
        Value::Object(ManagedObject::function("__index__", |_, _| Ok(Value::str("no")))),
    );
    let instance = Value::Object(ManagedObject::instance(class));
    let err = as_native_primitive(&rt, &instance, true, 8, true).unwrap_err();
    assert!(err.is(&ExceptionKind::SystemError));
    assert_eq!(err.message(), "__index__ returned non-int (type str)");

    let class = ManagedObject::class("Raiser");
    class.setattr(
        "__index__",
        Value::Object(ManagedObject::function("__index__", |_, _| {
            Err(PyException::new(ExceptionKind::ValueError, "nope"))
        })),
    );
    let instance = Value::Object(ManagedObject::instance(class));
    let err = as_native_primitive(&rt, &instance, true, 8, true).unwrap_err();
    assert!(err.is(&ExceptionKind::ValueError));
}

#[test]
fn test_lossy_casts() {
    assert_eq!(cast_to_native_long(&Value::Bool(true)).unwrap(), 1);
    assert_eq!(cast_to_native_long(&Value::str("A")).unwrap(), 65);
    assert_eq!(cast_to_native_long(&Value::Double(-2.7)).unwrap(), -2);
    assert!(cast_to_native_long(&Value::str("AB")).is_err());
    let boxed = Value::new_object(ObjectKind::Int(12));
    assert_eq!(cast_to_native_long(&boxed).unwrap(), 12);

    assert_eq!(cast_to_double(&Value::Int(3)).unwrap(), 3.0);
    assert_eq!(cast_to_double(&Value::new_object(ObjectKind::Float(0.25))).unwrap(), 0.25);
    assert!(cast_to_double(&Value::None).is_err());
}

// ---------------------------------------------------------------------------
// pointers
// ---------------------------------------------------------------------------

#[test]
fn test_pointer_compare_identity_and_order() {
    let probes = Arc::new(InProcessProbes::new());
    let (a, b) = (probes.allocate(), probes.allocate());
    let ctx = Context::builder().probes(probes.clone()).build().unwrap();
    let va = to_managed(&ctx, a).unwrap();
    let vb = to_managed(&ctx, b).unwrap();

    let before = probes.probe_calls();
    assert!(pointer_compare(&ctx, &va, &va, CompareOp::Eq));
    assert!(pointer_compare(&ctx, &va, &vb, CompareOp::Ne));
    assert_eq!(probes.probe_calls(), before, "identity needs no probe");

    assert!(pointer_compare(&ctx, &va, &vb, CompareOp::Lt));
    assert!(!pointer_compare(&ctx, &va, &vb, CompareOp::Ge));
}

#[test]
fn test_pointer_add_yields_native_proxy() {
    let probes = Arc::new(InProcessProbes::new());
    let a = probes.allocate();
    let ctx = Context::builder().probes(probes).build().unwrap();
    let va = to_managed(&ctx, a).unwrap();

    let moved = pointer_add(&ctx, &va, 16).unwrap();
    assert_eq!(moved.as_native().unwrap().ptr(), a.offset(16));
}

use super::*;
use crate::error::ExceptionKind;
use crate::object::ManagedObject;
use std::io::Write;

fn limited(depth: usize) -> Context {
    let mut config = BridgeConfig::default();
    config.limits.max_recursion_depth = depth;
    Context::builder().config(config).build().unwrap()
}

#[test]
fn test_boundary_depth_tracks_nesting() {
    let ctx = Context::new();
    assert_eq!(ctx.recursion_depth(), 0);
    {
        let outer = ctx.enter_boundary().unwrap();
        assert_eq!(outer.depth(), 1);
        {
            let inner = ctx.enter_boundary().unwrap();
            assert_eq!(inner.depth(), 2);
        }
        assert_eq!(ctx.recursion_depth(), 1);
    }
    assert_eq!(ctx.recursion_depth(), 0);
}

#[test]
fn test_recursion_limit_raises_and_recovers() {
    let ctx = limited(2);
    let _a = ctx.enter_boundary().unwrap();
    let _b = ctx.enter_boundary().unwrap();

    let err = ctx.enter_boundary().unwrap_err();
    assert!(err.is(&ExceptionKind::RecursionError));
    // The failed attempt must not leak a level
    assert_eq!(ctx.recursion_depth(), 2);
}

#[test]
fn test_frames_pop_in_order() {
    let ctx = Context::new();
    assert!(ctx.current_frame().is_none());

    let outer = ctx.enter_frame("outer");
    {
        let _inner = ctx.enter_frame("inner");
        assert_eq!(ctx.frame_depth(), 2);
        assert_eq!(ctx.current_frame().unwrap().name(), "inner");
    }
    assert_eq!(ctx.current_frame().unwrap().name(), "outer");
    assert!(Arc::ptr_eq(outer.frame(), &ctx.current_frame().unwrap()));
    drop(outer);
    assert_eq!(ctx.frame_depth(), 0);
}

#[test]
fn test_native_null_is_a_singleton() {
    let ctx = Context::new();
    let a = ctx.native_null();
    let b = ctx.native_null();
    assert!(a.is(&b));
    assert!(a.as_native().unwrap().ptr().is_null());

    let other = Context::new();
    assert!(!a.is(&other.native_null()));
}

#[test]
fn test_primitive_cache_interns_once() {
    let ctx = Context::new();
    let (first, fresh) = ctx.primitives.small_int(7).unwrap();
    assert!(fresh);
    let (second, fresh) = ctx.primitives.small_int(7).unwrap();
    assert!(!fresh);
    assert!(Arc::ptr_eq(&first, &second));
    assert!(first.is_immortal());

    assert!(ctx.primitives.small_int(257).is_none());
    assert!(ctx.primitives.small_int(-6).is_none());
    assert_eq!(ctx.interned_count(), 1);
}

#[test]
fn test_none_singleton_maps_back_to_none() {
    let ctx = Context::new();
    let (none, _) = ctx.primitives.none();
    assert_eq!(none.delegate(), Some(Value::None));
}

#[test]
fn test_class_cache_is_per_context() {
    let class = ManagedObject::class("Widget");
    let a = Context::new();
    let b = Context::new();

    let (wa, fresh) = a.classes.get_or_create(&class);
    assert!(fresh);
    let (wa2, fresh) = a.classes.get_or_create(&class);
    assert!(!fresh);
    assert!(Arc::ptr_eq(&wa, &wa2));

    let (wb, _) = b.classes.get_or_create(&class);
    assert!(!Arc::ptr_eq(&wa, &wb));
}

#[test]
fn test_class_cache_refreshes_after_invalidation() {
    let ctx = Context::new();
    let class = ManagedObject::class("Gadget");
    let (first, _) = ctx.classes.get_or_create(&class);
    first.header().validity().invalidate();

    let (second, fresh) = ctx.classes.get_or_create(&class);
    assert!(fresh);
    assert!(!Arc::ptr_eq(&first, &second));
}

#[test]
fn test_release_native_references_uses_bulk_probe() {
    let probes = Arc::new(InProcessProbes::new());
    let ptr = probes.allocate();
    let ctx = Context::builder().probes(probes.clone()).build().unwrap();

    let proxy = ctx.natives().get_or_create(ptr);
    proxy.take_ownership();
    assert_eq!(proxy.owned_references(), 1);

    assert_eq!(ctx.release_native_references(), 1);
    assert_eq!(proxy.owned_references(), 0);
    assert!(!probes.is_live(ptr));
    assert_eq!(ctx.release_native_references(), 0);
}

#[test]
fn test_drop_releases_owned_native_references() {
    let probes = Arc::new(InProcessProbes::new());
    let ptr = probes.allocate();
    {
        let ctx = Context::builder().probes(probes.clone()).build().unwrap();
        ctx.natives().get_or_create(ptr).take_ownership();
        assert!(probes.is_live(ptr));
    }
    assert!(!probes.is_live(ptr));
}

#[test]
fn test_builder_loads_configured_symbol_table() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[symbol]]
name = "PyLong_FromLong"
args = ["Long"]
ret = "PyObject"
call = "direct"
"#
    )
    .unwrap();

    let mut config = BridgeConfig::default();
    config.symbols.table = Some(file.path().to_path_buf());
    let ctx = Context::builder().config(config).build().unwrap();

    assert_eq!(ctx.symbols().len(), 1);
    assert!(ctx.symbols().get("PyLong_FromLong").is_some());
}

#[test]
fn test_builder_reports_missing_symbol_table() {
    let mut config = BridgeConfig::default();
    config.symbols.table = Some("/nonexistent/capi_symbols.toml".into());
    let err = Context::builder().config(config).build().unwrap_err();
    assert!(matches!(err, SymbolError::Io { .. }));
}

#[test]
fn test_stats_start_empty() {
    let ctx = Context::new();
    let stats = ctx.stats();
    assert_eq!(stats, StatsSnapshot::default());
    assert_eq!(stats.live_handles(), 0);
}

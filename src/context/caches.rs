//! Per-context identity caches
//!
//! Interned primitives and class wrappers. Both hand back whether the entry
//! was created by this call, which decides the refcount adjustment of a
//! new-reference conversion.

use crate::config::BridgeConfig;
use crate::object::{ManagedObject, ObjectKind, ObjectRef};
use crate::wrapper::{ObjectFlavor, PrimitiveValue, Wrapper, WrapperRef};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::sync::{Arc, Weak};

fn intern(cell: &OnceCell<WrapperRef>, make: impl FnOnce() -> WrapperRef) -> (WrapperRef, bool) {
    let mut fresh = false;
    let wrapper = cell.get_or_init(|| {
        fresh = true;
        make()
    });
    (wrapper.clone(), fresh)
}

/// Small ints, True/False, NaN and None singletons
#[derive(Debug)]
pub(crate) struct PrimitiveCache {
    min: i64,
    max: i64,
    small_ints: Box<[OnceCell<WrapperRef>]>,
    bools: [OnceCell<WrapperRef>; 2],
    nan: OnceCell<WrapperRef>,
    none: OnceCell<WrapperRef>,
}

impl PrimitiveCache {
    pub(crate) fn new(config: &BridgeConfig) -> Self {
        let small_ints = (0..config.small_int_count())
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            min: config.cache.small_int_min,
            max: config.cache.small_int_max,
            small_ints,
            bools: [OnceCell::new(), OnceCell::new()],
            nan: OnceCell::new(),
            none: OnceCell::new(),
        }
    }

    /// Singleton for `value`, or `None` outside the interning window
    #[inline]
    pub(crate) fn small_int(&self, value: i64) -> Option<(WrapperRef, bool)> {
        if value < self.min || value > self.max {
            return None;
        }
        let cell = &self.small_ints[(value - self.min) as usize];
        // The window is validated to fit a C int
        Some(intern(cell, || {
            Wrapper::immortal_primitive(PrimitiveValue::Int(value as i32))
        }))
    }

    #[inline]
    pub(crate) fn boolean(&self, value: bool) -> (WrapperRef, bool) {
        intern(&self.bools[value as usize], || {
            Wrapper::immortal_primitive(PrimitiveValue::Bool(value))
        })
    }

    pub(crate) fn nan(&self) -> (WrapperRef, bool) {
        intern(&self.nan, || {
            Wrapper::immortal_primitive(PrimitiveValue::Double(f64::NAN))
        })
    }

    pub(crate) fn none(&self) -> (WrapperRef, bool) {
        intern(&self.none, || {
            Wrapper::immortal_object(ManagedObject::new(ObjectKind::None), ObjectFlavor::Plain)
        })
    }

    /// Number of singletons created so far
    pub(crate) fn populated(&self) -> usize {
        self.small_ints.iter().filter(|c| c.get().is_some()).count()
            + self.bools.iter().filter(|c| c.get().is_some()).count()
            + self.nan.get().is_some() as usize
            + self.none.get().is_some() as usize
    }
}

#[derive(Debug)]
struct ClassEntry {
    class: Weak<ManagedObject>,
    wrapper: WrapperRef,
}

/// Class object -> native type wrapper, per context
#[derive(Debug, Default)]
pub(crate) struct ClassCache {
    entries: DashMap<usize, ClassEntry>,
}

impl ClassCache {
    pub(crate) fn get_or_create(&self, class: &ObjectRef) -> (WrapperRef, bool) {
        let key = Arc::as_ptr(class) as usize;
        if let Some(entry) = self.entries.get(&key) {
            let same_class = entry
                .class
                .upgrade()
                .map_or(false, |cached| Arc::ptr_eq(&cached, class));
            if same_class && entry.wrapper.header().validity().is_valid() {
                return (entry.wrapper.clone(), false);
            }
        }

        let wrapper = Wrapper::object(class.clone(), ObjectFlavor::Type);
        self.entries.insert(
            key,
            ClassEntry {
                class: Arc::downgrade(class),
                wrapper: wrapper.clone(),
            },
        );
        (wrapper, true)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

//! Native objects seen from the managed side
//!
//! One proxy per native pointer per context: a pointer that comes back from
//! native code twice yields the same `NativeObjectRef`.

use super::NativePtr;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub type NativeObjectRef = Arc<NativeObject>;

/// Managed proxy for a natively allocated object
#[derive(Debug)]
pub struct NativeObject {
    ptr: NativePtr,
    /// References handed over by native code (transfer semantics) that the
    /// bridge still has to give back
    owned: AtomicI64,
}

impl NativeObject {
    pub(crate) fn new(ptr: NativePtr) -> NativeObjectRef {
        Arc::new(Self {
            ptr,
            owned: AtomicI64::new(0),
        })
    }

    #[inline]
    pub fn ptr(&self) -> NativePtr {
        self.ptr
    }

    /// References currently owned on behalf of the managed side
    pub fn owned_references(&self) -> i64 {
        self.owned.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn take_ownership(&self) {
        self.owned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn drain_owned(&self) -> i64 {
        self.owned.swap(0, Ordering::Relaxed)
    }
}

/// Per-context pointer -> proxy registry
#[derive(Debug, Default)]
pub struct NativeObjectTable {
    proxies: DashMap<NativePtr, NativeObjectRef>,
}

impl NativeObjectTable {
    pub fn new() -> Self {
        Self {
            proxies: DashMap::with_capacity(64),
        }
    }

    /// Existing proxy for `ptr`, or a new one registered for it
    pub fn get_or_create(&self, ptr: NativePtr) -> NativeObjectRef {
        self.proxies
            .entry(ptr)
            .or_insert_with(|| NativeObject::new(ptr))
            .value()
            .clone()
    }

    pub fn get(&self, ptr: NativePtr) -> Option<NativeObjectRef> {
        self.proxies.get(&ptr).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.proxies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    /// Collect and reset every owned reference, for a bulk release
    pub(crate) fn drain_owned(&self) -> Vec<(NativePtr, i64)> {
        self.proxies
            .iter()
            .filter_map(|entry| {
                let owned = entry.value().drain_owned();
                (owned > 0).then(|| (*entry.key(), owned))
            })
            .collect()
    }
}

//! Call-site resolution cache
//!
//! A small LRU in front of the handle table. An entry stamped with the
//! current generation is trusted outright; an older entry is trusted only
//! while its wrapper's validity assumption still holds, otherwise it is
//! dropped and the slow path runs.

use super::HandleTable;
use crate::object::NativePtr;
use crate::wrapper::WrapperRef;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
struct CacheEntry {
    wrapper: WrapperRef,
    generation: u64,
}

#[derive(Debug)]
pub struct HandleCache {
    entries: Mutex<LruCache<NativePtr, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl HandleCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Resolve `ptr`, consulting the cache first
    pub fn resolve(&self, table: &HandleTable, ptr: NativePtr) -> Option<WrapperRef> {
        let ptr = HandleTable::canonical(ptr);
        let generation = table.generation();
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.get_mut(&ptr) {
            if entry.generation == generation || entry.wrapper.header().validity().is_valid() {
                entry.generation = generation;
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.wrapper.clone());
            }
            entries.pop(&ptr);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let wrapper = table.lookup(ptr)?;
        entries.put(
            ptr,
            CacheEntry {
                wrapper: wrapper.clone(),
                generation,
            },
        );
        Some(wrapper)
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

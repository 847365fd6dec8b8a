//! Handle table - native handle space <-> wrapper mapping
//!
//! Design:
//! 1. Handles live in a tagged address range (top bit set) so any pointer
//!    can be classified as handle or real memory with one mask
//! 2. Slots are 8-byte aligned; the low 3 bits are ignored on lookup
//! 3. Released slots are recycled; every release advances a generation
//!    counter that call-site caches compare against

mod assumption;
mod cache;


pub use assumption::{Assumption, Generation};
pub use cache::HandleCache;

use crate::logging::log_handle_promoted;
use crate::object::NativePtr;
use crate::wrapper::{Wrapper, WrapperRef};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tag bit marking handle-space addresses
pub const HANDLE_TAG: u64 = 1 << 63;

const SLOT_SHIFT: u32 = 3;
const ALIGN_MASK: u64 = (1 << SLOT_SHIFT) - 1;

#[derive(Debug)]
pub struct HandleTable {
    entries: DashMap<NativePtr, WrapperRef>,
    free_slots: Mutex<Vec<u64>>,
    next_slot: AtomicU64,
    generation: Generation,
}

impl HandleTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::with_capacity(256),
            free_slots: Mutex::new(Vec::new()),
            next_slot: AtomicU64::new(1),
            generation: Generation::default(),
        }
    }

    /// Does `ptr` lie in handle space?
    #[inline(always)]
    pub fn is_handle(ptr: NativePtr) -> bool {
        ptr.addr() & HANDLE_TAG != 0
    }

    /// Strip interior-pointer bits so any address inside a slot resolves
    #[inline(always)]
    pub fn canonical(ptr: NativePtr) -> NativePtr {
        if Self::is_handle(ptr) {
            NativePtr::new(ptr.addr() & !ALIGN_MASK)
        } else {
            ptr
        }
    }

    fn allocate_slot(&self) -> u64 {
        self.free_slots
            .lock()
            .pop()
            .unwrap_or_else(|| self.next_slot.fetch_add(1, Ordering::Relaxed))
    }

    /// Give `wrapper` a handle, or return the one it already has.
    ///
    /// # Panics
    /// Panics if the wrapper was already finalized.
    pub fn promote(&self, wrapper: &WrapperRef) -> NativePtr {
        if let Some(handle) = wrapper.handle() {
            return handle;
        }
        assert!(
            !wrapper.is_finalized(),
            "promoting a finalized wrapper to native"
        );

        let slot = self.allocate_slot();
        let handle = NativePtr::new(HANDLE_TAG | (slot << SLOT_SHIFT));
        self.entries.insert(handle, wrapper.clone());

        match wrapper.header().set_handle(handle) {
            Ok(()) => {
                log_handle_promoted(handle, wrapper.refcount());
                handle
            }
            Err(existing) => {
                // Lost a race with another promotion
                self.entries.remove(&handle);
                self.free_slots.lock().push(slot);
                existing
            }
        }
    }

    #[inline]
    pub fn lookup(&self, ptr: NativePtr) -> Option<WrapperRef> {
        self.entries
            .get(&Self::canonical(ptr))
            .map(|entry| entry.value().clone())
    }

    /// Remove the wrapper's mapping; returns the handle it had
    pub fn release(&self, wrapper: &Wrapper) -> Option<NativePtr> {
        let handle = wrapper.header().clear_handle()?;
        if let Some((_, removed)) = self.entries.remove(&handle) {
            debug_assert!(
                std::ptr::eq(Arc::as_ptr(&removed), wrapper),
                "handle table entry mismatch"
            );
        }
        self.free_slots
            .lock()
            .push((handle.addr() & !HANDLE_TAG) >> SLOT_SHIFT);
        self.generation.advance();
        Some(handle)
    }

    #[inline(always)]
    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

use super::{CompareOp, NativeProbes, ProbeSymbol};
use crate::handles::HandleTable;
use crate::object::NativePtr;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

const FIRST_ADDRESS: u64 = 0x1000;
const OBJECT_STRIDE: u64 = 16;

/// Probes backed by an in-process simulated native heap
///
/// Native objects are plain refcount cells; an object is gone once its
/// count reaches zero. Counts every probe call so callers can check which
/// paths reached the native side.
#[derive(Debug)]
pub struct InProcessProbes {
    heap: DashMap<NativePtr, i64>,
    next_addr: AtomicU64,
    calls: [AtomicU64; ProbeSymbol::ALL.len()],
}

impl InProcessProbes {
    pub fn new() -> Self {
        Self {
            heap: DashMap::new(),
            next_addr: AtomicU64::new(FIRST_ADDRESS),
            calls: Default::default(),
        }
    }

    /// Allocate a native object with one reference
    pub fn allocate(&self) -> NativePtr {
        let ptr = NativePtr::new(self.next_addr.fetch_add(OBJECT_STRIDE, Ordering::Relaxed));
        self.heap.insert(ptr, 1);
        ptr
    }

    pub fn is_live(&self, ptr: NativePtr) -> bool {
        self.heap.contains_key(&ptr)
    }

    pub fn live_objects(&self) -> usize {
        self.heap.len()
    }

    /// Probe calls of every kind
    pub fn probe_calls(&self) -> u64 {
        self.calls.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn calls_to(&self, symbol: ProbeSymbol) -> u64 {
        self.calls[symbol.index()].load(Ordering::Relaxed)
    }

    fn subtract(&self, ptr: NativePtr, delta: i64) -> i64 {
        let remaining = match self.heap.get_mut(&ptr) {
            Some(mut count) => {
                *count -= delta;
                *count
            }
            None => return -delta,
        };
        if remaining <= 0 {
            self.heap.remove(&ptr);
        }
        remaining
    }

    #[inline]
    fn record(&self, symbol: ProbeSymbol) {
        self.calls[symbol.index()].fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for InProcessProbes {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeProbes for InProcessProbes {
    fn points_to_handle_space(&self, ptr: NativePtr) -> bool {
        self.record(ProbeSymbol::PointsToHandleSpace);
        HandleTable::is_handle(ptr)
    }

    fn resolve_handle(&self, ptr: NativePtr) -> NativePtr {
        self.record(ProbeSymbol::ResolveHandle);
        HandleTable::canonical(ptr)
    }

    fn refcount(&self, ptr: NativePtr) -> i64 {
        self.record(ProbeSymbol::Refcount);
        self.heap.get(&ptr).map(|count| *count).unwrap_or(0)
    }

    fn add_refcount(&self, ptr: NativePtr, delta: i64) -> i64 {
        self.record(ProbeSymbol::AddRefcount);
        let mut count = self.heap.entry(ptr).or_insert(0);
        *count += delta;
        *count
    }

    fn sub_refcount(&self, ptr: NativePtr, delta: i64) -> i64 {
        self.record(ProbeSymbol::SubRefcount);
        self.subtract(ptr, delta)
    }

    fn bulk_subref(&self, refs: &[(NativePtr, i64)]) {
        self.record(ProbeSymbol::BulkSubref);
        for &(ptr, delta) in refs {
            self.subtract(ptr, delta);
        }
    }

    fn pointer_compare(&self, a: NativePtr, b: NativePtr, op: CompareOp) -> bool {
        self.record(ProbeSymbol::PtrCompare);
        op.apply(a.addr(), b.addr())
    }

    fn pointer_add(&self, ptr: NativePtr, offset: i64) -> NativePtr {
        self.record(ProbeSymbol::PtrAdd);
        ptr.offset(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_distinct_aligned() {
        let probes = InProcessProbes::new();
        let a = probes.allocate();
        let b = probes.allocate();
        assert_ne!(a, b);
        assert_eq!(a.addr() % 8, 0);
        assert!(!HandleTable::is_handle(a));
        assert_eq!(probes.refcount(a), 1);
    }

    #[test]
    fn test_object_freed_at_zero() {
        let probes = InProcessProbes::new();
        let ptr = probes.allocate();
        assert_eq!(probes.add_refcount(ptr, 2), 3);
        assert_eq!(probes.sub_refcount(ptr, 2), 1);
        assert!(probes.is_live(ptr));
        assert_eq!(probes.sub_refcount(ptr, 1), 0);
        assert!(!probes.is_live(ptr));
    }

    #[test]
    fn test_bulk_subref() {
        let probes = InProcessProbes::new();
        let a = probes.allocate();
        let b = probes.allocate();
        probes.add_refcount(b, 1);
        probes.bulk_subref(&[(a, 1), (b, 1)]);
        assert_eq!(probes.calls_to(ProbeSymbol::BulkSubref), 1);
        assert_eq!(probes.calls_to(ProbeSymbol::SubRefcount), 0);
        assert!(!probes.is_live(a));
        assert_eq!(probes.refcount(b), 1);
    }

    #[test]
    fn test_compare_ops() {
        let probes = InProcessProbes::new();
        let lo = NativePtr::new(0x1000);
        let hi = NativePtr::new(0x2000);
        assert!(probes.pointer_compare(lo, hi, CompareOp::Lt));
        assert!(probes.pointer_compare(hi, lo, CompareOp::Ge));
        assert!(!probes.pointer_compare(lo, hi, CompareOp::Eq));
        assert_eq!(CompareOp::from_name("__le__"), Some(CompareOp::Le));
        assert_eq!(CompareOp::from_name("__add__"), None);
    }

    #[test]
    fn test_calls_counted() {
        let probes = InProcessProbes::new();
        probes.points_to_handle_space(NativePtr::new(0x10));
        probes.pointer_add(NativePtr::new(0x10), 8);
        assert_eq!(probes.probe_calls(), 2);
        assert_eq!(probes.calls_to(ProbeSymbol::PtrAdd), 1);
        assert_eq!(probes.calls_to(ProbeSymbol::Refcount), 0);
    }
}

//! Native probe surface
//!
//! The handful of C-ABI helpers the bridge calls on the native side when its
//! own tables cannot answer: handle-space membership, handle resolution,
//! the `ob_refcnt` field of purely native objects, and pointer arithmetic.
//! Every call here is a slow path.

mod in_process;

pub use in_process::InProcessProbes;

use crate::object::NativePtr;

/// Rich comparison operator, as named by the managed dunder methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Lt,
    Le,
    Eq,
    Ne,
    Gt,
    Ge,
}

impl CompareOp {
    /// Operator for a dunder name such as `__lt__`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "__lt__" => Some(Self::Lt),
            "__le__" => Some(Self::Le),
            "__eq__" => Some(Self::Eq),
            "__ne__" => Some(Self::Ne),
            "__gt__" => Some(Self::Gt),
            "__ge__" => Some(Self::Ge),
            _ => None,
        }
    }

    /// Apply to two addresses
    #[inline]
    pub fn apply(self, a: u64, b: u64) -> bool {
        match self {
            Self::Lt => a < b,
            Self::Le => a <= b,
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Gt => a > b,
            Self::Ge => a >= b,
        }
    }
}

/// C symbol behind each probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeSymbol {
    PointsToHandleSpace,
    ResolveHandle,
    Refcount,
    AddRefcount,
    SubRefcount,
    BulkSubref,
    PtrCompare,
    PtrAdd,
}

impl ProbeSymbol {
    pub const ALL: [ProbeSymbol; 8] = [
        Self::PointsToHandleSpace,
        Self::ResolveHandle,
        Self::Refcount,
        Self::AddRefcount,
        Self::SubRefcount,
        Self::BulkSubref,
        Self::PtrCompare,
        Self::PtrAdd,
    ];

    pub fn c_name(self) -> &'static str {
        match self {
            Self::PointsToHandleSpace => "points_to_py_handle_space",
            Self::ResolveHandle => "resolve_handle",
            Self::Refcount => "get_ob_refcnt",
            Self::AddRefcount => "addref",
            Self::SubRefcount => "subref",
            Self::BulkSubref => "bulk_subref",
            Self::PtrCompare => "ptr_compare",
            Self::PtrAdd => "ptr_add",
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Native helper functions the bridge depends on
pub trait NativeProbes: Send + Sync {
    /// Is `ptr` an address the bridge handed out?
    fn points_to_handle_space(&self, ptr: NativePtr) -> bool;

    /// Canonical handle for an address inside handle space
    fn resolve_handle(&self, ptr: NativePtr) -> NativePtr;

    /// Current `ob_refcnt` of a native object
    fn refcount(&self, ptr: NativePtr) -> i64;

    /// Add to `ob_refcnt`, returning the new value
    fn add_refcount(&self, ptr: NativePtr, delta: i64) -> i64;

    /// Subtract from `ob_refcnt`, returning the new value; the native side
    /// deallocates at zero
    fn sub_refcount(&self, ptr: NativePtr, delta: i64) -> i64;

    /// Release many owned references at once; the default subtracts one
    /// entry at a time
    fn bulk_subref(&self, refs: &[(NativePtr, i64)]) {
        for &(ptr, delta) in refs {
            self.sub_refcount(ptr, delta);
        }
    }

    fn pointer_compare(&self, a: NativePtr, b: NativePtr, op: CompareOp) -> bool;

    fn pointer_add(&self, ptr: NativePtr, offset: i64) -> NativePtr;
}

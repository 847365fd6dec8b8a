//! Conversions across the boundary
//!
//! Design: one exhaustive match per direction over the closed `Value`
//! union:
//! 1. to-native: interned singletons, wrapper reuse, fresh wrappers,
//!    native passthrough; then the refcount rule of the requested `RefMode`
//! 2. to-managed: cached handle resolution, native probes on a miss,
//!    per-context proxies for purely native objects
//! 3. Calling-convention helpers on top: batches, fastcall views, slot
//!    layouts, primitive coercion and pointer arithmetic
//!
//! Arguments of a native call are borrowed through a `Temporaries` scope,
//! which drops the wrappers it had to create once the call returns.

mod batch;
mod fastcall;
mod layout;
mod pointer;
mod primitive;
mod temporaries;
mod to_managed;
mod to_native;

#[cfg(test)]
mod tests;

pub use batch::{all_to_managed, all_to_native, ArgVec};
pub use fastcall::{
    fastcall_to_native, fastcall_with_keywords_to_native, FastCallArgs, ObjectArrayWrapper,
};
pub use layout::{convert_slots, NativeArg, SlotLayout};
pub use pointer::{pointer_add, pointer_compare};
pub use primitive::{as_native_primitive, cast_to_double, cast_to_native_long};
pub use temporaries::Temporaries;
pub use to_managed::{to_managed, to_managed_transfer};
pub use to_native::{to_native, to_native_wrapper};

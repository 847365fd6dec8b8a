//! Call dispatch across the boundary
//!
//! Every call runs the same sequence: marshal the arguments, invoke,
//! marshal the result, then propagate any pending exception.
//! - `UpcallDispatcher`: native code calls a managed callable, resolved
//!   directly, as a method on a receiver, or by module name
//! - `DowncallDispatcher`: managed code calls a native function, with
//!   arguments shaped by a slot layout or by the symbol table
//!
//! Small arities take specialized paths; the results never differ from
//! the generic path.

mod downcall;
mod native_fn;
mod upcall;


pub use downcall::DowncallDispatcher;
pub use native_fn::{
    CallError, ExternFunction, NativeClosure, NativeFunction, NativeReturn, MAX_EXTERN_ARITY,
};
pub use upcall::UpcallDispatcher;

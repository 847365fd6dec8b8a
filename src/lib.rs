//! cext-bridge - C-extension compatibility bridge
//!
//! Lets native extension code written against the `PyObject*` API operate
//! on objects owned by a managed runtime. Managed objects cross the
//! boundary as tagged handles backed by wrappers with native-style
//! reference counts; raw native objects come back as tracked proxies.
//!
//! Entry points:
//! - [`Context`] owns the handle table, caches and pending-exception slot
//! - [`convert`] moves values across the boundary
//! - [`dispatch`] runs upcalls and downcalls
//! - [`ffi`] exports the refcount and error-state API to C

pub mod config;
pub mod context;
pub mod convert;
pub mod dispatch;
pub mod error;
pub mod exception;
pub mod ffi;
pub mod format;
pub mod handles;
pub mod logging;
pub mod metrics;
pub mod object;
pub mod probes;
pub mod refcount;
pub mod runtime;
pub mod symbols;
pub mod wrapper;

// Re-export core types
pub use config::BridgeConfig;
pub use context::{Context, ContextBuilder};
pub use convert::{to_managed, to_managed_transfer, to_native};
pub use dispatch::{DowncallDispatcher, NativeFunction, UpcallDispatcher};
pub use error::{ExceptionKind, PyException, PyResult};
pub use exception::{may_raise, ErrorResult, ExceptionBridge};
pub use handles::HandleTable;
pub use metrics::StatsSnapshot;
pub use object::{ManagedObject, NativePtr, Value};
pub use probes::{InProcessProbes, NativeProbes};
pub use refcount::RefMode;
pub use runtime::{ManagedRuntime, SimpleRuntime};
pub use symbols::{ArgShape, SymbolTable};
pub use wrapper::{Wrapper, WrapperRef};

//! Native-facing wrappers
//!
//! Design: a wrapper gives a managed value a stable native identity:
//! 1. `PrimitiveWrapper` holds an unboxed int/long/bool/double/byte inline
//!    and can be materialized into a boxed object later
//! 2. `ObjectWrapper` holds exactly one managed object
//! 3. Both share a `WrapperHeader` (refcount, handle, validity, finalized)
//!
//! The wrapper owns its delegate; the delegate points back weakly.

mod header;
mod object;
mod primitive;


pub use header::WrapperHeader;
pub use object::{ObjectFlavor, ObjectWrapper};
pub use primitive::{PrimitiveTag, PrimitiveValue, PrimitiveWrapper};

use crate::object::{NativePtr, ObjectKind, ObjectRef, Value};
use std::sync::Arc;

pub type WrapperRef = Arc<Wrapper>;

/// A native-facing cell
#[derive(Debug)]
pub enum Wrapper {
    Primitive(PrimitiveWrapper),
    Object(ObjectWrapper),
}

impl Wrapper {
    /// Fresh, uncached primitive wrapper
    pub fn primitive(value: PrimitiveValue) -> WrapperRef {
        Arc::new(Self::Primitive(PrimitiveWrapper::new(value, false)))
    }

    /// Interned primitive wrapper; never finalized
    pub(crate) fn immortal_primitive(value: PrimitiveValue) -> WrapperRef {
        Arc::new(Self::Primitive(PrimitiveWrapper::new(value, true)))
    }

    /// Wrap `obj` and record the wrapper on it for later reuse
    pub fn object(obj: ObjectRef, flavor: ObjectFlavor) -> WrapperRef {
        Self::build_object(obj, flavor, false)
    }

    pub(crate) fn immortal_object(obj: ObjectRef, flavor: ObjectFlavor) -> WrapperRef {
        Self::build_object(obj, flavor, true)
    }

    fn build_object(obj: ObjectRef, flavor: ObjectFlavor, immortal: bool) -> WrapperRef {
        let wrapper = Arc::new(Self::Object(ObjectWrapper::new(obj.clone(), flavor, immortal)));
        obj.set_native_wrapper(&wrapper);
        wrapper
    }

    #[inline(always)]
    pub fn header(&self) -> &WrapperHeader {
        match self {
            Self::Primitive(w) => &w.header,
            Self::Object(w) => &w.header,
        }
    }

    #[inline]
    pub fn refcount(&self) -> i64 {
        self.header().refcount()
    }

    #[inline]
    pub fn handle(&self) -> Option<NativePtr> {
        self.header().handle()
    }

    #[inline]
    pub fn is_finalized(&self) -> bool {
        self.header().is_finalized()
    }

    #[inline]
    pub fn is_immortal(&self) -> bool {
        self.header().is_immortal()
    }

    /// Managed value behind this wrapper; `None` once finalized.
    ///
    /// A materialized primitive answers with its boxed object so that both
    /// directions agree on identity.
    pub fn delegate(&self) -> Option<Value> {
        match self {
            Self::Primitive(w) => {
                if self.is_finalized() {
                    return None;
                }
                Some(match w.materialized() {
                    Some(obj) => Value::Object(obj),
                    None => w.value().to_value(),
                })
            }
            Self::Object(w) => w.delegate().map(|obj| {
                if matches!(obj.kind(), ObjectKind::None) {
                    Value::None
                } else {
                    Value::Object(obj)
                }
            }),
        }
    }

    /// Boxed object for this wrapper, keeping the native identity.
    ///
    /// # Panics
    /// Panics on a finalized object wrapper; handing out its delegate again
    /// would resurrect it.
    pub fn materialize(self: &Arc<Self>) -> ObjectRef {
        match &**self {
            Self::Primitive(w) => {
                let (obj, fresh) = w.materialize_boxed();
                if fresh {
                    obj.set_native_wrapper(self);
                }
                obj
            }
            Self::Object(w) => match w.delegate() {
                Some(obj) => obj,
                None => panic!("materialize on finalized wrapper at {:?}", self.handle()),
            },
        }
    }

    /// Drop the delegate reference and clear its back-pointer
    pub(crate) fn release_delegate(&self) -> Option<ObjectRef> {
        let released = match self {
            Self::Primitive(w) => w.release(),
            Self::Object(w) => w.release(),
        };
        if let Some(obj) = &released {
            obj.clear_native_wrapper(self);
        }
        released
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveWrapper> {
        match self {
            Self::Primitive(w) => Some(w),
            Self::Object(_) => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectWrapper> {
        match self {
            Self::Object(w) => Some(w),
            Self::Primitive(_) => None,
        }
    }
}

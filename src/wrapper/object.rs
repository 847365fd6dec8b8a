use super::header::WrapperHeader;
use crate::object::ObjectRef;
use parking_lot::Mutex;

/// What kind of managed object sits behind an object wrapper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectFlavor {
    Plain,
    /// Class object exposed as a native type object
    Type,
}

/// Native-facing cell for one managed object
///
/// The delegate is fixed at construction and only dropped at finalization.
#[derive(Debug)]
pub struct ObjectWrapper {
    pub(super) header: WrapperHeader,
    delegate: Mutex<Option<ObjectRef>>,
    flavor: ObjectFlavor,
}

impl ObjectWrapper {
    pub(super) fn new(delegate: ObjectRef, flavor: ObjectFlavor, immortal: bool) -> Self {
        Self {
            header: WrapperHeader::new(immortal),
            delegate: Mutex::new(Some(delegate)),
            flavor,
        }
    }

    pub fn delegate(&self) -> Option<ObjectRef> {
        self.delegate.lock().clone()
    }

    #[inline]
    pub fn flavor(&self) -> ObjectFlavor {
        self.flavor
    }

    pub(super) fn release(&self) -> Option<ObjectRef> {
        self.delegate.lock().take()
    }
}

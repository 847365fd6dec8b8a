use super::header::WrapperHeader;
use crate::object::{ManagedObject, ObjectKind, ObjectRef, Value};
use parking_lot::Mutex;

/// Primitive tags a wrapper can carry inline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveTag {
    Int,
    Long,
    Bool,
    Double,
    Byte,
}

/// Inline primitive payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveValue {
    Int(i32),
    Long(i64),
    Bool(bool),
    Double(f64),
    Byte(u8),
}

impl PrimitiveValue {
    pub fn tag(&self) -> PrimitiveTag {
        match self {
            Self::Int(_) => PrimitiveTag::Int,
            Self::Long(_) => PrimitiveTag::Long,
            Self::Bool(_) => PrimitiveTag::Bool,
            Self::Double(_) => PrimitiveTag::Double,
            Self::Byte(_) => PrimitiveTag::Byte,
        }
    }

    pub fn to_value(self) -> Value {
        match self {
            Self::Int(v) => Value::Int(v),
            Self::Long(v) => Value::Long(v),
            Self::Bool(b) => Value::Bool(b),
            Self::Double(d) => Value::Double(d),
            Self::Byte(b) => Value::Byte(b),
        }
    }

    fn boxed_kind(self) -> ObjectKind {
        match self {
            Self::Int(v) => ObjectKind::Int(v as i128),
            Self::Long(v) => ObjectKind::Int(v as i128),
            Self::Byte(v) => ObjectKind::Int(v as i128),
            Self::Bool(b) => ObjectKind::Bool(b),
            Self::Double(d) => ObjectKind::Float(d),
        }
    }
}

/// Identity-stable cell for an unboxed primitive
#[derive(Debug)]
pub struct PrimitiveWrapper {
    pub(super) header: WrapperHeader,
    value: PrimitiveValue,
    materialized: Mutex<Option<ObjectRef>>,
}

impl PrimitiveWrapper {
    pub(super) fn new(value: PrimitiveValue, immortal: bool) -> Self {
        Self {
            header: WrapperHeader::new(immortal),
            value,
            materialized: Mutex::new(None),
        }
    }

    #[inline]
    pub fn value(&self) -> PrimitiveValue {
        self.value
    }

    #[inline]
    pub fn tag(&self) -> PrimitiveTag {
        self.value.tag()
    }

    pub fn materialized(&self) -> Option<ObjectRef> {
        self.materialized.lock().clone()
    }

    /// Boxed object for this primitive, allocated on first request.
    /// Returns the object and whether this call created it.
    pub(super) fn materialize_boxed(&self) -> (ObjectRef, bool) {
        let mut slot = self.materialized.lock();
        match slot.as_ref() {
            Some(obj) => (obj.clone(), false),
            None => {
                let obj = ManagedObject::new(self.value.boxed_kind());
                *slot = Some(obj.clone());
                (obj, true)
            }
        }
    }

    pub(super) fn release(&self) -> Option<ObjectRef> {
        self.materialized.lock().take()
    }
}

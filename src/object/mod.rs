//! Managed value model
//!
//! Design: one closed tagged union for everything that can cross the
//! boundary, matched exhaustively by the conversion code:
//! 1. Unboxed primitives (bool, int, long, double, byte)
//! 2. Managed heap objects (`ObjectRef`)
//! 3. Native objects seen from the managed side (`NativeObjectRef`)
//! 4. Sentinels (None, no-value, native null) and opaque foreign words

mod managed;
mod native;

pub use managed::{BuiltinFn, ClassData, ManagedFunction, ManagedObject, ObjectKind, ObjectRef};
pub use native::{NativeObject, NativeObjectRef, NativeObjectTable};

use std::fmt;
use std::sync::Arc;

/// Pointer-sized native address (`PyObject*` as native code sees it)
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct NativePtr(u64);

impl NativePtr {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn addr(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Byte offset, wrapping like C pointer arithmetic on `char*`
    #[inline]
    pub const fn offset(self, delta: i64) -> Self {
        Self(self.0.wrapping_add(delta as u64))
    }
}

impl fmt::Debug for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativePtr({:#x})", self.0)
    }
}

impl fmt::Display for NativePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Any value the managed side can hand to (or receive from) native code
#[derive(Clone)]
pub enum Value {
    /// Python `None`
    None,
    /// Absence of a value; what a native NULL result means on the managed side
    NoValue,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Byte(u8),
    /// Unboxed string; boxed into a fresh object when exposed to native code
    Str(Arc<str>),
    Object(ObjectRef),
    /// Object allocated natively, tracked by pointer
    Native(NativeObjectRef),
    /// The context's native NULL sentinel
    NativeNull(NativeObjectRef),
    /// Opaque pointer-sized value from another language
    Foreign(u64),
}

impl Value {
    pub fn str(s: impl Into<Arc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// Allocate a managed object and return it as a value
    pub fn new_object(kind: ObjectKind) -> Self {
        Self::Object(ManagedObject::new(kind))
    }

    /// Python identity (`is`): reference identity for heap values, value
    /// identity for primitives
    pub fn is(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) | (Self::NativeNull(a), Self::NativeNull(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Str(a), Self::Str(b)) => Arc::ptr_eq(a, b),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeObjectRef> {
        match self {
            Self::Native(obj) | Self::NativeNull(obj) => Some(obj),
            _ => None,
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[inline]
    pub fn is_no_value(&self) -> bool {
        matches!(self, Self::NoValue)
    }

    /// Integer payload of int-like values, including boxed ints and bools
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Self::Bool(b) => Some(*b as i128),
            Self::Int(v) => Some(*v as i128),
            Self::Long(v) => Some(*v as i128),
            Self::Byte(v) => Some(*v as i128),
            Self::Object(obj) => match obj.kind() {
                ObjectKind::Int(v) => Some(*v),
                ObjectKind::Bool(b) => Some(*b as i128),
                _ => None,
            },
            _ => None,
        }
    }

    /// String payload of unboxed and boxed strings
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Object(obj) => match obj.kind() {
                ObjectKind::Str(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// Python type name, used in error messages
    pub fn type_name(&self) -> String {
        match self {
            Self::None => "NoneType".to_string(),
            Self::NoValue => "NoValue".to_string(),
            Self::Bool(_) => "bool".to_string(),
            Self::Int(_) | Self::Long(_) | Self::Byte(_) => "int".to_string(),
            Self::Double(_) => "float".to_string(),
            Self::Str(_) => "str".to_string(),
            Self::Object(obj) => obj.type_name(),
            Self::Native(_) => "native object".to_string(),
            Self::NativeNull(_) => "NULL".to_string(),
            Self::Foreign(_) => "foreign".to_string(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) | (Self::NoValue, Self::NoValue) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::Native(a), Self::Native(b)) | (Self::NativeNull(a), Self::NativeNull(b)) => {
                Arc::ptr_eq(a, b)
            }
            (Self::Foreign(a), Self::Foreign(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::NoValue => f.write_str("NoValue"),
            Self::Bool(b) => write!(f, "Bool({})", b),
            Self::Int(v) => write!(f, "Int({})", v),
            Self::Long(v) => write!(f, "Long({})", v),
            Self::Double(v) => write!(f, "Double({})", v),
            Self::Byte(v) => write!(f, "Byte({})", v),
            Self::Str(s) => write!(f, "Str({:?})", s),
            Self::Object(obj) => write!(f, "Object({:?})", obj),
            Self::Native(obj) => write!(f, "Native({})", obj.ptr()),
            Self::NativeNull(_) => f.write_str("NativeNull"),
            Self::Foreign(bits) => write!(f, "Foreign({:#x})", bits),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Self::Object(value)
    }
}

//! Managed heap objects
//!
//! A `ManagedObject` never owns its native wrapper: the back-reference is a
//! `Weak` used only to find the existing wrapper again, and it is cleared
//! when that wrapper is finalized.

use super::Value;
use crate::error::PyResult;
use crate::wrapper::{Wrapper, WrapperRef};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

/// Shared handle to a managed object; identity is `Arc::ptr_eq`
pub type ObjectRef = Arc<ManagedObject>;

/// Body of a managed callable: positional args, keyword args
pub type BuiltinFn = Arc<dyn Fn(&[Value], &[(String, Value)]) -> PyResult<Value> + Send + Sync>;

/// Managed function object
#[derive(Clone)]
pub struct ManagedFunction {
    name: String,
    body: BuiltinFn,
}

impl ManagedFunction {
    pub fn new(name: impl Into<String>, body: BuiltinFn) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn invoke(&self, args: &[Value], kwargs: &[(String, Value)]) -> PyResult<Value> {
        (self.body)(args, kwargs)
    }
}

impl fmt::Debug for ManagedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<function {}>", self.name)
    }
}

/// Class object payload
#[derive(Debug)]
pub struct ClassData {
    pub name: String,
    pub attrs: RwLock<HashMap<String, Value>>,
}

/// Object payloads the bridge needs to know about
#[derive(Debug)]
pub enum ObjectKind {
    /// The `None` singleton, boxed only to give it a native wrapper
    None,
    Str(String),
    /// Boxed int; wide enough to model values that overflow a native `long`
    Int(i128),
    Float(f64),
    Bool(bool),
    Tuple(Vec<Value>),
    Class(ClassData),
    Instance {
        class: ObjectRef,
        attrs: RwLock<HashMap<String, Value>>,
    },
    Function(ManagedFunction),
    /// Function bound to a receiver
    Method {
        receiver: Value,
        function: ObjectRef,
    },
}

/// A managed heap object
pub struct ManagedObject {
    kind: ObjectKind,
    native_wrapper: Mutex<Weak<Wrapper>>,
}

impl ManagedObject {
    pub fn new(kind: ObjectKind) -> ObjectRef {
        Arc::new(Self {
            kind,
            native_wrapper: Mutex::new(Weak::new()),
        })
    }

    pub fn str(s: impl Into<String>) -> ObjectRef {
        Self::new(ObjectKind::Str(s.into()))
    }

    pub fn tuple(items: Vec<Value>) -> ObjectRef {
        Self::new(ObjectKind::Tuple(items))
    }

    pub fn class(name: impl Into<String>) -> ObjectRef {
        Self::new(ObjectKind::Class(ClassData {
            name: name.into(),
            attrs: RwLock::new(HashMap::new()),
        }))
    }

    pub fn instance(class: ObjectRef) -> ObjectRef {
        Self::new(ObjectKind::Instance {
            class,
            attrs: RwLock::new(HashMap::new()),
        })
    }

    pub fn function<F>(name: impl Into<String>, body: F) -> ObjectRef
    where
        F: Fn(&[Value], &[(String, Value)]) -> PyResult<Value> + Send + Sync + 'static,
    {
        Self::new(ObjectKind::Function(ManagedFunction::new(name, Arc::new(body))))
    }

    #[inline]
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self.kind, ObjectKind::Class(_))
    }

    pub fn type_name(&self) -> String {
        match &self.kind {
            ObjectKind::None => "NoneType".to_string(),
            ObjectKind::Str(_) => "str".to_string(),
            ObjectKind::Int(_) => "int".to_string(),
            ObjectKind::Float(_) => "float".to_string(),
            ObjectKind::Bool(_) => "bool".to_string(),
            ObjectKind::Tuple(_) => "tuple".to_string(),
            ObjectKind::Class(_) => "type".to_string(),
            ObjectKind::Instance { class, .. } => match class.kind() {
                ObjectKind::Class(data) => data.name.clone(),
                _ => "object".to_string(),
            },
            ObjectKind::Function(_) => "function".to_string(),
            ObjectKind::Method { .. } => "method".to_string(),
        }
    }

    /// Read an attribute stored on the instance or class
    pub fn getattr(&self, name: &str) -> Option<Value> {
        match &self.kind {
            ObjectKind::Class(data) => data.attrs.read().get(name).cloned(),
            ObjectKind::Instance { class, attrs } => attrs
                .read()
                .get(name)
                .cloned()
                .or_else(|| class.getattr(name)),
            _ => None,
        }
    }

    /// Store an attribute; returns false for objects without a namespace
    pub fn setattr(&self, name: impl Into<String>, value: Value) -> bool {
        match &self.kind {
            ObjectKind::Class(data) => {
                data.attrs.write().insert(name.into(), value);
                true
            }
            ObjectKind::Instance { attrs, .. } => {
                attrs.write().insert(name.into(), value);
                true
            }
            _ => false,
        }
    }

    /// Live wrapper previously created for this object, if any
    pub(crate) fn native_wrapper(&self) -> Option<WrapperRef> {
        self.native_wrapper
            .lock()
            .upgrade()
            .filter(|wrapper| !wrapper.is_finalized())
    }

    pub fn has_native_wrapper(&self) -> bool {
        self.native_wrapper().is_some()
    }

    pub(crate) fn set_native_wrapper(&self, wrapper: &WrapperRef) {
        *self.native_wrapper.lock() = Arc::downgrade(wrapper);
    }

    /// Clear the back-reference if it still points at `wrapper`
    pub(crate) fn clear_native_wrapper(&self, wrapper: &Wrapper) -> bool {
        let mut slot = self.native_wrapper.lock();
        if std::ptr::eq(slot.as_ptr(), wrapper) {
            *slot = Weak::new();
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for ManagedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ObjectKind::None => f.write_str("None"),
            ObjectKind::Str(s) => write!(f, "{:?}", s),
            ObjectKind::Int(v) => write!(f, "{}", v),
            ObjectKind::Float(v) => write!(f, "{}", v),
            ObjectKind::Bool(b) => write!(f, "{}", b),
            ObjectKind::Tuple(items) => write!(f, "tuple[{}]", items.len()),
            ObjectKind::Class(data) => write!(f, "<class '{}'>", data.name),
            ObjectKind::Instance { .. } => write!(f, "<{} object at {:p}>", self.type_name(), self),
            ObjectKind::Function(func) => write!(f, "{:?}", func),
            ObjectKind::Method { function, .. } => write!(f, "<bound {:?}>", function),
        }
    }
}

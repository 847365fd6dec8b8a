use crate::error::{PyException, PyResult};
use crate::object::NativePtr;
use std::sync::Arc;

/// One argument of a native variadic call
#[derive(Debug, Clone, PartialEq)]
pub enum VaArg {
    Int(i64),
    Double(f64),
    /// `const char*`; `None` is NULL
    CStr(Option<Arc<str>>),
    /// `PyObject*` or any other pointer
    Object(NativePtr),
}

impl From<i64> for VaArg {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for VaArg {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for VaArg {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for VaArg {
    fn from(value: &str) -> Self {
        Self::CStr(Some(value.into()))
    }
}

impl From<NativePtr> for VaArg {
    fn from(value: NativePtr) -> Self {
        Self::Object(value)
    }
}

/// Read cursor over variadic arguments (`va_list`)
///
/// Every read failure reports the 1-based position of the argument.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VaList {
    args: Vec<VaArg>,
    pos: usize,
}

impl VaList {
    pub fn new(args: Vec<VaArg>) -> Self {
        Self { args, pos: 0 }
    }

    /// 1-based position of the next argument
    #[inline]
    pub fn position(&self) -> usize {
        self.pos + 1
    }

    pub fn remaining(&self) -> usize {
        self.args.len().saturating_sub(self.pos)
    }

    pub fn args(&self) -> &[VaArg] {
        &self.args
    }

    /// Error for the argument at the current position
    pub fn access_error(&self) -> PyException {
        PyException::system_error(format!(
            "Error when accessing variable argument at position {}",
            self.position()
        ))
    }

    fn take<T>(&mut self, read: impl FnOnce(&VaArg) -> Option<T>) -> PyResult<T> {
        let value = self.args.get(self.pos).and_then(read);
        match value {
            Some(value) => {
                self.pos += 1;
                Ok(value)
            }
            None => Err(self.access_error()),
        }
    }

    pub fn next_int(&mut self) -> PyResult<i64> {
        self.take(|arg| match arg {
            VaArg::Int(v) => Some(*v),
            _ => None,
        })
    }

    pub fn next_double(&mut self) -> PyResult<f64> {
        self.take(|arg| match arg {
            VaArg::Double(d) => Some(*d),
            VaArg::Int(v) => Some(*v as f64),
            _ => None,
        })
    }

    pub fn next_cstr(&mut self) -> PyResult<Option<Arc<str>>> {
        self.take(|arg| match arg {
            VaArg::CStr(s) => Some(s.clone()),
            VaArg::Object(ptr) if ptr.is_null() => Some(None),
            _ => None,
        })
    }

    pub fn next_object(&mut self) -> PyResult<NativePtr> {
        self.take(|arg| match arg {
            VaArg::Object(ptr) => Some(*ptr),
            _ => None,
        })
    }

    /// Any pointer-sized argument, as an address
    pub fn next_pointer(&mut self) -> PyResult<NativePtr> {
        self.take(|arg| match arg {
            VaArg::Object(ptr) => Some(*ptr),
            VaArg::Int(v) => Some(NativePtr::new(*v as u64)),
            VaArg::CStr(None) => Some(NativePtr::NULL),
            _ => None,
        })
    }

    /// Skip one argument of any type
    pub fn skip(&mut self) -> PyResult<()> {
        self.take(|_| Some(()))
    }
}

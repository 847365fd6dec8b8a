//! Slot-function argument layouts
//!
//! Native slot functions mix object and scalar parameters. A layout names
//! which positions are objects (converted to native) and which pass
//! through as C scalars.

use super::batch::ArgVec;
use super::fastcall::{fastcall_to_native, fastcall_with_keywords_to_native, ObjectArrayWrapper};
use super::temporaries::Temporaries;
use crate::error::{PyException, PyResult};
use crate::format::VaList;
use crate::object::{NativePtr, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotLayout {
    /// `(obj, scalar)`, e.g. `ssizeargfunc`
    BinaryFirst,
    /// `(obj, scalar, obj)`
    TernaryFirstThird,
    /// `(obj, obj, scalar)`, e.g. `ssizeobjargproc` with swapped tail
    TernaryFirstSecond,
    /// `(self, args...)` as `self, args[], nargs`
    FastCall,
    /// `(self, args..., kwnames)` as `self, args[], nargs, kwnames`
    FastCallWithKeywords,
    /// Every slot is an object
    All,
}

/// One argument as the native callee receives it
#[derive(Debug, Clone)]
pub enum NativeArg {
    Object(NativePtr),
    Int(i64),
    Double(f64),
    /// `const char*`
    Str(Arc<str>),
    Array(Arc<ObjectArrayWrapper>),
    VaList(VaList),
}

impl NativeArg {
    pub fn as_ptr(&self) -> Option<NativePtr> {
        match self {
            Self::Object(ptr) => Some(*ptr),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }
}

fn expect_len(layout: SlotLayout, values: &[Value], expected: usize) -> PyResult<()> {
    if values.len() != expected {
        return Err(PyException::type_error(format!(
            "{:?} slot expects {} arguments, got {}",
            layout,
            expected,
            values.len()
        )));
    }
    Ok(())
}

fn scalar(value: &Value) -> PyResult<NativeArg> {
    match value {
        Value::Bool(b) => Ok(NativeArg::Int(*b as i64)),
        Value::Int(v) => Ok(NativeArg::Int(*v as i64)),
        Value::Long(v) => Ok(NativeArg::Int(*v)),
        Value::Byte(v) => Ok(NativeArg::Int(*v as i64)),
        Value::Double(d) => Ok(NativeArg::Double(*d)),
        Value::Str(s) => Ok(NativeArg::Str(s.clone())),
        other => Err(PyException::type_error(format!(
            "expected a C scalar, got {}",
            other.type_name()
        ))),
    }
}

#[inline]
fn object(temps: &mut Temporaries<'_>, value: &Value) -> NativeArg {
    NativeArg::Object(temps.borrow(value))
}

/// Convert `values` for a native slot function of the given layout.
///
/// Object slots are borrowed; wrappers created for them live as long as
/// `temps`.
pub fn convert_slots(
    temps: &mut Temporaries<'_>,
    layout: SlotLayout,
    values: &[Value],
) -> PyResult<ArgVec<NativeArg>> {
    let mut out = ArgVec::new();
    match layout {
        SlotLayout::BinaryFirst => {
            expect_len(layout, values, 2)?;
            out.push(object(temps, &values[0]));
            out.push(scalar(&values[1])?);
        }
        SlotLayout::TernaryFirstThird => {
            expect_len(layout, values, 3)?;
            out.push(object(temps, &values[0]));
            out.push(scalar(&values[1])?);
            out.push(object(temps, &values[2]));
        }
        SlotLayout::TernaryFirstSecond => {
            expect_len(layout, values, 3)?;
            out.push(object(temps, &values[0]));
            out.push(object(temps, &values[1]));
            out.push(scalar(&values[2])?);
        }
        SlotLayout::FastCall => {
            let (receiver, args) = values.split_first().ok_or_else(|| {
                PyException::type_error("FastCall slot expects a receiver")
            })?;
            let call = fastcall_to_native(temps, receiver, args);
            out.push(NativeArg::Object(call.receiver));
            out.push(NativeArg::Array(call.args));
            out.push(NativeArg::Int(call.nargs as i64));
        }
        SlotLayout::FastCallWithKeywords => {
            if values.len() < 2 {
                return Err(PyException::type_error(format!(
                    "FastCallWithKeywords slot expects at least 2 arguments, got {}",
                    values.len()
                )));
            }
            let (kwnames, rest) = values.split_last().ok_or_else(|| {
                PyException::type_error("FastCallWithKeywords slot expects kwnames")
            })?;
            let call = fastcall_with_keywords_to_native(temps, &rest[0], &rest[1..], kwnames)?;
            out.push(NativeArg::Object(call.receiver));
            out.push(NativeArg::Array(call.args));
            out.push(NativeArg::Int(call.nargs as i64));
            out.push(NativeArg::Object(call.kwnames));
        }
        SlotLayout::All => {
            for value in values {
                out.push(object(temps, value));
            }
        }
    }
    Ok(out)
}

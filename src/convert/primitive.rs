//! Managed values as native C integers and doubles

use crate::error::{PyException, PyResult};
use crate::object::{ObjectKind, Value};
use crate::runtime::ManagedRuntime;
use num_traits::ToPrimitive;

const OVERFLOW: &str = "Python int too large to convert to C type";

/// Coerce `value` to a C integer of `size` bytes (`PyLong_AsLong` and
/// friends).
///
/// Ints convert directly; anything else goes through `__index__`, then
/// `__int__`. With `exact`, values that do not fit raise OverflowError;
/// otherwise they are truncated to the target width. The result is the
/// target's bit pattern widened to `i64`.
pub fn as_native_primitive(
    runtime: &dyn ManagedRuntime,
    value: &Value,
    signed: bool,
    size: usize,
    exact: bool,
) -> PyResult<i64> {
    if size != 4 && size != 8 {
        return Err(PyException::system_error(format!(
            "unsupported target size: {}",
            size
        )));
    }
    let integer = match value.as_integer() {
        Some(v) => v,
        None => coerce_with_hooks(runtime, value)?,
    };
    narrow(integer, signed, size, exact)
}

fn coerce_with_hooks(runtime: &dyn ManagedRuntime, value: &Value) -> PyResult<i128> {
    let ty = runtime.type_of(value);
    for hook in ["__index__", "__int__"] {
        let Some(method) = runtime.lookup_callable_on_type(&ty, hook) else {
            continue;
        };
        let result = runtime.call(&method, std::slice::from_ref(value), &[])?;
        return result.as_integer().ok_or_else(|| {
            PyException::system_error(format!(
                "{} returned non-int (type {})",
                hook,
                result.type_name()
            ))
        });
    }
    Err(PyException::type_error(format!(
        "an integer is required (got type {})",
        value.type_name()
    )))
}

fn narrow(v: i128, signed: bool, size: usize, exact: bool) -> PyResult<i64> {
    if !exact {
        return Ok(match (size, signed) {
            (4, true) => v as i32 as i64,
            (4, false) => v as u32 as i64,
            (_, true) => v as i64,
            (_, false) => v as u64 as i64,
        });
    }
    if !signed && v < 0 {
        return Err(PyException::overflow_error(
            "can't convert negative int to unsigned",
        ));
    }
    let narrowed = match (size, signed) {
        (4, true) => v.to_i32().map(i64::from),
        (4, false) => v.to_u32().map(i64::from),
        (_, true) => v.to_i64(),
        (_, false) => v.to_u64().map(|u| u as i64),
    };
    narrowed.ok_or_else(|| PyException::overflow_error(OVERFLOW))
}

/// Lossy cast to a C long without calling into managed code.
///
/// Bools become 0/1, one-character strings their code point, doubles
/// truncate toward zero.
pub fn cast_to_native_long(value: &Value) -> PyResult<i64> {
    if let Some(v) = value.as_integer() {
        return Ok(v as i64);
    }
    match value {
        Value::Double(d) => Ok(*d as i64),
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Float(d) => Ok(*d as i64),
            _ => single_char(value),
        },
        _ => single_char(value),
    }
}

fn single_char(value: &Value) -> PyResult<i64> {
    if let Some(s) = value.as_str() {
        let mut chars = s.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return Ok(ch as i64);
        }
    }
    Err(PyException::type_error(format!(
        "cannot cast {} to a C long",
        value.type_name()
    )))
}

/// Lossy cast to a C double without calling into managed code
pub fn cast_to_double(value: &Value) -> PyResult<f64> {
    match value {
        Value::Double(d) => Ok(*d),
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Float(d) => Ok(*d),
            ObjectKind::Int(v) => Ok(*v as f64),
            ObjectKind::Bool(b) => Ok(*b as i64 as f64),
            _ => Err(not_a_double(value)),
        },
        _ => value
            .as_integer()
            .map(|v| v as f64)
            .ok_or_else(|| not_a_double(value)),
    }
}

fn not_a_double(value: &Value) -> PyException {
    PyException::type_error(format!(
        "must be real number, not {}",
        value.type_name()
    ))
}

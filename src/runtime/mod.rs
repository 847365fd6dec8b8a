//! Managed runtime collaborator
//!
//! The bridge does not interpret Python. Calling, attribute lookup and
//! string conversion are delegated to whatever runtime embeds it, through
//! `ManagedRuntime`.

mod simple;

pub use simple::SimpleRuntime;

use crate::error::PyResult;
use crate::object::Value;

pub trait ManagedRuntime: Send + Sync {
    /// `callable(*args, **kwargs)`
    fn call(&self, callable: &Value, args: &[Value], kwargs: &[(String, Value)])
        -> PyResult<Value>;

    /// `getattr(receiver, name)`, bound if the attribute is a method
    fn lookup_attribute(&self, receiver: &Value, name: &str) -> Option<Value>;

    /// Unbound callable `name` on type `ty` (special method lookup)
    fn lookup_callable_on_type(&self, ty: &Value, name: &str) -> Option<Value>;

    fn type_of(&self, value: &Value) -> Value;

    /// Member of the fixed namespace used by module upcalls
    fn lookup_module_member(&self, name: &str) -> Option<Value>;

    fn repr(&self, value: &Value) -> PyResult<String>;

    fn str(&self, value: &Value) -> PyResult<String>;

    /// `repr` with non-ASCII characters escaped
    fn ascii(&self, value: &Value) -> PyResult<String> {
        Ok(escape_non_ascii(&self.repr(value)?))
    }
}

/// Escape like Python's `ascii()`: `\xhh`, `\uhhhh` or `\Uhhhhhhhh`
pub fn escape_non_ascii(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        let code = ch as u32;
        match code {
            0..=0x7f => out.push(ch),
            0x80..=0xff => out.push_str(&format!("\\x{:02x}", code)),
            0x100..=0xffff => out.push_str(&format!("\\u{:04x}", code)),
            _ => out.push_str(&format!("\\U{:08x}", code)),
        }
    }
    out
}

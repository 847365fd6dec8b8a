//! Minimal runtime: functions, classes with attribute dicts, bound methods
//!
//! Enough object model to drive the dispatchers and the format engine.

use super::ManagedRuntime;
use crate::error::{ExceptionKind, PyException, PyResult};
use crate::object::{ManagedObject, ObjectKind, ObjectRef, Value};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SimpleRuntime {
    module: RwLock<HashMap<String, Value>>,
    /// Builtin type objects, created on first use so identity is stable
    builtin_types: DashMap<String, ObjectRef>,
}

impl SimpleRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member to the module namespace
    pub fn register(&self, name: impl Into<String>, value: Value) {
        self.module.write().insert(name.into(), value);
    }

    /// Register a managed function under `name`
    pub fn register_fn<F>(&self, name: &str, body: F) -> ObjectRef
    where
        F: Fn(&[Value], &[(String, Value)]) -> PyResult<Value> + Send + Sync + 'static,
    {
        let function = ManagedObject::function(name, body);
        self.register(name, Value::Object(function.clone()));
        function
    }

    /// Type object for a builtin type name
    pub fn builtin_type(&self, name: &str) -> ObjectRef {
        self.builtin_types
            .entry(name.to_string())
            .or_insert_with(|| ManagedObject::class(name))
            .value()
            .clone()
    }

    fn instantiate(&self, class: &ObjectRef, args: &[Value], kwargs: &[(String, Value)]) -> PyResult<Value> {
        let instance = Value::Object(ManagedObject::instance(class.clone()));
        if let Some(init) = class.getattr("__init__") {
            let mut init_args = Vec::with_capacity(args.len() + 1);
            init_args.push(instance.clone());
            init_args.extend_from_slice(args);
            self.call(&init, &init_args, kwargs)?;
        }
        Ok(instance)
    }

    fn repr_object(&self, value: &Value, obj: &ObjectRef) -> PyResult<String> {
        Ok(match obj.kind() {
            ObjectKind::None => "None".to_string(),
            ObjectKind::Str(s) => quote(s),
            ObjectKind::Int(v) => v.to_string(),
            ObjectKind::Float(d) => float_repr(*d),
            ObjectKind::Bool(b) => bool_repr(*b).to_string(),
            ObjectKind::Tuple(items) => {
                let parts = items
                    .iter()
                    .map(|item| self.repr(item))
                    .collect::<PyResult<Vec<_>>>()?;
                if parts.len() == 1 {
                    format!("({},)", parts[0])
                } else {
                    format!("({})", parts.join(", "))
                }
            }
            ObjectKind::Class(data) => format!("<class '{}'>", data.name),
            ObjectKind::Instance { .. } => match self.lookup_attribute(value, "__repr__") {
                Some(method) => expect_str(self.call(&method, &[], &[])?, "__repr__")?,
                None => format!("<{} object>", obj.type_name()),
            },
            ObjectKind::Function(f) => format!("<function {}>", f.name()),
            ObjectKind::Method { function, .. } => match function.kind() {
                ObjectKind::Function(f) => format!("<bound method {}>", f.name()),
                _ => "<bound method>".to_string(),
            },
        })
    }
}

impl ManagedRuntime for SimpleRuntime {
    fn call(
        &self,
        callable: &Value,
        args: &[Value],
        kwargs: &[(String, Value)],
    ) -> PyResult<Value> {
        let obj = match callable {
            Value::Object(obj) => obj,
            other => {
                return Err(PyException::type_error(format!(
                    "'{}' object is not callable",
                    other.type_name()
                )))
            }
        };

        match obj.kind() {
            ObjectKind::Function(f) => f.invoke(args, kwargs),
            ObjectKind::Method { receiver, function } => {
                let mut bound = Vec::with_capacity(args.len() + 1);
                bound.push(receiver.clone());
                bound.extend_from_slice(args);
                self.call(&Value::Object(function.clone()), &bound, kwargs)
            }
            ObjectKind::Class(_) => self.instantiate(obj, args, kwargs),
            ObjectKind::Instance { .. } => match self.lookup_attribute(callable, "__call__") {
                Some(method) => self.call(&method, args, kwargs),
                None => Err(PyException::type_error(format!(
                    "'{}' object is not callable",
                    obj.type_name()
                ))),
            },
            _ => Err(PyException::type_error(format!(
                "'{}' object is not callable",
                obj.type_name()
            ))),
        }
    }

    fn lookup_attribute(&self, receiver: &Value, name: &str) -> Option<Value> {
        let obj = receiver.as_object()?;
        match obj.kind() {
            ObjectKind::Instance { class, attrs } => {
                if let Some(value) = attrs.read().get(name) {
                    return Some(value.clone());
                }
                class.getattr(name).map(|attr| bind(receiver, attr))
            }
            ObjectKind::Class(_) => obj.getattr(name),
            _ => {
                let ty = self.type_of(receiver);
                self.lookup_callable_on_type(&ty, name)
                    .map(|attr| bind(receiver, attr))
            }
        }
    }

    fn lookup_callable_on_type(&self, ty: &Value, name: &str) -> Option<Value> {
        let class = ty.as_object()?;
        if !class.is_class() {
            return None;
        }
        class.getattr(name)
    }

    fn type_of(&self, value: &Value) -> Value {
        if let Value::Object(obj) = value {
            if let ObjectKind::Instance { class, .. } = obj.kind() {
                return Value::Object(class.clone());
            }
        }
        Value::Object(self.builtin_type(&value.type_name()))
    }

    fn lookup_module_member(&self, name: &str) -> Option<Value> {
        self.module.read().get(name).cloned()
    }

    fn repr(&self, value: &Value) -> PyResult<String> {
        Ok(match value {
            Value::None => "None".to_string(),
            Value::NoValue | Value::NativeNull(_) => "<NULL>".to_string(),
            Value::Bool(b) => bool_repr(*b).to_string(),
            Value::Int(v) => v.to_string(),
            Value::Long(v) => v.to_string(),
            Value::Byte(v) => v.to_string(),
            Value::Double(d) => float_repr(*d),
            Value::Str(s) => quote(s),
            Value::Object(obj) => return self.repr_object(value, obj),
            Value::Native(native) => format!("<native object at {}>", native.ptr()),
            Value::Foreign(bits) => format!("<foreign object at {:#x}>", bits),
        })
    }

    fn str(&self, value: &Value) -> PyResult<String> {
        if let Some(s) = value.as_str() {
            return Ok(s.to_string());
        }
        if let Value::Object(obj) = value {
            if matches!(obj.kind(), ObjectKind::Instance { .. }) {
                if let Some(method) = self.lookup_attribute(value, "__str__") {
                    return expect_str(self.call(&method, &[], &[])?, "__str__");
                }
            }
        }
        self.repr(value)
    }
}

fn bind(receiver: &Value, attr: Value) -> Value {
    match &attr {
        Value::Object(function) if matches!(function.kind(), ObjectKind::Function(_)) => {
            Value::new_object(ObjectKind::Method {
                receiver: receiver.clone(),
                function: function.clone(),
            })
        }
        _ => attr,
    }
}

fn expect_str(value: Value, method: &str) -> PyResult<String> {
    match value.as_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(PyException::new(
            ExceptionKind::TypeError,
            format!("{} returned non-string (type {})", method, value.type_name()),
        )),
    }
}

fn bool_repr(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

fn float_repr(d: f64) -> String {
    if d.is_nan() {
        "nan".to_string()
    } else if d.is_infinite() {
        let sign = if d > 0.0 { "" } else { "-" };
        format!("{}inf", sign)
    } else if d.fract() == 0.0 && d.abs() < 1e16 {
        format!("{:.1}", d)
    } else {
        format!("{}", d)
    }
}

/// Python-style quoting: single quotes unless the text contains only them
fn quote(s: &str) -> String {
    let delim = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(delim);
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == delim => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(delim);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::escape_non_ascii;

    fn adder() -> ObjectRef {
        ManagedObject::function("add", |args, _| {
            let total = args.iter().filter_map(Value::as_integer).sum::<i128>();
            Ok(Value::Long(total as i64))
        })
    }

    #[test]
    fn test_call_function() {
        let rt = SimpleRuntime::new();
        let result = rt
            .call(&Value::Object(adder()), &[Value::Int(2), Value::Long(40)], &[])
            .unwrap();
        assert_eq!(result, Value::Long(42));
    }

    #[test]
    fn test_call_non_callable() {
        let rt = SimpleRuntime::new();
        let err = rt.call(&Value::Int(3), &[], &[]).unwrap_err();
        assert!(err.is(&ExceptionKind::TypeError));
        assert_eq!(err.message(), "'int' object is not callable");
    }

    #[test]
    fn test_method_binding() {
        let rt = SimpleRuntime::new();
        let class = ManagedObject::class("Counter");
        class.setattr(
            "get",
            Value::Object(ManagedObject::function("get", |args, _| {
                Ok(args[0].as_object().and_then(|o| o.getattr("n")).unwrap_or(Value::None))
            })),
        );
        let instance = rt.call(&Value::Object(class), &[], &[]).unwrap();
        instance.as_object().unwrap().setattr("n", Value::Int(5));

        let method = rt.lookup_attribute(&instance, "get").unwrap();
        assert_eq!(rt.call(&method, &[], &[]).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_init_runs_on_instantiation() {
        let rt = SimpleRuntime::new();
        let class = ManagedObject::class("Point");
        class.setattr(
            "__init__",
            Value::Object(ManagedObject::function("__init__", |args, _| {
                let this = args[0].as_object().unwrap();
                this.setattr("x", args[1].clone());
                Ok(Value::None)
            })),
        );
        let point = rt.call(&Value::Object(class), &[Value::Int(3)], &[]).unwrap();
        assert_eq!(point.as_object().unwrap().getattr("x"), Some(Value::Int(3)));
        assert_eq!(rt.type_of(&point).as_object().unwrap().type_name(), "type");
    }

    #[test]
    fn test_repr_rules() {
        let rt = SimpleRuntime::new();
        assert_eq!(rt.repr(&Value::None).unwrap(), "None");
        assert_eq!(rt.repr(&Value::Bool(true)).unwrap(), "True");
        assert_eq!(rt.repr(&Value::Double(2.0)).unwrap(), "2.0");
        assert_eq!(rt.repr(&Value::Double(f64::NAN)).unwrap(), "nan");
        assert_eq!(rt.repr(&Value::from("it's")).unwrap(), "\"it's\"");
        assert_eq!(rt.repr(&Value::from("ab")).unwrap(), "'ab'");
        let single = Value::Object(ManagedObject::tuple(vec![Value::Int(1)]));
        assert_eq!(rt.repr(&single).unwrap(), "(1,)");
    }

    #[test]
    fn test_str_and_ascii() {
        let rt = SimpleRuntime::new();
        assert_eq!(rt.str(&Value::from("héllo")).unwrap(), "héllo");
        assert_eq!(rt.ascii(&Value::from("héllo")).unwrap(), "'h\\xe9llo'");
        assert_eq!(escape_non_ascii("\u{20ac}\u{1f600}"), "\\u20ac\\U0001f600");
    }

    #[test]
    fn test_builtin_type_identity() {
        let rt = SimpleRuntime::new();
        let a = rt.type_of(&Value::Int(1));
        let b = rt.type_of(&Value::Long(1 << 40));
        assert!(a.is(&b));
    }

    #[test]
    fn test_module_lookup() {
        let rt = SimpleRuntime::new();
        rt.register_fn("answer", |_, _| Ok(Value::Int(42)));
        assert!(rt.lookup_module_member("answer").is_some());
        assert!(rt.lookup_module_member("missing").is_none());
    }
}

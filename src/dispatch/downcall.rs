use super::native_fn::{NativeFunction, NativeReturn};
use crate::context::Context;
use crate::convert::{
    as_native_primitive, cast_to_double, convert_slots, to_managed, to_managed_transfer,
    to_native, ArgVec, NativeArg, SlotLayout, Temporaries,
};
use crate::error::{PyException, PyResult};
use crate::exception::ExceptionBridge;
use crate::format::{VaArg, VaList};
use crate::logging::log_downcall;
use crate::metrics::{BridgeStats, Direction};
use crate::object::Value;
use crate::refcount::RefMode;
use crate::runtime::ManagedRuntime;
use crate::symbols::{ArgShape, CallPath, SymbolDescriptor};

/// Managed code calling native functions
pub struct DowncallDispatcher<'a> {
    ctx: &'a Context,
    runtime: &'a dyn ManagedRuntime,
}

impl<'a> DowncallDispatcher<'a> {
    pub fn new(ctx: &'a Context, runtime: &'a dyn ManagedRuntime) -> Self {
        Self { ctx, runtime }
    }

    /// Call a function whose every parameter is an object
    pub fn call(&self, function: &dyn NativeFunction, args: &[Value]) -> PyResult<Value> {
        self.call_with_layout(function, SlotLayout::All, args)
    }

    /// Call a slot function; object results are new references.
    ///
    /// Wrappers created to pass the arguments are released after the result
    /// is converted, unless the callee kept a reference.
    pub fn call_with_layout(
        &self,
        function: &dyn NativeFunction,
        layout: SlotLayout,
        args: &[Value],
    ) -> PyResult<Value> {
        let mut temps = Temporaries::new(self.ctx);
        let native = convert_slots(&mut temps, layout, args)?;
        let result = self.invoke(function.name(), function, &native, ArgShape::PyObject);
        temps.release();
        result
    }

    /// Call a C API function, marshaling each argument by its declared shape
    pub fn call_symbol(
        &self,
        name: &str,
        function: &dyn NativeFunction,
        args: &[Value],
    ) -> PyResult<Value> {
        let desc = self.descriptor(name)?;
        if desc.is_vararg() {
            return Err(PyException::system_error(format!(
                "{} is variadic; call it through its va_list counterpart",
                name
            )));
        }
        let mut temps = Temporaries::new(self.ctx);
        let native = self.marshal(&mut temps, name, &desc.args, args)?;
        let result = self.invoke(name, function, &native, desc.ret);
        temps.release();
        result
    }

    /// Call a `...` function through the `va_list` entry it forwards to.
    ///
    /// `function` implements the forward target. The fixed arguments are
    /// marshaled by the target's signature; `varargs` travel as one
    /// [`VaList`] in the trailing slot.
    pub fn call_varargs(
        &self,
        name: &str,
        function: &dyn NativeFunction,
        fixed: &[Value],
        varargs: Vec<VaArg>,
    ) -> PyResult<Value> {
        let symbols = self.ctx.symbols();
        let target = symbols.forward_target(name).ok_or_else(|| {
            PyException::system_error(format!("{} has no va_list counterpart", name))
        })?;
        check_callable(target)?;

        let (_, shapes) = target
            .args
            .split_last()
            .filter(|(tail, _)| **tail == ArgShape::VaList)
            .ok_or_else(|| {
                PyException::system_error(format!(
                    "{} does not take a va_list",
                    target.name
                ))
            })?;

        let mut temps = Temporaries::new(self.ctx);
        let mut native = self.marshal(&mut temps, &target.name, shapes, fixed)?;
        native.push(NativeArg::VaList(VaList::new(varargs)));
        let result = self.invoke(&target.name, function, &native, target.ret);
        temps.release();
        result
    }

    fn descriptor(&self, name: &str) -> PyResult<SymbolDescriptor> {
        let desc = self
            .ctx
            .symbols()
            .get(name)
            .cloned()
            .ok_or_else(|| PyException::system_error(format!("unknown C API symbol {}", name)))?;
        check_callable(&desc)?;
        Ok(desc)
    }

    fn marshal(
        &self,
        temps: &mut Temporaries<'_>,
        name: &str,
        shapes: &[ArgShape],
        args: &[Value],
    ) -> PyResult<ArgVec<NativeArg>> {
        if shapes.len() != args.len() {
            return Err(PyException::type_error(format!(
                "{}() takes exactly {} arguments ({} given)",
                name,
                shapes.len(),
                args.len()
            )));
        }

        let mut native = ArgVec::with_capacity(args.len());
        for (index, (shape, value)) in shapes.iter().zip(args).enumerate() {
            let arg = match shape {
                ArgShape::PyObject
                | ArgShape::PyObjectBorrowed
                | ArgShape::PyTypeObject
                | ArgShape::Pointer => NativeArg::Object(temps.borrow(value)),
                // callee steals the reference
                ArgShape::PyObjectTransfer => {
                    NativeArg::Object(to_native(self.ctx, value, RefMode::Argument))
                }
                ArgShape::Int => NativeArg::Int(as_native_primitive(self.runtime, value, true, 4, true)?),
                ArgShape::Long | ArgShape::PySsizeT => {
                    NativeArg::Int(as_native_primitive(self.runtime, value, true, 8, true)?)
                }
                ArgShape::Double => NativeArg::Double(cast_to_double(value)?),
                ArgShape::ConstCharPtr | ArgShape::CharPtr => match value.as_str() {
                    Some(s) => NativeArg::Str(s.into()),
                    None => {
                        return Err(PyException::type_error(format!(
                            "{}() argument {} must be str, not {}",
                            name,
                            index + 1,
                            value.type_name()
                        )))
                    }
                },
                ArgShape::VaList | ArgShape::VarArgs | ArgShape::Void | ArgShape::VoidNoReturn => {
                    return Err(PyException::system_error(format!(
                        "{}() argument {} has shape {:?} and cannot be marshaled",
                        name,
                        index + 1,
                        shape
                    )))
                }
            };
            native.push(arg);
        }
        Ok(native)
    }

    fn invoke(
        &self,
        name: &str,
        function: &dyn NativeFunction,
        args: &[NativeArg],
        ret: ArgShape,
    ) -> PyResult<Value> {
        BridgeStats::bump(&self.ctx.stats.downcalls);
        log_downcall(name, args.len());

        let _span = tracing::debug_span!("downcall", function = name).entered();
        let raw = {
            let _boundary = self.ctx.enter_boundary()?;
            let _timing = self.ctx.timings().start(Direction::Downcall, name);
            function
                .call(self.ctx, args)
                .map_err(|err| PyException::type_error(format!("{}: {}", name, err)))?
        };
        self.check_result(name, ret, raw)
    }

    /// Turn a native return plus the error state into a managed result
    fn check_result(&self, name: &str, ret: ArgShape, raw: NativeReturn) -> PyResult<Value> {
        let pending = ExceptionBridge::new(self.ctx).fetch();
        let signals_error = match raw {
            NativeReturn::Object(ptr) => ptr.is_null(),
            NativeReturn::Int(v) => v == -1,
            NativeReturn::Double(d) => d == -1.0,
            NativeReturn::Void => pending.is_some(),
        };

        match (signals_error, pending) {
            (true, Some(exc)) => return Err(exc),
            (false, Some(exc)) => {
                tracing::debug!(
                    function = name,
                    pending = %exc,
                    "Native result returned with an error set"
                );
                return Err(PyException::system_error(format!(
                    "{} returned a result with an error set",
                    name
                )));
            }
            (true, None) if matches!(raw, NativeReturn::Object(_)) => {
                return Err(PyException::system_error(format!(
                    "{} returned NULL without setting an error",
                    name
                )));
            }
            _ => {}
        }

        match raw {
            NativeReturn::Object(ptr) if ret == ArgShape::PyObjectBorrowed => to_managed(self.ctx, ptr),
            NativeReturn::Object(ptr) => to_managed_transfer(self.ctx, ptr),
            NativeReturn::Int(v) if ret == ArgShape::Int => Ok(Value::Int(v as i32)),
            NativeReturn::Int(v) => Ok(Value::Long(v)),
            NativeReturn::Double(d) => Ok(Value::Double(d)),
            NativeReturn::Void => Ok(Value::None),
        }
    }
}

fn check_callable(desc: &SymbolDescriptor) -> PyResult<()> {
    if desc.call == CallPath::NotImplemented {
        return Err(PyException::system_error(format!(
            "{} is not implemented",
            desc.name
        )));
    }
    Ok(())
}

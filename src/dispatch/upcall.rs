use crate::context::Context;
use crate::convert::{all_to_managed, to_managed, to_native};
use crate::error::{PyException, PyResult};
use crate::exception::may_raise_ptr;
use crate::logging::log_upcall;
use crate::metrics::{BridgeStats, Direction};
use crate::object::{NativePtr, Value};
use crate::refcount::RefMode;
use crate::runtime::ManagedRuntime;

/// Native code calling into the managed runtime
///
/// Every entry point returns a new reference, or NULL with the exception
/// pending in the context.
pub struct UpcallDispatcher<'a> {
    ctx: &'a Context,
    runtime: &'a dyn ManagedRuntime,
}

impl<'a> UpcallDispatcher<'a> {
    pub fn new(ctx: &'a Context, runtime: &'a dyn ManagedRuntime) -> Self {
        Self { ctx, runtime }
    }

    /// `args[0](*args[1..])`
    pub fn direct(&self, args: &[NativePtr]) -> NativePtr {
        self.run("direct", "<callable>", args.len(), || {
            let (callable, rest) = args.split_first().ok_or_else(|| {
                PyException::type_error("direct upcall requires a callable")
            })?;
            let callable = to_managed(self.ctx, *callable)?;
            self.invoke(&callable, rest)
        })
    }

    /// `args[0].name(*args[1..])`
    pub fn object(&self, name: &str, args: &[NativePtr]) -> NativePtr {
        self.run("object", name, args.len(), || {
            let (receiver, rest) = args.split_first().ok_or_else(|| {
                PyException::type_error(format!("upcall to '{}' requires a receiver", name))
            })?;
            let receiver = to_managed(self.ctx, *receiver)?;
            let method = self
                .runtime
                .lookup_attribute(&receiver, name)
                .ok_or_else(|| {
                    PyException::attribute_error(format!(
                        "'{}' object has no attribute '{}'",
                        receiver.type_name(),
                        name
                    ))
                })?;
            self.invoke(&method, rest)
        })
    }

    /// `module.name(*args)`
    pub fn module(&self, name: &str, args: &[NativePtr]) -> NativePtr {
        self.run("module", name, args.len(), || {
            let function = self.runtime.lookup_module_member(name).ok_or_else(|| {
                PyException::attribute_error(format!("module has no attribute '{}'", name))
            })?;
            self.invoke(&function, args)
        })
    }

    /// Call with positional native arguments; arities 0 to 3 convert
    /// without building an argument vector
    pub fn invoke(&self, callable: &Value, args: &[NativePtr]) -> PyResult<Value> {
        let ctx = self.ctx;
        let rt = self.runtime;
        match *args {
            [] => rt.call(callable, &[], &[]),
            [a] => rt.call(callable, &[to_managed(ctx, a)?], &[]),
            [a, b] => rt.call(callable, &[to_managed(ctx, a)?, to_managed(ctx, b)?], &[]),
            [a, b, c] => rt.call(
                callable,
                &[
                    to_managed(ctx, a)?,
                    to_managed(ctx, b)?,
                    to_managed(ctx, c)?,
                ],
                &[],
            ),
            _ => self.invoke_generic(callable, args),
        }
    }

    /// Any-arity call through the batch converter
    pub fn invoke_generic(&self, callable: &Value, args: &[NativePtr]) -> PyResult<Value> {
        let values = all_to_managed(self.ctx, args)?;
        self.runtime.call(callable, &values, &[])
    }

    fn run<F>(&self, kind: &str, name: &str, arity: usize, body: F) -> NativePtr
    where
        F: FnOnce() -> PyResult<Value>,
    {
        BridgeStats::bump(&self.ctx.stats.upcalls);
        log_upcall(kind, name, arity);

        let _span = tracing::debug_span!("upcall", kind = kind, callable = name).entered();
        may_raise_ptr(self.ctx, || {
            let _boundary = self.ctx.enter_boundary()?;
            let frame = self.ctx.enter_frame(name);
            let _timing = self.ctx.timings().start(Direction::Upcall, name);

            let result = body().map_err(|exc| exc.with_frame(Some(frame.frame().clone())))?;
            Ok(to_native(self.ctx, &result, RefMode::New))
        })
    }
}

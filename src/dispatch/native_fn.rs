//! Native callees
//!
//! A native function receives already-marshaled arguments and answers the
//! way C code does: a raw word plus, on failure, a pending exception in
//! the context.

use crate::context::Context;
use crate::convert::NativeArg;
use crate::object::NativePtr;
use crate::symbols::{ArgShape, SymbolDescriptor};
use std::fmt;
use std::sync::Arc;

/// What a native function handed back
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NativeReturn {
    Object(NativePtr),
    Int(i64),
    Double(f64),
    Void,
}

/// Calling-convention mismatches detected before the call is made
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    ArgCountMismatch { expected: usize, got: usize },
    TooManyArgs,
    UnsupportedArgument { index: usize },
    UnsupportedSignature(String),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgCountMismatch { expected, got } => {
                write!(f, "Expected {} arguments, got {}", expected, got)
            }
            Self::TooManyArgs => write!(f, "Too many arguments for a direct native call"),
            Self::UnsupportedArgument { index } => {
                write!(f, "Argument {} cannot be passed in an integer register", index)
            }
            Self::UnsupportedSignature(reason) => write!(f, "Unsupported signature: {}", reason),
        }
    }
}

impl std::error::Error for CallError {}

pub trait NativeFunction: Send + Sync {
    fn name(&self) -> &str;

    fn call(&self, ctx: &Context, args: &[NativeArg]) -> Result<NativeReturn, CallError>;
}

type NativeBody = dyn Fn(&Context, &[NativeArg]) -> NativeReturn + Send + Sync;

/// Native function implemented by a Rust closure
pub struct NativeClosure {
    name: String,
    body: Box<NativeBody>,
}

impl NativeClosure {
    pub fn new<F>(name: impl Into<String>, body: F) -> Arc<Self>
    where
        F: Fn(&Context, &[NativeArg]) -> NativeReturn + Send + Sync + 'static,
    {
        Arc::new(Self {
            name: name.into(),
            body: Box::new(body),
        })
    }
}

impl NativeFunction for NativeClosure {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, ctx: &Context, args: &[NativeArg]) -> Result<NativeReturn, CallError> {
        Ok((self.body)(ctx, args))
    }
}

impl fmt::Debug for NativeClosure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeClosure").field("name", &self.name).finish()
    }
}

/// Call `addr` as an `extern "C"` function of `arity` u64 words
macro_rules! call_words {
    ($ret:ty, $addr:expr, $arity:expr, $w:expr) => {{
        use std::mem::transmute;
        let (addr, w): (usize, &[u64; MAX_EXTERN_ARITY]) = ($addr, $w);
        match $arity {
            0 => transmute::<usize, extern "C" fn() -> $ret>(addr)(),
            1 => transmute::<usize, extern "C" fn(u64) -> $ret>(addr)(w[0]),
            2 => transmute::<usize, extern "C" fn(u64, u64) -> $ret>(addr)(w[0], w[1]),
            3 => transmute::<usize, extern "C" fn(u64, u64, u64) -> $ret>(addr)(w[0], w[1], w[2]),
            4 => transmute::<usize, extern "C" fn(u64, u64, u64, u64) -> $ret>(addr)(
                w[0], w[1], w[2], w[3],
            ),
            5 => transmute::<usize, extern "C" fn(u64, u64, u64, u64, u64) -> $ret>(addr)(
                w[0], w[1], w[2], w[3], w[4],
            ),
            _ => transmute::<usize, extern "C" fn(u64, u64, u64, u64, u64, u64) -> $ret>(addr)(
                w[0], w[1], w[2], w[3], w[4], w[5],
            ),
        }
    }};
}

/// Maximum arity passed entirely in integer registers
pub const MAX_EXTERN_ARITY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReturnKind {
    Object,
    Int,
    Void,
}

/// `extern "C"` function taking and returning pointer-sized words
///
/// Objects cross as their native address, integers as 64-bit words.
#[derive(Debug)]
pub struct ExternFunction {
    name: String,
    addr: usize,
    arity: usize,
    returns: ReturnKind,
}

impl ExternFunction {
    /// # Safety
    /// `addr` must be an `extern "C"` function taking `arity` 64-bit
    /// integer or pointer arguments and returning one (nothing when `ret`
    /// is void), callable from any thread.
    pub unsafe fn new(
        name: impl Into<String>,
        addr: usize,
        arity: usize,
        ret: ArgShape,
    ) -> Result<Self, CallError> {
        if arity > MAX_EXTERN_ARITY {
            return Err(CallError::TooManyArgs);
        }
        let returns = match ret {
            ArgShape::Void | ArgShape::VoidNoReturn => ReturnKind::Void,
            ArgShape::Double => {
                return Err(CallError::UnsupportedSignature(
                    "double return".to_string(),
                ))
            }
            shape if shape.is_object() => ReturnKind::Object,
            _ => ReturnKind::Int,
        };
        Ok(Self {
            name: name.into(),
            addr,
            arity,
            returns,
        })
    }

    /// Bind a descriptor to a native address.
    ///
    /// # Safety
    /// Same contract as [`ExternFunction::new`], for the descriptor's
    /// signature.
    pub unsafe fn from_symbol(desc: &SymbolDescriptor, addr: usize) -> Result<Self, CallError> {
        if desc.is_vararg() {
            return Err(CallError::UnsupportedSignature(format!(
                "{} is variadic",
                desc.name
            )));
        }
        if let Some(index) = desc
            .args
            .iter()
            .position(|a| matches!(a, ArgShape::Double | ArgShape::VaList))
        {
            return Err(CallError::UnsupportedArgument { index });
        }
        Self::new(desc.name.clone(), addr, desc.args.len(), desc.ret)
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    fn words(&self, args: &[NativeArg]) -> Result<[u64; MAX_EXTERN_ARITY], CallError> {
        if args.len() != self.arity {
            return Err(CallError::ArgCountMismatch {
                expected: self.arity,
                got: args.len(),
            });
        }
        let mut words = [0u64; MAX_EXTERN_ARITY];
        for (index, arg) in args.iter().enumerate() {
            words[index] = match arg {
                NativeArg::Object(ptr) => ptr.addr(),
                NativeArg::Int(v) => *v as u64,
                _ => return Err(CallError::UnsupportedArgument { index }),
            };
        }
        Ok(words)
    }

    unsafe fn invoke(&self, w: &[u64; MAX_EXTERN_ARITY]) -> u64 {
        if self.returns == ReturnKind::Void {
            call_words!((), self.addr, self.arity, w);
            0
        } else {
            call_words!(u64, self.addr, self.arity, w)
        }
    }
}

impl NativeFunction for ExternFunction {
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, _ctx: &Context, args: &[NativeArg]) -> Result<NativeReturn, CallError> {
        let words = self.words(args)?;
        // SAFETY: the signature was vouched for at construction
        let raw = unsafe { self.invoke(&words) };
        Ok(match self.returns {
            ReturnKind::Object => NativeReturn::Object(NativePtr::new(raw)),
            ReturnKind::Int => NativeReturn::Int(raw as i64),
            ReturnKind::Void => NativeReturn::Void,
        })
    }
}

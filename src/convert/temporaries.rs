//! Temporary argument references
//!
//! A borrowed conversion that has to create a wrapper leaves it holding one
//! reference nobody owns. `Temporaries` collects those wrappers while the
//! arguments of one native call are marshaled and drops that reference when
//! the scope ends. A wrapper the callee increfed outlives the scope.

use super::batch::ArgVec;
use super::fastcall::ObjectArrayWrapper;
use super::to_native::to_native_temporary;
use crate::context::Context;
use crate::object::{NativePtr, Value};
use crate::refcount;
use crate::wrapper::WrapperRef;
use std::sync::Arc;

pub struct Temporaries<'a> {
    ctx: &'a Context,
    wrappers: ArgVec<WrapperRef>,
    arrays: Vec<Arc<ObjectArrayWrapper>>,
}

impl<'a> Temporaries<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            wrappers: ArgVec::new(),
            arrays: Vec::new(),
        }
    }

    pub fn ctx(&self) -> &'a Context {
        self.ctx
    }

    /// Borrowed conversion; a wrapper created for it lives until the scope ends
    pub fn borrow(&mut self, value: &Value) -> NativePtr {
        let (ptr, created) = to_native_temporary(self.ctx, value);
        if let Some(wrapper) = created {
            self.wrappers.push(wrapper);
        }
        ptr
    }

    /// Lazy argument array whose converted elements are released with the scope
    pub fn array(&mut self, values: &[Value]) -> Arc<ObjectArrayWrapper> {
        let array = ObjectArrayWrapper::new(values.to_vec());
        self.arrays.push(array.clone());
        array
    }

    /// Wrappers held so far, array elements included
    pub fn len(&self) -> usize {
        self.wrappers.len() + self.arrays.iter().map(|a| a.temporaries()).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// End the scope now. Returns the number of wrappers finalized.
    pub fn release(mut self) -> usize {
        self.release_all()
    }

    fn release_all(&mut self) -> usize {
        let ctx = self.ctx;
        let finalized = self
            .wrappers
            .drain(..)
            .filter(|wrapper| refcount::dec(ctx, wrapper, 1) == 0)
            .count();
        finalized
            + self
                .arrays
                .drain(..)
                .map(|array| array.release(ctx))
                .sum::<usize>()
    }
}

impl Drop for Temporaries<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

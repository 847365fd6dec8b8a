//! Fastcall argument views
//!
//! `(self, args[], nargs)` crosses with `self` converted eagerly and
//! `args` as an array view whose elements convert on first access.
//! Wrappers an element conversion creates belong to the view and are
//! dropped by [`ObjectArrayWrapper::release`] once the call is over.

use super::temporaries::Temporaries;
use super::to_native::to_native_temporary;
use crate::context::Context;
use crate::error::{PyException, PyResult};
use crate::object::{NativePtr, ObjectKind, Value};
use crate::refcount;
use crate::wrapper::WrapperRef;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::sync::Arc;

/// Native view of a managed argument array
#[derive(Debug)]
pub struct ObjectArrayWrapper {
    values: Vec<Value>,
    slots: Box<[OnceCell<NativePtr>]>,
    created: Mutex<Vec<WrapperRef>>,
}

impl ObjectArrayWrapper {
    pub fn new(values: Vec<Value>) -> Arc<Self> {
        let slots = (0..values.len()).map(|_| OnceCell::new()).collect();
        Arc::new(Self {
            values,
            slots,
            created: Mutex::new(Vec::new()),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `args[index]` as a borrowed native pointer, converted once
    pub fn get(&self, ctx: &Context, index: usize) -> Option<NativePtr> {
        let value = self.values.get(index)?;
        Some(*self.slots[index].get_or_init(|| {
            let (ptr, created) = to_native_temporary(ctx, value);
            if let Some(wrapper) = created {
                self.created.lock().push(wrapper);
            }
            ptr
        }))
    }

    /// Wrappers created by element conversions and not yet released
    pub fn temporaries(&self) -> usize {
        self.created.lock().len()
    }

    /// Drop the view's reference to every wrapper it created. Elements
    /// already handed out stay as they are; returns the number finalized.
    pub fn release(&self, ctx: &Context) -> usize {
        let created = std::mem::take(&mut *self.created.lock());
        created
            .iter()
            .filter(|wrapper| refcount::dec(ctx, wrapper, 1) == 0)
            .count()
    }

    /// Elements converted so far
    pub fn converted(&self) -> usize {
        self.slots.iter().filter(|slot| slot.get().is_some()).count()
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

/// Native-side arguments of a fastcall
#[derive(Debug, Clone)]
pub struct FastCallArgs {
    pub receiver: NativePtr,
    pub args: Arc<ObjectArrayWrapper>,
    pub nargs: usize,
    /// Keyword names tuple; NULL without keywords
    pub kwnames: NativePtr,
}

/// `METH_FASTCALL`: `self, args[], nargs`
pub fn fastcall_to_native(temps: &mut Temporaries<'_>, receiver: &Value, args: &[Value]) -> FastCallArgs {
    FastCallArgs {
        receiver: temps.borrow(receiver),
        args: temps.array(args),
        nargs: args.len(),
        kwnames: NativePtr::NULL,
    }
}

/// `METH_FASTCALL | METH_KEYWORDS`: `args` holds the positional values
/// followed by one value per keyword name.
pub fn fastcall_with_keywords_to_native(
    temps: &mut Temporaries<'_>,
    receiver: &Value,
    args: &[Value],
    kwnames: &Value,
) -> PyResult<FastCallArgs> {
    let keywords = keyword_count(kwnames)?;
    if keywords > args.len() {
        return Err(PyException::type_error(format!(
            "{} keyword names for {} arguments",
            keywords,
            args.len()
        )));
    }

    Ok(FastCallArgs {
        receiver: temps.borrow(receiver),
        args: temps.array(args),
        nargs: args.len() - keywords,
        kwnames: match kwnames {
            Value::Object(_) => temps.borrow(kwnames),
            _ => NativePtr::NULL,
        },
    })
}

fn keyword_count(kwnames: &Value) -> PyResult<usize> {
    match kwnames {
        Value::None | Value::NoValue | Value::NativeNull(_) => Ok(0),
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Tuple(names) => {
                if names.iter().all(|name| name.as_str().is_some()) {
                    Ok(names.len())
                } else {
                    Err(PyException::type_error("keywords must be strings"))
                }
            }
            _ => Err(kwnames_type_error(kwnames)),
        },
        other => Err(kwnames_type_error(other)),
    }
}

fn kwnames_type_error(kwnames: &Value) -> PyException {
    PyException::type_error(format!(
        "keyword names must be a tuple, not {}",
        kwnames.type_name()
    ))
}

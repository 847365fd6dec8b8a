//! C API symbol descriptor table
//!
//! Maps each exported symbol to its calling convention: ordered argument
//! shapes, return shape, and the path a call takes. The dispatchers consult
//! it to pick a conversion per argument and to forward vararg functions to
//! their `va_list` counterparts.

mod audit;


pub use audit::{audit_vararg_forwards, VarargAudit, VarargAuditError, MANUAL_VARARGS};

use crate::error::SymbolError;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

const BUILTIN_TABLE: &str = include_str!("capi_symbols.toml");

static BUILTIN: Lazy<Arc<SymbolTable>> = Lazy::new(|| {
    Arc::new(SymbolTable::parse(BUILTIN_TABLE).expect("built-in symbol table is valid"))
});

/// Shape of one argument or return value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArgShape {
    Void,
    VoidNoReturn,
    /// New reference
    PyObject,
    PyObjectBorrowed,
    /// Reference stolen by the callee
    PyObjectTransfer,
    PyTypeObject,
    Pointer,
    ConstCharPtr,
    CharPtr,
    Int,
    Long,
    #[serde(rename = "Py_ssize_t")]
    PySsizeT,
    Double,
    #[serde(rename = "...")]
    VarArgs,
    #[serde(rename = "va_list")]
    VaList,
}

impl ArgShape {
    /// Does this shape carry a `PyObject*`?
    pub fn is_object(self) -> bool {
        matches!(
            self,
            Self::PyObject | Self::PyObjectBorrowed | Self::PyObjectTransfer | Self::PyTypeObject
        )
    }

    pub fn is_void(self) -> bool {
        matches!(self, Self::Void | Self::VoidNoReturn)
    }
}

/// How a call to the symbol is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallPath {
    Direct,
    Forwarded,
    Ignored,
    #[serde(alias = "unimplemented")]
    NotImplemented,
    CImpl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDescriptor {
    pub name: String,
    #[serde(default)]
    pub args: Vec<ArgShape>,
    pub ret: ArgShape,
    pub call: CallPath,
    #[serde(default)]
    pub forwards_to: Option<String>,
}

impl SymbolDescriptor {
    /// Declared with a trailing `...`
    #[inline]
    pub fn is_vararg(&self) -> bool {
        self.args.last() == Some(&ArgShape::VarArgs)
    }

    /// Number of fixed arguments
    pub fn fixed_arity(&self) -> usize {
        if self.is_vararg() {
            self.args.len() - 1
        } else {
            self.args.len()
        }
    }

    fn validate(&self) -> Result<(), SymbolError> {
        let malformed = |reason: &str| SymbolError::Malformed {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if self.name.is_empty() {
            return Err(malformed("empty name"));
        }
        if let Some(pos) = self.args.iter().position(|a| *a == ArgShape::VarArgs) {
            if pos + 1 != self.args.len() {
                return Err(malformed("'...' must be the last argument"));
            }
        }
        if self.args.iter().any(|a| a.is_void()) {
            return Err(malformed("void argument"));
        }
        if self.call == CallPath::Forwarded && self.forwards_to.is_none() {
            return Err(malformed("forwarded symbol without forwards_to"));
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawTable {
    #[serde(default)]
    symbol: Vec<SymbolDescriptor>,
}

/// Symbol name -> descriptor
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    entries: Vec<SymbolDescriptor>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    /// Table shipped with the crate
    pub fn builtin() -> Arc<SymbolTable> {
        BUILTIN.clone()
    }

    pub fn load(path: &Path) -> Result<Self, SymbolError> {
        let content = fs::read_to_string(path).map_err(|source| SymbolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, SymbolError> {
        let raw: RawTable =
            toml::from_str(content).map_err(|e| SymbolError::Parse(e.to_string()))?;
        Self::from_descriptors(raw.symbol)
    }

    pub fn from_descriptors(entries: Vec<SymbolDescriptor>) -> Result<Self, SymbolError> {
        let mut index = HashMap::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            entry.validate()?;
            if index.insert(entry.name.clone(), i).is_some() {
                return Err(SymbolError::Duplicate {
                    name: entry.name.clone(),
                });
            }
        }
        Ok(Self { entries, index })
    }

    #[inline]
    pub fn get(&self, name: &str) -> Option<&SymbolDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    /// `va_list` counterpart a vararg symbol forwards to, if it exists
    pub fn forward_target(&self, name: &str) -> Option<&SymbolDescriptor> {
        let entry = self.get(name)?;
        if !entry.is_vararg() {
            return None;
        }
        self.get(entry.forwards_to.as_deref()?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

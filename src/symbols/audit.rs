//! Vararg forwarding audit
//!
//! `...` cannot cross the boundary. Every vararg symbol resolved through the
//! managed side must forward to an existing `va_list` counterpart with the
//! same signature (trailing `...` replaced by `va_list`), unless it is
//! implemented by hand.

use super::{ArgShape, CallPath, SymbolTable};
use crate::logging::log_vararg_audit;
use std::collections::BTreeSet;
use std::fmt;

/// Vararg functions implemented manually in native code
pub const MANUAL_VARARGS: &[&str] = &[
    "PyArg_Parse",
    "PyObject_CallFunction",
    "PyObject_CallFunctionObjArgs",
    "PyObject_CallMethod",
    "PyObject_CallMethodObjArgs",
    "PyTuple_Pack",
    "_PyArg_ParseStack_SizeT",
    "_PyArg_Parse_SizeT",
    "_PyObject_CallFunction_SizeT",
    "_PyObject_CallMethod_SizeT",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VarargAudit {
    /// (vararg symbol, va_list target)
    pub forwards: Vec<(String, String)>,
    /// Vararg symbols with neither a target nor a manual implementation
    pub missing: BTreeSet<String>,
    /// Forwards whose target signature does not match
    pub mismatched: BTreeSet<String>,
}

impl VarargAudit {
    pub fn is_ok(&self) -> bool {
        self.missing.is_empty() && self.mismatched.is_empty()
    }

    pub fn into_result(self) -> Result<Self, VarargAuditError> {
        if self.is_ok() {
            Ok(self)
        } else {
            Err(VarargAuditError {
                missing: self.missing.into_iter().collect(),
                mismatched: self.mismatched.into_iter().collect(),
            })
        }
    }
}

/// Failed audit; names are sorted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarargAuditError {
    pub missing: Vec<String>,
    pub mismatched: Vec<String>,
}

impl fmt::Display for VarargAuditError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "Missing forwards for vararg functions: {}",
                self.missing.join(", ")
            ));
        }
        if !self.mismatched.is_empty() {
            parts.push(format!(
                "Vararg forward targets with mismatched signatures: {}",
                self.mismatched.join(", ")
            ));
        }
        f.write_str(&parts.join("; "))
    }
}

impl std::error::Error for VarargAuditError {}

pub fn audit_vararg_forwards(table: &SymbolTable) -> VarargAudit {
    let mut audit = VarargAudit::default();

    for function in table.iter() {
        match function.call {
            CallPath::Ignored | CallPath::CImpl | CallPath::NotImplemented => continue,
            CallPath::Direct | CallPath::Forwarded => {}
        }
        if !function.is_vararg() {
            continue;
        }

        let target = function
            .forwards_to
            .as_deref()
            .and_then(|name| table.get(name));
        match target {
            Some(va) => {
                let mut expected = function.args.clone();
                if let Some(last) = expected.last_mut() {
                    *last = ArgShape::VaList;
                }
                if va.args != expected || va.ret != function.ret {
                    audit.mismatched.insert(va.name.clone());
                }
                audit.forwards.push((function.name.clone(), va.name.clone()));
            }
            None => {
                if !MANUAL_VARARGS.contains(&function.name.as_str()) {
                    audit.missing.insert(function.name.clone());
                }
            }
        }
    }

    log_vararg_audit(
        audit.forwards.len(),
        audit.missing.len(),
        audit.mismatched.len(),
    );
    audit
}

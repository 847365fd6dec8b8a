//! Error types for the native/managed boundary
//!
//! Design: two families, never mixed:
//! 1. `PyException` - managed-visible errors (TypeError, OverflowError, ...)
//!    that travel through the pending-exception slot
//! 2. Infrastructure errors (`ConfigError`, `SymbolError`) raised while
//!    setting a context up, before any boundary crossing happens
//!
//! Bridge invariant violations are neither: they panic.

use crate::exception::FrameRef;
use std::fmt;
use std::path::PathBuf;

/// Python exception class raised by the bridge or by managed code
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExceptionKind {
    TypeError,
    OverflowError,
    SystemError,
    RecursionError,
    ValueError,
    AttributeError,
    NameError,
    RuntimeError,
    Other(String),
}

impl ExceptionKind {
    /// Class name as Python spells it
    pub fn name(&self) -> &str {
        match self {
            Self::TypeError => "TypeError",
            Self::OverflowError => "OverflowError",
            Self::SystemError => "SystemError",
            Self::RecursionError => "RecursionError",
            Self::ValueError => "ValueError",
            Self::AttributeError => "AttributeError",
            Self::NameError => "NameError",
            Self::RuntimeError => "RuntimeError",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raised managed exception
///
/// Carries the frame it escaped from once it has been captured at the
/// boundary.
#[derive(Debug, Clone)]
pub struct PyException {
    kind: ExceptionKind,
    message: String,
    frame: Option<FrameRef>,
}

impl PyException {
    pub fn new(kind: ExceptionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            frame: None,
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::TypeError, message)
    }

    pub fn overflow_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::OverflowError, message)
    }

    pub fn system_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::SystemError, message)
    }

    pub fn recursion_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::RecursionError, message)
    }

    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ExceptionKind::AttributeError, message)
    }

    #[inline]
    pub fn kind(&self) -> &ExceptionKind {
        &self.kind
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Frame the exception escaped from, if it crossed the boundary
    pub fn frame(&self) -> Option<&FrameRef> {
        self.frame.as_ref()
    }

    #[inline]
    pub fn is(&self, kind: &ExceptionKind) -> bool {
        &self.kind == kind
    }

    /// Attach a frame unless one is already recorded
    pub(crate) fn with_frame(mut self, frame: Option<FrameRef>) -> Self {
        if self.frame.is_none() {
            self.frame = frame;
        }
        self
    }
}

impl fmt::Display for PyException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.kind, self.message)
        }
    }
}

impl std::error::Error for PyException {}

/// Result of any operation that may raise into managed code
pub type PyResult<T> = Result<T, PyException>;

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to read config {}: {}", path.display(), source)
            }
            Self::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            Self::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Symbol descriptor table errors
#[derive(Debug)]
pub enum SymbolError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(String),
    Duplicate { name: String },
    Malformed { name: String, reason: String },
}

impl fmt::Display for SymbolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "Failed to read symbol table {}: {}", path.display(), source)
            }
            Self::Parse(msg) => write!(f, "Failed to parse symbol table: {}", msg),
            Self::Duplicate { name } => write!(f, "Duplicate entry for {}", name),
            Self::Malformed { name, reason } => write!(f, "Malformed entry {}: {}", name, reason),
        }
    }
}

impl std::error::Error for SymbolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

//! Logging infrastructure - structured tracing across the boundary
//!
//! Every boundary event goes through `tracing`:
//! - Stable `event = "..."` fields for every boundary event
//! - One span per upcall and downcall, reported when `spans` is on
//! - Console or non-blocking file output, plain or JSON
//!
//! Settings come from the `[logging]` section of `.cext-bridge.toml`;
//! `CEXT_BRIDGE_LOG_*` variables override them and `RUST_LOG` overrides
//! the level.

use crate::config::BridgeConfig;
use crate::error::ExceptionKind;
use crate::object::NativePtr;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

pub use tracing::{debug, error, info, trace, warn, Level};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking file writer flushing for the process lifetime
static FILE_GUARD: OnceCell<WorkerGuard> = OnceCell::new();

/// `[logging]` section of the bridge configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// trace, debug, info, warn or error; info when absent
    #[serde(default)]
    pub level: Option<String>,

    /// Append to this file through a non-blocking writer instead of stdout
    #[serde(default)]
    pub file: Option<PathBuf>,

    #[serde(default)]
    pub json: bool,

    /// Report enter/close of the per-call boundary spans
    #[serde(default)]
    pub spans: bool,
}

impl LogConfig {
    /// Apply `CEXT_BRIDGE_LOG_{LEVEL,FILE,JSON,SPANS}` on top of `self`
    pub fn with_env(mut self) -> Self {
        if let Ok(level) = std::env::var("CEXT_BRIDGE_LOG_LEVEL") {
            self.level = Some(level);
        }
        if let Ok(path) = std::env::var("CEXT_BRIDGE_LOG_FILE") {
            self.file = Some(PathBuf::from(path));
        }
        if let Ok(val) = std::env::var("CEXT_BRIDGE_LOG_JSON") {
            self.json = flag(&val);
        }
        if let Ok(val) = std::env::var("CEXT_BRIDGE_LOG_SPANS") {
            self.spans = flag(&val);
        }
        self
    }

    pub fn level(&self) -> Level {
        self.level.as_deref().map_or(Level::INFO, parse_level)
    }
}

fn flag(val: &str) -> bool {
    !matches!(val.to_lowercase().as_str(), "" | "0" | "false" | "off")
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging from the discovered bridge configuration
pub fn init() {
    init_with_config(BridgeConfig::discover().logging.with_env());
}

/// Initialize logging; only the first call in a process takes effect
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "cext_bridge={}",
                config.level().as_str().to_lowercase()
            ))
        });

        let span_events = if config.spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let writer = match config.file.as_deref() {
            Some(path) => file_writer(path),
            None => BoxMakeWriter::new(io::stdout),
        };

        let layer = fmt::layer()
            .with_writer(writer)
            .with_span_events(span_events)
            .with_target(true)
            .with_thread_ids(cfg!(debug_assertions))
            .with_line_number(cfg!(debug_assertions));

        let layer: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
            layer.json().boxed()
        } else {
            layer.boxed()
        };

        // Another subscriber may already be installed by the embedder
        let _ = tracing_subscriber::registry()
            .with(layer)
            .with(env_filter)
            .try_init();
    });
}

fn file_writer(path: &Path) -> BoxMakeWriter {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "cext_bridge.log".into());

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
    let _ = FILE_GUARD.set(guard);
    BoxMakeWriter::new(non_blocking)
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Boundary events
// ============================================================================

/// Log a native -> managed call
#[inline]
pub fn log_upcall(kind: &str, callable: &str, arity: usize) {
    debug!(
        event = "upcall",
        kind = kind,
        callable = callable,
        args = arity,
        "Upcall dispatched"
    );
}

/// Log a managed -> native call
#[inline]
pub fn log_downcall(function: &str, arity: usize) {
    debug!(
        event = "downcall",
        function = function,
        args = arity,
        "Downcall dispatched"
    );
}

/// Log a wrapper receiving its native handle
#[inline]
pub fn log_handle_promoted(handle: NativePtr, refcount: i64) {
    trace!(
        event = "handle_promoted",
        handle = %handle,
        refcount = refcount,
        "Wrapper promoted to handle space"
    );
}

/// Log wrapper finalization
#[inline]
pub fn log_wrapper_finalized(handle: Option<NativePtr>) {
    trace!(
        event = "wrapper_finalized",
        handle = ?handle,
        refcount = 0,
        "Wrapper finalized"
    );
}

/// Log a refcount that went below zero
#[cold]
pub fn log_refcount_anomaly(target: &str, count: i64) {
    warn!(
        event = "refcount_anomaly",
        target_kind = target,
        count = count,
        "Reference count dropped below zero"
    );
}

/// Log a managed exception captured at the boundary
pub fn log_exception_captured(kind: &ExceptionKind, message: &str, frame: Option<&str>) {
    debug!(
        event = "exception_captured",
        kind = %kind,
        message = message,
        frame = ?frame,
        "Exception captured at boundary"
    );
}

/// Log the result of a vararg forwarding audit
pub fn log_vararg_audit(forwards: usize, missing: usize, mismatched: usize) {
    if missing == 0 && mismatched == 0 {
        info!(
            event = "vararg_audit",
            forwards = forwards,
            "Vararg forwarding audit passed"
        );
    } else {
        error!(
            event = "vararg_audit",
            forwards = forwards,
            missing = missing,
            mismatched = mismatched,
            "Vararg forwarding audit failed"
        );
    }
}

/// Log a bulk release of owned native references
pub fn log_native_release(objects: usize, elapsed: Duration) {
    debug!(
        event = "native_release",
        objects = objects,
        duration_us = elapsed.as_micros() as u64,
        "Owned native references released"
    );
}

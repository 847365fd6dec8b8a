//! Bridge context - all per-instance boundary state
//!
//! Design: nothing lives in hidden statics. Each `Context` owns:
//! 1. The handle table and its call-site cache
//! 2. Identity caches (small ints, bools, NaN, None, class wrappers)
//! 3. Native object proxies and the native NULL sentinel
//! 4. The pending-exception slot and the managed frame stack
//! 5. The boundary lock and recursion depth
//!
//! Several contexts can coexist without sharing any of it.

mod caches;
mod guard;

#[cfg(test)]
mod tests;

pub use guard::{BoundaryGuard, FrameGuard};

pub(crate) use caches::{ClassCache, PrimitiveCache};

use crate::config::BridgeConfig;
use crate::error::{PyException, PyResult, SymbolError};
use crate::exception::{ExceptionBridge, Frame, FrameRef};
use crate::handles::{HandleCache, HandleTable};
use crate::logging::{debug, log_native_release};
use crate::metrics::{BridgeStats, CallTimings, StatsSnapshot};
use crate::object::{NativeObject, NativeObjectRef, NativeObjectTable, NativePtr, Value};
use crate::probes::{InProcessProbes, NativeProbes};
use crate::symbols::SymbolTable;
use crate::wrapper::{Wrapper, WrapperRef};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Observer run when a wrapper is finalized, before its delegate is dropped
pub type ReleaseHook = Arc<dyn Fn(&Wrapper) + Send + Sync>;

pub struct Context {
    config: BridgeConfig,
    pub(crate) handles: HandleTable,
    pub(crate) cache: HandleCache,
    pub(crate) natives: NativeObjectTable,
    pub(crate) primitives: PrimitiveCache,
    pub(crate) classes: ClassCache,
    native_null: NativeObjectRef,
    pub(crate) probes: Arc<dyn NativeProbes>,
    symbols: Arc<SymbolTable>,
    pub(crate) exception: Mutex<Option<PyException>>,
    pub(crate) frames: Mutex<Vec<FrameRef>>,
    pub(crate) depth: AtomicUsize,
    boundary: ReentrantMutex<()>,
    pub(crate) stats: BridgeStats,
    timings: CallTimings,
    release_hooks: RwLock<Vec<ReleaseHook>>,
}

impl Context {
    /// Context with default configuration, in-process probes and the
    /// built-in symbol table
    pub fn new() -> Self {
        Self::assemble(
            BridgeConfig::default(),
            Arc::new(InProcessProbes::new()),
            SymbolTable::builtin(),
        )
    }

    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    fn assemble(
        config: BridgeConfig,
        probes: Arc<dyn NativeProbes>,
        symbols: Arc<SymbolTable>,
    ) -> Self {
        debug!(
            small_int_min = config.cache.small_int_min,
            small_int_max = config.cache.small_int_max,
            symbols = symbols.len(),
            "bridge context created"
        );
        Self {
            handles: HandleTable::new(),
            cache: HandleCache::new(config.cache.handle_cache_size),
            natives: NativeObjectTable::new(),
            primitives: PrimitiveCache::new(&config),
            classes: ClassCache::default(),
            native_null: NativeObject::new(NativePtr::NULL),
            probes,
            symbols,
            exception: Mutex::new(None),
            frames: Mutex::new(Vec::new()),
            depth: AtomicUsize::new(0),
            boundary: ReentrantMutex::new(()),
            stats: BridgeStats::default(),
            timings: CallTimings::new(config.profiling.call_timing),
            release_hooks: RwLock::new(Vec::new()),
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    #[inline]
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    pub fn handle_cache(&self) -> &HandleCache {
        &self.cache
    }

    pub fn natives(&self) -> &NativeObjectTable {
        &self.natives
    }

    pub fn probes(&self) -> &Arc<dyn NativeProbes> {
        &self.probes
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn timings(&self) -> &CallTimings {
        &self.timings
    }

    /// Counters including the handle cache's
    pub fn stats(&self) -> StatsSnapshot {
        let mut snapshot = self.stats.snapshot();
        snapshot.cache_hits = self.cache.hits();
        snapshot.cache_misses = self.cache.misses();
        snapshot
    }

    /// The context's native NULL sentinel
    pub fn native_null(&self) -> Value {
        Value::NativeNull(self.native_null.clone())
    }

    /// Interned singletons created so far
    pub fn interned_count(&self) -> usize {
        self.primitives.populated() + self.classes.len()
    }

    pub fn exceptions(&self) -> ExceptionBridge<'_> {
        ExceptionBridge::new(self)
    }

    pub fn current_frame(&self) -> Option<FrameRef> {
        self.frames.lock().last().cloned()
    }

    pub fn frame_depth(&self) -> usize {
        self.frames.lock().len()
    }

    /// Current boundary recursion depth
    pub fn recursion_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Enter the boundary: take the boundary lock and one level of depth.
    ///
    /// Raises RecursionError once the configured maximum depth is reached.
    pub fn enter_boundary(&self) -> PyResult<BoundaryGuard<'_>> {
        let lock = self.boundary.lock();
        let depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        if depth > self.config.limits.max_recursion_depth {
            self.depth.fetch_sub(1, Ordering::Relaxed);
            return Err(PyException::recursion_error(
                "maximum recursion depth exceeded while crossing the native boundary",
            ));
        }
        Ok(BoundaryGuard::new(self, lock))
    }

    /// Take the boundary lock without a level of depth, for leaf operations
    /// (refcount and error state) that cannot call back across the boundary
    pub fn lock_boundary(&self) -> ReentrantMutexGuard<'_, ()> {
        self.boundary.lock()
    }

    /// Push a managed frame for the duration of the guard
    pub fn enter_frame(&self, name: impl Into<String>) -> FrameGuard<'_> {
        let frame = Frame::new(name);
        self.frames.lock().push(frame.clone());
        FrameGuard::new(self, frame)
    }

    /// Register an observer for wrapper finalization.
    ///
    /// Hooks run on a snapshot of the list taken at finalization, so a hook
    /// may release other wrappers or register more hooks.
    pub fn on_release<F>(&self, hook: F)
    where
        F: Fn(&Wrapper) + Send + Sync + 'static,
    {
        self.release_hooks.write().push(Arc::new(hook));
    }

    pub(crate) fn release_hooks(&self) -> Vec<ReleaseHook> {
        self.release_hooks.read().clone()
    }

    /// Give `wrapper` a handle, counting first promotions
    pub(crate) fn promote(&self, wrapper: &WrapperRef) -> NativePtr {
        if let Some(handle) = wrapper.handle() {
            return handle;
        }
        let handle = self.handles.promote(wrapper);
        BridgeStats::bump(&self.stats.handles_promoted);
        handle
    }

    #[inline]
    pub(crate) fn wrapper_created(&self) {
        BridgeStats::bump(&self.stats.wrappers_created);
    }

    /// Release every native reference the managed side took ownership of
    /// through transfer conversions. Returns the number of objects touched.
    pub fn release_native_references(&self) -> usize {
        let owned = self.natives.drain_owned();
        if !owned.is_empty() {
            let start = Instant::now();
            self.probes.bulk_subref(&owned);
            log_native_release(owned.len(), start.elapsed());
        }
        owned.len()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.release_native_references();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("handles", &self.handles.len())
            .field("natives", &self.natives.len())
            .field("depth", &self.recursion_depth())
            .field("pending_exception", &self.exception.lock().is_some())
            .finish()
    }
}

/// Builder for contexts with custom configuration, probes or symbols
#[derive(Default)]
pub struct ContextBuilder {
    config: BridgeConfig,
    probes: Option<Arc<dyn NativeProbes>>,
    symbols: Option<Arc<SymbolTable>>,
}

impl ContextBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn probes(mut self, probes: Arc<dyn NativeProbes>) -> Self {
        self.probes = Some(probes);
        self
    }

    pub fn symbols(mut self, symbols: Arc<SymbolTable>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Build the context. Loads the configured external symbol table
    /// unless one was supplied.
    pub fn build(self) -> Result<Context, SymbolError> {
        let symbols = match (self.symbols, &self.config.symbols.table) {
            (Some(symbols), _) => symbols,
            (None, Some(path)) => Arc::new(SymbolTable::load(path)?),
            (None, None) => SymbolTable::builtin(),
        };
        let probes = self
            .probes
            .unwrap_or_else(|| Arc::new(InProcessProbes::new()));
        Ok(Context::assemble(self.config, probes, symbols))
    }
}

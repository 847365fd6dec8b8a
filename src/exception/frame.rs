use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type FrameRef = Arc<Frame>;

/// Managed execution frame active across a boundary call
///
/// Escaped frames may be referenced by native code after the call that
/// created them has returned.
#[derive(Debug)]
pub struct Frame {
    name: String,
    escaped: AtomicBool,
}

impl Frame {
    pub fn new(name: impl Into<String>) -> FrameRef {
        Arc::new(Self {
            name: name.into(),
            escaped: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_escaped(&self) -> bool {
        self.escaped.load(Ordering::Acquire)
    }

    pub(crate) fn mark_escaped(&self) {
        self.escaped.store(true, Ordering::Release);
    }
}

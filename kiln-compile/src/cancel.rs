//! Run-scoped cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A single cancellation signal threaded through one compilation run.
///
/// Cloning yields another handle to the same signal. Once cancelled the
/// token never resets; a new run creates a new token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

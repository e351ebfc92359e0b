//! Thread-safe diagnostic collection.

use std::sync::{Arc, Mutex};

use crate::diagnostic::{Diagnostic, Severity};

/// An ordered, append-only collector of diagnostics.
///
/// The sink is the one resource mutated concurrently by pool workers, the
/// analysis task, and the orchestrator; cloning yields another handle to
/// the same underlying collection. Entries are never removed. Within one
/// producer, order is append order; across concurrent producers there is no
/// global ordering guarantee beyond "all present once the producers are
/// joined".
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    inner: Arc<Mutex<Vec<Diagnostic>>>,
}

impl DiagnosticSink {
    /// Create a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a diagnostic.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.inner.lock().unwrap().push(diagnostic);
    }

    /// Append a batch of diagnostics, preserving their order.
    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.inner.lock().unwrap().extend(diagnostics);
    }

    /// Whether any non-suppressed error-severity diagnostic exists.
    ///
    /// This is the sole success-blocking condition for a run.
    pub fn has_blocking(&self) -> bool {
        self.inner.lock().unwrap().iter().any(|d| d.is_blocking())
    }

    /// Count diagnostics of the given severity.
    pub fn count(&self, severity: Severity) -> usize {
        self.inner
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Number of collected diagnostics.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the sink is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Copy out all diagnostics in sink order.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.inner.lock().unwrap().clone()
    }
}

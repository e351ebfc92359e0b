//! Background source analysis.
//!
//! Analyzers inspect the assembled unit for style and correctness issues
//! that are not the backend's job. Analysis runs concurrently with
//! emission on its own thread and is joined before the run is finalized,
//! so its diagnostics always participate in the success decision.

use std::sync::Arc;
use std::thread::JoinHandle;

use kiln_core::{Diagnostic, DiagnosticSink, codes};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::emit::CompilationUnit;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("analysis cancelled")]
    Cancelled,
    #[error("analysis failed: {0}")]
    Fault(String),
}

/// Capability: analyze an assembled unit, producing diagnostics.
///
/// Implementations should poll `cancel` between files and bail out with
/// [`AnalysisError::Cancelled`] once it fires.
pub trait Analyzer: Send + Sync {
    fn analyze(
        &self,
        unit: &CompilationUnit,
        cancel: &CancelToken,
    ) -> Result<Vec<Diagnostic>, AnalysisError>;
}

/// An in-flight analysis run.
pub struct AnalysisTask {
    handle: JoinHandle<Result<Vec<Diagnostic>, AnalysisError>>,
}

impl AnalysisTask {
    /// Start analyzing `unit` on a dedicated thread.
    pub fn spawn(
        analyzer: Arc<dyn Analyzer>,
        unit: Arc<CompilationUnit>,
        cancel: CancelToken,
    ) -> Self {
        let handle = std::thread::spawn(move || analyzer.analyze(&unit, &cancel));
        Self { handle }
    }

    /// Wait for analysis to finish and fold its result into `sink`.
    ///
    /// A cancelled analysis is a Warning; a fault or a panicked analyzer
    /// thread is an Error. Nothing here aborts the caller.
    pub fn join(self, sink: &DiagnosticSink) {
        match self.handle.join() {
            Ok(Ok(diagnostics)) => sink.extend(diagnostics),
            Ok(Err(AnalysisError::Cancelled)) => sink.push(Diagnostic::warning(
                codes::CANCELLED,
                "source analysis cancelled before completion",
            )),
            Ok(Err(AnalysisError::Fault(detail))) => sink.push(Diagnostic::error(
                codes::ANALYSIS_FAILED,
                format!("source analysis failed: {detail}"),
            )),
            Err(_) => sink.push(Diagnostic::error(
                codes::ANALYSIS_FAILED,
                "source analysis aborted unexpectedly",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use kiln_core::Severity;

    use super::*;

    struct LineLimitAnalyzer {
        max_lines: usize,
    }

    impl Analyzer for LineLimitAnalyzer {
        fn analyze(
            &self,
            unit: &CompilationUnit,
            cancel: &CancelToken,
        ) -> Result<Vec<Diagnostic>, AnalysisError> {
            let mut found = Vec::new();
            for source in &unit.sources {
                if cancel.is_cancelled() {
                    return Err(AnalysisError::Cancelled);
                }
                if source.text.lines().count() > self.max_lines {
                    found.push(Diagnostic::warning(
                        codes::ANALYSIS_FAILED,
                        format!("'{}' is too long", source.path.display()),
                    ));
                }
            }
            Ok(found)
        }
    }

    struct PanickingAnalyzer;

    impl Analyzer for PanickingAnalyzer {
        fn analyze(
            &self,
            _unit: &CompilationUnit,
            _cancel: &CancelToken,
        ) -> Result<Vec<Diagnostic>, AnalysisError> {
            panic!("analyzer bug");
        }
    }

    fn unit() -> Arc<CompilationUnit> {
        Arc::new(CompilationUnit::new("app", Vec::new()))
    }

    #[test]
    fn analyzer_diagnostics_reach_the_sink() {
        let mut unit = CompilationUnit::new("app", Vec::new());
        unit.sources.push(kiln_core::LoadedSource {
            path: "a.src".into(),
            kind: kiln_core::SourceKind::Native,
            text: "1\n2\n3\n".into(),
        });
        let sink = DiagnosticSink::new();

        AnalysisTask::spawn(
            Arc::new(LineLimitAnalyzer { max_lines: 2 }),
            Arc::new(unit),
            CancelToken::new(),
        )
        .join(&sink);

        assert_eq!(sink.count(Severity::Warning), 1);
    }

    #[test]
    fn cancelled_analysis_is_a_warning() {
        let mut u = CompilationUnit::new("app", Vec::new());
        u.sources.push(kiln_core::LoadedSource {
            path: "a.src".into(),
            kind: kiln_core::SourceKind::Native,
            text: String::new(),
        });
        let cancel = CancelToken::new();
        cancel.cancel();
        let sink = DiagnosticSink::new();

        AnalysisTask::spawn(
            Arc::new(LineLimitAnalyzer { max_lines: 2 }),
            Arc::new(u),
            cancel,
        )
        .join(&sink);

        let diags = sink.snapshot();
        assert_eq!(diags[0].code, codes::CANCELLED);
        assert!(!sink.has_blocking());
    }

    #[test]
    fn panicking_analyzer_becomes_an_error() {
        let sink = DiagnosticSink::new();
        AnalysisTask::spawn(Arc::new(PanickingAnalyzer), unit(), CancelToken::new()).join(&sink);

        assert!(sink.has_blocking());
        assert_eq!(sink.snapshot()[0].code, codes::ANALYSIS_FAILED);
    }
}

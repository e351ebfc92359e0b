//! Source-set loading.
//!
//! The loader turns an ordered list of input paths into an ordered list of
//! compilable sources. Native sources are read inline; template sources are
//! read and handed to the [`TransformPool`], then their generated results
//! are stitched back into the original input positions. A source that
//! cannot be loaded or transformed is excluded from the result, with the
//! reason on the sink; exclusion never reorders the survivors.

use std::path::PathBuf;

use eyre::{Result, eyre};
use kiln_core::{
    Classifier, Diagnostic, DiagnosticSink, LoadedSource, SourceArtifact, SourceKind,
    SourceLocation, codes,
};

use crate::pool::{ResultSlot, TransformPool};

/// Result of loading one source set.
pub struct LoadReport {
    /// Usable sources, in input order.
    pub sources: Vec<LoadedSource>,
    /// How many template transformations were skipped by cancellation.
    pub cancelled: usize,
}

enum Slot {
    /// Could not be loaded; the sink has the reason.
    Excluded,
    /// Loaded inline, no transformation needed.
    Native(LoadedSource),
    /// Awaiting the transformation pool.
    Pending(ResultSlot),
}

/// Loads and classifies a source set, transforming templates through `pool`.
pub struct SourceLoader {
    classifier: Classifier,
    sink: DiagnosticSink,
}

impl SourceLoader {
    pub fn new(classifier: Classifier, sink: DiagnosticSink) -> Self {
        Self { classifier, sink }
    }

    /// Load every input, in order. Consumes the pool: after this returns,
    /// every submitted transformation has resolved.
    pub fn load(&self, inputs: &[PathBuf], pool: TransformPool) -> Result<LoadReport> {
        let mut slots = Vec::with_capacity(inputs.len());
        for path in inputs {
            slots.push(self.submit(path, &pool));
        }
        pool.complete()?;

        let mut sources = Vec::with_capacity(slots.len());
        let mut cancelled = 0usize;
        for slot in slots {
            match slot {
                Slot::Excluded => {}
                Slot::Native(source) => sources.push(source),
                Slot::Pending(slot) => {
                    let outcome = slot
                        .get()
                        .ok_or_else(|| eyre!("transformation slot left unresolved"))?;
                    self.sink.extend(outcome.diagnostics.iter().cloned());
                    if outcome.cancelled {
                        cancelled += 1;
                    } else if let Some(generated) = &outcome.generated {
                        sources.push(LoadedSource::generated(generated.clone()));
                    }
                }
            }
        }

        if cancelled > 0 {
            self.sink.push(Diagnostic::warning(
                codes::CANCELLED,
                format!("compilation cancelled; {cancelled} template transformation(s) skipped"),
            ));
        }
        Ok(LoadReport { sources, cancelled })
    }

    fn submit(&self, path: &std::path::Path, pool: &TransformPool) -> Slot {
        let Some(kind) = self.classifier.classify(path) else {
            self.sink.push(
                Diagnostic::warning(
                    codes::UNKNOWN_FILE_TYPE,
                    format!("unknown file type for '{}'; file skipped", path.display()),
                )
                .at(SourceLocation::file(path)),
            );
            return Slot::Excluded;
        };

        let artifact = match SourceArtifact::load(path, kind) {
            Ok(artifact) => artifact,
            Err(err) => {
                self.sink.push(err.to_diagnostic());
                return Slot::Excluded;
            }
        };

        match kind {
            SourceKind::Native => Slot::Native(LoadedSource::native(artifact)),
            SourceKind::Template => Slot::Pending(pool.submit(artifact.path, artifact.text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use kiln_core::{Severity, TransformEnv};
    use tempfile::TempDir;

    use super::*;
    use crate::cache::ContentCache;
    use crate::cancel::CancelToken;
    use crate::transform::{EngineError, Expansion, TemplateEngine, Transformer};

    struct MarkerEngine {
        calls: Arc<AtomicUsize>,
    }

    impl TemplateEngine for MarkerEngine {
        fn expand(
            &self,
            _origin: &Path,
            text: &str,
            _env: &TransformEnv,
            _cancel: &CancelToken,
        ) -> Result<Expansion, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Expansion {
                text: format!("gen({text})"),
                diagnostics: Vec::new(),
            })
        }
    }

    fn classifier() -> Classifier {
        Classifier::new()
            .with_rule("src", SourceKind::Native)
            .with_rule("tpl", SourceKind::Template)
    }

    fn fixture(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn pool(sink: &DiagnosticSink, cancel: CancelToken, calls: Arc<AtomicUsize>) -> TransformPool {
        TransformPool::with_size(
            Arc::new(Transformer::new(
                Arc::new(MarkerEngine { calls }),
                TransformEnv::default(),
            )),
            Arc::new(ContentCache::disabled()),
            sink.clone(),
            cancel,
            2,
        )
    }

    #[test]
    fn mixed_sources_come_back_in_input_order() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            fixture(&dir, "a.src", "native a"),
            fixture(&dir, "b.tpl", "template b"),
            fixture(&dir, "c.src", "native c"),
            fixture(&dir, "d.tpl", "template d"),
        ];
        let sink = DiagnosticSink::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = SourceLoader::new(classifier(), sink.clone());

        let report = loader
            .load(&inputs, pool(&sink, CancelToken::new(), calls))
            .unwrap();

        let texts: Vec<_> = report.sources.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts[0], "native a");
        assert!(texts[1].ends_with("gen(template b)"));
        assert_eq!(texts[2], "native c");
        assert!(texts[3].ends_with("gen(template d)"));
        assert!(sink.is_empty());
        assert_eq!(report.cancelled, 0);
    }

    #[test]
    fn unknown_extension_is_skipped_with_a_warning() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            fixture(&dir, "a.src", "native a"),
            fixture(&dir, "weird.xyz", "???"),
        ];
        let sink = DiagnosticSink::new();
        let loader = SourceLoader::new(classifier(), sink.clone());

        let report = loader
            .load(
                &inputs,
                pool(&sink, CancelToken::new(), Arc::default()),
            )
            .unwrap();

        assert_eq!(report.sources.len(), 1);
        assert_eq!(sink.count(Severity::Warning), 1);
        assert!(!sink.has_blocking());
        assert_eq!(sink.snapshot()[0].code, codes::UNKNOWN_FILE_TYPE);
    }

    #[test]
    fn missing_file_is_excluded_with_an_error() {
        let dir = TempDir::new().unwrap();
        let inputs = vec![
            dir.path().join("ghost.src"),
            fixture(&dir, "real.src", "ok"),
        ];
        let sink = DiagnosticSink::new();
        let loader = SourceLoader::new(classifier(), sink.clone());

        let report = loader
            .load(
                &inputs,
                pool(&sink, CancelToken::new(), Arc::default()),
            )
            .unwrap();

        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].text, "ok");
        assert!(sink.has_blocking());
        assert_eq!(sink.snapshot()[0].code, codes::SOURCE_NOT_FOUND);
    }

    #[test]
    fn cancellation_skips_templates_and_warns_once() {
        let dir = TempDir::new().unwrap();
        let inputs: Vec<_> = (0..10)
            .map(|i| fixture(&dir, &format!("v{i}.tpl"), "body"))
            .collect();
        let sink = DiagnosticSink::new();
        let cancel = CancelToken::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let loader = SourceLoader::new(classifier(), sink.clone());

        cancel.cancel();
        let report = loader
            .load(&inputs, pool(&sink, cancel, calls.clone()))
            .unwrap();

        assert_eq!(report.cancelled, 10);
        assert!(report.sources.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(sink.count(Severity::Warning), 1);
        assert_eq!(sink.snapshot()[0].code, codes::CANCELLED);
    }
}

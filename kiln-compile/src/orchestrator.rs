//! The compilation orchestrator.
//!
//! [`Precompiler::run`] drives one complete run: load and transform the
//! source set, run the extension modules' before hooks, emit while the
//! analyzer works in the background, run the after hooks, then finalize.
//! Outputs reach disk only when the run finishes with no blocking
//! diagnostics; every failure mode surfaces as diagnostics on the report
//! rather than a panic or a partial artifact.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use eyre::{Result, WrapErr};
use kiln_core::{Classifier, Diagnostic, DiagnosticSink, TransformEnv, codes};
use serde::Serialize;

use crate::analysis::{AnalysisTask, Analyzer};
use crate::cache::ContentCache;
use crate::cancel::CancelToken;
use crate::emit::{self, CompilationUnit, Emitter, OutputTargets, Resource};
use crate::loader::SourceLoader;
use crate::pipeline::{ExtensionPipeline, HookError, ModuleRegistry};
use crate::pool::TransformPool;
use crate::transform::{TemplateEngine, TransformHooks, Transformer};

/// Per-run inputs and knobs.
pub struct CompileOptions {
    /// Logical name of the produced artifact.
    pub unit_name: String,
    /// Source files in the order they should reach the emitter.
    pub inputs: Vec<PathBuf>,
    pub classifier: Classifier,
    pub references: Vec<PathBuf>,
    pub resources: Vec<Resource>,
    pub env: TransformEnv,
    /// `None` disables the content cache.
    pub cache_dir: Option<PathBuf>,
    pub outputs: OutputTargets,
    /// Extension modules to run, in order, by registered name.
    pub module_order: Vec<String>,
    /// Transformation worker count; `None` sizes to available parallelism.
    pub pool_size: Option<usize>,
}

impl CompileOptions {
    pub fn new(
        unit_name: impl Into<String>,
        inputs: Vec<PathBuf>,
        classifier: Classifier,
        outputs: OutputTargets,
    ) -> Self {
        Self {
            unit_name: unit_name.into(),
            inputs,
            classifier,
            references: Vec::new(),
            resources: Vec::new(),
            env: TransformEnv::default(),
            cache_dir: None,
            outputs,
            module_order: Vec::new(),
            pool_size: None,
        }
    }
}

/// What one run produced. Serializable for machine-readable reporting.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// The run finished, emission succeeded, and no blocking diagnostic
    /// was recorded.
    pub success: bool,
    /// Output paths written, empty unless `success`.
    pub written: Vec<PathBuf>,
    /// Every diagnostic recorded during the run, in arrival order.
    pub diagnostics: Vec<Diagnostic>,
}

type DiagnosticReporter = Box<dyn Fn(&Diagnostic) + Send + Sync>;

/// The orchestrator. Holds the run-independent collaborators; per-run
/// state lives in [`CompileOptions`] and the report.
pub struct Precompiler {
    engine: Arc<dyn TemplateEngine>,
    emitter: Arc<dyn Emitter>,
    analyzer: Option<Arc<dyn Analyzer>>,
    registry: ModuleRegistry,
    transform_hooks: TransformHooks,
    reporter: Option<DiagnosticReporter>,
    /// Signal for the next run. Tokens never reset, so each run takes this
    /// one and a fresh token is installed in its place.
    cancel: Mutex<CancelToken>,
}

impl Precompiler {
    pub fn new(engine: Arc<dyn TemplateEngine>, emitter: Arc<dyn Emitter>) -> Self {
        Self {
            engine,
            emitter,
            analyzer: None,
            registry: ModuleRegistry::new(),
            transform_hooks: TransformHooks::default(),
            reporter: None,
            cancel: Mutex::new(CancelToken::new()),
        }
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_registry(mut self, registry: ModuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_transform_hooks(mut self, hooks: TransformHooks) -> Self {
        self.transform_hooks = hooks;
        self
    }

    /// Receive each reportable diagnostic as soon as the run finalizes.
    pub fn with_reporter(mut self, reporter: impl Fn(&Diagnostic) + Send + Sync + 'static) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Handle for cancelling the next run. A run keeps the token it started
    /// with, so cancelling one run never affects the runs after it.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute one compilation run to completion.
    ///
    /// Never panics: internal faults are converted into an
    /// [`codes::INTERNAL_ERROR`] diagnostic on a failed report.
    pub fn run(&self, options: &CompileOptions) -> RunReport {
        let sink = DiagnosticSink::new();
        let cancel = std::mem::replace(
            &mut *self.cancel.lock().unwrap_or_else(PoisonError::into_inner),
            CancelToken::new(),
        );
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_inner(options, &cancel, &sink)));

        let (success, written) = match outcome {
            Ok(Ok(finished)) => finished,
            Ok(Err(err)) => {
                sink.push(Diagnostic::error(
                    codes::INTERNAL_ERROR,
                    format!("compilation aborted: {err:#}"),
                ));
                (false, Vec::new())
            }
            Err(_) => {
                sink.push(Diagnostic::error(
                    codes::INTERNAL_ERROR,
                    "compilation aborted by an unexpected fault",
                ));
                (false, Vec::new())
            }
        };

        let diagnostics = sink.snapshot();
        if let Some(reporter) = &self.reporter {
            for diagnostic in diagnostics.iter().filter(|d| d.is_reportable()) {
                reporter(diagnostic);
            }
        }
        RunReport {
            success,
            written,
            diagnostics,
        }
    }

    fn run_inner(
        &self,
        options: &CompileOptions,
        cancel: &CancelToken,
        sink: &DiagnosticSink,
    ) -> Result<(bool, Vec<PathBuf>)> {
        let transformer = Arc::new(
            Transformer::new(self.engine.clone(), options.env.clone())
                .with_hooks(self.transform_hooks.clone()),
        );
        let cache = Arc::new(ContentCache::from_config(options.cache_dir.as_deref()));
        let pool = match options.pool_size {
            Some(size) => {
                TransformPool::with_size(transformer, cache, sink.clone(), cancel.clone(), size)
            }
            None => TransformPool::new(transformer, cache, sink.clone(), cancel.clone()),
        };

        let loader = SourceLoader::new(options.classifier.clone(), sink.clone());
        let loaded = loader.load(&options.inputs, pool)?;

        if cancel.is_cancelled() {
            if loaded.cancelled == 0 {
                sink.push(Diagnostic::warning(codes::CANCELLED, "compilation cancelled"));
            }
            return Ok((false, Vec::new()));
        }
        if loaded.sources.is_empty() && !options.inputs.is_empty() {
            sink.push(Diagnostic::error(
                codes::NO_SOURCES,
                "no usable sources remain after loading",
            ));
            return Ok((false, Vec::new()));
        }

        let modules = self.registry.resolve(&options.module_order, sink);
        if modules.len() != options.module_order.len() {
            // resolve() reported each unknown name.
            return Ok((false, Vec::new()));
        }
        let pipeline = ExtensionPipeline::new(modules);

        let mut unit = CompilationUnit::new(options.unit_name.clone(), loaded.sources)
            .with_references(options.references.clone());
        unit.resources = options.resources.clone();

        if let Err(err) = pipeline.before_assembly(&mut unit, sink) {
            sink.push(hook_failure(&err));
            return Ok((false, Vec::new()));
        }

        // Analysis sees the unit the modules produced and runs while the
        // emitter works.
        let unit = Arc::new(unit);
        let analysis = self
            .analyzer
            .clone()
            .map(|analyzer| AnalysisTask::spawn(analyzer, unit.clone(), cancel.clone()));

        let emitted = self.emitter.emit(&unit);
        if let Some(task) = analysis {
            task.join(sink);
        }
        let mut output = emitted.wrap_err("emitter fault")?;
        sink.extend(output.diagnostics.drain(..));

        if !output.success || sink.has_blocking() || cancel.is_cancelled() {
            return Ok((false, Vec::new()));
        }

        if let Err(err) = pipeline.after_emission(&unit, &mut output, sink) {
            sink.push(hook_failure(&err));
            return Ok((false, Vec::new()));
        }
        if sink.has_blocking() {
            return Ok((false, Vec::new()));
        }

        let written = emit::flush(&output, &options.outputs).wrap_err("failed to write outputs")?;
        Ok((true, written))
    }
}

fn hook_failure(err: &HookError) -> Diagnostic {
    Diagnostic::error(codes::HOOK_FAILED, err.to_string())
}

use eyre::Report;
use kiln_core::DiagnosticSink;
use thiserror::Error;

use super::context::{AfterContext, BeforeContext};
use super::module::{CompileModule, HookPhase};
use crate::emit::{CompilationUnit, EmitOutput};

/// A module hook returned an error; the run stops here.
#[derive(Debug, Error)]
#[error("compile module '{module}' failed in {hook} hook: {reason}")]
pub struct HookError {
    pub module: String,
    pub hook: HookPhase,
    pub reason: Report,
}

/// Runs the configured modules in order, fail-fast.
pub struct ExtensionPipeline {
    modules: Vec<Box<dyn CompileModule>>,
}

impl ExtensionPipeline {
    pub fn new(modules: Vec<Box<dyn CompileModule>>) -> Self {
        Self { modules }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Run every `before_assembly` hook against `unit`, in order.
    pub fn before_assembly(
        &self,
        unit: &mut CompilationUnit,
        sink: &DiagnosticSink,
    ) -> Result<(), HookError> {
        for module in &self.modules {
            let mut ctx = BeforeContext {
                unit: &mut *unit,
                sink,
            };
            module
                .before_assembly(&mut ctx)
                .map_err(|reason| HookError {
                    module: module.name().to_string(),
                    hook: HookPhase::BeforeAssembly,
                    reason,
                })?;
        }
        Ok(())
    }

    /// Run every `after_emission` hook against the emitted streams.
    pub fn after_emission(
        &self,
        unit: &CompilationUnit,
        output: &mut EmitOutput,
        sink: &DiagnosticSink,
    ) -> Result<(), HookError> {
        for module in &self.modules {
            let mut ctx = AfterContext {
                unit,
                output: &mut *output,
                sink,
            };
            module
                .after_emission(&mut ctx)
                .map_err(|reason| HookError {
                    module: module.name().to_string(),
                    hook: HookPhase::AfterEmission,
                    reason,
                })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use eyre::eyre;
    use kiln_core::{LoadedSource, SourceKind};

    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        fail_before: bool,
    }

    impl CompileModule for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        fn before_assembly(&self, _ctx: &mut BeforeContext<'_>) -> eyre::Result<()> {
            self.log.lock().unwrap().push(format!("before:{}", self.name));
            if self.fail_before {
                return Err(eyre!("module exploded"));
            }
            Ok(())
        }

        fn after_emission(&self, _ctx: &mut AfterContext<'_>) -> eyre::Result<()> {
            self.log.lock().unwrap().push(format!("after:{}", self.name));
            Ok(())
        }
    }

    struct SourceInjector;

    impl CompileModule for SourceInjector {
        fn name(&self) -> &str {
            "injector"
        }

        fn before_assembly(&self, ctx: &mut BeforeContext<'_>) -> eyre::Result<()> {
            ctx.unit.sources.push(LoadedSource {
                path: "injected.src".into(),
                kind: SourceKind::Native,
                text: "injected".into(),
            });
            Ok(())
        }
    }

    fn recorder(
        name: &'static str,
        log: &Arc<Mutex<Vec<String>>>,
        fail_before: bool,
    ) -> Box<dyn CompileModule> {
        Box::new(Recorder {
            name,
            log: log.clone(),
            fail_before,
        })
    }

    #[test]
    fn failure_stops_the_chain_and_names_the_module() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = ExtensionPipeline::new(vec![
            recorder("alpha", &log, false),
            recorder("beta", &log, true),
            recorder("gamma", &log, false),
        ]);
        let mut unit = CompilationUnit::new("app", Vec::new());
        let sink = DiagnosticSink::new();

        let err = pipeline.before_assembly(&mut unit, &sink).unwrap_err();

        assert_eq!(err.module, "beta");
        assert_eq!(err.hook, HookPhase::BeforeAssembly);
        assert_eq!(
            err.to_string(),
            "compile module 'beta' failed in before_assembly hook: module exploded"
        );
        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["before:alpha", "before:beta"]
        );
    }

    #[test]
    fn hooks_run_in_configured_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = ExtensionPipeline::new(vec![
            recorder("alpha", &log, false),
            recorder("beta", &log, false),
        ]);
        let mut unit = CompilationUnit::new("app", Vec::new());
        let mut output = EmitOutput::default();
        let sink = DiagnosticSink::new();

        pipeline.before_assembly(&mut unit, &sink).unwrap();
        pipeline.after_emission(&unit, &mut output, &sink).unwrap();

        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["before:alpha", "before:beta", "after:alpha", "after:beta"]
        );
    }

    #[test]
    fn before_hook_can_rewrite_the_unit() {
        let pipeline = ExtensionPipeline::new(vec![Box::new(SourceInjector)]);
        let mut unit = CompilationUnit::new("app", Vec::new());
        let sink = DiagnosticSink::new();

        pipeline.before_assembly(&mut unit, &sink).unwrap();

        assert_eq!(unit.sources.len(), 1);
        assert_eq!(unit.sources[0].text, "injected");
    }
}

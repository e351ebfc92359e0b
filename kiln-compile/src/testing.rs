//! Scripted collaborators for exercising the compilation pipeline.
//!
//! Available to this crate's own tests and, behind the `testing` feature,
//! to downstream crates that need a runnable pipeline without a real
//! backend.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use eyre::{Result, eyre};
use kiln_core::{Diagnostic, TransformEnv};

use crate::cancel::CancelToken;
use crate::emit::{CompilationUnit, EmitOutput, Emitter};
use crate::pipeline::{AfterContext, BeforeContext, CompileModule};
use crate::transform::{EngineError, Expansion, TemplateEngine};

/// Engine that wraps the template body in `gen(..)` and counts calls.
#[derive(Default)]
pub struct EchoEngine {
    pub calls: AtomicUsize,
}

impl TemplateEngine for EchoEngine {
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

/// Engine that rejects any template containing `!err`.
pub struct StrictEngine;

impl TemplateEngine for StrictEngine {
    fn expand(
        &self,
        _origin: &Path,
        text: &str,
        _env: &TransformEnv,
        _cancel: &CancelToken,
    ) -> Result<Expansion, EngineError> {
        if text.contains("!err") {
            return Err(EngineError::new("template contains '!err'"));
        }
        Ok(Expansion {
            text: text.to_string(),
            diagnostics: Vec::new(),
        })
    }
}

/// Emitter that concatenates source texts into the binary stream.
///
/// Emission fails (with a diagnostic) when any source contains `!emitfail`.
#[derive(Default)]
pub struct ConcatEmitter {
    pub calls: AtomicUsize,
}

impl Emitter for ConcatEmitter {
    fn emit(&self, unit: &CompilationUnit) -> Result<EmitOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut diagnostics = Vec::new();
        for source in &unit.sources {
            if source.text.contains("!emitfail") {
                diagnostics.push(Diagnostic::error(
                    "TEST01",
                    format!("cannot compile '{}'", source.path.display()),
                ));
            }
        }
        let success = diagnostics.is_empty();
        let binary = unit
            .sources
            .iter()
            .flat_map(|s| s.text.bytes().chain(std::iter::once(b'\n')))
            .collect();
        Ok(EmitOutput {
            success,
            binary: if success { binary } else { Vec::new() },
            symbols: Vec::new(),
            docs: Vec::new(),
            diagnostics,
        })
    }
}

/// Module that records hook invocations and optionally fails one hook.
pub struct ScriptedModule {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail_before: bool,
    pub fail_after: bool,
}

impl ScriptedModule {
    pub fn passing(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            log: log.clone(),
            fail_before: false,
            fail_after: false,
        }
    }
}

impl CompileModule for ScriptedModule {
    fn name(&self) -> &str {
        self.name
    }

    fn before_assembly(&self, _ctx: &mut BeforeContext<'_>) -> Result<()> {
        self.log.lock().unwrap().push(format!("before:{}", self.name));
        if self.fail_before {
            return Err(eyre!("scripted before_assembly failure"));
        }
        Ok(())
    }

    fn after_emission(&self, _ctx: &mut AfterContext<'_>) -> Result<()> {
        self.log.lock().unwrap().push(format!("after:{}", self.name));
        if self.fail_after {
            return Err(eyre!("scripted after_emission failure"));
        }
        Ok(())
    }
}

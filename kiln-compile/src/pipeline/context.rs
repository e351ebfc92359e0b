use kiln_core::DiagnosticSink;

use crate::emit::{CompilationUnit, EmitOutput};

/// What a module sees before the unit is emitted.
pub struct BeforeContext<'a> {
    /// The unit about to be compiled; modules may rewrite it in place.
    pub unit: &'a mut CompilationUnit,
    /// Shared diagnostic stream for non-fatal module findings.
    pub sink: &'a DiagnosticSink,
}

/// What a module sees after emission, before outputs are flushed.
pub struct AfterContext<'a> {
    pub unit: &'a CompilationUnit,
    /// Emitted streams; modules may rewrite them (e.g. post-processing
    /// the binary) before they reach disk.
    pub output: &'a mut EmitOutput,
    pub sink: &'a DiagnosticSink,
}

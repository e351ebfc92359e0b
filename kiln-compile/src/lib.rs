//! Compilation orchestration for Kiln.
//!
//! This crate ties the pieces of a precompilation run together: the
//! [`SourceLoader`] classifies and reads the input set, the
//! [`TransformPool`] expands template sources through a pluggable
//! [`TemplateEngine`] with content-addressed caching, the extension
//! [`pipeline`] lets external modules rewrite the unit and its outputs,
//! and the [`Precompiler`] drives the whole run with staged emission and
//! uniform diagnostic reporting.
//!
//! The backend compiler, the template engine, and any analyzers are
//! collaborators behind traits; this crate supplies the policy around
//! them, not the languages themselves.

pub mod analysis;
pub mod cache;
pub mod cancel;
pub mod emit;
pub mod loader;
pub mod orchestrator;
pub mod pipeline;
pub mod pool;
pub mod transform;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use analysis::{AnalysisError, AnalysisTask, Analyzer};
pub use cache::ContentCache;
pub use cancel::CancelToken;
pub use emit::{CompilationUnit, EmitOutput, Emitter, OutputTargets, Resource, flush};
pub use loader::{LoadReport, SourceLoader};
pub use orchestrator::{CompileOptions, Precompiler, RunReport};
pub use pipeline::{
    AfterContext, BeforeContext, CompileModule, ExtensionPipeline, HookError, HookPhase,
    ModuleRegistry,
};
pub use pool::{ResultSlot, TransformOutcome, TransformPool};
pub use transform::{
    EngineError, Expansion, TRANSFORM_VERSION, TemplateEngine, TransformHooks, TransformOutput,
    Transformer, provenance_header,
};

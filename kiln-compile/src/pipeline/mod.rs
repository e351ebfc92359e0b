//! Extension module pipeline.
//!
//! Modules are external extensions that run around emission: each gets a
//! hook before the unit is assembled into an artifact and a hook after the
//! output streams exist but before they are flushed. Modules run in the
//! configured order and the pipeline is fail-fast; a failed hook stops the
//! run with an error naming the module and the hook.

mod context;
mod module;
mod registry;
mod runner;

pub use context::{AfterContext, BeforeContext};
pub use module::{CompileModule, HookPhase};
pub use registry::{ModuleFactory, ModuleRegistry};
pub use runner::{ExtensionPipeline, HookError};

use std::fmt;

use eyre::Result;

use super::context::{AfterContext, BeforeContext};

/// Which extension hook was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPhase {
    BeforeAssembly,
    AfterEmission,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeforeAssembly => write!(f, "before_assembly"),
            Self::AfterEmission => write!(f, "after_emission"),
        }
    }
}

/// An extension that participates in a compilation run.
///
/// Both hooks default to no-ops so a module can implement only the side
/// it cares about. Hooks may mutate their context freely; returning an
/// error aborts the run.
pub trait CompileModule: Send + Sync {
    /// Stable name used in configuration and in failure reports.
    fn name(&self) -> &str;

    /// Runs after loading, before the unit is handed to the emitter.
    /// May rewrite the unit, including replacing its source list.
    fn before_assembly(&self, ctx: &mut BeforeContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }

    /// Runs after the emitter produced output streams, before anything is
    /// flushed to disk. May rewrite the streams.
    fn after_emission(&self, ctx: &mut AfterContext<'_>) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

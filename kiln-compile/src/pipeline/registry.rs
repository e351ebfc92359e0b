use indexmap::IndexMap;
use kiln_core::{Diagnostic, DiagnosticSink, codes};

use super::module::CompileModule;

/// Creates a fresh module instance per run.
pub type ModuleFactory = Box<dyn Fn() -> Box<dyn CompileModule> + Send + Sync>;

/// Known extension modules, looked up by configured name.
///
/// Resolution failures are diagnostics rather than hard errors so that a
/// single run can report every unknown name at once.
#[derive(Default)]
pub struct ModuleRegistry {
    factories: IndexMap<String, ModuleFactory>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module under `name`, replacing any previous entry.
    pub fn register(
        mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn CompileModule> + Send + Sync + 'static,
    ) -> Self {
        self.factories.insert(name.into(), Box::new(factory));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the modules named by `order`, preserving that order.
    ///
    /// Every unknown name produces one Error on the sink; known modules
    /// are still instantiated so the report covers the whole list.
    pub fn resolve(&self, order: &[String], sink: &DiagnosticSink) -> Vec<Box<dyn CompileModule>> {
        let mut modules = Vec::with_capacity(order.len());
        for name in order {
            match self.factories.get(name) {
                Some(factory) => modules.push(factory()),
                None => sink.push(Diagnostic::error(
                    codes::MODULE_INIT_FAILED,
                    format!("unknown compile module '{name}'"),
                )),
            }
        }
        modules
    }
}

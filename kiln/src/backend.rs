//! The built-in backend.
//!
//! Kiln's pipeline is backend-agnostic; this module provides the stock
//! collaborators the CLI wires in: a placeholder-substituting template
//! engine, a flat-archive emitter whose symbols stream is a JSON index
//! into the binary, and the registry of built-in extension modules.

use std::path::Path;
use std::sync::Arc;

use eyre::Result;
use kiln_compile::{
    AfterContext, CancelToken, CompilationUnit, CompileModule, CompileOptions, EmitOutput, Emitter,
    EngineError, Expansion, ModuleRegistry, OutputTargets, TemplateEngine,
};
use kiln_config::Manifest;
use kiln_core::{SourceLocation, TransformEnv};

pub fn engine() -> Arc<dyn TemplateEngine> {
    Arc::new(PassthroughEngine)
}

pub fn emitter() -> Arc<dyn Emitter> {
    Arc::new(ArchiveEmitter)
}

/// Built-in extension modules, addressable from `[modules] order`.
pub fn registry() -> ModuleRegistry {
    ModuleRegistry::new().register("source-list", || Box::new(SourceListModule))
}

/// Assemble per-run options from a parsed manifest.
pub fn compile_options(manifest: &Manifest, jobs: Option<usize>) -> CompileOptions {
    let mut options = CompileOptions::new(
        manifest.unit.name.clone(),
        manifest.sources.include.clone(),
        manifest.classifier(),
        OutputTargets {
            binary: manifest.output.binary.clone(),
            symbols: manifest.output.symbols.clone(),
            docs: manifest.output.docs.clone(),
        },
    );
    options.references = manifest.references.paths.clone();
    options.env = manifest.transform_env();
    options.cache_dir = manifest.cache.dir.clone();
    options.module_order = manifest.modules.order.clone();
    options.pool_size = jobs;
    options
}

/// Expands `@{name}` placeholders from the transform environment and
/// prefixes one `import` line per configured import.
struct PassthroughEngine;

impl TemplateEngine for PassthroughEngine {
    fn expand(
        &self,
        origin: &Path,
        text: &str,
        env: &TransformEnv,
        cancel: &CancelToken,
    ) -> Result<Expansion, EngineError> {
        let mut out = String::with_capacity(text.len());
        for import in &env.imports {
            out.push_str("import ");
            out.push_str(import);
            out.push('\n');
        }
        for (index, line) in text.lines().enumerate() {
            if cancel.is_cancelled() {
                return Err(EngineError::new("expansion cancelled"));
            }
            let line_no = index as u32 + 1;
            out.push_str(&substitute(line, env).map_err(|err| {
                EngineError::new(err.message)
                    .at(SourceLocation::point(origin, line_no, err.column as u32 + 1))
            })?);
            out.push('\n');
        }
        Ok(Expansion {
            text: out,
            diagnostics: Vec::new(),
        })
    }
}

#[derive(Debug)]
struct SubstituteError {
    message: String,
    /// Zero-based column of the offending placeholder.
    column: usize,
}

fn substitute(line: &str, env: &TransformEnv) -> Result<String, SubstituteError> {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    let mut consumed = 0;
    while let Some(start) = rest.find("@{") {
        out.push_str(&rest[..start]);
        let at = consumed + start;
        let Some(end) = rest[start..].find('}') else {
            return Err(SubstituteError {
                message: "unterminated placeholder".to_string(),
                column: at,
            });
        };
        let name = &rest[start + 2..start + end];
        let value = match name {
            "namespace" => env.namespace.clone(),
            "base_class" => env.base_class.clone(),
            "backend" => env.backend.clone(),
            "indent" => " ".repeat(env.tab_size as usize),
            other => {
                return Err(SubstituteError {
                    message: format!("unknown placeholder '@{{{other}}}'"),
                    column: at,
                });
            }
        };
        out.push_str(&value);
        rest = &rest[start + end + 1..];
        consumed = at + end + 1;
    }
    out.push_str(rest);
    Ok(out)
}

/// Concatenates sources into the binary stream; the symbols stream is a
/// JSON index of each source's byte range.
struct ArchiveEmitter;

impl Emitter for ArchiveEmitter {
    fn emit(&self, unit: &CompilationUnit) -> Result<EmitOutput> {
        let mut binary = Vec::new();
        let mut index = Vec::new();
        for source in &unit.sources {
            index.push(serde_json::json!({
                "path": source.path,
                "offset": binary.len(),
                "len": source.text.len(),
            }));
            binary.extend_from_slice(source.text.as_bytes());
            binary.push(b'\n');
        }
        let symbols = serde_json::to_vec_pretty(&serde_json::json!({
            "unit": unit.name,
            "sources": index,
        }))?;
        Ok(EmitOutput {
            success: true,
            binary,
            symbols,
            docs: Vec::new(),
            diagnostics: Vec::new(),
        })
    }
}

/// Writes a plain listing of compiled source paths into the docs stream.
struct SourceListModule;

impl CompileModule for SourceListModule {
    fn name(&self) -> &str {
        "source-list"
    }

    fn after_emission(&self, ctx: &mut AfterContext<'_>) -> Result<()> {
        let mut listing = String::new();
        for source in &ctx.unit.sources {
            listing.push_str(&source.path.display().to_string());
            listing.push('\n');
        }
        ctx.output.docs = listing.into_bytes();
        Ok(())
    }
}

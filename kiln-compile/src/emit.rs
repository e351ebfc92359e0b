//! Compilation unit assembly and staged emission.
//!
//! The backend compiler sits behind the [`Emitter`] trait. Emission is
//! staged: the emitter produces in-memory output streams, and nothing
//! touches the output paths until the whole run has been judged
//! successful. A failed run leaves prior outputs untouched.

use std::path::PathBuf;

use eyre::Result;
use kiln_core::{Diagnostic, LoadedSource};

/// An embedded non-source asset carried through to the emitter.
#[derive(Debug, Clone)]
pub struct Resource {
    pub name: String,
    pub data: Vec<u8>,
}

/// Everything the backend needs to produce one output artifact.
#[derive(Debug, Clone)]
pub struct CompilationUnit {
    /// Logical name of the produced artifact.
    pub name: String,
    /// Usable sources in input order, templates already expanded.
    pub sources: Vec<LoadedSource>,
    /// Paths of referenced, previously built artifacts.
    pub references: Vec<PathBuf>,
    pub resources: Vec<Resource>,
}

impl CompilationUnit {
    pub fn new(name: impl Into<String>, sources: Vec<LoadedSource>) -> Self {
        Self {
            name: name.into(),
            sources,
            references: Vec::new(),
            resources: Vec::new(),
        }
    }

    pub fn with_references(mut self, references: Vec<PathBuf>) -> Self {
        self.references = references;
        self
    }
}

/// In-memory output streams produced by the emitter.
///
/// An empty stream means "this emitter does not produce that artifact";
/// empty streams are never flushed to disk.
#[derive(Debug, Default)]
pub struct EmitOutput {
    pub success: bool,
    pub binary: Vec<u8>,
    pub symbols: Vec<u8>,
    pub docs: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Where finalized streams land on disk.
#[derive(Debug, Clone)]
pub struct OutputTargets {
    pub binary: PathBuf,
    pub symbols: Option<PathBuf>,
    pub docs: Option<PathBuf>,
}

impl OutputTargets {
    pub fn binary_only(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            symbols: None,
            docs: None,
        }
    }
}

/// Backend capability: compile one unit into output streams.
///
/// Emitters report compilation problems as diagnostics inside
/// [`EmitOutput`]; an `Err` is reserved for infrastructure faults.
pub trait Emitter: Send + Sync {
    fn emit(&self, unit: &CompilationUnit) -> Result<EmitOutput>;
}

/// Write every non-empty stream to its target, creating parent
/// directories as needed. Returns the paths actually written.
///
/// Callers invoke this only after the run has been judged successful.
pub fn flush(output: &EmitOutput, targets: &OutputTargets) -> std::io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();
    let streams = [
        (Some(&targets.binary), &output.binary),
        (targets.symbols.as_ref(), &output.symbols),
        (targets.docs.as_ref(), &output.docs),
    ];
    for (target, stream) in streams {
        let Some(target) = target else { continue };
        if stream.is_empty() {
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(target, stream)?;
        written.push(target.clone());
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn flush_skips_empty_streams() {
        let temp = TempDir::new().unwrap();
        let targets = OutputTargets {
            binary: temp.path().join("out/app.bin"),
            symbols: Some(temp.path().join("out/app.sym")),
            docs: Some(temp.path().join("out/app.docs")),
        };
        let output = EmitOutput {
            success: true,
            binary: b"binary".to_vec(),
            symbols: Vec::new(),
            docs: b"docs".to_vec(),
            diagnostics: Vec::new(),
        };

        let written = flush(&output, &targets).unwrap();

        assert_eq!(written, vec![targets.binary.clone(), targets.docs.clone().unwrap()]);
        assert!(targets.binary.exists());
        assert!(!targets.symbols.as_ref().unwrap().exists());
        assert_eq!(std::fs::read(targets.docs.unwrap()).unwrap(), b"docs");
    }

    #[test]
    fn flush_without_configured_side_targets_writes_binary_only() {
        let temp = TempDir::new().unwrap();
        let targets = OutputTargets::binary_only(temp.path().join("app.bin"));
        let output = EmitOutput {
            success: true,
            binary: b"binary".to_vec(),
            symbols: b"ignored".to_vec(),
            docs: Vec::new(),
            diagnostics: Vec::new(),
        };

        let written = flush(&output, &targets).unwrap();
        assert_eq!(written, vec![targets.binary]);
    }
}

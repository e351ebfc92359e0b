//! Diagnostic types for the precompilation run.
//!
//! Every condition a run encounters, from per-file load failures to hook
//! faults, is reported as a [`Diagnostic`] with a stable code and a
//! severity. The overall success of a run is derived from the collected
//! diagnostics, never from control flow alone.

use std::path::PathBuf;

use serde::Serialize;

/// The diagnostic category shared by all orchestrator-produced diagnostics.
///
/// Diagnostics forwarded from the external compile/emit capability keep
/// whatever category that capability assigns.
pub const CATEGORY: &str = "kiln";

/// Stable diagnostic codes.
///
/// These identify the condition independently of the message text, so tests
/// and downstream tooling can match on them.
pub mod codes {
    /// An extension module could not be resolved or instantiated.
    pub const MODULE_INIT_FAILED: &str = "KL001";
    /// An input file had an extension with no configured kind.
    pub const UNKNOWN_FILE_TYPE: &str = "KL002";
    /// Template expansion failed (engine error or unexpected fault).
    pub const EXPANSION_FAILED: &str = "KL003";
    /// An input file does not exist.
    pub const SOURCE_NOT_FOUND: &str = "KL004";
    /// An input file exists but could not be read.
    pub const SOURCE_UNREADABLE: &str = "KL005";
    /// An input file contained binary content where text was expected.
    pub const BINARY_SOURCE: &str = "KL006";
    /// A cache entry could not be written; the run continues uncached.
    pub const CACHE_WRITE_FAILED: &str = "KL007";
    /// A partially written cache entry could not be removed.
    pub const CACHE_CLEANUP_FAILED: &str = "KL008";
    /// Work was cancelled before or during execution.
    pub const CANCELLED: &str = "KL009";
    /// The static analysis task failed with an unexpected fault.
    pub const ANALYSIS_FAILED: &str = "KL010";
    /// An unexpected fault escaped a pipeline step.
    pub const INTERNAL_ERROR: &str = "KL011";
    /// No usable sources remained after loading.
    pub const NO_SOURCES: &str = "KL012";
    /// An extension module hook failed; the run is aborted.
    pub const HOOK_FAILED: &str = "KL013";
}

/// Severity level for a diagnostic message.
///
/// The derived ordering is significant: `Hidden < Info < Warning < Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    /// Informational/telemetry only; never rendered to the user.
    Hidden,
    /// Informational message about the run.
    Info,
    /// A problem that doesn't block output on its own.
    Warning,
    /// A failure; any non-suppressed error blocks durable output.
    Error,
}

impl Severity {
    /// Returns true if this is an error severity.
    pub fn is_error(&self) -> bool {
        matches!(self, Severity::Error)
    }

    /// Returns true if this is a warning severity.
    pub fn is_warning(&self) -> bool {
        matches!(self, Severity::Warning)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Hidden => write!(f, "hidden"),
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A location in an original source file.
///
/// For diagnostics raised against generated text this always points into
/// the origin template, never the intermediate generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    /// Path of the file the diagnostic refers to.
    pub path: PathBuf,
    /// 1-based start line.
    pub line: u32,
    /// 1-based start column.
    pub column: u32,
    /// 1-based end line.
    pub end_line: u32,
    /// 1-based end column.
    pub end_column: u32,
}

impl SourceLocation {
    /// A location covering a single point.
    pub fn point(path: impl Into<PathBuf>, line: u32, column: u32) -> Self {
        Self {
            path: path.into(),
            line,
            column,
            end_line: line,
            end_column: column,
        }
    }

    /// A location naming a whole file, with no span information.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::point(path, 1, 1)
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.path.display(), self.line, self.column)
    }
}

/// A diagnostic message from the precompilation run.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Stable code identifying the condition (see [`codes`]).
    pub code: &'static str,
    /// Producer category, [`CATEGORY`] for orchestrator diagnostics.
    pub category: &'static str,
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The diagnostic message.
    pub message: String,
    /// Optional location in an original source file.
    pub location: Option<SourceLocation>,
    /// Suppressed diagnostics never block output and are not rendered.
    pub suppressed: bool,
}

impl Diagnostic {
    fn new(code: &'static str, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            category: CATEGORY,
            severity,
            message: message.into(),
            location: None,
            suppressed: false,
        }
    }

    /// Create a new error diagnostic.
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Warning, message)
    }

    /// Create a new info diagnostic.
    pub fn info(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Info, message)
    }

    /// Create a new hidden diagnostic.
    pub fn hidden(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(code, Severity::Hidden, message)
    }

    /// Attach a location to this diagnostic.
    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }

    /// Mark this diagnostic as suppressed.
    pub fn suppress(mut self) -> Self {
        self.suppressed = true;
        self
    }

    /// Whether this diagnostic blocks durable output.
    pub fn is_blocking(&self) -> bool {
        self.severity.is_error() && !self.suppressed
    }

    /// Whether this diagnostic should be rendered to the user.
    pub fn is_reportable(&self) -> bool {
        self.severity > Severity::Hidden && !self.suppressed
    }
}

impl std::fmt::Display for Diagnostic {
    /// Renders exactly one line; embedded newlines in the message are
    /// folded to spaces.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(loc) = &self.location {
            write!(f, "{}: ", loc)?;
        }
        write!(f, "{} {}: ", self.severity, self.code)?;
        let mut first = true;
        for part in self.message.split('\n') {
            if !first {
                write!(f, " ")?;
            }
            write!(f, "{}", part.trim_end_matches('\r'))?;
            first = false;
        }
        Ok(())
    }
}

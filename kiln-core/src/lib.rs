//! Core types for the Kiln precompiler.
//!
//! This crate holds the leaf vocabulary shared by the whole workspace:
//! diagnostics and their severity taxonomy, the thread-safe diagnostic
//! sink, the source model (kinds, classification, decoding), and the
//! content-addressed cache key.

mod diagnostic;
mod key;
mod sink;
mod source;

pub use diagnostic::{CATEGORY, Diagnostic, Severity, SourceLocation, codes};
pub use key::{CacheKey, TransformEnv};
pub use sink::DiagnosticSink;
pub use source::{
    Classifier, GeneratedSource, LoadedSource, SourceArtifact, SourceError, SourceKind,
    TextEncoding, decode_text,
};

//! Source model: kinds, classification, artifacts, and text decoding.

use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use crate::diagnostic::{Diagnostic, SourceLocation, codes};
use crate::key::CacheKey;

/// How a source file participates in the compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SourceKind {
    /// Directly compilable, no transformation required.
    Native,
    /// Requires template expansion into compilable text first.
    Template,
}

/// Maps file extensions to source kinds.
///
/// Rules are matched case-insensitively against the final extension and
/// kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: IndexMap<String, SourceKind>,
}

impl Classifier {
    /// Create a classifier with no rules; every path is unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule mapping `ext` (without the leading dot) to a kind.
    ///
    /// A later rule for the same extension replaces the earlier one.
    pub fn with_rule(mut self, ext: impl Into<String>, kind: SourceKind) -> Self {
        self.rules.insert(ext.into().to_ascii_lowercase(), kind);
        self
    }

    /// Classify a path by its extension; `None` means unknown.
    pub fn classify(&self, path: &Path) -> Option<SourceKind> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        self.rules.get(&ext).copied()
    }
}

/// Detected text encoding of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TextEncoding {
    Utf8,
    /// UTF-8 with a byte-order mark.
    Utf8Bom,
    Utf16Le,
    Utf16Be,
}

/// Why a source file could not be loaded.
///
/// The three variants are deliberately distinct: tests (and users) need to
/// tell "not found" from "found but unreadable" from "found but not text".
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read '{path}': {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("binary content in '{path}' where text was expected")]
    BinaryContent { path: PathBuf },
}

impl SourceError {
    /// The diagnostic this error is reported as.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (code, path) = match self {
            SourceError::NotFound { path } => (codes::SOURCE_NOT_FOUND, path),
            SourceError::Unreadable { path, .. } => (codes::SOURCE_UNREADABLE, path),
            SourceError::BinaryContent { path } => (codes::BINARY_SOURCE, path),
        };
        Diagnostic::error(code, self.to_string()).at(SourceLocation::file(path))
    }
}

/// Decode raw file bytes into text, honoring a byte-order mark.
///
/// Without a BOM the bytes must be strict UTF-8; NUL bytes are taken as
/// evidence of binary content even when they decode.
pub fn decode_text(path: &Path, bytes: &[u8]) -> Result<(String, TextEncoding), SourceError> {
    fn binary(path: &Path) -> SourceError {
        SourceError::BinaryContent {
            path: path.to_path_buf(),
        }
    }

    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        let text = std::str::from_utf8(rest).map_err(|_| binary(path))?;
        if text.contains('\0') {
            return Err(binary(path));
        }
        return Ok((text.to_string(), TextEncoding::Utf8Bom));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let text = decode_utf16(rest, u16::from_le_bytes).ok_or_else(|| binary(path))?;
        return Ok((text, TextEncoding::Utf16Le));
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let text = decode_utf16(rest, u16::from_be_bytes).ok_or_else(|| binary(path))?;
        return Ok((text, TextEncoding::Utf16Be));
    }

    let text = std::str::from_utf8(bytes).map_err(|_| binary(path))?;
    if text.contains('\0') {
        return Err(binary(path));
    }
    Ok((text.to_string(), TextEncoding::Utf8))
}

fn decode_utf16(bytes: &[u8], combine: fn([u8; 2]) -> u16) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| combine([pair[0], pair[1]]))
        .collect();
    let text = String::from_utf16(&units).ok()?;
    if text.contains('\0') {
        return None;
    }
    Some(text)
}

/// A classified input file, loaded and decoded exactly once.
#[derive(Debug, Clone)]
pub struct SourceArtifact {
    /// Identity of the artifact.
    pub path: PathBuf,
    pub kind: SourceKind,
    /// Decoded text content.
    pub text: String,
    pub encoding: TextEncoding,
}

impl SourceArtifact {
    /// Read and decode the file at `path`.
    pub fn load(path: &Path, kind: SourceKind) -> Result<Self, SourceError> {
        let bytes = std::fs::read(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SourceError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                SourceError::Unreadable {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let (text, encoding) = decode_text(path, &bytes)?;
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            text,
            encoding,
        })
    }
}

/// Compilable text produced by expanding a template source.
///
/// `origin` is the original template path (never an intermediate path) so
/// downstream diagnostics can be mapped back to the file the user wrote.
#[derive(Debug, Clone)]
pub struct GeneratedSource {
    pub origin: PathBuf,
    pub text: String,
    /// The key this result is (or would be) cached under.
    pub key: CacheKey,
}

/// One entry of the merged source collection handed to the orchestrator.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    /// For generated sources this is the origin template path.
    pub path: PathBuf,
    pub kind: SourceKind,
    pub text: String,
}

impl LoadedSource {
    pub fn native(artifact: SourceArtifact) -> Self {
        Self {
            path: artifact.path,
            kind: SourceKind::Native,
            text: artifact.text,
        }
    }

    pub fn generated(source: GeneratedSource) -> Self {
        Self {
            path: source.origin,
            kind: SourceKind::Template,
            text: source.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_matches_extension_case_insensitively() {
        let classifier = Classifier::new()
            .with_rule("cs", SourceKind::Native)
            .with_rule("cshtml", SourceKind::Template);

        assert_eq!(
            classifier.classify(Path::new("src/Program.cs")),
            Some(SourceKind::Native)
        );
        assert_eq!(
            classifier.classify(Path::new("Views/Home.CSHTML")),
            Some(SourceKind::Template)
        );
        assert_eq!(classifier.classify(Path::new("readme.xyz")), None);
        assert_eq!(classifier.classify(Path::new("no_extension")), None);
    }

    #[test]
    fn decode_plain_utf8() {
        let (text, enc) = decode_text(Path::new("a.cs"), "hello".as_bytes()).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(enc, TextEncoding::Utf8);
    }

    #[test]
    fn decode_strips_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("hi".as_bytes());
        let (text, enc) = decode_text(Path::new("a.cs"), &bytes).unwrap();
        assert_eq!(text, "hi");
        assert_eq!(enc, TextEncoding::Utf8Bom);
    }

    #[test]
    fn decode_utf16_little_endian() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "ok".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let (text, enc) = decode_text(Path::new("a.cs"), &bytes).unwrap();
        assert_eq!(text, "ok");
        assert_eq!(enc, TextEncoding::Utf16Le);
    }

    #[test]
    fn nul_bytes_are_binary() {
        let err = decode_text(Path::new("a.cs"), b"he\0llo").unwrap_err();
        assert!(matches!(err, SourceError::BinaryContent { .. }));
    }

    #[test]
    fn invalid_utf8_is_binary() {
        let err = decode_text(Path::new("a.cs"), &[0x80, 0xFF, 0x01]).unwrap_err();
        assert!(matches!(err, SourceError::BinaryContent { .. }));
    }

    #[test]
    fn load_missing_file_is_not_found() {
        let err =
            SourceArtifact::load(Path::new("/nonexistent/q.cs"), SourceKind::Native).unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
        assert_eq!(err.to_diagnostic().code, codes::SOURCE_NOT_FOUND);
    }

    #[test]
    fn load_directory_is_unreadable() {
        let temp = tempfile::TempDir::new().unwrap();
        let err = SourceArtifact::load(temp.path(), SourceKind::Native).unwrap_err();
        assert!(matches!(err, SourceError::Unreadable { .. }));
        assert_eq!(err.to_diagnostic().code, codes::SOURCE_UNREADABLE);
    }

    #[test]
    fn load_binary_file_is_distinct() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("blob.cs");
        std::fs::write(&path, [0u8, 159, 146, 150]).unwrap();
        let err = SourceArtifact::load(&path, SourceKind::Native).unwrap_err();
        assert!(matches!(err, SourceError::BinaryContent { .. }));
        assert_eq!(err.to_diagnostic().code, codes::BINARY_SOURCE);
    }
}

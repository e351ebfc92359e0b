//! Content-addressed cache keys for template transformation results.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Configuration consumed opaquely by the template transformer.
///
/// Every field here can change the generated output, so every field is
/// hashed into the [`CacheKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformEnv {
    /// Target language backend identifier.
    pub backend: String,
    /// Namespace the generated type is placed in.
    pub namespace: String,
    /// Base class of the generated type.
    pub base_class: String,
    /// Tab size used when rendering generated code.
    pub tab_size: u32,
    /// Imports injected into every generated source.
    pub imports: Vec<String>,
}

/// Deterministic hash over everything that can affect generated output.
///
/// Two transformation requests with equal keys yield byte-identical
/// generated source. The origin path is part of the key: byte-identical
/// templates at different paths occupy distinct cache entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for one transformation request.
    ///
    /// `version` is a logical marker for the transformer itself; bumping it
    /// invalidates all prior entries. Fields are length-prefixed so that
    /// adjacent inputs cannot collide by concatenation.
    pub fn compute(origin: &Path, version: &str, content: &[u8], env: &TransformEnv) -> Self {
        let mut hasher = Sha256::new();
        let mut field = |bytes: &[u8]| {
            hasher.update((bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        };
        field(origin.to_string_lossy().as_bytes());
        field(version.as_bytes());
        field(content);
        field(env.backend.as_bytes());
        field(env.namespace.as_bytes());
        field(env.base_class.as_bytes());
        field(&env.tab_size.to_le_bytes());
        for import in &env.imports {
            field(import.as_bytes());
        }
        drop(field);
        CacheKey(format!("{:x}", hasher.finalize()))
    }

    /// The key rendered as lowercase hex, usable as a file name.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

//! kiln.toml parsing and validation.
//!
//! A manifest names the compilation unit, lists its sources and how their
//! extensions map to source kinds, and carries the output, cache,
//! transform, and module settings a run needs. Parsing and validation
//! errors render as [`miette`] diagnostics pointing into the manifest
//! text.
//!
//! ```ignore
//! let manifest = kiln_config::Manifest::from_file("kiln.toml")?;
//! let classifier = manifest.classifier();
//! ```

mod error;
mod manifest;
mod validate;

pub use error::{Error, Result};
pub use manifest::{
    CacheConfig, FILE_NAME, KindRules, Manifest, ModulesConfig, OutputConfig, ReferencesConfig,
    SourcesConfig, TransformConfig, UnitConfig,
};

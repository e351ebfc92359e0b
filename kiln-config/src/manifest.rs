use std::path::{Path, PathBuf};
use std::str::FromStr;

use kiln_core::{Classifier, SourceKind, TransformEnv};
use serde::Deserialize;

use crate::{Error, Result};

/// Default manifest file name.
pub const FILE_NAME: &str = "kiln.toml";

/// Root manifest for kiln.toml
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// The compilation unit being produced
    pub unit: UnitConfig,

    /// Which files to compile and how to classify them
    pub sources: SourcesConfig,

    /// Previously built artifacts the unit links against
    #[serde(default)]
    pub references: ReferencesConfig,

    /// Where finished outputs land
    pub output: OutputConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Settings visible to the template engine
    #[serde(default)]
    pub transform: TransformConfig,

    /// Extension modules, run in listed order
    #[serde(default)]
    pub modules: ModulesConfig,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UnitConfig {
    /// Logical name of the produced artifact
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourcesConfig {
    /// Input files, in the order they reach the compiler
    pub include: Vec<PathBuf>,
    #[serde(default)]
    pub kinds: KindRules,
}

/// Extension lists mapping files to source kinds.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KindRules {
    #[serde(default)]
    pub native: Vec<String>,
    #[serde(default)]
    pub template: Vec<String>,
}

impl Default for KindRules {
    fn default() -> Self {
        Self {
            native: vec!["src".to_string()],
            template: vec!["tpl".to_string()],
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReferencesConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    pub binary: PathBuf,
    pub symbols: Option<PathBuf>,
    pub docs: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Directory for the generated-source cache; omit to disable caching
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformConfig {
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub base_class: String,
    #[serde(default = "default_tab_size")]
    pub tab_size: u32,
    #[serde(default)]
    pub imports: Vec<String>,
}

fn default_tab_size() -> u32 {
    4
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            backend: String::new(),
            namespace: String::new(),
            base_class: String::new(),
            tab_size: default_tab_size(),
            imports: Vec::new(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModulesConfig {
    #[serde(default)]
    pub order: Vec<String>,
}

impl FromStr for Manifest {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_str_with_filename(s, FILE_NAME)
    }
}

impl Manifest {
    /// Parse a kiln.toml file from the given path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Box::new(Error::Io {
                path: path.to_path_buf(),
                source: e,
            })
        })?;
        Self::from_str_with_filename(&content, &path.display().to_string())
    }

    /// Parse a kiln.toml from a string with a custom filename for error reporting
    pub fn from_str_with_filename(content: &str, filename: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| Error::parse(e, content, filename))?;
        manifest.validate(content, filename)?;
        Ok(manifest)
    }

    /// Build the extension classifier from the kind rules.
    ///
    /// Template rules win over native ones for the same extension, but
    /// validation rejects that overlap before this is reachable.
    pub fn classifier(&self) -> Classifier {
        let mut classifier = Classifier::new();
        for ext in &self.sources.kinds.native {
            classifier = classifier.with_rule(ext, SourceKind::Native);
        }
        for ext in &self.sources.kinds.template {
            classifier = classifier.with_rule(ext, SourceKind::Template);
        }
        classifier
    }

    /// The transformation environment the template engine sees.
    pub fn transform_env(&self) -> TransformEnv {
        TransformEnv {
            backend: self.transform.backend.clone(),
            namespace: self.transform.namespace.clone(),
            base_class: self.transform.base_class.clone(),
            tab_size: self.transform.tab_size,
            imports: self.transform.imports.clone(),
        }
    }
}

//! Template transformation.
//!
//! The template engine itself is an external collaborator behind the
//! [`TemplateEngine`] trait; the [`Transformer`] wraps it with the policy
//! the orchestrator relies on: no panic ever escapes, failures become
//! located diagnostics, and every generated source carries a provenance
//! annotation pointing back at the original template file.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;
use std::sync::Arc;

use kiln_core::{CacheKey, Diagnostic, GeneratedSource, SourceLocation, TransformEnv, codes};
use thiserror::Error;

use crate::cancel::CancelToken;

/// Logical version of the transformation layer, hashed into every cache
/// key so that upgrading the transformer invalidates prior entries.
pub const TRANSFORM_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Successful output of a template engine.
#[derive(Debug)]
pub struct Expansion {
    /// The generated, compilable source text (without provenance header).
    pub text: String,
    /// Non-fatal diagnostics the engine wants reported.
    pub diagnostics: Vec<Diagnostic>,
}

/// A template engine failure with the engine's own error location.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct EngineError {
    pub message: String,
    /// Precise location in the template, when the engine knows it.
    pub location: Option<SourceLocation>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: SourceLocation) -> Self {
        self.location = Some(location);
        self
    }
}

/// External capability: expand one template document into source text.
///
/// Implementations must be deterministic for identical
/// `(origin, text, env)` and should return promptly once `cancel` fires.
pub trait TemplateEngine: Send + Sync {
    fn expand(
        &self,
        origin: &Path,
        text: &str,
        env: &TransformEnv,
        cancel: &CancelToken,
    ) -> Result<Expansion, EngineError>;
}

/// Explicit callbacks around expansion, registered per run.
#[derive(Clone, Default)]
pub struct TransformHooks {
    /// Invoked with the origin path before the engine runs.
    pub before_expand: Option<Arc<dyn Fn(&Path) + Send + Sync>>,
    /// Invoked with the origin path and generated text after expansion.
    pub after_generate: Option<Arc<dyn Fn(&Path, &str) + Send + Sync>>,
}

/// The provenance annotation embedded at the top of every generated source.
pub fn provenance_header(origin: &Path) -> String {
    format!("// @generated from {}", origin.display())
}

/// Result of one transformation attempt.
pub struct TransformOutput {
    /// `None` when expansion failed; the diagnostics say why.
    pub generated: Option<GeneratedSource>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Wraps the external template engine with failure containment and
/// provenance annotation.
pub struct Transformer {
    engine: Arc<dyn TemplateEngine>,
    env: TransformEnv,
    hooks: TransformHooks,
}

impl Transformer {
    pub fn new(engine: Arc<dyn TemplateEngine>, env: TransformEnv) -> Self {
        Self {
            engine,
            env,
            hooks: TransformHooks::default(),
        }
    }

    /// Register expansion callbacks.
    pub fn with_hooks(mut self, hooks: TransformHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn env(&self) -> &TransformEnv {
        &self.env
    }

    /// The cache key for transforming `text` found at `origin`.
    pub fn cache_key(&self, origin: &Path, text: &str) -> CacheKey {
        CacheKey::compute(origin, TRANSFORM_VERSION, text.as_bytes(), &self.env)
    }

    /// Expand one template. Never panics and never throws: malformed input
    /// and engine faults alike come back as diagnostics.
    pub fn transform(&self, origin: &Path, text: &str, cancel: &CancelToken) -> TransformOutput {
        if let Some(before) = &self.hooks.before_expand {
            before(origin);
        }

        let result = catch_unwind(AssertUnwindSafe(|| {
            self.engine.expand(origin, text, &self.env, cancel)
        }));

        match result {
            Ok(Ok(expansion)) => {
                let generated_text = format!("{}\n{}", provenance_header(origin), expansion.text);
                if let Some(after) = &self.hooks.after_generate {
                    after(origin, &generated_text);
                }
                TransformOutput {
                    generated: Some(GeneratedSource {
                        origin: origin.to_path_buf(),
                        key: self.cache_key(origin, text),
                        text: generated_text,
                    }),
                    diagnostics: expansion.diagnostics,
                }
            }
            Ok(Err(err)) => {
                let location = err
                    .location
                    .clone()
                    .unwrap_or_else(|| SourceLocation::file(origin));
                TransformOutput {
                    generated: None,
                    diagnostics: vec![
                        Diagnostic::error(
                            codes::EXPANSION_FAILED,
                            format!("template expansion failed: {err}"),
                        )
                        .at(location),
                    ],
                }
            }
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                TransformOutput {
                    generated: None,
                    diagnostics: vec![
                        Diagnostic::error(
                            codes::EXPANSION_FAILED,
                            format!("template expansion failed: {detail}"),
                        )
                        .at(SourceLocation::file(origin)),
                    ],
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected fault in template engine".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct UpperEngine;

    impl TemplateEngine for UpperEngine {
        fn expand(
            &self,
            _origin: &Path,
            text: &str,
            _env: &TransformEnv,
            _cancel: &CancelToken,
        ) -> Result<Expansion, EngineError> {
            Ok(Expansion {
                text: text.to_uppercase(),
                diagnostics: Vec::new(),
            })
        }
    }

    struct ParseFailEngine;

    impl TemplateEngine for ParseFailEngine {
        fn expand(
            &self,
            origin: &Path,
            _text: &str,
            _env: &TransformEnv,
            _cancel: &CancelToken,
        ) -> Result<Expansion, EngineError> {
            Err(EngineError::new("unexpected '}'").at(SourceLocation::point(origin, 7, 3)))
        }
    }

    struct PanickingEngine;

    impl TemplateEngine for PanickingEngine {
        fn expand(
            &self,
            _origin: &Path,
            _text: &str,
            _env: &TransformEnv,
            _cancel: &CancelToken,
        ) -> Result<Expansion, EngineError> {
            panic!("engine blew up");
        }
    }

    fn transformer(engine: impl TemplateEngine + 'static) -> Transformer {
        Transformer::new(Arc::new(engine), TransformEnv::default())
    }

    #[test]
    fn generated_source_carries_provenance() {
        let out = transformer(UpperEngine).transform(
            Path::new("views/home.tpl"),
            "hello",
            &CancelToken::new(),
        );
        let generated = out.generated.unwrap();
        assert_eq!(generated.origin, Path::new("views/home.tpl"));
        assert!(
            generated
                .text
                .starts_with("// @generated from views/home.tpl\n")
        );
        assert!(generated.text.ends_with("HELLO"));
    }

    #[test]
    fn deterministic_for_identical_input() {
        let transformer = transformer(UpperEngine);
        let token = CancelToken::new();
        let a = transformer.transform(Path::new("v.tpl"), "x", &token);
        let b = transformer.transform(Path::new("v.tpl"), "x", &token);
        assert_eq!(a.generated.unwrap().text, b.generated.unwrap().text);
    }

    #[test]
    fn parse_failure_keeps_engine_location() {
        let out = transformer(ParseFailEngine).transform(
            Path::new("views/broken.tpl"),
            "{",
            &CancelToken::new(),
        );
        assert!(out.generated.is_none());
        let diag = &out.diagnostics[0];
        assert_eq!(diag.code, codes::EXPANSION_FAILED);
        let loc = diag.location.as_ref().unwrap();
        assert_eq!((loc.line, loc.column), (7, 3));
    }

    #[test]
    fn engine_panic_becomes_diagnostic() {
        let out = transformer(PanickingEngine).transform(
            Path::new("views/evil.tpl"),
            "",
            &CancelToken::new(),
        );
        assert!(out.generated.is_none());
        let diag = &out.diagnostics[0];
        assert_eq!(diag.code, codes::EXPANSION_FAILED);
        assert!(diag.message.contains("engine blew up"));
    }

    #[test]
    fn hooks_fire_around_expansion() {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let before = seen.clone();
        let after = seen.clone();
        let transformer = transformer(UpperEngine).with_hooks(TransformHooks {
            before_expand: Some(Arc::new(move |path| {
                before.lock().unwrap().push(format!("before {}", path.display()));
            })),
            after_generate: Some(Arc::new(move |path, _text| {
                after.lock().unwrap().push(format!("after {}", path.display()));
            })),
        });

        transformer.transform(Path::new("v.tpl"), "x", &CancelToken::new());
        let events = seen.lock().unwrap();
        assert_eq!(events.as_slice(), ["before v.tpl", "after v.tpl"]);
    }
}

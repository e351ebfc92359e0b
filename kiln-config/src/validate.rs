use miette::SourceSpan;

use crate::{Manifest, Result};
use crate::error::Error;

impl Manifest {
    /// Validate the manifest after parsing
    pub(crate) fn validate(&self, src: &str, filename: &str) -> Result<()> {
        if self.unit.name.trim().is_empty() {
            return Err(Error::validation(
                "unit name must not be empty",
                src,
                filename,
            ));
        }
        if self.sources.include.is_empty() {
            return Err(Error::validation(
                "[sources] include must list at least one file",
                src,
                filename,
            ));
        }
        if self.transform.tab_size == 0 {
            return Err(Error::validation_or_span(
                "tab_size must be at least 1",
                src,
                filename,
                find_span(src, "tab_size"),
            ));
        }

        for ext in &self.sources.kinds.template {
            let ext = ext.to_ascii_lowercase();
            if self
                .sources
                .kinds
                .native
                .iter()
                .any(|native| native.eq_ignore_ascii_case(&ext))
            {
                return Err(Error::ambiguous_kind(
                    &ext,
                    src,
                    filename,
                    find_second_span(src, &ext),
                ));
            }
        }
        Ok(())
    }
}

impl Error {
    fn validation_or_span(
        message: impl Into<String>,
        src: &str,
        filename: &str,
        span: Option<SourceSpan>,
    ) -> Box<Self> {
        match span {
            Some(span) => Self::validation_at(message, src, filename, span),
            None => Self::validation(message, src, filename),
        }
    }
}

/// Byte span of the first occurrence of `needle` in the source.
fn find_span(src: &str, needle: &str) -> Option<SourceSpan> {
    src.find(needle).map(|start| (start, needle.len()).into())
}

/// Byte span of the second quoted occurrence of `needle`.
fn find_second_span(src: &str, needle: &str) -> Option<SourceSpan> {
    let quoted = format!("\"{needle}\"");
    let first = src.find(&quoted)?;
    let rest = first + quoted.len();
    src[rest..]
        .find(&quoted)
        .map(|offset| (rest + offset, quoted.len()).into())
}

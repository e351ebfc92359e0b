//! Durable content-addressed cache for generated sources.
//!
//! Entries are keyed by [`CacheKey`] rendered as a file name. The cache is
//! purely a memoization layer: a miss always produces behavior identical
//! to a hit, just slower, and no cache failure may fail the build.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use kiln_core::{CacheKey, Diagnostic, DiagnosticSink, SourceLocation, codes};

/// How many times to retry deleting a partially written entry.
const CLEANUP_ATTEMPTS: u32 = 10;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Durable storage for generated source text.
///
/// Without a configured directory every lookup is a miss and nothing is
/// stored. Population is first-writer-wins: entries land via temp file +
/// rename, so concurrent writers of the same key never observe each
/// other's partial writes and neither reports a conflict.
#[derive(Debug, Clone)]
pub struct ContentCache {
    dir: Option<PathBuf>,
}

impl ContentCache {
    /// A cache that stores nothing and never hits.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    /// A cache rooted at `dir`, created if absent.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).ok();
        Self { dir: Some(dir) }
    }

    /// From an optional configuration value.
    pub fn from_config(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::at(dir),
            None => Self::disabled(),
        }
    }

    /// Whether a directory is configured.
    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    fn entry_path(&self, key: &CacheKey) -> Option<PathBuf> {
        self.dir.as_ref().map(|d| d.join(format!("{}.gen", key.as_hex())))
    }

    /// Look up previously generated text. Corrupt entries are removed and
    /// reported as a miss.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let path = self.entry_path(key)?;
        let bytes = std::fs::read(&path).ok()?;
        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(_) => {
                // Invalidate rather than serve garbage.
                std::fs::remove_file(&path).ok();
                None
            }
        }
    }

    /// Store generated text under `key`.
    ///
    /// Failures never fail the build: a failed write is a Warning naming
    /// the origin file and the cache path, followed by bounded-backoff
    /// deletion of the partial entry; only an uncleanable partial entry
    /// escalates to an Error (it would poison future runs).
    pub fn put(&self, key: &CacheKey, text: &str, origin: &Path, sink: &DiagnosticSink) {
        let Some(path) = self.entry_path(key) else {
            return;
        };
        if path.exists() {
            // Someone else won the race; their content is identical.
            return;
        }

        let temp = path.with_extension(format!(
            "tmp.{}.{}",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        let result = std::fs::write(&temp, text).and_then(|()| std::fs::rename(&temp, &path));
        if let Err(err) = result {
            sink.push(
                Diagnostic::warning(
                    codes::CACHE_WRITE_FAILED,
                    format!(
                        "failed to write cache entry '{}' for '{}': {}",
                        path.display(),
                        origin.display(),
                        err
                    ),
                )
                .at(SourceLocation::file(origin)),
            );
            self.cleanup_partial(&temp, origin, sink);
            self.cleanup_partial(&path, origin, sink);
        }
    }

    fn cleanup_partial(&self, path: &Path, origin: &Path, sink: &DiagnosticSink) {
        if !path.exists() {
            return;
        }
        for attempt in 1..=CLEANUP_ATTEMPTS {
            if std::fs::remove_file(path).is_ok() || !path.exists() {
                return;
            }
            std::thread::sleep(Duration::from_millis(u64::from(attempt)));
        }
        sink.push(
            Diagnostic::error(
                codes::CACHE_CLEANUP_FAILED,
                format!(
                    "could not remove partial cache entry '{}' for '{}'; delete it manually",
                    path.display(),
                    origin.display()
                ),
            )
            .at(SourceLocation::file(origin)),
        );
    }
}

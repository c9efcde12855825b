//! Glob-based file selection for multi-file merges.
//!
//! A [`Fileset`] pairs a base directory with include and exclude glob
//! patterns, matched against paths relative to the base. Scanning walks the
//! tree in sorted order so the resulting candidate list is deterministic.

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::error::MergeError;

/// A base directory plus include/exclude glob patterns.
#[derive(Debug, Clone)]
pub struct Fileset {
    base: PathBuf,
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl Fileset {
    /// Create a fileset rooted at `base`. Without any include pattern every
    /// file under the base matches.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            includes: Vec::new(),
            excludes: Vec::new(),
        }
    }

    /// Add an include pattern, e.g. `conf/**/*.ini`.
    #[must_use]
    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.includes.push(pattern.into());
        self
    }

    /// Add an exclude pattern. Excludes win over includes.
    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    /// The base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Collect the matching files, sorted by path.
    ///
    /// A missing base directory yields an empty list rather than an error,
    /// matching the treatment of absent config files elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidTask`] for an unparseable glob pattern
    /// and [`MergeError::Io`] for directory walk failures.
    pub fn scan(&self) -> Result<Vec<PathBuf>, MergeError> {
        if !self.base.is_dir() {
            tracing::debug!(base = %self.base.display(), "fileset base absent");
            return Ok(Vec::new());
        }
        let includes = build_globset(&self.includes)?;
        let excludes = build_globset(&self.excludes)?;

        let mut matches = Vec::new();
        for entry in WalkDir::new(&self.base).sort_by_file_name() {
            let entry =
                entry.map_err(|e| MergeError::io(&self.base, "walking fileset base", e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.base) else {
                continue;
            };
            let included = self.includes.is_empty() || includes.is_match(relative);
            if included && !excludes.is_match(relative) {
                matches.push(entry.into_path());
            }
        }
        tracing::debug!(base = %self.base.display(), count = matches.len(), "fileset scanned");
        Ok(matches)
    }
}

/// Compile patterns into one matcher. Literal path separators in a pattern
/// must match real separators, so `*.ini` stays top-level only.
fn build_globset(patterns: &[String]) -> Result<GlobSet, MergeError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| MergeError::InvalidTask(format!("bad glob pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MergeError::InvalidTask(format!("cannot compile glob set: {e}")))
}

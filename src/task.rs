//! Merge task orchestration.
//!
//! A [`MergeTask`] binds the moving parts together: which files to merge,
//! in which format, with which patch flags and edit instructions. Tasks are
//! built once with the chained setters, validated before any file is
//! touched, and consumed by [`MergeTask::run`].
//!
//! Two flows share the same pipeline. The pairwise flow patches one new
//! file from one old file. The multi-file flow (any task with filesets)
//! folds every candidate file into a single result first. Either way the
//! destination is produced by exactly one atomic write.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::atomic::write_atomic;
use crate::entry::ConfigEntry;
use crate::error::{EntryError, MergeError};
use crate::fileset::Fileset;
use crate::format::{Format, FormatOptions};
use crate::merge::{PatchFlags, VariableResolver, apply_entries, structural_patch};
use crate::model::ConfigModel;
use crate::registry::{DEFAULT_REG_TIMEOUT, RegistrySource};

/// One file merge: old + patch → destination.
pub struct MergeTask {
    old_path: Option<PathBuf>,
    patch_path: PathBuf,
    dest_path: Option<PathBuf>,
    format: Format,
    format_options: FormatOptions,
    entries: Vec<ConfigEntry>,
    flags: PatchFlags,
    create: bool,
    overwrite: bool,
    cleanup: bool,
    fail_on_error: bool,
    filesets: Vec<Fileset>,
    resolver: Option<VariableResolver>,
}

impl MergeTask {
    /// Create a task that patches `patch_path` in place.
    #[must_use]
    pub fn new(format: Format, patch_path: impl Into<PathBuf>) -> Self {
        Self {
            old_path: None,
            patch_path: patch_path.into(),
            dest_path: None,
            format,
            format_options: FormatOptions::default(),
            entries: Vec::new(),
            flags: PatchFlags::default(),
            create: true,
            overwrite: true,
            cleanup: false,
            fail_on_error: true,
            filesets: Vec::new(),
            resolver: None,
        }
    }

    /// The old configuration to preserve data from.
    #[must_use]
    pub fn old(mut self, path: impl Into<PathBuf>) -> Self {
        self.old_path = Some(path.into());
        self
    }

    /// Write the result here instead of back to the patch file.
    #[must_use]
    pub fn dest(mut self, path: impl Into<PathBuf>) -> Self {
        self.dest_path = Some(path.into());
        self
    }

    /// Formatting options for reading and writing.
    #[must_use]
    pub fn format_options(mut self, options: FormatOptions) -> Self {
        self.format_options = options;
        self
    }

    /// Add one edit instruction. Entries run in insertion order, after the
    /// structural patch.
    #[must_use]
    pub fn entry(mut self, entry: ConfigEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// The structural patch policy.
    #[must_use]
    pub fn patch_flags(mut self, flags: PatchFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Whether to start from an empty model when the patch file is absent
    /// (default: true). With this off an absent patch file is an I/O error.
    #[must_use]
    pub fn create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Whether an existing destination may be replaced (default: true).
    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Whether to delete the input files after a successful merge
    /// (default: false). The destination itself is never deleted.
    #[must_use]
    pub fn cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Whether a failure aborts a batch run (default: true). With this off
    /// the batch logs the failure and moves on.
    #[must_use]
    pub fn fail_on_error(mut self, fail_on_error: bool) -> Self {
        self.fail_on_error = fail_on_error;
        self
    }

    /// Add a fileset of additional merge candidates. Any fileset switches
    /// the task to the multi-file flow.
    #[must_use]
    pub fn fileset(mut self, fileset: Fileset) -> Self {
        self.filesets.push(fileset);
        self
    }

    /// Variable resolver for preserved values (used with
    /// [`PatchFlags::resolve_variables`]).
    #[must_use]
    pub fn resolver(mut self, resolver: VariableResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Check the task configuration without touching any file.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::InvalidTask`] for flag combinations that can
    /// never produce output and [`MergeError::Entry`] for invalid entries,
    /// including a missing section on a sectioned format.
    pub fn validate(&self) -> Result<(), MergeError> {
        if !self.overwrite && !self.create {
            return Err(MergeError::InvalidTask(
                "both overwrite and create are disabled, the task can never write".to_string(),
            ));
        }
        for entry in &self.entries {
            entry.validate()?;
            if self.format.supports_sections() && entry.section().is_none() {
                return Err(EntryError::MissingSection {
                    key: entry.key().to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Run the merge.
    ///
    /// # Errors
    ///
    /// Returns the first [`MergeError`] encountered; on any error the
    /// destination file keeps its previous content.
    pub fn run(self) -> Result<(), MergeError> {
        self.validate()?;
        if let Some(old) = &self.old_path
            && same_file(old, &self.patch_path)
        {
            tracing::warn!(
                path = %self.patch_path.display(),
                "old and patch file are the same, skipping merge"
            );
            return Ok(());
        }
        if self.filesets.is_empty() {
            self.run_pairwise()
        } else {
            self.run_reduced()
        }
    }

    fn run_pairwise(self) -> Result<(), MergeError> {
        if !self.patch_path.exists() && !self.create {
            return Err(MergeError::io(
                &self.patch_path,
                "patch file absent and file creation disabled",
                std::io::ErrorKind::NotFound.into(),
            ));
        }
        let old = match &self.old_path {
            Some(path) => self.format.read(path, &self.format_options)?,
            None => ConfigModel::new(),
        };
        let mut result = self.format.read(&self.patch_path, &self.format_options)?;

        structural_patch(&old, &mut result, &self.flags, self.resolver.as_ref());
        apply_entries(
            &self.entries,
            Some(&old),
            &mut result,
            &self.flags,
            self.resolver.as_ref(),
        )?;

        let dest = self.dest_path.clone().unwrap_or_else(|| self.patch_path.clone());
        write_atomic(&dest, self.overwrite, |out| {
            self.format
                .write_to(&result, out, &self.format_options)
                .map_err(|e| MergeError::io(&dest, "serializing merge result", e))
        })?;
        tracing::debug!(dest = %dest.display(), "merge complete");

        if self.cleanup {
            let inputs = self.old_path.iter().chain(Some(&self.patch_path));
            remove_inputs(inputs, &dest)?;
        }
        Ok(())
    }

    /// Fold every candidate file into one result, then apply the entries.
    fn run_reduced(self) -> Result<(), MergeError> {
        let dest = self.dest_path.clone().unwrap_or_else(|| self.patch_path.clone());
        let candidates = self.collect_candidates(&dest)?;
        if candidates.len() < 2 {
            tracing::warn!(
                dest = %dest.display(),
                found = candidates.len(),
                "fewer than two merge candidates, skipping merge"
            );
            return Ok(());
        }
        tracing::debug!(count = candidates.len(), dest = %dest.display(), "folding candidates");

        let mut iter = candidates.iter();
        let first = iter
            .next()
            .unwrap_or_else(|| unreachable!("candidate count checked above"));
        let mut acc = self.format.read(first, &self.format_options)?;
        // The oldest candidate doubles as the Keep source for the entries.
        let keep_source = acc.clone();
        for path in iter {
            let mut next = self.format.read(path, &self.format_options)?;
            structural_patch(&acc, &mut next, &self.flags, self.resolver.as_ref());
            acc = next;
        }
        apply_entries(
            &self.entries,
            Some(&keep_source),
            &mut acc,
            &self.flags,
            self.resolver.as_ref(),
        )?;

        write_atomic(&dest, self.overwrite, |out| {
            self.format
                .write_to(&acc, out, &self.format_options)
                .map_err(|e| MergeError::io(&dest, "serializing merge result", e))
        })?;
        tracing::debug!(dest = %dest.display(), "merge complete");

        if self.cleanup {
            remove_inputs(candidates.iter(), &dest)?;
        }
        Ok(())
    }

    /// Merge candidates in precedence order: explicit source, patch file,
    /// pre-existing destination, then fileset matches. Duplicates of an
    /// earlier candidate are dropped.
    fn collect_candidates(&self, dest: &Path) -> Result<Vec<PathBuf>, MergeError> {
        let mut candidates: Vec<PathBuf> = Vec::new();
        let push = |path: PathBuf, candidates: &mut Vec<PathBuf>| {
            if path.is_file() && !candidates.iter().any(|c| same_file(c, &path)) {
                candidates.push(path);
            }
        };
        if let Some(old) = &self.old_path {
            push(old.clone(), &mut candidates);
        }
        push(self.patch_path.clone(), &mut candidates);
        push(dest.to_path_buf(), &mut candidates);
        for fileset in &self.filesets {
            for path in fileset.scan()? {
                push(path, &mut candidates);
            }
        }
        Ok(candidates)
    }
}

/// One registry merge: old key + destination key, same two-phase pipeline.
pub struct RegistryMergeTask {
    source: Option<RegistrySource>,
    dest: RegistrySource,
    entries: Vec<ConfigEntry>,
    flags: PatchFlags,
    timeout: Duration,
}

impl RegistryMergeTask {
    /// Create a task targeting `dest`.
    #[must_use]
    pub fn new(dest: RegistrySource) -> Self {
        Self {
            source: None,
            dest,
            entries: Vec::new(),
            flags: PatchFlags::default(),
            timeout: DEFAULT_REG_TIMEOUT,
        }
    }

    /// The old registry data to preserve values from.
    #[must_use]
    pub fn source(mut self, source: RegistrySource) -> Self {
        self.source = Some(source);
        self
    }

    /// Add one edit instruction. For a live destination the entry's section
    /// is nested under the destination key path automatically.
    #[must_use]
    pub fn entry(mut self, entry: ConfigEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// The structural patch policy.
    #[must_use]
    pub fn patch_flags(mut self, flags: PatchFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Deadline for each `reg.exe` invocation.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the registry merge.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Registry`] for export/import failures and the
    /// usual entry and file errors otherwise.
    pub fn run(self) -> Result<(), MergeError> {
        let entries: Vec<ConfigEntry> = match &self.dest {
            RegistrySource::Live { key } => self
                .entries
                .iter()
                .map(|e| e.with_section_root(key))
                .collect(),
            RegistrySource::File(_) => self.entries.clone(),
        };
        for entry in &entries {
            entry.validate()?;
            // Registry data is always sectioned; a live destination fills
            // the section in above, a file destination cannot.
            if entry.section().is_none() {
                return Err(EntryError::MissingSection {
                    key: entry.key().to_string(),
                }
                .into());
            }
        }

        let old = match &self.source {
            Some(source) => source.read(self.timeout)?,
            None => ConfigModel::new(),
        };
        let mut result = self.dest.read(self.timeout)?;
        structural_patch(&old, &mut result, &self.flags, None);
        apply_entries(&entries, Some(&old), &mut result, &self.flags, None)?;
        self.dest.write(&result, self.timeout)
    }
}

/// Run tasks in order; per-task `fail_on_error` decides skip versus abort.
///
/// # Errors
///
/// Returns the first error of a task that has `fail_on_error` set. Tasks
/// with it clear log their failure and do not stop the batch.
pub fn run_batch(tasks: Vec<MergeTask>) -> Result<(), MergeError> {
    for task in tasks {
        let fail_on_error = task.fail_on_error;
        let dest = task
            .dest_path
            .clone()
            .unwrap_or_else(|| task.patch_path.clone());
        match task.run() {
            Ok(()) => {}
            Err(e) if !fail_on_error => {
                tracing::warn!(dest = %dest.display(), error = %e, "merge failed, continuing");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Whether two paths name the same file, resolving links and `..` where the
/// paths exist.
fn same_file(a: &Path, b: &Path) -> bool {
    let resolve = |p: &Path| dunce::canonicalize(p).unwrap_or_else(|_| p.to_path_buf());
    resolve(a) == resolve(b)
}

/// Delete input files after a successful merge, sparing the destination.
fn remove_inputs<'a>(
    inputs: impl Iterator<Item = &'a PathBuf>,
    dest: &Path,
) -> Result<(), MergeError> {
    for path in inputs {
        if same_file(path, dest) || !path.exists() {
            continue;
        }
        tracing::debug!(path = %path.display(), "removing merge input");
        std::fs::remove_file(path).map_err(|e| MergeError::io(path, "removing merge input", e))?;
    }
    Ok(())
}

//! Live Windows registry access through `reg.exe`.
//!
//! Rather than binding the registry API directly, keys are round-tripped
//! through `reg export` / `reg import` and the `.reg` text format, so the
//! same model and merge pipeline handles files and live keys identically.
//! Only available on Windows; elsewhere every live operation fails up
//! front.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::MergeError;
use crate::exec;
use crate::format::{Format, FormatOptions};
use crate::model::ConfigModel;

/// Default deadline for one `reg.exe` invocation.
pub const DEFAULT_REG_TIMEOUT: Duration = Duration::from_secs(30);

/// Where registry-format data lives: an export file on disk, or a live key.
#[derive(Debug, Clone)]
pub enum RegistrySource {
    /// A `.reg` export file.
    File(PathBuf),
    /// A live key, e.g. `HKLM\SOFTWARE\Vendor\App`.
    Live {
        /// The full root-prefixed key path.
        key: String,
    },
}

impl RegistrySource {
    /// Load the source into a model. A missing file or nonexistent live key
    /// yields an empty model.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Registry`] when `reg export` fails or is
    /// unavailable, and file errors from the `.reg` reader.
    pub fn read(&self, timeout: Duration) -> Result<ConfigModel, MergeError> {
        match self {
            Self::File(path) => Format::Reg.read(path, &FormatOptions::default()),
            Self::Live { key } => export_key(key, timeout),
        }
    }

    /// Write `model` back to the source.
    ///
    /// # Errors
    ///
    /// Returns [`MergeError::Registry`] when `reg import` fails, and file
    /// errors from the `.reg` writer.
    pub fn write(&self, model: &ConfigModel, timeout: Duration) -> Result<(), MergeError> {
        match self {
            Self::File(path) => crate::atomic::write_atomic(path, true, |out| {
                Format::Reg
                    .write_to(model, out, &FormatOptions::default())
                    .map_err(|e| MergeError::io(path, "writing registry file", e))
            }),
            Self::Live { key } => import_key(key, model, timeout),
        }
    }
}

/// Export a live key into a model via `reg export`.
fn export_key(key: &str, timeout: Duration) -> Result<ConfigModel, MergeError> {
    ensure_windows(key)?;
    let tmp = temp_reg_path(key)?;
    let tmp_text = tmp.path().to_string_lossy().into_owned();
    let result = exec::run_with_timeout("reg", &["export", key, &tmp_text, "/y"], timeout)
        .map_err(|e| registry_error(key, format!("cannot run reg export: {e}")))?
        .ok_or_else(|| registry_error(key, "reg export timed out".to_string()))?;
    if !result.success {
        // An absent key exports nothing; treat it like an absent file.
        tracing::debug!(key, stderr = %result.stderr.trim(), "reg export failed, assuming absent key");
        return Ok(ConfigModel::new());
    }
    Format::Reg.read(tmp.path(), &FormatOptions::default())
}

/// Import a model into a live key via `reg import`.
fn import_key(key: &str, model: &ConfigModel, timeout: Duration) -> Result<(), MergeError> {
    ensure_windows(key)?;
    let tmp = temp_reg_path(key)?;
    let mut file = std::fs::File::create(tmp.path())
        .map_err(|e| MergeError::io(tmp.path(), "creating registry import file", e))?;
    Format::Reg
        .write_to(model, &mut file, &FormatOptions::default())
        .map_err(|e| MergeError::io(tmp.path(), "writing registry import file", e))?;
    drop(file);

    let tmp_text = tmp.path().to_string_lossy().into_owned();
    let result = exec::run_with_timeout("reg", &["import", &tmp_text], timeout)
        .map_err(|e| registry_error(key, format!("cannot run reg import: {e}")))?
        .ok_or_else(|| registry_error(key, "reg import timed out".to_string()))?;
    if !result.success {
        return Err(registry_error(
            key,
            format!("reg import failed: {}", result.stderr.trim()),
        ));
    }
    tracing::debug!(key, "imported registry key");
    Ok(())
}

fn ensure_windows(key: &str) -> Result<(), MergeError> {
    if cfg!(windows) {
        Ok(())
    } else {
        Err(registry_error(
            key,
            "live registry access requires Windows".to_string(),
        ))
    }
}

fn temp_reg_path(key: &str) -> Result<tempfile::NamedTempFile, MergeError> {
    tempfile::Builder::new()
        .suffix(".reg")
        .tempfile()
        .map_err(|e| registry_error(key, format!("cannot create temporary file: {e}")))
}

fn registry_error(key: &str, message: String) -> MergeError {
    MergeError::Registry {
        key: key.to_string(),
        message,
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn file_source_round_trips_through_reg_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.reg");
        let mut model = ConfigModel::new();
        model
            .ensure_section(r"HKEY_CURRENT_USER\Software\App")
            .push_value("Version", "\"1.0\"");
        let source = RegistrySource::File(path.clone());
        source.write(&model, DEFAULT_REG_TIMEOUT).unwrap();
        let loaded = source.read(DEFAULT_REG_TIMEOUT).unwrap();
        assert_eq!(loaded, model);
    }

    #[test]
    fn missing_file_source_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = RegistrySource::File(dir.path().join("absent.reg"));
        assert!(source.read(DEFAULT_REG_TIMEOUT).unwrap().is_empty());
    }

    #[test]
    #[cfg(not(windows))]
    fn live_source_is_rejected_off_windows() {
        let source = RegistrySource::Live {
            key: r"HKCU\Software\App".to_string(),
        };
        let err = source.read(DEFAULT_REG_TIMEOUT).unwrap_err();
        assert!(matches!(err, MergeError::Registry { .. }));
    }
}

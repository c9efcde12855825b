//! Domain-specific error types for the merge engine.
//!
//! Internal modules return typed errors built with [`thiserror`]; callers at
//! an application boundary can convert them to [`anyhow::Error`] via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! MergeError
//! ├── Entry(EntryError) — invalid edit-instruction combinations
//! ├── InvalidTask       — task flag combinations that can never succeed
//! ├── Io                — file access, temp-file, and replace failures
//! ├── Parse             — format syntax errors with file/line context
//! └── Registry          — live registry export/import failures
//! ```
//!
//! A lookup that matches nothing is deliberately *not* an error: `Set` falls
//! back to inserting a new entry, and `Remove`/`Keep` without a match is a
//! silent no-op.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Invalid attribute combination on a [`ConfigEntry`](crate::ConfigEntry).
///
/// Always detected before any file is touched.
#[derive(Error, Debug)]
pub enum EntryError {
    /// `Decrement` has no meaning for string values.
    #[error("decrement is not supported for string entries (key: {key})")]
    DecrementString {
        /// Key of the offending entry.
        key: String,
    },

    /// Parse/format patterns only apply to integer and date values.
    #[error("pattern is not supported for string entries (key: {key})")]
    PatternString {
        /// Key of the offending entry.
        key: String,
    },

    /// A calendar unit was given for a non-date entry.
    #[error("unit is only supported for date entries (key: {key})")]
    UnitWithoutDate {
        /// Key of the offending entry.
        key: String,
    },

    /// Every entry must name the key it edits.
    #[error("entry key must not be empty")]
    EmptyKey,

    /// The target format is sectioned but the entry names no section.
    #[error("section is required for sectioned formats (key: {key})")]
    MissingSection {
        /// Key of the offending entry.
        key: String,
    },

    /// `Set` without either a value or a default can never produce output.
    #[error("\"value\" and/or \"default\" must be specified (key: {key})")]
    MissingValue {
        /// Key of the offending entry.
        key: String,
    },

    /// A regex lookup value failed to compile.
    #[error("invalid lookup pattern for key {key}")]
    BadLookupPattern {
        /// Key of the offending entry.
        key: String,
        /// Underlying regex compilation error.
        #[source]
        source: regex::Error,
    },
}

/// Top-level error type for the merge engine.
#[derive(Error, Debug)]
pub enum MergeError {
    /// An edit instruction failed validation.
    #[error("invalid entry: {0}")]
    Entry(#[from] EntryError),

    /// The task flags form a configuration that can never succeed.
    #[error("invalid merge task: {0}")]
    InvalidTask(String),

    /// An I/O error, tagged with the file it originated from.
    #[error("{}: {message}", path.display())]
    Io {
        /// File the operation was acting on.
        path: PathBuf,
        /// Human-readable description of the failing operation.
        message: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A config file could not be parsed.
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// 1-based line number of the offending line.
        line: usize,
        /// Description of the syntax error.
        message: String,
    },

    /// A live registry export/import failed or timed out.
    ///
    /// Recoverable per file when the task runs with `fail_on_error` off.
    #[error("registry operation failed for {key}: {message}")]
    Registry {
        /// Registry key path the operation targeted.
        key: String,
        /// Description of the failure.
        message: String,
    },
}

impl MergeError {
    /// Wrap an I/O error with the path and operation it belongs to.
    pub fn io(path: &Path, message: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            message: message.into(),
            source,
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn entry_error_decrement_display() {
        let e = EntryError::DecrementString {
            key: "retries".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "decrement is not supported for string entries (key: retries)"
        );
    }

    #[test]
    fn entry_error_unit_display() {
        let e = EntryError::UnitWithoutDate {
            key: "count".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "unit is only supported for date entries (key: count)"
        );
    }

    #[test]
    fn io_error_carries_path_and_source() {
        use std::error::Error as StdError;
        let e = MergeError::io(
            Path::new("/etc/app.conf"),
            "reading config file",
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert!(e.to_string().contains("/etc/app.conf"));
        assert!(e.source().is_some());
    }

    #[test]
    fn parse_error_display_has_line() {
        let e = MergeError::Parse {
            path: PathBuf::from("settings.ini"),
            line: 7,
            message: "entry outside of section".to_string(),
        };
        assert_eq!(e.to_string(), "settings.ini:7: entry outside of section");
    }

    #[test]
    fn merge_error_from_entry_error() {
        let e: MergeError = EntryError::EmptyKey.into();
        assert!(e.to_string().contains("invalid entry"));
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn error_types_are_send_sync() {
        assert_send_sync::<MergeError>();
        assert_send_sync::<EntryError>();
    }

    #[test]
    fn merge_error_converts_to_anyhow() {
        let e = MergeError::InvalidTask("overwrite and create both disabled".to_string());
        let _anyhow_err: anyhow::Error = e.into();
    }
}

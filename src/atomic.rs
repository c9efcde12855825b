//! Crash-safe destination writes.
//!
//! Output is serialized into a temporary file in the destination's
//! directory and moved into place only after the serializer finishes.
//! A failure at any point leaves an existing destination byte-for-byte
//! untouched; the temporary file is cleaned up automatically when it is
//! dropped on the error path.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::MergeError;

/// Write `serialize`'s output to `dest` atomically.
///
/// With `overwrite` false an existing destination is rejected before any
/// byte is produced.
///
/// # Errors
///
/// Returns [`MergeError::InvalidTask`] when `dest` exists and `overwrite`
/// is false, [`MergeError::Io`] for filesystem failures, and whatever
/// `serialize` itself fails with.
pub fn write_atomic(
    dest: &Path,
    overwrite: bool,
    serialize: impl FnOnce(&mut dyn Write) -> Result<(), MergeError>,
) -> Result<(), MergeError> {
    if !overwrite && dest.exists() {
        return Err(MergeError::InvalidTask(format!(
            "destination '{}' exists and overwriting is disabled",
            dest.display()
        )));
    }
    let dir = dest.parent().filter(|p| !p.as_os_str().is_empty());
    let mut tmp = match dir {
        Some(dir) => NamedTempFile::new_in(dir),
        None => NamedTempFile::new(),
    }
    .map_err(|e| MergeError::io(dest, "creating temporary output file", e))?;

    serialize(&mut tmp)?;
    tmp.flush()
        .map_err(|e| MergeError::io(dest, "flushing output", e))?;
    tmp.persist(dest)
        .map_err(|e| MergeError::io(dest, "moving output into place", e.error))?;
    tracing::debug!(path = %dest.display(), "wrote destination");
    Ok(())
}

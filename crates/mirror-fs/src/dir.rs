//! Destination directory bootstrap and probes

use std::fs;

use crate::{Error, NormalizedPath, Result};

/// Create `path` (and any missing parents) if it does not exist yet.
///
/// Fails with [`Error::NotADirectory`] when something other than a
/// directory already occupies the path.
pub fn ensure_dir(path: &NormalizedPath) -> Result<()> {
    let native = path.to_native();
    if native.exists() {
        if !native.is_dir() {
            return Err(Error::NotADirectory { path: native });
        }
        return Ok(());
    }

    fs::create_dir_all(&native).map_err(|e| Error::io(&native, e))?;
    tracing::debug!(path = %path, "Created destination directory");
    Ok(())
}

/// Returns true iff the directory contains zero entries.
///
/// Only the first entry is read, so this stays cheap for large trees.
pub fn is_empty(path: &NormalizedPath) -> Result<bool> {
    let native = path.to_native();
    let mut entries = fs::read_dir(&native).map_err(|e| Error::io(&native, e))?;
    match entries.next() {
        None => Ok(true),
        Some(Ok(_)) => Ok(false),
        Some(Err(e)) => Err(Error::io(&native, e)),
    }
}

/// Remove every entry inside `path`, keeping the directory itself.
///
/// Symlinks are removed, never followed.
pub fn clear_dir(path: &NormalizedPath) -> Result<()> {
    let native = path.to_native();
    let entries = fs::read_dir(&native).map_err(|e| Error::io(&native, e))?;

    for entry in entries {
        let entry = entry.map_err(|e| Error::io(&native, e))?;
        let entry_path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| Error::io(&entry_path, e))?;

        if file_type.is_dir() {
            fs::remove_dir_all(&entry_path).map_err(|e| Error::io(&entry_path, e))?;
        } else {
            fs::remove_file(&entry_path).map_err(|e| Error::io(&entry_path, e))?;
        }
    }

    Ok(())
}

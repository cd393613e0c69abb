//! On-disk property document store.
//!
//! Documents live next to the resource source artifact, at the source path
//! with its extension replaced by `yml`. Loading distinguishes absence
//! (`Ok(None)`) from a malformed file (`DocumentError::Parse`). Saving
//! regenerates canonical YAML layout; formatting of the previous file is not
//! preserved, only its semantic content.
//!
//! Write flow: serialize → `.propsync.tmp` sibling → `rename`. The tmp file
//! is always in the same directory as the target (same filesystem, so the
//! rename is atomic on POSIX). All operations are safe to call from multiple
//! threads as long as each thread operates on a distinct path.

use std::path::{Path, PathBuf};

use crate::error::{io_err, DocumentError};
use crate::types::{DocumentFile, FORMAT_VERSION, PROPERTY_EXTENSION};

/// Property document path paired with a resource source path.
pub fn property_path(source: &Path) -> PathBuf {
    source.with_extension(PROPERTY_EXTENSION)
}

/// Load the property document at `path`.
///
/// Returns `Ok(None)` when no file exists. Fails with
/// [`DocumentError::Parse`] on malformed YAML and
/// [`DocumentError::UnsupportedVersion`] when the format marker is not
/// [`FORMAT_VERSION`].
pub fn load(path: &Path) -> Result<Option<DocumentFile>, DocumentError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(io_err(path, err)),
    };
    let document: DocumentFile = serde_yaml::from_str(&contents).map_err(|e| {
        DocumentError::Parse {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    if document.version != FORMAT_VERSION {
        return Err(DocumentError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: document.version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(Some(document))
}

/// Atomically save `document` at `path`.
pub fn save(path: &Path, document: &DocumentFile) -> Result<(), DocumentError> {
    let yaml = serde_yaml::to_string(document)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
    }
    let tmp = PathBuf::from(format!("{}.propsync.tmp", path.display()));
    std::fs::write(&tmp, yaml).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Remove the document at `path`.
///
/// Returns `Ok(true)` when a file was removed, `Ok(false)` when none existed.
pub fn delete(path: &Path) -> Result<bool, DocumentError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(io_err(path, err)),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Root path normalization
//!
//! Every operation that filters the vector store by codebase root must use the
//! same identifier for the same directory, regardless of how the caller spelled
//! the path (trailing slash, relative segments, symlinks).

use crate::error::{IndexingError, ScoutError};
use std::path::{Component, Path, PathBuf};

/// Normalize a codebase root to its canonical absolute form.
///
/// The canonical string is stored in every point payload as the root
/// identifier, so `query`, stats and delete calls resolve to the same points
/// no matter which spelling of the path they were given. The directory must
/// exist; indexing has nothing to do otherwise.
pub fn normalize_root(path: &str) -> Result<String, ScoutError> {
    let path_ref = Path::new(path);
    if !path_ref.exists() {
        return Err(IndexingError::RootNotFound(path.to_string()).into());
    }
    if !path_ref.is_dir() {
        return Err(IndexingError::NotADirectory(path.to_string()).into());
    }

    let canonical = std::fs::canonicalize(path_ref)?;
    Ok(canonical.to_string_lossy().to_string())
}

/// Resolve a root for read and delete operations.
///
/// Canonicalizes while the directory exists. A root whose directory has since
/// been removed falls back to a lexically cleaned absolute form, so stats and
/// delete still reach the points it left in the store.
pub fn resolve_root(path: &str) -> Result<String, ScoutError> {
    if Path::new(path).exists() {
        return normalize_root(path);
    }
    lexical_absolute(Path::new(path))
}

/// Absolute form without touching the filesystem: `.` and `..` segments are
/// resolved textually and trailing slashes dropped. Symlinks are not followed,
/// so this only matches what `normalize_root` stored when the original path
/// contained none.
fn lexical_absolute(path: &Path) -> Result<String, ScoutError> {
    let mut resolved = if path.is_absolute() {
        PathBuf::new()
    } else {
        std::env::current_dir()?
    };
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                resolved.pop();
            }
            other => resolved.push(other),
        }
    }
    Ok(resolved.to_string_lossy().to_string())
}

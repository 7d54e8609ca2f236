//! Path normalization utilities.
//!
//! Provides consistent path handling across the codebase:
//! - `absolutize` - user-supplied directories (tilde expansion, cwd join)
//! - `is_contained_relative` - lexical check that a relative path stays below its base

use std::path::{Component, Path, PathBuf};

/// Make a user-supplied directory absolute without requiring it to exist.
///
/// `~` is expanded; relative paths are joined onto `cwd`.
///
/// # Example
/// ```ignore
/// let dir = absolutize("cache", Path::new("/srv"));
/// assert_eq!(dir, PathBuf::from("/srv/cache"));
/// ```
pub fn absolutize(raw: &str, cwd: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(raw);
    let path = Path::new(expanded.as_ref());
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// True when `rel` is relative and has no `..`, root or prefix components.
///
/// This is a lexical pre-check only; symlinks are handled by canonicalizing
/// and comparing against the canonical root.
pub fn is_contained_relative(rel: &Path) -> bool {
    rel.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

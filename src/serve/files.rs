//! Sandboxed file serving.
//!
//! Package assets are served from the package's resolved source tree. The
//! tree is reached through an in-memory mount table (`pkg -> root`) rather
//! than links on disk, and every lookup is confined to its root:
//!
//! 1. Lexical check: the requested path must be relative with no `..`.
//! 2. Canonical check: `canonicalize(root/requested)` must stay below
//!    `canonicalize(root)`, which also catches symlinks leading out.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use dashmap::DashMap;

use crate::debug;
use crate::error::{ServeError, ServeResult};
use crate::utils::mime;
use crate::utils::path::is_contained_relative;

/// An opened file plus what the response layer needs to describe it.
#[derive(Debug)]
pub struct ServedFile {
    pub file: File,
    pub len: u64,
    pub modified: Option<SystemTime>,
    pub content_type: &'static str,
}

/// Mount table and sandboxed open.
#[derive(Default)]
pub struct FileServer {
    mounts: DashMap<String, PathBuf>,
}

impl FileServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose `root` under `pkg`, replacing any earlier mount.
    pub fn mount(&self, pkg: &str, root: impl Into<PathBuf>) {
        let root = root.into();
        debug!("serve"; "mount {} -> {}", pkg, root.display());
        self.mounts.insert(pkg.to_string(), root);
    }

    pub fn mounted(&self, pkg: &str) -> Option<PathBuf> {
        self.mounts.get(pkg).map(|root| root.value().clone())
    }

    /// Serve `rel` from the source tree mounted under `pkg`.
    pub fn serve_mounted(&self, pkg: &str, rel: &str) -> ServeResult<ServedFile> {
        let root = self
            .mounted(pkg)
            .ok_or_else(|| ServeError::not_found(format!("{pkg}/{rel}")))?;
        self.serve(rel, &root)
    }

    /// Serve `requested` (relative) from below `root`.
    ///
    /// Errors name `requested`, never the resolved location.
    pub fn serve(&self, requested: &str, root: &Path) -> ServeResult<ServedFile> {
        let rel = Path::new(requested);
        if requested.is_empty() || !is_contained_relative(rel) {
            return Err(ServeError::traversal(requested));
        }

        let root = root
            .canonicalize()
            .map_err(|_| ServeError::not_found(requested))?;
        let path = root
            .join(rel)
            .canonicalize()
            .map_err(|_| ServeError::not_found(requested))?;

        if !path.starts_with(&root) {
            return Err(ServeError::traversal(requested));
        }
        self.open(requested, &path)
    }

    /// Open a path that needs no sandboxing (artifacts, runtime shim).
    pub fn open(&self, requested: &str, path: &Path) -> ServeResult<ServedFile> {
        let not_found = || ServeError::not_found(requested);

        let file = File::open(path).map_err(|_| not_found())?;
        let meta = file.metadata().map_err(|_| not_found())?;
        if !meta.is_file() {
            return Err(not_found());
        }

        Ok(ServedFile {
            file,
            len: meta.len(),
            modified: meta.modified().ok(),
            content_type: mime::from_path(path),
        })
    }
}

//! Build cache: fingerprint-keyed wasm artifacts plus the package registry.
//!
//! Artifacts live at `<root>/wasm/<pkg>/<hash>-<mtime>.wasm`. A file at that
//! path is always a complete build output: the toolchain writes to a
//! `.partial` sibling which is renamed into place only on success.
//!
//! # Flow
//!
//! ```text
//! get_or_build(pkg)
//!     │
//!     ├── in flight? ──> join, share outcome
//!     │
//!     ├── toolchain.resolve(pkg) ──> Project { dir, fingerprint }
//!     ├── artifact exists?        ──> hit, no build
//!     └── toolchain.build(..., <artifact>.partial) ──> rename
//! ```

mod inflight;
mod registry;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use crate::error::{ServeError, ServeResult};
use crate::logger;
use crate::toolchain::{BuildTask, CancelToken, Fingerprint, Project, Toolchain};
use crate::{debug, log};

use inflight::InFlight;
use registry::Registry;

/// Subdirectory of the cache root holding compiled modules.
pub const ARTIFACT_DIR: &str = "wasm";

/// Extension of compiled modules.
pub const ARTIFACT_EXT: &str = "wasm";

/// Extension of in-progress build outputs.
const STAGING_EXT: &str = "wasm.partial";

/// A successful build of one package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    pub pkg: String,
    /// Compiled module, inside the cache root.
    pub artifact: PathBuf,
    /// Resolved source tree the module was built from.
    pub source_dir: PathBuf,
}

impl BuildRecord {
    /// File name of the artifact (`<cache key>.wasm`), used in artifact URLs.
    pub fn artifact_name(&self) -> String {
        self.artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// On-demand builder with a process-lifetime registry.
pub struct BuildCache {
    root: PathBuf,
    toolchain: Arc<dyn Toolchain>,
    registry: Registry,
    inflight: InFlight<ServeResult<BuildRecord>>,
    cancel: CancelToken,
    build_timeout: Option<Duration>,
    builds_started: AtomicUsize,
}

impl BuildCache {
    pub fn new(root: impl Into<PathBuf>, toolchain: Arc<dyn Toolchain>) -> Self {
        Self {
            root: root.into(),
            toolchain,
            registry: Registry::new(),
            inflight: InFlight::new(),
            cancel: CancelToken::new(),
            build_timeout: None,
            builds_started: AtomicUsize::new(0),
        }
    }

    /// Kill builds that run longer than `timeout`.
    pub fn with_build_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.build_timeout = timeout;
        self
    }

    /// Return the artifact for `pkg`, building it if its fingerprint is new.
    ///
    /// Concurrent calls for the same `pkg` share a single resolve and build.
    /// Nothing is registered here; callers register the record once they
    /// have made it reachable.
    pub fn get_or_build(&self, pkg: &str) -> ServeResult<BuildRecord> {
        validate_pkg(pkg)?;
        self.inflight.run(
            pkg,
            || self.resolve_and_build(pkg),
            || Err(ServeError::build(pkg, "build panicked")),
        )
    }

    fn resolve_and_build(&self, pkg: &str) -> ServeResult<BuildRecord> {
        let project = self.toolchain.resolve(pkg)?;
        let artifact = self.artifact_path(pkg, &project.fingerprint);
        let record = BuildRecord {
            pkg: pkg.to_string(),
            artifact: artifact.clone(),
            source_dir: project.dir.clone(),
        };

        if artifact.is_file() {
            logger::status_unchanged(&format!("cached {pkg} ({})", project.fingerprint.hash));
            return Ok(record);
        }

        let start = Instant::now();
        match self.build(&project, &artifact) {
            Ok(()) => {
                logger::status_success(&format!(
                    "built {pkg} in {:.1}s",
                    start.elapsed().as_secs_f64()
                ));
                Ok(record)
            }
            Err(e) => {
                logger::status_error(&format!("build {pkg} failed"), &e.to_string());
                Err(e)
            }
        }
    }

    /// Build into the staging path, then move the result onto `artifact`.
    fn build(&self, project: &Project, artifact: &Path) -> ServeResult<()> {
        let pkg = &project.pkg;
        let staging = artifact.with_extension(STAGING_EXT);
        let task = BuildTask {
            timeout: self.build_timeout,
            cancel: self.cancel.clone(),
        };

        let nth = self.builds_started.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("build"; "#{} {} -> {}", nth, project.dir.display(), staging.display());

        let result = self
            .toolchain
            .build(project, &staging, &task)
            .and_then(|()| {
                fs::rename(&staging, artifact)
                    .map_err(|e| ServeError::build(pkg, format!("install artifact: {e}")))
            });

        if result.is_err() && staging.exists() {
            let _ = fs::remove_file(&staging);
        }
        result
    }

    /// `<root>/wasm/<pkg>/<cache key>.wasm`
    pub fn artifact_path(&self, pkg: &str, fingerprint: &Fingerprint) -> PathBuf {
        self.root
            .join(ARTIFACT_DIR)
            .join(pkg)
            .join(format!("{}.{ARTIFACT_EXT}", fingerprint.cache_key()))
    }

    /// Make `record` the current build of its package.
    pub fn register(&self, record: BuildRecord) -> Arc<BuildRecord> {
        log!("build"; "registered {} -> {}", record.pkg, record.artifact_name());
        self.registry.insert(record)
    }

    pub fn lookup(&self, pkg: &str) -> Option<Arc<BuildRecord>> {
        self.registry.get(pkg)
    }

    #[cfg(test)]
    pub fn is_registered(&self, pkg: &str) -> bool {
        self.registry.contains(pkg)
    }

    /// Split an asset path into the longest registered package and the rest.
    pub fn split_registered<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        self.registry.split(path)
    }

    /// Platform shim served next to every built package.
    pub fn runtime_shim(&self) -> ServeResult<PathBuf> {
        self.toolchain.runtime_shim()
    }

    /// Abort every running build; later builds are refused as well.
    pub fn cancel_builds(&self) {
        if !self.inflight.is_empty() {
            log!("build"; "cancelling {} running build(s)", self.inflight.len());
        }
        self.cancel.cancel();
    }

    /// Packages currently being resolved or built.
    pub fn builds_in_flight(&self) -> usize {
        self.inflight.len()
    }

    /// Toolchain builds started since creation (cache hits excluded).
    #[cfg(test)]
    pub fn builds_started(&self) -> usize {
        self.builds_started.load(Ordering::SeqCst)
    }
}

/// Reject references that cannot safely become part of a cache path.
fn validate_pkg(pkg: &str) -> ServeResult<()> {
    let invalid = |reason: &str| Err(ServeError::resolve(pkg, reason));

    if pkg.is_empty() {
        return invalid("empty package reference");
    }
    if pkg.contains('\\') || pkg.chars().any(char::is_control) {
        return invalid("invalid character in package reference");
    }
    if pkg
        .split('/')
        .any(|segment| matches!(segment, "" | "." | ".."))
    {
        return invalid("invalid path segment in package reference");
    }
    Ok(())
}

//! Project resolver and builder.
//!
//! The build cache only talks to a [`Toolchain`]: it asks for a resolved
//! [`Project`] (source directory plus [`Fingerprint`]) and, on a cache miss,
//! for an artifact written to a given path. [`GoToolchain`] is the real
//! implementation; tests substitute their own.

mod fingerprint;
mod go;
mod gop;
#[cfg(test)]
pub mod testing;

pub use fingerprint::{Fingerprint, compute_tree_fingerprint};
pub use go::GoToolchain;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::ServeResult;

/// A package reference resolved into something buildable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// The package reference as requested.
    pub pkg: String,
    /// Root of the resolved source tree.
    pub dir: PathBuf,
    /// Content identity of `dir` plus build configuration.
    pub fingerprint: Fingerprint,
}

/// Shared flag that aborts running builds.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Raw flag, for polling loops that only need a reference.
    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// Bounds for one builder invocation.
#[derive(Debug, Clone, Default)]
pub struct BuildTask {
    /// Kill the build after this long; `None` waits for the compiler to exit.
    pub timeout: Option<Duration>,
    pub cancel: CancelToken,
}

/// External resolver/builder.
///
/// Errors must already be classified: `resolve` yields `Resolve` or
/// `Fingerprint` errors, `build` yields `Build` errors.
pub trait Toolchain: Send + Sync {
    /// Parse `pkg`, locate its sources and compute their fingerprint.
    fn resolve(&self, pkg: &str) -> ServeResult<Project>;

    /// Compile `project` to a wasm module at `output`.
    ///
    /// Blocks until the compiler exits, the task times out or is cancelled.
    fn build(&self, project: &Project, output: &Path, task: &BuildTask) -> ServeResult<()>;

    /// Platform JavaScript shim that instantiates built modules in a browser.
    fn runtime_shim(&self) -> ServeResult<PathBuf>;
}

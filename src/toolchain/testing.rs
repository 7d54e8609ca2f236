//! In-memory toolchain for cache and router tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use super::fingerprint::ContentHash;
use super::{BuildTask, Fingerprint, Project, Toolchain};
use crate::error::{ServeError, ServeResult};

/// Bytes written as a "compiled" module.
pub const WASM_BYTES: &[u8] = b"\0asm\x01\0\0\0";

/// Toolchain whose sources live in a temp dir and whose builds just write bytes.
pub struct FakeToolchain {
    source: TempDir,
    platform: TempDir,
    revision: AtomicU8,
    builds: AtomicUsize,
    fail_resolve: AtomicBool,
    fail_build: AtomicBool,
    delay: Duration,
}

impl FakeToolchain {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    /// Every build sleeps for `delay` before writing its output.
    pub fn with_delay(delay: Duration) -> Self {
        let source = TempDir::new().unwrap();
        fs::write(source.path().join("main.spx"), "onStart => {}").unwrap();
        fs::create_dir_all(source.path().join("res/sprites")).unwrap();
        fs::write(source.path().join("res/index.json"), r#"{"zorder":[]}"#).unwrap();
        fs::write(source.path().join("res/sprites/calf.png"), b"\x89PNG").unwrap();

        let platform = TempDir::new().unwrap();
        fs::write(platform.path().join("wasm_exec.js"), "// go runtime shim").unwrap();

        Self {
            source,
            platform,
            revision: AtomicU8::new(1),
            builds: AtomicUsize::new(0),
            fail_resolve: AtomicBool::new(false),
            fail_build: AtomicBool::new(false),
            delay,
        }
    }

    pub fn source_dir(&self) -> &Path {
        self.source.path()
    }

    /// Simulate a source change: the next resolve yields a new fingerprint.
    pub fn touch(&self) {
        self.revision.fetch_add(1, Ordering::SeqCst);
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn set_fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_build(&self, fail: bool) {
        self.fail_build.store(fail, Ordering::SeqCst);
    }
}

impl Toolchain for FakeToolchain {
    fn resolve(&self, pkg: &str) -> ServeResult<Project> {
        if self.fail_resolve.load(Ordering::SeqCst) {
            return Err(ServeError::resolve(pkg, "unknown module"));
        }
        let revision = self.revision.load(Ordering::SeqCst);
        Ok(Project {
            pkg: pkg.to_string(),
            dir: self.source.path().to_path_buf(),
            fingerprint: Fingerprint::new(
                ContentHash::new([revision; 32]),
                1_700_000_000 + u64::from(revision),
            ),
        })
    }

    fn build(&self, project: &Project, output: &Path, task: &BuildTask) -> ServeResult<()> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(|e| ServeError::build(&project.pkg, e))?;
        }
        if task.cancel.is_cancelled() {
            return Err(ServeError::build(&project.pkg, "cancelled"));
        }
        if self.fail_build.load(Ordering::SeqCst) {
            // A compiler that dies mid-write leaves a truncated file behind
            fs::write(output, b"\0as").map_err(|e| ServeError::build(&project.pkg, e))?;
            return Err(ServeError::build(&project.pkg, "exit status 1"));
        }
        fs::write(output, WASM_BYTES).map_err(|e| ServeError::build(&project.pkg, e))
    }

    fn runtime_shim(&self) -> ServeResult<PathBuf> {
        Ok(self.platform.path().join("wasm_exec.js"))
    }
}

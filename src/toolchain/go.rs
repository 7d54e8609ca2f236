//! Go toolchain: module download, fingerprinting and `GOOS=js` builds.
//!
//! A package reference is a module path with an optional `@version`
//! suffix (`github.com/goplus/FlappyCalf@v1.0.2`); without a suffix the
//! latest version is resolved. Sources come from the module cache via
//! `go mod download -json`. Packages with Go+ sources are translated by
//! `gop go` first when a `gop` binary is configured (see [`super::gop`]).

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::Deserialize;

use super::gop::{needs_codegen, stage_sources};
use super::{BuildTask, Project, Toolchain, compute_tree_fingerprint};
use crate::{debug, log};
use crate::error::{ServeError, ServeResult};
use crate::utils::exec::Cmd;

/// Target selection passed to every build.
const TARGET_ENV: [(&str, &str); 2] = [("GOOS", "js"), ("GOARCH", "wasm")];

/// Subset of `go mod download -json` output.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModuleDownload {
    path: String,
    #[serde(default)]
    version: String,
    #[serde(default)]
    dir: Option<PathBuf>,
    #[serde(default)]
    error: Option<String>,
}

/// Toolchain backed by the `go` command.
#[derive(Debug)]
pub struct GoToolchain {
    go: PathBuf,
    /// Go+ translator; `None` builds the Go sources as they are.
    gop: Option<PathBuf>,
    tags: String,
    /// Directory `go mod download` runs in; must not be inside a module.
    workdir: PathBuf,
    version: OnceLock<String>,
    shim: OnceLock<PathBuf>,
}

impl GoToolchain {
    pub fn new(go: PathBuf, tags: impl Into<String>, workdir: PathBuf) -> Self {
        Self {
            go,
            gop: None,
            tags: tags.into(),
            workdir,
            version: OnceLock::new(),
            shim: OnceLock::new(),
        }
    }

    /// Run `gop go` before compiling packages with Go+ sources.
    pub fn with_gop(mut self, gop: Option<PathBuf>) -> Self {
        self.gop = gop;
        self
    }

    /// Locate `go` on `PATH`.
    pub fn find_go() -> anyhow::Result<PathBuf> {
        which::which("go").map_err(|e| anyhow::anyhow!("`go` not found on PATH: {e}"))
    }

    fn go(&self) -> Cmd {
        Cmd::new(&self.go)
    }

    /// `go version` output, queried once.
    fn go_version(&self, pkg: &str) -> ServeResult<&str> {
        if let Some(version) = self.version.get() {
            return Ok(version.as_str());
        }
        let output = self
            .go()
            .arg("version")
            .output()
            .map_err(|e| ServeError::fingerprint(pkg, format!("{e:#}")))?;
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(self.version.get_or_init(|| version).as_str())
    }

    /// Build settings that must invalidate the cache when they change.
    fn config_salt(&self, pkg: &str) -> ServeResult<String> {
        let version = self.go_version(pkg)?;
        let gop = if self.gop.is_some() { ";gop" } else { "" };
        Ok(format!("{version};tags={};GOOS=js;GOARCH=wasm{gop}", self.tags))
    }

    /// `go build` the package in `dir` for the js/wasm target.
    fn compile(&self, project: &Project, dir: &Path, output: &Path, task: &BuildTask) -> ServeResult<()> {
        self.go()
            .arg("build")
            .args(["-tags", &self.tags])
            .arg("-o")
            .arg(output)
            .arg(".")
            .cwd(dir)
            .envs(TARGET_ENV)
            .run_attached(task.timeout, task.cancel.flag())
            .map_err(|e| ServeError::build(&project.pkg, format!("{e:#}")))
    }

    fn download(&self, pkg: &str) -> ServeResult<ModuleDownload> {
        let (module, version) = split_version(pkg);
        let query = format!("{module}@{}", version.unwrap_or("latest"));

        let output = self
            .go()
            .args(["mod", "download", "-json", &query])
            .cwd(&self.workdir)
            .envs([("GO111MODULE", "on"), ("GOWORK", "off")])
            .output()
            .map_err(|e| ServeError::resolve(pkg, format!("{e:#}")))?;

        let info: ModuleDownload = serde_json::from_slice(&output.stdout).map_err(|e| {
            ServeError::resolve(pkg, format!("unexpected `go mod download` output: {e}"))
        })?;

        if let Some(error) = info.error {
            return Err(ServeError::resolve(pkg, error));
        }
        Ok(info)
    }
}

impl Toolchain for GoToolchain {
    fn resolve(&self, pkg: &str) -> ServeResult<Project> {
        let info = self.download(pkg)?;
        let dir = info
            .dir
            .filter(|dir| dir.is_dir())
            .ok_or_else(|| ServeError::resolve(pkg, "module has no source directory"))?;
        debug!("build"; "resolved {} -> {}@{} in {}", pkg, info.path, info.version, dir.display());

        let salt = self.config_salt(pkg)?;
        let fingerprint = compute_tree_fingerprint(&dir, &salt)
            .map_err(|e| ServeError::fingerprint(pkg, e))?;

        Ok(Project {
            pkg: pkg.to_string(),
            dir,
            fingerprint,
        })
    }

    fn build(&self, project: &Project, output: &Path, task: &BuildTask) -> ServeResult<()> {
        let pkg = &project.pkg;
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ServeError::build(pkg, e))?;
        }

        if !needs_codegen(&project.dir) {
            return self.compile(project, &project.dir, output, task);
        }
        let Some(gop) = &self.gop else {
            log!("build"; "{} has Go+ sources; without --gop only committed Go files are built", pkg);
            return self.compile(project, &project.dir, output, task);
        };

        // Sibling of the staging artifact, removed with it
        let workdir = output.with_extension("src");
        let result = stage_sources(&project.dir, &workdir)
            .map_err(|e| ServeError::build(pkg, format!("stage sources: {e}")))
            .and_then(|()| {
                Cmd::new(gop)
                    .args(["go", "."])
                    .cwd(&workdir)
                    .run_attached(task.timeout, task.cancel.flag())
                    .map_err(|e| ServeError::build(pkg, format!("{e:#}")))
            })
            .and_then(|()| self.compile(project, &workdir, output, task));

        if let Err(e) = std::fs::remove_dir_all(&workdir) {
            debug!("build"; "leftover {}: {}", workdir.display(), e);
        }
        result
    }

    fn runtime_shim(&self) -> ServeResult<PathBuf> {
        if let Some(shim) = self.shim.get() {
            return Ok(shim.clone());
        }

        let output = self
            .go()
            .args(["env", "GOROOT"])
            .output()
            .map_err(|_| ServeError::not_found("wasm_exec.js"))?;
        let goroot = PathBuf::from(String::from_utf8_lossy(&output.stdout).trim());

        // Go 1.24 moved the shim from misc/wasm to lib/wasm
        let shim = ["lib/wasm/wasm_exec.js", "misc/wasm/wasm_exec.js"]
            .iter()
            .map(|rel| goroot.join(rel))
            .find(|path| path.is_file())
            .ok_or_else(|| ServeError::not_found("wasm_exec.js"))?;

        Ok(self.shim.get_or_init(|| shim).clone())
    }
}

/// Split `module@version`; the version is `None` when absent or empty.
pub fn split_version(pkg: &str) -> (&str, Option<&str>) {
    match pkg.split_once('@') {
        Some((module, version)) if !version.is_empty() => (module, Some(version)),
        Some((module, _)) => (module, None),
        None => (pkg, None),
    }
}

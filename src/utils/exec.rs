//! External command execution utilities.
//!
//! Provides a Builder-based API for running toolchain commands, either
//! capturing their output (short queries such as `go env`) or attached to
//! the server's own terminal (long builds whose diagnostics belong to the
//! operator, not to the HTTP client).
//!
//! # Examples
//!
//! ```ignore
//! use crate::utils::exec::Cmd;
//!
//! // Captured query
//! let out = Cmd::new("go").args(["env", "GOROOT"]).output()?;
//!
//! // Attached build, killed after ten minutes or when `cancel` is set
//! Cmd::new("go")
//!     .args(["build", "-o", "main.wasm", "."])
//!     .cwd(dir)
//!     .envs([("GOOS", "js"), ("GOARCH", "wasm")])
//!     .run_attached(Some(Duration::from_secs(600)), &cancel)?;
//! ```

use anyhow::{Context, Result, bail};
use std::{
    ffi::{OsStr, OsString},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    sync::atomic::{AtomicBool, Ordering},
    thread,
    time::{Duration, Instant},
};

/// How often an attached child is polled for exit, timeout and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

// ============================================================================
// Builder API
// ============================================================================

/// Command builder for external process execution.
#[derive(Default, Debug)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            ..Default::default()
        }
    }

    /// Add a single argument.
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        let arg = arg.as_ref();
        if !arg.is_empty() {
            self.args.push(arg.to_owned());
        }
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            let arg = arg.as_ref();
            if !arg.is_empty() {
                self.args.push(arg.to_owned());
            }
        }
        self
    }

    /// Set working directory.
    pub fn cwd<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Add environment variables on top of the inherited process environment.
    pub fn envs<K, V, I>(mut self, vars: I) -> Self
    where
        K: AsRef<str>,
        V: AsRef<str>,
        I: IntoIterator<Item = (K, V)>,
    {
        for (k, v) in vars {
            self.envs.push((k.as_ref().to_owned(), v.as_ref().to_owned()));
        }
        self
    }

    /// Get the program name for error messages.
    fn program_name(&self) -> String {
        self.program.to_string_lossy().to_string()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).envs(self.envs.iter().cloned());
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run to completion with captured stdout/stderr.
    ///
    /// A non-zero exit is an error whose message carries the child's stderr.
    pub fn output(self) -> Result<Output> {
        let name = self.program_name();
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("Failed to execute `{name}`"))?;

        if !output.status.success() {
            bail!(format_error(&name, &output));
        }
        Ok(output)
    }

    /// Run with stdin/stdout/stderr inherited from the server process.
    ///
    /// The child is killed when `timeout` elapses or `cancel` becomes true.
    pub fn run_attached(self, timeout: Option<Duration>, cancel: &AtomicBool) -> Result<()> {
        let name = self.program_name();
        let mut child = self
            .command()
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn `{name}`"))?;

        let started = Instant::now();
        loop {
            if let Some(status) = child
                .try_wait()
                .with_context(|| format!("Failed to wait for `{name}`"))?
            {
                if status.success() {
                    return Ok(());
                }
                bail!("Command `{name}` failed with {status}");
            }

            let timed_out = timeout.is_some_and(|limit| started.elapsed() >= limit);
            if timed_out || cancel.load(Ordering::SeqCst) {
                let _ = child.kill();
                let _ = child.wait();
                if timed_out {
                    bail!(
                        "Command `{name}` timed out after {}s",
                        started.elapsed().as_secs()
                    );
                }
                bail!("Command `{name}` cancelled");
            }

            thread::sleep(POLL_INTERVAL);
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Format error message for failed command.
fn format_error(name: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);

    let mut msg = format!("Command `{name}` failed with {}", output.status);
    let stderr = stderr.trim();
    if !stderr.is_empty() {
        msg.push('\n');
        msg.push_str(stderr);
    }

    // `go ... -json` reports failures on stdout
    let stdout = stdout.trim();
    if !stdout.is_empty() {
        msg.push_str("\nStdout:\n");
        msg.push_str(stdout);
    }
    msg
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cmd_builder() {
        let cmd = Cmd::new("echo")
            .arg("hello")
            .args(["world", "!"])
            .cwd("/tmp")
            .envs([("GOOS", "js")]);

        assert_eq!(cmd.program, OsString::from("echo"));
        assert_eq!(cmd.args.len(), 3);
        assert_eq!(cmd.cwd, Some(PathBuf::from("/tmp")));
        assert_eq!(cmd.envs, vec![("GOOS".to_string(), "js".to_string())]);
    }

    #[test]
    fn test_empty_args_filtered() {
        let cmd = Cmd::new("echo").arg("").args(["a", "", "b"]);
        assert_eq!(cmd.args.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_output_captures_stdout() {
        let output = Cmd::new("echo").arg("hello").output().unwrap();
        assert!(output.status.success());
        assert!(String::from_utf8_lossy(&output.stdout).contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn test_output_failure_carries_stderr() {
        let err = Cmd::new("sh")
            .args(["-c", "echo broken >&2; exit 3"])
            .output()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("`sh` failed"));
        assert!(msg.contains("broken"));
    }

    #[cfg(unix)]
    #[test]
    fn test_attached_success_and_failure() {
        let cancel = AtomicBool::new(false);
        assert!(Cmd::new("true").run_attached(None, &cancel).is_ok());
        assert!(Cmd::new("false").run_attached(None, &cancel).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_attached_timeout_kills_child() {
        let cancel = AtomicBool::new(false);
        let started = Instant::now();
        let err = Cmd::new("sleep")
            .arg("5")
            .run_attached(Some(Duration::from_millis(100)), &cancel)
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn test_attached_cancel_kills_child() {
        let cancel = AtomicBool::new(true);
        let err = Cmd::new("sleep")
            .arg("5")
            .run_attached(None, &cancel)
            .unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_missing_program() {
        let err = Cmd::new("definitely-not-a-real-binary-xyz")
            .output()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to execute"));
    }
}

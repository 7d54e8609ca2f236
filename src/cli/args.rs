//! Command-line interface definitions.

use clap::{ColorChoice, Parser};
use std::path::PathBuf;

/// Package shown on the landing page.
pub const DEFAULT_SAMPLE: &str = "github.com/goplus/FlappyCalf";

/// Build spx games to WebAssembly on demand and serve them to the browser
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, default_value = "auto")]
    pub color: ColorChoice,

    /// HTTP service address (`:port` listens on all interfaces)
    #[arg(long, default_value = ":8080", value_name = "ADDR")]
    pub http: String,

    /// Move to the next free port (up to 9 above `--http`) when the port is busy
    #[arg(long)]
    pub port_retry: bool,

    /// Cache directory for compiled modules (`~` is expanded)
    #[arg(long, default_value = "cache", value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    pub cache: String,

    /// Value of the Access-Control-Allow-Origin header (empty disables it)
    #[arg(long, default_value = "", value_name = "ORIGIN")]
    pub allow_origin: String,

    /// Log every request and debug details
    #[arg(short, long)]
    pub verbose: bool,

    /// Package pre-filled on the landing page
    #[arg(long, default_value = DEFAULT_SAMPLE, value_name = "PKG")]
    pub sample: String,

    /// Path prefix that triggers a build (repeatable)
    #[arg(long, default_value = "github.com", value_name = "PREFIX")]
    pub repo_prefix: Vec<String>,

    /// Go toolchain binary (default: `go` on PATH)
    #[arg(long, value_name = "PATH", value_hint = clap::ValueHint::ExecutablePath)]
    pub go: Option<PathBuf>,

    /// Go+ translator run before `go build` on packages with `.spx`/`.gop` sources
    #[arg(long, value_name = "PATH", value_hint = clap::ValueHint::ExecutablePath)]
    pub gop: Option<PathBuf>,

    /// Build tags passed to `go build`
    #[arg(long, default_value = "canvas")]
    pub tags: String,

    /// Kill builds running longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub build_timeout: Option<u64>,

    /// Answer `_wait` with 408 after this many seconds
    #[arg(long, value_name = "SECS")]
    pub wait_timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["spxserve"]);
        assert_eq!(cli.http, ":8080");
        assert_eq!(cli.cache, "cache");
        assert_eq!(cli.allow_origin, "");
        assert!(!cli.verbose);
        assert_eq!(cli.sample, DEFAULT_SAMPLE);
        assert_eq!(cli.repo_prefix, vec!["github.com".to_string()]);
        assert_eq!(cli.tags, "canvas");
        assert!(cli.go.is_none());
        assert!(cli.gop.is_none());
        assert!(!cli.port_retry);
        assert!(cli.build_timeout.is_none());
        assert!(cli.wait_timeout.is_none());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::parse_from([
            "spxserve",
            "--http",
            "127.0.0.1:9000",
            "--allow-origin",
            "*",
            "-v",
            "--repo-prefix",
            "github.com",
            "--repo-prefix",
            "gitee.com",
            "--build-timeout",
            "120",
            "--wait-timeout",
            "30",
        ]);
        assert_eq!(cli.http, "127.0.0.1:9000");
        assert_eq!(cli.allow_origin, "*");
        assert!(cli.verbose);
        assert_eq!(cli.repo_prefix, vec!["github.com", "gitee.com"]);
        assert_eq!(cli.build_timeout, Some(120));
        assert_eq!(cli.wait_timeout, Some(30));
    }
}

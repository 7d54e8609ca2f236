//! Server configuration validated from the command line.
//!
//! [`ServeConfig`] is built once at startup and shared read-only.
//!
//! | Flag              | Field            | Default                        |
//! |-------------------|------------------|--------------------------------|
//! | `--http`          | `addr`           | `0.0.0.0:8080`                 |
//! | `--port-retry`    | `port_retry`     | off (busy port is an error)    |
//! | `--cache`         | `cache_dir`      | `<cwd>/cache`                  |
//! | `--allow-origin`  | `allow_origin`   | empty (no CORS header)         |
//! | `--sample`        | `sample`         | `github.com/goplus/FlappyCalf` |
//! | `--repo-prefix`   | `repo_prefixes`  | `["github.com"]`               |
//! | `--gop`           | `gop`            | none (no Go+ translation)      |
//! | `--tags`          | `tags`           | `canvas`                       |
//! | `--build-timeout` | `build_timeout`  | none                           |
//! | `--wait-timeout`  | `wait_timeout`   | none                           |

mod error;

pub use error::ConfigError;

use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::{Cli, DEFAULT_SAMPLE};
use crate::utils::path::absolutize;

/// First path segments owned by the router itself.
const RESERVED_PREFIXES: [&str; 3] = ["spx", "wasm", "index.html"];

/// Validated server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub addr: SocketAddr,
    /// Try the next ports when `addr` is busy instead of failing.
    pub port_retry: bool,
    /// Absolute cache root.
    pub cache_dir: PathBuf,
    /// `Access-Control-Allow-Origin` value; empty sends no header.
    pub allow_origin: String,
    pub verbose: bool,
    pub sample: String,
    /// Path prefixes (without slashes) that trigger a build.
    pub repo_prefixes: Vec<String>,
    /// Go binary name or path; `None` means `go`. Looked up on `PATH` at startup.
    pub go: Option<PathBuf>,
    /// Go+ binary for `.spx` translation; `None` skips the step.
    pub gop: Option<PathBuf>,
    pub tags: String,
    pub build_timeout: Option<Duration>,
    pub wait_timeout: Option<Duration>,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            port_retry: false,
            cache_dir: PathBuf::from("cache"),
            allow_origin: String::new(),
            verbose: false,
            sample: DEFAULT_SAMPLE.to_string(),
            repo_prefixes: vec!["github.com".to_string()],
            go: None,
            gop: None,
            tags: "canvas".to_string(),
            build_timeout: None,
            wait_timeout: None,
        }
    }
}

impl ServeConfig {
    /// Validate command-line flags, resolving the cache dir against the cwd.
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let cwd = std::env::current_dir().map_err(ConfigError::Cwd)?;
        Self::from_cli_in(cli, &cwd)
    }

    fn from_cli_in(cli: &Cli, cwd: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            addr: parse_bind_addr(&cli.http)?,
            port_retry: cli.port_retry,
            cache_dir: absolutize(&cli.cache, cwd),
            allow_origin: cli.allow_origin.clone(),
            verbose: cli.verbose,
            sample: cli.sample.trim().to_string(),
            repo_prefixes: normalize_prefixes(&cli.repo_prefix)?,
            go: cli.go.clone(),
            gop: cli.gop.clone(),
            tags: cli.tags.clone(),
            build_timeout: seconds("--build-timeout", cli.build_timeout)?,
            wait_timeout: seconds("--wait-timeout", cli.wait_timeout)?,
        })
    }

    /// Package reference named by `path` (no leading slash) if it is a build trigger.
    pub fn build_target<'a>(&self, path: &'a str) -> Option<&'a str> {
        self.repo_prefixes.iter().find_map(|prefix| {
            path.strip_prefix(prefix.as_str())
                .filter(|rest| rest.starts_with('/'))
                .map(|_| path.trim_end_matches('/'))
        })
    }
}

/// Parse a listen address. `:8080` listens on all interfaces.
pub fn parse_bind_addr(raw: &str) -> Result<SocketAddr, ConfigError> {
    let raw = raw.trim();
    let invalid = || ConfigError::Addr(raw.to_string());

    if let Some(port) = raw.strip_prefix(':') {
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    if let Ok(addr) = raw.parse::<SocketAddr>() {
        return Ok(addr);
    }
    raw.to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(invalid)
}

fn normalize_prefixes(raw: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut prefixes = Vec::with_capacity(raw.len());
    for prefix in raw {
        let prefix = prefix.trim().trim_matches('/');
        if prefix.is_empty() {
            return Err(ConfigError::Validation(
                "--repo-prefix must not be empty".into(),
            ));
        }
        let first = prefix.split('/').next().unwrap_or(prefix);
        if RESERVED_PREFIXES.contains(&first) {
            return Err(ConfigError::Validation(format!(
                "--repo-prefix `{prefix}` collides with a built-in route"
            )));
        }
        if !prefixes.iter().any(|p| p == prefix) {
            prefixes.push(prefix.to_string());
        }
    }
    if prefixes.is_empty() {
        return Err(ConfigError::Validation(
            "at least one --repo-prefix is required".into(),
        ));
    }
    Ok(prefixes)
}

fn seconds(flag: &str, secs: Option<u64>) -> Result<Option<Duration>, ConfigError> {
    match secs {
        Some(0) => Err(ConfigError::Validation(format!("{flag} must be positive"))),
        secs => Ok(secs.map(Duration::from_secs)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Result<ServeConfig, ConfigError> {
        let cli = Cli::parse_from(std::iter::once("spxserve").chain(args.iter().copied()));
        ServeConfig::from_cli_in(&cli, Path::new("/srv/app"))
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = parse(&[]).unwrap();
        let default = ServeConfig::default();
        assert_eq!(config.addr, default.addr);
        assert_eq!(config.cache_dir, PathBuf::from("/srv/app/cache"));
        assert_eq!(config.sample, default.sample);
        assert_eq!(config.repo_prefixes, default.repo_prefixes);
        assert_eq!(config.tags, default.tags);
        assert_eq!(config.allow_origin, "");
        assert!(config.build_timeout.is_none());
        assert!(!config.port_retry);
        assert!(config.gop.is_none());
    }

    #[test]
    fn test_port_retry_and_gop() {
        let config = parse(&["--port-retry", "--gop", "/usr/local/bin/gop"]).unwrap();
        assert!(config.port_retry);
        assert_eq!(config.gop, Some(PathBuf::from("/usr/local/bin/gop")));
    }

    #[test]
    fn test_parse_bind_addr() {
        assert_eq!(
            parse_bind_addr(":8080").unwrap(),
            "0.0.0.0:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_bind_addr("127.0.0.1:9000").unwrap(),
            "127.0.0.1:9000".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(parse_bind_addr("[::1]:80").unwrap().port(), 80);
        assert!(parse_bind_addr("localhost:8081").unwrap().ip().is_loopback());
    }

    #[test]
    fn test_parse_bind_addr_invalid() {
        assert!(matches!(parse_bind_addr(":http"), Err(ConfigError::Addr(_))));
        assert!(matches!(parse_bind_addr(":70000"), Err(ConfigError::Addr(_))));
        assert!(matches!(parse_bind_addr("8080"), Err(ConfigError::Addr(_))));
    }

    #[test]
    fn test_cache_dir_absolute_kept() {
        let config = parse(&["--cache", "/var/cache/spx"]).unwrap();
        assert_eq!(config.cache_dir, PathBuf::from("/var/cache/spx"));
    }

    #[test]
    fn test_timeouts() {
        let config = parse(&["--build-timeout", "90", "--wait-timeout", "25"]).unwrap();
        assert_eq!(config.build_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.wait_timeout, Some(Duration::from_secs(25)));

        assert!(matches!(
            parse(&["--build-timeout", "0"]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_repo_prefixes_normalized() {
        let config = parse(&[
            "--repo-prefix",
            "/github.com/",
            "--repo-prefix",
            "github.com",
            "--repo-prefix",
            "gitee.com",
        ])
        .unwrap();
        assert_eq!(config.repo_prefixes, vec!["github.com", "gitee.com"]);
    }

    #[test]
    fn test_repo_prefix_reserved() {
        assert!(matches!(
            parse(&["--repo-prefix", "spx"]),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            parse(&["--repo-prefix", ""]),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_build_target() {
        let config = ServeConfig::default();
        assert_eq!(
            config.build_target("github.com/goplus/FlappyCalf"),
            Some("github.com/goplus/FlappyCalf")
        );
        assert_eq!(
            config.build_target("github.com/goplus/FlappyCalf/"),
            Some("github.com/goplus/FlappyCalf")
        );
        assert_eq!(config.build_target("github.com"), None);
        assert_eq!(config.build_target("github.company/x"), None);
        assert_eq!(config.build_target("spx/github.com/x"), None);
    }
}

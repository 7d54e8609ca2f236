//! Configuration error types.

use thiserror::Error;

/// Invalid command-line configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid --http address `{0}` (expected `:port`, `host:port` or `ip:port`)")]
    Addr(String),

    #[error("cannot determine current directory")]
    Cwd(#[source] std::io::Error),

    #[error("config validation error: {0}")]
    Validation(String),
}

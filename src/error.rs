//! Error taxonomy for request handling.
//!
//! Every variant surfaces to the HTTP client as a 500 with a short message
//! (see [`ServeError::client_message`]); the full `Display` form is only
//! written to the server log.

use thiserror::Error;

/// Result alias used by the cache, toolchain and file server.
pub type ServeResult<T> = Result<T, ServeError>;

/// Errors raised while resolving, building or serving a package.
///
/// Variants carry owned strings rather than sources so one outcome can be
/// cloned to every request waiting on the same in-flight build.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServeError {
    /// Package reference is malformed or cannot be opened as a project.
    #[error("resolve `{pkg}` failed: {reason}")]
    Resolve { pkg: String, reason: String },

    /// Resolver could not establish the content identity of the project.
    #[error("fingerprint `{pkg}` failed: {reason}")]
    Fingerprint { pkg: String, reason: String },

    /// External compiler failed, was cancelled, or the artifact could not be written.
    #[error("build `{pkg}` failed: {reason}")]
    Build { pkg: String, reason: String },

    /// Asset, artifact or package is not present.
    #[error("`{path}` not found")]
    NotFound { path: String },

    /// Resolved path escapes its sandbox root.
    #[error("`{path}` escapes the sandbox root")]
    PathTraversal { path: String },
}

impl ServeError {
    pub fn resolve(pkg: &str, reason: impl ToString) -> Self {
        Self::Resolve {
            pkg: pkg.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn fingerprint(pkg: &str, reason: impl ToString) -> Self {
        Self::Fingerprint {
            pkg: pkg.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn build(pkg: &str, reason: impl ToString) -> Self {
        Self::Build {
            pkg: pkg.to_owned(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn traversal(path: impl Into<String>) -> Self {
        Self::PathTraversal { path: path.into() }
    }

    /// Short body for the client. Never includes sandbox-internal paths.
    pub fn client_message(&self) -> String {
        match self {
            Self::Resolve { pkg, .. } | Self::Fingerprint { pkg, .. } | Self::Build { pkg, .. } => {
                format!("load pkg {pkg} error")
            }
            Self::NotFound { path } | Self::PathTraversal { path } => format!("load {path} error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_names_package() {
        let err = ServeError::build("github.com/sample/Game", "exit status 2");
        assert_eq!(err.client_message(), "load pkg github.com/sample/Game error");
    }

    #[test]
    fn test_client_message_hides_reason() {
        let err = ServeError::resolve("github.com/x", "/home/me/go/pkg/mod: permission denied");
        assert!(!err.client_message().contains("/home/me"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_traversal_message_uses_requested_path() {
        let err = ServeError::traversal("spx/github.com/x/../../etc/passwd");
        assert_eq!(
            err.client_message(),
            "load spx/github.com/x/../../etc/passwd error"
        );
    }

    #[test]
    fn test_error_is_cloneable_for_fan_out() {
        let err = ServeError::fingerprint("github.com/x", "walk failed");
        assert_eq!(err.clone(), err);
    }
}

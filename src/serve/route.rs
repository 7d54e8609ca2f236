//! Request path classification.
//!
//! | Path                       | Route          |
//! |----------------------------|----------------|
//! | `/`, `/index.html`         | `Landing`      |
//! | `/spx/{pkg}/_wait`         | `Wait`         |
//! | `/spx/{pkg}/_notify`       | `Notify`       |
//! | `/spx/{rest}`              | `Asset`        |
//! | `/wasm/{pkg}/{file}`       | `Wasm`         |
//! | `/{repo prefix}/{...}`     | `Build`        |
//! | anything else              | `Unmatched`    |

use std::borrow::Cow;

use percent_encoding::percent_decode_str;

use crate::config::ServeConfig;

const SPX_PREFIX: &str = "spx/";
const WASM_PREFIX: &str = "wasm/";
const WAIT: &str = "_wait";
const NOTIFY: &str = "_notify";

/// What a request path asks for. Borrows from the normalized path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    Landing,
    /// Build `pkg`, then redirect to its run page.
    Build { pkg: &'a str },
    /// `{pkg}/{file}` below `/spx/`; the split happens against the registry.
    Asset { path: &'a str },
    Wasm { pkg: &'a str, file: &'a str },
    Wait { pkg: &'a str },
    Notify { pkg: &'a str },
    Unmatched,
}

impl<'a> Route<'a> {
    /// Classify a normalized path (see [`normalize_url`]).
    pub fn classify(path: &'a str, config: &ServeConfig) -> Self {
        let path = path.strip_prefix('/').unwrap_or(path);

        if path.is_empty() || path == "index.html" {
            return Self::Landing;
        }
        if let Some(rest) = path.strip_prefix(SPX_PREFIX) {
            return Self::classify_spx(rest);
        }
        if let Some(rest) = path.strip_prefix(WASM_PREFIX) {
            return match rest.rsplit_once('/') {
                Some((pkg, file)) if !pkg.is_empty() => Self::Wasm { pkg, file },
                _ => Self::Unmatched,
            };
        }
        if let Some(pkg) = config.build_target(path) {
            return Self::Build { pkg };
        }
        Self::Unmatched
    }

    fn classify_spx(rest: &'a str) -> Self {
        match rest.rsplit_once('/') {
            Some((pkg, WAIT)) if !pkg.is_empty() => Self::Wait { pkg },
            Some((pkg, NOTIFY)) if !pkg.is_empty() => Self::Notify { pkg },
            _ => Self::Asset { path: rest },
        }
    }

    /// Short label for request logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::Build { .. } => "build",
            Self::Asset { .. } => "asset",
            Self::Wasm { .. } => "wasm",
            Self::Wait { .. } => "wait",
            Self::Notify { .. } => "notify",
            Self::Unmatched => "unmatched",
        }
    }
}

/// Percent-decode a request URL and drop its query string and fragment.
///
/// Invalid UTF-8 after decoding falls back to the raw path.
pub fn normalize_url(url: &str) -> Cow<'_, str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match percent_decode_str(path).decode_utf8() {
        Ok(decoded) => decoded,
        Err(_) => Cow::Borrowed(path),
    }
}

//! Request dispatch.
//!
//! The router maps a [`Route`] onto the build cache, the file server and
//! the reload broker, and produces a [`Reply`] for the response layer.
//! Failures are logged here in full; clients only see a short message.

use std::sync::Arc;

use super::files::{FileServer, ServedFile};
use super::route::{Route, normalize_url};
use crate::cache::BuildCache;
use crate::config::ServeConfig;
use crate::embed::serve::{LANDING_HTML, LandingVars, RUN_HTML, RunVars};
use crate::error::ServeError;
use crate::reload::{ReloadBroker, WaitOutcome};
use crate::{debug, log};

/// Run page of a package.
const INDEX_FILE: &str = "index.html";
/// Platform shim loaded by the run page.
const SHIM_FILE: &str = "wasm_exec.js";

/// What to send back for one request.
#[derive(Debug)]
pub enum Reply {
    Html(String),
    File(ServedFile),
    /// 303 See Other.
    Redirect(String),
    /// 200 with an empty body.
    Empty,
    /// 408, a long-poll gave up waiting.
    Timeout,
    /// 500 with a short message.
    Failure(String),
    /// 404 with a short message.
    NotFound(String),
    /// 503 while shutting down.
    Unavailable,
}

impl Reply {
    #[cfg(test)]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Html(_) | Self::File(_) | Self::Empty => 200,
            Self::Redirect(_) => 303,
            Self::Timeout => 408,
            Self::Failure(_) => 500,
            Self::NotFound(_) => 404,
            Self::Unavailable => 503,
        }
    }
}

/// Shared request handler state.
pub struct Router {
    config: Arc<ServeConfig>,
    cache: Arc<BuildCache>,
    files: FileServer,
    broker: ReloadBroker,
}

impl Router {
    pub fn new(config: Arc<ServeConfig>, cache: Arc<BuildCache>) -> Self {
        Self {
            config,
            cache,
            files: FileServer::new(),
            broker: ReloadBroker::new(),
        }
    }

    pub fn config(&self) -> &ServeConfig {
        &self.config
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    pub fn files(&self) -> &FileServer {
        &self.files
    }

    pub fn broker(&self) -> &ReloadBroker {
        &self.broker
    }

    /// Handle a raw request URL (path plus optional query).
    pub fn dispatch(&self, url: &str) -> Reply {
        let path = normalize_url(url);
        let route = Route::classify(&path, &self.config);
        debug!("serve"; "{} {}", route.kind(), path);

        match route {
            Route::Landing => Reply::Html(LANDING_HTML.render(&LandingVars {
                pkg: self.config.sample.clone(),
            })),
            Route::Build { pkg } => self.build(pkg),
            Route::Asset { path } => self.asset(path),
            Route::Wasm { pkg, file } => self.wasm(pkg, file),
            Route::Wait { pkg } => match self.broker.wait(pkg, self.config.wait_timeout) {
                WaitOutcome::Notified => Reply::Empty,
                WaitOutcome::TimedOut => Reply::Timeout,
            },
            Route::Notify { pkg } => {
                if self.broker.notify(pkg) {
                    log!("reload"; "notified {}", pkg);
                }
                Reply::Empty
            }
            Route::Unmatched => Reply::NotFound(format!("404 page not found: {path}")),
        }
    }

    /// Build (or reuse) `pkg`, make it reachable, redirect to its run page.
    fn build(&self, pkg: &str) -> Reply {
        match self.cache.get_or_build(pkg) {
            Ok(record) => {
                self.files.mount(pkg, &record.source_dir);
                self.cache.register(record);
                log!("serve"; "load pkg {}", pkg);
                Reply::Redirect(format!("/spx/{pkg}/{INDEX_FILE}"))
            }
            Err(e) => fail(&e, e.client_message()),
        }
    }

    /// `/spx/{pkg}/{file}` for a registered package.
    fn asset(&self, path: &str) -> Reply {
        let message = || format!("load spx/{path} error");

        let Some((pkg, file)) = self.cache.split_registered(path) else {
            return fail(&ServeError::not_found(format!("spx/{path}")), message());
        };

        let served = match file {
            INDEX_FILE => return self.run_page(pkg),
            SHIM_FILE => self
                .cache
                .runtime_shim()
                .and_then(|shim| self.files.open(SHIM_FILE, &shim)),
            _ => self.files.serve_mounted(pkg, file),
        };

        match served {
            Ok(file) => Reply::File(file),
            Err(e) => fail(&e, message()),
        }
    }

    fn run_page(&self, pkg: &str) -> Reply {
        let Some(record) = self.cache.lookup(pkg) else {
            let err = ServeError::not_found(format!("spx/{pkg}/{INDEX_FILE}"));
            return fail(&err, err.client_message());
        };
        Reply::Html(RUN_HTML.render(&RunVars {
            argv: vec![pkg.to_string()],
            wasm_url: format!("/wasm/{pkg}/{}", record.artifact_name()),
        }))
    }

    /// `/wasm/{pkg}/{file}`: the registered artifact, whatever `file` says.
    fn wasm(&self, pkg: &str, file: &str) -> Reply {
        let Some(record) = self.cache.lookup(pkg) else {
            let err = ServeError::not_found(format!("wasm/{pkg}/{file}"));
            return fail(&err, format!("run pkg {pkg} error"));
        };
        match self.files.open(&format!("wasm/{pkg}/{file}"), &record.artifact) {
            Ok(served) => Reply::File(served),
            Err(e) => fail(&e, format!("run pkg {pkg} error")),
        }
    }
}

/// Log `err` and answer with `message`.
fn fail(err: &ServeError, message: String) -> Reply {
    log!("error"; "{}", err);
    Reply::Failure(message)
}

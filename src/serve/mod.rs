//! On-demand build server.
//!
//! Every request runs on its own thread: builds and `_wait` long-polls
//! block for as long as they need without starving other requests.
//!
//! ```text
//! request ─> route::classify ─> Router::dispatch ─> Reply ─> response::respond
//!                                 │
//!                                 ├── BuildCache   (build trigger, wasm)
//!                                 ├── FileServer   (assets, shim)
//!                                 └── ReloadBroker (_wait / _notify)
//! ```

mod files;
mod lifecycle;
mod response;
mod route;
mod router;

pub use lifecycle::drain_builds;
pub use router::{Reply, Router};

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tiny_http::{Request, Server};

use crate::{debug, log};

/// Bound server ready to accept requests.
pub struct BoundServer {
    server: Arc<Server>,
    addr: SocketAddr,
    router: Arc<Router>,
}

/// Bind the HTTP listener without entering the request loop.
///
/// The server is registered for Ctrl+C shutdown before this returns.
pub fn bind_server(router: Arc<Router>) -> Result<BoundServer> {
    let config = router.config();
    let attempts = if config.port_retry {
        lifecycle::MAX_PORT_ATTEMPTS
    } else {
        1
    };
    let (server, addr) = lifecycle::bind_with_retry(config.addr, attempts)?;
    let server = Arc::new(server);
    crate::core::register_server(Arc::clone(&server));

    log!("serve"; "http://{}", display_addr(addr));

    Ok(BoundServer {
        server,
        addr,
        router,
    })
}

impl BoundServer {
    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the request loop (blocking until the server is unblocked).
    pub fn run(self) -> Result<()> {
        run_request_loop(&self.server, &self.router);
        Ok(())
    }
}

/// `0.0.0.0` is not browsable; show `localhost` instead.
fn display_addr(addr: SocketAddr) -> String {
    if addr.ip().is_unspecified() {
        format!("localhost:{}", addr.port())
    } else {
        addr.to_string()
    }
}

fn run_request_loop(server: &Server, router: &Arc<Router>) {
    for request in server.incoming_requests() {
        let router = Arc::clone(router);
        let spawned = thread::Builder::new()
            .name("spxserve-request".into())
            .spawn(move || handle_request(request, &router));
        if let Err(e) = spawned {
            log!("serve"; "failed to spawn request thread: {}", e);
        }
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request, router: &Router) {
    let method = request.method().clone();
    let url = request.url().to_string();
    debug!("serve"; "handle url {} {}", method, url);

    let reply = if crate::core::is_shutdown() {
        Reply::Unavailable
    } else {
        router.dispatch(&url)
    };

    match response::respond(request, reply, &router.config().allow_origin) {
        Ok(status) => debug!("serve"; "{} {} -> {}", method, url, status),
        Err(e) => log!("serve"; "request error: {}", e),
    }
}

//! Server lifecycle management.

use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use tiny_http::Server;

use crate::cache::BuildCache;
use crate::log;

/// Ports tried with `--port-retry` (the requested one included).
pub const MAX_PORT_ATTEMPTS: u16 = 10;

/// How long shutdown waits for cancelled builds to wind down.
const BUILD_DRAIN_POLLS: u32 = 40;
const BUILD_DRAIN_INTERVAL: Duration = Duration::from_millis(50);

/// Bind `addr`; with `attempts > 1`, try the following ports when it is taken.
///
/// Port 0 lets the OS pick; the returned address carries the actual port.
pub fn bind_with_retry(addr: SocketAddr, attempts: u16) -> Result<(Server, SocketAddr)> {
    let base_port = addr.port();
    let attempts = if base_port == 0 { 1 } else { attempts.max(1) };

    for offset in 0..attempts {
        let port = base_port.saturating_add(offset);
        let candidate = SocketAddr::new(addr.ip(), port);

        match Server::http(candidate) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                let bound = server.server_addr().to_ip().unwrap_or(candidate);
                return Ok((server, bound));
            }
            Err(_) if offset + 1 < attempts => continue,
            Err(e) if attempts == 1 => {
                return Err(anyhow::anyhow!("failed to bind {}: {}", candidate, e));
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "failed to bind after {} attempts (ports {}-{}): {}",
                    attempts,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

/// Cancel running builds and give them a moment to kill their compilers.
pub fn drain_builds(cache: &BuildCache) {
    cache.cancel_builds();
    for _ in 0..BUILD_DRAIN_POLLS {
        if cache.builds_in_flight() == 0 {
            return;
        }
        thread::sleep(BUILD_DRAIN_INTERVAL);
    }
    log!("build"; "{} build(s) still running at exit", cache.builds_in_flight());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, TcpListener};

    #[test]
    fn test_bind_ephemeral_port() {
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0);
        let (_server, bound) = bind_with_retry(addr, MAX_PORT_ATTEMPTS).unwrap();
        assert_ne!(bound.port(), 0);
    }

    #[test]
    fn test_bind_skips_taken_port() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = taken.local_addr().unwrap().port();
        // The next port may be taken as well; any later one is acceptable
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        match bind_with_retry(addr, MAX_PORT_ATTEMPTS) {
            Ok((_server, bound)) => assert_ne!(bound.port(), port),
            Err(e) => assert!(e.to_string().contains("failed to bind")),
        }
    }

    #[test]
    fn test_busy_port_fails_without_retry() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let err = bind_with_retry(addr, 1).err().expect("expected bind error");
        assert!(err.to_string().contains("failed to bind"));
    }
}

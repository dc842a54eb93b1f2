//! UDP broadcast discovery responder.
//!
//! The host binds a UDP socket on the discovery port (default 45454) and
//! answers every datagram that starts with `LOCALDESK_DISCOVER_REQUEST` with
//! a JSON [`DiscoverResponse`] sent back to the sender's address.  Anything
//! else arriving on the port is ignored.
//!
//! The responder runs on a dedicated thread so synchronous socket I/O never
//! blocks the Tokio runtime.
//!
//! # How discovery works (for beginners)
//!
//! 1. The phone sends the token to the LAN broadcast address
//!    (`255.255.255.255:45454`).  Every host on the segment receives it.
//! 2. Each LocalDesk host replies *unicast* to the phone with its id, name,
//!    and the port that serves both the session channel and HTTP.
//! 3. The phone lists every host that answered within its collection window
//!    and opens the session channel to the one the user picks.
//!
//! The responder is stateless: it never remembers who asked, and a
//! request has no effect other than the reply.
//!
//! # Read timeout
//!
//! The socket has a 500 ms read timeout.  On each timeout the `running` flag
//! is checked, so shutdown is noticed within half a second.

use std::net::{SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use localdesk_core::{protocol::discovery::is_discover_request, Device, DiscoverResponse};

use crate::application::state::now_ms;

/// Error type for discovery responder startup.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The responder thread could not be started.
    #[error("failed to spawn discovery thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Binds `bind` and spawns the responder thread.
///
/// `host` describes this host.  Its `port` serves both the session channel
/// and the HTTP surface, so replies carry it as `httpPort` too.  Returns the
/// bound address, which differs from `bind` when port 0 was requested.
///
/// # Errors
///
/// Returns [`DiscoveryError::BindFailed`] if the socket cannot be bound.
pub fn start_discovery_responder(
    bind: SocketAddr,
    host: Device,
    running: Arc<AtomicBool>,
) -> Result<SocketAddr, DiscoveryError> {
    let socket = UdpSocket::bind(bind).map_err(|source| DiscoveryError::BindFailed {
        addr: bind,
        source,
    })?;
    socket
        .set_read_timeout(Some(Duration::from_millis(500)))
        .ok();
    let local = socket.local_addr().unwrap_or(bind);

    std::thread::Builder::new()
        .name("localdesk-discovery".to_string())
        .spawn(move || discovery_loop(socket, host, running))
        .map_err(DiscoveryError::Spawn)?;

    info!("discovery responder listening on UDP {local}");
    Ok(local)
}

/// The receive loop executed on the discovery thread.
fn discovery_loop(socket: UdpSocket, host: Device, running: Arc<AtomicBool>) {
    let mut buf = vec![0u8; 2048];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                error!("discovery recv error: {e}");
                continue;
            }
        };

        if !is_discover_request(&buf[..len]) {
            debug!("ignoring {len}-byte datagram from {src}");
            continue;
        }

        debug!("discovery request from {src}");
        send_discover_response(&socket, &host, src);
    }

    info!("discovery responder stopped");
}

/// Sends a freshly timestamped response to `dest`.
fn send_discover_response(socket: &UdpSocket, host: &Device, dest: SocketAddr) {
    let response = DiscoverResponse::for_host(host, Some(host.port), now_ms());
    match response.to_bytes() {
        Ok(bytes) => {
            if let Err(e) = socket.send_to(&bytes, dest) {
                warn!("failed to send discovery response to {dest}: {e}");
            }
        }
        Err(e) => error!("failed to encode discovery response: {e}"),
    }
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use localdesk_core::{DeviceId, DeviceKind};

    #[test]
    fn test_is_timeout_error_recognises_timed_out() {
        // Arrange
        let e = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");

        // Act / Assert
        assert!(is_timeout_error(&e));
    }

    #[test]
    fn test_is_timeout_error_recognises_would_block() {
        let e = std::io::Error::new(std::io::ErrorKind::WouldBlock, "would block");
        assert!(is_timeout_error(&e));
    }

    #[test]
    fn test_is_timeout_error_returns_false_for_other_errors() {
        let e = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(!is_timeout_error(&e));
    }

    #[test]
    fn test_start_discovery_responder_reports_bound_port() {
        // Arrange
        let running = Arc::new(AtomicBool::new(false)); // loop exits immediately
        let host = Device {
            id: DeviceId::new("host-1"),
            name: "Desk".to_string(),
            kind: DeviceKind::Desktop,
            host: String::new(),
            port: 3100,
        };

        // Act
        let local = start_discovery_responder("127.0.0.1:0".parse().unwrap(), host, running)
            .expect("bind must succeed");

        // Assert
        assert_ne!(local.port(), 0);
    }
}

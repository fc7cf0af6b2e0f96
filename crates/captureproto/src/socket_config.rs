//! Centralized ZMQ socket configuration for the control channel.
//!
//! Both ends of the channel go through these helpers so the options stay
//! consistent.
//!
//! - `LINGER` = 0 so closing a socket never blocks the presenting thread
//! - `RECONNECT_IVL` = 100ms so a freshly launched service is picked up fast
//! - `RECONNECT_IVL_MAX` = 5s to cap reconnect backoff
//! - `IMMEDIATE` on REQ so requests are not queued to a peer that is not there

use anyhow::{Context, Result};
use tracing::warn;

/// Default reconnect interval in milliseconds
pub const DEFAULT_RECONNECT_IVL_MS: i32 = 100;

/// Maximum reconnect interval in milliseconds
pub const DEFAULT_RECONNECT_IVL_MAX_MS: i32 = 5_000;

/// Apply the standard options. Failures are logged, not fatal.
pub fn configure_socket(socket: &zmq::Socket, name: &str) {
    if let Err(e) = socket.set_linger(0) {
        warn!("{}: Failed to set LINGER: {}", name, e);
    }

    if let Err(e) = socket.set_reconnect_ivl(DEFAULT_RECONNECT_IVL_MS) {
        warn!("{}: Failed to set RECONNECT_IVL: {}", name, e);
    }

    if let Err(e) = socket.set_reconnect_ivl_max(DEFAULT_RECONNECT_IVL_MAX_MS) {
        warn!("{}: Failed to set RECONNECT_IVL_MAX: {}", name, e);
    }
}

/// Create and configure a REQ socket, then connect to an endpoint.
///
/// `connect()` does not wait for the peer; the service may not be up yet.
pub fn create_req_and_connect(ctx: &zmq::Context, endpoint: &str, name: &str) -> Result<zmq::Socket> {
    let socket = ctx
        .socket(zmq::REQ)
        .with_context(|| format!("Failed to create {} REQ socket", name))?;

    configure_socket(&socket, name);

    if let Err(e) = socket.set_immediate(true) {
        warn!("{}: Failed to set IMMEDIATE: {}", name, e);
    }

    socket
        .connect(endpoint)
        .with_context(|| format!("Failed to connect {} socket to {}", name, endpoint))?;

    Ok(socket)
}

/// Create and configure a REP socket, then bind to an endpoint.
pub fn create_rep_and_bind(ctx: &zmq::Context, endpoint: &str, name: &str) -> Result<zmq::Socket> {
    let socket = ctx
        .socket(zmq::REP)
        .with_context(|| format!("Failed to create {} REP socket", name))?;

    configure_socket(&socket, name);

    socket
        .bind(endpoint)
        .with_context(|| format!("Failed to bind {} socket to {}", name, endpoint))?;

    Ok(socket)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constants() {
        assert_eq!(DEFAULT_RECONNECT_IVL_MS, 100);
        assert!(DEFAULT_RECONNECT_IVL_MAX_MS > DEFAULT_RECONNECT_IVL_MS);
    }

    #[test]
    fn test_connect_without_peer() {
        let ctx = zmq::Context::new();
        let socket = create_req_and_connect(&ctx, "tcp://127.0.0.1:59990", "test");
        assert!(socket.is_ok());
    }

    #[test]
    fn test_bad_endpoint_is_an_error() {
        let ctx = zmq::Context::new();
        let err = create_req_and_connect(&ctx, "not-an-endpoint", "test")
            .err()
            .expect("expected an error for a bad endpoint");
        assert!(err.to_string().contains("not-an-endpoint"));
    }
}

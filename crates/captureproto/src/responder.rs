//! REP side of the control channel.
//!
//! The capture service owns this end. `ControlResponder` does the framing so
//! a service only decides what each request means for its own state.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::frame::CaptureFrame;
use crate::messages::{CaptureReply, CaptureRequest};
use crate::socket_config::create_rep_and_bind;

/// A decoded request waiting for its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncomingRequest {
    pub request: CaptureRequest,
    pub request_id: Uuid,
}

/// Bound REP socket that decodes requests and encodes replies.
pub struct ControlResponder {
    // Keeps the context alive for as long as the socket
    _ctx: zmq::Context,
    socket: zmq::Socket,
    name: String,
}

impl ControlResponder {
    pub fn bind(endpoint: &str, name: &str) -> Result<Self> {
        let ctx = zmq::Context::new();
        let socket = create_rep_and_bind(&ctx, endpoint, name)?;
        Ok(Self {
            _ctx: ctx,
            socket,
            name: name.to_string(),
        })
    }

    /// Wait up to `timeout` for the next request.
    ///
    /// Returns `Ok(None)` on timeout. A malformed request is answered with a
    /// rejection (REP must reply before it can receive again) and skipped.
    pub fn recv(&self, timeout: Duration) -> Result<Option<IncomingRequest>> {
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        if self.socket.poll(zmq::POLLIN, timeout_ms)? == 0 {
            return Ok(None);
        }

        let parts = self
            .socket
            .recv_multipart(0)
            .with_context(|| format!("{}: failed to receive request", self.name))?;

        let decoded = CaptureFrame::from_frames(&parts[..]).and_then(|frame| {
            CaptureRequest::from_command(frame.command).map(|request| IncomingRequest {
                request,
                request_id: frame.request_id,
            })
        });

        match decoded {
            Ok(incoming) => {
                debug!("{}: received {} ({})", self.name, incoming.request, incoming.request_id);
                Ok(Some(incoming))
            }
            Err(e) => {
                warn!("{}: dropping malformed request: {}", self.name, e);
                let reply = CaptureFrame::reply(Uuid::nil(), &CaptureReply::rejected(e.to_string()))?;
                self.send_frame(&reply)?;
                Ok(None)
            }
        }
    }

    /// Answer a request previously returned by `recv`.
    pub fn reply(&self, incoming: &IncomingRequest, reply: &CaptureReply) -> Result<()> {
        let frame = CaptureFrame::reply(incoming.request_id, reply)?;
        self.send_frame(&frame)
    }

    fn send_frame(&self, frame: &CaptureFrame) -> Result<()> {
        let frames = frame.to_frames();
        self.socket
            .send_multipart(frames.iter().map(|f| &f[..]), 0)
            .with_context(|| format!("{}: failed to send reply", self.name))
    }
}

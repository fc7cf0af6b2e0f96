//! Blocking REQ client for the capture service control channel.
//!
//! Key principles from zguide Chapter 4:
//! - connect() is non-blocking - the service does not need to exist yet
//! - A REQ socket that missed a reply is unusable; close it and open a new one
//! - Health is tracked from replies, not from socket state
//! - A dead service is not asked again until its retry interval passes
//!
//! Every request is bounded by `LazyPirateConfig::reply_timeout` per attempt, so a
//! hung service costs the caller at most `worst_case_block()`.
//!
//! Usage:
//! ```ignore
//! let mut client = CaptureClient::connect(ClientConfig::new("layer", "tcp://127.0.0.1:44767"))?;
//! if client.start_capture()? {
//!     // the service is recording
//! }
//! ```

use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::frame::{CaptureFrame, Command, FrameError};
use crate::lazy_pirate::LazyPirateConfig;
use crate::messages::{CaptureReply, CaptureRequest};
use crate::socket_config::create_req_and_connect;

/// Connection state - tracks if peer is responding, not ZMQ socket state
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Never received a response from peer
    Unknown = 0,
    /// Peer is responding to requests
    Connected = 1,
    /// Peer stopped responding (too many failures)
    Dead = 2,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Unknown => "unknown",
            ConnectionState::Connected => "connected",
            ConnectionState::Dead => "dead",
        }
    }
}

/// Health tracking based on request/response success
#[derive(Debug)]
pub struct HealthTracker {
    state: ConnectionState,
    consecutive_failures: u32,
    max_failures: u32,
    last_failure: Option<Instant>,
}

impl HealthTracker {
    pub fn new(max_failures: u32) -> Self {
        Self {
            state: ConnectionState::Unknown,
            consecutive_failures: 0,
            max_failures,
            last_failure: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state != ConnectionState::Dead
    }

    pub fn failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether a request may go out at `now`.
    ///
    /// Always while alive. Once dead, only when `dead_retry_interval` has passed
    /// since the last failure.
    pub fn admits(&self, now: Instant, dead_retry_interval: Duration) -> bool {
        if self.is_alive() {
            return true;
        }
        self.last_failure
            .map_or(true, |at| now.saturating_duration_since(at) >= dead_retry_interval)
    }

    /// Record a reply. Returns the previous state if it changed.
    pub fn record_success(&mut self) -> Option<ConnectionState> {
        self.consecutive_failures = 0;
        self.last_failure = None;
        self.transition(ConnectionState::Connected)
    }

    /// Record a missed reply. Returns the previous state if it changed.
    pub fn record_failure(&mut self) -> Option<ConnectionState> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure = Some(Instant::now());
        if self.consecutive_failures >= self.max_failures {
            self.transition(ConnectionState::Dead)
        } else {
            None
        }
    }

    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionState> {
        if self.state == next {
            return None;
        }
        let previous = self.state;
        self.state = next;
        Some(previous)
    }
}

/// Errors from a control request.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("Failed to open control socket: {0:#}")]
    Connect(anyhow::Error),
    #[error("ZMQ error: {0}")]
    Zmq(#[from] zmq::Error),
    #[error("No reply to {request} after {attempts} attempt(s)")]
    Timeout {
        request: CaptureRequest,
        attempts: u32,
    },
    #[error("{request} not sent: no connected peer")]
    NotDelivered { request: CaptureRequest },
    #[error("{request} not sent: capture service is not responding")]
    ServiceDead { request: CaptureRequest },
    #[error("Malformed reply: {0}")]
    Frame(#[from] FrameError),
    #[error("Reply does not match request {expected}")]
    RequestIdMismatch { expected: uuid::Uuid },
    #[error("Expected a reply frame, got {0:?}")]
    UnexpectedCommand(Command),
}

impl ControlError {
    /// False when the request certainly never reached the service, so its
    /// state is unchanged. True when it was sent and the outcome is unknown.
    pub fn may_have_reached_service(&self) -> bool {
        !matches!(
            self,
            ControlError::Connect(_)
                | ControlError::NotDelivered { .. }
                | ControlError::ServiceDead { .. }
        )
    }
}

/// Configuration for CaptureClient
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Name used in log lines
    pub name: String,
    /// ZMQ endpoint (e.g., "tcp://127.0.0.1:44767")
    pub endpoint: String,
    /// Retry and timeout policy
    pub pirate: LazyPirateConfig,
}

impl ClientConfig {
    pub fn new(name: &str, endpoint: &str) -> Self {
        Self {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            pirate: LazyPirateConfig::default(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.pirate.reply_timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.pirate.retries = max_retries;
        self
    }

    pub fn with_dead_retry_interval(mut self, interval: Duration) -> Self {
        self.pirate.dead_retry_interval = interval;
        self
    }
}

/// Outcome of a single send/poll/receive attempt.
enum Attempt {
    Reply(CaptureReply),
    /// Sent, but no reply within the timeout
    Timeout,
    /// Nothing was sent; the socket has no connected peer
    NoPeer,
}

/// Blocking control client. One request in flight at a time.
pub struct CaptureClient {
    ctx: zmq::Context,
    socket: Option<zmq::Socket>,
    config: ClientConfig,
    health: HealthTracker,
}

impl CaptureClient {
    /// Open the REQ socket and connect. Does not wait for the service.
    pub fn connect(config: ClientConfig) -> Result<Self, ControlError> {
        let ctx = zmq::Context::new();
        let socket = create_req_and_connect(&ctx, &config.endpoint, &config.name)
            .map_err(ControlError::Connect)?;

        info!("{}: control client connecting to {}", config.name, config.endpoint);

        let health = HealthTracker::new(config.pirate.dead_after_failures);
        Ok(Self {
            ctx,
            socket: Some(socket),
            config,
            health,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Ask the service to start recording. `Ok(false)` means it refused.
    pub fn start_capture(&mut self) -> Result<bool, ControlError> {
        Ok(self.request(CaptureRequest::StartCapture)?.ok)
    }

    /// Ask the service to stop and persist the capture. `Ok(false)` means it refused.
    pub fn stop_and_save_capture(&mut self) -> Result<bool, ControlError> {
        Ok(self.request(CaptureRequest::StopAndSaveCapture)?.ok)
    }

    /// Ask the service to exit. Single attempt regardless of retry policy,
    /// sent even while the service is considered dead.
    pub fn shutdown_service(&mut self) -> Result<bool, ControlError> {
        let pirate = self.config.pirate.clone().with_retries(0);
        Ok(self.request_with(CaptureRequest::Shutdown, &pirate, false)?.ok)
    }

    /// Send a request with the configured Lazy Pirate policy.
    ///
    /// While the service is dead this fails with `ServiceDead` without
    /// sending, except for one attempt per retry interval.
    pub fn request(&mut self, request: CaptureRequest) -> Result<CaptureReply, ControlError> {
        let pirate = self.config.pirate.clone();
        self.request_with(request, &pirate, true)
    }

    fn request_with(
        &mut self,
        request: CaptureRequest,
        pirate: &LazyPirateConfig,
        gated: bool,
    ) -> Result<CaptureReply, ControlError> {
        if gated && !self.health.admits(Instant::now(), pirate.dead_retry_interval) {
            trace!("{}: skipping {}, service is dead", self.config.name, request);
            return Err(ControlError::ServiceDead { request });
        }

        let attempts = pirate.attempts();
        let mut delivered = false;

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = pirate.delay_before(attempt);
                debug!(
                    "{}: retrying {} (attempt {}/{}) after {:?}",
                    self.config.name,
                    request,
                    attempt + 1,
                    attempts,
                    backoff
                );
                std::thread::sleep(backoff);
            }

            match self.attempt(request, pirate.reply_timeout) {
                Ok(Attempt::Reply(reply)) => {
                    if let Some(previous) = self.health.record_success() {
                        info!(
                            "{}: capture service {} -> connected",
                            self.config.name,
                            previous.as_str()
                        );
                    }
                    return Ok(reply);
                }
                Ok(Attempt::NoPeer) => {
                    // Send never happened, the socket is still usable
                    self.record_failure();
                }
                Ok(Attempt::Timeout) => {
                    delivered = true;
                    self.record_failure();
                    // The REQ socket is waiting for a reply that may never
                    // come; it cannot send again.
                    self.reset_socket()?;
                }
                Err(e) => {
                    self.record_failure();
                    self.reset_socket()?;
                    return Err(e);
                }
            }
        }

        if delivered {
            Err(ControlError::Timeout { request, attempts })
        } else {
            Err(ControlError::NotDelivered { request })
        }
    }

    fn attempt(&mut self, request: CaptureRequest, timeout: Duration) -> Result<Attempt, ControlError> {
        if self.socket.is_none() {
            self.reset_socket()?;
        }
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ControlError::Connect(anyhow::anyhow!("socket unavailable")))?;

        let frame = CaptureFrame::request(request.command());
        let frames = frame.to_frames();
        trace!("{}: sending {} ({})", self.config.name, request, frame.request_id);

        // With IMMEDIATE set and no connected peer the send would block
        // forever; DONTWAIT turns that into EAGAIN.
        match socket.send_multipart(frames.iter().map(|f| &f[..]), zmq::DONTWAIT) {
            Ok(()) => {}
            Err(zmq::Error::EAGAIN) => {
                debug!("{}: no connected peer for {}", self.config.name, request);
                return Ok(Attempt::NoPeer);
            }
            Err(e) => return Err(ControlError::Zmq(e)),
        }

        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let ready = socket.poll(zmq::POLLIN, timeout_ms)?;
        if ready == 0 {
            warn!(
                "{}: no reply to {} within {:?}",
                self.config.name, request, timeout
            );
            return Ok(Attempt::Timeout);
        }

        let parts = socket.recv_multipart(0)?;
        let reply_frame = CaptureFrame::from_frames(&parts[..])?;

        if reply_frame.command != Command::Reply {
            return Err(ControlError::UnexpectedCommand(reply_frame.command));
        }
        if reply_frame.request_id != frame.request_id {
            return Err(ControlError::RequestIdMismatch {
                expected: frame.request_id,
            });
        }

        let reply: CaptureReply = reply_frame.body_json()?;
        debug!(
            "{}: {} -> ok={} {}",
            self.config.name,
            request,
            reply.ok,
            reply.message.as_deref().unwrap_or("")
        );
        Ok(Attempt::Reply(reply))
    }

    fn record_failure(&mut self) {
        if let Some(previous) = self.health.record_failure() {
            warn!(
                "{}: capture service {} -> dead after {} missed replies",
                self.config.name,
                previous.as_str(),
                self.health.failures()
            );
        }
    }

    /// Close the current socket and open a fresh one (Lazy Pirate reset).
    fn reset_socket(&mut self) -> Result<(), ControlError> {
        // Dropping closes; LINGER=0 discards anything still queued
        self.socket = None;
        let socket = create_req_and_connect(&self.ctx, &self.config.endpoint, &self.config.name)
            .map_err(ControlError::Connect)?;
        self.socket = Some(socket);
        Ok(())
    }
}

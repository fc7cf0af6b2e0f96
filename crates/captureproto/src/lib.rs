//! captureproto - control channel for the framewatch capture service
//!
//! The layer inside the monitored process talks to an out-of-process
//! capture service over a local ZMQ REQ/REP pair. This crate owns both
//! halves of that conversation:
//!
//! - `frame`: the FWCAP1 multipart wire format
//! - `messages`: `CaptureRequest` / `CaptureReply`
//! - `client`: `CaptureClient`, a blocking Lazy Pirate REQ client whose every
//!   request is bounded by a timeout
//! - `responder`: `ControlResponder`, the REP side a service binds
//!
//! The client is synchronous. It runs on the presenting thread, which has no
//! async runtime.

pub mod client;
pub mod frame;
pub mod lazy_pirate;
pub mod messages;
pub mod responder;
pub mod socket_config;

pub use client::{CaptureClient, ClientConfig, ConnectionState, ControlError, HealthTracker};
pub use frame::{CaptureFrame, Command, FrameError, FRAME_COUNT, PROTOCOL_VERSION};
pub use lazy_pirate::LazyPirateConfig;
pub use messages::{CaptureReply, CaptureRequest};
pub use responder::{ControlResponder, IncomingRequest};

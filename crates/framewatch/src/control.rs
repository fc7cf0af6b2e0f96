//! The seam between the trigger and whatever runs captures.
//!
//! The trigger needs to know whether the service did what was asked, was
//! refused, or might have acted without telling us. Transport detail stays
//! in the log.

use captureproto::{CaptureClient, ClientConfig, ControlError};
use framewatch_conf::ServiceConfig;
use tracing::{debug, warn};

use crate::error::LaunchError;

/// How the service answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The service changed state as asked.
    Accepted,
    /// The service said no. Its state is unchanged.
    Refused,
    /// The request never left this process: no connected peer, or the
    /// service is considered dead.
    NotSent,
    /// Sent, but no answer came back. The service may have acted.
    Unanswered,
}

impl RequestOutcome {
    pub fn is_accepted(self) -> bool {
        self == RequestOutcome::Accepted
    }

    fn from_reply(result: Result<bool, ControlError>, what: &str) -> Self {
        match result {
            Ok(true) => RequestOutcome::Accepted,
            Ok(false) => {
                debug!("capture service refused to {}", what);
                RequestOutcome::Refused
            }
            Err(e) if e.may_have_reached_service() => {
                warn!("{} request went unanswered: {}", what, e);
                RequestOutcome::Unanswered
            }
            Err(e) => {
                debug!("{} request not sent: {}", what, e);
                RequestOutcome::NotSent
            }
        }
    }
}

/// Start/stop/shutdown operations of the capture service.
pub trait CaptureControl: Send {
    fn start_capture(&mut self) -> RequestOutcome;

    fn stop_and_save(&mut self) -> RequestOutcome;

    /// Fire-and-forget; the result is not consulted.
    fn shutdown(&mut self);
}

impl CaptureControl for CaptureClient {
    fn start_capture(&mut self) -> RequestOutcome {
        RequestOutcome::from_reply(CaptureClient::start_capture(self), "start capture")
    }

    fn stop_and_save(&mut self) -> RequestOutcome {
        RequestOutcome::from_reply(self.stop_and_save_capture(), "stop and save")
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.shutdown_service() {
            debug!("shutdown request failed: {}", e);
        }
    }
}

/// Stand-in after a failed launch: nothing can be captured.
#[derive(Debug, Default)]
pub struct Unavailable;

impl CaptureControl for Unavailable {
    fn start_capture(&mut self) -> RequestOutcome {
        RequestOutcome::NotSent
    }

    fn stop_and_save(&mut self) -> RequestOutcome {
        RequestOutcome::NotSent
    }

    fn shutdown(&mut self) {}
}

/// Accepts every request and counts them. Used by `framewatch replay`.
#[derive(Debug, Default)]
pub struct DryRun {
    pub starts: u32,
    pub stops: u32,
    pub shutdowns: u32,
}

impl CaptureControl for DryRun {
    fn start_capture(&mut self) -> RequestOutcome {
        self.starts += 1;
        RequestOutcome::Accepted
    }

    fn stop_and_save(&mut self) -> RequestOutcome {
        self.stops += 1;
        RequestOutcome::Accepted
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}

/// Opens the control channel. Called before the service is launched;
/// connecting does not wait for the peer.
pub trait ControlConnector: Send {
    fn connect(&self, service: &ServiceConfig) -> Result<Box<dyn CaptureControl>, LaunchError>;
}

/// Connects a `CaptureClient` to the configured endpoint.
///
/// Start and stop get no in-call retries: the next frame is the retry.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZmqConnector;

impl ControlConnector for ZmqConnector {
    fn connect(&self, service: &ServiceConfig) -> Result<Box<dyn CaptureControl>, LaunchError> {
        let config = ClientConfig::new("framewatch", &service.endpoint)
            .with_timeout(service.rpc_timeout())
            .with_retries(0);
        let client = CaptureClient::connect(config)?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_refuses_everything() {
        let mut control = Unavailable;
        assert_eq!(control.start_capture(), RequestOutcome::NotSent);
        assert_eq!(control.stop_and_save(), RequestOutcome::NotSent);
        control.shutdown();
    }

    #[test]
    fn test_dry_run_counts() {
        let mut control = DryRun::default();
        assert!(control.start_capture().is_accepted());
        assert!(control.stop_and_save().is_accepted());
        control.shutdown();
        assert_eq!((control.starts, control.stops, control.shutdowns), (1, 1, 1));
    }

    #[test]
    fn test_zmq_connector_without_service() {
        let service = ServiceConfig {
            endpoint: "tcp://127.0.0.1:59971".to_string(),
            rpc_timeout_ms: 50,
            ..ServiceConfig::default()
        };
        let mut control = ZmqConnector.connect(&service).unwrap();
        // Nobody is listening: fails at once without sending
        assert_eq!(control.start_capture(), RequestOutcome::NotSent);
    }

    #[test]
    fn test_reply_mapping() {
        use captureproto::CaptureRequest;

        let request = CaptureRequest::StartCapture;
        assert_eq!(RequestOutcome::from_reply(Ok(true), "start"), RequestOutcome::Accepted);
        assert_eq!(RequestOutcome::from_reply(Ok(false), "start"), RequestOutcome::Refused);
        assert_eq!(
            RequestOutcome::from_reply(Err(ControlError::Timeout { request, attempts: 1 }), "start"),
            RequestOutcome::Unanswered
        );
        assert_eq!(
            RequestOutcome::from_reply(Err(ControlError::ServiceDead { request }), "start"),
            RequestOutcome::NotSent
        );
    }
}

//! Request and reply types carried over the control channel.

use serde::{Deserialize, Serialize};

use crate::frame::{Command, FrameError};

/// Operations the capture service exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureRequest {
    StartCapture,
    StopAndSaveCapture,
    Shutdown,
}

impl CaptureRequest {
    pub fn command(self) -> Command {
        match self {
            CaptureRequest::StartCapture => Command::StartCapture,
            CaptureRequest::StopAndSaveCapture => Command::StopAndSaveCapture,
            CaptureRequest::Shutdown => Command::Shutdown,
        }
    }

    /// Map a wire command back to a request. `Reply` is not a request.
    pub fn from_command(command: Command) -> Result<Self, FrameError> {
        match command {
            Command::StartCapture => Ok(CaptureRequest::StartCapture),
            Command::StopAndSaveCapture => Ok(CaptureRequest::StopAndSaveCapture),
            Command::Shutdown => Ok(CaptureRequest::Shutdown),
            Command::Reply => Err(FrameError::InvalidCommand(command.to_u16())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CaptureRequest::StartCapture => "start_capture",
            CaptureRequest::StopAndSaveCapture => "stop_and_save_capture",
            CaptureRequest::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for CaptureRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service answer to a request.
///
/// `ok` is true only when the service's own state moved as asked. A
/// start while a capture is already running comes back `ok: false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReply {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CaptureReply {
    pub fn accepted() -> Self {
        Self {
            ok: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_command_mapping() {
        for request in [
            CaptureRequest::StartCapture,
            CaptureRequest::StopAndSaveCapture,
            CaptureRequest::Shutdown,
        ] {
            assert_eq!(CaptureRequest::from_command(request.command()).unwrap(), request);
        }
        assert!(CaptureRequest::from_command(Command::Reply).is_err());
    }

    #[test]
    fn test_reply_json_shape() {
        let json = serde_json::to_string(&CaptureReply::accepted()).unwrap();
        assert_eq!(json, r#"{"ok":true}"#);

        let reply: CaptureReply = serde_json::from_str(r#"{"ok":false,"message":"no capture running"}"#).unwrap();
        assert_eq!(reply, CaptureReply::rejected("no capture running"));
    }
}

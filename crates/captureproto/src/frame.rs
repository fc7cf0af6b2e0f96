//! FWCAP1 Frame Protocol
//!
//! Every control message, request or reply, is a 4-frame ZMQ multipart
//! message. The command and request id sit in fixed-width frames so a
//! reply can be matched to its request without touching the body.
//!
//! ## Wire Format
//!
//! ```text
//! Frame 0: Protocol version    "FWCAP1" (6 bytes)
//! Frame 1: Command             2 bytes (big-endian u16)
//! Frame 2: Request ID          16 bytes (UUID)
//! Frame 3: Body                JSON, or empty
//! ```
//!
//! Requests carry an empty body. Replies carry a JSON `CaptureReply`.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Protocol version - bump on breaking changes
pub const PROTOCOL_VERSION: &[u8] = b"FWCAP1";

/// Number of frames in a FWCAP1 message
pub const FRAME_COUNT: usize = 4;

/// Command types for the FWCAP1 protocol (2 bytes, big-endian)
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Begin recording a capture
    StartCapture = 0x0001,
    /// Stop the running capture and persist it
    StopAndSaveCapture = 0x0002,
    /// Ask the service process to exit
    Shutdown = 0x0003,
    /// Service answer to any of the above
    Reply = 0x0010,
}

impl Command {
    /// Parse a u16 into a Command
    pub fn from_u16(value: u16) -> Result<Self, FrameError> {
        match value {
            0x0001 => Ok(Command::StartCapture),
            0x0002 => Ok(Command::StopAndSaveCapture),
            0x0003 => Ok(Command::Shutdown),
            0x0010 => Ok(Command::Reply),
            other => Err(FrameError::InvalidCommand(other)),
        }
    }

    /// Convert Command to u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Errors during frame parsing
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("Invalid protocol version: expected FWCAP1")]
    InvalidProtocol,
    #[error("Missing frame: expected 4 frames, got {0}")]
    MissingFrame(usize),
    #[error("Invalid command: {0:#06x}")]
    InvalidCommand(u16),
    #[error("Invalid UUID in request ID")]
    InvalidUuid,
    #[error("Frame too short: expected {expected} bytes, got {actual}")]
    FrameTooShort { expected: usize, actual: usize },
    #[error("JSON body error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Message has an empty body")]
    EmptyBody,
}

/// A parsed FWCAP1 multipart message
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureFrame {
    pub command: Command,
    pub request_id: Uuid,
    pub body: Bytes,
}

impl CaptureFrame {
    /// A request frame with a fresh request id and no body
    pub fn request(command: Command) -> Self {
        Self {
            command,
            request_id: Uuid::new_v4(),
            body: Bytes::new(),
        }
    }

    /// A reply to `request_id` with a JSON body
    pub fn reply<T: Serialize>(request_id: Uuid, body: &T) -> Result<Self, FrameError> {
        let json = serde_json::to_vec(body)?;
        Ok(Self {
            command: Command::Reply,
            request_id,
            body: Bytes::from(json),
        })
    }

    /// Decode the JSON body
    pub fn body_json<T: DeserializeOwned>(&self) -> Result<T, FrameError> {
        if self.body.is_empty() {
            return Err(FrameError::EmptyBody);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Parse a list of frames into a CaptureFrame
    pub fn from_frames<F: AsRef<[u8]>>(frames: &[F]) -> Result<Self, FrameError> {
        if frames.len() != FRAME_COUNT {
            return Err(FrameError::MissingFrame(frames.len()));
        }

        if frames[0].as_ref() != PROTOCOL_VERSION {
            return Err(FrameError::InvalidProtocol);
        }

        let cmd_frame = frames[1].as_ref();
        if cmd_frame.len() < 2 {
            return Err(FrameError::FrameTooShort {
                expected: 2,
                actual: cmd_frame.len(),
            });
        }
        let command = Command::from_u16(u16::from_be_bytes([cmd_frame[0], cmd_frame[1]]))?;

        let reqid_frame = frames[2].as_ref();
        if reqid_frame.len() < 16 {
            return Err(FrameError::FrameTooShort {
                expected: 16,
                actual: reqid_frame.len(),
            });
        }
        let request_id =
            Uuid::from_slice(&reqid_frame[..16]).map_err(|_| FrameError::InvalidUuid)?;

        let body = Bytes::copy_from_slice(frames[3].as_ref());

        Ok(CaptureFrame {
            command,
            request_id,
            body,
        })
    }

    /// Serialize to a list of frame bytes (4 frames)
    pub fn to_frames(&self) -> Vec<Bytes> {
        let mut frames = Vec::with_capacity(FRAME_COUNT);

        frames.push(Bytes::from_static(PROTOCOL_VERSION));

        let mut cmd_buf = BytesMut::with_capacity(2);
        cmd_buf.put_u16(self.command.to_u16());
        frames.push(cmd_buf.freeze());

        frames.push(Bytes::copy_from_slice(self.request_id.as_bytes()));

        frames.push(self.body.clone());

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CaptureReply;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_command_values() {
        assert_eq!(Command::StartCapture.to_u16(), 0x0001);
        assert_eq!(Command::StopAndSaveCapture.to_u16(), 0x0002);
        assert_eq!(Command::Shutdown.to_u16(), 0x0003);
        assert_eq!(Command::from_u16(0x0010).unwrap(), Command::Reply);
        assert!(matches!(
            Command::from_u16(0x00ff),
            Err(FrameError::InvalidCommand(0x00ff))
        ));
    }

    #[test]
    fn test_request_frame_layout() {
        let frame = CaptureFrame::request(Command::StopAndSaveCapture);
        let frames = frame.to_frames();

        assert_eq!(frames.len(), FRAME_COUNT);
        assert_eq!(frames[0].as_ref(), b"FWCAP1");
        assert_eq!(frames[1].as_ref(), &[0x00, 0x02]);
        assert_eq!(frames[2].as_ref(), frame.request_id.as_bytes());
        assert!(frames[3].is_empty());
    }

    #[test]
    fn test_reply_body_decodes() {
        let request = CaptureFrame::request(Command::StartCapture);
        let reply = CaptureFrame::reply(request.request_id, &CaptureReply::rejected("busy")).unwrap();

        let parsed = CaptureFrame::from_frames(&reply.to_frames()).unwrap();
        assert_eq!(parsed.command, Command::Reply);
        assert_eq!(parsed.request_id, request.request_id);

        let body: CaptureReply = parsed.body_json().unwrap();
        assert!(!body.ok);
        assert_eq!(body.message.as_deref(), Some("busy"));
    }

    #[test]
    fn test_rejects_wrong_protocol() {
        let mut frames = CaptureFrame::request(Command::Shutdown).to_frames();
        frames[0] = Bytes::from_static(b"HOOT01");
        assert!(matches!(
            CaptureFrame::from_frames(&frames),
            Err(FrameError::InvalidProtocol)
        ));
    }

    #[test]
    fn test_rejects_missing_frames() {
        let frames = CaptureFrame::request(Command::Shutdown).to_frames();
        assert!(matches!(
            CaptureFrame::from_frames(&frames[..3]),
            Err(FrameError::MissingFrame(3))
        ));
    }

    #[test]
    fn test_rejects_short_request_id() {
        let mut frames = CaptureFrame::request(Command::StartCapture).to_frames();
        frames[2] = Bytes::from_static(&[1, 2, 3]);
        assert!(matches!(
            CaptureFrame::from_frames(&frames),
            Err(FrameError::FrameTooShort {
                expected: 16,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_empty_body_is_an_error() {
        let frame = CaptureFrame::request(Command::StartCapture);
        assert!(matches!(
            frame.body_json::<CaptureReply>(),
            Err(FrameError::EmptyBody)
        ));
    }
}

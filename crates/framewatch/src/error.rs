use std::io;
use std::path::PathBuf;

use captureproto::ControlError;
use thiserror::Error;

/// Service bring-up failed. Logged, never handed to the host.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("failed to spawn capture service {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to open control channel: {0}")]
    Connect(#[from] ControlError),
}

use std::time::Duration;

use thiserror::Error;

/// Camera subsystem errors.
///
/// Everything except `InvalidAddress` and `ThreadSpawn` is recoverable: the
/// grab worker absorbs it, drops back to `Disconnected` and reconnects.
#[derive(Debug, Clone, Error)]
pub enum CameraError {
    #[error("invalid camera address: {0}")]
    InvalidAddress(String),

    #[error("could not connect to camera at {url}: {reason}")]
    ConnectFailure { url: String, reason: String },

    #[error("stream read failed: {0}")]
    StreamReadFailure(String),

    #[error("stream buffer overflow: {len} bytes exceeds cap of {cap}")]
    BufferOverflow { len: usize, cap: usize },

    #[error("frame decode failed: {0}")]
    FrameDecodeFailure(String),

    #[error("no frame received for {0:?}")]
    Stalled(Duration),

    #[error("failed to spawn {0} thread: {1}")]
    ThreadSpawn(&'static str, String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, CameraError>;

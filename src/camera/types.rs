use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::camera::error::CameraError;

/// Port the Dremel camera streamer listens on.
pub const DEFAULT_STREAM_PORT: u16 = 10123;

/// Host/port of a printer's MJPEG endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CameraAddress {
    host: String,
    port: u16,
}

impl CameraAddress {
    /// Create an address, rejecting hosts that cannot appear in a URL
    /// authority.
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, CameraError> {
        let host = host.into();
        let host = host.trim();
        if host.is_empty()
            || host
                .chars()
                .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
        {
            return Err(CameraError::InvalidAddress(host.to_string()));
        }
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL of the MJPEG stream served by the printer.
    pub fn stream_url(&self) -> String {
        format!("http://{}:{}/?action=stream", self.host, self.port)
    }
}

impl FromStr for CameraAddress {
    type Err = CameraError;

    /// Parse `host` or `host:port`. A leading `http://` is tolerated.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let s = s.strip_prefix("http://").unwrap_or(s);
        let s = s.trim_end_matches('/');
        match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|_| CameraError::InvalidAddress(s.to_string()))?;
                Self::new(host, port)
            }
            None => Self::new(s, DEFAULT_STREAM_PORT),
        }
    }
}

impl fmt::Display for CameraAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Lifecycle of a camera connection.
///
/// Variants are ordered by progress, so `state >= ConnectionState::Connected`
/// reads as "the stream is open".
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Grabbing = 3,
    Stopping = 4,
}

impl ConnectionState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Grabbing,
            _ => Self::Stopping,
        }
    }

    /// Whether a stream is open and frames are expected.
    pub fn is_streaming(self) -> bool {
        matches!(self, Self::Connected | Self::Grabbing)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Grabbing => "grabbing",
            Self::Stopping => "stopping",
        };
        f.write_str(label)
    }
}

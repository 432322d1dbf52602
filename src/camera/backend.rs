use std::io::{self, Read};
use std::time::Duration;

use crate::camera::error::{CameraError, Result};
use crate::camera::types::CameraAddress;

/// An open MJPEG byte stream.
///
/// Reads must give up after a bounded time (returning `TimedOut`/`WouldBlock`)
/// so the worker can notice stop requests.
pub type CameraStream = Box<dyn Read + Send>;

/// Source of camera streams.
///
/// The production implementation talks HTTP to the printer; tests script
/// byte streams and failures.
pub trait CameraBackend: Send + Sync {
    /// Open the MJPEG stream at `address`, failing with
    /// [`CameraError::ConnectFailure`] if it cannot be opened within
    /// `connect_timeout`.
    fn open_stream(
        &self,
        address: &CameraAddress,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<CameraStream>;
}

/// Opens `http://<host>:<port>/?action=stream` and hands back the response
/// body as an opaque byte stream.
#[derive(Debug, Default)]
pub struct HttpBackend;

impl HttpBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for HttpBackend {
    fn open_stream(
        &self,
        address: &CameraAddress,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Result<CameraStream> {
        let url = address.stream_url();
        let connect_failure = |reason: String| CameraError::ConnectFailure {
            url: url.clone(),
            reason,
        };

        // The blocking client applies `timeout` to waiting for the response
        // headers as well as to each body read, so it must cover the open.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout.max(read_timeout))
            .build()
            .map_err(|e| connect_failure(e.to_string()))?;

        let response = client
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| connect_failure(e.to_string()))?;

        tracing::debug!(
            "camera stream opened at {url} ({:?})",
            response.headers().get(reqwest::header::CONTENT_TYPE)
        );
        Ok(Box::new(HttpStream(response)))
    }
}

/// Response body whose read timeouts surface as `ErrorKind::TimedOut`, so a
/// quiet second is not mistaken for a broken stream.
struct HttpStream(reqwest::blocking::Response);

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).map_err(|e| {
            let timed_out = e
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                .is_some_and(|inner| inner.is_timeout());
            if timed_out {
                io::Error::new(io::ErrorKind::TimedOut, e)
            } else {
                e
            }
        })
    }
}

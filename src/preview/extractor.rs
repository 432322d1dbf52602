//! Incremental JPEG frame extraction from an MJPEG byte stream.
//!
//! The stream is treated as opaque bytes: multipart boundaries and part
//! headers are skipped over simply because they sit outside the SOI/EOI
//! markers.

use crate::camera::error::{CameraError, Result};

/// JPEG start-of-image marker.
pub const SOI: [u8; 2] = [0xFF, 0xD8];
/// JPEG end-of-image marker.
pub const EOI: [u8; 2] = [0xFF, 0xD9];

/// Largest amount of undecoded data held before the connection is restarted.
pub const DEFAULT_BUFFER_CAP: usize = 5_000_000;

/// Accumulates stream bytes and cuts complete JPEG frames out of them.
///
/// The marker search resumes where the previous one stopped, so a long run
/// of data without an EOI is scanned once rather than on every read.
#[derive(Debug)]
pub struct MjpegFrameExtractor {
    buffer: Vec<u8>,
    cap: usize,
    /// Offset of the SOI of the frame currently being accumulated.
    start: Option<usize>,
    /// Where the next marker search begins.
    scan_from: usize,
}

impl MjpegFrameExtractor {
    pub fn new(cap: usize) -> Self {
        Self {
            buffer: Vec::new(),
            cap,
            start: None,
            scan_from: 0,
        }
    }

    /// Append freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Cut the next complete frame out of the buffer.
    ///
    /// The frame spans `[SOI, EOI + 2)`; everything before it, including any
    /// multipart headers, is discarded along with it.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let start = match self.start {
            Some(start) => start,
            None => match find_marker(&self.buffer, self.scan_from, SOI) {
                Some(start) => {
                    self.start = Some(start);
                    self.scan_from = start + SOI.len();
                    start
                }
                None => {
                    // a trailing 0xFF may be the first half of the marker
                    self.scan_from = self.buffer.len().saturating_sub(1);
                    return None;
                }
            },
        };

        match find_marker(&self.buffer, self.scan_from, EOI) {
            Some(eoi) => {
                let end = eoi + EOI.len();
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                self.start = None;
                self.scan_from = 0;
                Some(frame)
            }
            None => {
                self.scan_from = self
                    .buffer
                    .len()
                    .saturating_sub(1)
                    .max(start + SOI.len());
                None
            }
        }
    }

    /// Fail with [`CameraError::BufferOverflow`] once the undecoded backlog
    /// exceeds the cap.
    pub fn check_capacity(&self) -> Result<()> {
        if self.buffer.len() > self.cap {
            return Err(CameraError::BufferOverflow {
                len: self.buffer.len(),
                cap: self.cap,
            });
        }
        Ok(())
    }

    /// Drop everything buffered, e.g. when the connection restarts.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.start = None;
        self.scan_from = 0;
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

impl Default for MjpegFrameExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAP)
    }
}

fn find_marker(haystack: &[u8], from: usize, marker: [u8; 2]) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|pos| pos + from)
}

//! Scripted camera backend for testing without a printer on the network.
//!
//! Uses a builder pattern to queue up one script per connection attempt:
//! byte streams, endless filler, silence, read errors and connect failures.

use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::camera::backend::{CameraBackend, CameraStream};
use crate::camera::error::{CameraError, Result};
use crate::camera::types::CameraAddress;

/// One step of a scripted stream.
#[derive(Debug, Clone)]
pub enum Step {
    /// Deliver these bytes, split over as many reads as the reader needs.
    Data(Vec<u8>),
    /// Deliver `len` copies of `byte`.
    Fill { byte: u8, len: usize },
    /// Fail the next read with this error kind.
    Error(io::ErrorKind),
    /// Never deliver anything again; every read times out after a short
    /// pause.
    Silence,
}

/// What the backend does for one `open_stream` call.
#[derive(Debug, Clone)]
enum Attempt {
    Stream(Vec<Step>),
    Fail(String),
}

/// Mock camera backend.
///
/// Once the scripted attempts run out, every further connect fails after
/// `exhausted_delay`, which keeps reconnect loops in tests from spinning hot.
pub struct MockBackend {
    attempts: Mutex<VecDeque<Attempt>>,
    opened: AtomicUsize,
    exhausted_delay: Duration,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            attempts: Mutex::new(VecDeque::new()),
            opened: AtomicUsize::new(0),
            exhausted_delay: Duration::from_millis(5),
        }
    }

    /// Queue a connection that yields `chunks` and then closes.
    pub fn with_stream(self, chunks: Vec<Vec<u8>>) -> Self {
        self.with_steps(chunks.into_iter().map(Step::Data).collect())
    }

    /// Queue a connection that plays `steps` and then closes.
    pub fn with_steps(self, steps: Vec<Step>) -> Self {
        self.attempts.lock().push_back(Attempt::Stream(steps));
        self
    }

    /// Queue a failed connection attempt.
    pub fn with_connect_failure(self, reason: &str) -> Self {
        self.attempts
            .lock()
            .push_back(Attempt::Fail(reason.to_string()));
        self
    }

    /// Number of `open_stream` calls made so far, successful or not.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraBackend for MockBackend {
    fn open_stream(
        &self,
        address: &CameraAddress,
        _connect_timeout: Duration,
        _read_timeout: Duration,
    ) -> Result<CameraStream> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        let next = self.attempts.lock().pop_front();
        match next {
            Some(Attempt::Stream(steps)) => Ok(Box::new(ScriptedStream {
                steps: steps.into(),
            })),
            Some(Attempt::Fail(reason)) => Err(CameraError::ConnectFailure {
                url: address.stream_url(),
                reason,
            }),
            None => {
                std::thread::sleep(self.exhausted_delay);
                Err(CameraError::ConnectFailure {
                    url: address.stream_url(),
                    reason: "mock script exhausted".to_string(),
                })
            }
        }
    }
}

struct ScriptedStream {
    steps: VecDeque<Step>,
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let Some(step) = self.steps.front_mut() else {
                return Ok(0);
            };
            match step {
                Step::Data(bytes) => {
                    if bytes.is_empty() {
                        self.steps.pop_front();
                        continue;
                    }
                    let n = bytes.len().min(buf.len());
                    buf[..n].copy_from_slice(&bytes[..n]);
                    bytes.drain(..n);
                    return Ok(n);
                }
                Step::Fill { byte, len } => {
                    if *len == 0 {
                        self.steps.pop_front();
                        continue;
                    }
                    let n = (*len).min(buf.len());
                    buf[..n].fill(*byte);
                    *len -= n;
                    return Ok(n);
                }
                Step::Error(kind) => {
                    let kind = *kind;
                    self.steps.pop_front();
                    return Err(io::Error::new(kind, "scripted read error"));
                }
                Step::Silence => {
                    std::thread::sleep(Duration::from_millis(2));
                    return Err(io::Error::new(io::ErrorKind::TimedOut, "no data"));
                }
            }
        }
    }
}

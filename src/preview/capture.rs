use parking_lot::Mutex;
use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::codec;
use super::extractor::{MjpegFrameExtractor, DEFAULT_BUFFER_CAP};
use crate::camera::backend::CameraBackend;
use crate::camera::error::{CameraError, Result};
use crate::camera::types::{CameraAddress, ConnectionState};
use crate::diagnostics::stats::{DiagnosticSnapshot, DiagnosticStats};

/// Called with the new state whenever the connection changes state.
pub type StateCallback = Arc<dyn Fn(ConnectionState) + Send + Sync>;

/// Called once per decoded frame, in decode order.
pub type FrameCallback = Arc<dyn Fn(&Arc<Frame>) + Send + Sync>;

/// A single decoded frame from the camera.
pub struct Frame {
    /// The JPEG exactly as cut from the stream, SOI through EOI.
    pub jpeg: Vec<u8>,
    /// Raw pixel data (RGB).
    pub data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Microseconds since the session started.
    pub timestamp_us: u64,
}

/// Thread-safe ring buffer for camera frames.
///
/// Stores up to `capacity` frames, overwriting the oldest when full.
/// Frames are wrapped in `Arc` so consumers get a cheap reference-counted
/// pointer instead of cloning pixel buffers.
pub struct FrameBuffer {
    frames: Mutex<Vec<Option<Arc<Frame>>>>,
    capacity: usize,
    write_idx: Mutex<usize>,
    /// Monotonic counter incremented on each push.
    sequence: AtomicU64,
}

impl FrameBuffer {
    /// Create a new ring buffer holding at least one frame.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let frames = (0..capacity).map(|_| None).collect();
        Self {
            frames: Mutex::new(frames),
            capacity,
            write_idx: Mutex::new(0),
            sequence: AtomicU64::new(0),
        }
    }

    /// Push a new frame into the buffer, overwriting the oldest if full.
    pub fn push(&self, frame: Arc<Frame>) {
        let mut frames = self.frames.lock();
        let mut idx = self.write_idx.lock();
        frames[*idx] = Some(frame);
        *idx = (*idx + 1) % self.capacity;
        self.sequence.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of frames pushed so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }

    /// Get the most recently pushed frame, if any.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        let frames = self.frames.lock();
        let idx = self.write_idx.lock();
        let latest_idx = if *idx == 0 {
            self.capacity - 1
        } else {
            *idx - 1
        };
        frames[latest_idx].clone()
    }
}

/// Tunables for the grab worker.
#[derive(Debug, Clone)]
pub struct GrabConfig {
    /// How long opening the stream may take.
    pub connect_timeout: Duration,
    /// Requested bound on a single blocking read, which bounds stop latency.
    /// The HTTP backend waits at least `connect_timeout`.
    pub read_timeout: Duration,
    /// Longest tolerated silence between frames before reconnecting.
    pub max_frame_gap: Duration,
    /// Bytes requested per read.
    pub chunk_size: usize,
    /// Undecoded backlog that forces a reconnect.
    pub buffer_cap: usize,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(1),
            max_frame_gap: Duration::from_secs(5),
            chunk_size: 1024,
            buffer_cap: DEFAULT_BUFFER_CAP,
        }
    }
}

/// Configuration for the stall watchdog.
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Poll interval for the watchdog thread.
    pub poll_interval: Duration,
    /// Silence after which a streaming connection is restarted.
    pub frame_timeout: Duration,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            frame_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Default)]
struct Timing {
    connected_at: Option<Instant>,
    last_frame: Option<Instant>,
}

/// Shared state of one camera connection.
///
/// Readable from any thread. Only the grab worker changes `state`; the
/// watchdog and the session owner communicate with it through the stop and
/// restart flags.
pub struct CameraConnection {
    address: CameraAddress,
    state: AtomicU8,
    reconnect_attempts: AtomicU32,
    timing: Mutex<Timing>,
    stop: AtomicBool,
    restart: AtomicBool,
    on_state: Option<StateCallback>,
}

impl CameraConnection {
    pub fn new(address: CameraAddress, on_state: Option<StateCallback>) -> Self {
        Self {
            address,
            state: AtomicU8::new(ConnectionState::Disconnected as u8),
            reconnect_attempts: AtomicU32::new(0),
            timing: Mutex::new(Timing::default()),
            stop: AtomicBool::new(false),
            restart: AtomicBool::new(false),
            on_state,
        }
    }

    pub fn address(&self) -> &CameraAddress {
        &self.address
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Failed connection attempts since the last decoded frame.
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts.load(Ordering::SeqCst)
    }

    /// When the last frame was decoded, if ever.
    pub fn last_frame_at(&self) -> Option<Instant> {
        self.timing.lock().last_frame
    }

    /// Time since the stream last showed signs of life: the most recent of
    /// the connect and the last decoded frame.
    pub fn idle_for(&self) -> Duration {
        let timing = self.timing.lock();
        timing
            .connected_at
            .max(timing.last_frame)
            .map(|t| t.elapsed())
            .unwrap_or_default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Ask the worker to drop the current stream and reconnect.
    pub fn request_restart(&self) {
        self.restart.store(true, Ordering::SeqCst);
    }

    fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::SeqCst)
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.swap(next as u8, Ordering::SeqCst);
        if prev != next as u8 {
            debug!(
                "camera {}: {} -> {next}",
                self.address,
                ConnectionState::from_u8(prev)
            );
            if let Some(cb) = &self.on_state {
                cb(next);
            }
        }
    }

    fn mark_connected(&self) {
        self.timing.lock().connected_at = Some(Instant::now());
        self.set_state(ConnectionState::Connected);
    }

    fn mark_frame(&self) {
        self.timing.lock().last_frame = Some(Instant::now());
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        self.set_state(ConnectionState::Grabbing);
    }

    fn record_failed_attempt(&self) -> u32 {
        self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Everything a session needs besides the address and the stream source.
#[derive(Default)]
pub struct GrabOptions {
    pub grab: GrabConfig,
    pub watchdog: WatchdogConfig,
    pub on_state: Option<StateCallback>,
    pub on_frame: Option<FrameCallback>,
}

/// Body of the grab thread: connect, pump frames, reconnect, until stopped.
struct GrabWorker {
    connection: Arc<CameraConnection>,
    backend: Arc<dyn CameraBackend>,
    buffer: Arc<FrameBuffer>,
    stats: Arc<Mutex<DiagnosticStats>>,
    on_frame: Option<FrameCallback>,
    config: GrabConfig,
    extractor: MjpegFrameExtractor,
    started: Instant,
}

impl GrabWorker {
    fn new(
        connection: Arc<CameraConnection>,
        backend: Arc<dyn CameraBackend>,
        buffer: Arc<FrameBuffer>,
        stats: Arc<Mutex<DiagnosticStats>>,
        on_frame: Option<FrameCallback>,
        config: GrabConfig,
    ) -> Self {
        let extractor = MjpegFrameExtractor::new(config.buffer_cap);
        Self {
            connection,
            backend,
            buffer,
            stats,
            on_frame,
            config,
            extractor,
            started: Instant::now(),
        }
    }

    fn run(&mut self) {
        info!("grab worker starting for {}", self.connection.address());
        while !self.connection.is_stop_requested() {
            self.attempt();
        }
        self.extractor.clear();
        self.connection.set_state(ConnectionState::Stopping);
        info!("grab worker exiting for {}", self.connection.address());
    }

    /// One connection lifetime: open, pump until something breaks, tear down.
    ///
    /// Failed connects are retried by the caller straight away.
    fn attempt(&mut self) {
        let address = self.connection.address().clone();
        self.connection.set_state(ConnectionState::Connecting);
        self.connection.take_restart();
        self.extractor.clear();

        let mut stream = match self.backend.open_stream(
            &address,
            self.config.connect_timeout,
            self.config.read_timeout,
        ) {
            Ok(stream) => stream,
            Err(e) => {
                let attempts = self.connection.record_failed_attempt();
                warn!("camera {address}: connect attempt {attempts} failed: {e}");
                self.connection.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        self.connection.mark_connected();
        info!("camera {address}: stream open");

        if let Err(e) = self.pump(stream.as_mut()) {
            {
                let mut stats = self.stats.lock();
                if matches!(e, CameraError::BufferOverflow { .. }) {
                    stats.record_overflow();
                }
                stats.record_reconnect();
            }
            warn!("camera {address}: {e}, reconnecting");
            self.extractor.clear();
            self.connection.set_state(ConnectionState::Disconnected);
        }
    }

    /// Read and extract until stopped (`Ok`) or the connection has to go.
    fn pump(&mut self, stream: &mut dyn Read) -> Result<()> {
        let mut chunk = vec![0u8; self.config.chunk_size.max(1)];
        loop {
            if self.connection.is_stop_requested() {
                return Ok(());
            }
            if self.connection.take_restart() {
                return Err(CameraError::Stalled(self.connection.idle_for()));
            }

            match stream.read(&mut chunk) {
                Ok(0) => {
                    return Err(CameraError::StreamReadFailure(
                        "stream closed by camera".to_string(),
                    ))
                }
                Ok(n) => {
                    self.extractor.push(&chunk[..n]);
                    while let Some(jpeg) = self.extractor.next_frame() {
                        self.handle_frame(jpeg);
                    }
                    self.extractor.check_capacity()?;
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(CameraError::StreamReadFailure(e.to_string())),
            }

            let idle = self.connection.idle_for();
            if idle > self.config.max_frame_gap {
                return Err(CameraError::Stalled(idle));
            }
        }
    }

    fn handle_frame(&mut self, jpeg: Vec<u8>) {
        let pixels = match codec::decode_jpeg(&jpeg) {
            Ok(pixels) => pixels,
            Err(e) => {
                let e = CameraError::FrameDecodeFailure(e.to_string());
                debug!("camera {}: dropping frame: {e}", self.connection.address());
                self.stats.lock().record_drop();
                return;
            }
        };

        let len = jpeg.len();
        let frame = Arc::new(Frame {
            jpeg,
            data: pixels.data,
            width: pixels.width,
            height: pixels.height,
            timestamp_us: self.started.elapsed().as_micros() as u64,
        });
        self.buffer.push(Arc::clone(&frame));
        if let Some(cb) = &self.on_frame {
            cb(&frame);
        }
        self.connection.mark_frame();
        self.stats.lock().record_frame(len);
    }
}

/// Active preview session for a single printer camera.
pub struct GrabSession {
    connection: Arc<CameraConnection>,
    buffer: Arc<FrameBuffer>,
    stats: Arc<Mutex<DiagnosticStats>>,
    thread: Option<JoinHandle<()>>,
    watchdog: Option<JoinHandle<()>>,
}

impl GrabSession {
    /// Start grabbing from `address` on a dedicated thread, with a watchdog
    /// thread beside it.
    pub fn start(
        address: CameraAddress,
        backend: Arc<dyn CameraBackend>,
        options: GrabOptions,
    ) -> Result<Self> {
        let GrabOptions {
            grab,
            watchdog,
            on_state,
            on_frame,
        } = options;

        let host = address.host().to_string();
        let connection = Arc::new(CameraConnection::new(address, on_state));
        let buffer = Arc::new(FrameBuffer::new(3));
        let stats = Arc::new(Mutex::new(DiagnosticStats::new()));

        let mut worker = GrabWorker::new(
            Arc::clone(&connection),
            backend,
            Arc::clone(&buffer),
            Arc::clone(&stats),
            on_frame,
            grab,
        );
        let thread = std::thread::Builder::new()
            .name(format!("camera-grab-{host}"))
            .spawn(move || worker.run())
            .map_err(|e| CameraError::ThreadSpawn("grab", e.to_string()))?;

        let connection_wd = Arc::clone(&connection);
        let watchdog = match std::thread::Builder::new()
            .name(format!("camera-watchdog-{host}"))
            .spawn(move || run_watchdog_with_config(&connection_wd, watchdog))
        {
            Ok(handle) => handle,
            Err(e) => {
                connection.request_stop();
                let _ = thread.join();
                return Err(CameraError::ThreadSpawn("watchdog", e.to_string()));
            }
        };

        Ok(Self {
            connection,
            buffer,
            stats,
            thread: Some(thread),
            watchdog: Some(watchdog),
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.connection.reconnect_attempts()
    }

    pub fn connection(&self) -> &Arc<CameraConnection> {
        &self.connection
    }

    /// Get a reference to the frame buffer.
    pub fn buffer(&self) -> &Arc<FrameBuffer> {
        &self.buffer
    }

    /// Take a snapshot of diagnostic stats for this session.
    pub fn diagnostics(&self) -> DiagnosticSnapshot {
        self.stats.lock().snapshot()
    }

    /// Stop the session and join both threads. Idempotent.
    pub fn stop(&mut self) {
        self.connection.request_stop();
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.watchdog.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

impl Drop for GrabSession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Watchdog loop: while the connection is streaming, asks the worker to
/// reconnect whenever no frame arrived within `frame_timeout`. Returns once
/// a stop is requested.
///
/// Sleeps by parking, so unparking the thread cuts a poll short.
pub fn run_watchdog_with_config(connection: &CameraConnection, config: WatchdogConfig) {
    let WatchdogConfig {
        poll_interval,
        frame_timeout,
    } = config;
    while !connection.is_stop_requested() {
        std::thread::park_timeout(poll_interval);
        if connection.is_stop_requested() || !connection.state().is_streaming() {
            continue;
        }
        let idle = connection.idle_for();
        if idle > frame_timeout {
            warn!(
                "watchdog: no frames for {:.1}s from {}, restarting",
                idle.as_secs_f64(),
                connection.address()
            );
            connection.request_restart();
        }
    }
}

use serde::Serialize;
use std::time::Instant;

/// Collects diagnostic statistics for a camera preview session.
pub struct DiagnosticStats {
    frame_count: u64,
    drop_count: u64,
    total_bytes: u64,
    reconnect_count: u64,
    overflow_count: u64,
    start_time: Instant,
    last_frame_time: Option<Instant>,
}

/// Snapshot of diagnostic stats for display and serialisation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticSnapshot {
    pub fps: f64,
    pub frame_count: u64,
    pub drop_count: u64,
    pub drop_rate: f64,
    pub bandwidth_bps: u64,
    pub reconnect_count: u64,
    pub overflow_count: u64,
    pub seconds_since_last_frame: Option<f64>,
}

impl DiagnosticStats {
    /// Create new stats with zeroed counters.
    pub fn new() -> Self {
        Self {
            frame_count: 0,
            drop_count: 0,
            total_bytes: 0,
            reconnect_count: 0,
            overflow_count: 0,
            start_time: Instant::now(),
            last_frame_time: None,
        }
    }

    /// Record a successfully decoded frame of `bytes` compressed bytes.
    pub fn record_frame(&mut self, bytes: usize) {
        self.frame_count += 1;
        self.total_bytes += bytes as u64;
        self.last_frame_time = Some(Instant::now());
    }

    /// Record a frame that was cut from the stream but failed to decode.
    pub fn record_drop(&mut self) {
        self.drop_count += 1;
    }

    /// Record a connection torn down for reconnection.
    pub fn record_reconnect(&mut self) {
        self.reconnect_count += 1;
    }

    /// Record a restart forced by the stream buffer cap.
    pub fn record_overflow(&mut self) {
        self.overflow_count += 1;
    }

    /// Calculate current FPS based on elapsed time.
    pub fn fps(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0.0;
        }
        self.frame_count as f64 / elapsed
    }

    /// Drop rate as a percentage (0.0 - 100.0).
    pub fn drop_rate(&self) -> f64 {
        let total = self.frame_count + self.drop_count;
        if total == 0 {
            return 0.0;
        }
        (self.drop_count as f64 / total as f64) * 100.0
    }

    /// Bandwidth in bytes per second.
    pub fn bandwidth_bps(&self) -> u64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed < 0.001 {
            return 0;
        }
        (self.total_bytes as f64 / elapsed) as u64
    }

    /// Reset all counters.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Take a serialisable snapshot.
    pub fn snapshot(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot {
            fps: self.fps(),
            frame_count: self.frame_count,
            drop_count: self.drop_count,
            drop_rate: self.drop_rate(),
            bandwidth_bps: self.bandwidth_bps(),
            reconnect_count: self.reconnect_count,
            overflow_count: self.overflow_count,
            seconds_since_last_frame: self
                .last_frame_time
                .map(|t| t.elapsed().as_secs_f64()),
        }
    }
}

impl Default for DiagnosticStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn initialises_with_zero_values() {
        let stats = DiagnosticStats::new();
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.drop_count, 0);
        assert_eq!(stats.total_bytes, 0);
        assert!(stats.last_frame_time.is_none());
    }

    #[test]
    fn record_frame_increments_frame_count() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(1000);
        assert_eq!(stats.frame_count, 1);
        stats.record_frame(1000);
        assert_eq!(stats.frame_count, 2);
        assert_eq!(stats.total_bytes, 2000);
    }

    #[test]
    fn drop_rate_returns_percentage() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(1000);
        stats.record_frame(1000);
        stats.record_drop();
        let rate = stats.drop_rate();
        assert!(
            (rate - 33.333).abs() < 1.0,
            "drop rate should be ~33%, got {rate}"
        );
    }

    #[test]
    fn drop_rate_zero_when_no_events() {
        let stats = DiagnosticStats::new();
        assert_eq!(stats.drop_rate(), 0.0);
    }

    #[test]
    fn fps_and_bandwidth_are_positive_after_frames() {
        let mut stats = DiagnosticStats::new();
        for _ in 0..10 {
            stats.record_frame(10_000);
        }
        thread::sleep(Duration::from_millis(50));
        assert!(stats.fps() > 0.0);
        assert!(stats.bandwidth_bps() > 0);
    }

    #[test]
    fn reconnects_and_overflows_are_counted() {
        let mut stats = DiagnosticStats::new();
        stats.record_reconnect();
        stats.record_reconnect();
        stats.record_overflow();
        let snap = stats.snapshot();
        assert_eq!(snap.reconnect_count, 2);
        assert_eq!(snap.overflow_count, 1);
    }

    #[test]
    fn reset_clears_all_counters() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(1000);
        stats.record_drop();
        stats.record_overflow();
        stats.reset();
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.drop_count, 0);
        assert_eq!(stats.overflow_count, 0);
    }

    #[test]
    fn snapshot_serialises_to_camelcase() {
        let mut stats = DiagnosticStats::new();
        stats.record_frame(5000);
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert!(json["frameCount"].is_number());
        assert!(json["reconnectCount"].is_number());
        assert!(json["secondsSinceLastFrame"].is_number());
    }

    #[test]
    fn seconds_since_last_frame_is_null_before_first_frame() {
        let json = serde_json::to_value(DiagnosticStats::new().snapshot()).unwrap();
        assert!(json["secondsSinceLastFrame"].is_null());
    }
}

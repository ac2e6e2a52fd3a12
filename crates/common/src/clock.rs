//! Clock and timing utilities for frame-indexed sessions.
//!
//! Tracking sessions are driven by frame count, not wall time. This module
//! provides utilities for:
//! - Converting 1-based frame indices to stream timestamps
//! - Measuring the wall-clock duration of a session
//! - Gating periodic progress reports

use std::time::Instant;

/// Frame rate used when a source reports a missing or nonsensical rate.
pub const FALLBACK_FPS: f64 = 30.0;

/// Maps frame indices to stream time for a fixed frame rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
}

impl FrameClock {
    /// Create a clock for the given rate.
    ///
    /// Non-positive or non-finite rates are replaced by [`FALLBACK_FPS`].
    pub fn new(fps: f64) -> Self {
        Self {
            fps: sanitize_fps(fps),
        }
    }

    /// The effective frame rate.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Timestamp in seconds of a 1-based frame index.
    pub fn timestamp(&self, frame_index: u64) -> f64 {
        frame_index as f64 / self.fps
    }

    /// Duration in seconds of a stream with `frame_count` frames.
    pub fn duration(&self, frame_count: u64) -> f64 {
        frame_count as f64 / self.fps
    }
}

/// Whether a reported frame rate can be used as-is.
pub fn is_valid_fps(fps: f64) -> bool {
    fps.is_finite() && fps > 0.0
}

/// Replace an unusable frame rate with [`FALLBACK_FPS`].
pub fn sanitize_fps(fps: f64) -> f64 {
    if is_valid_fps(fps) {
        fps
    } else {
        FALLBACK_FPS
    }
}

/// Wall-clock timing for one tracking session.
#[derive(Debug, Clone)]
pub struct SessionClock {
    /// The instant processing started.
    epoch: Instant,

    /// Wall-clock time at start (RFC 3339 string).
    started_at: String,
}

impl SessionClock {
    /// Create a session clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            started_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the session started.
    pub fn elapsed_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at session start.
    pub fn started_at(&self) -> &str {
        &self.started_at
    }

    /// Processing throughput in frames per second.
    pub fn throughput(&self, frames: u64) -> f64 {
        let secs = self.elapsed_secs();
        if secs > 0.0 {
            frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Fires once every `interval` frames.
#[derive(Debug)]
pub struct ProgressGate {
    interval: u64,
}

impl ProgressGate {
    /// Create a gate that fires every `interval` frames (minimum 1).
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    /// Whether a report is due at this 1-based frame index.
    pub fn should_report(&self, frame_index: u64) -> bool {
        frame_index > 0 && frame_index % self.interval == 0
    }

    /// Report interval in frames.
    pub fn interval(&self) -> u64 {
        self.interval
    }
}

impl Default for ProgressGate {
    fn default() -> Self {
        Self::new(30)
    }
}

/// Percentage of `part` in `total`, 0 when `total` is 0.
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clock_timestamps() {
        let clock = FrameClock::new(25.0);
        assert!((clock.timestamp(1) - 0.04).abs() < 1e-12);
        assert!((clock.timestamp(50) - 2.0).abs() < 1e-12);
        assert!((clock.duration(250) - 10.0).abs() < 1e-12);
    }

    #[test]
    fn test_frame_clock_falls_back_on_bad_rate() {
        assert_eq!(FrameClock::new(0.0).fps(), FALLBACK_FPS);
        assert_eq!(FrameClock::new(-12.0).fps(), FALLBACK_FPS);
        assert_eq!(FrameClock::new(f64::NAN).fps(), FALLBACK_FPS);
        assert_eq!(FrameClock::new(f64::INFINITY).fps(), FALLBACK_FPS);
        assert_eq!(FrameClock::new(59.94).fps(), 59.94);
    }

    #[test]
    fn test_session_clock_elapsed() {
        let clock = SessionClock::start();
        assert!(clock.elapsed_secs() < 1.0);
        assert!(!clock.started_at().is_empty());
    }

    #[test]
    fn test_progress_gate() {
        let gate = ProgressGate::default();
        assert!(!gate.should_report(0));
        assert!(!gate.should_report(29));
        assert!(gate.should_report(30));
        assert!(gate.should_report(60));
        assert_eq!(ProgressGate::new(0).interval(), 1);
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(0, 0), 0.0);
        assert!((percentage(4, 5) - 80.0).abs() < 1e-12);
    }
}

//! Per-frame records and the session summary handed to callers.

use crate::candidate::MethodTag;
use serde::{Deserialize, Serialize};

/// Basic metadata of the tracked video.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Duration in seconds.
    pub duration: f64,
    /// Total frame count reported by the source, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_count: Option<u64>,
}

impl VideoInfo {
    pub fn new(width: u32, height: u32, fps: f64, frame_count: Option<u64>) -> Self {
        let duration = match frame_count {
            Some(n) if fps > 0.0 => n as f64 / fps,
            _ => 0.0,
        };
        Self {
            width,
            height,
            fps,
            duration,
            frame_count,
        }
    }
}

/// The outcome of tracking for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// 1-based frame index.
    pub frame: u64,
    /// Stream time in seconds.
    pub timestamp: f64,
    pub ball_center: Option<(f64, f64)>,
    pub methods: Option<Vec<MethodTag>>,
    pub confidence: f64,
    /// A position was established for this frame, observed or predicted.
    pub detected: bool,
}

impl FrameRecord {
    /// A frame where no position could be established.
    pub fn missed(frame: u64, timestamp: f64) -> Self {
        Self {
            frame,
            timestamp,
            ball_center: None,
            methods: None,
            confidence: 0.0,
            detected: false,
        }
    }

    pub fn is_interpolated(&self) -> bool {
        self.methods
            .as_deref()
            .is_some_and(|m| m.contains(&MethodTag::Interpolated))
    }
}

/// End-of-session result returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub success: bool,
    pub total_frames: u64,
    /// Frames resolved by a detector.
    pub detection_count: u64,
    /// Frames resolved by constant-velocity prediction.
    pub interpolated_count: u64,
    /// Percentage of frames with an established position, `0..=100`.
    pub detection_rate: f64,
    pub tracking_data: Vec<FrameRecord>,
    pub trajectory: Vec<(f64, f64)>,
    pub video_info: VideoInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SessionSummary {
    /// A failed session that processed nothing.
    pub fn failure(video_info: VideoInfo, message: impl Into<String>) -> Self {
        Self {
            success: false,
            total_frames: 0,
            detection_count: 0,
            interpolated_count: 0,
            detection_rate: 0.0,
            tracking_data: Vec::new(),
            trajectory: Vec::new(),
            video_info,
            error: Some(message.into()),
        }
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

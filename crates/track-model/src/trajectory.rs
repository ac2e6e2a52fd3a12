//! Trajectory points.

use crate::geometry::Point2D;
use serde::{Deserialize, Serialize};

/// Whether a position was observed or predicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointSource {
    Detected,
    Interpolated,
}

/// An established ball position for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    pub position: Point2D,
    /// 1-based frame index.
    pub frame_index: u64,
    /// Stream time in seconds.
    pub timestamp: f64,
    pub source: PointSource,
}

impl TrajectoryPoint {
    pub fn detected(position: Point2D, frame_index: u64, timestamp: f64) -> Self {
        Self {
            position,
            frame_index,
            timestamp,
            source: PointSource::Detected,
        }
    }

    pub fn interpolated(position: Point2D, frame_index: u64, timestamp: f64) -> Self {
        Self {
            position,
            frame_index,
            timestamp,
            source: PointSource::Interpolated,
        }
    }

    pub fn is_interpolated(&self) -> bool {
        self.source == PointSource::Interpolated
    }
}

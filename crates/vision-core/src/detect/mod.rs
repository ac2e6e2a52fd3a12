//! Candidate detectors.
//!
//! Each detector looks at a different signal (colour, motion, structure)
//! and proposes zero or more [`Candidate`]s per frame. Detectors never
//! mutate tracking state; everything carried across frames is handed in
//! through a [`DetectionContext`].

pub mod blob;
pub mod color;
pub mod motion;

pub use blob::BlobDetector;
pub use color::ColorDetector;
pub use motion::MotionDetector;

use crate::preprocess::PreparedFrame;
use image::GrayImage;
use rallytrack_common::RallyResult;
use rallytrack_model::{nearest_distance, Candidate, DetectionMethod, Point2D, RingBuffer};

/// Read-only inputs for one detector call.
#[derive(Debug, Clone, Copy)]
pub struct DetectionContext<'a> {
    pub frame: &'a PreparedFrame,
    /// Recently accepted (observed) ball positions, oldest first.
    pub recent_positions: &'a RingBuffer<Point2D>,
    /// Grayscale versions of the preceding frames, oldest first.
    pub previous_frames: &'a RingBuffer<GrayImage>,
}

/// A strategy that proposes ball locations for one frame.
pub trait CandidateDetector {
    /// Tag attached to every candidate this detector produces.
    fn method(&self) -> DetectionMethod;

    /// Propose candidates for the current frame.
    ///
    /// An `Err` means the detector could not run for this frame; callers
    /// treat it as an empty proposal.
    fn detect(&self, ctx: &DetectionContext<'_>) -> RallyResult<Vec<Candidate>>;
}

/// Multiplicative locality prior: the ball is unlikely to teleport.
///
/// Returns `2 - d / radius` when the nearest recent position is closer than
/// `radius`, otherwise 1.
pub fn locality_boost(center: &Point2D, recent: &RingBuffer<Point2D>, radius: f64) -> f64 {
    match nearest_distance(center, recent.iter()) {
        Some(d) if radius > 0.0 && d < radius => 2.0 - d / radius,
        _ => 1.0,
    }
}

/// Whether `value` lies in the inclusive range `[min, max]`.
pub(crate) fn within(value: f64, min: f64, max: f64) -> bool {
    value >= min && value <= max
}

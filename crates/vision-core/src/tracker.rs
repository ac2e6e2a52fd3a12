//! Trajectory tracking and constant-velocity gap filling.
//!
//! [`TrackerState`] holds every history carried from one frame to the next.
//! Each session owns exactly one; nothing here is global.

use crate::config::TrackerConfig;
use crate::detect::DetectionContext;
use crate::preprocess::PreparedFrame;
use image::GrayImage;
use rallytrack_model::{MergedCandidate, Point2D, RingBuffer, TrajectoryPoint};

/// Bounded histories of one tracking session.
#[derive(Debug, Clone)]
pub struct TrackerState {
    /// Established positions, observed or predicted.
    pub trajectory: RingBuffer<TrajectoryPoint>,
    /// Observed positions only; feeds the detectors' locality prior.
    pub positions: RingBuffer<Point2D>,
    /// Grayscale versions of recent frames, for motion differencing.
    pub frames: RingBuffer<GrayImage>,
    /// Whether fusion produced an estimate, per frame. Informational.
    pub detections: RingBuffer<bool>,
}

impl TrackerState {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            trajectory: RingBuffer::new(config.trajectory_capacity),
            positions: RingBuffer::new(config.position_capacity),
            frames: RingBuffer::new(config.frame_capacity),
            detections: RingBuffer::new(config.detection_history_capacity),
        }
    }

    /// Detector inputs for the current frame.
    pub fn context<'a>(&'a self, frame: &'a PreparedFrame) -> DetectionContext<'a> {
        DetectionContext {
            frame,
            recent_positions: &self.positions,
            previous_frames: &self.frames,
        }
    }
}

/// How a frame's position was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Fusion produced an estimate.
    Detected(MergedCandidate),
    /// No estimate; the position was extrapolated from the trajectory.
    Interpolated { position: Point2D, confidence: f64 },
    /// No position could be established.
    Missed,
}

impl FrameOutcome {
    pub fn position(&self) -> Option<Point2D> {
        match self {
            Self::Detected(m) => Some(m.center),
            Self::Interpolated { position, .. } => Some(*position),
            Self::Missed => None,
        }
    }

    pub fn is_established(&self) -> bool {
        !matches!(self, Self::Missed)
    }
}

/// Maintains the trajectory and fills short gaps by linear extrapolation.
#[derive(Debug, Clone)]
pub struct TrajectoryTracker {
    config: TrackerConfig,
    state: TrackerState,
}

impl TrajectoryTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let state = TrackerState::new(&config);
        Self { config, state }
    }

    pub fn with_defaults() -> Self {
        Self::new(TrackerConfig::default())
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    /// Store the current frame's grayscale for future motion differencing.
    pub fn remember_frame(&mut self, gray: GrayImage) {
        self.state.frames.push(gray);
    }

    /// Constant-velocity prediction from the last two trajectory points.
    pub fn predict_next(&self) -> Option<Point2D> {
        let last = self.state.trajectory.nth_newest(0)?.position;
        let before = self.state.trajectory.nth_newest(1)?.position;
        let (vx, vy) = last.offset_from(&before);
        Some(last.translated(vx, vy))
    }

    /// Resolve the frame from fusion's best estimate, or predict.
    ///
    /// Predictions outside `[0, width) x [0, height)` are discarded.
    pub fn update(
        &mut self,
        best: Option<MergedCandidate>,
        frame_index: u64,
        timestamp: f64,
        width: u32,
        height: u32,
    ) -> FrameOutcome {
        self.state.detections.push(best.is_some());

        if let Some(best) = best {
            self.state.positions.push(best.center);
            self.state
                .trajectory
                .push(TrajectoryPoint::detected(best.center, frame_index, timestamp));
            return FrameOutcome::Detected(best);
        }

        match self.predict_next() {
            Some(predicted) if predicted.within_frame(width, height) => {
                self.state.trajectory.push(TrajectoryPoint::interpolated(
                    predicted,
                    frame_index,
                    timestamp,
                ));
                FrameOutcome::Interpolated {
                    position: predicted,
                    confidence: self.config.interpolation_confidence,
                }
            }
            Some(predicted) => {
                tracing::debug!(
                    frame = frame_index,
                    x = predicted.x,
                    y = predicted.y,
                    "prediction left the frame"
                );
                FrameOutcome::Missed
            }
            None => FrameOutcome::Missed,
        }
    }

    /// Positions currently held in the trajectory, oldest first.
    pub fn trajectory_positions(&self) -> Vec<Point2D> {
        self.state.trajectory.iter().map(|p| p.position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rallytrack_model::DetectionMethod;

    fn merged_at(x: f64, y: f64) -> MergedCandidate {
        MergedCandidate {
            center: Point2D::new(x, y),
            aggregate_score: 1.0,
            methods: [DetectionMethod::Color].into_iter().collect(),
            confidence: 1,
        }
    }

    #[test]
    fn test_linear_extrapolation() {
        let mut tracker = TrajectoryTracker::with_defaults();
        tracker.update(Some(merged_at(10.0, 10.0)), 1, 0.0, 100, 100);
        tracker.update(Some(merged_at(14.0, 12.0)), 2, 0.0, 100, 100);

        assert_eq!(tracker.predict_next(), Some(Point2D::new(18.0, 14.0)));
        let outcome = tracker.update(None, 3, 0.0, 100, 100);
        assert_eq!(
            outcome,
            FrameOutcome::Interpolated {
                position: Point2D::new(18.0, 14.0),
                confidence: 0.5
            }
        );

        let state = tracker.state();
        assert_eq!(state.trajectory.len(), 3);
        assert!(state.trajectory.newest().unwrap().is_interpolated());
        // predictions never feed the locality prior
        assert_eq!(state.positions.len(), 2);
        assert_eq!(state.detections.to_vec(), vec![true, true, false]);
    }

    #[test]
    fn test_out_of_bounds_prediction_is_rejected() {
        let mut tracker = TrajectoryTracker::with_defaults();
        tracker.update(Some(merged_at(80.0, 50.0)), 1, 0.0, 100, 100);
        tracker.update(Some(merged_at(95.0, 50.0)), 2, 0.0, 100, 100);

        assert_eq!(tracker.update(None, 3, 0.0, 100, 100), FrameOutcome::Missed);
        assert_eq!(tracker.state().trajectory.len(), 2);
    }

    #[test]
    fn test_single_point_cannot_predict() {
        let mut tracker = TrajectoryTracker::with_defaults();
        assert_eq!(tracker.update(None, 1, 0.0, 100, 100), FrameOutcome::Missed);
        tracker.update(Some(merged_at(5.0, 5.0)), 2, 0.0, 100, 100);
        assert_eq!(tracker.predict_next(), None);
        assert_eq!(tracker.update(None, 3, 0.0, 100, 100), FrameOutcome::Missed);
        assert_eq!(tracker.state().trajectory.len(), 1);
    }

    #[test]
    fn test_consecutive_gaps_keep_velocity() {
        let mut tracker = TrajectoryTracker::with_defaults();
        tracker.update(Some(merged_at(10.0, 10.0)), 1, 0.0, 100, 100);
        tracker.update(Some(merged_at(12.0, 11.0)), 2, 0.0, 100, 100);
        tracker.update(None, 3, 0.0, 100, 100);
        let outcome = tracker.update(None, 4, 0.0, 100, 100);
        assert_eq!(outcome.position(), Some(Point2D::new(16.0, 13.0)));
    }

    #[test]
    fn test_trajectory_is_bounded() {
        let mut tracker = TrajectoryTracker::new(TrackerConfig {
            trajectory_capacity: 4,
            ..TrackerConfig::default()
        });
        for i in 0..10 {
            tracker.update(Some(merged_at(i as f64, 0.0)), i + 1, 0.0, 100, 100);
        }
        let xs: Vec<f64> = tracker.trajectory_positions().iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![6.0, 7.0, 8.0, 9.0]);
        assert_eq!(tracker.state().positions.len(), 10);
    }
}

//! RallyTrack Vision Core
//!
//! Locates a small, fast, low-contrast ball in successive video frames:
//! - **Preprocessing:** Grayscale, HSV and Lab representations of a frame
//! - **Detectors:** Colour threshold, frame differencing, multi-threshold blobs
//! - **Fusion:** Proximity clustering of candidates into a consensus estimate
//! - **Tracking:** Bounded histories and constant-velocity gap filling
//!
//! This crate is pure computation: no I/O, no video decoding.
//! All inputs are data; all outputs are data.

pub mod config;
pub mod detect;
pub mod fusion;
pub mod preprocess;
pub mod shape;
pub mod tracker;

pub use config::TrackingConfig;
pub use detect::{BlobDetector, CandidateDetector, ColorDetector, DetectionContext, MotionDetector};
pub use fusion::{fuse, select_best};
pub use preprocess::{prepare, PreparedFrame};
pub use tracker::{FrameOutcome, TrackerState, TrajectoryTracker};

//! RallyTrack Track Model
//!
//! Defines the core data contracts for ball tracking:
//! - **Candidates:** Per-detector proposals and their fused consensus
//! - **Trajectory:** Established positions, observed or predicted
//! - **Ring buffers:** Fixed-capacity histories carried across frames
//! - **Session:** Per-frame records and the end-of-session summary
//!
//! All coordinates are in pixel space of the source video, origin at the
//! top-left corner.

pub mod candidate;
pub mod geometry;
pub mod ring;
pub mod session;
pub mod trajectory;

pub use candidate::*;
pub use geometry::*;
pub use ring::*;
pub use session::*;
pub use trajectory::*;

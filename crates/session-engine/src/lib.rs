//! RallyTrack Session Engine
//!
//! Runs a tracking session end to end:
//! - **Video I/O:** ffmpeg-backed decoding and encoding behind source/sink traits
//! - **Orchestration:** The per-frame detect, fuse, track loop and its statistics
//! - **Rendering:** Trails, method-coded markers and status overlays
//!
//! A session never fails outright; every outcome is reported through a
//! [`rallytrack_model::SessionSummary`].

pub mod annotate;
pub mod orchestrator;
pub mod video;

pub use annotate::{Annotator, StatusLine};
pub use orchestrator::{
    run_session, track_video, track_video_async, FrameOrchestrator, RunStatistics,
    SessionOptions, TrackRequest,
};
pub use video::{
    inspect_video, FfmpegSink, FfmpegSource, FrameCollector, FrameSequence, VideoSink, VideoSource,
};

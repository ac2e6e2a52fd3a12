//! Frame orchestration: the per-frame tracking loop and session entry points.
//!
//! Per frame, strictly in order:
//! 1. preprocess the frame
//! 2. run the colour, motion and blob detectors
//! 3. fuse their candidates and select the best cluster
//! 4. update the trajectory, predicting when nothing was selected
//! 5. emit a [`FrameRecord`] and, with a sink, an annotated frame
//!
//! Only errors for which [`RallyError::is_fatal`] holds, raised by the source
//! or sink, end a session early. A detector failure just empties that
//! detector's proposal, and a recoverable source error skips one frame.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::RgbImage;
use rallytrack_common::{
    percentage, FrameClock, ProgressGate, RallyError, RallyResult, SessionClock,
};
use rallytrack_model::{Candidate, FrameRecord, MethodTag, SessionSummary, VideoInfo};
use rallytrack_vision::config::FusionConfig;
use rallytrack_vision::{
    fuse, prepare, select_best, BlobDetector, CandidateDetector, ColorDetector, DetectionContext,
    FrameOutcome, MotionDetector, TrackingConfig, TrajectoryTracker,
};

use crate::annotate::{Annotator, StatusLine};
use crate::video::{FfmpegSink, FfmpegSource, VideoSink, VideoSource};

/// Counters accumulated over a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStatistics {
    pub frames_processed: u64,
    /// Frames resolved by a detector.
    pub detections: u64,
    /// Frames resolved by prediction.
    pub interpolations: u64,
}

impl RunStatistics {
    pub fn record(&mut self, outcome: &FrameOutcome) {
        self.frames_processed += 1;
        match outcome {
            FrameOutcome::Detected(_) => self.detections += 1,
            FrameOutcome::Interpolated { .. } => self.interpolations += 1,
            FrameOutcome::Missed => {}
        }
    }

    /// Frames with an established position, observed or predicted.
    pub fn established(&self) -> u64 {
        self.detections + self.interpolations
    }

    /// Percentage of processed frames with an established position.
    pub fn detection_rate(&self) -> f64 {
        percentage(self.established(), self.frames_processed)
    }
}

/// Owns all per-session tracking state and runs the per-frame pipeline.
pub struct FrameOrchestrator {
    color: ColorDetector,
    motion: MotionDetector,
    blob: BlobDetector,
    fusion: FusionConfig,
    tracker: TrajectoryTracker,
    clock: FrameClock,
    stats: RunStatistics,
    records: Vec<FrameRecord>,
}

impl FrameOrchestrator {
    pub fn new(config: TrackingConfig, fps: f64) -> Self {
        let clock = FrameClock::new(fps);
        if clock.fps() != fps {
            tracing::warn!(reported = fps, using = clock.fps(), "Unusable frame rate");
        }
        Self {
            color: ColorDetector::new(config.color),
            motion: MotionDetector::new(config.motion),
            blob: BlobDetector::new(config.blob),
            fusion: config.fusion,
            tracker: TrajectoryTracker::new(config.tracker),
            clock,
            stats: RunStatistics::default(),
            records: Vec::new(),
        }
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn tracker(&self) -> &TrajectoryTracker {
        &self.tracker
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Run the full pipeline on the next frame and return its record.
    pub fn process_frame(&mut self, frame: &RgbImage) -> &FrameRecord {
        let frame_index = self.stats.frames_processed + 1;
        let timestamp = self.clock.timestamp(frame_index);
        let prepared = prepare(frame);

        let (color, motion, blob) = {
            let ctx = self.tracker.state().context(&prepared);
            (
                run_detector(&self.color, &ctx, frame_index),
                run_detector(&self.motion, &ctx, frame_index),
                run_detector(&self.blob, &ctx, frame_index),
            )
        };
        let merged = fuse(&color, &motion, &blob, &self.fusion);
        let cluster_count = merged.len();
        let best = select_best(merged);

        self.tracker.remember_frame(prepared.gray);
        let outcome = self.tracker.update(
            best,
            frame_index,
            timestamp,
            prepared.width,
            prepared.height,
        );
        self.stats.record(&outcome);

        tracing::debug!(
            frame = frame_index,
            color = color.len(),
            motion = motion.len(),
            blob = blob.len(),
            clusters = cluster_count,
            outcome = ?outcome.position(),
            "frame processed"
        );

        self.records.push(frame_record(frame_index, timestamp, &outcome));
        &self.records[self.records.len() - 1]
    }

    /// Build the end-of-session summary.
    pub fn into_summary(self, info: &VideoInfo, error: Option<String>) -> SessionSummary {
        let fps = self.clock.fps();
        SessionSummary {
            success: error.is_none(),
            total_frames: self.stats.frames_processed,
            detection_count: self.stats.detections,
            interpolated_count: self.stats.interpolations,
            detection_rate: self.stats.detection_rate(),
            trajectory: self
                .tracker
                .trajectory_positions()
                .iter()
                .map(|p| p.as_tuple())
                .collect(),
            tracking_data: self.records,
            video_info: VideoInfo {
                width: info.width,
                height: info.height,
                fps,
                duration: self.clock.duration(self.stats.frames_processed),
                frame_count: info.frame_count,
            },
            error,
        }
    }
}

fn run_detector(
    detector: &dyn CandidateDetector,
    ctx: &DetectionContext<'_>,
    frame_index: u64,
) -> Vec<Candidate> {
    match detector.detect(ctx) {
        Ok(candidates) => candidates,
        Err(e) if e.is_fatal() => {
            tracing::error!(
                frame = frame_index,
                detector = %detector.method(),
                error = %e,
                "Detector hit an I/O failure; continuing without its candidates"
            );
            Vec::new()
        }
        Err(e) => {
            tracing::warn!(
                frame = frame_index,
                detector = %detector.method(),
                error = %e,
                "Detector failed; continuing without its candidates"
            );
            Vec::new()
        }
    }
}

fn frame_record(frame: u64, timestamp: f64, outcome: &FrameOutcome) -> FrameRecord {
    match outcome {
        FrameOutcome::Detected(best) => FrameRecord {
            frame,
            timestamp,
            ball_center: Some(best.center.as_tuple()),
            methods: Some(best.method_tags()),
            confidence: best.confidence as f64,
            detected: true,
        },
        FrameOutcome::Interpolated {
            position,
            confidence,
        } => FrameRecord {
            frame,
            timestamp,
            ball_center: Some(position.as_tuple()),
            methods: Some(vec![MethodTag::Interpolated]),
            confidence: *confidence,
            detected: true,
        },
        FrameOutcome::Missed => FrameRecord::missed(frame, timestamp),
    }
}

/// Session-level knobs that are not tracking parameters.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub tracking: TrackingConfig,
    /// Font for text overlays on rendered output.
    pub font_path: Option<PathBuf>,
    /// Checked between frames; setting it ends the session early.
    pub stop: Option<Arc<AtomicBool>>,
    /// Frames between progress log lines.
    pub progress_interval: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            tracking: TrackingConfig::default(),
            font_path: None,
            stop: None,
            progress_interval: 30,
        }
    }
}

impl SessionOptions {
    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    fn annotator(&self) -> Annotator {
        match &self.font_path {
            Some(path) => Annotator::with_font_file(path).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Text overlays disabled");
                Annotator::new()
            }),
            None => Annotator::new(),
        }
    }
}

/// Track every frame of `source`, rendering annotated frames into `sink`.
///
/// Never fails: errors end the session and are reported in the summary.
pub fn run_session(
    source: &mut dyn VideoSource,
    mut sink: Option<&mut dyn VideoSink>,
    options: &SessionOptions,
) -> SessionSummary {
    let info = *source.info();
    let session_clock = SessionClock::start();
    let gate = ProgressGate::new(options.progress_interval);
    let annotator = if sink.is_some() {
        Some(options.annotator())
    } else {
        None
    };
    let mut orchestrator = FrameOrchestrator::new(options.tracking.clone(), info.fps);

    tracing::info!(
        width = info.width,
        height = info.height,
        fps = orchestrator.clock().fps(),
        frames = ?info.frame_count,
        render = sink.is_some(),
        text_overlays = annotator.as_ref().is_some_and(Annotator::has_font),
        started_at = session_clock.started_at(),
        "Tracking session started"
    );

    let mut error = None;
    loop {
        if options.stop_requested() {
            tracing::info!(
                frames = orchestrator.statistics().frames_processed,
                "Stop requested; ending session"
            );
            break;
        }

        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) if e.is_fatal() => {
                tracing::error!(error = %e, "Video source failed");
                error = Some(e.to_string());
                break;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable frame");
                continue;
            }
        };

        let record = orchestrator.process_frame(&frame).clone();
        let stats = *orchestrator.statistics();

        if let (Some(sink), Some(annotator)) = (sink.as_deref_mut(), annotator.as_ref()) {
            let mut canvas = frame;
            let status = StatusLine {
                frame: record.frame,
                total_frames: info.frame_count,
                detections: stats.detections,
                interpolated: stats.interpolations,
                detection_rate: stats.detection_rate(),
            };
            let trail = orchestrator.tracker().trajectory_positions();
            annotator.annotate(&mut canvas, &trail, &record, &status);
            match sink.write_frame(&canvas) {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, frame = record.frame, "Video sink failed");
                    error = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, frame = record.frame, "Annotated frame dropped");
                }
            }
        }

        if gate.should_report(record.frame) {
            tracing::info!(
                frame = record.frame,
                progress = ?info.frame_count.map(|t| percentage(record.frame, t)),
                detections = stats.detections,
                interpolated = stats.interpolations,
                rate = stats.detection_rate(),
                "Tracking progress"
            );
        }
    }

    if let Some(sink) = sink {
        if let Err(e) = sink.finish() {
            tracing::error!(error = %e, "Failed to finalize output video");
            if error.is_none() {
                error = Some(e.to_string());
            }
        }
    }

    let stats = *orchestrator.statistics();
    tracing::info!(
        frames = stats.frames_processed,
        detections = stats.detections,
        interpolated = stats.interpolations,
        rate = stats.detection_rate(),
        elapsed_secs = session_clock.elapsed_secs(),
        throughput_fps = session_clock.throughput(stats.frames_processed),
        "Tracking session finished"
    );

    orchestrator.into_summary(&info, error)
}

/// A file-to-file tracking job.
#[derive(Debug, Clone)]
pub struct TrackRequest {
    pub input: PathBuf,
    /// Annotated output video; `None` disables rendering.
    pub output: Option<PathBuf>,
    pub options: SessionOptions,
}

/// Track a video file through ffmpeg.
///
/// Failing to open the input, or the output when one was requested, yields
/// a `success: false` summary instead of an error.
pub fn track_video(request: &TrackRequest) -> SessionSummary {
    let mut source = match FfmpegSource::open(&request.input) {
        Ok(source) => source,
        Err(e) => {
            tracing::error!(input = %request.input.display(), error = %e, "Cannot open video source");
            return SessionSummary::failure(VideoInfo::default(), e.to_string());
        }
    };
    let info = *source.info();

    match &request.output {
        Some(output) => {
            let mut sink = match open_sink(output, &info) {
                Ok(sink) => sink,
                Err(e) => {
                    tracing::error!(output = %output.display(), error = %e, "Cannot open video sink");
                    return SessionSummary::failure(info, e.to_string());
                }
            };
            run_session(&mut source, Some(&mut sink), &request.options)
        }
        None => run_session(&mut source, None, &request.options),
    }
}

fn open_sink(output: &Path, info: &VideoInfo) -> RallyResult<FfmpegSink> {
    if output.is_dir() {
        return Err(RallyError::sink(format!(
            "{} is a directory",
            output.display()
        )));
    }
    FfmpegSink::create(output, info.width, info.height, info.fps)
}

/// [`track_video`] on the blocking thread pool.
pub async fn track_video_async(request: TrackRequest) -> RallyResult<SessionSummary> {
    tokio::task::spawn_blocking(move || track_video(&request))
        .await
        .map_err(|e| RallyError::Other(e.into()))
}

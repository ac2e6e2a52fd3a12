//! Video source and sink contracts, with ffmpeg and in-memory backends.
//!
//! The ffmpeg backends stream raw `rgb24` frames through child-process
//! pipes, so no codec library is linked into the binary.

use std::collections::VecDeque;
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;

use image::RgbImage;
use rallytrack_common::{sanitize_fps, RallyError, RallyResult};
use rallytrack_model::VideoInfo;
use serde::Deserialize;

/// Sequential decoded frames of fixed resolution.
pub trait VideoSource {
    /// Stream metadata, known before the first frame is read.
    fn info(&self) -> &VideoInfo;

    /// The next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> RallyResult<Option<RgbImage>>;
}

/// Consumer of rendered frames, in presentation order.
pub trait VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> RallyResult<()>;

    /// Flush and close the output.
    fn finish(&mut self) -> RallyResult<()>;
}

/// Check whether a binary is reachable through `PATH`.
pub fn command_exists(binary: &str) -> bool {
    Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Probe a video file with `ffprobe`.
pub fn inspect_video(path: &Path) -> RallyResult<VideoInfo> {
    if !path.exists() {
        return Err(RallyError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if !command_exists("ffprobe") {
        return Err(RallyError::unsupported("ffprobe not found in PATH"));
    }

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration",
            "-of",
            "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| RallyError::source(format!("Failed to run ffprobe: {e}")))?;

    if !output.status.success() {
        return Err(RallyError::source(format!(
            "ffprobe failed on {} (status {}): {}",
            path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_ffprobe_json(&String::from_utf8_lossy(&output.stdout))
}

/// Interpret `ffprobe -of json` stream output.
pub fn parse_ffprobe_json(raw: &str) -> RallyResult<VideoInfo> {
    let parsed: ProbeOutput = serde_json::from_str(raw)?;
    let stream = parsed
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| RallyError::source("No video stream found"))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(RallyError::source("Video stream has no dimensions")),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .filter(|n| *n > 0)
        .or_else(|| {
            let duration = stream.duration.as_deref()?.parse::<f64>().ok()?;
            (duration > 0.0 && fps > 0.0).then(|| (duration * fps).round() as u64)
        });

    Ok(VideoInfo::new(width, height, fps, frame_count))
}

/// Parse `"30000/1001"` or `"25"`; `None` for zero or malformed rates.
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let rate = match raw.split_once('/') {
        Some((num, den)) => {
            let num = num.trim().parse::<f64>().ok()?;
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num / den
        }
        None => raw.trim().parse::<f64>().ok()?,
    };
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn drain_stderr(child: &mut Child) -> Option<JoinHandle<String>> {
    let stderr = child.stderr.take()?;
    Some(std::thread::spawn(move || -> String {
        let mut reader = BufReader::new(stderr);
        let mut output = String::new();
        match reader.read_to_string(&mut output) {
            Ok(_) => output,
            Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
        }
    }))
}

fn join_stderr(task: Option<JoinHandle<String>>) -> String {
    task.map(|t| {
        t.join()
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string())
    })
    .unwrap_or_default()
}

/// Decodes a video file through an `ffmpeg` child process.
pub struct FfmpegSource {
    path: PathBuf,
    info: VideoInfo,
    child: Child,
    stdout: BufReader<ChildStdout>,
    stderr_task: Option<JoinHandle<String>>,
    frame_len: usize,
    finished: bool,
}

impl FfmpegSource {
    /// Probe and start decoding `path`.
    pub fn open(path: &Path) -> RallyResult<Self> {
        let info = inspect_video(path)?;
        if !command_exists("ffmpeg") {
            return Err(RallyError::unsupported("ffmpeg not found in PATH"));
        }

        let mut child = Command::new("ffmpeg")
            .args(["-nostdin", "-v", "error", "-i"])
            .arg(path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RallyError::source(format!("Failed to start ffmpeg: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RallyError::source("Failed to capture ffmpeg stdout"))?;
        let stderr_task = drain_stderr(&mut child);

        tracing::info!(
            pid = child.id(),
            path = %path.display(),
            width = info.width,
            height = info.height,
            fps = info.fps,
            frames = ?info.frame_count,
            "ffmpeg decoder started"
        );

        Ok(Self {
            path: path.to_path_buf(),
            frame_len: info.width as usize * info.height as usize * 3,
            info,
            child,
            stdout: BufReader::new(stdout),
            stderr_task,
            finished: false,
        })
    }

    fn close(&mut self) -> RallyResult<()> {
        self.finished = true;
        let status = self
            .child
            .wait()
            .map_err(|e| RallyError::source(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = join_stderr(self.stderr_task.take());
        if !status.success() {
            return Err(RallyError::source(format!(
                "ffmpeg decode of {} failed (status {}): {}",
                self.path.display(),
                status,
                stderr_output.trim()
            )));
        }
        Ok(())
    }
}

impl VideoSource for FfmpegSource {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> RallyResult<Option<RgbImage>> {
        if self.finished {
            return Ok(None);
        }

        let mut buf = vec![0u8; self.frame_len];
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .stdout
                .read(&mut buf[filled..])
                .map_err(|e| RallyError::source(format!("Failed reading decoded frame: {e}")))?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            self.close()?;
            return Ok(None);
        }
        if filled < buf.len() {
            let _ = self.close();
            return Err(RallyError::source(format!(
                "Truncated frame: got {filled} of {} bytes",
                buf.len()
            )));
        }

        RgbImage::from_raw(self.info.width, self.info.height, buf)
            .map(Some)
            .ok_or_else(|| RallyError::source("Decoded frame has unexpected size"))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        if !self.finished {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// Encoder arguments chosen by output container.
///
/// `.avi` gets MPEG-4 Part 2 tagged as XVID; everything else H.264.
pub fn codec_args_for(path: &Path) -> Vec<String> {
    let is_avi = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("avi"));

    if is_avi {
        ["-c:v", "mpeg4", "-vtag", "xvid", "-q:v", "5"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        [
            "-vf",
            "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-crf",
            "23",
            "-pix_fmt",
            "yuv420p",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }
}

/// Encodes frames through an `ffmpeg` child process.
pub struct FfmpegSink {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Child,
    stdin: Option<ChildStdin>,
    stderr_task: Option<JoinHandle<String>>,
    frames_written: u64,
}

impl FfmpegSink {
    /// Start an encoder writing `width x height` frames at `fps` to `path`.
    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> RallyResult<Self> {
        if !command_exists("ffmpeg") {
            return Err(RallyError::sink("ffmpeg not found in PATH"));
        }
        if width == 0 || height == 0 {
            return Err(RallyError::sink(format!(
                "Cannot encode {width}x{height} frames"
            )));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                RallyError::sink(format!("Cannot create {}: {e}", parent.display()))
            })?;
        }

        let fps = sanitize_fps(fps);
        let args: Vec<String> = [
            "-y".to_string(),
            "-v".to_string(),
            "error".to_string(),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{width}x{height}"),
            "-r".to_string(),
            format!("{fps}"),
            "-i".to_string(),
            "-".to_string(),
        ]
        .into_iter()
        .chain(codec_args_for(path))
        .collect();

        tracing::debug!(args = ?args, "Running ffmpeg encoder");
        let mut child = Command::new("ffmpeg")
            .args(&args)
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RallyError::sink(format!("Failed to start ffmpeg: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RallyError::sink("Failed to capture ffmpeg stdin"))?;
        let stderr_task = drain_stderr(&mut child);

        tracing::info!(pid = child.id(), output = %path.display(), "ffmpeg encoder started");

        Ok(Self {
            path: path.to_path_buf(),
            width,
            height,
            child,
            stdin: Some(stdin),
            stderr_task,
            frames_written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbImage) -> RallyResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(RallyError::sink(format!(
                "Frame is {:?}, encoder expects {}x{}",
                frame.dimensions(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| RallyError::sink("Encoder already finished"))?;
        stdin
            .write_all(frame.as_raw())
            .map_err(|e| RallyError::sink(format!("Failed writing frame to ffmpeg: {e}")))?;
        self.frames_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> RallyResult<()> {
        let Some(stdin) = self.stdin.take() else {
            return Ok(());
        };
        drop(stdin);

        let status = self
            .child
            .wait()
            .map_err(|e| RallyError::sink(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = join_stderr(self.stderr_task.take());
        if !status.success() {
            return Err(RallyError::sink(format!(
                "ffmpeg encode failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        tracing::info!(
            output = %self.path.display(),
            frames = self.frames_written,
            "Encoded output video"
        );
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        if self.stdin.is_some() {
            let _ = self.finish();
        }
    }
}

/// An in-memory video source.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    info: VideoInfo,
    frames: VecDeque<RgbImage>,
}

impl FrameSequence {
    /// Frames share the first frame's resolution.
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        let info = VideoInfo::new(width, height, fps, Some(frames.len() as u64));
        Self {
            info,
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl VideoSource for FrameSequence {
    fn info(&self) -> &VideoInfo {
        &self.info
    }

    fn next_frame(&mut self) -> RallyResult<Option<RgbImage>> {
        Ok(self.frames.pop_front())
    }
}

/// An in-memory video sink.
#[derive(Debug, Clone, Default)]
pub struct FrameCollector {
    pub frames: Vec<RgbImage>,
    pub finished: bool,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VideoSink for FrameCollector {
    fn write_frame(&mut self, frame: &RgbImage) -> RallyResult<()> {
        if self.finished {
            return Err(RallyError::sink("Collector already finished"));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> RallyResult<()> {
        self.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("25/1"), Some(25.0));
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_frame_rate("60"), Some(60.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn test_parse_ffprobe_json() {
        let raw = r#"{
            "programs": [],
            "streams": [{
                "width": 1280,
                "height": 720,
                "r_frame_rate": "30/1",
                "avg_frame_rate": "30/1",
                "nb_frames": "300",
                "duration": "10.000000"
            }]
        }"#;
        let info = parse_ffprobe_json(raw).unwrap();
        assert_eq!((info.width, info.height), (1280, 720));
        assert_eq!(info.fps, 30.0);
        assert_eq!(info.frame_count, Some(300));
        assert!((info.duration - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_ffprobe_estimates_frame_count_from_duration() {
        let raw = r#"{"streams":[{"width":640,"height":480,"avg_frame_rate":"0/0","r_frame_rate":"25/1","duration":"4.0"}]}"#;
        let info = parse_ffprobe_json(raw).unwrap();
        assert_eq!(info.fps, 25.0);
        assert_eq!(info.frame_count, Some(100));
    }

    #[test]
    fn test_ffprobe_without_stream_is_a_source_error() {
        let err = parse_ffprobe_json(r#"{"streams":[]}"#).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_codec_args_by_container() {
        let avi = codec_args_for(Path::new("out/match_tracked.avi"));
        assert!(avi.windows(2).any(|w| w[0] == "-vtag" && w[1] == "xvid"));

        let mp4 = codec_args_for(Path::new("out/match_tracked.mp4"));
        assert!(mp4.iter().any(|a| a == "libx264"));
        assert!(mp4.iter().any(|a| a == "yuv420p"));
    }

    #[test]
    fn test_frame_sequence_reports_end_of_stream() {
        let mut source = FrameSequence::new(vec![RgbImage::new(4, 3), RgbImage::new(4, 3)], 30.0);
        assert_eq!(source.info().frame_count, Some(2));
        assert_eq!((source.info().width, source.info().height), (4, 3));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_collector_rejects_writes_after_finish() {
        let mut sink = FrameCollector::new();
        sink.write_frame(&RgbImage::new(2, 2)).unwrap();
        sink.finish().unwrap();
        assert!(sink.write_frame(&RgbImage::new(2, 2)).is_err());
        assert_eq!(sink.frames.len(), 1);
    }

    #[test]
    fn test_missing_file_is_reported() {
        let err = inspect_video(Path::new("/nonexistent/rally.mp4")).unwrap_err();
        assert!(matches!(err, RallyError::FileNotFound { .. }));
    }
}

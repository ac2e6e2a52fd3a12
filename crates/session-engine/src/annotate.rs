//! Annotated frame rendering.
//!
//! Pure drawing: nothing here feeds back into tracking state. Text is only
//! drawn when a font has been loaded.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_text_mut,
};
use rallytrack_common::{RallyError, RallyResult};
use rallytrack_model::{FrameRecord, MethodTag, Point2D};

const STATUS_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const RATE_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

/// Marker appearance for a resolved position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerStyle {
    pub color: Rgb<u8>,
    pub radius: i32,
}

/// Colour and radius keyed by how the position was found.
pub fn marker_style(methods: &[MethodTag]) -> MarkerStyle {
    let (color, radius) = if methods.contains(&MethodTag::Interpolated) {
        ([255, 128, 128], 6)
    } else if methods.len() > 1 {
        ([255, 255, 0], 8)
    } else if methods.contains(&MethodTag::Color) {
        ([0, 255, 0], 7)
    } else if methods.contains(&MethodTag::Motion) {
        ([0, 128, 255], 6)
    } else {
        ([255, 0, 255], 6)
    };
    MarkerStyle {
        color: Rgb(color),
        radius,
    }
}

/// `"color,motion C:2.0"`: at most two method names plus confidence.
pub fn marker_label(methods: &[MethodTag], confidence: f64) -> String {
    let names: Vec<&str> = methods.iter().take(2).map(|m| m.as_str()).collect();
    format!("{} C:{confidence:.1}", names.join(","))
}

/// Running counters shown in the status overlay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusLine {
    pub frame: u64,
    pub total_frames: Option<u64>,
    pub detections: u64,
    pub interpolated: u64,
    pub detection_rate: f64,
}

impl StatusLine {
    pub fn counters_text(&self) -> String {
        let total = self
            .total_frames
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string());
        format!(
            "Frame: {}/{} | Detections: {} | Interpolated: {}",
            self.frame, total, self.detections, self.interpolated
        )
    }

    pub fn rate_text(&self) -> String {
        format!("Detection Rate: {:.1}%", self.detection_rate)
    }
}

/// Draws trails, markers and overlays onto frames.
#[derive(Default)]
pub struct Annotator {
    font: Option<FontVec>,
}

impl Annotator {
    /// An annotator without text overlays.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a TTF/OTF font for text overlays.
    pub fn with_font_file(path: &Path) -> RallyResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            RallyError::config(format!("Cannot read font {}: {e}", path.display()))
        })?;
        let font = FontVec::try_from_vec(bytes).map_err(|e| {
            RallyError::config(format!("Invalid font {}: {e}", path.display()))
        })?;
        Ok(Self { font: Some(font) })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render one frame's annotations in place.
    pub fn annotate(
        &self,
        frame: &mut RgbImage,
        trajectory: &[Point2D],
        record: &FrameRecord,
        status: &StatusLine,
    ) {
        if let (Some((x, y)), Some(methods)) = (record.ball_center, record.methods.as_deref()) {
            draw_trail(frame, trajectory);
            self.draw_marker(frame, Point2D::new(x, y), methods, record.confidence);
        }
        self.draw_status(frame, status);
    }

    fn draw_marker(&self, frame: &mut RgbImage, at: Point2D, methods: &[MethodTag], confidence: f64) {
        let style = marker_style(methods);
        let center = (at.x.round() as i32, at.y.round() as i32);

        draw_hollow_circle_mut(frame, center, style.radius, style.color);
        draw_hollow_circle_mut(frame, center, style.radius - 1, style.color);
        draw_filled_circle_mut(frame, center, 2, style.color);
        if confidence > 1.0 {
            draw_hollow_circle_mut(frame, center, style.radius + 4, style.color);
        }

        if let Some(font) = &self.font {
            draw_text_mut(
                frame,
                style.color,
                center.0 + 10,
                center.1 - 22,
                PxScale::from(12.0),
                font,
                &marker_label(methods, confidence),
            );
        }
    }

    fn draw_status(&self, frame: &mut RgbImage, status: &StatusLine) {
        let Some(font) = &self.font else {
            return;
        };
        draw_text_mut(
            frame,
            STATUS_COLOR,
            10,
            12,
            PxScale::from(18.0),
            font,
            &status.counters_text(),
        );
        draw_text_mut(
            frame,
            RATE_COLOR,
            10,
            40,
            PxScale::from(15.0),
            font,
            &status.rate_text(),
        );
    }
}

/// Age-weighted trail: older segments are darker and thinner.
pub fn draw_trail(frame: &mut RgbImage, trajectory: &[Point2D]) {
    let n = trajectory.len();
    if n < 2 {
        return;
    }
    for i in 1..n {
        let alpha = i as f64 / n as f64;
        let thickness = ((2.0 * alpha) as i32).max(1);
        let color = Rgb([0, (255.0 * alpha) as u8, 0]);
        let (a, b) = (trajectory[i - 1], trajectory[i]);
        let start = (a.x as f32, a.y as f32);
        let end = (b.x as f32, b.y as f32);

        draw_line_segment_mut(frame, start, end, color);
        if thickness > 1 {
            draw_line_segment_mut(frame, (start.0 + 1.0, start.1), (end.0 + 1.0, end.1), color);
            draw_line_segment_mut(frame, (start.0, start.1 + 1.0), (end.0, end.1 + 1.0), color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(center: Option<(f64, f64)>, methods: Option<Vec<MethodTag>>, conf: f64) -> FrameRecord {
        FrameRecord {
            frame: 1,
            timestamp: 0.0,
            detected: center.is_some(),
            ball_center: center,
            methods,
            confidence: conf,
        }
    }

    fn status() -> StatusLine {
        StatusLine {
            frame: 12,
            total_frames: Some(300),
            detections: 9,
            interpolated: 2,
            detection_rate: 91.66,
        }
    }

    #[test]
    fn test_marker_styles() {
        assert_eq!(marker_style(&[MethodTag::Interpolated]).radius, 6);
        assert_eq!(
            marker_style(&[MethodTag::Color, MethodTag::Blob]).color,
            Rgb([255, 255, 0])
        );
        assert_eq!(marker_style(&[MethodTag::Color]).radius, 7);
        assert_eq!(marker_style(&[MethodTag::Motion]).color, Rgb([0, 128, 255]));
        assert_eq!(marker_style(&[MethodTag::Blob]).color, Rgb([255, 0, 255]));
    }

    #[test]
    fn test_label_and_status_text() {
        let label = marker_label(
            &[MethodTag::Color, MethodTag::Motion, MethodTag::Blob],
            3.0,
        );
        assert_eq!(label, "color,motion C:3.0");
        assert_eq!(
            status().counters_text(),
            "Frame: 12/300 | Detections: 9 | Interpolated: 2"
        );
        assert_eq!(status().rate_text(), "Detection Rate: 91.7%");
    }

    #[test]
    fn test_marker_is_drawn_at_ball() {
        let mut frame = RgbImage::new(40, 40);
        let rec = record(Some((20.0, 20.0)), Some(vec![MethodTag::Color]), 1.0);
        Annotator::new().annotate(&mut frame, &[Point2D::new(20.0, 20.0)], &rec, &status());

        assert_eq!(*frame.get_pixel(20, 20), Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(27, 20), Rgb([0, 255, 0]));
        assert_eq!(*frame.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_missed_frame_draws_nothing_without_font() {
        let mut frame = RgbImage::new(16, 16);
        Annotator::new().annotate(&mut frame, &[], &record(None, None, 0.0), &status());
        assert!(frame.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_trail_brightens_towards_newest() {
        let mut frame = RgbImage::new(40, 10);
        let trail = [
            Point2D::new(0.0, 5.0),
            Point2D::new(10.0, 5.0),
            Point2D::new(20.0, 5.0),
            Point2D::new(30.0, 5.0),
        ];
        draw_trail(&mut frame, &trail);
        let old = frame.get_pixel(5, 5)[1];
        let new = frame.get_pixel(25, 5)[1];
        assert!(old > 0 && new > old);
    }

    #[test]
    fn test_unreadable_font_is_a_config_error() {
        let err = Annotator::with_font_file(Path::new("/nonexistent/font.ttf"))
            .err()
            .unwrap();
        assert!(!err.is_fatal());
    }
}

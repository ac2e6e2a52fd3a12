//! Near-white / bright region detector.
//!
//! # Algorithm
//!
//! 1. **Mask:** pixels inside the HSV "near white" range OR at/above the
//!    brightness threshold.
//! 2. **Cleanup:** open then close with a 3x3 cross.
//! 3. **Filter:** external contours by area, bounding-box aspect and
//!    circularity.
//! 4. **Score:** `circularity × mean_brightness / 255`, boosted by the
//!    locality prior.

use super::{locality_boost, within, CandidateDetector, DetectionContext};
use crate::config::ColorDetectorConfig;
use crate::preprocess::PreparedFrame;
use crate::shape::{clean_mask, external_contours, masked_mean, ContourShape};
use image::{GrayImage, Luma};
use rallytrack_common::RallyResult;
use rallytrack_model::{Candidate, DetectionMethod, ShapeMetrics};

#[derive(Debug, Clone, Default)]
pub struct ColorDetector {
    config: ColorDetectorConfig,
}

impl ColorDetector {
    pub fn new(config: ColorDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ColorDetectorConfig {
        &self.config
    }

    /// Combined near-white / bright mask, before cleanup.
    pub fn mask(&self, frame: &PreparedFrame) -> GrayImage {
        let lower = self.config.hsv_lower;
        let upper = self.config.hsv_upper;
        let bright = self.config.bright_threshold;

        GrayImage::from_fn(frame.width, frame.height, |x, y| {
            let hsv = frame.hsv.get_pixel(x, y).0;
            let white = (0..3).all(|i| hsv[i] >= lower[i] && hsv[i] <= upper[i]);
            let lit = frame.gray.get_pixel(x, y)[0] >= bright;
            Luma([if white || lit { 255 } else { 0 }])
        })
    }

    fn evaluate(&self, shape: &ContourShape, ctx: &DetectionContext<'_>) -> Option<Candidate> {
        let cfg = &self.config;
        let area = shape.area();
        if !within(area, cfg.min_area, cfg.max_area) {
            return None;
        }
        if !within(shape.bbox.aspect_ratio(), cfg.min_aspect, cfg.max_aspect) {
            return None;
        }
        let circularity = shape.circularity()?;
        if circularity <= cfg.min_circularity {
            return None;
        }

        let center = shape.center()?;
        let brightness = masked_mean(&ctx.frame.gray, &shape.points)?;
        let score = circularity * (brightness / 255.0)
            * locality_boost(&center, ctx.recent_positions, cfg.locality_radius);

        Some(
            Candidate::new(center, area, score, DetectionMethod::Color).with_shape(ShapeMetrics {
                circularity,
                brightness,
                size: shape.bbox.width.max(shape.bbox.height) as f64,
            }),
        )
    }
}

impl CandidateDetector for ColorDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Color
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> RallyResult<Vec<Candidate>> {
        if ctx.frame.is_empty() {
            return Ok(Vec::new());
        }

        let cleaned = clean_mask(&self.mask(ctx.frame));
        let candidates = external_contours(&cleaned)
            .into_iter()
            .filter_map(ContourShape::analyze)
            .filter_map(|shape| self.evaluate(&shape, ctx))
            .collect::<Vec<_>>();

        tracing::trace!(count = candidates.len(), "color candidates");
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::prepare;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;
    use rallytrack_model::{Point2D, RingBuffer};

    fn run(frame: &RgbImage, recent: &RingBuffer<Point2D>) -> Vec<Candidate> {
        let prepared = prepare(frame);
        let previous = RingBuffer::new(3);
        let ctx = DetectionContext {
            frame: &prepared,
            recent_positions: recent,
            previous_frames: &previous,
        };
        ColorDetector::default().detect(&ctx).unwrap()
    }

    #[test]
    fn test_finds_white_disc() {
        let mut frame = RgbImage::new(64, 48);
        draw_filled_circle_mut(&mut frame, (30, 20), 4, Rgb([255, 255, 255]));

        let candidates = run(&frame, &RingBuffer::new(10));
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.center, Point2D::new(30.0, 20.0));
        assert_eq!(c.method, DetectionMethod::Color);
        assert!(c.score > 0.3 && c.score <= 1.0, "score {}", c.score);
        assert!(within(c.area, 10.0, 500.0));
    }

    #[test]
    fn test_locality_prior_boosts_score() {
        let mut frame = RgbImage::new(64, 48);
        draw_filled_circle_mut(&mut frame, (30, 20), 4, Rgb([255, 255, 255]));

        let base = run(&frame, &RingBuffer::new(10))[0].score;
        let mut recent = RingBuffer::new(10);
        recent.push(Point2D::new(30.0, 20.0));
        let boosted = run(&frame, &recent)[0].score;
        assert!((boosted - 2.0 * base).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_elongated_and_large_regions() {
        let mut frame = RgbImage::new(120, 80);
        draw_filled_rect_mut(&mut frame, Rect::at(5, 5).of_size(40, 3), Rgb([255, 255, 255]));
        draw_filled_rect_mut(&mut frame, Rect::at(60, 20).of_size(40, 40), Rgb([255, 255, 255]));
        assert!(run(&frame, &RingBuffer::new(10)).is_empty());
    }

    #[test]
    fn test_saturated_colour_is_ignored() {
        let mut frame = RgbImage::new(64, 48);
        draw_filled_circle_mut(&mut frame, (30, 20), 4, Rgb([200, 30, 30]));
        assert!(run(&frame, &RingBuffer::new(10)).is_empty());
    }
}

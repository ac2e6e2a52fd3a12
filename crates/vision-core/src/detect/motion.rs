//! Frame-differencing detector.
//!
//! The current grayscale frame is differenced against the two most recent
//! stored frames; the two difference maps are OR-ed, thresholded and cleaned
//! like the colour mask. Compact moving regions become candidates scored by
//! `area × patch_brightness / 255`.

use super::{locality_boost, within, CandidateDetector, DetectionContext};
use crate::config::MotionDetectorConfig;
use crate::shape::{clean_mask, external_contours, patch_mean, ContourShape};
use image::{GrayImage, Luma};
use rallytrack_common::{RallyError, RallyResult};
use rallytrack_model::{Candidate, DetectionMethod, ShapeMetrics};

#[derive(Debug, Clone, Default)]
pub struct MotionDetector {
    config: MotionDetectorConfig,
}

impl MotionDetector {
    pub fn new(config: MotionDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MotionDetectorConfig {
        &self.config
    }

    /// Thresholded motion mask, before cleanup.
    pub fn mask(
        &self,
        current: &GrayImage,
        previous: &GrayImage,
        earlier: &GrayImage,
    ) -> RallyResult<GrayImage> {
        for frame in [previous, earlier] {
            if frame.dimensions() != current.dimensions() {
                return Err(RallyError::detection(format!(
                    "motion history frame is {:?}, current frame is {:?}",
                    frame.dimensions(),
                    current.dimensions()
                )));
            }
        }

        let threshold = self.config.diff_threshold;
        Ok(GrayImage::from_fn(current.width(), current.height(), |x, y| {
            let c = current.get_pixel(x, y)[0];
            let d1 = c.abs_diff(previous.get_pixel(x, y)[0]);
            let d2 = c.abs_diff(earlier.get_pixel(x, y)[0]);
            Luma([if (d1 | d2) > threshold { 255 } else { 0 }])
        }))
    }
}

impl CandidateDetector for MotionDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Motion
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> RallyResult<Vec<Candidate>> {
        let (Some(previous), Some(earlier)) = (
            ctx.previous_frames.nth_newest(0),
            ctx.previous_frames.nth_newest(1),
        ) else {
            return Ok(Vec::new());
        };
        if ctx.frame.is_empty() {
            return Ok(Vec::new());
        }

        let cfg = &self.config;
        let gray = &ctx.frame.gray;
        let cleaned = clean_mask(&self.mask(gray, previous, earlier)?);

        let mut candidates = Vec::new();
        for shape in external_contours(&cleaned)
            .into_iter()
            .filter_map(ContourShape::analyze)
        {
            let area = shape.area();
            if !within(area, cfg.min_area, cfg.max_area)
                || !within(shape.bbox.aspect_ratio(), cfg.min_aspect, cfg.max_aspect)
            {
                continue;
            }
            let Some(center) = shape.center() else {
                continue;
            };
            let Some(brightness) = patch_mean(gray, center, cfg.patch_radius) else {
                continue;
            };

            let score = area * (brightness / 255.0)
                * locality_boost(&center, ctx.recent_positions, cfg.locality_radius);
            let circularity = shape.circularity().unwrap_or(0.0);
            candidates.push(
                Candidate::new(center, area, score, DetectionMethod::Motion).with_shape(
                    ShapeMetrics {
                        circularity,
                        brightness,
                        size: shape.bbox.width.max(shape.bbox.height) as f64,
                    },
                ),
            );
        }

        tracing::trace!(count = candidates.len(), "motion candidates");
        Ok(candidates)
    }
}

//! Multi-threshold structural blob detector.
//!
//! # Algorithm
//!
//! 1. **Sweep:** binarize the grayscale frame at each threshold of
//!    `[min_threshold, max_threshold)` in `threshold_step` increments.
//! 2. **Filter:** keep region contours passing area, circularity, inertia
//!    ratio, convexity and blob-colour tests.
//! 3. **Group:** centres found at different thresholds merge when closer
//!    than `min_dist_between_blobs` and than both radii.
//! 4. **Emit:** groups seen at `min_repeatability` or more thresholds
//!    become blobs, located at the confidence-weighted mean centre.
//!
//! A blob's response is the mean of its members' confidences (squared
//! inertia ratio), so round, repeatable blobs score highest.

use super::{locality_boost, CandidateDetector, DetectionContext};
use crate::config::BlobDetectorConfig;
use crate::shape::{outer_contours_above, ContourShape};
use image::GrayImage;
use rallytrack_common::RallyResult;
use rallytrack_model::{Candidate, DetectionMethod, Point2D, ShapeMetrics};

/// One region found at a single threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobCenter {
    pub location: Point2D,
    pub radius: f64,
    /// Squared inertia ratio.
    pub confidence: f64,
    pub circularity: f64,
}

/// A blob confirmed across thresholds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub location: Point2D,
    /// Diameter in pixels.
    pub size: f64,
    pub response: f64,
    pub circularity: f64,
}

#[derive(Debug, Clone, Default)]
pub struct BlobDetector {
    config: BlobDetectorConfig,
}

impl BlobDetector {
    pub fn new(config: BlobDetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BlobDetectorConfig {
        &self.config
    }

    /// Run the full sweep and return confirmed blobs.
    pub fn keypoints(&self, gray: &GrayImage) -> RallyResult<Vec<Keypoint>> {
        self.config.validate()?;

        let mut groups: Vec<Vec<BlobCenter>> = Vec::new();
        for threshold in self.config.thresholds() {
            let found = self.find_blobs(gray, threshold);
            let mut fresh = Vec::new();
            for center in found {
                if !self.join_group(&mut groups, center) {
                    fresh.push(vec![center]);
                }
            }
            groups.extend(fresh);
        }

        Ok(groups
            .iter()
            .filter(|g| g.len() >= self.config.min_repeatability)
            .map(|g| Self::summarize(g))
            .collect())
    }

    /// Regions of `gray > threshold` passing every shape filter.
    pub fn find_blobs(&self, gray: &GrayImage, threshold: u8) -> Vec<BlobCenter> {
        let cfg = &self.config;
        let mut centers = Vec::new();

        for shape in outer_contours_above(gray, threshold)
            .into_iter()
            .filter_map(ContourShape::analyze)
        {
            let area = shape.area();
            if area <= 0.0 || area < cfg.min_area || area >= cfg.max_area {
                continue;
            }
            let Some(circularity) = shape.circularity() else {
                continue;
            };
            if circularity < cfg.min_circularity {
                continue;
            }
            let inertia = shape.moments.inertia_ratio();
            if inertia < cfg.min_inertia_ratio {
                continue;
            }
            match shape.convexity() {
                Some(convexity) if convexity >= cfg.min_convexity => {}
                _ => continue,
            }
            let Some(location) = shape.moments.centroid() else {
                continue;
            };

            let (px, py) = (location.x.round(), location.y.round());
            if px < 0.0 || py < 0.0 || px >= gray.width() as f64 || py >= gray.height() as f64 {
                continue;
            }
            let binarized = if gray.get_pixel(px as u32, py as u32)[0] > threshold {
                255
            } else {
                0
            };
            if binarized != cfg.blob_color {
                continue;
            }

            centers.push(BlobCenter {
                location,
                radius: median_distance(&location, &shape),
                confidence: inertia * inertia,
                circularity,
            });
        }
        centers
    }

    /// Add `center` to the first group it is close to, keeping groups sorted
    /// by radius. Returns `false` when it starts a new group.
    fn join_group(&self, groups: &mut [Vec<BlobCenter>], center: BlobCenter) -> bool {
        for group in groups.iter_mut() {
            let middle = group[group.len() / 2];
            let dist = middle.location.distance_to(&center.location);
            let separate = dist >= self.config.min_dist_between_blobs
                && dist >= middle.radius
                && dist >= center.radius;
            if !separate {
                let at = group.partition_point(|c| c.radius <= center.radius);
                group.insert(at, center);
                return true;
            }
        }
        false
    }

    fn summarize(group: &[BlobCenter]) -> Keypoint {
        let middle = group[group.len() / 2];
        let normalizer: f64 = group.iter().map(|c| c.confidence).sum();
        let location = if normalizer > 0.0 {
            let x = group.iter().map(|c| c.location.x * c.confidence).sum::<f64>() / normalizer;
            let y = group.iter().map(|c| c.location.y * c.confidence).sum::<f64>() / normalizer;
            Point2D::new(x, y)
        } else {
            middle.location
        };
        let location = if location.is_finite() {
            location
        } else {
            middle.location
        };

        Keypoint {
            location,
            size: middle.radius * 2.0,
            response: normalizer / group.len() as f64,
            circularity: middle.circularity,
        }
    }
}

impl CandidateDetector for BlobDetector {
    fn method(&self) -> DetectionMethod {
        DetectionMethod::Blob
    }

    fn detect(&self, ctx: &DetectionContext<'_>) -> RallyResult<Vec<Candidate>> {
        if ctx.frame.is_empty() {
            return Ok(Vec::new());
        }

        let gray = &ctx.frame.gray;
        let candidates = self
            .keypoints(gray)?
            .into_iter()
            .map(|kp| {
                let center = kp.location.rounded();
                let score = kp.response
                    * kp.size
                    * locality_boost(&center, ctx.recent_positions, self.config.locality_radius);
                let radius = kp.size / 2.0;
                let brightness = if center.within_frame(gray.width(), gray.height()) {
                    gray.get_pixel(center.x as u32, center.y as u32)[0] as f64
                } else {
                    0.0
                };
                Candidate::new(
                    center,
                    std::f64::consts::PI * radius * radius,
                    score,
                    DetectionMethod::Blob,
                )
                .with_shape(ShapeMetrics {
                    circularity: kp.circularity,
                    brightness,
                    size: kp.size,
                })
            })
            .collect::<Vec<_>>();

        tracing::trace!(count = candidates.len(), "blob candidates");
        Ok(candidates)
    }
}

/// Median distance from `center` to the contour points.
fn median_distance(center: &Point2D, shape: &ContourShape) -> f64 {
    let mut dists: Vec<f64> = shape
        .points
        .iter()
        .map(|p| center.distance_to(&Point2D::new(p.x as f64, p.y as f64)))
        .collect();
    if dists.is_empty() {
        return 0.0;
    }
    dists.sort_by(|a, b| a.total_cmp(b));
    (dists[(dists.len() - 1) / 2] + dists[dists.len() / 2]) / 2.0
}

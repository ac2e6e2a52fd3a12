//! Tunable parameters for detection, fusion, and tracking.
//!
//! Every struct deserializes with `#[serde(default)]`, so an override file
//! only needs to name the values it changes.

use rallytrack_common::{RallyError, RallyResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All tracking parameters for one session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub color: ColorDetectorConfig,
    pub motion: MotionDetectorConfig,
    pub blob: BlobDetectorConfig,
    pub fusion: FusionConfig,
    pub tracker: TrackerConfig,
}

impl TrackingConfig {
    /// Load an override file. Missing keys keep their defaults.
    pub fn load(path: &Path) -> RallyResult<Self> {
        if !path.exists() {
            return Err(RallyError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject parameter combinations no detector can work with.
    pub fn validate(&self) -> RallyResult<()> {
        self.blob.validate()?;
        if self.fusion.cluster_radius <= 0.0 || !self.fusion.cluster_radius.is_finite() {
            return Err(RallyError::config(format!(
                "fusion.cluster_radius must be positive, got {}",
                self.fusion.cluster_radius
            )));
        }
        if self.color.min_area > self.color.max_area || self.motion.min_area > self.motion.max_area
        {
            return Err(RallyError::config("detector min_area exceeds max_area"));
        }
        Ok(())
    }
}

/// Near-white / bright region detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorDetectorConfig {
    /// Inclusive HSV lower bound (OpenCV 8-bit ranges: H 0-180).
    pub hsv_lower: [u8; 3],
    /// Inclusive HSV upper bound.
    pub hsv_upper: [u8; 3],
    /// Gray level at or above which a pixel counts as bright.
    pub bright_threshold: u8,
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    /// Circularity must be strictly greater than this.
    pub min_circularity: f64,
    /// Radius of the locality prior in pixels.
    pub locality_radius: f64,
}

impl Default for ColorDetectorConfig {
    fn default() -> Self {
        Self {
            hsv_lower: [0, 0, 200],
            hsv_upper: [180, 30, 255],
            bright_threshold: 220,
            min_area: 10.0,
            max_area: 500.0,
            min_aspect: 0.5,
            max_aspect: 2.0,
            min_circularity: 0.3,
            locality_radius: 100.0,
        }
    }
}

/// Frame-differencing detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionDetectorConfig {
    /// Differences strictly above this level count as motion.
    pub diff_threshold: u8,
    pub min_area: f64,
    pub max_area: f64,
    pub min_aspect: f64,
    pub max_aspect: f64,
    /// Half-width of the brightness sampling patch around the centroid.
    pub patch_radius: u32,
    pub locality_radius: f64,
}

impl Default for MotionDetectorConfig {
    fn default() -> Self {
        Self {
            diff_threshold: 15,
            min_area: 10.0,
            max_area: 500.0,
            min_aspect: 0.4,
            max_aspect: 2.5,
            patch_radius: 5,
            locality_radius: 150.0,
        }
    }
}

/// Multi-threshold structural blob detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobDetectorConfig {
    /// First binarization threshold (inclusive).
    pub min_threshold: u8,
    /// Sweep stops before reaching this threshold.
    pub max_threshold: u8,
    pub threshold_step: u8,
    pub min_area: f64,
    pub max_area: f64,
    pub min_circularity: f64,
    pub min_convexity: f64,
    pub min_inertia_ratio: f64,
    /// Required binarized value at the blob centre (255 = bright on dark).
    pub blob_color: u8,
    /// Centres closer than this across thresholds belong to one blob.
    pub min_dist_between_blobs: f64,
    /// Minimum number of thresholds a blob must appear at.
    pub min_repeatability: usize,
    pub locality_radius: f64,
}

impl Default for BlobDetectorConfig {
    fn default() -> Self {
        Self {
            min_threshold: 200,
            max_threshold: 255,
            threshold_step: 10,
            min_area: 10.0,
            max_area: 500.0,
            min_circularity: 0.3,
            min_convexity: 0.5,
            min_inertia_ratio: 0.3,
            blob_color: 255,
            min_dist_between_blobs: 10.0,
            min_repeatability: 2,
            locality_radius: 100.0,
        }
    }
}

impl BlobDetectorConfig {
    pub fn validate(&self) -> RallyResult<()> {
        if self.threshold_step == 0 {
            return Err(RallyError::config("blob.threshold_step must be non-zero"));
        }
        if self.min_threshold >= self.max_threshold {
            return Err(RallyError::config(format!(
                "blob.min_threshold ({}) must be below blob.max_threshold ({})",
                self.min_threshold, self.max_threshold
            )));
        }
        if self.min_repeatability == 0 {
            return Err(RallyError::config("blob.min_repeatability must be at least 1"));
        }
        Ok(())
    }

    /// The binarization thresholds of one sweep.
    pub fn thresholds(&self) -> impl Iterator<Item = u8> {
        let step = self.threshold_step.max(1) as usize;
        (self.min_threshold as u16..self.max_threshold as u16)
            .step_by(step)
            .map(|t| t as u8)
    }
}

/// Candidate weighting and clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub color_weight: f64,
    pub motion_weight: f64,
    pub blob_weight: f64,
    /// Candidates strictly closer than this to a seed join its cluster.
    pub cluster_radius: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            color_weight: 1.5,
            motion_weight: 1.0,
            blob_weight: 1.2,
            cluster_radius: 20.0,
        }
    }
}

/// History capacities and gap filling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub trajectory_capacity: usize,
    pub position_capacity: usize,
    pub frame_capacity: usize,
    pub detection_history_capacity: usize,
    /// Confidence recorded for predicted positions.
    pub interpolation_confidence: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            trajectory_capacity: 30,
            position_capacity: 10,
            frame_capacity: 3,
            detection_history_capacity: 20,
            interpolation_confidence: 0.5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_blob_sweep() {
        let thresholds: Vec<u8> = BlobDetectorConfig::default().thresholds().collect();
        assert_eq!(thresholds, vec![200, 210, 220, 230, 240, 250]);
    }

    #[test]
    fn test_partial_override() {
        let config: TrackingConfig =
            serde_json::from_str(r#"{"fusion":{"cluster_radius":12.5},"motion":{"diff_threshold":30}}"#)
                .unwrap();
        assert_eq!(config.fusion.cluster_radius, 12.5);
        assert_eq!(config.fusion.color_weight, 1.5);
        assert_eq!(config.motion.diff_threshold, 30);
        assert_eq!(config.tracker.trajectory_capacity, 30);
    }

    #[test]
    fn test_validate_rejects_bad_sweep() {
        let mut config = TrackingConfig::default();
        assert!(config.validate().is_ok());

        config.blob.threshold_step = 0;
        assert!(config.validate().is_err());

        config.blob.threshold_step = 10;
        config.blob.min_threshold = 255;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = TrackingConfig::load(Path::new("/nonexistent/tuning.json")).unwrap_err();
        assert!(matches!(err, RallyError::FileNotFound { .. }));
    }
}

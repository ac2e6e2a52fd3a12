//! Detector candidates and fused consensus estimates.
//!
//! Candidates live for a single frame: detectors produce them, the fusion
//! engine consumes them, and only the selected [`MergedCandidate`]'s centre
//! survives into the trajectory.

use crate::geometry::Point2D;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The detector that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// Near-white / bright region detector.
    Color,
    /// Frame-differencing detector.
    Motion,
    /// Multi-threshold structural blob detector.
    Blob,
}

impl DetectionMethod {
    pub const ALL: [DetectionMethod; 3] = [Self::Color, Self::Motion, Self::Blob];

    /// Stable name used in records and overlays.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Motion => "motion",
            Self::Blob => "blob",
        }
    }

    /// Clustering order: lower values seed clusters first.
    pub fn priority(&self) -> u8 {
        match self {
            Self::Color => 0,
            Self::Blob => 1,
            Self::Motion => 2,
        }
    }
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a frame's position was established, as written to frame records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodTag {
    Color,
    Motion,
    Blob,
    Interpolated,
}

impl MethodTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Motion => "motion",
            Self::Blob => "blob",
            Self::Interpolated => "interpolated",
        }
    }
}

impl From<DetectionMethod> for MethodTag {
    fn from(method: DetectionMethod) -> Self {
        match method {
            DetectionMethod::Color => Self::Color,
            DetectionMethod::Motion => Self::Motion,
            DetectionMethod::Blob => Self::Blob,
        }
    }
}

impl fmt::Display for MethodTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape measurements attached to a candidate, when the detector has them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeMetrics {
    /// `4π·area / perimeter²`, 1.0 for a perfect circle.
    pub circularity: f64,
    /// Mean grayscale intensity in `[0, 255]`.
    pub brightness: f64,
    /// Characteristic size in pixels (blob diameter or bounding extent).
    pub size: f64,
}

/// A single detector's proposed ball location in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub center: Point2D,
    /// Region area in pixels.
    pub area: f64,
    /// Detector-specific score, already boosted by the locality prior.
    pub score: f64,
    pub method: DetectionMethod,
    pub shape: Option<ShapeMetrics>,
}

impl Candidate {
    pub fn new(center: Point2D, area: f64, score: f64, method: DetectionMethod) -> Self {
        Self {
            center,
            area,
            score,
            method,
            shape: None,
        }
    }

    pub fn with_shape(mut self, shape: ShapeMetrics) -> Self {
        self.shape = Some(shape);
        self
    }
}

/// A consensus location produced by clustering nearby candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCandidate {
    pub center: Point2D,
    /// Sum of the members' weighted scores.
    pub aggregate_score: f64,
    /// Distinct detectors represented in the cluster.
    pub methods: BTreeSet<DetectionMethod>,
    /// Number of raw candidates merged into this cluster.
    pub confidence: usize,
}

impl MergedCandidate {
    /// Ranking key used to pick the frame's estimate.
    pub fn rank(&self) -> f64 {
        self.aggregate_score * self.confidence as f64
    }

    /// Whether more than one detector agrees on this location.
    pub fn is_multi_method(&self) -> bool {
        self.methods.len() > 1
    }

    /// Method tags in stable order, for frame records.
    pub fn method_tags(&self) -> Vec<MethodTag> {
        self.methods.iter().copied().map(MethodTag::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serializes_snake_case() {
        let json = serde_json::to_string(&DetectionMethod::Color).unwrap();
        assert_eq!(json, "\"color\"");
        let json = serde_json::to_string(&MethodTag::Interpolated).unwrap();
        assert_eq!(json, "\"interpolated\"");
    }

    #[test]
    fn test_priority_order() {
        let mut methods = DetectionMethod::ALL.to_vec();
        methods.sort_by_key(|m| m.priority());
        assert_eq!(
            methods,
            vec![
                DetectionMethod::Color,
                DetectionMethod::Blob,
                DetectionMethod::Motion
            ]
        );
    }

    #[test]
    fn test_rank_favours_corroboration() {
        let single = MergedCandidate {
            center: Point2D::new(0.0, 0.0),
            aggregate_score: 3.0,
            methods: [DetectionMethod::Motion].into_iter().collect(),
            confidence: 1,
        };
        let pair = MergedCandidate {
            center: Point2D::new(5.0, 5.0),
            aggregate_score: 2.0,
            methods: [DetectionMethod::Color, DetectionMethod::Blob]
                .into_iter()
                .collect(),
            confidence: 2,
        };
        assert!(pair.rank() > single.rank());
        assert!(pair.is_multi_method());
        assert_eq!(pair.method_tags(), vec![MethodTag::Color, MethodTag::Blob]);
    }
}

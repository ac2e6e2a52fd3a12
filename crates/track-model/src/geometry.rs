//! Pixel-space geometry.

use serde::{Deserialize, Serialize};

/// A 2D point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point2D) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Both coordinates are finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Snap to the nearest integer pixel.
    pub fn rounded(&self) -> Point2D {
        Point2D {
            x: self.x.round(),
            y: self.y.round(),
        }
    }

    /// Whether the point lies inside `[0, width) x [0, height)`.
    pub fn within_frame(&self, width: u32, height: u32) -> bool {
        self.x >= 0.0 && self.x < width as f64 && self.y >= 0.0 && self.y < height as f64
    }

    /// Componentwise difference `self - other`.
    pub fn offset_from(&self, other: &Point2D) -> (f64, f64) {
        (self.x - other.x, self.y - other.y)
    }

    /// Translate by a displacement.
    pub fn translated(&self, dx: f64, dy: f64) -> Point2D {
        Point2D {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Coordinates as a tuple, the form used in serialized records.
    pub fn as_tuple(&self) -> (f64, f64) {
        (self.x, self.y)
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Minimum distance from `point` to any of `others`, `None` if empty.
pub fn nearest_distance<'a, I>(point: &Point2D, others: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a Point2D>,
{
    others
        .into_iter()
        .map(|p| point.distance_to(p))
        .fold(None, |acc: Option<f64>, d| match acc {
            Some(best) if best <= d => Some(best),
            _ => Some(d),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point2D::new(0.0, 0.0);
        let b = Point2D::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_within_frame_is_half_open() {
        assert!(Point2D::new(0.0, 0.0).within_frame(10, 10));
        assert!(Point2D::new(9.0, 9.0).within_frame(10, 10));
        assert!(!Point2D::new(10.0, 5.0).within_frame(10, 10));
        assert!(!Point2D::new(5.0, -1.0).within_frame(10, 10));
    }

    #[test]
    fn test_nearest_distance() {
        let p = Point2D::new(0.0, 0.0);
        let others = [Point2D::new(10.0, 0.0), Point2D::new(0.0, 2.0)];
        assert_eq!(nearest_distance(&p, &others), Some(2.0));
        assert_eq!(nearest_distance(&p, &[]), None);
    }

    #[test]
    fn test_rounded() {
        let p = Point2D::new(17.9999999, 14.4).rounded();
        assert_eq!(p, Point2D::new(18.0, 14.0));
    }
}

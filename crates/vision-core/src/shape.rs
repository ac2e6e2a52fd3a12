//! Binary mask cleanup and contour shape analysis.
//!
//! Contours are closed polygons through boundary pixel centres. Area and
//! moments are computed from the polygon (Green's theorem), so a region's
//! area is slightly below its pixel count.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours_with_threshold, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::{arc_length, convex_hull};
use imageproc::morphology;
use imageproc::point::Point;
use rallytrack_model::Point2D;

/// A closed contour polygon.
pub type Contour = Vec<Point<i32>>;

/// Open then close a binary mask with a 3x3 cross.
pub fn clean_mask(mask: &GrayImage) -> GrayImage {
    let opened = morphology::open(mask, Norm::L1, 1);
    morphology::close(&opened, Norm::L1, 1)
}

/// Outermost contours of the non-zero regions of a mask.
pub fn external_contours(mask: &GrayImage) -> Vec<Contour> {
    if mask.width() == 0 || mask.height() == 0 {
        return Vec::new();
    }
    find_contours_with_threshold::<i32>(mask, 0)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| c.points)
        .collect()
}

/// Outer contours of every region of `gray` strictly brighter than `threshold`,
/// including regions nested inside holes.
pub fn outer_contours_above(gray: &GrayImage, threshold: u8) -> Vec<Contour> {
    if gray.width() == 0 || gray.height() == 0 {
        return Vec::new();
    }
    find_contours_with_threshold::<i32>(gray, threshold)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer)
        .map(|c| c.points)
        .collect()
}

/// Spatial and central moments of a polygon up to second order.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub m20: f64,
    pub m11: f64,
    pub m02: f64,
    pub mu20: f64,
    pub mu11: f64,
    pub mu02: f64,
}

impl Moments {
    /// Moments of the polygon enclosed by `points`, orientation-independent.
    pub fn of_polygon(points: &[Point<i32>]) -> Self {
        let n = points.len();
        if n < 3 {
            return Self::default();
        }

        let (mut a00, mut a10, mut a01, mut a20, mut a11, mut a02) =
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
        let last = points[n - 1];
        let (mut xp, mut yp) = (last.x as f64, last.y as f64);
        for p in points {
            let (x, y) = (p.x as f64, p.y as f64);
            let cross = xp * y - x * yp;
            a00 += cross;
            a10 += cross * (xp + x);
            a01 += cross * (yp + y);
            a20 += cross * (xp * xp + xp * x + x * x);
            a11 += cross * (xp * (2.0 * yp + y) + x * (yp + 2.0 * y));
            a02 += cross * (yp * yp + yp * y + y * y);
            xp = x;
            yp = y;
        }

        let sign = if a00 < 0.0 { -1.0 } else { 1.0 };
        let m00 = sign * a00 / 2.0;
        let m10 = sign * a10 / 6.0;
        let m01 = sign * a01 / 6.0;
        let m20 = sign * a20 / 12.0;
        let m11 = sign * a11 / 24.0;
        let m02 = sign * a02 / 12.0;

        let (mu20, mu11, mu02) = if m00.abs() > f64::EPSILON {
            let cx = m10 / m00;
            let cy = m01 / m00;
            (m20 - cx * m10, m11 - cx * m01, m02 - cy * m01)
        } else {
            (0.0, 0.0, 0.0)
        };

        Self {
            m00,
            m10,
            m01,
            m20,
            m11,
            m02,
            mu20,
            mu11,
            mu02,
        }
    }

    /// Enclosed area.
    pub fn area(&self) -> f64 {
        self.m00
    }

    /// Centre of mass, `None` for a degenerate polygon.
    pub fn centroid(&self) -> Option<Point2D> {
        if self.m00.abs() <= f64::EPSILON {
            return None;
        }
        let c = Point2D::new(self.m10 / self.m00, self.m01 / self.m00);
        c.is_finite().then_some(c)
    }

    /// Ratio of minor to major principal inertia, 1.0 for isotropic shapes.
    pub fn inertia_ratio(&self) -> f64 {
        let denominator = ((2.0 * self.mu11).powi(2) + (self.mu20 - self.mu02).powi(2)).sqrt();
        if denominator <= 1e-2 {
            return 1.0;
        }
        let sum = self.mu20 + self.mu02;
        let major = sum + denominator;
        if major <= 0.0 {
            return 1.0;
        }
        ((sum - denominator) / major).max(0.0)
    }
}

/// Axis-aligned bounding box covering whole pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn of_points(points: &[Point<i32>]) -> Option<Self> {
        let first = points.first()?;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
        for p in &points[1..] {
            min_x = min_x.min(p.x);
            max_x = max_x.max(p.x);
            min_y = min_y.min(p.y);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            x: min_x,
            y: min_y,
            width: (max_x - min_x + 1) as u32,
            height: (max_y - min_y + 1) as u32,
        })
    }

    /// Width over height.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// Geometry of one contour, computed once and shared by the filters.
#[derive(Debug, Clone)]
pub struct ContourShape {
    pub points: Contour,
    pub moments: Moments,
    pub bbox: BoundingBox,
}

impl ContourShape {
    /// `None` when the contour is empty.
    pub fn analyze(points: Contour) -> Option<Self> {
        let bbox = BoundingBox::of_points(&points)?;
        let moments = Moments::of_polygon(&points);
        Some(Self {
            points,
            moments,
            bbox,
        })
    }

    pub fn area(&self) -> f64 {
        self.moments.area()
    }

    pub fn perimeter(&self) -> f64 {
        perimeter(&self.points)
    }

    pub fn circularity(&self) -> Option<f64> {
        circularity(self.area(), self.perimeter())
    }

    pub fn convexity(&self) -> Option<f64> {
        convexity(&self.points, self.area())
    }

    /// Centroid snapped to the nearest pixel.
    pub fn center(&self) -> Option<Point2D> {
        self.moments.centroid().map(|c| c.rounded())
    }
}

/// Closed perimeter length.
pub fn perimeter(points: &[Point<i32>]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    arc_length(points, true)
}

/// `4π·area / perimeter²`; `None` for zero perimeter.
pub fn circularity(area: f64, perimeter: f64) -> Option<f64> {
    if perimeter <= 0.0 {
        return None;
    }
    let value = 4.0 * std::f64::consts::PI * area / (perimeter * perimeter);
    value.is_finite().then_some(value)
}

/// Area over convex hull area; `None` when the hull is degenerate.
pub fn convexity(points: &[Point<i32>], area: f64) -> Option<f64> {
    if points.len() < 3 {
        return None;
    }
    let hull = convex_hull(points);
    let hull_area = Moments::of_polygon(&hull).area();
    if hull_area <= 0.0 {
        return None;
    }
    Some(area / hull_area)
}

/// Mean gray level over the filled contour, boundary included.
pub fn masked_mean(gray: &GrayImage, points: &[Point<i32>]) -> Option<f64> {
    let bbox = BoundingBox::of_points(points)?;
    let mut polygon: Vec<Point<i32>> = points
        .iter()
        .map(|p| Point::new(p.x - bbox.x, p.y - bbox.y))
        .collect();
    while polygon.len() > 1 && polygon.first() == polygon.last() {
        polygon.pop();
    }

    let mut mask = GrayImage::new(bbox.width, bbox.height);
    if polygon.len() >= 3 {
        draw_polygon_mut(&mut mask, &polygon, Luma([255u8]));
    } else {
        for p in &polygon {
            mask.put_pixel(p.x as u32, p.y as u32, Luma([255u8]));
        }
    }

    let (mut sum, mut count) = (0u64, 0u64);
    for (mx, my, m) in mask.enumerate_pixels() {
        if m[0] == 0 {
            continue;
        }
        let gx = bbox.x + mx as i32;
        let gy = bbox.y + my as i32;
        if gx < 0 || gy < 0 || gx as u32 >= gray.width() || gy as u32 >= gray.height() {
            continue;
        }
        sum += gray.get_pixel(gx as u32, gy as u32)[0] as u64;
        count += 1;
    }
    (count > 0).then(|| sum as f64 / count as f64)
}

/// Mean gray level of the square `[c - r, c + r)` clipped to the image.
pub fn patch_mean(gray: &GrayImage, center: Point2D, radius: u32) -> Option<f64> {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    let (cx, cy, r) = (center.x as i64, center.y as i64, radius as i64);
    let (x0, x1) = ((cx - r).max(0), (cx + r).min(w));
    let (y0, y1) = ((cy - r).max(0), (cy + r).min(h));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let mut sum = 0u64;
    for y in y0..y1 {
        for x in x0..x1 {
            sum += gray.get_pixel(x as u32, y as u32)[0] as u64;
        }
    }
    Some(sum as f64 / ((x1 - x0) * (y1 - y0)) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
    use imageproc::rect::Rect;

    fn square(x: i32, y: i32, side: i32) -> Contour {
        vec![
            Point::new(x, y),
            Point::new(x + side, y),
            Point::new(x + side, y + side),
            Point::new(x, y + side),
        ]
    }

    #[test]
    fn test_square_moments() {
        let m = Moments::of_polygon(&square(2, 4, 10));
        assert!((m.area() - 100.0).abs() < 1e-9);
        let c = m.centroid().unwrap();
        assert!((c.x - 7.0).abs() < 1e-9);
        assert!((c.y - 9.0).abs() < 1e-9);
        assert!((m.inertia_ratio() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_orientation_does_not_matter() {
        let mut points = square(0, 0, 6);
        let forward = Moments::of_polygon(&points);
        points.reverse();
        let backward = Moments::of_polygon(&points);
        assert!((forward.area() - backward.area()).abs() < 1e-9);
        assert!((forward.m10 - backward.m10).abs() < 1e-9);
    }

    #[test]
    fn test_elongated_inertia() {
        let rect = vec![
            Point::new(0, 0),
            Point::new(20, 0),
            Point::new(20, 2),
            Point::new(0, 2),
        ];
        let ratio = Moments::of_polygon(&rect).inertia_ratio();
        assert!(ratio < 0.05, "ratio {ratio}");
    }

    #[test]
    fn test_degenerate_polygons() {
        let line = vec![Point::new(0, 0), Point::new(5, 0)];
        assert_eq!(Moments::of_polygon(&line).area(), 0.0);
        assert!(Moments::of_polygon(&line).centroid().is_none());
        assert!(circularity(10.0, 0.0).is_none());
        assert!(convexity(&line, 0.0).is_none());
    }

    #[test]
    fn test_bounding_box_is_inclusive() {
        let bbox = BoundingBox::of_points(&square(3, 3, 4)).unwrap();
        assert_eq!((bbox.width, bbox.height), (5, 5));
        assert!((bbox.aspect_ratio() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disc_contour_is_circular() {
        let mut mask = GrayImage::new(40, 40);
        draw_filled_circle_mut(&mut mask, (20, 20), 6, Luma([255u8]));

        let cleaned = clean_mask(&mask);
        let contours = external_contours(&cleaned);
        assert_eq!(contours.len(), 1);

        let shape = ContourShape::analyze(contours[0].clone()).unwrap();
        assert_eq!(shape.center(), Some(Point2D::new(20.0, 20.0)));
        assert!(shape.circularity().unwrap() > 0.6);
        assert!(shape.convexity().unwrap() > 0.9);
        assert_eq!(masked_mean(&cleaned, &shape.points), Some(255.0));
    }

    #[test]
    fn test_cleanup_removes_speckle() {
        let mut mask = GrayImage::new(20, 20);
        mask.put_pixel(5, 5, Luma([255u8]));
        draw_filled_rect_mut(&mut mask, Rect::at(10, 10).of_size(6, 6), Luma([255u8]));

        let contours = external_contours(&clean_mask(&mask));
        assert_eq!(contours.len(), 1);
    }

    #[test]
    fn test_patch_mean_clips_to_image() {
        let gray = GrayImage::from_pixel(8, 8, Luma([100u8]));
        assert_eq!(patch_mean(&gray, Point2D::new(0.0, 0.0), 5), Some(100.0));
        assert_eq!(patch_mean(&gray, Point2D::new(20.0, 20.0), 5), None);
        assert_eq!(patch_mean(&GrayImage::new(0, 0), Point2D::new(0.0, 0.0), 5), None);
    }

    #[test]
    fn test_empty_mask_has_no_contours() {
        assert!(external_contours(&GrayImage::new(10, 10)).is_empty());
        assert!(external_contours(&GrayImage::new(0, 0)).is_empty());
    }
}

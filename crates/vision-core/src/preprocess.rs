//! Frame preprocessing: grayscale, HSV and Lab representations.
//!
//! Colour spaces follow the 8-bit conventions used by common vision
//! toolkits so thresholds carry over unchanged:
//! - HSV: H in `[0, 180)`, S and V in `[0, 255]`
//! - Lab: L scaled by `255/100`, a and b offset by 128, D65 white point

use image::{GrayImage, Luma, Rgb, RgbImage};

/// The representations of one frame consumed by the detectors.
#[derive(Debug, Clone)]
pub struct PreparedFrame {
    pub gray: GrayImage,
    /// Channels are `[H, S, V]`.
    pub hsv: RgbImage,
    /// Channels are `[L, a, b]`.
    pub lab: RgbImage,
    pub width: u32,
    pub height: u32,
}

impl PreparedFrame {
    /// Whether the frame has no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Derive every representation of a frame.
pub fn prepare(frame: &RgbImage) -> PreparedFrame {
    let (width, height) = frame.dimensions();
    let mut gray = GrayImage::new(width, height);
    let mut hsv = RgbImage::new(width, height);
    let mut lab = RgbImage::new(width, height);

    for (x, y, pixel) in frame.enumerate_pixels() {
        gray.put_pixel(x, y, Luma([luma(pixel)]));
        hsv.put_pixel(x, y, Rgb(rgb_to_hsv(pixel)));
        lab.put_pixel(x, y, Rgb(rgb_to_lab(pixel)));
    }

    PreparedFrame {
        gray,
        hsv,
        lab,
        width,
        height,
    }
}

/// BT.601 luma, rounded.
pub fn luma(pixel: &Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    let weighted = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((weighted + 500) / 1000) as u8
}

/// RGB to 8-bit HSV.
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(|c| c as f64);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { 255.0 * delta / v } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round();
    [
        if h >= 180.0 { 0 } else { h as u8 },
        s.round().clamp(0.0, 255.0) as u8,
        v as u8,
    ]
}

/// RGB to 8-bit Lab.
pub fn rgb_to_lab(pixel: &Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(|c| srgb_to_linear(c as f64 / 255.0));

    let x = (0.412453 * r + 0.357580 * g + 0.180423 * b) / 0.950456;
    let y = 0.212671 * r + 0.715160 * g + 0.072169 * b;
    let z = (0.019334 * r + 0.119193 * g + 0.950227 * b) / 1.088754;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    let l = if y > 0.008856 {
        116.0 * y.cbrt() - 16.0
    } else {
        903.3 * y
    };
    let a = 500.0 * (fx - fy) + 128.0;
    let b = 200.0 * (fy - fz) + 128.0;

    [
        (l * 255.0 / 100.0).round().clamp(0.0, 255.0) as u8,
        a.round().clamp(0.0, 255.0) as u8,
        b.round().clamp(0.0, 255.0) as u8,
    ]
}

fn srgb_to_linear(c: f64) -> f64 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn lab_f(t: f64) -> f64 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

//! Color-based HP bar reading
//!
//! The bar is red, yellow or green depending on remaining health. A column
//! counts as filled if any of its pixels falls in one of those hue bands; the
//! fill ratio is the health percent.

use image::{Rgb, RgbImage};

use super::Rect;

/// HSV band with OpenCV scaling: H 0-179, S and V 0-255
#[derive(Debug, Clone, Copy)]
struct HsvBand {
    lo: (u8, u8, u8),
    hi: (u8, u8, u8),
}

impl HsvBand {
    const fn new(lo: (u8, u8, u8), hi: (u8, u8, u8)) -> Self {
        Self { lo, hi }
    }

    fn contains(&self, (h, s, v): (u8, u8, u8)) -> bool {
        (self.lo.0..=self.hi.0).contains(&h)
            && (self.lo.1..=self.hi.1).contains(&s)
            && (self.lo.2..=self.hi.2).contains(&v)
    }
}

const BAR_BANDS: [HsvBand; 4] = [
    // Red wraps around the hue circle
    HsvBand::new((0, 120, 120), (10, 255, 255)),
    HsvBand::new((160, 120, 120), (179, 255, 255)),
    // Yellow
    HsvBand::new((15, 120, 120), (35, 255, 255)),
    // Green
    HsvBand::new((36, 80, 80), (85, 255, 255)),
];

/// Convert RGB to HSV in OpenCV's 8-bit scale
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> (u8, u8, u8) {
    let [r, g, b] = pixel.0.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta / max * 255.0 } else { 0.0 };

    let h_deg = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        60.0 * (b - r) / delta + 120.0
    } else {
        60.0 * (r - g) / delta + 240.0
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    (
        (h_deg / 2.0).round().min(179.0) as u8,
        s.round() as u8,
        v.round() as u8,
    )
}

/// Whether a pixel has one of the HP bar colors
pub fn is_bar_pixel(pixel: &Rgb<u8>) -> bool {
    let hsv = rgb_to_hsv(pixel);
    BAR_BANDS.iter().any(|band| band.contains(hsv))
}

/// Measure the filled percentage of the bar inside `region`
///
/// The region is clipped to the frame; an empty region reads as 0.
pub fn measure_fill(frame: &RgbImage, region: Rect) -> f64 {
    let Some((x1, y1, x2, y2)) = region.clip(frame.width(), frame.height()) else {
        return 0.0;
    };

    let width = x2 - x1;
    let filled = (x1..x2)
        .filter(|&x| (y1..y2).any(|y| is_bar_pixel(frame.get_pixel(x, y))))
        .count();

    (filled as f64 / width as f64 * 100.0).clamp(0.0, 100.0)
}

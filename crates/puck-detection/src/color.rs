use crate::filter::median_blur;
use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// Inclusive HSV bounds on OpenCV's 8-bit scale (hue 0-179, sat/val 0-255).
///
/// Bounds with `lower > upper` on any channel never match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn in_range(&self, h: u8, s: u8, v: u8) -> bool {
        h >= self.lower[0]
            && h <= self.upper[0]
            && s >= self.lower[1]
            && s <= self.upper[1]
            && v >= self.lower[2]
            && v <= self.upper[2]
    }

    // True when some channel has inverted bounds.
    pub fn is_degenerate(&self) -> bool {
        self.lower.iter().zip(self.upper.iter()).any(|(lo, hi)| lo > hi)
    }
}

// Converts an RGB triple to HSV with hue halved into 0..180.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let s = if max == 0 {
        0
    } else {
        (delta * 255.0 / max as f32).round() as u8
    };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * ((g as f32 - b as f32) / delta)
    } else if max == g {
        60.0 * ((b as f32 - r as f32) / delta) + 120.0
    } else {
        60.0 * ((r as f32 - g as f32) / delta) + 240.0
    };
    let h = if h < 0.0 { h + 360.0 } else { h };
    let h_byte = match (h / 2.0).round() as u8 {
        180.. => 0,
        h => h,
    };

    (h_byte, s, max)
}

/// Writes 255 into `mask` where the RGB pixel falls inside `range`, 0 elsewhere.
pub fn in_range_mask(frame: ArrayView2<[u8; 3]>, range: &HsvRange, mask: &mut Array2<u8>) {
    if mask.dim() != frame.dim() {
        *mask = Array2::zeros(frame.dim());
    }
    if range.is_degenerate() {
        mask.fill(0);
        return;
    }
    Zip::from(mask).and(&frame).for_each(|dst, &[r, g, b]| {
        let (h, s, v) = rgb_to_hsv(r, g, b);
        *dst = if range.in_range(h, s, v) { 255 } else { 0 };
    });
}

/// Thresholds `frame` against `range` and median-filters the result.
pub fn segment(frame: ArrayView2<[u8; 3]>, range: &HsvRange, kernel: usize) -> Array2<u8> {
    let mut mask = Array2::zeros(frame.dim());
    in_range_mask(frame, range, &mut mask);
    median_blur(mask.view(), kernel)
}

/// Keeps the pixels of `frame` selected by `mask` and blacks out the rest.
pub fn apply_mask(frame: ArrayView2<[u8; 3]>, mask: ArrayView2<u8>) -> Array2<[u8; 3]> {
    let mut out = Array2::from_elem(frame.dim(), [0u8; 3]);
    Zip::from(&mut out)
        .and(&frame)
        .and(&mask)
        .for_each(|dst, &px, &m| {
            if m != 0 {
                *dst = px;
            }
        });
    out
}

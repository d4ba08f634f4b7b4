//! Annotations drawn onto visualization frames.

use crate::tracker::TableMapping;
use ndarray::ArrayViewMut2;
use puck_calibration::PixelPoint;
use puck_detection::Blob;
use puck_prediction::{Prediction, TablePoint};

pub type Rgb = [u8; 3];

pub const PUCK: Rgb = [255, 255, 0];
pub const RAW_INTERCEPT: Rgb = [255, 0, 0];
pub const SMOOTHED_INTERCEPT: Rgb = [255, 255, 0];
pub const BOUNCE_PATH: Rgb = [0, 0, 255];

const MARKER_RADIUS: f64 = 10.0;

fn put(img: &mut ArrayViewMut2<Rgb>, x: i64, y: i64, color: Rgb) {
    let (h, w) = img.dim();
    if x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h {
        img[(y as usize, x as usize)] = color;
    }
}

/// Circle outline; off-image parts are clipped.
pub fn draw_circle(img: &mut ArrayViewMut2<Rgb>, cx: f64, cy: f64, radius: f64, color: Rgb) {
    // At least one sample per degree.
    let steps = ((2.0 * std::f64::consts::PI * radius).ceil() as usize).max(360);
    for i in 0..steps {
        let theta = i as f64 * 2.0 * std::f64::consts::PI / steps as f64;
        let x = (cx + radius * theta.cos()).round() as i64;
        let y = (cy + radius * theta.sin()).round() as i64;
        put(img, x, y, color);
    }
}

pub fn draw_line(img: &mut ArrayViewMut2<Rgb>, from: PixelPoint, to: PixelPoint, color: Rgb) {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f64 / steps as f64;
        let x = (from.x + dx * t).round() as i64;
        let y = (from.y + dy * t).round() as i64;
        put(img, x, y, color);
    }
}

/// Ring around the detected puck, slightly outside its edge.
pub fn draw_puck(img: &mut ArrayViewMut2<Rgb>, blob: &Blob) {
    draw_circle(img, blob.centroid.0, blob.centroid.1, blob.radius + 2.0, PUCK);
}

/// Trajectory through each bounce to the crossing, plus raw and smoothed markers.
pub fn draw_prediction(img: &mut ArrayViewMut2<Rgb>, mapping: &TableMapping, prediction: &Prediction) {
    let crossing = mapping.to_pixel(TablePoint::new(prediction.raw_x, prediction.crossing_y));

    let mut from = mapping.to_pixel(prediction.origin);
    for bounce in &prediction.bounces {
        let to = mapping.to_pixel(*bounce);
        draw_line(img, from, to, BOUNCE_PATH);
        from = to;
    }
    draw_line(img, from, crossing, BOUNCE_PATH);

    draw_circle(img, crossing.x, crossing.y, MARKER_RADIUS, RAW_INTERCEPT);
    let smoothed = mapping.to_pixel(TablePoint::new(prediction.smoothed_x, prediction.crossing_y));
    draw_circle(img, smoothed.x, smoothed.y, MARKER_RADIUS, SMOOTHED_INTERCEPT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn circle_is_clipped_at_edges() {
        let mut img = Array2::from_elem((20, 20), [0u8; 3]);
        draw_circle(&mut img.view_mut(), 0.0, 0.0, 5.0, PUCK);
        assert_eq!(img[(0, 5)], PUCK);
        assert_eq!(img[(5, 0)], PUCK);
        assert_eq!(img[(0, 0)], [0; 3]);
    }

    #[test]
    fn line_covers_both_endpoints() {
        let mut img = Array2::from_elem((10, 10), [0u8; 3]);
        draw_line(
            &mut img.view_mut(),
            PixelPoint::new(1.0, 1.0),
            PixelPoint::new(8.0, 4.0),
            BOUNCE_PATH,
        );
        assert_eq!(img[(1, 1)], BOUNCE_PATH);
        assert_eq!(img[(4, 8)], BOUNCE_PATH);
        let lit = img.iter().filter(|p| **p == BOUNCE_PATH).count();
        assert_eq!(lit, 8);
    }
}

use crate::error::CalibrationError;
use crate::homography::{homography_from_four, project};
use nalgebra::Matrix3;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Pixel location of a fiducial marker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &PixelPoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    fn as_array(&self) -> [f64; 2] {
        [self.x, self.y]
    }
}

/// The four table corners as seen by the camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiducialSet {
    #[serde(rename = "tl")]
    pub top_left: PixelPoint,
    #[serde(rename = "tr")]
    pub top_right: PixelPoint,
    #[serde(rename = "br")]
    pub bottom_right: PixelPoint,
    #[serde(rename = "bl")]
    pub bottom_left: PixelPoint,
}

impl FiducialSet {
    /// Corners in top-left, top-right, bottom-right, bottom-left order.
    pub fn corners(&self) -> [PixelPoint; 4] {
        [self.top_left, self.top_right, self.bottom_right, self.bottom_left]
    }

    /// Longest of the top and bottom edges, and of the left and right edges.
    pub fn edge_lengths(&self) -> (f64, f64) {
        let width = self
            .top_left
            .distance(&self.top_right)
            .max(self.bottom_left.distance(&self.bottom_right));
        let height = self
            .top_left
            .distance(&self.bottom_left)
            .max(self.top_right.distance(&self.bottom_right));
        (width, height)
    }
}

/// Physical playing surface size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableDimensions {
    pub width_mm: f64,
    pub length_mm: f64,
}

impl Default for TableDimensions {
    fn default() -> Self {
        Self {
            width_mm: 774.7,
            length_mm: 1692.3,
        }
    }
}

/// Homography from camera pixels to the rectified top-down table image.
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveTransform {
    pub matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
    pub width: usize,
    pub height: usize,
}

impl PerspectiveTransform {
    /// Maps a camera pixel into the rectified image.
    pub fn apply_point(&self, p: PixelPoint) -> PixelPoint {
        let [x, y] = project(&self.matrix, p.x, p.y);
        PixelPoint::new(x, y)
    }

    /// Maps a rectified pixel back into the camera image.
    pub fn invert_point(&self, p: PixelPoint) -> PixelPoint {
        let [x, y] = project(&self.inverse, p.x, p.y);
        PixelPoint::new(x, y)
    }
}

/// Builds the rectifying transform for the quad described by `fiducials`.
///
/// The output is as wide as the longer horizontal edge and as tall as the
/// longer vertical edge (truncated to whole pixels).
pub fn compute_transform(fiducials: &FiducialSet) -> Result<PerspectiveTransform, CalibrationError> {
    let (edge_w, edge_h) = fiducials.edge_lengths();
    let width = edge_w as usize;
    let height = edge_h as usize;
    if width < 2 || height < 2 {
        return Err(CalibrationError::DegenerateOutput { width, height });
    }

    let w = (width - 1) as f64;
    let h = (height - 1) as f64;
    let src = fiducials.corners().map(|p| p.as_array());
    let dst = [[0.0, 0.0], [w, 0.0], [w, h], [0.0, h]];

    let matrix = homography_from_four(&src, &dst)?;
    let inverse = matrix
        .try_inverse()
        .ok_or_else(|| CalibrationError::Singular("homography is not invertible".into()))?;

    Ok(PerspectiveTransform {
        matrix,
        inverse,
        width,
        height,
    })
}

/// Millimetres per rectified pixel along each image axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactors {
    pub mm_per_pixel_x: f64,
    pub mm_per_pixel_y: f64,
}

impl ScaleFactors {
    /// Scale for a rectified image whose horizontal axis spans the table length.
    pub fn new(transform: &PerspectiveTransform, table: &TableDimensions) -> Self {
        Self::spanning(transform, table.length_mm, table.width_mm)
    }

    /// Scale for arbitrary physical spans of the image's columns and rows.
    pub fn spanning(transform: &PerspectiveTransform, columns_mm: f64, rows_mm: f64) -> Self {
        Self {
            mm_per_pixel_x: columns_mm / (transform.width - 1) as f64,
            mm_per_pixel_y: rows_mm / (transform.height - 1) as f64,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    #[default]
    Nearest,
    Bilinear,
}

/// Warps `frame` into the transform's rectified rectangle.
///
/// Destination pixels whose source falls outside `frame` are black.
pub fn warp(
    frame: ArrayView2<[u8; 3]>,
    transform: &PerspectiveTransform,
    interpolation: Interpolation,
) -> Array2<[u8; 3]> {
    let (src_h, src_w) = frame.dim();
    let inv = &transform.inverse;

    Array2::from_shape_fn((transform.height, transform.width), |(row, col)| {
        let [sx, sy] = project(inv, col as f64, row as f64);
        if !sx.is_finite() || !sy.is_finite() {
            return [0; 3];
        }
        match interpolation {
            Interpolation::Nearest => {
                let x = sx.round();
                let y = sy.round();
                if x < 0.0 || y < 0.0 || x >= src_w as f64 || y >= src_h as f64 {
                    [0; 3]
                } else {
                    frame[(y as usize, x as usize)]
                }
            }
            Interpolation::Bilinear => sample_bilinear(frame, sx, sy),
        }
    })
}

fn sample_bilinear(frame: ArrayView2<[u8; 3]>, x: f64, y: f64) -> [u8; 3] {
    let (h, w) = frame.dim();
    if w == 0 || h == 0 {
        return [0; 3];
    }
    if x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return [0; 3];
    }
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let mut out = [0u8; 3];
    for (c, v) in out.iter_mut().enumerate() {
        let top = frame[(y0, x0)][c] as f64 * (1.0 - fx) + frame[(y0, x1)][c] as f64 * fx;
        let bottom = frame[(y1, x0)][c] as f64 * (1.0 - fx) + frame[(y1, x1)][c] as f64 * fx;
        *v = (top * (1.0 - fy) + bottom * fy).round() as u8;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn skewed() -> FiducialSet {
        FiducialSet {
            top_left: PixelPoint::new(40.0, 30.0),
            top_right: PixelPoint::new(600.0, 45.0),
            bottom_right: PixelPoint::new(590.0, 450.0),
            bottom_left: PixelPoint::new(30.0, 440.0),
        }
    }

    #[test]
    fn output_size_uses_longest_edges() {
        let fs = skewed();
        let t = compute_transform(&fs).unwrap();
        let (w, h) = fs.edge_lengths();
        assert_eq!(t.width, w as usize);
        assert_eq!(t.height, h as usize);
        assert_eq!(t.width, 560);
    }

    #[test]
    fn corners_round_trip_to_destination_rectangle() {
        let fs = skewed();
        let t = compute_transform(&fs).unwrap();
        let w = (t.width - 1) as f64;
        let h = (t.height - 1) as f64;
        let expected = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

        for (corner, (ex, ey)) in fs.corners().iter().zip(expected) {
            let p = t.apply_point(*corner);
            assert_abs_diff_eq!(p.x, ex, epsilon = 1e-3);
            assert_abs_diff_eq!(p.y, ey, epsilon = 1e-3);

            let back = t.invert_point(p);
            assert_abs_diff_eq!(back.x, corner.x, epsilon = 1e-3);
            assert_abs_diff_eq!(back.y, corner.y, epsilon = 1e-3);
        }
    }

    #[test]
    fn collapsed_fiducials_are_rejected() {
        let p = PixelPoint::new(10.0, 10.0);
        let fs = FiducialSet {
            top_left: p,
            top_right: p,
            bottom_right: p,
            bottom_left: p,
        };
        assert!(matches!(
            compute_transform(&fs),
            Err(CalibrationError::DegenerateOutput { .. })
        ));
    }

    #[test]
    fn collinear_fiducials_are_singular() {
        let fs = FiducialSet {
            top_left: PixelPoint::new(0.0, 0.0),
            top_right: PixelPoint::new(100.0, 0.0),
            bottom_right: PixelPoint::new(200.0, 0.0),
            bottom_left: PixelPoint::new(300.0, 0.0),
        };
        assert!(matches!(
            compute_transform(&fs),
            Err(CalibrationError::Singular(_))
        ));
    }

    #[test]
    fn scale_spans_table() {
        let fs = FiducialSet {
            top_left: PixelPoint::new(0.0, 0.0),
            top_right: PixelPoint::new(100.0, 0.0),
            bottom_right: PixelPoint::new(100.0, 50.0),
            bottom_left: PixelPoint::new(0.0, 50.0),
        };
        let t = compute_transform(&fs).unwrap();
        let table = TableDimensions {
            width_mm: 490.0,
            length_mm: 990.0,
        };
        let scale = ScaleFactors::new(&t, &table);
        assert_relative_eq!(scale.mm_per_pixel_x, 10.0, epsilon = 1e-9);
        assert_relative_eq!(scale.mm_per_pixel_y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn warp_samples_inside_the_quad() {
        let mut frame = Array2::from_elem((20, 30), [0u8; 3]);
        for ((y, x), px) in frame.indexed_iter_mut() {
            *px = [x as u8, y as u8, 7];
        }
        let fs = FiducialSet {
            top_left: PixelPoint::new(5.0, 4.0),
            top_right: PixelPoint::new(25.0, 4.0),
            bottom_right: PixelPoint::new(25.0, 14.0),
            bottom_left: PixelPoint::new(5.0, 14.0),
        };
        let t = compute_transform(&fs).unwrap();
        assert_eq!((t.width, t.height), (20, 10));

        for interpolation in [Interpolation::Nearest, Interpolation::Bilinear] {
            let out = warp(frame.view(), &t, interpolation);
            assert_eq!(out.dim(), (10, 20));
            assert_eq!(out[(0, 0)], [5, 4, 7]);
            // Far corner lands on the bottom-right fiducial.
            assert_eq!(out[(9, 19)], [25, 14, 7]);
        }
    }

    #[test]
    fn empty_frame_warps_to_black() {
        let frame = Array2::from_elem((0, 0), [0u8; 3]);
        let t = compute_transform(&skewed()).unwrap();
        for interpolation in [Interpolation::Nearest, Interpolation::Bilinear] {
            let out = warp(frame.view(), &t, interpolation);
            assert_eq!(out.dim(), (t.height, t.width));
            assert!(out.iter().all(|px| *px == [0; 3]));
        }
    }
}

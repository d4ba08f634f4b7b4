//! Four-point homography solved in closed form.

use crate::error::CalibrationError;
use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

/// Points closer than this (pixels) are treated as coincident.
const MIN_SEPARATION: f64 = 1.0;
/// Twice the triangle area below which three points count as collinear.
const MIN_TRIANGLE_AREA: f64 = 1e-3;
const MIN_DETERMINANT: f64 = 1e-12;

/// Project a point through `h`: H * [x, y, 1]^T -> [u, v].
pub fn project(h: &Matrix3<f64>, x: f64, y: f64) -> [f64; 2] {
    let p = h * Vector3::new(x, y, 1.0);
    if p[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [p[0] / p[2], p[1] / p[2]]
}

fn check_well_separated(pts: &[[f64; 2]; 4]) -> Result<(), CalibrationError> {
    for i in 0..4 {
        for j in (i + 1)..4 {
            let d = ((pts[i][0] - pts[j][0]).powi(2) + (pts[i][1] - pts[j][1]).powi(2)).sqrt();
            if !d.is_finite() || d < MIN_SEPARATION {
                return Err(CalibrationError::Singular(format!(
                    "points {i} and {j} are {d:.3} px apart"
                )));
            }
        }
    }
    for (a, b, c) in [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)] {
        let area = (pts[b][0] - pts[a][0]) * (pts[c][1] - pts[a][1])
            - (pts[b][1] - pts[a][1]) * (pts[c][0] - pts[a][0]);
        if area.abs() < MIN_TRIANGLE_AREA {
            return Err(CalibrationError::Singular(format!(
                "points {a}, {b} and {c} are collinear"
            )));
        }
    }
    Ok(())
}

/// Solves H with H[2][2] = 1 such that `dst[i] ~ project(H, src[i])`.
pub fn homography_from_four(
    src: &[[f64; 2]; 4],
    dst: &[[f64; 2]; 4],
) -> Result<Matrix3<f64>, CalibrationError> {
    check_well_separated(src)?;
    check_well_separated(dst)?;

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for i in 0..4 {
        let [x, y] = src[i];
        let [u, v] = dst[i];

        a[(2 * i, 0)] = x;
        a[(2 * i, 1)] = y;
        a[(2 * i, 2)] = 1.0;
        a[(2 * i, 6)] = -x * u;
        a[(2 * i, 7)] = -y * u;
        b[2 * i] = u;

        a[(2 * i + 1, 3)] = x;
        a[(2 * i + 1, 4)] = y;
        a[(2 * i + 1, 5)] = 1.0;
        a[(2 * i + 1, 6)] = -x * v;
        a[(2 * i + 1, 7)] = -y * v;
        b[2 * i + 1] = v;
    }

    let h = a
        .lu()
        .solve(&b)
        .ok_or_else(|| CalibrationError::Singular("correspondence system has no solution".into()))?;

    #[rustfmt::skip]
    let m = Matrix3::new(
        h[0], h[1], h[2],
        h[3], h[4], h[5],
        h[6], h[7], 1.0,
    );

    let det = m.determinant();
    if !det.is_finite() || det.abs() < MIN_DETERMINANT {
        return Err(CalibrationError::Singular(format!("determinant {det:e}")));
    }
    Ok(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn maps_source_corners_onto_destination() {
        let src = [[37.0, 22.0], [601.0, 41.0], [588.0, 455.0], [25.0, 430.0]];
        let dst = [[0.0, 0.0], [569.0, 0.0], [569.0, 412.0], [0.0, 412.0]];
        let h = homography_from_four(&src, &dst).unwrap();

        for (s, d) in src.iter().zip(dst.iter()) {
            let p = project(&h, s[0], s[1]);
            assert_abs_diff_eq!(p[0], d[0], epsilon = 1e-3);
            assert_abs_diff_eq!(p[1], d[1], epsilon = 1e-3);
        }
    }

    #[test]
    fn identity_for_identical_quads() {
        let quad = [[0.0, 0.0], [10.0, 0.0], [10.0, 5.0], [0.0, 5.0]];
        let h = homography_from_four(&quad, &quad).unwrap();
        assert_abs_diff_eq!(h, Matrix3::identity(), epsilon = 1e-9);
    }

    #[test]
    fn coincident_points_are_singular() {
        let src = [[5.0, 5.0], [5.0, 5.0], [100.0, 100.0], [0.0, 100.0]];
        let dst = [[0.0, 0.0], [99.0, 0.0], [99.0, 99.0], [0.0, 99.0]];
        assert!(matches!(
            homography_from_four(&src, &dst),
            Err(CalibrationError::Singular(_))
        ));
    }

    #[test]
    fn collinear_points_are_singular() {
        let src = [[0.0, 0.0], [50.0, 0.0], [100.0, 0.0], [0.0, 80.0]];
        let dst = [[0.0, 0.0], [99.0, 0.0], [99.0, 99.0], [0.0, 99.0]];
        assert!(homography_from_four(&src, &dst).is_err());
    }
}

//! Per-frame puck tracking: rectify, segment, extract, convert to millimetres.

use crate::settings::{DetectionSettings, TableSettings};
use ndarray::ArrayView2;
use puck_calibration::{
    compute_transform, warp, CalibrationError, FiducialSet, PerspectiveTransform, PixelPoint,
    ScaleFactors, TableDimensions,
};
use puck_detection::{extract, segment, Blob, HsvRange, RgbImage};
use puck_prediction::{TablePoint, Velocity};
use std::time::Instant;

/// Converts between rectified-image pixels and table millimetres.
///
/// With `swap_axes` the image columns run along the table length (table y)
/// and the rows across it (table x).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TableMapping {
    scale: ScaleFactors,
    swap_axes: bool,
}

impl TableMapping {
    pub fn new(transform: &PerspectiveTransform, table: &TableDimensions, swap_axes: bool) -> Self {
        let scale = if swap_axes {
            ScaleFactors::new(transform, table)
        } else {
            ScaleFactors::spanning(transform, table.width_mm, table.length_mm)
        };
        Self { scale, swap_axes }
    }

    pub fn scale(&self) -> ScaleFactors {
        self.scale
    }

    pub fn to_table(&self, p: PixelPoint) -> TablePoint {
        let col_mm = p.x * self.scale.mm_per_pixel_x;
        let row_mm = p.y * self.scale.mm_per_pixel_y;
        if self.swap_axes {
            TablePoint::new(row_mm, col_mm)
        } else {
            TablePoint::new(col_mm, row_mm)
        }
    }

    pub fn to_pixel(&self, p: TablePoint) -> PixelPoint {
        let (col_mm, row_mm) = if self.swap_axes { (p.y, p.x) } else { (p.x, p.y) };
        PixelPoint::new(
            col_mm / self.scale.mm_per_pixel_x,
            row_mm / self.scale.mm_per_pixel_y,
        )
    }
}

/// Everything derived from one set of fiducials.
#[derive(Clone, Debug)]
pub struct Calibration {
    pub fiducials: FiducialSet,
    pub transform: PerspectiveTransform,
    pub mapping: TableMapping,
}

impl Calibration {
    pub fn new(fiducials: FiducialSet, table: &TableSettings) -> Result<Self, CalibrationError> {
        let transform = compute_transform(&fiducials)?;
        let mapping = TableMapping::new(&transform, &table.dimensions, table.swap_axes);
        Ok(Self {
            fiducials,
            transform,
            mapping,
        })
    }
}

/// Settings the tracking pipeline needs, loaded once per Tracking entry.
#[derive(Clone, Debug)]
pub struct TrackerContext {
    pub puck_range: HsvRange,
    pub detection: DetectionSettings,
    pub calibration: Calibration,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PuckObservation {
    /// `None` when no blob passed the size bounds.
    pub position_mm: Option<TablePoint>,
    pub timestamp: Instant,
}

/// Finite-difference velocity over consecutive observations.
#[derive(Clone, Debug, Default)]
pub struct VelocityEstimator {
    last: Option<(TablePoint, Instant)>,
}

impl VelocityEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero unless both this and the previous observation found the puck.
    pub fn update(&mut self, observation: &PuckObservation) -> Velocity {
        let velocity = match (self.last, observation.position_mm) {
            (Some((prev, t0)), Some(pos)) => {
                let dt = observation.timestamp.saturating_duration_since(t0).as_secs_f64();
                if dt > 0.0 {
                    Velocity::new((pos.x - prev.x) / dt, (pos.y - prev.y) / dt)
                } else {
                    Velocity::ZERO
                }
            }
            _ => Velocity::ZERO,
        };
        self.last = observation.position_mm.map(|p| (p, observation.timestamp));
        velocity
    }
}

pub struct TrackedFrame {
    pub observation: PuckObservation,
    pub velocity: Velocity,
    pub rectified: RgbImage,
    /// The detected blob in rectified pixels.
    pub blob: Option<Blob>,
}

pub struct PuckTracker {
    context: TrackerContext,
    velocity: VelocityEstimator,
}

impl PuckTracker {
    pub fn new(context: TrackerContext) -> Self {
        Self {
            context,
            velocity: VelocityEstimator::new(),
        }
    }

    pub fn context(&self) -> &TrackerContext {
        &self.context
    }

    pub fn set_puck_range(&mut self, range: HsvRange) {
        self.context.puck_range = range;
    }

    pub fn process(&mut self, frame: ArrayView2<[u8; 3]>, timestamp: Instant) -> TrackedFrame {
        let ctx = &self.context;
        let rectified = warp(
            frame,
            &ctx.calibration.transform,
            ctx.detection.tracking_interpolation,
        );
        let mask = segment(rectified.view(), &ctx.puck_range, ctx.detection.median_kernel);
        let blob = extract(mask.view(), &ctx.detection.puck, ctx.detection.selection);

        let position_mm = blob.map(|b| {
            ctx.calibration
                .mapping
                .to_table(PixelPoint::new(b.centroid.0, b.centroid.1))
        });
        let observation = PuckObservation {
            position_mm,
            timestamp,
        };
        let velocity = self.velocity.update(&observation);
        tracing::debug!(?position_mm, vx = velocity.x, vy = velocity.y, "frame tracked");

        TrackedFrame {
            observation,
            velocity,
            rectified,
            blob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array2;
    use std::time::Duration;

    fn rectangle_fiducials(w: f64, h: f64) -> FiducialSet {
        FiducialSet {
            top_left: PixelPoint::new(0.0, 0.0),
            top_right: PixelPoint::new(w - 1.0, 0.0),
            bottom_right: PixelPoint::new(w - 1.0, h - 1.0),
            bottom_left: PixelPoint::new(0.0, h - 1.0),
        }
    }

    fn context(frame_w: f64, frame_h: f64) -> TrackerContext {
        let calibration =
            Calibration::new(rectangle_fiducials(frame_w, frame_h), &TableSettings::default()).unwrap();
        TrackerContext {
            puck_range: HsvRange::new([40, 80, 80], [80, 255, 255]),
            detection: DetectionSettings::default(),
            calibration,
        }
    }

    fn frame_with_puck(w: usize, h: usize, cx: f64, cy: f64, r: f64) -> RgbImage {
        Array2::from_shape_fn((h, w), |(y, x)| {
            let dx = x as f64 - cx;
            let dy = y as f64 - cy;
            if dx * dx + dy * dy <= r * r {
                [0, 255, 0]
            } else {
                [30, 30, 30]
            }
        })
    }

    #[test]
    fn velocity_sign_and_magnitude() {
        let t0 = Instant::now();
        let mut est = VelocityEstimator::new();
        let v0 = est.update(&PuckObservation {
            position_mm: Some(TablePoint::new(100.0, 100.0)),
            timestamp: t0,
        });
        assert_eq!(v0, Velocity::ZERO);

        let v = est.update(&PuckObservation {
            position_mm: Some(TablePoint::new(100.0, 50.0)),
            timestamp: t0 + Duration::from_millis(100),
        });
        assert_abs_diff_eq!(v.x, 0.0);
        assert_abs_diff_eq!(v.y, -500.0, epsilon = 1e-6);
    }

    #[test]
    fn velocity_holds_zero_across_dropouts() {
        let t0 = Instant::now();
        let mut est = VelocityEstimator::new();
        est.update(&PuckObservation {
            position_mm: Some(TablePoint::new(100.0, 100.0)),
            timestamp: t0,
        });
        let lost = est.update(&PuckObservation {
            position_mm: None,
            timestamp: t0 + Duration::from_millis(5),
        });
        assert_eq!(lost, Velocity::ZERO);
        let regained = est.update(&PuckObservation {
            position_mm: Some(TablePoint::new(0.0, 0.0)),
            timestamp: t0 + Duration::from_millis(10),
        });
        assert_eq!(regained, Velocity::ZERO);
    }

    #[test]
    fn swapped_mapping_round_trips() {
        let cal = Calibration::new(rectangle_fiducials(200.0, 120.0), &TableSettings::default()).unwrap();
        let mapping = cal.mapping;
        let last_col = (cal.transform.width - 1) as f64;
        let p = mapping.to_table(PixelPoint::new(last_col, 0.0));
        assert_abs_diff_eq!(p.x, 0.0);
        assert_abs_diff_eq!(p.y, 1692.3, epsilon = 1e-9);

        let back = mapping.to_pixel(TablePoint::new(300.0, 900.0));
        let again = mapping.to_table(back);
        assert_abs_diff_eq!(again.x, 300.0, epsilon = 1e-9);
        assert_abs_diff_eq!(again.y, 900.0, epsilon = 1e-9);
    }

    #[test]
    fn unswapped_mapping_uses_columns_for_x() {
        let table = TableSettings {
            swap_axes: false,
            ..TableSettings::default()
        };
        let cal = Calibration::new(rectangle_fiducials(120.0, 200.0), &table).unwrap();
        let far_corner = cal.mapping.to_table(PixelPoint::new(
            (cal.transform.width - 1) as f64,
            (cal.transform.height - 1) as f64,
        ));
        assert_abs_diff_eq!(far_corner.x, 774.7, epsilon = 1e-9);
        assert_abs_diff_eq!(far_corner.y, 1692.3, epsilon = 1e-9);
    }

    #[test]
    fn collinear_fiducials_are_rejected() {
        let fiducials = FiducialSet {
            top_left: PixelPoint::new(0.0, 0.0),
            top_right: PixelPoint::new(100.0, 0.0),
            bottom_right: PixelPoint::new(200.0, 0.0),
            bottom_left: PixelPoint::new(300.0, 0.0),
        };
        assert!(Calibration::new(fiducials, &TableSettings::default()).is_err());
    }

    #[test]
    fn tracks_synthetic_puck() {
        let mut tracker = PuckTracker::new(context(200.0, 120.0));
        let frame = frame_with_puck(200, 120, 100.0, 60.0, 12.0);

        let out = tracker.process(frame.view(), Instant::now());
        let pos = out.observation.position_mm.expect("puck should be found");
        let blob = out.blob.unwrap();

        let scale = tracker.context().calibration.mapping.scale();
        assert_abs_diff_eq!(blob.centroid.0, 100.0 * 198.0 / 199.0, epsilon = 1.0);
        assert_abs_diff_eq!(pos.y, blob.centroid.0 * scale.mm_per_pixel_x, epsilon = 1e-9);
        assert_abs_diff_eq!(pos.x, blob.centroid.1 * scale.mm_per_pixel_y, epsilon = 1e-9);
        assert_abs_diff_eq!(pos.x, 390.6, epsilon = 8.0);
        assert_abs_diff_eq!(pos.y, 850.4, epsilon = 10.0);
        assert_eq!(out.velocity, Velocity::ZERO);
    }

    #[test]
    fn missing_puck_is_none() {
        let mut tracker = PuckTracker::new(context(200.0, 120.0));
        let frame = Array2::from_elem((120, 200), [30u8, 30, 30]);
        let out = tracker.process(frame.view(), Instant::now());
        assert!(out.observation.position_mm.is_none());
        assert!(out.blob.is_none());
    }
}

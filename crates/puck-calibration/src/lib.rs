//! Table calibration: fiducial search, perspective rectification and
//! pixel-to-millimetre scaling.

pub mod error;
pub mod fiducials;
pub mod homography;
pub mod perspective;

pub use error::CalibrationError;
pub use fiducials::{FiducialCalibrator, PartialFiducials, Quadrant};
pub use perspective::{
    compute_transform, warp, FiducialSet, Interpolation, PerspectiveTransform, PixelPoint,
    ScaleFactors, TableDimensions,
};

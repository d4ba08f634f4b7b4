use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("fiducial corners are degenerate: {0}")]
    Singular(String),

    #[error("only {found} of 4 fiducials located")]
    TooFewFiducials { found: usize },

    #[error("rectified output would be {width}x{height} pixels")]
    DegenerateOutput { width: usize, height: usize },
}

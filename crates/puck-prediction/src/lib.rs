//! Puck interception prediction and paddle command policy.
//!
//! Table space is in millimetres: x runs across the table (0 at the left
//! wall), y runs along it with the robot's goal at y = 0.

pub mod history;
pub mod intercept;
pub mod paddle;

pub use history::PredictionHistory;
pub use intercept::{
    reflect_to_line, InterceptPredictor, Prediction, PredictionError, PredictionOutcome,
    PredictorConfig,
};
pub use paddle::{GameMode, PaddleCommand, PaddleCommander, PaddleConfig, PaddleState, PaddleStep};

use serde::{Deserialize, Serialize};

/// A position on the table in millimetres.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TablePoint {
    pub x: f64,
    pub y: f64,
}

impl TablePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &TablePoint) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Puck velocity in millimetres per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub x: f64,
    pub y: f64,
}

impl Velocity {
    pub const ZERO: Velocity = Velocity { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

use crate::history::PredictionHistory;
use crate::{TablePoint, Velocity};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stand-in slope for a puck moving straight along y.
const VERTICAL_SLOPE: f64 = 999_999.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
    #[error("bounce reflection did not settle after {iterations} iterations")]
    Divergence { iterations: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub puck_radius_mm: f64,
    pub paddle_radius_mm: f64,
    /// The puck approaches while its y velocity is below this value.
    pub min_velocity_mmps_y: f64,
    pub window: usize,
    pub max_bounces: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            puck_radius_mm: 31.75,
            paddle_radius_mm: 48.0,
            min_velocity_mmps_y: -400.0,
            window: 3,
            max_bounces: 20,
        }
    }
}

/// Where a straight-line trajectory meets the target line after wall bounces.
#[derive(Clone, Debug, PartialEq)]
pub struct Crossing {
    pub x: f64,
    /// Wall contact points in the order they are hit.
    pub bounces: Vec<TablePoint>,
}

/// Follows `y = slope * x + intercept` to `line_y`, mirroring it off the
/// walls at `x = lo` and `x = hi` until the crossing lies between them.
pub fn reflect_to_line(
    mut slope: f64,
    mut intercept: f64,
    line_y: f64,
    lo: f64,
    hi: f64,
    max_bounces: usize,
) -> Result<Crossing, PredictionError> {
    let mut x = (line_y - intercept) / slope;
    let mut bounces = Vec::new();

    while !(lo..=hi).contains(&x) {
        if bounces.len() >= max_bounces || !x.is_finite() {
            return Err(PredictionError::Divergence {
                iterations: bounces.len(),
            });
        }
        let wall = if x < lo { lo } else { hi };
        let bounce_y = slope * wall + intercept;
        slope = -slope;
        intercept = bounce_y - slope * wall;
        x = (line_y - intercept) / slope;
        bounces.push(TablePoint::new(wall, bounce_y));
    }

    Ok(Crossing { x, bounces })
}

/// A fresh intercept estimate for an approaching puck.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    /// Puck position the trajectory starts from.
    pub origin: TablePoint,
    /// Unsmoothed crossing of the paddle-offset target line.
    pub raw_x: f64,
    /// Mean over the prediction history.
    pub smoothed_x: f64,
    /// The target line the paddle should sit on.
    pub target_y: f64,
    /// The line actually intersected (target offset by the paddle radius).
    pub crossing_y: f64,
    pub bounces: Vec<TablePoint>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PredictionOutcome {
    Predicted(Prediction),
    /// No new estimate; carries the last smoothed prediction, if any.
    Holding(Option<f64>),
}

impl PredictionOutcome {
    pub fn smoothed_x(&self) -> Option<f64> {
        match self {
            PredictionOutcome::Predicted(p) => Some(p.smoothed_x),
            PredictionOutcome::Holding(x) => *x,
        }
    }
}

/// Linear-extrapolation predictor with bounce handling and moving-average smoothing.
///
/// Owns the previous puck position used for the trajectory slope, so
/// observations must be fed in frame order. The wall positions come from the
/// table width the predictor is built with.
#[derive(Clone, Debug)]
pub struct InterceptPredictor {
    config: PredictorConfig,
    table_width_mm: f64,
    history: PredictionHistory,
    last_position: Option<TablePoint>,
    approaching: bool,
    last_smoothed: Option<f64>,
}

impl InterceptPredictor {
    pub fn new(config: PredictorConfig, table_width_mm: f64) -> Self {
        let history = PredictionHistory::new(config.window);
        Self {
            config,
            table_width_mm,
            history,
            last_position: None,
            approaching: false,
            last_smoothed: None,
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn history(&self) -> &PredictionHistory {
        &self.history
    }

    pub fn table_width_mm(&self) -> f64 {
        self.table_width_mm
    }

    pub fn is_approaching(&self) -> bool {
        self.approaching
    }

    /// Whether `velocity` counts as moving toward the robot's goal.
    pub fn approaches(&self, velocity: Velocity) -> bool {
        velocity.y < self.config.min_velocity_mmps_y
    }

    /// Records a position without predicting, keeping the trajectory
    /// continuous while no intercept is wanted.
    pub fn observe(&mut self, position: Option<TablePoint>) {
        self.last_position = position;
    }

    /// Drops the smoothing window; the trajectory itself is kept.
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.last_smoothed = None;
    }

    /// Feeds one observation; `position` is `None` when the puck was not found.
    ///
    /// On divergence the previous smoothed prediction is kept and the error
    /// is returned for reporting.
    pub fn predict(
        &mut self,
        position: Option<TablePoint>,
        velocity: Velocity,
        target_line_mm_y: f64,
    ) -> Result<PredictionOutcome, PredictionError> {
        let Some(position) = position else {
            self.last_position = None;
            return Ok(PredictionOutcome::Holding(self.last_smoothed));
        };
        let previous = self.last_position.replace(position);

        if !self.approaches(velocity) {
            if self.approaching {
                tracing::debug!("puck stopped approaching, clearing prediction history");
                self.history.clear();
            }
            self.approaching = false;
            return Ok(PredictionOutcome::Holding(self.last_smoothed));
        }
        self.approaching = true;

        let Some(previous) = previous else {
            return Ok(PredictionOutcome::Holding(self.last_smoothed));
        };
        if previous == position {
            return Ok(PredictionOutcome::Holding(self.last_smoothed));
        }

        let dx = position.x - previous.x;
        let dy = position.y - previous.y;
        if dy == 0.0 {
            // Parallel to the target line for this step.
            return Ok(PredictionOutcome::Holding(self.last_smoothed));
        }
        let slope = if dx == 0.0 { VERTICAL_SLOPE } else { dy / dx };
        let intercept = position.y - slope * position.x;

        let crossing_y = target_line_mm_y + self.config.paddle_radius_mm;
        let lo = self.config.puck_radius_mm;
        let hi = self.table_width_mm - self.config.puck_radius_mm;
        let crossing = reflect_to_line(slope, intercept, crossing_y, lo, hi, self.config.max_bounces)?;

        self.history.push(crossing.x);
        let smoothed_x = self.history.mean().unwrap_or(crossing.x);
        self.last_smoothed = Some(smoothed_x);

        tracing::trace!(
            raw_x = crossing.x,
            smoothed_x,
            bounces = crossing.bounces.len(),
            "intercept predicted"
        );

        Ok(PredictionOutcome::Predicted(Prediction {
            origin: position,
            raw_x: crossing.x,
            smoothed_x,
            target_y: target_line_mm_y,
            crossing_y,
            bounces: crossing.bounces,
        }))
    }
}

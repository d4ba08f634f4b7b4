use crate::intercept::{InterceptPredictor, Prediction, PredictionError, PredictionOutcome};
use crate::{TablePoint, Velocity};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    Offense,
    #[default]
    Defense,
}

/// What the paddle is doing about the puck.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaddleState {
    /// Parked at the goal centre.
    #[default]
    Home,
    /// Intercepting on the attack line (offense only).
    Attack,
    /// Intercepting on the defense line.
    Defend,
    /// Driving to a slow puck in our half.
    ReturnPuck,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddleConfig {
    pub goal_left_post_mm_x: f64,
    pub goal_right_post_mm_x: f64,
    pub goal_center_mm_x: f64,
    pub defense_line_mm_y: f64,
    pub attack_line_mm_y: f64,
    /// A puck with |vy| below this counts as stopped.
    pub stopped_mmps_y: f64,
    /// Commands closer than this to the last one sent are dropped.
    pub min_move_mm: f64,
}

impl Default for PaddleConfig {
    fn default() -> Self {
        Self {
            goal_left_post_mm_x: 257.35,
            goal_right_post_mm_x: 517.35,
            goal_center_mm_x: 387.35,
            defense_line_mm_y: 0.0,
            attack_line_mm_y: 400.0,
            stopped_mmps_y: 400.0,
            min_move_mm: 5.0,
        }
    }
}

/// Paddle position set-point handed to the paddle controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaddleCommand {
    pub x_mm: f64,
    pub y_mm: f64,
}

impl PaddleCommand {
    fn distance(&self, other: &PaddleCommand) -> f64 {
        ((self.x_mm - other.x_mm).powi(2) + (self.y_mm - other.y_mm).powi(2)).sqrt()
    }
}

/// One frame's decision.
#[derive(Clone, Debug, PartialEq)]
pub struct PaddleStep {
    /// State the command was produced in.
    pub state: PaddleState,
    pub command: PaddleCommand,
    /// Fresh intercept estimate, when one was made this frame.
    pub prediction: Option<Prediction>,
    pub error: Option<PredictionError>,
}

/// Per-frame paddle state machine plus the outbound movement filter.
///
/// Each frame acts in the current state first and then evaluates the
/// transitions, so a new state takes effect on the following frame. Every
/// state change clears the predictor's smoothing window.
#[derive(Clone, Debug)]
pub struct PaddleCommander {
    config: PaddleConfig,
    mode: GameMode,
    table_length_mm: f64,
    state: PaddleState,
    current: PaddleCommand,
    last_sent: PaddleCommand,
}

impl PaddleCommander {
    pub fn new(config: PaddleConfig, mode: GameMode, table_length_mm: f64) -> Self {
        let home = PaddleCommand {
            x_mm: config.goal_center_mm_x,
            y_mm: config.defense_line_mm_y,
        };
        Self {
            config,
            mode,
            table_length_mm,
            state: PaddleState::Home,
            current: home,
            last_sent: home,
        }
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Switching modes parks the paddle until the new mode picks a state.
    pub fn set_mode(&mut self, mode: GameMode) {
        if mode != self.mode {
            self.mode = mode;
            self.state = PaddleState::Home;
        }
    }

    pub fn state(&self) -> PaddleState {
        self.state
    }

    /// The line intercepts are planned on in the current state.
    pub fn target_line(&self) -> f64 {
        match self.state {
            PaddleState::Attack => self.config.attack_line_mm_y,
            _ => self.config.defense_line_mm_y,
        }
    }

    /// Goal centre on the defense line.
    pub fn home(&self) -> PaddleCommand {
        PaddleCommand {
            x_mm: self.config.goal_center_mm_x,
            y_mm: self.config.defense_line_mm_y,
        }
    }

    pub fn last_sent(&self) -> PaddleCommand {
        self.last_sent
    }

    /// Runs one frame: the current state's action, then its transitions.
    ///
    /// `position` is `None` when the puck was not found, which always sends
    /// the state machine home.
    pub fn step(
        &mut self,
        predictor: &mut InterceptPredictor,
        position: Option<TablePoint>,
        velocity: Velocity,
    ) -> PaddleStep {
        let state = self.state;
        let mut prediction = None;
        let mut error = None;

        let command = match state {
            PaddleState::Home => {
                predictor.observe(position);
                self.home()
            }
            PaddleState::ReturnPuck => {
                predictor.observe(position);
                position.map_or(self.current, |p| PaddleCommand {
                    x_mm: p.x,
                    y_mm: p.y,
                })
            }
            PaddleState::Attack | PaddleState::Defend => {
                let line = self.target_line();
                match predictor.predict(position, velocity, line) {
                    Ok(PredictionOutcome::Predicted(p)) => {
                        let command = self.on_line(p.smoothed_x, line);
                        prediction = Some(p);
                        command
                    }
                    Ok(PredictionOutcome::Holding(Some(x))) => self.on_line(x, line),
                    Ok(PredictionOutcome::Holding(None)) => self.current,
                    Err(e) => {
                        error = Some(e);
                        self.current
                    }
                }
            }
        };
        self.current = command;

        let next = match position {
            Some(p) => self.next_state(predictor, p, velocity),
            None => PaddleState::Home,
        };
        if next != state {
            tracing::debug!(from = ?state, to = ?next, "paddle state change");
            predictor.clear_history();
            self.state = next;
        }

        PaddleStep {
            state,
            command,
            prediction,
            error,
        }
    }

    fn on_line(&self, x: f64, line: f64) -> PaddleCommand {
        let x_mm = match self.state {
            PaddleState::Defend => {
                x.clamp(self.config.goal_left_post_mm_x, self.config.goal_right_post_mm_x)
            }
            _ => x,
        };
        PaddleCommand { x_mm, y_mm: line }
    }

    fn next_state(&self, predictor: &InterceptPredictor, p: TablePoint, v: Velocity) -> PaddleState {
        let half = self.table_length_mm / 2.0;
        let in_our_half = p.y < half;
        let in_their_half = p.y > half;
        let approaching = predictor.approaches(v);
        let stopped = v.y.abs() < self.config.stopped_mmps_y;
        let past_attack_line = p.y < self.config.attack_line_mm_y;

        // Later rules win, so the most urgent one is checked last.
        let mut next = self.state;
        match (self.mode, self.state) {
            (_, PaddleState::ReturnPuck) => {
                if in_their_half {
                    next = PaddleState::Home;
                }
            }
            (GameMode::Defense, PaddleState::Home) => {
                if stopped && in_our_half {
                    next = PaddleState::ReturnPuck;
                }
                if approaching {
                    next = PaddleState::Defend;
                }
            }
            (GameMode::Offense, PaddleState::Home) => {
                if approaching && in_their_half {
                    next = PaddleState::Attack;
                }
                if stopped && in_our_half {
                    next = PaddleState::ReturnPuck;
                }
                if approaching && past_attack_line {
                    next = PaddleState::Defend;
                }
            }
            (GameMode::Offense, PaddleState::Attack) => {
                if (!approaching && in_their_half) || v.y > 0.0 {
                    next = PaddleState::Home;
                }
                if approaching && past_attack_line {
                    next = PaddleState::Defend;
                }
                if stopped && in_our_half {
                    next = PaddleState::ReturnPuck;
                }
            }
            (GameMode::Defense, PaddleState::Attack) => next = PaddleState::Home,
            (mode, PaddleState::Defend) => {
                if !approaching && in_their_half {
                    next = PaddleState::Home;
                }
                // Offense keeps defending a receding puck until it leaves our half.
                if mode == GameMode::Defense && v.y > self.config.stopped_mmps_y && in_our_half {
                    next = PaddleState::Home;
                }
                if stopped && in_our_half {
                    next = PaddleState::ReturnPuck;
                }
            }
        }
        next
    }

    /// Passes `command` through the minimum-movement filter.
    ///
    /// Returns the command to transmit, or `None` when it is too close to
    /// the last one sent.
    pub fn filter(&mut self, command: PaddleCommand) -> Option<PaddleCommand> {
        let moved = command.distance(&self.last_sent);
        if moved < self.config.min_move_mm {
            tracing::trace!(moved, "paddle command filtered");
            return None;
        }
        self.last_sent = command;
        Some(command)
    }
}

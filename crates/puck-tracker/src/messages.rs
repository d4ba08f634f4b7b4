//! Typed messages exchanged with the supervisor and the dashboard.

use puck_detection::HsvRange;
use puck_prediction::{GameMode, PaddleCommand, TablePoint, Velocity};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerState {
    Idle,
    Calibrate,
    Calibrated,
    NotCalibrated,
    Tracking,
    FindFiducials,
    FindPuck,
    Error,
    Quit,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackerState::Idle => "idle",
            TrackerState::Calibrate => "calibrate",
            TrackerState::Calibrated => "calibrated",
            TrackerState::NotCalibrated => "not_calibrated",
            TrackerState::Tracking => "tracking",
            TrackerState::FindFiducials => "find_fiducials",
            TrackerState::FindPuck => "find_puck",
            TrackerState::Error => "error",
            TrackerState::Quit => "quit",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    #[default]
    None,
    Camera,
    CalibrationFailed,
    CalibrationSingular,
    PredictionDivergence,
    Settings,
}

/// Supervisor state requests.
///
/// Deserializes through [`FromStr`], so unknown names become `Idle`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Command {
    Idle,
    Calibrate,
    Track,
    FindFiducials,
    FindPuck,
    ClearError,
    Quit,
}

impl FromStr for Command {
    type Err = Infallible;

    /// Unrecognised commands fall back to `Idle`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "calibrate" => Command::Calibrate,
            "track" => Command::Track,
            "find_fiducials" => Command::FindFiducials,
            "find_puck" => Command::FindPuck,
            "clear_error" => Command::ClearError,
            "quit" => Command::Quit,
            _ => Command::Idle,
        })
    }
}

impl From<String> for Command {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(command) => command,
            Err(never) => match never {},
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorTarget {
    Puck,
    Fiducial,
}

/// Everything the tracker accepts on its inbound channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMessage {
    Command(Command),
    SetColorRange { target: ColorTarget, range: HsvRange },
    SetGameMode(GameMode),
}

impl From<Command> for ControlMessage {
    fn from(command: Command) -> Self {
        ControlMessage::Command(command)
    }
}

/// Outbound status, published once per loop iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub state: TrackerState,
    pub error: ErrorCode,
    /// `None` when the puck was not found in the last frame.
    pub position_mm: Option<TablePoint>,
    pub velocity_mmps: Velocity,
    pub paddle: Option<PaddleCommand>,
}

impl Status {
    pub fn idle() -> Self {
        Self {
            state: TrackerState::Idle,
            error: ErrorCode::None,
            position_mm: None,
            velocity_mmps: Velocity::ZERO,
            paddle: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!("track".parse::<Command>().unwrap(), Command::Track);
        assert_eq!(" Calibrate\n".parse::<Command>().unwrap(), Command::Calibrate);
        assert_eq!("find_puck".parse::<Command>().unwrap(), Command::FindPuck);
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Quit);
    }

    #[test]
    fn unknown_command_means_idle() {
        assert_eq!("dance".parse::<Command>().unwrap(), Command::Idle);
        assert_eq!("".parse::<Command>().unwrap(), Command::Idle);
    }

    #[test]
    fn json_commands_share_the_text_fallback() {
        assert_eq!(serde_json::from_str::<Command>("\"track\"").unwrap(), Command::Track);
        assert_eq!(serde_json::from_str::<Command>("\"reboot\"").unwrap(), Command::Idle);
        assert_eq!(serde_json::to_string(&Command::FindPuck).unwrap(), "\"find_puck\"");
        let msg: ControlMessage = serde_json::from_str(r#"{"command":"dance"}"#).unwrap();
        assert_eq!(msg, ControlMessage::Command(Command::Idle));
    }

    #[test]
    fn control_messages_round_trip_through_json() {
        let msg = ControlMessage::SetColorRange {
            target: ColorTarget::Puck,
            range: HsvRange::new([1, 2, 3], [4, 5, 6]),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(serde_json::from_str::<ControlMessage>(&json).unwrap(), msg);
    }

    #[test]
    fn state_names_match_wire_vocabulary() {
        assert_eq!(TrackerState::NotCalibrated.to_string(), "not_calibrated");
        assert_eq!(
            serde_json::to_string(&TrackerState::FindFiducials).unwrap(),
            "\"find_fiducials\""
        );
    }
}

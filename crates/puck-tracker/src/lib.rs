//! Air hockey puck tracker: camera loop, state machine and dashboard.

pub mod camera;
pub mod clock;
pub mod config;
pub mod machine;
pub mod messages;
pub mod overlay;
pub mod paddle_link;
pub mod settings;
pub mod streaming;
pub mod tracker;

pub use camera::{CameraError, CameraSource, MockCamera};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, ConfigError};
pub use machine::{MachineChannels, TrackerMachine};
pub use messages::{ColorTarget, Command, ControlMessage, ErrorCode, Status, TrackerState};
pub use paddle_link::{ChannelPaddleLink, PaddleLink};
pub use settings::{SettingsError, SettingsStore, TrackerSettings};
pub use tracker::{Calibration, PuckObservation, PuckTracker, TableMapping, TrackerContext};

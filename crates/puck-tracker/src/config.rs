use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Process-level settings; table and colour settings live in the shared JSON document.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub system: SystemConfig,
    pub camera: CameraConfig,
    pub dashboard: DashboardConfig,
    pub settings: SettingsConfig,
    pub machine: MachineConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Resolution and frame rate requested from the camera on state entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CaptureMode {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl CaptureMode {
    pub const TRACKING: CaptureMode = CaptureMode {
        width: 320,
        height: 240,
        fps: 224,
    };
    pub const CALIBRATION: CaptureMode = CaptureMode {
        width: 640,
        height: 480,
        fps: 30,
    };
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CameraConfig {
    pub device_id: u32,
    pub tracking: CaptureMode,
    pub calibration: CaptureMode,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_id: 0,
            tracking: CaptureMode::TRACKING,
            calibration: CaptureMode::CALIBRATION,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5800,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub path: PathBuf,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("config/settings.json"),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MachineConfig {
    pub max_calibration_attempts: u32,
    /// First wait after a failed camera read; 0 retries immediately.
    pub camera_retry_initial_ms: u64,
    pub camera_retry_max_ms: u64,
    /// Sleep between iterations in states that do not read the camera.
    pub idle_tick_ms: u64,
    pub command_queue: usize,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            max_calibration_attempts: 5,
            camera_retry_initial_ms: 0,
            camera_retry_max_ms: 500,
            idle_tick_ms: 10,
            command_queue: 16,
        }
    }
}

impl MachineConfig {
    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }
}

impl Config {
    // Load config from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    // Load default config
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::from_file("config/default.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [camera]
            device_id = 2

            [machine]
            max_calibration_attempts = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.device_id, 2);
        assert_eq!(config.camera.tracking, CaptureMode::TRACKING);
        assert_eq!(config.machine.max_calibration_attempts, 8);
        assert_eq!(config.machine.camera_retry_initial_ms, 0);
        assert_eq!(config.dashboard.port, 5800);
        assert_eq!(config.system.log_level, "info");
    }

    #[test]
    fn capture_modes_are_overridable() {
        let config: Config = toml::from_str(
            r#"
            [camera.tracking]
            width = 640
            height = 360
            fps = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.tracking.fps, 120);
        assert_eq!(config.camera.calibration, CaptureMode::CALIBRATION);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

use puck_prediction::GameMode;
use puck_tracker::config::CaptureMode;
use puck_tracker::{Config, SettingsStore};
use std::path::PathBuf;

fn workspace_file(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config").join(name)
}

#[test]
fn default_toml_matches_built_in_defaults() {
    let config = Config::from_file(workspace_file("default.toml")).unwrap();
    assert_eq!(config.camera.tracking, CaptureMode::TRACKING);
    assert_eq!(config.camera.calibration, CaptureMode::CALIBRATION);
    assert_eq!(config.machine.max_calibration_attempts, 5);
    assert_eq!(config.dashboard.port, 5800);
}

#[test]
fn sample_settings_parse() {
    let settings = SettingsStore::new(workspace_file("settings.json")).load().unwrap();
    assert_eq!(settings.game_mode, GameMode::Defense);
    assert_eq!(settings.prediction.window, 3);
    assert_eq!(settings.paddle.attack_line_mm_y, 400.0);
    assert_eq!(settings.table.dimensions.width_mm, 774.7);
    assert_eq!(settings.detection.median_kernel, 5);
    assert!(settings.fiducial.coordinates.is_some());
}

//! The shared multi-subsystem settings document (JSON).
//!
//! The tracker reads the `puck_tracker` subtree and only ever writes back
//! `puck_tracker.fiducial.coordinates`, leaving every other key untouched.

use puck_calibration::{FiducialSet, Interpolation, TableDimensions};
use puck_detection::{BlobBounds, BlobSelection, HsvRange};
use puck_prediction::{GameMode, PaddleConfig, PredictorConfig};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const SUBSYSTEM: &str = "puck_tracker";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("settings JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings are missing `{0}`")]
    MissingKey(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelBounds {
    pub lower: u8,
    pub upper: u8,
}

/// HSV bounds in the document's `{hue|sat|val: {lower, upper}}` layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorSettings {
    pub hue: ChannelBounds,
    pub sat: ChannelBounds,
    pub val: ChannelBounds,
}

impl From<ColorSettings> for HsvRange {
    fn from(c: ColorSettings) -> Self {
        HsvRange::new(
            [c.hue.lower, c.sat.lower, c.val.lower],
            [c.hue.upper, c.sat.upper, c.val.upper],
        )
    }
}

impl From<HsvRange> for ColorSettings {
    fn from(r: HsvRange) -> Self {
        ColorSettings {
            hue: ChannelBounds {
                lower: r.lower[0],
                upper: r.upper[0],
            },
            sat: ChannelBounds {
                lower: r.lower[1],
                upper: r.upper[1],
            },
            val: ChannelBounds {
                lower: r.lower[2],
                upper: r.upper[2],
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PuckSettings {
    pub color: ColorSettings,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FiducialSettings {
    pub color: ColorSettings,
    #[serde(default)]
    pub coordinates: Option<FiducialSet>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSettings {
    #[serde(flatten)]
    pub dimensions: TableDimensions,
    /// Camera columns run along the table length.
    pub swap_axes: bool,
}

impl Default for TableSettings {
    fn default() -> Self {
        Self {
            dimensions: TableDimensions::default(),
            swap_axes: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSettings {
    pub puck: BlobBounds,
    pub fiducial: Option<BlobBounds>,
    pub selection: BlobSelection,
    pub median_kernel: usize,
    pub tracking_interpolation: Interpolation,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            puck: BlobBounds::default(),
            fiducial: None,
            selection: BlobSelection::default(),
            median_kernel: 5,
            tracking_interpolation: Interpolation::Nearest,
        }
    }
}

/// The `puck_tracker` subtree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackerSettings {
    pub puck: PuckSettings,
    pub fiducial: FiducialSettings,
    #[serde(default)]
    pub table: TableSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub prediction: PredictorConfig,
    #[serde(default)]
    pub paddle: PaddleConfig,
    #[serde(default)]
    pub game_mode: GameMode,
}

/// Reads and merges the settings file on disk.
#[derive(Clone, Debug)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Value, SettingsError> {
        let contents = fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    // Write to a sibling file first so a crash never leaves a truncated document.
    fn write_document(&self, doc: &Value) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        serde_json::to_writer_pretty(&mut file, doc)?;
        file.write_all(b"\n").map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }

    /// Loads the tracker's own subtree.
    pub fn load(&self) -> Result<TrackerSettings, SettingsError> {
        let mut doc = self.read_document()?;
        let subtree = doc
            .get_mut(SUBSYSTEM)
            .map(Value::take)
            .ok_or_else(|| SettingsError::MissingKey(SUBSYSTEM.to_string()))?;
        Ok(serde_json::from_value(subtree)?)
    }

    /// Replaces the stored fiducial coordinates, preserving the rest of the document.
    pub fn save_fiducials(&self, fiducials: &FiducialSet) -> Result<(), SettingsError> {
        let mut doc = self.read_document()?;
        let tracker = doc
            .get_mut(SUBSYSTEM)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| SettingsError::MissingKey(SUBSYSTEM.to_string()))?;
        let fiducial = tracker
            .entry("fiducial")
            .or_insert_with(|| json!({}))
            .as_object_mut()
            .ok_or_else(|| SettingsError::MissingKey(format!("{SUBSYSTEM}.fiducial")))?;
        fiducial.insert("coordinates".to_string(), serde_json::to_value(fiducials)?);

        self.write_document(&doc)?;
        tracing::info!(path = %self.path.display(), "fiducial coordinates saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puck_calibration::PixelPoint;

    const DOCUMENT: &str = r#"{
        "master_controller": { "enumerations": { "mc_state": ["idle", "running"] }, "timeout": 0.005 },
        "puck_tracker": {
            "enumerations": { "pt_state": ["idle", "calibrate"] },
            "puck": { "color": {
                "hue": { "lower": 40, "upper": 80 },
                "sat": { "lower": 80, "upper": 255 },
                "val": { "lower": 80, "upper": 255 } } },
            "fiducial": {
                "color": {
                    "hue": { "lower": 100, "upper": 130 },
                    "sat": { "lower": 100, "upper": 255 },
                    "val": { "lower": 100, "upper": 255 } },
                "coordinates": {
                    "tl": { "x": 0, "y": 0 }, "tr": { "x": 0, "y": 0 },
                    "br": { "x": 0, "y": 0 }, "bl": { "x": 0, "y": 0 } } }
        }
    }"#;

    fn store_with(contents: &str) -> (tempfile::TempDir, SettingsStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, contents).unwrap();
        (dir, SettingsStore::new(path))
    }

    #[test]
    fn loads_subtree_with_defaults() {
        let (_dir, store) = store_with(DOCUMENT);
        let settings = store.load().unwrap();

        let puck: HsvRange = settings.puck.color.into();
        assert_eq!(puck, HsvRange::new([40, 80, 80], [80, 255, 255]));
        assert_eq!(settings.detection.median_kernel, 5);
        assert_eq!(settings.game_mode, GameMode::Defense);
        assert!(settings.table.swap_axes);
        assert_eq!(settings.fiducial.coordinates.unwrap().top_left, PixelPoint::default());
    }

    #[test]
    fn save_fiducials_preserves_other_keys() {
        let (_dir, store) = store_with(DOCUMENT);
        let set = FiducialSet {
            top_left: PixelPoint::new(12.5, 10.0),
            top_right: PixelPoint::new(620.0, 11.0),
            bottom_right: PixelPoint::new(615.0, 470.0),
            bottom_left: PixelPoint::new(14.0, 468.0),
        };
        store.save_fiducials(&set).unwrap();

        let doc: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(doc["master_controller"]["timeout"], json!(0.005));
        assert_eq!(doc["puck_tracker"]["enumerations"]["pt_state"][1], json!("calibrate"));
        assert_eq!(doc["puck_tracker"]["fiducial"]["coordinates"]["tl"]["x"], json!(12.5));
        assert_eq!(doc["puck_tracker"]["fiducial"]["color"]["hue"]["lower"], json!(100));

        assert_eq!(store.load().unwrap().fiducial.coordinates, Some(set));
    }

    #[test]
    fn missing_subsystem_is_reported() {
        let (_dir, store) = store_with(r#"{ "user_interface": {} }"#);
        assert!(matches!(store.load(), Err(SettingsError::MissingKey(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let store = SettingsStore::new("/no/such/settings.json");
        assert!(matches!(store.load(), Err(SettingsError::Io { .. })));
    }

    #[test]
    fn color_settings_convert_both_ways() {
        let range = HsvRange::new([1, 2, 3], [4, 5, 6]);
        let back: HsvRange = ColorSettings::from(range).into();
        assert_eq!(back, range);
    }
}

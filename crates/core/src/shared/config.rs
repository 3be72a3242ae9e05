use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Stage, microphone and tracking parameters.
///
/// Distances are in meters, angles in degrees. Every field has a default, so
/// a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub stage_width: f64,
    pub stage_depth: f64,
    /// Distance from the front center of the stage to the microphone.
    pub mic_distance: f64,
    pub mic_fov: f64,
    /// Run detection and command the motor every Nth frame.
    pub skip_frames: u64,
    pub roi_scale: f64,
    pub camera_index: u32,
    pub confidence: f64,
    /// Serial device of the motor controller; `None` selects the simulated motor.
    pub motor_port: Option<String>,
    pub motor_seconds_per_degree: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stage_width: 10.0,
            stage_depth: 5.0,
            mic_distance: 15.0,
            mic_fov: 90.0,
            skip_frames: 3,
            roi_scale: 1.5,
            camera_index: 0,
            confidence: 0.2,
            motor_port: None,
            motor_seconds_per_degree: 0.1,
        }
    }
}

impl TrackerConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the per-user config file when one exists, otherwise defaults.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => {
                log::info!("Loading config from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let reals = [
            ("stage_width", self.stage_width),
            ("stage_depth", self.stage_depth),
            ("mic_distance", self.mic_distance),
            ("mic_fov", self.mic_fov),
            ("roi_scale", self.roi_scale),
            ("confidence", self.confidence),
            ("motor_seconds_per_degree", self.motor_seconds_per_degree),
        ];
        for (name, value) in reals {
            if !value.is_finite() {
                return Err(invalid(format!("{name} must be finite, got {value}")));
            }
        }
        if !(self.stage_width > 0.0) {
            return Err(invalid(format!(
                "stage_width must be positive, got {}",
                self.stage_width
            )));
        }
        if !(self.stage_depth > 0.0) {
            return Err(invalid(format!(
                "stage_depth must be positive, got {}",
                self.stage_depth
            )));
        }
        if !(self.mic_distance > 0.0) {
            return Err(invalid(format!(
                "mic_distance must be positive, got {}",
                self.mic_distance
            )));
        }
        if !(self.mic_fov > 0.0 && self.mic_fov <= 180.0) {
            return Err(invalid(format!(
                "mic_fov must be in (0, 180], got {}",
                self.mic_fov
            )));
        }
        if self.skip_frames < 1 {
            return Err(invalid("skip_frames must be >= 1".to_string()));
        }
        if !(self.roi_scale > 1.0) {
            return Err(invalid(format!(
                "roi_scale must be greater than 1.0, got {}",
                self.roi_scale
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(invalid(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            )));
        }
        if !(self.motor_seconds_per_degree >= 0.0) {
            return Err(invalid(format!(
                "motor_seconds_per_degree must be non-negative, got {}",
                self.motor_seconds_per_degree
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use std::io::Write;

    #[test]
    fn test_defaults_match_stage_setup() {
        let config = TrackerConfig::default();
        assert_relative_eq!(config.stage_width, 10.0);
        assert_relative_eq!(config.stage_depth, 5.0);
        assert_relative_eq!(config.mic_distance, 15.0);
        assert_relative_eq!(config.mic_fov, 90.0);
        assert_eq!(config.camera_index, 0);
        assert!(config.motor_port.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"stage_width": 12.5, "skip_frames": 5}}"#).unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();

        assert_relative_eq!(config.stage_width, 12.5);
        assert_eq!(config.skip_frames, 5);
        assert_relative_eq!(config.mic_distance, 15.0);
    }

    #[test]
    fn test_load_motor_port() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"motor_port": "/dev/ttyACM0"}}"#).unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();

        assert_eq!(config.motor_port.as_deref(), Some("/dev/ttyACM0"));
    }

    #[test]
    fn test_load_missing_file_errors() {
        let result = TrackerConfig::load(Path::new("/nonexistent/mic-aim.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_load_malformed_file_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        let result = TrackerConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_round_trips_through_json() {
        let config = TrackerConfig {
            motor_port: Some("/dev/ttyUSB1".to_string()),
            ..TrackerConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TrackerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    fn with(mutate: impl FnOnce(&mut TrackerConfig)) -> TrackerConfig {
        let mut config = TrackerConfig::default();
        mutate(&mut config);
        config
    }

    #[rstest]
    #[case::zero_stage_width(with(|c| c.stage_width = 0.0))]
    #[case::negative_stage_depth(with(|c| c.stage_depth = -1.0))]
    #[case::zero_mic_distance(with(|c| c.mic_distance = 0.0))]
    #[case::zero_fov(with(|c| c.mic_fov = 0.0))]
    #[case::wide_fov(with(|c| c.mic_fov = 200.0))]
    #[case::zero_skip(with(|c| c.skip_frames = 0))]
    #[case::roi_scale_one(with(|c| c.roi_scale = 1.0))]
    #[case::confidence_above_one(with(|c| c.confidence = 1.5))]
    #[case::negative_motor_speed(with(|c| c.motor_seconds_per_degree = -0.1))]
    #[case::nan_stage_width(with(|c| c.stage_width = f64::NAN))]
    #[case::infinite_motor_speed(with(|c| c.motor_seconds_per_degree = f64::INFINITY))]
    #[case::infinite_mic_distance(with(|c| c.mic_distance = f64::INFINITY))]
    #[case::infinite_roi_scale(with(|c| c.roi_scale = f64::INFINITY))]
    fn test_validate_rejects(#[case] config: TrackerConfig) {
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}

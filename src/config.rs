use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gesture::{GesturePolicy, HandModelSettings};
use crate::math::color::HuePolicy;
use crate::math::mesh::{DEFAULT_RESOLUTION, DEFAULT_SIZE};
use crate::renderer::controls::{
    DEFAULT_DAMPING, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_DISTANCE, DEFAULT_ROTATE_SPEED,
    DEFAULT_ZOOM_SPEED,
};

pub const CONFIG_FILE: &str = "handplot.toml";
pub const CONFIG_ENV: &str = "HANDPLOT_CONFIG";

/// Largest grid the renderer has buffers for.
pub const MAX_RESOLUTION: usize = 512;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowConfig,
    pub plot: PlotConfig,
    pub camera: CameraConfig,
    pub gesture: GestureConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Hand Plot".into(),
            width: 1600,
            height: 900,
            vsync: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotConfig {
    pub formula: String,
    pub color: String,
    pub wireframe: bool,
    pub resolution: usize,
    pub size: f64,
    pub hue_policy: HuePolicy,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            formula: "sin(x) * cos(z)".into(),
            color: "#4287f5".into(),
            wireframe: false,
            resolution: DEFAULT_RESOLUTION,
            size: DEFAULT_SIZE,
            hue_policy: HuePolicy::Wrap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub damping: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            damping: DEFAULT_DAMPING,
            rotate_speed: DEFAULT_ROTATE_SPEED,
            zoom_speed: DEFAULT_ZOOM_SPEED,
            min_distance: DEFAULT_MIN_DISTANCE,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub interval_ms: u64,
    /// JSON-lines landmark recording to use as the camera; no camera when unset.
    pub replay_path: Option<PathBuf>,
    pub replay_loop: bool,
    pub policy: GesturePolicy,
    pub model: HandModelSettings,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            interval_ms: 50,
            replay_path: None,
            replay_loop: true,
            policy: GesturePolicy::default(),
            model: HandModelSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".into(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }

    /// Reads `$HANDPLOT_CONFIG` or `./handplot.toml`; a missing file means defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));

        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(&path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_RESOLUTION).contains(&self.plot.resolution) {
            return Err(ConfigError::Invalid(format!(
                "plot.resolution must be between 2 and {MAX_RESOLUTION}, got {}",
                self.plot.resolution
            )));
        }
        if !(self.plot.size.is_finite() && self.plot.size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "plot.size must be positive, got {}",
                self.plot.size
            )));
        }
        if !(0.0..=1.0).contains(&self.camera.damping) || self.camera.damping == 0.0 {
            return Err(ConfigError::Invalid(format!(
                "camera.damping must be in (0, 1], got {}",
                self.camera.damping
            )));
        }
        if self.camera.min_distance > self.camera.max_distance {
            return Err(ConfigError::Invalid(
                "camera.min_distance exceeds camera.max_distance".into(),
            ));
        }
        if self.gesture.interval_ms == 0 {
            return Err(ConfigError::Invalid("gesture.interval_ms must be non-zero".into()));
        }
        if self.gesture.model.input_size == 0 {
            return Err(ConfigError::Invalid(
                "gesture.model.input_size must be non-zero".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.gesture.model.presence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "gesture.model.presence_threshold must be in [0, 1], got {}",
                self.gesture.model.presence_threshold
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_toml(text, Path::new("test.toml"))
    }

    #[test]
    fn test_defaults_match_constants() {
        let config = AppConfig::default();
        assert_eq!(config.plot.formula, "sin(x) * cos(z)");
        assert_eq!(config.plot.color, "#4287f5");
        assert_eq!(config.plot.resolution, 100);
        assert_eq!(config.plot.size, 5.0);
        assert_eq!(config.camera.damping, 0.05);
        assert_eq!(config.gesture.interval_ms, 50);
        assert_eq!(config.gesture.policy, GesturePolicy::default());
        assert_eq!(config.logging.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_file_is_all_defaults() {
        assert_eq!(parse("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = parse(
            r#"
            [plot]
            formula = "x * z"
            hue_policy = "clamp"

            [gesture]
            replay_path = "session.jsonl"

            [gesture.policy]
            pinch_close = 30.0
            "#,
        )
        .unwrap();

        assert_eq!(config.plot.formula, "x * z");
        assert_eq!(config.plot.hue_policy, HuePolicy::Clamp);
        assert_eq!(config.plot.resolution, 100);
        assert_eq!(config.gesture.replay_path, Some(PathBuf::from("session.jsonl")));
        assert_eq!(config.gesture.policy.pinch_close, 30.0);
        assert_eq!(config.gesture.policy.pinch_open, 100.0);
    }

    #[test]
    fn test_rejects_bad_resolution() {
        let err = parse("[plot]\nresolution = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = parse("[plot]\nresolution = 4096").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_model_section() {
        let config = parse(
            r#"
            [gesture.model]
            path = "models/hand_landmark.onnx"
            presence_threshold = 0.7
            "#,
        )
        .unwrap();
        let model = &config.gesture.model;
        assert_eq!(model.path, Some(PathBuf::from("models/hand_landmark.onnx")));
        assert_eq!(model.input_size, 224);
        assert_eq!(model.presence_threshold, 0.7);

        let err = parse("[gesture.model]
presence_threshold = 1.5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = parse("[plot\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = AppConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(parse(&text).unwrap(), config);
    }
}

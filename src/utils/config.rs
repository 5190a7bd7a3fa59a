use crate::core::{
    BoardLayout, DEFAULT_FILTER_LENGTH, DEFAULT_HANDSHAKE_SETTLE_MS, DEFAULT_NO_DEVICE_BACKOFF_MS,
    DEFAULT_WRITE_DELAY, BOARD_SIDE, SENSOR_COUNT,
};
use crate::hardware::LinkSettings;
use crate::processing::filter::MIN_FILTER_LENGTH;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Lowest units-per-meter the settings editor accepts
pub const MIN_UNITS_PER_METER: f64 = 10.0;

/// System-wide configuration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Samples per sensor window (at least 3)
    pub filter_length: usize,
    /// Zero bytes between select commands in the bulk frame
    pub write_delay: usize,
    /// Wait between the handshake bulk write and the reply check (milliseconds)
    pub handshake_settle_ms: u64,
    /// Wait before rediscovery when no board answered (milliseconds)
    pub no_device_backoff_ms: u64,
    /// Serial line parameters
    pub link: LinkSettings,
    /// Sensor positions and scales
    pub board: BoardLayout,
    /// Source distance assumed when a calibration ratio is captured (board pixels)
    pub calibration_distance: f64,
    /// Per-sensor dipole calibration ratios, in sensor order
    pub calibration_ratios: [f64; SENSOR_COUNT],
    /// Raw sensor units per meter of field reading
    pub units_per_meter: f64,
    /// Board pixels per meter
    pub pixels_per_meter: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let units_per_meter = 1000.0;
        let pixels_per_meter = 1000.0;
        Self {
            filter_length: DEFAULT_FILTER_LENGTH,
            write_delay: DEFAULT_WRITE_DELAY,
            handshake_settle_ms: DEFAULT_HANDSHAKE_SETTLE_MS,
            no_device_backoff_ms: DEFAULT_NO_DEVICE_BACKOFF_MS,
            link: LinkSettings::default(),
            board: BoardLayout::standard(Point2::origin(), pixels_per_meter / units_per_meter),
            calibration_distance: BOARD_SIDE,
            calibration_ratios: [1.0; SENSOR_COUNT],
            units_per_meter,
            pixels_per_meter,
        }
    }
}

impl SystemConfig {
    pub fn handshake_settle(&self) -> Duration {
        Duration::from_millis(self.handshake_settle_ms)
    }

    pub fn no_device_backoff(&self) -> Duration {
        Duration::from_millis(self.no_device_backoff_ms)
    }

    /// Check static configuration; the only failures that stop acquisition
    /// from starting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.filter_length < MIN_FILTER_LENGTH {
            return Err(ConfigError::invalid(
                "filter_length",
                self.filter_length,
                "trimming the extremes needs at least 3 samples",
            ));
        }

        self.link.validate()?;

        if !(self.board.side > 0.0) {
            return Err(ConfigError::invalid("board.side", self.board.side, "must be positive"));
        }

        for (i, sensor) in self.board.sensors.iter().enumerate() {
            if !(sensor.pixels_per_unit > 0.0) {
                return Err(ConfigError::invalid(
                    &format!("board.sensors[{}].pixels_per_unit", i),
                    sensor.pixels_per_unit,
                    "must be positive",
                ));
            }
        }

        if !(self.calibration_distance > 0.0) {
            return Err(ConfigError::invalid(
                "calibration_distance",
                self.calibration_distance,
                "must be positive",
            ));
        }

        if let Some(ratio) = self.calibration_ratios.iter().find(|r| !r.is_finite() || **r < 0.0) {
            return Err(ConfigError::invalid("calibration_ratios", ratio, "must be finite and non-negative"));
        }

        if self.units_per_meter < MIN_UNITS_PER_METER {
            return Err(ConfigError::invalid("units_per_meter", self.units_per_meter, "must be at least 10"));
        }

        if !(self.pixels_per_meter > 0.0) {
            return Err(ConfigError::invalid("pixels_per_meter", self.pixels_per_meter, "must be positive"));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {parameter} = {value}: {reason}")]
    InvalidParameter { parameter: String, value: String, reason: String },
    #[error("config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("config serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("no file path set for saving configuration")]
    NoPath,
}

impl ConfigError {
    fn invalid(parameter: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidParameter {
            parameter: parameter.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Loads, validates and persists [`SystemConfig`]
#[derive(Debug, Default)]
pub struct ConfigurationManager {
    config: SystemConfig,
    config_file_path: Option<String>,
    is_modified: bool,
}

impl ConfigurationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut manager = Self::new();
        manager.load_from_file(path)?;
        Ok(manager)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Replace the configuration after validating it
    pub fn update_config(&mut self, config: SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.config = config;
        self.is_modified = true;
        Ok(())
    }

    /// Load configuration from a JSON file; missing fields take defaults
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();

        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;
        let config: SystemConfig = serde_json::from_str(&content)?;
        config.validate()?;

        log::info!("loaded configuration from {}", path_str);
        self.config = config;
        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let content = serde_json::to_string_pretty(&self.config)?;

        fs::write(&path, content).map_err(|source| ConfigError::Io {
            path: path_str.clone(),
            source,
        })?;

        self.config_file_path = Some(path_str);
        self.is_modified = false;
        Ok(())
    }

    /// Save to the file the configuration was last loaded from or saved to
    pub fn save(&mut self) -> Result<(), ConfigError> {
        match self.config_file_path.clone() {
            Some(path) => self.save_to_file(path),
            None => Err(ConfigError::NoPath),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.is_modified
    }

    pub fn set_filter_length(&mut self, filter_length: usize) -> Result<usize, ConfigError> {
        if filter_length < MIN_FILTER_LENGTH {
            return Err(ConfigError::invalid(
                "filter_length",
                filter_length,
                "trimming the extremes needs at least 3 samples",
            ));
        }
        self.config.filter_length = filter_length;
        self.is_modified = true;
        Ok(filter_length)
    }

    /// Set units per meter, clamped to [`MIN_UNITS_PER_METER`], and re-derive
    /// every sensor's pixel scale. Returns the value applied.
    pub fn set_units_per_meter(&mut self, units_per_meter: f64) -> Result<f64, ConfigError> {
        if !units_per_meter.is_finite() {
            return Err(ConfigError::invalid("units_per_meter", units_per_meter, "must be finite"));
        }
        let applied = units_per_meter.max(MIN_UNITS_PER_METER);
        self.config.units_per_meter = applied;
        self.rescale_board();
        Ok(applied)
    }

    pub fn set_pixels_per_meter(&mut self, pixels_per_meter: f64) -> Result<f64, ConfigError> {
        if !(pixels_per_meter > 0.0) || !pixels_per_meter.is_finite() {
            return Err(ConfigError::invalid("pixels_per_meter", pixels_per_meter, "must be positive"));
        }
        self.config.pixels_per_meter = pixels_per_meter;
        self.rescale_board();
        Ok(pixels_per_meter)
    }

    /// Keep ratios captured during a session so they survive a restart
    pub fn store_calibration_ratios(&mut self, ratios: [f64; SENSOR_COUNT]) {
        if self.config.calibration_ratios != ratios {
            self.config.calibration_ratios = ratios;
            self.is_modified = true;
        }
    }

    fn rescale_board(&mut self) {
        let pixels_per_unit = self.config.pixels_per_meter / self.config.units_per_meter;
        self.config.board.set_pixels_per_unit(pixels_per_unit);
        self.is_modified = true;
    }
}

//! Engine configuration
//!
//! Loaded once at startup from a TOML file. Every section is optional and
//! falls back to the values for the vehicle.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::FailurePolicy;
use crate::error::ConfigError;
use crate::motor::{MotorGeometry, DEFAULT_LAYOUT, MOTOR_COUNT};
use crate::output::OutputMode;
use crate::solver::Constraints;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Thrust (N) or PWM (us) output
    pub output_mode: OutputMode,
    /// What to publish when a twist cannot be allocated
    pub failure_policy: FailurePolicy,
    pub constraints: Constraints,
    pub calibration: CalibrationConfig,
    pub logging: LoggingConfig,
    /// Thruster layout override, exactly one entry per motor in index order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub motors: Option<Vec<MotorConfig>>,
}

/// Calibration table locations
///
/// Relative paths are resolved against the directory of the config file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// `thrust<TAB>current` samples
    pub thrust_to_current: PathBuf,
    /// `thrust<TAB>pwm` samples
    pub thrust_to_pwm: PathBuf,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            thrust_to_current: PathBuf::from("data/thrust_to_current.tsv"),
            thrust_to_pwm: PathBuf::from("data/newtons_to_pwm.tsv"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// One thruster of a layout override
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct MotorConfig {
    /// Position relative to the vehicle origin (in m)
    pub position: [f64; 3],
    /// Thrust direction, normalised on load
    pub direction: [f64; 3],
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::from_toml(&contents)?;
        if let Some(dir) = path.parent() {
            config.calibration.resolve(dir);
        }
        Ok(config)
    }

    /// Parse and validate configuration text. Relative paths are left as written.
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(contents)?;
        config.constraints.validate()?;
        config.geometry()?;
        Ok(config)
    }

    /// The configured thruster layout, or the vehicle's own.
    pub fn geometry(&self) -> Result<MotorGeometry, ConfigError> {
        let motors = match &self.motors {
            Some(motors) => motors,
            None => return Ok(MotorGeometry::default()),
        };

        let mut layout = DEFAULT_LAYOUT;
        if motors.len() != MOTOR_COUNT {
            return Err(ConfigError::Invalid(format!(
                "expected {} motors, found {}",
                MOTOR_COUNT,
                motors.len()
            )));
        }
        for (entry, motor) in layout.iter_mut().zip(motors) {
            *entry = (motor.position, motor.direction);
        }
        MotorGeometry::from_layout(&layout)
    }
}

impl CalibrationConfig {
    fn resolve(&mut self, dir: &Path) {
        for path in [&mut self.thrust_to_current, &mut self.thrust_to_pwm] {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }
}

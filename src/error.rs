//! Error types for the thrust engine

use std::path::PathBuf;

use crate::solver::CurrentGroup;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// A twist could not be turned into a safe thruster command.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocationError {
    /// Twist components are normalised efforts in [-1, 1]
    #[error("twist component {index} is out of range: {value}")]
    TwistOutOfRange { index: usize, value: f64 },

    /// The current polynomial never reaches the limit for s >= 0
    #[error("no real non-negative root bounds the {group} current")]
    NoCurrentRoot { group: CurrentGroup },

    /// The group draws more than its limit with zero thrust
    #[error("{group} idle current {idle:.3} A exceeds the {limit} A limit")]
    IdleCurrentExceeded {
        group: CurrentGroup,
        idle: f64,
        limit: f64,
    },

    /// Scaling produced a NaN or infinite force
    #[error("scaled thrust is not finite")]
    NonFiniteThrust,

    /// The companion matrix eigenvalues did not converge
    #[error("root finding did not converge for the {group} current polynomial")]
    RootsDidNotConverge { group: CurrentGroup },
}

/// A calibration table could not be loaded or fitted.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationLoadError {
    /// Table file could not be read
    #[error("failed to read calibration table {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A field is not a number
    #[error("{source_name}:{line}: invalid number {field:?}")]
    InvalidNumber {
        source_name: String,
        line: usize,
        field: String,
    },

    /// A line does not have exactly two columns
    #[error("{source_name}:{line}: expected 2 tab-separated columns, found {found}")]
    ColumnCount {
        source_name: String,
        line: usize,
        found: usize,
    },

    /// Not enough samples to determine every coefficient
    #[error("{name} needs at least {required} samples, found {found}")]
    TooFewSamples {
        name: &'static str,
        required: usize,
        found: usize,
    },

    /// The least-squares solve failed or produced non-finite coefficients
    #[error("failed to fit {name}: {reason}")]
    Fit { name: &'static str, reason: String },

    /// No calibration was supplied to the engine builder
    #[error("no calibration curves were provided")]
    Missing,
}

/// A center-of-mass update was rejected. The previous offset stays in place.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CenterOfMassError {
    /// Center of mass deltas have exactly three components
    #[error("center of mass update must have 3 components, got {0}")]
    Dimension(usize),

    /// NaN or infinite component
    #[error("center of mass must be finite, got {0:?}")]
    NonFinite(Vec<f64>),

    /// SVD of the allocation matrix failed
    #[error("failed to decompose the allocation matrix: {0}")]
    Decomposition(&'static str),
}

/// Invalid or unreadable configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// TOML syntax or schema error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A value is outside its valid range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top level error for building and running the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Calibration(#[from] CalibrationLoadError),

    #[error(transparent)]
    CenterOfMass(#[from] CenterOfMassError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

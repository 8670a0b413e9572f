use std::sync::Arc;

use tracing::info;

use super::{FailurePolicy, ThrustEngine};
use crate::allocator::Allocator;
use crate::calibration::Calibration;
use crate::config::EngineConfig;
use crate::error::{CalibrationLoadError, ConfigError, Result};
use crate::hal::CommandSink;
use crate::motor::MotorGeometry;
use crate::motor_matrix::SharedMotorMatrix;
use crate::output::{OutputMode, OutputStage};
use crate::solver::{ConstraintSolver, Constraints};

pub struct Builder<S> {
    calibration: Option<Calibration>,
    geometry: Option<MotorGeometry>,
    matrix: Option<Arc<SharedMotorMatrix>>,
    sink: Option<S>,
    constraints: Constraints,
    output_mode: OutputMode,
    failure_policy: FailurePolicy,
}

impl<S> Default for Builder<S> {
    fn default() -> Self {
        Self {
            calibration: None,
            geometry: None,
            matrix: None,
            sink: None,
            constraints: Constraints::default(),
            output_mode: OutputMode::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl<S> Builder<S>
where
    S: CommandSink,
{
    /// Start from a loaded configuration. Calibration tables are read and fitted here.
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let calibration = Calibration::load(
            &config.calibration.thrust_to_current,
            &config.calibration.thrust_to_pwm,
        )?;

        Ok(Self::default()
            .calibration(calibration)
            .geometry(config.geometry()?)
            .constraints(config.constraints)
            .output_mode(config.output_mode)
            .failure_policy(config.failure_policy))
    }

    pub fn calibration(mut self, calibration: Calibration) -> Self {
        self.calibration = Some(calibration);
        self
    }

    pub fn geometry(mut self, geometry: MotorGeometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Share an existing matrix handle. Takes precedence over [`Builder::geometry`].
    pub fn shared_matrix(mut self, matrix: Arc<SharedMotorMatrix>) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn sink(mut self, sink: S) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn build(self) -> Result<ThrustEngine<S>> {
        let calibration = self.calibration.ok_or(CalibrationLoadError::Missing)?;
        let sink = self
            .sink
            .ok_or_else(|| ConfigError::Invalid("no command sink was provided".to_owned()))?;
        self.constraints.validate()?;

        let matrix = match self.matrix {
            Some(matrix) => matrix,
            None => Arc::new(SharedMotorMatrix::new(
                self.geometry.unwrap_or_default(),
            )?),
        };

        info!(
            mode = ?self.output_mode,
            policy = ?self.failure_policy,
            "thrust engine ready"
        );

        Ok(ThrustEngine {
            matrix,
            allocator: Allocator::new(),
            solver: ConstraintSolver::new(
                self.constraints,
                calibration.thrust_to_current.polynomial().clone(),
            ),
            output: OutputStage::new(
                self.output_mode,
                calibration.thrust_to_pwm.polynomial().clone(),
            ),
            policy: self.failure_policy,
            sink,
            last: None,
            is_shut_down: false,
        })
    }
}

//! The thrust engine: twist in, thruster command out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::allocator::{validate_twist, Allocator, Thrust, Twist};
use crate::error::{AllocationError, CenterOfMassError};
use crate::hal::CommandSink;
use crate::motor_matrix::{MotorMatrix, Parameter, ParameterResult, SharedMotorMatrix};
use crate::motor::MOTOR_COUNT;
use crate::output::{OutputStage, ThrusterCommand, PWM_NEUTRAL};
use crate::solver::ConstraintSolver;

mod builder;
pub use builder::Builder;

/// What to publish when a twist cannot be allocated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Publish the neutral command
    #[default]
    Neutral,
    /// Publish the previous command again, or neutral if there is none
    HoldLast,
    /// Publish nothing
    Silent,
}

/// Allocates twists, scales them into the vehicle's limits and publishes the
/// result to a [`CommandSink`].
///
/// Dropping the engine publishes one all-neutral PWM command, unless
/// [`shutdown`] already did. This happens in both output modes.
///
/// [`shutdown`]: ThrustEngine::shutdown
pub struct ThrustEngine<S: CommandSink> {
    matrix: Arc<SharedMotorMatrix>,
    allocator: Allocator,
    solver: ConstraintSolver,
    output: OutputStage,
    policy: FailurePolicy,
    sink: S,
    last: Option<ThrusterCommand>,
    is_shut_down: bool,
}

impl<S: CommandSink> ThrustEngine<S> {
    pub fn builder() -> Builder<S> {
        Builder::default()
    }

    /// Scaled thruster forces (in N) for `twist`. Nothing is published.
    pub fn allocate(&mut self, twist: &Twist) -> Result<Thrust, AllocationError> {
        validate_twist(twist)?;

        let matrix = self.matrix.load();
        let thrust = self.allocator.allocate(&matrix, twist);
        self.solver.scale(&thrust, twist)
    }

    /// Allocate `twist` and publish the resulting command.
    ///
    /// On failure the [`FailurePolicy`] decides what is published and the
    /// error is returned.
    pub fn process_twist(&mut self, twist: &Twist) -> Result<ThrusterCommand, AllocationError> {
        match self.allocate(twist) {
            Ok(thrust) => {
                let command = self.output.command(&thrust);
                self.publish(command);
                Ok(command)
            }
            Err(error) => {
                warn!(%error, policy = ?self.policy, "allocation failed");
                match self.policy {
                    FailurePolicy::Neutral => self.publish(self.output.neutral()),
                    FailurePolicy::HoldLast => {
                        let command = self.last.unwrap_or_else(|| self.output.neutral());
                        self.publish(command);
                    }
                    FailurePolicy::Silent => {}
                }
                Err(error)
            }
        }
    }

    pub fn update_center_of_mass(
        &self,
        delta: &[f64],
    ) -> Result<Arc<MotorMatrix>, CenterOfMassError> {
        self.matrix.update_center_of_mass(delta)
    }

    pub fn set_parameters(&self, parameters: &[Parameter]) -> ParameterResult {
        self.matrix.set_parameters(parameters)
    }

    /// The current allocation snapshot.
    pub fn motor_matrix(&self) -> Arc<MotorMatrix> {
        self.matrix.load()
    }

    /// Handle for updating the center of mass from another thread.
    pub fn shared_matrix(&self) -> Arc<SharedMotorMatrix> {
        self.matrix.clone()
    }

    pub fn solver(&self) -> &ConstraintSolver {
        &self.solver
    }

    pub fn output(&self) -> &OutputStage {
        &self.output
    }

    /// Number of matrix-vector products performed by the allocator.
    pub fn matrix_products(&self) -> u64 {
        self.allocator.products()
    }

    pub fn last_command(&self) -> Option<&ThrusterCommand> {
        self.last.as_ref()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Publish the all-neutral PWM command and stop.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.is_shut_down {
            return;
        }
        self.is_shut_down = true;

        self.publish(ThrusterCommand::Pwm([PWM_NEUTRAL; MOTOR_COUNT]));
        info!("thrust engine stopped");
    }

    fn publish(&mut self, command: ThrusterCommand) {
        self.sink.publish(&command);
        self.last = Some(command);
    }
}

impl<S: CommandSink> Drop for ThrustEngine<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::{FailurePolicy, ThrustEngine};
    use crate::allocator::Twist;
    use crate::calibration::{Calibration, CalibrationCurve, Polynomial};
    use crate::error::AllocationError;
    use crate::output::{OutputMode, ThrusterCommand};
    use crate::solver::{Constraints, CurrentGroup};

    fn calibration() -> Calibration {
        Calibration {
            thrust_to_current: CalibrationCurve::new(
                "thrust_to_current",
                Polynomial::new(vec![0.1, 0., 0.004, 0., 0., 0., 0.]),
            ),
            thrust_to_pwm: CalibrationCurve::new(
                "thrust_to_pwm",
                Polynomial::new(vec![1500., 5.5, -0.005, 0., 0., 0.]),
            ),
        }
    }

    fn engine(
        sink: &mut Vec<ThrusterCommand>,
        mode: OutputMode,
        policy: FailurePolicy,
    ) -> ThrustEngine<&mut Vec<ThrusterCommand>> {
        engine_with(sink, mode, policy, calibration())
    }

    fn engine_with(
        sink: &mut Vec<ThrusterCommand>,
        mode: OutputMode,
        policy: FailurePolicy,
        calibration: Calibration,
    ) -> ThrustEngine<&mut Vec<ThrusterCommand>> {
        ThrustEngine::builder()
            .calibration(calibration)
            .output_mode(mode)
            .failure_policy(policy)
            .sink(sink)
            .build()
            .unwrap()
    }

    #[test]
    fn zero_twist_publishes_neutral() {
        let mut sink = Vec::new();
        let mut engine = engine(&mut sink, OutputMode::Pwm, FailurePolicy::Neutral);
        let command = engine.process_twist(&Twist::zeros()).unwrap();
        assert_eq!(command, ThrusterCommand::Pwm([1500; 8]));
        assert_eq!(engine.matrix_products(), 0);
    }

    #[test]
    fn full_surge_saturates_a_limit() {
        let mut sink = Vec::new();
        let mut engine = engine(&mut sink, OutputMode::Thrust, FailurePolicy::Neutral);
        let constraints = Constraints::default();

        let thrust = engine.allocate(&Twist::new(1., 0., 0., 0., 0., 0.)).unwrap();
        let force_ratio = thrust
            .iter()
            .map(|&f| {
                if f > 0. {
                    f / constraints.max_fwd_thrust
                } else {
                    f / constraints.max_rev_thrust
                }
            })
            .fold(0f64, f64::max);
        let [total, a, b] = engine.solver().currents(&thrust);
        let current_ratio = (total / constraints.total_current_limit)
            .max(a / constraints.esc_current_limit)
            .max(b / constraints.esc_current_limit);

        // One of the limits is active
        assert_relative_eq!(force_ratio.max(current_ratio), 1., epsilon = 1e-6);
    }

    #[test]
    fn failure_policies() {
        let bad = Twist::new(2., 0., 0., 0., 0., 0.);
        let good = Twist::new(0.5, 0., 0., 0., 0., 0.);

        let mut sink = Vec::new();
        {
            let mut engine = engine(&mut sink, OutputMode::Pwm, FailurePolicy::HoldLast);
            let first = engine.process_twist(&good).unwrap();
            assert!(matches!(
                engine.process_twist(&bad),
                Err(AllocationError::TwistOutOfRange { index: 0, .. })
            ));
            assert_eq!(engine.last_command(), Some(&first));
            engine.shutdown();
        }
        assert_eq!(sink.len(), 3);
        assert_eq!(sink[0], sink[1]);
        assert_eq!(sink[2], ThrusterCommand::Pwm([1500; 8]));

        let mut sink = Vec::new();
        {
            let mut engine = engine(&mut sink, OutputMode::Pwm, FailurePolicy::Silent);
            assert!(engine.process_twist(&bad).is_err());
            assert!(engine.sink().is_empty());
        }
        assert_eq!(sink, vec![ThrusterCommand::Pwm([1500; 8])]);

        let mut sink = Vec::new();
        {
            let mut engine = engine(&mut sink, OutputMode::Thrust, FailurePolicy::Neutral);
            engine.process_twist(&good).unwrap();
            assert!(engine.process_twist(&bad).is_err());
            assert!(engine.last_command().unwrap().is_neutral());
        }
        assert_eq!(sink.len(), 3);
        assert_eq!(sink[1], ThrusterCommand::Thrust([0.; 8]));
        assert_eq!(sink[2], ThrusterCommand::Pwm([1500; 8]));
    }

    #[test]
    fn solver_failures_publish_no_unscaled_thrust() {
        // Current falls with thrust and never reaches the limit
        let falling = || Calibration {
            thrust_to_current: CalibrationCurve::new(
                "thrust_to_current",
                Polynomial::new(vec![1., 0., -0.01, 0., 0., 0., 0.]),
            ),
            ..calibration()
        };
        let surge = Twist::new(0.5, 0., 0., 0., 0., 0.);
        let no_root = AllocationError::NoCurrentRoot {
            group: CurrentGroup::Total,
        };

        let mut sink = Vec::new();
        {
            let mut engine =
                engine_with(&mut sink, OutputMode::Pwm, FailurePolicy::Neutral, falling());
            assert_eq!(engine.process_twist(&surge), Err(no_root.clone()));
            assert_eq!(engine.sink().as_slice(), &[ThrusterCommand::Pwm([1500; 8])]);
        }

        let mut sink = Vec::new();
        {
            let mut engine =
                engine_with(&mut sink, OutputMode::Thrust, FailurePolicy::HoldLast, falling());
            assert_eq!(engine.process_twist(&surge), Err(no_root.clone()));
            let previous = engine.process_twist(&Twist::zeros()).unwrap();
            assert_eq!(engine.process_twist(&surge), Err(no_root.clone()));
            assert_eq!(
                engine.sink().as_slice(),
                &[ThrusterCommand::Thrust([0.; 8]), previous, previous]
            );
        }

        let mut sink = Vec::new();
        {
            let mut engine =
                engine_with(&mut sink, OutputMode::Pwm, FailurePolicy::Silent, falling());
            assert_eq!(engine.process_twist(&surge), Err(no_root));
            assert!(engine.sink().is_empty());
        }

        assert_eq!(sink, vec![ThrusterCommand::Pwm([1500; 8])]);
    }

    #[test]
    fn vanishing_twist_gives_finite_thrust() {
        let twist = Twist::new(1e-310, 0., 0., 0., 0., 0.);
        let constraints = Constraints::default();

        let mut sink = Vec::new();
        let mut engine = engine(&mut sink, OutputMode::Thrust, FailurePolicy::Neutral);
        let thrust = engine.allocate(&twist).unwrap();
        for f in thrust.iter() {
            assert!(f.is_finite());
            assert!(*f <= constraints.max_fwd_thrust && *f >= constraints.max_rev_thrust);
        }
        match engine.process_twist(&twist).unwrap() {
            ThrusterCommand::Thrust(values) => assert!(values.iter().all(|v| v.is_finite())),
            command => panic!("expected thrust, got {:?}", command),
        }
    }

    #[test]
    fn drop_publishes_neutral_once() {
        let mut sink = Vec::new();
        {
            let mut engine = engine(&mut sink, OutputMode::Pwm, FailurePolicy::Neutral);
            engine.process_twist(&Twist::new(0., 0., 0.3, 0., 0., 0.)).unwrap();
        }
        assert_eq!(sink.len(), 2);
        assert_eq!(sink[1], ThrusterCommand::Pwm([1500; 8]));

        // Teardown is always the PWM fail-safe, whatever the output mode
        let mut sink = Vec::new();
        engine(&mut sink, OutputMode::Thrust, FailurePolicy::Neutral).shutdown();
        assert_eq!(sink, vec![ThrusterCommand::Pwm([1500; 8])]);
    }
}

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::allocator::Thrust;
use crate::calibration::Polynomial;
use crate::motor::MOTOR_COUNT;

/// Pulse width that stops a thruster (in us).
pub const PWM_NEUTRAL: i16 = 1500;

/// Shortest pulse width ever sent to an ESC (in us).
pub const PWM_MIN: i16 = 1100;

/// Longest pulse width ever sent to an ESC (in us).
pub const PWM_MAX: i16 = 1900;

/// What the engine emits for each twist. Fixed at startup.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Thruster forces in Newtons
    Thrust,
    /// ESC pulse widths in microseconds
    #[default]
    Pwm,
}

/// A command for all eight thrusters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ThrusterCommand {
    Thrust([f32; MOTOR_COUNT]),
    Pwm([i16; MOTOR_COUNT]),
}

impl ThrusterCommand {
    pub fn is_neutral(&self) -> bool {
        match self {
            ThrusterCommand::Thrust(values) => values.iter().all(|v| *v == 0.),
            ThrusterCommand::Pwm(values) => values.iter().all(|v| *v == PWM_NEUTRAL),
        }
    }
}

impl fmt::Display for ThrusterCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThrusterCommand::Thrust(values) => {
                f.write_str("thrust")?;
                for value in values {
                    write!(f, " {:.4}", value)?;
                }
            }
            ThrusterCommand::Pwm(values) => {
                f.write_str("pwm")?;
                for value in values {
                    write!(f, " {}", value)?;
                }
            }
        }
        Ok(())
    }
}

/// Turns scaled thrust into the command for the configured [`OutputMode`].
#[derive(Clone, Debug)]
pub struct OutputStage {
    mode: OutputMode,
    thrust_to_pwm: Polynomial,
}

impl OutputStage {
    pub fn new(mode: OutputMode, thrust_to_pwm: Polynomial) -> Self {
        Self {
            mode,
            thrust_to_pwm,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn command(&self, thrust: &Thrust) -> ThrusterCommand {
        match self.mode {
            OutputMode::Thrust => {
                let mut values = [0f32; MOTOR_COUNT];
                for (value, force) in values.iter_mut().zip(thrust.iter()) {
                    *value = *force as f32;
                }
                ThrusterCommand::Thrust(values)
            }
            OutputMode::Pwm => {
                let mut values = [PWM_NEUTRAL; MOTOR_COUNT];
                for (value, force) in values.iter_mut().zip(thrust.iter()) {
                    *value = self.pwm(*force);
                }
                ThrusterCommand::Pwm(values)
            }
        }
    }

    /// Pulse width for `thrust` (in N), truncated and clamped to the ESC range.
    /// Exactly zero thrust is always neutral.
    pub fn pwm(&self, thrust: f64) -> i16 {
        if thrust == 0. {
            return PWM_NEUTRAL;
        }

        let pulse = self.thrust_to_pwm.eval(thrust).trunc();
        if pulse.is_nan() {
            return PWM_NEUTRAL;
        }
        pulse.clamp(f64::from(PWM_MIN), f64::from(PWM_MAX)) as i16
    }

    /// The command that stops every thruster.
    pub fn neutral(&self) -> ThrusterCommand {
        match self.mode {
            OutputMode::Thrust => ThrusterCommand::Thrust([0.; MOTOR_COUNT]),
            OutputMode::Pwm => ThrusterCommand::Pwm([PWM_NEUTRAL; MOTOR_COUNT]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{OutputMode, OutputStage, ThrusterCommand, PWM_MAX, PWM_MIN, PWM_NEUTRAL};
    use crate::allocator::Thrust;
    use crate::calibration::Polynomial;

    /// Deliberately offset at zero and steep enough to saturate
    fn stage(mode: OutputMode) -> OutputStage {
        OutputStage::new(mode, Polynomial::new(vec![1510., 10., 0., 0., 0., 0.]))
    }

    #[test]
    fn zero_thrust_is_neutral() {
        assert_eq!(stage(OutputMode::Pwm).pwm(0.), PWM_NEUTRAL);
        assert_eq!(stage(OutputMode::Pwm).pwm(-0.), PWM_NEUTRAL);
    }

    #[test]
    fn pwm_is_truncated_and_clamped() {
        let stage = stage(OutputMode::Pwm);
        assert_eq!(stage.pwm(1.05), 1520);
        assert_eq!(stage.pwm(-1.05), 1499);
        assert_eq!(stage.pwm(100.), PWM_MAX);
        assert_eq!(stage.pwm(-100.), PWM_MIN);
    }

    #[test]
    fn pwm_command() {
        let thrust = Thrust::from_column_slice(&[0., 1., -1., 50., -50., 0., 2., 0.]);
        let command = stage(OutputMode::Pwm).command(&thrust);
        assert_eq!(
            command,
            ThrusterCommand::Pwm([1500, 1520, 1500, 1900, 1100, 1500, 1530, 1500])
        );
    }

    #[test]
    fn thrust_command_passes_newtons_through() {
        let thrust = Thrust::from_column_slice(&[0., 1.5, -2.25, 0., 0., 0., 0., 10.]);
        let command = stage(OutputMode::Thrust).command(&thrust);
        assert_eq!(
            command,
            ThrusterCommand::Thrust([0., 1.5, -2.25, 0., 0., 0., 0., 10.])
        );
        assert_eq!(command.to_string().split(' ').count(), 9);
    }

    #[test]
    fn neutral_per_mode() {
        assert_eq!(
            stage(OutputMode::Pwm).neutral(),
            ThrusterCommand::Pwm([PWM_NEUTRAL; 8])
        );
        assert!(stage(OutputMode::Thrust).neutral().is_neutral());
    }
}

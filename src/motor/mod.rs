use core::fmt;
use core::ops::Range;

use nalgebra::{Unit, Vector3};

use crate::error::ConfigError;

/// Number of thrusters on the vehicle.
pub const MOTOR_COUNT: usize = 8;

/// Thrusters wired to each ESC circuit.
pub const MOTORS_PER_CIRCUIT: usize = 4;

/// Electrical circuit (ESC board) a thruster draws its current from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Circuit {
    A,
    B,
}

impl Circuit {
    pub const ALL: [Circuit; 2] = [Circuit::A, Circuit::B];

    pub fn of(index: usize) -> Self {
        if index < MOTORS_PER_CIRCUIT {
            Circuit::A
        } else {
            Circuit::B
        }
    }

    /// Motor indices on this circuit.
    pub fn motors(self) -> Range<usize> {
        match self {
            Circuit::A => 0..MOTORS_PER_CIRCUIT,
            Circuit::B => MOTORS_PER_CIRCUIT..MOTOR_COUNT,
        }
    }
}

impl fmt::Display for Circuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Circuit::A => f.write_str("circuit A"),
            Circuit::B => f.write_str("circuit B"),
        }
    }
}

/// A single thruster: where it sits on the frame and which way it pushes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motor {
    pub index: usize,
    /// Position in the body frame (in m)
    pub position: Vector3<f64>,
    /// Direction of positive thrust
    pub direction: Unit<Vector3<f64>>,
    pub circuit: Circuit,
}

impl Motor {
    pub fn new(
        index: usize,
        position: Vector3<f64>,
        direction: Vector3<f64>,
    ) -> Result<Self, ConfigError> {
        if !position.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "motor {} position must be finite",
                index
            )));
        }
        let direction = Unit::try_new(direction, f64::EPSILON)
            .filter(|d| d.iter().all(|v| v.is_finite()))
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "motor {} thrust direction must be a finite, non-zero vector",
                    index
                ))
            })?;

        Ok(Self {
            index,
            position,
            direction,
            circuit: Circuit::of(index),
        })
    }

    /// Force this motor applies to the frame per Newton of thrust.
    pub fn force(&self) -> Vector3<f64> {
        self.direction.into_inner()
    }

    /// Torque about `center_of_mass` per Newton of thrust.
    pub fn torque(&self, center_of_mass: &Vector3<f64>) -> Vector3<f64> {
        (self.position - center_of_mass).cross(&self.force())
    }
}

/// The fixed thruster layout of the vehicle.
#[derive(Clone, Debug, PartialEq)]
pub struct MotorGeometry {
    motors: [Motor; MOTOR_COUNT],
}

impl MotorGeometry {
    /// Create a geometry from `[position, direction]` pairs in motor index order.
    pub fn from_layout(
        layout: &[([f64; 3], [f64; 3]); MOTOR_COUNT],
    ) -> Result<Self, ConfigError> {
        let mut motors = [Motor {
            index: 0,
            position: Vector3::zeros(),
            direction: Vector3::z_axis(),
            circuit: Circuit::A,
        }; MOTOR_COUNT];

        for (index, (position, direction)) in layout.iter().enumerate() {
            motors[index] = Motor::new(
                index,
                Vector3::from(*position),
                Vector3::from(*direction),
            )?;
        }

        Ok(Self { motors })
    }

    pub fn motors(&self) -> &[Motor; MOTOR_COUNT] {
        &self.motors
    }

    pub fn motor(&self, index: usize) -> Option<&Motor> {
        self.motors.get(index)
    }
}

/// Measured layout of the vehicle, `[position (m), thrust direction]` per motor.
/// Motors 0-3 push vertically, 4-7 are the diagonal horizontal thrusters.
pub const DEFAULT_LAYOUT: [([f64; 3], [f64; 3]); MOTOR_COUNT] = [
    ([0.200, 0.130, 0.004], [0.0, 0.0, -1.0]),
    ([0.200, -0.130, 0.047], [0.0, 0.0, 1.0]),
    ([-0.200, 0.130, 0.047], [0.0, 0.0, 1.0]),
    ([-0.200, -0.130, 0.047], [0.0, 0.0, -1.0]),
    ([0.198, 0.156, -0.038], [-0.7071, 0.7071, 0.0]),
    ([0.198, -0.156, -0.038], [-0.7071, -0.7071, 0.0]),
    ([-0.198, 0.156, -0.038], [0.7071, 0.7071, 0.0]),
    ([-0.198, -0.156, -0.038], [0.7071, -0.7071, 0.0]),
];

impl Default for MotorGeometry {
    fn default() -> Self {
        let mut index = 0;
        let motors = DEFAULT_LAYOUT.map(|(position, direction)| {
            let motor = Motor {
                index,
                position: Vector3::from(position),
                direction: Unit::new_normalize(Vector3::from(direction)),
                circuit: Circuit::of(index),
            };
            index += 1;
            motor
        });

        Self { motors }
    }
}

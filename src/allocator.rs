use nalgebra::{SVector, Vector3, Vector6};

use crate::error::AllocationError;
use crate::motor::MOTOR_COUNT;
use crate::motor_matrix::MotorMatrix;

/// Commanded `[linear x, y, z, angular x, y, z]` effort.
///
/// Components are normalised efforts in `[-1, 1]`, where 1 is the most the
/// vehicle can deliver along that axis. Anything else is rejected with
/// [`AllocationError::TwistOutOfRange`].
pub type Twist = Vector6<f64>;

/// Force (in N) for each thruster.
pub type Thrust = SVector<f64, MOTOR_COUNT>;

/// Create a twist from its linear and angular parts.
pub fn twist(linear: Vector3<f64>, angular: Vector3<f64>) -> Twist {
    Twist::new(
        linear.x, linear.y, linear.z, angular.x, angular.y, angular.z,
    )
}

/// Check that every component is a finite effort in `[-1, 1]`.
pub fn validate_twist(twist: &Twist) -> Result<(), AllocationError> {
    match twist
        .iter()
        .enumerate()
        .find(|(_, value)| !(value.is_finite() && value.abs() <= 1.))
    {
        Some((index, value)) => Err(AllocationError::TwistOutOfRange {
            index,
            value: *value,
        }),
        None => Ok(()),
    }
}

/// Maps twists to raw thruster forces through the inverse allocation matrix.
#[derive(Debug, Default)]
pub struct Allocator {
    products: u64,
}

impl Allocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw (unscaled) thruster forces for `twist`.
    /// The zero twist returns zero thrust without touching the matrix.
    pub fn allocate(&mut self, matrix: &MotorMatrix, twist: &Twist) -> Thrust {
        if twist.iter().all(|v| *v == 0.) {
            return Thrust::zeros();
        }

        self.products += 1;
        matrix.inverse() * twist
    }

    /// Number of matrix-vector products performed so far.
    pub fn products(&self) -> u64 {
        self.products
    }
}

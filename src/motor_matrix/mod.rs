use nalgebra::{SMatrix, Vector3};

use crate::error::CenterOfMassError;
use crate::motor::{MotorGeometry, MOTOR_COUNT};

mod shared;
pub use shared::{Parameter, ParameterResult, SharedMotorMatrix, CENTER_OF_MASS_PARAMETER};

/// Maps thruster forces to body `[Fx, Fy, Fz, Tx, Ty, Tz]`.
pub type AllocationMatrix = SMatrix<f64, 6, MOTOR_COUNT>;

/// Moore-Penrose pseudo-inverse of [`AllocationMatrix`].
pub type InverseAllocationMatrix = SMatrix<f64, MOTOR_COUNT, 6>;

/// Singular values below this fraction of the largest one are treated as zero.
pub const PINV_RCOND: f64 = 1e-15;

/// An immutable allocation snapshot for one center of mass.
///
/// The matrix and its inverse are only ever built together, so a reader holding
/// a snapshot always sees a consistent pair.
#[derive(Clone, Debug, PartialEq)]
pub struct MotorMatrix {
    center_of_mass: Vector3<f64>,
    allocation: AllocationMatrix,
    inverse: InverseAllocationMatrix,
}

impl MotorMatrix {
    /// Build the allocation matrix about `center_of_mass` and its pseudo-inverse.
    /// Rank-deficient layouts still produce the minimum-norm inverse.
    pub fn new(
        geometry: &MotorGeometry,
        center_of_mass: Vector3<f64>,
    ) -> Result<Self, CenterOfMassError> {
        if !center_of_mass.iter().all(|v| v.is_finite()) {
            return Err(CenterOfMassError::NonFinite(center_of_mass.iter().copied().collect()));
        }

        let allocation = allocation_matrix(geometry, &center_of_mass);
        let inverse = pseudo_inverse(&allocation).map_err(CenterOfMassError::Decomposition)?;

        Ok(Self {
            center_of_mass,
            allocation,
            inverse,
        })
    }

    pub fn center_of_mass(&self) -> &Vector3<f64> {
        &self.center_of_mass
    }

    pub fn allocation(&self) -> &AllocationMatrix {
        &self.allocation
    }

    pub fn inverse(&self) -> &InverseAllocationMatrix {
        &self.inverse
    }
}

/// Columns are motors; rows 0-2 are the thrust direction and rows 3-5 the
/// torque `(position - center_of_mass) x direction`.
pub fn allocation_matrix(
    geometry: &MotorGeometry,
    center_of_mass: &Vector3<f64>,
) -> AllocationMatrix {
    let mut matrix = AllocationMatrix::zeros();
    for motor in geometry.motors() {
        let force = motor.force();
        let torque = motor.torque(center_of_mass);
        for axis in 0..3 {
            matrix[(axis, motor.index)] = force[axis];
            matrix[(axis + 3, motor.index)] = torque[axis];
        }
    }
    matrix
}

/// SVD pseudo-inverse with a cutoff relative to the largest singular value.
pub fn pseudo_inverse(
    matrix: &AllocationMatrix,
) -> Result<InverseAllocationMatrix, &'static str> {
    let svd = matrix.svd(true, true);
    let cutoff = PINV_RCOND * svd.singular_values.max();
    svd.pseudo_inverse(cutoff)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::{Matrix6, Vector3};

    use super::{allocation_matrix, MotorMatrix};
    use crate::motor::{MotorGeometry, DEFAULT_LAYOUT};

    #[test]
    fn force_rows_are_directions() {
        let geometry = MotorGeometry::default();
        let matrix = allocation_matrix(&geometry, &Vector3::zeros());
        for motor in geometry.motors() {
            for axis in 0..3 {
                assert_eq!(matrix[(axis, motor.index)], motor.force()[axis]);
            }
        }
    }

    #[test]
    fn vertical_thrusters_have_no_yaw_torque() {
        let matrix = allocation_matrix(&MotorGeometry::default(), &Vector3::new(0.04, 0.025, -0.01));
        for index in 0..4 {
            assert_relative_eq!(matrix[(5, index)], 0.);
        }
    }

    #[test]
    fn inverse_is_right_inverse() {
        let matrix = MotorMatrix::new(&MotorGeometry::default(), Vector3::zeros()).unwrap();
        let product = matrix.allocation() * matrix.inverse();
        assert_relative_eq!(product, Matrix6::identity(), epsilon = 1e-9);
    }

    #[test]
    fn rank_deficient_layout_still_inverts() {
        // Every motor pushes straight up from the origin
        let layout = DEFAULT_LAYOUT.map(|_| ([0., 0., 0.], [0., 0., 1.]));
        let geometry = MotorGeometry::from_layout(&layout).unwrap();
        let matrix = MotorMatrix::new(&geometry, Vector3::zeros()).unwrap();

        // Minimum-norm solution splits heave evenly
        let heave = matrix.inverse().column(2).clone_owned();
        for force in heave.iter() {
            assert_relative_eq!(*force, 0.125, epsilon = 1e-12);
        }
        // The pseudo-inverse identity A A+ A = A holds
        let a = matrix.allocation();
        assert_relative_eq!(a * matrix.inverse() * a, *a, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_center_of_mass_is_rejected() {
        let result = MotorMatrix::new(&MotorGeometry::default(), Vector3::new(0., f64::NAN, 0.));
        assert!(result.is_err());
    }
}

//! Saturation scaling.
//!
//! Raw allocations are unbounded; the solver finds the largest scalar that keeps
//! every thruster inside its force envelope and every circuit inside its current
//! budget.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::allocator::{Thrust, Twist};
use crate::calibration::Polynomial;
use crate::error::{AllocationError, ConfigError};
use crate::motor::Circuit;

/// Force and current limits of the vehicle.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Constraints {
    /// Maximum forward thrust of one thruster (in N)
    pub max_fwd_thrust: f64,
    /// Maximum reverse thrust of one thruster (in N, negative)
    pub max_rev_thrust: f64,
    /// Current budget of all thrusters together (in A)
    pub total_current_limit: f64,
    /// Current budget of each ESC circuit (in A)
    pub esc_current_limit: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self {
            max_fwd_thrust: 36.3826715 * 2.,
            max_rev_thrust: -28.6354180 * 2.,
            total_current_limit: 70.,
            esc_current_limit: 40.,
        }
    }
}

impl Constraints {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            self.max_fwd_thrust,
            self.max_rev_thrust,
            self.total_current_limit,
            self.esc_current_limit,
        ];
        if !values.iter().all(|v| v.is_finite()) {
            return Err(ConfigError::Invalid("constraints must be finite".to_owned()));
        }
        if self.max_fwd_thrust <= 0. {
            return Err(ConfigError::Invalid("max_fwd_thrust must be positive".to_owned()));
        }
        if self.max_rev_thrust >= 0. {
            return Err(ConfigError::Invalid("max_rev_thrust must be negative".to_owned()));
        }
        if self.total_current_limit <= 0. || self.esc_current_limit <= 0. {
            return Err(ConfigError::Invalid("current limits must be positive".to_owned()));
        }
        Ok(())
    }
}

/// Set of thrusters sharing a current limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CurrentGroup {
    Total,
    Circuit(Circuit),
}

impl fmt::Display for CurrentGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrentGroup::Total => f.write_str("total"),
            CurrentGroup::Circuit(circuit) => write!(f, "{}", circuit),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConstraintSolver {
    constraints: Constraints,
    thrust_to_current: Polynomial,
}

impl ConstraintSolver {
    pub fn new(constraints: Constraints, thrust_to_current: Polynomial) -> Self {
        Self {
            constraints,
            thrust_to_current,
        }
    }

    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// Estimated current draw (in A) of `forces`.
    pub fn current(&self, forces: &[f64]) -> f64 {
        forces.iter().map(|f| self.thrust_to_current.eval(*f)).sum()
    }

    /// Largest scalar keeping each force within `[max_rev_thrust, max_fwd_thrust]`.
    /// Infinite when every force is zero.
    pub fn thrust_limit_scalar(&self, thrust: &Thrust) -> f64 {
        thrust
            .iter()
            .map(|&f| {
                if f > 0. {
                    self.constraints.max_fwd_thrust / f
                } else if f < 0. {
                    self.constraints.max_rev_thrust / f
                } else {
                    f64::INFINITY
                }
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Current draw of `forces` scaled by `s`, minus `limit`, as a polynomial in `s`.
    ///
    /// The coefficient of `s^k` is `a_k * sum(f_i^k)`.
    pub fn current_polynomial(&self, forces: &[f64], limit: f64) -> Polynomial {
        let mut coefficients: Vec<f64> = self
            .thrust_to_current
            .coefficients()
            .iter()
            .enumerate()
            .map(|(k, a)| a * forces.iter().map(|f| f.powi(k as i32)).sum::<f64>())
            .collect();
        coefficients[0] -= limit;
        Polynomial::new(coefficients)
    }

    /// Largest scalar keeping the current of `forces` within `limit`.
    pub fn group_current_scalar(
        &self,
        group: CurrentGroup,
        forces: &[f64],
        limit: f64,
    ) -> Result<f64, AllocationError> {
        let idle = self.thrust_to_current.eval(0.) * forces.len() as f64;
        if idle > limit {
            return Err(AllocationError::IdleCurrentExceeded { group, idle, limit });
        }

        // Solve in u = s * max|f| so the coefficients stay comparable
        let scale = forces.iter().fold(0f64, |acc, f| acc.max(f.abs()));
        if scale == 0. {
            return Ok(f64::INFINITY);
        }
        let normalized: Vec<f64> = forces.iter().map(|f| f / scale).collect();

        let roots = self
            .current_polynomial(&normalized, limit)
            .real_non_negative_roots()
            .ok_or(AllocationError::RootsDidNotConverge { group })?;

        roots
            .first()
            .map(|u| u / scale)
            .ok_or(AllocationError::NoCurrentRoot { group })
    }

    /// Smallest current scalar over all thrusters and each circuit.
    pub fn current_limit_scalar(&self, thrust: &Thrust) -> Result<f64, AllocationError> {
        let forces = thrust.as_slice();
        let mut scalar = self.group_current_scalar(
            CurrentGroup::Total,
            forces,
            self.constraints.total_current_limit,
        )?;

        for circuit in Circuit::ALL {
            scalar = scalar.min(self.group_current_scalar(
                CurrentGroup::Circuit(circuit),
                &forces[circuit.motors()],
                self.constraints.esc_current_limit,
            )?);
        }

        Ok(scalar)
    }

    /// Estimated `[total, circuit A, circuit B]` current (in A) of `thrust`.
    pub fn currents(&self, thrust: &Thrust) -> [f64; 3] {
        let forces = thrust.as_slice();
        [
            self.current(forces),
            self.current(&forces[Circuit::A.motors()]),
            self.current(&forces[Circuit::B.motors()]),
        ]
    }

    /// Scale raw thrust into the force envelope and current budget.
    ///
    /// The thrust is normalised to a unit peak before the scalars are taken, so
    /// vanishing twists cannot push either scalar to infinity.
    pub fn scale(&self, thrust: &Thrust, twist: &Twist) -> Result<Thrust, AllocationError> {
        let peak = thrust.amax();
        if peak == 0. {
            return Ok(Thrust::zeros());
        }

        let unit = thrust / peak;
        let scaled = unit * self.scalar(&unit, twist)?;
        if scaled.iter().all(|f| f.is_finite()) {
            Ok(scaled)
        } else {
            Err(AllocationError::NonFiniteThrust)
        }
    }

    /// The scalar applied to raw thrust: the tighter of the thrust and current
    /// scalars, times the largest twist component.
    pub fn scalar(&self, thrust: &Thrust, twist: &Twist) -> Result<f64, AllocationError> {
        let saturation = self
            .thrust_limit_scalar(thrust)
            .min(self.current_limit_scalar(thrust)?);
        Ok(saturation * twist.amax())
    }
}

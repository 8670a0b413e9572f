use std::sync::Arc;

use nalgebra::Vector3;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::MotorMatrix;
use crate::error::CenterOfMassError;
use crate::motor::MotorGeometry;

/// Name of the parameter that shifts the center of mass.
pub const CENTER_OF_MASS_PARAMETER: &str = "center_of_mass_increment";

/// A named parameter update as delivered by the parameter service.
#[derive(Clone, Debug, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: Vec<f64>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    pub fn center_of_mass_increment(value: Vec<f64>) -> Self {
        Self::new(CENTER_OF_MASS_PARAMETER, value)
    }
}

/// Outcome reported back to the parameter service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParameterResult {
    pub successful: bool,
    pub reason: String,
}

impl ParameterResult {
    pub fn success() -> Self {
        Self {
            successful: true,
            reason: String::new(),
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            successful: false,
            reason: reason.into(),
        }
    }
}

/// The published [`MotorMatrix`] snapshot.
///
/// Readers clone the current `Arc` and never block on a rebuild. Updates build
/// a complete new snapshot and then swap the pointer, so the allocation matrix
/// and its inverse are never observed out of step. Writers are serialised so
/// concurrent increments are not lost.
#[derive(Debug)]
pub struct SharedMotorMatrix {
    geometry: MotorGeometry,
    current: RwLock<Arc<MotorMatrix>>,
    writer: Mutex<()>,
}

impl SharedMotorMatrix {
    /// Build the initial snapshot with the center of mass at the origin.
    pub fn new(geometry: MotorGeometry) -> Result<Self, CenterOfMassError> {
        let matrix = MotorMatrix::new(&geometry, Vector3::zeros())?;
        Ok(Self {
            geometry,
            current: RwLock::new(Arc::new(matrix)),
            writer: Mutex::new(()),
        })
    }

    pub fn geometry(&self) -> &MotorGeometry {
        &self.geometry
    }

    /// The current snapshot.
    pub fn load(&self) -> Arc<MotorMatrix> {
        self.current.read().clone()
    }

    pub fn center_of_mass(&self) -> Vector3<f64> {
        *self.load().center_of_mass()
    }

    /// Apply a center of mass delta.
    ///
    /// An exactly zero delta resets the offset to the origin, anything else is
    /// added to the current offset. The new snapshot is published before this
    /// returns; on error the previous snapshot stays in place.
    pub fn update_center_of_mass(
        &self,
        delta: &[f64],
    ) -> Result<Arc<MotorMatrix>, CenterOfMassError> {
        if delta.len() != 3 {
            warn!(len = delta.len(), "rejected center of mass update");
            return Err(CenterOfMassError::Dimension(delta.len()));
        }
        if !delta.iter().all(|v| v.is_finite()) {
            warn!(?delta, "rejected non-finite center of mass update");
            return Err(CenterOfMassError::NonFinite(delta.to_vec()));
        }

        let _writer = self.writer.lock();

        let delta = Vector3::from_column_slice(delta);
        let center_of_mass = if delta.iter().all(|v| *v == 0.) {
            Vector3::zeros()
        } else {
            self.center_of_mass() + delta
        };

        let matrix = Arc::new(MotorMatrix::new(&self.geometry, center_of_mass)?);
        *self.current.write() = matrix.clone();

        debug!(
            x = center_of_mass.x,
            y = center_of_mass.y,
            z = center_of_mass.z,
            "rebuilt motor matrix"
        );

        Ok(matrix)
    }

    /// Handle a batch of parameter updates.
    ///
    /// The first `center_of_mass_increment` in the batch is applied; a batch
    /// without one is reported as unsuccessful.
    pub fn set_parameters(&self, parameters: &[Parameter]) -> ParameterResult {
        match parameters
            .iter()
            .find(|parameter| parameter.name == CENTER_OF_MASS_PARAMETER)
        {
            Some(parameter) => match self.update_center_of_mass(&parameter.value) {
                Ok(_) => ParameterResult::success(),
                Err(error) => ParameterResult::failure(error.to_string()),
            },
            None => ParameterResult::failure("no supported parameter in update"),
        }
    }
}

#![allow(dead_code)]

use std::path::PathBuf;

use rov_thrust::calibration::Calibration;
use rov_thrust::{
    CalibrationCurve, FailurePolicy, OutputMode, Polynomial, ThrustEngine, ThrusterCommand,
};

/// Smooth thruster model: 0.1 A idle, mostly quadratic.
pub fn current_polynomial() -> Polynomial {
    Polynomial::new(vec![0.1, 0., 0.004, 1e-5, 0., 0., 0.])
}

pub fn pwm_polynomial() -> Polynomial {
    Polynomial::new(vec![1500., 5.5, -0.005, 0., 0., 0.])
}

pub fn calibration() -> Calibration {
    Calibration {
        thrust_to_current: CalibrationCurve::new("thrust_to_current", current_polynomial()),
        thrust_to_pwm: CalibrationCurve::new("thrust_to_pwm", pwm_polynomial()),
    }
}

pub fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

pub fn engine<'a>(
    sink: &'a mut Vec<ThrusterCommand>,
    mode: OutputMode,
) -> ThrustEngine<&'a mut Vec<ThrusterCommand>> {
    ThrustEngine::builder()
        .calibration(calibration())
        .output_mode(mode)
        .failure_policy(FailurePolicy::Neutral)
        .sink(sink)
        .build()
        .unwrap()
}

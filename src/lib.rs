//! # rov-thrust
//! Thrust allocation and current limiting for an eight thruster ROV.
//!
//! # Components
//! [`MotorGeometry`] is the fixed thruster layout and [`MotorMatrix`] its allocation
//! matrix and pseudo-inverse about a center of mass. [`SharedMotorMatrix`] publishes
//! snapshots that can be rebuilt while twists are being processed.
//!
//! [`Allocator`] maps a [`Twist`] to raw thruster forces and [`ConstraintSolver`]
//! scales them into the force envelope and current budget of the vehicle.
//!
//! [`calibration`] fits the thrust to current and thrust to PWM curves at startup.
//!
//! [`ThrustEngine`] ties these together and publishes [`ThrusterCommand`]s to a
//! [`CommandSink`] (see [`EscBank`](hal::EscBank) for driving RC ESCs).
//! [`node`] runs an engine over an event channel.

pub mod allocator;
pub use allocator::{Allocator, Thrust, Twist};

pub mod calibration;
pub use calibration::{Calibration, CalibrationCurve, Polynomial, SampleTable};

pub mod config;
pub use config::EngineConfig;

pub mod engine;
pub use engine::{Builder, FailurePolicy, ThrustEngine};

pub mod error;
pub use error::{Error, Result};

pub mod hal;
pub use hal::CommandSink;

pub mod motor;
pub use motor::{Circuit, Motor, MotorGeometry};

pub mod motor_matrix;
pub use motor_matrix::{MotorMatrix, Parameter, ParameterResult, SharedMotorMatrix};

pub mod node;

pub mod output;
pub use output::{OutputMode, OutputStage, ThrusterCommand};

pub mod solver;
pub use solver::{ConstraintSolver, Constraints, CurrentGroup};

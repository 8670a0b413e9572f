//! Property-based tests for the allocation and scaling pipeline.
//!
//! Covers: force envelope, current budgets, PWM range, wrench direction.

mod common;

use proptest::prelude::*;

use rov_thrust::{Constraints, OutputMode, ThrusterCommand, Twist};

fn unit_twist_strategy() -> impl Strategy<Value = Twist> {
    prop::array::uniform6(-1.0f64..=1.0).prop_map(|v| Twist::from_column_slice(&v))
}

/// Full-range twists, plus twists shrunk by up to 310 decades into subnormals.
fn twist_strategy() -> impl Strategy<Value = Twist> {
    prop_oneof![
        unit_twist_strategy(),
        (unit_twist_strategy(), 0i32..=310).prop_map(|(twist, decades)| {
            twist * 10f64.powi(-decades / 2) * 10f64.powi(-(decades - decades / 2))
        }),
    ]
}

fn center_of_mass_strategy() -> impl Strategy<Value = [f64; 3]> {
    prop::array::uniform3(-0.05f64..=0.05)
}

proptest! {
    /// Every scaled force lies within the per-thruster envelope.
    #[test]
    fn forces_within_limits(twist in twist_strategy(), com in center_of_mass_strategy()) {
        let mut sink = Vec::new();
        let mut engine = common::engine(&mut sink, OutputMode::Thrust);
        engine.update_center_of_mass(&com).unwrap();
        let c = Constraints::default();

        let thrust = engine.allocate(&twist).unwrap();
        for f in thrust.iter() {
            prop_assert!(f.is_finite(), "force {} not finite", f);
            prop_assert!(*f <= c.max_fwd_thrust + 1e-9, "force {} above limit", f);
            prop_assert!(*f >= c.max_rev_thrust - 1e-9, "force {} below limit", f);
        }
    }

    /// Estimated current stays within the total and per-circuit budgets.
    #[test]
    fn currents_within_limits(twist in twist_strategy(), com in center_of_mass_strategy()) {
        let mut sink = Vec::new();
        let mut engine = common::engine(&mut sink, OutputMode::Thrust);
        engine.update_center_of_mass(&com).unwrap();
        let c = Constraints::default();

        let thrust = engine.allocate(&twist).unwrap();
        let [total, a, b] = engine.solver().currents(&thrust);
        prop_assert!(total <= c.total_current_limit * (1. + 1e-6), "total {}", total);
        prop_assert!(a <= c.esc_current_limit * (1. + 1e-6), "circuit A {}", a);
        prop_assert!(b <= c.esc_current_limit * (1. + 1e-6), "circuit B {}", b);
    }

    /// Uniform scaling keeps the produced wrench parallel to the twist.
    #[test]
    fn wrench_follows_twist(twist in unit_twist_strategy()) {
        prop_assume!(twist.amax() > 1e-3);
        let mut sink = Vec::new();
        let mut engine = common::engine(&mut sink, OutputMode::Thrust);

        let thrust = engine.allocate(&twist).unwrap();
        let wrench = engine.motor_matrix().allocation() * thrust;
        let k = wrench.dot(&twist) / twist.norm_squared();
        prop_assert!(k >= 0.);
        prop_assert!((wrench - twist * k).norm() <= 1e-6 * (1. + wrench.norm()));
    }

    /// PWM pulses stay in the ESC range and zero force maps to neutral.
    #[test]
    fn pwm_in_range(twist in twist_strategy()) {
        let mut sink = Vec::new();
        let mut engine = common::engine(&mut sink, OutputMode::Pwm);

        let thrust = engine.allocate(&twist).unwrap();
        match engine.process_twist(&twist).unwrap() {
            ThrusterCommand::Pwm(pulses) => {
                for (pulse, force) in pulses.iter().zip(thrust.iter()) {
                    prop_assert!((1100..=1900).contains(pulse));
                    if *force == 0. {
                        prop_assert_eq!(*pulse, 1500);
                    }
                }
            }
            command => prop_assert!(false, "expected PWM, got {:?}", command),
        }
    }
}

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::PwmPin;
use num_traits::{NumCast, ToPrimitive};
use tracing::warn;

use super::CommandSink;
use crate::motor::MOTOR_COUNT;
use crate::output::{ThrusterCommand, PWM_NEUTRAL};

/// Frame period of a 50 Hz RC ESC signal (in us).
pub const DEFAULT_PERIOD_US: u32 = 20_000;

/// How long the ESCs must see neutral before they arm (in ms).
pub const ARM_DELAY_MS: u16 = 2000;

/// Eight RC ESCs driven by PWM pins.
///
/// Pulse widths are converted to duty cycles against each pin's maximum duty
/// over one frame of `period_us`.
pub struct EscBank<P> {
    pins: [P; MOTOR_COUNT],
    period_us: u32,
}

impl<P> EscBank<P>
where
    P: PwmPin,
    P::Duty: NumCast + ToPrimitive + Copy,
{
    pub fn new(pins: [P; MOTOR_COUNT]) -> Self {
        Self::with_period(pins, DEFAULT_PERIOD_US)
    }

    pub fn with_period(pins: [P; MOTOR_COUNT], period_us: u32) -> Self {
        Self { pins, period_us }
    }

    pub fn enable(&mut self) {
        for pin in &mut self.pins {
            pin.enable();
        }
    }

    /// Enable every pin and hold neutral long enough for the ESCs to arm.
    pub fn arm<D>(&mut self, delay: &mut D)
    where
        D: DelayMs<u16>,
    {
        self.enable();
        self.write(&[PWM_NEUTRAL; MOTOR_COUNT]);
        delay.delay_ms(ARM_DELAY_MS);
    }

    /// Set each pin to its pulse width (in us).
    pub fn write(&mut self, pulses: &[i16; MOTOR_COUNT]) {
        for (index, (pin, pulse)) in self.pins.iter_mut().zip(pulses).enumerate() {
            match duty(pin, self.period_us, *pulse) {
                Some(duty) => pin.set_duty(duty),
                None => warn!(index, pulse, "pulse width not representable as duty"),
            }
        }
    }

    pub fn pins(&self) -> &[P; MOTOR_COUNT] {
        &self.pins
    }

    pub fn release(self) -> [P; MOTOR_COUNT] {
        self.pins
    }
}

fn duty<P>(pin: &P, period_us: u32, pulse_us: i16) -> Option<P::Duty>
where
    P: PwmPin,
    P::Duty: NumCast + ToPrimitive,
{
    let max = pin.get_max_duty().to_f64()?;
    // NumCast::from is in scope, so spell out the lossless conversions
    let pulse = <f64 as From<i16>>::from(pulse_us);
    let period = <f64 as From<u32>>::from(period_us);
    let duty = pulse / period * max;
    <P::Duty as NumCast>::from(duty.round())
}

impl<P> CommandSink for EscBank<P>
where
    P: PwmPin,
    P::Duty: NumCast + ToPrimitive + Copy,
{
    fn publish(&mut self, command: &ThrusterCommand) {
        match command {
            ThrusterCommand::Pwm(pulses) => self.write(pulses),
            ThrusterCommand::Thrust(_) => warn!("ESC bank ignores thrust commands"),
        }
    }
}

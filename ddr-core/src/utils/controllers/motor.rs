//! Motor actuation for the differential-drive robot.
//!
//! `Actuator` is the seam between the wheel control loop and the motor driver
//! hardware. `HBridge` implements it for an L298N-style driver: two digital
//! direction lines and one PWM enable line.

use embedded_hal::{digital::OutputPin, pwm::SetDutyCycle};
use serde::{Deserialize, Serialize};

/// Largest duty accepted by an actuator (8-bit PWM scale).
pub const MAX_DUTY: u8 = 255;

/// Rotation direction of a wheel.
///
/// `Cw` is forward and `Ccw` is reverse for a wheel mounted the standard way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Cw,
    Ccw,
    #[default]
    Stop,
}

impl Direction {
    /// Direction implied by the sign of a signed duty.
    pub fn from_signed(duty: i32) -> Self {
        match duty {
            d if d > 0 => Direction::Cw,
            d if d < 0 => Direction::Ccw,
            _ => Direction::Stop,
        }
    }

    /// Mirror CW/CCW, leaving `Stop` alone.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Cw => Direction::Ccw,
            Direction::Ccw => Direction::Cw,
            Direction::Stop => Direction::Stop,
        }
    }
}

/// Abstract motor driver interface.
pub trait Actuator {
    type Error;

    /// Drive the motor in `direction` with a duty in `0..=MAX_DUTY`.
    fn apply(
        &mut self,
        direction: Direction,
        duty: u8,
    ) -> Result<(), Self::Error>;
}

/// Errors raised by the H-bridge lines.
#[derive(Debug)]
pub enum DeviceError<P: core::fmt::Debug, W: core::fmt::Debug> {
    PinError(P),
    PwmError(W),
}

/// Dual-line H-bridge driver with a PWM enable line.
pub struct HBridge<IN1, IN2, EN> {
    in1: IN1,
    in2: IN2,
    enable: EN,
}

impl<IN1, IN2, EN, P, W> HBridge<IN1, IN2, EN>
where
    IN1: OutputPin<Error = P>,
    IN2: OutputPin<Error = P>,
    EN: SetDutyCycle<Error = W>,
    P: core::fmt::Debug,
    W: core::fmt::Debug,
{
    pub fn new(
        in1: IN1,
        in2: IN2,
        enable: EN,
    ) -> Self {
        Self { in1, in2, enable }
    }

    /// Consume the driver and return its lines.
    pub fn free(self) -> (IN1, IN2, EN) {
        (self.in1, self.in2, self.enable)
    }

    fn set_lines(
        &mut self,
        direction: Direction,
    ) -> Result<(), P> {
        match direction {
            Direction::Cw => {
                self.in1.set_high()?;
                self.in2.set_low()
            }
            Direction::Ccw => {
                self.in1.set_low()?;
                self.in2.set_high()
            }
            Direction::Stop => {
                self.in1.set_low()?;
                self.in2.set_low()
            }
        }
    }
}

impl<IN1, IN2, EN, P, W> Actuator for HBridge<IN1, IN2, EN>
where
    IN1: OutputPin<Error = P>,
    IN2: OutputPin<Error = P>,
    EN: SetDutyCycle<Error = W>,
    P: core::fmt::Debug,
    W: core::fmt::Debug,
{
    type Error = DeviceError<P, W>;

    fn apply(
        &mut self,
        direction: Direction,
        duty: u8,
    ) -> Result<(), Self::Error> {
        self.set_lines(direction).map_err(DeviceError::PinError)?;
        self.enable
            .set_duty_cycle_fraction(u16::from(duty), u16::from(MAX_DUTY))
            .map_err(DeviceError::PwmError)
    }
}

//! Discrete PID controller used for wheel velocity regulation.
//!
//! The controller runs once per wheel-loop tick and works in "per tick" units:
//! the integral is the plain sum of errors and the derivative is the raw
//! error difference, so gains are tuned for a fixed loop rate.
//!
//! Anti-windup: the error accumulator is clamped to the *output* range. Under
//! sustained saturation the accumulator therefore stops growing at the same
//! bound as the output.

use serde::{Deserialize, Serialize};

/// Proportional, integral and derivative gains.
///
/// Gains are non-negative; negative values are folded to their magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

impl PidGains {
    pub const fn new(
        kp: f32,
        ki: f32,
        kd: f32,
    ) -> Self {
        Self { kp, ki, kd }
    }

    fn sanitized(self) -> Self {
        Self {
            kp: libm::fabsf(self.kp),
            ki: libm::fabsf(self.ki),
            kd: libm::fabsf(self.kd),
        }
    }
}

impl Default for PidGains {
    fn default() -> Self {
        Self::new(1000.0, 110.0, 0.0)
    }
}

/// Output clamp range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutputLimits {
    pub min: f32,
    pub max: f32,
}

impl OutputLimits {
    /// Build a range, swapping the bounds if they are given inverted.
    pub fn new(
        min: f32,
        max: f32,
    ) -> Self {
        if min > max {
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    /// Bound `value` to the range. Never panics, even on NaN bounds.
    pub fn clamp(
        &self,
        value: f32,
    ) -> f32 {
        if value > self.max {
            self.max
        } else if value < self.min {
            self.min
        } else {
            value
        }
    }

    fn is_finite(&self) -> bool {
        self.min.is_finite() && self.max.is_finite()
    }
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self::new(-255.0, 255.0)
    }
}

/// PID controller with output-range anti-windup.
#[derive(Debug, Clone, Copy)]
pub struct Pid {
    gains: PidGains,
    limits: OutputLimits,
    setpoint: f32,
    error_accumulator: f32,
    previous_error: f32,
}

impl Pid {
    /// Create a controller with the given gains and output range.
    ///
    /// Invalid inputs are sanitized rather than rejected.
    pub fn new(
        gains: PidGains,
        limits: OutputLimits,
    ) -> Self {
        Self {
            gains: gains.sanitized(),
            limits: if limits.is_finite() {
                OutputLimits::new(limits.min, limits.max)
            } else {
                OutputLimits::default()
            },
            setpoint: 0.0,
            error_accumulator: 0.0,
            previous_error: 0.0,
        }
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn output_limits(&self) -> OutputLimits {
        self.limits
    }

    pub fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub fn error_accumulator(&self) -> f32 {
        self.error_accumulator
    }

    pub fn previous_error(&self) -> f32 {
        self.previous_error
    }

    /// Replace the gains and clear the integral/derivative history.
    pub fn set_pid_gains(
        &mut self,
        gains: PidGains,
    ) {
        self.gains = gains.sanitized();
        self.reset();
    }

    /// Replace the output range; the accumulator is pulled into the new range.
    ///
    /// Non-finite bounds are ignored and the previous range is kept.
    pub fn set_output_limits(
        &mut self,
        min: f32,
        max: f32,
    ) {
        let limits = OutputLimits::new(min, max);
        if !limits.is_finite() {
            tracing::warn!(min, max, "non-finite output limits ignored");
            return;
        }
        self.limits = limits;
        self.error_accumulator = self.limits.clamp(self.error_accumulator);
    }

    /// Change the target. Always clears the integral state so a new setpoint
    /// does not inherit a kick from the old one.
    pub fn set_setpoint(
        &mut self,
        setpoint: f32,
    ) {
        self.setpoint = setpoint;
        self.reset();
    }

    /// Zero the accumulator and previous error.
    pub fn reset(&mut self) {
        self.error_accumulator = 0.0;
        self.previous_error = 0.0;
    }

    /// Run one controller step against `measured_value`.
    pub fn compute(
        &mut self,
        measured_value: f32,
    ) -> f32 {
        let PidGains { kp, ki, kd } = self.gains;
        let error = self.setpoint - measured_value;

        self.error_accumulator = self.limits.clamp(self.error_accumulator + error);

        let p = kp * error;
        let i = ki * self.error_accumulator;
        let d = kd * (error - self.previous_error);
        self.previous_error = error;

        self.limits.clamp(p + i + d)
    }
}

impl Default for Pid {
    fn default() -> Self {
        Self::new(PidGains::default(), OutputLimits::default())
    }
}

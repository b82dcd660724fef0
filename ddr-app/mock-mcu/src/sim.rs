//! Host-side plant: motors, wheels and encoders behind embedded-hal traits.
//!
//! Each motor is driven by an `HBridge` whose lines write into shared
//! `MotorLines`. `SimWheel` turns the applied drive into a first-order speed
//! response and replays the resulting rotation as encoder edges through an
//! `EncoderChannel`, exactly as the edge interrupt would on the robot.
//! Rotation is modelled in the motor's own frame; mirrored mounting is handled
//! by the wheel's `reverse` and the counter's inversion, as on hardware.

use core::cell::Cell;
use std::convert::Infallible;

use ddr_core::utils::{
    controllers::{EncoderChannel, HBridge, TickCounter},
    Duration,
};
use embedded_hal::{
    digital::{self, InputPin, OutputPin},
    pwm::{self, SetDutyCycle},
};

/// Resolution of the simulated PWM peripheral.
pub const SIM_PWM_MAX: u16 = 1000;

/// H-bridge driving a simulated motor.
pub type SimBridge = HBridge<SimPin, SimPin, SimPwm>;

/// Plant parameters.
#[derive(Debug, Clone, Copy)]
pub struct PlantConfig {
    /// Encoder ticks per second at full duty.
    pub no_load_ticks_per_s: f32,
    /// Speed response time constant.
    pub time_constant: Duration,
}

/// Electrical state of one motor driver.
#[derive(Debug, Default)]
pub struct MotorLines {
    in1: Cell<bool>,
    in2: Cell<bool>,
    duty: Cell<u16>,
}

impl MotorLines {
    /// Signed drive in `-1.0..=1.0`, positive for clockwise.
    pub fn drive(&self) -> f32 {
        let magnitude = f32::from(self.duty.get()) / f32::from(SIM_PWM_MAX);
        match (self.in1.get(), self.in2.get()) {
            (true, false) => magnitude,
            (false, true) => -magnitude,
            _ => 0.0,
        }
    }

    /// Build the H-bridge wired to these lines.
    pub fn bridge(&'static self) -> SimBridge {
        HBridge::new(
            SimPin {
                lines: self,
                line: Line::In1,
            },
            SimPin {
                lines: self,
                line: Line::In2,
            },
            SimPwm { lines: self },
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Line {
    In1,
    In2,
}

/// Direction line of the simulated H-bridge.
pub struct SimPin {
    lines: &'static MotorLines,
    line: Line,
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set(true);
        Ok(())
    }
}

impl SimPin {
    fn set(
        &self,
        level: bool,
    ) {
        match self.line {
            Line::In1 => self.lines.in1.set(level),
            Line::In2 => self.lines.in2.set(level),
        }
    }
}

/// PWM enable line of the simulated H-bridge.
pub struct SimPwm {
    lines: &'static MotorLines,
}

impl pwm::ErrorType for SimPwm {
    type Error = Infallible;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        SIM_PWM_MAX
    }

    fn set_duty_cycle(
        &mut self,
        duty: u16,
    ) -> Result<(), Self::Error> {
        self.lines.duty.set(duty.min(SIM_PWM_MAX));
        Ok(())
    }
}

/// Encoder line B, set by the plant right before each edge.
pub struct SimLineB {
    level: &'static Cell<bool>,
}

impl digital::ErrorType for SimLineB {
    type Error = Infallible;
}

impl InputPin for SimLineB {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level.get())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level.get())
    }
}

/// One motor and encoder.
pub struct SimWheel {
    lines: &'static MotorLines,
    line_b: &'static Cell<bool>,
    encoder: EncoderChannel<'static, SimLineB>,
    config: PlantConfig,
    /// Motor-frame speed (ticks/s)
    speed: f32,
    /// Rotation not yet emitted as a whole edge (ticks)
    residual: f32,
}

impl SimWheel {
    pub fn new(
        lines: &'static MotorLines,
        line_b: &'static Cell<bool>,
        counter: &'static TickCounter,
        config: PlantConfig,
    ) -> Self {
        Self {
            lines,
            line_b,
            encoder: EncoderChannel::new(counter, SimLineB { level: line_b }),
            config,
            speed: 0.0,
            residual: 0.0,
        }
    }

    /// Advance the plant by `dt`, firing one edge per whole tick travelled.
    pub fn step(
        &mut self,
        dt: Duration,
    ) {
        let dt_s = dt.as_micros() as f32 / 1_000_000.0;
        let tau_s = self.config.time_constant.as_micros().max(1) as f32 / 1_000_000.0;
        let target = self.lines.drive() * self.config.no_load_ticks_per_s;
        self.speed += (target - self.speed) * (dt_s / tau_s).min(1.0);
        self.residual += self.speed * dt_s;

        while self.residual >= 1.0 {
            self.edge(false);
            self.residual -= 1.0;
        }
        while self.residual <= -1.0 {
            self.edge(true);
            self.residual += 1.0;
        }
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    fn edge(
        &mut self,
        counter_clockwise: bool,
    ) {
        self.line_b.set(counter_clockwise);
        // The simulated line B cannot fail.
        let Ok(()) = self.encoder.on_edge();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ddr_core::utils::controllers::{Actuator, Direction};

    fn leak<T>(value: T) -> &'static T {
        Box::leak(Box::new(value))
    }

    const PLANT: PlantConfig = PlantConfig {
        no_load_ticks_per_s: 1000.0,
        time_constant: Duration::from_millis(10),
    };

    #[test]
    fn test_bridge_sets_drive() {
        let lines = leak(MotorLines::default());
        let mut bridge = lines.bridge();
        bridge.apply(Direction::Ccw, 255).unwrap();
        assert_eq!(lines.drive(), -1.0);
        bridge.apply(Direction::Stop, 0).unwrap();
        assert_eq!(lines.drive(), 0.0);
    }

    #[test]
    fn test_wheel_emits_edges() {
        let lines = leak(MotorLines::default());
        let counter = leak(TickCounter::new(false));
        let mut wheel = SimWheel::new(lines, leak(Cell::new(false)), counter, PLANT);

        lines.bridge().apply(Direction::Cw, 255).unwrap();
        for _ in 0..100 {
            wheel.step(Duration::from_millis(5));
        }
        // Settled at full speed for most of the half second.
        assert!((wheel.speed() - 1000.0).abs() < 1.0);
        assert!(counter.get_count() > 450 && counter.get_count() <= 500);

        lines.bridge().apply(Direction::Ccw, 255).unwrap();
        for _ in 0..200 {
            wheel.step(Duration::from_millis(5));
        }
        assert!(counter.get_count() < 0);
    }
}

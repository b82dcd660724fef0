//! One driven wheel: actuation state, motion estimate and velocity loop.
//!
//! A `WheelUnit` is built with or without an encoder. Without one it is
//! permanently open-loop and simply forwards the last commanded duty to its
//! actuator. With one it can regulate wheel surface speed: every `run()`
//! samples the tick counter, updates the `MotionEstimate`, feeds the measured
//! linear velocity to its PID and turns the signed output into duty and
//! direction.

use core::f32::consts::PI;

use embassy_time::Instant;
use serde::{Deserialize, Serialize};

use super::{
    encoder::TickCounter,
    motor::{Actuator, Direction, MAX_DUTY},
};
use crate::utils::{
    math::pid::{OutputLimits, Pid, PidGains},
    scheduler::Clock,
};

/// Operating mode of a wheel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WheelMode {
    #[default]
    OpenLoop,
    ClosedLoop,
}

/// Physical description of a wheel and its encoder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelGeometry {
    /// Wheel radius (m)
    pub radius: f32,
    /// Encoder ticks per wheel revolution
    pub ticks_per_revolution: u16,
    /// Largest accepted surface-speed setpoint (m/s)
    pub max_velocity: f32,
}

/// Wheel motion derived from the encoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionEstimate {
    pub rpm: f32,
    /// rad/s
    pub angular_velocity: f32,
    /// Surface speed (m/s)
    pub linear_velocity: f32,
    /// Signed travel since the last reset (m)
    pub cumulative_distance: f32,
    /// Unwrapped wheel angle since the last reset (rad)
    pub angular_position: f32,
}

/// A wheel with its motor driver, optional encoder and velocity controller.
pub struct WheelUnit<'a, A, C> {
    actuator: A,
    clock: C,
    sensor: Option<&'a TickCounter>,
    geometry: WheelGeometry,
    reverse: bool,

    mode: WheelMode,
    direction: Direction,
    duty: u8,
    pid: Pid,

    last_ticks: i32,
    last_sample: Instant,
    motion: MotionEstimate,
}

impl<'a, A, C> WheelUnit<'a, A, C>
where
    A: Actuator,
    C: Clock,
{
    /// Wheel without an encoder; it can only be driven open-loop.
    pub fn open_loop(
        actuator: A,
        clock: C,
        geometry: WheelGeometry,
        reverse: bool,
    ) -> Self {
        let last_sample = clock.now();
        Self {
            actuator,
            clock,
            sensor: None,
            geometry,
            reverse,
            mode: WheelMode::OpenLoop,
            direction: Direction::Stop,
            duty: 0,
            pid: Pid::default(),
            last_ticks: 0,
            last_sample,
            motion: MotionEstimate::default(),
        }
    }

    /// Wheel regulated from `sensor`. Starts closed-loop holding zero speed.
    pub fn closed_loop(
        actuator: A,
        clock: C,
        geometry: WheelGeometry,
        sensor: &'a TickCounter,
        reverse: bool,
    ) -> Self {
        let mut wheel = Self::open_loop(actuator, clock, geometry, reverse);
        wheel.sensor = Some(sensor);
        wheel.mode = WheelMode::ClosedLoop;
        sensor.reset();
        wheel.last_ticks = sensor.get_count();
        wheel.last_sample = wheel.clock.now();
        wheel
    }

    /// Replace the velocity controller's gains and output range.
    pub fn with_pid(
        mut self,
        gains: PidGains,
        limits: OutputLimits,
    ) -> Self {
        self.pid = Pid::new(gains, limits);
        self
    }

    /// One control step. Call periodically at the control-loop rate.
    ///
    /// In closed-loop mode the motion estimate and PID are updated first; the
    /// resulting (or open-loop) duty is always pushed to the actuator.
    pub fn run(&mut self) -> Result<(), A::Error> {
        if self.mode == WheelMode::ClosedLoop {
            if let Some(sensor) = self.sensor {
                self.update_motion(sensor.get_count());
                let output = self.pid.compute(self.motion.linear_velocity);
                self.apply_signed_duty(output as i32);
            }
        }

        let direction = if self.reverse {
            self.direction.reversed()
        } else {
            self.direction
        };
        self.actuator.apply(direction, self.duty)
    }

    /// Regulate the wheel to a surface speed (m/s), clamped to the maximum.
    ///
    /// Switches to closed-loop; ignored for a wheel without an encoder.
    pub fn set_velocity(
        &mut self,
        velocity: f32,
    ) {
        // A negative configured maximum is taken by magnitude.
        let max = libm::fabsf(self.geometry.max_velocity);
        let velocity = if velocity > max {
            max
        } else if velocity < -max {
            -max
        } else {
            velocity
        };
        if self.sensor.is_none() {
            tracing::warn!(velocity, "velocity request ignored, wheel has no encoder");
            return;
        }
        self.mode = WheelMode::ClosedLoop;
        self.pid.set_setpoint(velocity);
        tracing::debug!(velocity, "wheel setpoint updated");
    }

    /// Command a signed duty in `-MAX_DUTY..=MAX_DUTY` and select `mode`.
    pub fn set_duty(
        &mut self,
        duty: i32,
        mode: WheelMode,
    ) {
        self.set_mode(mode);
        self.apply_signed_duty(duty);
    }

    /// Select the operating mode. Closed-loop falls back to open-loop when the
    /// wheel has no encoder.
    pub fn set_mode(
        &mut self,
        mode: WheelMode,
    ) {
        if self.sensor.is_none() {
            if mode == WheelMode::ClosedLoop {
                tracing::warn!("closed-loop requested without an encoder, staying open-loop");
            }
            self.mode = WheelMode::OpenLoop;
            return;
        }
        self.mode = mode;
    }

    /// Restore the freshly-constructed state: zero the encoder, re-anchor the
    /// sample, stop the motor and clear the controller. No-op without an
    /// encoder.
    pub fn reset(&mut self) {
        let Some(sensor) = self.sensor else {
            return;
        };
        sensor.reset();
        self.last_ticks = sensor.get_count();
        self.last_sample = self.clock.now();
        self.motion = MotionEstimate::default();
        self.mode = WheelMode::ClosedLoop;
        self.pid.set_setpoint(0.0);
        self.apply_signed_duty(0);
        tracing::info!("wheel reset");
    }

    pub fn mode(&self) -> WheelMode {
        self.mode
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn duty(&self) -> u8 {
        self.duty
    }

    pub fn motion(&self) -> MotionEstimate {
        self.motion
    }

    pub fn geometry(&self) -> WheelGeometry {
        self.geometry
    }

    pub fn has_sensor(&self) -> bool {
        self.sensor.is_some()
    }

    pub fn pid(&self) -> &Pid {
        &self.pid
    }

    pub fn pid_gains(&self) -> PidGains {
        self.pid.gains()
    }

    pub fn set_pid_gains(
        &mut self,
        gains: PidGains,
    ) {
        self.pid.set_pid_gains(gains);
    }

    /// Consume the wheel and return its actuator.
    pub fn free(self) -> A {
        self.actuator
    }

    fn apply_signed_duty(
        &mut self,
        duty: i32,
    ) {
        let max = i32::from(MAX_DUTY);
        let duty = duty.clamp(-max, max);
        self.direction = Direction::from_signed(duty);
        // Within 0..=MAX_DUTY after the clamp.
        self.duty = duty.unsigned_abs() as u8;
    }

    fn update_motion(
        &mut self,
        ticks: i32,
    ) {
        let tpr = f32::from(self.geometry.ticks_per_revolution);
        let radius = self.geometry.radius;
        let now = self.clock.now();
        let dt_ms = now.saturating_duration_since(self.last_sample).as_millis();

        // Two samples in the same millisecond carry no rate information.
        if dt_ms > 0 {
            let d_ticks = ticks.wrapping_sub(self.last_ticks);
            let rpm = (d_ticks as f32 / dt_ms as f32) * 60_000.0 / tpr;
            let angular_velocity = rpm * 2.0 * PI / 60.0;
            self.motion.rpm = rpm;
            self.motion.angular_velocity = angular_velocity;
            self.motion.linear_velocity = angular_velocity * radius;
            self.last_ticks = ticks;
            self.last_sample = now;
        }

        self.motion.angular_position = ticks as f32 * 2.0 * PI / tpr;
        self.motion.cumulative_distance = self.motion.angular_position * radius;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::{cell::Cell, convert::Infallible};
    use embassy_time::Duration;

    struct TestClock(Cell<u64>);

    impl TestClock {
        fn advance(
            &self,
            ms: u64,
        ) {
            self.0.set(self.0.get() + ms);
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            Instant::from_millis(0) + Duration::from_millis(self.0.get())
        }
    }

    #[derive(Default)]
    struct Recorder {
        last: Option<(Direction, u8)>,
    }

    impl Actuator for Recorder {
        type Error = Infallible;

        fn apply(
            &mut self,
            direction: Direction,
            duty: u8,
        ) -> Result<(), Infallible> {
            self.last = Some((direction, duty));
            Ok(())
        }
    }

    const GEOMETRY: WheelGeometry = WheelGeometry {
        radius: 0.0339,
        ticks_per_revolution: 490,
        max_velocity: 1.0,
    };

    #[test]
    fn test_open_loop_cannot_close() {
        let clock = TestClock(Cell::new(0));
        let mut wheel = WheelUnit::open_loop(Recorder::default(), &clock, GEOMETRY, false);
        wheel.set_velocity(0.5);
        assert_eq!(wheel.mode(), WheelMode::OpenLoop);
        wheel.set_duty(100, WheelMode::ClosedLoop);
        assert_eq!(wheel.mode(), WheelMode::OpenLoop);
        wheel.run().unwrap();
        assert_eq!(wheel.free().last, Some((Direction::Cw, 100)));
    }

    #[test]
    fn test_duty_is_clamped_and_signed() {
        let clock = TestClock(Cell::new(0));
        let mut wheel = WheelUnit::open_loop(Recorder::default(), &clock, GEOMETRY, false);
        wheel.set_duty(-400, WheelMode::OpenLoop);
        assert_eq!(wheel.direction(), Direction::Ccw);
        assert_eq!(wheel.duty(), 255);
        wheel.set_duty(0, WheelMode::OpenLoop);
        assert_eq!(wheel.direction(), Direction::Stop);
        assert_eq!(wheel.duty(), 0);
    }

    #[test]
    fn test_reverse_mirrors_actuation_only() {
        let clock = TestClock(Cell::new(0));
        let mut wheel = WheelUnit::open_loop(Recorder::default(), &clock, GEOMETRY, true);
        wheel.set_duty(50, WheelMode::OpenLoop);
        wheel.run().unwrap();
        assert_eq!(wheel.direction(), Direction::Cw);
        assert_eq!(wheel.free().last, Some((Direction::Ccw, 50)));
    }

    #[test]
    fn test_motion_estimate_from_ticks() {
        let clock = TestClock(Cell::new(0));
        let counter = TickCounter::new(false);
        let mut wheel =
            WheelUnit::closed_loop(Recorder::default(), &clock, GEOMETRY, &counter, false);

        for _ in 0..49 {
            counter.on_edge(false);
        }
        clock.advance(100);
        wheel.run().unwrap();

        // 49 ticks in 100 ms is one tenth of a revolution: 60 rpm.
        let m = wheel.motion();
        assert!((m.rpm - 60.0).abs() < 1e-3);
        assert!((m.angular_velocity - 2.0 * PI).abs() < 1e-4);
        assert!((m.linear_velocity - 2.0 * PI * 0.0339).abs() < 1e-5);
        assert!((m.angular_position - 0.2 * PI).abs() < 1e-5);
    }

    #[test]
    fn test_zero_interval_keeps_previous_rate() {
        let clock = TestClock(Cell::new(0));
        let counter = TickCounter::new(false);
        let mut wheel =
            WheelUnit::closed_loop(Recorder::default(), &clock, GEOMETRY, &counter, false);
        counter.on_edge(false);
        clock.advance(50);
        wheel.run().unwrap();
        let rpm = wheel.motion().rpm;
        counter.on_edge(false);
        wheel.run().unwrap();
        assert_eq!(wheel.motion().rpm, rpm);
        assert!(wheel.motion().rpm.is_finite());
    }

    #[test]
    fn test_velocity_is_clamped() {
        let clock = TestClock(Cell::new(0));
        let counter = TickCounter::new(false);
        let mut wheel =
            WheelUnit::closed_loop(Recorder::default(), &clock, GEOMETRY, &counter, false);
        wheel.set_velocity(5.0);
        assert_eq!(wheel.pid().setpoint(), 1.0);
        wheel.set_velocity(-5.0);
        assert_eq!(wheel.pid().setpoint(), -1.0);
    }

    #[test]
    fn test_negative_max_velocity_is_folded() {
        let clock = TestClock(Cell::new(0));
        let counter = TickCounter::new(false);
        let geometry = WheelGeometry {
            max_velocity: -1.0,
            ..GEOMETRY
        };
        let mut wheel =
            WheelUnit::closed_loop(Recorder::default(), &clock, geometry, &counter, false);
        wheel.set_velocity(0.2);
        assert_eq!(wheel.pid().setpoint(), 0.2);
        wheel.set_velocity(-3.0);
        assert_eq!(wheel.pid().setpoint(), -1.0);
    }

    #[test]
    fn test_closed_loop_drives_toward_setpoint() {
        let clock = TestClock(Cell::new(0));
        let counter = TickCounter::new(false);
        let mut wheel =
            WheelUnit::closed_loop(Recorder::default(), &clock, GEOMETRY, &counter, false);
        wheel.set_velocity(0.3);
        clock.advance(50);
        wheel.run().unwrap();
        assert_eq!(wheel.direction(), Direction::Cw);
        assert!(wheel.duty() > 0);

        wheel.set_velocity(-0.3);
        clock.advance(50);
        wheel.run().unwrap();
        assert_eq!(wheel.direction(), Direction::Ccw);
    }

    #[test]
    fn test_reset_matches_fresh_wheel() {
        let clock = TestClock(Cell::new(0));
        let counter = TickCounter::new(false);
        let mut wheel =
            WheelUnit::closed_loop(Recorder::default(), &clock, GEOMETRY, &counter, false);
        wheel.set_velocity(0.4);
        for _ in 0..30 {
            counter.on_edge(false);
        }
        clock.advance(50);
        wheel.run().unwrap();
        assert!(wheel.motion().cumulative_distance > 0.0);

        wheel.reset();
        assert_eq!(wheel.motion(), MotionEstimate::default());
        assert_eq!(wheel.pid().error_accumulator(), 0.0);
        assert_eq!(wheel.pid().setpoint(), 0.0);
        assert_eq!(wheel.duty(), 0);
        assert_eq!(wheel.direction(), Direction::Stop);
        assert_eq!(wheel.mode(), WheelMode::ClosedLoop);
        assert_eq!(counter.get_count(), 0);
    }
}

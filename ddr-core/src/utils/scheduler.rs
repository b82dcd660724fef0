//! Monotonic clock abstraction and a fixed-interval gate.
//!
//! The control loops are cooperative: the main loop polls `Scheduler::has_elapsed`
//! on every pass and only runs the control step when the period is up. The
//! scheduler re-arms itself with drift compensation, so a late poll does not
//! shift the phase of every following tick.
//!
//! # Example
//! ```rust
//! use ddr_core::utils::scheduler::{EmbassyClock, Scheduler};
//! let mut gate = Scheduler::from_hz(EmbassyClock, 20);
//! if gate.has_elapsed() {
//!     // run the control step
//! }
//! ```

use embassy_time::{Duration, Instant};

/// Source of monotonic time for the control loops.
pub trait Clock {
    /// Current monotonic time.
    fn now(&self) -> Instant;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Clock backed by the platform's `embassy-time` driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Non-blocking "has my period elapsed?" gate.
#[derive(Debug)]
pub struct Scheduler<C> {
    clock: C,
    interval: Duration,
    auto_reset: bool,
    /// Next deadline, `None` while stopped.
    target: Option<Instant>,
}

impl<C: Clock> Scheduler<C> {
    /// Create a running, auto-resetting scheduler with the given period.
    pub fn new(
        clock: C,
        interval: Duration,
    ) -> Self {
        let mut scheduler = Self {
            clock,
            interval,
            auto_reset: true,
            target: None,
        };
        scheduler.reset();
        scheduler
    }

    /// Create a running, auto-resetting scheduler ticking at `hz`.
    pub fn from_hz(
        clock: C,
        hz: u64,
    ) -> Self {
        Self::new(clock, Duration::from_hz(hz.max(1)))
    }

    /// Builder form of [`Scheduler::set_auto_reset`].
    pub fn with_auto_reset(
        mut self,
        auto_reset: bool,
    ) -> Self {
        self.auto_reset = auto_reset;
        self
    }

    /// Arm the scheduler one period from now.
    pub fn start(&mut self) {
        self.reset();
    }

    /// Disarm the scheduler; a stopped scheduler never reports elapsed.
    pub fn stop(&mut self) {
        self.target = None;
    }

    /// Re-arm the deadline one period from now.
    pub fn reset(&mut self) {
        self.target = Some(self.clock.now() + self.interval);
    }

    pub fn set_interval(
        &mut self,
        interval: Duration,
    ) {
        self.interval = interval;
    }

    pub fn set_auto_reset(
        &mut self,
        auto_reset: bool,
    ) {
        self.auto_reset = auto_reset;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.target.is_some()
    }

    /// Poll the gate.
    ///
    /// Returns `true` once the deadline has passed. With auto-reset enabled the
    /// next deadline is placed on the original phase grid: the overrun past the
    /// deadline is subtracted from the next period (modulo the period, so a long
    /// stall yields one tick rather than a burst of catch-up ticks).
    pub fn has_elapsed(&mut self) -> bool {
        let Some(target) = self.target else {
            return false;
        };

        let now = self.clock.now();
        if now < target {
            return false;
        }

        if self.auto_reset {
            let period = self.interval.as_ticks();
            let drift = now.saturating_duration_since(target).as_ticks();
            let correction = if period == 0 { 0 } else { drift % period };
            self.target = Some(now + Duration::from_ticks(period - correction));
        }
        true
    }
}

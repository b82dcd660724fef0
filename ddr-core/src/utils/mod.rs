//! Utility re-exports and helper macros for the differential-drive robot.
//!
//! This module re-exports the drive subsystem components and provides helper
//! macros:
//!
//! - `config`: startup configuration (geometry, gains, loop rates)
//! - `controllers`: encoder counters, wheel units and the drive controller
//! - `math`: PID feedback and differential-drive kinematics
//! - `scheduler`: monotonic clock abstraction and the fixed-interval gate
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod controllers;
pub mod math;
pub mod scheduler;

pub use config::DriveConfig;
pub use controllers::{DriveCommand, DriveController, DriveReply, DRIVE_CHANNEL};
pub use embassy_time::{Duration, Instant};
pub use math::kinematics::DifferentialKinematics as dk;
pub use scheduler::{Clock, EmbassyClock, Scheduler};

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}

//! Core wheel control and odometry for a two-wheeled differential-drive robot on
//! no-std embedded platforms.
//!
//! For a runnable host simulation, see the `mock-mcu` application.
#![no_std]

pub mod utils;

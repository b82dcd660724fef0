//! Math utilities for the differential-drive robot.
//!
//! This module provides the wheel velocity PID controller and the
//! differential-drive kinematics (command mapping and odometry).

pub mod kinematics;
pub mod pid;

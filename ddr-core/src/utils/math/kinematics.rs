//! Kinematics utilities for two-wheeled differential-drive robots.
//!
//! `DifferentialKinematics` maps a unicycle command (linear, angular) onto the
//! two wheels and integrates measured wheel travel back into a planar pose.
//!
//! # Example
//! ```rust
//! use ddr_core::utils::math::kinematics::{CmdVel, DifferentialKinematics};
//! let kin = DifferentialKinematics::new(0.0339, 0.20);
//! let (left, right) = kin.wheel_surface_velocities(CmdVel::new(0.2, 0.0));
//! ```
//!
use core::f32::consts::PI;
use libm;
use serde::{Deserialize, Serialize};

/// Robot-frame velocity command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CmdVel {
    /// Forward speed (m/s)
    pub linear: f32,
    /// Yaw rate, counter-clockwise positive (rad/s)
    pub angular: f32,
}

impl CmdVel {
    pub const fn new(
        linear: f32,
        angular: f32,
    ) -> Self {
        Self { linear, angular }
    }
}

/// Planar pose estimate. `heading` stays within (-π, π].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub heading: f32,
}

/// Represents the kinematics of a two-wheeled differential-drive robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferentialKinematics {
    /// Radius of each wheel (m)
    wheel_radius: f32,
    /// Distance between the wheels (m)
    wheel_separation: f32,
}

impl DifferentialKinematics {
    /// Instantiate with a given wheel radius and wheel separation.
    pub fn new(
        wheel_radius: f32,
        wheel_separation: f32,
    ) -> Self {
        Self {
            wheel_radius,
            wheel_separation,
        }
    }

    pub fn wheel_radius(&self) -> f32 {
        self.wheel_radius
    }

    pub fn wheel_separation(&self) -> f32 {
        self.wheel_separation
    }

    /// Wheel angular rates (rad/s) realising `cmd`.
    ///
    /// # Returns
    ///
    /// `(left, right)`.
    pub fn wheel_angular_velocities(
        &self,
        cmd: CmdVel,
    ) -> (f32, f32) {
        let l = self.wheel_separation;
        let two_r = 2.0 * self.wheel_radius;
        let right = (2.0 * cmd.linear + cmd.angular * l) / two_r;
        let left = (2.0 * cmd.linear - cmd.angular * l) / two_r;
        (left, right)
    }

    /// Wheel surface speeds (m/s) realising `cmd`, the domain the wheel
    /// velocity loops regulate.
    pub fn wheel_surface_velocities(
        &self,
        cmd: CmdVel,
    ) -> (f32, f32) {
        let (left, right) = self.wheel_angular_velocities(cmd);
        (left * self.wheel_radius, right * self.wheel_radius)
    }

    /// Integrate one step of wheel travel into `pose`.
    ///
    /// `d_left`/`d_right` are the distances each wheel covered since the last
    /// step. The heading of the previous step is used for the translation.
    pub fn integrate(
        &self,
        pose: &mut Pose,
        d_left: f32,
        d_right: f32,
    ) {
        let d_center = (d_left + d_right) / 2.0;
        let d_heading = (d_right - d_left) / self.wheel_separation;

        pose.x += d_center * libm::cosf(pose.heading);
        pose.y += d_center * libm::sinf(pose.heading);
        pose.heading = wrap_angle(pose.heading + d_heading);
    }
}

/// Fold an angle into (-π, π] with a single 2π correction.
///
/// Odometry steps are small, so one correction is enough to bring a heading
/// that was in range back into range.
pub fn wrap_angle(angle: f32) -> f32 {
    if angle > PI {
        angle - 2.0 * PI
    } else if angle <= -PI {
        angle + 2.0 * PI
    } else {
        angle
    }
}

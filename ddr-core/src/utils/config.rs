//! Startup configuration for the drive subsystem.
//!
//! The values are fixed once the robot is wired up; nothing in the core
//! mutates them at runtime. Defaults match the reference chassis
//! (33.9 mm wheels, 490-tick encoders, 20 cm track).

use serde::{Deserialize, Serialize};

use crate::utils::{
    controllers::WheelGeometry,
    math::{
        kinematics::DifferentialKinematics,
        pid::{OutputLimits, PidGains},
    },
};

/// Geometry, gains and loop rates consumed by the drive subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Wheel radius (m)
    pub wheel_radius: f32,
    /// Encoder ticks per wheel revolution
    pub ticks_per_revolution: u16,
    /// Distance between the two wheel contact points (m)
    pub wheel_separation: f32,
    /// Default velocity-loop gains for both wheels
    pub pid_gains: PidGains,
    /// Controller output range, in signed duty units
    pub output_limits: OutputLimits,
    /// Maximum wheel surface speed accepted as a setpoint (m/s)
    pub max_velocity: f32,
    /// Control-loop rate shared by the wheel loops and odometry (Hz)
    pub control_loop_hz: u64,
    pub left: SideConfig,
    pub right: SideConfig,
}

/// Mounting conventions for one side of the chassis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SideConfig {
    /// Swap the H-bridge direction lines.
    pub reverse: bool,
    /// Negate the encoder count.
    pub invert_encoder: bool,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            wheel_radius: 0.0339,
            ticks_per_revolution: 490,
            wheel_separation: 0.20,
            pid_gains: PidGains::default(),
            output_limits: OutputLimits::default(),
            max_velocity: 1.0,
            control_loop_hz: 20,
            // The left motor is mounted mirrored.
            left: SideConfig {
                reverse: true,
                invert_encoder: true,
            },
            right: SideConfig::default(),
        }
    }
}

impl DriveConfig {
    pub fn wheel_geometry(&self) -> WheelGeometry {
        WheelGeometry {
            radius: self.wheel_radius,
            ticks_per_revolution: self.ticks_per_revolution,
            max_velocity: self.max_velocity,
        }
    }

    pub fn kinematics(&self) -> DifferentialKinematics {
        DifferentialKinematics::new(self.wheel_radius, self.wheel_separation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let cfg: DriveConfig =
            serde_json::from_str(r#"{"wheel_separation":0.25,"right":{"reverse":true}}"#).unwrap();
        assert_eq!(cfg.wheel_separation, 0.25);
        assert_eq!(cfg.ticks_per_revolution, 490);
        assert!(cfg.right.reverse);
        assert!(!cfg.right.invert_encoder);
        assert!(cfg.left.invert_encoder);
        assert_eq!(cfg.control_loop_hz, 20);
    }
}

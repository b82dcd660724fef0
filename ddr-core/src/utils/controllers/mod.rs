//! Module Exports
//!
//! This file exports the drive subsystem components, leaf-first.
//!
//! - `encoder`: tick counting from the encoder edge interrupt.
//! - `motor`: the actuator seam and the H-bridge driver.
//! - `wheel`: one wheel with its motion estimate and velocity loop.
//! - `drive`: the two-wheel controller with kinematics and odometry.

pub mod drive;
pub mod encoder;
pub mod motor;
pub mod wheel;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use serde::{Deserialize, Serialize};

pub use drive::{DriveController, DriveReply, MotorStatus};
pub use encoder::{EncoderChannel, TickCounter};
pub use motor::{Actuator, DeviceError, Direction, HBridge, MAX_DUTY};
pub use wheel::{MotionEstimate, WheelGeometry, WheelMode, WheelUnit};

/// Channel used to hand `DriveCommand`s to the control loop.
pub static DRIVE_CHANNEL: embassy_sync::channel::Channel<
    CriticalSectionRawMutex,
    DriveCommand,
    16,
> = embassy_sync::channel::Channel::new();

/// Drive command variants exposed to the command layer.
///
/// Serialized as JSON with tag `"dc"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "dc", rename_all = "snake_case")] // dc = drive command
pub enum DriveCommand {
    /// Closed-loop velocity command (m/s, rad/s).
    CmdVel { linear: f32, angular: f32 },
    /// Open-loop signed duties for both wheels.
    OpenLoop { left: i32, right: i32 },
    /// Read the pose estimate.
    Pose,
    /// Read both wheels' motion estimates.
    MotorStatus,
    /// Zero the pose estimate.
    ResetPose,
    /// Read the wheel velocity-loop gains.
    GetPid,
    /// Set the wheel velocity-loop gains.
    SetPid { kp: f32, ki: f32, kd: f32 },
    /// Zero the velocity command.
    Stop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let cmd: DriveCommand =
            serde_json::from_str(r#"{"dc":"cmd_vel","linear":0.2,"angular":-0.5}"#).unwrap();
        assert_eq!(
            cmd,
            DriveCommand::CmdVel {
                linear: 0.2,
                angular: -0.5
            }
        );
        let cmd: DriveCommand = serde_json::from_str(r#"{"dc":"reset_pose"}"#).unwrap();
        assert_eq!(cmd, DriveCommand::ResetPose);
    }

    #[test]
    fn test_channel_hands_over_commands() {
        DRIVE_CHANNEL.try_send(DriveCommand::Stop).unwrap();
        assert_eq!(DRIVE_CHANNEL.try_receive().ok(), Some(DriveCommand::Stop));
    }
}

//! Drive-level controller: velocity commands in, wheel setpoints and pose out.
//!
//! `DriveController` owns both `WheelUnit`s for its whole lifetime. A velocity
//! command is turned into wheel setpoints right away (inverse kinematics);
//! on every scheduled tick the wheels run their loops and the fresh wheel
//! travel is folded into the pose (incremental odometry).

use serde::{Deserialize, Serialize};

use super::{
    motor::Actuator,
    wheel::{MotionEstimate, WheelMode, WheelUnit},
    DriveCommand,
};
use crate::utils::{
    math::{
        kinematics::{CmdVel, DifferentialKinematics, Pose},
        pid::PidGains,
    },
    scheduler::{Clock, Scheduler},
};

/// Motion estimates of both wheels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorStatus {
    pub left: MotionEstimate,
    pub right: MotionEstimate,
}

/// Answer to a [`DriveCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dr", rename_all = "snake_case")]
pub enum DriveReply {
    Ack,
    Pose(Pose),
    MotorStatus(MotorStatus),
    Pid(PidGains),
}

/// Two-wheel drive with inverse kinematics and odometry.
pub struct DriveController<'a, L, R, C> {
    left: WheelUnit<'a, L, C>,
    right: WheelUnit<'a, R, C>,
    kinematics: DifferentialKinematics,
    scheduler: Scheduler<C>,
    pose: Pose,
    cmd_vel: CmdVel,
    previous_left: f32,
    previous_right: f32,
}

impl<'a, L, R, C, E> DriveController<'a, L, R, C>
where
    L: Actuator<Error = E>,
    R: Actuator<Error = E>,
    C: Clock,
{
    pub fn new(
        left: WheelUnit<'a, L, C>,
        right: WheelUnit<'a, R, C>,
        kinematics: DifferentialKinematics,
        scheduler: Scheduler<C>,
    ) -> Self {
        Self {
            left,
            right,
            kinematics,
            scheduler,
            pose: Pose::default(),
            cmd_vel: CmdVel::default(),
            previous_left: 0.0,
            previous_right: 0.0,
        }
    }

    /// Store a new velocity command and dispatch the wheel setpoints.
    ///
    /// The setpoints are applied immediately; the wheels act on them at their
    /// next `run()`.
    pub fn set_cmd_vel(
        &mut self,
        cmd_vel: CmdVel,
    ) {
        self.cmd_vel = cmd_vel;
        self.dispatch_wheel_velocities();
    }

    pub fn cmd_vel(&self) -> CmdVel {
        self.cmd_vel
    }

    /// Zero the velocity command.
    pub fn stop(&mut self) {
        self.set_cmd_vel(CmdVel::default());
    }

    /// Drive both wheels open-loop with signed duties.
    pub fn move_open_loop(
        &mut self,
        left_duty: i32,
        right_duty: i32,
    ) {
        self.left.set_duty(left_duty, WheelMode::OpenLoop);
        self.right.set_duty(right_duty, WheelMode::OpenLoop);
    }

    /// One cooperative pass of the main loop.
    ///
    /// When the scheduler's period has elapsed, both wheels run their control
    /// step and the odometry is integrated from the distances they just
    /// measured. Returns whether the tick fired.
    pub fn run(&mut self) -> Result<bool, E> {
        if !self.scheduler.has_elapsed() {
            return Ok(false);
        }
        self.left.run()?;
        self.right.run()?;
        self.update_pose();
        Ok(true)
    }

    pub fn get_pose(&self) -> Pose {
        self.pose
    }

    pub fn get_motor_status(&self) -> MotorStatus {
        MotorStatus {
            left: self.left.motion(),
            right: self.right.motion(),
        }
    }

    /// Zero the pose, the odometry anchors, both wheels and the command.
    pub fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
        self.clear_odometry();
        self.cmd_vel = CmdVel::default();
        tracing::info!("drive reset");
    }

    /// Zero the pose, the odometry anchors and both wheels, then re-apply the
    /// current velocity command.
    pub fn reset_pose(&mut self) {
        self.left.reset();
        self.right.reset();
        self.clear_odometry();
        self.dispatch_wheel_velocities();
        tracing::info!("pose reset");
    }

    /// Gains of the wheel velocity loops (both wheels share them).
    pub fn pid_gains(&self) -> PidGains {
        self.left.pid_gains()
    }

    pub fn set_pid_gains(
        &mut self,
        gains: PidGains,
    ) {
        self.left.set_pid_gains(gains);
        self.right.set_pid_gains(gains);
        tracing::info!(kp = gains.kp, ki = gains.ki, kd = gains.kd, "wheel gains updated");
    }

    pub fn kinematics(&self) -> &DifferentialKinematics {
        &self.kinematics
    }

    pub fn left(&self) -> &WheelUnit<'a, L, C> {
        &self.left
    }

    pub fn right(&self) -> &WheelUnit<'a, R, C> {
        &self.right
    }

    /// Execute a high-level `DriveCommand`.
    ///
    /// Queries answer with their data; everything else answers `Ack`.
    pub fn execute_command(
        &mut self,
        command: DriveCommand,
    ) -> DriveReply {
        tracing::debug!(?command, "executing drive command");
        match command {
            DriveCommand::CmdVel { linear, angular } => {
                self.set_cmd_vel(CmdVel::new(linear, angular));
                DriveReply::Ack
            }
            DriveCommand::OpenLoop { left, right } => {
                self.move_open_loop(left, right);
                DriveReply::Ack
            }
            DriveCommand::Pose => DriveReply::Pose(self.get_pose()),
            DriveCommand::MotorStatus => DriveReply::MotorStatus(self.get_motor_status()),
            DriveCommand::ResetPose => {
                self.reset_pose();
                DriveReply::Ack
            }
            DriveCommand::GetPid => DriveReply::Pid(self.pid_gains()),
            DriveCommand::SetPid { kp, ki, kd } => {
                self.set_pid_gains(PidGains::new(kp, ki, kd));
                DriveReply::Ack
            }
            DriveCommand::Stop => {
                self.stop();
                DriveReply::Ack
            }
        }
    }

    fn clear_odometry(&mut self) {
        self.pose = Pose::default();
        self.previous_left = 0.0;
        self.previous_right = 0.0;
    }

    fn dispatch_wheel_velocities(&mut self) {
        let (left, right) = self.kinematics.wheel_surface_velocities(self.cmd_vel);
        tracing::debug!(left, right, "wheel velocity setpoints");
        self.left.set_velocity(left);
        self.right.set_velocity(right);
    }

    fn update_pose(&mut self) {
        let left = self.left.motion().cumulative_distance;
        let right = self.right.motion().cumulative_distance;
        let d_left = left - self.previous_left;
        let d_right = right - self.previous_right;

        self.kinematics.integrate(&mut self.pose, d_left, d_right);

        self.previous_left = left;
        self.previous_right = right;
        tracing::trace!(x = self.pose.x, y = self.pose.y, heading = self.pose.heading, "odometry");
    }
}

//! Line protocol spoken on stdin/stdout.
//!
//! One command per line. Single-letter commands follow the serial protocol of
//! the robot firmware; a line starting with `{` is a JSON `DriveCommand`.
//!
//! | line            | command                                   |
//! |-----------------|-------------------------------------------|
//! | `c <x> <w>`     | velocity, mm/s and mrad/s                 |
//! | `o <l> <r>`     | open-loop duties in `-255..=255`          |
//! | `q`             | pose query                                |
//! | `m`             | motor status query                        |
//! | `r`             | reset the pose                            |
//! | `p`             | gains query                               |
//! | `k <p> <i> <d>` | set gains                                 |
//! | `s`             | stop                                      |

use std::fmt;

use ddr_core::utils::{
    controllers::{MotionEstimate, MAX_DUTY},
    DriveCommand, DriveReply,
};

/// Why a line was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    Invalid,
    OutOfRange,
}

impl fmt::Display for ProtocolError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ProtocolError::Invalid => f.write_str("ERR: Invalid command"),
            ProtocolError::OutOfRange => f.write_str("ERR: PWM values out of range"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// How replies are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReplyFormat {
    #[default]
    Text,
    Json,
}

/// Parse one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Result<Option<DriveCommand>, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if line.starts_with('{') {
        return serde_json::from_str(line)
            .map(Some)
            .map_err(|_| ProtocolError::Invalid);
    }

    let mut words = line.split_whitespace();
    let flag = words.next().ok_or(ProtocolError::Invalid)?;
    let args: Vec<&str> = words.collect();

    let command = match (flag, args.as_slice()) {
        ("c", [x, w]) => {
            let x: i32 = number(x)?;
            let w: i32 = number(w)?;
            DriveCommand::CmdVel {
                linear: x as f32 / 1000.0,
                angular: w as f32 / 1000.0,
            }
        }
        ("o", [l, r]) => {
            let left: i32 = number(l)?;
            let right: i32 = number(r)?;
            let max = u32::from(MAX_DUTY);
            if left.unsigned_abs() > max || right.unsigned_abs() > max {
                return Err(ProtocolError::OutOfRange);
            }
            DriveCommand::OpenLoop { left, right }
        }
        ("k", [p, i, d]) => DriveCommand::SetPid {
            kp: number(p)?,
            ki: number(i)?,
            kd: number(d)?,
        },
        ("q", []) => DriveCommand::Pose,
        ("m", []) => DriveCommand::MotorStatus,
        ("r", []) => DriveCommand::ResetPose,
        ("p", []) => DriveCommand::GetPid,
        ("s", []) => DriveCommand::Stop,
        _ => return Err(ProtocolError::Invalid),
    };
    Ok(Some(command))
}

fn number<T: std::str::FromStr>(word: &str) -> Result<T, ProtocolError> {
    word.parse().map_err(|_| ProtocolError::Invalid)
}

/// Render a reply for the chosen output format.
pub fn format_reply(
    reply: &DriveReply,
    format: ReplyFormat,
) -> String {
    if format == ReplyFormat::Json {
        // Replies are plain data; serialization cannot fail.
        return serde_json::to_string(reply).unwrap_or_default();
    }
    match reply {
        DriveReply::Ack => "OK".to_string(),
        DriveReply::Pose(pose) => {
            format!("x {:.2} y {:.2} theta {:.2}", pose.x, pose.y, pose.heading)
        }
        DriveReply::MotorStatus(status) => {
            format!("{}\n{}", motion_line(&status.left), motion_line(&status.right))
        }
        DriveReply::Pid(gains) => format!("kp {} ki {} kd {}", gains.kp, gains.ki, gains.kd),
    }
}

/// `rpm angular_velocity linear_velocity distance angle`, left line first.
fn motion_line(motion: &MotionEstimate) -> String {
    format!(
        "{:.2} {:.2} {:.3} {:.3} {:.2}",
        motion.rpm,
        motion.angular_velocity,
        motion.linear_velocity,
        motion.cumulative_distance,
        motion.angular_position
    )
}

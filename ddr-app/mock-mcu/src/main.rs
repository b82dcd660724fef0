mod protocol;
mod sim;

use clap::Parser;
use core::cell::Cell;
use ddr_core::mk_static;
use ddr_core::utils::controllers::{TickCounter, WheelUnit};
use ddr_core::utils::{DRIVE_CHANNEL, DriveConfig, DriveController, EmbassyClock, Scheduler};
use embassy_executor::Executor;
use embassy_time::{Duration, Instant, Ticker};
use protocol::ReplyFormat;
use sim::{MotorLines, PlantConfig, SimBridge, SimWheel};
use static_cell::StaticCell;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing::{error, info, trace, warn};

type SimDrive = DriveController<'static, SimBridge, SimBridge, EmbassyClock>;

#[derive(Parser)]
#[clap(version = "1.0")]
struct Opts
{
    /// JSON drive configuration; built-in defaults when omitted
    #[clap(long)]
    config: Option<PathBuf>,
    /// main-loop poll period (ms)
    #[clap(long, default_value_t = 5)]
    poll_ms: u64,
    /// simulated encoder rate at full duty (ticks/s)
    #[clap(long, default_value_t = 1200.0)]
    no_load_ticks: f32,
    /// simulated motor time constant (ms)
    #[clap(long, default_value_t = 80)]
    time_constant_ms: u64,
    /// reply format on stdout
    #[clap(long, value_enum, default_value_t = ReplyFormat::Text)]
    format: ReplyFormat,
}

fn load_config(path: Option<&Path>) -> Result<DriveConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?),
        None => Ok(DriveConfig::default()),
    }
}

/// Main loop: serve queued commands, advance the plant, run the drive.
#[embassy_executor::task]
async fn control_task(
    mut drive: SimDrive,
    mut plant: [SimWheel; 2],
    format: ReplyFormat,
    period: Duration,
) -> ! {
    let mut ticker = Ticker::every(period);
    let mut last = Instant::now();
    loop {
        while let Ok(command) = DRIVE_CHANNEL.try_receive() {
            let reply = drive.execute_command(command);
            println!("{}", protocol::format_reply(&reply, format));
        }

        let now = Instant::now();
        for wheel in plant.iter_mut() {
            wheel.step(now.saturating_duration_since(last));
        }
        last = now;
        trace!(left = plant[0].speed(), right = plant[1].speed(), "plant speed");

        if let Err(e) = drive.run() {
            error!("actuation failed: {:?}", e);
        }
        ticker.next().await;
    }
}

/// Feed stdin lines into the drive channel until stdin closes.
fn read_commands() {
    for line in std::io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        match protocol::parse_line(&line) {
            Ok(Some(command)) => {
                if DRIVE_CHANNEL.try_send(command).is_err() {
                    warn!("command queue full, dropping {:?}", command);
                }
            }
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }
    info!("stdin closed");
}

static EXECUTOR: StaticCell<Executor> = StaticCell::new();

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let opts: Opts = Opts::parse();
    let config = match load_config(opts.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("cannot load configuration: {e}");
            std::process::exit(2);
        }
    };
    info!(?config, "drive configuration");

    let plant_config = PlantConfig {
        no_load_ticks_per_s: opts.no_load_ticks,
        time_constant: Duration::from_millis(opts.time_constant_ms),
    };
    let geometry = config.wheel_geometry();

    // Left side
    let left_lines: &'static MotorLines = mk_static!(MotorLines, MotorLines::default());
    let left_b: &'static Cell<bool> = mk_static!(Cell<bool>, Cell::new(false));
    let left_ticks: &'static TickCounter =
        mk_static!(TickCounter, TickCounter::new(config.left.invert_encoder));
    let left = WheelUnit::closed_loop(
        left_lines.bridge(),
        EmbassyClock,
        geometry,
        left_ticks,
        config.left.reverse,
    )
    .with_pid(config.pid_gains, config.output_limits);

    // Right side
    let right_lines: &'static MotorLines = mk_static!(MotorLines, MotorLines::default());
    let right_b: &'static Cell<bool> = mk_static!(Cell<bool>, Cell::new(false));
    let right_ticks: &'static TickCounter =
        mk_static!(TickCounter, TickCounter::new(config.right.invert_encoder));
    let right = WheelUnit::closed_loop(
        right_lines.bridge(),
        EmbassyClock,
        geometry,
        right_ticks,
        config.right.reverse,
    )
    .with_pid(config.pid_gains, config.output_limits);

    let drive = DriveController::new(
        left,
        right,
        config.kinematics(),
        Scheduler::from_hz(EmbassyClock, config.control_loop_hz),
    );
    let plant = [
        SimWheel::new(left_lines, left_b, left_ticks, plant_config),
        SimWheel::new(right_lines, right_b, right_ticks, plant_config),
    ];

    std::thread::spawn(read_commands);

    info!("Drive running at {} Hz, reading commands from stdin", config.control_loop_hz);
    let period = Duration::from_millis(opts.poll_ms.max(1));
    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner
            .spawn(control_task(drive, plant, opts.format, period))
            .unwrap();
    });
}

//! # Cadence Robot
//!
//! Demo control loop over simulated hardware.
//!
//! Loads the robot parameter TOML (or built-in defaults), builds the
//! subsystems over [`cadence_robot::hardware::SimRig`], and runs a short
//! scripted match: close the intake, raise the elevator to a preset, tilt
//! the wrist for scoring, then attempt a launch (end-game gated unless
//! `--end-game-time` lowers the gate). Time is simulated at the configured
//! period; nothing here sleeps.

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use cadence_core::event::Event;
use cadence_robot::config::RobotParams;
use cadence_robot::hardware::SimRig;
use cadence_robot::robot::Robot;

/// Cadence robot — event-driven actuator control demo
#[derive(Parser, Debug)]
#[command(name = "cadence_robot")]
#[command(version)]
#[command(about = "Simulated control loop for the cadence actuator framework")]
struct Args {
    /// Path to the robot parameter TOML. Built-in defaults when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of control cycles to run.
    #[arg(long, default_value_t = 600)]
    cycles: u64,

    /// Control period in milliseconds.
    #[arg(long, default_value_t = 20)]
    period_ms: u64,

    /// Override the end-game gate [s] (0 unlocks the launch demo).
    #[arg(long)]
    end_game_time: Option<f64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format.
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    setup_tracing(&args);

    info!("cadence robot v{} starting", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&args) {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("cadence robot done");
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let mut params = match &args.config {
        Some(path) => {
            info!("loading parameters from {}", path.display());
            RobotParams::load(path)?
        }
        None => RobotParams::default(),
    };
    if let Some(t) = args.end_game_time {
        params.end_game_time = t;
        params.validate()?;
    }
    info!(
        robot = %params.robot_name,
        end_game_time = params.end_game_time,
        "parameters OK"
    );

    let rig = SimRig::new();
    let mut robot = Robot::new(&params, rig.hardware())?;

    let period = args.period_ms as f64 / 1000.0;
    let grabbed = Event::new("demo.grab");
    let raised = Event::new("demo.raise");
    let launched = Event::new("demo.launch");
    let mut launch_attempted = false;

    for cycle in 0..args.cycles {
        let now = cycle as f64 * period;

        match cycle {
            5 => {
                info!("closing intake");
                robot.intake.close_claw(Some(grabbed.clone()));
            }
            50 => {
                info!("raising elevator to preset 0");
                robot.elevator.move_to_preset(0, Some(raised.clone()));
            }
            200 => {
                info!("tilting wrist to board");
                robot.wrist.board(None);
            }
            300 => {
                launch_attempted = true;
                match robot.launcher.launch(Some(launched.clone())) {
                    Ok(()) => info!("launch accepted"),
                    Err(e) => warn!("launch rejected: {e}"),
                }
            }
            _ => {}
        }

        robot.run_cycle(now);
        rig.step(period);

        if cycle % 100 == 0 {
            let s = robot.status();
            info!(
                elapsed = %format_args!("{:.1}", s.elapsed),
                height = %format_args!("{:.1}", s.elevator.height),
                flywheel_rpm = %format_args!("{:.0}", s.launcher.flywheel_rpm),
                launcher_state = ?s.launcher.state,
                "status"
            );
        }
    }

    robot.cancel_all();

    info!(
        grabbed = grabbed.is_signaled(),
        raised = raised.is_signaled(),
        launched = launch_attempted && launched.is_signaled(),
        "script results"
    );
    Ok(())
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

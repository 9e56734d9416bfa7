//! Robot aggregate: subsystem construction, the per-cycle phase driver,
//! and the telemetry snapshot.
//!
//! The robot owns the scheduler and the match clock. An external pacer
//! calls [`Robot::run_cycle`] at the fixed control period with a
//! monotonic timestamp; the robot derives elapsed match time and the
//! cycle delta from it and runs the three scheduler phases in order.

use cadence_core::actuator::ActuatorPort;
use cadence_core::cycle::CycleContext;
use cadence_core::sched::{TaskPhase, TaskScheduler};
use cadence_core::servo::ServoPort;

use crate::clock::MatchClock;
use crate::config::{ConfigError, RobotParams};
use crate::subsystems::elevator::ElevatorStatus;
use crate::subsystems::hang::HangStatus;
use crate::subsystems::intake::IntakeStatus;
use crate::subsystems::launcher::LauncherStatus;
use crate::subsystems::wrist::WristStatus;
use crate::subsystems::{Elevator, Hang, Intake, Launcher, Wrist};

/// Hardware ports for every actuator, supplied by the hardware
/// abstraction (or the simulation).
pub struct RobotHardware {
    pub flywheel_motor: Box<dyn ActuatorPort>,
    pub trigger_servo: Box<dyn ServoPort>,
    pub elevator_motor: Box<dyn ActuatorPort>,
    pub hang_motor: Box<dyn ActuatorPort>,
    pub wrist_tilt_servo: Box<dyn ServoPort>,
    pub wrist_roll_servo: Box<dyn ServoPort>,
    pub intake_left_servo: Box<dyn ServoPort>,
    pub intake_right_servo: Box<dyn ServoPort>,
}

/// Full telemetry snapshot, taken between cycles.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotStatus {
    pub elapsed: f64,
    pub launcher: LauncherStatus,
    pub elevator: ElevatorStatus,
    pub hang: HangStatus,
    pub wrist: WristStatus,
    pub intake: IntakeStatus,
}

pub struct Robot {
    sched: TaskScheduler,
    clock: MatchClock,
    /// First `run_cycle` timestamp; elapsed match time is measured from it.
    start: Option<f64>,
    last: Option<CycleContext>,

    pub launcher: Launcher,
    pub elevator: Elevator,
    pub hang: Hang,
    pub wrist: Wrist,
    pub intake: Intake,
}

impl Robot {
    /// Build all subsystems over `hardware`. `params` should already have
    /// passed validation.
    pub fn new(params: &RobotParams, hardware: RobotHardware) -> Result<Self, ConfigError> {
        let sched = TaskScheduler::new();
        let clock = MatchClock::new();

        let launcher = Launcher::new(
            &params.launcher,
            params.end_game_time,
            &sched,
            &clock,
            hardware.flywheel_motor,
            hardware.trigger_servo,
        );
        let elevator = Elevator::new(&params.elevator, &sched, hardware.elevator_motor)?;
        let hang = Hang::new(
            &params.hang,
            params.end_game_time,
            &sched,
            &clock,
            hardware.hang_motor,
        );
        let wrist = Wrist::new(
            &params.wrist,
            &sched,
            hardware.wrist_tilt_servo,
            hardware.wrist_roll_servo,
        );
        let intake = Intake::new(
            &params.intake,
            &sched,
            hardware.intake_left_servo,
            hardware.intake_right_servo,
        );

        Ok(Self {
            sched,
            clock,
            start: None,
            last: None,
            launcher,
            elevator,
            hang,
            wrist,
            intake,
        })
    }

    /// Run one control cycle at monotonic time `now` seconds.
    ///
    /// The first call starts the match clock; the cycle delta comes from
    /// consecutive timestamps (zero on the first cycle). Phase order is
    /// PrePeriodic, PostPeriodic, Output.
    pub fn run_cycle(&mut self, now: f64) {
        let start = *self.start.get_or_insert(now);
        self.clock.set(now - start);

        let ctx = match self.last {
            Some(prev) => prev.next(now),
            None => CycleContext::new(now, 0.0),
        };
        self.last = Some(ctx);

        self.sched.run_phase(TaskPhase::PrePeriodic, &ctx);
        self.sched.run_phase(TaskPhase::PostPeriodic, &ctx);
        self.sched.run_phase(TaskPhase::Output, &ctx);
    }

    /// Abort everything in flight: all actuators to a safe state, all
    /// pending events canceled. Safe to call at any time.
    pub fn cancel_all(&self) {
        self.launcher.cancel();
        self.elevator.cancel();
        self.hang.cancel();
        self.wrist.cancel();
        self.intake.cancel();
    }

    /// Elapsed match time [s]; zero before the first cycle.
    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    /// Shared scheduler handle (external collaborators registering their
    /// own periodic tasks).
    pub fn scheduler(&self) -> &TaskScheduler {
        &self.sched
    }

    pub fn status(&self) -> RobotStatus {
        RobotStatus {
            elapsed: self.clock.elapsed(),
            launcher: self.launcher.status(),
            elevator: self.elevator.status(),
            hang: self.hang.status(),
            wrist: self.wrist.status(),
            intake: self.intake.status(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

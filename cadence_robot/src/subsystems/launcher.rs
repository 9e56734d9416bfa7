//! Projectile launcher: flywheel spin-up plus trigger servo, scripted as a
//! three-state machine.
//!
//! `launch` is end-game gated. The script: command the flywheel to launch
//! speed and wait for the velocity-reached event, fire the trigger servo for
//! its travel time and wait for the timed event, then return the trigger to
//! rest, stop the flywheel, and resolve the caller's event. The state-machine
//! task registers on `launch` and unregisters itself at `Done` (or on
//! cancellation).

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use cadence_core::actuator::{ActuatorController, ActuatorFault, ActuatorPort};
use cadence_core::cycle::CycleContext;
use cadence_core::event::Event;
use cadence_core::sched::{TaskError, TaskHandle, TaskPhase, TaskScheduler};
use cadence_core::servo::{ServoController, ServoParams, ServoPort};
use cadence_core::state_machine::{SmPoll, StateMachine};

use crate::clock::MatchClock;
use crate::config::LauncherParams;
use crate::subsystems::CommandError;

/// Launch script states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchState {
    /// Spin the flywheel up to launch speed.
    Start,
    /// Fire the trigger servo.
    Launch,
    /// Return to rest and resolve the caller's event.
    Done,
}

struct LauncherInner {
    params: LauncherParams,
    end_game_time: f64,
    flywheel: ActuatorController,
    trigger: ServoController,
    sm: StateMachine<LaunchState>,
    fsm_task: Option<TaskHandle>,
    /// Caller's completion event for the in-flight launch.
    pending: Option<Event>,
}

/// Status snapshot for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LauncherStatus {
    pub state: Option<LaunchState>,
    pub flywheel_rpm: f64,
    pub faults: ActuatorFault,
}

/// Clonable handle to the launcher subsystem.
#[derive(Clone)]
pub struct Launcher {
    sched: TaskScheduler,
    clock: MatchClock,
    inner: Rc<RefCell<LauncherInner>>,
}

impl Launcher {
    pub fn new(
        params: &LauncherParams,
        end_game_time: f64,
        sched: &TaskScheduler,
        clock: &MatchClock,
        motor: Box<dyn ActuatorPort>,
        servo: Box<dyn ServoPort>,
    ) -> Self {
        let flywheel =
            ActuatorController::new("launcher.flywheel", params.flywheel_actuator(), motor);
        let mut trigger = ServoController::new(
            "launcher.trigger",
            ServoParams {
                inverted: params.servo_inverted,
            },
            servo,
        );
        trigger.set_position(params.servo_rest_pos);

        let launcher = Self {
            sched: sched.clone(),
            clock: clock.clone(),
            inner: Rc::new(RefCell::new(LauncherInner {
                params: params.clone(),
                end_game_time,
                flywheel,
                trigger,
                sm: StateMachine::new("launcher"),
                fsm_task: None,
                pending: None,
            })),
        };

        let inner = launcher.inner.clone();
        sched.register_task("launcher.output", TaskPhase::Output, move |ctx| {
            let mut inner = inner.borrow_mut();
            inner.flywheel.update(ctx);
            inner.trigger.update(ctx);
            Ok(())
        });
        launcher
    }

    /// Start the launch script, resolving `completion` at `Done`.
    ///
    /// Rejected (event canceled, no effect) before the end-game period or
    /// while a launch is already in flight.
    pub fn launch(&self, completion: Option<Event>) -> Result<(), CommandError> {
        let mut inner = self.inner.borrow_mut();
        if !self.clock.is_end_game(inner.end_game_time) {
            if let Some(ev) = completion {
                ev.cancel();
            }
            return Err(CommandError::NotEndGame {
                elapsed: self.clock.elapsed(),
                required: inner.end_game_time,
            });
        }
        if inner.sm.is_enabled() {
            if let Some(ev) = completion {
                ev.cancel();
            }
            return Err(CommandError::Busy("launcher"));
        }

        info!(rpm = inner.params.launch_rpm, "launch started");
        inner.pending = completion;
        inner.sm.start(LaunchState::Start);

        let this = self.clone();
        let handle = self
            .sched
            .register_task("launcher.fsm", TaskPhase::PostPeriodic, move |ctx| {
                this.run_fsm(ctx)
            });
        inner.fsm_task = Some(handle);
        Ok(())
    }

    /// Abort any in-flight launch: trigger back to rest, flywheel stopped,
    /// the caller's event canceled. Safe when idle.
    pub fn cancel(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.sm.stop();
        let rest = inner.params.servo_rest_pos;
        inner.trigger.cancel();
        inner.trigger.set_position(rest);
        inner.flywheel.stop();
        self.finish(&mut inner, true);
    }

    fn run_fsm(&self, _ctx: &CycleContext) -> Result<(), TaskError> {
        let mut inner = self.inner.borrow_mut();
        match inner.sm.poll() {
            SmPoll::NotReady => Ok(()),
            SmPoll::Canceled => {
                // A wait event was canceled from outside (override/stall).
                let rest = inner.params.servo_rest_pos;
                inner.trigger.cancel();
                inner.trigger.set_position(rest);
                inner.flywheel.stop();
                self.finish(&mut inner, true);
                Ok(())
            }
            SmPoll::Ready(LaunchState::Start) => {
                let target = inner.params.launch_rpm / 60.0;
                let ev = Event::new("launcher.spinup");
                inner.flywheel.set_velocity_target(target, Some(ev.clone()));
                inner.sm.wait_for_single_event(&ev, LaunchState::Launch);
                Ok(())
            }
            SmPoll::Ready(LaunchState::Launch) => {
                let fire = inner.params.servo_fire_pos;
                let travel = inner.params.trigger_time;
                let ev = Event::new("launcher.trigger");
                inner.trigger.set_position_for(fire, travel, Some(ev.clone()));
                inner.sm.wait_for_single_event(&ev, LaunchState::Done);
                Ok(())
            }
            SmPoll::Ready(LaunchState::Done) => {
                let rest = inner.params.servo_rest_pos;
                inner.trigger.set_position(rest);
                inner.flywheel.stop();
                inner.sm.stop();
                info!("launch complete");
                self.finish(&mut inner, false);
                Ok(())
            }
        }
    }

    /// Retire the script task and resolve the caller's event exactly once.
    fn finish(&self, inner: &mut LauncherInner, canceled: bool) {
        if let Some(handle) = inner.fsm_task.take() {
            self.sched.unregister_task(handle);
        }
        if let Some(ev) = inner.pending.take() {
            if canceled {
                ev.cancel();
            } else {
                ev.signal();
            }
        }
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Whether a launch script is in flight.
    pub fn is_active(&self) -> bool {
        self.inner.borrow().sm.is_enabled()
    }

    /// Current script state, if active.
    pub fn state(&self) -> Option<LaunchState> {
        self.inner.borrow().sm.current_state()
    }

    /// Measured flywheel speed [RPM].
    pub fn flywheel_rpm(&self) -> f64 {
        self.inner.borrow().flywheel.velocity() * 60.0
    }

    pub fn status(&self) -> LauncherStatus {
        let inner = self.inner.borrow();
        LauncherStatus {
            state: inner.sm.current_state(),
            flywheel_rpm: inner.flywheel.velocity() * 60.0,
            faults: inner.flywheel.faults(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{SimMotor, SimServo};

    fn launcher(end_game_time: f64) -> (Launcher, TaskScheduler, MatchClock, SimServo) {
        let sched = TaskScheduler::new();
        let clock = MatchClock::new();
        let servo = SimServo::new();
        let motor = SimMotor::new(2800.0, 0.2);
        let launcher = Launcher::new(
            &LauncherParams::default(),
            end_game_time,
            &sched,
            &clock,
            Box::new(motor),
            Box::new(servo.clone()),
        );
        (launcher, sched, clock, servo)
    }

    #[test]
    fn launch_rejected_before_end_game() {
        let (launcher, _sched, clock, _servo) = launcher(90.0);
        clock.set(30.0);
        let ev = Event::new("done");
        let err = launcher.launch(Some(ev.clone())).unwrap_err();
        assert!(matches!(err, CommandError::NotEndGame { .. }));
        assert!(ev.is_canceled());
        assert!(!launcher.is_active());
    }

    #[test]
    fn second_launch_while_active_is_rejected() {
        let (launcher, _sched, clock, _servo) = launcher(90.0);
        clock.set(95.0);
        assert!(launcher.launch(None).is_ok());
        let ev = Event::new("second");
        assert_eq!(
            launcher.launch(Some(ev.clone())),
            Err(CommandError::Busy("launcher"))
        );
        assert!(ev.is_canceled());
    }

    #[test]
    fn cancel_when_idle_is_safe() {
        let (launcher, sched, _clock, _servo) = launcher(90.0);
        launcher.cancel();
        assert!(!launcher.is_active());
        // Only the permanent output task remains registered.
        assert_eq!(sched.task_count(), 1);
    }

    #[test]
    fn cancel_resolves_callers_event() {
        let (launcher, sched, clock, servo) = launcher(0.0);
        clock.set(1.0);
        let ev = Event::new("done");
        launcher.launch(Some(ev.clone())).unwrap();
        assert_eq!(sched.task_count(), 2);

        launcher.cancel();
        assert!(ev.is_canceled());
        assert!(!launcher.is_active());
        assert_eq!(sched.task_count(), 1);
        // Trigger returned to rest.
        let rest = LauncherParams::default().servo_rest_pos;
        assert!((servo.physical() - rest).abs() < 1e-12);
    }

    #[test]
    fn trigger_starts_at_rest() {
        let (_launcher, _sched, _clock, servo) = launcher(90.0);
        let rest = LauncherParams::default().servo_rest_pos;
        assert!((servo.physical() - rest).abs() < 1e-12);
    }
}

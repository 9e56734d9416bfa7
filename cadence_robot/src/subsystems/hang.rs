//! Hanging arm: end-game gated angle moves plus manual power override.
//!
//! Like the elevator, every action is a single closed-loop move, so no
//! state machine is involved. `deploy` and `hang` are restricted to the
//! end-game period; the manual power override is not, so the arm can be
//! repositioned during setup.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::info;

use cadence_core::actuator::{ActuatorController, ActuatorFault, ActuatorPort};
use cadence_core::event::Event;
use cadence_core::sched::{TaskPhase, TaskScheduler};

use crate::clock::MatchClock;
use crate::config::HangParams;
use crate::subsystems::CommandError;

/// Status snapshot for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HangStatus {
    pub angle: f64,
    pub target: Option<f64>,
    pub power: f64,
    pub faults: ActuatorFault,
}

struct HangInner {
    arm: ActuatorController,
    setup_angle: f64,
    hanging_angle: f64,
    end_game_time: f64,
}

/// Clonable handle to the hang subsystem.
#[derive(Clone)]
pub struct Hang {
    clock: MatchClock,
    inner: Rc<RefCell<HangInner>>,
}

impl Hang {
    pub fn new(
        params: &HangParams,
        end_game_time: f64,
        sched: &TaskScheduler,
        clock: &MatchClock,
        motor: Box<dyn ActuatorPort>,
    ) -> Self {
        let comp_power = params.gravity_comp_power;
        let threshold = params.gravity_comp_threshold;
        let arm = ActuatorController::new("hang", params.actuator(), motor)
            .with_compensation(move |pos| if pos >= threshold { comp_power } else { 0.0 });

        let inner = Rc::new(RefCell::new(HangInner {
            arm,
            setup_angle: params.setup_angle,
            hanging_angle: params.hanging_angle,
            end_game_time,
        }));
        let task_inner = inner.clone();
        sched.register_task("hang.output", TaskPhase::Output, move |ctx| {
            task_inner.borrow_mut().arm.update(ctx);
            Ok(())
        });
        Self {
            clock: clock.clone(),
            inner,
        }
    }

    fn gated_move(&self, angle: f64, completion: Option<Event>) -> Result<(), CommandError> {
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
        inner.arm.set_position_target(angle, completion);
        Ok(())
    }

    /// Swing the arm to the deployment angle. End-game only.
    pub fn deploy(&self, completion: Option<Event>) -> Result<(), CommandError> {
        let angle = self.inner.borrow().setup_angle;
        info!(angle, "hang deploy");
        self.gated_move(angle, completion)
    }

    /// Pull the arm to the hanging angle. End-game only.
    pub fn hang(&self, completion: Option<Event>) -> Result<(), CommandError> {
        let angle = self.inner.borrow().hanging_angle;
        info!(angle, "hang engage");
        self.gated_move(angle, completion)
    }

    /// Closed-loop move to an arbitrary angle; not end-game gated (used
    /// for setup positioning, with the soft limits still enforced).
    pub fn set_angle(&self, angle: f64, completion: Option<Event>) {
        self.inner.borrow_mut().arm.set_position_target(angle, completion);
    }

    /// Open-loop override for setup positioning; not end-game gated.
    pub fn set_power(&self, power: f64) {
        self.inner.borrow_mut().arm.set_power(power);
    }

    /// Stop and cancel any in-flight move. Safe when idle.
    pub fn cancel(&self) {
        self.inner.borrow_mut().arm.stop();
    }

    pub fn reset_stall(&self) {
        self.inner.borrow_mut().arm.reset_stall();
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Arm angle [deg].
    pub fn angle(&self) -> f64 {
        self.inner.borrow().arm.position()
    }

    pub fn is_stalled(&self) -> bool {
        self.inner.borrow().arm.is_stalled()
    }

    pub fn status(&self) -> HangStatus {
        let inner = self.inner.borrow();
        HangStatus {
            angle: inner.arm.position(),
            target: inner.arm.target(),
            power: inner.arm.power(),
            faults: inner.arm.faults(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

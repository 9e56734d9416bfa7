//! Linear elevator: single-step closed-loop moves with presets, stall
//! protection, soft height limits, and step gravity compensation.
//!
//! Every verb is a thin call into the actuator controller; there is no
//! state machine because no elevator action has more than one step.

use std::cell::RefCell;
use std::rc::Rc;

use cadence_core::actuator::{ActuatorController, ActuatorFault, ActuatorPort};
use cadence_core::event::Event;
use cadence_core::sched::{TaskPhase, TaskScheduler};

use crate::config::{ConfigError, ElevatorParams};

/// Status snapshot for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ElevatorStatus {
    pub height: f64,
    pub target: Option<f64>,
    pub power: f64,
    pub faults: ActuatorFault,
}

/// Clonable handle to the elevator subsystem.
#[derive(Clone)]
pub struct Elevator {
    inner: Rc<RefCell<ActuatorController>>,
}

impl Elevator {
    pub fn new(
        params: &ElevatorParams,
        sched: &TaskScheduler,
        motor: Box<dyn ActuatorPort>,
    ) -> Result<Self, ConfigError> {
        let actuator = params.actuator()?;

        let comp_power = params.gravity_comp_power;
        let threshold = params.gravity_comp_threshold;
        let controller = ActuatorController::new("elevator", actuator, motor)
            // Step compensation: no holding power while resting on the
            // floor stop, the configured constant once above it.
            .with_compensation(move |pos| if pos >= threshold { comp_power } else { 0.0 });

        let inner = Rc::new(RefCell::new(controller));
        let task_inner = inner.clone();
        sched.register_task("elevator.output", TaskPhase::Output, move |ctx| {
            task_inner.borrow_mut().update(ctx);
            Ok(())
        });
        Ok(Self { inner })
    }

    /// Closed-loop move to `height` inches; `completion` signals on arrival.
    pub fn set_height(&self, height: f64, completion: Option<Event>) {
        self.inner.borrow_mut().set_position_target(height, completion);
    }

    /// Open-loop joystick control. Cancels any in-flight move.
    pub fn set_power(&self, power: f64) {
        self.inner.borrow_mut().set_power(power);
    }

    pub fn move_to_preset(&self, index: usize, completion: Option<Event>) {
        self.inner.borrow_mut().move_to_preset(index, completion);
    }

    pub fn preset_up(&self, completion: Option<Event>) {
        self.inner.borrow_mut().preset_up(completion);
    }

    pub fn preset_down(&self, completion: Option<Event>) {
        self.inner.borrow_mut().preset_down(completion);
    }

    /// Stop and cancel any in-flight move. Safe when idle.
    pub fn cancel(&self) {
        self.inner.borrow_mut().stop();
    }

    /// Clear a stall fault after manual recovery.
    pub fn reset_stall(&self) {
        self.inner.borrow_mut().reset_stall();
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Carriage height [in].
    pub fn height(&self) -> f64 {
        self.inner.borrow().position()
    }

    pub fn is_stalled(&self) -> bool {
        self.inner.borrow().is_stalled()
    }

    pub fn nearest_preset(&self) -> Option<usize> {
        self.inner.borrow().nearest_preset()
    }

    pub fn status(&self) -> ElevatorStatus {
        let inner = self.inner.borrow();
        ElevatorStatus {
            height: inner.position(),
            target: inner.target(),
            power: inner.power(),
            faults: inner.faults(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

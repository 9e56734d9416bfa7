//! Two-axis wrist: a tilt servo (grounded / board / board-inverted) and a
//! roll servo (flat / inverted), all advisory timed moves.

use std::cell::RefCell;
use std::rc::Rc;

use cadence_core::event::Event;
use cadence_core::sched::{TaskPhase, TaskScheduler};
use cadence_core::servo::{ServoController, ServoParams, ServoPort};

use crate::config::WristParams;

/// Status snapshot for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WristStatus {
    pub tilt: f64,
    pub roll: f64,
    pub moving: bool,
}

struct WristInner {
    params: WristParams,
    tilt: ServoController,
    roll: ServoController,
}

/// Clonable handle to the wrist subsystem.
#[derive(Clone)]
pub struct Wrist {
    inner: Rc<RefCell<WristInner>>,
}

impl Wrist {
    pub fn new(
        params: &WristParams,
        sched: &TaskScheduler,
        tilt_servo: Box<dyn ServoPort>,
        roll_servo: Box<dyn ServoPort>,
    ) -> Self {
        let tilt = ServoController::new(
            "wrist.tilt",
            ServoParams {
                inverted: params.up_down_inverted,
            },
            tilt_servo,
        );
        let roll = ServoController::new(
            "wrist.roll",
            ServoParams {
                inverted: params.left_right_inverted,
            },
            roll_servo,
        );

        let inner = Rc::new(RefCell::new(WristInner {
            params: params.clone(),
            tilt,
            roll,
        }));
        let task_inner = inner.clone();
        sched.register_task("wrist.output", TaskPhase::Output, move |ctx| {
            let mut inner = task_inner.borrow_mut();
            inner.tilt.update(ctx);
            inner.roll.update(ctx);
            Ok(())
        });
        Self { inner }
    }

    fn tilt_to(&self, position: f64, completion: Option<Event>) {
        let mut inner = self.inner.borrow_mut();
        let travel = inner.params.servo_time;
        inner.tilt.set_position_for(position, travel, completion);
    }

    fn roll_to(&self, position: f64, completion: Option<Event>) {
        let mut inner = self.inner.borrow_mut();
        let travel = inner.params.servo_time;
        inner.roll.set_position_for(position, travel, completion);
    }

    /// Tilt down for floor pickup.
    pub fn ground(&self, completion: Option<Event>) {
        let pos = self.inner.borrow().params.grounded_pos;
        self.tilt_to(pos, completion);
    }

    /// Tilt up for board scoring.
    pub fn board(&self, completion: Option<Event>) {
        let pos = self.inner.borrow().params.board_pos;
        self.tilt_to(pos, completion);
    }

    /// Tilt for board scoring with the end effector rolled over.
    pub fn board_inverted(&self, completion: Option<Event>) {
        let pos = self.inner.borrow().params.board_inverted_pos;
        self.tilt_to(pos, completion);
    }

    /// Roll to the normal orientation.
    pub fn flat(&self, completion: Option<Event>) {
        let pos = self.inner.borrow().params.flat_pos;
        self.roll_to(pos, completion);
    }

    /// Roll the end effector over.
    pub fn inverted(&self, completion: Option<Event>) {
        let pos = self.inner.borrow().params.invert_pos;
        self.roll_to(pos, completion);
    }

    /// Cancel pending timed moves on both axes. Servos hold position.
    pub fn cancel(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.tilt.cancel();
        inner.roll.cancel();
    }

    pub fn status(&self) -> WristStatus {
        let inner = self.inner.borrow();
        WristStatus {
            tilt: inner.tilt.position(),
            roll: inner.roll.position(),
            moving: inner.tilt.is_moving() || inner.roll.is_moving(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

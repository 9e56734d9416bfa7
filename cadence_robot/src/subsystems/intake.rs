//! Claw intake: two mirrored servos opened and closed together or per side.
//!
//! For two-sided verbs the caller's completion event rides on the left
//! claw's timed motion; both sides share one travel time, so signaling on
//! one side is enough.

use std::cell::RefCell;
use std::rc::Rc;

use cadence_core::event::Event;
use cadence_core::sched::{TaskPhase, TaskScheduler};
use cadence_core::servo::{ServoController, ServoParams, ServoPort};

use crate::config::IntakeParams;

/// Claw side selector for the per-side verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClawSide {
    Left,
    Right,
}

/// Status snapshot for telemetry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntakeStatus {
    pub left: f64,
    pub right: f64,
    pub moving: bool,
}

struct IntakeInner {
    params: IntakeParams,
    left: ServoController,
    right: ServoController,
}

/// Clonable handle to the intake subsystem.
#[derive(Clone)]
pub struct Intake {
    inner: Rc<RefCell<IntakeInner>>,
}

impl Intake {
    pub fn new(
        params: &IntakeParams,
        sched: &TaskScheduler,
        left_servo: Box<dyn ServoPort>,
        right_servo: Box<dyn ServoPort>,
    ) -> Self {
        let left = ServoController::new(
            "intake.left",
            ServoParams {
                inverted: params.left_inverted,
            },
            left_servo,
        );
        let right = ServoController::new(
            "intake.right",
            ServoParams {
                inverted: params.right_inverted,
            },
            right_servo,
        );

        let inner = Rc::new(RefCell::new(IntakeInner {
            params: params.clone(),
            left,
            right,
        }));
        let task_inner = inner.clone();
        sched.register_task("intake.output", TaskPhase::Output, move |ctx| {
            let mut inner = task_inner.borrow_mut();
            inner.left.update(ctx);
            inner.right.update(ctx);
            Ok(())
        });
        Self { inner }
    }

    /// Open both claws; `completion` signals after the travel time.
    pub fn open_claw(&self, completion: Option<Event>) {
        let mut inner = self.inner.borrow_mut();
        let p = inner.params.clone();
        inner.left.set_position_for(p.left_open_pos, p.servo_time, completion);
        inner.right.set_position(p.right_open_pos);
    }

    /// Close both claws; `completion` signals after the travel time.
    pub fn close_claw(&self, completion: Option<Event>) {
        let mut inner = self.inner.borrow_mut();
        let p = inner.params.clone();
        inner.left.set_position_for(p.left_closed_pos, p.servo_time, completion);
        inner.right.set_position(p.right_closed_pos);
    }

    /// Open one claw only.
    pub fn open_side(&self, side: ClawSide, completion: Option<Event>) {
        let mut inner = self.inner.borrow_mut();
        let p = inner.params.clone();
        match side {
            ClawSide::Left => inner.left.set_position_for(p.left_open_pos, p.servo_time, completion),
            ClawSide::Right => {
                inner.right.set_position_for(p.right_open_pos, p.servo_time, completion)
            }
        }
    }

    /// Close one claw only.
    pub fn close_side(&self, side: ClawSide, completion: Option<Event>) {
        let mut inner = self.inner.borrow_mut();
        let p = inner.params.clone();
        match side {
            ClawSide::Left => {
                inner.left.set_position_for(p.left_closed_pos, p.servo_time, completion)
            }
            ClawSide::Right => {
                inner.right.set_position_for(p.right_closed_pos, p.servo_time, completion)
            }
        }
    }

    /// Cancel pending timed motions on both claws. Servos hold position.
    pub fn cancel(&self) {
        let mut inner = self.inner.borrow_mut();
        inner.left.cancel();
        inner.right.cancel();
    }

    pub fn status(&self) -> IntakeStatus {
        let inner = self.inner.borrow();
        IntakeStatus {
            left: inner.left.position(),
            right: inner.right.position(),
            moving: inner.left.is_moving() || inner.right.is_moving(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::SimServo;
    use cadence_core::cycle::CycleContext;

    const DT: f64 = 0.02;

    fn intake() -> (Intake, TaskScheduler, SimServo, SimServo) {
        let sched = TaskScheduler::new();
        let left = SimServo::new();
        let right = SimServo::new();
        let intake = Intake::new(
            &IntakeParams::default(),
            &sched,
            Box::new(left.clone()),
            Box::new(right.clone()),
        );
        (intake, sched, left, right)
    }

    fn run(sched: &TaskScheduler, n: u64) {
        let mut ctx = CycleContext::new(0.0, DT);
        for _ in 0..n {
            sched.run_phase(TaskPhase::Output, &ctx);
            ctx = ctx.next(ctx.now + DT);
        }
    }

    #[test]
    fn open_moves_both_claws_and_signals() {
        let (intake, sched, left, right) = intake();
        let ev = Event::new("open");
        intake.open_claw(Some(ev.clone()));
        assert!((left.physical() - 0.95).abs() < 1e-12);
        assert!((right.physical() - 0.18).abs() < 1e-12);

        run(&sched, 30); // past the 0.5 s travel time
        assert!(ev.is_signaled());
    }

    #[test]
    fn close_moves_both_claws() {
        let (intake, _sched, left, right) = intake();
        intake.close_claw(None);
        assert!((left.physical() - 0.65).abs() < 1e-12);
        assert!((right.physical() - 0.52).abs() < 1e-12);
    }

    #[test]
    fn per_side_verbs_leave_other_side_alone() {
        let (intake, _sched, left, right) = intake();
        intake.close_claw(None);
        intake.open_side(ClawSide::Right, None);
        assert!((left.physical() - 0.65).abs() < 1e-12);
        assert!((right.physical() - 0.18).abs() < 1e-12);
    }

    #[test]
    fn retarget_cancels_pending_completion() {
        let (intake, _sched, _left, _right) = intake();
        let ev = Event::new("open");
        intake.open_claw(Some(ev.clone()));
        intake.close_claw(None);
        assert!(ev.is_canceled());
    }
}

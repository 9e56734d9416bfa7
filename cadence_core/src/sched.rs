//! Periodic task scheduler.
//!
//! Subsystems register callbacks against an execution phase; an external
//! driver calls [`TaskScheduler::run_phase`] once per phase per control
//! cycle. Within a phase, callbacks run in registration order, exactly once.
//!
//! A callback returning `Err` is logged and skipped for the remainder of
//! that cycle only — never fatal to the scheduler. Unregistration is
//! idempotent and safe from inside a running callback (including a callback
//! unregistering itself, the normal way a finished action retires).

use std::cell::RefCell;
use std::rc::Rc;

use thiserror::Error;
use tracing::warn;

use crate::cycle::CycleContext;

/// Execution phase within a control cycle.
///
/// The driver decides the phase order; the convention is
/// PrePeriodic → PostPeriodic → Output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskPhase {
    /// Before subsystem periodic processing (input sampling).
    PrePeriodic,
    /// After subsystem periodic processing (action state machines).
    PostPeriodic,
    /// Final output stage (control updates, power writes).
    Output,
}

/// Error returned by a scheduled callback. Contained to the failing
/// callback for that cycle; the scheduler continues with the next one.
#[derive(Debug, Error)]
pub enum TaskError {
    /// A state machine produced a state its driver has no handler for.
    #[error("unexpected state: {0}")]
    UnexpectedState(String),
    /// Subsystem-specific fault.
    #[error("subsystem fault: {0}")]
    Subsystem(String),
}

/// Opaque handle identifying a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle(u64);

type TaskFn = Box<dyn FnMut(&CycleContext) -> Result<(), TaskError>>;

struct TaskEntry {
    handle: TaskHandle,
    phase: TaskPhase,
    name: String,
    // Taken out while the callback runs so the scheduler's own borrow is
    // released; a self-unregistering callback then simply drops it.
    callback: Option<TaskFn>,
}

#[derive(Default)]
struct SchedInner {
    next_id: u64,
    entries: Vec<TaskEntry>,
}

/// Clonable handle to the scheduler shared by the driver and subsystems.
#[derive(Clone, Default)]
pub struct TaskScheduler {
    inner: Rc<RefCell<SchedInner>>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `phase`. Returns the handle used to
    /// unregister. Invocation order within a phase is registration order.
    pub fn register_task(
        &self,
        name: impl Into<String>,
        phase: TaskPhase,
        callback: impl FnMut(&CycleContext) -> Result<(), TaskError> + 'static,
    ) -> TaskHandle {
        let mut inner = self.inner.borrow_mut();
        inner.next_id += 1;
        let handle = TaskHandle(inner.next_id);
        inner.entries.push(TaskEntry {
            handle,
            phase,
            name: name.into(),
            callback: Some(Box::new(callback)),
        });
        handle
    }

    /// Remove a registration. Idempotent: returns `false` if the handle is
    /// not (or no longer) registered.
    pub fn unregister_task(&self, handle: TaskHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.handle != handle);
        inner.entries.len() != before
    }

    /// Whether the handle refers to a live registration.
    pub fn is_registered(&self, handle: TaskHandle) -> bool {
        self.inner.borrow().entries.iter().any(|e| e.handle == handle)
    }

    /// Number of live registrations across all phases.
    pub fn task_count(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Invoke every callback currently registered for `phase`, in
    /// registration order, exactly once.
    ///
    /// Tasks unregistered mid-phase (by an earlier callback) are skipped;
    /// tasks registered mid-phase first run on the next cycle.
    pub fn run_phase(&self, phase: TaskPhase, ctx: &CycleContext) {
        let handles: Vec<TaskHandle> = self
            .inner
            .borrow()
            .entries
            .iter()
            .filter(|e| e.phase == phase)
            .map(|e| e.handle)
            .collect();

        for handle in handles {
            let taken = {
                let mut inner = self.inner.borrow_mut();
                inner
                    .entries
                    .iter_mut()
                    .find(|e| e.handle == handle)
                    .and_then(|e| e.callback.take().map(|cb| (cb, e.name.clone())))
            };
            let Some((mut callback, name)) = taken else {
                // Unregistered earlier in this phase.
                continue;
            };

            let result = callback(ctx);

            // Put the callback back unless the entry was unregistered
            // while it ran.
            let mut inner = self.inner.borrow_mut();
            if let Some(entry) = inner.entries.iter_mut().find(|e| e.handle == handle) {
                entry.callback = Some(callback);
            }
            drop(inner);

            if let Err(e) = result {
                warn!(task = %name, cycle = ctx.cycle, "task skipped: {e}");
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn ctx() -> CycleContext {
        CycleContext::new(0.0, 0.02)
    }

    #[test]
    fn runs_in_registration_order() {
        let sched = TaskScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for tag in ["a", "b", "c"] {
            let order = order.clone();
            sched.register_task(tag, TaskPhase::PostPeriodic, move |_| {
                order.borrow_mut().push(tag);
                Ok(())
            });
        }

        sched.run_phase(TaskPhase::PostPeriodic, &ctx());
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn phases_are_independent() {
        let sched = TaskScheduler::new();
        let hits = Rc::new(RefCell::new(0u32));

        let h = hits.clone();
        sched.register_task("out", TaskPhase::Output, move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });

        sched.run_phase(TaskPhase::PostPeriodic, &ctx());
        assert_eq!(*hits.borrow(), 0);
        sched.run_phase(TaskPhase::Output, &ctx());
        assert_eq!(*hits.borrow(), 1);
    }

    #[test]
    fn unregister_is_idempotent() {
        let sched = TaskScheduler::new();
        let handle = sched.register_task("t", TaskPhase::Output, |_| Ok(()));
        assert!(sched.is_registered(handle));
        assert!(sched.unregister_task(handle));
        assert!(!sched.unregister_task(handle));
        assert!(!sched.is_registered(handle));
    }

    #[test]
    fn failing_task_does_not_stop_the_phase() {
        let sched = TaskScheduler::new();
        let hits = Rc::new(RefCell::new(0u32));

        sched.register_task("bad", TaskPhase::PostPeriodic, |_| {
            Err(TaskError::Subsystem("boom".into()))
        });
        let h = hits.clone();
        sched.register_task("good", TaskPhase::PostPeriodic, move |_| {
            *h.borrow_mut() += 1;
            Ok(())
        });

        sched.run_phase(TaskPhase::PostPeriodic, &ctx());
        assert_eq!(*hits.borrow(), 1);

        // The failing task is only skipped for that cycle, not removed.
        assert_eq!(sched.task_count(), 2);
        sched.run_phase(TaskPhase::PostPeriodic, &ctx());
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn callback_can_unregister_itself() {
        let sched = TaskScheduler::new();
        let hits = Rc::new(RefCell::new(0u32));

        let sched2 = sched.clone();
        let h = hits.clone();
        let handle = Rc::new(RefCell::new(None::<TaskHandle>));
        let handle2 = handle.clone();
        let registered = sched.register_task("once", TaskPhase::PostPeriodic, move |_| {
            *h.borrow_mut() += 1;
            sched2.unregister_task(handle2.borrow().unwrap());
            Ok(())
        });
        *handle.borrow_mut() = Some(registered);

        sched.run_phase(TaskPhase::PostPeriodic, &ctx());
        sched.run_phase(TaskPhase::PostPeriodic, &ctx());
        assert_eq!(*hits.borrow(), 1);
        assert_eq!(sched.task_count(), 0);
    }

    #[test]
    fn earlier_callback_can_unregister_a_later_one() {
        let sched = TaskScheduler::new();
        let hits = Rc::new(RefCell::new(0u32));

        let victim = {
            let h = hits.clone();
            sched.register_task("victim-placeholder", TaskPhase::Output, move |_| {
                *h.borrow_mut() += 1;
                Ok(())
            })
        };
        // Re-register so the killer runs first.
        sched.unregister_task(victim);

        let victim_handle = Rc::new(RefCell::new(None::<TaskHandle>));
        let vh = victim_handle.clone();
        let sched2 = sched.clone();
        sched.register_task("killer", TaskPhase::Output, move |_| {
            sched2.unregister_task(vh.borrow().unwrap());
            Ok(())
        });
        let h = hits.clone();
        *victim_handle.borrow_mut() =
            Some(sched.register_task("victim", TaskPhase::Output, move |_| {
                *h.borrow_mut() += 1;
                Ok(())
            }));

        sched.run_phase(TaskPhase::Output, &ctx());
        assert_eq!(*hits.borrow(), 0);
        assert_eq!(sched.task_count(), 1);
    }

    #[test]
    fn task_registered_mid_phase_runs_next_cycle() {
        let sched = TaskScheduler::new();
        let hits = Rc::new(RefCell::new(0u32));

        let sched2 = sched.clone();
        let h = hits.clone();
        let armed = Rc::new(RefCell::new(false));
        let armed2 = armed.clone();
        sched.register_task("spawner", TaskPhase::Output, move |_| {
            if !*armed2.borrow() {
                *armed2.borrow_mut() = true;
                let h = h.clone();
                sched2.register_task("spawned", TaskPhase::Output, move |_| {
                    *h.borrow_mut() += 1;
                    Ok(())
                });
            }
            Ok(())
        });

        sched.run_phase(TaskPhase::Output, &ctx());
        assert_eq!(*hits.borrow(), 0);
        sched.run_phase(TaskPhase::Output, &ctx());
        assert_eq!(*hits.borrow(), 1);
    }
}

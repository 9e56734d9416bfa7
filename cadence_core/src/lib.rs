//! # Cadence Core
//!
//! Cooperative, non-blocking control framework for robots running a
//! fixed-period control loop. Every actuator action is expressed as a small
//! state machine advanced by completion events, so any number of actions can
//! be in flight without ever blocking the control thread.
//!
//! ## Building blocks
//!
//! 1. **[`event::Event`]** — single-resolution completion token.
//! 2. **[`sched::TaskScheduler`]** — per-cycle callback dispatch by phase.
//! 3. **[`state_machine::StateMachine`]** — generic enum-indexed FSM driver.
//! 4. **[`actuator::ActuatorController`]** — closed-loop position/velocity
//!    control with stall protection, presets, soft limits, and gravity
//!    compensation.
//! 5. **[`servo::ServoController`]** — open-loop servo with timed and
//!    step-rate moves.
//!
//! ## Concurrency model
//!
//! One control thread executes fixed-period cycles; all callbacks, polls,
//! and control updates run to completion within a cycle. Suspension is
//! expressed only as "not ready" poll results, never as a blocked thread.
//! Handles share state via `Rc<RefCell<_>>` and are not `Send`.

pub mod actuator;
pub mod cycle;
pub mod event;
pub mod pid;
pub mod sched;
pub mod servo;
pub mod state_machine;

//! Robot subsystems: domain verbs over the `cadence_core` framework.
//!
//! Each subsystem owns its controllers behind an `Rc<RefCell<_>>` handle so
//! the gamepad/automation caller and the subsystem's own scheduled tasks can
//! share it on the single control thread. Every subsystem registers one
//! permanent Output-phase task at construction that runs its controllers'
//! per-cycle updates; multi-step actions additionally register a PostPeriodic
//! state-machine task for the lifetime of the action.
//!
//! Verbs return immediately. Completion is reported through the caller's
//! optional [`cadence_core::event::Event`], resolved exactly once per
//! accepted action.

use thiserror::Error;

pub mod elevator;
pub mod hang;
pub mod intake;
pub mod launcher;
pub mod wrist;

pub use elevator::Elevator;
pub use hang::Hang;
pub use intake::Intake;
pub use launcher::Launcher;
pub use wrist::Wrist;

/// Precondition failure for a subsystem verb. The verb has no effect and
/// the caller's completion event (if any) is canceled before returning.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    /// Verb is restricted to the end-game period.
    #[error("end-game only: elapsed {elapsed:.1} s < {required:.1} s")]
    NotEndGame { elapsed: f64, required: f64 },
    /// A multi-step action is already in flight.
    #[error("{0} action already in flight")]
    Busy(&'static str),
}

//! Shared match clock.
//!
//! The robot aggregate updates the clock once per cycle; subsystems hold
//! clonable handles for precondition checks (end-game gating). Non-owning
//! by design: subsystems look back at shared time, never at the robot.

use std::cell::Cell;
use std::rc::Rc;

/// Clonable handle to the elapsed match time in seconds.
#[derive(Clone, Default)]
pub struct MatchClock {
    elapsed: Rc<Cell<f64>>,
}

impl MatchClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the elapsed match time. Called once per cycle by the robot.
    pub fn set(&self, elapsed: f64) {
        self.elapsed.set(elapsed);
    }

    /// Elapsed match time [s].
    pub fn elapsed(&self) -> f64 {
        self.elapsed.get()
    }

    /// Whether the match has reached the end-game period.
    pub fn is_end_game(&self, end_game_time: f64) -> bool {
        self.elapsed.get() >= end_game_time
    }
}

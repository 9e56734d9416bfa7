//! Open-loop servo controller with timed and step-rate moves.
//!
//! Hobby servos report no feedback, so "completion" is advisory: a timed
//! move signals its event after the caller-supplied travel time, a stepped
//! move slews the logical position at a fixed rate and signals on arrival.
//! Retargeting cancels the superseded motion's pending event.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cycle::CycleContext;
use crate::event::Event;

/// Raw servo access: logical position write/read in [0, 1].
pub trait ServoPort {
    fn set_position(&mut self, position: f64);
    fn position(&self) -> f64;
}

/// Immutable servo configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServoParams {
    /// Direction inversion: logical `p` maps to physical `1 - p`.
    pub inverted: bool,
}

enum Motion {
    /// Position already written; event signals after the travel time.
    Timed { remaining: f64, event: Option<Event> },
    /// Slew toward `target` at `step_rate` units/s.
    Stepped {
        target: f64,
        step_rate: f64,
        event: Option<Event>,
    },
}

/// Controller for one open-loop servo.
pub struct ServoController {
    name: String,
    params: ServoParams,
    port: Box<dyn ServoPort>,
    /// Logical commanded position.
    logical: f64,
    motion: Option<Motion>,
}

impl ServoController {
    pub fn new(name: impl Into<String>, params: ServoParams, port: Box<dyn ServoPort>) -> Self {
        Self {
            name: name.into(),
            params,
            port,
            logical: 0.0,
            motion: None,
        }
    }

    #[inline]
    fn physical(&self, logical: f64) -> f64 {
        if self.params.inverted { 1.0 - logical } else { logical }
    }

    /// Commanded logical position.
    pub fn position(&self) -> f64 {
        self.logical
    }

    /// Whether a timed or stepped motion is still pending.
    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    fn supersede(&mut self) {
        if let Some(motion) = self.motion.take() {
            let event = match motion {
                Motion::Timed { event, .. } => event,
                Motion::Stepped { event, .. } => event,
            };
            if let Some(ev) = event {
                ev.cancel();
            }
        }
    }

    /// Move immediately, no completion tracking.
    pub fn set_position(&mut self, position: f64) {
        self.supersede();
        self.logical = position.clamp(0.0, 1.0);
        let physical = self.physical(self.logical);
        self.port.set_position(physical);
    }

    /// Move immediately and signal `event` after the advisory travel
    /// time `duration` seconds (servo travel time is caller-supplied,
    /// never measured).
    pub fn set_position_for(&mut self, position: f64, duration: f64, event: Option<Event>) {
        self.set_position(position);
        debug!(servo = %self.name, position, duration, "timed move");
        self.motion = Some(Motion::Timed {
            remaining: duration.max(0.0),
            event,
        });
    }

    /// Slew toward `position` at `step_rate` logical units per second,
    /// signaling `event` on arrival.
    pub fn set_position_stepped(&mut self, position: f64, step_rate: f64, event: Option<Event>) {
        self.supersede();
        debug!(servo = %self.name, position, step_rate, "stepped move");
        self.motion = Some(Motion::Stepped {
            target: position.clamp(0.0, 1.0),
            step_rate: step_rate.abs(),
            event,
        });
    }

    /// Cancel any pending motion, resolving its event as canceled.
    /// The servo holds its current commanded position.
    pub fn cancel(&mut self) {
        self.supersede();
    }

    /// Drive pending motions; called once per control cycle.
    pub fn update(&mut self, ctx: &CycleContext) {
        match self.motion.take() {
            None => {}
            Some(Motion::Timed { remaining, event }) => {
                let remaining = remaining - ctx.dt;
                if remaining <= 0.0 {
                    if let Some(ev) = event {
                        ev.signal();
                    }
                } else {
                    self.motion = Some(Motion::Timed { remaining, event });
                }
            }
            Some(Motion::Stepped {
                target,
                step_rate,
                event,
            }) => {
                let step = step_rate * ctx.dt;
                let delta = target - self.logical;
                if delta.abs() <= step || step_rate == 0.0 {
                    self.logical = target;
                    let physical = self.physical(target);
                    self.port.set_position(physical);
                    if let Some(ev) = event {
                        ev.signal();
                    }
                } else {
                    self.logical += step.copysign(delta);
                    let physical = self.physical(self.logical);
                    self.port.set_position(physical);
                    self.motion = Some(Motion::Stepped {
                        target,
                        step_rate,
                        event,
                    });
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

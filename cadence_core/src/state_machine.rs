//! Generic enum-indexed state machine driver.
//!
//! A [`StateMachine`] is polled once per control cycle by its owning
//! subsystem task. The task reads the current state, executes the
//! corresponding command (a PID move, a timed servo motion), and arms the
//! next transition with [`StateMachine::wait_for_single_event`]. The
//! terminal state's handler stops the machine and releases its resources.
//!
//! Suspension is purely data-driven: while a wait event is pending the
//! machine reports "not ready" and the task does nothing that cycle.
//! A canceled wait event disables the machine and is reported exactly once
//! as [`SmPoll::Canceled`] so the owner can run its cleanup path.

use std::fmt;

use tracing::debug;

use crate::event::Event;

/// Result of one per-cycle poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmPoll<S> {
    /// Disabled, or still blocked on a pending wait event.
    NotReady,
    /// Enabled and unblocked; `S` is the state to execute.
    Ready(S),
    /// The wait event was canceled; the machine has stopped itself.
    /// Reported once — the owner must terminate the action.
    Canceled,
}

/// Enum-indexed FSM advancing on event signals.
///
/// Generic over the state set; the "not running" state is implicit
/// (disabled machine). Exactly one instance per subsystem action;
/// starting while enabled is a no-op.
pub struct StateMachine<S> {
    name: String,
    enabled: bool,
    state: Option<S>,
    wait: Option<(Event, S)>,
}

impl<S: Copy + PartialEq + fmt::Debug> StateMachine<S> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: false,
            state: None,
            wait: None,
        }
    }

    /// Enable the machine in `initial`. No-op (returns `false`) if the
    /// machine is already enabled — the current state is left unchanged.
    pub fn start(&mut self, initial: S) -> bool {
        if self.enabled {
            return false;
        }
        self.enabled = true;
        self.state = Some(initial);
        self.wait = None;
        debug!(sm = %self.name, state = ?initial, "started");
        true
    }

    /// Disable the machine. The current state becomes undefined.
    pub fn stop(&mut self) {
        if self.enabled {
            debug!(sm = %self.name, "stopped");
        }
        self.enabled = false;
        self.state = None;
        self.wait = None;
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Single per-cycle poll point.
    ///
    /// Resolves a signaled wait event into its transition, reports a
    /// canceled wait event (stopping the machine), and otherwise yields
    /// the current state when unblocked.
    pub fn poll(&mut self) -> SmPoll<S> {
        if !self.enabled {
            return SmPoll::NotReady;
        }
        if let Some((event, next)) = &self.wait {
            if event.is_canceled() {
                debug!(sm = %self.name, event = %event, "wait event canceled");
                self.stop();
                return SmPoll::Canceled;
            }
            if !event.is_signaled() {
                return SmPoll::NotReady;
            }
            let next = *next;
            debug!(sm = %self.name, state = ?next, "transition");
            self.state = Some(next);
            self.wait = None;
        }
        match self.state {
            Some(s) => SmPoll::Ready(s),
            // Started machines always hold a state; defensive only.
            None => SmPoll::NotReady,
        }
    }

    /// Narrow poll: current state if enabled and unblocked,
    /// `None` if disabled or still waiting. Cancellation-aware callers
    /// should use [`StateMachine::poll`] instead.
    pub fn check_ready_and_get_state(&mut self) -> Option<S> {
        match self.poll() {
            SmPoll::Ready(s) => Some(s),
            _ => None,
        }
    }

    /// Block until `event` resolves; on signal, transition to `next`.
    ///
    /// The machine reports "not ready" on subsequent polls until the event
    /// resolves. An already-signaled event makes the transition visible on
    /// the very next poll.
    pub fn wait_for_single_event(&mut self, event: &Event, next: S) {
        if !self.enabled {
            return;
        }
        self.wait = Some((event.clone(), next));
    }

    /// Current state without readiness checks (telemetry only).
    pub fn current_state(&self) -> Option<S> {
        if self.enabled { self.state } else { None }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

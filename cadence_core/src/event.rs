//! Single-use completion tokens.
//!
//! An [`Event`] is created per asynchronous operation, resolved exactly once
//! by the operation's owner (signaled on success, canceled on failure), and
//! polled by at most one waiting state machine plus one external caller.
//! Resolving an already-resolved event is a no-op.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

/// Resolution state of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventState {
    /// Not yet resolved.
    #[default]
    Pending,
    /// Resolved as success.
    Signaled,
    /// Resolved as failure/abort.
    Canceled,
}

struct EventInner {
    name: String,
    state: EventState,
}

/// Cheap clonable handle to a single-resolution completion token.
///
/// All clones observe the same state. Confined to the control thread
/// (not `Send`); cloning is how an event is shared between the operation
/// that resolves it and the state machine that waits on it.
#[derive(Clone)]
pub struct Event {
    inner: Rc<RefCell<EventInner>>,
}

impl Event {
    /// Create a pending event. The name is used only for logging.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(EventInner {
                name: name.into(),
                state: EventState::Pending,
            })),
        }
    }

    /// Resolve as success. No-op if already resolved.
    pub fn signal(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == EventState::Pending {
            inner.state = EventState::Signaled;
            debug!(event = %inner.name, "signaled");
        }
    }

    /// Resolve as failure. No-op if already resolved.
    pub fn cancel(&self) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == EventState::Pending {
            inner.state = EventState::Canceled;
            debug!(event = %inner.name, "canceled");
        }
    }

    /// Current resolution state.
    #[inline]
    pub fn state(&self) -> EventState {
        self.inner.borrow().state
    }

    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.state() == EventState::Signaled
    }

    #[inline]
    pub fn is_canceled(&self) -> bool {
        self.state() == EventState::Canceled
    }

    /// Whether the event has been resolved either way.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        self.state() != EventState::Pending
    }

    /// Event name (for logging and diagnostics).
    pub fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Event")
            .field("name", &inner.name)
            .field("state", &inner.state)
            .finish()
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.borrow().name)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_pending() {
        let e = Event::new("op");
        assert_eq!(e.state(), EventState::Pending);
        assert!(!e.is_signaled());
        assert!(!e.is_canceled());
        assert!(!e.is_resolved());
    }

    #[test]
    fn signal_resolves_once() {
        let e = Event::new("op");
        e.signal();
        assert!(e.is_signaled());
        // Cancel after signal is a no-op.
        e.cancel();
        assert!(e.is_signaled());
        assert!(!e.is_canceled());
    }

    #[test]
    fn cancel_resolves_once() {
        let e = Event::new("op");
        e.cancel();
        assert!(e.is_canceled());
        // Signal after cancel is a no-op.
        e.signal();
        assert!(e.is_canceled());
        assert!(!e.is_signaled());
    }

    #[test]
    fn double_signal_is_noop() {
        let e = Event::new("op");
        e.signal();
        e.signal();
        assert!(e.is_signaled());
    }

    #[test]
    fn clones_share_state() {
        let e = Event::new("op");
        let c = e.clone();
        e.signal();
        assert!(c.is_signaled());
    }

    #[test]
    fn name_is_kept() {
        let e = Event::new("launcher.velocity");
        assert_eq!(e.name(), "launcher.velocity");
        assert_eq!(format!("{e}"), "launcher.velocity");
    }
}

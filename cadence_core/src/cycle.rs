//! Per-cycle timing context handed to every scheduled callback.
//!
//! The cycle period is supplied by the external driver; the core never
//! interprets it beyond passing `dt` to control updates.

/// Snapshot of the current control cycle's timing.
///
/// `now` is seconds since an arbitrary epoch chosen by the driver (typically
/// process start). `dt` is the elapsed time since the previous cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleContext {
    /// Current time [s].
    pub now: f64,
    /// Time since the previous cycle [s].
    pub dt: f64,
    /// Monotonic cycle counter.
    pub cycle: u64,
}

impl CycleContext {
    /// Context for the first cycle at `now` with period `dt`.
    pub const fn new(now: f64, dt: f64) -> Self {
        Self { now, dt, cycle: 0 }
    }

    /// Context for the cycle following this one.
    #[inline]
    pub fn next(&self, now: f64) -> Self {
        Self {
            now,
            dt: now - self.now,
            cycle: self.cycle + 1,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

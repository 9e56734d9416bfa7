//! PID with feedforward (kF) and integral zone.
//!
//! The integral term is frozen (not accumulated) while |error| exceeds
//! `izone`, which keeps long moves from winding up the accumulator.
//! Zero ki disables integral; zero kd disables derivative; zero izone
//! disables the freeze.

use serde::{Deserialize, Serialize};

/// PID coefficients plus completion tolerance for one actuator.
///
/// Immutable after construction; part of [`crate::actuator::ActuatorParams`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PidCoefficients {
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain (0 = disabled).
    pub ki: f64,
    /// Derivative gain (0 = disabled).
    pub kd: f64,
    /// Feedforward gain applied to the target value.
    pub kf: f64,
    /// Integral zone: freeze the accumulator while |error| > izone
    /// (0 = always accumulate).
    pub izone: f64,
    /// On-target tolerance in engineering units.
    pub tolerance: f64,
}

impl PidCoefficients {
    /// Pure-proportional coefficients with the given tolerance.
    pub const fn p_only(kp: f64, tolerance: f64) -> Self {
        Self {
            kp,
            ki: 0.0,
            kd: 0.0,
            kf: 0.0,
            izone: 0.0,
            tolerance,
        }
    }
}

/// Internal PID state preserved across cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct PidState {
    /// Integral accumulator (already multiplied by ki).
    integral: f64,
    /// Previous error, for the derivative term.
    prev_error: f64,
    /// Whether `prev_error` holds a real sample.
    primed: bool,
}

impl PidState {
    /// Reset all internal state to zero. Must be called when a new target
    /// is commanded or the controller switches to open-loop.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Current integral accumulator (diagnostics/tests).
    #[inline]
    pub fn integral(&self) -> f64 {
        self.integral
    }
}

/// Compute one PID cycle: `kp*e + ki*∫e + kd*Δe + kf*target`.
///
/// `target` feeds only the kF term. The output is unclamped; saturation
/// is the actuator controller's job.
#[inline]
pub fn pid_compute(
    state: &mut PidState,
    coeffs: &PidCoefficients,
    error: f64,
    target: f64,
    dt: f64,
) -> f64 {
    if dt <= 0.0 {
        return 0.0;
    }

    let p_term = coeffs.kp * error;

    let i_term = if coeffs.ki != 0.0 {
        let in_zone = coeffs.izone <= 0.0 || error.abs() <= coeffs.izone;
        if in_zone {
            state.integral += coeffs.ki * error * dt;
        }
        state.integral
    } else {
        state.integral = 0.0;
        0.0
    };

    let d_term = if coeffs.kd != 0.0 && state.primed {
        coeffs.kd * (error - state.prev_error) / dt
    } else {
        0.0
    };

    state.prev_error = error;
    state.primed = true;

    p_term + i_term + d_term + coeffs.kf * target
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.02; // 50 Hz control loop

    #[test]
    fn pure_proportional() {
        let mut s = PidState::default();
        let c = PidCoefficients::p_only(10.0, 0.1);
        let out = pid_compute(&mut s, &c, 1.0, 0.0, DT);
        assert!((out - 10.0).abs() < 1e-12);
    }

    #[test]
    fn zero_dt_returns_zero() {
        let mut s = PidState::default();
        let c = PidCoefficients::p_only(10.0, 0.1);
        assert_eq!(pid_compute(&mut s, &c, 5.0, 0.0, 0.0), 0.0);
    }

    #[test]
    fn integral_accumulates_inside_zone() {
        let mut s = PidState::default();
        let c = PidCoefficients {
            kp: 0.0,
            ki: 1.0,
            kd: 0.0,
            kf: 0.0,
            izone: 2.0,
            tolerance: 0.1,
        };
        for _ in 0..10 {
            pid_compute(&mut s, &c, 1.0, 0.0, DT);
        }
        // ∫ = ki * e * dt * n = 1.0 * 1.0 * 0.02 * 10
        assert!((s.integral() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn integral_frozen_outside_zone() {
        let mut s = PidState::default();
        let c = PidCoefficients {
            kp: 0.0,
            ki: 1.0,
            kd: 0.0,
            kf: 0.0,
            izone: 2.0,
            tolerance: 0.1,
        };
        // Error beyond izone: accumulator must not move.
        for _ in 0..10 {
            pid_compute(&mut s, &c, 5.0, 0.0, DT);
        }
        assert_eq!(s.integral(), 0.0);

        // Back inside the zone it accumulates again.
        pid_compute(&mut s, &c, 1.0, 0.0, DT);
        assert!(s.integral() > 0.0);
    }

    #[test]
    fn zero_izone_always_accumulates() {
        let mut s = PidState::default();
        let c = PidCoefficients {
            kp: 0.0,
            ki: 1.0,
            kd: 0.0,
            kf: 0.0,
            izone: 0.0,
            tolerance: 0.1,
        };
        pid_compute(&mut s, &c, 100.0, 0.0, DT);
        assert!(s.integral() > 0.0);
    }

    #[test]
    fn derivative_needs_two_samples() {
        let mut s = PidState::default();
        let c = PidCoefficients {
            kp: 0.0,
            ki: 0.0,
            kd: 1.0,
            kf: 0.0,
            izone: 0.0,
            tolerance: 0.1,
        };
        // First sample: no derivative.
        assert_eq!(pid_compute(&mut s, &c, 1.0, 0.0, DT), 0.0);
        // Second sample: (2-1)/0.02 = 50.
        let out = pid_compute(&mut s, &c, 2.0, 0.0, DT);
        assert!((out - 50.0).abs() < 1e-9);
    }

    #[test]
    fn feedforward_scales_target() {
        let mut s = PidState::default();
        let c = PidCoefficients {
            kp: 0.0,
            ki: 0.0,
            kd: 0.0,
            kf: 0.5,
            izone: 0.0,
            tolerance: 0.1,
        };
        let out = pid_compute(&mut s, &c, 0.0, 2.0, DT);
        assert!((out - 1.0).abs() < 1e-12);
    }

    #[test]
    fn reset_clears_state() {
        let mut s = PidState::default();
        let c = PidCoefficients {
            kp: 1.0,
            ki: 1.0,
            kd: 1.0,
            kf: 0.0,
            izone: 0.0,
            tolerance: 0.1,
        };
        for _ in 0..5 {
            pid_compute(&mut s, &c, 1.0, 0.0, DT);
        }
        assert!(s.integral() > 0.0);
        s.reset();
        assert_eq!(s.integral(), 0.0);
        // Derivative is unprimed again.
        let out = pid_compute(
            &mut s,
            &PidCoefficients {
                kp: 0.0,
                ki: 0.0,
                kd: 1.0,
                kf: 0.0,
                izone: 0.0,
                tolerance: 0.1,
            },
            3.0,
            0.0,
            DT,
        );
        assert_eq!(out, 0.0);
    }
}

//! Closed-loop actuator controller.
//!
//! Wraps a raw motor/encoder port with engineering-unit scaling, software
//! PID position/velocity control, stall protection, soft limits, position
//! presets, and optional gravity/friction compensation. One controller per
//! physical actuator; [`ActuatorController::update`] runs once per control
//! cycle and writes exactly one power command to the port.
//!
//! Configuration is immutable after construction ([`ActuatorParams`]);
//! runtime state (target, PID accumulator, stall timers, fault flags)
//! mutates every cycle.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cycle::CycleContext;
use crate::event::Event;
use crate::pid::{pid_compute, PidCoefficients, PidState};

/// Maximum number of position presets per actuator.
pub const MAX_PRESETS: usize = 8;

/// Raw hardware access for one actuator. Implemented by the hardware
/// abstraction (or a simulation); polled/written once per cycle.
pub trait ActuatorPort {
    /// Raw sensor position (e.g. encoder counts).
    fn raw_position(&self) -> f64;
    /// Raw sensor velocity (e.g. counts/s).
    fn raw_velocity(&self) -> f64;
    /// Write the power command, in [-1, 1] before inversion.
    fn set_power(&mut self, power: f64);
}

bitflags! {
    /// Physical fault flags surfaced to status queries.
    ///
    /// A faulted actuator is forced to zero power in the affected direction
    /// (or entirely, for STALLED) until the fault clears.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActuatorFault: u8 {
        /// Stall protection tripped; output forced to zero.
        const STALLED     = 0x01;
        /// Lower soft limit reached; downward motion clamped.
        const LOWER_LIMIT = 0x02;
        /// Upper soft limit reached; upward motion clamped.
        const UPPER_LIMIT = 0x04;
    }
}

/// Stall-protection parameters.
///
/// A stall is declared when commanded |power| ≥ `min_power` but the
/// measured position changes by less than `tolerance` for `timeout`
/// seconds. The fault self-clears after `reset_timeout` seconds of
/// commanded-zero (0 = clears as soon as the command returns to zero),
/// or on explicit [`ActuatorController::reset_stall`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StallProtection {
    /// Minimum commanded |power| for stall detection to arm.
    pub min_power: f64,
    /// Motion-detection tolerance in engineering units.
    pub tolerance: f64,
    /// Seconds without motion before declaring a stall.
    pub timeout: f64,
    /// Seconds of commanded-zero before the fault re-arms.
    pub reset_timeout: f64,
}

/// Named target positions snapped to within a shared tolerance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetTable {
    /// On-target tolerance used for preset moves.
    pub tolerance: f64,
    /// Preset positions in engineering units, ascending.
    pub positions: heapless::Vec<f64, MAX_PRESETS>,
}

/// Immutable per-actuator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorParams {
    /// Engineering units per raw sensor count.
    pub scale: f64,
    /// Engineering-unit offset added after scaling.
    pub offset: f64,
    /// Motor/sensor direction inversion.
    pub inverted: bool,
    /// Output saturation, |power| ≤ power_limit.
    pub power_limit: f64,
    /// PID coefficients and completion tolerance.
    pub pid: PidCoefficients,
    /// Optional stall protection.
    pub stall: Option<StallProtection>,
    /// Optional position presets.
    pub presets: Option<PresetTable>,
    /// Optional lower soft limit (engineering units).
    pub lower_limit: Option<f64>,
    /// Optional upper soft limit (engineering units).
    pub upper_limit: Option<f64>,
}

impl ActuatorParams {
    /// Validate parameter bounds. Run at configuration-load time.
    pub fn validate(&self) -> Result<(), String> {
        if self.scale == 0.0 {
            return Err("scale must be nonzero".into());
        }
        if self.power_limit <= 0.0 || self.power_limit > 1.0 {
            return Err(format!("power_limit {} outside (0, 1]", self.power_limit));
        }
        if self.pid.tolerance < 0.0 {
            return Err("pid.tolerance must be >= 0".into());
        }
        if let Some(s) = &self.stall {
            if s.min_power <= 0.0 || s.tolerance <= 0.0 || s.timeout <= 0.0 {
                return Err("stall min_power/tolerance/timeout must be > 0".into());
            }
            if s.reset_timeout < 0.0 {
                return Err("stall reset_timeout must be >= 0".into());
            }
        }
        if let Some(p) = &self.presets {
            if p.positions.is_empty() {
                return Err("preset table must not be empty".into());
            }
            if p.tolerance <= 0.0 {
                return Err("preset tolerance must be > 0".into());
            }
            if !p.positions.windows(2).all(|w| w[0] < w[1]) {
                return Err("preset positions must be strictly ascending".into());
            }
        }
        if let (Some(lo), Some(hi)) = (self.lower_limit, self.upper_limit) {
            if lo >= hi {
                return Err(format!("lower_limit {lo} >= upper_limit {hi}"));
            }
        }
        Ok(())
    }
}

/// Active closed-loop target.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Target {
    /// Open-loop; output follows the last `set_power` value.
    None,
    /// Position hold/move in engineering units.
    Position(f64),
    /// Velocity hold in engineering units per second.
    Velocity(f64),
}

/// Closed-loop controller for one actuator.
pub struct ActuatorController {
    name: String,
    params: ActuatorParams,
    port: Box<dyn ActuatorPort>,
    compensation: Option<Box<dyn Fn(f64) -> f64>>,

    pid: PidState,
    target: Target,
    /// Completion tolerance for the active move (preset moves override
    /// the PID tolerance).
    active_tolerance: f64,
    completion: Option<Event>,
    /// Caller-commanded open-loop power.
    open_power: f64,
    /// Last power written to the port (post clamp/limits).
    applied_power: f64,
    faults: ActuatorFault,

    // ── Stall tracking ──
    stall_ref_position: f64,
    last_motion_time: Option<f64>,
    zero_since: Option<f64>,
}

impl ActuatorController {
    /// Create a controller over `port`. `params` must have passed
    /// [`ActuatorParams::validate`].
    pub fn new(name: impl Into<String>, params: ActuatorParams, port: Box<dyn ActuatorPort>) -> Self {
        let active_tolerance = params.pid.tolerance;
        Self {
            name: name.into(),
            params,
            port,
            compensation: None,
            pid: PidState::default(),
            target: Target::None,
            active_tolerance,
            completion: None,
            open_power: 0.0,
            applied_power: 0.0,
            faults: ActuatorFault::empty(),
            stall_ref_position: 0.0,
            last_motion_time: None,
            zero_since: None,
        }
    }

    /// Attach a gravity/friction compensation term: a function of current
    /// position whose output is added to the computed power every cycle.
    pub fn with_compensation(mut self, f: impl Fn(f64) -> f64 + 'static) -> Self {
        self.compensation = Some(Box::new(f));
        self
    }

    // ── Engineering-unit transforms ─────────────────────────────────

    #[inline]
    fn scale_signed(&self) -> f64 {
        if self.params.inverted {
            -self.params.scale
        } else {
            self.params.scale
        }
    }

    /// Current position in engineering units.
    pub fn position(&self) -> f64 {
        self.port.raw_position() * self.scale_signed() + self.params.offset
    }

    /// Current velocity in engineering units per second.
    pub fn velocity(&self) -> f64 {
        self.port.raw_velocity() * self.scale_signed()
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Command a closed-loop position move. The completion event (if any)
    /// is signaled once |error| ≤ tolerance. A previous in-flight move's
    /// pending event is canceled.
    pub fn set_position_target(&mut self, position: f64, completion: Option<Event>) {
        self.begin_target(Target::Position(position), self.params.pid.tolerance, completion);
    }

    /// Command a closed-loop velocity hold; completion fires when the
    /// measured velocity is within tolerance of the target.
    pub fn set_velocity_target(&mut self, velocity: f64, completion: Option<Event>) {
        self.begin_target(Target::Velocity(velocity), self.params.pid.tolerance, completion);
    }

    fn begin_target(&mut self, target: Target, tolerance: f64, completion: Option<Event>) {
        if let Some(old) = self.completion.take() {
            old.cancel();
        }
        self.pid.reset();
        self.target = target;
        self.active_tolerance = tolerance;
        self.completion = completion;
        self.open_power = 0.0;
    }

    /// Open-loop power override (manual/joystick control). Cancels any
    /// in-flight closed-loop target and its pending completion event.
    pub fn set_power(&mut self, power: f64) {
        if let Some(old) = self.completion.take() {
            old.cancel();
        }
        self.pid.reset();
        self.target = Target::None;
        self.open_power = power;
    }

    /// Stop: open-loop zero power, canceling any in-flight move.
    pub fn stop(&mut self) {
        self.set_power(0.0);
    }

    /// Move to the preset at `index` (clamped into range) using the preset
    /// table's tolerance. No-op if no presets are configured.
    pub fn move_to_preset(&mut self, index: usize, completion: Option<Event>) {
        let Some(presets) = self.params.presets.clone() else {
            warn!(actuator = %self.name, "move_to_preset without a preset table");
            if let Some(ev) = completion {
                ev.cancel();
            }
            return;
        };
        let index = index.min(presets.positions.len() - 1);
        let target = presets.positions[index];
        self.begin_target(Target::Position(target), presets.tolerance, completion);
    }

    /// Move to the next preset above the current position (beyond the
    /// snap tolerance). No-op at the top.
    pub fn preset_up(&mut self, completion: Option<Event>) {
        self.preset_step(true, completion);
    }

    /// Move to the next preset below the current position.
    pub fn preset_down(&mut self, completion: Option<Event>) {
        self.preset_step(false, completion);
    }

    fn preset_step(&mut self, up: bool, completion: Option<Event>) {
        let Some(presets) = self.params.presets.clone() else {
            if let Some(ev) = completion {
                ev.cancel();
            }
            return;
        };
        let pos = self.position();
        let next = if up {
            presets
                .positions
                .iter()
                .copied()
                .find(|&p| p > pos + presets.tolerance)
        } else {
            presets
                .positions
                .iter()
                .copied()
                .rev()
                .find(|&p| p < pos - presets.tolerance)
        };
        match (next, completion) {
            (Some(target), completion) => {
                self.begin_target(Target::Position(target), presets.tolerance, completion);
            }
            (None, Some(ev)) => ev.cancel(),
            (None, None) => {}
        }
    }

    /// Index of the preset nearest to the current position, if any.
    pub fn nearest_preset(&self) -> Option<usize> {
        let presets = self.params.presets.as_ref()?;
        let pos = self.position();
        presets
            .positions
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - pos).abs().total_cmp(&(*b - pos).abs()))
            .map(|(i, _)| i)
    }

    /// Clear a stall fault immediately (explicit recalibration).
    pub fn reset_stall(&mut self) {
        if self.faults.contains(ActuatorFault::STALLED) {
            info!(actuator = %self.name, "stall fault reset");
        }
        self.faults.remove(ActuatorFault::STALLED);
        self.last_motion_time = None;
        self.zero_since = None;
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Active closed-loop target value (position or velocity), if any.
    pub fn target(&self) -> Option<f64> {
        match self.target {
            Target::None => None,
            Target::Position(p) => Some(p),
            Target::Velocity(v) => Some(v),
        }
    }

    /// Last power written to the port.
    pub fn power(&self) -> f64 {
        self.applied_power
    }

    /// Current fault flags.
    pub fn faults(&self) -> ActuatorFault {
        self.faults
    }

    pub fn is_stalled(&self) -> bool {
        self.faults.contains(ActuatorFault::STALLED)
    }

    /// Whether a closed-loop move is in flight and within tolerance.
    pub fn is_on_target(&self) -> bool {
        match self.target {
            Target::None => false,
            Target::Position(t) => (t - self.position()).abs() <= self.active_tolerance,
            Target::Velocity(t) => (t - self.velocity()).abs() <= self.active_tolerance,
        }
    }

    // ── Per-cycle update ────────────────────────────────────────────

    /// Run one control cycle: sample the port, compute the output power,
    /// apply compensation, clamp, enforce soft limits and stall
    /// protection, and write the command to the port.
    pub fn update(&mut self, ctx: &CycleContext) {
        let pos = self.position();
        let vel = self.velocity();

        // Closed-loop or open-loop requested power (pre-compensation).
        let (requested, error) = match self.target {
            Target::Position(t) => {
                let e = t - pos;
                (pid_compute(&mut self.pid, &self.params.pid, e, t, ctx.dt), Some(e))
            }
            Target::Velocity(t) => {
                let e = t - vel;
                (pid_compute(&mut self.pid, &self.params.pid, e, t, ctx.dt), Some(e))
            }
            Target::None => (self.open_power, None),
        };

        // Completion: fires once, the first cycle within tolerance.
        if let Some(e) = error {
            if e.abs() <= self.active_tolerance {
                if let Some(ev) = self.completion.take() {
                    ev.signal();
                }
            }
        }

        let mut power = requested;
        if let Some(comp) = &self.compensation {
            power += comp(pos);
        }

        let limit = self.params.power_limit;
        power = power.clamp(-limit, limit);

        power = self.apply_soft_limits(pos, power);
        power = self.apply_stall_protection(ctx, pos, requested, power);

        self.applied_power = power;
        let out = if self.params.inverted { -power } else { power };
        self.port.set_power(out);
    }

    /// Clamp motion into a configured soft limit to zero and flag the
    /// saturation; the flag clears as soon as the clamp no longer applies.
    fn apply_soft_limits(&mut self, pos: f64, mut power: f64) -> f64 {
        if let Some(lo) = self.params.lower_limit {
            if pos <= lo && power < 0.0 {
                power = 0.0;
                if !self.faults.contains(ActuatorFault::LOWER_LIMIT) {
                    warn!(actuator = %self.name, position = pos, "lower soft limit reached");
                    self.faults.insert(ActuatorFault::LOWER_LIMIT);
                }
            } else {
                self.faults.remove(ActuatorFault::LOWER_LIMIT);
            }
        }
        if let Some(hi) = self.params.upper_limit {
            if pos >= hi && power > 0.0 {
                power = 0.0;
                if !self.faults.contains(ActuatorFault::UPPER_LIMIT) {
                    warn!(actuator = %self.name, position = pos, "upper soft limit reached");
                    self.faults.insert(ActuatorFault::UPPER_LIMIT);
                }
            } else {
                self.faults.remove(ActuatorFault::UPPER_LIMIT);
            }
        }
        power
    }

    /// Stall detection and faulted-output handling.
    ///
    /// `requested` is the caller-attributable command (pre-compensation):
    /// re-arming requires it to stay at zero for `reset_timeout` seconds.
    fn apply_stall_protection(
        &mut self,
        ctx: &CycleContext,
        pos: f64,
        requested: f64,
        power: f64,
    ) -> f64 {
        let Some(stall) = self.params.stall else {
            return power;
        };

        if self.faults.contains(ActuatorFault::STALLED) {
            if requested == 0.0 {
                let since = *self.zero_since.get_or_insert(ctx.now);
                if ctx.now - since >= stall.reset_timeout {
                    info!(actuator = %self.name, "stall protection re-armed");
                    self.faults.remove(ActuatorFault::STALLED);
                    self.stall_ref_position = pos;
                    self.last_motion_time = Some(ctx.now);
                    self.zero_since = None;
                    // Output stays zero this cycle; new commands take
                    // effect from the next one.
                }
            } else {
                self.zero_since = None;
            }
            return 0.0;
        }

        if power.abs() >= stall.min_power {
            if (pos - self.stall_ref_position).abs() > stall.tolerance {
                self.stall_ref_position = pos;
                self.last_motion_time = Some(ctx.now);
            } else {
                let since = *self.last_motion_time.get_or_insert(ctx.now);
                if ctx.now - since >= stall.timeout {
                    warn!(
                        actuator = %self.name,
                        position = pos,
                        power,
                        "stall detected, forcing zero power"
                    );
                    self.faults.insert(ActuatorFault::STALLED);
                    if let Some(ev) = self.completion.take() {
                        ev.cancel();
                    }
                    self.target = Target::None;
                    self.pid.reset();
                    self.zero_since = None;
                    return 0.0;
                }
            }
        } else {
            // Below the detection threshold: track position, no timing.
            self.stall_ref_position = pos;
            self.last_motion_time = Some(ctx.now);
        }
        power
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Port whose position is set directly by the test.
    #[derive(Clone, Default)]
    struct FakePort {
        state: Rc<RefCell<FakeState>>,
    }

    #[derive(Default)]
    struct FakeState {
        position: f64,
        velocity: f64,
        power: f64,
    }

    impl FakePort {
        fn set_position(&self, p: f64) {
            self.state.borrow_mut().position = p;
        }
        fn set_velocity(&self, v: f64) {
            self.state.borrow_mut().velocity = v;
        }
        fn power(&self) -> f64 {
            self.state.borrow().power
        }
    }

    impl ActuatorPort for FakePort {
        fn raw_position(&self) -> f64 {
            self.state.borrow().position
        }
        fn raw_velocity(&self) -> f64 {
            self.state.borrow().velocity
        }
        fn set_power(&mut self, power: f64) {
            self.state.borrow_mut().power = power;
        }
    }

    const DT: f64 = 0.02;

    fn params() -> ActuatorParams {
        ActuatorParams {
            scale: 1.0,
            offset: 0.0,
            inverted: false,
            power_limit: 1.0,
            pid: PidCoefficients::p_only(0.5, 0.25),
            stall: None,
            presets: None,
            lower_limit: None,
            upper_limit: None,
        }
    }

    fn controller(params: ActuatorParams) -> (ActuatorController, FakePort) {
        let port = FakePort::default();
        let ctrl = ActuatorController::new("test", params, Box::new(port.clone()));
        (ctrl, port)
    }

    fn run_cycles(ctrl: &mut ActuatorController, start: f64, n: u64) -> CycleContext {
        let mut ctx = CycleContext::new(start, DT);
        for _ in 0..n {
            ctrl.update(&ctx);
            ctx = ctx.next(ctx.now + DT);
        }
        ctx
    }

    #[test]
    fn engineering_units_scale_and_offset() {
        let mut p = params();
        p.scale = 23.8 / 2690.0;
        p.offset = 10.4;
        let (ctrl, port) = controller(p);
        port.set_position(2690.0);
        assert!((ctrl.position() - 34.2).abs() < 1e-9);
    }

    #[test]
    fn inverted_scale_flips_sign() {
        let mut p = params();
        p.inverted = true;
        let (ctrl, port) = controller(p);
        port.set_position(5.0);
        assert_eq!(ctrl.position(), -5.0);
        port.set_velocity(2.0);
        assert_eq!(ctrl.velocity(), -2.0);
    }

    #[test]
    fn position_target_drives_toward_target() {
        let (mut ctrl, port) = controller(params());
        ctrl.set_position_target(10.0, None);
        run_cycles(&mut ctrl, 0.0, 1);
        // Error 10, kp 0.5 → clamped to power_limit 1.0.
        assert_eq!(port.power(), 1.0);
        assert_eq!(ctrl.target(), Some(10.0));
    }

    #[test]
    fn completion_fires_once_within_tolerance() {
        let (mut ctrl, port) = controller(params());
        let ev = Event::new("move");
        ctrl.set_position_target(10.0, Some(ev.clone()));

        run_cycles(&mut ctrl, 0.0, 1);
        assert!(!ev.is_signaled());

        port.set_position(9.9); // within 0.25 tolerance
        run_cycles(&mut ctrl, 1.0, 1);
        assert!(ev.is_signaled());
    }

    #[test]
    fn set_power_cancels_pending_completion() {
        let (mut ctrl, port) = controller(params());
        let ev = Event::new("move");
        ctrl.set_position_target(10.0, Some(ev.clone()));
        ctrl.set_power(0.3);
        assert!(ev.is_canceled());
        assert_eq!(ctrl.target(), None);

        run_cycles(&mut ctrl, 0.0, 1);
        assert_eq!(port.power(), 0.3);
    }

    #[test]
    fn retarget_cancels_previous_event() {
        let (mut ctrl, _port) = controller(params());
        let first = Event::new("first");
        ctrl.set_position_target(10.0, Some(first.clone()));
        let second = Event::new("second");
        ctrl.set_position_target(5.0, Some(second.clone()));
        assert!(first.is_canceled());
        assert!(!second.is_resolved());
    }

    #[test]
    fn velocity_target_completion() {
        let (mut ctrl, port) = controller(params());
        let ev = Event::new("spinup");
        ctrl.set_velocity_target(100.0, Some(ev.clone()));

        run_cycles(&mut ctrl, 0.0, 1);
        assert!(!ev.is_signaled());

        port.set_velocity(99.9);
        run_cycles(&mut ctrl, 1.0, 1);
        assert!(ev.is_signaled());
    }

    #[test]
    fn power_clamped_to_limit() {
        let mut p = params();
        p.power_limit = 0.7;
        let (mut ctrl, port) = controller(p);
        ctrl.set_power(5.0);
        run_cycles(&mut ctrl, 0.0, 1);
        assert_eq!(port.power(), 0.7);
        ctrl.set_power(-5.0);
        run_cycles(&mut ctrl, 1.0, 1);
        assert_eq!(port.power(), -0.7);
    }

    #[test]
    fn gravity_compensation_is_a_step() {
        let (ctrl, port) = controller(params());
        // Holding power 0.1 once off the floor zone below 1.0.
        let mut ctrl = ctrl.with_compensation(|pos| if pos >= 1.0 { 0.1 } else { 0.0 });

        port.set_position(0.5);
        run_cycles(&mut ctrl, 0.0, 1);
        assert_eq!(port.power(), 0.0);

        port.set_position(2.0);
        run_cycles(&mut ctrl, 1.0, 1);
        assert!((port.power() - 0.1).abs() < 1e-12);

        // Independent of commanded direction.
        ctrl.set_power(-0.2);
        run_cycles(&mut ctrl, 2.0, 1);
        assert!((port.power() - (-0.1)).abs() < 1e-12);
    }

    #[test]
    fn soft_limits_clamp_and_flag() {
        let mut p = params();
        p.lower_limit = Some(0.0);
        p.upper_limit = Some(10.0);
        let (mut ctrl, port) = controller(p);

        port.set_position(10.5);
        ctrl.set_power(0.5);
        run_cycles(&mut ctrl, 0.0, 1);
        assert_eq!(port.power(), 0.0);
        assert!(ctrl.faults().contains(ActuatorFault::UPPER_LIMIT));

        // Commanding away from the limit clears the flag.
        ctrl.set_power(-0.5);
        run_cycles(&mut ctrl, 1.0, 1);
        assert_eq!(port.power(), -0.5);
        assert!(!ctrl.faults().contains(ActuatorFault::UPPER_LIMIT));

        port.set_position(-0.5);
        run_cycles(&mut ctrl, 2.0, 1);
        assert_eq!(port.power(), 0.0);
        assert!(ctrl.faults().contains(ActuatorFault::LOWER_LIMIT));
    }

    fn stall_params() -> ActuatorParams {
        let mut p = params();
        p.stall = Some(StallProtection {
            min_power: 0.15,
            tolerance: 0.1,
            timeout: 0.2,
            reset_timeout: 0.4,
        });
        p
    }

    #[test]
    fn stall_declares_fault_and_zeroes_power() {
        let (mut ctrl, port) = controller(stall_params());
        ctrl.set_power(0.15); // exactly min_power, position held constant

        // > timeout seconds of no motion.
        run_cycles(&mut ctrl, 0.0, 15);
        assert!(ctrl.is_stalled());
        assert_eq!(port.power(), 0.0);
    }

    #[test]
    fn stall_rearms_after_commanded_zero() {
        let (mut ctrl, port) = controller(stall_params());
        ctrl.set_power(0.2);
        let ctx = run_cycles(&mut ctrl, 0.0, 15);
        assert!(ctrl.is_stalled());

        // Still commanding power: fault persists.
        let ctx2 = {
            let mut c = ctx;
            for _ in 0..30 {
                ctrl.update(&c);
                c = c.next(c.now + DT);
            }
            c
        };
        assert!(ctrl.is_stalled());

        // Commanded zero for reset_timeout → re-arms.
        ctrl.set_power(0.0);
        let mut c = ctx2;
        for _ in 0..25 {
            ctrl.update(&c);
            c = c.next(c.now + DT);
        }
        assert!(!ctrl.is_stalled());

        // A new nonzero command is accepted again.
        ctrl.set_power(0.5);
        ctrl.update(&c);
        assert_eq!(port.power(), 0.5);
    }

    #[test]
    fn stall_zero_reset_timeout_rearms_immediately() {
        let mut p = stall_params();
        p.stall.as_mut().unwrap().reset_timeout = 0.0;
        let (mut ctrl, _port) = controller(p);
        ctrl.set_power(0.2);
        let ctx = run_cycles(&mut ctrl, 0.0, 15);
        assert!(ctrl.is_stalled());

        ctrl.set_power(0.0);
        ctrl.update(&ctx);
        assert!(!ctrl.is_stalled());
    }

    #[test]
    fn stall_cancels_inflight_completion() {
        let (mut ctrl, _port) = controller(stall_params());
        let ev = Event::new("move");
        // Position target far away → PID saturates above min_power.
        ctrl.set_position_target(100.0, Some(ev.clone()));
        run_cycles(&mut ctrl, 0.0, 15);
        assert!(ctrl.is_stalled());
        assert!(ev.is_canceled());
        assert_eq!(ctrl.target(), None);
    }

    #[test]
    fn reset_stall_clears_fault() {
        let (mut ctrl, _port) = controller(stall_params());
        ctrl.set_power(0.2);
        run_cycles(&mut ctrl, 0.0, 15);
        assert!(ctrl.is_stalled());
        ctrl.reset_stall();
        assert!(!ctrl.is_stalled());
    }

    #[test]
    fn moving_actuator_does_not_stall() {
        let (mut ctrl, port) = controller(stall_params());
        ctrl.set_power(0.5);
        let mut ctx = CycleContext::new(0.0, DT);
        for i in 0..50 {
            port.set_position(i as f64 * 0.2); // keeps moving
            ctrl.update(&ctx);
            ctx = ctx.next(ctx.now + DT);
        }
        assert!(!ctrl.is_stalled());
    }

    fn preset_params() -> ActuatorParams {
        let mut p = params();
        p.presets = Some(PresetTable {
            tolerance: 1.0,
            positions: heapless::Vec::from_slice(&[18.0, 28.0]).unwrap(),
        });
        p
    }

    #[test]
    fn preset_move_targets_indexed_position() {
        let (mut ctrl, _port) = controller(preset_params());
        ctrl.move_to_preset(0, None);
        assert_eq!(ctrl.target(), Some(18.0));
        ctrl.move_to_preset(1, None);
        assert_eq!(ctrl.target(), Some(28.0));
        // Out-of-range index clamps.
        ctrl.move_to_preset(99, None);
        assert_eq!(ctrl.target(), Some(28.0));
    }

    #[test]
    fn preset_up_down_navigation() {
        let (mut ctrl, port) = controller(preset_params());
        port.set_position(20.0);
        ctrl.preset_up(None);
        assert_eq!(ctrl.target(), Some(28.0));

        ctrl.preset_down(None);
        assert_eq!(ctrl.target(), Some(18.0));
    }

    #[test]
    fn preset_up_at_top_cancels_event() {
        let (mut ctrl, port) = controller(preset_params());
        port.set_position(28.0);
        let ev = Event::new("up");
        ctrl.preset_up(Some(ev.clone()));
        assert!(ev.is_canceled());
        assert_eq!(ctrl.target(), None);
    }

    #[test]
    fn nearest_preset_index() {
        let (ctrl, port) = controller(preset_params());
        port.set_position(20.0);
        assert_eq!(ctrl.nearest_preset(), Some(0));
        port.set_position(26.0);
        assert_eq!(ctrl.nearest_preset(), Some(1));
    }

    #[test]
    fn params_validation() {
        assert!(params().validate().is_ok());

        let mut bad = params();
        bad.scale = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = params();
        bad.power_limit = 0.0;
        assert!(bad.validate().is_err());

        let mut bad = preset_params();
        bad.presets.as_mut().unwrap().positions = heapless::Vec::from_slice(&[28.0, 18.0]).unwrap();
        assert!(bad.validate().is_err());

        let mut bad = params();
        bad.lower_limit = Some(10.0);
        bad.upper_limit = Some(5.0);
        assert!(bad.validate().is_err());
    }
}

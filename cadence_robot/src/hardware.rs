//! Simulated hardware ports.
//!
//! First-order motor and instant servo models behind the `cadence_core`
//! port traits, used by the demo binary and the integration tests. Handles
//! are clonable so a test can hold the same device the controller writes to.

use std::cell::RefCell;
use std::rc::Rc;

use cadence_core::actuator::ActuatorPort;
use cadence_core::servo::ServoPort;

/// Simulated DC motor with encoder.
///
/// Velocity follows the commanded power through a first-order lag; the
/// test or demo loop advances the model with [`SimMotor::step`] between
/// control cycles.
#[derive(Clone)]
pub struct SimMotor {
    state: Rc<RefCell<SimMotorState>>,
}

struct SimMotorState {
    /// Last commanded power, [-1, 1].
    power: f64,
    /// Encoder velocity [counts/s].
    velocity: f64,
    /// Encoder position [counts].
    position: f64,
    /// Free speed at full power [counts/s].
    max_speed: f64,
    /// First-order lag time constant [s].
    time_constant: f64,
    /// When held, the motor ignores power and does not move (stalled).
    held: bool,
}

impl SimMotor {
    /// `max_speed` in counts/s at full power, `time_constant` in seconds.
    pub fn new(max_speed: f64, time_constant: f64) -> Self {
        Self {
            state: Rc::new(RefCell::new(SimMotorState {
                power: 0.0,
                velocity: 0.0,
                position: 0.0,
                max_speed,
                time_constant,
                held: false,
            })),
        }
    }

    /// Advance the model by `dt` seconds.
    pub fn step(&self, dt: f64) {
        let mut s = self.state.borrow_mut();
        if s.held {
            s.velocity = 0.0;
            return;
        }
        let target = s.power * s.max_speed;
        let alpha = if s.time_constant > 0.0 {
            (dt / s.time_constant).min(1.0)
        } else {
            1.0
        };
        s.velocity += (target - s.velocity) * alpha;
        s.position += s.velocity * dt;
    }

    /// Jam the mechanism: power is accepted but produces no motion.
    pub fn set_held(&self, held: bool) {
        self.state.borrow_mut().held = held;
    }

    /// Force the encoder position [counts].
    pub fn set_position(&self, position: f64) {
        self.state.borrow_mut().position = position;
    }

    pub fn power(&self) -> f64 {
        self.state.borrow().power
    }

    pub fn position(&self) -> f64 {
        self.state.borrow().position
    }

    pub fn velocity(&self) -> f64 {
        self.state.borrow().velocity
    }
}

impl ActuatorPort for SimMotor {
    fn raw_position(&self) -> f64 {
        self.state.borrow().position
    }

    fn raw_velocity(&self) -> f64 {
        self.state.borrow().velocity
    }

    fn set_power(&mut self, power: f64) {
        self.state.borrow_mut().power = power.clamp(-1.0, 1.0);
    }
}

/// Simulated hobby servo: the physical position tracks the command
/// instantly (real travel time is modeled by the controller's advisory
/// timed moves, not here).
#[derive(Clone, Default)]
pub struct SimServo {
    position: Rc<RefCell<f64>>,
}

impl SimServo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical position last written by the controller.
    pub fn physical(&self) -> f64 {
        *self.position.borrow()
    }
}

impl ServoPort for SimServo {
    fn set_position(&mut self, position: f64) {
        *self.position.borrow_mut() = position;
    }

    fn position(&self) -> f64 {
        *self.position.borrow()
    }
}

/// Full simulated actuator set for the demo binary and integration tests.
///
/// The rig keeps its own handles to every device so callers can inspect
/// or perturb them while a [`crate::robot::Robot`] built from
/// [`SimRig::hardware`] drives the same devices.
pub struct SimRig {
    pub flywheel: SimMotor,
    pub elevator: SimMotor,
    pub hang: SimMotor,
    pub trigger: SimServo,
    pub wrist_tilt: SimServo,
    pub wrist_roll: SimServo,
    pub intake_left: SimServo,
    pub intake_right: SimServo,
}

impl SimRig {
    pub fn new() -> Self {
        Self {
            // Free speeds in counts/s, lags loosely modeled on the real
            // mechanisms.
            flywheel: SimMotor::new(2800.0, 0.2),
            elevator: SimMotor::new(2000.0, 0.05),
            hang: SimMotor::new(3000.0, 0.05),
            trigger: SimServo::new(),
            wrist_tilt: SimServo::new(),
            wrist_roll: SimServo::new(),
            intake_left: SimServo::new(),
            intake_right: SimServo::new(),
        }
    }

    /// Port bundle for [`crate::robot::Robot::new`]. The rig's own handles
    /// stay attached to the same devices.
    pub fn hardware(&self) -> crate::robot::RobotHardware {
        crate::robot::RobotHardware {
            flywheel_motor: Box::new(self.flywheel.clone()),
            trigger_servo: Box::new(self.trigger.clone()),
            elevator_motor: Box::new(self.elevator.clone()),
            hang_motor: Box::new(self.hang.clone()),
            wrist_tilt_servo: Box::new(self.wrist_tilt.clone()),
            wrist_roll_servo: Box::new(self.wrist_roll.clone()),
            intake_left_servo: Box::new(self.intake_left.clone()),
            intake_right_servo: Box::new(self.intake_right.clone()),
        }
    }

    /// Advance every motor model by `dt` seconds.
    pub fn step(&self, dt: f64) {
        self.flywheel.step(dt);
        self.elevator.step(dt);
        self.hang.step(dt);
    }
}

impl Default for SimRig {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motor_spins_up_toward_free_speed() {
        let motor = SimMotor::new(1000.0, 0.1);
        let mut port = motor.clone();
        port.set_power(1.0);

        for _ in 0..100 {
            motor.step(0.02);
        }
        assert!(motor.velocity() > 990.0);
        assert!(motor.position() > 0.0);
    }

    #[test]
    fn held_motor_does_not_move() {
        let motor = SimMotor::new(1000.0, 0.1);
        motor.set_held(true);
        let mut port = motor.clone();
        port.set_power(1.0);

        for _ in 0..50 {
            motor.step(0.02);
        }
        assert_eq!(motor.velocity(), 0.0);
        assert_eq!(motor.position(), 0.0);
    }

    #[test]
    fn power_clamped() {
        let motor = SimMotor::new(1000.0, 0.1);
        let mut port = motor.clone();
        port.set_power(2.5);
        assert_eq!(motor.power(), 1.0);
    }

    #[test]
    fn servo_tracks_command() {
        let servo = SimServo::new();
        let mut port = servo.clone();
        port.set_position(0.42);
        assert_eq!(servo.physical(), 0.42);
    }
}

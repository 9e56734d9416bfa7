//! Robot parameter set: TOML loading with validation.
//!
//! All tunable constants live in one immutable [`RobotParams`] value built
//! at robot initialization. Defaults carry the tuned values from the
//! competition robot; a TOML file can override any section. There is no
//! process-wide mutable parameter state.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cadence_core::actuator::{ActuatorParams, PresetTable, StallProtection};
use cadence_core::pid::PidCoefficients;

// goBILDA 5203-312 encoder: pulses per motor revolution.
const GOBILDA_5203_312_PPR: f64 = (1.0 + 46.0 / 17.0) * (1.0 + 46.0 / 11.0) * 28.0;

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("config validation: {0}")]
    Validation(String),
}

/// Complete immutable robot parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotParams {
    /// Robot display name.
    pub robot_name: String,
    /// Elapsed match time at which end-game verbs unlock [s].
    pub end_game_time: f64,
    pub launcher: LauncherParams,
    pub elevator: ElevatorParams,
    pub hang: HangParams,
    pub wrist: WristParams,
    pub intake: IntakeParams,
}

impl Default for RobotParams {
    fn default() -> Self {
        Self {
            robot_name: "cadence".into(),
            end_game_time: 90.0,
            launcher: LauncherParams::default(),
            elevator: ElevatorParams::default(),
            hang: HangParams::default(),
            wrist: WristParams::default(),
            intake: IntakeParams::default(),
        }
    }
}

/// Projectile launcher: flywheel motor + trigger servo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherParams {
    pub motor_inverted: bool,
    pub servo_inverted: bool,
    /// Flywheel revolutions per encoder count.
    pub rev_per_count: f64,
    /// Velocity PID for the flywheel; tolerance in rev/s.
    pub pid: PidCoefficients,
    /// Launch speed [RPM].
    pub launch_rpm: f64,
    /// Flywheel free speed [RPM]; kF is normally 1/(max_rpm/60).
    pub max_rpm: f64,
    /// Trigger servo travel time [s].
    pub trigger_time: f64,
    /// Trigger servo rest position.
    pub servo_rest_pos: f64,
    /// Trigger servo fire position.
    pub servo_fire_pos: f64,
}

impl Default for LauncherParams {
    fn default() -> Self {
        let max_rpm = 1620.0;
        Self {
            motor_inverted: true,
            servo_inverted: false,
            rev_per_count: 1.0 / 103.8,
            pid: PidCoefficients {
                kp: 0.05,
                ki: 0.0,
                kd: 0.0,
                kf: 60.0 / max_rpm,
                izone: 0.0,
                tolerance: 15.0 / 60.0, // 15 RPM in rev/s
            },
            launch_rpm: 1000.0,
            max_rpm,
            trigger_time: 1.0,
            servo_rest_pos: 0.30,
            servo_fire_pos: 0.18,
        }
    }
}

impl LauncherParams {
    /// Actuator configuration for the flywheel (position in revolutions,
    /// velocity in rev/s).
    pub fn flywheel_actuator(&self) -> ActuatorParams {
        ActuatorParams {
            scale: self.rev_per_count,
            offset: 0.0,
            inverted: self.motor_inverted,
            power_limit: 1.0,
            pid: self.pid,
            stall: None,
            presets: None,
            lower_limit: None,
            upper_limit: None,
        }
    }
}

/// Linear elevator with presets and gravity compensation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevatorParams {
    pub motor_inverted: bool,
    pub power_limit: f64,
    /// Inches per encoder count.
    pub inches_per_count: f64,
    /// Height of the fully-retracted carriage [in].
    pub offset: f64,
    pub min_height: f64,
    pub max_height: f64,
    pub pid: PidCoefficients,
    pub stall: StallProtection,
    /// Preset heights [in], ascending.
    pub presets: Vec<f64>,
    pub preset_tolerance: f64,
    /// Holding power applied at or above the compensation threshold
    /// (0 = disabled). Below it the elevator rests on its floor stop.
    pub gravity_comp_power: f64,
    pub gravity_comp_threshold: f64,
}

impl Default for ElevatorParams {
    fn default() -> Self {
        Self {
            motor_inverted: true,
            power_limit: 0.7,
            inches_per_count: 23.8 / 2690.0,
            offset: 10.4,
            min_height: 10.4,
            max_height: 34.0,
            pid: PidCoefficients {
                kp: 0.85,
                ki: 0.7,
                kd: 0.025,
                kf: 0.0,
                izone: 1.0,
                tolerance: 0.25,
            },
            stall: StallProtection {
                min_power: 0.15,
                tolerance: 0.1,
                timeout: 0.2,
                reset_timeout: 0.0,
            },
            presets: vec![18.0, 28.0],
            preset_tolerance: 1.0,
            gravity_comp_power: 0.0,
            gravity_comp_threshold: 11.0,
        }
    }
}

impl ElevatorParams {
    pub fn actuator(&self) -> Result<ActuatorParams, ConfigError> {
        let positions = heapless::Vec::from_slice(&self.presets).map_err(|_| {
            ConfigError::Validation(format!(
                "elevator: more than {} presets",
                cadence_core::actuator::MAX_PRESETS
            ))
        })?;
        Ok(ActuatorParams {
            scale: self.inches_per_count,
            offset: self.offset,
            inverted: self.motor_inverted,
            power_limit: self.power_limit,
            pid: self.pid,
            stall: Some(self.stall),
            presets: Some(PresetTable {
                tolerance: self.preset_tolerance,
                positions,
            }),
            lower_limit: Some(self.min_height),
            upper_limit: Some(self.max_height),
        })
    }
}

/// Hanging arm, position in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HangParams {
    pub motor_inverted: bool,
    pub power_limit: f64,
    /// Arm degrees per encoder count.
    pub deg_per_count: f64,
    /// Arm angle at the resting hard stop [deg].
    pub offset: f64,
    pub min_angle: f64,
    pub max_angle: f64,
    /// Pre-hang deployment angle [deg].
    pub setup_angle: f64,
    /// Angle while supporting the robot [deg].
    pub hanging_angle: f64,
    pub pid: PidCoefficients,
    pub stall: StallProtection,
    /// Holding power above the compensation threshold (0 = disabled).
    pub gravity_comp_power: f64,
    pub gravity_comp_threshold: f64,
}

impl Default for HangParams {
    fn default() -> Self {
        Self {
            motor_inverted: false,
            power_limit: 1.0,
            deg_per_count: 360.0 / GOBILDA_5203_312_PPR / 28.0,
            offset: 55.0,
            min_angle: 55.0,
            max_angle: 180.0,
            setup_angle: 165.0,
            hanging_angle: 120.0,
            pid: PidCoefficients {
                kp: 0.02,
                ki: 0.0,
                kd: 0.0,
                kf: 0.0,
                izone: 0.0,
                tolerance: 0.5,
            },
            stall: StallProtection {
                min_power: 0.25,
                tolerance: 0.1,
                timeout: 0.2,
                reset_timeout: 0.0,
            },
            gravity_comp_power: 0.0,
            gravity_comp_threshold: 60.0,
        }
    }
}

impl HangParams {
    pub fn actuator(&self) -> ActuatorParams {
        ActuatorParams {
            scale: self.deg_per_count,
            offset: self.offset,
            inverted: self.motor_inverted,
            power_limit: self.power_limit,
            pid: self.pid,
            stall: Some(self.stall),
            presets: None,
            lower_limit: Some(self.min_angle),
            upper_limit: Some(self.max_angle),
        }
    }
}

/// Two-axis wrist: up/down tilt servo + left/right roll servo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WristParams {
    pub up_down_inverted: bool,
    pub left_right_inverted: bool,
    pub grounded_pos: f64,
    pub board_pos: f64,
    pub board_inverted_pos: f64,
    pub flat_pos: f64,
    pub invert_pos: f64,
    /// Advisory servo travel time [s].
    pub servo_time: f64,
}

impl Default for WristParams {
    fn default() -> Self {
        Self {
            up_down_inverted: false,
            left_right_inverted: false,
            grounded_pos: 0.52,
            board_pos: 0.70,
            board_inverted_pos: 0.08,
            flat_pos: 0.73,
            invert_pos: 0.05,
            servo_time: 0.40,
        }
    }
}

/// Claw intake: two mirrored servos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeParams {
    pub left_inverted: bool,
    pub right_inverted: bool,
    pub left_open_pos: f64,
    pub left_closed_pos: f64,
    pub right_open_pos: f64,
    pub right_closed_pos: f64,
    /// Advisory claw travel time [s].
    pub servo_time: f64,
}

impl Default for IntakeParams {
    fn default() -> Self {
        Self {
            left_inverted: false,
            right_inverted: false,
            left_open_pos: 0.95,
            left_closed_pos: 0.65,
            right_open_pos: 0.18,
            right_closed_pos: 0.52,
            servo_time: 0.5,
        }
    }
}

impl RobotParams {
    /// Load parameters from a TOML file and validate them.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
        let params: Self =
            toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Validate parameter bounds across all subsystems.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.end_game_time < 0.0 {
            return Err(ConfigError::Validation("end_game_time must be >= 0".into()));
        }

        self.launcher
            .flywheel_actuator()
            .validate()
            .map_err(|e| ConfigError::Validation(format!("launcher: {e}")))?;
        if self.launcher.launch_rpm <= 0.0 || self.launcher.launch_rpm > self.launcher.max_rpm {
            return Err(ConfigError::Validation(format!(
                "launcher: launch_rpm {} outside (0, {}]",
                self.launcher.launch_rpm, self.launcher.max_rpm
            )));
        }
        if self.launcher.trigger_time <= 0.0 {
            return Err(ConfigError::Validation(
                "launcher: trigger_time must be > 0".into(),
            ));
        }

        self.elevator
            .actuator()?
            .validate()
            .map_err(|e| ConfigError::Validation(format!("elevator: {e}")))?;
        for &p in &self.elevator.presets {
            if p < self.elevator.min_height || p > self.elevator.max_height {
                return Err(ConfigError::Validation(format!(
                    "elevator: preset {p} outside [{}, {}]",
                    self.elevator.min_height, self.elevator.max_height
                )));
            }
        }

        self.hang
            .actuator()
            .validate()
            .map_err(|e| ConfigError::Validation(format!("hang: {e}")))?;
        for (name, angle) in [
            ("setup_angle", self.hang.setup_angle),
            ("hanging_angle", self.hang.hanging_angle),
        ] {
            if angle < self.hang.min_angle || angle > self.hang.max_angle {
                return Err(ConfigError::Validation(format!(
                    "hang: {name} {angle} outside [{}, {}]",
                    self.hang.min_angle, self.hang.max_angle
                )));
            }
        }

        for (name, pos) in [
            ("launcher.servo_rest_pos", self.launcher.servo_rest_pos),
            ("launcher.servo_fire_pos", self.launcher.servo_fire_pos),
            ("wrist.grounded_pos", self.wrist.grounded_pos),
            ("wrist.board_pos", self.wrist.board_pos),
            ("wrist.board_inverted_pos", self.wrist.board_inverted_pos),
            ("wrist.flat_pos", self.wrist.flat_pos),
            ("wrist.invert_pos", self.wrist.invert_pos),
            ("intake.left_open_pos", self.intake.left_open_pos),
            ("intake.left_closed_pos", self.intake.left_closed_pos),
            ("intake.right_open_pos", self.intake.right_open_pos),
            ("intake.right_closed_pos", self.intake.right_closed_pos),
        ] {
            if !(0.0..=1.0).contains(&pos) {
                return Err(ConfigError::Validation(format!(
                    "{name} = {pos} outside [0, 1]"
                )));
            }
        }
        if self.wrist.servo_time <= 0.0 {
            return Err(ConfigError::Validation(
                "wrist: servo_time must be > 0".into(),
            ));
        }
        if self.intake.servo_time <= 0.0 {
            return Err(ConfigError::Validation(
                "intake: servo_time must be > 0".into(),
            ));
        }

        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

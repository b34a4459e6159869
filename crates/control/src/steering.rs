//! Steering and Drive
//!
//! Turns the two normalized control axes plus a brake flag into wheel commands.
//! Steering authority shrinks with speed and the handlebar eases toward its
//! target instead of snapping.

use serde::{Deserialize, Serialize};
use simcore::{check_positive, check_range, lerp, lerp_angle, DriveCommand, Model, ParamError};

/// Steering limit approached at high speed (degrees)
const HIGH_SPEED_STEERING_ANGLE: f64 = 5.0;
/// Speed (m/s) at which a full reduction factor reaches the high speed limit
const STEERING_REDUCTION_SPEED: f64 = 30.0;
/// Per-tick fraction of `turn_smoothing` at the reference tick
const SMOOTHING_SCALE: f64 = 0.1;
/// Tick length the smoothing rate is expressed against (50 Hz)
const REFERENCE_DT: f64 = 0.02;
/// Largest accepted steering limit (degrees); turn geometry diverges at 90°
pub const MAX_STEERING_LIMIT: f64 = 89.0;

/// Normalized rider input for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlInput {
    /// Steer axis, -1 (left) to 1 (right)
    pub horizontal: f64,
    /// Throttle axis, -1 (reverse) to 1 (forward)
    pub vertical: f64,
    pub braking: bool,
}

impl ControlInput {
    /// Builds an input with both axes saturated to [-1, 1]. NaN reads as neutral.
    pub fn new(horizontal: f64, vertical: f64, braking: bool) -> Self {
        ControlInput {
            horizontal: saturate(horizontal),
            vertical: saturate(vertical),
            braking,
        }
    }

    pub fn neutral() -> Self {
        Self::default()
    }
}

fn saturate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(-1.0, 1.0) }
}

/// Configuration for drive and steering
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Rear wheel torque at full throttle (N·m)
    pub motor_force: f64,
    /// Brake torque per wheel while braking (N·m)
    pub brake_force: f64,
    /// Steering limit at standstill (degrees)
    pub max_steering_angle: f64,
    /// How much speed reduces the steering limit, 0 (none) to 1 (full)
    pub steer_reduction: f64,
    /// Handlebar responsiveness, 0.001 (sluggish) to 1 (fast)
    pub turn_smoothing: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        DriveConfig {
            motor_force: 150.0,
            brake_force: 300.0,
            max_steering_angle: 35.0,
            steer_reduction: 0.5,
            turn_smoothing: 0.5,
        }
    }
}

impl DriveConfig {
    pub fn with_motor_force(mut self, motor_force: f64) -> Self {
        self.motor_force = motor_force;
        self
    }

    pub fn with_brake_force(mut self, brake_force: f64) -> Self {
        self.brake_force = brake_force;
        self
    }

    pub fn with_max_steering_angle(mut self, angle: f64) -> Self {
        self.max_steering_angle = angle;
        self
    }

    pub fn with_steer_reduction(mut self, amount: f64) -> Self {
        self.steer_reduction = amount;
        self
    }

    pub fn with_turn_smoothing(mut self, smoothing: f64) -> Self {
        self.turn_smoothing = smoothing;
        self
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        check_range("motor_force", self.motor_force, 0.0, f64::MAX)?;
        check_range("brake_force", self.brake_force, 0.0, f64::MAX)?;
        check_range("max_steering_angle", self.max_steering_angle, 0.0, MAX_STEERING_LIMIT)?;
        check_range("steer_reduction", self.steer_reduction, 0.0, 1.0)?;
        check_positive("turn_smoothing", self.turn_smoothing)?;
        check_range("turn_smoothing", self.turn_smoothing, 0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SteeringState {
    /// Smoothed handlebar angle (degrees)
    pub current_steering_angle: f64,
    /// Steering limit at the last update's speed (degrees)
    pub max_steering_angle_at_speed: f64,
}

/// Maps control axes to steer, motor and brake commands.
#[derive(Debug, Clone)]
pub struct SteeringAndDriveModel {
    config: DriveConfig,
    state: SteeringState,
}

impl SteeringAndDriveModel {
    pub fn new(config: DriveConfig) -> Self {
        let state = SteeringState {
            current_steering_angle: 0.0,
            max_steering_angle_at_speed: config.max_steering_angle,
        };
        Self { config, state }
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    pub fn state(&self) -> SteeringState {
        self.state
    }

    /// Steering limit at `speed`, easing from the configured maximum to 5°.
    pub fn max_steering_at_speed(&self, speed: f64) -> f64 {
        let t = (speed / STEERING_REDUCTION_SPEED * self.config.steer_reduction).clamp(0.0, 1.0);
        lerp_angle(self.config.max_steering_angle, HIGH_SPEED_STEERING_ANGLE, t)
    }

    /// Fraction of the remaining steering error closed in a tick of length `dt`.
    fn smoothing_factor(&self, dt: f64) -> f64 {
        if dt <= 0.0 {
            return 0.0;
        }
        let per_reference_tick = (self.config.turn_smoothing * SMOOTHING_SCALE).clamp(0.0, 1.0);
        1.0 - (1.0 - per_reference_tick).powf(dt / REFERENCE_DT)
    }

    /// Advance the handlebar and compute this tick's wheel commands
    pub fn update(&mut self, input: ControlInput, speed: f64, dt: f64) -> DriveCommand {
        let input = ControlInput::new(input.horizontal, input.vertical, input.braking);

        self.state.max_steering_angle_at_speed = self.max_steering_at_speed(speed);
        let target = self.state.max_steering_angle_at_speed * input.horizontal;
        self.state.current_steering_angle = lerp(
            self.state.current_steering_angle,
            target,
            self.smoothing_factor(dt),
        );

        let (motor_torque, brake_torque) = if input.braking {
            (0.0, self.config.brake_force)
        } else {
            (input.vertical * self.config.motor_force, 0.0)
        };

        DriveCommand {
            steer_angle: self.state.current_steering_angle,
            motor_torque,
            brake_torque,
        }
    }
}

impl Model for SteeringAndDriveModel {
    fn reset(&mut self) {
        self.state = SteeringState {
            current_steering_angle: 0.0,
            max_steering_angle_at_speed: self.config.max_steering_angle,
        };
    }
}

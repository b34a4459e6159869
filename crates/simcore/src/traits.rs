use nalgebra::{UnitQuaternion, Vector3};
use thiserror::Error;

use crate::math::wrap_degrees;

// Body frame: +X right, +Y up, +Z forward. Lean is the roll about +Z.

/// Snapshot of the vehicle body as reported by the physics engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleKinematicState {
    pub position: Vector3<f64>,
    pub linear_velocity: Vector3<f64>,
    pub angular_velocity: Vector3<f64>,
    pub orientation: UnitQuaternion<f64>,
}

impl Default for VehicleKinematicState {
    fn default() -> Self {
        VehicleKinematicState {
            position: Vector3::zeros(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            orientation: UnitQuaternion::identity(),
        }
    }
}

impl VehicleKinematicState {
    /// Magnitude of the linear velocity in m/s.
    pub fn speed(&self) -> f64 {
        self.linear_velocity.norm()
    }

    pub fn forward(&self) -> Vector3<f64> {
        self.orientation * Vector3::z()
    }

    pub fn right(&self) -> Vector3<f64> {
        self.orientation * Vector3::x()
    }

    pub fn up(&self) -> Vector3<f64> {
        self.orientation * Vector3::y()
    }

    /// Signed roll of the body about its forward axis in degrees, wrapped to (-180, 180].
    ///
    /// Matches the Z component of a ZXY euler decomposition, so yaw and moderate
    /// pitch do not leak into the reading.
    pub fn lean_angle(&self) -> f64 {
        let right = self.right();
        let up = self.up();
        wrap_degrees(right.y.atan2(up.y).to_degrees())
    }

    /// Transforms a world-space point into the body frame.
    pub fn inverse_transform_point(&self, point: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.inverse() * (point - self.position)
    }

    /// Transforms a world-space direction into the body frame.
    pub fn inverse_transform_direction(&self, direction: &Vector3<f64>) -> Vector3<f64> {
        self.orientation.inverse() * direction
    }
}

/// How a force or torque request is integrated by the rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// Continuous, scaled by the tick length during integration
    Force,
    /// Instantaneous change in momentum
    Impulse,
}

/// Linear and angular drag coefficients of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damping {
    pub linear: f64,
    pub angular: f64,
}

/// Wheel-level commands sent to the physics engine each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DriveCommand {
    /// Front wheel steer angle in degrees
    pub steer_angle: f64,
    /// Rear wheel drive torque (N·m)
    pub motor_torque: f64,
    /// Brake torque applied to each wheel (N·m)
    pub brake_torque: f64,
}

impl DriveCommand {
    /// No drive, no brake, wheels straight.
    pub fn idle() -> Self {
        DriveCommand::default()
    }

    /// Returns the command with an extra steering bias added.
    pub fn with_steer_bias(mut self, bias: f64) -> Self {
        self.steer_angle += bias;
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimContext {
    pub dt: f64,
    pub t: f64,
}

pub trait Model {
    fn reset(&mut self);
}

/// The rigid-body engine the vehicle lives in.
///
/// The balance model only reads kinematics and writes forces, torques and
/// wheel commands; integration belongs to the engine.
pub trait RigidBody {
    fn kinematic_state(&self) -> VehicleKinematicState;

    /// Applies a world-space force at the center of mass.
    fn add_force(&mut self, force: Vector3<f64>, mode: ForceMode);

    /// Applies a world-space torque.
    fn add_torque(&mut self, torque: Vector3<f64>, mode: ForceMode);

    fn apply_drive(&mut self, command: DriveCommand);

    /// Advances the body by one fixed tick, consuming accumulated loads.
    fn integrate(&mut self, ctx: SimContext);

    fn set_pose(&mut self, position: Vector3<f64>, orientation: UnitQuaternion<f64>);

    fn set_velocities(&mut self, linear: Vector3<f64>, angular: Vector3<f64>);

    fn damping(&self) -> Damping;

    fn set_damping(&mut self, damping: Damping);
}

/// A tunable that failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid parameter `{name}`: {reason}")]
pub struct ParamError {
    pub name: &'static str,
    pub reason: String,
}

impl ParamError {
    pub fn new(name: &'static str, reason: impl Into<String>) -> Self {
        ParamError {
            name,
            reason: reason.into(),
        }
    }
}

/// Fails unless `value` is finite and within `[min, max]`.
pub fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<(), ParamError> {
    if !value.is_finite() {
        return Err(ParamError::new(name, format!("{value} is not finite")));
    }
    if value < min || value > max {
        return Err(ParamError::new(name, format!("{value} outside [{min}, {max}]")));
    }
    Ok(())
}

/// Fails unless `value` is finite and strictly positive.
pub fn check_positive(name: &'static str, value: f64) -> Result<(), ParamError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ParamError::new(name, format!("{value} must be positive")));
    }
    Ok(())
}

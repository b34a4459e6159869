use nalgebra::{UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Damping, DriveCommand, ForceMode, RigidBody, SimContext, VehicleKinematicState};

/// Mechanical steering lock of the front wheel (degrees)
pub const STEERING_LOCK: f64 = 80.0;

/// Physical properties of the reference two-wheeler body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceBodyConfig {
    /// Total mass of bike and rider in kg.
    pub mass: f64,
    /// Moment of inertia about the roll and pitch axes in kg*m^2.
    pub roll_inertia: f64,
    /// Moment of inertia about the vertical axis in kg*m^2.
    pub yaw_inertia: f64,
    /// Wheel radius in meters.
    pub wheel_radius: f64,
    /// Distance between wheel contact points in meters.
    pub wheelbase: f64,
    /// Rate (1/s) at which sideways sliding is removed by tyre grip.
    pub lateral_grip: f64,
    pub linear_damping: f64,
    pub angular_damping: f64,
}

impl Default for ReferenceBodyConfig {
    fn default() -> Self {
        ReferenceBodyConfig {
            mass: 80.0,
            roll_inertia: 12.0,
            yaw_inertia: 10.0,
            wheel_radius: 0.35,
            wheelbase: 1.05,
            lateral_grip: 8.0,
            linear_damping: 0.0,
            angular_damping: 0.05,
        }
    }
}

/// Semi-implicit Euler rigid body standing in for an external physics engine.
///
/// Planar translation on the ground, free roll and yaw, pitch locked by the
/// two wheel contacts. Yaw follows kinematic bicycle steering plus whatever
/// yaw torque is applied within the tick.
#[derive(Debug, Clone)]
pub struct ReferenceBody {
    pub config: ReferenceBodyConfig,
    state: VehicleKinematicState,
    damping: Damping,
    force: Vector3<f64>,
    torque: Vector3<f64>,
    linear_impulse: Vector3<f64>,
    angular_impulse: Vector3<f64>,
    drive: DriveCommand,
}

impl ReferenceBody {
    pub fn new(config: ReferenceBodyConfig) -> Self {
        let damping = Damping {
            linear: config.linear_damping,
            angular: config.angular_damping,
        };
        ReferenceBody {
            config,
            state: VehicleKinematicState::default(),
            damping,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
            linear_impulse: Vector3::zeros(),
            angular_impulse: Vector3::zeros(),
            drive: DriveCommand::idle(),
        }
    }

    /// Last wheel command received.
    pub fn drive(&self) -> DriveCommand {
        self.drive
    }

    fn heading(&self) -> Vector3<f64> {
        let forward = self.state.forward();
        Vector3::new(forward.x, 0.0, forward.z)
            .try_normalize(1e-9)
            .unwrap_or_else(Vector3::z)
    }

    fn angular_acceleration(&self, torque: &Vector3<f64>) -> Vector3<f64> {
        Vector3::new(
            torque.x / self.config.roll_inertia,
            torque.y / self.config.yaw_inertia,
            torque.z / self.config.roll_inertia,
        )
    }
}

impl Default for ReferenceBody {
    fn default() -> Self {
        ReferenceBody::new(ReferenceBodyConfig::default())
    }
}

impl RigidBody for ReferenceBody {
    fn kinematic_state(&self) -> VehicleKinematicState {
        self.state
    }

    fn add_force(&mut self, force: Vector3<f64>, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.force += force,
            ForceMode::Impulse => self.linear_impulse += force,
        }
    }

    fn add_torque(&mut self, torque: Vector3<f64>, mode: ForceMode) {
        match mode {
            ForceMode::Force => self.torque += torque,
            ForceMode::Impulse => self.angular_impulse += torque,
        }
    }

    fn apply_drive(&mut self, command: DriveCommand) {
        self.drive = command;
    }

    fn integrate(&mut self, ctx: SimContext) {
        let dt = ctx.dt;
        let mass = self.config.mass;
        let radius = self.config.wheel_radius;
        let heading = self.heading();

        // 1. Linear: external loads plus rear wheel drive
        let mut net_force = self.force + heading * (self.drive.motor_torque / radius);
        let mut velocity = self.state.linear_velocity;
        let v_forward = velocity.dot(&heading);

        // Brakes oppose rolling but never reverse it within one tick
        if self.drive.brake_torque > 0.0 && v_forward.abs() > 1e-9 {
            let brake_force = 2.0 * self.drive.brake_torque / radius;
            let stopping_force = mass * v_forward.abs() / dt;
            net_force -= heading * brake_force.min(stopping_force) * v_forward.signum();
        }

        velocity += net_force / mass * dt + self.linear_impulse / mass;

        // Tyres resist sideways sliding
        let forward_part = heading * velocity.dot(&heading);
        let lateral = Vector3::new(velocity.x, 0.0, velocity.z) - forward_part;
        velocity -= lateral * (self.config.lateral_grip * dt).min(1.0);
        velocity.y = 0.0;
        velocity *= (1.0 - self.damping.linear * dt).clamp(0.0, 1.0);

        // 2. Angular: roll from torques, yaw from steering geometry
        let v_forward = velocity.dot(&heading);
        let steer = self.drive.steer_angle.clamp(-STEERING_LOCK, STEERING_LOCK);
        let steer_yaw_rate = v_forward * steer.to_radians().tan() / self.config.wheelbase;

        let mut omega = self.state.angular_velocity
            + self.angular_acceleration(&self.torque) * dt
            + self.angular_acceleration(&self.angular_impulse);
        omega.y = steer_yaw_rate + self.torque.y / self.config.yaw_inertia * dt;

        let right = self.state.right();
        omega -= right * omega.dot(&right);
        omega *= (1.0 - self.damping.angular * dt).clamp(0.0, 1.0);

        // 3. Integrate pose with the new velocities
        self.state.orientation = UnitQuaternion::from_scaled_axis(omega * dt) * self.state.orientation;
        self.state.position += velocity * dt;
        self.state.linear_velocity = velocity;
        self.state.angular_velocity = omega;

        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
        self.linear_impulse = Vector3::zeros();
        self.angular_impulse = Vector3::zeros();
    }

    fn set_pose(&mut self, position: Vector3<f64>, orientation: UnitQuaternion<f64>) {
        self.state.position = position;
        self.state.orientation = orientation;
    }

    fn set_velocities(&mut self, linear: Vector3<f64>, angular: Vector3<f64>) {
        self.state.linear_velocity = linear;
        self.state.angular_velocity = angular;
    }

    fn damping(&self) -> Damping {
        self.damping
    }

    fn set_damping(&mut self, damping: Damping) {
        self.damping = damping;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn ctx() -> SimContext {
        SimContext { dt: 0.01, t: 0.0 }
    }

    #[test]
    fn test_stationary_body_stays_put() {
        let mut body = ReferenceBody::default();
        body.integrate(ctx());

        let state = body.kinematic_state();
        assert_abs_diff_eq!(state.speed(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(state.lean_angle(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_motor_torque_accelerates_forward() {
        let mut body = ReferenceBody::new(ReferenceBodyConfig {
            mass: 50.0,
            wheel_radius: 0.5,
            ..Default::default()
        });
        body.apply_drive(DriveCommand {
            motor_torque: 50.0,
            ..DriveCommand::idle()
        });
        body.integrate(ctx());

        // 50 N·m / 0.5 m = 100 N on 50 kg => 2 m/s^2 for 0.01 s
        let state = body.kinematic_state();
        assert_abs_diff_eq!(state.linear_velocity.z, 0.02, epsilon = 1e-9);
        assert_abs_diff_eq!(state.position.z, 0.0002, epsilon = 1e-9);
    }

    #[test]
    fn test_brake_stops_without_reversing() {
        let mut body = ReferenceBody::default();
        body.set_velocities(Vector3::new(0.0, 0.0, 0.1), Vector3::zeros());
        body.apply_drive(DriveCommand {
            brake_torque: 10_000.0,
            ..DriveCommand::idle()
        });
        body.integrate(ctx());

        assert_abs_diff_eq!(body.kinematic_state().linear_velocity.z, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_roll_torque_leans_body() {
        let mut body = ReferenceBody::default();
        body.add_torque(Vector3::new(0.0, 0.0, 12.0), ForceMode::Force);
        body.integrate(ctx());

        let state = body.kinematic_state();
        // alpha = 12 / 12 = 1 rad/s^2; omega after 0.01 s = 0.01 rad/s (less damping)
        assert!(state.angular_velocity.z > 0.0099 && state.angular_velocity.z <= 0.01);
        assert!(state.lean_angle() > 0.0);
    }

    #[test]
    fn test_impulse_applies_without_dt_scaling() {
        let mut body = ReferenceBody::default();
        body.add_force(Vector3::new(0.0, 0.0, 80.0), ForceMode::Impulse);
        body.integrate(ctx());

        assert_abs_diff_eq!(body.kinematic_state().linear_velocity.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lateral_slide_is_gripped() {
        let mut body = ReferenceBody::default();
        body.set_velocities(Vector3::new(1.0, 0.0, 0.0), Vector3::zeros());
        body.integrate(ctx());

        // 8/s grip for 0.01 s removes 8% of the sideways speed
        assert_abs_diff_eq!(body.kinematic_state().linear_velocity.x, 0.92, epsilon = 1e-9);
    }

    #[test]
    fn test_steering_yaws_moving_body() {
        let mut body = ReferenceBody::default();
        body.set_velocities(Vector3::new(0.0, 0.0, 5.0), Vector3::zeros());
        body.apply_drive(DriveCommand {
            steer_angle: 10.0,
            ..DriveCommand::idle()
        });
        body.integrate(ctx());

        assert!(body.kinematic_state().angular_velocity.y > 0.0);
    }

    #[test]
    fn test_steer_beyond_lock_is_held_at_lock() {
        let yaw_rate = |steer_angle: f64| {
            let mut body = ReferenceBody::default();
            body.set_velocities(Vector3::new(0.0, 0.0, 5.0), Vector3::zeros());
            body.apply_drive(DriveCommand {
                steer_angle,
                ..DriveCommand::idle()
            });
            body.integrate(ctx());
            body.kinematic_state().angular_velocity.y
        };

        let at_lock = yaw_rate(STEERING_LOCK);
        assert!(at_lock.is_finite());
        assert_abs_diff_eq!(yaw_rate(90.0), at_lock, epsilon = 1e-12);
        assert_abs_diff_eq!(yaw_rate(-135.0), -at_lock, epsilon = 1e-12);
    }
}

//! Scripted rider
//!
//! A pair of PD loops that keeps the bike upright and pointed at a goal.
//! Drives the demo binary and serves as a baseline policy when poking at the
//! environment by hand.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use simcore::{Model, VehicleKinematicState};

use crate::steering::ControlInput;

/// Gains and output limits for one PD loop
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PdGains {
    pub kp: f64,
    pub kd: f64,
    pub output_min: f64,
    pub output_max: f64,
}

impl PdGains {
    pub fn new(kp: f64, kd: f64) -> Self {
        Self {
            kp,
            kd,
            output_min: -1.0,
            output_max: 1.0,
        }
    }

    pub fn with_limits(mut self, min: f64, max: f64) -> Self {
        self.output_min = min;
        self.output_max = max;
        self
    }
}

/// Derivative acts on the measurement, so setpoint jumps do not kick.
#[derive(Debug, Clone)]
struct PdLoop {
    gains: PdGains,
    prev_measurement: Option<f64>,
}

impl PdLoop {
    fn new(gains: PdGains) -> Self {
        Self {
            gains,
            prev_measurement: None,
        }
    }

    fn update(&mut self, setpoint: f64, measurement: f64, dt: f64) -> f64 {
        let p_term = self.gains.kp * (setpoint - measurement);
        let d_term = match self.prev_measurement {
            Some(prev) if dt > 0.0 => -self.gains.kd * (measurement - prev) / dt,
            _ => 0.0,
        };
        self.prev_measurement = Some(measurement);
        (p_term + d_term).clamp(self.gains.output_min, self.gains.output_max)
    }

    fn reset(&mut self) {
        self.prev_measurement = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    /// Lean (degrees) to steer axis
    pub balance: PdGains,
    /// Heading error (degrees) to steer axis
    pub heading: PdGains,
    /// Speed the pilot tries to hold (m/s)
    pub cruise_speed: f64,
    /// Throttle per m/s of speed error
    pub throttle_gain: f64,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            balance: PdGains::new(0.12, 0.02),
            heading: PdGains::new(0.02, 0.0).with_limits(-0.4, 0.4),
            cruise_speed: 6.0,
            throttle_gain: 0.5,
        }
    }
}

/// Rider that balances first and steers for the goal second
#[derive(Debug, Clone)]
pub struct Pilot {
    config: PilotConfig,
    balance: PdLoop,
    heading: PdLoop,
    goal: Vector3<f64>,
}

impl Pilot {
    pub fn new(config: PilotConfig, goal: Vector3<f64>) -> Self {
        Self {
            balance: PdLoop::new(config.balance),
            heading: PdLoop::new(config.heading),
            config,
            goal,
        }
    }

    pub fn set_goal(&mut self, goal: Vector3<f64>) {
        self.goal = goal;
    }

    /// Signed horizontal angle (degrees) from the body heading to the goal, positive to the right.
    pub fn heading_error(&self, state: &VehicleKinematicState) -> f64 {
        let forward = state.forward();
        let heading = Vector3::new(forward.x, 0.0, forward.z);
        let to_goal = self.goal - state.position;
        let to_goal = Vector3::new(to_goal.x, 0.0, to_goal.z);
        if heading.norm() < 1e-9 || to_goal.norm() < 1e-9 {
            return 0.0;
        }
        heading.cross(&to_goal).y.atan2(heading.dot(&to_goal)).to_degrees()
    }

    pub fn command(&mut self, state: &VehicleKinematicState, dt: f64) -> ControlInput {
        let lean = state.lean_angle();
        let steer_balance = self.balance.update(0.0, lean, dt);
        let steer_heading = self.heading.update(self.heading_error(state), 0.0, dt);

        let speed_error = self.config.cruise_speed - state.speed();
        let throttle = speed_error * self.config.throttle_gain;

        ControlInput::new(steer_balance + steer_heading, throttle, false)
    }
}

impl Model for Pilot {
    fn reset(&mut self) {
        self.balance.reset();
        self.heading.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::UnitQuaternion;

    fn state(lean: f64, speed: f64) -> VehicleKinematicState {
        VehicleKinematicState {
            linear_velocity: Vector3::new(0.0, 0.0, speed),
            orientation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), lean.to_radians()),
            ..Default::default()
        }
    }

    #[test]
    fn test_goal_to_the_right_steers_right() {
        let mut pilot = Pilot::new(PilotConfig::default(), Vector3::new(10.0, 0.0, 10.0));
        let upright = state(0.0, 6.0);
        assert!(pilot.heading_error(&upright) > 44.0);
        assert!(pilot.command(&upright, 0.02).horizontal > 0.0);
    }

    #[test]
    fn test_set_goal_retargets_heading() {
        let mut pilot = Pilot::new(PilotConfig::default(), Vector3::new(10.0, 0.0, 10.0));
        let upright = state(0.0, 6.0);
        pilot.set_goal(Vector3::new(-10.0, 0.0, 10.0));
        assert!(pilot.heading_error(&upright) < -44.0);
        assert!(pilot.command(&upright, 0.02).horizontal < 0.0);
    }

    #[test]
    fn test_counter_steers_against_lean() {
        let mut pilot = Pilot::new(PilotConfig::default(), Vector3::new(0.0, 0.0, 50.0));
        let command = pilot.command(&state(4.0, 6.0), 0.02);
        assert!(command.horizontal < 0.0);
    }

    #[test]
    fn test_throttle_toward_cruise_speed() {
        let mut pilot = Pilot::new(PilotConfig::default(), Vector3::new(0.0, 0.0, 50.0));
        assert!(pilot.command(&state(0.0, 0.0), 0.02).vertical > 0.0);
        assert!(pilot.command(&state(0.0, 12.0), 0.02).vertical < 0.0);
        assert!(!pilot.command(&state(0.0, 12.0), 0.02).braking);
    }

    #[test]
    fn test_derivative_on_measurement_no_kick() {
        let mut pd = PdLoop::new(PdGains::new(0.0, 1.0));
        assert_eq!(pd.update(0.0, 5.0, 0.01), 0.0);
        // Setpoint jump with a steady measurement must not produce output
        assert!(pd.update(100.0, 5.0, 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_output_limits() {
        let mut pd = PdLoop::new(PdGains::new(100.0, 0.0).with_limits(-0.5, 0.5));
        assert_eq!(pd.update(10.0, 0.0, 0.01), 0.5);
        assert_eq!(pd.update(-10.0, 0.0, 0.01), -0.5);
    }
}

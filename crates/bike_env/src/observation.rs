//! Observation vector
//!
//! Fixed layout, 18 values:
//!
//! | index | content |
//! |---|---|
//! | 0..6 | lean, speed, angular velocity z, steering angle, tipover threshold, tipped flag |
//! | 6..9 | position |
//! | 9..13 | orientation quaternion (x, y, z, w) |
//! | 13..16 | unit direction to goal in the body frame |
//! | 16 | distance to goal / normalizer |
//! | 17 | alignment of body-frame velocity with the goal direction |

use nalgebra::Vector3;
use simcore::VehicleKinematicState;

pub const VEHICLE_STATE_SIZE: usize = 6;
pub const OBSERVATION_SIZE: usize = 18;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation(pub [f32; OBSERVATION_SIZE]);

impl Observation {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.0.to_vec()
    }

    pub fn lean_angle(&self) -> f32 {
        self.0[0]
    }

    pub fn tipped_over(&self) -> bool {
        self.0[5] > 0.5
    }
}

impl Default for Observation {
    fn default() -> Self {
        Observation([0.0; OBSERVATION_SIZE])
    }
}

/// Normalizes `v`, or returns zero when it is too short to have a direction.
fn direction(v: Vector3<f64>) -> Vector3<f64> {
    v.try_normalize(1e-5).unwrap_or_else(Vector3::zeros)
}

pub fn build_observation(
    vehicle: [f32; VEHICLE_STATE_SIZE],
    state: &VehicleKinematicState,
    goal: &Vector3<f64>,
    distance_normalizer: f64,
) -> Observation {
    let local_goal = direction(state.inverse_transform_point(goal));
    let distance = (goal - state.position).norm();
    let local_velocity = direction(state.inverse_transform_direction(&state.linear_velocity));
    let q = state.orientation.coords;

    let mut values = [0.0f32; OBSERVATION_SIZE];
    values[..VEHICLE_STATE_SIZE].copy_from_slice(&vehicle);
    let rest = [
        state.position.x,
        state.position.y,
        state.position.z,
        q.x,
        q.y,
        q.z,
        q.w,
        local_goal.x,
        local_goal.y,
        local_goal.z,
        distance / distance_normalizer,
        local_velocity.dot(&local_goal),
    ];
    for (slot, value) in values[VEHICLE_STATE_SIZE..].iter_mut().zip(rest) {
        *slot = value as f32;
    }
    Observation(values)
}

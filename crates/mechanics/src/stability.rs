//! Lean dynamics and tipover detection
//!
//! A stylised stability heuristic for a bicycle, not a Whipple model. Each tick
//! the model measures lean from the body orientation, derives a speed-dependent
//! tipover threshold and, while upright, produces the corrective and
//! destabilising loads the physics engine should apply.

use log::debug;
use nalgebra::Vector3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use simcore::{
    check_positive, check_range, lerp, ForceMode, Model, ParamError, RigidBody, SimContext,
    VehicleKinematicState,
};

/// Thresholds below this are treated as fully unstable in the reward.
const MIN_TIPOVER_THRESHOLD: f64 = 1e-3;

/// Balance reward reported once the vehicle has fallen.
pub const TIPPED_OVER_REWARD: f64 = -10.0;

/// Configuration for the balance model
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Gyroscopic yaw response to lean, grows with wheel spin
    pub gyroscopic_strength: f64,
    /// How strongly the front wheel steers into the lean
    pub self_steer_strength: f64,
    /// Restoring roll torque per unit sin(lean)
    pub gravity_restore_force: f64,
    /// Quadratic drag coefficient
    pub air_resistance: f64,
    /// Roll torque per degree of steer per m/s
    pub trail_effect: f64,
    /// Tipover angle at standstill (degrees)
    pub base_tipover_angle: f64,
    /// Tipover angle at and above `speed_for_max_angle` (degrees)
    pub max_tipover_angle: f64,
    /// Speed (m/s) at which the threshold saturates
    pub speed_for_max_angle: f64,
    /// Below this speed (m/s) the bike actively falls
    pub critical_speed: f64,
    /// Destabilising roll torque per m/s below `critical_speed`
    pub critical_destabilize_gain: f64,
    /// Fraction of `base_tipover_angle` that trips a fall below `critical_speed`
    pub low_speed_tipover_ratio: f64,
    /// Peak random roll torque at standstill
    pub perturbation_amplitude: f64,
    /// Wheel radius used to derive wheel spin from ground speed (m)
    pub wheel_radius: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        StabilityConfig {
            gyroscopic_strength: 1.0,
            self_steer_strength: 0.5,
            gravity_restore_force: 10.0,
            air_resistance: 0.1,
            trail_effect: 0.3,
            base_tipover_angle: 15.0,
            max_tipover_angle: 75.0,
            speed_for_max_angle: 20.0,
            critical_speed: 0.5,
            critical_destabilize_gain: 20.0,
            low_speed_tipover_ratio: 0.5,
            perturbation_amplitude: 0.5,
            wheel_radius: 0.35,
        }
    }
}

impl StabilityConfig {
    /// Set the standstill and saturated tipover angles
    pub fn with_tipover_angles(mut self, base: f64, max: f64) -> Self {
        self.base_tipover_angle = base;
        self.max_tipover_angle = max;
        self
    }

    pub fn with_speed_for_max_angle(mut self, speed: f64) -> Self {
        self.speed_for_max_angle = speed;
        self
    }

    pub fn with_critical_speed(mut self, speed: f64) -> Self {
        self.critical_speed = speed;
        self
    }

    /// Disable the random roll perturbation (useful for deterministic runs)
    pub fn without_perturbation(mut self) -> Self {
        self.perturbation_amplitude = 0.0;
        self
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        check_range("base_tipover_angle", self.base_tipover_angle, f64::MIN_POSITIVE, 180.0)?;
        check_range("max_tipover_angle", self.max_tipover_angle, self.base_tipover_angle, 180.0)?;
        check_positive("speed_for_max_angle", self.speed_for_max_angle)?;
        check_positive("wheel_radius", self.wheel_radius)?;
        check_range("critical_speed", self.critical_speed, 0.0, f64::MAX)?;
        check_range("low_speed_tipover_ratio", self.low_speed_tipover_ratio, 0.0, 1.0)?;
        check_range("perturbation_amplitude", self.perturbation_amplitude, 0.0, f64::MAX)?;
        for (name, value) in [
            ("gyroscopic_strength", self.gyroscopic_strength),
            ("self_steer_strength", self.self_steer_strength),
            ("gravity_restore_force", self.gravity_restore_force),
            ("air_resistance", self.air_resistance),
            ("trail_effect", self.trail_effect),
            ("critical_destabilize_gain", self.critical_destabilize_gain),
        ] {
            check_range(name, value, f64::MIN, f64::MAX)?;
        }
        Ok(())
    }
}

/// Lean angle the vehicle can tolerate at `speed` before it is considered fallen.
///
/// Interpolates from the standstill angle to the maximum and holds the maximum
/// for every speed at or above `speed_for_max_angle`.
pub fn dynamic_tipover_angle(config: &StabilityConfig, speed: f64) -> f64 {
    let speed_factor = (speed.max(0.0) / config.speed_for_max_angle).min(1.0);
    lerp(config.base_tipover_angle, config.max_tipover_angle, speed_factor)
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LeanState {
    /// Measured roll in degrees, (-180, 180]
    pub current_lean_angle: f64,
    /// Threshold recomputed every tick (degrees)
    pub dynamic_tipover_angle: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipoverCause {
    /// Lean exceeded the stricter standstill threshold below critical speed
    LowSpeed,
    /// Lean exceeded the speed-dependent threshold
    Threshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    CriticalSpeed,
    Gyroscopic,
    GravityRestore,
    Centrifugal,
    Trail,
    AirResistance,
    Perturbation,
}

/// A world-space load requested from the physics engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Load {
    Force { source: LoadSource, vector: Vector3<f64> },
    Torque { source: LoadSource, vector: Vector3<f64> },
}

impl Load {
    pub fn source(&self) -> LoadSource {
        match self {
            Load::Force { source, .. } | Load::Torque { source, .. } => *source,
        }
    }

    pub fn vector(&self) -> Vector3<f64> {
        match self {
            Load::Force { vector, .. } | Load::Torque { vector, .. } => *vector,
        }
    }
}

/// Result of one balance tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StabilityStep {
    /// Loads to apply this tick, all continuous and additive
    pub loads: Vec<Load>,
    /// Steering bias (degrees) from the front wheel steering into the lean
    pub auto_steer_angle: f64,
    pub lean: LeanState,
    pub speed: f64,
    pub tipover: Option<TipoverCause>,
}

impl StabilityStep {
    pub fn load(&self, source: LoadSource) -> Option<&Load> {
        self.loads.iter().find(|load| load.source() == source)
    }

    /// Sends every load to the rigid body as a continuous force or torque.
    pub fn apply_to<B: RigidBody + ?Sized>(&self, body: &mut B) {
        for load in &self.loads {
            match *load {
                Load::Force { vector, .. } => body.add_force(vector, ForceMode::Force),
                Load::Torque { vector, .. } => body.add_torque(vector, ForceMode::Force),
            }
        }
    }
}

/// Per-tick lean model with its own seeded noise source.
#[derive(Debug, Clone)]
pub struct StabilityModel {
    config: StabilityConfig,
    lean: LeanState,
    rng: StdRng,
}

impl StabilityModel {
    pub fn new(config: StabilityConfig, seed: u64) -> Self {
        let lean = LeanState {
            current_lean_angle: 0.0,
            dynamic_tipover_angle: config.base_tipover_angle,
        };
        StabilityModel {
            config,
            lean,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    pub fn lean(&self) -> LeanState {
        self.lean
    }

    /// Re-reads the lean angle from the body orientation.
    pub fn measure(&mut self, state: &VehicleKinematicState) -> f64 {
        self.lean.current_lean_angle = state.lean_angle();
        self.lean.current_lean_angle
    }

    /// Runs one balance tick against the current kinematic state.
    ///
    /// `steering_angle` is the smoothed handlebar angle in degrees. The returned
    /// loads are not applied; see [`StabilityStep::apply_to`].
    pub fn advance(
        &mut self,
        state: &VehicleKinematicState,
        steering_angle: f64,
        ctx: SimContext,
    ) -> StabilityStep {
        let lean = self.measure(state);
        let abs_lean = lean.abs();
        let speed = state.speed();
        let forward = state.forward();
        let right = state.right();
        let cfg = &self.config;

        self.lean.dynamic_tipover_angle = dynamic_tipover_angle(cfg, speed);
        let mut loads = Vec::with_capacity(7);

        if speed < cfg.critical_speed {
            let destabilize = (cfg.critical_speed - speed) * cfg.critical_destabilize_gain;
            loads.push(Load::Torque {
                source: LoadSource::CriticalSpeed,
                vector: forward * destabilize * lean.signum(),
            });

            if abs_lean > cfg.base_tipover_angle * cfg.low_speed_tipover_ratio {
                return self.tipped(loads, speed, TipoverCause::LowSpeed, ctx);
            }
        }

        if abs_lean > self.lean.dynamic_tipover_angle {
            return self.tipped(loads, speed, TipoverCause::Threshold, ctx);
        }

        // Front and rear wheels rolling without slip
        let wheel_angular_velocity = 2.0 * speed / cfg.wheel_radius;
        loads.push(Load::Torque {
            source: LoadSource::Gyroscopic,
            vector: -Vector3::y() * lean * wheel_angular_velocity * cfg.gyroscopic_strength,
        });

        let auto_steer_angle = lean * cfg.self_steer_strength * (speed / 10.0);

        let gravity_torque = lean.to_radians().sin() * cfg.gravity_restore_force;
        loads.push(Load::Torque {
            source: LoadSource::GravityRestore,
            vector: forward * -gravity_torque,
        });

        let centrifugal = speed * speed * steering_angle.to_radians().tan() / 2.0;
        loads.push(Load::Force {
            source: LoadSource::Centrifugal,
            vector: right * centrifugal,
        });

        loads.push(Load::Torque {
            source: LoadSource::Trail,
            vector: forward * steering_angle * cfg.trail_effect * speed,
        });

        let direction = state.linear_velocity.try_normalize(1e-9).unwrap_or_else(Vector3::zeros);
        loads.push(Load::Force {
            source: LoadSource::AirResistance,
            vector: -direction * state.linear_velocity.norm_squared() * cfg.air_resistance,
        });

        let noise = self.perturbation() / (speed + 1.0);
        loads.push(Load::Torque {
            source: LoadSource::Perturbation,
            vector: forward * noise,
        });

        StabilityStep {
            loads,
            auto_steer_angle,
            lean: self.lean,
            speed,
            tipover: None,
        }
    }

    /// Uniform sample in ±amplitude. The sign of the amplitude is ignored and
    /// a zero or non-finite amplitude yields no noise.
    fn perturbation(&mut self) -> f64 {
        let amplitude = self.config.perturbation_amplitude.abs();
        if amplitude.is_finite() && amplitude > 0.0 {
            self.rng.gen_range(-amplitude..=amplitude)
        } else {
            0.0
        }
    }

    fn tipped(
        &self,
        loads: Vec<Load>,
        speed: f64,
        cause: TipoverCause,
        ctx: SimContext,
    ) -> StabilityStep {
        debug!(
            "tipover condition at t={:.2}s ({:?}): speed {:.2}, lean {:.2}°, threshold {:.2}°",
            ctx.t, cause, speed, self.lean.current_lean_angle, self.lean.dynamic_tipover_angle
        );
        StabilityStep {
            loads,
            auto_steer_angle: 0.0,
            lean: self.lean,
            speed,
            tipover: Some(cause),
        }
    }

    /// Continuous balance and speed reward.
    ///
    /// Upright it is at most 1 (balance) + 0.5 (speed). A degenerate threshold
    /// counts as maximum instability instead of dividing by zero.
    pub fn balance_reward(&self, speed: f64, tipped_over: bool) -> f64 {
        if tipped_over {
            return TIPPED_OVER_REWARD;
        }

        let threshold = self.lean.dynamic_tipover_angle;
        let balance = if threshold.abs() < MIN_TIPOVER_THRESHOLD {
            -1.0
        } else {
            (1.0 - self.lean.current_lean_angle.abs() / threshold).clamp(-1.0, 1.0)
        };
        let speed_reward = (speed / 10.0).min(1.0);

        balance + speed_reward * 0.5
    }
}

impl Model for StabilityModel {
    fn reset(&mut self) {
        self.lean = LeanState {
            current_lean_angle: 0.0,
            dynamic_tipover_angle: self.config.base_tipover_angle,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::UnitQuaternion;
    use simcore::{Damping, DriveCommand};

    fn ctx() -> SimContext {
        SimContext { dt: 0.02, t: 0.0 }
    }

    /// Upright heading +Z at `speed`, rolled by `lean` degrees.
    fn kinematic(speed: f64, lean: f64) -> VehicleKinematicState {
        VehicleKinematicState {
            linear_velocity: Vector3::new(0.0, 0.0, speed),
            orientation: UnitQuaternion::from_axis_angle(&Vector3::z_axis(), lean.to_radians()),
            ..Default::default()
        }
    }

    fn quiet_model() -> StabilityModel {
        StabilityModel::new(StabilityConfig::default().without_perturbation(), 7)
    }

    #[derive(Default)]
    struct RecordingBody {
        forces: Vec<(Vector3<f64>, ForceMode)>,
        torques: Vec<(Vector3<f64>, ForceMode)>,
    }

    impl RigidBody for RecordingBody {
        fn kinematic_state(&self) -> VehicleKinematicState {
            VehicleKinematicState::default()
        }
        fn add_force(&mut self, force: Vector3<f64>, mode: ForceMode) {
            self.forces.push((force, mode));
        }
        fn add_torque(&mut self, torque: Vector3<f64>, mode: ForceMode) {
            self.torques.push((torque, mode));
        }
        fn apply_drive(&mut self, _command: DriveCommand) {}
        fn integrate(&mut self, _ctx: SimContext) {}
        fn set_pose(&mut self, _position: Vector3<f64>, _orientation: UnitQuaternion<f64>) {}
        fn set_velocities(&mut self, _linear: Vector3<f64>, _angular: Vector3<f64>) {}
        fn damping(&self) -> Damping {
            Damping { linear: 0.0, angular: 0.0 }
        }
        fn set_damping(&mut self, _damping: Damping) {}
    }

    #[test]
    fn test_tipover_angle_at_standstill_is_base() {
        let config = StabilityConfig::default();
        assert_abs_diff_eq!(dynamic_tipover_angle(&config, 0.0), 15.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tipover_angle_clamped_at_and_above_saturation_speed() {
        let config = StabilityConfig::default();
        for speed in [20.0, 20.5, 35.0, 1_000.0] {
            assert_abs_diff_eq!(dynamic_tipover_angle(&config, speed), 75.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tipover_angle_interpolates_linearly() {
        let config = StabilityConfig::default();
        // 15 m/s of 20 => 15 + 0.75 * 60
        assert_abs_diff_eq!(dynamic_tipover_angle(&config, 15.0), 60.0, epsilon = 1e-12);
    }

    #[test]
    fn test_threshold_breach_reported_on_same_tick() {
        let mut model = quiet_model();

        let below = model.advance(&kinematic(15.0, 59.5), 0.0, ctx());
        assert_eq!(below.tipover, None);
        assert_abs_diff_eq!(below.lean.dynamic_tipover_angle, 60.0, epsilon = 1e-9);

        let above = model.advance(&kinematic(15.0, 60.5), 0.0, ctx());
        assert_eq!(above.tipover, Some(TipoverCause::Threshold));
        assert!(above.loads.is_empty());
    }

    #[test]
    fn test_negative_lean_breach_also_trips() {
        let mut model = quiet_model();
        let step = model.advance(&kinematic(15.0, -61.0), 0.0, ctx());
        assert_eq!(step.tipover, Some(TipoverCause::Threshold));
    }

    #[test]
    fn test_low_speed_uses_stricter_threshold() {
        let mut model = quiet_model();

        // Half of the 15° base angle trips below critical speed
        let step = model.advance(&kinematic(0.2, 8.0), 0.0, ctx());
        assert_eq!(step.tipover, Some(TipoverCause::LowSpeed));

        let step = model.advance(&kinematic(0.2, 7.0), 0.0, ctx());
        assert_eq!(step.tipover, None);
    }

    #[test]
    fn test_critical_speed_torque_pushes_into_lean() {
        let mut model = quiet_model();
        let step = model.advance(&kinematic(0.2, -3.0), 0.0, ctx());

        let torque = step.load(LoadSource::CriticalSpeed).map(Load::vector);
        // (0.5 - 0.2) * 20 = 6, same sign as the lean, about the roll axis
        assert_abs_diff_eq!(torque.unwrap_or_else(Vector3::zeros).z, -6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_no_critical_torque_above_critical_speed() {
        let mut model = quiet_model();
        let step = model.advance(&kinematic(3.0, 2.0), 0.0, ctx());
        assert!(step.load(LoadSource::CriticalSpeed).is_none());
    }

    #[test]
    fn test_upright_contributions() {
        let mut model = quiet_model();
        let step = model.advance(&kinematic(5.0, 5.0), 10.0, ctx());
        assert_eq!(step.tipover, None);

        let vector = |source| step.load(source).map(Load::vector).unwrap_or_else(Vector3::zeros);

        let gravity = vector(LoadSource::GravityRestore);
        assert_abs_diff_eq!(gravity.z, -(5f64.to_radians().sin() * 10.0), epsilon = 1e-9);

        let trail = vector(LoadSource::Trail);
        assert_abs_diff_eq!(trail.z, 10.0 * 0.3 * 5.0, epsilon = 1e-9);

        let drag = vector(LoadSource::AirResistance);
        assert_abs_diff_eq!(drag.z, -2.5, epsilon = 1e-9);

        let gyro = vector(LoadSource::Gyroscopic);
        assert_abs_diff_eq!(gyro.y, -5.0 * (10.0 / 0.35), epsilon = 1e-9);

        // Centrifugal acts sideways along the leaned right axis
        let centrifugal = vector(LoadSource::Centrifugal);
        let expected = 25.0 * 10f64.to_radians().tan() / 2.0;
        assert_abs_diff_eq!(centrifugal.norm(), expected, epsilon = 1e-9);
        assert!(centrifugal.x > 0.0);

        assert_abs_diff_eq!(step.auto_steer_angle, 5.0 * 0.5 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_perturbation_is_bounded_and_shrinks_with_speed() {
        let mut model = StabilityModel::new(StabilityConfig::default(), 42);
        for speed in [0.0, 3.0] {
            for _ in 0..500 {
                let step = model.advance(&kinematic(speed, 0.0), 0.0, ctx());
                let noise = step.load(LoadSource::Perturbation).map(Load::vector).unwrap_or_else(Vector3::zeros);
                assert!(noise.norm() <= 0.5 / (speed + 1.0) + 1e-12);
            }
        }
    }

    #[test]
    fn test_unvalidated_amplitude_never_panics() {
        for amplitude in [-0.5, f64::NAN, f64::INFINITY] {
            let config = StabilityConfig {
                perturbation_amplitude: amplitude,
                ..Default::default()
            };
            assert!(config.validate().is_err());

            let mut model = StabilityModel::new(config, 1);
            let step = model.advance(&kinematic(5.0, 0.0), 0.0, ctx());
            let noise = step.load(LoadSource::Perturbation).map(Load::vector).unwrap_or_else(Vector3::zeros);
            assert!(noise.norm().is_finite());
            if amplitude.is_finite() {
                assert!(noise.norm() <= 0.5 / 6.0 + 1e-12);
            }
        }
    }

    #[test]
    fn test_zero_critical_speed_disables_destabilisation() {
        let mut model = StabilityModel::new(
            StabilityConfig::default().without_perturbation().with_critical_speed(0.0),
            7,
        );
        // Would trip the low-speed check at the default critical speed
        let step = model.advance(&kinematic(0.0, 10.0), 0.0, ctx());
        assert!(step.load(LoadSource::CriticalSpeed).is_none());
        assert_eq!(step.tipover, None);
    }

    #[test]
    fn test_saturation_speed_moves_threshold() {
        let config = StabilityConfig::default().with_speed_for_max_angle(10.0);
        assert_abs_diff_eq!(dynamic_tipover_angle(&config, 5.0), 45.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dynamic_tipover_angle(&config, 10.0), 75.0, epsilon = 1e-12);
    }

    #[test]
    fn test_same_seed_same_noise() {
        let mut a = StabilityModel::new(StabilityConfig::default(), 3);
        let mut b = StabilityModel::new(StabilityConfig::default(), 3);
        for _ in 0..10 {
            let sa = a.advance(&kinematic(2.0, 1.0), 0.0, ctx());
            let sb = b.advance(&kinematic(2.0, 1.0), 0.0, ctx());
            assert_eq!(sa, sb);
        }
    }

    #[test]
    fn test_balance_reward_bounds() {
        let mut model = quiet_model();
        model.advance(&kinematic(25.0, 0.0), 0.0, ctx());
        assert_abs_diff_eq!(model.balance_reward(25.0, false), 1.5, epsilon = 1e-12);

        model.advance(&kinematic(4.0, 10.0), 0.0, ctx());
        assert!(model.balance_reward(4.0, false) < 1.5);
        assert_eq!(model.balance_reward(4.0, true), -10.0);
    }

    #[test]
    fn test_balance_reward_with_degenerate_threshold_is_finite() {
        let mut model = quiet_model();
        model.lean.dynamic_tipover_angle = 0.0;
        let reward = model.balance_reward(0.0, false);
        assert!(reward.is_finite());
        assert_abs_diff_eq!(reward, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_apply_to_sends_continuous_loads() {
        let mut model = quiet_model();
        let step = model.advance(&kinematic(5.0, 2.0), 5.0, ctx());
        let mut body = RecordingBody::default();
        step.apply_to(&mut body);

        assert_eq!(body.forces.len(), 2);
        assert_eq!(body.torques.len(), 4);
        assert!(body
            .forces
            .iter()
            .chain(body.torques.iter())
            .all(|(_, mode)| *mode == ForceMode::Force));
    }

    #[test]
    fn test_reset_zeroes_lean() {
        let mut model = quiet_model();
        model.advance(&kinematic(5.0, 12.0), 0.0, ctx());
        model.reset();
        assert_eq!(model.lean().current_lean_angle, 0.0);
        assert_eq!(model.lean().dynamic_tipover_angle, 15.0);
    }

    #[test]
    fn test_validate_rejects_inverted_angles() {
        let config = StabilityConfig::default().with_tipover_angles(40.0, 20.0);
        assert!(config.validate().is_err());
        assert!(StabilityConfig::default().validate().is_ok());
    }
}

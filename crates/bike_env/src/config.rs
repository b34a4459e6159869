//! Environment configuration
//!
//! Every tunable lives in a serde struct with reference defaults, so a JSON
//! file only needs to name the values it changes.

use std::fs;
use std::path::Path;

use control::DriveConfig;
use mechanics::StabilityConfig;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use simcore::{check_positive, check_range, ParamError, ReferenceBodyConfig};

use crate::error::ConfigError;

/// Upper bound on generated waypoints per episode
pub const MAX_CHECKPOINTS: usize = 1_000;

/// Shape of the action the environment accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// Two floats in [-1, 1]: steer, motor
    #[default]
    Continuous,
    /// Two branches of {0, 1, 2}: steer, motor
    Discrete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EpisodeConfig {
    /// Fixed tick length (s)
    pub dt: f64,
    pub spawn_position: [f64; 3],
    /// Heading at spawn, degrees about world up
    pub spawn_yaw: f64,
    pub goal_position: [f64; 3],
    /// Waypoints generated strictly between spawn and goal
    pub checkpoint_count: usize,
    /// Proximity radius that counts a waypoint as reached (m)
    pub checkpoint_radius: f64,
    pub max_episode_time: f64,
    pub time_limit_enabled: bool,
    pub action_mode: ActionMode,
    /// Seed for the lean perturbation noise
    pub seed: u64,
}

impl Default for EpisodeConfig {
    fn default() -> Self {
        EpisodeConfig {
            dt: 0.02,
            spawn_position: [6.5, 1.0, 0.0],
            spawn_yaw: 0.0,
            goal_position: [6.5, 1.0, 20.0],
            checkpoint_count: 5,
            checkpoint_radius: 2.0,
            max_episode_time: 120.0,
            time_limit_enabled: false,
            action_mode: ActionMode::Continuous,
            seed: 0,
        }
    }
}

impl EpisodeConfig {
    pub fn spawn(&self) -> Vector3<f64> {
        Vector3::from(self.spawn_position)
    }

    pub fn goal(&self) -> Vector3<f64> {
        Vector3::from(self.goal_position)
    }

    pub fn with_action_mode(mut self, mode: ActionMode) -> Self {
        self.action_mode = mode;
        self
    }

    pub fn with_goal(mut self, goal: [f64; 3]) -> Self {
        self.goal_position = goal;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable episode termination after `max_episode_time` seconds
    pub fn with_time_limit(mut self, max_episode_time: f64) -> Self {
        self.max_episode_time = max_episode_time;
        self.time_limit_enabled = true;
        self
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        check_positive("dt", self.dt)?;
        if self.checkpoint_count > MAX_CHECKPOINTS {
            return Err(ParamError::new(
                "checkpoint_count",
                format!("{} exceeds {MAX_CHECKPOINTS}", self.checkpoint_count),
            ));
        }
        check_range("checkpoint_radius", self.checkpoint_radius, 0.0, f64::MAX)?;
        check_positive("max_episode_time", self.max_episode_time)?;
        check_range("spawn_yaw", self.spawn_yaw, f64::MIN, f64::MAX)?;
        for (name, point) in [("spawn_position", self.spawn_position), ("goal_position", self.goal_position)] {
            for value in point {
                check_range(name, value, f64::MIN, f64::MAX)?;
            }
        }
        Ok(())
    }
}

/// Reward magnitudes. Penalties are stored with their sign.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub checkpoint_reward: f64,
    pub checkpoint_trigger_reward: f64,
    pub goal_reward: f64,
    pub obstacle_penalty: f64,
    pub fall_penalty: f64,
    pub timeout_penalty: f64,
    /// Reward per metre of progress toward the goal
    pub distance_reward_scale: f64,
    /// Subtracted every tick
    pub time_penalty: f64,
    pub low_speed_threshold: f64,
    /// Subtracted every tick spent below `low_speed_threshold`
    pub low_speed_penalty: f64,
    pub alignment_scale: f64,
    /// Distance that maps to 1.0 in the observation
    pub distance_normalizer: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        RewardConfig {
            checkpoint_reward: 2.0,
            checkpoint_trigger_reward: 50.0,
            goal_reward: 100.0,
            obstacle_penalty: -5.0,
            fall_penalty: -20.0,
            timeout_penalty: -5.0,
            distance_reward_scale: 2.0,
            time_penalty: 0.01,
            low_speed_threshold: 0.1,
            low_speed_penalty: 0.01,
            alignment_scale: 0.1,
            distance_normalizer: 20.0,
        }
    }
}

impl RewardConfig {
    pub fn validate(&self) -> Result<(), ParamError> {
        for (name, value) in [
            ("checkpoint_reward", self.checkpoint_reward),
            ("checkpoint_trigger_reward", self.checkpoint_trigger_reward),
            ("goal_reward", self.goal_reward),
            ("obstacle_penalty", self.obstacle_penalty),
            ("fall_penalty", self.fall_penalty),
            ("timeout_penalty", self.timeout_penalty),
            ("distance_reward_scale", self.distance_reward_scale),
            ("time_penalty", self.time_penalty),
            ("low_speed_penalty", self.low_speed_penalty),
            ("alignment_scale", self.alignment_scale),
        ] {
            check_range(name, value, f64::MIN, f64::MAX)?;
        }
        check_range("low_speed_threshold", self.low_speed_threshold, 0.0, f64::MAX)?;
        check_positive("distance_normalizer", self.distance_normalizer)
    }
}

/// Complete environment configuration.
///
/// `body` only matters when the caller builds a [`simcore::ReferenceBody`]
/// from it; the environment itself drives whatever body it is given.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub episode: EpisodeConfig,
    pub reward: RewardConfig,
    pub drive: DriveConfig,
    pub stability: StabilityConfig,
    pub body: ReferenceBodyConfig,
}

impl EnvConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EnvConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ParamError> {
        self.episode.validate()?;
        self.reward.validate()?;
        self.drive.validate()?;
        self.stability.validate()?;
        check_positive("body.mass", self.body.mass)?;
        check_positive("body.roll_inertia", self.body.roll_inertia)?;
        check_positive("body.yaw_inertia", self.body.yaw_inertia)?;
        check_positive("body.wheel_radius", self.body.wheel_radius)?;
        check_positive("body.wheelbase", self.body.wheelbase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EnvConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EnvConfig::from_json_str(
            r#"{ "episode": { "action_mode": "discrete", "seed": 9 }, "reward": { "goal_reward": 250.0 } }"#,
        )
        .unwrap();

        assert_eq!(config.episode.action_mode, ActionMode::Discrete);
        assert_eq!(config.episode.seed, 9);
        assert_eq!(config.episode.checkpoint_count, 5);
        assert_eq!(config.reward.goal_reward, 250.0);
        assert_eq!(config.reward.fall_penalty, -20.0);
        assert!(!config.episode.time_limit_enabled);
    }

    #[test]
    fn test_invalid_values_fail_fast() {
        let err = EnvConfig::from_json_str(r#"{ "episode": { "dt": 0.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Param(ref p) if p.name == "dt"));

        let err = EnvConfig::from_json_str(r#"{ "stability": { "base_tipover_angle": 80.0, "max_tipover_angle": 20.0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Param(_)));
    }

    #[test]
    fn test_checkpoint_count_is_capped() {
        let err = EnvConfig::from_json_str(r#"{ "episode": { "checkpoint_count": 1000000000000 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Param(ref p) if p.name == "checkpoint_count"));

        let mut config = EnvConfig::default();
        config.episode.checkpoint_count = MAX_CHECKPOINTS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_steering_at_right_angle_rejected() {
        let err = EnvConfig::from_json_str(r#"{ "drive": { "max_steering_angle": 90.0 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Param(ref p) if p.name == "max_steering_angle"));
    }

    #[test]
    fn test_builders_carry_into_validation() {
        let episode = EpisodeConfig::default().with_seed(17).with_time_limit(30.0);
        assert_eq!(episode.seed, 17);
        assert!(episode.time_limit_enabled);
        assert!(episode.validate().is_ok());
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = EnvConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = EnvConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! Episode coordinator
//!
//! Owns one vehicle on one rigid body and runs the episode lifecycle:
//! reset, observe, act, reward, terminate.

use std::collections::VecDeque;

use log::{debug, info, warn};
use nalgebra::{UnitQuaternion, Vector3};
use simcore::{RigidBody, SimContext};

use crate::action::{Action, ManualInput};
use crate::checkpoints::CheckpointTrack;
use crate::config::EnvConfig;
use crate::contact::ContactKind;
use crate::error::EnvError;
use crate::observation::{build_observation, Observation};
use crate::reward::{shape, RewardBreakdown, ShapingInputs};
use crate::surface::{Color, GroundPainter};
use crate::vehicle::{BicycleVehicle, VehicleDiagnostics};

/// Goals closer than this to the spawn point are rejected.
const MIN_GOAL_DISTANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    ReachedGoal,
    HitObstacle,
    TippedOver,
    TimedOut,
}

/// Per-episode bookkeeping, rebuilt on every reset.
#[derive(Debug, Clone)]
pub struct Episode {
    pub elapsed: f64,
    pub steps: u64,
    pub checkpoints: CheckpointTrack,
    pub previous_distance: f64,
    /// The trigger-region bonus has been paid this episode
    pub checkpoint_trigger_consumed: bool,
    pub cumulative_reward: f64,
    pub outcome: Option<EpisodeOutcome>,
}

impl Episode {
    fn begin(start: Vector3<f64>, goal: Vector3<f64>, checkpoint_count: usize) -> Self {
        Episode {
            elapsed: 0.0,
            steps: 0,
            checkpoints: CheckpointTrack::generate(start, goal, checkpoint_count),
            previous_distance: (goal - start).norm(),
            checkpoint_trigger_consumed: false,
            cumulative_reward: 0.0,
            outcome: None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.outcome.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    pub breakdown: RewardBreakdown,
    pub outcome: Option<EpisodeOutcome>,
    pub checkpoint_cursor: usize,
    pub elapsed: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// Reinforcement-learning environment around a single bicycle.
pub struct BicycleEnv<B: RigidBody> {
    config: EnvConfig,
    body: B,
    vehicle: BicycleVehicle,
    episode: Episode,
    contacts: VecDeque<ContactKind>,
    painter: Option<Box<dyn GroundPainter>>,
}

impl<B: RigidBody> BicycleEnv<B> {
    /// Validates the configuration and starts the first episode.
    pub fn new(config: EnvConfig, body: B) -> Result<Self, EnvError> {
        config.validate()?;
        let spawn = config.episode.spawn();
        let goal = config.episode.goal();
        if (goal - spawn).norm() < MIN_GOAL_DISTANCE {
            return Err(EnvError::DegenerateGoal);
        }

        let vehicle = BicycleVehicle::new(
            config.drive.clone(),
            config.stability.clone(),
            config.episode.seed,
            &body,
        )?;
        let episode = Episode::begin(spawn, goal, config.episode.checkpoint_count);
        let mut env = BicycleEnv {
            config,
            body,
            vehicle,
            episode,
            contacts: VecDeque::new(),
            painter: None,
        };
        env.reset();
        Ok(env)
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut B {
        &mut self.body
    }

    pub fn episode(&self) -> &Episode {
        &self.episode
    }

    pub fn set_ground_painter(&mut self, painter: Box<dyn GroundPainter>) {
        self.painter = Some(painter);
    }

    /// Starts a new episode at the spawn pose.
    pub fn reset(&mut self) -> Observation {
        let spawn = self.config.episode.spawn();
        let goal = self.config.episode.goal();

        self.vehicle.reset(&mut self.body);
        let heading = UnitQuaternion::from_axis_angle(
            &Vector3::y_axis(),
            self.config.episode.spawn_yaw.to_radians(),
        );
        self.body.set_pose(spawn, heading);

        self.episode = Episode::begin(spawn, goal, self.config.episode.checkpoint_count);
        self.contacts.clear();
        debug!(
            "Episode reset: spawn ({:.2}, {:.2}, {:.2}), goal distance {:.2}",
            spawn.x, spawn.y, spawn.z, self.episode.previous_distance
        );
        self.observe()
    }

    /// Queues a categorised contact; it is resolved on the next `step`.
    pub fn notify_contact(&mut self, kind: ContactKind) {
        if self.episode.is_done() {
            debug!("Ignoring {kind:?} contact after episode end");
            return;
        }
        self.contacts.push_back(kind);
    }

    pub fn heuristic(&self, input: ManualInput) -> Action {
        input.to_action(self.config.episode.action_mode)
    }

    pub fn observe(&self) -> Observation {
        build_observation(
            self.vehicle.observation_state(&self.body),
            &self.body.kinematic_state(),
            &self.config.episode.goal(),
            self.config.reward.distance_normalizer,
        )
    }

    pub fn diagnostics(&self) -> VehicleDiagnostics {
        self.vehicle.diagnostics(&self.body)
    }

    /// Advances one fixed tick.
    ///
    /// A terminal condition replaces the shaping terms for that tick with its
    /// terminal reward; the proximity checkpoint bonus is kept either way.
    pub fn step(&mut self, action: Action) -> Result<StepResult, EnvError> {
        if self.episode.is_done() {
            warn!("step called on a finished episode");
            return Err(EnvError::EpisodeFinished);
        }
        let expected = self.config.episode.action_mode;
        if action.mode() != expected {
            warn!("Rejected {:?} action for a {:?} environment", action.mode(), expected);
            return Err(EnvError::ActionMismatch { expected, got: action.mode() });
        }

        let ctx = SimContext {
            dt: self.config.episode.dt,
            t: self.episode.elapsed,
        };
        let tick = self
            .vehicle
            .tick(&mut self.body, action.to_control_input(), ctx);
        self.episode.elapsed += ctx.dt;
        self.episode.steps += 1;

        let rewards = self.config.reward.clone();
        let state = self.body.kinematic_state();
        let goal = self.config.episode.goal();
        let mut breakdown = RewardBreakdown::default();

        if self
            .episode
            .checkpoints
            .advance_if_near(&state.position, self.config.episode.checkpoint_radius)
            .is_some()
        {
            breakdown.checkpoint = rewards.checkpoint_reward;
        }

        let mut outcome = None;
        if tick.tipover.is_some() {
            breakdown.terminal = rewards.fall_penalty;
            outcome = Some(EpisodeOutcome::TippedOver);
        }

        while outcome.is_none() {
            let Some(kind) = self.contacts.pop_front() else {
                break;
            };
            match kind {
                ContactKind::Goal => {
                    info!("Goal reached: {:+.1}", rewards.goal_reward);
                    breakdown.terminal = rewards.goal_reward;
                    outcome = Some(EpisodeOutcome::ReachedGoal);
                }
                ContactKind::Obstacle => {
                    info!("Hit obstacle: {:+.1}", rewards.obstacle_penalty);
                    breakdown.terminal = rewards.obstacle_penalty;
                    outcome = Some(EpisodeOutcome::HitObstacle);
                }
                ContactKind::CheckpointTrigger if !self.episode.checkpoint_trigger_consumed => {
                    info!("Checkpoint trigger: {:+.1}", rewards.checkpoint_trigger_reward);
                    breakdown.checkpoint_trigger += rewards.checkpoint_trigger_reward;
                    self.episode.checkpoint_trigger_consumed = true;
                    self.paint(Color::CHECKPOINT);
                }
                ContactKind::CheckpointTrigger => {}
            }
        }
        self.contacts.clear();

        if outcome.is_none()
            && self.config.episode.time_limit_enabled
            && self.episode.elapsed > self.config.episode.max_episode_time
        {
            info!("Episode time limit of {:.1}s exceeded", self.config.episode.max_episode_time);
            breakdown.terminal = rewards.timeout_penalty;
            outcome = Some(EpisodeOutcome::TimedOut);
        }

        let distance = (goal - state.position).norm();
        if outcome.is_none() {
            let to_goal = (goal - state.position)
                .try_normalize(MIN_GOAL_DISTANCE)
                .unwrap_or_else(Vector3::zeros);
            let inputs = ShapingInputs {
                balance_reward: self.vehicle.balance_reward(&self.body),
                dt: ctx.dt,
                previous_distance: self.episode.previous_distance,
                distance,
                speed: tick.speed,
                alignment: state.forward().dot(&to_goal),
            };
            shape(&rewards, &inputs, &mut breakdown);
        }
        self.episode.previous_distance = distance;

        let reward = breakdown.total();
        self.episode.cumulative_reward += reward;

        if let Some(outcome) = outcome {
            self.episode.outcome = Some(outcome);
            self.paint(match outcome {
                EpisodeOutcome::ReachedGoal => Color::SUCCESS,
                _ => Color::FAILURE,
            });
            info!(
                "Episode finished: {:?} after {} steps ({:.2}s), return {:.2}",
                outcome, self.episode.steps, self.episode.elapsed, self.episode.cumulative_reward
            );
        }

        Ok(StepResult {
            observation: self.observe(),
            reward,
            done: outcome.is_some(),
            info: StepInfo {
                breakdown,
                outcome,
                checkpoint_cursor: self.episode.checkpoints.cursor(),
                elapsed: self.episode.elapsed,
            },
        })
    }

    fn paint(&mut self, color: Color) {
        if let Some(painter) = self.painter.as_mut() {
            painter.paint(color);
        }
    }
}

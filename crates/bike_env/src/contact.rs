//! Contact classification
//!
//! The environment only consumes categorised contacts. [`TriggerZones`] is a
//! small geometric source of them for runs without a full collision engine.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::config::EpisodeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactKind {
    Goal,
    Obstacle,
    CheckpointTrigger,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    pub center: [f64; 3],
    pub radius: f64,
}

impl Sphere {
    fn contains(&self, point: &Vector3<f64>) -> bool {
        (Vector3::from(self.center) - point).norm() <= self.radius
    }
}

/// Axis-aligned floor area; leaving it in x or z counts as hitting a wall.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Arena {
    fn contains(&self, point: &Vector3<f64>) -> bool {
        (self.min[0]..=self.max[0]).contains(&point.x) && (self.min[1]..=self.max[1]).contains(&point.z)
    }
}

/// Entry-only trigger volumes.
///
/// Each zone reports once when the position moves from outside to inside and
/// re-arms after the position leaves it.
#[derive(Debug, Clone)]
pub struct TriggerZones {
    goal: Sphere,
    checkpoint_trigger: Option<Sphere>,
    arena: Option<Arena>,
    inside: [bool; 3],
}

impl TriggerZones {
    pub fn new(goal: Sphere) -> Self {
        TriggerZones {
            goal,
            checkpoint_trigger: None,
            arena: None,
            inside: [false; 3],
        }
    }

    /// Goal sphere of `goal_radius` plus walls `margin` metres beyond the spawn-goal box.
    pub fn for_episode(episode: &EpisodeConfig, goal_radius: f64, margin: f64) -> Self {
        let spawn = episode.spawn();
        let goal = episode.goal();
        TriggerZones::new(Sphere {
            center: episode.goal_position,
            radius: goal_radius,
        })
        .with_arena(Arena {
            min: [spawn.x.min(goal.x) - margin, spawn.z.min(goal.z) - margin],
            max: [spawn.x.max(goal.x) + margin, spawn.z.max(goal.z) + margin],
        })
    }

    pub fn with_checkpoint_trigger(mut self, zone: Sphere) -> Self {
        self.checkpoint_trigger = Some(zone);
        self
    }

    pub fn with_arena(mut self, arena: Arena) -> Self {
        self.arena = Some(arena);
        self
    }

    /// Returns the contacts entered since the previous call.
    pub fn update(&mut self, position: &Vector3<f64>) -> Vec<ContactKind> {
        let now = [
            self.goal.contains(position),
            self.arena.is_some_and(|arena| !arena.contains(position)),
            self.checkpoint_trigger.is_some_and(|zone| zone.contains(position)),
        ];
        let kinds = [ContactKind::Goal, ContactKind::Obstacle, ContactKind::CheckpointTrigger];

        let entered = kinds
            .iter()
            .zip(now.iter().zip(self.inside.iter()))
            .filter(|(_, (now, before))| **now && !**before)
            .map(|(kind, _)| *kind)
            .collect();
        self.inside = now;
        entered
    }

    /// Forgets occupancy so a respawned vehicle can trigger zones again.
    pub fn clear(&mut self) {
        self.inside = [false; 3];
    }
}

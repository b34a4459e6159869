use crate::config::RewardConfig;

/// Per-term contributions to one step's reward.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RewardBreakdown {
    /// Balance and speed reward scaled by the tick length
    pub balance: f64,
    pub distance: f64,
    pub time: f64,
    pub low_speed: f64,
    pub alignment: f64,
    /// Proximity waypoint bonus
    pub checkpoint: f64,
    /// One-off trigger-region bonus
    pub checkpoint_trigger: f64,
    /// Goal, obstacle, fall or timeout
    pub terminal: f64,
}

impl RewardBreakdown {
    pub fn total(&self) -> f64 {
        self.balance
            + self.distance
            + self.time
            + self.low_speed
            + self.alignment
            + self.checkpoint
            + self.checkpoint_trigger
            + self.terminal
    }
}

/// Inputs to the per-tick shaping terms.
#[derive(Debug, Clone, Copy)]
pub struct ShapingInputs {
    /// Balance reward of the vehicle, unscaled
    pub balance_reward: f64,
    pub dt: f64,
    pub previous_distance: f64,
    pub distance: f64,
    pub speed: f64,
    /// Dot product of heading and unit direction to the goal
    pub alignment: f64,
}

/// Fills in the continuous shaping terms of `breakdown`.
pub fn shape(config: &RewardConfig, inputs: &ShapingInputs, breakdown: &mut RewardBreakdown) {
    breakdown.balance = inputs.balance_reward * inputs.dt;

    let improvement = inputs.previous_distance - inputs.distance;
    breakdown.distance = if improvement > 0.0 {
        improvement * config.distance_reward_scale
    } else {
        0.0
    };

    breakdown.low_speed = if inputs.speed < config.low_speed_threshold {
        -config.low_speed_penalty
    } else {
        0.0
    };

    breakdown.time = -config.time_penalty;

    breakdown.alignment = if inputs.alignment > 0.0 {
        inputs.alignment * config.alignment_scale
    } else {
        0.0
    };
}

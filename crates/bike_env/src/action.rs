use control::ControlInput;

use crate::config::ActionMode;

/// One policy decision: `[steer, motor]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Both components in [-1, 1]; anything outside is saturated.
    Continuous([f32; 2]),
    /// Steer {0: none, 1: left, 2: right}, motor {0: none, 1: forward, 2: backward}.
    Discrete([i32; 2]),
}

impl Action {
    pub fn neutral(mode: ActionMode) -> Self {
        match mode {
            ActionMode::Continuous => Action::Continuous([0.0, 0.0]),
            ActionMode::Discrete => Action::Discrete([0, 0]),
        }
    }

    /// Builds an action from two axes, snapping to branches in discrete mode.
    pub fn from_axes(steer: f64, motor: f64, mode: ActionMode) -> Self {
        match mode {
            ActionMode::Continuous => Action::Continuous([steer as f32, motor as f32]),
            ActionMode::Discrete => Action::Discrete([axis_to_branch(steer, 1, 2), axis_to_branch(motor, 2, 1)]),
        }
    }

    pub fn mode(&self) -> ActionMode {
        match self {
            Action::Continuous(_) => ActionMode::Continuous,
            Action::Discrete(_) => ActionMode::Discrete,
        }
    }

    /// Maps the action onto the two control axes. Never brakes.
    pub fn to_control_input(&self) -> ControlInput {
        match *self {
            Action::Continuous([steer, motor]) => ControlInput::new(steer as f64, motor as f64, false),
            Action::Discrete([steer, motor]) => {
                let steer = match steer.clamp(0, 2) {
                    1 => -1.0,
                    2 => 1.0,
                    _ => 0.0,
                };
                let motor = match motor.clamp(0, 2) {
                    1 => 1.0,
                    2 => -1.0,
                    _ => 0.0,
                };
                ControlInput::new(steer, motor, false)
            }
        }
    }
}

/// Held-key snapshot for driving the environment by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ManualInput {
    pub steer_left: bool,
    pub steer_right: bool,
    pub throttle: bool,
    pub reverse: bool,
}

impl ManualInput {
    /// Right overrides left and reverse overrides throttle when both are held.
    pub fn to_action(&self, mode: ActionMode) -> Action {
        let steer = if self.steer_right {
            1.0
        } else if self.steer_left {
            -1.0
        } else {
            0.0
        };
        let motor = if self.reverse {
            -1.0
        } else if self.throttle {
            1.0
        } else {
            0.0
        };

        Action::from_axes(steer, motor, mode)
    }
}

/// Branch index for the sign of `axis`; a dead band keeps small inputs neutral.
fn axis_to_branch(axis: f64, negative: i32, positive: i32) -> i32 {
    const DEAD_BAND: f64 = 0.1;
    if axis < -DEAD_BAND {
        negative
    } else if axis > DEAD_BAND {
        positive
    } else {
        0
    }
}

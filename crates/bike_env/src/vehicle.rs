//! Per-tick vehicle composition
//!
//! Steering, lean model and fall detector driven in order against a rigid
//! body. Once fallen the vehicle is frozen: no loads, idle wheels, until
//! `reset`.

use control::{ControlInput, DriveConfig, SteeringAndDriveModel, SteeringState};
use mechanics::{
    LeanState, StabilityConfig, StabilityModel, TipoverEvent, TipoverFsm, TipoverStatus,
};
use nalgebra::{UnitQuaternion, Vector3};
use simcore::{Damping, DriveCommand, Model, ParamError, RigidBody, SimContext};

use crate::observation::VEHICLE_STATE_SIZE;

/// Read-only fields for dashboards and debugging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleDiagnostics {
    pub lean_angle: f64,
    pub tipover_threshold: f64,
    pub speed: f64,
    pub tipped_over: bool,
}

/// What happened during one vehicle tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleTick {
    /// Command actually sent to the wheels, self-steer bias included
    pub drive: DriveCommand,
    /// Lean re-read after integration
    pub lean: LeanState,
    pub speed: f64,
    /// Set only on the tick the vehicle fell
    pub tipover: Option<TipoverEvent>,
}

#[derive(Debug, Clone)]
pub struct BicycleVehicle {
    steering: SteeringAndDriveModel,
    stability: StabilityModel,
    fsm: TipoverFsm,
    /// Body drag captured at construction and restored on every reset
    initial_damping: Damping,
}

impl BicycleVehicle {
    /// Rejects drive or stability parameters that could fail mid-episode.
    pub fn new<B: RigidBody + ?Sized>(
        drive: DriveConfig,
        stability: StabilityConfig,
        seed: u64,
        body: &B,
    ) -> Result<Self, ParamError> {
        drive.validate()?;
        stability.validate()?;
        Ok(BicycleVehicle {
            steering: SteeringAndDriveModel::new(drive),
            stability: StabilityModel::new(stability, seed),
            fsm: TipoverFsm::new(),
            initial_damping: body.damping(),
        })
    }

    pub fn status(&self) -> TipoverStatus {
        self.fsm.status()
    }

    pub fn is_tipped_over(&self) -> bool {
        self.fsm.is_tipped_over()
    }

    pub fn lean(&self) -> LeanState {
        self.stability.lean()
    }

    pub fn steering(&self) -> SteeringState {
        self.steering.state()
    }

    /// Runs one fixed tick: wheel commands, balance loads, integration, lean re-read.
    pub fn tick<B: RigidBody + ?Sized>(
        &mut self,
        body: &mut B,
        input: ControlInput,
        ctx: SimContext,
    ) -> VehicleTick {
        if self.fsm.is_tipped_over() {
            body.apply_drive(DriveCommand::idle());
            body.integrate(ctx);
            return self.finish(body, DriveCommand::idle(), None);
        }

        let state = body.kinematic_state();
        let command = self.steering.update(input, state.speed(), ctx.dt);
        let step = self
            .stability
            .advance(&state, self.steering.state().current_steering_angle, ctx);
        step.apply_to(body);

        let mut tipover = None;
        let drive = match step.tipover {
            Some(cause) => {
                let lean = step.lean;
                tipover = self.fsm.trip(TipoverEvent {
                    cause,
                    speed: step.speed,
                    lean_angle: lean.current_lean_angle,
                    threshold: lean.dynamic_tipover_angle,
                });
                DriveCommand::idle()
            }
            None => command.with_steer_bias(step.auto_steer_angle),
        };

        body.apply_drive(drive);
        body.integrate(ctx);
        self.finish(body, drive, tipover)
    }

    fn finish<B: RigidBody + ?Sized>(
        &mut self,
        body: &B,
        drive: DriveCommand,
        tipover: Option<TipoverEvent>,
    ) -> VehicleTick {
        let state = body.kinematic_state();
        self.stability.measure(&state);
        VehicleTick {
            drive,
            lean: self.stability.lean(),
            speed: state.speed(),
            tipover,
        }
    }

    /// Zeroes motion, lean and steering, restores drag and re-arms the fall detector.
    ///
    /// Position is kept; the episode decides where the vehicle respawns.
    pub fn reset<B: RigidBody + ?Sized>(&mut self, body: &mut B) {
        let position = body.kinematic_state().position;
        body.set_velocities(Vector3::zeros(), Vector3::zeros());
        body.set_pose(position, UnitQuaternion::identity());
        body.set_damping(self.initial_damping);
        body.apply_drive(DriveCommand::idle());

        self.steering.reset();
        self.stability.reset();
        self.fsm.reset();
    }

    /// `[lean, speed, angular velocity z, steering, threshold, tipped]`
    pub fn observation_state<B: RigidBody + ?Sized>(&self, body: &B) -> [f32; VEHICLE_STATE_SIZE] {
        let state = body.kinematic_state();
        let lean = self.stability.lean();
        [
            lean.current_lean_angle as f32,
            state.speed() as f32,
            state.angular_velocity.z as f32,
            self.steering.state().current_steering_angle as f32,
            lean.dynamic_tipover_angle as f32,
            if self.fsm.is_tipped_over() { 1.0 } else { 0.0 },
        ]
    }

    pub fn diagnostics<B: RigidBody + ?Sized>(&self, body: &B) -> VehicleDiagnostics {
        let lean = self.stability.lean();
        VehicleDiagnostics {
            lean_angle: lean.current_lean_angle,
            tipover_threshold: lean.dynamic_tipover_angle,
            speed: body.kinematic_state().speed(),
            tipped_over: self.fsm.is_tipped_over(),
        }
    }

    pub fn balance_reward<B: RigidBody + ?Sized>(&self, body: &B) -> f64 {
        self.stability
            .balance_reward(body.kinematic_state().speed(), self.fsm.is_tipped_over())
    }
}

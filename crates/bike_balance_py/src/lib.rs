use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::PyDict;

use bike_env::{
    Action, ActionMode, BicycleEnv, ContactKind, EnvConfig, EnvError, ManualInput, StepResult,
    TriggerZones, OBSERVATION_SIZE,
};
use simcore::{ReferenceBody, RigidBody};

const GOAL_RADIUS: f64 = 2.0;
const ARENA_MARGIN: f64 = 8.0;

fn to_py_err(err: EnvError) -> PyErr {
    match err {
        EnvError::EpisodeFinished => PyRuntimeError::new_err(err.to_string()),
        other => PyValueError::new_err(other.to_string()),
    }
}

/// Python-accessible bicycle balance environment on the reference body.
#[pyclass(unsendable)]
pub struct BicycleEnvPy {
    env: BicycleEnv<ReferenceBody>,
    zones: TriggerZones,
    auto_contacts: bool,
}

#[pymethods]
impl BicycleEnvPy {
    /// Create a new environment.
    ///
    /// Args:
    ///     config_json: Optional JSON overrides for the default configuration.
    ///     seed: Optional seed for the lean perturbation noise.
    ///     discrete: Use the two-branch {0, 1, 2} action space.
    ///     auto_contacts: Detect goal and wall contacts geometrically after each step.
    #[new]
    #[pyo3(signature = (config_json=None, seed=None, discrete=false, auto_contacts=true))]
    fn new(
        config_json: Option<&str>,
        seed: Option<u64>,
        discrete: bool,
        auto_contacts: bool,
    ) -> PyResult<Self> {
        let mut config = match config_json {
            Some(json) => EnvConfig::from_json_str(json)
                .map_err(|err| PyValueError::new_err(err.to_string()))?,
            None => EnvConfig::default(),
        };
        if let Some(seed) = seed {
            config.episode.seed = seed;
        }
        if discrete {
            config.episode.action_mode = ActionMode::Discrete;
        }

        let zones = TriggerZones::for_episode(&config.episode, GOAL_RADIUS, ARENA_MARGIN);
        let body = ReferenceBody::new(config.body.clone());
        let env = BicycleEnv::new(config, body).map_err(to_py_err)?;
        Ok(BicycleEnvPy {
            env,
            zones,
            auto_contacts,
        })
    }

    #[classattr]
    fn observation_size() -> usize {
        OBSERVATION_SIZE
    }

    /// Start a new episode and return the first observation.
    fn reset(&mut self) -> Vec<f32> {
        self.zones.clear();
        self.env.reset().to_vec()
    }

    /// Advance one tick.
    ///
    /// Args:
    ///     action: [steer, motor], floats in [-1, 1] or branch indices {0, 1, 2}.
    ///
    /// Returns:
    ///     (observation, reward, done, info)
    fn step(&mut self, py: Python<'_>, action: Vec<f64>) -> PyResult<(Vec<f32>, f64, bool, PyObject)> {
        let [steer, motor] = action[..] else {
            return Err(PyValueError::new_err(format!(
                "action must have 2 components, got {}",
                action.len()
            )));
        };
        let action = match self.env.config().episode.action_mode {
            ActionMode::Continuous => Action::Continuous([steer as f32, motor as f32]),
            ActionMode::Discrete => Action::Discrete([steer.round() as i32, motor.round() as i32]),
        };

        let result = self.env.step(action).map_err(to_py_err)?;
        if self.auto_contacts && !result.done {
            let position = self.env.body().kinematic_state().position;
            for contact in self.zones.update(&position) {
                self.env.notify_contact(contact);
            }
        }

        let info = info_dict(py, &result)?;
        Ok((result.observation.to_vec(), result.reward, result.done, info))
    }

    /// Queue a contact: "goal", "obstacle" or "checkpoint".
    fn notify_contact(&mut self, kind: &str) -> PyResult<()> {
        let kind = match kind {
            "goal" => ContactKind::Goal,
            "obstacle" | "wall" => ContactKind::Obstacle,
            "checkpoint" => ContactKind::CheckpointTrigger,
            other => return Err(PyValueError::new_err(format!("unknown contact kind {other:?}"))),
        };
        self.env.notify_contact(kind);
        Ok(())
    }

    /// Map held keys to an action in this environment's action space.
    #[pyo3(signature = (steer_left=false, steer_right=false, throttle=false, reverse=false))]
    fn heuristic(&self, steer_left: bool, steer_right: bool, throttle: bool, reverse: bool) -> Vec<f64> {
        let input = ManualInput {
            steer_left,
            steer_right,
            throttle,
            reverse,
        };
        match self.env.heuristic(input) {
            Action::Continuous(values) => values.iter().map(|v| *v as f64).collect(),
            Action::Discrete(values) => values.iter().map(|v| *v as f64).collect(),
        }
    }

    fn observe(&self) -> Vec<f32> {
        self.env.observe().to_vec()
    }

    /// Lean angle, tipover threshold, speed and fall flag as a dict.
    fn diagnostics(&self, py: Python<'_>) -> PyResult<PyObject> {
        let diag = self.env.diagnostics();
        let dict = PyDict::new_bound(py);
        dict.set_item("lean_angle", diag.lean_angle)?;
        dict.set_item("tipover_threshold", diag.tipover_threshold)?;
        dict.set_item("speed", diag.speed)?;
        dict.set_item("tipped_over", diag.tipped_over)?;
        Ok(dict.into())
    }

    /// Current configuration as a JSON string.
    fn config_json(&self) -> PyResult<String> {
        serde_json::to_string(self.env.config()).map_err(|err| PyValueError::new_err(err.to_string()))
    }
}

fn info_dict(py: Python<'_>, result: &StepResult) -> PyResult<PyObject> {
    let b = &result.info.breakdown;
    let breakdown = PyDict::new_bound(py);
    breakdown.set_item("balance", b.balance)?;
    breakdown.set_item("distance", b.distance)?;
    breakdown.set_item("time", b.time)?;
    breakdown.set_item("low_speed", b.low_speed)?;
    breakdown.set_item("alignment", b.alignment)?;
    breakdown.set_item("checkpoint", b.checkpoint)?;
    breakdown.set_item("checkpoint_trigger", b.checkpoint_trigger)?;
    breakdown.set_item("terminal", b.terminal)?;

    let info = PyDict::new_bound(py);
    info.set_item("reward_breakdown", breakdown)?;
    info.set_item("outcome", result.info.outcome.map(|o| format!("{o:?}")))?;
    info.set_item("checkpoint_cursor", result.info.checkpoint_cursor)?;
    info.set_item("elapsed", result.info.elapsed)?;
    Ok(info.into())
}

/// Python module for the bicycle balance environment.
#[pymodule]
fn bike_balance_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<BicycleEnvPy>()?;
    Ok(())
}

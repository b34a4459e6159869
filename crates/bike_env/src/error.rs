use std::path::PathBuf;

use simcore::ParamError;
use thiserror::Error;

use crate::config::ActionMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Param(#[from] ParamError),
}

#[derive(Debug, Error)]
pub enum EnvError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// `step` was called after a terminal step without a `reset` in between.
    #[error("episode has finished; call reset before stepping again")]
    EpisodeFinished,
    #[error("environment expects {expected:?} actions, got {got:?}")]
    ActionMismatch { expected: ActionMode, got: ActionMode },
    #[error("goal coincides with the spawn position")]
    DegenerateGoal,
}

impl From<ParamError> for EnvError {
    fn from(err: ParamError) -> Self {
        EnvError::Config(ConfigError::Param(err))
    }
}

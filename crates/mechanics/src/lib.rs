pub mod stability;
pub mod tipover;

pub use stability::{
    dynamic_tipover_angle, LeanState, Load, LoadSource, StabilityConfig, StabilityModel,
    StabilityStep, TipoverCause,
};
pub use tipover::{TipoverEvent, TipoverFsm, TipoverStatus};

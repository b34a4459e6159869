//! Bicycle balance environment
//!
//! Wraps the lean model, steering and tipover detection around a rigid body
//! and exposes the result as a fixed-timestep reinforcement-learning
//! environment: reset, observe, act, reward, terminate.

pub mod action;
pub mod checkpoints;
pub mod config;
pub mod contact;
pub mod coordinator;
pub mod error;
pub mod observation;
pub mod reward;
pub mod surface;
pub mod vehicle;

pub use action::*;
pub use checkpoints::*;
pub use config::*;
pub use contact::*;
pub use coordinator::*;
pub use error::*;
pub use observation::*;
pub use reward::*;
pub use surface::*;
pub use vehicle::*;

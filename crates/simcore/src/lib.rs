//! Shared simulation vocabulary for the bicycle balance workspace.
//!
//! This crate provides:
//! - The kinematic snapshot read from the rigid-body engine each tick
//! - The `RigidBody` trait every physics backend implements
//! - Angle helpers for wrapping and shortest-arc interpolation
//! - A small semi-implicit Euler `ReferenceBody` for demos and tests

pub mod integrators;
pub mod math;
pub mod traits;

pub use integrators::*;
pub use math::*;
pub use traits::*;

//! Rider-side control for the bicycle
//!
//! This crate provides:
//! - Steering and drive mapping from normalized axes to wheel commands
//! - A scripted PD pilot for demos and baselines

pub mod pilot;
pub mod steering;

pub use pilot::*;
pub use steering::*;

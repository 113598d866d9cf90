//! # Teleop Library
//!
//! Shared types and control logic for the haptic teleoperation cascade.
//! Used by both the teleop fusion node and the torque controller node
//! in the dora-rs dataflow.

pub mod control;
pub mod types;
pub mod utils;

// Re-export everything for convenience
pub use control::*;
pub use types::*;
pub use utils::*;

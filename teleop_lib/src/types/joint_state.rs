use nalgebra::SVector;
use serde::{Deserialize, Serialize};

use crate::types::ControlError;

/// Number of actuated joints on the arm.
pub const JOINT_COUNT: usize = 7;

/// Per-joint position, velocity or torque, in fixed joint order 1..7.
pub type JointVector = SVector<f64, JOINT_COUNT>;

/// Joint state as published by the robot driver.
///
/// Drivers may append extra entries (gripper fingers); only the first
/// `JOINT_COUNT` are used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointState {
    pub positions: Vec<f64>,
    #[serde(default)]
    pub velocities: Vec<f64>,
    #[serde(default)]
    pub efforts: Vec<f64>,
    pub timestamp: u64,
}

/// Torque command written to the actuators, in N·m.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointTorqueCommand {
    pub torques: Vec<f64>,
    pub timestamp: u64,
}

impl JointState {
    pub fn new(positions: &JointVector, velocities: &JointVector) -> Self {
        Self {
            positions: positions.as_slice().to_vec(),
            velocities: velocities.as_slice().to_vec(),
            efforts: Vec::new(),
            timestamp: now_millis(),
        }
    }

    pub fn position_vector(&self) -> Result<JointVector, ControlError> {
        joint_vector_from_slice(&self.positions)
    }

    /// Velocities, or zero when the driver does not report them.
    pub fn velocity_vector(&self) -> Result<JointVector, ControlError> {
        if self.velocities.is_empty() {
            return Ok(JointVector::zeros());
        }
        joint_vector_from_slice(&self.velocities)
    }
}

impl JointTorqueCommand {
    pub fn new(torques: &JointVector) -> Self {
        Self {
            torques: torques.as_slice().to_vec(),
            timestamp: now_millis(),
        }
    }
}

/// Take the first `JOINT_COUNT` values of a slice.
pub fn joint_vector_from_slice(values: &[f64]) -> Result<JointVector, ControlError> {
    if values.len() < JOINT_COUNT {
        return Err(ControlError::ShortJointState {
            expected: JOINT_COUNT,
            found: values.len(),
        });
    }
    Ok(JointVector::from_column_slice(&values[..JOINT_COUNT]))
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

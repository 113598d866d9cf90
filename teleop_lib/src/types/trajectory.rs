use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{now_millis, JointVector, JOINT_COUNT};

/// Joint names expected by the downstream joint trajectory controller.
pub const PANDA_JOINT_NAMES: [&str; JOINT_COUNT] = [
    "panda_joint1",
    "panda_joint2",
    "panda_joint3",
    "panda_joint4",
    "panda_joint5",
    "panda_joint6",
    "panda_joint7",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointTrajectoryPoint {
    pub positions: Vec<f64>,
    /// Nanoseconds from the start of the trajectory.
    pub time_from_start_ns: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointTrajectory {
    pub joint_names: Vec<String>,
    pub points: Vec<JointTrajectoryPoint>,
    pub timestamp: u64,
}

/// Joint-space setpoint produced by one teleop tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectorySetpoint {
    pub positions: JointVector,
    /// Artificial actuation latency, carried as the point's time from start.
    pub delay: Duration,
}

impl TrajectorySetpoint {
    /// Single-point trajectory message for the setpoint.
    pub fn to_message(&self) -> JointTrajectory {
        JointTrajectory {
            joint_names: PANDA_JOINT_NAMES.iter().map(|n| n.to_string()).collect(),
            points: vec![JointTrajectoryPoint {
                positions: self.positions.as_slice().to_vec(),
                time_from_start_ns: self.delay.as_nanos() as u64,
            }],
            timestamp: now_millis(),
        }
    }
}

/// Delay injected into every setpoint: `floor(1000 / rate_hz)` milliseconds
/// scaled by the latency factor.
pub fn setpoint_delay(rate_hz: u32, latency: f64) -> Duration {
    let period_ms = (1000 / rate_hz.max(1)) as f64;
    let delay_ns = (period_ms * latency * 1e6).round().max(0.0);
    Duration::from_nanos(delay_ns as u64)
}

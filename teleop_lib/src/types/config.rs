use eyre::Result;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
use std::fs;

use crate::control::{ControllerGains, TeleopParams};
use crate::types::{ConfigError, JointVector, JOINT_COUNT};
use crate::utils::{JointLimits, KinematicChain};

/// Configuration of the teleop fusion node (stage one).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleopConfig {
    pub name: String,
    pub control: TeleopControlConfig,
    pub joint_limits: JointLimitsConfig,
    pub kinematics: ChainConfig,
    #[serde(default)]
    pub ik: IkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleopControlConfig {
    /// Fusion tick rate. Keep it low, 20 Hz works well with the
    /// joint trajectory controller.
    ///
    /// Ticks come from the dataflow's `tick` timer; this value only sets the
    /// autonomous time base and the setpoint delay, so the timer period must
    /// be `1000 / rate_hz` ms.
    pub rate_hz: u32,
    /// Rate of the Cartesian target telemetry. Must match the period of the
    /// dataflow's `telemetry_tick` timer.
    pub telemetry_rate_hz: u32,
    /// Duration of the startup blend from measured posture to IK output.
    pub ramp_seconds: f64,
    /// Artificial latency factor applied to the tick period.
    pub latency: f64,
    /// End-effector movement per unit of haptic device movement.
    pub mapping_ratio: f64,
    /// Task-space origin in the robot base frame (m).
    pub origin: [f64; 3],
    /// Human share per axis (x, y, z), each in [0, 1].
    pub fusion_weights: [f64; 3],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointLimitsConfig {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Kinematic description from which the base→tip chain is extracted.
///
/// Frames are `root_frame` followed by the child frame of each segment, in
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub root_frame: String,
    pub base_frame: String,
    pub tip_frame: String,
    pub segments: Vec<SegmentConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Child frame name.
    pub name: String,
    pub joint: JointKind,
    #[serde(default)]
    pub convention: DhConvention,
    #[serde(default)]
    pub a: f64,
    #[serde(default)]
    pub alpha: f64,
    #[serde(default)]
    pub d: f64,
    #[serde(default)]
    pub theta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JointKind {
    Revolute,
    Fixed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DhConvention {
    /// Rz(theta) Tz(d) Tx(a) Rx(alpha)
    Standard,
    /// Craig: Rx(alpha) Tx(a) Rz(theta) Tz(d)
    #[default]
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IkConfig {
    /// Newton-Raphson position iterations.
    pub max_iterations: usize,
    /// Damping of the least-squares velocity solve.
    pub damping: f64,
    /// Iteration cap of the SVD inside the velocity solve.
    pub max_svd_iterations: usize,
    /// Largest pose error component accepted as converged.
    pub tolerance: f64,
}

/// Configuration of the torque controller node (stage two).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TorqueConfig {
    pub arm_id: String,
    /// Proportional gains, one per joint.
    #[serde(default)]
    pub k_gains: Vec<f64>,
    /// Derivative gains, one per joint.
    #[serde(default)]
    pub d_gains: Vec<f64>,
    /// Posture the motion generator drives to after activation (rad).
    pub goal_posture: Vec<f64>,
    /// Motion generator speed scaling, in (0, 1].
    pub speed_factor: f64,
    /// Actuation tick rate. Must match the period of the dataflow's `tick`
    /// timer; the poll timeout is validated against it.
    pub rate_hz: u32,
    /// Bounded wait on the external joint goal channel.
    pub poll_timeout_ms: u64,
}

impl Default for IkConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            damping: 1e-4,
            max_svd_iterations: 1000,
            tolerance: 1e-6,
        }
    }
}

impl Default for TeleopConfig {
    /// Franka Panda, base `panda_link0` to `panda_grasptarget`.
    fn default() -> Self {
        Self {
            name: "panda".to_string(),
            control: TeleopControlConfig {
                rate_hz: 20,
                telemetry_rate_hz: 200,
                ramp_seconds: 10.0,
                latency: 2.0,
                mapping_ratio: 1.5,
                origin: [0.4559, 0.0, 0.3346],
                fusion_weights: [1.0, 1.0, 1.0],
            },
            joint_limits: JointLimitsConfig {
                lower: vec![-2.8973, -1.7628, -2.8973, -3.0718, -2.8973, -0.0175, -2.8973],
                upper: vec![2.8973, 1.7628, 2.8973, -0.0698, 2.8973, 3.7525, 2.8973],
            },
            kinematics: ChainConfig::panda(),
            ik: IkConfig::default(),
        }
    }
}

impl Default for TorqueConfig {
    fn default() -> Self {
        Self {
            arm_id: "panda".to_string(),
            k_gains: vec![24.0, 24.0, 24.0, 24.0, 10.0, 6.0, 2.0],
            d_gains: vec![2.0, 2.0, 2.0, 1.0, 1.0, 1.0, 0.5],
            goal_posture: vec![0.0, -FRAC_PI_4, 0.0, -3.0 * FRAC_PI_4, 0.0, FRAC_PI_2, FRAC_PI_4],
            speed_factor: 0.2,
            rate_hz: 250,
            poll_timeout_ms: 2,
        }
    }
}

impl ChainConfig {
    /// Panda arm in modified DH parameters, flange and hand TCP appended as
    /// fixed segments.
    pub fn panda() -> Self {
        let revolute = |name: &str, a: f64, alpha: f64, d: f64| SegmentConfig {
            name: name.to_string(),
            joint: JointKind::Revolute,
            convention: DhConvention::Modified,
            a,
            alpha,
            d,
            theta: 0.0,
        };
        let fixed = |name: &str, d: f64, theta: f64| SegmentConfig {
            name: name.to_string(),
            joint: JointKind::Fixed,
            convention: DhConvention::Modified,
            a: 0.0,
            alpha: 0.0,
            d,
            theta,
        };

        Self {
            root_frame: "panda_link0".to_string(),
            base_frame: "panda_link0".to_string(),
            tip_frame: "panda_grasptarget".to_string(),
            segments: vec![
                revolute("panda_link1", 0.0, 0.0, 0.333),
                revolute("panda_link2", 0.0, -FRAC_PI_2, 0.0),
                revolute("panda_link3", 0.0, FRAC_PI_2, 0.316),
                revolute("panda_link4", 0.0825, FRAC_PI_2, 0.0),
                revolute("panda_link5", -0.0825, -FRAC_PI_2, 0.384),
                revolute("panda_link6", 0.0, FRAC_PI_2, 0.0),
                revolute("panda_link7", 0.088, FRAC_PI_2, 0.0),
                fixed("panda_link8", 0.107, 0.0),
                fixed("panda_hand", 0.0, -FRAC_PI_4),
                fixed("panda_grasptarget", 0.1034, 0.0),
            ],
        }
    }
}

impl TeleopConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: TeleopConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn joint_limits(&self) -> Result<JointLimits, ConfigError> {
        JointLimits::from_bounds(&self.joint_limits.lower, &self.joint_limits.upper)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        TeleopParams::from_config(self)?;
        self.joint_limits()?;
        KinematicChain::from_config(&self.kinematics)?;

        if self.control.telemetry_rate_hz == 0 {
            return Err(ConfigError::OutOfRange {
                name: "control.telemetry_rate_hz".to_string(),
                value: 0.0,
                range: "> 0",
            });
        }

        Ok(())
    }
}

impl TorqueConfig {
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: TorqueConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn gains(&self) -> Result<ControllerGains, ConfigError> {
        ControllerGains::from_params(&self.k_gains, &self.d_gains)
    }

    pub fn goal(&self) -> Result<JointVector, ConfigError> {
        if self.goal_posture.len() != JOINT_COUNT {
            return Err(ConfigError::WrongLength {
                name: "goal_posture".to_string(),
                expected: JOINT_COUNT,
                found: self.goal_posture.len(),
            });
        }
        Ok(JointVector::from_column_slice(&self.goal_posture))
    }

    pub fn tick_period_ms(&self) -> f64 {
        1000.0 / self.rate_hz.max(1) as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gains()?;
        self.goal()?;

        if !(self.speed_factor > 0.0 && self.speed_factor <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "speed_factor".to_string(),
                value: self.speed_factor,
                range: "(0, 1]",
            });
        }

        if self.rate_hz == 0 {
            return Err(ConfigError::OutOfRange {
                name: "rate_hz".to_string(),
                value: 0.0,
                range: "> 0",
            });
        }

        // The poll must never eat the whole tick budget
        if self.poll_timeout_ms as f64 >= self.tick_period_ms() {
            return Err(ConfigError::PollTimeoutTooLong {
                timeout_ms: self.poll_timeout_ms,
                period_ms: self.tick_period_ms(),
            });
        }

        Ok(())
    }
}

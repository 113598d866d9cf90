use nalgebra::Vector3;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::types::{
    joint_vector_from_slice, setpoint_delay, ConfigError, ControlError, HapticPosition, IkConfig,
    JointVector, SafetyViolation, TeleopConfig, TrajectorySetpoint,
};
use crate::utils::{
    blend, fuse, AutonomousTrajectory, FusionWeights, IkService, IkSolution, JointLimits,
    KinematicChain, LinearRampTrajectory, SmoothingRamp,
};

/// Validated runtime parameters of the fusion loop.
#[derive(Debug, Clone)]
pub struct TeleopParams {
    pub rate_hz: u32,
    pub ramp_ticks: u32,
    pub latency: f64,
    pub mapping_ratio: f64,
    pub origin: Vector3<f64>,
    pub weights: FusionWeights,
    pub ik: IkConfig,
}

impl TeleopParams {
    pub fn from_config(config: &TeleopConfig) -> Result<Self, ConfigError> {
        let control = &config.control;

        if control.rate_hz == 0 {
            return Err(ConfigError::OutOfRange {
                name: "control.rate_hz".to_string(),
                value: 0.0,
                range: "> 0",
            });
        }
        if !(control.latency.is_finite() && control.latency >= 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "control.latency".to_string(),
                value: control.latency,
                range: ">= 0",
            });
        }
        if !(control.mapping_ratio.is_finite() && control.mapping_ratio > 0.0) {
            return Err(ConfigError::OutOfRange {
                name: "control.mapping_ratio".to_string(),
                value: control.mapping_ratio,
                range: "> 0",
            });
        }

        let ramp = SmoothingRamp::from_duration(control.rate_hz, control.ramp_seconds)?;
        let [wx, wy, wz] = control.fusion_weights;

        Ok(Self {
            rate_hz: control.rate_hz,
            ramp_ticks: ramp.max_ticks(),
            latency: control.latency,
            mapping_ratio: control.mapping_ratio,
            origin: Vector3::from(control.origin),
            weights: FusionWeights::new(wx, wy, wz)?,
            ik: config.ik.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeleopState {
    /// No joint state received yet.
    Idle,
    Active,
}

/// What one active fusion tick produced.
#[derive(Debug, Clone)]
pub struct TeleopTick {
    pub setpoint: TrajectorySetpoint,
    /// Ramp weight used for the blend.
    pub weight: f64,
    pub ik: IkSolution,
    /// Fused Cartesian target in the base frame (m).
    pub target: Vector3<f64>,
}

/// Stage one of the cascade: fuses the operator's haptic offset with an
/// autonomous offset, solves IK for the fused position and emits a smoothed,
/// limit-checked joint setpoint once per tick.
pub struct TeleopFusionLoop<A: AutonomousTrajectory = LinearRampTrajectory> {
    params: TeleopParams,
    ik: IkService,
    limits: Arc<JointLimits>,
    autonomous: A,
    ramp: SmoothingRamp,
    state: TeleopState,
    current_joints: JointVector,
    human_offset: Vector3<f64>,
    target: Vector3<f64>,
}

impl<A: AutonomousTrajectory> TeleopFusionLoop<A> {
    pub fn new(
        params: TeleopParams,
        chain: Arc<KinematicChain>,
        limits: Arc<JointLimits>,
        autonomous: A,
    ) -> Result<Self, ConfigError> {
        let ramp = SmoothingRamp::new(params.ramp_ticks)?;
        let ik = IkService::new(chain, params.ik.clone());
        let target = params.origin;

        Ok(Self {
            params,
            ik,
            limits,
            autonomous,
            ramp,
            state: TeleopState::Idle,
            current_joints: JointVector::zeros(),
            human_offset: Vector3::zeros(),
            target,
        })
    }

    pub fn state(&self) -> TeleopState {
        self.state
    }

    /// Most recent fused target, the origin until the first active tick.
    pub fn cartesian_target(&self) -> Vector3<f64> {
        self.target
    }

    pub fn current_joints(&self) -> &JointVector {
        &self.current_joints
    }

    pub fn ik(&self) -> &IkService {
        &self.ik
    }

    /// Sensor update. The first accepted one activates the loop.
    pub fn on_joint_state(&mut self, positions: &[f64]) -> Result<(), ControlError> {
        self.current_joints = joint_vector_from_slice(positions)?;

        if self.state == TeleopState::Idle {
            info!("First joint state received, teleoperation active");
            self.state = TeleopState::Active;
        }
        Ok(())
    }

    pub fn on_haptic(&mut self, position: &HapticPosition) {
        self.human_offset = position.to_offset(self.params.mapping_ratio);
    }

    /// Run one fusion tick. `Ok(None)` while idle.
    pub fn tick(&mut self) -> Result<Option<TeleopTick>, SafetyViolation> {
        if self.state == TeleopState::Idle {
            return Ok(None);
        }

        // Time is taken from the ramp counter, so it stops once the ramp is done
        let t = self.ramp.count() as f64 / self.params.rate_hz as f64;
        let autonomous = self.autonomous.offset_at(t);

        self.target = fuse(
            &self.params.origin,
            &self.human_offset,
            &autonomous,
            &self.params.weights,
        );

        let solution = self.ik.solve(&self.current_joints, &self.target);
        if !solution.converged {
            warn!(
                "IK did not converge after {} iterations (residual {:.3e})",
                solution.iterations, solution.residual
            );
        }

        let weight = self.ramp.advance();
        let positions = blend(&self.current_joints, &solution.joints, weight);

        self.limits.enforce(&positions)?;

        debug!(
            "target [{:.4}, {:.4}, {:.4}] weight {:.3}",
            self.target.x, self.target.y, self.target.z, weight
        );

        Ok(Some(TeleopTick {
            setpoint: TrajectorySetpoint {
                positions,
                delay: setpoint_delay(self.params.rate_hz, self.params.latency),
            },
            weight,
            ik: solution,
            target: self.target,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainConfig;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};
    use std::time::Duration;

    fn ready_posture() -> JointVector {
        JointVector::from_column_slice(&[
            0.0,
            -FRAC_PI_4,
            0.0,
            -3.0 * FRAC_PI_4,
            0.0,
            FRAC_PI_2,
            FRAC_PI_4,
        ])
    }

    /// Loop whose origin is the ready posture's TCP, so a zero haptic
    /// offset asks IK for the pose the arm is already in.
    fn teleop_loop(limits: JointLimits) -> TeleopFusionLoop {
        let config = TeleopConfig::default();
        let chain = Arc::new(KinematicChain::from_config(&ChainConfig::panda()).unwrap());
        let mut params = TeleopParams::from_config(&config).unwrap();
        params.origin = chain.forward_kinematics(&ready_posture()).translation.vector;

        TeleopFusionLoop::new(
            params,
            chain,
            Arc::new(limits),
            LinearRampTrajectory::default(),
        )
        .unwrap()
    }

    fn panda_limits() -> JointLimits {
        TeleopConfig::default().joint_limits().unwrap()
    }

    #[test]
    fn test_idle_ticks_produce_nothing() {
        let mut teleop = teleop_loop(panda_limits());
        assert_eq!(teleop.state(), TeleopState::Idle);

        for _ in 0..5 {
            assert!(teleop.tick().unwrap().is_none());
        }
        assert!(teleop.ik().frozen_orientation().is_none());
    }

    #[test]
    fn test_short_joint_state_rejected() {
        let mut teleop = teleop_loop(panda_limits());
        let err = teleop.on_joint_state(&[0.0; 6]).unwrap_err();

        assert_eq!(
            err,
            ControlError::ShortJointState {
                expected: 7,
                found: 6
            }
        );
        assert_eq!(teleop.state(), TeleopState::Idle);
    }

    #[test]
    fn test_extra_joint_entries_ignored() {
        let mut teleop = teleop_loop(panda_limits());
        let mut positions = ready_posture().as_slice().to_vec();
        positions.extend([0.04, 0.04]);

        teleop.on_joint_state(&positions).unwrap();
        assert_eq!(teleop.state(), TeleopState::Active);
        assert_eq!(*teleop.current_joints(), ready_posture());
    }

    #[test]
    fn test_delay_is_constant_across_ticks() {
        let mut teleop = teleop_loop(panda_limits());
        teleop.on_joint_state(ready_posture().as_slice()).unwrap();

        for _ in 0..10 {
            let tick = teleop.tick().unwrap().unwrap();
            assert_eq!(tick.setpoint.delay, Duration::from_millis(100));
        }
    }

    #[test]
    fn test_first_tick_stays_near_measured_posture() {
        let mut teleop = teleop_loop(panda_limits());
        let q = ready_posture();
        teleop.on_joint_state(q.as_slice()).unwrap();

        let tick = teleop.tick().unwrap().unwrap();
        assert!((tick.weight - 1.0 / 200.0).abs() < 1e-12);
        assert!(tick.ik.converged);
        assert!((tick.setpoint.positions - q).amax() < 1e-9);
        assert_eq!(tick.target, teleop.cartesian_target());
    }

    #[test]
    fn test_weight_progresses_with_ticks() {
        let mut teleop = teleop_loop(panda_limits());
        teleop.on_joint_state(ready_posture().as_slice()).unwrap();

        let mut weights = Vec::new();
        for _ in 0..3 {
            weights.push(teleop.tick().unwrap().unwrap().weight);
        }
        assert_eq!(weights, vec![0.005, 0.01, 0.015]);
    }

    #[test]
    fn test_haptic_offset_moves_target() {
        let mut teleop = teleop_loop(panda_limits());
        teleop.on_joint_state(ready_posture().as_slice()).unwrap();
        let origin = teleop.cartesian_target();

        teleop.on_haptic(&HapticPosition {
            x: 2.0,
            y: 0.0,
            z: -1.0,
        });
        let tick = teleop.tick().unwrap().unwrap();

        assert!((tick.target.x - (origin.x + 0.03)).abs() < 1e-12);
        assert!((tick.target.y - origin.y).abs() < 1e-12);
        assert!((tick.target.z - (origin.z - 0.015)).abs() < 1e-12);
    }

    #[test]
    fn test_setpoint_outside_limits_is_violation() {
        let limits = JointLimits::from_bounds(&[-0.1; 7], &[0.1; 7]).unwrap();
        let mut teleop = teleop_loop(limits);
        teleop.on_joint_state(ready_posture().as_slice()).unwrap();

        let violation = teleop.tick().unwrap_err();
        assert_eq!(violation.joint, 2);
    }
}

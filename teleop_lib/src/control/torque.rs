use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::types::{ConfigError, ControlError, JointVector, TorqueConfig, JOINT_COUNT};
use crate::utils::{
    LatestReceiver, MotionGenerator, MotionGoal, PollOutcome, SynchronizedTrapezoid, VelocityFilter,
};

/// Per-joint proportional and derivative gains.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerGains {
    pub k: JointVector,
    pub d: JointVector,
}

impl ControllerGains {
    /// Both gain lists must be present and hold exactly one value per joint.
    pub fn from_params(k_gains: &[f64], d_gains: &[f64]) -> Result<Self, ConfigError> {
        for (name, gains) in [("k_gains", k_gains), ("d_gains", d_gains)] {
            if gains.is_empty() {
                return Err(ConfigError::MissingParameter(name.to_string()));
            }
            if gains.len() != JOINT_COUNT {
                return Err(ConfigError::WrongLength {
                    name: name.to_string(),
                    expected: JOINT_COUNT,
                    found: gains.len(),
                });
            }
        }

        Ok(Self {
            k: JointVector::from_column_slice(k_gains),
            d: JointVector::from_column_slice(d_gains),
        })
    }
}

/// `tau = k * (desired - measured) - d * filtered_velocity`, per joint.
pub fn pd_torque(
    gains: &ControllerGains,
    desired: &JointVector,
    measured: &JointVector,
    filtered_velocity: &JointVector,
) -> JointVector {
    gains.k.component_mul(&(desired - measured)) - gains.d.component_mul(filtered_velocity)
}

/// Joint-level access to the arm: state reads and torque writes.
pub trait ActuatorInterface {
    fn joint_positions(&self) -> JointVector;
    fn joint_velocities(&self) -> JointVector;
    fn command_torques(&mut self, torques: &JointVector);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorqueLoopState {
    Initializing,
    Tracking,
    /// Motion finished, zero torque from here on.
    Holding,
}

/// What one torque tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TorqueTickReport {
    pub state: TorqueLoopState,
    pub torques: JointVector,
    /// Latest external joint goal seen during this tick's poll.
    pub external_goal: Option<JointVector>,
}

/// Stage two of the cascade: follows a point-to-point motion with a joint PD
/// law on filtered velocities, then holds with zero torque.
///
/// Every tick first waits a bounded time on the external joint goal channel.
/// Goals received there are only reported, the motion is not changed.
pub struct TorqueControlLoop {
    gains: ControllerGains,
    filter: VelocityFilter,
    goal_posture: JointVector,
    speed_factor: f64,
    goal_rx: LatestReceiver<JointVector>,
    poll_timeout: Duration,
    goal_channel_open: bool,
    generator: Option<Box<dyn MotionGenerator>>,
    activated_at: Option<Instant>,
    state: TorqueLoopState,
}

impl TorqueControlLoop {
    pub fn new(
        config: &TorqueConfig,
        goal_rx: LatestReceiver<JointVector>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            gains: config.gains()?,
            filter: VelocityFilter::default(),
            goal_posture: config.goal()?,
            speed_factor: config.speed_factor,
            goal_rx,
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            goal_channel_open: true,
            generator: None,
            activated_at: None,
            state: TorqueLoopState::Initializing,
        })
    }

    pub fn state(&self) -> TorqueLoopState {
        self.state
    }

    pub fn gains(&self) -> &ControllerGains {
        &self.gains
    }

    pub fn filtered_velocity(&self) -> &JointVector {
        self.filter.value()
    }

    /// Plan the motion from the arm's current posture to the configured goal.
    pub fn activate(
        &mut self,
        arm: &impl ActuatorInterface,
        now: Instant,
    ) -> Result<(), ControlError> {
        let start = arm.joint_positions();
        let goal = MotionGoal::new(start, self.goal_posture, self.speed_factor)?;
        let generator = SynchronizedTrapezoid::new(goal);

        info!(
            "Torque loop activated, motion to goal posture takes {:.2} s",
            generator.duration()
        );
        self.activate_with_generator(Box::new(generator), now);
        Ok(())
    }

    pub fn activate_with_generator(&mut self, generator: Box<dyn MotionGenerator>, now: Instant) {
        self.filter.reset();
        self.generator = Some(generator);
        self.activated_at = Some(now);
        self.state = TorqueLoopState::Tracking;
    }

    pub fn tick(
        &mut self,
        arm: &mut impl ActuatorInterface,
        now: Instant,
    ) -> Result<TorqueTickReport, ControlError> {
        let (generator, activated_at) = match (self.generator.as_mut(), self.activated_at) {
            (Some(generator), Some(activated_at)) => (generator, activated_at),
            _ => return Err(ControlError::NotActivated),
        };

        let external_goal = match self.goal_rx.poll(self.poll_timeout) {
            PollOutcome::Received(goal) => {
                debug!("Received desired joint values: {:?}", goal.as_slice());
                Some(goal)
            }
            PollOutcome::Timeout => None,
            PollOutcome::Disconnected => {
                if self.goal_channel_open {
                    warn!("Desired joint values channel closed");
                    self.goal_channel_open = false;
                }
                None
            }
        };

        if self.state == TorqueLoopState::Holding {
            let torques = JointVector::zeros();
            arm.command_torques(&torques);
            return Ok(TorqueTickReport {
                state: self.state,
                torques,
                external_goal,
            });
        }

        let q = arm.joint_positions();
        let dq = arm.joint_velocities();

        let elapsed = now.saturating_duration_since(activated_at);
        let (desired, finished) = generator.desired_joint_positions(elapsed);

        let torques = if finished {
            info!("Motion finished, holding with zero torque");
            self.state = TorqueLoopState::Holding;
            JointVector::zeros()
        } else {
            let filtered = self.filter.update(&dq);
            pd_torque(&self.gains, &desired, &q, filtered)
        };

        arm.command_torques(&torques);

        Ok(TorqueTickReport {
            state: self.state,
            torques,
            external_goal,
        })
    }
}

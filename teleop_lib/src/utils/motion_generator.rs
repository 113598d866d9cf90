use std::time::Duration;

use crate::types::{ConfigError, JointVector, JOINT_COUNT};

/// Joint velocity limits at speed factor 1 (rad/s).
pub const MAX_JOINT_VELOCITY: [f64; JOINT_COUNT] = [2.0, 2.0, 2.0, 2.0, 2.5, 2.5, 2.5];

/// Joint acceleration and deceleration at speed factor 1 (rad/s^2).
pub const MAX_JOINT_ACCELERATION: f64 = 5.0;

/// Below this a joint is considered already at its goal (rad).
const MOTION_EPSILON: f64 = 1e-9;

/// Point-to-point motion request, fixed for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionGoal {
    pub start: JointVector,
    pub goal: JointVector,
    pub speed_factor: f64,
}

/// Produces the desired joint positions along a point-to-point motion.
pub trait MotionGenerator: Send {
    /// Desired positions `elapsed` after activation, and whether the motion
    /// has finished.
    fn desired_joint_positions(&mut self, elapsed: Duration) -> (JointVector, bool);
}

impl MotionGoal {
    pub fn new(start: JointVector, goal: JointVector, speed_factor: f64) -> Result<Self, ConfigError> {
        if !(speed_factor > 0.0 && speed_factor <= 1.0) {
            return Err(ConfigError::OutOfRange {
                name: "speed_factor".to_string(),
                value: speed_factor,
                range: "(0, 1]",
            });
        }
        Ok(Self {
            start,
            goal,
            speed_factor,
        })
    }
}

/// Trapezoidal velocity profile per joint, synchronised so that every joint
/// starts and finishes together.
///
/// All joints share the same acceleration. The slowest joint sets the
/// duration; the others cruise at a lower velocity to arrive at the same
/// time.
#[derive(Debug, Clone)]
pub struct SynchronizedTrapezoid {
    goal: MotionGoal,
    acceleration: f64,
    duration: f64,
    cruise_velocity: JointVector,
}

impl SynchronizedTrapezoid {
    pub fn new(goal: MotionGoal) -> Self {
        let acceleration = MAX_JOINT_ACCELERATION * goal.speed_factor;
        let delta = goal.goal - goal.start;

        let mut duration: f64 = 0.0;
        for i in 0..JOINT_COUNT {
            let distance = delta[i].abs();
            if distance < MOTION_EPSILON {
                continue;
            }
            let v_max = MAX_JOINT_VELOCITY[i] * goal.speed_factor;
            let joint_duration = if distance >= v_max * v_max / acceleration {
                distance / v_max + v_max / acceleration
            } else {
                2.0 * (distance / acceleration).sqrt()
            };
            duration = duration.max(joint_duration);
        }

        // Cruise velocity v solving d = v * (T - v / a)
        let mut cruise_velocity = JointVector::zeros();
        for i in 0..JOINT_COUNT {
            let distance = delta[i].abs();
            if distance < MOTION_EPSILON {
                continue;
            }
            let a_t = acceleration * duration;
            let discriminant = (a_t * a_t - 4.0 * acceleration * distance).max(0.0);
            cruise_velocity[i] = (a_t - discriminant.sqrt()) / 2.0;
        }

        Self {
            goal,
            acceleration,
            duration,
            cruise_velocity,
        }
    }

    /// Total motion time in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    fn travelled(&self, joint: usize, t: f64) -> f64 {
        let v = self.cruise_velocity[joint];
        let a = self.acceleration;
        let ramp_time = v / a;

        if t < ramp_time {
            0.5 * a * t * t
        } else if t < self.duration - ramp_time {
            0.5 * a * ramp_time * ramp_time + v * (t - ramp_time)
        } else {
            let remaining = (self.duration - t).max(0.0);
            (self.goal.goal[joint] - self.goal.start[joint]).abs() - 0.5 * a * remaining * remaining
        }
    }
}

impl MotionGenerator for SynchronizedTrapezoid {
    fn desired_joint_positions(&mut self, elapsed: Duration) -> (JointVector, bool) {
        let t = elapsed.as_secs_f64();
        if t >= self.duration {
            return (self.goal.goal, true);
        }

        let mut desired = self.goal.start;
        for i in 0..JOINT_COUNT {
            let delta = self.goal.goal[i] - self.goal.start[i];
            if delta.abs() < MOTION_EPSILON {
                continue;
            }
            desired[i] += delta.signum() * self.travelled(i, t);
        }

        (desired, false)
    }
}

use nalgebra::{DVector, Isometry3, Translation3, UnitQuaternion, Vector3, Vector6, SVD};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::types::{IkConfig, JointVector};
use crate::utils::KinematicChain;

/// Result of one IK solve. `joints` is always the last iterate, whether or
/// not the solve converged.
#[derive(Debug, Clone, PartialEq)]
pub struct IkSolution {
    pub joints: JointVector,
    pub converged: bool,
    pub iterations: usize,
    /// Norm of the remaining pose error twist.
    pub residual: f64,
}

/// Position-only inverse kinematics with an orientation frozen on first use.
///
/// The first call captures the end-effector orientation of the joints it is
/// given; every later call keeps that orientation and only moves the target
/// position. The capture is permanent for the lifetime of the service.
///
/// The solve is a Newton-Raphson loop on the pose error twist. Each step
/// uses a damped least-squares inverse of the Jacobian computed via SVD.
pub struct IkService {
    chain: Arc<KinematicChain>,
    config: IkConfig,
    orientation: Option<UnitQuaternion<f64>>,
}

impl IkService {
    pub fn new(chain: Arc<KinematicChain>, config: IkConfig) -> Self {
        Self {
            chain,
            config,
            orientation: None,
        }
    }

    pub fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    /// Orientation captured by the first solve, if any.
    pub fn frozen_orientation(&self) -> Option<&UnitQuaternion<f64>> {
        self.orientation.as_ref()
    }

    pub fn solve(&mut self, current: &JointVector, target: &Vector3<f64>) -> IkSolution {
        let started = Instant::now();

        let chain = &self.chain;
        let orientation = *self
            .orientation
            .get_or_insert_with(|| chain.forward_kinematics(current).rotation);
        let goal = Isometry3::from_parts(Translation3::from(*target), orientation);

        let mut joints = *current;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.config.max_iterations {
            let error = pose_error(&self.chain.forward_kinematics(&joints), &goal);
            if error.amax() <= self.config.tolerance {
                converged = true;
                break;
            }

            match self.velocity_step(&joints, &error) {
                Some(delta) => joints += delta,
                None => {
                    warn!("IK velocity solve failed after {} iterations", iterations);
                    break;
                }
            }
            iterations += 1;
        }

        let residual = pose_error(&self.chain.forward_kinematics(&joints), &goal).norm();

        debug!(
            "IK solve took {} us ({} iterations, residual {:.2e})",
            started.elapsed().as_micros(),
            iterations,
            residual
        );

        IkSolution {
            joints,
            converged,
            iterations,
            residual,
        }
    }

    /// Joint step for a desired tip twist: `V diag(s / (s^2 + l^2)) U^T e`.
    fn velocity_step(&self, joints: &JointVector, error: &Vector6<f64>) -> Option<JointVector> {
        let jacobian = self.chain.jacobian(joints);
        let svd = SVD::try_new(
            jacobian,
            true,
            true,
            f64::EPSILON,
            self.config.max_svd_iterations,
        )?;
        let u = svd.u.as_ref()?;
        let v_t = svd.v_t.as_ref()?;

        let lambda_sq = self.config.damping * self.config.damping;
        let mut projected = u.transpose() * DVector::from_column_slice(error.as_slice());
        for (p, sigma) in projected.iter_mut().zip(svd.singular_values.iter()) {
            let denom = sigma * sigma + lambda_sq;
            *p = if denom > 0.0 { *p * sigma / denom } else { 0.0 };
        }

        let delta = v_t.transpose() * projected;
        Some(JointVector::from_column_slice(delta.as_slice()))
    }
}

/// Twist taking `current` to `goal`, both expressed in the base frame.
/// Linear part first, then the rotation vector.
pub fn pose_error(current: &Isometry3<f64>, goal: &Isometry3<f64>) -> Vector6<f64> {
    let linear = goal.translation.vector - current.translation.vector;
    let angular = (goal.rotation * current.rotation.inverse()).scaled_axis();
    Vector6::new(linear.x, linear.y, linear.z, angular.x, angular.y, angular.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChainConfig;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    fn service() -> IkService {
        let chain = KinematicChain::from_config(&ChainConfig::panda()).unwrap();
        IkService::new(Arc::new(chain), IkConfig::default())
    }

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

    #[test]
    fn test_no_orientation_before_first_solve() {
        assert!(service().frozen_orientation().is_none());
    }

    #[test]
    fn test_reaches_nearby_target_with_frozen_orientation() {
        let mut ik = service();
        let q = ready_posture();
        let start = ik.chain().forward_kinematics(&q);
        let target = start.translation.vector + Vector3::new(0.03, -0.02, 0.01);

        let solution = ik.solve(&q, &target);
        assert!(solution.converged, "residual {}", solution.residual);

        let reached = ik.chain().forward_kinematics(&solution.joints);
        assert!((reached.translation.vector - target).norm() < 1e-5);
        assert!(reached.rotation.angle_to(&start.rotation) < 1e-5);
    }

    #[test]
    fn test_orientation_is_frozen_across_calls() {
        let mut ik = service();
        let q = ready_posture();
        let p = ik.chain().forward_kinematics(&q).translation.vector;

        ik.solve(&q, &(p + Vector3::new(0.02, 0.0, 0.0)));
        let first = *ik.frozen_orientation().unwrap();

        ik.solve(&q, &(p + Vector3::new(0.0, 0.0, -0.03)));
        let second = *ik.frozen_orientation().unwrap();

        assert_eq!(first, second);
        assert_eq!(first, ik.chain().forward_kinematics(&q).rotation);
    }

    #[test]
    fn test_later_start_postures_do_not_recapture() {
        let mut ik = service();
        let q = ready_posture();
        let p = ik.chain().forward_kinematics(&q).translation.vector;
        ik.solve(&q, &p);

        let mut moved = q;
        moved[6] += 0.3;
        ik.solve(&moved, &p);

        assert_eq!(
            *ik.frozen_orientation().unwrap(),
            ik.chain().forward_kinematics(&q).rotation
        );
    }

    #[test]
    fn test_target_already_reached_returns_start() {
        let mut ik = service();
        let q = ready_posture();
        let p = ik.chain().forward_kinematics(&q).translation.vector;

        let solution = ik.solve(&q, &p);
        assert!(solution.converged);
        assert_eq!(solution.iterations, 0);
        assert_eq!(solution.joints, q);
    }

    #[test]
    fn test_unreachable_target_still_returns_joints() {
        let mut ik = IkService::new(
            Arc::new(KinematicChain::from_config(&ChainConfig::panda()).unwrap()),
            IkConfig {
                max_iterations: 20,
                ..IkConfig::default()
            },
        );
        let q = ready_posture();

        let solution = ik.solve(&q, &Vector3::new(3.0, 0.0, 0.5));
        assert!(!solution.converged);
        assert!(solution.iterations <= 20);
        assert!(solution.residual > 1.0);
        assert!(solution.joints.iter().all(|v| v.is_finite()));
    }
}

use nalgebra::{DMatrix, Isometry3, Vector3};

use crate::types::{
    ChainConfig, ConfigError, DhConvention, JointKind, JointVector, SegmentConfig, JOINT_COUNT,
};

/// One link of the chain: a fixed transform before the joint, a rotation
/// about the local z axis, and a fixed transform after it.
#[derive(Debug, Clone)]
pub struct Segment {
    name: String,
    joint: JointKind,
    pre: Isometry3<f64>,
    post: Isometry3<f64>,
    theta_offset: f64,
}

/// Serial kinematic chain from a base frame to a tip frame with exactly
/// `JOINT_COUNT` revolute joints. Immutable once built.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    base_frame: String,
    tip_frame: String,
    segments: Vec<Segment>,
}

impl Segment {
    pub fn from_config(config: &SegmentConfig) -> Self {
        let (pre, post) = match config.convention {
            DhConvention::Standard => (
                Isometry3::identity(),
                Isometry3::translation(config.a, 0.0, config.d)
                    * Isometry3::rotation(Vector3::x() * config.alpha),
            ),
            DhConvention::Modified => (
                Isometry3::rotation(Vector3::x() * config.alpha)
                    * Isometry3::translation(config.a, 0.0, 0.0),
                Isometry3::translation(0.0, 0.0, config.d),
            ),
        };

        Self {
            name: config.name.clone(),
            joint: config.joint,
            pre,
            post,
            theta_offset: config.theta,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_revolute(&self) -> bool {
        self.joint == JointKind::Revolute
    }

    /// Transform from the parent frame to this segment's frame.
    fn pose(&self, q: f64) -> Isometry3<f64> {
        let joint_angle = if self.is_revolute() { q } else { 0.0 };
        let angle = joint_angle + self.theta_offset;
        self.pre * Isometry3::rotation(Vector3::z() * angle) * self.post
    }
}

impl KinematicChain {
    /// Extract the `base_frame` → `tip_frame` chain from the kinematic
    /// description.
    pub fn from_config(config: &ChainConfig) -> Result<Self, ConfigError> {
        let frame_index = |frame: &str| -> Result<usize, ConfigError> {
            if frame == config.root_frame {
                return Ok(0);
            }
            config
                .segments
                .iter()
                .position(|s| s.name == frame)
                .map(|i| i + 1)
                .ok_or_else(|| ConfigError::UnknownFrame(frame.to_string()))
        };

        let base = frame_index(&config.base_frame)?;
        let tip = frame_index(&config.tip_frame)?;
        if tip <= base {
            return Err(ConfigError::InvalidChain {
                base: config.base_frame.clone(),
                tip: config.tip_frame.clone(),
            });
        }

        let segments: Vec<Segment> = config.segments[base..tip]
            .iter()
            .map(Segment::from_config)
            .collect();

        let revolute = segments.iter().filter(|s| s.is_revolute()).count();
        if revolute != JOINT_COUNT {
            return Err(ConfigError::JointCountMismatch {
                base: config.base_frame.clone(),
                tip: config.tip_frame.clone(),
                expected: JOINT_COUNT,
                found: revolute,
            });
        }

        Ok(Self {
            base_frame: config.base_frame.clone(),
            tip_frame: config.tip_frame.clone(),
            segments,
        })
    }

    pub fn base_frame(&self) -> &str {
        &self.base_frame
    }

    pub fn tip_frame(&self) -> &str {
        &self.tip_frame
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Pose of the tip frame in the base frame.
    pub fn forward_kinematics(&self, joints: &JointVector) -> Isometry3<f64> {
        let mut transform = Isometry3::identity();
        let mut j = 0;

        for segment in &self.segments {
            let q = if segment.is_revolute() {
                j += 1;
                joints[j - 1]
            } else {
                0.0
            };
            transform *= segment.pose(q);
        }

        transform
    }

    /// Geometric Jacobian (6 x JOINT_COUNT) of the tip in the base frame.
    /// Rows 0..3 are linear velocity, rows 3..6 angular velocity.
    pub fn jacobian(&self, joints: &JointVector) -> DMatrix<f64> {
        let mut axes = Vec::with_capacity(JOINT_COUNT);
        let mut transform = Isometry3::identity();
        let mut j = 0;

        for segment in &self.segments {
            if segment.is_revolute() {
                let joint_frame = transform * segment.pre;
                axes.push((
                    joint_frame.translation.vector,
                    joint_frame.rotation * Vector3::z(),
                ));
                transform *= segment.pose(joints[j]);
                j += 1;
            } else {
                transform *= segment.pose(0.0);
            }
        }

        let tip_position = transform.translation.vector;
        let mut jacobian = DMatrix::zeros(6, JOINT_COUNT);

        for (i, (origin, axis)) in axes.iter().enumerate() {
            let linear_contrib = axis.cross(&(tip_position - origin));
            jacobian[(0, i)] = linear_contrib.x;
            jacobian[(1, i)] = linear_contrib.y;
            jacobian[(2, i)] = linear_contrib.z;

            jacobian[(3, i)] = axis.x;
            jacobian[(4, i)] = axis.y;
            jacobian[(5, i)] = axis.z;
        }

        jacobian
    }
}

use crate::types::{ConfigError, JointVector, SafetyViolation, JOINT_COUNT};

/// Closed per-joint position ranges, fixed at configuration time.
#[derive(Debug, Clone, PartialEq)]
pub struct JointLimits {
    lower: JointVector,
    upper: JointVector,
}

impl JointLimits {
    pub fn from_bounds(lower: &[f64], upper: &[f64]) -> Result<Self, ConfigError> {
        for (name, values) in [("joint_limits.lower", lower), ("joint_limits.upper", upper)] {
            if values.len() != JOINT_COUNT {
                return Err(ConfigError::WrongLength {
                    name: name.to_string(),
                    expected: JOINT_COUNT,
                    found: values.len(),
                });
            }
        }

        for i in 0..JOINT_COUNT {
            if !(lower[i] <= upper[i]) {
                return Err(ConfigError::InvertedLimits {
                    joint: i + 1,
                    lower: lower[i],
                    upper: upper[i],
                });
            }
        }

        Ok(Self {
            lower: JointVector::from_column_slice(lower),
            upper: JointVector::from_column_slice(upper),
        })
    }

    pub fn lower(&self) -> &JointVector {
        &self.lower
    }

    pub fn upper(&self) -> &JointVector {
        &self.upper
    }

    /// True iff every joint lies within its `[lower, upper]` interval.
    pub fn check(&self, joints: &JointVector) -> bool {
        self.first_violation(joints).is_none()
    }

    /// Err on the first joint outside its interval. NaN always violates.
    pub fn enforce(&self, joints: &JointVector) -> Result<(), SafetyViolation> {
        match self.first_violation(joints) {
            Some(violation) => Err(violation),
            None => Ok(()),
        }
    }

    fn first_violation(&self, joints: &JointVector) -> Option<SafetyViolation> {
        (0..JOINT_COUNT)
            .find(|&i| !(self.lower[i] <= joints[i] && joints[i] <= self.upper[i]))
            .map(|i| SafetyViolation {
                joint: i + 1,
                value: joints[i],
                lower: self.lower[i],
                upper: self.upper[i],
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TeleopConfig;

    fn panda_limits() -> JointLimits {
        TeleopConfig::default().joint_limits().unwrap()
    }

    #[test]
    fn test_ready_posture_within_limits() {
        let q = JointVector::from_column_slice(&[0.0, -0.785, 0.0, -2.356, 0.0, 1.571, 0.785]);
        assert!(panda_limits().check(&q));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let limits = panda_limits();
        assert!(limits.check(limits.lower()));
        assert!(limits.check(limits.upper()));
    }

    #[test]
    fn test_each_joint_checked() {
        let limits = panda_limits();
        let inside = (limits.lower() + limits.upper()) / 2.0;

        for i in 0..JOINT_COUNT {
            let mut above = inside;
            above[i] = limits.upper()[i] + 1e-9;
            assert!(!limits.check(&above), "joint {} above", i + 1);

            let mut below = inside;
            below[i] = limits.lower()[i] - 1e-9;
            let violation = limits.enforce(&below).unwrap_err();
            assert_eq!(violation.joint, i + 1);
        }
    }

    #[test]
    fn test_zero_posture_violates_joint4() {
        // joint 4 upper limit is -0.0698, so the all-zero posture is unsafe
        let violation = panda_limits().enforce(&JointVector::zeros()).unwrap_err();
        assert_eq!(violation.joint, 4);
    }

    #[test]
    fn test_nan_violates() {
        let limits = panda_limits();
        let mut q = (limits.lower() + limits.upper()) / 2.0;
        q[2] = f64::NAN;
        assert!(!limits.check(&q));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let mut lower = vec![-1.0; JOINT_COUNT];
        let upper = vec![1.0; JOINT_COUNT];
        lower[5] = 2.0;
        assert_eq!(
            JointLimits::from_bounds(&lower, &upper).unwrap_err(),
            ConfigError::InvertedLimits {
                joint: 6,
                lower: 2.0,
                upper: 1.0
            }
        );
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = JointLimits::from_bounds(&[0.0; 6], &[1.0; 7]).unwrap_err();
        assert!(matches!(err, ConfigError::WrongLength { found: 6, .. }));
    }
}

use crate::types::JointVector;

/// Weight of the new velocity sample.
///
/// NOTE: with 0.99 the output is close to the raw measurement rather than
/// a heavily smoothed signal. Kept as tuned on the robot.
pub const VELOCITY_FILTER_ALPHA: f64 = 0.99;

/// Exponential smoothing of measured joint velocities, applied per joint:
/// `next = (1 - alpha) * previous + alpha * measured`.
#[derive(Debug, Clone)]
pub struct VelocityFilter {
    alpha: f64,
    filtered: JointVector,
}

impl Default for VelocityFilter {
    fn default() -> Self {
        Self::new(VELOCITY_FILTER_ALPHA)
    }
}

impl VelocityFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            filtered: JointVector::zeros(),
        }
    }

    pub fn update(&mut self, measured: &JointVector) -> &JointVector {
        self.filtered = self.filtered * (1.0 - self.alpha) + measured * self.alpha;
        &self.filtered
    }

    pub fn value(&self) -> &JointVector {
        &self.filtered
    }

    pub fn reset(&mut self) {
        self.filtered = JointVector::zeros();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update_from_zero() {
        let mut filter = VelocityFilter::default();
        let measured = JointVector::from_element(1.0);

        let filtered = *filter.update(&measured);
        assert!((filtered[0] - 0.99).abs() < 1e-12);
    }

    #[test]
    fn test_recurrence() {
        let mut filter = VelocityFilter::new(0.5);
        filter.update(&JointVector::from_element(2.0));
        let filtered = *filter.update(&JointVector::from_element(4.0));

        // 0.5 * 1.0 + 0.5 * 4.0
        assert_eq!(filtered, JointVector::from_element(2.5));
    }

    #[test]
    fn test_joints_filtered_independently() {
        let mut filter = VelocityFilter::default();
        let mut measured = JointVector::zeros();
        measured[3] = -2.0;

        let filtered = *filter.update(&measured);
        assert_eq!(filtered[0], 0.0);
        assert!((filtered[3] + 1.98).abs() < 1e-12);
    }

    #[test]
    fn test_reset_zeroes_state() {
        let mut filter = VelocityFilter::default();
        filter.update(&JointVector::from_element(3.0));
        filter.reset();
        assert_eq!(*filter.value(), JointVector::zeros());
    }
}

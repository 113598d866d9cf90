use crate::types::{ConfigError, JointVector};

/// Startup blend weight going from 0 to 1 over `max_ticks` fusion ticks.
///
/// Blending the measured posture with the IK output by this weight keeps the
/// arm from jumping when the session starts.
#[derive(Debug, Clone)]
pub struct SmoothingRamp {
    count: u32,
    max_ticks: u32,
}

impl SmoothingRamp {
    pub fn new(max_ticks: u32) -> Result<Self, ConfigError> {
        if max_ticks == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max_ticks".to_string(),
                value: 0.0,
                range: ">= 1",
            });
        }
        Ok(Self {
            count: 0,
            max_ticks,
        })
    }

    /// `rate_hz * ramp_seconds` ticks, rounded.
    pub fn from_duration(rate_hz: u32, ramp_seconds: f64) -> Result<Self, ConfigError> {
        let ticks = rate_hz as f64 * ramp_seconds;
        if !ticks.is_finite() || ticks.round() < 1.0 || ticks.round() > u32::MAX as f64 {
            return Err(ConfigError::OutOfRange {
                name: "control.ramp_seconds".to_string(),
                value: ramp_seconds,
                range: "rate_hz * ramp_seconds >= 1",
            });
        }
        Self::new(ticks.round() as u32)
    }

    /// Step the counter (saturating at `max_ticks`) and return the new weight.
    pub fn advance(&mut self) -> f64 {
        if self.count < self.max_ticks {
            self.count += 1;
        }
        self.weight()
    }

    pub fn weight(&self) -> f64 {
        self.count.min(self.max_ticks) as f64 / self.max_ticks as f64
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn max_ticks(&self) -> u32 {
        self.max_ticks
    }

    pub fn is_complete(&self) -> bool {
        self.count >= self.max_ticks
    }
}

/// `w * target + (1 - w) * current`
pub fn blend(current: &JointVector, target: &JointVector, weight: f64) -> JointVector {
    target * weight + current * (1.0 - weight)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_at_half_and_full() {
        let mut ramp = SmoothingRamp::from_duration(20, 10.0).unwrap();
        assert_eq!(ramp.max_ticks(), 200);

        let mut w = 0.0;
        for _ in 0..100 {
            w = ramp.advance();
        }
        assert_eq!(w, 0.5);

        for _ in 0..100 {
            w = ramp.advance();
        }
        assert_eq!(w, 1.0);
        assert!(ramp.is_complete());
    }

    #[test]
    fn test_weight_monotonic_and_clamped() {
        let mut ramp = SmoothingRamp::new(7).unwrap();
        let mut previous = ramp.weight();
        assert_eq!(previous, 0.0);

        for _ in 0..50 {
            let w = ramp.advance();
            assert!(w >= previous);
            assert!(w <= 1.0);
            previous = w;
        }
        assert_eq!(ramp.count(), 7);
        assert_eq!(ramp.advance(), 1.0);
    }

    #[test]
    fn test_zero_ticks_rejected() {
        assert!(SmoothingRamp::new(0).is_err());
        assert!(SmoothingRamp::from_duration(20, 0.0).is_err());
        assert!(SmoothingRamp::from_duration(20, f64::NAN).is_err());
    }

    #[test]
    fn test_blend_endpoints() {
        let current = JointVector::from_element(1.0);
        let target = JointVector::from_element(3.0);

        assert_eq!(blend(&current, &target, 0.0), current);
        assert_eq!(blend(&current, &target, 1.0), target);
        assert_eq!(blend(&current, &target, 0.5), JointVector::from_element(2.0));
    }
}

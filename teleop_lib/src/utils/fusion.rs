use nalgebra::Vector3;

use crate::types::ConfigError;

/// Human share of the Cartesian target per axis. The autonomous source gets
/// `1 - weight`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    x: f64,
    y: f64,
    z: f64,
}

impl FusionWeights {
    /// Each weight must lie in [0, 1].
    pub fn new(x: f64, y: f64, z: f64) -> Result<Self, ConfigError> {
        for (axis, value) in [("x", x), ("y", y), ("z", z)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange {
                    name: format!("control.fusion_weights.{}", axis),
                    value,
                    range: "[0, 1]",
                });
            }
        }
        Ok(Self { x, y, z })
    }

    /// Full human control on every axis.
    pub fn human_only() -> Self {
        Self {
            x: 1.0,
            y: 1.0,
            z: 1.0,
        }
    }

    pub fn as_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }
}

/// `origin + w * human + (1 - w) * autonomous`, per axis.
pub fn fuse(
    origin: &Vector3<f64>,
    human: &Vector3<f64>,
    autonomous: &Vector3<f64>,
    weights: &FusionWeights,
) -> Vector3<f64> {
    let w = weights.as_vector();
    Vector3::from_fn(|a, _| origin[a] + w[a] * human[a] + (1.0 - w[a]) * autonomous[a])
}

/// Source of the autonomous Cartesian offset, evaluated once per fusion tick.
pub trait AutonomousTrajectory {
    /// Offset in metres at `t` seconds into the session.
    fn offset_at(&self, t: f64) -> Vector3<f64>;
}

/// Offset growing linearly with time on every axis.
#[derive(Debug, Clone)]
pub struct LinearRampTrajectory {
    /// Metres per second, per axis.
    pub slope: Vector3<f64>,
}

impl Default for LinearRampTrajectory {
    fn default() -> Self {
        Self {
            slope: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl AutonomousTrajectory for LinearRampTrajectory {
    fn offset_at(&self, t: f64) -> Vector3<f64> {
        self.slope * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_human_weight_ignores_autonomous() {
        let origin = Vector3::new(0.4559, 0.0, 0.3346);
        let human = Vector3::new(0.015, -0.03, 0.0075);
        let weights = FusionWeights::human_only();

        for autonomous in [
            Vector3::zeros(),
            Vector3::new(5.0, -2.0, 1e6),
            Vector3::new(-0.1, 0.1, 0.3),
        ] {
            assert_eq!(fuse(&origin, &human, &autonomous, &weights), origin + human);
        }
    }

    #[test]
    fn test_zero_weight_is_fully_autonomous() {
        let origin = Vector3::new(1.0, 2.0, 3.0);
        let weights = FusionWeights::new(0.0, 0.0, 0.0).unwrap();
        let target = fuse(
            &origin,
            &Vector3::new(9.0, 9.0, 9.0),
            &Vector3::new(0.5, 0.25, -1.0),
            &weights,
        );
        assert_eq!(target, Vector3::new(1.5, 2.25, 2.0));
    }

    #[test]
    fn test_mixed_weights_per_axis() {
        let weights = FusionWeights::new(0.5, 1.0, 0.25).unwrap();
        let target = fuse(
            &Vector3::zeros(),
            &Vector3::new(2.0, 2.0, 4.0),
            &Vector3::new(4.0, 7.0, 8.0),
            &weights,
        );
        assert_eq!(target, Vector3::new(3.0, 2.0, 7.0));
    }

    #[test]
    fn test_weights_out_of_range_rejected() {
        assert!(FusionWeights::new(-0.1, 0.5, 0.5).is_err());
        assert!(FusionWeights::new(0.5, 1.1, 0.5).is_err());
        assert!(FusionWeights::new(0.5, 0.5, f64::NAN).is_err());
        assert!(FusionWeights::new(0.0, 1.0, 0.5).is_ok());
    }

    #[test]
    fn test_linear_ramp_offset() {
        let source = LinearRampTrajectory::default();
        assert_eq!(source.offset_at(0.0), Vector3::zeros());
        assert_eq!(source.offset_at(0.25), Vector3::new(0.25, 0.25, 0.25));
    }
}

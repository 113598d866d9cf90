use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::types::now_millis;

/// Haptic device end-effector position, in centimetres.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HapticPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Cartesian target of the tool centre point, in metres, base frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TcpPosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub timestamp: u64,
}

impl HapticPosition {
    /// Operator offset in metres: centimetres to metres, then scaled by the
    /// end-effector/device mapping ratio.
    pub fn to_offset(&self, mapping_ratio: f64) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z) / 100.0 * mapping_ratio
    }
}

impl TcpPosition {
    pub fn from_vector(position: &Vector3<f64>) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z: position.z,
            timestamp: now_millis(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_scaling() {
        let haptic = HapticPosition {
            x: 2.0,
            y: -4.0,
            z: 0.0,
        };
        let offset = haptic.to_offset(1.5);

        assert!((offset.x - 0.03).abs() < 1e-12);
        assert!((offset.y + 0.06).abs() < 1e-12);
        assert_eq!(offset.z, 0.0);
    }
}

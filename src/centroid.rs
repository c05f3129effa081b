//! Centroid trajectory and reference velocity.

use glam::DVec3;

use crate::error::{Result, SmearError};
use crate::transform::TransformSample;

/// Centroid motion over a sampled range.
#[derive(Debug, Clone, PartialEq)]
pub struct CentroidMotion {
    /// One world position per frame.
    pub positions: Vec<DVec3>,
    /// `positions[i + 1] - positions[i]`; one fewer than `positions`.
    pub velocities: Vec<DVec3>,
}

impl CentroidMotion {
    /// Build from a centroid trajectory. Needs at least two positions.
    pub fn from_positions(node: &str, positions: Vec<DVec3>) -> Result<Self> {
        if positions.len() < 2 {
            return Err(SmearError::InsufficientFrames {
                node: node.to_string(),
                frames: positions.len(),
            });
        }
        let velocities = positions.windows(2).map(|w| w[1] - w[0]).collect();
        Ok(Self { positions, velocities })
    }

    pub fn frame_count(&self) -> usize {
        self.positions.len()
    }
}

/// Average of a point set. The origin for an empty set.
pub fn centroid_of(points: &[DVec3]) -> DVec3 {
    if points.is_empty() {
        return DVec3::ZERO;
    }
    points.iter().copied().sum::<DVec3>() / points.len() as f64
}

/// Centroid of a mesh's object-space reference pose.
pub fn local_centroid(points: &[DVec3]) -> DVec3 {
    centroid_of(points)
}

/// Carry the local centroid through every sampled transform and differentiate.
pub fn analyze_centroid_motion(
    node: &str,
    local_centroid: DVec3,
    samples: &[TransformSample],
) -> Result<CentroidMotion> {
    let positions = samples
        .iter()
        .map(|s| s.transform_point(local_centroid))
        .collect();
    CentroidMotion::from_positions(node, positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::RotationOrder;

    fn translated(frame: i32, x: f64) -> TransformSample {
        TransformSample::new(frame, DVec3::new(x, 0.0, 0.0), DVec3::ZERO, DVec3::ONE, RotationOrder::Xyz)
    }

    #[test]
    fn test_centroid_of_points() {
        let c = centroid_of(&[DVec3::ZERO, DVec3::new(2.0, 4.0, 6.0)]);
        assert_eq!(c, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(centroid_of(&[]), DVec3::ZERO);
    }

    #[test]
    fn test_velocity_is_one_shorter() {
        let samples: Vec<_> = (0..5).map(|f| translated(f, f64::from(f) * 2.0)).collect();
        let motion = analyze_centroid_motion("cube", DVec3::new(0.0, 1.0, 0.0), &samples).unwrap();

        assert_eq!(motion.frame_count(), 5);
        assert_eq!(motion.velocities.len(), 4);
        assert_eq!(motion.positions[3], DVec3::new(6.0, 1.0, 0.0));
        assert!(motion.velocities.iter().all(|v| *v == DVec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_single_frame_is_insufficient() {
        let err = analyze_centroid_motion("cube", DVec3::ZERO, &[translated(1, 0.0)]).unwrap_err();
        assert!(matches!(err, SmearError::InsufficientFrames { frames: 1, .. }));
    }
}

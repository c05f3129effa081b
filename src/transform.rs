//! Transform sampling.
//!
//! Evaluates a transform node's translate/rotate/scale channels at every
//! integer frame of a range and composes them into matrices, honouring the
//! node's declared rotation order.

use glam::{DMat4, DQuat, DVec3};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::frame_range::FrameRange;
use crate::scene::{expect_kind, Channel, NodeId, NodeKind, SceneSource};

/// Order in which Euler rotations are applied.
///
/// For `Xyz` the X rotation is applied first, then Y, then Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationOrder {
    #[default]
    Xyz,
    Yzx,
    Zxy,
    Xzy,
    Yxz,
    Zyx,
}

impl RotationOrder {
    /// Parse a rotation order from a string like `"xyz"`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "xyz" => Some(Self::Xyz),
            "yzx" => Some(Self::Yzx),
            "zxy" => Some(Self::Zxy),
            "xzy" => Some(Self::Xzy),
            "yxz" => Some(Self::Yxz),
            "zyx" => Some(Self::Zyx),
            _ => None,
        }
    }

    /// Axis indices in application order (0=X, 1=Y, 2=Z).
    pub fn axes(&self) -> [usize; 3] {
        match self {
            Self::Xyz => [0, 1, 2],
            Self::Yzx => [1, 2, 0],
            Self::Zxy => [2, 0, 1],
            Self::Xzy => [0, 2, 1],
            Self::Yxz => [1, 0, 2],
            Self::Zyx => [2, 1, 0],
        }
    }

    /// Compose Euler angles (radians) into a rotation.
    pub fn to_quat(&self, angles: DVec3) -> DQuat {
        let angles = angles.to_array();
        self.axes().iter().fold(DQuat::IDENTITY, |acc, &axis| {
            let step = match axis {
                0 => DQuat::from_rotation_x(angles[0]),
                1 => DQuat::from_rotation_y(angles[1]),
                _ => DQuat::from_rotation_z(angles[2]),
            };
            // Later rotations are applied on top of earlier ones.
            step * acc
        })
    }
}

/// A transform evaluated at one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformSample {
    pub frame: i32,
    pub translation: DVec3,
    /// Euler angles in radians.
    pub rotation: DVec3,
    pub scale: DVec3,
    pub rotation_order: RotationOrder,
    /// translate · rotate · scale.
    pub matrix: DMat4,
}

impl TransformSample {
    pub fn new(
        frame: i32,
        translation: DVec3,
        rotation: DVec3,
        scale: DVec3,
        rotation_order: RotationOrder,
    ) -> Self {
        let matrix = compose_matrix(translation, rotation, scale, rotation_order);
        Self {
            frame,
            translation,
            rotation,
            scale,
            rotation_order,
            matrix,
        }
    }

    /// Transform a point by this sample's matrix.
    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.matrix.transform_point3(point)
    }
}

/// Compose translation, Euler rotation and scale into a matrix.
pub fn compose_matrix(
    translation: DVec3,
    rotation: DVec3,
    scale: DVec3,
    order: RotationOrder,
) -> DMat4 {
    DMat4::from_scale_rotation_translation(scale, order.to_quat(rotation), translation)
}

/// Evaluate a channel triple at `time`.
fn evaluate_triple(
    scene: &dyn SceneSource,
    node: NodeId,
    channels: [Channel; 3],
    time: f64,
) -> Result<DVec3> {
    Ok(DVec3::new(
        scene.evaluate_channel(node, channels[0], time)?,
        scene.evaluate_channel(node, channels[1], time)?,
        scene.evaluate_channel(node, channels[2], time)?,
    ))
}

/// Evaluate the local transform of `node` at a single frame.
pub fn sample_transform(scene: &dyn SceneSource, node: NodeId, frame: i32) -> Result<TransformSample> {
    expect_kind(scene, node, NodeKind::Transform)?;
    let order = scene.rotation_order(node)?;
    let time = f64::from(frame);

    let translation = evaluate_triple(scene, node, Channel::TRANSLATE, time)?;
    let rotation = evaluate_triple(scene, node, Channel::ROTATE, time)?;
    let scale = evaluate_triple(scene, node, Channel::SCALE, time)?;

    Ok(TransformSample::new(frame, translation, rotation, scale, order))
}

/// Evaluate the local transform of `node` at every frame of `range`.
///
/// Each frame is evaluated in its own time context; the host's playback time
/// is never touched.
pub fn sample_transforms(
    scene: &dyn SceneSource,
    node: NodeId,
    range: FrameRange,
) -> Result<Vec<TransformSample>> {
    expect_kind(scene, node, NodeKind::Transform)?;

    let samples = range
        .frames()
        .map(|frame| sample_transform(scene, node, frame))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Sampled {} transform(s) for '{}' over {}",
        samples.len(),
        scene.node_name(node),
        range
    );
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_vec_eq(a: DVec3, b: DVec3) {
        assert!((a - b).length() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn test_rotation_order_parsing() {
        assert_eq!(RotationOrder::from_str("xyz"), Some(RotationOrder::Xyz));
        assert_eq!(RotationOrder::from_str("ZYX"), Some(RotationOrder::Zyx));
        assert_eq!(RotationOrder::from_str("abc"), None);
    }

    #[test]
    fn test_single_axis_rotation_ignores_order() {
        let angles = DVec3::new(0.0, FRAC_PI_2, 0.0);
        let p = DVec3::X;
        for order in [RotationOrder::Xyz, RotationOrder::Zxy, RotationOrder::Yzx] {
            assert_vec_eq(order.to_quat(angles) * p, DVec3::new(0.0, 0.0, -1.0));
        }
    }

    #[test]
    fn test_rotation_order_changes_result() {
        let angles = DVec3::new(FRAC_PI_2, FRAC_PI_2, 0.0);
        let p = DVec3::Y;

        // X first: Y -> Z, then Y rotation: Z -> X.
        assert_vec_eq(RotationOrder::Xyz.to_quat(angles) * p, DVec3::X);
        // Y first leaves Y alone, then X rotation: Y -> Z.
        assert_vec_eq(RotationOrder::Yxz.to_quat(angles) * p, DVec3::Z);
    }

    #[test]
    fn test_compose_translate_rotate_scale() {
        let m = compose_matrix(
            DVec3::new(10.0, 0.0, 0.0),
            DVec3::new(0.0, 0.0, FRAC_PI_2),
            DVec3::splat(2.0),
            RotationOrder::Xyz,
        );
        // Scale first (1,0,0)->(2,0,0), rotate about Z ->(0,2,0), then translate.
        assert_vec_eq(m.transform_point3(DVec3::X), DVec3::new(10.0, 2.0, 0.0));
    }
}

//! Motion offsets.
//!
//! A vertex's motion offset is its signed distance to the plane through the
//! object centroid whose normal is the centroid velocity, divided by the
//! largest such distance in the frame. Positive values lie ahead of the
//! direction of travel, negative values behind it.
//!
//! Frame convention: a range of N frames yields N trajectory rows and N - 1
//! offset rows. Offset row `i` pairs centroid position `i` with the velocity
//! `position[i + 1] - position[i]`.

use glam::DVec3;
use log::{debug, info};

use crate::centroid::{analyze_centroid_motion, centroid_of, local_centroid, CentroidMotion};
use crate::error::{Result, SmearError};
use crate::frame_range::{extract_frame_range, FrameRange};
use crate::scene::{MeshBinding, SceneSource};
use crate::transform::sample_transforms;
use crate::vertex_sampler::sample_trajectories;

/// Per-frame, per-vertex offsets and world positions for one mesh.
///
/// Row `i` of either array belongs to frame `start_frame + i`. Every row has
/// the mesh's vertex count, in native vertex order.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexTrajectoryTable {
    pub start_frame: i32,
    pub end_frame: i32,
    /// `[frame][vertex]`, normalized into [-1, 1].
    pub motion_offsets: Vec<Vec<f64>>,
    /// `[frame][vertex]`, world space.
    pub vertex_trajectories: Vec<Vec<DVec3>>,
}

impl VertexTrajectoryTable {
    pub fn vertex_count(&self) -> usize {
        self.vertex_trajectories
            .first()
            .map(Vec::len)
            .or_else(|| self.motion_offsets.first().map(Vec::len))
            .unwrap_or(0)
    }

    pub fn offset_frame_count(&self) -> usize {
        self.motion_offsets.len()
    }

    pub fn trajectory_frame_count(&self) -> usize {
        self.vertex_trajectories.len()
    }

    /// Row index of an absolute frame in the offset table.
    pub fn offset_index(&self, frame: i32) -> Result<usize> {
        let index = i64::from(frame) - i64::from(self.start_frame);
        if index < 0 || index >= self.motion_offsets.len() as i64 {
            return Err(SmearError::FrameOutOfRange {
                frame: f64::from(frame),
                start: self.start_frame,
                end: self.start_frame + self.motion_offsets.len() as i32 - 1,
            });
        }
        Ok(index as usize)
    }

    /// Trajectory position of `vertex` at a row index clamped into the table.
    pub fn clamped_position(&self, index: i64, vertex: usize) -> Option<DVec3> {
        let last = self.vertex_trajectories.len().checked_sub(1)?;
        let row = index.clamp(0, last as i64) as usize;
        self.vertex_trajectories[row].get(vertex).copied()
    }

    /// Fail with `VertexCountMismatch` unless every row has `expected` entries.
    pub fn validate(&self, node: &str, expected: usize) -> Result<()> {
        let rows = self
            .motion_offsets
            .iter()
            .map(|r| ("motion offsets", r.len()))
            .chain(self.vertex_trajectories.iter().map(|r| ("vertex trajectories", r.len())));
        for (stage, found) in rows {
            if found != expected {
                return Err(SmearError::VertexCountMismatch {
                    node: node.to_string(),
                    stage,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

/// Signed distance from `point` to the plane through `origin` with unit `normal`.
pub fn signed_distance_to_plane(point: DVec3, origin: DVec3, normal: DVec3) -> f64 {
    (point - origin).dot(normal)
}

/// Normalized offsets of one frame.
///
/// A zero velocity or a frame where every vertex lies on the plane gives all zeros.
pub fn frame_motion_offsets(points: &[DVec3], centroid: DVec3, velocity: DVec3) -> Vec<f64> {
    let Some(normal) = velocity.try_normalize() else {
        return vec![0.0; points.len()];
    };

    let distances: Vec<f64> = points
        .iter()
        .map(|&p| signed_distance_to_plane(p, centroid, normal))
        .collect();
    let max_abs = distances.iter().fold(0.0_f64, |acc, d| acc.max(d.abs()));
    if max_abs == 0.0 || !max_abs.is_finite() {
        return vec![0.0; points.len()];
    }

    distances
        .into_iter()
        .map(|d| (d / max_abs).clamp(-1.0, 1.0))
        .collect()
}

fn offsets_for_motion(rows: &[Vec<DVec3>], motion: &CentroidMotion) -> Vec<Vec<f64>> {
    motion
        .velocities
        .iter()
        .enumerate()
        .map(|(i, &velocity)| frame_motion_offsets(&rows[i], motion.positions[i], velocity))
        .collect()
}

/// Bake the trajectory table of a rigidly transformed mesh.
///
/// The frame range comes from the driving transform's keyframes. Offsets are
/// computed by carrying the reference pose (the mesh points at the first
/// frame) through each sampled transform; trajectories are read through the
/// scene's world matrices.
pub fn compute_motion_offsets_simple(scene: &dyn SceneSource, binding: MeshBinding) -> Result<VertexTrajectoryTable> {
    let mesh_name = scene.node_name(binding.mesh);
    let range = extract_frame_range(scene, binding.transform)?;
    let samples = sample_transforms(scene, binding.transform, range)?;

    let reference = scene.object_points(binding.mesh, f64::from(range.start()))?;
    let motion = analyze_centroid_motion(&mesh_name, local_centroid(&reference), &samples)?;

    let posed: Vec<Vec<DVec3>> = samples
        .iter()
        .map(|s| reference.iter().map(|&p| s.transform_point(p)).collect())
        .collect();
    let motion_offsets = offsets_for_motion(&posed, &motion);
    let vertex_trajectories = sample_trajectories(scene, binding, range)?;

    let table = VertexTrajectoryTable {
        start_frame: range.start(),
        end_frame: range.end(),
        motion_offsets,
        vertex_trajectories,
    };
    table.validate(&mesh_name, reference.len())?;

    info!(
        "Baked '{}': {} vertices, {} offset frame(s) over {}",
        mesh_name,
        reference.len(),
        table.offset_frame_count(),
        range
    );
    Ok(table)
}

/// Build a trajectory table straight from world-space trajectories.
///
/// The centroid of each row stands in for the rigid centroid, which makes this
/// usable for skinned meshes with no single driving transform.
pub fn compute_motion_offsets_from_trajectories(
    node: &str,
    range: FrameRange,
    trajectories: Vec<Vec<DVec3>>,
) -> Result<VertexTrajectoryTable> {
    if trajectories.len() != range.len() {
        return Err(SmearError::InsufficientFrames {
            node: node.to_string(),
            frames: trajectories.len(),
        });
    }
    let positions = trajectories.iter().map(|row| centroid_of(row)).collect();
    let motion = CentroidMotion::from_positions(node, positions)?;
    let motion_offsets = offsets_for_motion(&trajectories, &motion);

    let table = VertexTrajectoryTable {
        start_frame: range.start(),
        end_frame: range.end(),
        motion_offsets,
        vertex_trajectories: trajectories,
    };
    table.validate(node, table.vertex_count())?;
    debug!("Computed offsets for '{}' from {} trajectory frame(s)", node, range.len());
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_distance() {
        assert_eq!(signed_distance_to_plane(DVec3::new(3.0, 5.0, 0.0), DVec3::ZERO, DVec3::X), 3.0);
        assert_eq!(signed_distance_to_plane(DVec3::new(-1.0, 0.0, 0.0), DVec3::X, DVec3::X), -2.0);
    }

    #[test]
    fn test_offsets_normalized_to_unit_max() {
        let points = [DVec3::new(-2.0, 0.0, 0.0), DVec3::new(1.0, 0.0, 0.0), DVec3::new(0.0, 3.0, 0.0)];
        let offsets = frame_motion_offsets(&points, DVec3::ZERO, DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(offsets, vec![-1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_zero_velocity_gives_zero_offsets() {
        let points = [DVec3::X, DVec3::Y];
        assert_eq!(frame_motion_offsets(&points, DVec3::ZERO, DVec3::ZERO), vec![0.0, 0.0]);
    }

    #[test]
    fn test_zero_spread_gives_zero_offsets() {
        // Every point lies on the plane.
        let points = [DVec3::Y, DVec3::Z, DVec3::ZERO];
        assert_eq!(frame_motion_offsets(&points, DVec3::ZERO, DVec3::X), vec![0.0; 3]);
    }

    #[test]
    fn test_from_trajectories_frame_convention() {
        let base = [DVec3::ZERO, DVec3::X, DVec3::Y];
        let trajectories: Vec<Vec<DVec3>> = (0..4)
            .map(|f| base.iter().map(|&p| p + DVec3::new(f64::from(f), 0.0, 0.0)).collect())
            .collect();
        let table = compute_motion_offsets_from_trajectories("tri", FrameRange::new(10, 13), trajectories).unwrap();

        assert_eq!(table.trajectory_frame_count(), 4);
        assert_eq!(table.offset_frame_count(), 3);
        assert_eq!(table.vertex_count(), 3);
        assert_eq!(table.offset_index(12).unwrap(), 2);
        assert!(matches!(table.offset_index(13), Err(SmearError::FrameOutOfRange { .. })));
    }

    #[test]
    fn test_validate_reports_mismatch() {
        let table = VertexTrajectoryTable {
            start_frame: 0,
            end_frame: 1,
            motion_offsets: vec![vec![0.0; 2]],
            vertex_trajectories: vec![vec![DVec3::ZERO; 3]; 2],
        };
        let err = table.validate("mesh", 3).unwrap_err();
        assert!(matches!(err, SmearError::VertexCountMismatch { expected: 3, found: 2, .. }));
    }

    #[test]
    fn test_clamped_position() {
        let table = VertexTrajectoryTable {
            start_frame: 0,
            end_frame: 2,
            motion_offsets: vec![],
            vertex_trajectories: vec![vec![DVec3::ZERO], vec![DVec3::X], vec![DVec3::Y]],
        };
        assert_eq!(table.clamped_position(-4, 0), Some(DVec3::ZERO));
        assert_eq!(table.clamped_position(9, 0), Some(DVec3::Y));
        assert_eq!(table.clamped_position(1, 5), None);
    }
}

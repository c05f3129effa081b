//! World-space vertex sampling.
//!
//! Points are read from the mesh and the world matrix from its transform at
//! the same time context. The matrix is always read from the scene rather than
//! rebuilt from a [`TransformSample`](crate::transform::TransformSample), since
//! skinned meshes have no single rigid transform.

use glam::DVec3;
use log::debug;

use crate::error::{Result, SmearError};
use crate::frame_range::FrameRange;
use crate::scene::{MeshBinding, SceneSource};

/// World-space positions of every vertex of `binding.mesh` at `time`.
pub fn sample_world_vertices(scene: &dyn SceneSource, binding: MeshBinding, time: f64) -> Result<Vec<DVec3>> {
    let points = scene
        .object_points(binding.mesh, time)
        .map_err(|e| sample_error(scene, binding, time, "object points", e))?;
    let world = scene
        .world_matrix(binding.transform, time)
        .map_err(|e| sample_error(scene, binding, time, "world matrix", e))?;

    Ok(points.iter().map(|&p| world.transform_point3(p)).collect())
}

/// One row of world-space vertex positions per frame of `range`.
///
/// Every row must have the vertex count of the first one.
pub fn sample_trajectories(
    scene: &dyn SceneSource,
    binding: MeshBinding,
    range: FrameRange,
) -> Result<Vec<Vec<DVec3>>> {
    let mut rows: Vec<Vec<DVec3>> = Vec::with_capacity(range.len());
    for frame in range.frames() {
        let row = sample_world_vertices(scene, binding, f64::from(frame))?;
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(SmearError::VertexCountMismatch {
                    node: scene.node_name(binding.mesh),
                    stage: "trajectory sampling",
                    expected: first.len(),
                    found: row.len(),
                });
            }
        }
        rows.push(row);
    }

    debug!(
        "Sampled {} trajectory frame(s) of '{}' over {}",
        rows.len(),
        scene.node_name(binding.mesh),
        range
    );
    Ok(rows)
}

// Lookup failures keep their own variant; anything else becomes SampleUnavailable.
fn sample_error(
    scene: &dyn SceneSource,
    binding: MeshBinding,
    time: f64,
    stage: &'static str,
    err: SmearError,
) -> SmearError {
    match err {
        SmearError::NodeNotFound { .. } | SmearError::InvalidNodeType { .. } => err,
        _ => SmearError::SampleUnavailable {
            node: scene.node_name(binding.mesh),
            frame: time,
            stage,
        },
    }
}

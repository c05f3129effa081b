//! Elongation (smear) deformation.
//!
//! Each vertex slides along its own baked trajectory: vertices ahead of the
//! direction of travel are pulled towards future frames, vertices behind it
//! towards past frames. The distance is the vertex's smoothed motion offset
//! scaled by a strength blended between the past and future strengths.

use glam::DVec3;

use crate::error::{Result, SmearError};
use crate::interpolate::sample_trajectory;
use crate::offsets::VertexTrajectoryTable;
use crate::params::ArtisticParameters;
use crate::smoothing::smooth_offsets;

/// Signed number of frames to shift a vertex with motion offset `offset`.
///
/// An offset of -1 gives `-past`, +1 gives `+future` and 0 gives no shift.
pub fn elongation_amount(offset: f64, strength_past: f64, strength_future: f64) -> f64 {
    let t = (offset + 1.0) * 0.5;
    let strength = (1.0 - t) * strength_past + t * strength_future;
    offset * strength
}

/// Position of `vertex` on its trajectory, `shift` frames away from `row`.
pub fn elongated_position(table: &VertexTrajectoryTable, row: usize, vertex: usize, shift: f64) -> Option<DVec3> {
    let frames = &table.vertex_trajectories;
    sample_trajectory(frames.len(), row as f64 + shift, |i| frames.get(i)?.get(vertex).copied())
}

/// Deformed world-space positions for table frame `frame`.
///
/// The table is not modified. With elongation disabled the positions of the
/// frame are returned as baked.
pub fn apply_elongation(
    table: &VertexTrajectoryTable,
    frame: i32,
    params: &ArtisticParameters,
) -> Result<Vec<DVec3>> {
    let row = table.offset_index(frame)?;
    let vertex_count = table.vertex_count();
    let unavailable = |stage| SmearError::SampleUnavailable {
        node: "trajectory table".to_string(),
        frame: f64::from(frame),
        stage,
    };

    if !params.apply_elongation {
        return (0..vertex_count)
            .map(|v| table.clamped_position(row as i64, v).ok_or_else(|| unavailable("trajectory")))
            .collect();
    }

    let offsets = smooth_offsets(&table.motion_offsets, row, params.smooth_window(), params.smoothing_enabled)
        .ok_or_else(|| unavailable("motion offsets"))?;
    let past = params.strength_past();
    let future = params.strength_future();

    offsets
        .iter()
        .enumerate()
        .map(|(v, &offset)| {
            let shift = elongation_amount(offset, past, future);
            elongated_position(table, row, v, shift).ok_or_else(|| unavailable("trajectory"))
        })
        .collect()
}

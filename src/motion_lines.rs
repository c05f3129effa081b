//! Motion-line geometry.
//!
//! A reproducible subset of vertices is chosen as seeds. For each seed the
//! trajectory around the current frame is traced with [`elongated_position`]
//! and wrapped in an open cylinder, so lines follow exactly the path the
//! deformer moves vertices along.

use glam::DVec3;
use log::debug;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::deformation::elongated_position;
use crate::error::Result;
use crate::mesh_asset::write_obj;
use crate::offsets::VertexTrajectoryTable;
use crate::params::MotionLineParameters;
use crate::smoothing::smooth_vertex_offset;

/// Seed vertices for motion lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedSelection {
    count: usize,
    vertex_count: usize,
    seed: u64,
    indices: Vec<usize>,
}

impl SeedSelection {
    /// Pick `count` distinct vertices out of `vertex_count` (all of them if fewer).
    pub fn select(count: usize, vertex_count: usize, seed: u64) -> Self {
        let mut rng = Pcg32::seed_from_u64(seed);
        let amount = count.min(vertex_count);
        let mut indices = rand::seq::index::sample(&mut rng, vertex_count, amount).into_vec();
        indices.sort_unstable();
        Self {
            count,
            vertex_count,
            seed,
            indices,
        }
    }

    /// Reselect when the requested count or the vertex count changed.
    /// Returns true if the selection was recomputed.
    pub fn refresh(&mut self, count: usize, vertex_count: usize, seed: u64) -> bool {
        if self.count == count && self.vertex_count == vertex_count {
            return false;
        }
        *self = Self::select(count, vertex_count, seed);
        true
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Polygon mesh of motion-line cylinders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineMesh {
    pub points: Vec<DVec3>,
    pub face_counts: Vec<u32>,
    pub face_connects: Vec<u32>,
}

impl LineMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.face_counts.len()
    }

    /// Append an open cylinder through `path`, `sides` quads per segment.
    pub fn append_tube(&mut self, path: &[DVec3], radius: f64, sides: usize) {
        if path.len() < 2 || sides < 3 {
            return;
        }

        let base = self.points.len() as u32;
        let mut normal: Option<DVec3> = None;
        for (i, &center) in path.iter().enumerate() {
            let tangent = tube_tangent(path, i);
            // Carry the previous ring's normal along to keep the tube from twisting.
            let n = match normal {
                Some(prev) => (prev - tangent * prev.dot(tangent))
                    .try_normalize()
                    .unwrap_or_else(|| tangent.any_orthonormal_vector()),
                None => tangent.any_orthonormal_vector(),
            };
            let b = tangent.cross(n);
            normal = Some(n);

            for j in 0..sides {
                let angle = std::f64::consts::TAU * j as f64 / sides as f64;
                self.points.push(center + (n * angle.cos() + b * angle.sin()) * radius);
            }
        }

        let sides = sides as u32;
        for segment in 0..(path.len() as u32 - 1) {
            let ring = base + segment * sides;
            let next = ring + sides;
            for j in 0..sides {
                let k = (j + 1) % sides;
                self.face_counts.push(4);
                self.face_connects
                    .extend_from_slice(&[ring + j, ring + k, next + k, next + j]);
            }
        }
    }

    pub fn to_obj(&self) -> String {
        write_obj(&self.points, &self.face_counts, &self.face_connects)
    }
}

fn tube_tangent(path: &[DVec3], i: usize) -> DVec3 {
    let forward = path.get(i + 1).map(|&next| next - path[i]);
    let backward = i.checked_sub(1).map(|prev| path[i] - path[prev]);
    forward
        .and_then(|d| d.try_normalize())
        .or_else(|| backward.and_then(|d| d.try_normalize()))
        .unwrap_or(DVec3::X)
}

/// Trajectory samples of one seed vertex around offset row `row`.
///
/// The line spans `past * w` frames back to `future * w` frames ahead, with
/// `w` the magnitude of the vertex's smoothed offset. `None` when the vertex
/// has no offset.
pub fn line_samples(
    table: &VertexTrajectoryTable,
    row: usize,
    vertex: usize,
    params: &MotionLineParameters,
) -> Option<Vec<DVec3>> {
    let offset = smooth_vertex_offset(
        &table.motion_offsets,
        row,
        vertex,
        params.smooth_window(),
        params.smoothing_enabled,
    )?;
    let w = offset.abs();
    let from = -params.strength_past() * w;
    let to = params.strength_future() * w;
    if w == 0.0 || to - from <= 0.0 {
        return None;
    }

    let segments = params.segments();
    (0..=segments)
        .map(|i| {
            let shift = from + (to - from) * i as f64 / segments as f64;
            elongated_position(table, row, vertex, shift)
        })
        .collect()
}

/// Motion lines for table frame `frame`.
pub fn build_motion_lines(
    table: &VertexTrajectoryTable,
    frame: i32,
    seeds: &SeedSelection,
    params: &MotionLineParameters,
) -> Result<LineMesh> {
    let row = table.offset_index(frame)?;
    let mut mesh = LineMesh::new();
    if !params.generate {
        return Ok(mesh);
    }

    let mut lines = 0usize;
    for &vertex in seeds.indices() {
        if let Some(samples) = line_samples(table, row, vertex, params) {
            mesh.append_tube(&samples, params.radius(), params.sides());
            lines += 1;
        }
    }
    debug!("Built {} motion line(s) at frame {}", lines, frame);
    Ok(mesh)
}

//! Rigid versus articulated meshes.
//!
//! A mesh bound to a skin with at least two influences has no single rigid
//! transform to project through, so its trajectories come from a baked vertex
//! cache instead. The choice is made once per mesh by [`select_strategy`].

use std::fmt;

use log::{debug, info};

use crate::error::{Result, SmearError};
use crate::frame_range::{extract_frame_range, FrameRange};
use crate::offsets::{compute_motion_offsets_from_trajectories, compute_motion_offsets_simple, VertexTrajectoryTable};
use crate::scene::{expect_kind, MeshBinding, NodeKind, SceneSource};
use crate::vertex_cache::{CacheSettings, SharedVertexCache};
use crate::vertex_sampler::sample_trajectories;

/// Whether `mesh` is skinned to two or more influences.
pub fn is_mesh_articulated(scene: &dyn SceneSource, mesh: crate::scene::NodeId) -> Result<bool> {
    expect_kind(scene, mesh, NodeKind::Mesh)?;
    let articulated = scene
        .skin_binding(mesh)?
        .is_some_and(|skin| skin.influence_count() >= 2);
    Ok(articulated)
}

/// Maps live frames onto the rows of a baked table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMapping {
    /// Table frames per live frame.
    pub rate_scale: f64,
}

impl FrameMapping {
    pub const IDENTITY: FrameMapping = FrameMapping { rate_scale: 1.0 };

    /// Map a cache baked at `baked_fps` onto an `evaluation_fps` clock.
    pub fn remapped(baked_fps: f64, evaluation_fps: f64) -> Self {
        Self {
            rate_scale: baked_fps / evaluation_fps,
        }
    }

    /// Table frame for a live frame: `floor(live * rate_scale)`.
    pub fn table_frame(&self, live_frame: f64) -> i32 {
        (live_frame * self.rate_scale).floor() as i32
    }
}

/// A baked table together with how live frames address it.
#[derive(Debug, Clone)]
pub struct BakedMotion {
    pub table: VertexTrajectoryTable,
    pub mapping: FrameMapping,
    /// Generation of the vertex cache the table was read from; `None` when
    /// baked straight from the scene.
    pub cache_generation: Option<u64>,
}

impl BakedMotion {
    /// Table frame for a live frame. A frame that maps to no finite table
    /// frame is out of range.
    pub fn table_frame(&self, live_frame: f64) -> Result<i32> {
        let mapped = (live_frame * self.mapping.rate_scale).floor();
        if mapped.is_finite() && mapped >= f64::from(i32::MIN) && mapped <= f64::from(i32::MAX) {
            return Ok(self.mapping.table_frame(live_frame));
        }
        let start = self.table.start_frame;
        Err(SmearError::FrameOutOfRange {
            frame: live_frame,
            start,
            end: start + self.table.offset_frame_count() as i32 - 1,
        })
    }
}

/// How trajectories and offsets are obtained for one kind of mesh.
pub trait MotionStrategy: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Build the trajectory table for `binding`.
    fn bake(&self, scene: &dyn SceneSource, binding: MeshBinding) -> Result<BakedMotion>;
}

/// Single rigid transform: offsets from the transform's sampled matrices.
#[derive(Debug, Clone, Copy, Default)]
pub struct RigidMotionStrategy;

impl MotionStrategy for RigidMotionStrategy {
    fn name(&self) -> &'static str {
        "rigid"
    }

    fn bake(&self, scene: &dyn SceneSource, binding: MeshBinding) -> Result<BakedMotion> {
        Ok(BakedMotion {
            table: compute_motion_offsets_simple(scene, binding)?,
            mapping: FrameMapping::IDENTITY,
            cache_generation: None,
        })
    }
}

/// Skinned mesh: trajectories and offsets read from the shared vertex cache.
#[derive(Debug, Clone)]
pub struct ArticulatedMotionStrategy {
    cache: SharedVertexCache,
    settings: CacheSettings,
}

impl ArticulatedMotionStrategy {
    pub fn new(cache: SharedVertexCache, settings: CacheSettings) -> Self {
        Self { cache, settings }
    }
}

impl MotionStrategy for ArticulatedMotionStrategy {
    fn name(&self) -> &'static str {
        "articulated"
    }

    fn bake(&self, scene: &dyn SceneSource, binding: MeshBinding) -> Result<BakedMotion> {
        let (table, baked_fps, generation) = self.cache.with(|cache| {
            let table = cache.to_table().ok_or_else(|| SmearError::CacheUnavailable {
                path: cache.last_path().map(|p| p.to_path_buf()),
            })?;
            Ok::<_, SmearError>((table, cache.baked_fps(), cache.generation()))
        })?;

        let mesh_name = scene.node_name(binding.mesh);
        let points = scene.object_points(binding.mesh, f64::from(table.start_frame))?;
        table.validate(&mesh_name, points.len())?;

        let mapping = FrameMapping::remapped(baked_fps, self.settings.evaluation_fps());
        debug!(
            "'{}' reads {} cached frame(s), rate scale {}",
            mesh_name,
            table.offset_frame_count(),
            mapping.rate_scale
        );
        Ok(BakedMotion {
            table,
            mapping,
            cache_generation: Some(generation),
        })
    }
}

/// Classify `mesh` and pick its strategy.
pub fn select_strategy(
    scene: &dyn SceneSource,
    mesh: crate::scene::NodeId,
    cache: &SharedVertexCache,
    settings: CacheSettings,
) -> Result<Box<dyn MotionStrategy>> {
    let strategy: Box<dyn MotionStrategy> = if is_mesh_articulated(scene, mesh)? {
        Box::new(ArticulatedMotionStrategy::new(cache.clone(), settings))
    } else {
        Box::new(RigidMotionStrategy)
    };
    info!("'{}' uses the {} motion strategy", scene.node_name(mesh), strategy.name());
    Ok(strategy)
}

/// Frame range covered by the mesh transform and every skin influence.
pub fn articulated_frame_range(scene: &dyn SceneSource, binding: MeshBinding) -> Result<FrameRange> {
    let mut nodes = vec![binding.transform];
    if let Some(skin) = scene.skin_binding(binding.mesh)? {
        nodes.extend(skin.influences);
    }

    let mut range: Option<FrameRange> = None;
    for node in nodes {
        match extract_frame_range(scene, node) {
            Ok(r) => {
                range = Some(match range {
                    Some(acc) => FrameRange::new(acc.start().min(r.start()), acc.end().max(r.end())),
                    None => r,
                });
            }
            Err(SmearError::NoAnimationFound { .. }) => continue,
            Err(e) => return Err(e),
        }
    }
    range.ok_or_else(|| SmearError::NoAnimationFound {
        node: scene.node_name(binding.mesh),
    })
}

/// Sample a skinned mesh through the scene and compute its table from the
/// world-space trajectories. This is what a cache bake writes.
pub fn bake_articulated_table(scene: &dyn SceneSource, binding: MeshBinding) -> Result<VertexTrajectoryTable> {
    let range = articulated_frame_range(scene, binding)?;
    let trajectories = sample_trajectories(scene, binding, range)?;
    compute_motion_offsets_from_trajectories(&scene.node_name(binding.mesh), range, trajectories)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Channel, InfluenceWeight, KeyframeCurve, SkinBinding};
    use crate::scene_graph::MemoryScene;
    use glam::DVec3;

    fn skinned_scene(influences: usize) -> (MemoryScene, crate::scene::NodeId) {
        let mut scene = MemoryScene::new();
        let root = scene.create_transform("root");
        let joints: Vec<_> = (0..influences)
            .map(|i| {
                let joint = scene.create_joint(&format!("joint{i}"));
                scene
                    .add_curve(joint, Channel::TranslateX, KeyframeCurve::from_pairs(&[(0.0, 0.0), (4.0, 4.0)]))
                    .unwrap();
                joint
            })
            .collect();
        let mesh = scene
            .create_mesh("skinShape", root, vec![DVec3::ZERO, DVec3::X, DVec3::Y])
            .unwrap();
        let weights = vec![vec![InfluenceWeight { influence: 0, weight: 1.0 }]; 3];
        scene
            .bind_skin(mesh, SkinBinding { influences: joints, weights }, 0.0)
            .unwrap();
        (scene, mesh)
    }

    #[test]
    fn test_single_influence_is_not_articulated() {
        let (scene, mesh) = skinned_scene(1);
        assert!(!is_mesh_articulated(&scene, mesh).unwrap());
    }

    #[test]
    fn test_two_influences_are_articulated() {
        let (scene, mesh) = skinned_scene(2);
        assert!(is_mesh_articulated(&scene, mesh).unwrap());
    }

    #[test]
    fn test_transform_is_rejected() {
        let (scene, _) = skinned_scene(2);
        let root = scene.find("root").unwrap();
        assert!(matches!(is_mesh_articulated(&scene, root), Err(SmearError::InvalidNodeType { .. })));
    }

    #[test]
    fn test_strategy_selection() {
        let cache = SharedVertexCache::new();
        let (scene, mesh) = skinned_scene(2);
        let strategy = select_strategy(&scene, mesh, &cache, CacheSettings::default()).unwrap();
        assert_eq!(strategy.name(), "articulated");

        let (scene, mesh) = skinned_scene(1);
        let strategy = select_strategy(&scene, mesh, &cache, CacheSettings::default()).unwrap();
        assert_eq!(strategy.name(), "rigid");
    }

    #[test]
    fn test_articulated_bake_without_cache_is_unavailable() {
        let (scene, mesh) = skinned_scene(2);
        let binding = MeshBinding::resolve(&scene, mesh).unwrap();
        let strategy = ArticulatedMotionStrategy::new(SharedVertexCache::new(), CacheSettings::default());
        let err = strategy.bake(&scene, binding).unwrap_err();
        assert!(matches!(err, SmearError::CacheUnavailable { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_bake_articulated_table_from_scene() {
        let (scene, mesh) = skinned_scene(2);
        let binding = MeshBinding::resolve(&scene, mesh).unwrap();
        let table = bake_articulated_table(&scene, binding).unwrap();
        assert_eq!(table.start_frame, 0);
        assert_eq!(table.trajectory_frame_count(), 5);
        assert_eq!(table.offset_frame_count(), 4);
        assert_eq!(table.vertex_trajectories[4][0], DVec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_frame_mapping() {
        assert_eq!(FrameMapping::IDENTITY.table_frame(7.9), 7);
        assert_eq!(FrameMapping::remapped(48.0, 24.0).table_frame(5.5), 11);
        assert_eq!(FrameMapping::remapped(12.0, 24.0).table_frame(5.0), 2);
    }
}

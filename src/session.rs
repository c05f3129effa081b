//! Evaluation contexts.
//!
//! A [`SmearSession`] owns the shared vertex cache and hands out one context
//! per consuming node: [`SmearDeformer`], [`MotionLinesNode`] and
//! [`ColorizerNode`]. Each context classifies its mesh once, bakes lazily on
//! first evaluation and keeps the baked table until invalidated.
//!
//! Recoverable failures (cache unavailable, frame outside the bake) yield
//! [`Outcome::Skipped`]; anything else is returned as an error. In both cases
//! no output is written.

use std::path::Path;

use glam::DVec3;
use log::{debug, warn};

use crate::articulation::{select_strategy, BakedMotion, MotionStrategy};
use crate::coloring::{colorize, ColorMode, ColoredVertex};
use crate::deformation::apply_elongation;
use crate::error::{Result, SmearError};
use crate::motion_lines::{build_motion_lines, LineMesh, SeedSelection};
use crate::params::{ArtisticParameters, MotionLineParameters};
use crate::scene::{MeshBinding, NodeId, SceneSource};
use crate::vertex_cache::{CacheSettings, SharedVertexCache};

/// Why an evaluation produced no output.
#[derive(Debug)]
pub enum SkipReason {
    /// The context's output is switched off.
    Disabled,
    /// A recoverable error; see [`SmearError::is_recoverable`].
    Unavailable(SmearError),
}

/// Result of one evaluation.
#[derive(Debug)]
pub enum Outcome<T> {
    Applied(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Skipped(_) => None,
        }
    }
}

/// Turn a recoverable error into a skip; pass anything else through.
fn skip_recoverable<T>(node: &str, err: SmearError) -> Result<Outcome<T>> {
    if err.is_recoverable() {
        warn!("Skipping '{}': {}", node, err);
        Ok(Outcome::Skipped(SkipReason::Unavailable(err)))
    } else {
        Err(err)
    }
}

/// Session-wide state shared by every context.
#[derive(Debug, Clone, Default)]
pub struct SmearSession {
    cache: SharedVertexCache,
    settings: CacheSettings,
}

impl SmearSession {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            cache: SharedVertexCache::new(),
            settings,
        }
    }

    pub fn cache(&self) -> &SharedVertexCache {
        &self.cache
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Load a vertex cache file for articulated meshes.
    pub fn load_cache(&self, path: &Path) -> bool {
        self.cache.load(path)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn motion_source(&self, scene: &dyn SceneSource, mesh: NodeId) -> Result<MotionSource> {
        MotionSource::new(scene, mesh, self.cache.clone(), self.settings)
    }

    pub fn deformer(&self, scene: &dyn SceneSource, mesh: NodeId, params: ArtisticParameters) -> Result<SmearDeformer> {
        Ok(SmearDeformer::new(self.motion_source(scene, mesh)?, params))
    }

    pub fn motion_lines(
        &self,
        scene: &dyn SceneSource,
        mesh: NodeId,
        params: MotionLineParameters,
    ) -> Result<MotionLinesNode> {
        Ok(MotionLinesNode::new(self.motion_source(scene, mesh)?, params))
    }

    pub fn colorizer(
        &self,
        scene: &dyn SceneSource,
        mesh: NodeId,
        mode: ColorMode,
        params: ArtisticParameters,
    ) -> Result<ColorizerNode> {
        Ok(ColorizerNode::new(self.motion_source(scene, mesh)?, mode, params))
    }
}

/// Lazily baked motion data of one mesh.
#[derive(Debug)]
pub struct MotionSource {
    binding: MeshBinding,
    name: String,
    cache: SharedVertexCache,
    settings: CacheSettings,
    strategy: Option<Box<dyn MotionStrategy>>,
    baked: Option<BakedMotion>,
}

impl MotionSource {
    pub fn new(scene: &dyn SceneSource, mesh: NodeId, cache: SharedVertexCache, settings: CacheSettings) -> Result<Self> {
        Ok(Self {
            binding: MeshBinding::resolve(scene, mesh)?,
            name: scene.node_name(mesh),
            cache,
            settings,
            strategy: None,
            baked: None,
        })
    }

    pub fn binding(&self) -> MeshBinding {
        self.binding
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_baked(&self) -> bool {
        self.baked.is_some()
    }

    /// Name of the selected strategy, once classified.
    pub fn strategy_name(&self) -> Option<&'static str> {
        self.strategy.as_ref().map(|s| s.name())
    }

    /// Drop the baked table, e.g. after a topology change.
    pub fn invalidate(&mut self) {
        if self.baked.take().is_some() {
            debug!("Invalidated bake of '{}'", self.name);
        }
    }

    /// Bake on first use. A failed bake is retried on the next call, and a
    /// table read from the vertex cache is dropped once the cache is cleared
    /// or reloaded.
    pub fn ensure_baked(&mut self, scene: &dyn SceneSource) -> Result<&BakedMotion> {
        let stale = self
            .baked
            .as_ref()
            .and_then(|b| b.cache_generation)
            .is_some_and(|generation| generation != self.cache.generation());
        if stale {
            debug!("Vertex cache changed under '{}'; rebaking", self.name);
            self.baked = None;
        }
        let baked = match self.baked.take() {
            Some(baked) => baked,
            None => self.bake(scene)?,
        };
        Ok(self.baked.insert(baked))
    }

    fn bake(&mut self, scene: &dyn SceneSource) -> Result<BakedMotion> {
        let strategy = match self.strategy.take() {
            Some(strategy) => strategy,
            None => select_strategy(scene, self.binding.mesh, &self.cache, self.settings)?,
        };
        let result = strategy.bake(scene, self.binding);
        let strategy_name = strategy.name();
        self.strategy = Some(strategy);

        let baked = result?;
        debug!(
            "Baked '{}' with the {} strategy: {} offset frame(s)",
            self.name,
            strategy_name,
            baked.table.offset_frame_count()
        );
        Ok(baked)
    }
}

/// Elongation deformer.
#[derive(Debug)]
pub struct SmearDeformer {
    source: MotionSource,
    pub params: ArtisticParameters,
}

impl SmearDeformer {
    pub fn new(source: MotionSource, params: ArtisticParameters) -> Self {
        Self { source, params }
    }

    pub fn source(&self) -> &MotionSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut MotionSource {
        &mut self.source
    }

    /// Deform `geometry` (object-space points of the mesh) for live frame `frame`.
    ///
    /// `geometry` is only written when the outcome is `Applied`.
    pub fn deform(&mut self, scene: &dyn SceneSource, frame: f64, geometry: &mut [DVec3]) -> Result<Outcome<()>> {
        if !self.params.apply_elongation {
            return Ok(Outcome::Skipped(SkipReason::Disabled));
        }
        let name = self.source.name().to_string();
        let transform = self.source.binding().transform;

        let baked = match self.source.ensure_baked(scene) {
            Ok(baked) => baked,
            Err(e) => return skip_recoverable(&name, e),
        };

        let expected = baked.table.vertex_count();
        if geometry.len() != expected {
            return Err(SmearError::VertexCountMismatch {
                node: name,
                stage: "deformation",
                expected,
                found: geometry.len(),
            });
        }

        let world_positions = match baked
            .table_frame(frame)
            .and_then(|table_frame| apply_elongation(&baked.table, table_frame, &self.params))
        {
            Ok(positions) => positions,
            Err(e) => return skip_recoverable(&name, e),
        };

        let world = scene.world_matrix(transform, frame)?;
        let singular = || SmearError::SampleUnavailable {
            node: name.clone(),
            frame,
            stage: "inverse world matrix",
        };
        if !(world.determinant().abs() > f64::EPSILON) {
            return Err(singular());
        }
        let to_object = world.inverse();
        let object_positions: Vec<DVec3> = world_positions
            .into_iter()
            .map(|p| to_object.transform_point3(p))
            .collect();
        if !object_positions.iter().all(|p| p.is_finite()) {
            return Err(singular());
        }

        for (point, object) in geometry.iter_mut().zip(object_positions) {
            *point = object;
        }
        Ok(Outcome::Applied(()))
    }
}

/// Motion-line generator.
#[derive(Debug)]
pub struct MotionLinesNode {
    source: MotionSource,
    pub params: MotionLineParameters,
    seeds: Option<SeedSelection>,
}

impl MotionLinesNode {
    pub fn new(source: MotionSource, params: MotionLineParameters) -> Self {
        Self {
            source,
            params,
            seeds: None,
        }
    }

    pub fn seeds(&self) -> Option<&SeedSelection> {
        self.seeds.as_ref()
    }

    /// World-space line geometry for live frame `frame`.
    pub fn compute(&mut self, scene: &dyn SceneSource, frame: f64) -> Result<Outcome<LineMesh>> {
        if !self.params.generate {
            return Ok(Outcome::Skipped(SkipReason::Disabled));
        }
        let name = self.source.name().to_string();
        let baked = match self.source.ensure_baked(scene) {
            Ok(baked) => baked,
            Err(e) => return skip_recoverable(&name, e),
        };

        let vertex_count = baked.table.vertex_count();
        let count = self.params.count();
        let seed = self.params.seed;
        let seeds = self
            .seeds
            .get_or_insert_with(|| SeedSelection::select(count, vertex_count, seed));
        if seeds.refresh(count, vertex_count, seed) {
            debug!("Reselected {} motion-line seed(s) on '{}'", count, name);
        }

        let lines = baked
            .table_frame(frame)
            .and_then(|table_frame| build_motion_lines(&baked.table, table_frame, seeds, &self.params));
        match lines {
            Ok(mesh) => Ok(Outcome::Applied(mesh)),
            Err(e) => skip_recoverable(&name, e),
        }
    }
}

/// Vertex-colour visualiser.
#[derive(Debug)]
pub struct ColorizerNode {
    source: MotionSource,
    pub mode: ColorMode,
    pub params: ArtisticParameters,
}

impl ColorizerNode {
    pub fn new(source: MotionSource, mode: ColorMode, params: ArtisticParameters) -> Self {
        Self { source, mode, params }
    }

    pub fn compute(&mut self, scene: &dyn SceneSource, frame: f64) -> Result<Outcome<Vec<ColoredVertex>>> {
        let name = self.source.name().to_string();
        let baked = match self.source.ensure_baked(scene) {
            Ok(baked) => baked,
            Err(e) => return skip_recoverable(&name, e),
        };
        let result = baked.table_frame(frame).and_then(|table_frame| {
            colorize(
                &baked.table,
                table_frame,
                self.mode,
                self.params.smooth_window(),
                self.params.smoothing_enabled,
            )
        });
        match result {
            Ok(colors) => Ok(Outcome::Applied(colors)),
            Err(e) => skip_recoverable(&name, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_asset::cube_geometry;
    use crate::scene::{Channel, KeyframeCurve};
    use crate::scene_graph::MemoryScene;

    fn moving_cube() -> (MemoryScene, NodeId) {
        let mut scene = MemoryScene::new();
        let xf = scene.create_transform("cube");
        scene
            .add_curve(xf, Channel::TranslateX, KeyframeCurve::from_pairs(&[(1.0, 0.0), (24.0, 23.0)]))
            .unwrap();
        let mesh = scene.create_mesh("cubeShape", xf, cube_geometry().positions).unwrap();
        (scene, mesh)
    }

    #[test]
    fn test_bake_is_lazy() {
        let (scene, mesh) = moving_cube();
        let session = SmearSession::default();
        let mut deformer = session.deformer(&scene, mesh, ArtisticParameters::default()).unwrap();
        assert!(!deformer.source().is_baked());

        let mut points = cube_geometry().positions;
        assert!(deformer.deform(&scene, 10.0, &mut points).unwrap().is_applied());
        assert!(deformer.source().is_baked());
        assert_eq!(deformer.source().strategy_name(), Some("rigid"));

        deformer.source_mut().invalidate();
        assert!(!deformer.source().is_baked());
    }

    #[test]
    fn test_deform_returns_object_space() {
        let (scene, mesh) = moving_cube();
        let session = SmearSession::default();
        let params = ArtisticParameters {
            strength_past: 0.0,
            strength_future: 0.0,
            ..Default::default()
        };
        let mut deformer = session.deformer(&scene, mesh, params).unwrap();

        // Zero strength: the deformed points equal the undeformed object-space points.
        let original = cube_geometry().positions;
        let mut points = original.clone();
        deformer.deform(&scene, 12.0, &mut points).unwrap();
        for (a, b) in points.iter().zip(&original) {
            assert!((*a - *b).length() < 1e-9);
        }
    }

    #[test]
    fn test_out_of_range_frame_leaves_geometry() {
        let (scene, mesh) = moving_cube();
        let session = SmearSession::default();
        let mut deformer = session.deformer(&scene, mesh, ArtisticParameters::default()).unwrap();

        let original = cube_geometry().positions;
        let mut points = original.clone();
        let outcome = deformer.deform(&scene, 100.0, &mut points).unwrap();
        assert!(matches!(outcome, Outcome::Skipped(SkipReason::Unavailable(SmearError::FrameOutOfRange { .. }))));
        assert_eq!(points, original);
    }

    #[test]
    fn test_non_finite_frame_leaves_geometry() {
        let (scene, mesh) = moving_cube();
        let session = SmearSession::default();
        let mut deformer = session.deformer(&scene, mesh, ArtisticParameters::default()).unwrap();
        let mut colors = session
            .colorizer(&scene, mesh, ColorMode::Offset, ArtisticParameters::default())
            .unwrap();

        let original = cube_geometry().positions;
        let mut points = original.clone();
        for frame in [f64::NAN, f64::INFINITY] {
            let outcome = deformer.deform(&scene, frame, &mut points).unwrap();
            assert!(matches!(outcome, Outcome::Skipped(SkipReason::Unavailable(SmearError::FrameOutOfRange { .. }))));
            assert!(!colors.compute(&scene, frame).unwrap().is_applied());
        }
        assert_eq!(points, original);
    }

    #[test]
    fn test_singular_world_matrix_is_an_error() {
        let (mut scene, mesh) = moving_cube();
        let xf = scene.find("cube").unwrap();
        scene
            .add_curve(xf, Channel::ScaleY, KeyframeCurve::from_pairs(&[(1.0, 1.0), (12.0, 0.0), (24.0, 1.0)]))
            .unwrap();
        let session = SmearSession::default();
        let mut deformer = session.deformer(&scene, mesh, ArtisticParameters::default()).unwrap();

        let original = cube_geometry().positions;
        let mut points = original.clone();
        let err = deformer.deform(&scene, 12.0, &mut points).unwrap_err();
        assert!(matches!(err, SmearError::SampleUnavailable { stage: "inverse world matrix", .. }));
        assert_eq!(points, original);

        // Frames with a regular matrix still deform.
        assert!(deformer.deform(&scene, 6.0, &mut points).unwrap().is_applied());
        assert!(points.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_vertex_count_mismatch_is_terminal() {
        let (scene, mesh) = moving_cube();
        let session = SmearSession::default();
        let mut deformer = session.deformer(&scene, mesh, ArtisticParameters::default()).unwrap();

        let mut points = vec![DVec3::ZERO; 3];
        let err = deformer.deform(&scene, 5.0, &mut points).unwrap_err();
        assert!(matches!(err, SmearError::VertexCountMismatch { expected: 8, found: 3, .. }));
        assert_eq!(points, vec![DVec3::ZERO; 3]);
    }

    #[test]
    fn test_unanimated_mesh_is_an_error() {
        let mut scene = MemoryScene::new();
        let xf = scene.create_transform("still");
        let mesh = scene.create_mesh("stillShape", xf, cube_geometry().positions).unwrap();
        let session = SmearSession::default();
        let mut deformer = session.deformer(&scene, mesh, ArtisticParameters::default()).unwrap();

        let original = cube_geometry().positions;
        let mut points = original.clone();
        let err = deformer.deform(&scene, 1.0, &mut points).unwrap_err();
        assert!(matches!(err, SmearError::NoAnimationFound { .. }));
        assert_eq!(points, original);
    }

    #[test]
    fn test_disabled_contexts_skip() {
        let (scene, mesh) = moving_cube();
        let session = SmearSession::default();
        let params = ArtisticParameters {
            apply_elongation: false,
            ..Default::default()
        };
        let mut deformer = session.deformer(&scene, mesh, params).unwrap();
        let mut points = cube_geometry().positions;
        assert!(matches!(
            deformer.deform(&scene, 5.0, &mut points).unwrap(),
            Outcome::Skipped(SkipReason::Disabled)
        ));

        let line_params = MotionLineParameters {
            generate: false,
            ..Default::default()
        };
        let mut lines = session.motion_lines(&scene, mesh, line_params).unwrap();
        assert!(!lines.compute(&scene, 5.0).unwrap().is_applied());
    }

    #[test]
    fn test_motion_lines_and_colors() {
        let (scene, mesh) = moving_cube();
        let session = SmearSession::default();

        let mut lines = session.motion_lines(&scene, mesh, MotionLineParameters::default()).unwrap();
        let mesh_out = lines.compute(&scene, 12.0).unwrap().applied().unwrap();
        assert!(!mesh_out.is_empty());
        assert_eq!(lines.seeds().unwrap().indices().len(), 8);

        let mut colors = session
            .colorizer(&scene, mesh, ColorMode::Offset, ArtisticParameters::default())
            .unwrap();
        let colored = colors.compute(&scene, 12.0).unwrap().applied().unwrap();
        assert_eq!(colored.len(), 8);
    }
}

//! Baked vertex cache.
//!
//! A cache file holds world-space vertex positions and normalized motion
//! offsets for every frame of a bake, at the frame rate it was baked at.
//! [`VertexCache`] loads one file at a time; [`SharedVertexCache`] is the
//! cloneable handle every consumer of a session holds, with all access
//! serialized through one lock.
//!
//! File layout:
//!
//! ```json
//! {
//!   "vertex_count": 8,
//!   "baked_frame_rate": 24.0,
//!   "start_frame": 1,
//!   "end_frame": 24,
//!   "vertex_trajectories": { "1": [[x, y, z], ...], ... },
//!   "motion_offsets": { "1": [o0, o1, ...], ... }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use glam::DVec3;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CacheLoadError;
use crate::offsets::VertexTrajectoryTable;

/// Rate of the deformer evaluation clock that live frames are expressed in.
pub const DEFAULT_EVALUATION_FPS: f64 = 24.0;

/// Frame rate assumed for cache files that do not declare one.
pub const DEFAULT_BAKED_FPS: f64 = 24.0;

const REQUIRED_FIELDS: [&str; 3] = ["vertex_count", "vertex_trajectories", "motion_offsets"];

/// Cache-related configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Rate live frames are counted at when remapping into a cache.
    pub evaluation_fps: f64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            evaluation_fps: DEFAULT_EVALUATION_FPS,
        }
    }
}

impl CacheSettings {
    /// Evaluation rate, falling back to the default for non-positive values.
    pub fn evaluation_fps(&self) -> f64 {
        if self.evaluation_fps.is_finite() && self.evaluation_fps > 0.0 {
            self.evaluation_fps
        } else {
            DEFAULT_EVALUATION_FPS
        }
    }
}

/// One baked frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameCache {
    pub positions: Vec<DVec3>,
    pub motion_offsets: Vec<f64>,
}

/// Result of a successful [`VertexCache::try_load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Same path as the previous load and the cache was populated; nothing parsed.
    AlreadyLoaded,
    Loaded { frames: usize },
}

/// On-disk cache document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheFile {
    pub vertex_count: usize,
    #[serde(default = "default_baked_fps")]
    pub baked_frame_rate: f64,
    #[serde(default)]
    pub start_frame: i64,
    /// Defaults to `start_frame`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_frame: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baked_at: Option<DateTime<Utc>>,
    pub vertex_trajectories: BTreeMap<String, Vec<[f64; 3]>>,
    pub motion_offsets: BTreeMap<String, Vec<f64>>,
}

fn default_baked_fps() -> f64 {
    DEFAULT_BAKED_FPS
}

impl CacheFile {
    /// Read and parse a cache file, checking the required fields.
    pub fn read(path: &Path) -> Result<Self, CacheLoadError> {
        let text = std::fs::read_to_string(path).map_err(|source| CacheLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &text)
    }

    /// Parse cache JSON. `path` is only used for error context.
    pub fn parse(path: &Path, text: &str) -> Result<Self, CacheLoadError> {
        let json_err = |source| CacheLoadError::Json {
            path: path.to_path_buf(),
            source,
        };
        let value: serde_json::Value = serde_json::from_str(text).map_err(json_err)?;
        for field in REQUIRED_FIELDS {
            if value.get(field).is_none() {
                return Err(CacheLoadError::MissingField {
                    path: path.to_path_buf(),
                    field,
                });
            }
        }
        serde_json::from_value(value).map_err(json_err)
    }

    pub fn end_frame(&self) -> i64 {
        self.end_frame.unwrap_or(self.start_frame)
    }

    /// Validate every frame and re-key it relative to `start_frame`.
    pub fn into_frames(self, path: &Path) -> Result<BTreeMap<i64, FrameCache>, CacheLoadError> {
        let invalid = |key: String| CacheLoadError::InvalidFrameKey {
            path: path.to_path_buf(),
            key,
        };
        // Frames must fit the i32 frame numbers of a trajectory table.
        let fits = |frame: i64| i32::try_from(frame).is_ok();
        if !fits(self.start_frame) {
            return Err(invalid(format!("start_frame {}", self.start_frame)));
        }
        if !fits(self.end_frame()) {
            return Err(invalid(format!("end_frame {}", self.end_frame())));
        }
        let parse_key = |key: &String| match key.trim().parse::<i64>() {
            Ok(frame) if fits(frame) => Ok(frame),
            _ => Err(invalid(key.clone())),
        };

        let mut offsets = BTreeMap::new();
        for (key, row) in self.motion_offsets {
            offsets.insert(parse_key(&key)?, row);
        }

        let mut frames = BTreeMap::new();
        for (key, row) in self.vertex_trajectories {
            let frame = parse_key(&key)?;
            let motion_offsets = offsets.remove(&frame).unwrap_or_default();
            for (what, found) in [("vertex_trajectories", row.len()), ("motion_offsets", motion_offsets.len())] {
                if found != self.vertex_count {
                    return Err(CacheLoadError::LengthMismatch {
                        path: path.to_path_buf(),
                        frame,
                        what,
                        expected: self.vertex_count,
                        found,
                    });
                }
            }
            let positions = row.into_iter().map(DVec3::from_array).collect();
            frames.insert(frame - self.start_frame, FrameCache { positions, motion_offsets });
        }

        // Offsets with no matching trajectory frame.
        if let Some((&frame, _)) = offsets.iter().next() {
            return Err(CacheLoadError::LengthMismatch {
                path: path.to_path_buf(),
                frame,
                what: "vertex_trajectories",
                expected: self.vertex_count,
                found: 0,
            });
        }
        Ok(frames)
    }

    /// Build a cache document from a baked trajectory table.
    ///
    /// Trajectory frames past the last offset frame reuse the last offset row
    /// so every written frame carries both arrays.
    pub fn from_table(table: &VertexTrajectoryTable, baked_frame_rate: f64) -> Self {
        let vertex_count = table.vertex_count();
        let mut vertex_trajectories = BTreeMap::new();
        let mut motion_offsets = BTreeMap::new();

        for (i, row) in table.vertex_trajectories.iter().enumerate() {
            let offsets = table
                .motion_offsets
                .get(i)
                .or_else(|| table.motion_offsets.last())
                .cloned()
                .unwrap_or_else(|| vec![0.0; vertex_count]);
            let key = (i64::from(table.start_frame) + i as i64).to_string();
            vertex_trajectories.insert(key.clone(), row.iter().map(|p| p.to_array()).collect());
            motion_offsets.insert(key, offsets);
        }

        let frames = table.vertex_trajectories.len() as i64;
        Self {
            vertex_count,
            baked_frame_rate,
            start_frame: i64::from(table.start_frame),
            end_frame: Some(i64::from(table.start_frame) + (frames - 1).max(0)),
            baked_at: Some(Utc::now()),
            vertex_trajectories,
            motion_offsets,
        }
    }

    /// Write the document as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), CacheLoadError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| CacheLoadError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| CacheLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Wrote vertex cache {} ({} frames)", path.display(), self.vertex_trajectories.len());
        Ok(())
    }
}

/// Frames of one loaded cache file, keyed by zero-based frame index.
#[derive(Debug)]
pub struct VertexCache {
    frames: BTreeMap<i64, Arc<FrameCache>>,
    vertex_count: usize,
    baked_fps: f64,
    start_frame: i64,
    end_frame: i64,
    last_path: Option<PathBuf>,
    parse_count: usize,
    generation: u64,
}

impl Default for VertexCache {
    fn default() -> Self {
        Self::new()
    }
}

impl VertexCache {
    pub fn new() -> Self {
        Self {
            frames: BTreeMap::new(),
            vertex_count: 0,
            baked_fps: DEFAULT_BAKED_FPS,
            start_frame: 0,
            end_frame: 0,
            last_path: None,
            parse_count: 0,
            generation: 0,
        }
    }

    /// Load `path`, logging the cause on failure.
    ///
    /// Returns true without reloading when `path` was the last path loaded
    /// and the cache still holds frames.
    pub fn load(&mut self, path: &Path) -> bool {
        match self.try_load(path) {
            Ok(_) => true,
            Err(e) => {
                error!("Vertex cache load failed: {}", e);
                false
            }
        }
    }

    /// Load `path`. Any previous contents are dropped before parsing, so a
    /// failed load leaves the cache empty.
    pub fn try_load(&mut self, path: &Path) -> Result<LoadOutcome, CacheLoadError> {
        if self.last_path.as_deref() == Some(path) && !self.frames.is_empty() {
            debug!("Vertex cache {} already loaded", path.display());
            return Ok(LoadOutcome::AlreadyLoaded);
        }

        self.clear();
        self.parse_count += 1;

        let file = CacheFile::read(path)?;
        let vertex_count = file.vertex_count;
        let baked_fps = file.baked_frame_rate;
        let start_frame = file.start_frame;
        let end_frame = file.end_frame();
        let frames = file.into_frames(path)?;

        if baked_fps <= 0.0 || !baked_fps.is_finite() {
            warn!(
                "Vertex cache {} declares frame rate {}; using {}",
                path.display(),
                baked_fps,
                DEFAULT_BAKED_FPS
            );
            self.baked_fps = DEFAULT_BAKED_FPS;
        } else {
            self.baked_fps = baked_fps;
        }
        self.vertex_count = vertex_count;
        self.start_frame = start_frame;
        self.end_frame = end_frame;
        self.frames = frames.into_iter().map(|(k, v)| (k, Arc::new(v))).collect();
        self.last_path = Some(path.to_path_buf());
        self.generation += 1;

        info!(
            "Loaded vertex cache {}: {} frame(s), {} vertices at {} fps",
            path.display(),
            self.frames.len(),
            self.vertex_count,
            self.baked_fps
        );
        Ok(LoadOutcome::Loaded {
            frames: self.frames.len(),
        })
    }

    /// Drop every frame and forget the last path.
    pub fn clear(&mut self) {
        if !self.frames.is_empty() {
            debug!("Clearing vertex cache ({} frames)", self.frames.len());
        }
        self.frames.clear();
        self.vertex_count = 0;
        self.baked_fps = DEFAULT_BAKED_FPS;
        self.start_frame = 0;
        self.end_frame = 0;
        self.last_path = None;
        self.generation += 1;
    }

    /// Frame at a zero-based cache index.
    pub fn lookup(&self, index: i64) -> Option<Arc<FrameCache>> {
        self.frames.get(&index).cloned()
    }

    /// Map a live frame onto the baked frame rate.
    pub fn remap_frame(&self, live_frame: f64, evaluation_fps: f64) -> i64 {
        (live_frame * self.baked_fps / evaluation_fps).floor() as i64
    }

    /// Zero-based cache index for a live frame.
    pub fn index_for_live_frame(&self, live_frame: f64, evaluation_fps: f64) -> i64 {
        self.remap_frame(live_frame, evaluation_fps) - self.start_frame
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    pub fn baked_fps(&self) -> f64 {
        self.baked_fps
    }

    pub fn start_frame(&self) -> i64 {
        self.start_frame
    }

    pub fn end_frame(&self) -> i64 {
        self.end_frame
    }

    pub fn last_path(&self) -> Option<&Path> {
        self.last_path.as_deref()
    }

    /// Number of times a file has actually been parsed.
    pub fn parse_count(&self) -> usize {
        self.parse_count
    }

    /// Bumped by every clear and every load that replaces the contents.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Copy the cache into a trajectory table.
    ///
    /// Row 0 is the lowest cached index. `None` when empty or when the
    /// cached indices have gaps.
    pub fn to_table(&self) -> Option<VertexTrajectoryTable> {
        let (&first, _) = self.frames.first_key_value()?;
        let (&last, _) = self.frames.last_key_value()?;
        if (last - first + 1) as usize != self.frames.len() {
            warn!(
                "Vertex cache {:?} has gaps between indices {} and {}",
                self.last_path, first, last
            );
            return None;
        }

        let start_frame = i32::try_from(self.start_frame + first).ok()?;
        let end_frame = i32::try_from(self.start_frame + last).ok()?;
        Some(VertexTrajectoryTable {
            start_frame,
            end_frame,
            motion_offsets: self.frames.values().map(|f| f.motion_offsets.clone()).collect(),
            vertex_trajectories: self.frames.values().map(|f| f.positions.clone()).collect(),
        })
    }
}

/// Cloneable handle to a [`VertexCache`] shared by the consumers of a session.
#[derive(Debug, Clone, Default)]
pub struct SharedVertexCache {
    inner: Arc<Mutex<VertexCache>>,
}

impl SharedVertexCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, path: &Path) -> bool {
        self.inner.lock().load(path)
    }

    pub fn try_load(&self, path: &Path) -> Result<LoadOutcome, CacheLoadError> {
        self.inner.lock().try_load(path)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn lookup(&self, index: i64) -> Option<Arc<FrameCache>> {
        self.inner.lock().lookup(index)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn parse_count(&self) -> usize {
        self.inner.lock().parse_count()
    }

    pub fn generation(&self) -> u64 {
        self.inner.lock().generation()
    }

    pub fn last_path(&self) -> Option<PathBuf> {
        self.inner.lock().last_path().map(Path::to_path_buf)
    }

    /// Run `f` with the cache locked.
    pub fn with<R>(&self, f: impl FnOnce(&VertexCache) -> R) -> R {
        f(&self.inner.lock())
    }
}

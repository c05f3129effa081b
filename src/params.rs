//! Artist-facing parameters.
//!
//! Values are stored as given (so a parameter file round-trips) and clamped
//! into their documented ranges whenever they are read.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::vertex_cache::CacheSettings;

pub const STRENGTH_RANGE: (f64, f64) = (0.0, 5.0);
pub const SMOOTH_WINDOW_MAX: u32 = 5;
pub const LINE_COUNT_MAX: u32 = 100;
pub const SEGMENTS_RANGE: (u32, u32) = (1, 64);
pub const RADIUS_RANGE: (f64, f64) = (0.001, 10.0);
pub const SIDES_RANGE: (u32, u32) = (3, 32);
pub const DEFAULT_SEED: u64 = 12345;

fn clamp_strength(value: f64) -> f64 {
    if value.is_nan() {
        return STRENGTH_RANGE.0;
    }
    value.clamp(STRENGTH_RANGE.0, STRENGTH_RANGE.1)
}

/// Elongation controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtisticParameters {
    /// Frames of trailing elongation.
    pub strength_past: f64,
    /// Frames of leading elongation.
    pub strength_future: f64,
    /// Smoothing half-window in frames.
    pub smooth_window: u32,
    pub smoothing_enabled: bool,
    /// When false the deformer passes geometry through.
    pub apply_elongation: bool,
}

impl Default for ArtisticParameters {
    fn default() -> Self {
        Self {
            strength_past: 1.5,
            strength_future: 1.5,
            smooth_window: 2,
            smoothing_enabled: true,
            apply_elongation: true,
        }
    }
}

impl ArtisticParameters {
    pub fn strength_past(&self) -> f64 {
        clamp_strength(self.strength_past)
    }

    pub fn strength_future(&self) -> f64 {
        clamp_strength(self.strength_future)
    }

    pub fn smooth_window(&self) -> usize {
        self.smooth_window.min(SMOOTH_WINDOW_MAX) as usize
    }
}

/// Motion-line generation controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionLineParameters {
    /// Number of seed vertices to trace.
    pub count: u32,
    pub strength_past: f64,
    pub strength_future: f64,
    pub smooth_window: u32,
    pub smoothing_enabled: bool,
    /// Cylinder segments along each line.
    pub segments: u32,
    pub radius: f64,
    /// Sides around each cylinder.
    pub sides: u32,
    pub seed: u64,
    pub generate: bool,
}

impl Default for MotionLineParameters {
    fn default() -> Self {
        Self {
            count: 10,
            strength_past: 1.5,
            strength_future: 1.5,
            smooth_window: 2,
            smoothing_enabled: true,
            segments: 8,
            radius: 0.1,
            sides: 6,
            seed: DEFAULT_SEED,
            generate: true,
        }
    }
}

impl MotionLineParameters {
    pub fn count(&self) -> usize {
        self.count.min(LINE_COUNT_MAX) as usize
    }

    pub fn strength_past(&self) -> f64 {
        clamp_strength(self.strength_past)
    }

    pub fn strength_future(&self) -> f64 {
        clamp_strength(self.strength_future)
    }

    pub fn smooth_window(&self) -> usize {
        self.smooth_window.min(SMOOTH_WINDOW_MAX) as usize
    }

    pub fn segments(&self) -> usize {
        self.segments.clamp(SEGMENTS_RANGE.0, SEGMENTS_RANGE.1) as usize
    }

    pub fn radius(&self) -> f64 {
        if self.radius.is_nan() {
            return RADIUS_RANGE.0;
        }
        self.radius.clamp(RADIUS_RANGE.0, RADIUS_RANGE.1)
    }

    pub fn sides(&self) -> usize {
        self.sides.clamp(SIDES_RANGE.0, SIDES_RANGE.1) as usize
    }
}

/// Everything a parameter file can set. Missing sections take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmearConfig {
    pub artistic: ArtisticParameters,
    pub motion_lines: MotionLineParameters,
    pub cache: CacheSettings,
}

impl SmearConfig {
    /// Load a JSON parameter file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read parameters {}: {}", path.display(), e))?;
        serde_json::from_str(&content).map_err(|e| format!("Failed to parse parameters {}: {}", path.display(), e))
    }
}

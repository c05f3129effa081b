//! Vertex-colour visualisation of motion data.

use bytemuck::{Pod, Zeroable};
use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SmearError};
use crate::offsets::VertexTrajectoryTable;
use crate::smoothing::smooth_offsets;

/// A vertex position with an RGB colour, laid out for upload as-is.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable, Serialize)]
pub struct ColoredVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl ColoredVertex {
    pub fn new(position: DVec3, color: [f32; 3]) -> Self {
        Self {
            position: position.as_vec3().to_array(),
            color,
        }
    }
}

/// What the colours encode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    /// Blue behind the direction of travel, white neutral, red ahead.
    #[default]
    Offset,
    /// Absolute components of the normalized frame-to-frame displacement.
    Direction,
    /// Time-varying debug colour.
    Pulse,
}

impl ColorMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "offset" => Some(Self::Offset),
            "direction" => Some(Self::Direction),
            "pulse" => Some(Self::Pulse),
            _ => None,
        }
    }
}

/// Map an offset in [-1, 1] to blue -> white -> red.
pub fn offset_color(offset: f64) -> [f32; 3] {
    let o = offset.clamp(-1.0, 1.0) as f32;
    if o >= 0.0 {
        [1.0, 1.0 - o, 1.0 - o]
    } else {
        [1.0 + o, 1.0 + o, 1.0]
    }
}

/// Map a displacement to `|normalized|` per channel. Black when not moving.
pub fn direction_color(velocity: DVec3) -> [f32; 3] {
    velocity.normalize_or_zero().abs().as_vec3().to_array()
}

pub fn pulse_color(frame: f64) -> [f32; 3] {
    [
        (frame * 0.1).sin().abs() as f32,
        (frame * 0.2).sin().abs() as f32,
        (frame * 0.3).sin().abs() as f32,
    ]
}

/// Coloured vertices for table frame `frame`.
pub fn colorize(
    table: &VertexTrajectoryTable,
    frame: i32,
    mode: ColorMode,
    smooth_window: usize,
    smoothing_enabled: bool,
) -> Result<Vec<ColoredVertex>> {
    let row = table.offset_index(frame)?;
    let current = table
        .vertex_trajectories
        .get(row)
        .ok_or_else(|| SmearError::SampleUnavailable {
            node: "trajectory table".to_string(),
            frame: f64::from(frame),
            stage: "colouring",
        })?;

    let colors: Vec<[f32; 3]> = match mode {
        ColorMode::Offset => smooth_offsets(&table.motion_offsets, row, smooth_window, smoothing_enabled)
            .unwrap_or_default()
            .into_iter()
            .map(offset_color)
            .collect(),
        ColorMode::Direction => {
            let next = table.vertex_trajectories.get(row + 1).unwrap_or(current);
            current
                .iter()
                .zip(next)
                .map(|(&a, &b)| direction_color(b - a))
                .collect()
        }
        ColorMode::Pulse => vec![pulse_color(f64::from(frame)); current.len()],
    };

    Ok(current
        .iter()
        .zip(colors)
        .map(|(&p, c)| ColoredVertex::new(p, c))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> VertexTrajectoryTable {
        VertexTrajectoryTable {
            start_frame: 1,
            end_frame: 3,
            motion_offsets: vec![vec![-1.0, 0.0, 1.0]; 2],
            vertex_trajectories: (0..3)
                .map(|f| vec![DVec3::new(f as f64, 0.0, 0.0); 3])
                .collect(),
        }
    }

    #[test]
    fn test_offset_colors() {
        assert_eq!(offset_color(-1.0), [0.0, 0.0, 1.0]);
        assert_eq!(offset_color(0.0), [1.0, 1.0, 1.0]);
        assert_eq!(offset_color(1.0), [1.0, 0.0, 0.0]);
        assert_eq!(offset_color(7.0), [1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_direction_color() {
        assert_eq!(direction_color(DVec3::new(-3.0, 0.0, 0.0)), [1.0, 0.0, 0.0]);
        assert_eq!(direction_color(DVec3::ZERO), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_colorize_offset_mode() {
        let colored = colorize(&table(), 1, ColorMode::Offset, 0, false).unwrap();
        assert_eq!(colored.len(), 3);
        assert_eq!(colored[0].color, [0.0, 0.0, 1.0]);
        assert_eq!(colored[2].color, [1.0, 0.0, 0.0]);
        assert_eq!(colored[1].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_colorize_direction_mode() {
        let colored = colorize(&table(), 2, ColorMode::Direction, 0, false).unwrap();
        assert!(colored.iter().all(|v| v.color == [1.0, 0.0, 0.0]));
    }

    #[test]
    fn test_vertex_buffer_cast() {
        let colored = colorize(&table(), 1, ColorMode::Pulse, 0, false).unwrap();
        let bytes: &[u8] = bytemuck::cast_slice(&colored);
        assert_eq!(bytes.len(), colored.len() * std::mem::size_of::<ColoredVertex>());
        assert_eq!(std::mem::size_of::<ColoredVertex>(), 24);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!(ColorMode::from_str("Direction"), Some(ColorMode::Direction));
        assert_eq!(ColorMode::from_str("rainbow"), None);
    }
}

pub mod error;

// Host scene access
pub mod scene;
pub mod scene_graph;
pub mod mesh_asset;

// Motion analysis
pub mod frame_range;
pub mod transform;
pub mod vertex_sampler;
pub mod centroid;
pub mod offsets;
pub mod articulation;
pub mod vertex_cache;
pub mod interpolate;
pub mod smoothing;

// Consumers
pub mod params;
pub mod deformation;
pub mod motion_lines;
pub mod coloring;
pub mod session;

pub mod cli;

pub use error::{CacheLoadError, Result, SmearError};

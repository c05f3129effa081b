//! Error types for the smear pipeline.
//!
//! Sampling and analysis failures are terminal for the evaluation that hit
//! them. Cache failures and out-of-range frames are recoverable: evaluation
//! contexts turn them into a skipped frame instead of an error.

use std::path::PathBuf;

use thiserror::Error;

use crate::scene::NodeKind;

/// Errors raised while extracting, sampling and analysing animated meshes.
#[derive(Error, Debug)]
pub enum SmearError {
    /// No keyframe curve with keys on any of the nine watched channels.
    #[error("No animation found on '{node}': no keyframes on translate/rotate/scale channels")]
    NoAnimationFound { node: String },

    /// A node of the wrong kind was passed where a mesh or transform was expected.
    #[error("Node '{node}' is a {found}, expected a {expected}")]
    InvalidNodeType {
        node: String,
        expected: NodeKind,
        found: NodeKind,
    },

    /// The host scene has no node with this identifier.
    #[error("Node '{node}' not found in scene")]
    NodeNotFound { node: String },

    /// Fewer than two frames of animation; no velocity is definable.
    #[error("Node '{node}' has {frames} frame(s) of animation, at least 2 are required")]
    InsufficientFrames { node: String, frames: usize },

    /// Offset or trajectory arrays do not match the mesh vertex count.
    #[error("Vertex count mismatch on '{node}' during {stage}: expected {expected}, found {found}")]
    VertexCountMismatch {
        node: String,
        stage: &'static str,
        expected: usize,
        found: usize,
    },

    /// The host could not resolve mesh or matrix data at a given time.
    #[error("Could not resolve {stage} for '{node}' at frame {frame}")]
    SampleUnavailable {
        node: String,
        frame: f64,
        stage: &'static str,
    },

    /// The requested frame lies outside the baked or cached range.
    #[error("Frame {frame} is outside the baked range [{start}, {end}]")]
    FrameOutOfRange { frame: f64, start: i32, end: i32 },

    /// Articulated meshes need a loaded vertex cache.
    #[error("Vertex cache unavailable{}", path_suffix(.path))]
    CacheUnavailable { path: Option<PathBuf> },

    /// Loading the vertex cache failed.
    #[error(transparent)]
    CacheLoad(#[from] CacheLoadError),
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" (last path: {})", p.display()),
        None => String::new(),
    }
}

/// Errors raised while loading or writing a vertex cache file.
#[derive(Error, Debug)]
pub enum CacheLoadError {
    #[error("Failed to read vertex cache {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed vertex cache JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Vertex cache {path} is missing required field '{field}'")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("Vertex cache {path} has invalid frame key '{key}'")]
    InvalidFrameKey { path: PathBuf, key: String },

    #[error("Vertex cache {path}, frame {frame}: {what} has {found} entries, expected {expected}")]
    LengthMismatch {
        path: PathBuf,
        frame: i64,
        what: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SmearError>;

impl SmearError {
    /// Whether this error only affects the current frame and evaluation may
    /// continue with the geometry left untouched.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SmearError::FrameOutOfRange { .. }
                | SmearError::CacheUnavailable { .. }
                | SmearError::CacheLoad(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = SmearError::VertexCountMismatch {
            node: "cubeShape".to_string(),
            stage: "deformation",
            expected: 8,
            found: 6,
        };
        let msg = err.to_string();
        assert!(msg.contains("cubeShape"));
        assert!(msg.contains("deformation"));
        assert!(msg.contains('8'));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(SmearError::FrameOutOfRange { frame: 40.0, start: 1, end: 24 }.is_recoverable());
        assert!(SmearError::CacheUnavailable { path: None }.is_recoverable());
        assert!(!SmearError::NoAnimationFound { node: "a".into() }.is_recoverable());
        assert!(!SmearError::InsufficientFrames { node: "a".into(), frames: 1 }.is_recoverable());
    }

    #[test]
    fn test_cache_unavailable_message() {
        let err = SmearError::CacheUnavailable { path: Some(PathBuf::from("/tmp/c.json")) };
        assert!(err.to_string().contains("/tmp/c.json"));
        let err = SmearError::CacheUnavailable { path: None };
        assert_eq!(err.to_string(), "Vertex cache unavailable");
    }
}

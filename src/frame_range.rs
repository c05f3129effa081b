//! Animated frame range extraction.

use std::fmt;

use log::debug;

use crate::error::{Result, SmearError};
use crate::scene::{expect_kind, Channel, NodeId, NodeKind, SceneSource};

/// Inclusive integer frame range. `end >= start` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameRange {
    start: i32,
    end: i32,
}

impl FrameRange {
    /// Create a range; the bounds are swapped if given in reverse.
    pub fn new(start: i32, end: i32) -> Self {
        if end < start {
            Self { start: end, end: start }
        } else {
            Self { start, end }
        }
    }

    pub fn start(&self) -> i32 {
        self.start
    }

    pub fn end(&self) -> i32 {
        self.end
    }

    /// Number of frames in the range (inclusive).
    pub fn len(&self) -> usize {
        (i64::from(self.end) - i64::from(self.start) + 1) as usize
    }

    /// Ranges always contain at least one frame.
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn contains(&self, frame: i32) -> bool {
        frame >= self.start && frame <= self.end
    }

    /// Iterate every frame in the range.
    pub fn frames(&self) -> impl Iterator<Item = i32> {
        self.start..=self.end
    }

    /// Zero-based index of `frame` within the range.
    pub fn index_of(&self, frame: i32) -> Option<usize> {
        self.contains(frame).then(|| (frame - self.start) as usize)
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.end)
    }
}

/// Find the frame range covered by keyframes on a transform's nine TRS channels.
///
/// Takes the earliest first key and the latest last key over every curve
/// connected to any channel. Fractional key times widen the range outward so
/// every key is covered.
pub fn extract_frame_range(scene: &dyn SceneSource, node: NodeId) -> Result<FrameRange> {
    expect_kind(scene, node, NodeKind::Transform)?;

    let mut bounds: Option<(f64, f64)> = None;
    for channel in Channel::ALL {
        for curve in scene.keyframe_curves(node, channel)? {
            let (Some(first), Some(last)) = (curve.first_time(), curve.last_time()) else {
                continue;
            };
            bounds = Some(match bounds {
                Some((lo, hi)) => (lo.min(first), hi.max(last)),
                None => (first, last),
            });
        }
    }

    let Some((lo, hi)) = bounds else {
        return Err(SmearError::NoAnimationFound {
            node: scene.node_name(node),
        });
    };

    let range = FrameRange::new(lo.floor() as i32, hi.ceil() as i32);
    debug!("Animation range of '{}': {}", scene.node_name(node), range);
    Ok(range)
}

//! Host scene collaborator interface.
//!
//! The smear pipeline never owns the animated scene. It reads transforms,
//! keyframe curves, mesh points and skin bindings through [`SceneSource`].
//! All queries take an explicit time and `&self`: evaluating the scene at some
//! frame must never move the host's shared playback time.

use std::fmt;

use glam::{DMat4, DVec3};

use crate::error::Result;

/// Identifier of a node in the host scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Kinds of scene nodes the pipeline distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Transform,
    Joint,
    Mesh,
}

impl NodeKind {
    /// Transforms and joints both carry animatable TRS channels.
    pub fn is_transform(&self) -> bool {
        matches!(self, NodeKind::Transform | NodeKind::Joint)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Transform => "transform",
            NodeKind::Joint => "joint",
            NodeKind::Mesh => "mesh",
        };
        f.write_str(name)
    }
}

/// The nine animatable channels watched for keyframes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    TranslateX,
    TranslateY,
    TranslateZ,
    RotateX,
    RotateY,
    RotateZ,
    ScaleX,
    ScaleY,
    ScaleZ,
}

impl Channel {
    /// All channels in translate, rotate, scale order.
    pub const ALL: [Channel; 9] = [
        Channel::TranslateX,
        Channel::TranslateY,
        Channel::TranslateZ,
        Channel::RotateX,
        Channel::RotateY,
        Channel::RotateZ,
        Channel::ScaleX,
        Channel::ScaleY,
        Channel::ScaleZ,
    ];

    pub const TRANSLATE: [Channel; 3] = [Channel::TranslateX, Channel::TranslateY, Channel::TranslateZ];
    pub const ROTATE: [Channel; 3] = [Channel::RotateX, Channel::RotateY, Channel::RotateZ];
    pub const SCALE: [Channel; 3] = [Channel::ScaleX, Channel::ScaleY, Channel::ScaleZ];

    /// Host attribute name of the channel.
    pub fn name(&self) -> &'static str {
        match self {
            Channel::TranslateX => "translateX",
            Channel::TranslateY => "translateY",
            Channel::TranslateZ => "translateZ",
            Channel::RotateX => "rotateX",
            Channel::RotateY => "rotateY",
            Channel::RotateZ => "rotateZ",
            Channel::ScaleX => "scaleX",
            Channel::ScaleY => "scaleY",
            Channel::ScaleZ => "scaleZ",
        }
    }

    /// Parse a host attribute name (`translateX`, `rotateY`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        Channel::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Value of the channel on an unanimated node.
    pub fn rest_value(&self) -> f64 {
        match self {
            Channel::ScaleX | Channel::ScaleY | Channel::ScaleZ => 1.0,
            _ => 0.0,
        }
    }
}

/// A single key on an animation curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keyframe {
    /// Time in frames.
    pub time: f64,
    pub value: f64,
}

/// An animation curve connected to a channel. Keys are kept sorted by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyframeCurve {
    keys: Vec<Keyframe>,
}

impl KeyframeCurve {
    pub fn new(mut keys: Vec<Keyframe>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Build a curve from `(time, value)` pairs.
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        Self::new(pairs.iter().map(|&(time, value)| Keyframe { time, value }).collect())
    }

    pub fn keys(&self) -> &[Keyframe] {
        &self.keys
    }

    pub fn num_keys(&self) -> usize {
        self.keys.len()
    }

    pub fn first_time(&self) -> Option<f64> {
        self.keys.first().map(|k| k.time)
    }

    pub fn last_time(&self) -> Option<f64> {
        self.keys.last().map(|k| k.time)
    }

    /// Evaluate the curve at `time`.
    ///
    /// Values are linearly interpolated between keys and held constant
    /// before the first and after the last key. `None` for an empty curve or
    /// a NaN time.
    pub fn evaluate(&self, time: f64) -> Option<f64> {
        if time.is_nan() {
            return None;
        }
        let first = self.keys.first()?;
        let last = self.keys.last()?;
        if time <= first.time {
            return Some(first.value);
        }
        if time >= last.time {
            return Some(last.value);
        }

        let next = self.keys.partition_point(|k| k.time <= time);
        let k0 = self.keys[next - 1];
        let k1 = self.keys[next];
        let span = k1.time - k0.time;
        if span <= 0.0 {
            return Some(k1.value);
        }
        let t = (time - k0.time) / span;
        Some(k0.value + (k1.value - k0.value) * t)
    }
}

/// Per-vertex influence weight of a skin binding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InfluenceWeight {
    /// Index into [`SkinBinding::influences`].
    pub influence: usize,
    pub weight: f64,
}

/// A skin-binding deformer feeding a mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct SkinBinding {
    /// Influence objects (joints), in binding order.
    pub influences: Vec<NodeId>,
    /// Per-vertex weights, indexed by mesh vertex.
    pub weights: Vec<Vec<InfluenceWeight>>,
}

impl SkinBinding {
    pub fn influence_count(&self) -> usize {
        self.influences.len()
    }
}

/// Read-only view of the host scene graph.
///
/// Implementations must evaluate every query in its own time context: no
/// method may alter the host's current playback time.
pub trait SceneSource {
    /// Kind of the node, or `NodeNotFound`.
    fn node_kind(&self, node: NodeId) -> Result<NodeKind>;

    /// Human-readable node name, used in diagnostics.
    fn node_name(&self, node: NodeId) -> String;

    /// Keyframe curves connected to `channel` of `node`. Empty when unanimated.
    fn keyframe_curves(&self, node: NodeId, channel: Channel) -> Result<Vec<KeyframeCurve>>;

    /// Value of `channel` of `node` at `time` (frames).
    fn evaluate_channel(&self, node: NodeId, channel: Channel, time: f64) -> Result<f64>;

    /// Rotation order declared on a transform node.
    fn rotation_order(&self, node: NodeId) -> Result<crate::transform::RotationOrder>;

    /// Object-space vertex positions of `mesh` at `time`, in native vertex order.
    fn object_points(&self, mesh: NodeId, time: f64) -> Result<Vec<DVec3>>;

    /// World matrix of a transform node at `time`.
    fn world_matrix(&self, node: NodeId, time: f64) -> Result<DMat4>;

    /// The transform node that drives `mesh`.
    fn mesh_transform(&self, mesh: NodeId) -> Result<NodeId>;

    /// Skin-binding deformer whose output feeds `mesh`, if any.
    fn skin_binding(&self, mesh: NodeId) -> Result<Option<SkinBinding>>;
}

/// A mesh shape together with the transform that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBinding {
    pub mesh: NodeId,
    pub transform: NodeId,
}

impl MeshBinding {
    /// Resolve the driving transform of `mesh` through the scene.
    pub fn resolve(scene: &dyn SceneSource, mesh: NodeId) -> Result<Self> {
        crate::scene::expect_kind(scene, mesh, NodeKind::Mesh)?;
        let transform = scene.mesh_transform(mesh)?;
        Ok(Self { mesh, transform })
    }
}

/// Fail with `InvalidNodeType` unless `node` has the expected kind.
///
/// Joints are accepted where a transform is expected.
pub fn expect_kind(scene: &dyn SceneSource, node: NodeId, expected: NodeKind) -> Result<()> {
    let found = scene.node_kind(node)?;
    let ok = match expected {
        NodeKind::Transform => found.is_transform(),
        other => found == other,
    };
    if ok {
        Ok(())
    } else {
        Err(crate::error::SmearError::InvalidNodeType {
            node: scene.node_name(node),
            expected,
            found,
        })
    }
}

//! In-memory scene graph.
//!
//! [`MemoryScene`] is a small host implementation of [`SceneSource`]: keyed
//! transforms and joints, rigid or skinned meshes, and a playback clock that
//! evaluation never touches. Scenes can be built in code or loaded from a
//! JSON scene description.

use std::collections::HashMap;
use std::path::Path;

use glam::{DMat4, DVec3};
use serde::Deserialize;

use crate::error::{Result, SmearError};
use crate::mesh_asset::MeshAssetRegistry;
use crate::scene::{
    Channel, InfluenceWeight, KeyframeCurve, NodeId, NodeKind, SceneSource, SkinBinding,
};
use crate::transform::{compose_matrix, RotationOrder};

/// A transform or joint node with animatable TRS channels.
#[derive(Debug, Clone)]
pub struct TransformNode {
    pub name: String,
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub rotation_order: RotationOrder,
    /// Static channel values, used when a channel has no keyed curve.
    pub rest_values: [f64; 9],
    pub curves: HashMap<Channel, Vec<KeyframeCurve>>,
}

impl TransformNode {
    fn new(name: String, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            parent: None,
            rotation_order: RotationOrder::default(),
            rest_values: Channel::ALL.map(|c| c.rest_value()),
            curves: HashMap::new(),
        }
    }

    fn channel_index(channel: Channel) -> usize {
        Channel::ALL.iter().position(|&c| c == channel).unwrap_or(0)
    }

    /// Value of a channel at `time`: first keyed curve, else the rest value.
    pub fn channel_value(&self, channel: Channel, time: f64) -> f64 {
        self.curves
            .get(&channel)
            .and_then(|curves| curves.iter().find_map(|c| c.evaluate(time)))
            .unwrap_or(self.rest_values[Self::channel_index(channel)])
    }

    /// Local matrix at `time`.
    pub fn local_matrix(&self, time: f64) -> DMat4 {
        let triple = |channels: [Channel; 3]| {
            DVec3::new(
                self.channel_value(channels[0], time),
                self.channel_value(channels[1], time),
                self.channel_value(channels[2], time),
            )
        };
        compose_matrix(
            triple(Channel::TRANSLATE),
            triple(Channel::ROTATE),
            triple(Channel::SCALE),
            self.rotation_order,
        )
    }
}

/// A skin-binding deformer attached to a mesh.
#[derive(Debug, Clone)]
pub struct SkinDeformer {
    pub binding: SkinBinding,
    /// Frame at which the mesh points were bound.
    pub bind_frame: f64,
}

/// A mesh shape. Points are in object space (bind pose when skinned).
#[derive(Debug, Clone)]
pub struct MeshNode {
    pub name: String,
    pub transform: NodeId,
    pub points: Vec<DVec3>,
    /// Polygon topology, empty for point-only meshes.
    pub face_counts: Vec<u32>,
    pub face_connects: Vec<u32>,
    pub skin: Option<SkinDeformer>,
}

/// A scene entity - either a transform-like node or a mesh.
#[derive(Debug, Clone)]
pub enum SceneNode {
    Transform(TransformNode),
    Mesh(MeshNode),
}

impl SceneNode {
    pub fn name(&self) -> &str {
        match self {
            SceneNode::Transform(t) => &t.name,
            SceneNode::Mesh(m) => &m.name,
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            SceneNode::Transform(t) => t.kind,
            SceneNode::Mesh(_) => NodeKind::Mesh,
        }
    }
}

/// The in-memory scene.
#[derive(Debug)]
pub struct MemoryScene {
    nodes: HashMap<NodeId, SceneNode>,
    names: HashMap<String, NodeId>,
    /// Next node ID to assign.
    next_id: u64,
    /// Playback time. Evaluation reads its own time context and never moves this.
    current_time: f64,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            names: HashMap::new(),
            next_id: 1,
            current_time: 0.0,
        }
    }

    /// Generate a new unique node ID.
    fn new_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert(&mut self, node: SceneNode) -> NodeId {
        let id = self.new_id();
        self.names.insert(node.name().to_string(), id);
        self.nodes.insert(id, node);
        id
    }

    /// Create a transform node and return its ID.
    pub fn create_transform(&mut self, name: &str) -> NodeId {
        self.insert(SceneNode::Transform(TransformNode::new(name.to_string(), NodeKind::Transform)))
    }

    /// Create a joint node (a transform usable as a skin influence).
    pub fn create_joint(&mut self, name: &str) -> NodeId {
        self.insert(SceneNode::Transform(TransformNode::new(name.to_string(), NodeKind::Joint)))
    }

    /// Create a mesh shape driven by `transform`.
    pub fn create_mesh(&mut self, name: &str, transform: NodeId, points: Vec<DVec3>) -> Result<NodeId> {
        self.transform_node(transform)?;
        Ok(self.insert(SceneNode::Mesh(MeshNode {
            name: name.to_string(),
            transform,
            points,
            face_counts: Vec::new(),
            face_connects: Vec::new(),
            skin: None,
        })))
    }

    /// Attach polygon topology to a mesh.
    pub fn set_topology(&mut self, mesh: NodeId, face_counts: Vec<u32>, face_connects: Vec<u32>) -> Result<()> {
        self.mesh_node(mesh)?;
        if let Some(SceneNode::Mesh(m)) = self.nodes.get_mut(&mesh) {
            m.face_counts = face_counts;
            m.face_connects = face_connects;
        }
        Ok(())
    }

    /// The mesh node behind `id`, if it is one.
    pub fn mesh(&self, id: NodeId) -> Option<&MeshNode> {
        match self.nodes.get(&id) {
            Some(SceneNode::Mesh(m)) => Some(m),
            _ => None,
        }
    }

    /// Look up a node by name.
    pub fn find(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Look up a node by name, failing with `NodeNotFound`.
    pub fn require(&self, name: &str) -> Result<NodeId> {
        self.find(name).ok_or_else(|| SmearError::NodeNotFound {
            node: name.to_string(),
        })
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(&id)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Move the playback clock.
    pub fn set_current_time(&mut self, time: f64) {
        self.current_time = time;
    }

    fn node(&self, id: NodeId) -> Result<&SceneNode> {
        self.nodes.get(&id).ok_or_else(|| SmearError::NodeNotFound {
            node: id.to_string(),
        })
    }

    fn transform_node(&self, id: NodeId) -> Result<&TransformNode> {
        match self.node(id)? {
            SceneNode::Transform(t) => Ok(t),
            SceneNode::Mesh(_) => Err(SmearError::InvalidNodeType {
                node: self.node_name(id),
                expected: NodeKind::Transform,
                found: NodeKind::Mesh,
            }),
        }
    }

    fn transform_node_mut(&mut self, id: NodeId) -> Result<&mut TransformNode> {
        let name = self.node_name(id);
        match self.nodes.get_mut(&id) {
            Some(SceneNode::Transform(t)) => Ok(t),
            Some(SceneNode::Mesh(_)) => Err(SmearError::InvalidNodeType {
                node: name,
                expected: NodeKind::Transform,
                found: NodeKind::Mesh,
            }),
            None => Err(SmearError::NodeNotFound { node: name }),
        }
    }

    fn mesh_node(&self, id: NodeId) -> Result<&MeshNode> {
        match self.node(id)? {
            SceneNode::Mesh(m) => Ok(m),
            SceneNode::Transform(t) => Err(SmearError::InvalidNodeType {
                node: t.name.clone(),
                expected: NodeKind::Mesh,
                found: t.kind,
            }),
        }
    }

    // === Authoring ===

    /// Parent `child` under `parent`. Returns false if that would create a cycle.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) -> Result<bool> {
        self.transform_node(parent)?;
        let mut cursor = Some(parent);
        while let Some(id) = cursor {
            if id == child {
                return Ok(false);
            }
            cursor = self.transform_node(id)?.parent;
        }
        self.transform_node_mut(child)?.parent = Some(parent);
        Ok(true)
    }

    pub fn set_rotation_order(&mut self, node: NodeId, order: RotationOrder) -> Result<()> {
        self.transform_node_mut(node)?.rotation_order = order;
        Ok(())
    }

    /// Set the static value of a channel.
    pub fn set_rest_value(&mut self, node: NodeId, channel: Channel, value: f64) -> Result<()> {
        self.transform_node_mut(node)?.rest_values[TransformNode::channel_index(channel)] = value;
        Ok(())
    }

    /// Connect an animation curve to a channel.
    pub fn add_curve(&mut self, node: NodeId, channel: Channel, curve: KeyframeCurve) -> Result<()> {
        self.transform_node_mut(node)?
            .curves
            .entry(channel)
            .or_default()
            .push(curve);
        Ok(())
    }

    /// Bind `mesh` to a skin deformer. Weights are indexed by mesh vertex.
    pub fn bind_skin(&mut self, mesh: NodeId, binding: SkinBinding, bind_frame: f64) -> Result<()> {
        for &influence in &binding.influences {
            self.transform_node(influence)?;
        }
        let vertex_count = self.mesh_node(mesh)?.points.len();
        if binding.weights.len() != vertex_count {
            return Err(SmearError::VertexCountMismatch {
                node: self.node_name(mesh),
                stage: "skin binding",
                expected: vertex_count,
                found: binding.weights.len(),
            });
        }
        if let Some(SceneNode::Mesh(m)) = self.nodes.get_mut(&mesh) {
            m.skin = Some(SkinDeformer { binding, bind_frame });
        }
        Ok(())
    }

    // === Evaluation ===

    fn check_time(&self, node: NodeId, time: f64, stage: &'static str) -> Result<()> {
        if time.is_finite() {
            return Ok(());
        }
        Err(SmearError::SampleUnavailable {
            node: self.node_name(node),
            frame: time,
            stage,
        })
    }

    fn world_matrix_at(&self, node: NodeId, time: f64) -> Result<DMat4> {
        self.check_time(node, time, "world matrix")?;
        let mut matrix = DMat4::IDENTITY;
        let mut cursor = Some(node);
        let mut depth = 0usize;
        while let Some(id) = cursor {
            let t = self.transform_node(id)?;
            matrix = t.local_matrix(time) * matrix;
            cursor = t.parent;
            depth += 1;
            if depth > self.nodes.len() {
                return Err(SmearError::SampleUnavailable {
                    node: self.node_name(node),
                    frame: time,
                    stage: "world matrix (parent cycle)",
                });
            }
        }
        Ok(matrix)
    }

    /// Linear blend skinning of bind-pose points at `time`.
    fn skinned_points(&self, mesh: &MeshNode, skin: &SkinDeformer, time: f64) -> Result<Vec<DVec3>> {
        let skin_matrices = skin
            .binding
            .influences
            .iter()
            .map(|&joint| {
                let bind = self.world_matrix_at(joint, skin.bind_frame)?;
                if !(bind.determinant().abs() > f64::EPSILON) {
                    return Err(SmearError::SampleUnavailable {
                        node: self.node_name(joint),
                        frame: skin.bind_frame,
                        stage: "skin bind matrix",
                    });
                }
                let current = self.world_matrix_at(joint, time)?;
                Ok(current * bind.inverse())
            })
            .collect::<Result<Vec<DMat4>>>()?;

        let points = mesh
            .points
            .iter()
            .zip(&skin.binding.weights)
            .map(|(&p, weights)| {
                let mut total = 0.0;
                let mut blended = DVec3::ZERO;
                for w in weights {
                    if let Some(m) = skin_matrices.get(w.influence) {
                        blended += m.transform_point3(p) * w.weight;
                        total += w.weight;
                    }
                }
                if total > 0.0 {
                    blended / total
                } else {
                    p
                }
            })
            .collect();
        Ok(points)
    }

    // === JSON scene description ===

    /// Load a scene description from a JSON file. OBJ paths resolve relative
    /// to the file's directory.
    pub fn from_json_file(path: &Path) -> std::result::Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read scene {}: {}", path.display(), e))?;
        let description: SceneDescription = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse scene {}: {}", path.display(), e))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_description(&description, base_dir)
    }

    /// Build a scene from a parsed description.
    pub fn from_description(
        description: &SceneDescription,
        base_dir: &Path,
    ) -> std::result::Result<Self, String> {
        let mut scene = MemoryScene::new();
        let mut assets = MeshAssetRegistry::new();

        // Transforms first so parents and mesh transforms can be resolved in any order.
        for node in &description.nodes {
            let (desc, id) = match node {
                NodeDescription::Transform(d) => (d, scene.create_transform(&d.name)),
                NodeDescription::Joint(d) => (d, scene.create_joint(&d.name)),
                NodeDescription::Mesh(_) => continue,
            };
            scene.apply_transform_description(id, desc)?;
        }

        for node in &description.nodes {
            let desc = match node {
                NodeDescription::Transform(d) | NodeDescription::Joint(d) => d,
                NodeDescription::Mesh(_) => continue,
            };
            if let Some(parent) = &desc.parent {
                let child = scene.require(&desc.name).map_err(|e| e.to_string())?;
                let parent_id = scene.require(parent).map_err(|e| e.to_string())?;
                if !scene.set_parent(child, parent_id).map_err(|e| e.to_string())? {
                    return Err(format!("Parenting '{}' under '{}' creates a cycle", desc.name, parent));
                }
            }
        }

        for node in &description.nodes {
            let NodeDescription::Mesh(desc) = node else {
                continue;
            };
            let transform = scene.require(&desc.transform).map_err(|e| e.to_string())?;
            let (points, topology) = match &desc.obj {
                Some(obj) => {
                    let obj_path = base_dir.join(obj);
                    let key = obj_path.display().to_string();
                    let asset = assets.get_or_load(&key, || {
                        std::fs::read_to_string(&obj_path)
                            .map_err(|e| format!("Failed to read {}: {}", obj_path.display(), e))
                    })?;
                    (
                        asset.positions.clone(),
                        Some((asset.face_counts.clone(), asset.face_connects.clone())),
                    )
                }
                None => (desc.points.iter().map(|&p| DVec3::from_array(p)).collect(), None),
            };
            let mesh = scene
                .create_mesh(&desc.name, transform, points)
                .map_err(|e| e.to_string())?;
            if let Some((face_counts, face_connects)) = topology {
                scene
                    .set_topology(mesh, face_counts, face_connects)
                    .map_err(|e| e.to_string())?;
            }

            if let Some(skin) = &desc.skin {
                let influences = skin
                    .influences
                    .iter()
                    .map(|name| scene.require(name))
                    .collect::<Result<Vec<_>>>()
                    .map_err(|e| e.to_string())?;
                let weights = skin
                    .weights
                    .iter()
                    .map(|vertex| {
                        vertex
                            .iter()
                            .map(|&(influence, weight)| InfluenceWeight { influence, weight })
                            .collect()
                    })
                    .collect();
                scene
                    .bind_skin(mesh, SkinBinding { influences, weights }, skin.bind_frame)
                    .map_err(|e| e.to_string())?;
            }
        }

        Ok(scene)
    }

    fn apply_transform_description(
        &mut self,
        id: NodeId,
        desc: &TransformDescription,
    ) -> std::result::Result<(), String> {
        let node = self.transform_node_mut(id).map_err(|e| e.to_string())?;
        node.rotation_order = desc.rotation_order;
        let statics = [desc.translate, desc.rotate, desc.scale].concat();
        node.rest_values.copy_from_slice(&statics);

        for (name, keys) in &desc.curves {
            let channel = Channel::from_name(name)
                .ok_or_else(|| format!("Unknown channel '{}' on '{}'", name, desc.name))?;
            let pairs: Vec<(f64, f64)> = keys.iter().map(|k| (k[0], k[1])).collect();
            node.curves
                .entry(channel)
                .or_default()
                .push(KeyframeCurve::from_pairs(&pairs));
        }
        Ok(())
    }
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneSource for MemoryScene {
    fn node_kind(&self, node: NodeId) -> Result<NodeKind> {
        Ok(self.node(node)?.kind())
    }

    fn node_name(&self, node: NodeId) -> String {
        self.nodes
            .get(&node)
            .map(|n| n.name().to_string())
            .unwrap_or_else(|| node.to_string())
    }

    fn keyframe_curves(&self, node: NodeId, channel: Channel) -> Result<Vec<KeyframeCurve>> {
        Ok(self
            .transform_node(node)?
            .curves
            .get(&channel)
            .cloned()
            .unwrap_or_default())
    }

    fn evaluate_channel(&self, node: NodeId, channel: Channel, time: f64) -> Result<f64> {
        self.check_time(node, time, channel.name())?;
        Ok(self.transform_node(node)?.channel_value(channel, time))
    }

    fn rotation_order(&self, node: NodeId) -> Result<RotationOrder> {
        Ok(self.transform_node(node)?.rotation_order)
    }

    fn object_points(&self, mesh: NodeId, time: f64) -> Result<Vec<DVec3>> {
        let node = self.mesh_node(mesh)?;
        self.check_time(mesh, time, "mesh points")?;
        match &node.skin {
            Some(skin) => self.skinned_points(node, skin, time),
            None => Ok(node.points.clone()),
        }
    }

    fn world_matrix(&self, node: NodeId, time: f64) -> Result<DMat4> {
        self.world_matrix_at(node, time)
    }

    fn mesh_transform(&self, mesh: NodeId) -> Result<NodeId> {
        Ok(self.mesh_node(mesh)?.transform)
    }

    fn skin_binding(&self, mesh: NodeId) -> Result<Option<SkinBinding>> {
        Ok(self.mesh_node(mesh)?.skin.as_ref().map(|s| s.binding.clone()))
    }
}

/// JSON scene description: `{ "nodes": [...] }`.
#[derive(Debug, Clone, Deserialize)]
pub struct SceneDescription {
    pub nodes: Vec<NodeDescription>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeDescription {
    Transform(TransformDescription),
    Joint(TransformDescription),
    Mesh(MeshDescription),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformDescription {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub rotation_order: RotationOrder,
    #[serde(default)]
    pub translate: [f64; 3],
    /// Radians.
    #[serde(default)]
    pub rotate: [f64; 3],
    #[serde(default = "unit_scale")]
    pub scale: [f64; 3],
    /// Channel name -> `[[time, value], ...]`.
    #[serde(default)]
    pub curves: HashMap<String, Vec<[f64; 2]>>,
}

fn unit_scale() -> [f64; 3] {
    [1.0; 3]
}

#[derive(Debug, Clone, Deserialize)]
pub struct MeshDescription {
    pub name: String,
    pub transform: String,
    #[serde(default)]
    pub points: Vec<[f64; 3]>,
    /// OBJ file providing the points, relative to the scene file.
    #[serde(default)]
    pub obj: Option<String>,
    #[serde(default)]
    pub skin: Option<SkinDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SkinDescription {
    pub influences: Vec<String>,
    /// Per vertex: `[[influence_index, weight], ...]`.
    pub weights: Vec<Vec<(usize, f64)>>,
    #[serde(default)]
    pub bind_frame: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_points() -> Vec<DVec3> {
        vec![DVec3::ZERO, DVec3::X, DVec3::Y]
    }

    #[test]
    fn test_create_and_find() {
        let mut scene = MemoryScene::new();
        let xf = scene.create_transform("cube");
        let mesh = scene.create_mesh("cubeShape", xf, unit_points()).unwrap();

        assert_eq!(scene.find("cube"), Some(xf));
        assert_eq!(scene.node_kind(mesh).unwrap(), NodeKind::Mesh);
        assert_eq!(scene.mesh_transform(mesh).unwrap(), xf);
        assert!(scene.find("missing").is_none());
        assert!(matches!(scene.require("missing"), Err(SmearError::NodeNotFound { .. })));
    }

    #[test]
    fn test_mesh_requires_transform() {
        let mut scene = MemoryScene::new();
        let xf = scene.create_transform("a");
        let mesh = scene.create_mesh("aShape", xf, unit_points()).unwrap();
        let err = scene.create_mesh("bShape", mesh, unit_points()).unwrap_err();
        assert!(matches!(err, SmearError::InvalidNodeType { .. }));
    }

    #[test]
    fn test_channel_rest_and_curve_values() {
        let mut scene = MemoryScene::new();
        let xf = scene.create_transform("a");
        scene.set_rest_value(xf, Channel::TranslateY, 3.0).unwrap();
        scene
            .add_curve(xf, Channel::TranslateX, KeyframeCurve::from_pairs(&[(0.0, 0.0), (10.0, 10.0)]))
            .unwrap();

        assert_eq!(scene.evaluate_channel(xf, Channel::TranslateX, 4.0).unwrap(), 4.0);
        assert_eq!(scene.evaluate_channel(xf, Channel::TranslateY, 4.0).unwrap(), 3.0);
        assert_eq!(scene.evaluate_channel(xf, Channel::ScaleZ, 4.0).unwrap(), 1.0);
    }

    #[test]
    fn test_parent_chain_world_matrix() {
        let mut scene = MemoryScene::new();
        let parent = scene.create_transform("parent");
        let child = scene.create_transform("child");
        scene.set_rest_value(parent, Channel::TranslateX, 5.0).unwrap();
        scene.set_rest_value(child, Channel::TranslateY, 2.0).unwrap();
        assert!(scene.set_parent(child, parent).unwrap());

        let world = scene.world_matrix(child, 0.0).unwrap();
        assert_eq!(world.transform_point3(DVec3::ZERO), DVec3::new(5.0, 2.0, 0.0));

        // Cycles are refused.
        assert!(!scene.set_parent(parent, child).unwrap());
    }

    #[test]
    fn test_evaluation_does_not_move_playback_time() {
        let mut scene = MemoryScene::new();
        let xf = scene.create_transform("a");
        scene
            .add_curve(xf, Channel::TranslateX, KeyframeCurve::from_pairs(&[(0.0, 0.0), (10.0, 10.0)]))
            .unwrap();
        scene.set_current_time(7.0);

        for frame in 0..10 {
            scene.world_matrix(xf, f64::from(frame)).unwrap();
        }
        assert_eq!(scene.current_time(), 7.0);
    }

    #[test]
    fn test_skinned_points_follow_joint() {
        let mut scene = MemoryScene::new();
        let root = scene.create_transform("root");
        let joint = scene.create_joint("joint");
        scene
            .add_curve(joint, Channel::TranslateX, KeyframeCurve::from_pairs(&[(0.0, 0.0), (10.0, 10.0)]))
            .unwrap();
        let mesh = scene.create_mesh("skinShape", root, unit_points()).unwrap();
        let weights = vec![vec![InfluenceWeight { influence: 0, weight: 1.0 }]; 3];
        scene
            .bind_skin(mesh, SkinBinding { influences: vec![joint], weights }, 0.0)
            .unwrap();

        let points = scene.object_points(mesh, 5.0).unwrap();
        assert_eq!(points[0], DVec3::new(5.0, 0.0, 0.0));
        assert_eq!(points[2], DVec3::new(5.0, 1.0, 0.0));
    }

    #[test]
    fn test_bind_skin_checks_weight_count() {
        let mut scene = MemoryScene::new();
        let root = scene.create_transform("root");
        let joint = scene.create_joint("joint");
        let mesh = scene.create_mesh("skinShape", root, unit_points()).unwrap();
        let err = scene
            .bind_skin(mesh, SkinBinding { influences: vec![joint], weights: vec![] }, 0.0)
            .unwrap_err();
        assert!(matches!(err, SmearError::VertexCountMismatch { expected: 3, found: 0, .. }));
    }

    #[test]
    fn test_scene_description() {
        let json = r#"{
            "nodes": [
                { "kind": "mesh", "name": "boxShape", "transform": "box",
                  "points": [[0,0,0],[1,0,0],[0,1,0]] },
                { "kind": "transform", "name": "box", "rotation_order": "zyx",
                  "translate": [0, 1, 0],
                  "curves": { "translateX": [[1, 0], [24, 23]] } }
            ]
        }"#;
        let description: SceneDescription = serde_json::from_str(json).unwrap();
        let scene = MemoryScene::from_description(&description, Path::new(".")).unwrap();

        let xf = scene.find("box").unwrap();
        let mesh = scene.find("boxShape").unwrap();
        assert_eq!(scene.rotation_order(xf).unwrap(), RotationOrder::Zyx);
        assert_eq!(scene.object_points(mesh, 0.0).unwrap().len(), 3);
        assert_eq!(scene.evaluate_channel(xf, Channel::TranslateY, 5.0).unwrap(), 1.0);
        assert_eq!(scene.keyframe_curves(xf, Channel::TranslateX).unwrap().len(), 1);
    }

    #[test]
    fn test_scene_description_unknown_channel() {
        let json = r#"{ "nodes": [ { "kind": "transform", "name": "a",
            "curves": { "visibility": [[0, 1]] } } ] }"#;
        let description: SceneDescription = serde_json::from_str(json).unwrap();
        let err = MemoryScene::from_description(&description, Path::new(".")).unwrap_err();
        assert!(err.contains("visibility"));
    }

    #[test]
    fn test_non_finite_time_is_unavailable() {
        let mut scene = MemoryScene::new();
        let xf = scene.create_transform("a");
        scene
            .add_curve(xf, Channel::TranslateX, KeyframeCurve::from_pairs(&[(1.0, 0.0), (24.0, 23.0)]))
            .unwrap();
        let mesh = scene.create_mesh("aShape", xf, unit_points()).unwrap();

        for time in [f64::NAN, f64::INFINITY] {
            assert!(matches!(scene.world_matrix(xf, time), Err(SmearError::SampleUnavailable { .. })));
            assert!(matches!(
                scene.evaluate_channel(xf, Channel::TranslateX, time),
                Err(SmearError::SampleUnavailable { .. })
            ));
            assert!(matches!(scene.object_points(mesh, time), Err(SmearError::SampleUnavailable { .. })));
        }
    }
}

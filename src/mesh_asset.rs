//! Mesh asset loading and export.
//!
//! Scene meshes can be supplied as Wavefront OBJ files. Each OBJ position
//! becomes exactly one vertex (no per-normal or per-uv splitting), since
//! trajectories and offsets are indexed by vertex. Output geometry (deformed
//! meshes, motion lines) is written back as OBJ.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use glam::DVec3;

/// A loaded polygon mesh.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    /// Unique identifier for this asset.
    pub id: String,
    /// Vertex positions in native order.
    pub positions: Vec<DVec3>,
    /// Number of vertices of each face.
    pub face_counts: Vec<u32>,
    /// Vertex indices of all faces, concatenated.
    pub face_connects: Vec<u32>,
}

impl MeshAsset {
    /// Create a new mesh asset from raw geometry data.
    pub fn new(id: String, positions: Vec<DVec3>, face_counts: Vec<u32>, face_connects: Vec<u32>) -> Self {
        Self {
            id,
            positions,
            face_counts,
            face_connects,
        }
    }

    /// Parse a mesh asset from OBJ format content.
    ///
    /// Faces are kept as polygons (no triangulation) and positions are not
    /// split per attribute index.
    pub fn from_obj(id: String, obj_content: &str) -> Result<Self, String> {
        let mut cursor = std::io::Cursor::new(obj_content.as_bytes());

        let load_options = tobj::LoadOptions {
            triangulate: false,
            single_index: false,
            ..Default::default()
        };

        let (models, _materials) =
            tobj::load_obj_buf(&mut cursor, &load_options, |_| Ok((vec![], HashMap::new())))
                .map_err(|e| format!("Failed to parse OBJ: {}", e))?;

        if models.is_empty() {
            return Err("OBJ file contains no models".to_string());
        }

        // Combine all models into a single mesh
        let mut positions = Vec::new();
        let mut face_counts = Vec::new();
        let mut face_connects = Vec::new();

        for model in &models {
            let mesh = &model.mesh;
            if mesh.positions.is_empty() {
                continue;
            }

            let vertex_offset = positions.len() as u32;
            positions.extend(mesh.positions.chunks_exact(3).map(|p| {
                DVec3::new(f64::from(p[0]), f64::from(p[1]), f64::from(p[2]))
            }));

            // Empty arities means every face is a triangle.
            if mesh.face_arities.is_empty() {
                face_counts.extend(std::iter::repeat(3).take(mesh.indices.len() / 3));
            } else {
                face_counts.extend_from_slice(&mesh.face_arities);
            }
            face_connects.extend(mesh.indices.iter().map(|idx| vertex_offset + idx));
        }

        if positions.is_empty() {
            return Err("OBJ file contains no vertices".to_string());
        }

        Ok(Self::new(id, positions, face_counts, face_connects))
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn face_count(&self) -> usize {
        self.face_counts.len()
    }

    /// Serialize this mesh with replacement positions (e.g. after deformation).
    pub fn to_obj_with_positions(&self, positions: &[DVec3]) -> String {
        write_obj(positions, &self.face_counts, &self.face_connects)
    }
}

/// Write polygon geometry as OBJ text. Indices are zero-based on input.
pub fn write_obj(positions: &[DVec3], face_counts: &[u32], face_connects: &[u32]) -> String {
    let mut out = String::with_capacity(positions.len() * 32 + face_connects.len() * 8);
    for p in positions {
        let _ = writeln!(out, "v {} {} {}", p.x, p.y, p.z);
    }

    let mut cursor = 0usize;
    for &count in face_counts {
        let count = count as usize;
        let Some(face) = face_connects.get(cursor..cursor + count) else {
            break;
        };
        out.push('f');
        for idx in face {
            let _ = write!(out, " {}", idx + 1);
        }
        out.push('\n');
        cursor += count;
    }
    out
}

/// Registry for loaded mesh assets.
///
/// Caches assets so a scene referencing the same file twice parses it once.
#[derive(Debug, Default)]
pub struct MeshAssetRegistry {
    assets: HashMap<String, Arc<MeshAsset>>,
}

impl MeshAssetRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get an asset, parsing it with `load` on first use.
    pub fn get_or_load<F>(&mut self, asset_id: &str, load: F) -> Result<Arc<MeshAsset>, String>
    where
        F: FnOnce() -> Result<String, String>,
    {
        if let Some(asset) = self.assets.get(asset_id) {
            return Ok(Arc::clone(asset));
        }
        let content = load()?;
        let asset = Arc::new(MeshAsset::from_obj(asset_id.to_string(), &content)?);
        self.assets.insert(asset_id.to_string(), Arc::clone(&asset));
        Ok(asset)
    }

    /// Get a mesh asset by ID.
    pub fn get(&self, asset_id: &str) -> Option<Arc<MeshAsset>> {
        self.assets.get(asset_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Unit cube geometry (side length 1, centred at origin) with quad faces.
pub fn cube_geometry() -> MeshAsset {
    let positions = vec![
        DVec3::new(-0.5, -0.5, 0.5),
        DVec3::new(0.5, -0.5, 0.5),
        DVec3::new(-0.5, 0.5, 0.5),
        DVec3::new(0.5, 0.5, 0.5),
        DVec3::new(-0.5, 0.5, -0.5),
        DVec3::new(0.5, 0.5, -0.5),
        DVec3::new(-0.5, -0.5, -0.5),
        DVec3::new(0.5, -0.5, -0.5),
    ];
    let face_counts = vec![4; 6];
    let face_connects = vec![
        0, 1, 3, 2, // Front
        2, 3, 5, 4, // Top
        4, 5, 7, 6, // Back
        6, 7, 1, 0, // Bottom
        1, 7, 5, 3, // Right
        6, 0, 2, 4, // Left
    ];
    MeshAsset::new("cube".to_string(), positions, face_counts, face_connects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obj_parsing_keeps_vertex_order() {
        let obj_content = r#"
            v 0 0 0
            v 1 0 0
            v 1 1 0
            v 0 1 0
            f 1 2 3 4
        "#;

        let asset = MeshAsset::from_obj("quad".to_string(), obj_content).unwrap();
        assert_eq!(asset.vertex_count(), 4);
        assert_eq!(asset.face_count(), 1);
        assert_eq!(asset.face_counts, vec![4]);
        assert_eq!(asset.face_connects, vec![0, 1, 2, 3]);
        assert_eq!(asset.positions[2], DVec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_obj_without_vertices_is_rejected() {
        assert!(MeshAsset::from_obj("empty".to_string(), "# nothing").is_err());
    }

    #[test]
    fn test_write_obj_is_one_based() {
        let text = write_obj(
            &[DVec3::ZERO, DVec3::X, DVec3::Y],
            &[3],
            &[0, 1, 2],
        );
        assert!(text.contains("v 1 0 0"));
        assert!(text.trim_end().ends_with("f 1 2 3"));
    }

    #[test]
    fn test_cube_geometry() {
        let cube = cube_geometry();
        assert_eq!(cube.vertex_count(), 8);
        assert_eq!(cube.face_count(), 6);
        assert!(cube.face_connects.iter().all(|&i| (i as usize) < cube.vertex_count()));
    }

    #[test]
    fn test_registry_parses_once() {
        let mut registry = MeshAssetRegistry::new();
        let mut loads = 0;
        for _ in 0..2 {
            registry
                .get_or_load("tri", || {
                    loads += 1;
                    Ok("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3".to_string())
                })
                .unwrap();
        }
        assert_eq!(loads, 1);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("tri").is_some());
    }
}

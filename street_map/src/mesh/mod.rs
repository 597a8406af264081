//! Triangulated geometry for the rendering collaborator: plain vertex and index buffers, ready
//! for GPU upload.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use self::buildings::BuildingMesh;
pub use self::roads::{JoinMesh, RoadMesh};

pub mod buildings;
pub mod roads;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshVertex {
    pub position: [f64; 3],
    pub normal: [f64; 3],
    pub uv: [f64; 2],
}

/// Groups of three indices make up the triangles.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn num_triangles(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Accumulates a Mesh, deduplicating vertices that share a position and normal, so geometry
/// generated from coincident points doesn't seam. Vertices with distinct normals (building
/// walls) deliberately stay separate.
pub struct MeshBuilder {
    mesh: Mesh,
    lookup: HashMap<([i64; 3], [i64; 3]), u32>,
}

impl MeshBuilder {
    pub fn new() -> MeshBuilder {
        MeshBuilder {
            mesh: Mesh::default(),
            lookup: HashMap::new(),
        }
    }

    pub fn vertex(&mut self, position: [f64; 3], normal: [f64; 3], uv: [f64; 2]) -> u32 {
        let key = (quantize(position), quantize(normal));
        if let Some(idx) = self.lookup.get(&key) {
            return *idx;
        }
        let idx = self.mesh.vertices.len() as u32;
        self.mesh.vertices.push(MeshVertex {
            position,
            normal,
            uv,
        });
        self.lookup.insert(key, idx);
        idx
    }

    /// Drops triangles that collapsed during vertex dedup.
    pub fn triangle(&mut self, a: u32, b: u32, c: u32) {
        if a == b || b == c || a == c {
            return;
        }
        self.mesh.indices.extend([a, b, c]);
    }

    pub fn build(self) -> Mesh {
        self.mesh
    }
}

impl Default for MeshBuilder {
    fn default() -> Self {
        MeshBuilder::new()
    }
}

// 0.1mm, matching the precision of trimmed world-space coordinates
fn quantize(v: [f64; 3]) -> [i64; 3] {
    [
        (v[0] * 10_000.0).round() as i64,
        (v[1] * 10_000.0).round() as i64,
        (v[2] * 10_000.0).round() as i64,
    ]
}

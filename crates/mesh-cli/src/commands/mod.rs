//! Subcommand implementations.

pub mod deform;
pub mod quality;
pub mod remesh;
pub mod smooth;
pub mod subdivide;

use serde::Serialize;

/// Vertex and face counts before and after an operation.
#[derive(Debug, Serialize)]
pub struct MeshCounts {
    pub vertices: usize,
    pub faces: usize,
}

impl From<&mesh_morph::Mesh> for MeshCounts {
    fn from(mesh: &mesh_morph::Mesh) -> Self {
        Self {
            vertices: mesh.vertex_count(),
            faces: mesh.face_count(),
        }
    }
}

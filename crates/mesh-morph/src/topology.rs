//! Index-based mesh connectivity.
//!
//! [`MeshTopology`] is derived from a face list once per call (or once per
//! pass for engines that change connectivity) and answers the neighbourhood
//! queries the engines need: vertex neighbours, edge to face incidence,
//! opposite vertices of triangle edges, and boundary flags.
//!
//! Edges are stored as canonical [`EdgeKey`]s and listed in ascending key
//! order so that every traversal is deterministic.

use hashbrown::HashMap;

use crate::types::{Face, Mesh};

/// Canonical undirected edge `(min, max)`.
pub type EdgeKey = (u32, u32);

/// Canonical key for the edge between `a` and `b`.
#[inline]
pub fn edge_key(a: u32, b: u32) -> EdgeKey {
    if a < b { (a, b) } else { (b, a) }
}

#[derive(Debug, Clone, Default)]
struct EdgeRecord {
    /// Indices of faces using this edge.
    faces: Vec<u32>,
    /// For each incident triangle, the vertex not on the edge.
    opposite: Vec<u32>,
}

/// Connectivity of a mesh.
#[derive(Debug, Clone)]
pub struct MeshTopology {
    edges: Vec<EdgeKey>,
    edge_records: HashMap<EdgeKey, EdgeRecord>,
    neighbors: Vec<Vec<u32>>,
    vertex_faces: Vec<Vec<u32>>,
    boundary: Vec<bool>,
}

impl MeshTopology {
    /// Build topology for a mesh.
    pub fn build(mesh: &Mesh) -> Self {
        Self::from_faces(&mesh.faces, mesh.vertex_count())
    }

    /// Build topology from faces over `vertex_count` vertices.
    ///
    /// Faces must reference indices below `vertex_count`. Edges joining a
    /// vertex to itself are ignored.
    pub fn from_faces(faces: &[Face], vertex_count: usize) -> Self {
        let mut edge_records: HashMap<EdgeKey, EdgeRecord> = HashMap::new();
        let mut vertex_faces: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];

        for (fi, face) in faces.iter().enumerate() {
            let fi = fi as u32;
            let idx = face.indices();

            for &v in idx {
                let incident = &mut vertex_faces[v as usize];
                if incident.last() != Some(&fi) {
                    incident.push(fi);
                }
            }

            for (i, (a, b)) in face.edges().enumerate() {
                if a == b {
                    continue;
                }
                let record = edge_records.entry(edge_key(a, b)).or_default();
                record.faces.push(fi);
                if let Face::Triangle(t) = face {
                    record.opposite.push(t[(i + 2) % 3]);
                }
            }
        }

        let mut edges: Vec<EdgeKey> = edge_records.keys().copied().collect();
        edges.sort_unstable();

        let mut neighbors: Vec<Vec<u32>> = vec![Vec::new(); vertex_count];
        for &(a, b) in &edges {
            neighbors[a as usize].push(b);
            neighbors[b as usize].push(a);
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        for list in &mut vertex_faces {
            list.dedup();
        }

        let mut boundary: Vec<bool> = vertex_faces.iter().map(|f| f.len() < 2).collect();
        for (&(a, b), record) in &edge_records {
            if record.faces.len() == 1 {
                boundary[a as usize] = true;
                boundary[b as usize] = true;
            }
        }

        Self {
            edges,
            edge_records,
            neighbors,
            vertex_faces,
            boundary,
        }
    }

    /// Number of vertices covered by this topology.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Unique edges in ascending key order.
    #[inline]
    pub fn edges(&self) -> &[EdgeKey] {
        &self.edges
    }

    /// Faces incident to an edge (empty if the edge does not exist).
    pub fn edge_faces(&self, a: u32, b: u32) -> &[u32] {
        self.edge_records
            .get(&edge_key(a, b))
            .map(|r| r.faces.as_slice())
            .unwrap_or(&[])
    }

    /// Vertices opposite the edge in each incident triangle.
    pub fn opposite_vertices(&self, a: u32, b: u32) -> &[u32] {
        self.edge_records
            .get(&edge_key(a, b))
            .map(|r| r.opposite.as_slice())
            .unwrap_or(&[])
    }

    /// The vertex opposite edge `(a, b)` in the triangle that does not
    /// contain `exclude`.
    ///
    /// Returns None unless the edge is shared by exactly two triangles, one
    /// of which has `exclude` as its opposite vertex.
    pub fn opposite_across(&self, a: u32, b: u32, exclude: u32) -> Option<u32> {
        match self.opposite_vertices(a, b) {
            &[x, y] if self.edge_faces(a, b).len() == 2 => {
                if x == exclude && y != exclude {
                    Some(y)
                } else if y == exclude && x != exclude {
                    Some(x)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Sorted unique neighbours of a vertex.
    #[inline]
    pub fn neighbors(&self, v: u32) -> &[u32] {
        &self.neighbors[v as usize]
    }

    /// Faces using a vertex.
    #[inline]
    pub fn vertex_faces(&self, v: u32) -> &[u32] {
        &self.vertex_faces[v as usize]
    }

    /// Number of distinct neighbours.
    #[inline]
    pub fn valence(&self, v: u32) -> usize {
        self.neighbors[v as usize].len()
    }

    /// True if the vertex lies on an edge with a single incident face or has
    /// fewer than two incident faces.
    #[inline]
    pub fn is_boundary_vertex(&self, v: u32) -> bool {
        self.boundary[v as usize]
    }

    /// Per-vertex boundary flags.
    #[inline]
    pub fn boundary_flags(&self) -> &[bool] {
        &self.boundary
    }

    /// Per-vertex flags for vertices with fewer than two incident faces.
    ///
    /// Narrower than [`boundary_flags`](Self::boundary_flags): a vertex on an
    /// open edge that still touches two or more faces is not flagged.
    pub fn sparse_vertex_flags(&self) -> Vec<bool> {
        self.vertex_faces.iter().map(|f| f.len() < 2).collect()
    }

    /// All boundary vertices in ascending order.
    pub fn boundary_vertices(&self) -> Vec<u32> {
        self.boundary
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b)
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// True if the edge has exactly one incident face.
    #[inline]
    pub fn is_boundary_edge(&self, a: u32, b: u32) -> bool {
        self.edge_faces(a, b).len() == 1
    }

    /// Edges with exactly one incident face, ascending.
    pub fn boundary_edges(&self) -> Vec<EdgeKey> {
        self.edges
            .iter()
            .copied()
            .filter(|&(a, b)| self.is_boundary_edge(a, b))
            .collect()
    }

    /// Edges shared by more than two faces, ascending.
    pub fn non_manifold_edges(&self) -> Vec<EdgeKey> {
        self.edges
            .iter()
            .copied()
            .filter(|&(a, b)| self.edge_faces(a, b).len() > 2)
            .collect()
    }

    /// True if no edge is shared by more than two faces.
    pub fn is_manifold(&self) -> bool {
        self.edge_records.values().all(|r| r.faces.len() <= 2)
    }

    /// True if every edge is shared by exactly two faces.
    pub fn is_watertight(&self) -> bool {
        !self.edges.is_empty() && self.edge_records.values().all(|r| r.faces.len() == 2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    fn tetrahedron() -> Mesh {
        Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, 0.5, 1.0),
            ],
            &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        )
    }

    fn single_triangle() -> Mesh {
        Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        )
    }

    #[test]
    fn test_edge_key_is_canonical() {
        assert_eq!(edge_key(5, 2), (2, 5));
        assert_eq!(edge_key(2, 5), (2, 5));
    }

    #[test]
    fn test_tetrahedron_is_closed() {
        let topo = MeshTopology::build(&tetrahedron());
        assert_eq!(topo.edges().len(), 6);
        assert!(topo.is_manifold());
        assert!(topo.is_watertight());
        assert!(topo.boundary_edges().is_empty());
        assert!(topo.boundary_vertices().is_empty());
        for v in 0..4 {
            assert_eq!(topo.valence(v), 3);
            assert_eq!(topo.vertex_faces(v).len(), 3);
        }
    }

    #[test]
    fn test_edges_sorted_ascending() {
        let topo = MeshTopology::build(&tetrahedron());
        let edges = topo.edges();
        assert!(edges.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_single_triangle_all_boundary() {
        let topo = MeshTopology::build(&single_triangle());
        assert_eq!(topo.boundary_edges().len(), 3);
        assert_eq!(topo.boundary_vertices(), vec![0, 1, 2]);
        assert!(!topo.is_watertight());
        assert!(topo.is_manifold());
    }

    #[test]
    fn test_sparse_flags_narrower_than_boundary() {
        // Two triangles sharing edge (1, 2): every vertex is on an open edge,
        // but only 0 and 3 touch a single face.
        let mesh = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [2, 1, 3]],
        );
        let topo = MeshTopology::build(&mesh);
        assert_eq!(topo.boundary_flags(), &[true, true, true, true]);
        assert_eq!(topo.sparse_vertex_flags(), vec![true, false, false, true]);
    }

    #[test]
    fn test_opposite_vertices() {
        let topo = MeshTopology::build(&tetrahedron());
        let mut opp = topo.opposite_vertices(0, 1).to_vec();
        opp.sort_unstable();
        assert_eq!(opp, vec![2, 3]);
        assert_eq!(topo.opposite_across(0, 1, 2), Some(3));
        assert_eq!(topo.opposite_across(0, 1, 3), Some(2));
        assert_eq!(topo.opposite_across(0, 1, 0), None);
    }

    #[test]
    fn test_opposite_across_boundary_is_none() {
        let topo = MeshTopology::build(&single_triangle());
        assert_eq!(topo.opposite_across(0, 1, 2), None);
    }

    #[test]
    fn test_quad_edges_exclude_diagonal() {
        let mesh = Mesh::from_faces(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![Face::Quad([0, 1, 2, 3])],
        );
        let topo = MeshTopology::build(&mesh);
        assert_eq!(topo.edges(), &[(0, 1), (0, 3), (1, 2), (2, 3)]);
        assert_eq!(topo.neighbors(0), &[1, 3]);
        assert!(topo.opposite_vertices(0, 1).is_empty());
    }

    #[test]
    fn test_unreferenced_vertex_is_boundary() {
        let mut mesh = tetrahedron();
        mesh.vertices.push(crate::types::Vertex::from_coords(9.0, 9.0, 9.0));
        let topo = MeshTopology::build(&mesh);
        assert!(topo.is_boundary_vertex(4));
        assert!(topo.neighbors(4).is_empty());
    }

    #[test]
    fn test_non_manifold_edge_detected() {
        let mesh = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.0),
                Point3::new(0.5, -1.0, 0.0),
                Point3::new(0.5, 0.0, 1.0),
            ],
            &[[0, 1, 2], [1, 0, 3], [0, 1, 4]],
        );
        let topo = MeshTopology::build(&mesh);
        assert!(!topo.is_manifold());
        assert_eq!(topo.non_manifold_edges(), vec![(0, 1)]);
    }
}

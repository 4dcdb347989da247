//! Core mesh data types.

use nalgebra::{Point3, Vector3};

/// A vertex in the mesh with an optional computed normal.
///
/// The library is unit-agnostic; tolerances are interpreted in the same units
/// as the coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,

    /// Unit normal vector, computed from adjacent faces.
    pub normal: Option<Vector3<f64>>,
}

impl Vertex {
    /// Create a new vertex with only position set.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
        }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A mesh face: either a triangle or a quad, counter-clockwise winding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    Triangle([u32; 3]),
    Quad([u32; 4]),
}

impl Face {
    /// Vertex indices of the face in winding order.
    #[inline]
    pub fn indices(&self) -> &[u32] {
        match self {
            Face::Triangle(t) => t,
            Face::Quad(q) => q,
        }
    }

    /// Mutable access to the vertex indices.
    #[inline]
    pub fn indices_mut(&mut self) -> &mut [u32] {
        match self {
            Face::Triangle(t) => t,
            Face::Quad(q) => q,
        }
    }

    #[inline]
    pub fn is_triangle(&self) -> bool {
        matches!(self, Face::Triangle(_))
    }

    /// The triangle indices, if this face is a triangle.
    #[inline]
    pub fn as_triangle(&self) -> Option<[u32; 3]> {
        match *self {
            Face::Triangle(t) => Some(t),
            Face::Quad(_) => None,
        }
    }

    /// Fan triangulation of the face.
    ///
    /// A triangle yields itself; a quad `(a, b, c, d)` yields `(a, b, c)` and
    /// `(a, c, d)`.
    pub fn fan_triangles(&self) -> impl Iterator<Item = [u32; 3]> {
        let pair = match *self {
            Face::Triangle(t) => [Some(t), None],
            Face::Quad([a, b, c, d]) => [Some([a, b, c]), Some([a, c, d])],
        };
        pair.into_iter().flatten()
    }

    /// Perimeter edges as directed `(from, to)` pairs in winding order.
    pub fn edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let idx = self.indices();
        let n = idx.len();
        (0..n).map(move |i| (idx[i], idx[(i + 1) % n]))
    }

    /// True if any two corners share a vertex index.
    pub fn has_repeated_index(&self) -> bool {
        let idx = self.indices();
        (0..idx.len()).any(|i| idx[i + 1..].contains(&idx[i]))
    }
}

impl From<[u32; 3]> for Face {
    fn from(t: [u32; 3]) -> Self {
        Face::Triangle(t)
    }
}

impl From<[u32; 4]> for Face {
    fn from(q: [u32; 4]) -> Self {
        Face::Quad(q)
    }
}

/// A polygon mesh with indexed vertices and triangle or quad faces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Faces as indices into the vertex array.
    pub faces: Vec<Face>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
        }
    }

    /// Build a triangle mesh from positions and index triples.
    pub fn from_triangles(positions: &[Point3<f64>], triangles: &[[u32; 3]]) -> Self {
        Self {
            vertices: positions.iter().map(|&p| Vertex::new(p)).collect(),
            faces: triangles.iter().map(|&t| Face::Triangle(t)).collect(),
        }
    }

    /// Build a mesh from positions and arbitrary faces.
    pub fn from_faces(positions: &[Point3<f64>], faces: Vec<Face>) -> Self {
        Self {
            vertices: positions.iter().map(|&p| Vertex::new(p)).collect(),
            faces,
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces, triangles and quads alike.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Number of faces that are triangles.
    pub fn triangle_count(&self) -> usize {
        self.faces.iter().filter(|f| f.is_triangle()).count()
    }

    /// True when every face is a triangle.
    #[inline]
    pub fn is_triangulated(&self) -> bool {
        self.face_count() == self.triangle_count()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Vertex positions in index order.
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh has no vertices.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        point_bounds(self.vertices.iter().map(|v| &v.position))
    }

    /// Volume of the axis-aligned bounding box, 0 for an empty mesh.
    pub fn bounding_box_volume(&self) -> f64 {
        self.bounds()
            .map(|(min, max)| {
                let d = max - min;
                d.x * d.y * d.z
            })
            .unwrap_or(0.0)
    }

    /// Length of the bounding box diagonal, 0 for an empty mesh.
    pub fn bounding_box_diagonal(&self) -> f64 {
        self.bounds()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0)
    }

    /// Iterate over fan triangles of every face with concrete positions.
    ///
    /// Faces must reference valid vertex indices.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces
            .iter()
            .flat_map(|f| f.fan_triangles())
            .map(|t| self.triangle_at(t))
    }

    /// Triangle with positions for an index triple.
    #[inline]
    pub fn triangle_at(&self, [i0, i1, i2]: [u32; 3]) -> Triangle {
        Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        }
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Sum of signed tetrahedra formed by each (fan) triangle and the origin.
    /// Positive for a closed mesh with outward winding; not meaningful for
    /// open meshes.
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|t| t.v0.coords.dot(&t.v1.coords.cross(&t.v2.coords)))
            .sum::<f64>()
            / 6.0
    }

    /// Total surface area over all faces.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }
}

/// Axis-aligned bounds of a set of points, None when empty.
pub fn point_bounds<'a, I>(points: I) -> Option<(Point3<f64>, Point3<f64>)>
where
    I: IntoIterator<Item = &'a Point3<f64>>,
{
    let mut iter = points.into_iter();
    let first = *iter.next()?;
    let (mut min, mut max) = (first, first);
    for p in iter {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        min.z = min.z.min(p.z);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
        max.z = max.z.max(p.z);
    }
    Some((min, max))
}

/// A triangle with concrete vertex positions.
///
/// Winding is counter-clockwise when viewed from the front.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Unnormalized face normal (length = 2 × area).
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit face normal, None for degenerate triangles.
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len_sq = n.norm_squared();
        if len_sq > f64::EPSILON {
            Some(n / len_sq.sqrt())
        } else {
            None
        }
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }

    /// Edge lengths `[|v1-v0|, |v2-v1|, |v0-v2|]`.
    #[inline]
    pub fn edge_lengths(&self) -> [f64; 3] {
        [
            (self.v1 - self.v0).norm(),
            (self.v2 - self.v1).norm(),
            (self.v0 - self.v2).norm(),
        ]
    }

    #[inline]
    pub fn min_edge_length(&self) -> f64 {
        let [a, b, c] = self.edge_lengths();
        a.min(b).min(c)
    }

    #[inline]
    pub fn max_edge_length(&self) -> f64 {
        let [a, b, c] = self.edge_lengths();
        a.max(b).max(c)
    }

    /// Interior angles at `v0`, `v1`, `v2` in radians.
    ///
    /// Uses `atan2(|a × b|, a · b)`, which stays accurate for needle
    /// triangles. A corner with a zero-length adjacent edge gets angle 0.
    pub fn interior_angles(&self) -> [f64; 3] {
        [
            vector_angle(self.v1 - self.v0, self.v2 - self.v0),
            vector_angle(self.v2 - self.v1, self.v0 - self.v1),
            vector_angle(self.v0 - self.v2, self.v1 - self.v2),
        ]
    }
}

/// Unsigned angle between two vectors, 0 if either is zero.
pub fn vector_angle(a: Vector3<f64>, b: Vector3<f64>) -> f64 {
    if a.norm_squared() == 0.0 || b.norm_squared() == 0.0 {
        return 0.0;
    }
    a.cross(&b).norm().atan2(a.dot(&b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
    }

    fn make_unit_cube_quads() -> Mesh {
        let positions = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(0.0, 1.0, 1.0),
        ];
        let faces = vec![
            Face::Quad([0, 3, 2, 1]),
            Face::Quad([4, 5, 6, 7]),
            Face::Quad([0, 1, 5, 4]),
            Face::Quad([3, 7, 6, 2]),
            Face::Quad([0, 4, 7, 3]),
            Face::Quad([1, 2, 6, 5]),
        ];
        Mesh::from_faces(&positions, faces)
    }

    #[test]
    fn test_face_fan_triangles() {
        let tri = Face::Triangle([0, 1, 2]);
        assert_eq!(tri.fan_triangles().collect::<Vec<_>>(), vec![[0, 1, 2]]);

        let quad = Face::Quad([0, 1, 2, 3]);
        assert_eq!(
            quad.fan_triangles().collect::<Vec<_>>(),
            vec![[0, 1, 2], [0, 2, 3]]
        );
    }

    #[test]
    fn test_face_edges_wrap_around() {
        let quad = Face::Quad([4, 5, 6, 7]);
        let edges: Vec<_> = quad.edges().collect();
        assert_eq!(edges, vec![(4, 5), (5, 6), (6, 7), (7, 4)]);
    }

    #[test]
    fn test_face_repeated_index() {
        assert!(Face::Triangle([1, 2, 1]).has_repeated_index());
        assert!(!Face::Quad([1, 2, 3, 4]).has_repeated_index());
    }

    #[test]
    fn test_triangle_count_and_triangulated() {
        let mut mesh = make_unit_cube_quads();
        assert_eq!(mesh.face_count(), 6);
        assert_eq!(mesh.triangle_count(), 0);
        assert!(!mesh.is_triangulated());

        mesh.faces = mesh
            .faces
            .iter()
            .flat_map(|f| f.fan_triangles())
            .map(Face::Triangle)
            .collect();
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.is_triangulated());
    }

    #[test]
    fn test_quad_cube_volume_and_area() {
        let mesh = make_unit_cube_quads();
        assert!(approx_eq(mesh.signed_volume(), 1.0));
        assert!(approx_eq(mesh.surface_area(), 6.0));
        assert!(approx_eq(mesh.bounding_box_volume(), 1.0));
        assert!(approx_eq(mesh.bounding_box_diagonal(), 3.0_f64.sqrt()));
    }

    #[test]
    fn test_empty_mesh_bounds() {
        let mesh = Mesh::new();
        assert!(mesh.bounds().is_none());
        assert_eq!(mesh.bounding_box_volume(), 0.0);
        assert_eq!(mesh.bounding_box_diagonal(), 0.0);
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_triangle_interior_angles_sum_to_pi() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        );
        let angles = tri.interior_angles();
        assert!(approx_eq(angles[0], std::f64::consts::FRAC_PI_2));
        assert!(approx_eq(angles.iter().sum::<f64>(), std::f64::consts::PI));
    }

    #[test]
    fn test_zero_length_edge_gives_zero_angle() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        );
        let angles = tri.interior_angles();
        assert_eq!(angles[0], 0.0);
        assert_eq!(angles[1], 0.0);
    }

    #[test]
    fn test_degenerate_triangle_normal() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(tri.normal().is_none());
    }

    #[test]
    fn test_triangle_edge_lengths() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(0.0, 4.0, 0.0),
        );
        let lengths = tri.edge_lengths();
        assert!(approx_eq(lengths[0], 3.0));
        assert!(approx_eq(lengths[1], 5.0));
        assert!(approx_eq(lengths[2], 4.0));
        assert!(approx_eq(tri.min_edge_length(), 3.0));
        assert!(approx_eq(tri.max_edge_length(), 5.0));
    }
}

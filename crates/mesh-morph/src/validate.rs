//! Mesh validity checks.
//!
//! Every engine validates its input before doing any work and validates its
//! output before returning it. A mesh is valid when it is non-empty, every
//! coordinate is finite, every face index is in range, and its bounding box
//! has a non-zero diagonal.

use nalgebra::Point3;
use tracing::{debug, warn};

use crate::Mesh;
use crate::error::{MorphError, MorphResult};
use crate::tolerance::Tolerance;
use crate::topology::MeshTopology;

/// Summary of a mesh's data and connectivity health.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "config", derive(serde::Serialize))]
pub struct ValidityReport {
    pub vertex_count: usize,
    pub face_count: usize,
    pub triangle_count: usize,

    /// Number of NaN or infinite coordinate components.
    pub non_finite_count: usize,

    /// Number of face corners referencing a missing vertex.
    pub invalid_index_count: usize,

    /// Bounding box as (min_corner, max_corner).
    pub bounds: Option<(Point3<f64>, Point3<f64>)>,

    /// Bounding box diagonal, 0 when there are no vertices.
    pub bounds_diagonal: f64,

    /// True if the diagonal is finite and above the zero threshold.
    pub has_extent: bool,

    /// Connectivity, only computed when all indices are in range.
    pub boundary_edge_count: usize,
    pub non_manifold_edge_count: usize,
    pub is_manifold: bool,
    pub is_watertight: bool,
}

impl ValidityReport {
    /// True if the mesh satisfies the validity predicate.
    pub fn is_valid(&self) -> bool {
        self.vertex_count > 0
            && self.face_count > 0
            && self.non_finite_count == 0
            && self.invalid_index_count == 0
            && self.has_extent
    }
}

impl std::fmt::Display for ValidityReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Validity Report:")?;
        writeln!(
            f,
            "  Vertices: {}  Faces: {} ({} triangles)",
            self.vertex_count, self.face_count, self.triangle_count
        )?;
        if let Some((min, max)) = &self.bounds {
            writeln!(
                f,
                "  Bounds: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
                min.x, min.y, min.z, max.x, max.y, max.z
            )?;
        }
        writeln!(f, "  Diagonal: {:.6}", self.bounds_diagonal)?;
        writeln!(f, "  Non-finite coordinates: {}", self.non_finite_count)?;
        writeln!(f, "  Invalid indices: {}", self.invalid_index_count)?;
        writeln!(
            f,
            "  Watertight: {} (boundary edges: {})",
            if self.is_watertight { "yes" } else { "no" },
            self.boundary_edge_count
        )?;
        writeln!(
            f,
            "  Manifold: {} (non-manifold edges: {})",
            if self.is_manifold { "yes" } else { "NO" },
            self.non_manifold_edge_count
        )?;
        write!(f, "  Valid: {}", if self.is_valid() { "yes" } else { "NO" })
    }
}

/// Collect a validity report without failing.
pub fn check_validity(mesh: &Mesh, tolerance: &Tolerance) -> ValidityReport {
    let non_finite_count = mesh
        .vertices
        .iter()
        .flat_map(|v| v.position.iter())
        .filter(|c| !c.is_finite())
        .count();

    let vertex_count = mesh.vertex_count();
    let invalid_index_count = mesh
        .faces
        .iter()
        .flat_map(|f| f.indices().iter())
        .filter(|&&i| i as usize >= vertex_count)
        .count();

    let bounds = mesh.bounds();
    let bounds_diagonal = bounds.map(|(min, max)| (max - min).norm()).unwrap_or(0.0);
    let has_extent = bounds_diagonal.is_finite() && bounds_diagonal > tolerance.zero_threshold();

    let (boundary_edge_count, non_manifold_edge_count, is_manifold, is_watertight) =
        if invalid_index_count == 0 {
            let topo = MeshTopology::build(mesh);
            (
                topo.boundary_edges().len(),
                topo.non_manifold_edges().len(),
                topo.is_manifold(),
                topo.is_watertight(),
            )
        } else {
            (0, 0, false, false)
        };

    let report = ValidityReport {
        vertex_count,
        face_count: mesh.face_count(),
        triangle_count: mesh.triangle_count(),
        non_finite_count,
        invalid_index_count,
        bounds,
        bounds_diagonal,
        has_extent,
        boundary_edge_count,
        non_manifold_edge_count,
        is_manifold,
        is_watertight,
    };

    if !report.is_valid() {
        warn!(
            non_finite = non_finite_count,
            invalid_indices = invalid_index_count,
            diagonal = bounds_diagonal,
            "Mesh failed validity check"
        );
    }
    report
}

/// Check the validity predicate, failing on the first violation.
///
/// The extent check only asks for a bounding-box diagonal above
/// `tolerance.zero_threshold()`, not for a non-zero volume: planar meshes
/// and even collinear point sets pass.
///
/// # Errors
///
/// - [`MorphError::EmptyMesh`] if the mesh has no vertices or no faces
/// - [`MorphError::InvalidCoordinate`] for a NaN or infinite coordinate
/// - [`MorphError::InvalidVertexIndex`] for an out-of-range face index
/// - [`MorphError::DegenerateBounds`] if the bounding-box diagonal is zero
///
/// # Example
///
/// ```
/// use mesh_morph::{Mesh, Tolerance, validate::validate_mesh};
/// use nalgebra::Point3;
///
/// let mesh = Mesh::from_triangles(
///     &[
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     &[[0, 1, 2]],
/// );
/// assert!(validate_mesh(&mesh, &Tolerance::default()).is_ok());
/// assert!(validate_mesh(&Mesh::new(), &Tolerance::default()).is_err());
/// ```
pub fn validate_mesh(mesh: &Mesh, tolerance: &Tolerance) -> MorphResult<()> {
    if mesh.vertices.is_empty() {
        return Err(MorphError::empty_mesh("mesh has no vertices"));
    }
    if mesh.faces.is_empty() {
        return Err(MorphError::empty_mesh("mesh has no faces"));
    }

    validate_points(mesh.vertices.iter().map(|v| &v.position))?;

    let vertex_count = mesh.vertex_count();
    for (face_idx, face) in mesh.faces.iter().enumerate() {
        for &vertex_idx in face.indices() {
            if vertex_idx as usize >= vertex_count {
                return Err(MorphError::invalid_vertex_index(
                    face_idx,
                    vertex_idx,
                    vertex_count,
                ));
            }
        }
    }

    check_extent(mesh.bounding_box_diagonal(), tolerance)?;

    debug!(
        vertices = vertex_count,
        faces = mesh.face_count(),
        "Mesh validity check passed"
    );
    Ok(())
}

/// Reject NaN or infinite coordinates.
pub fn validate_points<'a, I>(points: I) -> MorphResult<()>
where
    I: IntoIterator<Item = &'a Point3<f64>>,
{
    for (vertex_idx, p) in points.into_iter().enumerate() {
        for (name, value) in [("x", p.x), ("y", p.y), ("z", p.z)] {
            if !value.is_finite() {
                return Err(MorphError::invalid_coordinate(vertex_idx, name, value));
            }
        }
    }
    Ok(())
}

/// Reject a bounding box diagonal that is non-finite or numerically zero.
pub fn check_extent(diagonal: f64, tolerance: &Tolerance) -> MorphResult<()> {
    if !diagonal.is_finite() || diagonal <= tolerance.zero_threshold() {
        return Err(MorphError::DegenerateBounds { diagonal });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Face, Vertex};

    fn tetrahedron() -> Mesh {
        Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 0.866025, 0.0),
                Point3::new(0.5, 0.288675, 0.816497),
            ],
            &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
        )
    }

    #[test]
    fn test_valid_tetrahedron() {
        let tol = Tolerance::default();
        let mesh = tetrahedron();
        assert!(validate_mesh(&mesh, &tol).is_ok());

        let report = check_validity(&mesh, &tol);
        assert!(report.is_valid());
        assert!(report.is_watertight);
        assert!(report.is_manifold);
        assert_eq!(report.boundary_edge_count, 0);
    }

    #[test]
    fn test_empty_mesh_rejected() {
        let tol = Tolerance::default();
        let err = validate_mesh(&Mesh::new(), &tol).unwrap_err();
        assert!(matches!(err, MorphError::EmptyMesh { .. }));

        let mut no_faces = Mesh::new();
        no_faces.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        let err = validate_mesh(&no_faces, &tol).unwrap_err();
        assert!(matches!(err, MorphError::EmptyMesh { .. }));
    }

    #[test]
    fn test_nan_coordinate_rejected() {
        let mut mesh = tetrahedron();
        mesh.vertices[2].position.y = f64::NAN;
        let err = validate_mesh(&mesh, &Tolerance::default()).unwrap_err();
        match err {
            MorphError::InvalidCoordinate {
                vertex_index,
                coordinate,
                ..
            } => {
                assert_eq!(vertex_index, 2);
                assert_eq!(coordinate, "y");
            }
            other => panic!("Expected InvalidCoordinate, got {:?}", other),
        }

        let report = check_validity(&mesh, &Tolerance::default());
        assert_eq!(report.non_finite_count, 1);
        assert!(!report.is_valid());
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut mesh = tetrahedron();
        mesh.faces.push(Face::Triangle([0, 1, 10]));
        let err = validate_mesh(&mesh, &Tolerance::default()).unwrap_err();
        assert!(matches!(
            err,
            MorphError::InvalidVertexIndex {
                face_index: 4,
                vertex_index: 10,
                vertex_count: 4
            }
        ));

        let report = check_validity(&mesh, &Tolerance::default());
        assert_eq!(report.invalid_index_count, 1);
    }

    #[test]
    fn test_coincident_vertices_rejected() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let mesh = Mesh::from_triangles(&[p, p, p], &[[0, 1, 2]]);
        let err = validate_mesh(&mesh, &Tolerance::default()).unwrap_err();
        assert!(matches!(err, MorphError::DegenerateBounds { .. }));
    }

    #[test]
    fn test_planar_patch_is_valid() {
        let mesh = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        let report = check_validity(&mesh, &Tolerance::default());
        assert!(report.is_valid());
        assert!(!report.is_watertight);
        assert_eq!(report.boundary_edge_count, 3);
    }

    #[test]
    fn test_extent_check_ignores_volume() {
        let tol = Tolerance::default();
        let planar = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [0, 2, 3]],
        );
        assert!(validate_mesh(&planar, &tol).is_ok());

        // Zero area, but the diagonal is still non-zero.
        let collinear = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        assert!(validate_mesh(&collinear, &tol).is_ok());
    }

    #[test]
    fn test_report_display() {
        let report = check_validity(&tetrahedron(), &Tolerance::default());
        let text = format!("{}", report);
        assert!(text.contains("Vertices: 4"));
        assert!(text.contains("Valid: yes"));
    }
}

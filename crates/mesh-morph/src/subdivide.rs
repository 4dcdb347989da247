//! Triangle mesh subdivision.
//!
//! Each level splits every triangle into four by inserting one vertex per
//! edge. Two schemes are available:
//!
//! - [`SubdivisionScheme::Loop`]: approximating; original vertices are
//!   smoothed towards their neighbours and edge points use the 3/8-1/8
//!   stencil.
//! - [`SubdivisionScheme::Butterfly`]: interpolating; original vertices stay
//!   put and edge points use the eight-point butterfly stencil.
//!
//! Both schemes fall back to the edge midpoint where their stencil is
//! incomplete (boundary or non-manifold edges).

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use hashbrown::HashMap;
use nalgebra::Point3;
use tracing::{debug, info, trace, warn};

use crate::Mesh;
use crate::cleanup::{compute_vertex_normals, remove_unreferenced_vertices};
use crate::config::MorphConfig;
use crate::error::{MorphError, MorphResult};
use crate::quality::analyze_quality;
use crate::topology::{EdgeKey, MeshTopology, edge_key};
use crate::tracing_ext::{OperationTimer, log_mesh_stats, log_quality};
use crate::types::{Face, Vertex};
use crate::validate::validate_mesh;

/// Subdivision rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(rename_all = "snake_case"))]
pub enum SubdivisionScheme {
    /// Approximating Loop subdivision.
    #[default]
    Loop,
    /// Interpolating modified-butterfly subdivision.
    Butterfly,
}

impl SubdivisionScheme {
    pub fn name(&self) -> &'static str {
        match self {
            SubdivisionScheme::Loop => "loop",
            SubdivisionScheme::Butterfly => "butterfly",
        }
    }

    fn triangles_required(&self, non_triangle_faces: usize) -> MorphError {
        match self {
            SubdivisionScheme::Loop => MorphError::LoopRequiresTriangles { non_triangle_faces },
            SubdivisionScheme::Butterfly => {
                MorphError::ButterflyRequiresTriangles { non_triangle_faces }
            }
        }
    }
}

/// Parameters for [`subdivide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct SubdivideParams {
    pub scheme: SubdivisionScheme,
    /// Number of levels; each multiplies the face count by four.
    pub levels: u32,
}

impl Default for SubdivideParams {
    fn default() -> Self {
        Self {
            scheme: SubdivisionScheme::Loop,
            levels: 1,
        }
    }
}

impl SubdivideParams {
    pub fn new(scheme: SubdivisionScheme, levels: u32) -> Self {
        Self { scheme, levels }
    }

    /// Loop subdivision with the given number of levels.
    pub fn loop_levels(levels: u32) -> Self {
        Self::new(SubdivisionScheme::Loop, levels)
    }

    /// Butterfly subdivision with the given number of levels.
    pub fn butterfly(levels: u32) -> Self {
        Self::new(SubdivisionScheme::Butterfly, levels)
    }
}

/// Statistics describing the subdivided mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct SubdivisionMetrics {
    pub original_faces: usize,
    pub new_faces: usize,
    pub levels_performed: u32,
    pub min_edge_length: f64,
    pub max_edge_length: f64,
    pub mean_edge_length: f64,
    pub mean_aspect_ratio: f64,
    /// Smallest interior angle of the output, radians.
    pub min_angle: f64,
}

impl std::fmt::Display for SubdivisionMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} faces in {} level(s), edges {:.4}..{:.4} (mean {:.4}), mean aspect {:.3}, min angle {:.2}°",
            self.original_faces,
            self.new_faces,
            self.levels_performed,
            self.min_edge_length,
            self.max_edge_length,
            self.mean_edge_length,
            self.mean_aspect_ratio,
            self.min_angle.to_degrees()
        )
    }
}

/// Result of [`subdivide`].
#[derive(Debug, Clone)]
pub struct SubdivideResult {
    pub mesh: Mesh,
    pub metrics: SubdivisionMetrics,
}

/// Subdivide a triangle mesh.
///
/// The input is not modified. After every level the output is compacted,
/// checked for validity and measured; a level whose triangles violate the
/// configured quality thresholds aborts the call.
///
/// # Errors
///
/// - [`MorphError::SubdivisionLevelExceeded`] if `levels` is 0 or above
///   `config.subdivision.max_levels`
/// - [`MorphError::LoopRequiresTriangles`] /
///   [`MorphError::ButterflyRequiresTriangles`] if any face is not a triangle
/// - validity errors for an invalid input mesh
/// - [`MorphError::SubdivisionFailed`] if a level produces an invalid or
///   poor-quality mesh
///
/// # Example
///
/// ```
/// use mesh_morph::{Mesh, MorphConfig};
/// use mesh_morph::subdivide::{SubdivideParams, subdivide};
/// use nalgebra::Point3;
///
/// let mesh = Mesh::from_triangles(
///     &[
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.5, 1.0, 0.0),
///     ],
///     &[[0, 1, 2]],
/// );
/// let result = subdivide(&mesh, &SubdivideParams::default(), &MorphConfig::default()).unwrap();
/// assert_eq!(result.mesh.face_count(), 4);
/// ```
pub fn subdivide(
    mesh: &Mesh,
    params: &SubdivideParams,
    config: &MorphConfig,
) -> MorphResult<SubdivideResult> {
    config.validate()?;
    let max = config.subdivision.max_levels;
    if params.levels == 0 || params.levels > max {
        warn!(requested = params.levels, max, "Rejected subdivision level count");
        return Err(MorphError::SubdivisionLevelExceeded {
            requested: params.levels,
            max,
        });
    }
    let non_triangle_faces = mesh.face_count() - mesh.triangle_count();
    if non_triangle_faces > 0 {
        warn!(
            scheme = params.scheme.name(),
            non_triangle_faces, "Subdivision requires a triangulated mesh"
        );
        return Err(params.scheme.triangles_required(non_triangle_faces));
    }
    validate_mesh(mesh, &config.tolerance)?;

    let _timer = OperationTimer::with_context("subdivide", mesh.face_count(), mesh.vertex_count());

    let mut current = mesh.clone();
    let mut quality = None;
    for level in 1..=params.levels {
        let mut next = subdivide_once(&current, params.scheme);
        compute_vertex_normals(&mut next);
        remove_unreferenced_vertices(&mut next);

        validate_mesh(&next, &config.tolerance)
            .map_err(|e| MorphError::subdivision_failed(level, e.to_string()))?;

        let metrics = analyze_quality(&next, &config.tolerance);
        log_quality(&metrics, "subdivide");
        if let Some(violation) = metrics.violation(&config.quality) {
            warn!(level, %violation, "Subdivision level failed quality check");
            return Err(MorphError::subdivision_failed(level, violation));
        }

        debug!(
            level,
            vertices = next.vertex_count(),
            faces = next.face_count(),
            "Subdivision level complete"
        );
        current = next;
        quality = Some(metrics);
    }

    let quality = quality.unwrap_or_else(|| analyze_quality(&current, &config.tolerance));
    let edges = quality.edge_stats();
    let metrics = SubdivisionMetrics {
        original_faces: mesh.face_count(),
        new_faces: current.face_count(),
        levels_performed: params.levels,
        min_edge_length: edges.min,
        max_edge_length: edges.max,
        mean_edge_length: edges.mean,
        mean_aspect_ratio: quality.mean_aspect_ratio(),
        min_angle: quality.min_angle(),
    };
    log_mesh_stats(&current, "subdivide output");
    info!(scheme = params.scheme.name(), "Subdivision complete: {}", metrics);

    Ok(SubdivideResult {
        mesh: current,
        metrics,
    })
}

/// One level of 1-to-4 subdivision. Faces must all be triangles.
fn subdivide_once(mesh: &Mesh, scheme: SubdivisionScheme) -> Mesh {
    let topo = MeshTopology::build(mesh);
    let positions = mesh.positions();

    let mut vertices: Vec<Vertex> = match scheme {
        SubdivisionScheme::Loop => (0..mesh.vertex_count() as u32)
            .map(|v| Vertex::new(loop_vertex_position(&topo, &positions, v)))
            .collect(),
        SubdivisionScheme::Butterfly => positions.iter().map(|&p| Vertex::new(p)).collect(),
    };
    vertices.reserve(topo.edges().len());

    // Edge points in ascending key order, each computed once.
    let mut edge_vertices: HashMap<EdgeKey, u32> = HashMap::with_capacity(topo.edges().len());
    for &(a, b) in topo.edges() {
        let p = match scheme {
            SubdivisionScheme::Loop => loop_edge_position(&topo, &positions, a, b),
            SubdivisionScheme::Butterfly => butterfly_edge_position(&topo, &positions, a, b),
        };
        edge_vertices.insert((a, b), vertices.len() as u32);
        vertices.push(Vertex::new(p));
    }

    let mut faces = Vec::with_capacity(mesh.face_count() * 4);
    for [a, b, c] in mesh.faces.iter().filter_map(Face::as_triangle) {
        let m_ab = get_edge_vertex(&edge_vertices, a, b);
        let m_bc = get_edge_vertex(&edge_vertices, b, c);
        let m_ca = get_edge_vertex(&edge_vertices, c, a);

        //        a
        //       / \
        //    m_ab--m_ca
        //     / \  / \
        //    b--m_bc--c
        faces.push(Face::Triangle([a, m_ab, m_ca]));
        faces.push(Face::Triangle([m_ab, b, m_bc]));
        faces.push(Face::Triangle([m_ca, m_bc, c]));
        faces.push(Face::Triangle([m_ab, m_bc, m_ca]));
    }

    Mesh { vertices, faces }
}

/// Index of the vertex inserted on edge `(a, b)`.
///
/// Every edge of a triangle is in the topology, so the fallback to `a` only
/// guards against a face list that disagrees with it.
fn get_edge_vertex(edge_vertices: &HashMap<EdgeKey, u32>, a: u32, b: u32) -> u32 {
    edge_vertices.get(&edge_key(a, b)).copied().unwrap_or(a)
}

fn midpoint(positions: &[Point3<f64>], a: u32, b: u32) -> Point3<f64> {
    nalgebra::center(&positions[a as usize], &positions[b as usize])
}

/// `(1 - nβ)·p + β·Σ neighbours`.
fn loop_vertex_position(topo: &MeshTopology, positions: &[Point3<f64>], v: u32) -> Point3<f64> {
    let p = positions[v as usize];
    let neighbors = topo.neighbors(v);
    let n = neighbors.len();
    if n == 0 {
        return p;
    }
    let beta = compute_loop_beta(n);
    let sum = neighbors
        .iter()
        .fold(nalgebra::Vector3::zeros(), |acc, &ni| acc + positions[ni as usize].coords);
    Point3::from(p.coords * (1.0 - n as f64 * beta) + sum * beta)
}

/// Loop vertex weight for valence `n`.
fn compute_loop_beta(n: usize) -> f64 {
    match n {
        3 => 3.0 / (8.0 * 3.0),
        6 => 1.0 / 16.0,
        _ => {
            let n = n as f64;
            let cos_val = (2.0 * std::f64::consts::PI / n).cos();
            let term = 3.0 / 8.0 + 0.25 * cos_val;
            (1.0 / n) * (5.0 / 8.0 - term * term)
        }
    }
}

/// `3/8 (a + b) + 1/8 (o1 + o2)` for interior edges, midpoint otherwise.
fn loop_edge_position(topo: &MeshTopology, positions: &[Point3<f64>], a: u32, b: u32) -> Point3<f64> {
    match topo.opposite_vertices(a, b) {
        &[o1, o2] if topo.edge_faces(a, b).len() == 2 => {
            let pa = positions[a as usize].coords;
            let pb = positions[b as usize].coords;
            let p1 = positions[o1 as usize].coords;
            let p2 = positions[o2 as usize].coords;
            Point3::from((pa + pb) * (3.0 / 8.0) + (p1 + p2) * (1.0 / 8.0))
        }
        _ => midpoint(positions, a, b),
    }
}

/// Eight-point butterfly stencil, midpoint when any stencil vertex is missing.
fn butterfly_edge_position(
    topo: &MeshTopology,
    positions: &[Point3<f64>],
    a: u32,
    b: u32,
) -> Point3<f64> {
    let stencil = match topo.opposite_vertices(a, b) {
        &[o1, o2] if topo.edge_faces(a, b).len() == 2 => (|| {
            Some((
                [o1, o2],
                [
                    topo.opposite_across(a, o1, b)?,
                    topo.opposite_across(b, o1, a)?,
                    topo.opposite_across(a, o2, b)?,
                    topo.opposite_across(b, o2, a)?,
                ],
            ))
        })(),
        _ => None,
    };

    let Some((opposite, wings)) = stencil else {
        trace!(a, b, "Incomplete butterfly stencil, using midpoint");
        return midpoint(positions, a, b);
    };

    let at = |i: u32| positions[i as usize].coords;
    let near = (at(a) + at(b)) * 0.5;
    let far = (at(opposite[0]) + at(opposite[1])) * (1.0 / 8.0);
    let wing = wings.iter().fold(nalgebra::Vector3::zeros(), |acc, &w| acc + at(w)) * (1.0 / 16.0);
    Point3::from(near + far - wing)
}

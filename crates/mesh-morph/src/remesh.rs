//! Isotropic remeshing towards a target edge length.
//!
//! Each iteration runs one pass of:
//! 1. **Split**: every edge longer than `target * split_factor` is split at
//!    its midpoint. A face with one, two or three split edges becomes two,
//!    three or four triangles.
//! 2. **Collapse**: edges shorter than `target / split_factor` are collapsed,
//!    at most one per vertex neighbourhood. A collapse is rejected if it
//!    breaks the link condition, leaves a vertex with valence below 3,
//!    creates an edge longer than the split threshold, or flips a face.
//! 3. **Flip**: an edge is flipped when that moves the valences of its four
//!    vertices closer to 6 (4 on the boundary).
//! 4. **Cleanup**: weld coincident vertices, drop unused vertices and
//!    degenerate faces.
//! 5. **Tangential relaxation**: one uniform Laplacian step projected onto
//!    each vertex's tangent plane, then pulled back onto the input surface.
//!
//! The loop stops once the mean edge length is close to the target and the
//! lengths are uniform enough, when a pass changes nothing, or at the
//! iteration cap.

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::cleanup::{
    area_weighted_normals_at, compute_vertex_normals, remove_degenerate_faces,
    remove_unreferenced_vertices, weld_vertices,
};
use crate::config::{MorphConfig, RemeshConfig};
use crate::error::{MorphError, MorphResult};
use crate::quality::{EdgeLengthStats, analyze_quality};
use crate::smooth::{rms_displacement, uniform_laplacian};
use crate::surface::SurfaceIndex;
use crate::tolerance::Tolerance;
use crate::topology::{EdgeKey, MeshTopology, edge_key};
use crate::tracing_ext::{OperationTimer, log_edge_op, log_mesh_stats};
use crate::types::{Face, Vertex};
use crate::validate::validate_mesh;

/// Parameters for [`remesh`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct RemeshParams {
    /// Desired edge length in model units.
    pub target_edge_length: f64,
    /// Maximum number of passes.
    pub max_iterations: usize,
    /// Keep boundary edges and boundary vertices where they are.
    pub preserve_features: bool,
}

impl RemeshParams {
    /// Ten passes towards `target`, boundaries preserved.
    pub fn new(target_edge_length: f64) -> Self {
        Self {
            target_edge_length,
            max_iterations: 10,
            preserve_features: true,
        }
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_preserve_features(mut self, preserve: bool) -> Self {
        self.preserve_features = preserve;
        self
    }
}

/// Statistics from a remeshing run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct RemeshMetrics {
    pub target_edge_length: f64,
    pub mean_edge_length: f64,
    pub edge_length_std_dev: f64,
    /// `exp(-std_dev / mean)`: 1.0 for perfectly uniform edges.
    pub uniformity_score: f64,
    pub iterations: usize,
    pub converged: bool,
    pub faces_before: usize,
    pub faces_after: usize,
    pub edges_split: usize,
    pub edges_collapsed: usize,
    pub edges_flipped: usize,
    pub vertices_welded: usize,
}

impl std::fmt::Display for RemeshMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} -> {} faces in {} iteration(s), mean edge {:.6} (target {:.6}, std {:.6}), uniformity {:.3}, {} split, {} collapsed, {} flipped, {} welded, {}",
            self.faces_before,
            self.faces_after,
            self.iterations,
            self.mean_edge_length,
            self.target_edge_length,
            self.edge_length_std_dev,
            self.uniformity_score,
            self.edges_split,
            self.edges_collapsed,
            self.edges_flipped,
            self.vertices_welded,
            if self.converged {
                "converged"
            } else {
                "not converged"
            }
        )
    }
}

/// Result of [`remesh`].
#[derive(Debug, Clone)]
pub struct RemeshResult {
    pub mesh: Mesh,
    pub iterations_performed: usize,
    pub metrics: RemeshMetrics,
}


/// Per-call loop state.
struct RemeshState {
    mesh: Mesh,
    iteration: usize,
    converged: bool,
    totals: PassStats,
    edges: EdgeLengthStats,
}

#[derive(Debug, Clone, Copy, Default)]
struct PassStats {
    split: usize,
    collapsed: usize,
    flipped: usize,
    welded: usize,
}

impl PassStats {
    fn changed(&self) -> bool {
        self.split + self.collapsed + self.flipped + self.welded > 0
    }

    fn accumulate(&mut self, other: &PassStats) {
        self.split += other.split;
        self.collapsed += other.collapsed;
        self.flipped += other.flipped;
        self.welded += other.welded;
    }
}

/// Edge length window around the target.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Thresholds {
    split_above: f64,
    collapse_below: f64,
}

impl Thresholds {
    fn new(target: f64, settings: &RemeshConfig) -> Self {
        Self {
            split_above: target * settings.split_factor,
            collapse_below: target / settings.split_factor,
        }
    }
}

/// A collapse of `remove` into `keep`, which moves to `position`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Collapse {
    keep: u32,
    remove: u32,
    position: Point3<f64>,
}

/// Remesh a triangle mesh towards a uniform edge length.
///
/// Failing to converge within `max_iterations` is reported through
/// `metrics.converged = false`.
///
/// # Errors
///
/// - [`MorphError::RemeshIterationLimitExceeded`] if `max_iterations` is 0 or
///   above `config.remesh.max_iterations`
/// - [`MorphError::RemeshingFailed`] if the mesh has non-triangle faces or a
///   pass produces an invalid mesh
/// - validity errors for an invalid input mesh
/// - [`MorphError::RemeshTargetEdgeLengthInvalid`] if the target lies outside
///   `[tolerance_factor * absolute, diagonal_factor * bbox_diagonal]`
pub fn remesh(mesh: &Mesh, params: &RemeshParams, config: &MorphConfig) -> MorphResult<RemeshResult> {
    config.validate()?;
    let settings = &config.remesh;
    let tolerance = &config.tolerance;

    if params.max_iterations == 0 || params.max_iterations > settings.max_iterations {
        warn!(
            requested = params.max_iterations,
            max = settings.max_iterations,
            "Rejected remesh iteration count"
        );
        return Err(MorphError::RemeshIterationLimitExceeded {
            requested: params.max_iterations,
            max: settings.max_iterations,
        });
    }
    let non_triangle_faces = mesh.face_count() - mesh.triangle_count();
    if non_triangle_faces > 0 {
        return Err(MorphError::remeshing_failed(format!(
            "remeshing requires a triangle mesh, found {} non-triangle faces",
            non_triangle_faces
        )));
    }
    validate_mesh(mesh, tolerance)?;

    let target = params.target_edge_length;
    let (min, max) = target_range(mesh, settings, tolerance);
    if !(target >= min && target <= max) {
        warn!(target, min, max, "Rejected remesh target edge length");
        return Err(MorphError::RemeshTargetEdgeLengthInvalid { target, min, max });
    }

    let _timer = OperationTimer::with_context("remesh", mesh.face_count(), mesh.vertex_count());
    log_mesh_stats(mesh, "remesh input");

    let thresholds = Thresholds::new(target, settings);
    let surface = SurfaceIndex::build(mesh);
    let mut state = RemeshState {
        mesh: mesh.clone(),
        iteration: 0,
        converged: false,
        totals: PassStats::default(),
        edges: EdgeLengthStats::default(),
    };

    while state.iteration < params.max_iterations {
        state.iteration += 1;

        let (next, pass) = remesh_pass(
            &state.mesh,
            &thresholds,
            &surface,
            params.preserve_features,
            tolerance,
        );
        state.mesh = next;
        state.totals.accumulate(&pass);

        validate_mesh(&state.mesh, tolerance).map_err(|e| {
            MorphError::remeshing_failed(format!("iteration {}: {}", state.iteration, e))
        })?;

        state.edges = analyze_quality(&state.mesh, tolerance).edge_stats();
        state.converged = is_converged(&state.edges, target, settings);
        debug!(
            iteration = state.iteration,
            split = pass.split,
            collapsed = pass.collapsed,
            flipped = pass.flipped,
            welded = pass.welded,
            vertices = state.mesh.vertex_count(),
            mean = state.edges.mean,
            std_dev = state.edges.std_dev,
            converged = state.converged,
            "Remesh iteration"
        );

        if state.converged {
            break;
        }
        if !pass.changed() {
            debug!(iteration = state.iteration, "Remesh pass made no change, stopping");
            break;
        }
    }

    let metrics = RemeshMetrics {
        target_edge_length: target,
        mean_edge_length: state.edges.mean,
        edge_length_std_dev: state.edges.std_dev,
        uniformity_score: uniformity_score(&state.edges),
        iterations: state.iteration,
        converged: state.converged,
        faces_before: mesh.face_count(),
        faces_after: state.mesh.face_count(),
        edges_split: state.totals.split,
        edges_collapsed: state.totals.collapsed,
        edges_flipped: state.totals.flipped,
        vertices_welded: state.totals.welded,
    };
    info!("Remeshing complete: {}", metrics);

    Ok(RemeshResult {
        mesh: state.mesh,
        iterations_performed: state.iteration,
        metrics,
    })
}

/// Allowed target edge lengths for a mesh.
pub fn target_range(mesh: &Mesh, settings: &RemeshConfig, tolerance: &Tolerance) -> (f64, f64) {
    (
        settings.tolerance_factor * tolerance.absolute,
        settings.diagonal_factor * mesh.bounding_box_diagonal(),
    )
}

fn is_converged(edges: &EdgeLengthStats, target: f64, settings: &RemeshConfig) -> bool {
    edges.mean > 0.0
        && (edges.mean - target).abs() <= target * settings.convergence_threshold
        && edges.coefficient_of_variation() <= settings.uniformity_weight
}

fn uniformity_score(edges: &EdgeLengthStats) -> f64 {
    if edges.mean > 0.0 {
        (-edges.std_dev / edges.mean).exp()
    } else {
        0.0
    }
}

/// One split / collapse / flip / cleanup / relax pass.
fn remesh_pass(
    mesh: &Mesh,
    thresholds: &Thresholds,
    surface: &SurfaceIndex,
    preserve_features: bool,
    tolerance: &Tolerance,
) -> (Mesh, PassStats) {
    let topo = MeshTopology::build(mesh);
    let (mut next, split) = split_long_edges(mesh, &topo, thresholds.split_above, preserve_features);

    let topo = MeshTopology::build(&next);
    let collapsed = collapse_short_edges(&mut next, &topo, thresholds, preserve_features, tolerance);

    let topo = MeshTopology::build(&next);
    let flipped = flip_edges_for_valence(&mut next, &topo, tolerance);

    let welded = weld_vertices(&mut next, tolerance.absolute);
    remove_degenerate_faces(&mut next, tolerance);
    remove_unreferenced_vertices(&mut next);

    relax_tangential(&mut next, surface, preserve_features, tolerance);
    compute_vertex_normals(&mut next);
    remove_unreferenced_vertices(&mut next);

    (
        next,
        PassStats {
            split,
            collapsed,
            flipped,
            welded,
        },
    )
}

/// Split every edge longer than `max_length` at its midpoint.
///
/// Returns the new mesh and the number of edges split.
fn split_long_edges(
    mesh: &Mesh,
    topo: &MeshTopology,
    max_length: f64,
    preserve_features: bool,
) -> (Mesh, usize) {
    let mut vertices = mesh.vertices.clone();
    let mut midpoints: HashMap<EdgeKey, u32> = HashMap::new();

    for &(a, b) in topo.edges().iter().rev() {
        if preserve_features && topo.is_boundary_edge(a, b) {
            continue;
        }
        let (pa, pb) = (vertices[a as usize].position, vertices[b as usize].position);
        if (pb - pa).norm() > max_length {
            log_edge_op("split", a, b);
            midpoints.insert((a, b), vertices.len() as u32);
            vertices.push(Vertex::new(nalgebra::center(&pa, &pb)));
        }
    }

    let split = midpoints.len();
    if split == 0 {
        return (mesh.clone(), 0);
    }

    let mut faces = Vec::with_capacity(mesh.face_count() + 3 * split);
    for tri in mesh.faces.iter().filter_map(Face::as_triangle) {
        let mid: [Option<u32>; 3] =
            std::array::from_fn(|i| midpoints.get(&edge_key(tri[i], tri[(i + 1) % 3])).copied());
        split_triangle(tri, mid, &mut faces);
    }

    (Mesh { vertices, faces }, split)
}

/// Re-triangulate `tri` given the midpoint (if any) of each edge `i -> i + 1`.
fn split_triangle(tri: [u32; 3], mid: [Option<u32>; 3], out: &mut Vec<Face>) {
    match mid {
        [None, None, None] => out.push(Face::Triangle(tri)),
        [Some(m0), Some(m1), Some(m2)] => out.extend([
            Face::Triangle([tri[0], m0, m2]),
            Face::Triangle([m0, tri[1], m1]),
            Face::Triangle([m2, m1, tri[2]]),
            Face::Triangle([m0, m1, m2]),
        ]),
        _ => {
            for i in 0..3 {
                let (v0, v1, v2) = (tri[i], tri[(i + 1) % 3], tri[(i + 2) % 3]);
                match (mid[i], mid[(i + 1) % 3], mid[(i + 2) % 3]) {
                    (Some(m), None, None) => {
                        out.extend([Face::Triangle([v0, m, v2]), Face::Triangle([m, v1, v2])]);
                        return;
                    }
                    (None, Some(m0), Some(m1)) => {
                        out.extend([
                            Face::Triangle([v0, v1, m0]),
                            Face::Triangle([v0, m0, m1]),
                            Face::Triangle([m0, v2, m1]),
                        ]);
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Collapse edges shorter than `thresholds.collapse_below`.
///
/// Edges are scanned in descending key order. Once a collapse is accepted
/// its endpoints and their neighbours are left alone until the next pass.
/// Returns the number of collapses.
fn collapse_short_edges(
    mesh: &mut Mesh,
    topo: &MeshTopology,
    thresholds: &Thresholds,
    preserve_features: bool,
    tolerance: &Tolerance,
) -> usize {
    let positions = mesh.positions();
    let mut touched = vec![false; positions.len()];
    let mut collapses = Vec::new();

    for &(a, b) in topo.edges().iter().rev() {
        if touched[a as usize] || touched[b as usize] {
            continue;
        }
        if preserve_features && topo.is_boundary_edge(a, b) {
            continue;
        }
        if (positions[b as usize] - positions[a as usize]).norm() >= thresholds.collapse_below {
            continue;
        }
        let Some(collapse) = plan_collapse(
            topo,
            &mesh.faces,
            &positions,
            a,
            b,
            thresholds.split_above,
            tolerance,
        ) else {
            continue;
        };
        log_edge_op("collapse", a, b);
        for v in [a, b] {
            touched[v as usize] = true;
            for &n in topo.neighbors(v) {
                touched[n as usize] = true;
            }
        }
        collapses.push(collapse);
    }

    apply_collapses(mesh, &collapses);
    collapses.len()
}

/// A collapse of `(a, b)`, or None if it would pinch the boundary, create a
/// non-manifold fan, drop a vertex below valence 3, create an edge longer
/// than `max_length`, or flip or flatten an incident face.
fn plan_collapse(
    topo: &MeshTopology,
    faces: &[Face],
    positions: &[Point3<f64>],
    a: u32,
    b: u32,
    max_length: f64,
    tolerance: &Tolerance,
) -> Option<Collapse> {
    let (keep, remove, position) = match (topo.is_boundary_vertex(a), topo.is_boundary_vertex(b)) {
        (true, true) => return None,
        (true, false) => (a, b, positions[a as usize]),
        (false, true) => (b, a, positions[b as usize]),
        (false, false) => (
            a,
            b,
            nalgebra::center(&positions[a as usize], &positions[b as usize]),
        ),
    };

    // Link condition: the only shared neighbours may be the edge's opposite vertices.
    let opposite = topo.opposite_vertices(a, b);
    let shares_other = topo
        .neighbors(a)
        .iter()
        .filter(|n| topo.neighbors(b).binary_search(n).is_ok())
        .any(|n| !opposite.contains(n));
    if shares_other {
        return None;
    }

    // Each opposite vertex loses one edge.
    if opposite.iter().any(|&o| topo.valence(o) <= 3) {
        return None;
    }
    let mut merged: Vec<u32> = topo
        .neighbors(a)
        .iter()
        .chain(topo.neighbors(b))
        .copied()
        .filter(|&n| n != a && n != b)
        .collect();
    merged.sort_unstable();
    merged.dedup();
    if merged.len() < 3 {
        return None;
    }
    if merged
        .iter()
        .any(|&n| (positions[n as usize] - position).norm() > max_length)
    {
        return None;
    }

    let moved = |v: u32| {
        if v == a || v == b {
            position
        } else {
            positions[v as usize]
        }
    };
    let at = |v: u32| positions[v as usize];

    let mut fan: Vec<u32> = topo.vertex_faces(a).to_vec();
    fan.extend_from_slice(topo.vertex_faces(b));
    fan.sort_unstable();
    fan.dedup();

    for fi in fan {
        let Some(tri) = faces[fi as usize].as_triangle() else {
            continue;
        };
        // Faces on the edge itself vanish.
        if tri.contains(&a) && tri.contains(&b) {
            continue;
        }
        let before = face_normal(at(tri[0]), at(tri[1]), at(tri[2]));
        let after = face_normal(moved(tri[0]), moved(tri[1]), moved(tri[2]));
        if after.norm() <= tolerance.zero_threshold() || before.dot(&after) <= 0.0 {
            return None;
        }
    }

    Some(Collapse {
        keep,
        remove,
        position,
    })
}

#[inline]
fn face_normal(p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) -> Vector3<f64> {
    (p1 - p0).cross(&(p2 - p0))
}

/// Merge collapsed vertices through a vertex map and drop the faces that
/// lose a corner.
fn apply_collapses(mesh: &mut Mesh, collapses: &[Collapse]) {
    if collapses.is_empty() {
        return;
    }

    let mut vertex_map: Vec<u32> = (0..mesh.vertex_count() as u32).collect();
    for c in collapses {
        vertex_map[c.remove as usize] = c.keep;
        mesh.vertices[c.keep as usize] = Vertex::new(c.position);
    }

    let faces = std::mem::take(&mut mesh.faces);
    mesh.faces = faces
        .iter()
        .filter_map(Face::as_triangle)
        .map(|tri| tri.map(|v| vertex_map[v as usize]))
        .filter(|t| t[0] != t[1] && t[1] != t[2] && t[2] != t[0])
        .map(Face::Triangle)
        .collect();
}

/// Flip edges shared by two triangles when that moves the valences of the
/// four vertices involved closer to 6 (4 on the boundary).
///
/// Each face takes part in at most one flip per call. Returns the number of
/// flips.
fn flip_edges_for_valence(mesh: &mut Mesh, topo: &MeshTopology, tolerance: &Tolerance) -> usize {
    let positions = mesh.positions();
    let mut valence: Vec<i64> = (0..topo.vertex_count() as u32)
        .map(|v| topo.valence(v) as i64)
        .collect();
    let mut edges: HashSet<EdgeKey> = topo.edges().iter().copied().collect();
    let mut face_used = vec![false; mesh.face_count()];
    let ideal = |v: u32| if topo.is_boundary_vertex(v) { 4 } else { 6 };
    let normal = |t: [u32; 3]| {
        face_normal(
            positions[t[0] as usize],
            positions[t[1] as usize],
            positions[t[2] as usize],
        )
    };
    let mut flips = 0;

    for &(a, b) in topo.edges() {
        let &[f0, f1] = topo.edge_faces(a, b) else {
            continue;
        };
        if face_used[f0 as usize] || face_used[f1 as usize] {
            continue;
        }
        let &[o0, o1] = topo.opposite_vertices(a, b) else {
            continue;
        };
        if o0 == o1 || edges.contains(&edge_key(o0, o1)) {
            continue;
        }
        if valence[a as usize] <= 3 || valence[b as usize] <= 3 {
            continue;
        }

        let deviation = |v: u32, delta: i64| (valence[v as usize] + delta - ideal(v)).abs();
        let before = deviation(a, 0) + deviation(b, 0) + deviation(o0, 0) + deviation(o1, 0);
        let after = deviation(a, -1) + deviation(b, -1) + deviation(o0, 1) + deviation(o1, 1);
        if after >= before {
            continue;
        }

        let (Some(t0), Some(t1)) = (
            mesh.faces[f0 as usize].as_triangle(),
            mesh.faces[f1 as usize].as_triangle(),
        ) else {
            continue;
        };
        let Some(i) = t0.iter().position(|&v| v == o0) else {
            continue;
        };
        // t0 reads (o0, x, y); both new faces keep its winding.
        let (x, y) = (t0[(i + 1) % 3], t0[(i + 2) % 3]);
        let n0 = [o0, x, o1];
        let n1 = [o1, y, o0];

        let old = normal(t0) + normal(t1);
        let (na, nb) = (normal(n0), normal(n1));
        if na.norm() <= tolerance.zero_threshold()
            || nb.norm() <= tolerance.zero_threshold()
            || na.dot(&old) <= 0.0
            || nb.dot(&old) <= 0.0
        {
            continue;
        }

        log_edge_op("flip", a, b);
        mesh.faces[f0 as usize] = Face::Triangle(n0);
        mesh.faces[f1 as usize] = Face::Triangle(n1);
        face_used[f0 as usize] = true;
        face_used[f1 as usize] = true;
        edges.remove(&(a, b));
        edges.insert(edge_key(o0, o1));
        valence[a as usize] -= 1;
        valence[b as usize] -= 1;
        valence[o0 as usize] += 1;
        valence[o1 as usize] += 1;
        flips += 1;
    }
    flips
}

/// One uniform Laplacian step with the normal component removed, then a
/// projection onto the input surface.
///
/// Vertices without a usable normal skip the relaxation but are still
/// projected.
fn relax_tangential(
    mesh: &mut Mesh,
    surface: &SurfaceIndex,
    preserve_features: bool,
    tolerance: &Tolerance,
) {
    let topo = MeshTopology::build(mesh);
    let positions = mesh.positions();
    let offsets = uniform_laplacian(&topo, &positions);
    let normals = area_weighted_normals_at(&mesh.faces, &positions);

    for (vi, vertex) in mesh.vertices.iter_mut().enumerate() {
        if preserve_features && topo.is_boundary_vertex(vi as u32) {
            continue;
        }
        let p = positions[vi];
        let relaxed = match normals[vi].try_normalize(tolerance.zero_threshold()) {
            Some(n) => {
                let d = offsets[vi];
                p + (d - n * n.dot(&d))
            }
            None => p,
        };
        vertex.position = surface.closest_point(&relaxed).unwrap_or(relaxed);
    }

    debug!(
        rms = rms_displacement(&mesh.positions(), &positions),
        "Tangential relaxation"
    );
}

//! Iterative mesh smoothing.
//!
//! Four update rules share one loop with RMS-displacement convergence
//! tracking:
//!
//! - [`SmoothingScheme::Uniform`]: move each vertex to the mean of its
//!   topological neighbours.
//! - [`SmoothingScheme::Cotangent`]: inverse-distance weighted neighbour mean,
//!   a cheap stand-in for cotangent weights that favours close neighbours.
//! - [`SmoothingScheme::Taubin`]: a shrinking `λ` step followed by an
//!   inflating `μ` step, which preserves volume far better than plain
//!   Laplacian smoothing.
//! - [`SmoothingScheme::MeanCurvatureFlow`]: move along the vertex normal by
//!   the normal component of the Laplacian.
//!
//! Smoothing does not require triangles; quads contribute their perimeter
//! edges as neighbours.
//!
//! # Example
//!
//! ```
//! use mesh_morph::{Mesh, MorphConfig};
//! use mesh_morph::smooth::{SmoothParams, smooth};
//! use nalgebra::Point3;
//!
//! let mesh = Mesh::from_triangles(
//!     &[
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.5, 1.0, 0.0),
//!         Point3::new(0.5, 0.5, 1.0),
//!     ],
//!     &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [2, 0, 3]],
//! );
//! let result = smooth(&mesh, &SmoothParams::taubin(5), &MorphConfig::default()).unwrap();
//! assert_eq!(result.metrics.iterations_performed, 5);
//! ```

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use nalgebra::{Point3, Vector3};
use tracing::{debug, info, trace, warn};

use crate::Mesh;
use crate::cleanup::{area_weighted_normals_at, compute_vertex_normals};
use crate::config::MorphConfig;
use crate::error::{MorphError, MorphResult};
use crate::quality::analyze_quality;
use crate::tolerance::Tolerance;
use crate::topology::MeshTopology;
use crate::tracing_ext::OperationTimer;
use crate::validate::validate_mesh;

/// Smoothing update rule.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(tag = "type", rename_all = "snake_case"))]
pub enum SmoothingScheme {
    /// Uniform-weight Laplacian.
    #[default]
    Uniform,
    /// Inverse-distance weighted Laplacian.
    Cotangent,
    /// Two-step λ/μ smoothing. Requires `lambda > 0` and `mu < -lambda`.
    Taubin { lambda: f64, mu: f64 },
    /// Normal-direction flow with the given step size.
    MeanCurvatureFlow { time_step: f64 },
}

impl SmoothingScheme {
    /// Taubin with the classic `λ = 0.5`, `μ = -0.53`.
    pub fn taubin() -> Self {
        SmoothingScheme::Taubin {
            lambda: 0.5,
            mu: -0.53,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SmoothingScheme::Uniform => "uniform",
            SmoothingScheme::Cotangent => "cotangent",
            SmoothingScheme::Taubin { .. } => "taubin",
            SmoothingScheme::MeanCurvatureFlow { .. } => "mean_curvature_flow",
        }
    }

    fn validate(&self) -> MorphResult<()> {
        match *self {
            SmoothingScheme::Uniform | SmoothingScheme::Cotangent => Ok(()),
            SmoothingScheme::Taubin { lambda, mu } => {
                let ok = lambda.is_finite() && mu.is_finite() && lambda > 0.0 && mu < -lambda;
                if ok {
                    Ok(())
                } else {
                    Err(MorphError::TaubinParametersInvalid { lambda, mu })
                }
            }
            SmoothingScheme::MeanCurvatureFlow { time_step } => {
                if time_step.is_finite() && time_step > 0.0 {
                    Ok(())
                } else {
                    Err(MorphError::invalid_parameter(
                        "time_step",
                        format!("must be finite and positive, got {}", time_step),
                    ))
                }
            }
        }
    }
}

/// Parameters for [`smooth`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub struct SmoothParams {
    pub scheme: SmoothingScheme,
    /// Maximum number of iterations; the loop may stop earlier on convergence.
    pub iterations: usize,
    /// Keep vertices with fewer than two incident faces fixed.
    pub lock_boundary: bool,
}

impl Default for SmoothParams {
    fn default() -> Self {
        Self {
            scheme: SmoothingScheme::Uniform,
            iterations: 10,
            lock_boundary: false,
        }
    }
}

impl SmoothParams {
    pub fn new(scheme: SmoothingScheme, iterations: usize) -> Self {
        Self {
            scheme,
            iterations,
            lock_boundary: false,
        }
    }

    /// Uniform Laplacian smoothing.
    pub fn laplacian(iterations: usize) -> Self {
        Self::new(SmoothingScheme::Uniform, iterations)
    }

    /// Taubin smoothing with `λ = 0.5`, `μ = -0.53`.
    pub fn taubin(iterations: usize) -> Self {
        Self::new(SmoothingScheme::taubin(), iterations)
    }

    pub fn with_lock_boundary(mut self, lock: bool) -> Self {
        self.lock_boundary = lock;
        self
    }
}

/// Statistics from a smoothing run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct SmoothingMetrics {
    pub iterations_performed: usize,
    /// RMS displacement of the last iteration.
    pub rms_displacement: f64,
    /// Largest distance any vertex moved from its input position.
    pub max_displacement: f64,
    /// 1.0 if the output passes the configured quality thresholds, else 0.0.
    pub quality_score: f64,
    pub converged: bool,
}

impl std::fmt::Display for SmoothingMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} iterations, rms {:.3e}, max displacement {:.6}, quality {:.1}, {}",
            self.iterations_performed,
            self.rms_displacement,
            self.max_displacement,
            self.quality_score,
            if self.converged {
                "converged"
            } else {
                "not converged"
            }
        )
    }
}

/// Result of [`smooth`].
#[derive(Debug, Clone)]
pub struct SmoothResult {
    pub mesh: Mesh,
    pub metrics: SmoothingMetrics,
}

impl SmoothResult {
    /// Turn a run that hit the iteration cap into an error.
    pub fn require_converged(self) -> MorphResult<Self> {
        if self.metrics.converged {
            Ok(self)
        } else {
            Err(MorphError::smoothing_failed(
                self.metrics.iterations_performed,
                format!(
                    "did not converge (rms displacement {:.3e})",
                    self.metrics.rms_displacement
                ),
            ))
        }
    }
}

/// Per-call working buffers.
struct SmoothingState {
    positions: Vec<Point3<f64>>,
    previous: Vec<Point3<f64>>,
    iteration: usize,
    converged: bool,
}

/// Smooth a mesh.
///
/// The input is not modified. Reaching `params.iterations` without the RMS
/// displacement dropping below `tolerance.absolute * convergence_multiplier`
/// is reported through `metrics.converged = false`, not as an error.
///
/// # Errors
///
/// - [`MorphError::InvalidIterationCount`] if `iterations` is 0 or above
///   `config.smoothing.max_iterations`
/// - [`MorphError::TaubinParametersInvalid`] for a bad λ/μ pair
/// - [`MorphError::InvalidParameter`] for a bad MCF time step or config
/// - validity errors for an invalid input mesh
/// - [`MorphError::SmoothingConvergenceFailed`] if positions become non-finite
pub fn smooth(mesh: &Mesh, params: &SmoothParams, config: &MorphConfig) -> MorphResult<SmoothResult> {
    config.validate()?;
    let max = config.smoothing.max_iterations;
    if params.iterations == 0 || params.iterations > max {
        warn!(requested = params.iterations, max, "Rejected smoothing iteration count");
        return Err(MorphError::InvalidIterationCount {
            requested: params.iterations,
            max,
        });
    }
    params.scheme.validate()?;
    validate_mesh(mesh, &config.tolerance)?;

    let _timer = OperationTimer::with_context("smooth", mesh.face_count(), mesh.vertex_count());

    let topology = MeshTopology::build(mesh);
    let locked: Vec<bool> = if params.lock_boundary {
        topology.sparse_vertex_flags()
    } else {
        vec![false; mesh.vertex_count()]
    };
    let threshold = config
        .tolerance
        .convergence_threshold(config.smoothing.convergence_multiplier);

    let mut state = SmoothingState {
        positions: mesh.positions(),
        previous: Vec::with_capacity(mesh.vertex_count()),
        iteration: 0,
        converged: false,
    };
    let mut rms = 0.0;

    while state.iteration < params.iterations {
        state.iteration += 1;
        state.previous.clone_from(&state.positions);

        apply_scheme(
            params.scheme,
            mesh,
            &topology,
            &config.tolerance,
            &locked,
            &mut state.positions,
        );

        if let Some(vi) = state.positions.iter().position(|p| !is_finite_point(p)) {
            return Err(MorphError::smoothing_failed(
                state.iteration,
                format!("vertex {} became non-finite", vi),
            ));
        }

        rms = rms_displacement(&state.positions, &state.previous);
        debug!(iteration = state.iteration, rms, "Smoothing iteration");

        if rms < threshold {
            state.converged = true;
            break;
        }
    }

    let mut result = mesh.clone();
    for (vertex, &p) in result.vertices.iter_mut().zip(&state.positions) {
        vertex.position = p;
    }
    compute_vertex_normals(&mut result);
    validate_mesh(&result, &config.tolerance)
        .map_err(|e| MorphError::smoothing_failed(state.iteration, e.to_string()))?;

    let max_displacement = mesh
        .vertices
        .iter()
        .zip(&result.vertices)
        .map(|(a, b)| (b.position - a.position).norm())
        .fold(0.0, f64::max);
    let quality_score = if analyze_quality(&result, &config.tolerance).passes(&config.quality) {
        1.0
    } else {
        0.0
    };

    let metrics = SmoothingMetrics {
        iterations_performed: state.iteration,
        rms_displacement: rms,
        max_displacement,
        quality_score,
        converged: state.converged,
    };
    info!(scheme = params.scheme.name(), "Smoothing complete: {}", metrics);

    Ok(SmoothResult {
        mesh: result,
        metrics,
    })
}

fn apply_scheme(
    scheme: SmoothingScheme,
    mesh: &Mesh,
    topology: &MeshTopology,
    tolerance: &Tolerance,
    locked: &[bool],
    positions: &mut [Point3<f64>],
) {
    match scheme {
        SmoothingScheme::Uniform => {
            let offsets = uniform_laplacian(topology, positions);
            apply_offsets(positions, &offsets, 1.0, locked);
        }
        SmoothingScheme::Cotangent => {
            let offsets = inverse_distance_laplacian(topology, positions, tolerance.zero_threshold());
            apply_offsets(positions, &offsets, 1.0, locked);
        }
        SmoothingScheme::Taubin { lambda, mu } => {
            let offsets = uniform_laplacian(topology, positions);
            apply_offsets(positions, &offsets, lambda, locked);
            let offsets = uniform_laplacian(topology, positions);
            apply_offsets(positions, &offsets, mu, locked);
        }
        SmoothingScheme::MeanCurvatureFlow { time_step } => {
            let offsets = uniform_laplacian(topology, positions);
            let normals = area_weighted_normals_at(&mesh.faces, positions);
            let flow: Vec<Vector3<f64>> = offsets
                .iter()
                .zip(&normals)
                .map(|(a, n)| match n.try_normalize(tolerance.zero_threshold()) {
                    Some(n) => n * n.dot(a),
                    None => Vector3::zeros(),
                })
                .collect();
            apply_offsets(positions, &flow, time_step, locked);
        }
    }
}

/// `p += scale * offset` for every unlocked vertex.
fn apply_offsets(
    positions: &mut [Point3<f64>],
    offsets: &[Vector3<f64>],
    scale: f64,
    locked: &[bool],
) {
    for ((p, d), &fixed) in positions.iter_mut().zip(offsets).zip(locked) {
        if !fixed {
            *p += d * scale;
        }
    }
}

/// Uniform Laplacian offsets `mean(neighbours) - p`; zero for isolated vertices.
pub(crate) fn uniform_laplacian(
    topology: &MeshTopology,
    positions: &[Point3<f64>],
) -> Vec<Vector3<f64>> {
    positions
        .iter()
        .enumerate()
        .map(|(vi, p)| {
            let neighbors = topology.neighbors(vi as u32);
            if neighbors.is_empty() {
                return Vector3::zeros();
            }
            let sum: Vector3<f64> = neighbors
                .iter()
                .map(|&ni| positions[ni as usize].coords)
                .sum();
            sum / neighbors.len() as f64 - p.coords
        })
        .collect()
}

/// Weighted Laplacian offsets with `w = 1 / max(|q - p|, eps)`.
fn inverse_distance_laplacian(
    topology: &MeshTopology,
    positions: &[Point3<f64>],
    eps: f64,
) -> Vec<Vector3<f64>> {
    positions
        .iter()
        .enumerate()
        .map(|(vi, p)| {
            let mut weighted = Vector3::zeros();
            let mut weight_sum = 0.0;
            for &ni in topology.neighbors(vi as u32) {
                let q = positions[ni as usize];
                let w = 1.0 / (q - p).norm().max(eps);
                weighted += q.coords * w;
                weight_sum += w;
            }
            if weight_sum > 0.0 {
                trace!(vertex = vi, weight_sum, "Inverse-distance weights");
                weighted / weight_sum - p.coords
            } else {
                Vector3::zeros()
            }
        })
        .collect()
}

/// `sqrt(mean(|a - b|^2))`.
pub(crate) fn rms_displacement(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let sum: f64 = a.iter().zip(b).map(|(p, q)| (p - q).norm_squared()).sum();
    (sum / a.len() as f64).sqrt()
}

#[inline]
fn is_finite_point(p: &Point3<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite() && p.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Face;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    /// 3x3 vertex grid (8 triangles) with a raised centre.
    fn bumpy_grid() -> Mesh {
        let mut positions = Vec::new();
        for y in 0..3 {
            for x in 0..3 {
                let z = if x == 1 && y == 1 { 1.0 } else { 0.0 };
                positions.push(Point3::new(x as f64, y as f64, z));
            }
        }
        let mut tris = Vec::new();
        for y in 0..2u32 {
            for x in 0..2u32 {
                let i = y * 3 + x;
                tris.push([i, i + 1, i + 4]);
                tris.push([i, i + 4, i + 3]);
            }
        }
        Mesh::from_triangles(&positions, &tris)
    }

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

    #[test]
    fn test_uniform_flattens_bump() {
        let mesh = bumpy_grid();
        let params = SmoothParams::laplacian(1).with_lock_boundary(true);
        let result = smooth(&mesh, &params, &MorphConfig::default()).unwrap();
        // Centre moves to the mean of its six neighbours, all at z = 0.
        assert!(approx_eq(result.mesh.vertices[4].position.z, 0.0, 1e-12));
        assert_eq!(result.metrics.iterations_performed, 1);
        assert!(approx_eq(result.metrics.max_displacement, 1.0, 1e-12));
    }

    #[test]
    fn test_locked_boundary_is_bit_identical() {
        let mesh = bumpy_grid();
        let params = SmoothParams::taubin(7).with_lock_boundary(true);
        let result = smooth(&mesh, &params, &MorphConfig::default()).unwrap();
        // Corners 2 and 6 touch a single triangle.
        for vi in [2, 6] {
            assert_eq!(mesh.vertices[vi].position, result.mesh.vertices[vi].position);
        }
    }

    #[test]
    fn test_edge_vertex_with_several_faces_moves() {
        let mesh = bumpy_grid();
        let topo = MeshTopology::build(&mesh);
        // Vertex 1 sits on the open edge of the grid but touches three faces.
        assert!(topo.is_boundary_vertex(1));
        assert_eq!(topo.vertex_faces(1).len(), 3);

        let params = SmoothParams::laplacian(1).with_lock_boundary(true);
        let result = smooth(&mesh, &params, &MorphConfig::default()).unwrap();
        // Mean of neighbours 0, 2, 4 and 5.
        let moved = result.mesh.vertices[1].position;
        assert!(approx_eq(moved.x, 1.25, 1e-12));
        assert!(approx_eq(moved.y, 0.5, 1e-12));
        assert!(approx_eq(moved.z, 0.25, 1e-12));
    }

    #[test]
    fn test_converges_on_flat_grid() {
        let mut mesh = bumpy_grid();
        mesh.vertices[4].position.z = 0.0;
        // A flat sheet has no normal component to flow along.
        let params = SmoothParams::new(SmoothingScheme::MeanCurvatureFlow { time_step: 0.5 }, 50)
            .with_lock_boundary(true);
        let result = smooth(&mesh, &params, &MorphConfig::default()).unwrap();
        assert!(result.metrics.converged);
        assert_eq!(result.metrics.iterations_performed, 1);
        assert!(result.require_converged().is_ok());
    }

    #[test]
    fn test_cap_reported_not_error() {
        let mesh = tetrahedron();
        let result = smooth(&mesh, &SmoothParams::taubin(2), &MorphConfig::default()).unwrap();
        assert!(!result.metrics.converged);
        let err = result.require_converged().unwrap_err();
        assert!(matches!(
            err,
            MorphError::SmoothingConvergenceFailed { iteration: 2, .. }
        ));
    }

    #[test]
    fn test_rejects_iteration_counts() {
        let mesh = tetrahedron();
        let config = MorphConfig::default();
        for n in [0, 1001] {
            let err = smooth(&mesh, &SmoothParams::laplacian(n), &config).unwrap_err();
            assert!(matches!(err, MorphError::InvalidIterationCount { .. }));
        }
    }

    #[test]
    fn test_rejects_bad_taubin() {
        let mesh = tetrahedron();
        let config = MorphConfig::default();
        for (lambda, mu) in [(0.5, -0.4), (-0.5, -0.6), (0.5, 0.53), (f64::NAN, -1.0)] {
            let params = SmoothParams::new(SmoothingScheme::Taubin { lambda, mu }, 3);
            let err = smooth(&mesh, &params, &config).unwrap_err();
            assert!(matches!(err, MorphError::TaubinParametersInvalid { .. }));
        }
    }

    #[test]
    fn test_rejects_bad_time_step() {
        let params = SmoothParams::new(SmoothingScheme::MeanCurvatureFlow { time_step: 0.0 }, 3);
        let err = smooth(&tetrahedron(), &params, &MorphConfig::default()).unwrap_err();
        assert!(matches!(err, MorphError::InvalidParameter { .. }));
    }

    #[test]
    fn test_mcf_moves_along_normal() {
        let mesh = bumpy_grid();
        let params = SmoothParams::new(SmoothingScheme::MeanCurvatureFlow { time_step: 0.5 }, 1)
            .with_lock_boundary(true);
        let result = smooth(&mesh, &params, &MorphConfig::default()).unwrap();
        let centre = result.mesh.vertices[4].position;
        // The bump is symmetric, so the centre normal is +Z.
        assert!(approx_eq(centre.x, 1.0, 1e-12));
        assert!(approx_eq(centre.y, 1.0, 1e-12));
        assert!(centre.z < 1.0 && centre.z > 0.0);
    }

    #[test]
    fn test_cotangent_weights_favour_close_neighbours() {
        let mesh = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.2, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        let topo = MeshTopology::build(&mesh);
        let positions = mesh.positions();
        let uniform = uniform_laplacian(&topo, &positions);
        let weighted = inverse_distance_laplacian(&topo, &positions, 1e-12);
        // Vertex 2 is closer to vertex 0 than to vertex 1.
        assert!(weighted[2].x < uniform[2].x);
    }

    #[test]
    fn test_quads_are_smoothed() {
        let positions: Vec<Point3<f64>> = (0..9)
            .map(|i| {
                let (x, y) = ((i % 3) as f64, (i / 3) as f64);
                Point3::new(x, y, if i == 4 { 1.0 } else { 0.0 })
            })
            .collect();
        let faces = vec![
            Face::Quad([0, 1, 4, 3]),
            Face::Quad([1, 2, 5, 4]),
            Face::Quad([3, 4, 7, 6]),
            Face::Quad([4, 5, 8, 7]),
        ];
        let mesh = Mesh::from_faces(&positions, faces);
        let params = SmoothParams::laplacian(1).with_lock_boundary(true);
        let result = smooth(&mesh, &params, &MorphConfig::default()).unwrap();
        assert!(approx_eq(result.mesh.vertices[4].position.z, 0.0, 1e-12));
        assert_eq!(result.mesh.faces, mesh.faces);
    }

    #[test]
    fn test_input_not_mutated() {
        let mesh = bumpy_grid();
        let copy = mesh.clone();
        let _ = smooth(&mesh, &SmoothParams::laplacian(3), &MorphConfig::default()).unwrap();
        assert_eq!(mesh, copy);
    }

    #[test]
    fn test_rms_displacement() {
        let a = [Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)];
        let b = [Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 0.0, 0.0)];
        assert!(approx_eq(rms_displacement(&a, &b), 0.5_f64.sqrt(), 1e-12));
    }
}

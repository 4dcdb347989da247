//! Free-form deformation with a trilinear control cage.
//!
//! The eight original control points define an axis-aligned box. Every
//! geometry point is expressed in unit cage coordinates `(u, v, w)` of that
//! box and mapped to the trilinear blend of the deformed control points.
//! Control point `i` sits at cage corner `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`;
//! use [`cage_corners`] to build a cage in that order.
//!
//! Only the first eight control points take part in the blend. Points outside
//! the box are clamped onto it.

#[cfg(feature = "config")]
use serde::Serialize;

use nalgebra::Point3;
use tracing::{debug, info, warn};

use crate::Mesh;
use crate::cleanup::compute_vertex_normals;
use crate::config::MorphConfig;
use crate::error::{MorphError, MorphResult};
use crate::tracing_ext::OperationTimer;
use crate::types::point_bounds;
use crate::validate::{check_extent, validate_mesh, validate_points};

/// Minimum number of control points of a trilinear cage.
pub const MIN_CAGE_CONTROL_POINTS: usize = 8;

/// Geometry accepted by [`cage_deform`].
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// A polygon mesh; connectivity is kept, normals are recomputed.
    Mesh(Mesh),
    /// A bare point set, such as the vertex list of a B-rep.
    Points(Vec<Point3<f64>>),
}

impl Geometry {
    pub fn point_count(&self) -> usize {
        match self {
            Geometry::Mesh(mesh) => mesh.vertex_count(),
            Geometry::Points(points) => points.len(),
        }
    }

    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        match self {
            Geometry::Mesh(mesh) => mesh.bounds(),
            Geometry::Points(points) => point_bounds(points.iter()),
        }
    }

    pub fn as_mesh(&self) -> Option<&Mesh> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            Geometry::Points(_) => None,
        }
    }

    pub fn into_mesh(self) -> Option<Mesh> {
        match self {
            Geometry::Mesh(mesh) => Some(mesh),
            Geometry::Points(_) => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Geometry::Mesh(_) => "mesh",
            Geometry::Points(_) => "points",
        }
    }
}

impl From<Mesh> for Geometry {
    fn from(mesh: Mesh) -> Self {
        Geometry::Mesh(mesh)
    }
}

impl From<Vec<Point3<f64>>> for Geometry {
    fn from(points: Vec<Point3<f64>>) -> Self {
        Geometry::Points(points)
    }
}

/// The eight corners of the box `[min, max]` in control-point order.
pub fn cage_corners(min: Point3<f64>, max: Point3<f64>) -> [Point3<f64>; 8] {
    std::array::from_fn(|i| {
        Point3::new(
            if i & 1 == 0 { min.x } else { max.x },
            if (i >> 1) & 1 == 0 { min.y } else { max.y },
            if (i >> 2) & 1 == 0 { min.z } else { max.z },
        )
    })
}

/// Statistics from a cage deformation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct CageDeformMetrics {
    pub max_control_displacement: f64,
    pub mean_control_displacement: f64,
    /// Bounding box of the input geometry.
    pub original_bounds: (Point3<f64>, Point3<f64>),
    /// Bounding box of the deformed geometry.
    pub deformed_bounds: (Point3<f64>, Point3<f64>),
    /// Deformed over original bounding-box volume; 1.0 when the original
    /// volume is degenerate.
    pub volume_ratio: f64,
}

impl std::fmt::Display for CageDeformMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "control displacement max {:.6} mean {:.6}, volume ratio {:.4}",
            self.max_control_displacement, self.mean_control_displacement, self.volume_ratio
        )
    }
}

/// Result of [`cage_deform`].
#[derive(Debug, Clone)]
pub struct CageDeformResult {
    pub geometry: Geometry,
    pub metrics: CageDeformMetrics,
}

/// Deform geometry by moving the control points of a trilinear cage.
///
/// # Errors
///
/// - [`MorphError::CageControlPointMismatch`] if the control point lists
///   differ in length
/// - [`MorphError::InsufficientCagePoints`] for fewer than eight points
/// - [`MorphError::CageDeformFailed`] if the original cage has no volume or
///   the deformed result is not finite
/// - validity errors for empty or invalid geometry
///
/// # Example
///
/// ```
/// use mesh_morph::{MorphConfig, cage::{Geometry, cage_corners, cage_deform}};
/// use nalgebra::{Point3, Vector3};
///
/// let points = vec![Point3::new(0.5, 0.5, 0.5), Point3::new(1.0, 1.0, 1.0)];
/// let original = cage_corners(Point3::origin(), Point3::new(1.0, 1.0, 1.0));
/// let deformed: Vec<_> = original.iter().map(|p| p + Vector3::new(0.0, 0.0, 2.0)).collect();
///
/// let result = cage_deform(&Geometry::Points(points), &original, &deformed, &MorphConfig::default())
///     .unwrap();
/// let Geometry::Points(moved) = result.geometry else { unreachable!() };
/// assert!((moved[0].z - 2.5).abs() < 1e-12);
/// ```
pub fn cage_deform(
    geometry: &Geometry,
    original: &[Point3<f64>],
    deformed: &[Point3<f64>],
    config: &MorphConfig,
) -> MorphResult<CageDeformResult> {
    config.validate()?;
    if original.len() != deformed.len() {
        warn!(
            original = original.len(),
            deformed = deformed.len(),
            "Control point counts differ"
        );
        return Err(MorphError::CageControlPointMismatch {
            original: original.len(),
            deformed: deformed.len(),
        });
    }
    if original.len() < MIN_CAGE_CONTROL_POINTS {
        warn!(count = original.len(), "Too few cage control points");
        return Err(MorphError::InsufficientCagePoints {
            count: original.len(),
            required: MIN_CAGE_CONTROL_POINTS,
        });
    }

    let tolerance = &config.tolerance;
    validate_points(original)
        .and_then(|_| validate_points(deformed))
        .map_err(|e| MorphError::cage_deform_failed(format!("control points: {}", e)))?;

    let (cage_min, cage_max) = point_bounds(original.iter())
        .ok_or_else(|| MorphError::cage_deform_failed("no control points"))?;
    let span = cage_max - cage_min;
    let cage_volume = span.x * span.y * span.z;
    if !cage_volume.is_finite() || cage_volume <= tolerance.zero_threshold() {
        warn!(cage_volume, "Degenerate cage");
        return Err(MorphError::cage_deform_failed(format!(
            "original cage bounding box volume {:.3e} is degenerate",
            cage_volume
        )));
    }

    match geometry {
        Geometry::Mesh(mesh) => validate_mesh(mesh, tolerance)?,
        Geometry::Points(points) => {
            if points.is_empty() {
                return Err(MorphError::empty_mesh("point set is empty"));
            }
            validate_points(points)?;
            let diagonal = point_bounds(points.iter())
                .map(|(min, max)| (max - min).norm())
                .unwrap_or(0.0);
            // A single point has no extent but is still deformable.
            if points.len() > 1 {
                check_extent(diagonal, tolerance)?;
            }
        }
    }

    let _timer = OperationTimer::with_context(
        "cage_deform",
        geometry.as_mesh().map_or(0, Mesh::face_count),
        geometry.point_count(),
    );

    let controls: [Point3<f64>; 8] = std::array::from_fn(|i| deformed[i]);
    let to_cage = |p: &Point3<f64>| {
        Point3::new(
            clamp01((p.x - cage_min.x) / span.x),
            clamp01((p.y - cage_min.y) / span.y),
            clamp01((p.z - cage_min.z) / span.z),
        )
    };
    let deform = |p: &Point3<f64>| trilinear(&controls, &to_cage(p));

    let output = match geometry {
        Geometry::Mesh(mesh) => {
            let mut result = mesh.clone();
            for vertex in &mut result.vertices {
                vertex.position = deform(&vertex.position);
            }
            compute_vertex_normals(&mut result);
            Geometry::Mesh(result)
        }
        Geometry::Points(points) => Geometry::Points(points.iter().map(deform).collect()),
    };

    let non_finite = match &output {
        Geometry::Mesh(mesh) => validate_points(mesh.vertices.iter().map(|v| &v.position)),
        Geometry::Points(points) => validate_points(points),
    };
    non_finite.map_err(|e| MorphError::cage_deform_failed(e.to_string()))?;

    let displacements: Vec<f64> = original
        .iter()
        .zip(deformed)
        .map(|(a, b)| (b - a).norm())
        .collect();
    let max_control_displacement = displacements.iter().copied().fold(0.0, f64::max);
    let mean_control_displacement = displacements.iter().sum::<f64>() / displacements.len() as f64;

    let origin = Point3::origin();
    let original_bounds = geometry.bounds().unwrap_or((origin, origin));
    let deformed_bounds = output.bounds().unwrap_or((origin, origin));
    let original_volume = box_volume(&original_bounds);
    let volume_ratio = if original_volume > tolerance.zero_threshold() {
        box_volume(&deformed_bounds) / original_volume
    } else {
        1.0
    };

    let metrics = CageDeformMetrics {
        max_control_displacement,
        mean_control_displacement,
        original_bounds,
        deformed_bounds,
        volume_ratio,
    };
    debug!(
        geometry = geometry.kind(),
        points = geometry.point_count(),
        "Deformed geometry"
    );
    info!("Cage deformation complete: {}", metrics);

    Ok(CageDeformResult {
        geometry: output,
        metrics,
    })
}

#[inline]
fn clamp01(t: f64) -> f64 {
    t.clamp(0.0, 1.0)
}

/// Trilinear blend of the corner points at unit cage coordinates `uvw`.
fn trilinear(controls: &[Point3<f64>; 8], uvw: &Point3<f64>) -> Point3<f64> {
    let (u, v, w) = (uvw.x, uvw.y, uvw.z);
    let weights = [
        (1.0 - u) * (1.0 - v) * (1.0 - w),
        u * (1.0 - v) * (1.0 - w),
        (1.0 - u) * v * (1.0 - w),
        u * v * (1.0 - w),
        (1.0 - u) * (1.0 - v) * w,
        u * (1.0 - v) * w,
        (1.0 - u) * v * w,
        u * v * w,
    ];
    let coords = controls
        .iter()
        .zip(weights)
        .fold(nalgebra::Vector3::zeros(), |acc, (p, wt)| acc + p.coords * wt);
    Point3::from(coords)
}

fn box_volume((min, max): &(Point3<f64>, Point3<f64>)) -> f64 {
    let d = max - min;
    d.x * d.y * d.z
}

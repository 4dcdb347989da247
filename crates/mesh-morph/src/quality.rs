//! Mesh quality metrics.
//!
//! [`analyze_quality`] measures edge lengths, per-triangle aspect ratios and
//! per-triangle minimum angles. It does not judge the mesh; callers compare
//! the arrays against [`QualityThresholds`] via [`QualityMetrics::passes`].
//!
//! Quads are measured as their two fan triangles.

#[cfg(feature = "config")]
use serde::Serialize;

use crate::Mesh;
use crate::config::QualityThresholds;
use crate::tolerance::Tolerance;
use crate::topology::{EdgeKey, edge_key};
use crate::types::Triangle;

/// Aspect ratio reported for triangles whose shortest edge is numerically zero.
pub const DEGENERATE_ASPECT_RATIO: f64 = 1e6;

/// Raw quality measurements of a mesh.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct QualityMetrics {
    /// One length per unique edge, in ascending edge-key order.
    pub edge_lengths: Vec<f64>,
    /// `max_edge / min_edge` per (fan) triangle.
    pub aspect_ratios: Vec<f64>,
    /// Smallest interior angle per (fan) triangle, radians.
    pub min_angles: Vec<f64>,
}

/// Summary statistics of a set of edge lengths.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct EdgeLengthStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub std_dev: f64,
}

impl EdgeLengthStats {
    /// Statistics of a slice of lengths; all zero for an empty slice.
    pub fn from_lengths(lengths: &[f64]) -> Self {
        if lengths.is_empty() {
            return Self::default();
        }
        let n = lengths.len() as f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &l in lengths {
            min = min.min(l);
            max = max.max(l);
            sum += l;
        }
        let mean = sum / n;
        let variance = lengths.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / n;
        Self {
            min,
            max,
            mean,
            std_dev: variance.sqrt(),
        }
    }

    /// `std_dev / mean`, 0 when the mean is 0.
    pub fn coefficient_of_variation(&self) -> f64 {
        if self.mean > 0.0 {
            self.std_dev / self.mean
        } else {
            0.0
        }
    }
}

impl QualityMetrics {
    pub fn edge_stats(&self) -> EdgeLengthStats {
        EdgeLengthStats::from_lengths(&self.edge_lengths)
    }

    /// Largest aspect ratio, 0 when there are no triangles.
    pub fn max_aspect_ratio(&self) -> f64 {
        self.aspect_ratios.iter().copied().fold(0.0, f64::max)
    }

    /// Mean aspect ratio, 0 when there are no triangles.
    pub fn mean_aspect_ratio(&self) -> f64 {
        if self.aspect_ratios.is_empty() {
            0.0
        } else {
            self.aspect_ratios.iter().sum::<f64>() / self.aspect_ratios.len() as f64
        }
    }

    /// Smallest interior angle over all triangles; infinite when there are none.
    pub fn min_angle(&self) -> f64 {
        self.min_angles.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// True if no triangle exceeds the aspect ratio limit or falls below the
    /// angle limit.
    pub fn passes(&self, thresholds: &QualityThresholds) -> bool {
        self.max_aspect_ratio() <= thresholds.max_aspect_ratio
            && self.min_angles.iter().all(|&a| a >= thresholds.min_angle)
    }

    /// Human-readable description of the first violated threshold.
    pub fn violation(&self, thresholds: &QualityThresholds) -> Option<String> {
        let max_ar = self.max_aspect_ratio();
        if max_ar > thresholds.max_aspect_ratio {
            return Some(format!(
                "max aspect ratio {:.3} exceeds {:.3}",
                max_ar, thresholds.max_aspect_ratio
            ));
        }
        let min_angle = self.min_angle();
        if min_angle < thresholds.min_angle {
            return Some(format!(
                "min angle {:.4}° below {:.4}°",
                min_angle.to_degrees(),
                thresholds.min_angle.to_degrees()
            ));
        }
        None
    }
}

/// Measure edge lengths, aspect ratios and minimum angles.
///
/// Deterministic: two calls on the same mesh return identical arrays. Faces
/// referencing missing vertices are skipped.
///
/// # Example
///
/// ```
/// use mesh_morph::{Mesh, Tolerance, quality::analyze_quality};
/// use nalgebra::Point3;
///
/// let mesh = Mesh::from_triangles(
///     &[
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(3.0, 0.0, 0.0),
///         Point3::new(0.0, 4.0, 0.0),
///     ],
///     &[[0, 1, 2]],
/// );
/// let q = analyze_quality(&mesh, &Tolerance::default());
/// assert_eq!(q.edge_lengths.len(), 3);
/// assert!((q.aspect_ratios[0] - 5.0 / 3.0).abs() < 1e-12);
/// ```
pub fn analyze_quality(mesh: &Mesh, tolerance: &Tolerance) -> QualityMetrics {
    let vertex_count = mesh.vertex_count() as u32;
    let in_range = |idx: &[u32]| idx.iter().all(|&i| i < vertex_count);

    let mut edges: Vec<EdgeKey> = mesh
        .faces
        .iter()
        .filter(|f| in_range(f.indices()))
        .flat_map(|f| f.edges())
        .filter(|(a, b)| a != b)
        .map(|(a, b)| edge_key(a, b))
        .collect();
    edges.sort_unstable();
    edges.dedup();

    let edge_lengths = edges
        .iter()
        .map(|&(a, b)| (mesh.vertices[b as usize].position - mesh.vertices[a as usize].position).norm())
        .collect();

    let triangles: Vec<Triangle> = mesh
        .faces
        .iter()
        .filter(|f| in_range(f.indices()))
        .flat_map(|f| f.fan_triangles())
        .map(|t| mesh.triangle_at(t))
        .collect();

    let aspect_ratios = triangles
        .iter()
        .map(|t| aspect_ratio(t, tolerance))
        .collect();
    let min_angles = triangles
        .iter()
        .map(|t| {
            let [a, b, c] = t.interior_angles();
            a.min(b).min(c)
        })
        .collect();

    QualityMetrics {
        edge_lengths,
        aspect_ratios,
        min_angles,
    }
}

/// `max_edge / min_edge`, or [`DEGENERATE_ASPECT_RATIO`] when the shortest
/// edge is at or below the zero threshold.
pub fn aspect_ratio(triangle: &Triangle, tolerance: &Tolerance) -> f64 {
    let min_edge = triangle.min_edge_length();
    if min_edge <= tolerance.zero_threshold() {
        return DEGENERATE_ASPECT_RATIO;
    }
    (triangle.max_edge_length() / min_edge).min(DEGENERATE_ASPECT_RATIO)
}

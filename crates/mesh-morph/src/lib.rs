//! Tolerance-aware mesh morphology.
//!
//! This crate changes the shape and resolution of polygon meshes while
//! keeping them valid:
//!
//! - **Subdivision**: Loop and Butterfly 1-to-4 refinement of triangle meshes
//! - **Smoothing**: uniform, inverse-distance, Taubin and mean-curvature-flow
//!   Laplacian smoothing of triangle and quad meshes
//! - **Cage deformation**: trilinear free-form deformation of meshes and
//!   point sets
//! - **Remeshing**: isotropic split / collapse / flip / relax towards a
//!   target edge length, with vertices kept on the input surface
//! - **Quality**: edge lengths, aspect ratios and minimum angles
//!
//! Every operation takes the input by reference, validates it and its
//! parameters before doing any work, and returns a new mesh together with
//! metrics describing the run.
//!
//! # Tolerances
//!
//! All comparisons go through a [`Tolerance`] carried by [`MorphConfig`]:
//! `absolute` (default 1e-6) is the model-space distance below which points
//! are considered coincident, `zero` (default 2^-32) is the threshold for
//! numerically vanishing lengths, areas and volumes. Scale `absolute` with
//! your model units.
//!
//! # Quick Start
//!
//! ```
//! use mesh_morph::{Mesh, MorphConfig, SmoothParams, SubdivideParams};
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
//! let config = MorphConfig::default();
//!
//! let refined = mesh.subdivide(&SubdivideParams::loop_levels(2), &config).unwrap();
//! assert_eq!(refined.mesh.face_count(), 64);
//!
//! let smoothed = refined.mesh.smooth(&SmoothParams::taubin(10), &config).unwrap();
//! println!("{}", smoothed.metrics);
//! ```
//!
//! # Error Handling
//!
//! Operations return [`MorphResult<T>`]. Every [`MorphError`] has a stable
//! code, an [`ErrorKind`] and a [`RecoverySuggestion`]:
//!
//! ```
//! use mesh_morph::{ErrorKind, Mesh, MorphConfig, SubdivideParams};
//!
//! let err = Mesh::new()
//!     .subdivide(&SubdivideParams::loop_levels(1), &MorphConfig::default())
//!     .unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::PreconditionMismatch);
//! println!("[{}] {} ({})", err.code(), err, err.recovery_suggestion());
//! ```
//!
//! # Logging
//!
//! Operations emit [`tracing`] events and spans; see [`tracing_ext`].
//!
//! # Features
//!
//! - `config`: serde support for configuration, parameter and metric types
//!   and TOML / JSON loading of [`MorphConfig`].

mod error;
mod types;

pub mod cage;
pub mod cleanup;
pub mod config;
pub mod quality;
pub mod remesh;
pub mod smooth;
pub mod subdivide;
pub mod surface;
pub mod tolerance;
pub mod topology;
pub mod tracing_ext;
pub mod validate;

pub use error::{
    ErrorCode, ErrorKind, MeshLocation, MorphError, MorphResult, RecoverySuggestion,
};
pub use types::{Face, Mesh, Triangle, Vertex};

pub use config::{MorphConfig, QualityThresholds, RemeshConfig, SmoothingConfig, SubdivisionConfig};
#[cfg(feature = "config")]
pub use config::ConfigError;
pub use tolerance::Tolerance;

pub use cage::{CageDeformMetrics, CageDeformResult, Geometry, MIN_CAGE_CONTROL_POINTS, cage_corners, cage_deform};
pub use quality::{EdgeLengthStats, QualityMetrics, analyze_quality};
pub use remesh::{RemeshMetrics, RemeshParams, RemeshResult, remesh};
pub use smooth::{SmoothParams, SmoothResult, SmoothingMetrics, SmoothingScheme, smooth};
pub use subdivide::{SubdivideParams, SubdivideResult, SubdivisionMetrics, SubdivisionScheme, subdivide};
pub use surface::SurfaceIndex;
pub use topology::MeshTopology;
pub use validate::{ValidityReport, check_validity, validate_mesh};

impl Mesh {
    /// Subdivide the mesh, see [`subdivide()`].
    pub fn subdivide(&self, params: &SubdivideParams, config: &MorphConfig) -> MorphResult<SubdivideResult> {
        subdivide::subdivide(self, params, config)
    }

    /// Smooth the mesh, see [`smooth()`].
    pub fn smooth(&self, params: &SmoothParams, config: &MorphConfig) -> MorphResult<SmoothResult> {
        smooth::smooth(self, params, config)
    }

    /// Deform the mesh with a trilinear cage, see [`cage_deform()`].
    ///
    /// Returns the deformed mesh and the deformation metrics.
    pub fn cage_deform(
        &self,
        original: &[nalgebra::Point3<f64>],
        deformed: &[nalgebra::Point3<f64>],
        config: &MorphConfig,
    ) -> MorphResult<(Mesh, CageDeformMetrics)> {
        let result = cage::cage_deform(&Geometry::Mesh(self.clone()), original, deformed, config)?;
        let metrics = result.metrics;
        result
            .geometry
            .into_mesh()
            .map(|mesh| (mesh, metrics))
            .ok_or_else(|| MorphError::cage_deform_failed("deformation did not return a mesh"))
    }

    /// Remesh towards a uniform edge length, see [`remesh()`].
    pub fn remesh(&self, params: &RemeshParams, config: &MorphConfig) -> MorphResult<RemeshResult> {
        remesh::remesh(self, params, config)
    }

    /// Measure edge lengths, aspect ratios and minimum angles.
    pub fn quality(&self, tolerance: &Tolerance) -> QualityMetrics {
        quality::analyze_quality(self, tolerance)
    }

    /// Check the validity predicate, failing on the first violation.
    pub fn validate(&self, tolerance: &Tolerance) -> MorphResult<()> {
        validate::validate_mesh(self, tolerance)
    }

    /// Collect a validity and connectivity report.
    pub fn validity_report(&self, tolerance: &Tolerance) -> ValidityReport {
        validate::check_validity(self, tolerance)
    }

    /// Recompute area-weighted vertex normals.
    pub fn compute_vertex_normals(&mut self) {
        cleanup::compute_vertex_normals(self)
    }

    /// Drop unreferenced vertices. Returns the number removed.
    pub fn compact(&mut self) -> usize {
        cleanup::remove_unreferenced_vertices(self)
    }

    /// Merge vertices closer than `tolerance.absolute`, then compact.
    /// Returns the number of vertices merged.
    pub fn weld_vertices(&mut self, tolerance: &Tolerance) -> usize {
        let merged = cleanup::weld_vertices(self, tolerance.absolute);
        if merged > 0 {
            cleanup::remove_unreferenced_vertices(self);
        }
        merged
    }

    /// Remove zero-area faces and faces with repeated corners.
    pub fn remove_degenerate_faces(&mut self, tolerance: &Tolerance) -> usize {
        cleanup::remove_degenerate_faces(self, tolerance)
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

    #[test]
    fn test_mesh_conveniences_delegate() {
        let mesh = tetrahedron();
        let config = MorphConfig::default();

        assert_eq!(
            mesh.subdivide(&SubdivideParams::default(), &config).unwrap().mesh.face_count(),
            16
        );
        assert!(mesh.smooth(&SmoothParams::default(), &config).is_ok());
        assert!(mesh.validate(&config.tolerance).is_ok());
        assert!(mesh.validity_report(&config.tolerance).is_watertight);
        assert_eq!(mesh.quality(&config.tolerance).aspect_ratios.len(), 4);
    }

    #[test]
    fn test_mesh_cage_deform_returns_mesh() {
        let mesh = tetrahedron();
        let (min, max) = mesh.bounds().unwrap();
        let cage = cage_corners(min, max);
        let (out, metrics) = mesh.cage_deform(&cage, &cage, &MorphConfig::default()).unwrap();
        assert_eq!(out.face_count(), mesh.face_count());
        assert!((metrics.volume_ratio - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weld_then_compact() {
        let mut mesh = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0, 0.0, 1e-9),
                Point3::new(1.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [3, 4, 2]],
        );
        assert_eq!(mesh.weld_vertices(&Tolerance::default()), 1);
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.compact(), 0);
    }
}

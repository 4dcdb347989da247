//! Property-based tests for the morphology engines.
//!
//! Each property holds for every generated input, not just the fixtures in
//! the unit tests.

use mesh_morph::{
    Geometry, Mesh, MeshTopology, MorphConfig, SmoothParams, SubdivideParams, Tolerance,
    analyze_quality, cage_corners, cage_deform, check_validity, smooth, subdivide, validate_mesh,
};
use nalgebra::{Point3, Vector3};
use proptest::prelude::*;

// =============================================================================
// Strategies
// =============================================================================

fn arb_position() -> impl Strategy<Value = Point3<f64>> {
    prop::array::uniform3(-100.0..100.0f64).prop_map(|[x, y, z]| Point3::new(x, y, z))
}

/// Open height field over an `n x n` grid with spacing 1 and gentle heights,
/// so that every triangle is well shaped.
fn arb_height_field() -> impl Strategy<Value = Mesh> {
    (2u32..6).prop_flat_map(|n| {
        let count = ((n + 1) * (n + 1)) as usize;
        prop::collection::vec(-0.3..0.3f64, count).prop_map(move |heights| {
            let positions: Vec<Point3<f64>> = (0..=n)
                .flat_map(|y| (0..=n).map(move |x| (x, y)))
                .zip(&heights)
                .map(|((x, y), &z)| Point3::new(x as f64, y as f64, z))
                .collect();
            let mut tris = Vec::new();
            for y in 0..n {
                for x in 0..n {
                    let i = y * (n + 1) + x;
                    tris.push([i, i + 1, i + n + 2]);
                    tris.push([i, i + n + 2, i + n + 1]);
                }
            }
            Mesh::from_triangles(&positions, &tris)
        })
    })
}

/// Arbitrary triangle soup, possibly with out-of-range indices and
/// degenerate faces.
fn arb_triangle_soup(index_overshoot: u32) -> impl Strategy<Value = Mesh> {
    (3usize..20).prop_flat_map(move |n| {
        (
            prop::collection::vec(arb_position(), n),
            prop::collection::vec(
                prop::array::uniform3(0u32..(n as u32 + index_overshoot)),
                1..20,
            ),
        )
            .prop_map(|(positions, tris)| Mesh::from_triangles(&positions, &tris))
    })
}

fn arb_point_cloud() -> impl Strategy<Value = Vec<Point3<f64>>> {
    prop::collection::vec(arb_position(), 2..50)
}

// =============================================================================
// Validity
// =============================================================================

proptest! {
    #[test]
    fn proptest_validity_report_agrees_with_validate(mesh in arb_triangle_soup(2)) {
        let tol = Tolerance::default();
        let report = check_validity(&mesh, &tol);
        prop_assert_eq!(report.is_valid(), validate_mesh(&mesh, &tol).is_ok());
    }

    #[test]
    fn proptest_weld_never_adds_vertices(mesh in arb_triangle_soup(0)) {
        let mut welded = mesh.clone();
        let merged = welded.weld_vertices(&Tolerance::new(20.0));
        prop_assert!(welded.vertex_count() <= mesh.vertex_count());
        prop_assert!(welded.face_count() <= mesh.face_count());
        if merged == 0 {
            prop_assert_eq!(&welded.faces, &mesh.faces);
        }
        for face in &welded.faces {
            for &i in face.indices() {
                prop_assert!((i as usize) < welded.vertex_count());
            }
        }
    }
}

// =============================================================================
// Quality
// =============================================================================

proptest! {
    #[test]
    fn proptest_quality_is_deterministic(mesh in arb_height_field()) {
        let tol = Tolerance::default();
        let first = analyze_quality(&mesh, &tol);
        let second = analyze_quality(&mesh, &tol);
        prop_assert_eq!(&first, &second);

        let topo = MeshTopology::build(&mesh);
        prop_assert_eq!(first.edge_lengths.len(), topo.edges().len());
        prop_assert_eq!(first.aspect_ratios.len(), mesh.face_count());
        for &ratio in &first.aspect_ratios {
            prop_assert!(ratio >= 1.0);
        }
        for &angle in &first.min_angles {
            prop_assert!(angle > 0.0 && angle <= std::f64::consts::FRAC_PI_3 + 1e-12);
        }
    }
}

// =============================================================================
// Subdivision
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn proptest_subdivision_quadruples_faces(mesh in arb_height_field(), butterfly in any::<bool>()) {
        let params = if butterfly {
            SubdivideParams::butterfly(1)
        } else {
            SubdivideParams::loop_levels(1)
        };
        let topo = MeshTopology::build(&mesh);
        let result = subdivide(&mesh, &params, &MorphConfig::default()).unwrap();
        prop_assert_eq!(result.mesh.face_count(), 4 * mesh.face_count());
        prop_assert_eq!(
            result.mesh.vertex_count(),
            mesh.vertex_count() + topo.edges().len()
        );
    }
}

// =============================================================================
// Smoothing
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn proptest_smoothing_keeps_connectivity(mesh in arb_height_field(), iterations in 1usize..10) {
        let result = smooth(&mesh, &SmoothParams::taubin(iterations), &MorphConfig::default()).unwrap();
        prop_assert_eq!(&result.mesh.faces, &mesh.faces);
        prop_assert_eq!(result.mesh.vertex_count(), mesh.vertex_count());
        prop_assert!(result.metrics.iterations_performed <= iterations);
        prop_assert!(result.metrics.rms_displacement.is_finite());
    }

    #[test]
    fn proptest_locked_boundary_does_not_move(mesh in arb_height_field()) {
        let params = SmoothParams::laplacian(5).with_lock_boundary(true);
        let result = smooth(&mesh, &params, &MorphConfig::default()).unwrap();
        let topo = MeshTopology::build(&mesh);
        for v in (0..mesh.vertex_count() as u32).filter(|&v| topo.vertex_faces(v).len() < 2) {
            prop_assert_eq!(
                mesh.vertices[v as usize].position,
                result.mesh.vertices[v as usize].position
            );
        }
    }
}

// =============================================================================
// Cage deformation
// =============================================================================

proptest! {
    #[test]
    fn proptest_identity_cage_is_identity(points in arb_point_cloud()) {
        let geometry = Geometry::Points(points.clone());
        let (min, max) = geometry.bounds().unwrap();
        prop_assume!((max - min).min() > 1e-3);

        let cage = cage_corners(min, max);
        let result = cage_deform(&geometry, &cage, &cage, &MorphConfig::default()).unwrap();
        let Geometry::Points(out) = result.geometry else {
            panic!("point cloud came back as a mesh");
        };
        for (a, b) in points.iter().zip(&out) {
            prop_assert!((a - b).norm() <= 1e-9);
        }
        prop_assert!((result.metrics.volume_ratio - 1.0).abs() < 1e-9);
    }

    #[test]
    fn proptest_translated_cage_translates_points(
        points in arb_point_cloud(),
        offset in prop::array::uniform3(-10.0..10.0f64),
    ) {
        let geometry = Geometry::Points(points.clone());
        let (min, max) = geometry.bounds().unwrap();
        prop_assume!((max - min).min() > 1e-3);

        let offset = Vector3::from(offset);
        let cage = cage_corners(min, max);
        let moved: Vec<_> = cage.iter().map(|p| p + offset).collect();
        let result = cage_deform(&geometry, &cage, &moved, &MorphConfig::default()).unwrap();
        let Geometry::Points(out) = result.geometry else {
            panic!("point cloud came back as a mesh");
        };
        for (a, b) in points.iter().zip(&out) {
            prop_assert!(((b - a) - offset).norm() <= 1e-9);
        }
        prop_assert!((result.metrics.max_control_displacement - offset.norm()).abs() < 1e-9);
    }
}

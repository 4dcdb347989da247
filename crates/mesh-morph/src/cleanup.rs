//! Mesh housekeeping shared by the engines: normals, compaction, welding and
//! degenerate-face removal.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use tracing::debug;

use crate::Mesh;
use crate::tolerance::Tolerance;
use crate::types::Face;

/// Compute vertex normals as the area-weighted average of adjacent face normals.
///
/// Vertices with no non-degenerate adjacent face get `normal = None`.
pub fn compute_vertex_normals(mesh: &mut Mesh) {
    let accum = area_weighted_normals(mesh);
    for (vertex, n) in mesh.vertices.iter_mut().zip(accum) {
        let len_sq = n.norm_squared();
        vertex.normal = if len_sq > f64::EPSILON * f64::EPSILON {
            Some(n / len_sq.sqrt())
        } else {
            None
        };
    }
}

/// Sum of unnormalized (area-weighted) face normals per vertex.
///
/// Positions are read from `positions` rather than the mesh so iterative
/// engines can evaluate normals on their working buffers.
pub(crate) fn area_weighted_normals_at(
    faces: &[Face],
    positions: &[Point3<f64>],
) -> Vec<Vector3<f64>> {
    let mut accum = vec![Vector3::zeros(); positions.len()];
    for face in faces {
        for [i0, i1, i2] in face.fan_triangles() {
            let p0 = positions[i0 as usize];
            let n = (positions[i1 as usize] - p0).cross(&(positions[i2 as usize] - p0));
            accum[i0 as usize] += n;
            accum[i1 as usize] += n;
            accum[i2 as usize] += n;
        }
    }
    accum
}

fn area_weighted_normals(mesh: &Mesh) -> Vec<Vector3<f64>> {
    let positions = mesh.positions();
    area_weighted_normals_at(&mesh.faces, &positions)
}

/// Remove unreferenced vertices and compact the vertex array.
///
/// Returns the number of vertices removed.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let original_count = mesh.vertices.len();

    let mut referenced = vec![false; original_count];
    for face in &mesh.faces {
        for &i in face.indices() {
            referenced[i as usize] = true;
        }
    }
    if referenced.iter().all(|&r| r) {
        return 0;
    }

    let mut remap = vec![u32::MAX; original_count];
    let mut new_vertices = Vec::with_capacity(original_count);
    for (old_idx, vertex) in mesh.vertices.iter().enumerate() {
        if referenced[old_idx] {
            remap[old_idx] = new_vertices.len() as u32;
            new_vertices.push(vertex.clone());
        }
    }

    for face in &mut mesh.faces {
        for i in face.indices_mut() {
            *i = remap[*i as usize];
        }
    }

    let removed = original_count - new_vertices.len();
    mesh.vertices = new_vertices;
    debug!(removed, "Removed unreferenced vertices");
    removed
}

/// Weld vertices that are within `epsilon` of each other.
///
/// Uses a spatial hash with cells of size `2 * epsilon`. Each vertex merges
/// into the smallest index in its cluster. Faces left with fewer than three
/// distinct corners are dropped; quads left with three become triangles.
/// Returns the number of vertices merged (they stay in the array until
/// [`remove_unreferenced_vertices`]).
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() || !(epsilon > 0.0) {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        spatial_hash
            .entry(pos_to_cell(&vertex.position, cell_size))
            .or_default()
            .push(idx as u32);
    }

    let mut vertex_remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged_count = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if vertex_remap[idx as usize] != idx {
            continue;
        }
        let cell = pos_to_cell(&vertex.position, cell_size);

        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || vertex_remap[other as usize] != other {
                            continue;
                        }
                        let dist = (vertex.position - mesh.vertices[other as usize].position).norm();
                        if dist <= epsilon {
                            vertex_remap[other as usize] = idx;
                            merged_count += 1;
                        }
                    }
                }
            }
        }
    }

    if merged_count == 0 {
        return 0;
    }

    for i in 0..vertex_remap.len() {
        let mut target = vertex_remap[i];
        while vertex_remap[target as usize] != target {
            target = vertex_remap[target as usize];
        }
        vertex_remap[i] = target;
    }

    let faces = std::mem::take(&mut mesh.faces);
    mesh.faces = faces
        .into_iter()
        .filter_map(|mut face| {
            for i in face.indices_mut() {
                *i = vertex_remap[*i as usize];
            }
            collapse_repeated(face)
        })
        .collect();

    debug!(merged = merged_count, epsilon, "Welded vertices");
    merged_count
}

/// Drop repeated corners of a face; None if fewer than three remain.
fn collapse_repeated(face: Face) -> Option<Face> {
    if !face.has_repeated_index() {
        return Some(face);
    }
    let idx = face.indices();
    let n = idx.len();
    let distinct: Vec<u32> = (0..n)
        .filter(|&i| idx[i] != idx[(i + 1) % n])
        .map(|i| idx[i])
        .collect();
    match distinct.as_slice() {
        &[a, b, c] if a != b && b != c && a != c => Some(Face::Triangle([a, b, c])),
        _ => None,
    }
}

/// Remove faces with repeated corners or with area at or below the zero
/// threshold. Returns the number of faces removed.
pub fn remove_degenerate_faces(mesh: &mut Mesh, tolerance: &Tolerance) -> usize {
    let original_count = mesh.faces.len();
    let vertices = &mesh.vertices;
    mesh.faces.retain(|face| {
        if face.has_repeated_index() {
            return false;
        }
        let area: f64 = face
            .fan_triangles()
            .map(|[i0, i1, i2]| {
                let p0 = vertices[i0 as usize].position;
                (vertices[i1 as usize].position - p0)
                    .cross(&(vertices[i2 as usize].position - p0))
                    .norm()
                    * 0.5
            })
            .sum();
        area > tolerance.zero_threshold()
    });
    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        debug!(removed, "Removed degenerate faces");
    }
    removed
}

fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vertex;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-10
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
    fn test_vertex_normals_planar() {
        let mut mesh = single_triangle();
        compute_vertex_normals(&mut mesh);
        for v in &mesh.vertices {
            let n = v.normal.expect("normal");
            assert!(approx_eq(n.z, 1.0));
        }
    }

    #[test]
    fn test_isolated_vertex_has_no_normal() {
        let mut mesh = single_triangle();
        mesh.vertices.push(Vertex::from_coords(5.0, 5.0, 5.0));
        compute_vertex_normals(&mut mesh);
        assert!(mesh.vertices[3].normal.is_none());
    }

    #[test]
    fn test_remove_unreferenced() {
        let mut mesh = single_triangle();
        mesh.vertices.insert(0, Vertex::from_coords(9.0, 9.0, 9.0));
        mesh.faces = vec![Face::Triangle([1, 2, 3])];

        let removed = remove_unreferenced_vertices(&mut mesh);
        assert_eq!(removed, 1);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.faces[0], Face::Triangle([0, 1, 2]));
        assert!(approx_eq(mesh.vertices[0].position.x, 0.0));
    }

    #[test]
    fn test_weld_merges_close_vertices() {
        let mut mesh = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(1.0 + 1e-8, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            &[[0, 1, 2], [3, 4, 2]],
        );
        let merged = weld_vertices(&mut mesh, 1e-6);
        assert_eq!(merged, 1);
        assert_eq!(mesh.faces[1], Face::Triangle([1, 4, 2]));
        assert_eq!(remove_unreferenced_vertices(&mut mesh), 1);
        assert_eq!(mesh.vertex_count(), 4);
    }

    #[test]
    fn test_weld_drops_collapsed_triangle_and_shrinks_quad() {
        let mut mesh = Mesh::from_faces(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
            ],
            vec![Face::Triangle([0, 1, 2]), Face::Quad([0, 1, 2, 3])],
        );
        weld_vertices(&mut mesh, 1e-6);
        assert_eq!(mesh.faces, vec![Face::Triangle([0, 2, 3])]);
    }

    #[test]
    fn test_remove_degenerate_faces() {
        let mut mesh = Mesh::from_triangles(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            &[[0, 1, 2], [0, 1, 3], [0, 0, 2]],
        );
        let removed = remove_degenerate_faces(&mut mesh, &Tolerance::default());
        assert_eq!(removed, 2);
        assert_eq!(mesh.face_count(), 1);
    }
}

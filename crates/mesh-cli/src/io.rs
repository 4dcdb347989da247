//! OBJ reading and writing.
//!
//! Polygons are kept as loaded: triangles and quads map directly to
//! [`Face`] variants, larger polygons are fanned into triangles. Points and
//! lines are ignored.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use mesh_morph::{Face, Mesh, Vertex};
use tracing::{debug, info};

/// Load an OBJ file, merging all models into one mesh.
pub fn load_obj(path: &Path) -> Result<Mesh> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            triangulate: false,
            single_index: true,
            ignore_points: true,
            ignore_lines: true,
            ..Default::default()
        },
    )
    .with_context(|| format!("Failed to parse OBJ file {:?}", path))?;

    if models.is_empty() {
        bail!("OBJ file {:?} contains no models", path);
    }

    let mut mesh = Mesh::new();
    for model in &models {
        let obj_mesh = &model.mesh;
        let offset = mesh.vertices.len() as u32;
        debug!("OBJ model '{}': loading", model.name);

        mesh.vertices.extend(obj_mesh.positions.chunks_exact(3).map(|p| {
            Vertex::from_coords(p[0] as f64, p[1] as f64, p[2] as f64)
        }));

        // An empty arity list means every face is a triangle
        let arities: Vec<usize> = if obj_mesh.face_arities.is_empty() {
            vec![3; obj_mesh.indices.len() / 3]
        } else {
            obj_mesh.face_arities.iter().map(|&n| n as usize).collect()
        };

        let mut start = 0;
        for arity in arities {
            let Some(corners) = obj_mesh.indices.get(start..start + arity) else {
                bail!("OBJ model '{}' has a truncated face list", model.name);
            };
            start += arity;
            push_polygon(&mut mesh.faces, corners, offset);
        }
    }

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        models = models.len(),
        "Loaded {:?}",
        path
    );
    Ok(mesh)
}

fn push_polygon(faces: &mut Vec<Face>, corners: &[u32], offset: u32) {
    let c: Vec<u32> = corners.iter().map(|&i| i + offset).collect();
    match c.as_slice() {
        &[a, b, d] => faces.push(Face::Triangle([a, b, d])),
        &[a, b, d, e] => faces.push(Face::Quad([a, b, d, e])),
        [first, rest @ ..] if rest.len() >= 2 => {
            faces.extend(rest.windows(2).map(|w| Face::Triangle([*first, w[0], w[1]])));
        }
        _ => {}
    }
}

/// Write a mesh as OBJ, including vertex normals when every vertex has one.
pub fn save_obj(mesh: &Mesh, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).with_context(|| format!("Failed to write {:?}", path))?;

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Saved {:?}",
        path
    );
    Ok(())
}

fn write_obj<W: Write>(mesh: &Mesh, writer: &mut W) -> std::io::Result<()> {
    writeln!(writer, "# OBJ file exported by mesh-morph")?;
    writeln!(writer, "# Vertices: {}", mesh.vertex_count())?;
    writeln!(writer, "# Faces: {}", mesh.face_count())?;
    writeln!(writer)?;

    for v in &mesh.vertices {
        writeln!(writer, "v {:.9} {:.9} {:.9}", v.position.x, v.position.y, v.position.z)?;
    }

    let has_normals = !mesh.vertices.is_empty() && mesh.vertices.iter().all(|v| v.normal.is_some());
    if has_normals {
        for n in mesh.vertices.iter().filter_map(|v| v.normal) {
            writeln!(writer, "vn {:.6} {:.6} {:.6}", n.x, n.y, n.z)?;
        }
    }

    for face in &mesh.faces {
        write!(writer, "f")?;
        for &i in face.indices() {
            if has_normals {
                write!(writer, " {}//{}", i + 1, i + 1)?;
            } else {
                write!(writer, " {}", i + 1)?;
            }
        }
        writeln!(writer)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn test_quads_survive_round_trip() {
        let mesh = Mesh::from_faces(
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(2.0, 0.0, 0.0),
            ],
            vec![Face::Quad([0, 1, 2, 3]), Face::Triangle([1, 4, 2])],
        );
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patch.obj");

        save_obj(&mesh, &path).unwrap();
        let loaded = load_obj(&path).unwrap();

        assert_eq!(loaded.vertex_count(), 5);
        assert_eq!(loaded.faces, mesh.faces);
    }

    #[test]
    fn test_pentagon_is_fanned() {
        let mut faces = Vec::new();
        push_polygon(&mut faces, &[0, 1, 2, 3, 4], 10);
        assert_eq!(
            faces,
            vec![
                Face::Triangle([10, 11, 12]),
                Face::Triangle([10, 12, 13]),
                Face::Triangle([10, 13, 14]),
            ]
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_obj(Path::new("/nonexistent/mesh.obj")).is_err());
    }
}

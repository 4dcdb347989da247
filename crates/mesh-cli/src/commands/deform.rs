//! mesh-morph deform command - trilinear cage deformation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use mesh_morph::{CageDeformMetrics, MorphConfig, cage_corners};
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{Cli, OutputFormat, io, output};

/// Control points as read from a `--cage` JSON file.
#[derive(Deserialize)]
struct CageFile {
    original: Vec<[f64; 3]>,
    deformed: Vec<[f64; 3]>,
}

#[derive(Debug, Serialize)]
struct DeformReport {
    input: String,
    output: String,
    control_points: usize,
    metrics: CageDeformMetrics,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    cage: Option<&Path>,
    scale: Option<&[f64]>,
    translate: Option<&[f64]>,
    config: &MorphConfig,
    cli: &Cli,
) -> Result<()> {
    let mesh = io::load_obj(input)?;

    let (original, deformed) = match cage {
        Some(path) => load_cage(path)?,
        None => {
            if scale.is_none() && translate.is_none() {
                bail!("Specify a cage with --cage, or a --scale / --translate of the bounding box");
            }
            for (name, values) in [("--scale", scale), ("--translate", translate)] {
                if let Some(v) = values
                    && v.len() != 3
                {
                    bail!("{} takes three comma-separated values, got {}", name, v.len());
                }
            }
            let Some((min, max)) = mesh.bounds() else {
                bail!("Cannot build a bounding-box cage for a mesh without vertices");
            };
            bounding_box_cage(min, max, scale, translate)
        }
    };

    output::info(
        &format!(
            "Deforming {} vertices with {} control points...",
            mesh.vertex_count(),
            original.len()
        ),
        cli.format,
        cli.quiet,
    );

    let (mut deformed_mesh, metrics) = mesh.cage_deform(&original, &deformed, config)?;
    deformed_mesh.compute_vertex_normals();
    io::save_obj(&deformed_mesh, output_path)?;

    let report = DeformReport {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        control_points: original.len(),
        metrics,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&report, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Deformed mesh saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!("  {}: {}", "Metrics".cyan(), report.metrics);
            }
        }
    }

    Ok(())
}

fn load_cage(path: &Path) -> Result<(Vec<Point3<f64>>, Vec<Point3<f64>>)> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read cage {:?}", path))?;
    let cage: CageFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse cage {:?}", path))?;
    let to_points = |v: Vec<[f64; 3]>| v.into_iter().map(Point3::from).collect::<Vec<_>>();
    Ok((to_points(cage.original), to_points(cage.deformed)))
}

/// Corners of the bounding box, and the same corners scaled about the box
/// centre and then translated.
fn bounding_box_cage(
    min: Point3<f64>,
    max: Point3<f64>,
    scale: Option<&[f64]>,
    translate: Option<&[f64]>,
) -> (Vec<Point3<f64>>, Vec<Point3<f64>>) {
    let to_vector = |v: Option<&[f64]>, default: f64| match v {
        Some(&[x, y, z]) => Vector3::new(x, y, z),
        _ => Vector3::repeat(default),
    };
    let scale = to_vector(scale, 1.0);
    let offset = to_vector(translate, 0.0);
    let centre = nalgebra::center(&min, &max);

    let original = cage_corners(min, max).to_vec();
    let deformed = original
        .iter()
        .map(|p| centre + (p - centre).component_mul(&scale) + offset)
        .collect();
    (original, deformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_cage_scales_about_centre() {
        let (original, deformed) = bounding_box_cage(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 2.0, 2.0),
            Some(&[2.0, 1.0, 1.0]),
            Some(&[0.0, 0.0, 5.0]),
        );
        assert_eq!(original.len(), 8);
        assert_eq!(original[0], Point3::new(0.0, 0.0, 0.0));
        assert_eq!(deformed[0], Point3::new(-1.0, 0.0, 5.0));
        assert_eq!(deformed[7], Point3::new(3.0, 2.0, 7.0));
    }

    #[test]
    fn test_cage_file_parses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cage.json");
        std::fs::write(
            &path,
            r#"{"original": [[0,0,0],[1,0,0]], "deformed": [[0,0,1],[1,0,1]]}"#,
        )
        .unwrap();
        let (original, deformed) = load_cage(&path).unwrap();
        assert_eq!(original.len(), 2);
        assert_eq!(deformed[1], Point3::new(1.0, 0.0, 1.0));
    }
}

//! mesh-morph quality command - report mesh quality statistics.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use mesh_morph::{EdgeLengthStats, MorphConfig};
use serde::Serialize;

use crate::{Cli, OutputFormat, io, output};

#[derive(Debug, Serialize)]
struct QualityReport {
    path: String,
    vertices: usize,
    faces: usize,
    triangles: usize,
    edges: EdgeLengthStats,
    max_aspect_ratio: f64,
    mean_aspect_ratio: f64,
    min_angle_degrees: f64,
    passes_thresholds: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    violation: Option<String>,
    valid: bool,
    manifold: bool,
    watertight: bool,
    boundary_edges: usize,
}

pub fn run(input: &Path, config: &MorphConfig, cli: &Cli) -> Result<()> {
    let mesh = io::load_obj(input)?;
    let validity = mesh.validity_report(&config.tolerance);
    let quality = mesh.quality(&config.tolerance);

    let min_angle = quality.min_angle();
    let report = QualityReport {
        path: input.display().to_string(),
        vertices: mesh.vertex_count(),
        faces: mesh.face_count(),
        triangles: mesh.triangle_count(),
        edges: quality.edge_stats(),
        max_aspect_ratio: quality.max_aspect_ratio(),
        mean_aspect_ratio: quality.mean_aspect_ratio(),
        min_angle_degrees: if min_angle.is_finite() {
            min_angle.to_degrees()
        } else {
            0.0
        },
        passes_thresholds: quality.passes(&config.quality),
        violation: quality.violation(&config.quality),
        valid: validity.is_valid(),
        manifold: validity.is_manifold,
        watertight: validity.is_watertight,
        boundary_edges: validity.boundary_edge_count,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&report, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!("{}", "Mesh Quality".bold().underline());
                println!("  {}: {}", "File".cyan(), report.path);
                println!(
                    "  {}: {}  {}: {} ({} triangles)",
                    "Vertices".cyan(),
                    report.vertices,
                    "Faces".cyan(),
                    report.faces,
                    report.triangles
                );
                println!(
                    "  {}: min {:.6}, max {:.6}, mean {:.6}, std dev {:.6}",
                    "Edge lengths".cyan(),
                    report.edges.min,
                    report.edges.max,
                    report.edges.mean,
                    report.edges.std_dev
                );
                println!(
                    "  {}: max {:.3}, mean {:.3}",
                    "Aspect ratio".cyan(),
                    report.max_aspect_ratio,
                    report.mean_aspect_ratio
                );
                println!(
                    "  {}: {:.3}°",
                    "Min angle".cyan(),
                    report.min_angle_degrees
                );
                println!(
                    "  {}: {}  {}: {}  {}: {}",
                    "Valid".cyan(),
                    yes_no(report.valid),
                    "Manifold".cyan(),
                    yes_no(report.manifold),
                    "Watertight".cyan(),
                    yes_no(report.watertight)
                );
                match &report.violation {
                    None => output::success("Quality thresholds met", cli.format, cli.quiet),
                    Some(v) => output::warning(v, cli.format, cli.quiet),
                }
            }
        }
    }

    Ok(())
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value { "yes".green() } else { "no".red() }
}

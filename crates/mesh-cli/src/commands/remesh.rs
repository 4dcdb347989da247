//! mesh-morph remesh command - isotropic remeshing.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use mesh_morph::{MorphConfig, RemeshMetrics, RemeshParams};
use serde::Serialize;

use crate::{Cli, OutputFormat, io, output};

#[derive(Debug, Serialize)]
struct RemeshReport {
    input: String,
    output: String,
    metrics: RemeshMetrics,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    target: f64,
    max_iterations: usize,
    preserve_features: bool,
    config: &MorphConfig,
    cli: &Cli,
) -> Result<()> {
    let mesh = io::load_obj(input)?;
    let params = RemeshParams::new(target)
        .with_max_iterations(max_iterations)
        .with_preserve_features(preserve_features);

    output::info(
        &format!(
            "Remeshing towards edge length {} ({} faces)...",
            target,
            mesh.face_count()
        ),
        cli.format,
        cli.quiet,
    );

    let result = mesh.remesh(&params, config)?;
    io::save_obj(&result.mesh, output_path)?;

    let report = RemeshReport {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        metrics: result.metrics,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&report, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Remeshed mesh saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                let m = &report.metrics;
                println!(
                    "  {}: {} → {} faces",
                    "Faces".cyan(),
                    m.faces_before,
                    m.faces_after
                );
                println!(
                    "  {}: mean {:.6} (target {:.6}), std dev {:.6}, uniformity {:.3}",
                    "Edges".cyan(),
                    m.mean_edge_length,
                    m.target_edge_length,
                    m.edge_length_std_dev,
                    m.uniformity_score
                );
                println!(
                    "  {}: {} splits, {} collapses, {} flips, {} welds in {} iteration(s)",
                    "Operations".cyan(),
                    m.edges_split,
                    m.edges_collapsed,
                    m.edges_flipped,
                    m.vertices_welded,
                    m.iterations
                );
                if !m.converged {
                    output::warning(
                        "Edge lengths did not converge to the target",
                        cli.format,
                        cli.quiet,
                    );
                }
            }
        }
    }

    Ok(())
}

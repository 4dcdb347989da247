//! mesh-morph subdivide command - Loop or Butterfly refinement.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use mesh_morph::{MorphConfig, SubdivideParams, SubdivisionMetrics, SubdivisionScheme};
use serde::Serialize;

use crate::commands::MeshCounts;
use crate::{Cli, OutputFormat, SchemeArg, io, output};

#[derive(Debug, Serialize)]
struct SubdivideReport {
    input: String,
    output: String,
    scheme: &'static str,
    before: MeshCounts,
    after: MeshCounts,
    metrics: SubdivisionMetrics,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    scheme: SchemeArg,
    levels: u32,
    config: &MorphConfig,
    cli: &Cli,
) -> Result<()> {
    let mesh = io::load_obj(input)?;

    let scheme = match scheme {
        SchemeArg::Loop => SubdivisionScheme::Loop,
        SchemeArg::Butterfly => SubdivisionScheme::Butterfly,
    };
    let params = SubdivideParams::new(scheme, levels);

    output::info(
        &format!(
            "{} subdivision, {} level(s) ({} faces)...",
            scheme.name(),
            levels,
            mesh.face_count()
        ),
        cli.format,
        cli.quiet,
    );

    let result = mesh.subdivide(&params, config)?;
    io::save_obj(&result.mesh, output_path)?;

    let report = SubdivideReport {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        scheme: scheme.name(),
        before: MeshCounts::from(&mesh),
        after: MeshCounts::from(&result.mesh),
        metrics: result.metrics,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&report, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Subdivided mesh saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!(
                    "  {}: {} → {} faces, {} → {} vertices",
                    "Mesh".cyan(),
                    report.before.faces,
                    report.after.faces,
                    report.before.vertices,
                    report.after.vertices
                );
                println!("  {}: {}", "Metrics".cyan(), report.metrics);
            }
        }
    }

    Ok(())
}

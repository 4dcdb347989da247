//! mesh-morph smooth command - Laplacian-family smoothing.

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use mesh_morph::{MorphConfig, SmoothParams, SmoothingMetrics, SmoothingScheme};
use serde::Serialize;

use crate::{Cli, OutputFormat, SmoothingArg, io, output};

/// Smoothing options collected from the command line.
pub struct SmoothArgs {
    pub scheme: SmoothingArg,
    pub iterations: usize,
    pub lambda: f64,
    pub mu: f64,
    pub time_step: f64,
    pub lock_boundary: bool,
    pub require_converged: bool,
}

impl SmoothArgs {
    fn params(&self) -> SmoothParams {
        let scheme = match self.scheme {
            SmoothingArg::Uniform => SmoothingScheme::Uniform,
            SmoothingArg::Cotangent => SmoothingScheme::Cotangent,
            SmoothingArg::Taubin => SmoothingScheme::Taubin {
                lambda: self.lambda,
                mu: self.mu,
            },
            SmoothingArg::Mcf => SmoothingScheme::MeanCurvatureFlow {
                time_step: self.time_step,
            },
        };
        SmoothParams::new(scheme, self.iterations).with_lock_boundary(self.lock_boundary)
    }
}

#[derive(Debug, Serialize)]
struct SmoothReport {
    input: String,
    output: String,
    scheme: &'static str,
    lock_boundary: bool,
    metrics: SmoothingMetrics,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    args: SmoothArgs,
    config: &MorphConfig,
    cli: &Cli,
) -> Result<()> {
    let mesh = io::load_obj(input)?;
    let params = args.params();

    output::info(
        &format!(
            "{} smoothing, up to {} iterations ({} vertices)...",
            params.scheme.name(),
            params.iterations,
            mesh.vertex_count()
        ),
        cli.format,
        cli.quiet,
    );

    let mut result = mesh.smooth(&params, config)?;
    if args.require_converged {
        result = result.require_converged()?;
    }
    result.mesh.compute_vertex_normals();
    io::save_obj(&result.mesh, output_path)?;

    let report = SmoothReport {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        scheme: params.scheme.name(),
        lock_boundary: params.lock_boundary,
        metrics: result.metrics,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&report, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("Smoothed mesh saved to {}", output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!("  {}: {}", "Metrics".cyan(), report.metrics);
                if !report.metrics.converged {
                    output::warning(
                        "Iteration limit reached before convergence",
                        cli.format,
                        cli.quiet,
                    );
                }
            }
        }
    }

    Ok(())
}

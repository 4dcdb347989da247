//! mesh-morph: Command-line interface for mesh morphology.
//!
//! This tool exposes the mesh-morph engines (subdivision, smoothing, cage
//! deformation, remeshing and quality analysis) from the command line,
//! suitable for scripting and CI/CD pipelines.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=mesh_morph=info` - Basic operation logging
//! - `RUST_LOG=mesh_morph=debug` - Per-iteration progress
//! - `RUST_LOG=mesh_morph::timing=info` - Performance timing
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Two levels of Loop subdivision with info logging
//! RUST_LOG=mesh_morph=info mesh-morph subdivide input.obj -o output.obj --levels 2
//!
//! # Quality report as JSON
//! mesh-morph --format json quality input.obj
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use mesh_morph::MorphConfig;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod io;
mod output;

use commands::{deform, quality, remesh, smooth, subdivide};

/// mesh-morph - Subdivide, smooth, deform and remesh polygon meshes.
#[derive(Parser)]
#[command(name = "mesh-morph")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// TOML file with tolerance, quality and iteration limits
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Report edge length, aspect ratio and angle statistics
    Quality {
        /// Input OBJ file
        input: PathBuf,
    },

    /// Refine a triangle mesh with Loop or Butterfly subdivision
    Subdivide {
        /// Input OBJ file
        input: PathBuf,

        /// Output OBJ file
        #[arg(short, long)]
        output: PathBuf,

        /// Subdivision scheme
        #[arg(long, default_value = "loop")]
        scheme: SchemeArg,

        /// Number of 1-to-4 refinement levels
        #[arg(long, short, default_value = "1")]
        levels: u32,
    },

    /// Smooth vertex positions with a Laplacian-family scheme
    Smooth {
        /// Input OBJ file
        input: PathBuf,

        /// Output OBJ file
        #[arg(short, long)]
        output: PathBuf,

        /// Smoothing scheme
        #[arg(long, default_value = "taubin")]
        scheme: SmoothingArg,

        /// Maximum number of iterations
        #[arg(long, short, default_value = "10")]
        iterations: usize,

        /// Taubin shrink factor
        #[arg(long, default_value = "0.5")]
        lambda: f64,

        /// Taubin inflate factor
        #[arg(long, default_value = "-0.53", allow_hyphen_values = true)]
        mu: f64,

        /// Mean-curvature-flow time step
        #[arg(long, default_value = "0.1")]
        time_step: f64,

        /// Keep boundary vertices fixed
        #[arg(long)]
        lock_boundary: bool,

        /// Fail if the iteration limit is reached before convergence
        #[arg(long)]
        require_converged: bool,
    },

    /// Deform a mesh with an 8-point trilinear cage
    Deform {
        /// Input OBJ file
        input: PathBuf,

        /// Output OBJ file
        #[arg(short, long)]
        output: PathBuf,

        /// JSON file with `original` and `deformed` control point arrays
        #[arg(long, conflicts_with_all = ["scale", "translate"])]
        cage: Option<PathBuf>,

        /// Scale the bounding-box cage about its centre (x,y,z)
        #[arg(long, value_delimiter = ',')]
        scale: Option<Vec<f64>>,

        /// Translate the bounding-box cage (x,y,z)
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        translate: Option<Vec<f64>>,
    },

    /// Isotropic remeshing towards a target edge length
    Remesh {
        /// Input OBJ file
        input: PathBuf,

        /// Output OBJ file
        #[arg(short, long)]
        output: PathBuf,

        /// Target edge length in model units
        #[arg(long, short)]
        target: f64,

        /// Maximum number of split/collapse/flip/relax passes
        #[arg(long, default_value = "10")]
        max_iterations: usize,

        /// Allow boundary vertices to move and collapse
        #[arg(long)]
        no_preserve_features: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SchemeArg {
    /// Approximating, smooth limit surface
    Loop,
    /// Interpolating, keeps the input vertices
    Butterfly,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SmoothingArg {
    /// Move each vertex to the mean of its neighbours
    Uniform,
    /// Inverse-edge-length weighted Laplacian
    Cotangent,
    /// Alternating shrink/inflate, approximately volume preserving
    Taubin,
    /// Explicit mean curvature flow
    Mcf,
}

/// Load the `--config` file, or the defaults.
fn load_config(path: Option<&Path>) -> Result<MorphConfig> {
    let config = match path {
        Some(path) => MorphConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => MorphConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Initialize the tracing subscriber based on verbosity level.
fn init_tracing(verbose: u8, quiet: bool) {
    if quiet {
        return;
    }

    // RUST_LOG wins over -v flags
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "mesh_morph=info,mesh_cli=info",
            2 => "mesh_morph=debug,mesh_cli=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match &cli.command {
        Commands::Quality { input } => quality::run(input, &config, cli),
        Commands::Subdivide {
            input,
            output,
            scheme,
            levels,
        } => subdivide::run(input, output, *scheme, *levels, &config, cli),
        Commands::Smooth {
            input,
            output,
            scheme,
            iterations,
            lambda,
            mu,
            time_step,
            lock_boundary,
            require_converged,
        } => smooth::run(
            input,
            output,
            smooth::SmoothArgs {
                scheme: *scheme,
                iterations: *iterations,
                lambda: *lambda,
                mu: *mu,
                time_step: *time_step,
                lock_boundary: *lock_boundary,
                require_converged: *require_converged,
            },
            &config,
            cli,
        ),
        Commands::Deform {
            input,
            output,
            cage,
            scale,
            translate,
        } => deform::run(
            input,
            output,
            cage.as_deref(),
            scale.as_deref(),
            translate.as_deref(),
            &config,
            cli,
        ),
        Commands::Remesh {
            input,
            output,
            target,
            max_iterations,
            no_preserve_features,
        } => remesh::run(
            input,
            output,
            *target,
            *max_iterations,
            !*no_preserve_features,
            &config,
            cli,
        ),
    }
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        if !cli.quiet {
            if let Some(morph_err) = e.downcast_ref::<mesh_morph::MorphError>() {
                eprintln!("{}: {}", "Error".red().bold(), morph_err);
                eprintln!("  {}: {}", "Code".cyan(), morph_err.code());
                eprintln!(
                    "  {}: {}",
                    "Suggestion".green(),
                    morph_err.recovery_suggestion()
                );
                if let Some(location) = morph_err.location() {
                    eprintln!("  {}: {}", "Location".yellow(), location);
                }
            } else {
                eprintln!("{}: {}", "Error".red().bold(), e);
                for cause in e.chain().skip(1) {
                    eprintln!("  {}: {}", "Caused by".yellow(), cause);
                }
            }
        }
        std::process::exit(1);
    }

    Ok(())
}

//! Output helpers shared by the subcommands.
//!
//! Text mode writes colored status lines; JSON mode keeps stdout reserved for
//! the single result document and sends status lines to stderr.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a result document in the selected format.
pub fn print<T: Serialize + std::fmt::Debug>(value: &T, format: OutputFormat, quiet: bool) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("{}: failed to serialize result: {}", "Error".red().bold(), e),
        },
        OutputFormat::Text => {
            if !quiet {
                println!("{:#?}", value);
            }
        }
    }
}

/// Progress message.
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Text => println!("{} {}", "→".blue(), message),
        OutputFormat::Json => eprintln!("{}", message),
    }
}

pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Text => println!("{} {}", "✓".green().bold(), message),
        OutputFormat::Json => eprintln!("{}", message),
    }
}

/// Non-fatal problem with the result, such as a run that did not converge.
pub fn warning(message: &str, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Text => println!("{} {}", "!".yellow().bold(), message.yellow()),
        OutputFormat::Json => eprintln!("warning: {}", message),
    }
}

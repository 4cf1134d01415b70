//! Shared output helpers for text and JSON modes.

use colored::Colorize;
use serde::Serialize;

use crate::OutputFormat;

/// Print a serializable value as pretty JSON, or its debug form in text mode.
pub fn print<T: Serialize + std::fmt::Debug>(value: &T, format: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{}: failed to serialize output: {e}", "Error".red().bold()),
        },
        OutputFormat::Text => println!("{value:#?}"),
    }
}

/// Print a success line. Text mode only.
pub fn success(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an informational line. Text mode only.
pub fn info(message: &str, format: OutputFormat, quiet: bool) {
    if quiet || matches!(format, OutputFormat::Json) {
        return;
    }
    println!("{} {}", "•".cyan(), message);
}

//! anatomesh: segment CT slice series into anatomical surface meshes.
//!
//! # Logging
//!
//! Set the `RUST_LOG` environment variable to control log output:
//! - `RUST_LOG=anatomesh=info` - Stage progress
//! - `RUST_LOG=anatomesh=debug` - Per-step voxel counts and mesh state
//! - `RUST_LOG=anatomesh::timing=info` - Stage timing only
//! - `RUST_LOG=debug` - All debug output
//!
//! # Example
//!
//! ```bash
//! # Segment bone from a raw slice series
//! anatomesh segment scans/patient01 -o out/bone.stl --structure bone
//!
//! # Window statistics for every structure, as JSON
//! anatomesh --format json inspect scans/patient01
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;
mod output;

use commands::{inspect, profiles, segment};

/// anatomesh - Segment anatomical structures from CT volumes into meshes.
#[derive(Parser)]
#[command(name = "anatomesh")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format for results
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress all non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Increase output verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment one structure from a slice series and write its mesh
    Segment {
        /// Directory with series.json and *.raw slices
        input: PathBuf,

        /// Output mesh file (.stl or .obj)
        #[arg(short, long)]
        output: PathBuf,

        /// Structure to segment (bone, tissue, tumor, organ)
        #[arg(long, short)]
        structure: String,

        /// TOML file with segmentation parameters
        #[arg(long)]
        config: Option<PathBuf>,

        /// Emit vertices in voxel-index units instead of millimetres
        #[arg(long)]
        voxel_space: bool,

        /// Leave mesh holes open
        #[arg(long)]
        no_fill_holes: bool,
    },

    /// List the built-in structure profiles
    Profiles,

    /// Show volume statistics and per-structure window occupancy
    Inspect {
        /// Directory with series.json and *.raw slices
        input: PathBuf,
    },
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
            1 => "anatomesh=info",
            2 => "anatomesh=debug",
            _ => "trace",
        };
        EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    #[cfg(debug_assertions)]
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Commands::Segment {
            input,
            output,
            structure,
            config,
            voxel_space,
            no_fill_holes,
        } => segment::run(
            input,
            output,
            structure,
            config.as_deref(),
            *voxel_space,
            *no_fill_holes,
            &cli,
        ),
        Commands::Profiles => profiles::run(&cli),
        Commands::Inspect { input } => inspect::run(input, &cli),
    };

    if let Err(e) = &result {
        if !cli.quiet {
            if let Some(seg_err) = e.downcast_ref::<anatomesh::SegmentError>() {
                eprintln!("{}: {}", "Error".red().bold(), seg_err);
                eprintln!("  {}: {}", "Code".cyan(), seg_err.code());
                eprintln!(
                    "  {}: {}",
                    "Suggestion".green(),
                    seg_err.recovery_suggestion()
                );
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

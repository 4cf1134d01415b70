//! anatomesh segment command - slice series in, mesh file out.

use std::path::Path;

use anatomesh::{
    PipelineResult, RawSeries, SegmentBuilder, SegmentParams, Structure, VertexSpace,
    VolumeSource,
};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Debug, Serialize)]
struct SegmentOutput<'a> {
    input: String,
    output: String,
    watertight: bool,
    #[serde(flatten)]
    result: &'a PipelineResult,
}

pub fn run(
    input: &Path,
    output_path: &Path,
    structure: &str,
    config: Option<&Path>,
    voxel_space: bool,
    no_fill_holes: bool,
    cli: &Cli,
) -> Result<()> {
    // Reject unknown names before touching the series.
    let structure: Structure = structure.parse()?;

    let mut params = match config {
        Some(path) => SegmentParams::from_toml_file(path)
            .with_context(|| format!("Failed to load parameters from {:?}", path))?,
        None => SegmentParams::default(),
    };
    if voxel_space {
        params.vertex_space = VertexSpace::Voxel;
    }
    if no_fill_holes {
        params.fill_holes = false;
    }

    let volume = RawSeries::new(input)
        .load_volume()
        .with_context(|| format!("Failed to load series from {:?}", input))?;

    let result = SegmentBuilder::new(volume)
        .structure(structure)
        .params(params)
        .export_to(output_path)
        .run()?;

    let summary = SegmentOutput {
        input: input.display().to_string(),
        output: output_path.display().to_string(),
        watertight: result.finalize.is_watertight(),
        result: &result,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&summary, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                output::success(
                    &format!("{} mesh saved to {}", structure, output_path.display()),
                    cli.format,
                    cli.quiet,
                );
                println!("{result}");
                if !summary.watertight {
                    println!(
                        "  {}: {} boundary edges remain ({} holes skipped)",
                        "Warning".yellow(),
                        result.finalize.boundary_edges,
                        result.finalize.holes.holes_skipped
                    );
                }
            }
        }
    }

    Ok(())
}

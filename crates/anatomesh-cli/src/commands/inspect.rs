//! anatomesh inspect command - volume statistics without segmenting.

use std::path::Path;

use anatomesh::{RawSeries, Structure, VolumeSource};
use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Debug, Serialize)]
struct WindowCount {
    structure: Structure,
    low: f32,
    high: f32,
    voxels: usize,
    fraction: f64,
}

#[derive(Debug, Serialize)]
struct InspectResult {
    input: String,
    /// `(depth, height, width)`
    shape: [usize; 3],
    /// Millimetres, `[x, y, z]`
    spacing: [f64; 3],
    total_voxels: usize,
    min_value: f32,
    max_value: f32,
    windows: Vec<WindowCount>,
}

pub fn run(input: &Path, cli: &Cli) -> Result<()> {
    let series = RawSeries::new(input);
    let volume = series
        .load_volume()
        .with_context(|| format!("Failed to load series from {:?}", input))?;

    let total_voxels = volume.values().len();
    let (min_value, max_value) = volume.value_range();
    let spacing = volume.spacing();

    let windows = Structure::ALL
        .iter()
        .map(|&structure| {
            let profile = structure.profile();
            let voxels = volume.count_in_window(profile.low, profile.high);
            WindowCount {
                structure,
                low: profile.low,
                high: profile.high,
                voxels,
                fraction: voxels as f64 / total_voxels.max(1) as f64,
            }
        })
        .collect();

    let result = InspectResult {
        input: input.display().to_string(),
        shape: volume.shape(),
        spacing: [spacing.x, spacing.y, spacing.z],
        total_voxels,
        min_value,
        max_value,
        windows,
    };

    match cli.format {
        OutputFormat::Json => {
            output::print(&result, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                let [depth, height, width] = result.shape;
                println!("{}", "Volume".bold());
                println!("  {}: {}", "Series".cyan(), result.input);
                println!("  {}: {} x {} x {} (depth x height x width)", "Shape".cyan(), depth, height, width);
                println!(
                    "  {}: {:.3} x {:.3} x {:.3} mm",
                    "Spacing".cyan(),
                    result.spacing[0],
                    result.spacing[1],
                    result.spacing[2]
                );
                println!(
                    "  {}: {} .. {}",
                    "Range".cyan(),
                    result.min_value,
                    result.max_value
                );
                println!();
                println!("{}", "Windows (unsmoothed)".bold());
                for w in &result.windows {
                    println!(
                        "  {:<8} [{:>6}, {:>6}] {:>12} voxels ({:.2}%)",
                        w.structure.as_str().cyan(),
                        w.low,
                        w.high,
                        w.voxels,
                        w.fraction * 100.0
                    );
                }
                if result.windows.iter().all(|w| w.voxels == 0) {
                    output::info("No voxel falls inside any structure window", cli.format, cli.quiet);
                }
            }
        }
    }

    Ok(())
}

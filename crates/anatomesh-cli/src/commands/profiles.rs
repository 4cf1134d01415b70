//! anatomesh profiles command - list built-in structures.

use anatomesh::{Structure, StructureProfile};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::{Cli, OutputFormat, output};

#[derive(Debug, Serialize)]
struct ProfileEntry {
    structure: Structure,
    #[serde(flatten)]
    profile: StructureProfile,
}

pub fn run(cli: &Cli) -> Result<()> {
    let entries: Vec<ProfileEntry> = Structure::ALL
        .iter()
        .map(|&structure| ProfileEntry {
            structure,
            profile: structure.profile(),
        })
        .collect();

    match cli.format {
        OutputFormat::Json => {
            output::print(&entries, cli.format, cli.quiet);
        }
        OutputFormat::Text => {
            if !cli.quiet {
                println!(
                    "{:<8} {:>16} {:>8} {:>8} {:>11}",
                    "Name".bold(),
                    "Window (HU)".bold(),
                    "Open".bold(),
                    "Close".bold(),
                    "Min voxels".bold()
                );
                for entry in &entries {
                    let p = &entry.profile;
                    println!(
                        "{:<8} {:>16} {:>8} {:>8} {:>11}",
                        entry.structure.as_str().cyan(),
                        format!("{} .. {}", p.low, p.high),
                        p.opening_radius,
                        p.closing_radius,
                        p.min_component_voxels
                    );
                }
            }
        }
    }

    Ok(())
}

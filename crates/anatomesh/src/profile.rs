//! Anatomical structures and their segmentation profiles.
//!
//! The set of structures is closed: each variant is bound to a fixed
//! intensity window and morphology parameters. Parsing a name that is not in
//! the set is a configuration error raised before any array work.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SegmentError;

/// A supported anatomical structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Structure {
    Bone,
    Tissue,
    Tumor,
    Organ,
}

impl Structure {
    /// Every supported structure.
    pub const ALL: [Structure; 4] = [
        Structure::Bone,
        Structure::Tissue,
        Structure::Tumor,
        Structure::Organ,
    ];

    /// Lower-case name used on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Structure::Bone => "bone",
            Structure::Tissue => "tissue",
            Structure::Tumor => "tumor",
            Structure::Organ => "organ",
        }
    }

    /// The built-in profile for this structure.
    pub fn profile(&self) -> StructureProfile {
        match self {
            Structure::Bone => StructureProfile {
                low: 600.0,
                high: 3000.0,
                opening_radius: 2,
                closing_radius: 7,
                min_component_voxels: 20_000,
            },
            Structure::Tissue => StructureProfile {
                low: -400.0,
                high: 100.0,
                opening_radius: 1,
                closing_radius: 5,
                min_component_voxels: 10_000,
            },
            Structure::Tumor => StructureProfile {
                low: 100.0,
                high: 200.0,
                opening_radius: 1,
                closing_radius: 3,
                min_component_voxels: 5_000,
            },
            Structure::Organ => StructureProfile {
                low: -300.0,
                high: 80.0,
                opening_radius: 2,
                closing_radius: 5,
                min_component_voxels: 15_000,
            },
        }
    }
}

impl fmt::Display for Structure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Structure {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Structure::ALL
            .into_iter()
            .find(|structure| structure.as_str() == name)
            .ok_or_else(|| SegmentError::unknown_structure(s))
    }
}

/// Intensity window and morphology parameters for one structure.
///
/// Thresholds are in calibrated units; radii are in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureProfile {
    /// Inclusive lower intensity bound.
    pub low: f32,
    /// Inclusive upper intensity bound.
    pub high: f32,
    /// Radius of the spherical element used for opening.
    pub opening_radius: usize,
    /// Radius of the spherical element used for closing.
    pub closing_radius: usize,
    /// Connected components smaller than this are discarded.
    pub min_component_voxels: usize,
}

impl StructureProfile {
    /// True if `value` lies inside the closed window `[low, high]`.
    #[inline]
    pub fn contains(&self, value: f32) -> bool {
        self.low <= value && value <= self.high
    }
}

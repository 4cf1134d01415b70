//! Pipeline parameters shared by every structure.
//!
//! Per-structure values (thresholds, radii, minimum component size) live in
//! [`StructureProfile`](crate::StructureProfile). Everything else is here and
//! can be saved to or loaded from TOML.
//!
//! # Example TOML
//!
//! ```toml
//! gaussian_sigma = 1.0
//! connectivity = "vertex"
//! vertex_space = "physical"
//! fill_holes = true
//! max_hole_edges = 100
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SegmentError, SegmentResult};

/// Neighborhood used to decide whether two foreground voxels touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// 6-connected: voxels sharing a face.
    Face,
    /// 18-connected: voxels sharing a face or an edge.
    Edge,
    /// 26-connected: voxels sharing a face, an edge or a corner.
    #[default]
    Vertex,
}

impl Connectivity {
    /// Neighbor offsets for this connectivity, excluding the origin.
    pub fn offsets(&self) -> Vec<[isize; 3]> {
        let max_nonzero = match self {
            Connectivity::Face => 1,
            Connectivity::Edge => 2,
            Connectivity::Vertex => 3,
        };
        let mut offsets = Vec::with_capacity(26);
        for dz in -1isize..=1 {
            for dy in -1isize..=1 {
                for dx in -1isize..=1 {
                    let nonzero = [dx, dy, dz].iter().filter(|&&d| d != 0).count();
                    if nonzero > 0 && nonzero <= max_nonzero {
                        offsets.push([dx, dy, dz]);
                    }
                }
            }
        }
        offsets
    }
}

/// Coordinate space of extracted mesh vertices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VertexSpace {
    /// Voxel index units, axes ordered (x, y, z) = (width, height, depth).
    Voxel,
    /// Millimetres: voxel index scaled by the volume spacing.
    #[default]
    Physical,
}

/// Parameters for the segmentation pipeline.
///
/// # Example
///
/// ```
/// use anatomesh::SegmentParams;
///
/// let params = SegmentParams {
///     max_hole_edges: 200,
///     ..Default::default()
/// };
/// assert!(params.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Standard deviation of the Gaussian pre-smoothing, in voxels.
    ///
    /// Default: `1.0`
    pub gaussian_sigma: f64,

    /// Gaussian kernel half-width in multiples of sigma.
    ///
    /// Default: `4.0`
    pub gaussian_truncate: f64,

    /// Radius of the spherical median filter applied to the raw mask.
    ///
    /// Default: `1`
    pub median_radius: usize,

    /// Radius of the shell trimmed before closing and restored after it.
    ///
    /// Default: `1`
    pub shell_radius: usize,

    /// Connectivity used for small-object removal and component selection.
    ///
    /// Default: [`Connectivity::Vertex`] (26-connected)
    pub connectivity: Connectivity,

    /// Coordinate space of the output mesh.
    ///
    /// Default: [`VertexSpace::Physical`]
    pub vertex_space: VertexSpace,

    /// Vertices closer than this are merged during finalization.
    ///
    /// Default: `1e-6`
    pub weld_epsilon: f64,

    /// Faces with area below this are removed during finalization.
    ///
    /// Default: `1e-12`
    pub degenerate_area_threshold: f64,

    /// Whether to fill boundary holes after cleanup.
    ///
    /// Default: `true`
    pub fill_holes: bool,

    /// Holes with more boundary edges than this are left open.
    ///
    /// Default: `100`
    pub max_hole_edges: usize,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            gaussian_sigma: 1.0,
            gaussian_truncate: 4.0,
            median_radius: 1,
            shell_radius: 1,
            connectivity: Connectivity::Vertex,
            vertex_space: VertexSpace::Physical,
            weld_epsilon: 1e-6,
            degenerate_area_threshold: 1e-12,
            fill_holes: true,
            max_hole_edges: 100,
        }
    }
}

impl SegmentParams {
    /// Cheaper settings for previews: shorter smoothing kernel, no hole filling.
    pub fn fast() -> Self {
        Self {
            gaussian_truncate: 2.5,
            fill_holes: false,
            ..Default::default()
        }
    }

    /// Settings that try harder to close the output surface.
    pub fn high_quality() -> Self {
        Self {
            max_hole_edges: 1000,
            ..Default::default()
        }
    }

    /// Check that every value is usable.
    pub fn validate(&self) -> SegmentResult<()> {
        fn non_negative(name: &'static str, value: f64) -> SegmentResult<()> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(SegmentError::invalid_parameter(
                    name,
                    format!("expected a finite non-negative value, got {value}"),
                ))
            }
        }

        non_negative("gaussian_sigma", self.gaussian_sigma)?;
        non_negative("gaussian_truncate", self.gaussian_truncate)?;
        non_negative("weld_epsilon", self.weld_epsilon)?;
        non_negative("degenerate_area_threshold", self.degenerate_area_threshold)?;
        Ok(())
    }

    /// Parse parameters from a TOML string. Missing keys take default values.
    pub fn from_toml(toml_str: &str) -> SegmentResult<Self> {
        let params: Self = toml::from_str(toml_str)
            .map_err(|e| SegmentError::invalid_parameter("config", e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    /// Load parameters from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> SegmentResult<Self> {
        let path = path.as_ref();
        let contents =
            std::fs::read_to_string(path).map_err(|e| SegmentError::ingest_read(path, e))?;
        Self::from_toml(&contents)
    }

    /// Serialize parameters to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_offsets() {
        assert_eq!(Connectivity::Face.offsets().len(), 6);
        assert_eq!(Connectivity::Edge.offsets().len(), 18);
        assert_eq!(Connectivity::Vertex.offsets().len(), 26);
        assert!(!Connectivity::Vertex.offsets().contains(&[0, 0, 0]));
    }

    #[test]
    fn test_params_default() {
        let params = SegmentParams::default();
        assert_eq!(params.gaussian_sigma, 1.0);
        assert_eq!(params.median_radius, 1);
        assert_eq!(params.connectivity, Connectivity::Vertex);
        assert_eq!(params.vertex_space, VertexSpace::Physical);
        assert!(params.fill_holes);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_presets() {
        assert!(!SegmentParams::fast().fill_holes);
        assert!(SegmentParams::high_quality().max_hole_edges > SegmentParams::default().max_hole_edges);
    }

    #[test]
    fn test_validate_rejects_negative_sigma() {
        let params = SegmentParams {
            gaussian_sigma: -1.0,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            SegmentError::InvalidParameter {
                parameter: "gaussian_sigma",
                ..
            }
        ));
    }

    #[test]
    fn test_toml_roundtrip_and_partial() {
        let params = SegmentParams::high_quality();
        let text = params.to_toml().unwrap();
        assert_eq!(SegmentParams::from_toml(&text).unwrap(), params);

        let partial = SegmentParams::from_toml("connectivity = \"face\"\nfill_holes = false\n").unwrap();
        assert_eq!(partial.connectivity, Connectivity::Face);
        assert!(!partial.fill_holes);
        assert_eq!(partial.max_hole_edges, 100);
    }

    #[test]
    fn test_toml_rejects_garbage() {
        assert!(SegmentParams::from_toml("gaussian_sigma = \"wide\"").is_err());
    }
}

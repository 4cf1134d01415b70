//! End-to-end segmentation: volume in, finalized mesh out.
//!
//! Stages run strictly in order and each one fully finishes before the next
//! starts:
//!
//! ```text
//! Volume -> classify -> refine -> select_largest -> extract_surface -> finalize_mesh
//! ```
//!
//! Any stage failure aborts the run. The error is logged once at error
//! level with its code and then returned to the caller.
//!
//! # Example
//!
//! ```
//! use anatomesh::{SegmentParams, Structure, Volume, segment_volume};
//! use nalgebra::Vector3;
//!
//! let volume = Volume::from_fn([32, 32, 32], Vector3::new(1.0, 1.0, 1.0), |x, y, z| {
//!     let d2 = [x, y, z].iter().map(|&c| (c as f64 - 15.5).powi(2)).sum::<f64>();
//!     if d2 < 100.0 { 1200.0 } else { -1000.0 }
//! })
//! .unwrap();
//!
//! let params = SegmentParams::default();
//! let mut profile = Structure::Bone.profile();
//! profile.closing_radius = 3;
//! profile.min_component_voxels = 100;
//! let result = segment_volume(volume, &profile, &params).unwrap();
//! assert!(result.mesh.face_count() > 0);
//! ```

use std::fmt;

use serde::Serialize;
use tracing::{error, info, instrument};

use crate::classify::{ClassifyReport, classify};
use crate::components::{SelectionReport, select_largest};
use crate::error::{SegmentError, SegmentResult};
use crate::extract::{ExtractReport, extract_surface};
use crate::finalize::{FinalizeReport, finalize_mesh};
use crate::morphology::{RefineReport, refine};
use crate::params::SegmentParams;
use crate::profile::{Structure, StructureProfile};
use crate::tracing_ext::{StageTimer, log_mask_state};
use crate::types::{Mesh, MeshStats};
use crate::volume::Volume;

/// Output of a successful pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    /// Structure name when run from a built-in profile.
    pub structure: Option<Structure>,
    pub profile: StructureProfile,
    /// The finalized mesh.
    #[serde(skip)]
    pub mesh: Mesh,
    /// Summary of the finalized mesh.
    pub mesh_stats: MeshStats,
    pub classify: ClassifyReport,
    pub refine: RefineReport,
    pub selection: SelectionReport,
    pub extract: ExtractReport,
    pub finalize: FinalizeReport,
}

impl fmt::Display for PipelineResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .structure
            .map(|s| s.to_string())
            .unwrap_or_else(|| "custom".to_string());
        writeln!(f, "Segmentation ({name}):")?;
        writeln!(
            f,
            "  Window: [{}, {}], {} of {} voxels inside",
            self.profile.low,
            self.profile.high,
            self.classify.voxels_in_window,
            self.classify.total_voxels
        )?;
        writeln!(f, "  Refinement:")?;
        for step in &self.refine.steps {
            writeln!(f, "    {:<22} {:>10} -> {:>10}", step.step, step.before, step.after)?;
        }
        writeln!(f, "  Selection: {}", self.selection)?;
        writeln!(
            f,
            "  Surface: {} vertices, {} faces at level {}",
            self.extract.vertices, self.extract.faces, self.extract.level
        )?;
        writeln!(
            f,
            "  Mesh: {} vertices, {} faces, {} boundary edges",
            self.mesh_stats.vertices, self.mesh_stats.faces, self.finalize.boundary_edges
        )?;
        write!(
            f,
            "  Extent: {:.2} x {:.2} x {:.2}",
            self.mesh_stats.extent[0], self.mesh_stats.extent[1], self.mesh_stats.extent[2]
        )
    }
}

/// Segment `volume` with a custom profile.
///
/// Takes the volume by value: the classifier smooths it in place, so it
/// is not reusable for another structure afterwards.
#[instrument(skip_all, fields(low = profile.low, high = profile.high))]
pub fn segment_volume(
    volume: Volume,
    profile: &StructureProfile,
    params: &SegmentParams,
) -> SegmentResult<PipelineResult> {
    run(volume, None, profile, params).inspect_err(log_failure)
}

/// Segment `volume` with a built-in structure profile.
pub fn segment_structure(
    volume: Volume,
    structure: Structure,
    params: &SegmentParams,
) -> SegmentResult<PipelineResult> {
    run(volume, Some(structure), &structure.profile(), params).inspect_err(log_failure)
}

/// Segment `volume` for a structure given by name.
///
/// An unknown name fails before any voxel is touched.
pub fn segment_named(
    volume: Volume,
    name: &str,
    params: &SegmentParams,
) -> SegmentResult<PipelineResult> {
    let structure = name.parse::<Structure>().inspect_err(log_failure)?;
    segment_structure(volume, structure, params)
}

fn log_failure(err: &SegmentError) {
    error!(code = err.code().as_str(), error = %err, "Segmentation failed");
}

fn run(
    mut volume: Volume,
    structure: Option<Structure>,
    profile: &StructureProfile,
    params: &SegmentParams,
) -> SegmentResult<PipelineResult> {
    params.validate()?;
    if profile.low > profile.high {
        return Err(SegmentError::invalid_parameter(
            "profile",
            format!("window [{}, {}] is empty", profile.low, profile.high),
        ));
    }

    let _timer = StageTimer::with_voxels("segment", volume.grid().total_voxels());
    info!(
        structure = structure.map(|s| s.as_str()).unwrap_or("custom"),
        shape = ?volume.shape(),
        "Starting segmentation"
    );

    let (raw, classify_report) = classify(&mut volume, profile, params);
    let (refined, refine_report) = refine(&raw, profile, params);
    drop(raw);
    let (selected, selection) = select_largest(&refined, params.connectivity);
    drop(refined);
    log_mask_state(&selected, "selected component");
    let (mesh, extract) = extract_surface(&selected, volume.spacing(), params.vertex_space)?;
    let (mesh, finalize) = finalize_mesh(mesh, params)?;

    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        watertight = finalize.is_watertight(),
        "Segmentation complete"
    );

    Ok(PipelineResult {
        structure,
        profile: *profile,
        mesh_stats: mesh.stats(),
        mesh,
        classify: classify_report,
        refine: refine_report,
        selection,
        extract,
        finalize,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn cube_volume(inside: f32) -> Volume {
        Volume::from_fn([24, 24, 24], Vector3::new(1.0, 1.0, 1.0), |x, y, z| {
            let inner = |c: usize| (6..18).contains(&c);
            if inner(x) && inner(y) && inner(z) { inside } else { -1000.0 }
        })
        .unwrap()
    }

    fn small_profile() -> StructureProfile {
        StructureProfile {
            min_component_voxels: 50,
            closing_radius: 2,
            ..Structure::Bone.profile()
        }
    }

    #[test]
    fn test_cube_segments_to_closed_mesh() {
        let result = segment_volume(cube_volume(1500.0), &small_profile(), &SegmentParams::default())
            .unwrap();
        assert_eq!(result.structure, None);
        assert_eq!(result.selection.component_count, 1);
        assert!(result.finalize.is_watertight());
        assert!(result.mesh.indices_in_range());
        let extent = result.mesh.extent();
        assert!(extent.x > 9.0 && extent.x < 14.0, "extent {extent:?}");
    }

    #[test]
    fn test_no_voxels_in_window_fails() {
        let err = segment_volume(cube_volume(0.0), &small_profile(), &SegmentParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            SegmentError::EmptyOrFullSegmentation { full: false, .. }
        ));
    }

    #[test]
    fn test_unknown_name_fails_first() {
        let err = segment_named(cube_volume(1500.0), "cartilage", &SegmentParams::default())
            .unwrap_err();
        assert!(matches!(err, SegmentError::UnknownStructure { .. }));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = SegmentParams {
            weld_epsilon: f64::NAN,
            ..Default::default()
        };
        let err = segment_volume(cube_volume(1500.0), &small_profile(), &params).unwrap_err();
        assert!(matches!(err, SegmentError::InvalidParameter { .. }));
    }

    #[test]
    fn test_result_display_and_json() {
        let result = segment_volume(cube_volume(1500.0), &small_profile(), &SegmentParams::default())
            .unwrap();
        let text = result.to_string();
        assert!(text.contains("Segmentation (custom)"));
        assert!(text.contains("remove_small_objects"));

        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("mesh").is_none());
        assert_eq!(json["refine"]["steps"].as_array().unwrap().len(), 7);
        assert_eq!(json["mesh_stats"]["faces"], result.mesh.face_count());
    }
}

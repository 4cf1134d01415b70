//! Fluent builder for pipeline runs.
//!
//! # Example
//!
//! ```no_run
//! use anatomesh::{RawSeries, SegmentBuilder, SegmentParams, Structure, VolumeSource};
//!
//! let volume = RawSeries::new("series/").load_volume().unwrap();
//!
//! let result = SegmentBuilder::new(volume)
//!     .structure(Structure::Bone)     // Built-in HU window and radii
//!     .params(SegmentParams::fast())  // Skip hole filling
//!     .export_to("out/bone.stl")      // Written once the mesh is final
//!     .run()
//!     .unwrap();
//!
//! println!("{result}");
//! ```

use std::path::PathBuf;

use tracing::info;

use crate::error::{SegmentError, SegmentResult};
use crate::io::{FileMeshWriter, MeshWriter};
use crate::params::SegmentParams;
use crate::pipeline::{PipelineResult, segment_structure, segment_volume};
use crate::profile::{Structure, StructureProfile};
use crate::volume::Volume;

/// What the builder segments for.
#[derive(Debug, Clone, Copy)]
enum Target {
    Structure(Structure),
    Profile(StructureProfile),
}

/// Fluent builder around [`segment_volume`] and [`segment_structure`].
///
/// A structure or a custom profile must be set before [`run`](Self::run).
/// Setting one replaces the other.
pub struct SegmentBuilder {
    volume: Volume,
    target: Option<Target>,
    params: SegmentParams,
    export: Option<PathBuf>,
    writer: Box<dyn MeshWriter + Send + Sync>,
}

impl SegmentBuilder {
    /// Start a run over `volume` (takes ownership).
    pub fn new(volume: Volume) -> Self {
        Self {
            volume,
            target: None,
            params: SegmentParams::default(),
            export: None,
            writer: Box::new(FileMeshWriter),
        }
    }

    /// Segment a built-in structure.
    pub fn structure(mut self, structure: Structure) -> Self {
        self.target = Some(Target::Structure(structure));
        self
    }

    /// Segment with a custom window and morphology.
    pub fn profile(mut self, profile: StructureProfile) -> Self {
        self.target = Some(Target::Profile(profile));
        self
    }

    /// Replace the tuning parameters.
    pub fn params(mut self, params: SegmentParams) -> Self {
        self.params = params;
        self
    }

    /// Write the finished mesh to `path` after a successful run.
    pub fn export_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.export = Some(path.into());
        self
    }

    /// Use a custom writer for the export. Defaults to [`FileMeshWriter`].
    pub fn writer(mut self, writer: impl MeshWriter + Send + Sync + 'static) -> Self {
        self.writer = Box::new(writer);
        self
    }

    /// Run the pipeline, then export if a path was set.
    ///
    /// Nothing is written when any stage fails.
    pub fn run(self) -> SegmentResult<PipelineResult> {
        let Some(target) = self.target else {
            return Err(SegmentError::invalid_parameter(
                "target",
                "set a structure or a profile before running",
            ));
        };

        let result = match target {
            Target::Structure(structure) => segment_structure(self.volume, structure, &self.params)?,
            Target::Profile(profile) => segment_volume(self.volume, &profile, &self.params)?,
        };

        if let Some(path) = &self.export {
            self.writer.write_mesh(&result.mesh, path)?;
            info!(path = %path.display(), "Mesh exported");
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mesh;
    use nalgebra::Vector3;
    use std::path::Path;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingWriter {
        written: Arc<Mutex<Vec<(PathBuf, usize)>>>,
    }

    impl MeshWriter for RecordingWriter {
        fn write_mesh(&self, mesh: &Mesh, path: &Path) -> SegmentResult<()> {
            self.written
                .lock()
                .unwrap()
                .push((path.to_path_buf(), mesh.face_count()));
            Ok(())
        }
    }

    fn cube_volume(inside: f32) -> Volume {
        Volume::from_fn([20, 20, 20], Vector3::new(1.0, 1.0, 1.0), |x, y, z| {
            let inner = |c: usize| (5..15).contains(&c);
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
    fn test_requires_target() {
        let err = SegmentBuilder::new(cube_volume(1500.0)).run().unwrap_err();
        assert!(matches!(
            err,
            SegmentError::InvalidParameter { parameter: "target", .. }
        ));
    }

    #[test]
    fn test_exports_through_writer() {
        let writer = RecordingWriter::default();
        let result = SegmentBuilder::new(cube_volume(1500.0))
            .profile(small_profile())
            .export_to("out/cube.stl")
            .writer(writer.clone())
            .run()
            .unwrap();

        let written = writer.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].0, PathBuf::from("out/cube.stl"));
        assert_eq!(written[0].1, result.mesh.face_count());
    }

    #[test]
    fn test_failed_run_writes_nothing() {
        let writer = RecordingWriter::default();
        let err = SegmentBuilder::new(cube_volume(0.0))
            .profile(small_profile())
            .export_to("out/none.stl")
            .writer(writer.clone())
            .run()
            .unwrap_err();

        assert!(matches!(err, SegmentError::EmptyOrFullSegmentation { .. }));
        assert!(writer.written.lock().unwrap().is_empty());
    }

    #[test]
    fn test_last_target_wins() {
        // Bone window would keep the cube; the profile set afterwards does not.
        let empty_window = StructureProfile {
            low: 5000.0,
            high: 6000.0,
            ..small_profile()
        };
        let err = SegmentBuilder::new(cube_volume(1500.0))
            .structure(Structure::Bone)
            .profile(empty_window)
            .run()
            .unwrap_err();
        assert!(matches!(err, SegmentError::EmptyOrFullSegmentation { full: false, .. }));
    }
}

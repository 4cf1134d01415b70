//! Anatomical structure segmentation from calibrated CT volumes.
//!
//! This crate turns a 3D intensity volume into a closed triangle mesh of one
//! anatomical structure. The pipeline has five stages:
//!
//! - **Classify**: Gaussian smoothing, then an intensity window per structure
//! - **Refine**: median filter, opening, closing, hole filling and speckle removal
//! - **Select**: keep the largest connected region
//! - **Extract**: surface nets at the mask's iso-level
//! - **Finalize**: weld, drop degenerate and duplicate faces, close small holes
//!
//! # Units and Axes
//!
//! Volumes are indexed `(depth, height, width)` = `(z, y, x)` and carry a
//! voxel spacing in millimetres, `[x, y, z]`. Mesh vertices are `(x, y, z)`
//! in millimetres unless [`VertexSpace::Voxel`] is requested.
//!
//! Face winding is counter-clockwise when viewed from outside the surface.
//!
//! # Quick Start
//!
//! ```no_run
//! use anatomesh::{RawSeries, SegmentParams, Structure, VolumeSource, save_mesh};
//! use std::path::Path;
//!
//! let volume = RawSeries::new("series/").load_volume().unwrap();
//! let result = anatomesh::segment_structure(volume, Structure::Bone, &SegmentParams::default())
//!     .unwrap();
//!
//! println!("{result}");
//! save_mesh(&result.mesh, Path::new("bone.stl")).unwrap();
//! ```
//!
//! # Structures
//!
//! | Structure | Window (HU)  | Opening | Closing | Min voxels |
//! |-----------|--------------|---------|---------|------------|
//! | `bone`    | 600 to 3000  | 2       | 7       | 20000      |
//! | `tissue`  | -400 to 100  | 1       | 5       | 10000      |
//! | `tumor`   | 100 to 200   | 1       | 3       | 5000       |
//! | `organ`   | -300 to 80   | 2       | 5       | 15000      |
//!
//! A custom [`StructureProfile`] can be passed to [`segment_volume`] instead.
//!
//! # Working With Masks
//!
//! Each stage is a plain function and can be used on its own:
//!
//! ```
//! use anatomesh::{BinaryMask, Connectivity};
//! use anatomesh::components::label;
//!
//! let mask = BinaryMask::from_fn([4, 4, 8], |x, _, _| x < 2 || x > 5);
//! let labeled = label(&mask, Connectivity::Vertex);
//! assert_eq!(labeled.component_count(), 2);
//! ```
//!
//! # Errors
//!
//! Every fallible operation returns [`SegmentResult`]. Errors carry a stable
//! [`ErrorCode`] and a [`RecoverySuggestion`], and render through `miette`.

mod builder;
mod error;
mod grid;
mod mask;
mod params;
mod pipeline;
mod profile;
pub mod tracing_ext;
mod types;
mod volume;

pub mod adjacency;
pub mod classify;
pub mod components;
pub mod extract;
pub mod finalize;
pub mod holes;
pub mod ingest;
pub mod io;
pub mod morphology;

pub use error::{ErrorCode, RecoverySuggestion, SegmentError, SegmentResult};
pub use grid::GridShape;
pub use mask::BinaryMask;
pub use params::{Connectivity, SegmentParams, VertexSpace};
pub use profile::{Structure, StructureProfile};
pub use types::{Mesh, MeshStats, Triangle, Vertex};
pub use volume::Volume;

pub use adjacency::MeshAdjacency;
pub use builder::SegmentBuilder;
pub use classify::{ClassifyReport, classify};
pub use components::{LabeledComponents, SelectionReport, label, select_largest};
pub use extract::{ExtractReport, extract_surface};
pub use finalize::{FinalizeReport, finalize_mesh};
pub use holes::{BoundaryLoop, HoleFillReport, detect_holes, fill_holes};
pub use ingest::{RawSeries, SampleType, SeriesMetadata, VolumeSource};
pub use io::{FileMeshWriter, MeshFormat, MeshWriter, save_mesh, save_obj, save_stl};
pub use morphology::{RefineReport, StepCount, refine};
pub use pipeline::{PipelineResult, segment_named, segment_structure, segment_volume};
pub use tracing_ext::StageTimer;

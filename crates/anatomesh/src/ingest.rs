//! Loading calibrated volumes from a directory of raw slices.
//!
//! # Layout
//!
//! ```text
//! series/
//!   series.json
//!   slice_000.raw
//!   slice_001.raw
//!   ...
//! ```
//!
//! `series.json` describes every slice:
//!
//! ```json
//! {
//!   "width": 512,
//!   "height": 512,
//!   "spacing": [0.7, 0.7, 1.25],
//!   "sample_type": "i16",
//!   "rescale_intercept": -1024.0,
//!   "rescale_slope": 1.0
//! }
//! ```
//!
//! Slices are little-endian and stacked in file-name order. Missing
//! calibration fields default to intercept 0 and slope 1.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{SegmentError, SegmentResult};
use crate::volume::Volume;

/// Supplies the calibrated volume a pipeline run consumes.
pub trait VolumeSource {
    fn load_volume(&self) -> SegmentResult<Volume>;
}

impl VolumeSource for Volume {
    fn load_volume(&self) -> SegmentResult<Volume> {
        Ok(self.clone())
    }
}

/// Stored sample encoding of each slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    #[default]
    I16,
    U16,
    F32,
}

impl SampleType {
    /// Bytes per sample.
    pub fn size(&self) -> usize {
        match self {
            SampleType::I16 | SampleType::U16 => 2,
            SampleType::F32 => 4,
        }
    }

    fn decode(self, bytes: &[u8]) -> impl Iterator<Item = f32> + '_ {
        bytes.chunks_exact(self.size()).map(move |b| match self {
            SampleType::I16 => i16::from_le_bytes([b[0], b[1]]) as f32,
            SampleType::U16 => u16::from_le_bytes([b[0], b[1]]) as f32,
            SampleType::F32 => f32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        })
    }
}

/// Contents of `series.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesMetadata {
    /// Samples per row.
    pub width: usize,
    /// Rows per slice.
    pub height: usize,
    /// Voxel spacing in millimetres, `[x, y, z]`.
    pub spacing: [f64; 3],
    #[serde(default)]
    pub sample_type: SampleType,
    pub rescale_intercept: Option<f64>,
    pub rescale_slope: Option<f64>,
}

impl SeriesMetadata {
    /// `(intercept, slope)` with defaults applied.
    pub fn calibration(&self) -> (f64, f64) {
        (
            self.rescale_intercept.unwrap_or(0.0),
            self.rescale_slope.unwrap_or(1.0),
        )
    }
}

/// A directory of raw slices plus `series.json`.
#[derive(Debug, Clone)]
pub struct RawSeries {
    dir: PathBuf,
}

impl RawSeries {
    /// File name of the metadata document.
    pub const METADATA_FILE: &'static str = "series.json";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Slice files sorted by name.
    pub fn slice_paths(&self) -> SegmentResult<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Err(SegmentError::input_absent(format!(
                "series directory {} does not exist",
                self.dir.display()
            )));
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| SegmentError::ingest_read(&self.dir, e))?;

        let mut slices = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SegmentError::ingest_read(&self.dir, e))?.path();
            let is_raw = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("raw"));
            if is_raw && path.is_file() {
                slices.push(path);
            }
        }
        slices.sort();

        if slices.is_empty() {
            return Err(SegmentError::input_absent(format!(
                "no .raw slices found in {}",
                self.dir.display()
            )));
        }
        Ok(slices)
    }

    /// Parse `series.json`.
    pub fn metadata(&self) -> SegmentResult<SeriesMetadata> {
        let path = self.dir.join(Self::METADATA_FILE);
        let text = fs::read_to_string(&path).map_err(|e| SegmentError::ingest_read(&path, e))?;
        let metadata: SeriesMetadata =
            serde_json::from_str(&text).map_err(|e| SegmentError::ingest_parse(&path, e.to_string()))?;

        if metadata.width == 0 || metadata.height == 0 {
            return Err(SegmentError::ingest_parse(
                &path,
                format!("slice size {}x{} has no samples", metadata.width, metadata.height),
            ));
        }
        if metadata.rescale_intercept.is_none() || metadata.rescale_slope.is_none() {
            warn!(
                path = %path.display(),
                "Calibration incomplete, defaulting to intercept 0 and slope 1"
            );
        }
        Ok(metadata)
    }
}

impl VolumeSource for RawSeries {
    fn load_volume(&self) -> SegmentResult<Volume> {
        let slices = self.slice_paths()?;
        let metadata = self.metadata()?;
        let (intercept, slope) = metadata.calibration();
        let per_slice = metadata.width * metadata.height;
        let expected_bytes = per_slice * metadata.sample_type.size();

        info!(
            dir = %self.dir.display(),
            slices = slices.len(),
            width = metadata.width,
            height = metadata.height,
            "Loading raw series"
        );

        let mut values = Vec::with_capacity(per_slice * slices.len());
        for path in &slices {
            let bytes = fs::read(path).map_err(|e| SegmentError::ingest_read(path, e))?;
            if bytes.len() != expected_bytes {
                return Err(SegmentError::ShapeMismatch {
                    expected: per_slice,
                    actual: bytes.len() / metadata.sample_type.size(),
                });
            }
            values.extend(
                metadata
                    .sample_type
                    .decode(&bytes)
                    .map(|raw| (raw as f64 * slope + intercept) as f32),
            );
            debug!(path = %path.display(), "Slice read");
        }

        let [sx, sy, sz] = metadata.spacing;
        let volume = Volume::new(
            [slices.len(), metadata.height, metadata.width],
            Vector3::new(sx, sy, sz),
            values,
        )?;
        let (min, max) = volume.value_range();
        info!(shape = ?volume.shape(), min, max, "Volume loaded");
        Ok(volume)
    }
}

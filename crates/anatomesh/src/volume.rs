//! Calibrated 3D scalar volume.

use nalgebra::Vector3;
use tracing::debug;

use crate::error::{SegmentError, SegmentResult};
use crate::grid::GridShape;

/// A dense 3D field of calibrated intensities (HU-like units) with voxel spacing.
///
/// The shape is fixed for the lifetime of the volume. Values only change
/// through the classifier's in-place smoothing.
#[derive(Debug, Clone)]
pub struct Volume {
    grid: GridShape,
    /// Voxel spacing in millimetres along [x, y, z].
    spacing: Vector3<f64>,
    values: Vec<f32>,
}

impl Volume {
    /// Create a volume from an imaging shape `(depth, height, width)` and
    /// x-fastest samples.
    pub fn new(shape: [usize; 3], spacing: Vector3<f64>, values: Vec<f32>) -> SegmentResult<Self> {
        let grid = GridShape::from_shape(shape);
        if grid.total_voxels() == 0 {
            return Err(SegmentError::input_absent(format!(
                "volume shape {:?} has no voxels",
                shape
            )));
        }
        if values.len() != grid.total_voxels() {
            return Err(SegmentError::ShapeMismatch {
                expected: grid.total_voxels(),
                actual: values.len(),
            });
        }
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(SegmentError::invalid_parameter(
                "spacing",
                format!("voxel spacing must be positive, got {:?}", spacing.as_slice()),
            ));
        }

        debug!(shape = ?shape, spacing = ?spacing.as_slice(), "Volume created");
        Ok(Self {
            grid,
            spacing,
            values,
        })
    }

    /// Build a volume by evaluating `f(x, y, z)` at every voxel.
    pub fn from_fn(
        shape: [usize; 3],
        spacing: Vector3<f64>,
        f: impl Fn(usize, usize, usize) -> f32,
    ) -> SegmentResult<Self> {
        let grid = GridShape::from_shape(shape);
        let values = (0..grid.total_voxels())
            .map(|idx| {
                let [x, y, z] = grid.delinearize(idx);
                f(x, y, z)
            })
            .collect();
        Self::new(shape, spacing, values)
    }

    /// Imaging shape `(depth, height, width)`.
    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        self.grid.shape()
    }

    /// Grid indexing helper.
    #[inline]
    pub fn grid(&self) -> GridShape {
        self.grid
    }

    /// Voxel spacing along [x, y, z].
    #[inline]
    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    /// Raw samples, x-fastest.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [f32] {
        &mut self.values
    }

    /// Sample at grid coordinate.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> f32 {
        self.values[self.grid.linearize(x, y, z)]
    }

    /// Minimum and maximum sample value.
    pub fn value_range(&self) -> (f32, f32) {
        self.values
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    /// Number of voxels whose value lies in `[low, high]`.
    pub fn count_in_window(&self, low: f32, high: f32) -> usize {
        self.values
            .iter()
            .filter(|&&v| low <= v && v <= high)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_mismatched_samples() {
        let err = Volume::new([2, 2, 2], Vector3::new(1.0, 1.0, 1.0), vec![0.0; 7]).unwrap_err();
        assert!(matches!(
            err,
            SegmentError::ShapeMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn test_new_rejects_empty_shape() {
        let err = Volume::new([0, 4, 4], Vector3::new(1.0, 1.0, 1.0), Vec::new()).unwrap_err();
        assert!(matches!(err, SegmentError::InputAbsent { .. }));
    }

    #[test]
    fn test_new_rejects_bad_spacing() {
        let err = Volume::new([1, 1, 1], Vector3::new(1.0, 0.0, 1.0), vec![0.0]).unwrap_err();
        assert!(matches!(err, SegmentError::InvalidParameter { .. }));
    }

    #[test]
    fn test_from_fn_layout() {
        let volume = Volume::from_fn([2, 3, 4], Vector3::new(1.0, 1.0, 2.5), |x, y, z| {
            (x + 10 * y + 100 * z) as f32
        })
        .unwrap();
        assert_eq!(volume.shape(), [2, 3, 4]);
        assert_eq!(volume.grid().dims, [4, 3, 2]);
        assert_eq!(volume.get(3, 2, 1), 123.0);
        assert_eq!(volume.value_range(), (0.0, 123.0));
        assert_eq!(volume.count_in_window(100.0, 200.0), 12);
    }
}

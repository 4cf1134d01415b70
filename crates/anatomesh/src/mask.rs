//! Binary occupancy mask.

use crate::grid::GridShape;

/// Dense 3D boolean occupancy with the same layout as the volume it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
    grid: GridShape,
    voxels: Vec<bool>,
}

impl BinaryMask {
    /// An all-background mask.
    pub fn empty(grid: GridShape) -> Self {
        Self {
            grid,
            voxels: vec![false; grid.total_voxels()],
        }
    }

    /// An all-foreground mask.
    pub fn full(grid: GridShape) -> Self {
        Self {
            grid,
            voxels: vec![true; grid.total_voxels()],
        }
    }

    /// Wrap precomputed voxels.
    ///
    /// # Panics
    ///
    /// Panics if `voxels.len()` does not match the grid.
    pub fn from_voxels(grid: GridShape, voxels: Vec<bool>) -> Self {
        assert_eq!(voxels.len(), grid.total_voxels(), "mask size mismatch");
        Self { grid, voxels }
    }

    /// Build a mask from an imaging shape `(depth, height, width)` and a predicate on `(x, y, z)`.
    pub fn from_fn(shape: [usize; 3], f: impl Fn(usize, usize, usize) -> bool) -> Self {
        let grid = GridShape::from_shape(shape);
        let voxels = (0..grid.total_voxels())
            .map(|idx| {
                let [x, y, z] = grid.delinearize(idx);
                f(x, y, z)
            })
            .collect();
        Self { grid, voxels }
    }

    /// Grid indexing helper.
    #[inline]
    pub fn grid(&self) -> GridShape {
        self.grid
    }

    /// Imaging shape `(depth, height, width)`.
    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        self.grid.shape()
    }

    /// Voxels, x-fastest.
    #[inline]
    pub fn voxels(&self) -> &[bool] {
        &self.voxels
    }

    /// Occupancy at grid coordinate.
    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> bool {
        self.voxels[self.grid.linearize(x, y, z)]
    }

    /// Set occupancy at grid coordinate.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: bool) {
        let idx = self.grid.linearize(x, y, z);
        self.voxels[idx] = value;
    }

    /// Number of foreground voxels.
    pub fn count(&self) -> usize {
        self.voxels.iter().filter(|&&v| v).count()
    }

    /// True if no voxel is foreground.
    pub fn is_empty(&self) -> bool {
        !self.voxels.iter().any(|&v| v)
    }

    /// True if every voxel is foreground.
    pub fn is_full(&self) -> bool {
        self.voxels.iter().all(|&v| v)
    }

    /// True if every foreground voxel of `self` is also foreground in `other`.
    pub fn is_subset_of(&self, other: &BinaryMask) -> bool {
        self.grid == other.grid
            && self
                .voxels
                .iter()
                .zip(&other.voxels)
                .all(|(&a, &b)| !a || b)
    }

    /// Minimum and maximum of the mask read as a {0.0, 1.0} field.
    pub fn value_range(&self) -> (f32, f32) {
        let min = if self.is_full() { 1.0 } else { 0.0 };
        let max = if self.is_empty() { 0.0 } else { 1.0 };
        (min, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_extremes() {
        let grid = GridShape::new([3, 3, 3]);
        assert!(BinaryMask::empty(grid).is_empty());
        assert!(BinaryMask::full(grid).is_full());
        assert_eq!(BinaryMask::full(grid).count(), 27);

        let mut mask = BinaryMask::empty(grid);
        mask.set(1, 1, 1, true);
        assert_eq!(mask.count(), 1);
        assert!(!mask.is_empty());
        assert!(!mask.is_full());
        assert_eq!(mask.value_range(), (0.0, 1.0));
    }

    #[test]
    fn test_subset() {
        let small = BinaryMask::from_fn([4, 4, 4], |x, _, _| x == 1);
        let large = BinaryMask::from_fn([4, 4, 4], |x, _, _| x <= 2);
        assert!(small.is_subset_of(&large));
        assert!(!large.is_subset_of(&small));
    }

    #[test]
    fn test_value_range_of_uniform_masks() {
        let grid = GridShape::new([2, 2, 2]);
        assert_eq!(BinaryMask::empty(grid).value_range(), (0.0, 0.0));
        assert_eq!(BinaryMask::full(grid).value_range(), (1.0, 1.0));
    }
}

//! Dense 3D grid indexing shared by volumes, masks and label arrays.
//!
//! Storage is x-fastest: `index = x + y * nx + z * nx * ny`, where x runs
//! along the slice width, y along the slice height and z across slices.
//! The public array shape follows imaging convention `(depth, height, width)`.

use rayon::prelude::*;

/// Dimensions of a dense voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    /// Grid dimensions [x, y, z] = [width, height, depth].
    pub dims: [usize; 3],
}

impl GridShape {
    /// Create from `[x, y, z]` dimensions.
    #[inline]
    pub fn new(dims: [usize; 3]) -> Self {
        Self { dims }
    }

    /// Create from an imaging shape `(depth, height, width)`.
    #[inline]
    pub fn from_shape(shape: [usize; 3]) -> Self {
        Self {
            dims: [shape[2], shape[1], shape[0]],
        }
    }

    /// Imaging shape `(depth, height, width)`.
    #[inline]
    pub fn shape(&self) -> [usize; 3] {
        [self.dims[2], self.dims[1], self.dims[0]]
    }

    /// Total number of voxels in the grid.
    #[inline]
    pub fn total_voxels(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }

    /// Convert 3D grid coordinates to linear index.
    #[inline]
    pub fn linearize(&self, x: usize, y: usize, z: usize) -> usize {
        x + y * self.dims[0] + z * self.dims[0] * self.dims[1]
    }

    /// Convert linear index to 3D grid coordinates.
    #[inline]
    pub fn delinearize(&self, idx: usize) -> [usize; 3] {
        let z = idx / (self.dims[0] * self.dims[1]);
        let rem = idx % (self.dims[0] * self.dims[1]);
        let y = rem / self.dims[0];
        let x = rem % self.dims[0];
        [x, y, z]
    }

    /// Linear index of a signed coordinate, or None if it falls outside the grid.
    #[inline]
    pub fn checked_index(&self, x: isize, y: isize, z: isize) -> Option<usize> {
        let inside = x >= 0
            && y >= 0
            && z >= 0
            && (x as usize) < self.dims[0]
            && (y as usize) < self.dims[1]
            && (z as usize) < self.dims[2];
        inside.then(|| self.linearize(x as usize, y as usize, z as usize))
    }

    /// Linear index of a signed coordinate clamped to the nearest edge voxel.
    #[inline]
    pub fn clamped_index(&self, x: isize, y: isize, z: isize) -> usize {
        let clamp = |v: isize, n: usize| v.clamp(0, n as isize - 1) as usize;
        self.linearize(
            clamp(x, self.dims[0]),
            clamp(y, self.dims[1]),
            clamp(z, self.dims[2]),
        )
    }

    /// True if the voxel lies on the outer shell of the grid.
    #[inline]
    pub fn on_border(&self, x: usize, y: usize, z: usize) -> bool {
        x == 0
            || y == 0
            || z == 0
            || x + 1 == self.dims[0]
            || y + 1 == self.dims[1]
            || z + 1 == self.dims[2]
    }

    #[inline]
    fn stride(&self, axis: usize) -> usize {
        match axis {
            0 => 1,
            1 => self.dims[0],
            _ => self.dims[0] * self.dims[1],
        }
    }

    /// Linear index of the first voxel of every line running along `axis`.
    fn line_starts(&self, axis: usize) -> Vec<usize> {
        let [nx, ny, nz] = self.dims;
        match axis {
            0 => (0..nz)
                .flat_map(|z| (0..ny).map(move |y| (y, z)))
                .map(|(y, z)| self.linearize(0, y, z))
                .collect(),
            1 => (0..nz)
                .flat_map(|z| (0..nx).map(move |x| (x, z)))
                .map(|(x, z)| self.linearize(x, 0, z))
                .collect(),
            _ => (0..ny)
                .flat_map(|y| (0..nx).map(move |x| (x, y)))
                .map(|(x, y)| self.linearize(x, y, 0))
                .collect(),
        }
    }

    /// Apply `f` in place to every 1D line of `data` running along `axis`.
    ///
    /// Lines are independent, so they are processed in parallel. Every line
    /// is fully written back before this returns.
    pub fn for_each_line<T, F>(&self, data: &mut [T], axis: usize, f: F)
    where
        T: Copy + Send + Sync,
        F: Fn(&mut [T]) + Send + Sync,
    {
        debug_assert_eq!(data.len(), self.total_voxels());
        let len = self.dims[axis];
        if len == 0 {
            return;
        }

        if axis == 0 {
            data.par_chunks_mut(len).for_each(|line| f(line));
            return;
        }

        let stride = self.stride(axis);
        let starts = self.line_starts(axis);
        let src: &[T] = data;
        let lines: Vec<Vec<T>> = starts
            .par_iter()
            .map(|&start| {
                let mut line: Vec<T> = (0..len).map(|i| src[start + i * stride]).collect();
                f(&mut line);
                line
            })
            .collect();

        for (start, line) in starts.into_iter().zip(lines) {
            for (i, value) in line.into_iter().enumerate() {
                data[start + i * stride] = value;
            }
        }
    }
}

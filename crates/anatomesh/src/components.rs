//! Connected component analysis for voxel masks.
//!
//! A connected component is a maximal set of foreground voxels mutually
//! reachable through the chosen [`Connectivity`]. Labels are assigned in
//! raster order (x fastest), so label 1 always contains the first
//! foreground voxel in memory order and results are reproducible.

use serde::Serialize;
use tracing::{debug, info};

use crate::grid::GridShape;
use crate::mask::BinaryMask;
use crate::params::Connectivity;
use crate::tracing_ext::StageTimer;

/// Integer label array with one positive label per connected component.
///
/// Label 0 is background.
#[derive(Debug, Clone)]
pub struct LabeledComponents {
    grid: GridShape,
    labels: Vec<u32>,
    /// `sizes[i]` is the voxel count of label `i + 1`.
    sizes: Vec<usize>,
}

impl LabeledComponents {
    /// Number of foreground components.
    pub fn component_count(&self) -> usize {
        self.sizes.len()
    }

    /// Label of the voxel at `(x, y, z)`.
    pub fn label_at(&self, x: usize, y: usize, z: usize) -> u32 {
        self.labels[self.grid.linearize(x, y, z)]
    }

    /// Voxel count per label, indexed by `label - 1`.
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Voxel count of a single label. Zero for background or unknown labels.
    pub fn size_of(&self, label: u32) -> usize {
        match label {
            0 => 0,
            l => self.sizes.get(l as usize - 1).copied().unwrap_or(0),
        }
    }

    /// The largest component as `(label, voxels)`.
    ///
    /// Equal sizes resolve to the lowest label. `None` when there is no
    /// foreground.
    pub fn largest(&self) -> Option<(u32, usize)> {
        self.sizes
            .iter()
            .enumerate()
            .fold(None, |best: Option<(u32, usize)>, (i, &size)| match best {
                Some((_, best_size)) if best_size >= size => best,
                _ => Some((i as u32 + 1, size)),
            })
    }

    /// Mask of the voxels whose label satisfies `keep`.
    pub fn mask_where(&self, keep: impl Fn(u32) -> bool) -> BinaryMask {
        let voxels = self.labels.iter().map(|&l| l != 0 && keep(l)).collect();
        BinaryMask::from_voxels(self.grid, voxels)
    }
}

/// Label the connected foreground regions of `mask`.
///
/// Uses a flood fill seeded from each unlabeled foreground voxel in
/// raster order.
///
/// # Example
/// ```
/// use anatomesh::{BinaryMask, Connectivity};
/// use anatomesh::components::label;
///
/// // Two voxels touching only at a corner.
/// let mask = BinaryMask::from_fn([2, 2, 2], |x, y, z| (x, y, z) == (0, 0, 0) || (x, y, z) == (1, 1, 1));
/// assert_eq!(label(&mask, Connectivity::Vertex).component_count(), 1);
/// assert_eq!(label(&mask, Connectivity::Face).component_count(), 2);
/// ```
pub fn label(mask: &BinaryMask, connectivity: Connectivity) -> LabeledComponents {
    let grid = mask.grid();
    let voxels = mask.voxels();
    let offsets = connectivity.offsets();

    let mut labels = vec![0u32; voxels.len()];
    let mut sizes = Vec::new();
    let mut stack = Vec::new();

    for start in 0..voxels.len() {
        if !voxels[start] || labels[start] != 0 {
            continue;
        }

        let current = sizes.len() as u32 + 1;
        let mut size = 0usize;
        labels[start] = current;
        stack.push(start);

        while let Some(idx) = stack.pop() {
            size += 1;
            let [x, y, z] = grid.delinearize(idx);
            for [dx, dy, dz] in &offsets {
                let Some(n) = grid.checked_index(x as isize + dx, y as isize + dy, z as isize + dz)
                else {
                    continue;
                };
                if voxels[n] && labels[n] == 0 {
                    labels[n] = current;
                    stack.push(n);
                }
            }
        }

        sizes.push(size);
    }

    debug!(
        components = sizes.len(),
        connectivity = ?connectivity,
        "Labeled connected components"
    );

    LabeledComponents {
        grid,
        labels,
        sizes,
    }
}

/// Outcome of largest-component selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionReport {
    /// Components found in the refined mask.
    pub component_count: usize,
    /// Component sizes, largest first.
    pub component_sizes: Vec<usize>,
    /// Label that was kept, if any.
    pub kept_label: Option<u32>,
    /// Voxels in the kept component.
    pub kept_voxels: usize,
    /// Foreground voxels discarded with the smaller components.
    pub discarded_voxels: usize,
}

impl std::fmt::Display for SelectionReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} component(s), kept {} voxels, discarded {}",
            self.component_count, self.kept_voxels, self.discarded_voxels
        )
    }
}

/// Keep only the largest connected component of `mask`.
///
/// An empty mask stays empty. The result is always a subset of the input
/// holding at most one component.
pub fn select_largest(mask: &BinaryMask, connectivity: Connectivity) -> (BinaryMask, SelectionReport) {
    let _timer = StageTimer::with_voxels("select_largest", mask.grid().total_voxels());

    let labeled = label(mask, connectivity);
    let mut component_sizes = labeled.sizes().to_vec();
    component_sizes.sort_unstable_by(|a, b| b.cmp(a));
    let total: usize = component_sizes.iter().sum();

    let (selected, kept_label, kept_voxels) = match labeled.largest() {
        Some((kept, size)) => (labeled.mask_where(|l| l == kept), Some(kept), size),
        None => (BinaryMask::empty(mask.grid()), None, 0),
    };

    let report = SelectionReport {
        component_count: labeled.component_count(),
        component_sizes,
        kept_label,
        kept_voxels,
        discarded_voxels: total - kept_voxels,
    };

    info!(
        components = report.component_count,
        kept_voxels = report.kept_voxels,
        discarded_voxels = report.discarded_voxels,
        "Largest component selected"
    );
    (selected, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two cubes of side 2 and 3 separated along x.
    fn two_cubes() -> BinaryMask {
        BinaryMask::from_fn([4, 4, 10], |x, y, z| {
            let small = x < 2 && y < 2 && z < 2;
            let large = (5..8).contains(&x) && y < 3 && z < 3;
            small || large
        })
    }

    #[test]
    fn test_empty_mask() {
        let mask = BinaryMask::empty(GridShape::new([3, 3, 3]));
        let labeled = label(&mask, Connectivity::Vertex);
        assert_eq!(labeled.component_count(), 0);
        assert_eq!(labeled.largest(), None);

        let (selected, report) = select_largest(&mask, Connectivity::Vertex);
        assert!(selected.is_empty());
        assert_eq!(report.kept_label, None);
    }

    #[test]
    fn test_two_components() {
        let labeled = label(&two_cubes(), Connectivity::Vertex);
        assert_eq!(labeled.component_count(), 2);
        assert_eq!(labeled.sizes(), &[8, 27]);
        assert_eq!(labeled.label_at(0, 0, 0), 1);
        assert_eq!(labeled.label_at(6, 1, 1), 2);
        assert_eq!(labeled.label_at(3, 3, 3), 0);
        assert_eq!(labeled.largest(), Some((2, 27)));
    }

    #[test]
    fn test_connectivity_changes_labels() {
        // A diagonal staircase: touches only along edges.
        let mask = BinaryMask::from_fn([1, 4, 4], |x, y, _| x == y);
        assert_eq!(label(&mask, Connectivity::Face).component_count(), 4);
        assert_eq!(label(&mask, Connectivity::Edge).component_count(), 1);
        assert_eq!(label(&mask, Connectivity::Vertex).component_count(), 1);
    }

    #[test]
    fn test_tie_keeps_lowest_label() {
        let mask = BinaryMask::from_fn([1, 1, 5], |x, _, _| x == 0 || x == 4);
        let labeled = label(&mask, Connectivity::Vertex);
        assert_eq!(labeled.largest(), Some((1, 1)));
    }

    #[test]
    fn test_select_largest_keeps_subset() {
        let mask = two_cubes();
        let (selected, report) = select_largest(&mask, Connectivity::Vertex);
        assert!(selected.is_subset_of(&mask));
        assert_eq!(selected.count(), 27);
        assert_eq!(report.component_sizes, vec![27, 8]);
        assert_eq!(report.discarded_voxels, 8);
        assert!(!selected.get(0, 0, 0));
        assert_eq!(label(&selected, Connectivity::Vertex).component_count(), 1);
    }

    #[test]
    fn test_selection_report_display() {
        let (_, report) = select_largest(&two_cubes(), Connectivity::Face);
        assert_eq!(report.to_string(), "2 component(s), kept 27 voxels, discarded 8");
    }
}

//! Binary morphology over voxel masks.
//!
//! Every operation is a pure `&BinaryMask -> BinaryMask` transform with its
//! parameters passed explicitly, so steps can be reordered or swept in
//! isolation. [`refine`] chains them in the fixed order used by the
//! pipeline:
//!
//! 1. median filter (radius from params)
//! 2. opening (profile radius)
//! 3. erosion (shell radius)
//! 4. closing (profile radius)
//! 5. dilation (shell radius)
//! 6. interior hole filling
//! 7. small-object removal (profile minimum size)
//!
//! Structuring elements are digital balls: every integer offset with
//! `dx² + dy² + dz² <= r²`. Dilation and erosion by a ball are computed
//! exactly from a squared Euclidean distance transform, so their cost does
//! not grow with the radius.
//!
//! Border handling: voxels outside the grid count as background for
//! dilation and as foreground for erosion, so erosion never eats in from
//! the volume edge.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, instrument};

use crate::components::label;
use crate::mask::BinaryMask;
use crate::params::{Connectivity, SegmentParams};
use crate::profile::StructureProfile;
use crate::tracing_ext::{StageTimer, log_perf_section, log_refine_step};

/// Integer offsets of a digital ball of radius `radius`.
pub fn ball_offsets(radius: usize) -> Vec<[isize; 3]> {
    let r = radius as isize;
    let r2 = r * r;
    let mut offsets = Vec::new();
    for dz in -r..=r {
        for dy in -r..=r {
            for dx in -r..=r {
                if dx * dx + dy * dy + dz * dz <= r2 {
                    offsets.push([dx, dy, dz]);
                }
            }
        }
    }
    offsets
}

/// Median filter of a mask read as a 0/1 field over a ball neighborhood.
///
/// For a binary field the median is a majority vote. Reads past the grid
/// edge replicate the nearest edge voxel.
pub fn median_filter(mask: &BinaryMask, radius: usize) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    let grid = mask.grid();
    let src = mask.voxels();
    let offsets = ball_offsets(radius);
    let n = offsets.len();

    let voxels = (0..src.len())
        .into_par_iter()
        .map(|idx| {
            let [x, y, z] = grid.delinearize(idx);
            let (x, y, z) = (x as isize, y as isize, z as isize);
            let count = offsets
                .iter()
                .filter(|[dx, dy, dz]| src[grid.clamped_index(x + dx, y + dy, z + dz)])
                .count();
            count * 2 > n
        })
        .collect();
    BinaryMask::from_voxels(grid, voxels)
}

/// One-dimensional squared distance transform of a sampled function
/// (lower envelope of parabolas). Infinite samples are never sites.
fn squared_distance_1d(f: &mut [f32]) {
    let n = f.len();
    let src = f.to_vec();
    let mut sites = vec![0usize; n];
    let mut bounds = vec![0f64; n];
    let mut count = 0usize;

    for q in 0..n {
        if !src[q].is_finite() {
            continue;
        }
        let fq = src[q] as f64 + (q * q) as f64;
        let mut s;
        loop {
            if count == 0 {
                s = f64::NEG_INFINITY;
                break;
            }
            let p = sites[count - 1];
            let fp = src[p] as f64 + (p * p) as f64;
            s = (fq - fp) / (2.0 * (q - p) as f64);
            if s <= bounds[count - 1] {
                count -= 1;
            } else {
                break;
            }
        }
        sites[count] = q;
        bounds[count] = s;
        count += 1;
    }

    if count == 0 {
        return;
    }

    let mut k = 0usize;
    for (q, out) in f.iter_mut().enumerate() {
        while k + 1 < count && bounds[k + 1] < q as f64 {
            k += 1;
        }
        let p = sites[k];
        let d = q.abs_diff(p) as f32;
        *out = d * d + src[p];
    }
}

/// Squared Euclidean distance from every voxel to the nearest voxel whose
/// occupancy equals `target`. Infinite when no such voxel exists.
fn squared_distance_to(mask: &BinaryMask, target: bool) -> Vec<f32> {
    let _perf = log_perf_section("distance_transform");
    let grid = mask.grid();
    let mut dist: Vec<f32> = mask
        .voxels()
        .par_iter()
        .map(|&v| if v == target { 0.0 } else { f32::INFINITY })
        .collect();
    for axis in 0..3 {
        grid.for_each_line(&mut dist, axis, squared_distance_1d);
    }
    dist
}

/// Binary dilation by a ball of radius `radius`.
pub fn dilate(mask: &BinaryMask, radius: usize) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    let r2 = (radius * radius) as f32;
    let voxels = squared_distance_to(mask, true)
        .into_par_iter()
        .map(|d| d <= r2)
        .collect();
    BinaryMask::from_voxels(mask.grid(), voxels)
}

/// Binary erosion by a ball of radius `radius`.
pub fn erode(mask: &BinaryMask, radius: usize) -> BinaryMask {
    if radius == 0 {
        return mask.clone();
    }
    let r2 = (radius * radius) as f32;
    let voxels = squared_distance_to(mask, false)
        .into_par_iter()
        .map(|d| d > r2)
        .collect();
    BinaryMask::from_voxels(mask.grid(), voxels)
}

/// Erosion followed by dilation: removes features thinner than the ball.
pub fn open(mask: &BinaryMask, radius: usize) -> BinaryMask {
    dilate(&erode(mask, radius), radius)
}

/// Dilation followed by erosion: bridges gaps narrower than the ball.
pub fn close(mask: &BinaryMask, radius: usize) -> BinaryMask {
    erode(&dilate(mask, radius), radius)
}

/// Reclassify background that cannot reach the grid border as foreground.
///
/// Background reachability uses face (6) connectivity.
pub fn fill_holes(mask: &BinaryMask) -> BinaryMask {
    let grid = mask.grid();
    let src = mask.voxels();
    let mut outside = vec![false; src.len()];
    let mut stack = Vec::new();

    for idx in 0..src.len() {
        let [x, y, z] = grid.delinearize(idx);
        if !src[idx] && grid.on_border(x, y, z) {
            outside[idx] = true;
            stack.push(idx);
        }
    }

    let offsets = Connectivity::Face.offsets();
    while let Some(idx) = stack.pop() {
        let [x, y, z] = grid.delinearize(idx);
        for [dx, dy, dz] in &offsets {
            if let Some(n) = grid.checked_index(x as isize + dx, y as isize + dy, z as isize + dz)
                && !src[n]
                && !outside[n]
            {
                outside[n] = true;
                stack.push(n);
            }
        }
    }

    let voxels = outside.into_iter().map(|o| !o).collect();
    BinaryMask::from_voxels(grid, voxels)
}

/// Drop connected components with fewer than `min_voxels` voxels.
///
/// Returns the filtered mask and the number of components removed.
pub fn remove_small_objects(
    mask: &BinaryMask,
    min_voxels: usize,
    connectivity: Connectivity,
) -> (BinaryMask, usize) {
    let labeled = label(mask, connectivity);
    let removed = labeled.sizes().iter().filter(|&&s| s < min_voxels).count();
    if removed == 0 {
        return (mask.clone(), 0);
    }
    let filtered = labeled.mask_where(|l| labeled.size_of(l) >= min_voxels);
    (filtered, removed)
}

/// Foreground count before and after one refinement step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepCount {
    pub step: &'static str,
    pub before: usize,
    pub after: usize,
}

/// Per-step voxel counts from [`refine`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefineReport {
    /// Steps in the order they ran.
    pub steps: Vec<StepCount>,
    /// Components dropped by small-object removal.
    pub small_components_removed: usize,
}

impl RefineReport {
    /// Foreground voxels after the last step.
    pub fn final_voxels(&self) -> usize {
        self.steps.last().map(|s| s.after).unwrap_or(0)
    }
}

fn apply_step(
    report: &mut RefineReport,
    current: BinaryMask,
    step: &'static str,
    transform: impl FnOnce(&BinaryMask) -> BinaryMask,
) -> BinaryMask {
    let next = transform(&current);
    let count = StepCount {
        step,
        before: current.count(),
        after: next.count(),
    };
    log_refine_step(step, count.before, count.after);
    report.steps.push(count);
    next
}

/// Run the full refinement sequence on a raw threshold mask.
///
/// Deterministic: the same mask and parameters always give the same result.
/// Never fails; an empty or full result is left for extraction to reject.
#[instrument(skip_all, fields(
    opening = profile.opening_radius,
    closing = profile.closing_radius,
    min_voxels = profile.min_component_voxels
))]
pub fn refine(
    mask: &BinaryMask,
    profile: &StructureProfile,
    params: &SegmentParams,
) -> (BinaryMask, RefineReport) {
    let _timer = StageTimer::with_voxels("refine", mask.grid().total_voxels());

    let mut report = RefineReport::default();
    let current = apply_step(&mut report, mask.clone(), "median", |m| {
        median_filter(m, params.median_radius)
    });
    let current = apply_step(&mut report, current, "open", |m| open(m, profile.opening_radius));
    let current = apply_step(&mut report, current, "erode", |m| erode(m, params.shell_radius));
    let current = apply_step(&mut report, current, "close", |m| close(m, profile.closing_radius));
    let current = apply_step(&mut report, current, "dilate", |m| dilate(m, params.shell_radius));
    let current = apply_step(&mut report, current, "fill_holes", fill_holes);

    let mut removed = 0;
    let current = apply_step(&mut report, current, "remove_small_objects", |m| {
        let (filtered, count) =
            remove_small_objects(m, profile.min_component_voxels, params.connectivity);
        removed = count;
        filtered
    });
    report.small_components_removed = removed;

    info!(
        before = mask.count(),
        after = report.final_voxels(),
        small_components_removed = removed,
        "Refinement complete"
    );
    (current, report)
}

//! Intensity classification: Gaussian pre-smoothing and window thresholding.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::mask::BinaryMask;
use crate::params::SegmentParams;
use crate::profile::StructureProfile;
use crate::tracing_ext::StageTimer;
use crate::volume::Volume;

/// What the classifier saw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifyReport {
    /// Voxels in the volume.
    pub total_voxels: usize,
    /// Voxels whose smoothed value fell inside the window.
    pub voxels_in_window: usize,
    /// Smallest smoothed value.
    pub smoothed_min: f32,
    /// Largest smoothed value.
    pub smoothed_max: f32,
}

/// Build a normalized 1D Gaussian kernel.
///
/// The kernel half-width is `round(truncate * sigma)` samples. A zero
/// sigma gives the identity kernel `[1.0]`.
pub fn gaussian_kernel(sigma: f64, truncate: f64) -> Vec<f32> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (truncate * sigma + 0.5) as isize;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Convolve a line with `kernel`, clamping reads past either end to the
/// nearest sample.
fn convolve_line_nearest(line: &mut [f32], kernel: &[f32]) {
    let n = line.len() as isize;
    let radius = (kernel.len() / 2) as isize;
    let src = line.to_vec();
    for (i, out) in line.iter_mut().enumerate() {
        let i = i as isize;
        *out = kernel
            .iter()
            .enumerate()
            .map(|(k, &w)| {
                let j = (i + k as isize - radius).clamp(0, n - 1);
                w * src[j as usize]
            })
            .sum();
    }
}

/// Smooth `volume` in place with a separable 3D Gaussian.
///
/// Sigma is in voxels and the same along every axis. Borders replicate
/// the nearest edge voxel.
pub fn gaussian_smooth(volume: &mut Volume, sigma: f64, truncate: f64) {
    let kernel = gaussian_kernel(sigma, truncate);
    if kernel.len() == 1 {
        return;
    }
    let grid = volume.grid();
    let values = volume.values_mut();
    for axis in 0..3 {
        grid.for_each_line(values, axis, |line| convolve_line_nearest(line, &kernel));
    }
}

/// Mark every voxel whose value lies in `[low, high]`.
pub fn threshold(volume: &Volume, profile: &StructureProfile) -> BinaryMask {
    let voxels = volume
        .values()
        .par_iter()
        .map(|&v| profile.contains(v))
        .collect();
    BinaryMask::from_voxels(volume.grid(), voxels)
}

/// Smooth the volume in place, then threshold it against the profile window.
///
/// The volume is consumed in spirit: after this call it holds smoothed
/// values and should not be classified again.
#[instrument(skip_all, fields(low = profile.low, high = profile.high))]
pub fn classify(
    volume: &mut Volume,
    profile: &StructureProfile,
    params: &SegmentParams,
) -> (BinaryMask, ClassifyReport) {
    let _timer = StageTimer::with_voxels("classify", volume.grid().total_voxels());

    gaussian_smooth(volume, params.gaussian_sigma, params.gaussian_truncate);
    let (smoothed_min, smoothed_max) = volume.value_range();
    debug!(smoothed_min, smoothed_max, "Volume smoothed");

    let mask = threshold(volume, profile);
    let report = ClassifyReport {
        total_voxels: volume.grid().total_voxels(),
        voxels_in_window: mask.count(),
        smoothed_min,
        smoothed_max,
    };

    info!(
        voxels_in_window = report.voxels_in_window,
        total_voxels = report.total_voxels,
        "Classification complete"
    );
    (mask, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Structure;
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn unit_spacing() -> Vector3<f64> {
        Vector3::new(1.0, 1.0, 1.0)
    }

    #[test]
    fn test_kernel_normalized_and_sized() {
        let kernel = gaussian_kernel(1.0, 4.0);
        assert_eq!(kernel.len(), 9);
        assert_relative_eq!(kernel.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(kernel[4] > kernel[3]);
        assert_relative_eq!(kernel[3], kernel[5]);
        assert_eq!(gaussian_kernel(0.0, 4.0), vec![1.0]);
    }

    #[test]
    fn test_smoothing_preserves_constant_volume() {
        let mut volume = Volume::from_fn([5, 6, 7], unit_spacing(), |_, _, _| 42.0).unwrap();
        gaussian_smooth(&mut volume, 1.0, 4.0);
        for &v in volume.values() {
            assert_relative_eq!(v, 42.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_smoothing_spreads_impulse() {
        let mut volume = Volume::from_fn([9, 9, 9], unit_spacing(), |x, y, z| {
            if (x, y, z) == (4, 4, 4) { 1000.0 } else { 0.0 }
        })
        .unwrap();
        let before: f32 = volume.values().iter().sum();
        gaussian_smooth(&mut volume, 1.0, 4.0);
        let after: f32 = volume.values().iter().sum();

        assert!(volume.get(4, 4, 4) < 1000.0);
        assert!(volume.get(5, 4, 4) > 0.0);
        assert_relative_eq!(volume.get(5, 4, 4), volume.get(4, 4, 3), epsilon = 1e-3);
        // Impulse far from the border: mass is conserved.
        assert_relative_eq!(before, after, epsilon = 0.5);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let values = vec![599.0, 600.0, 1500.0, 3000.0, 3001.0, -1000.0];
        let volume = Volume::new([1, 1, 6], unit_spacing(), values).unwrap();
        let mask = threshold(&volume, &Structure::Bone.profile());
        assert_eq!(mask.voxels(), &[false, true, true, true, false, false]);
    }

    #[test]
    fn test_classify_report() {
        let mut volume =
            Volume::from_fn([8, 8, 8], unit_spacing(), |x, _, _| if x < 4 { 1000.0 } else { -1000.0 })
                .unwrap();
        let (mask, report) = classify(
            &mut volume,
            &Structure::Bone.profile(),
            &SegmentParams::default(),
        );
        assert_eq!(report.total_voxels, 512);
        assert_eq!(report.voxels_in_window, mask.count());
        assert!(report.smoothed_min >= -1000.0 && report.smoothed_max <= 1000.0);
        // Plane x < 4 minus the blurred boundary column.
        assert!(mask.get(0, 0, 0));
        assert!(!mask.get(7, 7, 7));
    }
}

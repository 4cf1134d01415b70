//! Tracing extensions for the segmentation pipeline.
//!
//! Every stage emits structured events through `tracing`. Nothing here
//! installs a subscriber; applications do that themselves:
//!
//! ```rust,ignore
//! use tracing_subscriber::{fmt, prelude::*, EnvFilter};
//!
//! tracing_subscriber::registry()
//!     .with(fmt::layer())
//!     .with(EnvFilter::from_default_env())
//!     .init();
//!
//! // RUST_LOG=anatomesh=debug for per-step voxel counts
//! ```
//!
//! # Log Levels
//!
//! - **ERROR**: pipeline failures, logged once before the error is returned
//! - **WARN**: best-effort steps that gave up (holes left open)
//! - **INFO**: stage summaries and timing
//! - **DEBUG**: per-step voxel counts and intermediate mesh state
//! - **TRACE**: per-section timing

use std::time::Instant;

use tracing::{Span, debug, info, trace};

use crate::mask::BinaryMask;
use crate::types::Mesh;

/// Logs the duration of a pipeline stage when dropped.
///
/// # Example
///
/// ```rust,ignore
/// use anatomesh::tracing_ext::StageTimer;
///
/// fn refine() {
///     let _timer = StageTimer::new("refine");
///     // ... do work ...
/// } // Timer logs duration when dropped
/// ```
pub struct StageTimer {
    name: &'static str,
    start: Instant,
    span: Span,
}

impl StageTimer {
    /// Start timing a stage.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!("segment_stage", stage = name);
        debug!(target: "anatomesh::timing", stage = name, "Starting stage");
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Start timing a stage that works on a voxel grid.
    pub fn with_voxels(name: &'static str, voxels: usize) -> Self {
        let span = tracing::info_span!("segment_stage", stage = name, voxels = voxels);
        debug!(
            target: "anatomesh::timing",
            stage = name,
            voxels = voxels,
            "Starting stage"
        );
        Self {
            name,
            start: Instant::now(),
            span,
        }
    }

    /// Elapsed time in milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Span for this stage.
    pub fn span(&self) -> &Span {
        &self.span
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        info!(
            target: "anatomesh::timing",
            stage = self.name,
            elapsed_ms = format!("{:.2}", self.elapsed_ms()),
            "Stage completed"
        );
    }
}

/// Log mask occupancy at debug level.
pub fn log_mask_state(mask: &BinaryMask, context: &str) {
    let [depth, height, width] = mask.shape();
    debug!(
        target: "anatomesh::mask_state",
        context = context,
        foreground = mask.count(),
        shape = format!("{depth} x {height} x {width}"),
        "Mask state"
    );
}

/// Log mesh statistics at debug level.
pub fn log_mesh_state(mesh: &Mesh, context: &str) {
    let dims = mesh.extent();
    debug!(
        target: "anatomesh::mesh_state",
        context = context,
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        dimensions = format!("{:.2} x {:.2} x {:.2}", dims.x, dims.y, dims.z),
        "Mesh state"
    );
}

/// Log a single refinement step's effect on the foreground count.
pub fn log_refine_step(step: &str, before: usize, after: usize) {
    debug!(
        target: "anatomesh::refine",
        step = step,
        before = before,
        after = after,
        delta = after as i64 - before as i64,
        "Refine step completed"
    );
}

/// Log a performance-critical section at trace level.
///
/// Returns a guard that logs when dropped.
#[must_use]
pub fn log_perf_section(name: &'static str) -> impl Drop {
    struct PerfGuard {
        name: &'static str,
        start: Instant,
    }
    impl Drop for PerfGuard {
        fn drop(&mut self) {
            trace!(
                target: "anatomesh::perf",
                section = self.name,
                elapsed_us = self.start.elapsed().as_micros(),
                "Performance section completed"
            );
        }
    }
    PerfGuard {
        name,
        start: Instant::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridShape;

    #[test]
    fn test_stage_timer() {
        let timer = StageTimer::with_voxels("test_stage", 8);
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(timer.elapsed_ms() >= 10.0);
    }

    #[test]
    fn test_log_helpers() {
        // Just verify they don't panic
        log_mesh_state(&Mesh::new(), "test");
        log_mask_state(&BinaryMask::empty(GridShape::new([2, 2, 2])), "test");
        log_refine_step("median", 10, 4);
        let _guard = log_perf_section("test");
    }
}

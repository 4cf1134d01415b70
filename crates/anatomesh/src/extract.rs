//! Iso-surface extraction from a binary mask using Surface Nets.

use fast_surface_nets::{SurfaceNetsBuffer, ndshape::RuntimeShape, surface_nets};
use nalgebra::Vector3;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::error::{SegmentError, SegmentResult};
use crate::mask::BinaryMask;
use crate::params::VertexSpace;
use crate::tracing_ext::StageTimer;
use crate::types::{Mesh, Vertex};

/// What the extractor produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractReport {
    /// Iso-level used, midpoint of the mask's value range.
    pub level: f32,
    /// Vertices emitted before cleanup.
    pub vertices: usize,
    /// Triangles emitted before cleanup.
    pub faces: usize,
}

/// Extract the surface separating foreground from background.
///
/// The mask is read as a {0.0, 1.0} field and the iso-level is the midpoint
/// of its observed range. A mask with no variation has no surface and fails
/// with [`SegmentError::EmptyOrFullSegmentation`].
///
/// Vertices are in `(x, y, z)` order, either in voxel units or scaled by
/// `spacing` depending on `space`.
#[instrument(skip_all, fields(space = ?space))]
pub fn extract_surface(
    mask: &BinaryMask,
    spacing: Vector3<f64>,
    space: VertexSpace,
) -> SegmentResult<(Mesh, ExtractReport)> {
    let (min, max) = mask.value_range();
    if min == max {
        return Err(SegmentError::EmptyOrFullSegmentation {
            full: min > 0.0,
            voxel_count: mask.count(),
        });
    }
    let level = 0.5 * (min + max);

    let grid = mask.grid();
    let _timer = StageTimer::with_voxels("extract_surface", grid.total_voxels());
    info!(dims = ?grid.dims, level, "Extracting isosurface");

    // Surface nets emits no quads on its last cell layer, so the field gets
    // one background voxel before the mask and two after it.
    let dims = grid.dims;
    let padded_dims = [dims[0] + 3, dims[1] + 3, dims[2] + 3];
    let outside = level - min;
    let mut field = vec![outside; padded_dims[0] * padded_dims[1] * padded_dims[2]];

    // Negative inside, positive outside.
    for (idx, &occupied) in mask.voxels().iter().enumerate() {
        if occupied {
            let [x, y, z] = grid.delinearize(idx);
            let dst = (x + 1) + (y + 1) * padded_dims[0] + (z + 1) * padded_dims[0] * padded_dims[1];
            field[dst] = level - max;
        }
    }

    let shape = RuntimeShape::<u32, 3>::new([
        padded_dims[0] as u32,
        padded_dims[1] as u32,
        padded_dims[2] as u32,
    ]);

    let mut buffer = SurfaceNetsBuffer::default();
    surface_nets(
        &field,
        &shape,
        [0, 0, 0],
        [
            padded_dims[0] as u32 - 1,
            padded_dims[1] as u32 - 1,
            padded_dims[2] as u32 - 1,
        ],
        &mut buffer,
    );

    debug!(
        positions = buffer.positions.len(),
        indices = buffer.indices.len(),
        "Surface nets complete"
    );

    let scale = match space {
        VertexSpace::Voxel => Vector3::new(1.0, 1.0, 1.0),
        VertexSpace::Physical => spacing,
    };

    let mut mesh = Mesh::with_capacity(buffer.positions.len(), buffer.indices.len() / 3);
    for pos in &buffer.positions {
        mesh.vertices.push(Vertex::from_coords(
            (pos[0] - 1.0) as f64 * scale.x,
            (pos[1] - 1.0) as f64 * scale.y,
            (pos[2] - 1.0) as f64 * scale.z,
        ));
    }
    mesh.faces.extend(
        buffer
            .indices
            .chunks_exact(3)
            .map(|tri| [tri[0], tri[1], tri[2]]),
    );

    let report = ExtractReport {
        level,
        vertices: mesh.vertex_count(),
        faces: mesh.face_count(),
    };
    info!(
        vertices = report.vertices,
        faces = report.faces,
        "Isosurface mesh created"
    );

    Ok((mesh, report))
}

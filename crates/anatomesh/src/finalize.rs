//! Mesh cleanup after extraction: welding, degenerate and duplicate
//! removal, hole filling, compaction.

use hashbrown::{HashMap, HashSet};
use nalgebra::Point3;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::adjacency::MeshAdjacency;
use crate::error::{SegmentError, SegmentResult};
use crate::holes::{HoleFillReport, fill_holes};
use crate::params::SegmentParams;
use crate::tracing_ext::{StageTimer, log_mesh_state};
use crate::types::{Mesh, Triangle};

/// What the finalizer changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FinalizeReport {
    pub vertices_welded: usize,
    /// Faces with a repeated index or area below the threshold.
    pub degenerate_faces_removed: usize,
    pub duplicate_faces_removed: usize,
    pub holes: HoleFillReport,
    pub unreferenced_vertices_removed: usize,
    /// Edges with one adjacent face after cleanup. Zero means watertight.
    pub boundary_edges: usize,
    pub non_manifold_edges: usize,
}

impl FinalizeReport {
    /// True when no boundary edges remain.
    pub fn is_watertight(&self) -> bool {
        self.boundary_edges == 0
    }
}

/// Merge vertices closer than `epsilon` and remap faces.
///
/// Uses spatial hashing. Each vertex merges into the lowest-index vertex
/// within range. Returns the number of vertices merged; the merged
/// vertices stay in the array until [`remove_unreferenced_vertices`].
pub fn weld_vertices(mesh: &mut Mesh, epsilon: f64) -> usize {
    if mesh.vertices.is_empty() || epsilon <= 0.0 {
        return 0;
    }

    let cell_size = epsilon * 2.0;
    let mut spatial_hash: HashMap<(i64, i64, i64), Vec<u32>> = HashMap::new();
    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        spatial_hash
            .entry(pos_to_cell(&vertex.position, cell_size))
            .or_default()
            .push(idx as u32);
    }

    let mut vertex_remap: Vec<u32> = (0..mesh.vertices.len() as u32).collect();
    let mut merged_count = 0;

    for (idx, vertex) in mesh.vertices.iter().enumerate() {
        let idx = idx as u32;
        if vertex_remap[idx as usize] != idx {
            continue;
        }

        let cell = pos_to_cell(&vertex.position, cell_size);
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let Some(candidates) = spatial_hash.get(&(cell.0 + dx, cell.1 + dy, cell.2 + dz))
                    else {
                        continue;
                    };
                    for &other in candidates {
                        if other <= idx || vertex_remap[other as usize] != other {
                            continue;
                        }
                        let dist = (vertex.position - mesh.vertices[other as usize].position).norm();
                        if dist < epsilon {
                            vertex_remap[other as usize] = idx;
                            merged_count += 1;
                        }
                    }
                }
            }
        }
    }

    if merged_count == 0 {
        return 0;
    }

    for face in &mut mesh.faces {
        for index in face.iter_mut() {
            *index = vertex_remap[*index as usize];
        }
    }

    debug!(merged = merged_count, epsilon, "Welded vertices");
    merged_count
}

fn pos_to_cell(pos: &Point3<f64>, cell_size: f64) -> (i64, i64, i64) {
    (
        (pos.x / cell_size).floor() as i64,
        (pos.y / cell_size).floor() as i64,
        (pos.z / cell_size).floor() as i64,
    )
}

/// Remove faces with a repeated vertex index or area below `area_threshold`.
///
/// Returns the number of faces removed.
pub fn remove_degenerate_faces(mesh: &mut Mesh, area_threshold: f64) -> usize {
    let original_count = mesh.faces.len();
    let vertices = &mesh.vertices;

    mesh.faces.retain(|&[i0, i1, i2]| {
        if i0 == i1 || i1 == i2 || i0 == i2 {
            return false;
        }
        let tri = Triangle::new(
            vertices[i0 as usize].position,
            vertices[i1 as usize].position,
            vertices[i2 as usize].position,
        );
        tri.area() >= area_threshold
    });

    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        debug!(removed, area_threshold, "Removed degenerate faces");
    }
    removed
}

/// Remove faces that repeat the vertex set of an earlier face in either
/// winding. The first occurrence is kept.
pub fn remove_duplicate_faces(mesh: &mut Mesh) -> usize {
    // Smallest index first, cyclic order kept.
    fn normalize_face(face: [u32; 3]) -> [u32; 3] {
        let min_idx = (0..3).min_by_key(|&i| face[i]).unwrap_or(0);
        [face[min_idx], face[(min_idx + 1) % 3], face[(min_idx + 2) % 3]]
    }

    let original_count = mesh.faces.len();
    let mut seen: HashSet<[u32; 3]> = HashSet::with_capacity(original_count);
    mesh.faces.retain(|&face| {
        let fwd = normalize_face(face);
        let rev = normalize_face([face[0], face[2], face[1]]);
        if seen.contains(&fwd) || seen.contains(&rev) {
            false
        } else {
            seen.insert(fwd);
            true
        }
    });

    let removed = original_count - mesh.faces.len();
    if removed > 0 {
        debug!(removed, "Removed duplicate faces");
    }
    removed
}

/// Drop vertices no face refers to and compact the vertex array.
pub fn remove_unreferenced_vertices(mesh: &mut Mesh) -> usize {
    let original_count = mesh.vertices.len();
    let mut referenced = vec![false; original_count];
    for face in &mesh.faces {
        for &index in face {
            referenced[index as usize] = true;
        }
    }

    if referenced.iter().all(|&r| r) {
        return 0;
    }

    let mut remap = vec![u32::MAX; original_count];
    let mut new_vertices = Vec::with_capacity(original_count);
    for (old_idx, vertex) in mesh.vertices.drain(..).enumerate() {
        if referenced[old_idx] {
            remap[old_idx] = new_vertices.len() as u32;
            new_vertices.push(vertex);
        }
    }
    for face in &mut mesh.faces {
        for index in face.iter_mut() {
            *index = remap[*index as usize];
        }
    }

    let removed = original_count - new_vertices.len();
    mesh.vertices = new_vertices;
    debug!(removed, "Removed unreferenced vertices");
    removed
}

/// Clean a freshly extracted mesh for export.
///
/// Steps, in order: weld coincident vertices, drop degenerate faces, drop
/// duplicate faces, fill small holes (if enabled), drop any degenerate or
/// duplicate fill triangles, compact vertices. Hole filling is best effort; the
/// report's boundary edge count says how close the result came to
/// watertight.
///
/// Fails with [`SegmentError::EmptyMesh`] when nothing is left.
#[instrument(skip_all, fields(vertices = mesh.vertex_count(), faces = mesh.face_count()))]
pub fn finalize_mesh(mut mesh: Mesh, params: &SegmentParams) -> SegmentResult<(Mesh, FinalizeReport)> {
    let _timer = StageTimer::new("finalize");
    log_mesh_state(&mesh, "before finalize");

    let mut report = FinalizeReport {
        vertices_welded: weld_vertices(&mut mesh, params.weld_epsilon),
        ..Default::default()
    };
    report.degenerate_faces_removed =
        remove_degenerate_faces(&mut mesh, params.degenerate_area_threshold);
    report.duplicate_faces_removed = remove_duplicate_faces(&mut mesh);

    if params.fill_holes {
        report.holes = fill_holes(&mut mesh, params.max_hole_edges);
        report.degenerate_faces_removed +=
            remove_degenerate_faces(&mut mesh, params.degenerate_area_threshold);
        // A fill triangle can repeat an existing face in reverse winding.
        report.duplicate_faces_removed += remove_duplicate_faces(&mut mesh);
    }

    report.unreferenced_vertices_removed = remove_unreferenced_vertices(&mut mesh);

    if mesh.vertices.is_empty() || mesh.faces.is_empty() {
        return Err(SegmentError::empty_mesh(format!(
            "{} vertices and {} faces remain after cleanup",
            mesh.vertex_count(),
            mesh.face_count()
        )));
    }

    let adjacency = MeshAdjacency::build(&mesh.faces);
    report.boundary_edges = adjacency.boundary_edge_count();
    report.non_manifold_edges = adjacency.non_manifold_edge_count();
    if !report.is_watertight() {
        warn!(
            boundary_edges = report.boundary_edges,
            "Mesh is not watertight after cleanup"
        );
    }

    log_mesh_state(&mesh, "after finalize");
    info!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        welded = report.vertices_welded,
        degenerate = report.degenerate_faces_removed,
        holes_filled = report.holes.holes_filled,
        "Mesh finalized"
    );
    Ok((mesh, report))
}

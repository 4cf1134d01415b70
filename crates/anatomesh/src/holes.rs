//! Boundary hole detection and filling.
//!
//! Holes are traced along directed boundary edges, so each loop runs in
//! the winding direction of the faces around it. Fill triangles walk the
//! loop backwards and therefore agree with the neighboring faces'
//! orientation.

use hashbrown::{HashMap, HashSet};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::adjacency::MeshAdjacency;
use crate::types::{Mesh, Triangle};

/// A closed loop of boundary vertices.
#[derive(Debug, Clone)]
pub struct BoundaryLoop {
    /// Vertex indices in face winding order.
    pub vertices: Vec<u32>,
}

impl BoundaryLoop {
    /// Number of edges (and vertices) in the loop.
    pub fn edge_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Outcome of [`fill_holes`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HoleFillReport {
    pub holes_found: usize,
    pub holes_filled: usize,
    /// Holes left open because they exceeded the edge limit.
    pub holes_skipped: usize,
    pub triangles_added: usize,
}

/// Detect all boundary loops in the mesh.
pub fn detect_holes(adjacency: &MeshAdjacency) -> Vec<BoundaryLoop> {
    let mut outgoing: HashMap<u32, Vec<u32>> = HashMap::new();
    for (a, b) in adjacency.boundary_half_edges() {
        outgoing.entry(a).or_default().push(b);
    }
    if outgoing.is_empty() {
        return Vec::new();
    }

    // Deterministic start order regardless of hash iteration.
    let mut starts: Vec<u32> = outgoing.keys().copied().collect();
    starts.sort_unstable();

    let mut used: HashSet<(u32, u32)> = HashSet::new();
    let mut loops = Vec::new();

    for start in starts {
        loop {
            let Some(first) = outgoing[&start]
                .iter()
                .copied()
                .find(|&to| !used.contains(&(start, to)))
            else {
                break;
            };

            let mut vertices = vec![start];
            used.insert((start, first));
            let mut current = first;
            let mut closed = false;

            while let Some(nexts) = outgoing.get(&current) {
                if current == start {
                    closed = true;
                    break;
                }
                let Some(next) = nexts.iter().copied().find(|&to| !used.contains(&(current, to)))
                else {
                    break;
                };
                vertices.push(current);
                used.insert((current, next));
                current = next;
            }

            if !closed {
                warn!(start, "Boundary loop is not closed");
                continue;
            }
            if vertices.len() >= 3 {
                loops.push(BoundaryLoop { vertices });
            }
        }
    }

    debug!(
        holes = loops.len(),
        sizes = ?loops.iter().map(|l| l.edge_count()).collect::<Vec<_>>(),
        "Detected boundary loops"
    );
    loops
}

/// Triangulate a hole by ear clipping, falling back to a fan when no ear
/// can be found.
///
/// Returns the new triangles, wound opposite to the loop so they match the
/// faces already around the hole.
pub fn fill_hole_ear_clipping(mesh: &Mesh, boundary: &BoundaryLoop) -> Vec<[u32; 3]> {
    let loop_vertices: Vec<u32> = boundary.vertices.iter().rev().copied().collect();
    let n = loop_vertices.len();
    if n < 3 {
        return Vec::new();
    }

    let positions: Vec<Point3<f64>> = loop_vertices
        .iter()
        .map(|&idx| mesh.vertices[idx as usize].position)
        .collect();
    let centroid = Point3::from(
        positions
            .iter()
            .fold(Vector3::zeros(), |acc, p| acc + p.coords)
            / n as f64,
    );
    let hole_normal = compute_hole_normal(&positions, &centroid);

    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    while remaining.len() > 3 {
        let len = remaining.len();
        let ear = (0..len).find(|&i| {
            let prev = remaining[(i + len - 1) % len];
            let next = remaining[(i + 1) % len];
            is_ear(&positions, &remaining, prev, remaining[i], next, &hole_normal)
        });

        let Some(i) = ear else {
            warn!(
                remaining = remaining.len(),
                "Ear clipping stuck, using fan triangulation"
            );
            break;
        };
        let prev = remaining[(i + len - 1) % len];
        let next = remaining[(i + 1) % len];
        triangles.push([
            loop_vertices[prev],
            loop_vertices[remaining[i]],
            loop_vertices[next],
        ]);
        remaining.remove(i);
    }

    for i in 1..remaining.len().saturating_sub(1) {
        triangles.push([
            loop_vertices[remaining[0]],
            loop_vertices[remaining[i]],
            loop_vertices[remaining[i + 1]],
        ]);
    }

    triangles
}

/// Newell-style average normal of a boundary polygon.
fn compute_hole_normal(positions: &[Point3<f64>], centroid: &Point3<f64>) -> Vector3<f64> {
    let n = positions.len();
    let normal: Vector3<f64> = (0..n)
        .map(|i| (positions[i] - centroid).cross(&(positions[(i + 1) % n] - centroid)))
        .sum();

    let len = normal.norm();
    if len > f64::EPSILON {
        normal / len
    } else {
        Vector3::z()
    }
}

fn is_ear(
    positions: &[Point3<f64>],
    remaining: &[usize],
    prev: usize,
    curr: usize,
    next: usize,
    hole_normal: &Vector3<f64>,
) -> bool {
    let (a, b, c) = (positions[prev], positions[curr], positions[next]);
    let Some(tri_normal) = Triangle::new(a, b, c).normal() else {
        return false;
    };
    // Reflex vertex
    if tri_normal.dot(hole_normal) < 0.0 {
        return false;
    }

    remaining
        .iter()
        .filter(|&&idx| idx != prev && idx != curr && idx != next)
        .all(|&idx| !point_in_triangle_projected(&positions[idx], &a, &b, &c, hole_normal))
}

/// Point-in-triangle test after dropping the axis most aligned with `normal`.
fn point_in_triangle_projected(
    p: &Point3<f64>,
    v0: &Point3<f64>,
    v1: &Point3<f64>,
    v2: &Point3<f64>,
    normal: &Vector3<f64>,
) -> bool {
    let abs = normal.abs();
    let (i, j) = if abs.z >= abs.x && abs.z >= abs.y {
        (0, 1)
    } else if abs.y >= abs.x {
        (0, 2)
    } else {
        (1, 2)
    };
    let project = |q: &Point3<f64>| (q[i], q[j]);
    let (p, a, b, c) = (project(p), project(v0), project(v1), project(v2));

    let sign = |p1: (f64, f64), p2: (f64, f64), p3: (f64, f64)| {
        (p1.0 - p3.0) * (p2.1 - p3.1) - (p2.0 - p3.0) * (p1.1 - p3.1)
    };
    let d1 = sign(p, a, b);
    let d2 = sign(p, b, c);
    let d3 = sign(p, c, a);

    let has_neg = d1 < 0.0 || d2 < 0.0 || d3 < 0.0;
    let has_pos = d1 > 0.0 || d2 > 0.0 || d3 > 0.0;
    !(has_neg && has_pos)
}

/// Fill every hole with at most `max_hole_edges` boundary edges.
///
/// Best effort: larger holes are logged and left open. Holes are
/// triangulated in parallel, then appended in detection order.
pub fn fill_holes(mesh: &mut Mesh, max_hole_edges: usize) -> HoleFillReport {
    let adjacency = MeshAdjacency::build(&mesh.faces);
    let holes = detect_holes(&adjacency);
    let holes_found = holes.len();

    let (fillable, skipped): (Vec<_>, Vec<_>) = holes
        .into_iter()
        .partition(|hole| hole.edge_count() <= max_hole_edges);

    for hole in &skipped {
        warn!(
            edges = hole.edge_count(),
            max_hole_edges, "Skipping large hole"
        );
    }

    let new_triangles: Vec<Vec<[u32; 3]>> = fillable
        .par_iter()
        .map(|hole| fill_hole_ear_clipping(mesh, hole))
        .collect();

    let holes_filled = new_triangles.iter().filter(|t| !t.is_empty()).count();
    let triangles_added = new_triangles.iter().map(Vec::len).sum();
    for triangles in new_triangles {
        mesh.faces.extend(triangles);
    }

    if holes_filled > 0 {
        info!(holes_filled, triangles_added, "Filled holes");
    }

    HoleFillReport {
        holes_found,
        holes_filled,
        holes_skipped: skipped.len(),
        triangles_added,
    }
}

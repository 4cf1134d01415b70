//! Edge-to-face adjacency for triangle meshes.

use hashbrown::HashMap;

/// Maps each undirected edge to the faces that use it.
#[derive(Debug, Clone, Default)]
pub struct MeshAdjacency {
    /// Undirected edge `(min, max)` to indices of faces containing it.
    pub edge_to_faces: HashMap<(u32, u32), Vec<u32>>,
    /// Directed edge `(from, to)` as it appears in face winding, to face index.
    half_edges: HashMap<(u32, u32), u32>,
}

#[inline]
fn undirected(a: u32, b: u32) -> (u32, u32) {
    if a < b { (a, b) } else { (b, a) }
}

impl MeshAdjacency {
    /// Build adjacency from a face list.
    pub fn build(faces: &[[u32; 3]]) -> Self {
        let mut edge_to_faces: HashMap<(u32, u32), Vec<u32>> =
            HashMap::with_capacity(faces.len() * 3 / 2);
        let mut half_edges = HashMap::with_capacity(faces.len() * 3);

        for (face_idx, face) in faces.iter().enumerate() {
            for i in 0..3 {
                let a = face[i];
                let b = face[(i + 1) % 3];
                edge_to_faces
                    .entry(undirected(a, b))
                    .or_default()
                    .push(face_idx as u32);
                half_edges.insert((a, b), face_idx as u32);
            }
        }

        Self {
            edge_to_faces,
            half_edges,
        }
    }

    /// Edges used by exactly one face, as undirected `(min, max)` pairs.
    pub fn boundary_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.edge_to_faces
            .iter()
            .filter(|(_, faces)| faces.len() == 1)
            .map(|(&edge, _)| edge)
    }

    /// Boundary edges in the direction their single face traverses them.
    pub fn boundary_half_edges(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.boundary_edges().map(|(a, b)| {
            if self.half_edges.contains_key(&(a, b)) {
                (a, b)
            } else {
                (b, a)
            }
        })
    }

    /// Number of boundary edges.
    pub fn boundary_edge_count(&self) -> usize {
        self.boundary_edges().count()
    }

    /// Number of edges shared by more than two faces.
    pub fn non_manifold_edge_count(&self) -> usize {
        self.edge_to_faces
            .values()
            .filter(|faces| faces.len() > 2)
            .count()
    }

    /// True when every edge has exactly two faces.
    pub fn is_watertight(&self) -> bool {
        !self.edge_to_faces.is_empty() && self.edge_to_faces.values().all(|f| f.len() == 2)
    }
}

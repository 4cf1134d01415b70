//! Core mesh data types.

use nalgebra::{Point3, Vector3};
use serde::Serialize;

/// A mesh vertex.
///
/// Coordinates are in millimetres when the mesh was extracted in physical
/// space, or in voxel units when extracted in index space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// 3D position.
    pub position: Point3<f64>,
}

impl Vertex {
    /// Create a new vertex.
    #[inline]
    pub fn new(position: Point3<f64>) -> Self {
        Self { position }
    }

    /// Create a vertex from raw coordinates.
    #[inline]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }
}

/// A triangle mesh with indexed vertices and faces.
///
/// Every face index must be smaller than `vertices.len()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(vertex_count: usize, face_count: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertex_count),
            faces: Vec::with_capacity(face_count),
        }
    }

    /// Number of vertices in the mesh.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces (triangles) in the mesh.
    #[inline]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Check if mesh is empty (no vertices or faces).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.faces.is_empty()
    }

    /// Check that every face references an existing vertex.
    pub fn indices_in_range(&self) -> bool {
        let n = self.vertices.len();
        self.faces
            .iter()
            .all(|f| f.iter().all(|&i| (i as usize) < n))
    }

    /// Compute the axis-aligned bounding box.
    /// Returns (min_corner, max_corner) or None if mesh is empty.
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.vertices.first()?.position;
        let (min, max) = self.vertices[1..]
            .iter()
            .fold((first, first), |(min, max), v| {
                (min.inf(&v.position), max.sup(&v.position))
            });
        Some((min, max))
    }

    /// Bounding box extent (max - min), zero for an empty mesh.
    pub fn extent(&self) -> Vector3<f64> {
        self.bounds()
            .map(|(min, max)| max - min)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Iterate over triangles, yielding Triangle structs with actual vertex data.
    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        self.faces.iter().map(|&[i0, i1, i2]| Triangle {
            v0: self.vertices[i0 as usize].position,
            v1: self.vertices[i1 as usize].position,
            v2: self.vertices[i2 as usize].position,
        })
    }

    /// Compute the signed volume of the mesh.
    ///
    /// Only meaningful for closed meshes. Positive when faces wind
    /// counter-clockwise seen from outside.
    pub fn signed_volume(&self) -> f64 {
        self.triangles()
            .map(|t| t.v0.coords.dot(&t.v1.coords.cross(&t.v2.coords)))
            .sum::<f64>()
            / 6.0
    }

    /// Absolute enclosed volume.
    #[inline]
    pub fn volume(&self) -> f64 {
        self.signed_volume().abs()
    }

    /// Total surface area of the mesh.
    pub fn surface_area(&self) -> f64 {
        self.triangles().map(|tri| tri.area()).sum()
    }

    /// Summary statistics suitable for logging or JSON output.
    pub fn stats(&self) -> MeshStats {
        let extent = self.extent();
        MeshStats {
            vertices: self.vertex_count(),
            faces: self.face_count(),
            extent: [extent.x, extent.y, extent.z],
            surface_area: self.surface_area(),
            volume: self.volume(),
        }
    }
}

/// Summary of a mesh.
#[derive(Debug, Clone, Serialize)]
pub struct MeshStats {
    pub vertices: usize,
    pub faces: usize,
    pub extent: [f64; 3],
    pub surface_area: f64,
    pub volume: f64,
}

/// A triangle with concrete vertex positions.
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle from three points.
    #[inline]
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Compute the (unnormalized) face normal via cross product.
    /// Its length is twice the triangle area.
    #[inline]
    pub fn normal_unnormalized(&self) -> Vector3<f64> {
        (self.v1 - self.v0).cross(&(self.v2 - self.v0))
    }

    /// Unit normal, or None if the triangle is degenerate.
    #[inline]
    pub fn normal(&self) -> Option<Vector3<f64>> {
        let n = self.normal_unnormalized();
        let len = n.norm();
        (len > f64::EPSILON).then(|| n / len)
    }

    /// Triangle area.
    #[inline]
    pub fn area(&self) -> f64 {
        self.normal_unnormalized().norm() * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tetrahedron() -> Mesh {
        let mut mesh = Mesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 1.0));
        mesh.faces.push([0, 2, 1]);
        mesh.faces.push([0, 1, 3]);
        mesh.faces.push([0, 3, 2]);
        mesh.faces.push([1, 2, 3]);
        mesh
    }

    #[test]
    fn test_bounds_and_extent() {
        let mesh = tetrahedron();
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Point3::new(0.0, 0.0, 0.0));
        assert_eq!(max, Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(mesh.extent().x, 1.0);
        assert!(Mesh::new().bounds().is_none());
    }

    #[test]
    fn test_signed_volume_outward() {
        let mesh = tetrahedron();
        assert_relative_eq!(mesh.signed_volume(), 1.0 / 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_triangle_area_and_degenerate_normal() {
        let tri = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        );
        assert_relative_eq!(tri.area(), 2.0);

        let line = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(line.normal().is_none());
    }

    #[test]
    fn test_indices_in_range() {
        let mut mesh = tetrahedron();
        assert!(mesh.indices_in_range());
        mesh.faces.push([0, 1, 9]);
        assert!(!mesh.indices_in_range());
    }
}

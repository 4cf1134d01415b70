//! Mesh export to STL and OBJ.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::{SegmentError, SegmentResult};
use crate::types::{Mesh, Triangle};

/// Supported mesh file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFormat {
    /// Binary STL.
    Stl,
    /// Wavefront OBJ (ASCII, indexed).
    Obj,
}

impl MeshFormat {
    /// Detect format from file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase())
            .and_then(|ext| match ext.as_str() {
                "stl" => Some(MeshFormat::Stl),
                "obj" => Some(MeshFormat::Obj),
                _ => None,
            })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MeshFormat::Stl => "stl",
            MeshFormat::Obj => "obj",
        }
    }
}

/// Persists a finished mesh.
///
/// The pipeline hands its output to a writer and never looks at the
/// destination itself, so callers can swap in their own storage.
pub trait MeshWriter {
    /// Write `mesh` to `path`.
    fn write_mesh(&self, mesh: &Mesh, path: &Path) -> SegmentResult<()>;
}

/// Writes to the local filesystem, choosing the format from the extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileMeshWriter;

impl MeshWriter for FileMeshWriter {
    fn write_mesh(&self, mesh: &Mesh, path: &Path) -> SegmentResult<()> {
        save_mesh(mesh, path)
    }
}

/// Save mesh to file, auto-detecting format from extension.
///
/// Missing parent directories are created.
pub fn save_mesh(mesh: &Mesh, path: &Path) -> SegmentResult<()> {
    let format = MeshFormat::from_path(path).ok_or_else(|| SegmentError::UnsupportedFormat {
        extension: path.extension().and_then(|e| e.to_str()).map(String::from),
    })?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| SegmentError::export_io(path, e))?;
    }

    match format {
        MeshFormat::Stl => save_stl(mesh, path),
        MeshFormat::Obj => save_obj(mesh, path),
    }
}

/// Save mesh to binary STL with per-face normals.
pub fn save_stl(mesh: &Mesh, path: &Path) -> SegmentResult<()> {
    info!(path = %path.display(), "Saving mesh (STL)");

    let file = File::create(path).map_err(|e| SegmentError::export_io(path, e))?;
    let mut writer = BufWriter::new(file);

    let to_f32 = |p: &nalgebra::Point3<f64>| [p.x as f32, p.y as f32, p.z as f32];
    let triangles: Vec<stl_io::Triangle> = mesh
        .faces
        .iter()
        .map(|&[i0, i1, i2]| {
            let v0 = &mesh.vertices[i0 as usize].position;
            let v1 = &mesh.vertices[i1 as usize].position;
            let v2 = &mesh.vertices[i2 as usize].position;
            let normal = Triangle::new(*v0, *v1, *v2)
                .normal()
                .map(|n| [n.x as f32, n.y as f32, n.z as f32])
                .unwrap_or([0.0; 3]);

            stl_io::Triangle {
                normal: stl_io::Normal::new(normal),
                vertices: [
                    stl_io::Vertex::new(to_f32(v0)),
                    stl_io::Vertex::new(to_f32(v1)),
                    stl_io::Vertex::new(to_f32(v2)),
                ],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter())
        .map_err(|e| SegmentError::export_io(path, e))?;
    writer
        .flush()
        .map_err(|e| SegmentError::export_io(path, e))?;

    info!(triangles = mesh.face_count(), path = %path.display(), "Saved STL");
    Ok(())
}

/// Save mesh to OBJ, keeping the indexed structure.
pub fn save_obj(mesh: &Mesh, path: &Path) -> SegmentResult<()> {
    info!(path = %path.display(), "Saving mesh (OBJ)");

    let file = File::create(path).map_err(|e| SegmentError::export_io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_obj(mesh, &mut writer).map_err(|e| SegmentError::export_io(path, e))?;

    debug!(
        vertices = mesh.vertex_count(),
        faces = mesh.face_count(),
        "Saved OBJ"
    );
    Ok(())
}

fn write_obj(mesh: &Mesh, writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(writer, "# anatomesh")?;
    writeln!(writer, "# Vertices: {}", mesh.vertex_count())?;
    writeln!(writer, "# Faces: {}", mesh.face_count())?;
    for vertex in &mesh.vertices {
        let p = vertex.position;
        writeln!(writer, "v {:.6} {:.6} {:.6}", p.x, p.y, p.z)?;
    }
    // OBJ indices are 1-based.
    for face in &mesh.faces {
        writeln!(writer, "f {} {} {}", face[0] + 1, face[1] + 1, face[2] + 1)?;
    }
    writer.flush()
}

//! Triangle mesh geometry for loaded assets.
//!
//! Meshes are read from OBJ files, optionally normalized into the
//! environment cube, and written back out as OBJ for the dataset's
//! `normalized.obj` exports.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use mvgen_math::{Aabb, Vec3};
use thiserror::Error;

/// Errors that can occur while loading or exporting a mesh.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("No geometry found in {0}")]
    NoGeometry(String),
}

pub type MeshResult<T> = Result<T, MeshError>;

/// A mesh consisting of vertex positions, optional normals, and triangle indices.
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Vertex normals (optional - will be computed if not provided)
    pub normals: Option<Vec<Vec3>>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices, optionally with normals.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>, normals: Option<Vec<Vec3>>) -> Self {
        let bounds = Aabb::enclosing(&positions);
        Self {
            positions,
            normals,
            indices,
            bounds,
        }
    }

    /// Load every model of an OBJ file into a single triangulated mesh.
    pub fn load_obj<P: AsRef<Path>>(path: P) -> MeshResult<Self> {
        let path = path.as_ref();
        let (models, _materials) = tobj::load_obj(
            path,
            &tobj::LoadOptions {
                single_index: true,
                triangulate: true,
                ..Default::default()
            },
        )?;

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut indices = Vec::new();
        let mut all_have_normals = true;

        for model in &models {
            let mesh = &model.mesh;
            let offset = positions.len() as u32;
            let vertex_count = mesh.positions.len() / 3;

            positions.extend(
                mesh.positions
                    .chunks_exact(3)
                    .map(|p| Vec3::new(p[0], p[1], p[2])),
            );
            if mesh.normals.len() == mesh.positions.len() {
                normals.extend(
                    mesh.normals
                        .chunks_exact(3)
                        .map(|n| Vec3::new(n[0], n[1], n[2])),
                );
            } else {
                all_have_normals = false;
            }
            indices.extend(mesh.indices.iter().map(|i| i + offset));

            log::debug!(
                "OBJ model {:?}: {} vertices, {} triangles",
                model.name,
                vertex_count,
                mesh.indices.len() / 3
            );
        }

        if positions.is_empty() || indices.is_empty() {
            return Err(MeshError::NoGeometry(path.display().to_string()));
        }

        let normals = all_have_normals.then_some(normals);
        let mut mesh = Mesh::new(positions, indices, normals);
        mesh.ensure_normals();
        Ok(mesh)
    }

    /// Compute smooth vertex normals by averaging face normals.
    ///
    /// Faces are wound counter-clockwise, as in OBJ.
    pub fn compute_normals(&mut self) {
        let vertex_count = self.positions.len();
        let mut normals = vec![Vec3::ZERO; vertex_count];

        // Accumulate face normals at each vertex
        for face in self.indices.chunks_exact(3) {
            let i0 = face[0] as usize;
            let i1 = face[1] as usize;
            let i2 = face[2] as usize;

            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = self.positions[i0];
            let edge1 = self.positions[i1] - p0;
            let edge2 = self.positions[i2] - p0;
            let face_normal = edge1.cross(edge2);

            normals[i0] += face_normal;
            normals[i1] += face_normal;
            normals[i2] += face_normal;
        }

        for normal in &mut normals {
            *normal = normal.try_normalize().unwrap_or(Vec3::Z);
        }

        self.normals = Some(normals);
    }

    /// Check if the mesh has normals.
    pub fn has_normals(&self) -> bool {
        self.normals.is_some()
    }

    /// Ensure the mesh has one normal per vertex, computing them if necessary.
    pub fn ensure_normals(&mut self) {
        let should_compute = match &self.normals {
            None => true,
            Some(normals) => normals.len() != self.positions.len(),
        };

        if should_compute {
            self.compute_normals();
        }
    }

    /// Center the mesh on the origin and scale it so its longest side
    /// equals `dimension`.
    ///
    /// Degenerate (flat-in-every-axis) meshes are only centered.
    pub fn normalize_into_cube(&mut self, dimension: f32) {
        let center = self.bounds.centroid();
        let extent = self.bounds.max_extent();
        let scale = if extent > 0.0 { dimension / extent } else { 1.0 };

        for position in &mut self.positions {
            *position = (*position - center) * scale;
        }
        self.bounds = Aabb::enclosing(&self.positions);

        log::debug!(
            "Normalized mesh: center {:?} -> origin, scale {:.4}",
            center,
            scale
        );
    }

    /// Get the mesh center (center of bounding box).
    pub fn center(&self) -> Vec3 {
        self.bounds.centroid()
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Write the mesh as a Wavefront OBJ file.
    pub fn write_obj<P: AsRef<Path>>(&self, path: P) -> MeshResult<()> {
        let mut out = BufWriter::new(File::create(path.as_ref())?);
        self.write_obj_to(&mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Write the mesh as OBJ text to any writer.
    pub fn write_obj_to<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "# mvgen normalized mesh")?;
        for p in &self.positions {
            writeln!(out, "v {} {} {}", p.x, p.y, p.z)?;
        }
        if let Some(normals) = &self.normals {
            for n in normals {
                writeln!(out, "vn {} {} {}", n.x, n.y, n.z)?;
            }
        }
        let with_normals = self.has_normals();
        for face in self.indices.chunks_exact(3) {
            // OBJ indices are 1-based
            let [a, b, c] = [face[0] + 1, face[1] + 1, face[2] + 1];
            if with_normals {
                writeln!(out, "f {a}//{a} {b}//{b} {c}//{c}")?;
            } else {
                writeln!(out, "f {a} {b} {c}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_quad_at(offset: Vec3, size: f32) -> Mesh {
        let positions = vec![
            offset,
            offset + Vec3::new(size, 0.0, 0.0),
            offset + Vec3::new(size, size, 0.0),
            offset + Vec3::new(0.0, size, 0.0),
        ];
        Mesh::new(positions, vec![0, 1, 2, 0, 2, 3], None)
    }

    #[test]
    fn test_mesh_creation() {
        let mesh = unit_quad_at(Vec3::ZERO, 1.0);

        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);
        assert!(!mesh.has_normals());
    }

    #[test]
    fn test_compute_normals() {
        let mut mesh = unit_quad_at(Vec3::ZERO, 1.0);
        mesh.compute_normals();

        // CCW quad in the XY plane faces +Z
        for normal in mesh.normals.as_ref().unwrap() {
            assert!((normal.z - 1.0).abs() < 0.001);
        }
    }

    #[test]
    fn test_normalize_into_cube() {
        let mut mesh = Mesh::new(
            vec![
                Vec3::new(10.0, 10.0, 10.0),
                Vec3::new(14.0, 12.0, 11.0),
                Vec3::new(12.0, 11.0, 10.0),
            ],
            vec![0, 1, 2],
            None,
        );
        mesh.normalize_into_cube(2.0);

        assert!(mesh.center().length() < 0.001);
        assert!((mesh.bounds.max_extent() - 2.0).abs() < 0.001);
        // Aspect ratio is preserved
        assert!((mesh.bounds.extent().y - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_normalize_degenerate_mesh() {
        let mut mesh = Mesh::new(vec![Vec3::new(3.0, 3.0, 3.0)], vec![], None);
        mesh.normalize_into_cube(1.0);
        assert_eq!(mesh.positions[0], Vec3::ZERO);
    }

    #[test]
    fn test_write_obj() {
        let mut mesh = unit_quad_at(Vec3::ZERO, 1.0);
        let mut text = Vec::new();
        mesh.write_obj_to(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();

        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 4);
        assert!(text.contains("f 1 2 3"));

        mesh.compute_normals();
        let mut text = Vec::new();
        mesh.write_obj_to(&mut text).unwrap();
        let text = String::from_utf8(text).unwrap();
        assert!(text.contains("f 1//1 3//3 4//4"));
    }

    #[test]
    fn test_obj_roundtrip() {
        let dir = std::env::temp_dir().join(format!("mvgen_mesh_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("quad.obj");

        let mut mesh = unit_quad_at(Vec3::new(1.0, 1.0, 0.0), 2.0);
        mesh.normalize_into_cube(1.0);
        mesh.write_obj(&path).unwrap();

        let loaded = Mesh::load_obj(&path).unwrap();
        assert_eq!(loaded.vertex_count(), 4);
        assert_eq!(loaded.triangle_count(), 2);
        assert!(loaded.has_normals());
        assert!((loaded.bounds.max_extent() - 1.0).abs() < 0.001);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_obj() {
        assert!(Mesh::load_obj("/nonexistent/mvgen/missing.obj").is_err());
    }
}

//! Triangulated target surface with per-face centroids and unit outward normals.

use std::path::Path;

use rpod_core::vector::{self, Vector3};
use thiserror::Error;

pub mod stl;

/// Immutable triangle of the target surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Face {
    pub vertices: [Vector3; 3],
    pub centroid: Vector3,
    /// Unit normal from the right-hand vertex winding; zero for degenerate faces.
    pub normal: Vector3,
}

impl Face {
    pub fn new(vertices: [Vector3; 3]) -> Self {
        let [a, b, c] = vertices;
        let centroid = vector::scale(&vector::add(&vector::add(&a, &b), &c), 1.0 / 3.0);
        let winding = vector::cross(&vector::sub(&b, &a), &vector::sub(&c, &a));
        let normal = vector::normalize(&winding)
            .map(|(unit, _)| unit)
            .unwrap_or([0.0; 3]);
        Self {
            vertices,
            centroid,
            normal,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.normal == [0.0; 3]
    }
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("failed to read mesh: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed STL at line {line}: {reason}")]
    Ascii { line: usize, reason: String },
    #[error("binary STL truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("mesh contains no faces")]
    Empty,
    #[error("face {index} has non-finite coordinates")]
    NonFinite { index: usize },
}

/// Target vehicle surface; faces are addressed by index `0..len()`.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    faces: Vec<Face>,
}

impl SurfaceMesh {
    pub fn from_triangles<I>(triangles: I) -> Result<Self, MeshError>
    where
        I: IntoIterator<Item = [Vector3; 3]>,
    {
        let faces: Vec<Face> = triangles.into_iter().map(Face::new).collect();
        if faces.is_empty() {
            return Err(MeshError::Empty);
        }
        if let Some(index) = faces
            .iter()
            .position(|f| !f.vertices.iter().all(vector::is_finite))
        {
            return Err(MeshError::NonFinite { index });
        }
        let degenerate = faces.iter().filter(|f| f.is_degenerate()).count();
        if degenerate > 0 {
            tracing::warn!(degenerate, total = faces.len(), "mesh has zero-area faces");
        }
        Ok(Self { faces })
    }

    /// Read an ASCII or binary STL file.
    pub fn from_stl<P: AsRef<Path>>(path: P) -> Result<Self, MeshError> {
        let bytes = std::fs::read(path)?;
        Self::from_triangles(stl::parse(&bytes)?)
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    pub fn faces(&self) -> &[Face] {
        &self.faces
    }
}

//! Triangle mesh assets for the BVH backend.
//!
//! Meshes arrive from an external model loader as one or more sub-meshes.
//! The renderer wants a single contiguous triangle soup, so this module
//! merges sub-meshes into one vertex buffer and hands out flat triangle
//! vertex triplets.

use std::path::Path;

use strata_math::{Aabb, Vec3};
use thiserror::Error;

/// Errors that can occur while importing mesh assets.
#[derive(Error, Debug)]
pub enum MeshError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OBJ error: {0}")]
    Obj(#[from] tobj::LoadError),

    #[error("No geometry found in {0}")]
    NoGeometry(String),
}

/// Result type for mesh operations.
pub type MeshResult<T> = Result<T, MeshError>;

/// An indexed triangle mesh (positions only).
#[derive(Clone, Debug)]
pub struct Mesh {
    /// Vertex positions (one Vec3 per vertex)
    pub positions: Vec<Vec3>,

    /// Triangle indices (every 3 indices form a triangle)
    pub indices: Vec<u32>,

    /// Axis-aligned bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// Create a new mesh from positions and indices.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Self {
        let bounds = Self::compute_bounds(&positions);
        Self {
            positions,
            indices,
            bounds,
        }
    }

    /// Merge sub-meshes into one mesh with a single vertex buffer.
    ///
    /// Indices of each sub-mesh are rebased onto the merged buffer.
    pub fn merge(parts: &[Mesh]) -> Self {
        let vertex_total = parts.iter().map(|m| m.positions.len()).sum();
        let index_total = parts.iter().map(|m| m.indices.len()).sum();

        let mut positions = Vec::with_capacity(vertex_total);
        let mut indices = Vec::with_capacity(index_total);

        for part in parts {
            let base = positions.len() as u32;
            positions.extend_from_slice(&part.positions);
            indices.extend(part.indices.iter().map(|i| i + base));
        }

        Self::new(positions, indices)
    }

    /// Compute axis-aligned bounding box from positions.
    fn compute_bounds(positions: &[Vec3]) -> Aabb {
        positions
            .iter()
            .fold(Aabb::EMPTY, |bounds, p| bounds.include(*p))
    }

    /// Recenter the mesh on the origin and scale its largest extent to
    /// `target_extent`.
    pub fn normalized(mut self, target_extent: f32) -> Self {
        if self.positions.is_empty() {
            return self;
        }

        let center = self.bounds.centroid();
        let largest = self.bounds.extent().max_element();
        let scale = if largest > 0.0 { target_extent / largest } else { 1.0 };

        for p in &mut self.positions {
            *p = (*p - center) * scale;
        }
        self.bounds = Self::compute_bounds(&self.positions);
        self
    }

    /// Get the number of triangles in the mesh.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Get the number of vertices in the mesh.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Extract triangle vertices as flat array of [Vec3; 3] triplets.
    ///
    /// Triangles referencing vertices outside the buffer are skipped.
    pub fn extract_triangle_vertices(&self) -> Vec<[Vec3; 3]> {
        let mut triangles = Vec::with_capacity(self.triangle_count());

        for chunk in self.indices.chunks_exact(3) {
            let i0 = chunk[0] as usize;
            let i1 = chunk[1] as usize;
            let i2 = chunk[2] as usize;

            let (Some(&a), Some(&b), Some(&c)) = (
                self.positions.get(i0),
                self.positions.get(i1),
                self.positions.get(i2),
            ) else {
                log::warn!(
                    "Invalid triangle indices: [{}, {}, {}], vertex count: {}",
                    i0,
                    i1,
                    i2,
                    self.positions.len()
                );
                continue;
            };

            triangles.push([a, b, c]);
        }

        triangles
    }
}

/// Load every model in an OBJ file and merge them into one mesh.
pub fn load_obj(path: impl AsRef<Path>) -> MeshResult<Mesh> {
    let path = path.as_ref();
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )?;

    let parts: Vec<Mesh> = models
        .iter()
        .map(|model| {
            let positions = model
                .mesh
                .positions
                .chunks_exact(3)
                .map(|p| Vec3::new(p[0], p[1], p[2]))
                .collect();
            Mesh::new(positions, model.mesh.indices.clone())
        })
        .filter(|m| m.triangle_count() > 0)
        .collect();

    if parts.is_empty() {
        return Err(MeshError::NoGeometry(path.display().to_string()));
    }

    let mesh = Mesh::merge(&parts);
    log::info!(
        "Loaded {} ({} sub-meshes, {} triangles, {} vertices)",
        path.display(),
        parts.len(),
        mesh.triangle_count(),
        mesh.vertex_count()
    );
    Ok(mesh)
}

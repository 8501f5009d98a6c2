//! Strata Core - asset data handed to the renderer by its collaborators.
//!
//! This crate provides:
//!
//! - **Meshes**: triangle soup merged from sub-meshes, with OBJ import
//! - **Noise textures**: read-only scalar pixel arrays (blue noise for
//!   sampling, value noise for terrain heights)
//!
//! # Example
//!
//! ```ignore
//! use strata_core::mesh::load_obj;
//!
//! let mesh = load_obj("bunny.obj")?.normalized(2.0);
//! println!("Loaded {} triangles", mesh.triangle_count());
//! ```

pub mod mesh;
pub mod texture;

// Re-export commonly used types
pub use mesh::{load_obj, Mesh, MeshError, MeshResult};
pub use texture::{NoiseTexture, TextureError, TextureResult};

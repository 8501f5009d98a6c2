//! Strata Renderer - progressive CPU path tracing
//!
//! A Monte Carlo path tracer over interchangeable scene backends:
//!
//! - **Analytic**: closed-form shapes (the Cornell box)
//! - **Ray marched**: signed distance fractals and height-field terrain
//! - **Mesh**: imported triangle meshes behind a BVH
//!
//! The [`Renderer`] drives one frame at a time and blends each frame into a
//! running average while the camera and scene hold still.
//!
//! # Example
//!
//! ```ignore
//! use strata_renderer::{ModeKind, Renderer, RendererConfig};
//!
//! let mut renderer = Renderer::new(RendererConfig::default())?;
//! renderer.select_mode(ModeKind::Mandelbulb)?;
//! let camera = renderer.default_camera();
//! let frame = renderer.render_frame(&camera, 1.0 / 60.0)?;
//! ```

mod accumulation;
mod analytic;
mod backend;
mod bvh;
mod camera;
mod distance;
mod error;
mod film;
mod hittable;
mod integrator;
mod light;
mod loader;
mod material;
mod mesh_scene;
mod modes;
mod quality;
mod raymarch;
mod renderer;
mod sampling;
mod settings;
mod shapes;
mod triangle;

pub use accumulation::{AccumulationStats, Accumulator};
pub use analytic::{AnalyticScene, Primitive};
pub use backend::{ActiveBackend, BackendKind, SceneBackend, Sky};
pub use bvh::{triangles_from_mesh, Bvh, BvhError, BvhStrategy};
pub use camera::CameraState;
pub use distance::{default_height_noise, DistanceField, TerrainField};
pub use error::{RenderError, RenderResult};
pub use film::{color_to_rgba, linear_to_gamma, rgba_bytes, ImageBuffer, ToneMapping};
pub use hittable::{Intersection, SurfaceTag};
pub use integrator::PathTracer;
pub use light::{Light, LightSample};
pub use loader::{BuildStatus, MeshBuildTask};
pub use material::{Color, Material, Medium, Scatter};
pub use mesh_scene::MeshScene;
pub use modes::{
    BackendBuilder, CornellParams, CornellPatch, FractalParams, FractalPatch, MarchPatch, MeshParams,
    MeshPatch, ModeEntry, ModeKind, ModeParams, ModeRegistry, ParameterPatch, SceneAssets, SunPatch,
    TerrainParams, TerrainPatch,
};
pub use quality::AdaptiveQuality;
pub use raymarch::{Drift, MarchSettings, RayMarchScene, SunPath};
pub use renderer::{Frame, FrameStats, Renderer};
pub use settings::{QualitySettings, RenderSettings, RendererConfig};
pub use shapes::{OrientedBox, Rect, Shape, Sphere};
pub use triangle::Triangle;

/// Re-export common math types from strata_math
pub use strata_math::{Aabb, Interval, Ray, Vec2, Vec3};

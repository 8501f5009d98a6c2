//! Triangle mesh backend over a shared BVH.

use std::sync::Arc;

use strata_math::{Interval, Ray, Vec3};

use crate::backend::{SceneBackend, Sky};
use crate::bvh::Bvh;
use crate::hittable::{Intersection, SurfaceTag};
use crate::light::Light;
use crate::material::{Color, Material};

/// Mesh scene: one material over a BVH, lit by a sun and a sky.
///
/// Until a mesh has finished loading the BVH is absent and every ray
/// misses, which shows the bare sky.
#[derive(Debug, Clone)]
pub struct MeshScene {
    bvh: Option<Arc<Bvh>>,
    material: Material,
    lights: Vec<Light>,
    sky: Sky,
}

impl MeshScene {
    pub fn new(bvh: Option<Arc<Bvh>>, material: Material, sun: Light, sky: Sky) -> Self {
        Self {
            bvh,
            material,
            lights: vec![sun],
            sky,
        }
    }

    pub fn bvh(&self) -> Option<&Arc<Bvh>> {
        self.bvh.as_ref()
    }

    /// Swap in a freshly built hierarchy.
    pub fn set_bvh(&mut self, bvh: Option<Arc<Bvh>>) {
        self.bvh = bvh;
    }
}

impl SceneBackend for MeshScene {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        let bvh = self.bvh.as_ref()?;
        let hit = bvh.hit(ray, ray_t)?;
        let normal = bvh.triangles()[hit.triangle as usize].normal();
        Some(Intersection::new(ray, hit.t, normal, self.material, SurfaceTag::Mesh))
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        match &self.bvh {
            Some(bvh) => format!(
                "mesh: {} triangles, {} BVH nodes, depth {}",
                bvh.triangles().len(),
                bvh.nodes().len(),
                bvh.depth()
            ),
            None => "mesh: no geometry loaded".to_string(),
        }
    }

    fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn background(&self, direction: Vec3) -> Color {
        self.sky.radiance(direction)
    }

    fn surface_epsilon(&self) -> f32 {
        // Scale with the model so large meshes do not self-intersect
        self.bvh
            .as_ref()
            .map_or(1e-4, |b| 1e-4 * b.bounds().extent().max_element().max(1.0))
    }
}

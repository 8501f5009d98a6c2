//! Analytic primitive scene backend.
//!
//! A short list of closed-form primitives tested one after another. The
//! Cornell box is the one scene built from it.

use strata_math::{Interval, Mat4, Ray, Vec3};

use crate::backend::{SceneBackend, Sky};
use crate::hittable::{Intersection, SurfaceTag};
use crate::light::Light;
use crate::material::{Color, Material, Medium};
use crate::modes::CornellParams;
use crate::shapes::{OrientedBox, Rect, Shape, Sphere};

/// A shape with its material and tag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Primitive {
    pub shape: Shape,
    pub material: Material,
    pub tag: SurfaceTag,
}

/// Scene made of analytic primitives, tested in declaration order.
#[derive(Debug, Clone)]
pub struct AnalyticScene {
    primitives: Vec<Primitive>,
    lights: Vec<Light>,
    sky: Sky,
}

impl AnalyticScene {
    pub fn new(sky: Sky) -> Self {
        Self {
            primitives: Vec::new(),
            lights: Vec::new(),
            sky,
        }
    }

    /// Append a primitive. Emissive rectangles also become sampled lights.
    pub fn add(&mut self, shape: Shape, material: Material, tag: SurfaceTag) {
        if let (Shape::Rect(rect), Material::Emissive { radiance }) = (&shape, &material) {
            self.lights.push(Light::Rect {
                corner: rect.corner,
                edge_u: rect.edge_u,
                edge_v: rect.edge_v,
                radiance: *radiance,
            });
        }
        self.primitives.push(Primitive {
            shape,
            material,
            tag,
        });
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    /// Cornell box: a 2x2x2 room open towards +Z, floor at y = 0.
    pub fn cornell_box(params: &CornellParams) -> Self {
        let white = Material::diffuse(Color::splat(0.73));
        let red = Material::diffuse(Color::new(0.65, 0.05, 0.05));
        let green = Material::diffuse(Color::new(0.12, 0.45, 0.15));

        let mut scene = Self::new(Sky::BLACK);

        let room = [
            (Vec3::new(-1.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(2.0, 0.0, 0.0), white, SurfaceTag::Floor),
            (Vec3::new(-1.0, 2.0, -1.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 2.0), white, SurfaceTag::Ceiling),
            (Vec3::new(-1.0, 0.0, -1.0), Vec3::new(2.0, 0.0, 0.0), Vec3::new(0.0, 2.0, 0.0), white, SurfaceTag::BackWall),
            (Vec3::new(-1.0, 0.0, -1.0), Vec3::new(0.0, 2.0, 0.0), Vec3::new(0.0, 0.0, 2.0), red, SurfaceTag::LeftWall),
            (Vec3::new(1.0, 0.0, -1.0), Vec3::new(0.0, 0.0, 2.0), Vec3::new(0.0, 2.0, 0.0), green, SurfaceTag::RightWall),
        ];
        for (corner, u, v, material, tag) in room {
            scene.add(Shape::Rect(Rect::new(corner, u, v)), material, tag);
        }

        // Ceiling light, just below the ceiling and facing down
        scene.add(
            Shape::Rect(Rect::new(
                Vec3::new(-0.25, 1.98, -0.25),
                Vec3::new(0.5, 0.0, 0.0),
                Vec3::new(0.0, 0.0, 0.5),
            )),
            Material::emissive(params.light_color * params.light_intensity),
            SurfaceTag::Light,
        );

        let angle = params.box_rotation.to_radians();
        scene.add(
            Shape::Box(OrientedBox::rotated_y(
                Vec3::new(-0.35, 0.6, -0.35),
                Vec3::new(0.3, 0.6, 0.3),
                angle,
            )),
            white,
            SurfaceTag::TallBox,
        );
        scene.add(
            Shape::Box(OrientedBox::rotated_y(
                Vec3::new(0.4, 0.3, 0.3),
                Vec3::splat(0.3),
                -angle,
            )),
            white,
            SurfaceTag::ShortBox,
        );

        if params.glass_sphere {
            scene.add(
                Shape::Sphere(Sphere::new(Vec3::new(0.4, 0.85, 0.3), 0.25)),
                Material::dielectric(params.sphere_ior),
                SurfaceTag::Sphere,
            );
        }

        if params.fog_density > 0.0 {
            // Fills the room without touching walls, floor or light
            let medium = Medium::new(
                Color::splat(0.9),
                params.fog_density,
                params.fog_density * 0.1,
                params.fog_anisotropy,
            );
            scene.add(
                Shape::Box(OrientedBox::new(
                    Vec3::new(0.98, 0.97, 0.98),
                    Mat4::from_translation(Vec3::new(0.0, 0.99, 0.0)),
                )),
                Material::Volume(medium),
                SurfaceTag::Fog,
            );
        }

        scene
    }
}

impl SceneBackend for AnalyticScene {
    fn intersect(&self, ray: &Ray, ray_t: Interval) -> Option<Intersection> {
        if ray.is_degenerate() {
            return None;
        }

        let mut closest: Option<(f32, Vec3, &Primitive)> = None;
        let mut range = ray_t;

        // Strictly nearer hits only, so on ties the first declared wins
        for primitive in &self.primitives {
            if let Some((t, normal)) = primitive.shape.hit(ray, range) {
                range = range.with_max(t);
                closest = Some((t, normal, primitive));
            }
        }

        closest.map(|(t, normal, p)| Intersection::new(ray, t, normal, p.material, p.tag))
    }

    fn is_dynamic(&self) -> bool {
        false
    }

    fn describe(&self) -> String {
        format!(
            "analytic: {} primitives, {} lights",
            self.primitives.len(),
            self.lights.len()
        )
    }

    fn lights(&self) -> &[Light] {
        &self.lights
    }

    fn background(&self, direction: Vec3) -> Color {
        self.sky.radiance(direction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EYE: Vec3 = Vec3::new(0.0, 1.0, 3.4);

    fn trace_tag(scene: &AnalyticScene, target: Vec3) -> Option<SurfaceTag> {
        let ray = Ray::new(EYE, target - EYE);
        scene.intersect(&ray, Interval::forward(1e-4)).map(|h| h.tag)
    }

    #[test]
    fn test_cornell_layout() {
        let scene = AnalyticScene::cornell_box(&CornellParams::default());

        assert_eq!(scene.lights().len(), 1);
        assert_eq!(scene.primitives().len(), 8);
        assert!(!scene.is_dynamic());

        assert_eq!(trace_tag(&scene, Vec3::new(0.0, 1.7, -1.0)), Some(SurfaceTag::BackWall));
        assert_eq!(trace_tag(&scene, Vec3::new(0.0, 0.0, 0.8)), Some(SurfaceTag::Floor));
        assert_eq!(trace_tag(&scene, Vec3::new(0.0, 1.98, 0.0)), Some(SurfaceTag::Light));
        assert_eq!(trace_tag(&scene, Vec3::new(-1.0, 1.5, 0.0)), Some(SurfaceTag::LeftWall));
        assert_eq!(trace_tag(&scene, Vec3::new(1.0, 1.5, 0.0)), Some(SurfaceTag::RightWall));
        assert_eq!(trace_tag(&scene, Vec3::new(0.6, 2.0, -0.6)), Some(SurfaceTag::Ceiling));
    }

    #[test]
    fn test_light_faces_the_room() {
        let scene = AnalyticScene::cornell_box(&CornellParams::default());
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let hit = scene.intersect(&ray, Interval::forward(1e-4)).unwrap();

        assert_eq!(hit.tag, SurfaceTag::Light);
        assert!(hit.front_face);
        assert!(hit.material.emitted(hit.front_face).x > 0.0);
    }

    #[test]
    fn test_optional_sphere_and_fog() {
        let params = CornellParams {
            glass_sphere: true,
            fog_density: 0.5,
            ..CornellParams::default()
        };
        let scene = AnalyticScene::cornell_box(&params);
        assert_eq!(scene.primitives().len(), 10);

        // From inside the fog, looking up, the fog boundary comes first
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Y);
        let hit = scene.intersect(&ray, Interval::forward(1e-4)).unwrap();
        assert_eq!(hit.tag, SurfaceTag::Fog);
        assert!(!hit.front_face);
    }

    #[test]
    fn test_escaping_ray_misses() {
        let scene = AnalyticScene::cornell_box(&CornellParams::default());
        let ray = Ray::new(EYE, Vec3::Z);
        assert!(scene.intersect(&ray, Interval::forward(1e-4)).is_none());
        assert_eq!(scene.background(Vec3::Z), Color::ZERO);
    }
}

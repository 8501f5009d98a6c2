//! Intersection records shared by every scene backend.

use strata_math::{Ray, Vec3};

use crate::material::Material;

/// Backend-specific label of the surface that was hit.
///
/// Analytic scenes use it to tell walls, boxes and lights apart; other
/// backends tag everything with one or two values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SurfaceTag {
    Floor,
    Ceiling,
    LeftWall,
    RightWall,
    BackWall,
    Light,
    TallBox,
    ShortBox,
    Sphere,
    Fog,
    Fractal,
    Terrain,
    Water,
    Mesh,
    Other,
}

/// Record of a ray-surface intersection.
///
/// A miss is represented by `None` at the call site (hit distance +inf).
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    /// Parameter t where the intersection occurs
    pub t: f32,
    /// Point of intersection
    pub point: Vec3,
    /// Surface normal at intersection (always points against ray)
    pub normal: Vec3,
    /// Whether the ray hit the front face (outside) of the surface
    pub front_face: bool,
    pub material: Material,
    pub tag: SurfaceTag,
}

impl Intersection {
    /// Build a record from the outward normal of the surface.
    pub fn new(ray: &Ray, t: f32, outward_normal: Vec3, material: Material, tag: SurfaceTag) -> Self {
        // If the ray and normal point in the same direction, we're inside
        let front_face = ray.direction.dot(outward_normal) < 0.0;
        Self {
            t,
            point: ray.at(t),
            normal: if front_face {
                outward_normal
            } else {
                -outward_normal
            },
            front_face,
            material,
            tag,
        }
    }

    /// Origin for a secondary ray leaving this hit in `direction`.
    ///
    /// The point is pushed off the surface along the normal, to the same
    /// side the new ray travels, so it cannot re-hit the surface it left.
    pub fn spawn_origin(&self, direction: Vec3, epsilon: f32) -> Vec3 {
        let side = if direction.dot(self.normal) >= 0.0 { 1.0 } else { -1.0 };
        self.point + self.normal * (epsilon * side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_normal_points_against_ray() {
        let outward = Vec3::Z;
        let from_outside = Ray::new(Vec3::new(0.0, 0.0, 2.0), -Vec3::Z);
        let hit = Intersection::new(&from_outside, 2.0, outward, Material::default(), SurfaceTag::Other);
        assert!(hit.front_face);
        assert_eq!(hit.normal, Vec3::Z);
        assert_eq!(hit.point, Vec3::ZERO);

        let from_inside = Ray::new(Vec3::new(0.0, 0.0, -2.0), Vec3::Z);
        let hit = Intersection::new(&from_inside, 2.0, outward, Material::default(), SurfaceTag::Other);
        assert!(!hit.front_face);
        assert_eq!(hit.normal, -Vec3::Z);
    }

    #[test]
    fn test_spawn_origin_follows_direction() {
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), -Vec3::Y);
        let hit = Intersection::new(&ray, 1.0, Vec3::Y, Material::default(), SurfaceTag::Floor);

        assert!(hit.spawn_origin(Vec3::Y, 1e-3).y > 0.0);
        assert!(hit.spawn_origin(-Vec3::Y, 1e-3).y < 0.0);
    }
}

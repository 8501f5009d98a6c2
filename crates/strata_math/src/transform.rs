// Transform utilities for Mat4
//
// Extends glam::Mat4 with the helpers the ray tracer needs on top of
// transform_point3() and inverse().

use crate::{Aabb, Ray};
use glam::{Mat4, Vec3, Vec4};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Transform a direction (w=0): rotation and scale, no translation.
    fn transform_direction(&self, vector: Vec3) -> Vec3;

    /// Transform a surface normal with the inverse-transpose of `self`.
    ///
    /// `self` is expected to be the *inverse* of the object transform, which
    /// is what callers already hold for local-space intersection tests.
    fn transform_normal(&self, normal: Vec3) -> Vec3;

    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;

    /// Transform a ray without renormalizing its direction, so that a hit at
    /// parameter `t` in the target space is the same point as `t` in the
    /// source space.
    fn transform_ray(&self, ray: &Ray) -> Ray;
}

impl Mat4Ext for Mat4 {
    fn transform_direction(&self, vector: Vec3) -> Vec3 {
        let transformed = *self * Vec4::new(vector.x, vector.y, vector.z, 0.0);
        transformed.truncate()
    }

    fn transform_normal(&self, normal: Vec3) -> Vec3 {
        self.transpose()
            .transform_direction(normal)
            .normalize_or_zero()
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        let lo = aabb.min();
        let hi = aabb.max();

        (0..8).fold(Aabb::EMPTY, |acc, i| {
            let corner = Vec3::new(
                if i & 1 == 0 { lo.x } else { hi.x },
                if i & 2 == 0 { lo.y } else { hi.y },
                if i & 4 == 0 { lo.z } else { hi.z },
            );
            acc.include(self.transform_point3(corner))
        })
    }

    fn transform_ray(&self, ray: &Ray) -> Ray {
        Ray::from_parts(
            self.transform_point3(ray.origin),
            self.transform_direction(ray.direction),
        )
    }
}

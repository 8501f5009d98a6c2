//! Triangle primitive for the mesh backend.
//!
//! Uses the Möller-Trumbore algorithm for ray-triangle intersection.

use strata_math::{Aabb, Interval, Ray, Vec3};

/// Determinants smaller than this are treated as parallel rays.
const PARALLEL_EPSILON: f32 = 1e-8;

/// A triangle stored as a vertex and two edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub v0: Vec3,
    pub edge1: Vec3,
    pub edge2: Vec3,
}

/// Distance and barycentric coordinates of a triangle hit.
///
/// The hit point is `(1 - u - v) * v0 + u * v1 + v * v2`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub t: f32,
    pub u: f32,
    pub v: f32,
}

impl Triangle {
    /// Create a new triangle from three vertices.
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self {
            v0,
            edge1: v1 - v0,
            edge2: v2 - v0,
        }
    }

    pub fn v1(&self) -> Vec3 {
        self.v0 + self.edge1
    }

    pub fn v2(&self) -> Vec3 {
        self.v0 + self.edge2
    }

    /// Geometric normal, following the winding order v0 -> v1 -> v2.
    pub fn normal(&self) -> Vec3 {
        self.edge1.cross(self.edge2).normalize_or_zero()
    }

    /// Tight bounding box (flat axes padded).
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(self.v0, self.v1()).include(self.v2())
    }

    pub fn centroid(&self) -> Vec3 {
        self.v0 + (self.edge1 + self.edge2) / 3.0
    }

    /// Möller-Trumbore ray-triangle intersection.
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<TriangleHit> {
        let h = ray.direction.cross(self.edge2);
        let a = self.edge1.dot(h);

        // Ray is parallel to triangle (or the triangle is degenerate)
        if a.abs() < PARALLEL_EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = ray.origin - self.v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(self.edge1);
        let v = f * ray.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * self.edge2.dot(q);
        if t <= 0.0 || !ray_t.surrounds(t) {
            return None;
        }

        Some(TriangleHit { t, u, v })
    }
}

impl From<[Vec3; 3]> for Triangle {
    fn from(v: [Vec3; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_triangle() -> Triangle {
        Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Y)
    }

    #[test]
    fn test_triangle_hit_barycentrics() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::new(0.0, 0.0, -1.0));

        let hit = tri.hit(&ray, Interval::forward(1e-4)).unwrap();
        assert!((hit.t - 1.0).abs() < 1e-5);

        let w = 1.0 - hit.u - hit.v;
        for b in [w, hit.u, hit.v] {
            assert!((0.0..=1.0).contains(&b));
        }
        assert!((w + hit.u + hit.v - 1.0).abs() < 1e-6);
        assert!((hit.u - 0.25).abs() < 1e-5 && (hit.v - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_triangle_miss_outside_footprint() {
        let tri = unit_triangle();
        let ray = Ray::new(Vec3::new(2.0, 2.0, 1.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(tri.hit(&ray, Interval::forward(1e-4)).is_none());
    }

    #[test]
    fn test_triangle_rejects_parallel_and_behind() {
        let tri = unit_triangle();
        let parallel = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::X);
        assert!(tri.hit(&parallel, Interval::forward(1e-4)).is_none());

        let behind = Ray::new(Vec3::new(0.25, 0.25, 1.0), Vec3::Z);
        assert!(tri.hit(&behind, Interval::forward(1e-4)).is_none());

        let degenerate = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0);
        let ray = Ray::new(Vec3::new(0.5, 0.0, 1.0), -Vec3::Z);
        assert!(degenerate.hit(&ray, Interval::forward(1e-4)).is_none());
    }

    #[test]
    fn test_triangle_bounds_and_normal() {
        let tri = unit_triangle();
        assert_eq!(tri.normal(), Vec3::Z);
        let bounds = tri.bounds();
        assert!(bounds.z.size() > 0.0, "flat axis should be padded");
        assert!((tri.centroid() - Vec3::new(1.0 / 3.0, 1.0 / 3.0, 0.0)).length() < 1e-6);
    }
}

//! Closed-form primitives used by the analytic scene backend.
//!
//! Each shape answers "nearest `t` in the interval, and the outward normal
//! there"; material and tag are attached by the scene that owns it.

use strata_math::{Aabb, Interval, Mat4, Mat4Ext, Ray, Vec3};

/// Hit distance and outward normal of a primitive.
pub type ShapeHit = (f32, Vec3);

/// A sphere primitive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self {
            center,
            radius: radius.max(0.0),
        }
    }

    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<ShapeHit> {
        let oc = self.center - ray.origin;
        let a = ray.direction.length_squared();
        if a < 1e-12 {
            return None;
        }
        let h = ray.direction.dot(oc);
        let c = oc.length_squared() - self.radius * self.radius;

        let discriminant = h * h - a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sqrtd = discriminant.sqrt();

        // Find the nearest root in the acceptable range
        let mut root = (h - sqrtd) / a;
        if !ray_t.surrounds(root) {
            root = (h + sqrtd) / a;
            if !ray_t.surrounds(root) {
                return None;
            }
        }

        let outward_normal = (ray.at(root) - self.center) / self.radius;
        Some((root, outward_normal))
    }
}

/// A planar parallelogram spanned by two edges from `corner`.
///
/// The outward normal is `edge_u × edge_v`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub corner: Vec3,
    pub edge_u: Vec3,
    pub edge_v: Vec3,
    normal: Vec3,
    /// `n / (n · n)` for the unnormalized normal, used for planar coordinates
    w: Vec3,
    d: f32,
}

impl Rect {
    pub fn new(corner: Vec3, edge_u: Vec3, edge_v: Vec3) -> Self {
        let n = edge_u.cross(edge_v);
        let normal = n.normalize_or_zero();
        let n_len_sq = n.length_squared();
        let w = if n_len_sq > 0.0 { n / n_len_sq } else { Vec3::ZERO };
        Self {
            corner,
            edge_u,
            edge_v,
            normal,
            w,
            d: normal.dot(corner),
        }
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn area(&self) -> f32 {
        self.edge_u.cross(self.edge_v).length()
    }

    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<ShapeHit> {
        let denom = self.normal.dot(ray.direction);

        // Parallel to the plane (or a degenerate rect / ray)
        if denom.abs() < 1e-8 {
            return None;
        }

        let t = (self.d - self.normal.dot(ray.origin)) / denom;
        if !ray_t.surrounds(t) {
            return None;
        }

        let planar = ray.at(t) - self.corner;
        let alpha = self.w.dot(planar.cross(self.edge_v));
        let beta = self.w.dot(self.edge_u.cross(planar));
        let unit = Interval::new(0.0, 1.0);
        if !unit.contains(alpha) || !unit.contains(beta) {
            return None;
        }

        Some((t, self.normal))
    }
}

/// A box with arbitrary placement, tested in its own local space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    local: Aabb,
    /// Local to world
    transform: Mat4,
    /// World to local
    inverse: Mat4,
}

impl OrientedBox {
    /// Box centred on the local origin with the given placement.
    pub fn new(half_extents: Vec3, transform: Mat4) -> Self {
        let half = half_extents.abs();
        Self {
            local: Aabb::from_points_exact(-half, half),
            transform,
            inverse: transform.inverse(),
        }
    }

    /// Box at `center`, rotated about the vertical axis by `angle` radians.
    pub fn rotated_y(center: Vec3, half_extents: Vec3, angle: f32) -> Self {
        Self::new(
            half_extents,
            Mat4::from_translation(center) * Mat4::from_rotation_y(angle),
        )
    }

    /// World-space bounds.
    pub fn bounds(&self) -> Aabb {
        self.transform.transform_aabb(&self.local)
    }

    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<ShapeHit> {
        let local_ray = self.inverse.transform_ray(ray);
        let t = self.local.hit_distance(&local_ray, ray_t)?;

        // The face is the axis where the hit point is closest to the slab
        let p = local_ray.at(t) / self.local.max();
        let a = p.abs();
        let local_normal = if a.x >= a.y && a.x >= a.z {
            Vec3::new(p.x.signum(), 0.0, 0.0)
        } else if a.y >= a.z {
            Vec3::new(0.0, p.y.signum(), 0.0)
        } else {
            Vec3::new(0.0, 0.0, p.z.signum())
        };

        Some((t, self.inverse.transform_normal(local_normal)))
    }
}

/// Closed set of analytic primitives.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere(Sphere),
    Rect(Rect),
    Box(OrientedBox),
}

impl Shape {
    pub fn hit(&self, ray: &Ray, ray_t: Interval) -> Option<ShapeHit> {
        match self {
            Shape::Sphere(s) => s.hit(ray, ray_t),
            Shape::Rect(r) => r.hit(ray, ray_t),
            Shape::Box(b) => b.hit(ray, ray_t),
        }
    }
}
